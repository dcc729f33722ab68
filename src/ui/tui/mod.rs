pub mod help;
pub mod input;
pub mod render;
pub mod state;

pub use help::draw_help;
pub use input::{spawn_input_handler, UiCommand};
pub use render::{Tui, SUMMARY_ROWS};
pub use state::{header_lines, RateTracker, Rates, UiState, View};
