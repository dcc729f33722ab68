use std::io::{stdout, Stdout};

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::warn;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};

use super::help::draw_help;
use super::state::{header_lines, UiState, View};
use crate::error::{Error, Result};
use crate::stats::{Dimension, TableSummary, TrafficSnapshot};

/// Header lines plus the status line below them.
const HEADER_HEIGHT: u16 = 5;

/// Rows per table on the summary screen.
pub const SUMMARY_ROWS: usize = 5;

const GEO_DISABLED: &str = "(no geo source: --city-db/--asn-db)";

/// Summary screen layout, three rows of three tables.
const SUMMARY_GRID: [[Dimension; 3]; 3] = [
    [Dimension::Sources, Dimension::Nxdomain, Dimension::Refused],
    [Dimension::SourcePorts, Dimension::Query2, Dimension::Query3],
    [Dimension::Geo, Dimension::QueryTypes, Dimension::Asn],
];

/// Owns the terminal while the display is up. Raw mode and the alternate
/// screen are undone on drop, including on early returns.
pub struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl Tui {
    pub fn new() -> Result<Self> {
        enable_raw_mode().map_err(Error::Terminal)?;
        let mut out = stdout();
        if let Err(e) = execute!(out, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(Error::Terminal(e));
        }
        let terminal = match Terminal::new(CrosstermBackend::new(out)) {
            Ok(t) => t,
            Err(e) => {
                restore_terminal();
                return Err(Error::Terminal(e));
            }
        };
        Ok(Self { terminal })
    }

    /// Rows available to a full-height table view.
    pub fn table_rows(&self) -> usize {
        match self.terminal.size() {
            // header, block borders
            Ok(area) => usize::from(area.height.saturating_sub(HEADER_HEIGHT + 2)).max(SUMMARY_ROWS),
            Err(_) => SUMMARY_ROWS,
        }
    }

    pub fn draw(&mut self, snapshot: &TrafficSnapshot, state: &UiState) -> Result<()> {
        self.terminal
            .draw(|f| render_ui(f, snapshot, state))
            .map_err(Error::Terminal)?;
        Ok(())
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        let _ = self.terminal.show_cursor();
        restore_terminal();
    }
}

fn restore_terminal() {
    if let Err(e) = disable_raw_mode() {
        warn!("failed to leave raw mode: {}", e);
    }
    let mut out = stdout();
    if let Err(e) = execute!(out, LeaveAlternateScreen) {
        warn!("failed to leave alternate screen: {}", e);
    }
}

fn render_ui(f: &mut Frame<'_>, snapshot: &TrafficSnapshot, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(HEADER_HEIGHT), Constraint::Min(0)].as_ref())
        .split(f.size());

    draw_header(f, chunks[0], snapshot, state);

    match state.view {
        View::Help => draw_help(f, chunks[1]),
        View::Summary => draw_summary(f, chunks[1], snapshot),
        View::Table(dim) => {
            if let Some(table) = snapshot.table(dim) {
                let text = cell_text(snapshot, table, usize::MAX);
                draw_table(f, chunks[1], dim.title(), text);
            }
        }
    }
}

fn draw_header(f: &mut Frame<'_>, area: Rect, snapshot: &TrafficSnapshot, state: &UiState) {
    let mut text = header_lines(snapshot, &state.rates).join("\n");
    text.push('\n');
    if state.source_done {
        text.push_str("<end of capture: hit q to exit>");
    } else {
        text.push_str(state.view.title());
    }

    let header = Paragraph::new(text).style(Style::default().fg(Color::White));
    f.render_widget(header, area);
}

fn draw_summary(f: &mut Frame<'_>, area: Rect, snapshot: &TrafficSnapshot) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Ratio(1, 3); 3].as_ref())
        .split(area);

    for (row_area, dims) in rows.iter().zip(SUMMARY_GRID.iter()) {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, 3); 3].as_ref())
            .split(*row_area);

        for (cell, dim) in cols.iter().zip(dims.iter()) {
            if let Some(table) = snapshot.table(*dim) {
                let text = cell_text(snapshot, table, SUMMARY_ROWS);
                draw_table(f, *cell, dim.title(), text);
            }
        }
    }
}

fn draw_table(f: &mut Frame<'_>, area: Rect, title: &str, text: String) {
    let block = Paragraph::new(text)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .title_style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .style(Style::default().fg(Color::Green));

    f.render_widget(block, area);
}

/// Body of one table panel. Geo and ASN panels say so when no geo source is
/// loaded rather than looking empty.
fn cell_text(snapshot: &TrafficSnapshot, table: &TableSummary, limit: usize) -> String {
    match table.dimension {
        Dimension::Geo | Dimension::Asn if !snapshot.geo_enabled => GEO_DISABLED.to_string(),
        _ => table_text(table, limit),
    }
}

/// Rows as `key  count` lines with the counts lined up, or `(no data)`.
pub fn table_text(table: &TableSummary, limit: usize) -> String {
    let rows = &table.rows[..table.rows.len().min(limit)];
    if rows.is_empty() {
        return "(no data)".to_string();
    }
    let width = rows.iter().map(|r| r.key.chars().count()).max().unwrap_or(0);
    rows.iter()
        .map(|r| format!("{:<width$} {}", r.key, r.count, width = width))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::CounterEntry;

    fn table(rows: &[(&str, u64)]) -> TableSummary {
        TableSummary {
            dimension: Dimension::Query2,
            rows: rows
                .iter()
                .map(|(k, c)| CounterEntry {
                    key: k.to_string(),
                    count: *c,
                })
                .collect(),
        }
    }

    #[test]
    fn test_table_text_alignment() {
        let t = table(&[("example.com", 12), ("a.io", 3)]);
        assert_eq!(table_text(&t, 10), "example.com 12\na.io        3");
    }

    #[test]
    fn test_table_text_limit_and_empty() {
        let t = table(&[("a", 3), ("b", 2), ("c", 1)]);
        assert_eq!(table_text(&t, 2), "a 3\nb 2");
        assert_eq!(table_text(&table(&[]), 5), "(no data)");
    }

    #[test]
    fn test_geo_panels_without_resolver() {
        let mut geo = table(&[]);
        geo.dimension = Dimension::Geo;
        let mut snapshot = TrafficSnapshot::default();
        assert_eq!(cell_text(&snapshot, &geo, 5), GEO_DISABLED);
        // other tables are unaffected
        assert_eq!(cell_text(&snapshot, &table(&[("a", 1)]), 5), "a 1");

        snapshot.geo_enabled = true;
        assert_eq!(cell_text(&snapshot, &geo, 5), "(no data)");
    }

    #[test]
    fn test_summary_grid_covers_nine_tables() {
        let mut dims: Vec<_> = SUMMARY_GRID.iter().flatten().copied().collect();
        dims.sort();
        dims.dedup();
        assert_eq!(dims.len(), 9);
        assert!(!dims.contains(&Dimension::Destinations));
        assert!(!dims.contains(&Dimension::Malformed));
    }
}
