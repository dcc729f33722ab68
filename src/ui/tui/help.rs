use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

const HELP_TEXT: &str = "\
 ?        Show this help
 s        Summary screen
 q        Top query types
 1        Top query names (2 labels)
 2        Top query names (3 labels)
 3        Top source IPs (incoming)
 4        Top destination IPs (outgoing)
 5        Top sources of malformed queries
 6        Top NXDOMAIN names
 7        Top REFUSED names
 8        Top source ports
 9        Top geo locations
 0        Top ASNs

 Ctrl-C / Ctrl-X   Quit
 q (after a file has been read)   Quit";

/// Draws the help panel over `area`.
pub fn draw_help(f: &mut Frame<'_>, area: Rect) {
    let block = Block::default()
        .title("Help - dnsvisor keys")
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::Yellow));

    let text = Paragraph::new(HELP_TEXT)
        .block(block)
        .wrap(Wrap { trim: false });

    f.render_widget(Clear, area);
    f.render_widget(text, area);
}
