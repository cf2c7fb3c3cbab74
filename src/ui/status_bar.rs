use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use super::styles;
use crate::app::App;
use crate::engine::HunkActionKind;
use crate::git::DiffMode;
use crate::view::NavigationView;

/// Modes in key order: `1`, `2`, `3`.
pub const MODES: [DiffMode; 3] = [DiffMode::Unstaged, DiffMode::Staged, DiffMode::Branch];

/// Compute the display width of a list of spans
fn spans_width(spans: &[Span]) -> usize {
    spans.iter().map(|s| s.content.chars().count()).sum()
}

/// Render the top bar:
///   repo · branch · 1 UNSTAGED  2 STAGED  3 BRANCH (vs base)        12 files
pub fn render_top_bar(f: &mut Frame, area: Rect, app: &App) {
    let current = app.mode();
    let repo_name = app
        .repo_root
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(&app.repo_root);

    let mut left = vec![
        Span::styled(
            format!(" {}", repo_name),
            Style::default().fg(styles::CYAN).add_modifier(Modifier::BOLD),
        ),
        Span::styled(" · ", Style::default().fg(styles::BORDER)),
    ];
    if !app.branch.is_empty() {
        left.push(Span::styled(app.branch.as_str(), Style::default().fg(styles::GREEN)));
        left.push(Span::styled(" · ", Style::default().fg(styles::BORDER)));
    }
    for (i, mode) in MODES.iter().enumerate() {
        left.push(Span::styled(format!("{}", i + 1), styles::key_hint_style()));
        let style = if *mode == current {
            Style::default()
                .fg(styles::BG)
                .bg(styles::BLUE)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(styles::MUTED)
        };
        left.push(Span::styled(format!(" {} ", mode.label()), style));
        left.push(Span::raw(" "));
    }
    if current == DiffMode::Branch {
        left.push(Span::styled(
            format!("(vs {})", app.feed.base()),
            Style::default().fg(styles::DIM),
        ));
    }

    let mut right = Vec::new();
    if app.feed.loading() {
        right.push(Span::styled("loading ", Style::default().fg(styles::YELLOW)));
    }
    if app.watching {
        right.push(Span::styled("● ", Style::default().fg(styles::GREEN)));
    }
    right.push(Span::styled(
        format!("{} files ", app.feed.total_files()),
        Style::default().fg(styles::DIM),
    ));

    let gap = (area.width as usize).saturating_sub(spans_width(&left) + spans_width(&right));
    left.push(Span::raw(" ".repeat(gap)));
    left.extend(right);

    let bar = Paragraph::new(Line::from(left)).style(Style::default().bg(styles::PANEL));
    f.render_widget(bar, area);
}

/// A key-label hint pair, e.g. ("s", " stage ")
struct Hint {
    key: String,
    label: String,
}

impl Hint {
    fn new(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
        }
    }

    fn width(&self) -> usize {
        self.key.chars().count() + self.label.chars().count()
    }
}

fn build_hints(app: &App) -> Vec<Hint> {
    let view = app.navigation_view();
    let mut hints = Vec::new();

    if view != NavigationView::Detail {
        hints.push(Hint::new("j/k", " files "));
    }
    match view {
        NavigationView::List if app.selected_entry().is_some() => {
            hints.push(Hint::new("Enter", " open "));
        }
        NavigationView::Detail => hints.push(Hint::new("Esc", " back ")),
        _ => {}
    }

    if view != NavigationView::List && !app.editor.zones().is_empty() {
        hints.push(Hint::new("n/N", " hunk "));
        for kind in HunkActionKind::ALL {
            if app.mode().offers(kind) {
                let key = kind.key().to_string();
                hints.push(Hint::new(&key, &format!(" {} ", kind.label().to_lowercase())));
            }
        }
    }
    if view != NavigationView::List {
        hints.push(Hint::new("w", " wrap "));
        hints.push(Hint::new("b", " base "));
        hints.push(Hint::new("^d/^u", " scroll "));
    }
    if app.feed.has_more() {
        hints.push(Hint::new("m", " more "));
    }
    hints.push(Hint::new("1-3", " mode "));
    hints.push(Hint::new("r", " refresh "));
    hints.push(Hint::new("q", " quit "));
    hints
}

/// Pack hints into rows that fit within `width`
fn pack_hint_lines(hints: &[Hint], width: usize) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut current_spans: Vec<Span<'static>> = Vec::new();
    let mut current_w: usize = 1; // leading space

    for hint in hints {
        let hw = hint.width();
        if current_w + hw > width && !current_spans.is_empty() {
            lines.push(Line::from(std::mem::take(&mut current_spans)));
            current_w = 1;
        }
        if current_spans.is_empty() {
            current_spans.push(Span::raw(" "));
        }
        current_spans.push(Span::styled(hint.key.clone(), styles::key_hint_style()));
        current_spans.push(Span::styled(
            hint.label.clone(),
            Style::default().fg(styles::DIM),
        ));
        current_w += hw;
    }
    if !current_spans.is_empty() {
        lines.push(Line::from(current_spans));
    }
    if lines.is_empty() {
        lines.push(Line::from(vec![Span::raw(" ")]));
    }
    lines
}

/// Calculate how many rows the bottom bar needs
pub fn bottom_bar_height(app: &App, width: u16) -> u16 {
    let lines = pack_hint_lines(&build_hints(app), width as usize);
    (lines.len() as u16).max(1)
}

/// Render the bottom keybinding hints bar
pub fn render_bottom_bar(f: &mut Frame, area: Rect, app: &App) {
    let lines = pack_hint_lines(&build_hints(app), area.width as usize);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(lines.iter().map(|_| Constraint::Length(1)))
        .split(area);

    let panel_bg = Style::default().bg(styles::PANEL);
    for (line, row) in lines.into_iter().zip(rows.iter()) {
        f.render_widget(Paragraph::new(line).style(panel_bg), *row);
    }
}

/// Render the notification in the top-right corner
pub fn render_notification(f: &mut Frame, area: Rect, message: &str) {
    let width = message.chars().count() as u16 + 4;
    let notif_area = Rect {
        x: area.x + area.width.saturating_sub(width + 2),
        y: area.y + 2,
        width: width.min(area.width),
        height: 1,
    };

    let notif = Paragraph::new(Line::from(vec![
        Span::styled(" ● ", Style::default().fg(styles::GREEN)),
        Span::styled(message, Style::default().fg(styles::TEXT)),
        Span::raw(" "),
    ]))
    .style(Style::default().bg(styles::PANEL).fg(styles::TEXT));

    f.render_widget(notif, notif_area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hints_wrap_to_width() {
        let hints = vec![
            Hint::new("j/k", " files "),
            Hint::new("Enter", " open "),
            Hint::new("q", " quit "),
        ];
        assert_eq!(pack_hint_lines(&hints, 80).len(), 1);
        assert_eq!(pack_hint_lines(&hints, 12).len(), 3);
        assert_eq!(pack_hint_lines(&[], 80).len(), 1);
    }
}
