use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Padding, Paragraph, Wrap},
    Frame,
};

use super::styles;
use crate::app::App;
use crate::feed::DiffEntry;
use crate::git::FileStatus;
use crate::view::{resolve_panel_view, PanelView};

/// Render the diff list pane
pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let feed = &app.feed;
    let title = if feed.has_more() {
        format!(" FILES ({}/{}) ", feed.entries().len(), feed.total_files())
    } else {
        format!(" FILES ({}) ", feed.entries().len())
    };
    let block = Block::default()
        .title(Span::styled(title, Style::default().fg(styles::MUTED)))
        .borders(Borders::RIGHT)
        .border_style(Style::default().fg(styles::BORDER))
        .style(Style::default().bg(styles::SURFACE))
        .padding(Padding::new(0, 0, 0, 0));

    match resolve_panel_view(feed.panel_signals()) {
        PanelView::Loading => {
            let mut lines = vec![Line::from(""), Line::from(Span::styled(
                "  Loading changes…",
                Style::default().fg(styles::MUTED),
            ))];
            if let Some(summary) = feed.summary() {
                lines.push(Line::from(Span::styled(
                    format!("  {} files changed", summary.len()),
                    Style::default().fg(styles::DIM),
                )));
            }
            f.render_widget(Paragraph::new(lines).block(block), area);
        }
        PanelView::Error => {
            let lines = vec![
                Line::from(""),
                Line::from(Span::styled(
                    "  Failed to load changes",
                    Style::default().fg(styles::RED),
                )),
                Line::from(""),
                Line::from(Span::styled(
                    format!("  {}", feed.error().unwrap_or_default()),
                    Style::default().fg(styles::TEXT),
                )),
                Line::from(""),
                Line::from(Span::styled("  [r] retry", Style::default().fg(styles::DIM))),
            ];
            let paragraph = Paragraph::new(lines)
                .block(block)
                .wrap(Wrap { trim: false });
            f.render_widget(paragraph, area);
        }
        PanelView::Empty => {
            let lines = vec![
                Line::from(""),
                Line::from(Span::styled(
                    format!("  No {} changes", feed.mode().as_str()),
                    Style::default().fg(styles::MUTED),
                )),
                Line::from(""),
                Line::from(Span::styled(
                    "  Switch modes with [1] [2] [3]",
                    Style::default().fg(styles::DIM),
                )),
            ];
            f.render_widget(Paragraph::new(lines).block(block), area);
        }
        PanelView::List => render_list(f, area, app, block),
    }
}

fn render_list(f: &mut Frame, area: Rect, app: &App, block: Block<'_>) {
    let entries = app.feed.entries();
    let footer = footer_line(app);
    let viewport_height = (area.height as usize)
        .saturating_sub(1)
        .saturating_sub(usize::from(footer.is_some()));

    let start = scroll_start(app.selected, entries.len(), viewport_height);
    let end = (start + viewport_height).min(entries.len());

    let mut items: Vec<ListItem> = entries[start..end]
        .iter()
        .enumerate()
        .map(|(offset, entry)| entry_item(entry, start + offset == app.selected, area.width))
        .collect();

    if let Some(footer) = footer {
        items.push(ListItem::new(footer).style(styles::surface_style()));
    }

    f.render_widget(List::new(items).block(block), area);
}

/// First visible row that keeps `selected` roughly centred.
fn scroll_start(selected: usize, len: usize, viewport_height: usize) -> usize {
    if len <= viewport_height || selected < viewport_height / 2 {
        0
    } else if selected > len.saturating_sub(viewport_height / 2) {
        len.saturating_sub(viewport_height)
    } else {
        selected.saturating_sub(viewport_height / 2)
    }
}

fn entry_item(entry: &DiffEntry, is_selected: bool, width: u16) -> ListItem<'static> {
    let status = entry.diff.as_ref().map(|d| &d.status);
    let symbol_style = status.map_or_else(
        || styles::status_style(&FileStatus::Modified),
        styles::status_style,
    );
    let stats = format!("+{} -{}", entry.additions, entry.deletions);
    let path_width = (width as usize).saturating_sub(14).max(1);
    let path = shorten_path(&entry.file, path_width);

    let mut spans = vec![
        Span::styled(format!(" {} ", entry.status_symbol()), symbol_style),
        Span::styled(
            format!("{:<width$}", path, width = path_width),
            if is_selected {
                styles::selected_style()
            } else {
                Style::default().fg(styles::TEXT)
            },
        ),
    ];
    if width > 24 {
        spans.push(Span::styled(
            format!("{:>8} ", stats),
            Style::default().fg(styles::DIM),
        ));
    }

    let line_style = if is_selected {
        styles::selected_style()
    } else {
        styles::surface_style()
    };
    ListItem::new(Line::from(spans)).style(line_style)
}

fn footer_line(app: &App) -> Option<Line<'static>> {
    let feed = &app.feed;
    if feed.loading_more() {
        return Some(Line::from(Span::styled(
            "  Loading more…",
            Style::default().fg(styles::MUTED),
        )));
    }
    if feed.has_more() {
        let remaining = feed.total_files() - feed.entries().len();
        return Some(Line::from(vec![
            Span::styled(format!("  {} more ", remaining), Style::default().fg(styles::DIM)),
            Span::styled("[m]", styles::key_hint_style()),
        ]));
    }
    None
}

/// Shorten a file path to fit within `max_width` characters
fn shorten_path(path: &str, max_width: usize) -> String {
    let len = path.chars().count();
    if len <= max_width {
        return path.to_string();
    }

    let (dir, name) = match path.rsplit_once('/') {
        Some((dir, name)) => (dir, name),
        None => ("", path),
    };
    let name_len = name.chars().count();
    if name_len > max_width {
        let truncated: String = name.chars().take(max_width.saturating_sub(1)).collect();
        return format!("{}…", truncated);
    }

    let room = max_width.saturating_sub(name_len + 2);
    if room == 0 || dir.is_empty() {
        return name.to_string();
    }
    let head: String = dir.chars().take(room).collect();
    format!("{}…/{}", head, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_paths_are_kept() {
        assert_eq!(shorten_path("src/main.rs", 30), "src/main.rs");
        assert_eq!(shorten_path("src/main.rs", 11), "src/main.rs");
    }

    #[test]
    fn directory_is_truncated_before_the_name() {
        assert_eq!(shorten_path("src/very/long/nested/main.rs", 16), "src/ver…/main.rs");
    }

    #[test]
    fn long_names_are_cut() {
        assert_eq!(shorten_path("very_long_filename_here.rs", 10), "very_long…");
        assert_eq!(shorten_path("src/main.rs", 0), "…");
    }

    #[test]
    fn name_only_when_no_room_for_directory() {
        assert_eq!(shorten_path("some/dir/main.rs", 9), "main.rs");
    }

    #[test]
    fn scrolling_keeps_selection_visible() {
        assert_eq!(scroll_start(3, 5, 10), 0);
        assert_eq!(scroll_start(50, 100, 10), 45);
        assert_eq!(scroll_start(99, 100, 10), 90);
    }
}
