use std::collections::HashSet;

use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Padding, Paragraph, Wrap},
    Frame,
};

use super::highlight::{expand_tabs, Highlighter};
use super::styles;
use crate::app::App;
use crate::engine::{OverlayZone, Readiness};
use crate::feed::DiffEntry;
use crate::git::{DiffFile, LineType};

/// Render the detail pane: the selected file with its overlay rows
pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let Some(entry) = app.selected_entry() else {
        render_message(f, area, "No file selected", "Pick one with j / k");
        return;
    };

    match app.editor.readiness() {
        Readiness::Pending => {
            render_message(f, area, "Preparing editor…", "");
            return;
        }
        Readiness::Failed(err) => {
            render_failure(f, area, &format!("Editor failed to load: {}", err));
            return;
        }
        Readiness::Ready => {}
    }

    let mut lines = vec![header_line(entry, app), Line::from("")];

    if entry.diff.as_ref().is_some_and(|d| d.binary) {
        lines.push(Line::from(Span::styled(
            "  Binary file not shown",
            Style::default().fg(styles::MUTED),
        )));
        f.render_widget(Paragraph::new(lines).block(pane_block()), area);
        return;
    }

    let rows = (area.height as usize).saturating_sub(lines.len());
    lines.extend(buffer_lines(app, entry, rows));

    let mut paragraph = Paragraph::new(lines).block(pane_block());
    if app.editor.host().wrap() {
        paragraph = paragraph.wrap(Wrap { trim: false });
    }
    f.render_widget(paragraph, area);

    render_zone_indicator(f, area, app);
}

fn pane_block() -> Block<'static> {
    Block::default()
        .borders(Borders::NONE)
        .style(Style::default().bg(styles::BG))
        .padding(Padding::new(0, 1, 0, 0))
}

fn header_line<'a>(entry: &'a DiffEntry, app: &App) -> Line<'a> {
    let status_style = entry
        .diff
        .as_ref()
        .map_or_else(|| Style::default().fg(styles::YELLOW), |d| styles::status_style(&d.status));

    let mut spans = vec![
        Span::styled(format!("  {} ", entry.status_symbol()), status_style),
        Span::styled(entry.file.as_str(), Style::default().fg(styles::BRIGHT)),
    ];
    if let Some(original) = entry.original_path() {
        spans.push(Span::styled(
            format!(" ← {}", original),
            Style::default().fg(styles::DIM),
        ));
    }
    spans.push(Span::styled(
        format!("  +{} -{}", entry.additions, entry.deletions),
        Style::default().fg(styles::DIM),
    ));
    if app.show_original {
        spans.push(Span::styled("  [original]", Style::default().fg(styles::CYAN)));
    }
    if app.editor.host().read_only() {
        spans.push(Span::styled("  [read-only]", Style::default().fg(styles::MUTED)));
    }
    Line::from(spans)
}

/// New-file (or old-file) line numbers that the patch changes.
fn changed_lines(diff: Option<&DiffFile>, original: bool) -> HashSet<usize> {
    let Some(diff) = diff else {
        return HashSet::new();
    };
    diff.hunks
        .iter()
        .flat_map(|h| h.lines.iter())
        .filter_map(|line| match (line.line_type, original) {
            (LineType::Add, false) => line.new_num,
            (LineType::Delete, true) => line.old_num,
            _ => None,
        })
        .collect()
}

/// Up to `rows` screen rows of the shown buffer starting at the scroll
/// position, with overlay rows placed before their anchor lines.
fn buffer_lines(app: &App, entry: &DiffEntry, rows: usize) -> Vec<Line<'static>> {
    let Some(buffer) = app.shown_buffer() else {
        return Vec::new();
    };
    let display = &app.config.display;
    let changed = changed_lines(entry.diff.as_ref(), app.show_original);
    let marker_style = if app.show_original {
        Style::default().fg(styles::RED)
    } else {
        Style::default().fg(styles::GREEN)
    };
    // Zones anchor into the modified buffer
    let show_zones = !app.show_original;
    let focused = app.focused_hunk.as_deref();
    let number_width = buffer.line_count().to_string().len().max(3);

    let mut highlighter = app
        .runtime
        .as_deref()
        .map(|runtime| Highlighter::new(runtime, buffer.language()));

    let mut out: Vec<Line<'static>> = Vec::new();
    for (index, text) in buffer.lines().enumerate() {
        let number = index + 1;
        let text = expand_tabs(text, display.tab_width);
        let is_changed = changed.contains(&number);
        let base_style = if is_changed && !app.show_original {
            styles::add_style()
        } else {
            styles::default_style()
        };

        // Earlier lines still go through the highlighter to keep its state
        let content = match highlighter.as_mut() {
            Some(hl) => hl.line(&text, base_style),
            None => vec![Span::styled(text.clone(), base_style)],
        };
        if index < app.scroll {
            continue;
        }
        if out.len() >= rows {
            break;
        }

        if show_zones {
            for zone in app.editor.host().zones_after(index) {
                out.push(zone_line(zone, focused == Some(zone.hunk_id.as_str())));
            }
        }

        let mut spans = Vec::with_capacity(content.len() + 2);
        if display.line_numbers {
            spans.push(Span::styled(
                format!("{:>width$} ", number, width = number_width),
                styles::gutter_style(),
            ));
        }
        spans.push(if is_changed {
            Span::styled(if app.show_original { "-" } else { "+" }, marker_style)
        } else {
            Span::styled(" ", base_style)
        });
        spans.extend(content);
        out.push(Line::from(spans).style(base_style));
    }

    // Zones anchored past the last line
    if show_zones && out.len() < rows {
        for zone in app.editor.host().zones_after(buffer.line_count()) {
            out.push(zone_line(zone, focused == Some(zone.hunk_id.as_str())));
        }
    }
    out
}

/// `+a -d`, leaving out zero parts.
fn count_badge(zone: &OverlayZone) -> Option<String> {
    if !zone.has_counts() {
        return None;
    }
    let mut parts = Vec::new();
    if zone.additions > 0 {
        parts.push(format!("+{}", zone.additions));
    }
    if zone.deletions > 0 {
        parts.push(format!("-{}", zone.deletions));
    }
    Some(parts.join(" "))
}

/// One overlay row: range label, counts, availability and buttons.
fn zone_line(zone: &OverlayZone, focused: bool) -> Line<'static> {
    let style = styles::zone_style(focused);
    let bg = if focused { styles::ZONE_FOCUS_BG } else { styles::ZONE_BG };

    let mut spans = vec![
        Span::styled(
            if focused { " ▶ " } else { "   " },
            style.fg(styles::CYAN),
        ),
        Span::styled(format!("@@ {} @@", zone.range_label), style),
    ];
    if let Some(badge) = count_badge(zone) {
        spans.push(Span::styled(format!("  {}", badge), style.fg(styles::MUTED)));
    }
    if zone.unavailable {
        spans.push(Span::styled(
            "  unavailable",
            style.fg(styles::DIM).add_modifier(Modifier::ITALIC),
        ));
    }
    for button in &zone.buttons {
        spans.push(Span::styled("  ", style));
        spans.push(Span::styled(
            format!("[{}] {}", button.kind.key(), button.kind.label()),
            styles::button_style(button, bg),
        ));
    }
    Line::from(spans).style(style)
}

/// "Hunk i/N" in the top-right corner
fn render_zone_indicator(f: &mut Frame, area: Rect, app: &App) {
    let zones = app.editor.zones();
    if zones.is_empty() || app.show_original {
        return;
    }
    let text = match app
        .focused_hunk
        .as_deref()
        .and_then(|id| zones.iter().position(|z| z.hunk_id == id))
    {
        Some(i) => format!("Hunk {}/{}", i + 1, zones.len()),
        None => format!("{} hunks", zones.len()),
    };
    let width = text.chars().count() as u16 + 2;
    let indicator_area = Rect {
        x: area.x + area.width.saturating_sub(width + 1),
        y: area.y,
        width: width.min(area.width),
        height: 1,
    };
    let indicator = Paragraph::new(Line::from(Span::styled(
        text,
        Style::default().fg(styles::MUTED),
    )))
    .alignment(Alignment::Right);
    f.render_widget(indicator, indicator_area);
}

fn render_message(f: &mut Frame, area: Rect, title: &str, hint: &str) {
    let text = Paragraph::new(vec![
        Line::from(""),
        Line::from(""),
        Line::from(Span::styled(
            format!("  {}", title),
            Style::default().fg(styles::MUTED),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!("  {}", hint),
            Style::default().fg(styles::DIM),
        )),
    ])
    .block(pane_block());
    f.render_widget(text, area);
}

fn render_failure(f: &mut Frame, area: Rect, message: &str) {
    let text = Paragraph::new(vec![
        Line::from(""),
        Line::from(""),
        Line::from(Span::styled(
            format!("  {}", message),
            Style::default().fg(styles::RED),
        )),
    ])
    .block(pane_block())
    .wrap(Wrap { trim: false });
    f.render_widget(text, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HrConfig;
    use crate::engine::{DiffRequest, HunkAction, HunkActionKind, ZoneButton};
    use crate::git::{parse_diff, DiffMode};

    fn zone(additions: usize, deletions: usize) -> OverlayZone {
        OverlayZone {
            hunk_id: "1".into(),
            anchor_line: 3,
            after_line: 2,
            height: 1,
            range_label: "-2,1 +3,2".into(),
            additions,
            deletions,
            unavailable: false,
            buttons: vec![ZoneButton {
                kind: HunkActionKind::Stage,
                active: false,
                disabled: false,
            }],
        }
    }

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn badge_skips_zero_parts() {
        assert_eq!(count_badge(&zone(2, 1)).as_deref(), Some("+2 -1"));
        assert_eq!(count_badge(&zone(2, 0)).as_deref(), Some("+2"));
        assert_eq!(count_badge(&zone(0, 3)).as_deref(), Some("-3"));
        assert_eq!(count_badge(&zone(0, 0)), None);
    }

    #[test]
    fn zone_row_shows_label_counts_and_buttons() {
        let row = text(&zone_line(&zone(2, 1), true));
        assert!(row.starts_with(" ▶ @@ -2,1 +3,2 @@"));
        assert!(row.contains("+2 -1"));
        assert!(row.contains("[s] Stage"));
        assert!(!row.contains("unavailable"));

        let mut unavailable = zone(0, 0);
        unavailable.unavailable = true;
        let row = text(&zone_line(&unavailable, false));
        assert!(row.starts_with("   @@"));
        assert!(row.contains("unavailable"));
    }

    fn rendered_app() -> (tempfile::TempDir, App, DiffEntry) {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::assemble(
            dir.path().to_string_lossy().into_owned(),
            HrConfig::default(),
            DiffMode::Unstaged,
            None,
            None,
        );
        app.editor.mark_ready();
        app.editor.sync(&DiffRequest {
            path: "a.txt".into(),
            original_text: "o1\no2".into(),
            modified_text: "l1\nl2\nl3\nl4\nl5".into(),
            original_path: None,
        });
        app.editor.set_hunk_actions(vec![
            HunkAction {
                id: "1".into(),
                old_start: 1,
                old_count: 1,
                new_start: 2,
                new_count: 1,
                ..Default::default()
            },
            // Stale anchor far past the end of the buffer
            HunkAction {
                id: "2".into(),
                anchor_line: Some(99),
                old_start: 4,
                old_count: 1,
                new_start: 5,
                ..Default::default()
            },
        ]);
        app.editor.flush();

        let entry = DiffEntry {
            file: "a.txt".into(),
            additions: 1,
            deletions: 2,
            before: "o1\no2".into(),
            after: "l1\nl2\nl3\nl4\nl5".into(),
            diff: None,
            meta: None,
        };
        (dir, app, entry)
    }

    fn rendered(app: &App, entry: &DiffEntry, rows: usize) -> Vec<String> {
        buffer_lines(app, entry, rows).iter().map(text).collect()
    }

    fn is_zone(row: &str) -> bool {
        row.starts_with("   @@") || row.starts_with(" ▶ @@")
    }

    #[test]
    fn zone_rows_sit_before_their_anchor_lines() {
        let (_dir, app, entry) = rendered_app();
        let rows = rendered(&app, &entry, 20);

        assert_eq!(rows.len(), 7);
        assert!(rows[0].ends_with("l1"));
        assert!(is_zone(&rows[1]) && rows[1].contains("-1,1 +2,1"));
        assert!(rows[2].ends_with("l2"));
        assert!(rows[5].ends_with("l5"));
        // Clamped past the last line, so it follows it
        assert!(is_zone(&rows[6]) && rows[6].contains("-4,1 +5,0"));
    }

    #[test]
    fn scrolled_past_zones_are_skipped() {
        let (_dir, mut app, entry) = rendered_app();
        app.scroll = 2;
        let rows = rendered(&app, &entry, 20);

        assert_eq!(rows.len(), 4);
        assert!(rows[0].ends_with("l3"));
        assert_eq!(rows.iter().filter(|r| is_zone(r)).count(), 1);
        assert!(rows[3].contains("-4,1 +5,0"));
    }

    #[test]
    fn rows_stop_at_the_viewport() {
        let (_dir, app, entry) = rendered_app();
        let rows = rendered(&app, &entry, 3);
        assert_eq!(rows.len(), 3);
        assert!(rows[2].ends_with("l2"));
    }

    #[test]
    fn original_buffer_has_no_zone_rows() {
        let (_dir, mut app, entry) = rendered_app();
        app.show_original = true;
        let rows = rendered(&app, &entry, 20);

        assert_eq!(rows.len(), 2);
        assert!(rows[0].ends_with("o1"));
        assert!(rows.iter().all(|r| !is_zone(r)));
    }

    #[test]
    fn changed_lines_follow_the_shown_side() {
        let raw = "diff --git a/a b/a\n--- a/a\n+++ b/a\n@@ -1,2 +1,2 @@\n x\n-y\n+z\n";
        let file = parse_diff(raw).remove(0);
        assert_eq!(changed_lines(Some(&file), false), HashSet::from([2]));
        assert_eq!(changed_lines(Some(&file), true), HashSet::from([2]));
        assert!(changed_lines(None, false).is_empty());
    }
}
