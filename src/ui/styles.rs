use ratatui::style::{Color, Modifier, Style};

use crate::engine::ZoneButton;
use crate::git::FileStatus;

// ── Background colors ──
pub const BG: Color = Color::Rgb(12, 12, 12);
pub const SURFACE: Color = Color::Rgb(20, 20, 20);
pub const PANEL: Color = Color::Rgb(26, 26, 26);
pub const BORDER: Color = Color::Rgb(42, 42, 42);

// ── Text colors ──
pub const TEXT: Color = Color::Rgb(200, 200, 200);
pub const DIM: Color = Color::Rgb(102, 102, 102);
pub const MUTED: Color = Color::Rgb(136, 136, 136);
pub const BRIGHT: Color = Color::Rgb(232, 232, 232);

// ── Accent colors ──
pub const BLUE: Color = Color::Rgb(96, 165, 250);
pub const CYAN: Color = Color::Rgb(34, 211, 238);
pub const GREEN: Color = Color::Rgb(74, 222, 128);
pub const YELLOW: Color = Color::Rgb(250, 204, 21);
pub const RED: Color = Color::Rgb(248, 113, 113);
pub const PURPLE: Color = Color::Rgb(167, 139, 250);

// ── Diff colors ──
pub const ADD_BG: Color = Color::Rgb(16, 62, 40);
pub const ZONE_BG: Color = Color::Rgb(28, 28, 60);
pub const ZONE_FOCUS_BG: Color = Color::Rgb(40, 40, 88);

// ── Composed styles ──

pub fn default_style() -> Style {
    Style::default().fg(TEXT).bg(BG)
}

pub fn surface_style() -> Style {
    Style::default().fg(TEXT).bg(SURFACE)
}

pub fn selected_style() -> Style {
    Style::default().fg(BLUE).bg(Color::Rgb(26, 42, 58))
}

pub fn add_style() -> Style {
    Style::default().fg(TEXT).bg(ADD_BG)
}

pub fn gutter_style() -> Style {
    Style::default().fg(DIM)
}

pub fn key_hint_style() -> Style {
    Style::default().fg(MUTED).add_modifier(Modifier::BOLD)
}

pub fn status_style(status: &FileStatus) -> Style {
    let color = match status {
        FileStatus::Added => GREEN,
        FileStatus::Deleted => RED,
        _ => YELLOW,
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

pub fn zone_style(focused: bool) -> Style {
    let bg = if focused { ZONE_FOCUS_BG } else { ZONE_BG };
    Style::default().fg(PURPLE).bg(bg)
}

/// Zone buttons: the running one is highlighted, disabled ones are dimmed.
pub fn button_style(button: &ZoneButton, zone_bg: Color) -> Style {
    if button.active {
        Style::default()
            .fg(BG)
            .bg(YELLOW)
            .add_modifier(Modifier::BOLD)
    } else if button.disabled {
        Style::default()
            .fg(DIM)
            .bg(zone_bg)
            .add_modifier(Modifier::CROSSED_OUT)
    } else {
        Style::default()
            .fg(BRIGHT)
            .bg(zone_bg)
            .add_modifier(Modifier::BOLD)
    }
}
