mod diff_view;
mod file_list;
mod highlight;
mod status_bar;
mod styles;

pub use status_bar::MODES;

use crate::app::App;
use crate::view::NavigationView;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::Frame;

/// Render the entire UI
pub fn draw(f: &mut Frame, app: &App) {
    let bottom_height = status_bar::bottom_bar_height(app, f.area().width);

    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),             // top bar
            Constraint::Min(1),                // main content
            Constraint::Length(bottom_height), // key hints
        ])
        .split(f.area());

    status_bar::render_top_bar(f, outer[0], app);

    match app.navigation_view() {
        NavigationView::Split => {
            let main_area = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([
                    Constraint::Length(app.config.layout.list_width),
                    Constraint::Min(1),
                ])
                .split(outer[1]);

            file_list::render(f, main_area[0], app);
            diff_view::render(f, main_area[1], app);
        }
        NavigationView::List => file_list::render(f, outer[1], app),
        NavigationView::Detail => diff_view::render(f, outer[1], app),
    }

    status_bar::render_bottom_bar(f, outer[2], app);

    if let Some(ref msg) = app.message {
        status_bar::render_notification(f, f.area(), msg);
    }
}
