mod app;
mod config;
mod engine;
mod feed;
mod git;
mod ui;
mod view;
mod watch;

use std::fs::OpenOptions;
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use app::{App, Options};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use engine::HunkActionKind;
use git::DiffMode;
use ratatui::prelude::*;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// Terminal UI for reviewing git changes hunk by hunk
#[derive(Parser)]
#[command(name = "hr", version, about)]
struct Cli {
    /// Path inside the repository to review (defaults to current directory)
    path: Option<PathBuf>,

    /// Which changes to show
    #[arg(long, value_enum, default_value_t = DiffMode::Unstaged)]
    mode: DiffMode,

    /// Base ref for branch mode (auto-detected when omitted)
    #[arg(long)]
    base: Option<String>,

    /// Don't re-fetch when files change
    #[arg(long)]
    no_watch: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let path = cli.path.unwrap_or_else(|| PathBuf::from("."));

    if cli.print_config {
        let dir = std::fs::canonicalize(&path)
            .with_context(|| format!("Path not found: {}", path.display()))?;
        let repo_root = git::get_repo_root_in(&dir)?;
        print!("{}", config::render_config(&config::load_config(&repo_root))?);
        return Ok(());
    }

    let mut app = App::new(Options {
        path,
        mode: cli.mode,
        base: cli.base,
        watch: !cli.no_watch,
    })?;

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app);

    // Cleanup
    app.shutdown();
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = result {
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}

/// Log to `$HR_LOG` or `<cache dir>/hr/hr.log`; stdout belongs to the TUI.
fn init_logging() {
    let Some(path) = std::env::var_os("HR_LOG")
        .map(PathBuf::from)
        .or_else(|| dirs::cache_dir().map(|dir| dir.join("hr").join("hr.log")))
    else {
        return;
    };
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| {
            app.set_viewport_width(f.area().width);
            ui::draw(f, app);
        })?;

        // Poll for events with a timeout so background results keep flowing
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    let half_page = usize::from(terminal.size()?.height / 2).max(1);
                    handle_key(app, key, half_page);
                }
            }
        }

        // One loop iteration is one scheduling tick
        app.tick();

        if app.should_quit {
            return Ok(());
        }
    }
}

fn handle_key(app: &mut App, key: KeyEvent, half_page: usize) {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => app.should_quit = true,
            KeyCode::Char('d') => app.scroll_down(half_page),
            KeyCode::Char('u') => app.scroll_up(half_page),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Files
        KeyCode::Char('j') | KeyCode::Down => app.next_file(),
        KeyCode::Char('k') | KeyCode::Up => app.prev_file(),
        KeyCode::Enter | KeyCode::Char('l') => app.open_detail(),
        KeyCode::Esc | KeyCode::Char('h') => app.back_to_list(),

        // Hunks
        KeyCode::Char('n') => app.next_zone(),
        KeyCode::Char('N') => app.prev_zone(),
        KeyCode::Char('s') => app.click(HunkActionKind::Stage),
        KeyCode::Char('u') => app.click(HunkActionKind::Unstage),
        KeyCode::Char('d') => app.click(HunkActionKind::Discard),

        // View
        KeyCode::Char('w') => app.toggle_wrap(),
        KeyCode::Char('b') => app.toggle_original(),
        KeyCode::PageDown => app.scroll_down(half_page),
        KeyCode::PageUp => app.scroll_up(half_page),

        // Feed
        KeyCode::Char(c @ '1'..='3') => {
            let index = usize::from(c as u8 - b'1');
            app.set_mode(ui::MODES[index]);
        }
        KeyCode::Char('r') => {
            app.refresh();
            app.notify("Refreshing…");
        }
        KeyCode::Char('m') => app.load_more(),

        _ => {}
    }
}
