// main.rs

mod api;
mod app;
mod config;
mod models;
mod parser;
mod session;
mod store;
mod tasks;
mod ui;

use crate::api::{Backend, HttpBackend};
use crate::app::App;
use crate::config::Config;
use crate::session::Session;
use crate::store::TokenStore;
use crate::tasks::TaskList;
use crossterm::{
    event::{self, Event as CEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use dotenv::dotenv;
use ratatui::backend::Backend as TuiBackend;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv().ok();
    init_logging();

    let config = Config::load()?;
    let api = Arc::new(HttpBackend::new(config.base_url.clone())?);
    let store = TokenStore::open()?;

    // Restore the session from the persisted token, if any
    let mut session = Session::new(api.clone(), store);
    session.init().await;

    let tasks = TaskList::new(api.clone());
    let mut app = App::new(session, tasks);
    if app.session.is_authenticated() {
        app.tasks.reload().await;
        app.select_first();
    }

    // Setup terminal UI
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    terminal.hide_cursor()?;

    let res = run_app(&mut terminal, app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}

/// The TUI owns the terminal, so events go to a file instead of stderr;
/// logging is off unless NEXUS_TUI_LOG names one.
fn init_logging() {
    let path = match std::env::var("NEXUS_TUI_LOG") {
        Ok(path) => path,
        Err(_) => return,
    };
    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
    {
        Ok(file) => file,
        Err(err) => {
            eprintln!("could not open log file {}: {}", path, err);
            return;
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .try_init();
}

// Main event loop
async fn run_app<T: TuiBackend, B: Backend>(
    terminal: &mut Terminal<T>,
    mut app: App<B>,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, &mut app))?;

        // Handle input
        if event::poll(Duration::from_millis(100))? {
            if let CEvent::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if app.handle_input(key).await? {
                    return Ok(());
                }
            }
        }
    }
}
