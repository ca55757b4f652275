mod config;
mod logging;
mod runtime;
mod state;
mod theme;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use sched_client::{HttpSchedulerClient, Settings};
use sched_core::{DashEvent, Dashboard};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

type Term = Terminal<CrosstermBackend<io::Stdout>>;

#[tokio::main]
async fn main() -> Result<()> {
    let args = config::Args::parse();
    let settings = Settings::load(args.overrides(), args.config.as_deref())
        .context("failed to load configuration")?;
    let log = logging::init_logging(settings.debug, settings.log_dir.as_deref());

    let client_config = settings
        .client_config()
        .context("invalid scheduler connection settings")?;
    let api = HttpSchedulerClient::new(client_config).context("failed to build http client")?;
    info!(
        event = "console_start",
        base_url = %settings.base_url,
        refresh_secs = settings.refresh_secs,
        log_file = ?log.path
    );

    let (runtime, event_rx) = runtime::Runtime::new(Arc::new(api));
    let mut app = state::App::new(
        Dashboard::new(settings.page_size),
        settings.base_url.clone(),
        settings.refresh_secs,
    );
    app.start();

    let mut terminal = setup_terminal()?;
    let result = run_app(
        &mut terminal,
        &mut app,
        &runtime,
        event_rx,
        Duration::from_secs(settings.refresh_secs),
    )
    .await;
    restore_terminal(&mut terminal)?;

    info!(event = "console_stop");
    result
}

fn setup_terminal() -> Result<Term> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Term) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

async fn run_app(
    terminal: &mut Term,
    app: &mut state::App,
    runtime: &runtime::Runtime,
    mut event_rx: mpsc::Receiver<DashEvent>,
    refresh_period: Duration,
) -> Result<()> {
    let mut events = EventStream::new();
    let mut refresh_ticker = tokio::time::interval_at(
        tokio::time::Instant::now() + refresh_period,
        refresh_period,
    );

    loop {
        runtime.dispatch(app.take_commands());
        terminal.draw(|f| ui::render(f, app))?;

        tokio::select! {
            _ = refresh_ticker.tick() => {
                app.on_auto_refresh_tick();
            }
            Some(event) = event_rx.recv() => {
                app.apply_event(event);
            }
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key)))
                        if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) =>
                    {
                        app.handle_key(key);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => return Err(err).context("terminal input failed"),
                    None => break,
                }
            }
        }

        if app.should_quit() {
            break;
        }
    }

    Ok(())
}
