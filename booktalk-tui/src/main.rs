//! booktalk - book-companion assistant chat client
//!
//! Terminal UI for conversing with the assistant: message timeline, streamed
//! progress, active-book banner, and spoken-reply playback.

mod app;
mod ui;

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use booktalk_core::{
    ChatClient, Config, NullSink, PlaybackController, RodioSink, SessionOrchestrator,
};
use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;

use crate::app::{App, AppCommand};

#[derive(Parser)]
#[command(name = "booktalk", about = "Chat with the book-companion assistant")]
struct Cli {
    /// Path to a config file (default: $XDG_CONFIG_HOME/booktalk/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the assistant server base URL
    #[arg(long)]
    server: Option<String>,

    /// Disable spoken-reply playback
    #[arg(long)]
    no_audio: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path).context("failed to load configuration")?,
        None => Config::load().context("failed to load configuration")?,
    };
    if let Some(server) = cli.server {
        config.server.base_url = server;
        config.server.validate().context("invalid --server URL")?;
    }

    // Initialize logging (to file, not stdout since we have a TUI)
    let _log_guard = booktalk_core::logging::init(&config.logging)
        .context("failed to initialize logging")?;

    tracing::info!(server = %config.server.base_url, "booktalk TUI starting up");

    // The rodio output stream is not Send; it must live here on the main
    // thread for as long as anything might play through its handle.
    let audio_enabled = config.audio.enabled && !cli.no_audio;
    let (_stream, playback) = build_playback(audio_enabled, &config.server.base_url);

    let transport =
        ChatClient::new(config.server.clone()).context("failed to build transport client")?;
    let session = SessionOrchestrator::new(transport, playback.clone(), config.server.streaming);
    let snapshots = session.subscribe();

    // Drive the session on a worker thread with its own runtime; the UI
    // thread stays sync and reads snapshots through the watch channel.
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let driver = std::thread::spawn(move || drive_session(session, commands_rx));

    // Setup terminal
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal")?;

    let mut app = App::new(commands_tx, snapshots, playback);
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;

    app.shutdown();
    if driver.join().is_err() {
        tracing::error!("session driver thread panicked");
    }

    tracing::info!("booktalk TUI shutting down");

    result
}

/// Build the playback controller, falling back to a silent sink when audio
/// is disabled or no output device exists.
fn build_playback(
    enabled: bool,
    base_url: &str,
) -> (Option<rodio::OutputStream>, PlaybackController) {
    if enabled {
        match rodio::OutputStream::try_default() {
            Ok((stream, handle)) => {
                let controller =
                    PlaybackController::new(Box::new(RodioSink::new(handle)), base_url);
                return (Some(stream), controller);
            }
            Err(e) => {
                tracing::warn!(error = %e, "no audio output device; playback disabled");
            }
        }
    }
    (None, PlaybackController::new(Box::new(NullSink), base_url))
}

/// Run the session orchestrator until the command channel closes.
fn drive_session(
    mut session: SessionOrchestrator<ChatClient>,
    mut commands: mpsc::UnboundedReceiver<AppCommand>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "failed to build driver runtime");
            return;
        }
    };

    runtime.block_on(async move {
        let mut tick = tokio::time::interval(std::time::Duration::from_millis(250));
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(AppCommand::Submit(text)) => session.submit_text(&text).await,
                    Some(AppCommand::ExitBookMode) => session.exit_book_mode(),
                    Some(AppCommand::StopAudio) => session.stop_audio(),
                    None => break,
                },
                _ = tick.tick() => session.poll_playback(),
            }
        }
    });
}

/// Run the main UI loop.
fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        app.refresh();

        terminal.draw(|frame| ui::render(frame, app))?;

        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key);
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
