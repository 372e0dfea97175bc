//! squint - SLURM queue monitor.

mod logging;

use clap::Parser;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use miette::{IntoDiagnostic, Result};
use ratatui::prelude::*;
use squint_cli::{Args, ThemeChoice};
use squint_core::{
    ClusterSession, Connector, LocalConnector, SessionConfig, SshConnector, SshSettings, SshTarget,
};
use squint_monitor::{App, Theme};
use std::io::{self, Stdout};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

type Tui = Terminal<CrosstermBackend<Stdout>>;

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = logging::init(args.log_file.as_deref())?;
    tracing::info!("squint {} starting", env!("CARGO_PKG_VERSION"));

    let connector: Arc<dyn Connector> = match &args.ssh {
        Some(target) => Arc::new(SshConnector::new(
            SshTarget::parse(target).into_diagnostic()?,
            SshSettings::default(),
        )),
        None => Arc::new(LocalConnector::new()),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("squint-worker")
        .build()
        .into_diagnostic()?;

    let session = ClusterSession::new(
        runtime.handle().clone(),
        connector,
        SessionConfig::with_refresh_interval(Duration::from_secs(args.refresh_interval)),
    );
    let theme = match args.theme {
        ThemeChoice::Dark => Theme::dark(),
        ThemeChoice::Light => Theme::light(),
    };
    let mut app = App::new(session, theme);

    // Setup terminal
    enable_raw_mode().into_diagnostic()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).into_diagnostic()?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).into_diagnostic()?;

    // Run the main loop
    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode().into_diagnostic()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).into_diagnostic()?;
    terminal.show_cursor().into_diagnostic()?;

    res.into_diagnostic()?;
    if let Some(message) = app.fatal_error() {
        return Err(miette::miette!("{}", message));
    }

    tracing::info!("squint exiting");
    Ok(())
}

/// Main application loop.
fn run_app(terminal: &mut Tui, app: &mut App) -> io::Result<()> {
    let tick_rate = Duration::from_millis(100);

    loop {
        app.on_tick();
        terminal.draw(|frame| app.render(frame))?;
        app.poll_events(tick_rate)?;

        if let Some(argv) = app.take_pending_attach() {
            let program = argv.first().cloned().unwrap_or_default();
            match run_attached(terminal, &argv) {
                Ok(status) if status.success() => app.set_status("Detached", false),
                Ok(status) => app.set_status(format!("{} exited with {}", program, status), true),
                Err(e) => app.set_status(format!("Cannot run {}: {}", program, e), true),
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

/// Hand the terminal to an interactive command, then take it back.
fn run_attached(terminal: &mut Tui, argv: &[String]) -> io::Result<std::process::ExitStatus> {
    let Some((program, args)) = argv.split_first() else {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty command"));
    };
    tracing::info!("Attaching: {}", argv.join(" "));

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    let status = Command::new(program).args(args).status();

    enable_raw_mode()?;
    execute!(terminal.backend_mut(), EnterAlternateScreen)?;
    terminal.clear()?;
    status
}
