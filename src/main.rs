use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cnc_monitor::app::{self, App};
use cnc_monitor::poller::{EventsJob, PollJob, StatusJob};
use cnc_monitor::settings::Overrides;
use cnc_monitor::{events, ui};
use cnc_monitor::{HttpTelemetryClient, Monitor, Settings, StateStore, TelemetryClient};

/// How often the render loop wakes up to pick up new state.
const FRAME_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "cnc-monitor")]
#[command(about = "Terminal dashboard for live CNC machine telemetry")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL of the telemetry API (e.g. http://localhost:8000)
    #[arg(short, long)]
    api_base_url: Option<String>,

    /// Machine to monitor
    #[arg(short, long)]
    machine_id: Option<String>,

    /// Status polling interval (e.g. "1s", "500ms")
    #[arg(long)]
    status_interval: Option<String>,

    /// Events polling interval (e.g. "10s")
    #[arg(long)]
    events_interval: Option<String>,

    /// Number of recent events to request
    #[arg(long)]
    events_limit: Option<usize>,

    /// Data older than this many update intervals is shown as unstable
    #[arg(long)]
    staleness_multiplier: Option<f64>,

    /// What to do when a poll is still running at the next tick ("skip" or "concurrent")
    #[arg(long)]
    overlap: Option<String>,

    /// Write logs to this file (the TUI owns the terminal otherwise)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Fetch status and events once, write them as JSON to this file and exit
    #[arg(short, long)]
    export: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            api_base_url: self.api_base_url.clone(),
            machine_id: self.machine_id.clone(),
            status_interval: self.status_interval.clone(),
            events_interval: self.events_interval.clone(),
            events_limit: self.events_limit,
            staleness_multiplier: self.staleness_multiplier,
            overlap: self.overlap.clone(),
            log_file: self.log_file.clone(),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let settings = Settings::load_with(
        args.config.as_deref(),
        config::Environment::with_prefix(cnc_monitor::settings::ENV_PREFIX),
        args.overrides(),
    )?;

    init_logging(settings.log_file.as_deref(), args.export.is_some())?;

    let client = HttpTelemetryClient::builder()
        .endpoint(settings.api_base_url.clone())
        .timeout(settings.request_timeout)
        .build()
        .context("Failed to build HTTP client")?;
    let client: Arc<dyn TelemetryClient> = Arc::new(client);

    let rt = tokio::runtime::Runtime::new()?;

    // Non-interactive export
    if let Some(export_path) = args.export {
        return rt.block_on(export_once(&settings, client, &export_path));
    }

    // Pollers run on the runtime's worker threads while the TUI owns this one
    let _guard = rt.enter();
    let mut monitor = Monitor::activate(client, &settings);
    let result = run_tui(App::new(monitor.reader(), &settings));
    monitor.deactivate();
    info!("Monitor stopped");

    result
}

/// Install the tracing subscriber.
///
/// In TUI mode logs only go to `log_file`, if one is set. Export mode logs to stderr.
fn init_logging(log_file: Option<&Path>, export_mode: bool) -> Result<()> {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cnc_monitor=info"))
    };

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init();
    } else if export_mode {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(io::stderr)
            .init();
    }

    Ok(())
}

/// Fetch status and events once and write the resulting state.
async fn export_once(
    settings: &Settings,
    client: Arc<dyn TelemetryClient>,
    export_path: &Path,
) -> Result<()> {
    let status = StatusJob::new(
        client.clone(),
        settings.machine_id.clone(),
        settings.staleness_multiplier,
    );
    let events = EventsJob::new(client, settings.machine_id.clone(), settings.events_limit);

    let (status_update, events_update) = tokio::join!(status.run(), events.run());

    let store = StateStore::new();
    store.writer().commit(status_update);
    store.writer().commit(events_update);

    app::write_export(export_path, &settings.machine_id, &store.snapshot())?;
    println!("Exported machine state to: {}", export_path.display());
    Ok(())
}

/// Run the TUI until the user quits
fn run_tui(mut app: App) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Restore the terminal on panic
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic);
    }));

    let result = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    while app.running {
        app.refresh();
        terminal.draw(|frame| ui::draw(frame, app))?;

        if let Some(event) = events::poll_event(FRAME_INTERVAL)? {
            match event {
                Event::Key(key) => events::handle_key_event(app, key),
                Event::Mouse(mouse) => events::handle_mouse_event(app, mouse),
                // Redrawn on the next iteration
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    Ok(())
}
