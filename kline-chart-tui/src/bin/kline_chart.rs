//! Kline Chart - live futures candlesticks with Bollinger Bands
//!
//! Loads history from the first reachable REST mirror (or mock bars), then
//! follows the kline stream. Logs go to a file so they never tear the screen.

use std::{
    error::Error,
    fs::OpenOptions,
    io,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use kline_chart_tui::{
    shared::panels::render_view, BandSettings, HistoryLoader, HistoryRequest, Interval,
    RestKlineFetcher, ViewSession, ViewState, ViewerConfig,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use rustls::crypto::ring::default_provider;
use tracing::info;

/// Frame interval for the draw loop
const DRAW_INTERVAL: Duration = Duration::from_millis(50);
/// Live candles applied per frame at most
const MAX_TICKS_PER_FRAME: usize = 256;

type Loader = Arc<HistoryLoader<RestKlineFetcher>>;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Quit,
    Timeframe(Interval),
    Bands(BandSettings),
}

fn command_for_key(code: KeyCode, bands: BandSettings) -> Option<Command> {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => Some(Command::Quit),
        KeyCode::Char('[') => Some(Command::Bands(bands.step_period(-1))),
        KeyCode::Char(']') => Some(Command::Bands(bands.step_period(1))),
        KeyCode::Char('-') => Some(Command::Bands(bands.step_multiplier(-0.1))),
        KeyCode::Char('=') => Some(Command::Bands(bands.step_multiplier(0.1))),
        KeyCode::Char(c) => Interval::from_selector_key(c).map(Command::Timeframe),
        _ => None,
    }
}

fn init_logging(config: &ViewerConfig) -> Result<(), Box<dyn Error>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

/// Replace the running view: old loader and feed are cancelled on drop
fn start_view(loader: &Loader, config: &ViewerConfig, state: &mut ViewState, interval: Interval, bands: BandSettings) -> ViewSession {
    state.reset(interval, bands);
    let request = HistoryRequest::new(state.symbol.clone(), interval).with_limit(config.limit);
    ViewSession::start(Arc::clone(loader), &config.websocket, request)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = default_provider().install_default();

    let config = ViewerConfig::from_env()?;
    init_logging(&config)?;
    info!(
        "Starting kline chart for {} {} ({} mirrors, {} stream hosts)",
        config.symbol,
        config.interval,
        config.rest_mirrors.len(),
        config.websocket.hosts.len()
    );

    let client = reqwest::Client::builder().build()?;
    let loader: Loader = Arc::new(
        HistoryLoader::new(RestKlineFetcher::new(client), config.rest_mirrors.clone())
            .with_timeout(config.rest_timeout),
    );

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut state = ViewState::new(config.symbol.clone(), config.interval, config.bands);
    let mut session = start_view(&loader, &config, &mut state, config.interval, config.bands);
    let mut last_draw = Instant::now();

    let result = loop {
        if event::poll(Duration::from_millis(5))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match command_for_key(key.code, state.bands) {
                        Some(Command::Quit) => break Ok(()),
                        Some(Command::Timeframe(interval)) if interval != state.interval => {
                            info!("Switching timeframe {} -> {}", state.interval, interval);
                            let bands = state.bands;
                            session = start_view(&loader, &config, &mut state, interval, bands);
                        }
                        Some(Command::Bands(bands)) if bands != state.bands => {
                            info!(
                                "Band settings BB({}, {:.1}) -> BB({}, {:.1})",
                                state.bands.period, state.bands.multiplier, bands.period, bands.multiplier
                            );
                            let interval = state.interval;
                            session = start_view(&loader, &config, &mut state, interval, bands);
                        }
                        _ => {}
                    }
                }
            } else {
                // Resize and focus events
                state.mark_dirty();
            }
        }

        if let Some(history) = session.poll_history() {
            state.apply_history(history);
        }
        for _ in 0..MAX_TICKS_PER_FRAME {
            match session.poll_candle() {
                Some(candle) => {
                    state.apply_tick(candle);
                }
                None => break,
            }
        }
        state.set_status(session.status());

        if last_draw.elapsed() >= DRAW_INTERVAL && state.take_dirty() {
            terminal.draw(|f| render_view(f, &mut state))?;
            last_draw = Instant::now();
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    };

    session.cancel();
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}
