use color_eyre::Result;
use ratatui::{backend::CrosstermBackend, Terminal};
use skyfare_tui::{
    app::{Action, App},
    config::Config,
    events::{Event, EventHandler},
    logging, ui, Credentials, FlightProvider, TokenManager,
};
use std::{io, sync::Arc, time::Instant};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Instrumentation and safety
    let _log_guard = logging::initialize_logging(logging::LOG_DIR);
    // eyre's hook first, so the terminal-restoring hook wraps it
    color_eyre::install()?;
    install_panic_hook();

    if dotenv::dotenv().is_err() {
        info!("No .env file found; reading credentials from the environment only");
    }
    let config = Config::load();
    let credentials = Credentials::from_env();
    if !credentials.is_configured() {
        warn!("Amadeus credentials missing; searches will fail with an authentication error");
    }

    // One HTTP client and one token cache for the whole process
    let http = reqwest::Client::builder()
        .user_agent(concat!("skyfare-tui/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let tokens = Arc::new(TokenManager::new(
        http.clone(),
        &config.api.base_url,
        credentials,
    ));
    let provider = Arc::new(FlightProvider::new(http, tokens, &config.api));

    // Ready terminal and state
    let mut terminal = setup_terminal()?;
    let mut app = App::new(&config.ui);
    let mut events = EventHandler::new(config.ui.tick_rate_ms);

    while !app.should_quit {
        terminal.draw(|f| ui::render(f, &app))?;

        let Some(event) = events.next().await else {
            break;
        };
        let action = match event {
            Event::Tick => app.on_tick(Instant::now()),
            Event::Input(key) => app.handle_key(key),
            Event::SearchFinished { id, result } => {
                app.on_search_result(id, result);
                None
            }
            Event::Suggestions {
                field,
                keyword,
                items,
            } => {
                app.on_suggestions(field, &keyword, items);
                None
            }
        };
        if let Some(action) = action {
            dispatch(action, &provider, &events.tx);
        }
    }

    restore_terminal(terminal)?;
    Ok(())
}

/// Runs API work off the UI loop; each search retries independently.
fn dispatch(action: Action, provider: &Arc<FlightProvider>, tx: &UnboundedSender<Event>) {
    let provider = Arc::clone(provider);
    let tx = tx.clone();
    match action {
        Action::Search {
            id,
            origin,
            destination,
            date,
        } => {
            tokio::spawn(async move {
                let result = provider.search_flights(&origin, &destination, &date).await;
                let _ = tx.send(Event::SearchFinished { id, result });
            });
        }
        Action::Lookup { field, keyword } => {
            tokio::spawn(async move {
                let items = provider.get_airports(&keyword).await;
                let _ = tx.send(Event::Suggestions {
                    field,
                    keyword,
                    items,
                });
            });
        }
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), crossterm::terminal::LeaveAlternateScreen, crossterm::cursor::Show)?;
    Ok(())
}

fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        // Force terminal cleanup!
        crossterm::terminal::disable_raw_mode().ok();
        crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen, crossterm::cursor::Show).ok();
        original_hook(panic_info);
    }));
}
