//! Event types and the input/tick driver for the search UI.
//!
//! Key presses and ticks come from a blocking crossterm poller; API results
//! come from tasks spawned by `main.rs`, which post back through
//! [`EventHandler::tx`]. Everything funnels into one channel drained by the
//! main loop.

use crate::app::Field;
use crate::error::ApiError;
use crate::models::{AirportSuggestion, FlightOffer};
use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::error;

/// Events processed by the application event loop.
pub enum Event {
    /// Periodic tick; drives autocomplete debouncing.
    Tick,
    /// User key press from the terminal.
    Input(KeyEvent),
    /// An offer search finished. `id` identifies the search that produced it.
    SearchFinished {
        id: u64,
        result: Result<Vec<FlightOffer>, ApiError>,
    },
    /// Autocomplete results for `keyword` typed into `field`.
    Suggestions {
        field: Field,
        keyword: String,
        items: Vec<AirportSuggestion>,
    },
}

/// Multiplexes terminal input, ticks and API completions into a single stream.
pub struct EventHandler {
    /// Sender for posting events from API tasks.
    pub tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
    /// Creates the channel and starts the input/tick poller.
    ///
    /// The poller runs on the blocking pool because crossterm's `poll` blocks.
    /// It stops when the terminal can no longer be read or when the receiver
    /// is dropped.
    pub fn new(tick_rate_ms: u64) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let event_tx = tx.clone();

        tokio::task::spawn_blocking(move || {
            let tick_rate = Duration::from_millis(tick_rate_ms);
            let mut last_tick = Instant::now();
            loop {
                let timeout = tick_rate
                    .checked_sub(last_tick.elapsed())
                    .unwrap_or(Duration::from_secs(0));
                match event::poll(timeout) {
                    Ok(true) => match event::read() {
                        Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                            if event_tx.send(Event::Input(key)).is_err() {
                                return;
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!("Terminal read failed: {}", e);
                            return;
                        }
                    },
                    Ok(false) => {}
                    Err(e) => {
                        error!("Terminal poll failed: {}", e);
                        return;
                    }
                }
                if last_tick.elapsed() >= tick_rate {
                    if event_tx.send(Event::Tick).is_err() {
                        return;
                    }
                    last_tick = Instant::now();
                }
            }
        });

        Self { tx, rx }
    }

    /// Receives the next event, or `None` once every sender is gone.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}
