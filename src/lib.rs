//! Terminal flight search backed by the Amadeus Self-Service API.
//!
//! The API layer ([`api`], [`auth`], [`retry`], [`error`]) is usable on its
//! own; [`app`], [`events`] and [`ui`] are the ratatui front end that drives it.

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod format;
pub mod logging;
pub mod models;
pub mod retry;
pub mod ui;

pub use api::FlightProvider;
pub use auth::{AccessToken, Credentials, TokenManager};
pub use error::{ApiError, ErrorKind};
pub use models::{AirportSuggestion, FlightOffer, SearchQuery};
pub use retry::{RetryClass, RetryPolicy};
