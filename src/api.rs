//! Amadeus Self-Service client: flight offer search and airport autocomplete.
//!
//! Both calls share the injected [`TokenManager`]. Offer search surfaces typed
//! errors and retries through [`retry::execute`]; airport lookup backs live
//! typing and therefore never fails, it just returns nothing.

use crate::auth::TokenManager;
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::models::{AirportSuggestion, FlightOffer, LocationRecord, SearchQuery};
use crate::retry::{self, RetryPolicy};
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub const OFFERS_PATH: &str = "/v2/shopping/flight-offers";
pub const LOCATIONS_PATH: &str = "/v1/reference-data/locations";

const ADULTS: &str = "1";
const MAX_OFFERS: &str = "10";
const CURRENCY: &str = "USD";
const LOCATION_SUBTYPES: &str = "AIRPORT,CITY";
const MAX_LOCATIONS: &str = "5";

/// Keywords shorter than this never reach the network.
pub const MIN_KEYWORD_CHARS: usize = 2;

pub struct FlightProvider {
    client: Client,
    tokens: Arc<TokenManager>,
    base_url: String,
    search_timeout: Duration,
    lookup_timeout: Duration,
    retry: RetryPolicy,
}

impl FlightProvider {
    pub fn new(client: Client, tokens: Arc<TokenManager>, config: &ApiConfig) -> Self {
        Self {
            client,
            tokens,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            search_timeout: config.search_timeout(),
            lookup_timeout: config.lookup_timeout(),
            retry: RetryPolicy::new(config.max_attempts),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Searches one-way offers for a single adult, priced in USD.
    ///
    /// Inputs are validated before any request. A stale token is refreshed
    /// first; a 401 from the offer endpoint triggers exactly one token refresh
    /// and repeat, and a second 401 is reported as [`ApiError::Authentication`].
    /// A 2xx body without a `data` array is [`ApiError::InvalidResponse`] and is
    /// not retried.
    #[instrument(skip(self))]
    pub async fn search_flights(
        &self,
        origin: &str,
        destination: &str,
        departure_date: &str,
    ) -> Result<Vec<FlightOffer>, ApiError> {
        let query = SearchQuery::new(origin, destination, departure_date)?;

        let offers = retry::execute(&self.retry, || self.search_authorized(&query)).await?;

        info!(
            "Found {} offers {} -> {} on {}",
            offers.len(),
            query.origin,
            query.destination,
            query.date_param()
        );
        Ok(offers)
    }

    async fn search_authorized(&self, query: &SearchQuery) -> Result<Vec<FlightOffer>, ApiError> {
        let token = self.tokens.get_token().await?;
        match self.fetch_offers(&token, query).await {
            Err(err) if err.is_unauthorized() => {
                warn!("Offer search rejected the access token, refreshing once");
                self.tokens.invalidate();
                let token = self.tokens.get_token().await?;
                self.fetch_offers(&token, query).await.map_err(|err| {
                    if err.is_unauthorized() {
                        self.tokens.invalidate();
                        ApiError::authentication(
                            "offer search rejected a freshly issued token",
                            Some(401),
                        )
                    } else {
                        err
                    }
                })
            }
            other => other,
        }
    }

    async fn fetch_offers(
        &self,
        token: &str,
        query: &SearchQuery,
    ) -> Result<Vec<FlightOffer>, ApiError> {
        let date = query.date_param();
        let params = [
            ("originLocationCode", query.origin.as_str()),
            ("destinationLocationCode", query.destination.as_str()),
            ("departureDate", date.as_str()),
            ("adults", ADULTS),
            ("max", MAX_OFFERS),
            ("currencyCode", CURRENCY),
        ];
        let body = self
            .get_json(OFFERS_PATH, token, &params, self.search_timeout)
            .await?;

        data_array(body)?
            .into_iter()
            .enumerate()
            .map(|(i, record)| {
                if !record.is_object() {
                    return Err(ApiError::invalid_response(format!(
                        "offer {} is not an object",
                        i
                    )));
                }
                serde_json::from_value(record).map_err(|e| {
                    ApiError::invalid_response(format!("offer {} is malformed: {}", i, e))
                })
            })
            .collect()
    }

    /// Autocomplete suggestions for `keyword`. Never fails: short keywords and
    /// every upstream problem yield an empty list.
    pub async fn get_airports(&self, keyword: &str) -> Vec<AirportSuggestion> {
        let keyword = keyword.trim();
        if keyword.chars().count() < MIN_KEYWORD_CHARS {
            return Vec::new();
        }

        match self.lookup_airports(keyword).await {
            Ok(suggestions) => suggestions,
            Err(err) => {
                warn!("Airport lookup for '{}' failed: {}", keyword, err);
                Vec::new()
            }
        }
    }

    async fn lookup_airports(&self, keyword: &str) -> Result<Vec<AirportSuggestion>, ApiError> {
        let token = self.tokens.get_token().await?;
        let keyword = keyword.to_uppercase();
        let params = [
            ("subType", LOCATION_SUBTYPES),
            ("keyword", keyword.as_str()),
            ("page[limit]", MAX_LOCATIONS),
        ];

        let body = match self
            .get_json(LOCATIONS_PATH, &token, &params, self.lookup_timeout)
            .await
        {
            Err(err) if err.is_unauthorized() => {
                // Let the next keystroke start with a fresh token.
                self.tokens.invalidate();
                return Err(err);
            }
            other => other?,
        };

        let suggestions = data_array(body)?
            .into_iter()
            .filter_map(|record| serde_json::from_value::<LocationRecord>(record).ok())
            .filter_map(|record| record.to_suggestion())
            .collect::<Vec<_>>();
        debug!("{} airport suggestions for '{}'", suggestions.len(), keyword);
        Ok(suggestions)
    }

    async fn get_json(
        &self,
        path: &str,
        token: &str,
        params: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<Value, ApiError> {
        let res = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .query(params)
            .timeout(timeout)
            .send()
            .await?;

        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            debug!("{} returned {}: {}", path, status, text);
            return Err(ApiError::Http {
                status: status.as_u16(),
                body: serde_json::from_str(&text).ok(),
            });
        }

        serde_json::from_str(&text)
            .map_err(|e| ApiError::invalid_response(format!("{} body is not JSON: {}", path, e)))
    }
}

/// Takes the `data` array out of an API document.
fn data_array(mut body: Value) -> Result<Vec<Value>, ApiError> {
    match body.get_mut("data").map(Value::take) {
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(ApiError::invalid_response("`data` is not an array")),
        None => Err(ApiError::invalid_response("response has no `data` field")),
    }
}
