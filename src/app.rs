use crate::api::MIN_KEYWORD_CHARS;
use crate::config::UiConfig;
use crate::error::ApiError;
use crate::format::duration_minutes;
use crate::models::{AirportSuggestion, FlightOffer};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::cmp::Ordering;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Slider ceiling when there are no parsable prices.
pub const DEFAULT_MAX_PRICE: f64 = 5000.0;
pub const PRICE_STEP: f64 = 50.0;
const MAX_INPUT_CHARS: usize = 32;

pub const NO_FLIGHTS_MESSAGE: &str =
    "No flights found for this route. Try different dates or airports.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Origin,
    Destination,
    Date,
    Results,
}

impl Field {
    fn next(self) -> Self {
        match self {
            Field::Origin => Field::Destination,
            Field::Destination => Field::Date,
            Field::Date => Field::Results,
            Field::Results => Field::Origin,
        }
    }

    fn prev(self) -> Self {
        match self {
            Field::Origin => Field::Results,
            Field::Destination => Field::Origin,
            Field::Date => Field::Destination,
            Field::Results => Field::Date,
        }
    }

    pub fn is_airport(self) -> bool {
        matches!(self, Field::Origin | Field::Destination)
    }
}

#[derive(Debug, Default, PartialEq, Clone, Copy)]
pub enum SortBy {
    #[default]
    Price,
    Duration,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ThemeMode {
    Dark,
    Light,
}

impl ThemeMode {
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("light") {
            ThemeMode::Light
        } else {
            ThemeMode::Dark
        }
    }

    fn toggled(self) -> Self {
        match self {
            ThemeMode::Dark => ThemeMode::Light,
            ThemeMode::Light => ThemeMode::Dark,
        }
    }
}

/// Work the main loop should start on the app's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Search {
        id: u64,
        origin: String,
        destination: String,
        date: String,
    },
    Lookup {
        field: Field,
        keyword: String,
    },
}

pub struct App {
    pub focus: Field,
    pub origin: String,
    pub destination: String,
    pub date: String,

    // Autocomplete popup for the focused airport field
    pub suggestions: Vec<AirportSuggestion>,
    pub suggestion_index: usize,

    // Raw offers from the last successful search
    pub flights: Vec<FlightOffer>,
    pub loading: bool,
    pub error: Option<String>,
    pub max_price: f64,
    pub price_ceiling: f64,
    pub sort_by: SortBy,
    pub selected_index: usize,

    pub theme: ThemeMode,
    pub should_quit: bool,
    pub tick_count: usize,

    debounce: Duration,
    last_edit: Option<Instant>,
    last_lookup: Option<(Field, String)>,
    search_id: u64,
}

impl App {
    pub fn new(config: &UiConfig) -> Self {
        Self {
            focus: Field::Origin,
            origin: String::new(),
            destination: String::new(),
            date: String::new(),
            suggestions: Vec::new(),
            suggestion_index: 0,
            flights: Vec::new(),
            loading: false,
            error: None,
            max_price: config.default_max_price,
            price_ceiling: config.default_max_price,
            sort_by: SortBy::default(),
            selected_index: 0,
            theme: ThemeMode::from_name(&config.theme),
            should_quit: false,
            tick_count: 0,
            debounce: Duration::from_millis(config.debounce_ms),
            last_edit: None,
            last_lookup: None,
            search_id: 0,
        }
    }

    /// Offers passing the price filter, in the selected order.
    pub fn visible_flights(&self) -> Vec<&FlightOffer> {
        let mut result: Vec<&FlightOffer> = self
            .flights
            .iter()
            .filter(|f| f.total_price().is_some_and(|p| p <= self.max_price))
            .collect();

        match self.sort_by {
            SortBy::Price => result.sort_by(|a, b| {
                a.total_price()
                    .partial_cmp(&b.total_price())
                    .unwrap_or(Ordering::Equal)
            }),
            // Unknown durations sort last
            SortBy::Duration => result.sort_by_key(|f| {
                f.duration()
                    .and_then(duration_minutes)
                    .unwrap_or(u32::MAX)
            }),
        }
        result
    }

    pub fn suggestions_open(&self) -> bool {
        self.focus.is_airport() && !self.suggestions.is_empty()
    }

    pub fn field_text(&self, field: Field) -> &str {
        match field {
            Field::Origin => &self.origin,
            Field::Destination => &self.destination,
            Field::Date => &self.date,
            Field::Results => "",
        }
    }

    fn field_text_mut(&mut self, field: Field) -> Option<&mut String> {
        match field {
            Field::Origin => Some(&mut self.origin),
            Field::Destination => Some(&mut self.destination),
            Field::Date => Some(&mut self.date),
            Field::Results => None,
        }
    }

    /// Fires the debounced airport lookup once typing has paused.
    pub fn on_tick(&mut self, now: Instant) -> Option<Action> {
        self.tick_count += 1;

        let edited = self.last_edit?;
        if now.saturating_duration_since(edited) < self.debounce {
            return None;
        }
        self.last_edit = None;

        let field = self.focus;
        if !field.is_airport() {
            return None;
        }
        let keyword = self.field_text(field).trim().to_string();
        if keyword.chars().count() < MIN_KEYWORD_CHARS {
            self.suggestions.clear();
            return None;
        }
        if self.last_lookup.as_ref() == Some(&(field, keyword.clone())) {
            return None;
        }
        self.last_lookup = Some((field, keyword.clone()));
        Some(Action::Lookup { field, keyword })
    }

    /// Applies autocomplete results unless the user has moved on.
    pub fn on_suggestions(&mut self, field: Field, keyword: &str, items: Vec<AirportSuggestion>) {
        if field != self.focus || self.field_text(field).trim() != keyword {
            return;
        }
        self.suggestions = items;
        self.suggestion_index = 0;
    }

    pub fn on_search_result(&mut self, id: u64, result: Result<Vec<FlightOffer>, ApiError>) {
        if id != self.search_id {
            // A newer search superseded this one.
            return;
        }
        self.loading = false;

        match result {
            Ok(offers) if offers.is_empty() => {
                self.flights.clear();
                self.error = Some(NO_FLIGHTS_MESSAGE.to_string());
            }
            Ok(offers) => {
                info!("Showing {} offers", offers.len());
                self.price_ceiling = calculate_max_price(&offers);
                self.max_price = self.price_ceiling;
                self.flights = offers;
                self.selected_index = 0;
                self.focus = Field::Results;
                self.error = None;
            }
            Err(err) => {
                error!("[Flight Search] {} (kind {:?})", err, err.kind());
                self.flights.clear();
                self.error = Some(err.user_message());
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Action> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => self.should_quit = true,
            KeyCode::Char('t') if ctrl => self.theme = self.theme.toggled(),
            KeyCode::Esc if self.suggestions_open() => self.suggestions.clear(),
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab => self.move_focus(self.focus.next()),
            KeyCode::BackTab => self.move_focus(self.focus.prev()),
            _ if self.focus == Field::Results => self.handle_results_key(key.code),
            _ => return self.handle_form_key(key.code),
        }
        None
    }

    fn handle_form_key(&mut self, code: KeyCode) -> Option<Action> {
        match code {
            KeyCode::Enter if self.suggestions_open() => {
                self.accept_suggestion();
                None
            }
            KeyCode::Enter => Some(self.start_search()),
            KeyCode::Down if self.suggestions_open() => {
                self.suggestion_index = (self.suggestion_index + 1) % self.suggestions.len();
                None
            }
            KeyCode::Up if self.suggestions_open() => {
                self.suggestion_index = self
                    .suggestion_index
                    .checked_sub(1)
                    .unwrap_or(self.suggestions.len() - 1);
                None
            }
            KeyCode::Backspace => {
                let field = self.focus;
                if let Some(text) = self.field_text_mut(field) {
                    text.pop();
                }
                self.mark_edited();
                None
            }
            KeyCode::Char(c) => {
                let field = self.focus;
                let accepted = match field {
                    Field::Date => c.is_ascii_digit() || c == '-',
                    _ => c.is_alphanumeric() || c == ' ',
                };
                if let Some(text) = self.field_text_mut(field) {
                    if accepted && text.chars().count() < MAX_INPUT_CHARS {
                        text.push(c);
                    }
                }
                self.mark_edited();
                None
            }
            _ => None,
        }
    }

    fn handle_results_key(&mut self, code: KeyCode) {
        let count = self.visible_flights().len();
        match code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Down | KeyCode::Char('j') => {
                if count > 0 {
                    self.selected_index = (self.selected_index + 1) % count;
                }
            }
            KeyCode::Up | KeyCode::Char('k') => {
                if count > 0 {
                    self.selected_index = self.selected_index.checked_sub(1).unwrap_or(count - 1);
                }
            }
            KeyCode::Char('s') => {
                self.sort_by = match self.sort_by {
                    SortBy::Price => SortBy::Duration,
                    SortBy::Duration => SortBy::Price,
                };
                self.selected_index = 0;
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.max_price = (self.max_price + PRICE_STEP).min(self.price_ceiling);
            }
            KeyCode::Char('-') => {
                self.max_price = (self.max_price - PRICE_STEP).max(0.0);
                self.selected_index = 0;
            }
            KeyCode::Char('t') => self.theme = self.theme.toggled(),
            _ => {}
        }
    }

    fn move_focus(&mut self, field: Field) {
        self.focus = field;
        self.suggestions.clear();
        self.last_edit = None;
    }

    fn mark_edited(&mut self) {
        if self.focus.is_airport() {
            self.last_edit = Some(Instant::now());
        }
    }

    fn accept_suggestion(&mut self) {
        let Some(choice) = self.suggestions.get(self.suggestion_index).cloned() else {
            return;
        };
        let field = self.focus;
        if let Some(text) = self.field_text_mut(field) {
            *text = choice.code.clone();
        }
        // Don't look the chosen code up again.
        self.last_lookup = Some((field, choice.code));
        self.last_edit = None;
        self.suggestions.clear();
        self.move_focus(field.next());
    }

    fn start_search(&mut self) -> Action {
        self.search_id += 1;
        self.loading = true;
        self.error = None;
        self.suggestions.clear();
        Action::Search {
            id: self.search_id,
            origin: self.origin.clone(),
            destination: self.destination.clone(),
            date: self.date.clone(),
        }
    }
}

/// Rounded-up highest parsable price, or [`DEFAULT_MAX_PRICE`].
pub fn calculate_max_price(flights: &[FlightOffer]) -> f64 {
    flights
        .iter()
        .filter_map(FlightOffer::total_price)
        .fold(None, |max: Option<f64>, p| Some(max.map_or(p, |m| m.max(p))))
        .map(f64::ceil)
        .unwrap_or(DEFAULT_MAX_PRICE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Itinerary, Price};

    fn offer(total: &str, duration: Option<&str>) -> FlightOffer {
        FlightOffer {
            price: Price {
                total: total.to_string(),
                currency: "USD".to_string(),
            },
            itineraries: vec![Itinerary {
                duration: duration.map(str::to_string),
                segments: Vec::new(),
            }],
            ..Default::default()
        }
    }

    fn press(app: &mut App, code: KeyCode) -> Option<Action> {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn app() -> App {
        App::new(&UiConfig::default())
    }

    #[test]
    fn test_calculate_max_price() {
        assert_eq!(calculate_max_price(&[]), DEFAULT_MAX_PRICE);
        assert_eq!(
            calculate_max_price(&[offer("450.00", None), offer("612.40", None)]),
            613.0
        );
        assert_eq!(calculate_max_price(&[offer("n/a", None)]), DEFAULT_MAX_PRICE);
    }

    #[test]
    fn test_filter_and_sort() {
        let mut app = app();
        app.flights = vec![
            offer("900.00", Some("PT7H")),
            offer("450.00", Some("PT10H30M")),
            offer("garbage", Some("PT1H")),
            offer("612.40", Some("PT9H")),
        ];
        app.max_price = 700.0;

        let prices: Vec<_> = app.visible_flights().iter().map(|f| f.price.total.clone()).collect();
        assert_eq!(prices, ["450.00", "612.40"]);

        app.sort_by = SortBy::Duration;
        app.max_price = 1000.0;
        let durations: Vec<_> = app
            .visible_flights()
            .iter()
            .map(|f| f.duration().unwrap_or_default().to_string())
            .collect();
        assert_eq!(durations, ["PT7H", "PT9H", "PT10H30M"]);
    }

    #[test]
    fn test_enter_starts_search_with_form_values() {
        let mut app = app();
        type_text(&mut app, "JFK");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "LHR");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "2026-06-15");

        let action = press(&mut app, KeyCode::Enter);
        assert_eq!(
            action,
            Some(Action::Search {
                id: 1,
                origin: "JFK".into(),
                destination: "LHR".into(),
                date: "2026-06-15".into(),
            })
        );
        assert!(app.loading);
    }

    #[test]
    fn test_date_field_rejects_letters() {
        let mut app = app();
        app.focus = Field::Date;
        type_text(&mut app, "2026-0x6");
        assert_eq!(app.date, "2026-06");
    }

    #[test]
    fn test_lookup_is_debounced() {
        let mut app = app();
        type_text(&mut app, "lon");
        let typed_at = Instant::now();

        assert_eq!(app.on_tick(typed_at), None);
        assert_eq!(
            app.on_tick(typed_at + Duration::from_millis(600)),
            Some(Action::Lookup {
                field: Field::Origin,
                keyword: "lon".into()
            })
        );
        // Nothing new typed since: no second lookup.
        assert_eq!(app.on_tick(typed_at + Duration::from_millis(1200)), None);
    }

    #[test]
    fn test_short_keyword_skips_lookup() {
        let mut app = app();
        app.suggestions = vec![AirportSuggestion {
            label: "London (LHR)".into(),
            code: "LHR".into(),
        }];
        type_text(&mut app, "l");
        assert_eq!(app.on_tick(Instant::now() + Duration::from_secs(1)), None);
        assert!(app.suggestions.is_empty());
    }

    #[test]
    fn test_accepting_suggestion_fills_code() {
        let mut app = app();
        type_text(&mut app, "lon");
        app.on_suggestions(
            Field::Origin,
            "lon",
            vec![
                AirportSuggestion { label: "London (LON)".into(), code: "LON".into() },
                AirportSuggestion { label: "London (LHR)".into(), code: "LHR".into() },
            ],
        );
        assert!(app.suggestions_open());

        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.origin, "LHR");
        assert_eq!(app.focus, Field::Destination);
        assert!(app.suggestions.is_empty());
    }

    #[test]
    fn test_stale_suggestions_ignored() {
        let mut app = app();
        type_text(&mut app, "lond");
        app.on_suggestions(
            Field::Origin,
            "lon",
            vec![AirportSuggestion { label: "London (LON)".into(), code: "LON".into() }],
        );
        assert!(app.suggestions.is_empty());
    }

    #[test]
    fn test_search_results_update_state() {
        let mut app = app();
        app.origin = "JFK".into();
        app.destination = "LHR".into();
        app.date = "2026-06-15".into();
        let Some(Action::Search { id, .. }) = press(&mut app, KeyCode::Enter) else {
            panic!("expected a search action");
        };

        app.on_search_result(id, Ok(vec![offer("450.00", None), offer("1203.10", None)]));
        assert!(!app.loading);
        assert_eq!(app.flights.len(), 2);
        assert_eq!(app.price_ceiling, 1204.0);
        assert_eq!(app.max_price, 1204.0);
        assert_eq!(app.focus, Field::Results);
        assert!(app.error.is_none());
    }

    #[test]
    fn test_empty_and_failed_searches_show_messages() {
        let mut app = app();
        let Some(Action::Search { id, .. }) = press(&mut app, KeyCode::Enter) else {
            panic!("expected a search action");
        };
        app.on_search_result(id, Ok(Vec::new()));
        assert_eq!(app.error.as_deref(), Some(NO_FLIGHTS_MESSAGE));

        app.focus = Field::Origin;
        let Some(Action::Search { id, .. }) = press(&mut app, KeyCode::Enter) else {
            panic!("expected a search action");
        };
        app.on_search_result(id, Err(ApiError::Http { status: 429, body: None }));
        assert!(app.error.as_deref().unwrap().contains("Too many requests"));
        assert!(app.flights.is_empty());
    }

    #[test]
    fn test_superseded_search_result_ignored() {
        let mut app = app();
        let Some(Action::Search { id: first, .. }) = press(&mut app, KeyCode::Enter) else {
            panic!("expected a search action");
        };
        press(&mut app, KeyCode::Enter);

        app.on_search_result(first, Ok(vec![offer("450.00", None)]));
        assert!(app.loading);
        assert!(app.flights.is_empty());
    }

    #[test]
    fn test_results_keys() {
        let mut app = app();
        app.flights = vec![offer("450.00", None), offer("612.40", None)];
        app.price_ceiling = 700.0;
        app.max_price = 700.0;
        app.focus = Field::Results;

        press(&mut app, KeyCode::Down);
        assert_eq!(app.selected_index, 1);
        press(&mut app, KeyCode::Down);
        assert_eq!(app.selected_index, 0);

        press(&mut app, KeyCode::Char('+'));
        assert_eq!(app.max_price, 700.0);
        press(&mut app, KeyCode::Char('-'));
        assert_eq!(app.max_price, 650.0);

        press(&mut app, KeyCode::Char('s'));
        assert_eq!(app.sort_by, SortBy::Duration);

        press(&mut app, KeyCode::Char('t'));
        assert_eq!(app.theme, ThemeMode::Light);

        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }
}
