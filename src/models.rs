use crate::error::ApiError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Validated input for one offer search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
}

impl SearchQuery {
    /// Normalizes the raw form values. Every failure here happens before any
    /// network call.
    pub fn new(origin: &str, destination: &str, departure_date: &str) -> Result<Self, ApiError> {
        let (origin, destination, date) =
            (origin.trim(), destination.trim(), departure_date.trim());
        if origin.is_empty() || destination.is_empty() || date.is_empty() {
            return Err(ApiError::validation("Please fill in all search fields"));
        }

        let origin = parse_iata(origin)?;
        let destination = parse_iata(destination)?;
        let departure_date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
            ApiError::validation(format!("'{}' is not a date (expected YYYY-MM-DD)", date))
        })?;

        Ok(Self {
            origin,
            destination,
            departure_date,
        })
    }

    pub fn date_param(&self) -> String {
        self.departure_date.format("%Y-%m-%d").to_string()
    }
}

fn parse_iata(code: &str) -> Result<String, ApiError> {
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code.to_ascii_uppercase())
    } else {
        Err(ApiError::validation(format!(
            "'{}' is not an IATA airport code",
            code
        )))
    }
}

// Upstream flight offer. Every nested field is optional on the wire and may be
// sent as `null`, so all of them default; fields we don't model are kept in
// `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlightOffer {
    #[serde(deserialize_with = "lenient::text")]
    pub id: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub price: Price,
    #[serde(deserialize_with = "lenient::or_default")]
    pub itineraries: Vec<Itinerary>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub validating_airline_codes: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Price {
    /// Decimal amount as sent by the API, e.g. `"450.00"`.
    #[serde(deserialize_with = "lenient::text")]
    pub total: String,
    #[serde(deserialize_with = "lenient::text")]
    pub currency: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Itinerary {
    /// ISO-8601 duration, e.g. `PT7H5M`.
    pub duration: Option<String>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Segment {
    #[serde(deserialize_with = "lenient::or_default")]
    pub departure: Endpoint,
    #[serde(deserialize_with = "lenient::or_default")]
    pub arrival: Endpoint,
    pub carrier_code: Option<String>,
    pub number: Option<String>,
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Endpoint {
    pub iata_code: Option<String>,
    /// Local time at the airport, `YYYY-MM-DDTHH:MM:SS`.
    pub at: Option<String>,
}

mod lenient {
    use serde::de::{Deserialize, Deserializer, Error};
    use serde_json::Value;

    /// `null` becomes the type's default.
    pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Default,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }

    /// Strings pass through, numbers are kept in their JSON spelling and
    /// `null` is empty.
    pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Null => Ok(String::new()),
            other => Err(D::Error::custom(format!(
                "expected a string or number, found {}",
                other
            ))),
        }
    }
}

impl FlightOffer {
    pub fn total_price(&self) -> Option<f64> {
        self.price.total.trim().parse::<f64>().ok().filter(|p| p.is_finite())
    }

    pub fn carrier(&self) -> &str {
        self.validating_airline_codes
            .first()
            .map(String::as_str)
            .unwrap_or("N/A")
    }

    pub fn outbound(&self) -> Option<&Itinerary> {
        self.itineraries.first()
    }

    pub fn first_departure(&self) -> Option<&Endpoint> {
        self.outbound()?.segments.first().map(|s| &s.departure)
    }

    pub fn last_arrival(&self) -> Option<&Endpoint> {
        self.outbound()?.segments.last().map(|s| &s.arrival)
    }

    pub fn duration(&self) -> Option<&str> {
        self.outbound()?.duration.as_deref()
    }

    /// Number of outbound segments.
    pub fn segment_count(&self) -> usize {
        self.outbound().map_or(0, |i| i.segments.len())
    }
}

/// One autocomplete entry, e.g. `London (LHR)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirportSuggestion {
    pub label: String,
    pub code: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocationRecord {
    pub sub_type: Option<String>,
    pub name: Option<String>,
    pub iata_code: Option<String>,
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Address {
    pub city_name: Option<String>,
    pub country_name: Option<String>,
}

impl LocationRecord {
    /// `None` when the record carries no IATA code to search with.
    pub fn to_suggestion(&self) -> Option<AirportSuggestion> {
        let code = self.iata_code.as_deref()?.trim();
        if code.is_empty() {
            return None;
        }
        let city = self
            .address
            .as_ref()
            .and_then(|a| a.city_name.as_deref())
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(title_case)
            .unwrap_or_else(|| "Unknown".to_string());
        Some(AirportSuggestion {
            label: format!("{} ({})", city, code),
            code: code.to_string(),
        })
    }
}

// The locations API returns city names upper-cased ("NEW YORK").
fn title_case(name: &str) -> String {
    name.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
