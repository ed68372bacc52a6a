//! Display helpers for offer fields. All of them degrade to a placeholder
//! instead of failing, since offers come from the API without a strict schema.

use chrono::NaiveDateTime;

/// `PT15H30M` -> `15h 30m`. Missing input gives `N/A`; anything unparsable is
/// returned as-is.
pub fn format_duration(duration: Option<&str>) -> String {
    let Some(raw) = duration.filter(|d| !d.is_empty()) else {
        return "N/A".to_string();
    };

    let (hours, minutes) = duration_parts(raw);
    let parts: Vec<String> = [
        hours.map(|h| format!("{}h", h)),
        minutes.map(|m| format!("{}m", m)),
    ]
    .into_iter()
    .flatten()
    .collect();
    if parts.is_empty() {
        raw.to_string()
    } else {
        parts.join(" ")
    }
}

/// Total minutes of an ISO-8601 duration, counting days. `None` if nothing in
/// it could be read.
pub fn duration_minutes(duration: &str) -> Option<u32> {
    let days = duration
        .strip_prefix('P')
        .and_then(|rest| rest.split_once('D'))
        .and_then(|(d, _)| d.parse::<u32>().ok());
    let (hours, minutes) = duration_parts(duration);
    if days.is_none() && hours.is_none() && minutes.is_none() {
        return None;
    }
    Some(days.unwrap_or(0) * 24 * 60 + hours.unwrap_or(0) * 60 + minutes.unwrap_or(0))
}

fn duration_parts(raw: &str) -> (Option<u32>, Option<u32>) {
    // Only look after the 'T' so a month 'M' is never read as minutes.
    let time_part = raw.split_once('T').map_or("", |(_, t)| t);
    let component = |unit: char| -> Option<u32> {
        let end = time_part.find(unit)?;
        let start = time_part[..end]
            .rfind(|c: char| !c.is_ascii_digit())
            .map_or(0, |i| i + 1);
        time_part[start..end].parse().ok()
    };
    (component('H'), component('M'))
}

/// `("1234.5", "USD")` -> `$1,234.50`. Non-numeric amounts give `N/A`.
pub fn format_price(amount: &str, currency: &str) -> String {
    let Ok(value) = amount.trim().parse::<f64>() else {
        return "N/A".to_string();
    };
    if !value.is_finite() {
        return "N/A".to_string();
    }

    let currency = if currency.is_empty() { "USD" } else { currency };
    let prefix = match currency {
        "USD" => "$".to_string(),
        "EUR" => "€".to_string(),
        "GBP" => "£".to_string(),
        "JPY" => "¥".to_string(),
        other => format!("{} ", other),
    };

    let sign = if value < 0.0 { "-" } else { "" };
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    format!("{}{}{}.{}", sign, prefix, group_thousands(whole), cents)
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `2026-06-15T18:30:00` -> `06:30 PM`.
pub fn format_time(at: Option<&str>) -> String {
    at.and_then(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok())
        .map(|t| t.format("%I:%M %p").to_string())
        .unwrap_or_else(|| "--:--".to_string())
}

pub fn stops_text(segments: usize) -> String {
    match segments {
        0 => "Unknown".to_string(),
        1 => "Direct".to_string(),
        2 => "1 Stop".to_string(),
        n => format!("{} Stops", n - 1),
    }
}
