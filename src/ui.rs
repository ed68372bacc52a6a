//! TUI rendering for the flight search
//!
//! One screen: the search form, an autocomplete popup under the focused
//! airport field, a price sparkline, the results list and a status line.

use crate::app::{App, Field, SortBy, ThemeMode};
use crate::format::{format_duration, format_price, format_time, stops_text};
use crate::models::FlightOffer;
use ratatui::{prelude::*, widgets::*};

/// Colors for one theme.
struct Palette {
    bg: Color,
    fg: Color,
    muted: Color,
    accent: Color,
    highlight: Color,
    price: Color,
    error: Color,
}

fn palette(mode: ThemeMode) -> Palette {
    match mode {
        ThemeMode::Dark => Palette {
            bg: Color::Rgb(15, 23, 42),
            fg: Color::Rgb(226, 232, 240),
            muted: Color::Rgb(100, 116, 139),
            accent: Color::Rgb(96, 165, 250),
            highlight: Color::Rgb(30, 41, 82),
            price: Color::Rgb(52, 211, 153),
            error: Color::Rgb(248, 113, 113),
        },
        ThemeMode::Light => Palette {
            bg: Color::Rgb(240, 244, 255),
            fg: Color::Rgb(15, 23, 42),
            muted: Color::Rgb(71, 85, 105),
            accent: Color::Rgb(37, 99, 235),
            highlight: Color::Rgb(219, 234, 254),
            price: Color::Rgb(5, 150, 105),
            error: Color::Rgb(220, 38, 38),
        },
    }
}

/// Renders one frame of the TUI based on current application state.
pub fn render(f: &mut Frame, app: &App) {
    let p = palette(app.theme);
    let area = f.size();
    f.render_widget(Block::default().style(Style::default().bg(p.bg).fg(p.fg)), area);

    let popup_height = if app.suggestions_open() {
        app.suggestions.len().min(5) as u16 + 2
    } else {
        0
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(popup_height),
            Constraint::Length(8),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    render_form(f, app, &p, chunks[0]);
    if popup_height > 0 {
        render_suggestions(f, app, &p, chunks[1]);
    }

    let flights = app.visible_flights();
    render_price_chart(f, &flights, &p, chunks[2]);
    render_results(f, app, &flights, &p, chunks[3]);
    render_status(f, app, &p, chunks[4]);
}

fn form_columns(area: Rect) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(35),
            Constraint::Percentage(35),
            Constraint::Percentage(30),
        ])
        .split(area)
}

fn render_form(f: &mut Frame, app: &App, p: &Palette, area: Rect) {
    let columns = form_columns(area);
    let fields = [
        (Field::Origin, " From ", "e.g. JFK or new york"),
        (Field::Destination, " To ", "e.g. LHR or london"),
        (Field::Date, " Departure ", "YYYY-MM-DD"),
    ];

    for (i, (field, title, placeholder)) in fields.into_iter().enumerate() {
        let focused = app.focus == field;
        let text = app.field_text(field);
        let content = if text.is_empty() && !focused {
            Span::styled(placeholder, Style::default().fg(p.muted))
        } else {
            Span::raw(text)
        };
        let border = if focused {
            Style::default().fg(p.accent).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(p.muted)
        };

        f.render_widget(
            Paragraph::new(Line::from(content)).block(
                Block::default()
                    .title(title)
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(border),
            ),
            columns[i],
        );

        if focused {
            let x = columns[i].x + 1 + text.chars().count() as u16;
            f.set_cursor(x.min(columns[i].right().saturating_sub(2)), columns[i].y + 1);
        }
    }
}

fn render_suggestions(f: &mut Frame, app: &App, p: &Palette, area: Rect) {
    let columns = form_columns(area);
    let column = if app.focus == Field::Destination { columns[1] } else { columns[0] };

    let items: Vec<ListItem> = app
        .suggestions
        .iter()
        .take(5)
        .enumerate()
        .map(|(i, s)| {
            let style = if i == app.suggestion_index {
                Style::default().fg(p.accent).bg(p.highlight).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {}", s.label)).style(style)
        })
        .collect();

    f.render_widget(
        List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(p.accent)),
        ),
        column,
    );
}

fn render_price_chart(f: &mut Frame, flights: &[&FlightOffer], p: &Palette, area: Rect) {
    let prices: Vec<u64> = flights
        .iter()
        .filter_map(|fl| fl.total_price())
        .map(|price| price.round() as u64)
        .collect();

    let title = match (prices.iter().min(), prices.iter().max()) {
        (Some(lo), Some(hi)) => format!(" Price Insights  ${} – ${} ", lo, hi),
        _ => " Price Insights ".to_string(),
    };

    f.render_widget(
        Sparkline::default()
            .block(
                Block::default()
                    .title(title)
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(p.muted)),
            )
            .data(&prices)
            .style(Style::default().fg(p.accent)),
        area,
    );
}

fn render_results(f: &mut Frame, app: &App, flights: &[&FlightOffer], p: &Palette, area: Rect) {
    let items: Vec<ListItem> = flights
        .iter()
        .enumerate()
        .map(|(i, fl)| {
            let selected = app.focus == Field::Results && i == app.selected_index;
            flight_card(fl, p, selected)
        })
        .collect();

    let sort = match app.sort_by {
        SortBy::Price => "price",
        SortBy::Duration => "duration",
    };
    let title = format!(
        " {} flights  │  sort: {}  │  max {} ",
        flights.len(),
        sort,
        format_price(&app.max_price.to_string(), "USD")
    );

    let mut state = results_state(app, flights.len());
    f.render_stateful_widget(
        List::new(items).block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(if app.focus == Field::Results {
                    Style::default().fg(p.accent)
                } else {
                    Style::default().fg(p.muted)
                }),
        ),
        area,
        &mut state,
    );
}

// Selecting the card scrolls the list so it stays in view.
fn results_state(app: &App, count: usize) -> ListState {
    let selected = (app.focus == Field::Results && count > 0)
        .then(|| app.selected_index.min(count - 1));
    ListState::default().with_selected(selected)
}

fn flight_card<'a>(fl: &FlightOffer, p: &Palette, selected: bool) -> ListItem<'a> {
    let departure = fl.first_departure();
    let arrival = fl.last_arrival();
    let code = |e: Option<&crate::models::Endpoint>| {
        e.and_then(|e| e.iata_code.clone()).unwrap_or_else(|| "N/A".to_string())
    };
    let time = |e: Option<&crate::models::Endpoint>| format_time(e.and_then(|e| e.at.as_deref()));

    let bold = Style::default().add_modifier(Modifier::BOLD);
    let lines = vec![
        Line::from(vec![
            Span::styled(format!(" {:<4}", fl.carrier()), bold.fg(p.accent)),
            Span::raw(format!(
                "{} {}  →  {} {}",
                code(departure),
                time(departure),
                code(arrival),
                time(arrival)
            )),
            Span::raw("   "),
            Span::styled(
                format_price(&fl.price.total, &fl.price.currency),
                bold.fg(p.price),
            ),
        ]),
        Line::from(Span::styled(
            format!(
                "      {}  ·  {}",
                format_duration(fl.duration()),
                stops_text(fl.segment_count())
            ),
            Style::default().fg(p.muted),
        )),
    ];

    let item = ListItem::new(lines);
    if selected {
        item.style(Style::default().bg(p.highlight))
    } else {
        item
    }
}

fn render_status(f: &mut Frame, app: &App, p: &Palette, area: Rect) {
    let line = if app.loading {
        Line::from(Span::styled(" Searching flights…", Style::default().fg(p.accent)))
    } else if let Some(ref msg) = app.error {
        Line::from(Span::styled(format!(" {}", msg), Style::default().fg(p.error)))
    } else {
        let hint = match app.focus {
            Field::Results => " ↑/↓ select   s sort   +/- max price   t theme   Tab form   q quit",
            _ => " Tab next field   ↑/↓ suggestions   Enter search   Ctrl-T theme   Esc quit",
        };
        Line::from(Span::styled(hint, Style::default().fg(p.muted)))
    };
    f.render_widget(Paragraph::new(line), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UiConfig;
    use crate::models::Price;
    use ratatui::backend::TestBackend;

    fn app_with_results(count: usize) -> App {
        let mut app = App::new(&UiConfig::default());
        app.flights = (1..=count)
            .map(|i| FlightOffer {
                price: Price {
                    total: format!("{}.00", i * 100),
                    currency: "USD".to_string(),
                },
                ..Default::default()
            })
            .collect();
        // Above every price, so the list title never repeats a card's price
        app.price_ceiling = 5000.0;
        app.max_price = 5000.0;
        app.focus = Field::Results;
        app
    }

    fn screen(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        terminal.draw(|f| render(f, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_results_state_follows_focus() {
        let mut app = app_with_results(3);
        app.selected_index = 2;
        assert_eq!(results_state(&app, 3).selected(), Some(2));
        assert_eq!(results_state(&app, 0).selected(), None);

        app.focus = Field::Origin;
        assert_eq!(results_state(&app, 3).selected(), None);
    }

    #[test]
    fn test_selected_card_scrolls_into_view() {
        let mut app = app_with_results(10);
        assert!(screen(&app).contains("$100.00"));
        assert!(!screen(&app).contains("$1,000.00"));

        app.selected_index = 9;
        let shown = screen(&app);
        assert!(shown.contains("$1,000.00"));
        assert!(!shown.contains("$100.00"));
    }
}
