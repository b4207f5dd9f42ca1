//! Text panels for widgets.
//!
//! Each renderer turns a widget and its cache entry into a [`Panel`]. The
//! shared state handling (loading, error, empty) lives in
//! [`render_with`]; the per-source modules only format a payload.

use std::fmt;

use serde_json::Value;
use widgetdash_core::models::UserWidget;
use widgetdash_core::settings::effective_value;

use crate::dashboard::WidgetDataEntry;

/// Rendered widget: a title, body lines and an optional footer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Panel {
    pub title: String,
    pub lines: Vec<String>,
    pub footer: Option<String>,
}

impl Panel {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            lines: Vec::new(),
            footer: None,
        }
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    pub fn lines(mut self, lines: impl IntoIterator<Item = String>) -> Self {
        self.lines.extend(lines);
        self
    }
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== {} ==", self.title)?;
        for line in &self.lines {
            writeln!(f, "  {line}")?;
        }
        if let Some(footer) = &self.footer {
            writeln!(f, "  -- {footer}")?;
        }
        Ok(())
    }
}

/// Render a widget's cache entry, delegating payload formatting to `body`.
///
/// Data that loaded once stays on screen: an error next to a payload is
/// shown as a warning line above it.
pub(crate) fn render_with(
    widget: &UserWidget,
    entry: Option<&WidgetDataEntry>,
    body: impl FnOnce(&UserWidget, &Value) -> Vec<String>,
) -> Panel {
    let panel = Panel::new(widget.name());

    let Some(entry) = entry else {
        return panel.line("Loading...");
    };

    let mut panel = match (&entry.data, &entry.error) {
        (Some(data), error) => {
            let mut panel = panel;
            if let Some(error) = error {
                panel = panel.line(format!("! {error}"));
            }
            if entry.loading {
                panel = panel.line("Refreshing...");
            }
            panel.lines(body(widget, data))
        }
        (None, _) if entry.loading => panel.line("Loading..."),
        (None, Some(error)) => panel.line(error.clone()),
        (None, None) => panel.line("No data available"),
    };

    if entry.data.is_some() {
        panel.footer = entry
            .last_updated
            .map(|at| format!("Last updated: {}", at.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    panel
}

/// Fallback for endpoints without a dedicated layout.
pub(crate) fn pretty_json(data: &Value) -> Vec<String> {
    serde_json::to_string_pretty(data)
        .unwrap_or_else(|_| data.to_string())
        .lines()
        .map(str::to_string)
        .collect()
}

/// Format a JSON number with thousands separators; `0` when absent.
pub(crate) fn format_count(value: Option<&Value>) -> String {
    match value {
        Some(v) if v.is_i64() || v.is_u64() => group_thousands(v.as_i64().unwrap_or(i64::MAX)),
        Some(v) => match v.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => group_thousands(f as i64),
            Some(f) => format!("{f:.2}"),
            None => "0".to_string(),
        },
        None => "0".to_string(),
    }
}

fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if n < 0 {
        out.insert(0, '-');
    }
    out
}

/// String field or `N/A`.
fn text_or_na(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or("N/A")
        .to_string()
}

// ---------------------------------------------------------------------------
// Per-source payload formatting
// ---------------------------------------------------------------------------

pub(crate) mod covid {
    use super::*;

    pub fn body(widget: &UserWidget, data: &Value) -> Vec<String> {
        match widget.endpoint() {
            Some("global") => vec![
                format!("Cases: {}", format_count(data.get("cases"))),
                format!("Deaths: {}", format_count(data.get("deaths"))),
                format!("Recovered: {}", format_count(data.get("recovered"))),
                format!("Active: {}", format_count(data.get("active"))),
            ],
            Some("country") => vec![
                text_or_na(data.get("country")),
                format!("Cases: {}", format_count(data.get("cases"))),
                format!("Deaths: {}", format_count(data.get("deaths"))),
            ],
            _ => pretty_json(data),
        }
    }
}

pub(crate) mod crypto {
    use super::*;

    /// Number of coins listed for the trending endpoint.
    const TRENDING_LIMIT: usize = 5;

    pub fn body(widget: &UserWidget, data: &Value) -> Vec<String> {
        match widget.endpoint() {
            Some("prices") => prices(widget, data),
            Some("trending") => trending(data),
            _ => pretty_json(data),
        }
    }

    fn prices(widget: &UserWidget, data: &Value) -> Vec<String> {
        let currency = effective_value(widget.source(), widget.endpoint(), &widget.settings, "currency")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "usd".to_string());

        let Some(coins) = data.as_object() else {
            return pretty_json(data);
        };

        coins
            .iter()
            .map(|(coin_id, quote)| {
                let price = quote
                    .get(&currency)
                    .and_then(Value::as_f64)
                    .map(|p| format!("{p:.2}"))
                    .unwrap_or_else(|| "N/A".to_string());
                let change = quote
                    .get(format!("{currency}_24h_change"))
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0);
                let arrow = if change >= 0.0 { "+" } else { "-" };
                format!(
                    "{}: {} {} ({arrow}{:.2}%)",
                    coin_id.replace('-', " "),
                    currency_symbol(&currency),
                    price,
                    change.abs()
                )
            })
            .collect()
    }

    fn trending(data: &Value) -> Vec<String> {
        let Some(coins) = data.get("coins").and_then(Value::as_array) else {
            return vec!["No trending coins".to_string()];
        };
        coins
            .iter()
            .take(TRENDING_LIMIT)
            .map(|entry| {
                let item = entry.get("item").unwrap_or(entry);
                let rank = item
                    .get("market_cap_rank")
                    .and_then(Value::as_i64)
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "N/A".to_string());
                format!(
                    "{} ({}) #{rank}",
                    text_or_na(item.get("name")),
                    text_or_na(item.get("symbol"))
                )
            })
            .collect()
    }

    fn currency_symbol(currency: &str) -> String {
        match currency {
            "usd" => "$".to_string(),
            "eur" => "€".to_string(),
            "gbp" => "£".to_string(),
            other => other.to_uppercase(),
        }
    }
}

pub(crate) mod worldbank {
    use super::*;

    pub fn body(widget: &UserWidget, data: &Value) -> Vec<String> {
        // World Bank responses are `[paging, rows]`.
        let rows = data.get(1).and_then(Value::as_array);
        match widget.endpoint() {
            Some("country") => {
                let country = rows.and_then(|r| r.first());
                let field = |pointer: &str| country.and_then(|c| c.pointer(pointer));
                vec![
                    text_or_na(field("/name")),
                    format!("Region: {}", text_or_na(field("/region/value"))),
                    format!("Income level: {}", text_or_na(field("/incomeLevel/value"))),
                    format!("Capital: {}", text_or_na(field("/capitalCity"))),
                ]
            }
            Some("indicators") => {
                let rows = rows.map(Vec::as_slice).unwrap_or_default();
                let name = rows
                    .first()
                    .and_then(|r| r.pointer("/indicator/value"))
                    .and_then(Value::as_str)
                    .unwrap_or("Data")
                    .to_string();
                let mut lines = vec![name];
                lines.extend(rows.iter().map(|row| {
                    let value = match row.get("value") {
                        Some(v) if !v.is_null() => format_count(Some(v)),
                        _ => "N/A".to_string(),
                    };
                    format!("{}: {value}", text_or_na(row.get("date")))
                }));
                lines
            }
            _ => pretty_json(data),
        }
    }
}
