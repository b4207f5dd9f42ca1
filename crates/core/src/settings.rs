//! Settings schema for each (data source, endpoint) pair.
//!
//! The schema drives the settings editor: which keys a widget accepts,
//! how raw user input is parsed, and which value is assumed when a key is
//! missing from the stored settings.

use serde_json::Value;

use crate::error::CoreError;
use crate::models::DataSource;

/// Currencies accepted by the crypto endpoints.
pub const CRYPTO_CURRENCIES: &[&str] = &["usd", "eur", "gbp", "jpy", "aud", "cad", "chf"];

/// How a settings field is entered and validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text, trimmed. Empty input is rejected.
    Text,
    /// Whole number within an inclusive range.
    Integer { min: i64, max: i64 },
    /// Comma-separated list of non-empty items.
    List,
    /// One of a fixed set of lowercase options.
    Choice(&'static [&'static str]),
}

/// Default value of a settings field, when it has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    None,
    Text(&'static str),
    Integer(i64),
}

/// A single editable setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingField {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub default: FieldDefault,
}

const DISEASE_COUNTRY: &[SettingField] = &[SettingField {
    key: "country",
    label: "Country",
    kind: FieldKind::Text,
    default: FieldDefault::None,
}];

const DISEASE_HISTORICAL: &[SettingField] = &[SettingField {
    key: "days",
    label: "Days of History",
    kind: FieldKind::Integer { min: 1, max: 365 },
    default: FieldDefault::Integer(30),
}];

const CRYPTO_PRICES: &[SettingField] = &[
    SettingField {
        key: "coins",
        label: "Cryptocurrencies (comma-separated)",
        kind: FieldKind::List,
        default: FieldDefault::None,
    },
    SettingField {
        key: "currency",
        label: "Currency",
        kind: FieldKind::Choice(CRYPTO_CURRENCIES),
        default: FieldDefault::Text("usd"),
    },
];

const CRYPTO_HISTORICAL: &[SettingField] = &[
    SettingField {
        key: "coin",
        label: "Cryptocurrency",
        kind: FieldKind::Text,
        default: FieldDefault::Text("bitcoin"),
    },
    SettingField {
        key: "days",
        label: "Days of History",
        kind: FieldKind::Integer { min: 1, max: 365 },
        default: FieldDefault::Integer(14),
    },
    SettingField {
        key: "currency",
        label: "Currency",
        kind: FieldKind::Choice(CRYPTO_CURRENCIES),
        default: FieldDefault::Text("usd"),
    },
];

const WORLDBANK_COUNTRY: &[SettingField] = &[SettingField {
    key: "country",
    label: "Country Code",
    kind: FieldKind::Text,
    default: FieldDefault::Text("US"),
}];

const WORLDBANK_INDICATORS: &[SettingField] = &[
    SettingField {
        key: "country",
        label: "Country Code",
        kind: FieldKind::Text,
        default: FieldDefault::Text("US"),
    },
    SettingField {
        key: "indicator",
        label: "Indicator",
        kind: FieldKind::Text,
        default: FieldDefault::Text("NY.GDP.MKTP.CD"),
    },
    SettingField {
        key: "years",
        label: "Years of Data",
        kind: FieldKind::Integer { min: 1, max: 20 },
        default: FieldDefault::Integer(5),
    },
];

/// Editable fields for a widget of `source` querying `endpoint`.
///
/// Returns an empty slice when the combination has nothing to configure.
pub fn fields_for(source: &DataSource, endpoint: Option<&str>) -> &'static [SettingField] {
    match (source, endpoint) {
        (DataSource::Disease, Some("country")) => DISEASE_COUNTRY,
        (DataSource::Disease, Some("historical")) => DISEASE_HISTORICAL,
        (DataSource::Crypto, Some("prices")) => CRYPTO_PRICES,
        (DataSource::Crypto, Some("historical")) => CRYPTO_HISTORICAL,
        (DataSource::WorldBank, Some("country")) => WORLDBANK_COUNTRY,
        (DataSource::WorldBank, Some("indicators")) => WORLDBANK_INDICATORS,
        _ => &[],
    }
}

impl SettingField {
    /// Default as a JSON value, if the field has one.
    pub fn default_value(&self) -> Option<Value> {
        match self.default {
            FieldDefault::None => None,
            FieldDefault::Text(s) => Some(Value::from(s)),
            FieldDefault::Integer(n) => Some(Value::from(n)),
        }
    }

    /// Parse raw user input into the JSON value stored in settings.
    pub fn parse_input(&self, raw: &str) -> Result<Value, CoreError> {
        let raw = raw.trim();
        match self.kind {
            FieldKind::Text => {
                if raw.is_empty() {
                    return Err(CoreError::Validation(format!("{} must not be empty", self.key)));
                }
                Ok(Value::from(raw))
            }
            FieldKind::Integer { min, max } => {
                let n: i64 = raw.parse().map_err(|_| {
                    CoreError::Validation(format!("{} must be a whole number, got '{raw}'", self.key))
                })?;
                check_range(self.key, n, min, max)?;
                Ok(Value::from(n))
            }
            FieldKind::List => {
                let items: Vec<Value> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(Value::from)
                    .collect();
                if items.is_empty() {
                    return Err(CoreError::Validation(format!(
                        "{} needs at least one entry",
                        self.key
                    )));
                }
                Ok(Value::Array(items))
            }
            FieldKind::Choice(options) => {
                let choice = raw.to_ascii_lowercase();
                if options.contains(&choice.as_str()) {
                    Ok(Value::from(choice))
                } else {
                    Err(CoreError::Validation(format!(
                        "Invalid {} '{raw}'. Must be one of: {}",
                        self.key,
                        options.join(", ")
                    )))
                }
            }
        }
    }

    /// Check an already-stored value against this field's kind.
    pub fn validate(&self, value: &Value) -> Result<(), CoreError> {
        let ok = match self.kind {
            FieldKind::Text => value.as_str().is_some_and(|s| !s.trim().is_empty()),
            FieldKind::Integer { min, max } => match value.as_i64() {
                Some(n) => return check_range(self.key, n, min, max),
                None => false,
            },
            FieldKind::List => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            FieldKind::Choice(options) => value.as_str().is_some_and(|s| options.contains(&s)),
        };
        if ok {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "Invalid value for {}: {value}",
                self.key
            )))
        }
    }
}

fn check_range(key: &str, n: i64, min: i64, max: i64) -> Result<(), CoreError> {
    if (min..=max).contains(&n) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "{key} must be between {min} and {max}, got {n}"
        )))
    }
}

/// Validate every schema field present in `settings`.
///
/// Keys outside the schema are passed through untouched; the backend owns
/// their meaning.
pub fn validate_settings(
    source: &DataSource,
    endpoint: Option<&str>,
    settings: &Value,
) -> Result<(), CoreError> {
    if !(settings.is_object() || settings.is_null()) {
        return Err(CoreError::Validation(
            "settings must be a JSON object".to_string(),
        ));
    }
    for field in fields_for(source, endpoint) {
        if let Some(value) = settings.get(field.key) {
            field.validate(value)?;
        }
    }
    Ok(())
}

/// Read `key` from `settings`, falling back to the schema default.
pub fn effective_value(
    source: &DataSource,
    endpoint: Option<&str>,
    settings: &Value,
    key: &str,
) -> Option<Value> {
    if let Some(value) = settings.get(key) {
        return Some(value.clone());
    }
    fields_for(source, endpoint)
        .iter()
        .find(|f| f.key == key)
        .and_then(SettingField::default_value)
}
