//! Widget catalog and per-user widget models.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::DbId;

// ---------------------------------------------------------------------------
// DataSource
// ---------------------------------------------------------------------------

/// Upstream API family a widget queries through the backend proxy.
///
/// The supported set is closed. Tags the client does not know about are
/// kept verbatim in [`DataSource::Other`] so that a newer backend never
/// breaks deserialization of the widget list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DataSource {
    /// Disease statistics (COVID-19).
    Disease,
    /// Cryptocurrency prices.
    Crypto,
    /// World Bank economic indicators.
    WorldBank,
    /// Any tag outside the supported set.
    Other(String),
}

impl DataSource {
    /// The supported tags, in catalog display order.
    pub const SUPPORTED: [DataSource; 3] =
        [DataSource::Disease, DataSource::Crypto, DataSource::WorldBank];

    /// Wire representation of the tag.
    pub fn as_str(&self) -> &str {
        match self {
            DataSource::Disease => "disease",
            DataSource::Crypto => "crypto",
            DataSource::WorldBank => "worldbank",
            DataSource::Other(tag) => tag,
        }
    }

    /// Human-readable label used in catalog headings.
    pub fn label(&self) -> &str {
        match self {
            DataSource::Disease => "COVID-19",
            DataSource::Crypto => "Cryptocurrency",
            DataSource::WorldBank => "World Bank",
            DataSource::Other(tag) => tag,
        }
    }

    /// Returns `true` for tags in the closed supported set.
    pub fn is_supported(&self) -> bool {
        !matches!(self, DataSource::Other(_))
    }
}

impl From<String> for DataSource {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "disease" => DataSource::Disease,
            "crypto" => DataSource::Crypto,
            "worldbank" => DataSource::WorldBank,
            _ => DataSource::Other(tag),
        }
    }
}

impl From<&str> for DataSource {
    fn from(tag: &str) -> Self {
        DataSource::from(tag.to_string())
    }
}

impl From<DataSource> for String {
    fn from(source: DataSource) -> Self {
        match source {
            DataSource::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Catalog and user widgets
// ---------------------------------------------------------------------------

/// A catalog entry from `GET /widgets`. Owned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetDefinition {
    pub id: DbId,
    pub name: String,
    pub slug: String,
    pub api_source: DataSource,
    /// Endpoint discriminator within the data source, e.g. `"global"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_settings: Option<serde_json::Value>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// A widget definition attached to the current user, from `GET /user/widgets`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserWidget {
    #[serde(flatten)]
    pub definition: WidgetDefinition,
    /// Free-form settings; shape depends on source and endpoint.
    #[serde(default)]
    pub settings: serde_json::Value,
    /// Display order. Unique per user, gaps permitted.
    #[serde(default)]
    pub position: i32,
    #[serde(default = "default_true")]
    pub is_visible: bool,
}

impl UserWidget {
    pub fn id(&self) -> DbId {
        self.definition.id
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn source(&self) -> &DataSource {
        &self.definition.api_source
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.definition.endpoint.as_deref()
    }

    /// Look up a single settings value by key.
    pub fn setting(&self, key: &str) -> Option<&serde_json::Value> {
        self.settings.get(key)
    }
}

fn default_true() -> bool {
    true
}

/// Group catalog entries by data source, preserving catalog order within
/// each group.
pub fn group_by_source(
    definitions: Vec<WidgetDefinition>,
) -> BTreeMap<DataSource, Vec<WidgetDefinition>> {
    let mut groups: BTreeMap<DataSource, Vec<WidgetDefinition>> = BTreeMap::new();
    for definition in definitions {
        groups
            .entry(definition.api_source.clone())
            .or_default()
            .push(definition);
    }
    groups
}

// ---------------------------------------------------------------------------
// Request DTOs
// ---------------------------------------------------------------------------

/// DTO for `POST /user/widgets/{id}`.
#[derive(Debug, Default, Serialize)]
pub struct AttachWidget {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i32>,
}

/// DTO for `PUT /user/widgets/{id}`. All fields are optional.
#[derive(Debug, Default, Serialize)]
pub struct UpdateUserWidget {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_visible: Option<bool>,
}

/// One entry of a bulk reposition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetPosition {
    pub widget_id: DbId,
    pub position: i32,
}

/// DTO for `POST /user/widgets/positions`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PositionsRequest {
    pub positions: Vec<WidgetPosition>,
}
