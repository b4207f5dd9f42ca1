//! Widget registry: data-source tag to renderer dispatch.
//!
//! The set of data sources is closed, so dispatch is an exhaustive match
//! with one fallback arm for tags the client does not know.

use widgetdash_core::models::{DataSource, UserWidget};
use widgetdash_core::settings::{self, SettingField};

use crate::dashboard::WidgetDataEntry;
use crate::render::{self, Panel};

/// Renderer and settings-editor capability for a widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Renderer {
    Covid,
    Crypto,
    WorldBank,
    /// Inert fallback for unsupported tags.
    Unknown,
}

/// Resolve the renderer for a data-source tag. Never fails.
pub fn resolve(source: &DataSource) -> Renderer {
    match source {
        DataSource::Disease => Renderer::Covid,
        DataSource::Crypto => Renderer::Crypto,
        DataSource::WorldBank => Renderer::WorldBank,
        DataSource::Other(tag) => {
            tracing::debug!(tag = %tag, "No renderer for data source, using fallback");
            Renderer::Unknown
        }
    }
}

impl Renderer {
    pub fn is_fallback(self) -> bool {
        self == Renderer::Unknown
    }

    /// Editable settings for `widget`. The fallback exposes none.
    pub fn settings_fields(self, widget: &UserWidget) -> &'static [SettingField] {
        match self {
            Renderer::Unknown => &[],
            _ => settings::fields_for(widget.source(), widget.endpoint()),
        }
    }

    /// Render `widget` from its cache entry.
    pub fn render(self, widget: &UserWidget, entry: Option<&WidgetDataEntry>) -> Panel {
        match self {
            Renderer::Covid => render::render_with(widget, entry, render::covid::body),
            Renderer::Crypto => render::render_with(widget, entry, render::crypto::body),
            Renderer::WorldBank => render::render_with(widget, entry, render::worldbank::body),
            Renderer::Unknown => Panel::new(widget.name())
                .line(format!("Unknown widget type: {}", widget.source())),
        }
    }
}
