//! A single widget on the dashboard.
//!
//! [`WidgetInstance`] binds one [`UserWidget`] to its renderer and to the
//! shared [`Dashboard`]. It stages settings edits, saves them, toggles
//! visibility, and removes the widget.

use std::sync::Arc;

use serde_json::{Map, Value};
use widgetdash_core::error::CoreError;
use widgetdash_core::models::{UpdateUserWidget, UserWidget};
use widgetdash_core::settings::{self, SettingField};
use widgetdash_core::types::DbId;

use crate::dashboard::{Dashboard, DashboardError, FetchOutcome};
use crate::registry::{self, Renderer};
use crate::render::Panel;

/// Handle on one widget of a shared [`Dashboard`].
///
/// Renders from the dashboard's cache and routes every change back
/// through it. Settings edits are staged locally until
/// [`save_settings`](Self::save_settings) succeeds.
#[derive(Debug)]
pub struct WidgetInstance {
    dashboard: Arc<Dashboard>,
    widget: UserWidget,
    renderer: Renderer,
    staged: Map<String, Value>,
    last_error: Option<String>,
}

impl WidgetInstance {
    /// Bind to the widget `widget_id` in the dashboard's current list.
    pub async fn open(dashboard: Arc<Dashboard>, widget_id: DbId) -> Result<Self, DashboardError> {
        let widget = dashboard
            .widget(widget_id)
            .await
            .ok_or(CoreError::NotFound {
                entity: "widget",
                id: widget_id,
            })?;
        Ok(Self::new(dashboard, widget))
    }

    pub fn new(dashboard: Arc<Dashboard>, widget: UserWidget) -> Self {
        let renderer = registry::resolve(widget.source());
        let staged = staged_from(&widget);
        Self {
            dashboard,
            widget,
            renderer,
            staged,
            last_error: None,
        }
    }

    pub fn widget(&self) -> &UserWidget {
        &self.widget
    }

    pub fn renderer(&self) -> Renderer {
        self.renderer
    }

    pub fn settings_fields(&self) -> &'static [SettingField] {
        self.renderer.settings_fields(&self.widget)
    }

    /// Settings as they would be saved, including unsaved edits.
    pub fn staged_settings(&self) -> Value {
        Value::Object(self.staged.clone())
    }

    /// Error from the last failed save or visibility change.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Stage an edit to `key` from raw user input.
    pub fn stage(&mut self, key: &str, raw: &str) -> Result<(), CoreError> {
        let field = self
            .settings_fields()
            .iter()
            .find(|f| f.key == key)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Unknown setting '{key}' for {} widget",
                    self.widget.source().label()
                ))
            })?;
        let value = field.parse_input(raw)?;
        self.staged.insert(key.to_string(), value);
        Ok(())
    }

    /// Drop unsaved edits.
    pub fn discard_edits(&mut self) {
        self.staged = staged_from(&self.widget);
    }

    /// Submit staged settings.
    ///
    /// On success the dashboard's copy is updated and fresh data is
    /// fetched. On failure the staged edits are kept for another attempt.
    pub async fn save_settings(&mut self) -> Result<(), DashboardError> {
        let settings = self.staged_settings();
        settings::validate_settings(self.widget.source(), self.widget.endpoint(), &settings)?;

        let id = self.widget.id();
        let update = UpdateUserWidget {
            settings: Some(settings.clone()),
            ..Default::default()
        };
        if let Err(e) = self.dashboard.backend().update_user_widget(id, &update).await {
            tracing::warn!(widget_id = id, error = %e, "Failed to save widget settings");
            self.last_error = Some(e.user_message("Failed to save settings"));
            return Err(e.into());
        }

        self.last_error = None;
        self.widget.settings = settings.clone();
        self.dashboard
            .update_local_widget(id, |w| w.settings = settings)
            .await;
        tracing::info!(widget_id = id, "Widget settings saved");

        self.dashboard.fetch_widget_data(id).await;
        Ok(())
    }

    /// Show or hide the widget.
    pub async fn set_visible(&mut self, is_visible: bool) -> Result<(), DashboardError> {
        let id = self.widget.id();
        let update = UpdateUserWidget {
            is_visible: Some(is_visible),
            ..Default::default()
        };
        if let Err(e) = self.dashboard.backend().update_user_widget(id, &update).await {
            tracing::warn!(widget_id = id, error = %e, "Failed to change widget visibility");
            self.last_error = Some(e.user_message("Failed to update widget"));
            return Err(e.into());
        }

        self.last_error = None;
        self.widget.is_visible = is_visible;
        self.dashboard
            .update_local_widget(id, |w| w.is_visible = is_visible)
            .await;
        self.dashboard.run_staleness_pass().await;
        Ok(())
    }

    /// Fetch fresh data for this widget.
    pub async fn refresh(&self) -> FetchOutcome {
        self.dashboard.fetch_widget_data(self.widget.id()).await
    }

    /// Detach the widget from the user's dashboard.
    pub async fn remove(self) -> Result<(), DashboardError> {
        let id = self.widget.id();
        self.dashboard.backend().remove_user_widget(id).await?;
        self.dashboard.resync_after_removal(id).await?;
        Ok(())
    }

    /// Render the widget from the dashboard's current cache entry.
    pub async fn panel(&self) -> Panel {
        let entry = self.dashboard.entry(self.widget.id()).await;
        self.renderer.render(&self.widget, entry.as_ref())
    }
}

fn staged_from(widget: &UserWidget) -> Map<String, Value> {
    widget.settings.as_object().cloned().unwrap_or_default()
}
