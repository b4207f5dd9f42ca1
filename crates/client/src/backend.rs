//! The backend seam the dashboard orchestrator talks through.
//!
//! [`GatewayClient`] is the production implementation; tests substitute a
//! scripted backend.

use async_trait::async_trait;
use widgetdash_core::models::{
    AttachWidget, UpdateUserWidget, UserWidget, WidgetDefinition, WidgetPosition,
};
use widgetdash_core::types::DbId;

use crate::api::{GatewayClient, GatewayError};

/// Widget operations the dashboard needs from the backend.
#[async_trait]
pub trait DashboardBackend: Send + Sync {
    async fn list_user_widgets(&self) -> Result<Vec<UserWidget>, GatewayError>;

    async fn list_catalog(&self) -> Result<Vec<WidgetDefinition>, GatewayError>;

    async fn widget_data(&self, widget_id: DbId) -> Result<serde_json::Value, GatewayError>;

    async fn attach_widget(&self, widget_id: DbId, input: &AttachWidget)
        -> Result<(), GatewayError>;

    async fn update_user_widget(
        &self,
        widget_id: DbId,
        input: &UpdateUserWidget,
    ) -> Result<(), GatewayError>;

    async fn remove_user_widget(&self, widget_id: DbId) -> Result<(), GatewayError>;

    async fn update_positions(&self, positions: &[WidgetPosition]) -> Result<(), GatewayError>;
}

#[async_trait]
impl DashboardBackend for GatewayClient {
    async fn list_user_widgets(&self) -> Result<Vec<UserWidget>, GatewayError> {
        GatewayClient::list_user_widgets(self).await
    }

    async fn list_catalog(&self) -> Result<Vec<WidgetDefinition>, GatewayError> {
        GatewayClient::list_catalog(self).await
    }

    async fn widget_data(&self, widget_id: DbId) -> Result<serde_json::Value, GatewayError> {
        GatewayClient::widget_data(self, widget_id).await
    }

    async fn attach_widget(
        &self,
        widget_id: DbId,
        input: &AttachWidget,
    ) -> Result<(), GatewayError> {
        GatewayClient::attach_widget(self, widget_id, input).await
    }

    async fn update_user_widget(
        &self,
        widget_id: DbId,
        input: &UpdateUserWidget,
    ) -> Result<(), GatewayError> {
        GatewayClient::update_user_widget(self, widget_id, input).await
    }

    async fn remove_user_widget(&self, widget_id: DbId) -> Result<(), GatewayError> {
        GatewayClient::remove_user_widget(self, widget_id).await
    }

    async fn update_positions(&self, positions: &[WidgetPosition]) -> Result<(), GatewayError> {
        GatewayClient::update_positions(self, positions).await
    }
}
