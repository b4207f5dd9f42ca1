//! Backend wire models and request DTOs.

pub mod user;
pub mod widget;

pub use user::{AuthResponse, LoginRequest, RegisterRequest, User};
pub use widget::{
    group_by_source, AttachWidget, DataSource, PositionsRequest, UpdateUserWidget, UserWidget,
    WidgetDefinition, WidgetPosition,
};
