//! Dashboard client library.
//!
//! Provides the persisted session store, the authenticated HTTP gateway
//! to the dashboard backend, the widget renderer registry, and the
//! dashboard orchestrator that owns the widget list and per-widget data
//! cache.

pub mod api;
pub mod backend;
pub mod config;
pub mod dashboard;
pub mod events;
pub mod instance;
pub mod registry;
pub mod render;
pub mod session;

pub use api::{GatewayClient, GatewayError};
pub use backend::DashboardBackend;
pub use config::ClientConfig;
pub use dashboard::{Dashboard, DashboardError, FetchOutcome, WidgetDataEntry};
pub use events::SessionEvent;
pub use instance::WidgetInstance;
pub use registry::{resolve, Renderer};
pub use render::Panel;
pub use session::{Session, SessionError, SessionStore};
