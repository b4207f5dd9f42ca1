//! Shared domain types for the widget dashboard client.
//!
//! Holds the backend wire models, the closed set of widget data sources,
//! the per-source settings schema, the data staleness rule, and the route
//! guard. Nothing in this crate performs I/O.

pub mod error;
pub mod models;
pub mod routing;
pub mod settings;
pub mod staleness;
pub mod types;
