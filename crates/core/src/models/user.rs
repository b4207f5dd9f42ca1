//! User profile and authentication DTOs.

use serde::{Deserialize, Serialize};

use crate::types::DbId;

/// The authenticated user's profile as returned by `/login`, `/register`
/// and `/profile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: DbId,
    pub name: String,
    pub email: String,
    /// Widget definitions attached to this user.
    #[serde(default)]
    pub widget_ids: Vec<DbId>,
}

/// Body returned by the backend after a successful login or registration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub token: String,
    pub user: User,
}

/// DTO for `POST /login`.
#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// DTO for `POST /register`.
#[derive(Debug, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}
