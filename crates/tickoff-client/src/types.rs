//! Request and response bodies of the auth server endpoints.

use serde::{Deserialize, Serialize};
use tickoff_session::User;

/// Body of `POST sign-in/email`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInEmailRequest {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remember_me: Option<bool>,
}

impl SignInEmailRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            remember_me: None,
        }
    }
}

/// Body of `POST sign-up/email`.
#[derive(Debug, Clone, Serialize)]
pub struct SignUpEmailRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Response of the sign-in and sign-up endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthResponse {
    /// Session token, when the server returns it in the body as well.
    #[serde(default)]
    pub token: Option<String>,

    /// The authenticated user.
    #[serde(default)]
    pub user: Option<User>,

    /// Whether the server asked the client to redirect.
    #[serde(default)]
    pub redirect: bool,
}

/// Response of `POST sign-out`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignOutResponse {
    #[serde(default)]
    pub success: bool,
}
