use serde::{Deserialize, Serialize};

/// JWT claims structure for StayQA access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// Audience
    pub aud: String,

    /// Issuer
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// User email - optional
    #[serde(default)]
    pub email: Option<String>,

    /// User role (admin | property_manager | staff)
    #[serde(default)]
    pub role: Option<String>,
}
