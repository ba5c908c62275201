use super::guard::Role;
use super::Claims;
use uuid::Uuid;

/// Authenticated user context extracted from JWT
/// This is attached to request extensions after successful auth
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User ID (from JWT sub claim)
    pub user_id: Uuid,

    /// User email if available
    pub email: Option<String>,

    /// User role from the token's role claim
    pub role: Role,
}

impl AuthContext {
    pub fn from_claims(claims: &Claims) -> Result<Self, &'static str> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| "Invalid user ID in token")?;

        let role = claims
            .role
            .as_deref()
            .and_then(Role::parse)
            .ok_or("Unknown role in token")?;

        Ok(Self {
            user_id,
            email: claims.email.clone(),
            role,
        })
    }
}
