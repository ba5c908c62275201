//! HS256 token verification and environment-conditioned auth special cases.
//!
//! The dev-mode bypass and the first-user-becomes-admin bootstrap both live
//! here, behind construction, so business logic never branches on them.

use anyhow::{Context, Result};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use parking_lot::RwLock;
use sqlx::PgPool;
use uuid::Uuid;

use super::guard::Role;
use super::{AuthContext, Claims};
use crate::config::Settings;

#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
    dev_bypass: bool,
}

impl TokenVerifier {
    pub fn from_settings(settings: &Settings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&settings.jwt_issuer]);
        validation.set_audience(&[&settings.jwt_audience]);
        validation.validate_exp = true;

        // The bypass only ever takes effect in the dev environment
        let dev_bypass = settings.auth_dev_bypass && settings.env.is_dev();
        if dev_bypass {
            tracing::warn!("AUTH_DEV_BYPASS enabled - all requests act as a fixed admin identity");
        }

        Self {
            decoding_key: DecodingKey::from_secret(settings.jwt_secret.as_bytes()),
            validation,
            dev_bypass,
        }
    }

    pub fn dev_bypass(&self) -> bool {
        self.dev_bypass
    }

    /// Fixed identity used when the dev bypass is active.
    pub fn dev_identity(&self) -> AuthContext {
        AuthContext {
            user_id: Uuid::nil(),
            email: Some("dev@localhost".to_string()),
            role: Role::Admin,
        }
    }

    /// Verify a bearer token and return its claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .context("JWT verification failed")?;
        Ok(data.claims)
    }
}

/// One-shot latch for the "first user becomes admin" bootstrap.
///
/// Until an admin exists, each authenticated request checks whether the
/// caller is the only registered user and promotes them if so. Once any
/// admin is observed the latch settles and the check never runs again.
pub struct AdminBootstrap {
    settled: RwLock<bool>,
}

impl AdminBootstrap {
    pub fn new() -> Self {
        Self {
            settled: RwLock::new(false),
        }
    }

    pub async fn promote_if_first(
        &self,
        db: &PgPool,
        ctx: &mut AuthContext,
    ) -> Result<(), sqlx::Error> {
        let settled = { *self.settled.read() };
        if settled {
            return Ok(());
        }

        let admin_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
                .fetch_one(db)
                .await?;
        if admin_count > 0 {
            *self.settled.write() = true;
            return Ok(());
        }

        let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(db)
            .await?;
        if total_users == 1 {
            let updated = sqlx::query("UPDATE users SET role = 'admin' WHERE id = $1")
                .bind(ctx.user_id)
                .execute(db)
                .await?;

            if updated.rows_affected() == 1 {
                tracing::info!(user_id = %ctx.user_id, "Bootstrapped first user as admin");
                ctx.role = Role::Admin;
                *self.settled.write() = true;
            }
        }

        Ok(())
    }
}

impl Default for AdminBootstrap {
    fn default() -> Self {
        Self::new()
    }
}
