//! Property domain types
//!
//! Hotels and other managed lodging sites surveys are submitted against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Property entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request DTO for creating a property
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePropertyRequest {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Request DTO for updating a property
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePropertyRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Response DTO for property
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyResponse {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Property> for PropertyResponse {
    fn from(p: Property) -> Self {
        Self {
            id: p.id,
            organization_id: p.organization_id,
            name: p.name,
            address: p.address,
            city: p.city,
            country: p.country,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}
