use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Header names the upstream identity layer resolves callers into.
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";
pub const ACTOR_ID_HEADER: &str = "x-actor-id";

/// Role of an authenticated caller.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Customer,
    Restaurant,
    Driver,
    Admin,
    /// Internal automation (dispatch triggers, monitors).
    System,
}

/// A caller resolved once at the boundary: an explicit role plus a single
/// stable id, instead of role-keyed dynamic field lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub role: ActorRole,
    pub id: Uuid,
}

impl Actor {
    pub fn new(role: ActorRole, id: Uuid) -> Self {
        Self { role, id }
    }

    pub fn customer(id: Uuid) -> Self {
        Self::new(ActorRole::Customer, id)
    }

    pub fn restaurant(id: Uuid) -> Self {
        Self::new(ActorRole::Restaurant, id)
    }

    pub fn driver(id: Uuid) -> Self {
        Self::new(ActorRole::Driver, id)
    }

    pub fn admin(id: Uuid) -> Self {
        Self::new(ActorRole::Admin, id)
    }

    /// Actor used for automatic transitions recorded in the status history.
    pub fn system() -> Self {
        Self::new(ActorRole::System, Uuid::nil())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let role_raw = parts
            .headers
            .get(ACTOR_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ServiceError::Unauthorized(format!("missing {} header", ACTOR_ROLE_HEADER))
            })?;
        let id_raw = parts
            .headers
            .get(ACTOR_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ServiceError::Unauthorized(format!("missing {} header", ACTOR_ID_HEADER))
            })?;

        let role: ActorRole = role_raw.parse().map_err(|_| {
            ServiceError::Validation(format!("unknown actor role '{}'", role_raw))
        })?;
        let id = Uuid::parse_str(id_raw).map_err(|_| {
            ServiceError::Validation(format!("actor id '{}' is not a valid UUID", id_raw))
        })?;

        Ok(Actor { role, id })
    }
}
