//! Home Assistant state API.
//!
//! The monitor only talks to the API through [`StateClient`], so tests can
//! substitute an in-memory implementation.

mod client;
mod entity;
mod error;

use async_trait::async_trait;
use strum::AsRefStr;
use strum::Display;

pub use client::HaClient;
pub use client::normalize_url;
pub use entity::Attributes;
pub use entity::CONTROLLABLE_DOMAINS;
pub use entity::Entity;
pub use error::ApiError;

/// `homeassistant` domain services that act on a single entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Service {
    Toggle,
    TurnOn,
    TurnOff,
}

/// Calling contract for the remote state API.
#[async_trait]
pub trait StateClient: Send + Sync {
    /// Point the client at a server. `base_url` may omit the trailing `/`.
    fn configure(&self, base_url: &str, token: &str);

    fn is_configured(&self) -> bool;

    /// `GET api/`: succeeds if the server accepts our token.
    async fn probe(&self) -> Result<(), ApiError>;

    /// `GET api/states`
    async fn states(&self) -> Result<Vec<Entity>, ApiError>;

    /// `GET api/states/{entity_id}`
    async fn entity_state(&self, entity_id: &str) -> Result<Entity, ApiError>;

    /// `POST api/services/homeassistant/{service}`
    async fn call_service(&self, service: Service, entity_id: &str) -> Result<(), ApiError>;

    async fn toggle(&self, entity_id: &str) -> Result<(), ApiError> {
        self.call_service(Service::Toggle, entity_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_names() {
        assert_eq!(Service::Toggle.as_ref(), "toggle");
        assert_eq!(Service::TurnOn.as_ref(), "turn_on");
        assert_eq!(Service::TurnOff.to_string(), "turn_off");
    }
}
