//! Maps opaque session ids to running game instances.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::champdup::{ChampdUp, ChampdUpConfig};
use crate::config::ConfigRejection;
use crate::session::{GameSession, SharedSession};
use crate::types::{generate_session_id, SessionId, Token};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no game found with ID: {0}")]
    NotFound(SessionId),
    #[error("unknown game kind: {0}")]
    UnknownKind(String),
}

/// Everything a creator needs to drive their new session.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CreatedSession {
    pub id: SessionId,
    pub host_token: Token,
    /// Config keys that were rejected (and kept their defaults).
    pub errors: Vec<ConfigRejection>,
}

/// Owns every running session. Sessions are fully independent; this lock
/// only guards the id map, never any session's own state.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SharedSession<ChampdUp>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session of the given kind. Config keys are validated
    /// individually; rejected ones keep their defaults and are reported.
    pub async fn create(
        &self,
        kind: &str,
        public_config: Option<&serde_json::Map<String, serde_json::Value>>,
    ) -> Result<CreatedSession, RegistryError> {
        if kind != "champdup" {
            return Err(RegistryError::UnknownKind(kind.to_string()));
        }
        let mut config = ChampdUpConfig::default();
        let errors = match public_config {
            Some(map) => config.apply(map),
            None => Vec::new(),
        };
        let max_players = config.max_players;

        let mut sessions = self.sessions.write().await;
        // Regenerate on collision; six uppercase letters collide rarely but
        // sessions are long-lived.
        let id = loop {
            let candidate = generate_session_id();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };
        let session = GameSession::create(id.clone(), ChampdUp::new(config), max_players);
        let host_token = session.lock().await.engine.host_token.clone();
        sessions.insert(id.clone(), session);
        tracing::info!(session = %id, "created champdup session");
        Ok(CreatedSession {
            id,
            host_token,
            errors,
        })
    }

    pub async fn get(&self, id: &str) -> Result<SharedSession<ChampdUp>, RegistryError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Kill a session and drop it from the map. The session's timer and
    /// connections die with it.
    pub async fn destroy(&self, id: &str) -> Result<(), RegistryError> {
        let session = {
            let mut sessions = self.sessions.write().await;
            sessions
                .remove(id)
                .ok_or_else(|| RegistryError::NotFound(id.to_string()))?
        };
        session.lock().await.destroy();
        tracing::info!(session = %id, "destroyed session");
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GameStatus, SESSION_ID_LENGTH};

    #[tokio::test]
    async fn test_create_and_lookup() {
        let registry = SessionRegistry::new();
        let created = registry.create("champdup", None).await.unwrap();
        assert_eq!(created.id.len(), SESSION_ID_LENGTH);
        assert!(created.errors.is_empty());
        assert!(registry.get(&created.id).await.is_ok());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_kind_rejected() {
        let registry = SessionRegistry::new();
        let result = registry.create("crackbox2", None).await;
        assert_eq!(
            result.unwrap_err(),
            RegistryError::UnknownKind("crackbox2".into())
        );
    }

    #[tokio::test]
    async fn test_lookup_unknown_session() {
        let registry = SessionRegistry::new();
        assert_eq!(
            registry.get("ABCDEF").await.unwrap_err(),
            RegistryError::NotFound("ABCDEF".into())
        );
    }

    #[tokio::test]
    async fn test_config_rejections_are_per_key() {
        let registry = SessionRegistry::new();
        let body = serde_json::json!({
            "max_players": 2,
            "bonus_round_enabled": false,
            "made_up_key": 1,
        });
        let created = registry
            .create("champdup", body.as_object())
            .await
            .unwrap();
        let keys: Vec<&str> = created.errors.iter().map(|(k, _)| k.as_str()).collect();
        assert!(keys.contains(&"max_players"));
        assert!(keys.contains(&"made_up_key"));
        assert!(!keys.contains(&"bonus_round_enabled"));

        // The accepted key applied; the rejected one kept its default.
        let session = registry.get(&created.id).await.unwrap();
        let guard = session.lock().await;
        assert_eq!(guard.engine.max_players, 10);
        assert!(!guard.game.config.bonus_round_enabled);
    }

    #[tokio::test]
    async fn test_destroy_stops_session() {
        let registry = SessionRegistry::new();
        let created = registry.create("champdup", None).await.unwrap();
        let session = registry.get(&created.id).await.unwrap();
        registry.destroy(&created.id).await.unwrap();
        assert!(registry.get(&created.id).await.is_err());
        assert_eq!(session.lock().await.engine.status, GameStatus::Stopped);
        assert_eq!(
            registry.destroy(&created.id).await.unwrap_err(),
            RegistryError::NotFound(created.id.clone())
        );
    }
}
