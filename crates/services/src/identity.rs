use std::sync::Arc;

use progress_core::model::{IdentityError, IdentitySource, IdentitySources, ResolvedIdentity};
use storage::LocalStore;
use tracing::{debug, info, warn};

use crate::events::{EngineEvent, EventBus};

/// Durable slot remembering the last resolved learner across sessions.
pub const DURABLE_IDENTITY_KEY: &str = "identity:learner";

/// Resolves the learner for one session and remembers it durably.
#[derive(Clone)]
pub struct IdentityService {
    store: Arc<dyn LocalStore>,
    bus: EventBus,
}

impl IdentityService {
    #[must_use]
    pub fn new(store: Arc<dyn LocalStore>, bus: EventBus) -> Self {
        Self { store, bus }
    }

    /// Resolve the learner from `sources`, filling the durable candidate from the store
    /// when the caller did not supply one.
    ///
    /// A session or query identity is written back to the durable slot.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Missing` when nothing resolves; an
    /// `EngineEvent::IdentityMissing` is published first.
    pub async fn resolve(
        &self,
        mut sources: IdentitySources,
    ) -> Result<ResolvedIdentity, IdentityError> {
        if sources.durable.is_none() {
            sources.durable = self.durable().await;
        }

        match sources.resolve() {
            Ok(resolved) => {
                info!(learner = %resolved.learner, source = ?resolved.source, "learner identity resolved");
                if resolved.source != IdentitySource::Durable {
                    self.remember(&resolved).await;
                }
                Ok(resolved)
            }
            Err(err) => {
                debug!("no learner identity available");
                self.bus.publish(EngineEvent::IdentityMissing);
                Err(err)
            }
        }
    }

    /// Forget the durable identity (sign-out).
    pub async fn forget(&self) {
        if let Err(err) = self.store.remove(DURABLE_IDENTITY_KEY).await {
            warn!(error = %err, "failed to clear durable learner identity");
        }
    }

    async fn durable(&self) -> Option<String> {
        match self.store.get(DURABLE_IDENTITY_KEY).await {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "durable learner identity unreadable");
                None
            }
        }
    }

    async fn remember(&self, resolved: &ResolvedIdentity) {
        if let Err(err) = self
            .store
            .set(DURABLE_IDENTITY_KEY, resolved.learner.as_str())
            .await
        {
            warn!(error = %err, "failed to remember learner identity");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::InMemoryStore;
    use url::Url;

    #[tokio::test]
    async fn query_identity_is_remembered_for_next_session() {
        let store = Arc::new(InMemoryStore::new());
        let service = IdentityService::new(store.clone(), EventBus::default());
        let url = Url::parse("https://learn.example/dashboard?learner=ada").unwrap();

        let first = service
            .resolve(IdentitySources::new().with_page_url(&url))
            .await
            .unwrap();
        assert_eq!(first.source, IdentitySource::Query);
        assert_eq!(
            store.get(DURABLE_IDENTITY_KEY).await.unwrap().as_deref(),
            Some("ada")
        );

        let second = service.resolve(IdentitySources::new()).await.unwrap();
        assert_eq!(second.learner.as_str(), "ada");
        assert_eq!(second.source, IdentitySource::Durable);
    }

    #[tokio::test]
    async fn missing_identity_publishes_event() {
        let store = Arc::new(InMemoryStore::new());
        let bus = EventBus::default();
        let mut events = bus.subscribe();
        let service = IdentityService::new(store, bus);

        let err = service.resolve(IdentitySources::new()).await.unwrap_err();
        assert_eq!(err, IdentityError::Missing);
        assert_eq!(events.try_recv().unwrap(), EngineEvent::IdentityMissing);
    }

    #[tokio::test]
    async fn forget_clears_durable_slot() {
        let store = Arc::new(InMemoryStore::new());
        let service = IdentityService::new(store.clone(), EventBus::default());
        service
            .resolve(IdentitySources::new().with_session(Some("ada".into())))
            .await
            .unwrap();

        service.forget().await;

        assert!(store.get(DURABLE_IDENTITY_KEY).await.unwrap().is_none());
        assert!(service.resolve(IdentitySources::new()).await.is_err());
    }
}
