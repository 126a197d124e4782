//! Learner-scoped access to the local store.
//!
//! Every record lives under `namespace:learner:entity`. Records written before
//! scoping existed live under `namespace:entity`; they are adopted by the
//! current learner on first read unless they name a different owner.

use std::sync::Arc;

use progress_core::model::{LearnerId, Namespace, OwnedRecord, legacy_key, scoped_key};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::repository::{LocalStore, StorageError};

/// Key-scoping resolver bound to the session's learner (if any).
///
/// Storage failures never escape: reads degrade to "no cached value" and
/// writes report `false`.
#[derive(Clone)]
pub struct ScopedStore {
    store: Arc<dyn LocalStore>,
    learner: Option<LearnerId>,
}

impl ScopedStore {
    #[must_use]
    pub fn new(store: Arc<dyn LocalStore>, learner: Option<LearnerId>) -> Self {
        Self { store, learner }
    }

    #[must_use]
    pub fn learner(&self) -> Option<&LearnerId> {
        self.learner.as_ref()
    }

    /// Load the record for `entity`, migrating an ownerless legacy slot when possible.
    ///
    /// - A scoped record naming another owner is ignored.
    /// - A legacy record naming another owner is never reused.
    /// - An ownerless legacy record is returned untouched for an anonymous session,
    ///   and otherwise moved into the learner's scoped slot.
    pub async fn resolve<T>(&self, namespace: Namespace, entity: &str) -> Option<T>
    where
        T: OwnedRecord + Serialize + DeserializeOwned,
    {
        if let Some(learner) = &self.learner {
            let key = scoped_key(namespace, learner, entity);
            if let Some(record) = self.read::<T>(&key).await {
                if record.owner().is_none_or(|owner| owner == learner) {
                    return Some(record);
                }
                debug!(%key, "ignoring scoped record owned by another learner");
            }
        }

        let legacy = legacy_key(namespace, entity);
        let mut record = self.read::<T>(&legacy).await?;

        let Some(learner) = &self.learner else {
            if record.owner().is_some() {
                debug!(key = %legacy, "legacy record has an owner; anonymous session cannot use it");
                return None;
            }
            return Some(record);
        };

        if let Some(owner) = record.owner() {
            if owner != learner {
                debug!(key = %legacy, %owner, "legacy record owned by another learner; not reused");
                return None;
            }
        }

        record.stamp_owner(learner);
        let scoped = scoped_key(namespace, learner, entity);
        if self.write(&scoped, &record).await {
            if let Err(err) = self.store.remove(&legacy).await {
                warn!(key = %legacy, error = %err, "failed to drop migrated legacy record");
            }
            debug!(from = %legacy, to = %scoped, "migrated legacy record");
        }
        Some(record)
    }

    /// Persist `record` under the learner's scoped slot, stamped with their id.
    ///
    /// Returns `false` without writing when no learner is signed in or the
    /// write fails.
    pub async fn save<T>(&self, namespace: Namespace, entity: &str, record: &mut T) -> bool
    where
        T: OwnedRecord + Serialize,
    {
        let Some(learner) = &self.learner else {
            debug!(%namespace, "no learner identity; skipping save");
            return false;
        };
        record.stamp_owner(learner);
        self.write(&scoped_key(namespace, learner, entity), record)
            .await
    }

    /// Delete the learner's scoped slot for `entity`.
    pub async fn remove(&self, namespace: Namespace, entity: &str) -> bool {
        let Some(learner) = &self.learner else {
            return false;
        };
        let key = scoped_key(namespace, learner, entity);
        match self.store.remove(&key).await {
            Ok(()) => true,
            Err(err) => {
                warn!(%key, error = %err, "failed to remove scoped record");
                false
            }
        }
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(%key, error = %err, "local store read failed; treating as cache miss");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(%key, error = %err, "unreadable local record; treating as cache miss");
                None
            }
        }
    }

    async fn write<T: Serialize>(&self, key: &str, record: &T) -> bool {
        let result = match serde_json::to_string(record) {
            Ok(json) => self.store.set(key, &json).await,
            Err(err) => Err(StorageError::Serialization(err.to_string())),
        };
        match result {
            Ok(()) => true,
            Err(err) => {
                warn!(%key, error = %err, "local store write failed");
                false
            }
        }
    }
}
