use progress_core::model::{Namespace, Theme, ThemePreference};
use storage::ScopedStore;
use tracing::debug;

const THEME_ENTITY: &str = "preference";

/// Per-learner display preferences.
#[derive(Clone)]
pub struct PreferencesService {
    store: ScopedStore,
}

impl PreferencesService {
    #[must_use]
    pub fn new(store: ScopedStore) -> Self {
        Self { store }
    }

    /// Stored theme, or `Theme::System` when nothing is stored.
    pub async fn theme(&self) -> Theme {
        self.store
            .resolve::<ThemePreference>(Namespace::Theme, THEME_ENTITY)
            .await
            .map(|preference| preference.theme)
            .unwrap_or_default()
    }

    /// Persist `theme`. Returns `false` when signed out or the write fails.
    pub async fn set_theme(&self, theme: Theme) -> bool {
        let mut preference = ThemePreference::new(theme);
        let saved = self
            .store
            .save(Namespace::Theme, THEME_ENTITY, &mut preference)
            .await;
        debug!(theme = theme.as_str(), saved, "theme preference updated");
        saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use progress_core::model::LearnerId;
    use std::sync::Arc;
    use storage::InMemoryStore;

    fn service(store: &Arc<InMemoryStore>, learner: Option<&str>) -> PreferencesService {
        PreferencesService::new(ScopedStore::new(
            store.clone(),
            learner.map(|raw| LearnerId::new(raw).unwrap()),
        ))
    }

    #[tokio::test]
    async fn theme_defaults_to_system_and_round_trips() {
        let store = Arc::new(InMemoryStore::new());
        let ada = service(&store, Some("ada"));
        assert_eq!(ada.theme().await, Theme::System);

        assert!(ada.set_theme(Theme::Dark).await);
        assert_eq!(ada.theme().await, Theme::Dark);
        assert_eq!(service(&store, Some("grace")).theme().await, Theme::System);
    }

    #[tokio::test]
    async fn signed_out_theme_is_not_saved() {
        let store = Arc::new(InMemoryStore::new());
        let anonymous = service(&store, None);
        assert!(!anonymous.set_theme(Theme::Light).await);
        assert_eq!(anonymous.theme().await, Theme::System);
    }
}
