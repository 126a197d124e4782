use serde::{Deserialize, Serialize};

use crate::model::{LearnerId, OwnedRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            "system" | "auto" => Some(Self::System),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        }
    }
}

/// Persisted theme choice for one learner.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ThemePreference {
    #[serde(default)]
    owner: Option<LearnerId>,
    pub theme: Theme,
}

impl ThemePreference {
    #[must_use]
    pub fn new(theme: Theme) -> Self {
        Self { owner: None, theme }
    }
}

impl OwnedRecord for ThemePreference {
    fn owner(&self) -> Option<&LearnerId> {
        self.owner.as_ref()
    }

    fn stamp_owner(&mut self, learner: &LearnerId) {
        self.owner = Some(learner.clone());
    }
}
