use thiserror::Error;
use url::Url;

use crate::model::LearnerId;

/// Query parameters that may carry the learner id on a page URL.
pub const LEARNER_QUERY_PARAMS: [&str; 2] = ["learner", "learnerId"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum IdentityError {
    #[error("no learner identity could be resolved")]
    Missing,
}

/// Where a resolved learner id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    Session,
    Query,
    Durable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub learner: LearnerId,
    pub source: IdentitySource,
}

/// Raw identity candidates, checked in priority order: session, query, durable.
#[derive(Debug, Clone, Default)]
pub struct IdentitySources {
    pub session: Option<String>,
    pub query: Option<String>,
    pub durable: Option<String>,
}

impl IdentitySources {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_session(mut self, value: Option<String>) -> Self {
        self.session = value;
        self
    }

    #[must_use]
    pub fn with_durable(mut self, value: Option<String>) -> Self {
        self.durable = value;
        self
    }

    /// Take the query candidate from the first recognised learner parameter of `url`.
    #[must_use]
    pub fn with_page_url(mut self, url: &Url) -> Self {
        self.query = url
            .query_pairs()
            .find(|(name, value)| {
                LEARNER_QUERY_PARAMS.contains(&name.as_ref()) && !value.trim().is_empty()
            })
            .map(|(_, value)| value.into_owned());
        self
    }

    /// Resolve the learner id from the first usable candidate.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Missing` if every candidate is absent or blank.
    pub fn resolve(&self) -> Result<ResolvedIdentity, IdentityError> {
        let candidates = [
            (self.session.as_deref(), IdentitySource::Session),
            (self.query.as_deref(), IdentitySource::Query),
            (self.durable.as_deref(), IdentitySource::Durable),
        ];

        candidates
            .into_iter()
            .find_map(|(raw, source)| {
                let learner = LearnerId::new(raw?).ok()?;
                Some(ResolvedIdentity { learner, source })
            })
            .ok_or(IdentityError::Missing)
    }
}
