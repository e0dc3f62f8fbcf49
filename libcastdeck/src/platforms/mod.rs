//! Platform abstraction and implementations
//!
//! Each social network is reached through a [`Publisher`]. A publisher turns
//! auth data into an [`AccountHandle`], publishes content for that handle,
//! and reads back engagement counters. Publishers are looked up by platform
//! name in a [`PublisherRegistry`].
//!
//! # Examples
//!
//! ```no_run
//! use libcastdeck::config::Config;
//! use libcastdeck::platforms::PublisherRegistry;
//!
//! # async fn example() -> libcastdeck::error::Result<()> {
//! let registry = PublisherRegistry::from_config(&Config::default());
//! let twitter = registry.get("twitter").expect("enabled by default");
//!
//! twitter.validate("Hello from Castdeck", &[])?;
//! assert_eq!(twitter.character_limit(), Some(280));
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::error::PublishError;
use crate::types::{AccountHandle, PostMetrics};

pub mod facebook;
pub(crate) mod http;
pub mod instagram;
pub mod linkedin;
pub mod twitter;

// Available outside tests so binaries can run against the `mock` platform
pub mod mock;

pub type PublishResult<T> = std::result::Result<T, PublishError>;

/// Unified interface to a social media platform
///
/// Implementations are shared between the request path and the dispatcher,
/// so every method takes `&self`.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Lowercase platform identifier ("twitter", "linkedin", ...)
    fn name(&self) -> &str;

    /// Maximum post length in characters, `None` for no hard limit
    fn character_limit(&self) -> Option<usize>;

    /// Whether a post must carry at least one media reference
    fn requires_media(&self) -> bool {
        false
    }

    /// Maximum number of media references per post
    fn max_media(&self) -> usize {
        4
    }

    /// Check content and media against the platform's limits
    ///
    /// # Errors
    ///
    /// Returns `PublishError::Validation` describing the first violated limit.
    fn validate(&self, content: &str, media: &[String]) -> PublishResult<()> {
        if let Some(limit) = self.character_limit() {
            let length = content.chars().count();
            if length > limit {
                return Err(PublishError::Validation(format!(
                    "{} posts are limited to {} characters (got {})",
                    self.name(),
                    limit,
                    length
                )));
            }
        }

        if self.requires_media() && media.is_empty() {
            return Err(PublishError::Validation(format!(
                "{} posts require at least one media reference",
                self.name()
            )));
        }

        if media.len() > self.max_media() {
            return Err(PublishError::Validation(format!(
                "{} accepts at most {} media references (got {})",
                self.name(),
                self.max_media(),
                media.len()
            )));
        }

        Ok(())
    }

    /// Exchange auth data for an account handle
    ///
    /// # Errors
    ///
    /// Returns `PublishError::Authentication` when required keys are missing
    /// or the platform rejects the token.
    async fn connect(&self, auth: &HashMap<String, String>) -> PublishResult<AccountHandle>;

    /// Publish content and return the platform's id for the new post
    async fn publish(
        &self,
        handle: &AccountHandle,
        content: &str,
        media: &[String],
    ) -> PublishResult<String>;

    /// Current engagement counters of a published post
    async fn insights(
        &self,
        handle: &AccountHandle,
        platform_post_id: &str,
    ) -> PublishResult<PostMetrics>;
}

/// Publishers keyed by platform name
#[derive(Clone, Default)]
pub struct PublisherRegistry {
    publishers: HashMap<String, Arc<dyn Publisher>>,
}

impl PublisherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry for every platform enabled in `config`
    ///
    /// The four network platforms are enabled unless their section says
    /// otherwise. The `mock` platform is registered only when a
    /// `[platforms.mock]` section exists.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();

        let twitter = config.platform(twitter::NAME);
        if twitter.enabled {
            registry.register(Arc::new(twitter::TwitterPublisher::new(
                twitter.api_base.as_deref(),
            )));
        }

        let instagram = config.platform(instagram::NAME);
        if instagram.enabled {
            registry.register(Arc::new(instagram::InstagramPublisher::new(
                instagram.api_base.as_deref(),
            )));
        }

        let facebook = config.platform(facebook::NAME);
        if facebook.enabled {
            registry.register(Arc::new(facebook::FacebookPublisher::new(
                facebook.api_base.as_deref(),
            )));
        }

        let linkedin = config.platform(linkedin::NAME);
        if linkedin.enabled {
            registry.register(Arc::new(linkedin::LinkedInPublisher::new(
                linkedin.api_base.as_deref(),
            )));
        }

        if config.platforms.get("mock").is_some_and(|p| p.enabled) {
            registry.register(Arc::new(mock::MockPublisher::success("mock")));
        }

        tracing::debug!("Registered publishers: {}", registry.names().join(", "));
        registry
    }

    /// Add a publisher, replacing any previous one with the same name
    pub fn register(&mut self, publisher: Arc<dyn Publisher>) {
        self.publishers
            .insert(publisher.name().to_string(), publisher);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Publisher>> {
        self.publishers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.publishers.contains_key(name)
    }

    /// Registered platform names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.publishers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for PublisherRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublisherRegistry")
            .field("publishers", &self.names())
            .finish()
    }
}
