//! Service layer for Castdeck
//!
//! Business logic shared by the HTTP API, the dispatch daemon and the queue
//! CLI. `CastdeckService` is the single entry point; it owns the shared
//! `Arc<Database>`, the publisher registry and the event bus, and hands out
//! the specialized sub-services:
//!
//! - `SchedulerService`: schedule, list and cancel posts
//! - `TemplateService`: named content templates
//! - `EngagementService`: per-post counters and account roll-ups
//! - `AccountService`: connect and disconnect platform accounts
//! - `HashtagService`: tag indexing, performance and suggestions
//! - `MediaService`: uploaded media files
//! - `AnalyticsService`: account, post and period analytics
//! - `NotificationService`: persisted publish outcomes
//! - `EventBus`: lifecycle event distribution
//!
//! # Example
//!
//! ```no_run
//! use libcastdeck::service::CastdeckService;
//! use libcastdeck::service::scheduler::ScheduleRequest;
//!
//! # async fn example() -> libcastdeck::Result<()> {
//! let service = CastdeckService::new().await?;
//!
//! let post = service
//!     .scheduler()
//!     .schedule(ScheduleRequest {
//!         account_id: "3f0c...".to_string(),
//!         content: "Launch day! #rust".to_string(),
//!         ..Default::default()
//!     })
//!     .await?;
//! println!("Scheduled {} for {}", post.id, post.scheduled_at);
//! # Ok(())
//! # }
//! ```

pub mod accounts;
pub mod analytics;
pub mod engagement;
pub mod events;
pub mod hashtags;
pub mod media;
pub mod notifications;
pub mod scheduler;
pub mod templates;

pub use events::{Event, EventBus, EventReceiver};

use self::accounts::AccountService;
use self::analytics::AnalyticsService;
use self::engagement::EngagementService;
use self::hashtags::HashtagService;
use self::media::MediaService;
use self::notifications::NotificationService;
use self::scheduler::SchedulerService;
use self::templates::TemplateService;
use crate::dispatch::Dispatcher;
use crate::error::{CastdeckError, ConfigError};
use crate::platforms::PublisherRegistry;
use crate::{Config, Database, Result};
use std::sync::Arc;

/// Buffered events per subscriber before the slowest one starts lagging
const EVENT_CAPACITY: usize = 256;

/// Main service facade that coordinates all sub-services
///
/// All sub-services share the same `Arc<Database>`, registry and event bus,
/// so cloning the facade is cheap and every clone observes the same state.
#[derive(Clone)]
pub struct CastdeckService {
    db: Arc<Database>,
    config: Arc<Config>,
    registry: Arc<PublisherRegistry>,
    event_bus: EventBus,
    scheduler: SchedulerService,
    templates: TemplateService,
    engagement: EngagementService,
    accounts: AccountService,
    hashtags: HashtagService,
    media: MediaService,
    analytics: AnalyticsService,
    notifications: NotificationService,
}

impl CastdeckService {
    /// Create a service from the configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or the
    /// database cannot be opened and migrated.
    pub async fn new() -> Result<Self> {
        let config = Config::load()?;
        Self::from_config(config).await
    }

    /// Create a service with publishers for every enabled platform
    pub async fn from_config(config: Config) -> Result<Self> {
        let db_path = crate::config::resolve_db_path(Some(&config.database.path))?;
        let db_path_str = db_path.to_str().ok_or_else(|| {
            CastdeckError::Config(ConfigError::MissingField(
                "database path is not valid UTF-8".to_string(),
            ))
        })?;
        let db = Database::new(db_path_str).await?;
        let registry = PublisherRegistry::from_config(&config);

        Ok(Self::with_registry(db, config, registry))
    }

    /// Assemble a service from an open database and a custom registry
    pub fn with_registry(db: Database, config: Config, registry: PublisherRegistry) -> Self {
        let db = Arc::new(db);
        let config = Arc::new(config);
        let registry = Arc::new(registry);
        let event_bus = EventBus::new(EVENT_CAPACITY);

        let scheduler = SchedulerService::new(
            Arc::clone(&db),
            Arc::clone(&registry),
            event_bus.clone(),
            config.dispatch.claim_ttl(),
        );
        let templates = TemplateService::new(Arc::clone(&db));
        let engagement = EngagementService::new(Arc::clone(&db), event_bus.clone());
        let accounts = AccountService::new(
            Arc::clone(&db),
            Arc::clone(&registry),
            config.dispatch.claim_ttl(),
        );
        let hashtags = HashtagService::new(Arc::clone(&db));
        let media = MediaService::new(Arc::clone(&db), config.media.clone());
        let analytics = AnalyticsService::new(Arc::clone(&db));
        let notifications = NotificationService::new(Arc::clone(&db));

        Self {
            db,
            config,
            registry,
            event_bus,
            scheduler,
            templates,
            engagement,
            accounts,
            hashtags,
            media,
            analytics,
            notifications,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &PublisherRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &SchedulerService {
        &self.scheduler
    }

    pub fn templates(&self) -> &TemplateService {
        &self.templates
    }

    pub fn engagement(&self) -> &EngagementService {
        &self.engagement
    }

    pub fn accounts(&self) -> &AccountService {
        &self.accounts
    }

    pub fn hashtags(&self) -> &HashtagService {
        &self.hashtags
    }

    pub fn media(&self) -> &MediaService {
        &self.media
    }

    pub fn analytics(&self) -> &AnalyticsService {
        &self.analytics
    }

    pub fn notifications(&self) -> &NotificationService {
        &self.notifications
    }

    /// Subscribe to lifecycle events
    ///
    /// Only events raised in this process are delivered, including those of
    /// a dispatcher created through [`CastdeckService::dispatcher`].
    pub fn subscribe(&self) -> EventReceiver {
        self.event_bus.subscribe()
    }

    /// A dispatcher sharing this service's database, publishers and events
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            Arc::clone(&self.db),
            Arc::clone(&self.registry),
            self.event_bus.clone(),
            self.config.dispatch.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::mock::MockPublisher;
    use crate::types::PostStatus;
    use scheduler::ScheduleRequest;
    use serial_test::serial;
    use std::collections::HashMap;
    use tempfile::TempDir;

    async fn service() -> (CastdeckService, Arc<MockPublisher>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("castdeck.db");
        let db = Database::new(db_path.to_str().unwrap()).await.unwrap();

        let publisher = Arc::new(MockPublisher::success("mock"));
        let mut registry = PublisherRegistry::new();
        registry.register(publisher.clone());

        let service = CastdeckService::with_registry(db, Config::default(), registry);
        (service, publisher, temp_dir)
    }

    #[tokio::test]
    #[serial]
    async fn test_from_config_uses_configured_path() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("castdeck.db");
        let mut config = Config::default();
        config.database.path = db_path.to_str().unwrap().to_string();

        let service = CastdeckService::from_config(config).await.unwrap();
        assert!(db_path.exists());
        assert!(service.registry().contains("twitter"));
        assert!(!service.registry().contains("mock"));
    }

    #[tokio::test]
    async fn test_dispatcher_shares_event_bus() {
        let (service, publisher, _temp_dir) = service().await;

        let mut auth = HashMap::new();
        auth.insert("username".to_string(), "ann".to_string());
        let account = service.accounts().connect("mock", &auth).await.unwrap();

        let post = service
            .scheduler()
            .schedule(ScheduleRequest {
                account_id: account.id.clone(),
                content: "now".to_string(),
                scheduled_time: Some(chrono::Utc::now()),
                ..Default::default()
            })
            .await
            .unwrap();

        let mut events = service.subscribe();
        let report = service.dispatcher().tick(chrono::Utc::now()).await.unwrap();
        assert_eq!(report.published, 1);
        assert_eq!(publisher.publish_call_count(), 1);

        assert!(matches!(
            events.recv().await.unwrap(),
            Event::PostPublished { ref post_id, .. } if *post_id == post.id
        ));
        assert_eq!(
            service.scheduler().get(&post.id).await.unwrap().status,
            PostStatus::Published
        );
    }
}
