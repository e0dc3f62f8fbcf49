//! Mock publisher for testing
//!
//! A configurable publisher that can simulate successes, scripted failures
//! and slow platforms without network access. Integration tests share one
//! instance with the dispatcher (through `Arc`) and inspect the call counts
//! afterwards.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::sleep;

use super::{PublishResult, Publisher};
use crate::error::PublishError;
use crate::types::{AccountHandle, PostMetrics};

/// Configuration for mock publisher behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub name: String,

    /// Error returned by `connect`, if any
    pub connect_error: Option<PublishError>,

    /// Error returned by every `publish` call once the script is exhausted
    pub publish_error: Option<PublishError>,

    /// Errors returned by the first `publish` calls, in order
    pub scripted_failures: Vec<PublishError>,

    /// Delay before `publish` completes (simulates network latency)
    pub delay: Duration,

    pub character_limit: Option<usize>,
    pub requires_media: bool,
    pub max_media: usize,

    /// Counters returned by `insights`
    pub metrics: PostMetrics,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            connect_error: None,
            publish_error: None,
            scripted_failures: Vec::new(),
            delay: Duration::from_millis(0),
            character_limit: None,
            requires_media: false,
            max_media: 4,
            metrics: PostMetrics::default(),
        }
    }
}

pub struct MockPublisher {
    config: MockConfig,
    script: Mutex<VecDeque<PublishError>>,
    connect_calls: AtomicUsize,
    publish_calls: AtomicUsize,
    insights_calls: AtomicUsize,
    published: Mutex<Vec<String>>,
}

// A panicking test thread must not hide the counters from the others
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockPublisher {
    pub fn new(config: MockConfig) -> Self {
        let script = config.scripted_failures.iter().cloned().collect();
        Self {
            config,
            script: Mutex::new(script),
            connect_calls: AtomicUsize::new(0),
            publish_calls: AtomicUsize::new(0),
            insights_calls: AtomicUsize::new(0),
            published: Mutex::new(Vec::new()),
        }
    }

    /// A publisher that always succeeds
    pub fn success(name: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            ..Default::default()
        })
    }

    /// A publisher whose every `publish` fails with `error`
    pub fn publish_failure(name: &str, error: PublishError) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            publish_error: Some(error),
            ..Default::default()
        })
    }

    /// Fails with each of `failures` in turn, then succeeds
    pub fn flaky(name: &str, failures: Vec<PublishError>) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            scripted_failures: failures,
            ..Default::default()
        })
    }

    pub fn connect_failure(name: &str, error: PublishError) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            connect_error: Some(error),
            ..Default::default()
        })
    }

    pub fn with_delay(name: &str, delay: Duration) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            delay,
            ..Default::default()
        })
    }

    pub fn with_limit(name: &str, limit: usize) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            character_limit: Some(limit),
            ..Default::default()
        })
    }

    pub fn with_metrics(name: &str, metrics: PostMetrics) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            metrics,
            ..Default::default()
        })
    }

    pub fn connect_call_count(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn publish_call_count(&self) -> usize {
        self.publish_calls.load(Ordering::SeqCst)
    }

    pub fn insights_call_count(&self) -> usize {
        self.insights_calls.load(Ordering::SeqCst)
    }

    /// Content of every successful publish, in call order
    pub fn published_content(&self) -> Vec<String> {
        lock(&self.published).clone()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn character_limit(&self) -> Option<usize> {
        self.config.character_limit
    }

    fn requires_media(&self) -> bool {
        self.config.requires_media
    }

    fn max_media(&self) -> usize {
        self.config.max_media
    }

    async fn connect(&self, auth: &HashMap<String, String>) -> PublishResult<AccountHandle> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = &self.config.connect_error {
            return Err(err.clone());
        }

        let username = auth
            .get("username")
            .cloned()
            .unwrap_or_else(|| "mock-user".to_string());

        Ok(AccountHandle {
            platform_user_id: format!("{}-{}", self.config.name, username),
            username,
            access_token: auth
                .get("access_token")
                .cloned()
                .unwrap_or_else(|| "mock-token".to_string()),
            refresh_token: auth.get("refresh_token").cloned(),
        })
    }

    async fn publish(
        &self,
        _handle: &AccountHandle,
        content: &str,
        _media: &[String],
    ) -> PublishResult<String> {
        self.publish_calls.fetch_add(1, Ordering::SeqCst);

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        if let Some(err) = lock(&self.script).pop_front() {
            return Err(err);
        }

        if let Some(err) = &self.config.publish_error {
            return Err(err.clone());
        }

        lock(&self.published).push(content.to_string());
        Ok(format!("{}-{}", self.config.name, uuid::Uuid::new_v4()))
    }

    async fn insights(
        &self,
        _handle: &AccountHandle,
        _platform_post_id: &str,
    ) -> PublishResult<PostMetrics> {
        self.insights_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.config.metrics.clone())
    }
}
