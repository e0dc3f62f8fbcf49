//! Dispatch loop for scheduled posts
//!
//! Every tick scans the `scheduled_posts` table for due posts, claims each
//! one with a lease, hands it to the publisher of the account's platform and
//! writes the outcome back. Posts of one account are published in scan
//! order; different accounts are dispatched concurrently.
//!
//! The same loop periodically pulls engagement counters for published posts
//! through [`Publisher::insights`].

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, error, info, warn};

use crate::config::DispatchConfig;
use crate::error::{CastdeckError, PublishError};
use crate::platforms::{Publisher, PublisherRegistry};
use crate::service::events::{Event, EventBus};
use crate::types::{
    truncate_to_secs, Account, Notification, NotificationKind, PostMetrics, ScheduledPost,
};
use crate::{Database, Result};

/// Largest exponent applied to the retry delay
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Longest wait between two attempts, whatever the configured delay
const MAX_RETRY_WAIT_DAYS: i64 = 30;

/// What a single tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct TickReport {
    /// Posts this tick won the claim for
    pub claimed: usize,
    pub published: usize,
    /// Posts that reached `failed`
    pub failed: usize,
    /// Posts released for a later attempt
    pub retried: usize,
    /// Due posts that could not be claimed or processed
    pub skipped: usize,
}

impl TickReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::NotClaimed => {
                self.skipped += 1;
                return;
            }
            Outcome::Published => self.published += 1,
            Outcome::Retried => self.retried += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::ClaimLost => {}
        }
        self.claimed += 1;
    }

    fn merge(&mut self, other: TickReport) {
        self.claimed += other.claimed;
        self.published += other.published;
        self.failed += other.failed;
        self.retried += other.retried;
        self.skipped += other.skipped;
    }

    /// True when the tick found nothing to claim
    pub fn is_idle(&self) -> bool {
        self.claimed == 0 && self.skipped == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    NotClaimed,
    Published,
    Retried,
    Failed,
    /// Claimed, but the lease expired and was taken before the outcome
    /// could be written
    ClaimLost,
}

/// Drives scheduled posts to a terminal status
#[derive(Clone)]
pub struct Dispatcher {
    db: Arc<Database>,
    registry: Arc<PublisherRegistry>,
    event_bus: EventBus,
    settings: DispatchConfig,
}

impl Dispatcher {
    pub fn new(
        db: Arc<Database>,
        registry: Arc<PublisherRegistry>,
        event_bus: EventBus,
        settings: DispatchConfig,
    ) -> Self {
        Self {
            db,
            registry,
            event_bus,
            settings,
        }
    }

    pub fn settings(&self) -> &DispatchConfig {
        &self.settings
    }

    /// Publish every post due at `now`
    ///
    /// Failures of individual posts are recorded on the post and counted in
    /// the report; only a failure to scan the table is returned as an error.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport> {
        let now = truncate_to_secs(now);
        let stale_before = now - self.settings.claim_ttl();

        let due = self
            .db
            .due_posts(now, stale_before, self.settings.batch_size)
            .await?;

        if due.is_empty() {
            return Ok(TickReport::default());
        }

        info!("Found {} post(s) due for publishing", due.len());

        let groups = group_by_account(due);
        let reports = join_all(
            groups
                .into_iter()
                .map(|(account_id, posts)| self.dispatch_account(account_id, posts, now)),
        )
        .await;

        let mut report = TickReport::default();
        for r in reports {
            report.merge(r);
        }

        info!(
            claimed = report.claimed,
            published = report.published,
            retried = report.retried,
            failed = report.failed,
            skipped = report.skipped,
            "Dispatch tick complete"
        );
        Ok(report)
    }

    async fn dispatch_account(
        &self,
        account_id: String,
        posts: Vec<ScheduledPost>,
        now: DateTime<Utc>,
    ) -> TickReport {
        let mut report = TickReport::default();

        let account = match self.db.get_account(&account_id).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                warn!("Account {} vanished, skipping {} post(s)", account_id, posts.len());
                report.skipped = posts.len();
                return report;
            }
            Err(e) => {
                error!("Failed to load account {}: {}", account_id, e);
                report.skipped = posts.len();
                return report;
            }
        };

        let publisher = self.registry.get(&account.platform);

        // Sequential within the account keeps scan order
        for post in posts {
            let post_id = post.id.clone();
            match self
                .dispatch_post(&account, publisher.as_deref(), post, now)
                .await
            {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    error!("Error dispatching post {}: {}", post_id, e);
                    report.skipped += 1;
                }
            }
        }

        report
    }

    async fn dispatch_post(
        &self,
        account: &Account,
        publisher: Option<&dyn Publisher>,
        post: ScheduledPost,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        let token = uuid::Uuid::new_v4().to_string();
        let stale_before = now - self.settings.claim_ttl();

        if !self
            .db
            .claim_post(&post.id, &token, now, stale_before)
            .await?
        {
            debug!("Post {} already taken, skipping", post.id);
            return Ok(Outcome::NotClaimed);
        }

        debug!(post_id = %post.id, platform = %account.platform, "Claimed post");

        let result = match publisher {
            Some(publisher) => self.publish_with_timeout(publisher, account, &post).await,
            None => Err(PublishError::Unsupported(format!(
                "no publisher registered for platform '{}'",
                account.platform
            ))),
        };

        match result {
            Ok(platform_post_id) => {
                if !self
                    .db
                    .mark_published(&post.id, &token, &platform_post_id, now)
                    .await?
                {
                    return Ok(self.claim_lost(&post.id));
                }

                info!(
                    post_id = %post.id,
                    platform = %account.platform,
                    platform_post_id = %platform_post_id,
                    "Post published"
                );
                self.notify(
                    Notification::new(
                        NotificationKind::Success,
                        format!("Post published on {} as {}", account.platform, platform_post_id),
                    )
                    .for_post(&post.id, &account.id),
                )
                .await;
                self.event_bus.emit(Event::PostPublished {
                    post_id: post.id,
                    account_id: account.id.clone(),
                    platform: account.platform.clone(),
                    platform_post_id,
                });
                Ok(Outcome::Published)
            }
            Err(err) => self.handle_failure(account, &post, &token, err, now).await,
        }
    }

    async fn publish_with_timeout(
        &self,
        publisher: &dyn Publisher,
        account: &Account,
        post: &ScheduledPost,
    ) -> std::result::Result<String, PublishError> {
        let limit = self.settings.publish_timeout();
        let handle = account.handle();

        match timeout(limit, publisher.publish(&handle, &post.content, &post.media_refs)).await {
            Ok(result) => result,
            Err(_) => Err(PublishError::Timeout(format!(
                "publish to {} timed out after {}s",
                account.platform,
                limit.as_secs()
            ))),
        }
    }

    async fn handle_failure(
        &self,
        account: &Account,
        post: &ScheduledPost,
        token: &str,
        err: PublishError,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        let attempts = post.attempts + 1;
        let message = err.to_string();
        let will_retry = err.is_retryable() && attempts < self.settings.max_attempts;

        let written = if will_retry {
            let retry_at = now
                .checked_add_signed(self.backoff(attempts))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            warn!(
                "Post {} failed on {} (attempt {}/{}), retrying at {}: {}",
                post.id, account.platform, attempts, self.settings.max_attempts, retry_at, message
            );
            self.db
                .defer_post(&post.id, token, &message, retry_at, now)
                .await?
        } else {
            error!(
                "Post {} failed on {} after {} attempt(s): {}",
                post.id, account.platform, attempts, message
            );
            self.db.mark_failed(&post.id, token, &message, now).await?
        };

        if !written {
            return Ok(self.claim_lost(&post.id));
        }

        if !will_retry {
            self.notify(
                Notification::new(
                    NotificationKind::Error,
                    format!(
                        "Post failed on {} after {} attempt(s): {}",
                        account.platform, attempts, message
                    ),
                )
                .for_post(&post.id, &account.id),
            )
            .await;
        }

        self.event_bus.emit(Event::PostFailed {
            post_id: post.id.clone(),
            account_id: account.id.clone(),
            platform: account.platform.clone(),
            error: message,
            attempts,
            will_retry,
        });

        Ok(if will_retry {
            Outcome::Retried
        } else {
            Outcome::Failed
        })
    }

    /// `retry_delay * 2^(attempts - 1)`, capped at 30 days
    fn backoff(&self, attempts: u32) -> chrono::Duration {
        let exponent = attempts.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        let cap = chrono::Duration::days(MAX_RETRY_WAIT_DAYS);
        self.settings
            .retry_delay()
            .checked_mul(1_i32 << exponent)
            .map_or(cap, |wait| wait.min(cap))
    }

    /// Record a notification; losing one never fails the dispatch
    async fn notify(&self, notification: Notification) {
        if let Err(e) = self.db.insert_notification(&notification).await {
            warn!(
                post_id = ?notification.post_id,
                error = %e,
                "Failed to record notification"
            );
        }
    }

    fn claim_lost(&self, post_id: &str) -> Outcome {
        let err = CastdeckError::Conflict(format!(
            "claim on post {} expired before its outcome was recorded",
            post_id
        ));
        warn!("{}", err);
        Outcome::ClaimLost
    }

    /// Pull fresh counters for published posts whose record is older than
    /// the refresh interval
    ///
    /// Returns the number of records updated. Platforms that fail are logged
    /// and retried on a later call.
    pub async fn refresh_metrics(&self, now: DateTime<Utc>) -> Result<usize> {
        let now = truncate_to_secs(now);
        let stale = self
            .db
            .stale_published_posts(
                now - self.settings.metrics_refresh_interval(),
                self.settings.batch_size,
            )
            .await?;

        if stale.is_empty() {
            return Ok(0);
        }

        debug!("Refreshing metrics for {} post(s)", stale.len());

        let mut accounts: HashMap<String, Option<Account>> = HashMap::new();
        let mut refreshed = 0;

        for post in stale {
            let Some(platform_post_id) = post.platform_post_id.as_deref() else {
                continue;
            };

            if !accounts.contains_key(&post.account_id) {
                let account = self.db.get_account(&post.account_id).await?;
                accounts.insert(post.account_id.clone(), account);
            }
            let Some(account) = accounts.get(&post.account_id).and_then(Option::as_ref) else {
                continue;
            };
            let Some(publisher) = self.registry.get(&account.platform) else {
                debug!("No publisher for '{}', skipping metrics", account.platform);
                continue;
            };

            let metrics = match timeout(
                self.settings.publish_timeout(),
                publisher.insights(&account.handle(), platform_post_id),
            )
            .await
            {
                Ok(Ok(metrics)) => sanitize(metrics),
                Ok(Err(e)) => {
                    warn!("Failed to fetch metrics for post {}: {}", post.id, e);
                    continue;
                }
                Err(_) => {
                    warn!("Fetching metrics for post {} timed out", post.id);
                    continue;
                }
            };

            let record = self
                .db
                .upsert_engagement(
                    &post.id,
                    metrics.likes,
                    metrics.comments,
                    metrics.shares,
                    metrics.sentiment,
                    now,
                )
                .await?;
            self.db.touch_account_sync(&account.id, now).await?;

            self.event_bus.emit(Event::MetricsUpdated {
                post_id: record.post_id,
                likes: record.likes,
                comments: record.comments,
                shares: record.shares,
                sentiment: record.sentiment,
            });
            refreshed += 1;
        }

        if refreshed > 0 {
            info!("Refreshed metrics for {} post(s)", refreshed);
        }
        Ok(refreshed)
    }

    /// Tick and refresh until `shutdown` is set
    ///
    /// Errors of a single iteration are logged and the loop carries on. The
    /// flag is checked every second while waiting for the next poll.
    pub async fn run(&self, shutdown: Arc<AtomicBool>) -> Result<()> {
        let poll_secs = self.settings.poll_interval().as_secs().max(1);
        info!("Dispatcher running, polling every {}s", poll_secs);

        loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("Shutdown requested, stopping dispatcher");
                break;
            }

            self.run_once(Utc::now()).await;

            for _ in 0..poll_secs {
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                sleep(Duration::from_secs(1)).await;
            }
        }

        Ok(())
    }

    /// One tick followed by one metrics refresh, logging instead of failing
    pub async fn run_once(&self, now: DateTime<Utc>) -> TickReport {
        let report = match self.tick(now).await {
            Ok(report) => report,
            Err(e) => {
                error!("Error processing due posts: {}", e);
                TickReport::default()
            }
        };

        if let Err(e) = self.refresh_metrics(now).await {
            error!("Error refreshing metrics: {}", e);
        }

        report
    }
}

/// Group posts by account, keeping scan order within and across groups
fn group_by_account(posts: Vec<ScheduledPost>) -> Vec<(String, Vec<ScheduledPost>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<ScheduledPost>)> = Vec::new();

    for post in posts {
        match index.get(&post.account_id) {
            Some(&i) => groups[i].1.push(post),
            None => {
                index.insert(post.account_id.clone(), groups.len());
                groups.push((post.account_id.clone(), vec![post]));
            }
        }
    }

    groups
}

// Platform counters occasionally go negative after deletions
fn sanitize(metrics: PostMetrics) -> PostMetrics {
    PostMetrics {
        likes: metrics.likes.max(0),
        comments: metrics.comments.max(0),
        shares: metrics.shares.max(0),
        sentiment: metrics
            .sentiment
            .filter(|s| s.is_finite())
            .map(|s| s.clamp(-1.0, 1.0)),
    }
}
