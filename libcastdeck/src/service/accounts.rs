//! Connecting social accounts

use chrono::Duration;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::CastdeckError;
use crate::platforms::PublisherRegistry;
use crate::types::{now_secs, Account};
use crate::{Database, Result};

#[derive(Clone)]
pub struct AccountService {
    db: Arc<Database>,
    registry: Arc<PublisherRegistry>,
    claim_ttl: Duration,
}

impl AccountService {
    pub fn new(db: Arc<Database>, registry: Arc<PublisherRegistry>, claim_ttl: Duration) -> Self {
        Self {
            db,
            registry,
            claim_ttl,
        }
    }

    /// Connect an account through the platform's publisher and store it
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if no publisher is registered for `platform`
    /// - `Publish` if the platform refuses the auth data
    pub async fn connect(&self, platform: &str, auth: &HashMap<String, String>) -> Result<Account> {
        let publisher = self.registry.get(platform).ok_or_else(|| {
            CastdeckError::InvalidArgument(format!(
                "unsupported platform '{}' (available: {})",
                platform,
                self.registry.names().join(", ")
            ))
        })?;

        let handle = publisher.connect(auth).await?;
        let account = Account::from_handle(platform, handle);
        self.db.insert_account(&account).await?;

        tracing::info!(
            account_id = %account.id,
            platform,
            username = %account.username,
            "Account connected"
        );
        Ok(account)
    }

    pub async fn get(&self, account_id: &str) -> Result<Account> {
        self.db
            .get_account(account_id)
            .await?
            .ok_or_else(|| CastdeckError::not_found("Account", account_id))
    }

    pub async fn list(&self) -> Result<Vec<Account>> {
        self.db.list_accounts().await
    }

    /// Remove an account and everything scheduled or measured for it
    ///
    /// # Errors
    ///
    /// - `NotFound` if the account does not exist
    /// - `Conflict` while a dispatcher is publishing one of its posts
    pub async fn disconnect(&self, account_id: &str) -> Result<()> {
        let now = now_secs();
        if self.db.delete_account(account_id, now - self.claim_ttl).await? {
            tracing::info!(account_id, "Account disconnected");
            return Ok(());
        }

        if self.db.account_exists(account_id).await? {
            Err(CastdeckError::Conflict(format!(
                "account {} has a post being published; try again shortly",
                account_id
            )))
        } else {
            Err(CastdeckError::not_found("Account", account_id))
        }
    }
}
