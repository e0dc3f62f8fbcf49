//! Castdeck - scheduling and engagement tracking for social media posts
//!
//! The library holds everything the binaries share: configuration, the
//! SQLite store, platform publishers, the service layer and the dispatch
//! loop that publishes due posts.

pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod platforms;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use dispatch::{Dispatcher, TickReport};
pub use error::{CastdeckError, Result};
pub use service::CastdeckService;
pub use types::{
    Account, ContentTemplate, EngagementRecord, MediaFile, Notification, PostStatus, ScheduledPost,
};
