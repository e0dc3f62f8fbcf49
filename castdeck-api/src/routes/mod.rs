pub mod accounts;
pub mod analytics;
pub mod content;
pub mod engagement;
pub mod hashtags;
pub mod media;
pub mod notifications;
pub mod templates;

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}
