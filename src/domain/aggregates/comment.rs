//! Product comments with an optional 0-5 rating

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub const MAX_RATING: i16 = 5;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub title: Option<String>,
    pub comment: String,
    pub rating: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn create(user_id: Uuid, product_id: Uuid, comment: impl Into<String>, rating: i16) -> Self {
        let now = Utc::now();
        Self { id: Uuid::now_v7(), user_id, product_id, title: None, comment: comment.into(), rating, created_at: now, updated_at: now }
    }
    pub fn touch(&mut self) { self.updated_at = Utc::now(); }
}
