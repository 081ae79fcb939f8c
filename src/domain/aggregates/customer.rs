//! Customer records, one per user

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn create(user_id: Uuid, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self { id: Uuid::now_v7(), user_id, email: email.into(), username: None, phone: None, address: None, created_at: now, updated_at: now }
    }
    pub fn touch(&mut self) { self.updated_at = Utc::now(); }
}
