//! Store Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A merchant storefront. Each user owns at most one store.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Store {
    pub fn create(user_id: Uuid, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), user_id, name: name.into(), description: None, address: None,
            city: None, state: None, created_at: now, updated_at: now,
        }
    }
    pub fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreImageType { Logo, Banner }

impl StoreImageType {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Logo => "LOGO", Self::Banner => "BANNER" }
    }
    pub fn parse(s: &str) -> Option<Self> {
        match s { "LOGO" => Some(Self::Logo), "BANNER" => Some(Self::Banner), _ => None }
    }
}

/// Logo or banner, one of each per store.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreImage {
    pub id: Uuid,
    pub store_id: Uuid,
    pub image_type: StoreImageType,
    pub image_url: String,
    pub asset_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}
