//! Product images

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImageType {
    Main,
    #[default]
    Gallery,
}

impl ImageType {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Main => "MAIN", Self::Gallery => "GALLERY" }
    }
    pub fn parse(s: &str) -> Option<Self> {
        match s { "MAIN" => Some(Self::Main), "GALLERY" => Some(Self::Gallery), _ => None }
    }
}

/// An image attached to a product, ordered by `position` (not unique).
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
    pub id: Uuid,
    pub product_id: Uuid,
    pub image_url: String,
    pub alt_text: Option<String>,
    pub position: i32,
    pub image_type: ImageType,
    /// Asset-host identifier; `None` for images linked by URL only.
    pub asset_id: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub file_size: Option<i64>,
    pub mimetype: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductImage {
    pub fn create(product_id: Uuid, image_url: impl Into<String>, position: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), product_id, image_url: image_url.into(), alt_text: None, position,
            image_type: ImageType::Gallery, asset_id: None, width: None, height: None,
            file_size: None, mimetype: None, created_at: now, updated_at: now,
        }
    }
    pub fn touch(&mut self) { self.updated_at = Utc::now(); }
}
