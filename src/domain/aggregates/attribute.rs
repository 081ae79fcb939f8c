//! Free-form product attributes ("Color" = "Blue")

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductAttribute {
    pub id: Uuid,
    pub product_id: Uuid,
    pub attribute_name: String,
    pub attribute_value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductAttribute {
    pub fn create(product_id: Uuid, name: impl Into<String>, value: impl Into<String>) -> Self {
        let now = Utc::now();
        Self { id: Uuid::now_v7(), product_id, attribute_name: name.into(), attribute_value: value.into(), created_at: now, updated_at: now }
    }
    pub fn touch(&mut self) { self.updated_at = Utc::now(); }
}
