//! Domain events
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::ProductStatus;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "aggregate", content = "event")]
pub enum DomainEvent {
    Product(ProductEvent),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductEvent {
    Created { product_id: Uuid, store_id: Uuid, slug: String },
    StatusChanged { product_id: Uuid, from: ProductStatus, to: ProductStatus },
    Trashed { product_id: Uuid, store_id: Uuid, deleted_at: DateTime<Utc> },
    Restored { product_id: Uuid, store_id: Uuid },
    Purged { product_id: Uuid, store_id: Uuid },
}

impl DomainEvent {
    /// NATS subject, e.g. `catalog.product.trashed`.
    pub fn subject(&self) -> String {
        match self {
            DomainEvent::Product(e) => {
                let name = match e {
                    ProductEvent::Created { .. } => "created",
                    ProductEvent::StatusChanged { .. } => "status_changed",
                    ProductEvent::Trashed { .. } => "trashed",
                    ProductEvent::Restored { .. } => "restored",
                    ProductEvent::Purged { .. } => "purged",
                };
                format!("catalog.product.{name}")
            }
        }
    }
}
