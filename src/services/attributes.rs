//! Product attributes (name/value pairs)

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::distinct_ids;
use super::products::ProductService;
use crate::domain::aggregates::ProductAttribute;
use crate::domain::value_objects::{Page, PageRequest};
use crate::repository::{AttributeFilter, Catalog};
use crate::state::AppState;
use crate::{CatalogError, Result};

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAttributeInput {
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 100))]
    pub attribute_name: String,
    #[validate(length(min = 1, max = 500))]
    pub attribute_value: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AttributePair {
    #[validate(length(min = 1, max = 100))]
    pub attribute_name: String,
    #[validate(length(min = 1, max = 500))]
    pub attribute_value: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAttributesInput {
    pub product_id: Uuid,
    #[validate]
    pub attributes: Vec<AttributePair>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAttributeInput {
    #[validate(length(min = 1, max = 100))]
    pub attribute_name: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub attribute_value: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub product_id: Option<Uuid>,
    pub attribute_name: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeStats {
    pub total: u64,
    pub distinct_names: usize,
    pub names: Vec<String>,
}

#[derive(Clone)]
pub struct AttributeService {
    catalog: Arc<dyn Catalog>,
    products: ProductService,
}

impl AttributeService {
    pub fn new(state: &AppState) -> Self { Self { catalog: state.catalog.clone(), products: ProductService::new(state) } }

    pub async fn create(&self, input: CreateAttributeInput) -> Result<ProductAttribute> {
        input.validate()?;
        self.products.require_live(input.product_id).await?;
        let attribute = ProductAttribute::create(input.product_id, input.attribute_name.trim(), input.attribute_value.trim());
        self.catalog.insert_attribute(&attribute).await?;
        Ok(attribute)
    }

    pub async fn create_many(&self, input: CreateAttributesInput) -> Result<Vec<ProductAttribute>> {
        input.validate()?;
        if input.attributes.is_empty() { return Err(CatalogError::bad_request("attributes must not be empty")); }
        self.products.require_live(input.product_id).await?;
        let mut created = Vec::with_capacity(input.attributes.len());
        for pair in &input.attributes {
            let attribute = ProductAttribute::create(input.product_id, pair.attribute_name.trim(), pair.attribute_value.trim());
            self.catalog.insert_attribute(&attribute).await?;
            created.push(attribute);
        }
        tracing::info!(product_id = %input.product_id, count = created.len(), "attributes created");
        Ok(created)
    }

    pub async fn list(&self, query: &AttributeQuery) -> Result<Page<ProductAttribute>> {
        let req = PageRequest::new(query.page, query.limit);
        let filter = AttributeFilter {
            product_id: query.product_id,
            name: query.attribute_name.clone(),
            search: query.search.clone().filter(|s| !s.trim().is_empty()),
        };
        let total = self.catalog.count_attributes(&filter).await?;
        let data = self.catalog.list_attributes(&filter, Some(req)).await?;
        Ok(Page::new(data, total, req))
    }

    pub async fn find_by_product(&self, product_id: Uuid) -> Result<Vec<ProductAttribute>> {
        self.products.require_live(product_id).await?;
        self.catalog.list_attributes(&AttributeFilter { product_id: Some(product_id), ..Default::default() }, None).await
    }

    pub async fn find_one(&self, id: Uuid) -> Result<ProductAttribute> {
        self.catalog.find_attribute(id).await?.ok_or_else(|| CatalogError::not_found(format!("Attribute {id} not found")))
    }

    pub async fn update(&self, id: Uuid, input: UpdateAttributeInput) -> Result<ProductAttribute> {
        input.validate()?;
        let mut attribute = self.find_one(id).await?;
        if let Some(name) = input.attribute_name { attribute.attribute_name = name.trim().to_string(); }
        if let Some(value) = input.attribute_value { attribute.attribute_value = value.trim().to_string(); }
        attribute.touch();
        self.catalog.save_attribute(&attribute).await?;
        Ok(attribute)
    }

    pub async fn remove(&self, id: Uuid) -> Result<ProductAttribute> {
        let attribute = self.find_one(id).await?;
        self.catalog.delete_attributes(&[id]).await?;
        Ok(attribute)
    }

    pub async fn bulk_remove(&self, ids: &[Uuid]) -> Result<u64> {
        let ids = distinct_ids(ids)?;
        let deleted = self.catalog.delete_attributes(&ids).await?;
        if deleted == 0 { return Err(CatalogError::not_found("No attributes found for the given ids")); }
        Ok(deleted)
    }

    pub async fn stats(&self, product_id: Option<Uuid>) -> Result<AttributeStats> {
        let total = self.catalog.count_attributes(&AttributeFilter { product_id, ..Default::default() }).await?;
        let names = self.catalog.distinct_attribute_names(product_id).await?;
        Ok(AttributeStats { total, distinct_names: names.len(), names })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{Store, User};
    use crate::services::products::CreateProductInput;
    use crate::Config;

    async fn setup() -> (AttributeService, Uuid) {
        let state = AppState::in_memory(Config::for_tests());
        let user = User::create("attr@example.com", "Attr", None);
        state.catalog.insert_user(&user).await.unwrap();
        let store = Store::create(user.id, "Attrs");
        state.catalog.insert_store(&store).await.unwrap();
        let product = ProductService::new(&state)
            .create(CreateProductInput {
                store_id: store.id, name: "Shirt".into(), slug: None, description: None, brand: None,
                category: None, status: None, variants: vec![],
            })
            .await
            .unwrap();
        (AttributeService::new(&state), product.product.id())
    }

    fn pair(name: &str, value: &str) -> AttributePair {
        AttributePair { attribute_name: name.into(), attribute_value: value.into() }
    }

    #[tokio::test]
    async fn test_create_many_and_stats() {
        let (svc, product) = setup().await;
        let input = CreateAttributesInput { product_id: product, attributes: vec![pair("Color", "Red"), pair("Size", "M"), pair("Color", "Blue")] };
        assert_eq!(svc.create_many(input).await.unwrap().len(), 3);
        let stats = svc.stats(Some(product)).await.unwrap();
        assert_eq!((stats.total, stats.distinct_names), (3, 2));
    }

    #[tokio::test]
    async fn test_search_and_bulk_remove() {
        let (svc, product) = setup().await;
        let a = svc.create(CreateAttributeInput { product_id: product, attribute_name: "Material".into(), attribute_value: "Cotton".into() }).await.unwrap();
        let page = svc.list(&AttributeQuery { search: Some("cott".into()), ..Default::default() }).await.unwrap();
        assert_eq!(page.pagination.total, 1);
        assert_eq!(svc.bulk_remove(&[a.id]).await.unwrap(), 1);
        assert!(matches!(svc.bulk_remove(&[a.id]).await, Err(CatalogError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_for_missing_product() {
        let (svc, _) = setup().await;
        let err = svc.create(CreateAttributeInput { product_id: Uuid::new_v4(), attribute_name: "A".into(), attribute_value: "B".into() }).await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
    }
}
