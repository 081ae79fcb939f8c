//! Customer records, one per user

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::distinct_ids;
use crate::domain::aggregates::Customer;
use crate::domain::value_objects::{Page, PageRequest};
use crate::repository::{Catalog, CustomerFilter};
use crate::state::AppState;
use crate::{CatalogError, Result};

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerInput {
    pub user_id: Uuid,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub username: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomerInput {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub username: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerStats {
    pub total: u64,
}

#[derive(Clone)]
pub struct CustomerService {
    catalog: Arc<dyn Catalog>,
}

impl CustomerService {
    pub fn new(state: &AppState) -> Self { Self { catalog: state.catalog.clone() } }

    pub async fn create(&self, input: CreateCustomerInput) -> Result<Customer> {
        input.validate()?;
        if self.catalog.find_user(input.user_id).await?.is_none() {
            return Err(CatalogError::not_found(format!("User {} not found", input.user_id)));
        }
        if self.catalog.find_customer_by_user(input.user_id).await?.is_some() {
            return Err(CatalogError::bad_request("Customer already exists for this user"));
        }
        let mut customer = Customer::create(input.user_id, input.email.trim().to_lowercase());
        customer.username = input.username;
        customer.phone = input.phone;
        customer.address = input.address;
        self.catalog.insert_customer(&customer).await?;
        tracing::info!(customer_id = %customer.id, user_id = %customer.user_id, "customer created");
        Ok(customer)
    }

    pub async fn list(&self, query: &CustomerQuery) -> Result<Page<Customer>> {
        let req = PageRequest::new(query.page, query.limit);
        let filter = CustomerFilter { ids: None, search: query.search.clone().filter(|s| !s.trim().is_empty()) };
        let total = self.catalog.count_customers(&filter).await?;
        let data = self.catalog.list_customers(&filter, Some(req)).await?;
        Ok(Page::new(data, total, req))
    }

    pub async fn find_one(&self, id: Uuid) -> Result<Customer> {
        self.catalog.find_customer(id).await?.ok_or_else(|| CatalogError::not_found(format!("Customer {id} not found")))
    }

    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Customer> {
        self.catalog
            .find_customer_by_user(user_id)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("No customer for user {user_id}")))
    }

    pub async fn update(&self, id: Uuid, input: UpdateCustomerInput) -> Result<Customer> {
        input.validate()?;
        let mut customer = self.find_one(id).await?;
        if let Some(email) = input.email { customer.email = email.trim().to_lowercase(); }
        if input.username.is_some() { customer.username = input.username; }
        if input.phone.is_some() { customer.phone = input.phone; }
        if input.address.is_some() { customer.address = input.address; }
        customer.touch();
        self.catalog.save_customer(&customer).await?;
        Ok(customer)
    }

    pub async fn remove(&self, id: Uuid) -> Result<Customer> {
        let customer = self.find_one(id).await?;
        self.catalog.delete_customers(&[id]).await?;
        Ok(customer)
    }

    pub async fn bulk_remove(&self, ids: &[Uuid]) -> Result<u64> {
        let ids = distinct_ids(ids)?;
        let deleted = self.catalog.delete_customers(&ids).await?;
        if deleted == 0 { return Err(CatalogError::not_found("No customers found for the given ids")); }
        Ok(deleted)
    }

    pub async fn stats(&self) -> Result<CustomerStats> {
        Ok(CustomerStats { total: self.catalog.count_customers(&CustomerFilter::default()).await? })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::User;
    use crate::Config;

    async fn setup() -> (CustomerService, Uuid) {
        let state = AppState::in_memory(Config::for_tests());
        let user = User::create("buyer@example.com", "Buyer", None);
        state.catalog.insert_user(&user).await.unwrap();
        (CustomerService::new(&state), user.id)
    }

    fn input(user_id: Uuid) -> CreateCustomerInput {
        CreateCustomerInput {
            user_id, email: "Buyer@Example.com".into(), username: Some("buyer".into()),
            phone: Some("+2348000000000".into()), address: None,
        }
    }

    #[tokio::test]
    async fn test_one_customer_per_user() {
        let (svc, user) = setup().await;
        let customer = svc.create(input(user)).await.unwrap();
        assert_eq!(customer.email, "buyer@example.com");
        assert!(matches!(svc.create(input(user)).await, Err(CatalogError::BadRequest(_))));
        assert_eq!(svc.find_by_user(user).await.unwrap().id, customer.id);
    }

    #[tokio::test]
    async fn test_search_matches_phone() {
        let (svc, user) = setup().await;
        svc.create(input(user)).await.unwrap();
        let page = svc.list(&CustomerQuery { search: Some("2348".into()), ..Default::default() }).await.unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(svc.stats().await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let (svc, _) = setup().await;
        assert!(matches!(svc.create(input(Uuid::new_v4())).await, Err(CatalogError::NotFound(_))));
    }
}
