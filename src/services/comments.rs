//! Product comments and ratings

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::distinct_ids;
use super::products::ProductService;
use crate::auth::AuthUser;
use crate::domain::aggregates::{Comment, MAX_RATING};
use crate::domain::value_objects::{Page, PageRequest};
use crate::repository::{Catalog, CommentFilter};
use crate::state::AppState;
use crate::{CatalogError, Result};

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentInput {
    pub product_id: Uuid,
    #[validate(length(max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 2000))]
    pub comment: String,
    #[validate(range(min = 0, max = 5))]
    pub rating: i16,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCommentInput {
    #[validate(length(max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 2000))]
    pub comment: Option<String>,
    #[validate(range(min = 0, max = 5))]
    pub rating: Option<i16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub product_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub min_rating: Option<i16>,
    pub max_rating: Option<i16>,
    pub search: Option<String>,
}

impl CommentQuery {
    fn filter(&self) -> Result<CommentFilter> {
        for rating in [self.min_rating, self.max_rating].into_iter().flatten() {
            check_rating(rating)?;
        }
        if let (Some(min), Some(max)) = (self.min_rating, self.max_rating) {
            if min > max { return Err(CatalogError::bad_request("minRating must not exceed maxRating")); }
        }
        Ok(CommentFilter {
            ids: None,
            product_id: self.product_id,
            user_id: self.user_id,
            min_rating: self.min_rating,
            max_rating: self.max_rating,
            search: self.search.clone().filter(|s| !s.trim().is_empty()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RatingCount {
    pub rating: i16,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentStats {
    pub total: u64,
    pub average_rating: f64,
    pub by_rating: Vec<RatingCount>,
}

fn check_rating(rating: i16) -> Result<()> {
    if (0..=MAX_RATING).contains(&rating) { Ok(()) } else {
        Err(CatalogError::bad_request(format!("Rating must be between 0 and {MAX_RATING}")))
    }
}

#[derive(Clone)]
pub struct CommentService {
    catalog: Arc<dyn Catalog>,
    products: ProductService,
}

impl CommentService {
    pub fn new(state: &AppState) -> Self { Self { catalog: state.catalog.clone(), products: ProductService::new(state) } }

    pub async fn create(&self, author: &AuthUser, input: CreateCommentInput) -> Result<Comment> {
        input.validate()?;
        check_rating(input.rating)?;
        self.products.require_live(input.product_id).await?;
        let mut comment = Comment::create(author.user_id, input.product_id, input.comment.trim(), input.rating);
        comment.title = input.title;
        self.catalog.insert_comment(&comment).await?;
        tracing::info!(comment_id = %comment.id, product_id = %comment.product_id, "comment created");
        Ok(comment)
    }

    pub async fn list(&self, query: &CommentQuery) -> Result<Page<Comment>> {
        let filter = query.filter()?;
        let req = PageRequest::new(query.page, query.limit);
        let total = self.catalog.count_comments(&filter).await?;
        let data = self.catalog.list_comments(&filter, Some(req)).await?;
        Ok(Page::new(data, total, req))
    }

    pub async fn find_by_product(&self, product_id: Uuid, query: &CommentQuery) -> Result<Page<Comment>> {
        self.products.require_live(product_id).await?;
        self.list(&CommentQuery { product_id: Some(product_id), ..query.clone() }).await
    }

    pub async fn find_one(&self, id: Uuid) -> Result<Comment> {
        self.catalog.find_comment(id).await?.ok_or_else(|| CatalogError::not_found(format!("Comment {id} not found")))
    }

    async fn owned(&self, id: Uuid, actor: &AuthUser) -> Result<Comment> {
        let comment = self.find_one(id).await?;
        if comment.user_id != actor.user_id && !actor.is_admin() {
            return Err(CatalogError::forbidden("Only the author can change this comment"));
        }
        Ok(comment)
    }

    pub async fn update(&self, id: Uuid, actor: &AuthUser, input: UpdateCommentInput) -> Result<Comment> {
        input.validate()?;
        let mut comment = self.owned(id, actor).await?;
        if input.title.is_some() { comment.title = input.title; }
        if let Some(text) = input.comment { comment.comment = text.trim().to_string(); }
        if let Some(rating) = input.rating {
            check_rating(rating)?;
            comment.rating = rating;
        }
        comment.touch();
        self.catalog.save_comment(&comment).await?;
        Ok(comment)
    }

    pub async fn remove(&self, id: Uuid, actor: &AuthUser) -> Result<Comment> {
        let comment = self.owned(id, actor).await?;
        self.catalog.delete_comments(&[id]).await?;
        Ok(comment)
    }

    pub async fn bulk_remove(&self, ids: &[Uuid], actor: &AuthUser) -> Result<u64> {
        let ids = distinct_ids(ids)?;
        if !actor.is_admin() {
            let filter = CommentFilter { ids: Some(ids.clone()), ..Default::default() };
            let found = self.catalog.list_comments(&filter, None).await?;
            if found.iter().any(|c| c.user_id != actor.user_id) {
                return Err(CatalogError::forbidden("Only the author can delete these comments"));
            }
        }
        let deleted = self.catalog.delete_comments(&ids).await?;
        if deleted == 0 { return Err(CatalogError::not_found("No comments found for the given ids")); }
        Ok(deleted)
    }

    pub async fn stats(&self, product_id: Option<Uuid>) -> Result<CommentStats> {
        let histogram = self.catalog.rating_histogram(product_id).await?;
        let total: u64 = histogram.iter().map(|(_, n)| n).sum();
        let weighted: u64 = histogram.iter().map(|(r, n)| u64::from(r.unsigned_abs()) * n).sum();
        let average_rating = if total == 0 { 0.0 } else { (weighted as f64 / total as f64 * 100.0).round() / 100.0 };
        Ok(CommentStats {
            total,
            average_rating,
            by_rating: histogram.into_iter().map(|(rating, count)| RatingCount { rating, count }).collect(),
        })
    }
}
