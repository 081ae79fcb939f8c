//! User profiles, saved locations and admin account management

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::release_assets;
use crate::assets::{transform, AssetHost, UploadFile, UploadedAsset};
use crate::auth::AuthUser;
use crate::domain::aggregates::{Comment, Customer, ProfileImage, Role, Store, User, UserLocation, UserStatus};
use crate::domain::value_objects::PageRequest;
use crate::repository::{Catalog, CommentFilter, ProfileWrite, UserFilter};
use crate::state::AppState;
use crate::{CatalogError, Result};

const FOLDER: &str = "profiles";
const RECENT_COMMENTS: u32 = 5;

/// A saved address in a profile update. With an `id` it edits that location,
/// without one it adds a new location.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LocationInput {
    pub id: Option<Uuid>,
    #[validate(length(max = 100))]
    pub label: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub address_line: String,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub state: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub country: String,
    #[validate(length(max = 20))]
    pub postal_code: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub is_default: bool,
}

impl LocationInput {
    fn apply(self, location: &mut UserLocation) {
        location.address_line = self.address_line.trim().to_string();
        location.country = self.country.trim().to_string();
        if self.label.is_some() { location.label = self.label; }
        if self.city.is_some() { location.city = self.city; }
        if self.state.is_some() { location.state = self.state; }
        if self.postal_code.is_some() { location.postal_code = self.postal_code; }
        if self.latitude.is_some() { location.latitude = self.latitude; }
        if self.longitude.is_some() { location.longitude = self.longitude; }
        if self.is_default { location.is_default = true; }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileInput {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub username: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate]
    #[serde(default)]
    pub locations: Vec<LocationInput>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdminUpdateUserInput {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub username: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FullProfile {
    #[serde(flatten)]
    pub user: User,
    pub profile_image: Option<ProfileImage>,
    pub locations: Vec<UserLocation>,
    pub store: Option<Store>,
    pub customer: Option<Customer>,
    pub recent_comments: Vec<Comment>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileChange {
    #[serde(flatten)]
    pub profile: FullProfile,
    pub orphaned_assets: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRemoval {
    pub user_id: Uuid,
    pub orphaned_assets: Vec<String>,
}

fn ensure_admin(actor: &AuthUser) -> Result<()> {
    if actor.is_admin() { Ok(()) } else { Err(CatalogError::forbidden("Admin access required")) }
}

fn ensure_self_or_admin(actor: &AuthUser, user_id: Uuid) -> Result<()> {
    if actor.user_id == user_id || actor.is_admin() {
        Ok(())
    } else {
        Err(CatalogError::forbidden("You can only manage your own account"))
    }
}

#[derive(Clone)]
pub struct UserService {
    catalog: Arc<dyn Catalog>,
    assets: Arc<dyn AssetHost>,
}

impl UserService {
    pub fn new(state: &AppState) -> Self { Self { catalog: state.catalog.clone(), assets: state.assets.clone() } }

    async fn require(&self, id: Uuid) -> Result<User> {
        self.catalog.find_user(id).await?.ok_or_else(|| CatalogError::not_found(format!("User {id} not found")))
    }

    async fn owned_location(&self, user_id: Uuid, location_id: Uuid) -> Result<UserLocation> {
        self.catalog
            .find_location(location_id)
            .await?
            .filter(|l| l.user_id == user_id)
            .ok_or_else(|| CatalogError::not_found(format!("Location {location_id} not found")))
    }

    /// Applies name, username and email. A new email must not belong to
    /// another account.
    async fn apply_identity(&self, user: &mut User, name: Option<String>, username: Option<String>, email: Option<String>) -> Result<()> {
        if let Some(name) = name { user.name = name.trim().to_string(); }
        if let Some(username) = username { user.username = Some(username.trim().to_string()); }
        if let Some(email) = email.map(|e| e.trim().to_lowercase()).filter(|e| *e != user.email) {
            if self.catalog.find_user_by_email(&email).await?.is_some_and(|other| other.id != user.id) {
                return Err(CatalogError::bad_request("Email is already registered"));
            }
            user.email = email;
        }
        user.touch();
        Ok(())
    }

    async fn prepare_locations(&self, user_id: Uuid, inputs: Vec<LocationInput>) -> Result<Vec<UserLocation>> {
        if inputs.iter().filter(|l| l.is_default).count() > 1 {
            return Err(CatalogError::bad_request("Only one location can be the default"));
        }
        let mut locations = Vec::with_capacity(inputs.len());
        for input in inputs {
            let mut location = match input.id {
                Some(id) => {
                    if locations.iter().any(|l: &UserLocation| l.id == id) {
                        return Err(CatalogError::bad_request(format!("Location {id} appears twice")));
                    }
                    let mut existing = self.owned_location(user_id, id).await?;
                    existing.touch();
                    existing
                }
                None => UserLocation::create(user_id, "", ""),
            };
            input.apply(&mut location);
            locations.push(location);
        }
        Ok(locations)
    }

    /// Uploads the avatar and a square thumbnail. The thumbnail comes from
    /// `thumbnail` when given, otherwise from `profile`.
    async fn upload_images(&self, profile: Option<UploadFile>, thumbnail: Option<UploadFile>) -> Result<(Option<UploadedAsset>, Option<UploadedAsset>)> {
        let thumb = match thumbnail.as_ref().or(profile.as_ref()) {
            Some(source) => Some(transform::thumbnail(source)?),
            None => None,
        };
        let has_profile = profile.is_some();
        let files: Vec<UploadFile> = profile.into_iter().chain(thumb).collect();
        if files.is_empty() { return Ok((None, None)); }
        let mut uploaded = self.assets.upload_many(files, FOLDER).await?.into_iter();
        let profile_asset = if has_profile { uploaded.next() } else { None };
        Ok((profile_asset, uploaded.next()))
    }

    pub async fn full_profile(&self, user_id: Uuid) -> Result<FullProfile> {
        let user = self.require(user_id).await?;
        let filter = CommentFilter { user_id: Some(user_id), ..Default::default() };
        Ok(FullProfile {
            profile_image: self.catalog.find_profile_image(user_id).await?,
            locations: self.catalog.list_locations(user_id).await?,
            store: self.catalog.find_store_by_user(user_id).await?,
            customer: self.catalog.find_customer_by_user(user_id).await?,
            recent_comments: self.catalog.list_comments(&filter, Some(PageRequest::first(RECENT_COMMENTS))).await?,
            user,
        })
    }

    /// Updates the caller's own profile. Everything is validated before any
    /// upload; uploads are released again if the write fails.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        input: UpdateProfileInput,
        profile: Option<UploadFile>,
        thumbnail: Option<UploadFile>,
    ) -> Result<ProfileChange> {
        input.validate()?;
        for file in profile.iter().chain(thumbnail.iter()) {
            transform::validate(file)?;
        }
        let mut user = self.require(user_id).await?;
        self.apply_identity(&mut user, input.name, input.username, input.email).await?;
        let locations = self.prepare_locations(user_id, input.locations).await?;

        let (profile_asset, thumb_asset) = self.upload_images(profile, thumbnail).await?;
        let image = if profile_asset.is_some() || thumb_asset.is_some() {
            let mut image = self.catalog.find_profile_image(user_id).await?.unwrap_or_else(|| ProfileImage::empty(user_id));
            if let Some(asset) = profile_asset {
                image.profile = Some(asset.url);
                image.profile_asset_id = Some(asset.asset_id);
            }
            if let Some(asset) = thumb_asset {
                image.thumbnail = Some(asset.url);
                image.thumbnail_asset_id = Some(asset.asset_id);
            }
            image.updated_at = Utc::now();
            Some(image)
        } else {
            None
        };
        let new_assets = image.as_ref().map(ProfileImage::asset_ids).unwrap_or_default();

        let write = ProfileWrite { user, locations, image };
        let previous = match self.catalog.save_profile(&write).await {
            Ok(previous) => previous,
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "profile write failed, releasing uploads");
                if let Err(queue) = self.catalog.queue_asset_deletions(&new_assets).await {
                    tracing::warn!(error = %queue, "failed to queue profile uploads for deletion");
                }
                release_assets(self.catalog.as_ref(), self.assets.as_ref(), &new_assets).await;
                return Err(e);
            }
        };

        let replaced: Vec<String> = previous
            .map(|p| p.asset_ids())
            .unwrap_or_default()
            .into_iter()
            .filter(|id| !new_assets.contains(id))
            .collect();
        self.catalog.queue_asset_deletions(&replaced).await?;
        let orphaned_assets = release_assets(self.catalog.as_ref(), self.assets.as_ref(), &replaced).await;
        tracing::info!(%user_id, locations = write.locations.len(), new_image = !new_assets.is_empty(), "profile updated");
        Ok(ProfileChange { profile: self.full_profile(user_id).await?, orphaned_assets })
    }

    pub async fn locations(&self, actor: &AuthUser, user_id: Uuid) -> Result<Vec<UserLocation>> {
        ensure_self_or_admin(actor, user_id)?;
        self.require(user_id).await?;
        self.catalog.list_locations(user_id).await
    }

    pub async fn default_location(&self, actor: &AuthUser, user_id: Uuid) -> Result<UserLocation> {
        self.locations(actor, user_id)
            .await?
            .into_iter()
            .find(|l| l.is_default)
            .ok_or_else(|| CatalogError::not_found("No default location set"))
    }

    pub async fn set_default_location(&self, actor: &AuthUser, user_id: Uuid, location_id: Uuid) -> Result<UserLocation> {
        ensure_self_or_admin(actor, user_id)?;
        self.owned_location(user_id, location_id).await?;
        self.catalog.set_default_location(user_id, location_id).await?;
        tracing::info!(%user_id, %location_id, "default location changed");
        self.owned_location(user_id, location_id).await
    }

    pub async fn delete_location(&self, actor: &AuthUser, user_id: Uuid, location_id: Uuid) -> Result<()> {
        ensure_self_or_admin(actor, user_id)?;
        self.owned_location(user_id, location_id).await?;
        if !self.catalog.delete_location(location_id).await? {
            return Err(CatalogError::not_found(format!("Location {location_id} not found")));
        }
        tracing::info!(%user_id, %location_id, "location deleted");
        Ok(())
    }

    pub async fn list(&self, actor: &AuthUser, role: Option<Role>) -> Result<Vec<User>> {
        ensure_admin(actor)?;
        self.catalog.list_users(&UserFilter { role }).await
    }

    pub async fn find(&self, actor: &AuthUser, id: Uuid) -> Result<User> {
        ensure_self_or_admin(actor, id)?;
        self.require(id).await
    }

    pub async fn update(&self, actor: &AuthUser, id: Uuid, input: AdminUpdateUserInput) -> Result<User> {
        ensure_admin(actor)?;
        input.validate()?;
        let mut user = self.require(id).await?;
        self.apply_identity(&mut user, input.name, input.username, input.email).await?;
        if let Some(role) = input.role { user.role = role; }
        if let Some(status) = input.status { user.status = status; }
        self.catalog.save_user(&user).await?;
        tracing::info!(user_id = %id, admin_id = %actor.user_id, role = user.role.as_str(), status = user.status.as_str(), "user updated by admin");
        Ok(user)
    }

    /// Deletes an account that owns no store, with its locations, avatar,
    /// comments, wishlist and customer record.
    pub async fn remove(&self, actor: &AuthUser, id: Uuid) -> Result<UserRemoval> {
        ensure_admin(actor)?;
        if actor.user_id == id {
            return Err(CatalogError::bad_request("Admins cannot delete their own account"));
        }
        self.require(id).await?;
        if self.catalog.find_store_by_user(id).await?.is_some() {
            return Err(CatalogError::bad_request("User still owns a store; delete the store first"));
        }
        let removal = self.catalog.delete_user(id).await?;
        let orphaned_assets = release_assets(self.catalog.as_ref(), self.assets.as_ref(), &removal.asset_ids).await;
        tracing::info!(user_id = %id, admin_id = %actor.user_id, "user deleted");
        Ok(UserRemoval { user_id: id, orphaned_assets })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::transform::sample_png;
    use crate::assets::InMemoryAssetHost;
    use crate::events::EventPublisher;
    use crate::repository::{AssetLedger, MemoryCatalog, StoreRepository, UserRepository};
    use crate::Config;

    struct Accounts {
        catalog: MemoryCatalog,
        assets: Arc<InMemoryAssetHost>,
        svc: UserService,
        user: AuthUser,
        admin: AuthUser,
    }

    async fn setup() -> Accounts {
        let catalog = MemoryCatalog::new();
        let assets = Arc::new(InMemoryAssetHost::new());
        let state = AppState::new(Config::for_tests(), Arc::new(catalog.clone()), assets.clone(), EventPublisher::disabled());
        let user = User::create("ada@example.com", "Ada", None);
        let mut admin = User::create("root@example.com", "Root", None);
        admin.role = Role::Admin;
        catalog.insert_user(&user).await.unwrap();
        catalog.insert_user(&admin).await.unwrap();
        Accounts {
            catalog,
            assets,
            svc: UserService::new(&state),
            user: AuthUser { user_id: user.id, email: user.email, role: Role::User },
            admin: AuthUser { user_id: admin.id, email: admin.email, role: Role::Admin },
        }
    }

    fn location(address: &str, is_default: bool) -> LocationInput {
        LocationInput {
            id: None, label: None, address_line: address.into(), city: Some("Lagos".into()), state: None,
            country: "NG".into(), postal_code: None, latitude: Some(6.5), longitude: Some(3.4), is_default,
        }
    }

    fn png(name: &str, width: u32, height: u32) -> UploadFile {
        UploadFile { file_name: name.into(), content_type: "image/png".into(), bytes: sample_png(width, height) }
    }

    #[tokio::test]
    async fn test_update_profile_sets_identity_and_locations() {
        let a = setup().await;
        let input = UpdateProfileInput {
            name: Some(" Ada L ".into()),
            email: Some("Ada.L@Example.com".into()),
            locations: vec![location("1 Marina", false), location("2 Broad St", true)],
            ..Default::default()
        };
        let change = a.svc.update_profile(a.user.user_id, input, None, None).await.unwrap();
        assert_eq!(change.profile.user.name, "Ada L");
        assert_eq!(change.profile.user.email, "ada.l@example.com");
        assert_eq!(change.profile.locations.len(), 2);
        assert_eq!(change.profile.locations[0].address_line, "2 Broad St");
        assert!(change.profile.locations[0].is_default);
        assert!(change.profile.profile_image.is_none());
    }

    #[tokio::test]
    async fn test_update_profile_rejects_two_defaults() {
        let a = setup().await;
        let input = UpdateProfileInput { locations: vec![location("A", true), location("B", true)], ..Default::default() };
        let err = a.svc.update_profile(a.user.user_id, input, None, None).await.unwrap_err();
        assert!(matches!(err, CatalogError::BadRequest(_)));
        assert!(a.catalog.list_locations(a.user.user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_profile_rejects_taken_email() {
        let a = setup().await;
        let input = UpdateProfileInput { email: Some("root@example.com".into()), ..Default::default() };
        let err = a.svc.update_profile(a.user.user_id, input, None, None).await.unwrap_err();
        assert!(matches!(err, CatalogError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_update_profile_cannot_edit_foreign_location() {
        let a = setup().await;
        let theirs = UpdateProfileInput { locations: vec![location("Admin HQ", true)], ..Default::default() };
        let change = a.svc.update_profile(a.admin.user_id, theirs, None, None).await.unwrap();
        let foreign = change.profile.locations[0].id;

        let hijack = UpdateProfileInput { locations: vec![LocationInput { id: Some(foreign), ..location("Mine now", false) }], ..Default::default() };
        let err = a.svc.update_profile(a.user.user_id, hijack, None, None).await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
        assert_eq!(a.catalog.find_location(foreign).await.unwrap().unwrap().address_line, "Admin HQ");
    }

    #[tokio::test]
    async fn test_avatar_upload_builds_thumbnail_and_replaces_old_assets() {
        let a = setup().await;
        let first = a.svc.update_profile(a.user.user_id, UpdateProfileInput::default(), Some(png("me.png", 300, 150)), None).await.unwrap();
        let image = first.profile.profile_image.clone().unwrap();
        assert!(image.profile.is_some() && image.thumbnail.is_some());
        let old_assets = image.asset_ids();
        assert_eq!(old_assets.len(), 2);
        assert_eq!(a.assets.len().await, 2);

        let second = a.svc.update_profile(a.user.user_id, UpdateProfileInput::default(), Some(png("me2.png", 64, 64)), None).await.unwrap();
        assert!(second.orphaned_assets.is_empty());
        for id in &old_assets {
            assert!(!a.assets.contains(id).await);
        }
        assert_eq!(a.assets.len().await, 2);
    }

    #[tokio::test]
    async fn test_thumbnail_only_keeps_existing_avatar() {
        let a = setup().await;
        let first = a.svc.update_profile(a.user.user_id, UpdateProfileInput::default(), Some(png("me.png", 32, 32)), None).await.unwrap();
        let before = first.profile.profile_image.unwrap();

        let second = a.svc.update_profile(a.user.user_id, UpdateProfileInput::default(), None, Some(png("t.png", 32, 32))).await.unwrap();
        let after = second.profile.profile_image.unwrap();
        assert_eq!(after.profile_asset_id, before.profile_asset_id);
        assert_ne!(after.thumbnail_asset_id, before.thumbnail_asset_id);
        assert!(a.assets.contains(before.profile_asset_id.as_deref().unwrap()).await);
        assert!(!a.assets.contains(before.thumbnail_asset_id.as_deref().unwrap()).await);
    }

    #[tokio::test]
    async fn test_failed_profile_write_releases_uploads() {
        let a = setup().await;
        a.catalog.fail_profile_writes(true);
        let input = UpdateProfileInput { name: Some("Changed".into()), ..Default::default() };
        let err = a.svc.update_profile(a.user.user_id, input, Some(png("me.png", 16, 16)), None).await.unwrap_err();
        assert!(matches!(err, CatalogError::Internal(_)));
        assert!(a.assets.is_empty().await);
        assert!(a.catalog.pending_asset_deletions(10).await.unwrap().is_empty());
        assert_eq!(a.catalog.find_user(a.user.user_id).await.unwrap().unwrap().name, "Ada");
    }

    #[tokio::test]
    async fn test_invalid_avatar_uploads_nothing() {
        let a = setup().await;
        let bogus = UploadFile { file_name: "me.pdf".into(), content_type: "application/pdf".into(), bytes: vec![1, 2, 3] };
        let err = a.svc.update_profile(a.user.user_id, UpdateProfileInput::default(), Some(bogus), None).await.unwrap_err();
        assert!(matches!(err, CatalogError::BadRequest(_)));
        assert!(a.assets.is_empty().await);
    }

    #[tokio::test]
    async fn test_default_location_switch_and_delete() {
        let a = setup().await;
        let input = UpdateProfileInput { locations: vec![location("Home", true), location("Work", false)], ..Default::default() };
        let locations = a.svc.update_profile(a.user.user_id, input, None, None).await.unwrap().profile.locations;
        let work = locations.iter().find(|l| l.address_line == "Work").unwrap().id;

        let switched = a.svc.set_default_location(&a.user, a.user.user_id, work).await.unwrap();
        assert!(switched.is_default);
        assert_eq!(a.svc.default_location(&a.user, a.user.user_id).await.unwrap().id, work);
        let defaults = a.svc.locations(&a.user, a.user.user_id).await.unwrap().iter().filter(|l| l.is_default).count();
        assert_eq!(defaults, 1);

        a.svc.delete_location(&a.user, a.user.user_id, work).await.unwrap();
        assert!(matches!(a.svc.default_location(&a.user, a.user.user_id).await, Err(CatalogError::NotFound(_))));
        assert!(matches!(a.svc.delete_location(&a.user, a.user.user_id, work).await, Err(CatalogError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_locations_of_other_users_are_forbidden() {
        let a = setup().await;
        let input = UpdateProfileInput { locations: vec![location("Admin HQ", true)], ..Default::default() };
        let hq = a.svc.update_profile(a.admin.user_id, input, None, None).await.unwrap().profile.locations[0].id;

        assert!(matches!(a.svc.locations(&a.user, a.admin.user_id).await, Err(CatalogError::Forbidden(_))));
        assert!(matches!(a.svc.delete_location(&a.user, a.admin.user_id, hq).await, Err(CatalogError::Forbidden(_))));
        // Naming yourself does not reach someone else's location either.
        assert!(matches!(a.svc.set_default_location(&a.user, a.user.user_id, hq).await, Err(CatalogError::NotFound(_))));
        assert_eq!(a.svc.locations(&a.admin, a.admin.user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_admin_operations_require_admin() {
        let a = setup().await;
        assert!(matches!(a.svc.list(&a.user, None).await, Err(CatalogError::Forbidden(_))));
        assert!(matches!(a.svc.update(&a.user, a.user.user_id, AdminUpdateUserInput::default()).await, Err(CatalogError::Forbidden(_))));
        assert!(matches!(a.svc.remove(&a.user, a.admin.user_id).await, Err(CatalogError::Forbidden(_))));
        assert!(matches!(a.svc.find(&a.user, a.admin.user_id).await, Err(CatalogError::Forbidden(_))));
        assert_eq!(a.svc.find(&a.user, a.user.user_id).await.unwrap().email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_admin_lists_by_role_and_updates() {
        let a = setup().await;
        assert_eq!(a.svc.list(&a.admin, None).await.unwrap().len(), 2);
        let admins = a.svc.list(&a.admin, Some(Role::Admin)).await.unwrap();
        assert_eq!(admins.iter().map(|u| u.id).collect::<Vec<_>>(), vec![a.admin.user_id]);

        let input = AdminUpdateUserInput { role: Some(Role::Admin), status: Some(UserStatus::Banned), ..Default::default() };
        let updated = a.svc.update(&a.admin, a.user.user_id, input).await.unwrap();
        assert_eq!((updated.role, updated.status), (Role::Admin, UserStatus::Banned));
        assert_eq!(a.svc.list(&a.admin, Some(Role::Admin)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_admin_remove_releases_avatar() {
        let a = setup().await;
        a.svc.update_profile(a.user.user_id, UpdateProfileInput::default(), Some(png("me.png", 16, 16)), None).await.unwrap();
        assert_eq!(a.assets.len().await, 2);

        assert!(matches!(a.svc.remove(&a.admin, a.admin.user_id).await, Err(CatalogError::BadRequest(_))));
        let removal = a.svc.remove(&a.admin, a.user.user_id).await.unwrap();
        assert!(removal.orphaned_assets.is_empty());
        assert!(a.assets.is_empty().await);
        assert!(matches!(a.svc.find(&a.admin, a.user.user_id).await, Err(CatalogError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_store_owner_cannot_be_removed() {
        let a = setup().await;
        a.catalog.insert_store(&Store::create(a.user.user_id, "Ada's")).await.unwrap();
        let err = a.svc.remove(&a.admin, a.user.user_id).await.unwrap_err();
        assert!(matches!(err, CatalogError::BadRequest(_)));
        assert!(a.catalog.find_user(a.user.user_id).await.unwrap().is_some());
    }
}
