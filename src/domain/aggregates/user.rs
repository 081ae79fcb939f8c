//! User accounts (local password or Google sign-in)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    Banned,
}

impl Role {
    pub fn as_str(&self) -> &'static str { match self { Self::User => "USER", Self::Admin => "ADMIN" } }
    pub fn parse(s: &str) -> Option<Self> { match s { "USER" => Some(Self::User), "ADMIN" => Some(Self::Admin), _ => None } }
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Active => "ACTIVE", Self::Inactive => "INACTIVE", Self::Banned => "BANNED" }
    }
    pub fn parse(s: &str) -> Option<Self> {
        match s { "ACTIVE" => Some(Self::Active), "INACTIVE" => Some(Self::Inactive), "BANNED" => Some(Self::Banned), _ => None }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub username: Option<String>,
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn create(email: impl Into<String>, name: impl Into<String>, password_hash: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), email: email.into(), name: name.into(), username: None, password_hash,
            role: Role::User, status: UserStatus::Active, image: None, created_at: now, updated_at: now,
        }
    }
    pub fn touch(&mut self) { self.updated_at = Utc::now(); }
}

/// Saved address of a user. At most one per user is the default.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLocation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub label: Option<String>,
    pub address_line: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: String,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserLocation {
    pub fn create(user_id: Uuid, address_line: impl Into<String>, country: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), user_id, label: None, address_line: address_line.into(), city: None, state: None,
            country: country.into(), postal_code: None, latitude: None, longitude: None, is_default: false,
            created_at: now, updated_at: now,
        }
    }
    pub fn touch(&mut self) { self.updated_at = Utc::now(); }
}

/// Avatar plus its 200x200 thumbnail, both on the asset host.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileImage {
    pub user_id: Uuid,
    pub profile: Option<String>,
    #[serde(skip)]
    pub profile_asset_id: Option<String>,
    pub thumbnail: Option<String>,
    #[serde(skip)]
    pub thumbnail_asset_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileImage {
    pub fn empty(user_id: Uuid) -> Self {
        Self { user_id, profile: None, profile_asset_id: None, thumbnail: None, thumbnail_asset_id: None, updated_at: Utc::now() }
    }

    pub fn asset_ids(&self) -> Vec<String> {
        self.profile_asset_id.iter().chain(self.thumbnail_asset_id.iter()).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_and_status_round_trip_names() {
        for role in [Role::User, Role::Admin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        for status in [UserStatus::Active, UserStatus::Inactive, UserStatus::Banned] {
            assert_eq!(UserStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(Role::parse("root"), None);
    }

    #[test]
    fn test_profile_image_asset_ids_skip_missing() {
        let mut image = ProfileImage::empty(Uuid::new_v4());
        assert!(image.asset_ids().is_empty());
        image.thumbnail_asset_id = Some("profiles/t".into());
        assert_eq!(image.asset_ids(), vec!["profiles/t".to_string()]);
    }
}
