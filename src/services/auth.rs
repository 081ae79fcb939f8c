//! Account registration, login and token refresh

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{hash_password, verify_password, GoogleProfile, JwtKeys, TokenPair};
use crate::domain::aggregates::{User, UserStatus};
use crate::repository::Catalog;
use crate::state::AppState;
use crate::{CatalogError, Result};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordInput {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

/// Body posted by a NextAuth-style frontend after its own Google sign-in.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GoogleCallbackInput {
    #[validate(email)]
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: User,
}

fn normalise_email(email: &str) -> String { email.trim().to_lowercase() }

#[derive(Clone)]
pub struct AuthService {
    catalog: Arc<dyn Catalog>,
    jwt: Arc<JwtKeys>,
}

impl AuthService {
    pub fn new(state: &AppState) -> Self { Self { catalog: state.catalog.clone(), jwt: state.jwt.clone() } }

    fn session(&self, user: User) -> Result<AuthSession> {
        if user.status != UserStatus::Active {
            return Err(CatalogError::unauthorized(format!("Account is {}", user.status.as_str().to_lowercase())));
        }
        Ok(AuthSession { tokens: self.jwt.issue(&user)?, user })
    }

    pub async fn register(&self, input: RegisterInput) -> Result<AuthSession> {
        input.validate()?;
        let email = normalise_email(&input.email);
        if self.catalog.find_user_by_email(&email).await?.is_some() {
            return Err(CatalogError::bad_request("Email is already registered"));
        }
        let user = User::create(email, input.name.trim(), Some(hash_password(&input.password)?));
        self.catalog.insert_user(&user).await?;
        tracing::info!(user_id = %user.id, "user registered");
        self.session(user)
    }

    pub async fn login(&self, input: LoginInput) -> Result<AuthSession> {
        input.validate()?;
        let invalid = || CatalogError::unauthorized("Invalid email or password");
        let user = self.catalog.find_user_by_email(&normalise_email(&input.email)).await?.ok_or_else(invalid)?;
        let hash = user.password_hash.as_deref().ok_or_else(invalid)?;
        if !verify_password(&input.password, hash) {
            tracing::debug!(user_id = %user.id, "password mismatch");
            return Err(invalid());
        }
        self.session(user)
    }

    pub async fn refresh(&self, user_id: Uuid) -> Result<AuthSession> {
        let user = self.profile(user_id).await?;
        self.session(user)
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<User> {
        self.catalog.find_user(user_id).await?.ok_or_else(|| CatalogError::unauthorized("User no longer exists"))
    }

    pub async fn change_password(&self, user_id: Uuid, input: ChangePasswordInput) -> Result<()> {
        input.validate()?;
        let mut user = self.profile(user_id).await?;
        let current_ok = user.password_hash.as_deref().is_some_and(|h| verify_password(&input.current_password, h));
        if !current_ok { return Err(CatalogError::bad_request("Current password is incorrect")); }
        user.password_hash = Some(hash_password(&input.new_password)?);
        user.touch();
        self.catalog.save_user(&user).await?;
        tracing::info!(%user_id, "password changed");
        Ok(())
    }

    /// Finds or creates the user for a verified Google identity.
    pub async fn google_login(&self, profile: GoogleProfile) -> Result<AuthSession> {
        if profile.email_verified != Some(true) {
            return Err(CatalogError::unauthorized("Google account email is not verified"));
        }
        self.upsert_external(&profile.email, profile.name.as_deref(), profile.picture).await
    }

    pub async fn google_callback(&self, input: GoogleCallbackInput) -> Result<AuthSession> {
        input.validate()?;
        self.upsert_external(&input.email, input.name.as_deref(), input.image).await
    }

    /// External sign-in only ever reaches accounts without a password, so a
    /// Google identity cannot be used to enter a password account.
    async fn upsert_external(&self, email: &str, name: Option<&str>, image: Option<String>) -> Result<AuthSession> {
        let email = normalise_email(email);
        let user = match self.catalog.find_user_by_email(&email).await? {
            Some(user) if user.password_hash.is_some() => {
                tracing::warn!(user_id = %user.id, "external sign-in refused for password account");
                return Err(CatalogError::unauthorized("This account signs in with a password"));
            }
            Some(mut user) => {
                if image.is_some() && user.image != image {
                    user.image = image;
                    user.touch();
                    self.catalog.save_user(&user).await?;
                }
                user
            }
            None => {
                let display = name.map(str::to_string).unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
                let mut user = User::create(email, display, None);
                user.image = image;
                self.catalog.insert_user(&user).await?;
                tracing::info!(user_id = %user.id, "user created from Google sign-in");
                user
            }
        };
        self.session(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;

    fn service() -> AuthService { AuthService::new(&AppState::in_memory(Config::for_tests())) }

    fn register(email: &str) -> RegisterInput {
        RegisterInput { email: email.into(), name: "Ada".into(), password: "correct-horse".into() }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let svc = service();
        let session = svc.register(register("Ada@Example.com")).await.unwrap();
        assert_eq!(session.user.email, "ada@example.com");
        let login = svc.login(LoginInput { email: "ada@example.com".into(), password: "correct-horse".into() }).await.unwrap();
        assert_eq!(login.user.id, session.user.id);
    }

    #[tokio::test]
    async fn test_duplicate_email_and_bad_password() {
        let svc = service();
        svc.register(register("dup@example.com")).await.unwrap();
        assert!(matches!(svc.register(register("dup@example.com")).await, Err(CatalogError::BadRequest(_))));
        let err = svc.login(LoginInput { email: "dup@example.com".into(), password: "nope".into() }).await.unwrap_err();
        assert!(matches!(err, CatalogError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_change_password_requires_current() {
        let svc = service();
        let user = svc.register(register("pw@example.com")).await.unwrap().user;
        let wrong = ChangePasswordInput { current_password: "guess".into(), new_password: "another-pass".into() };
        assert!(svc.change_password(user.id, wrong).await.is_err());
        let right = ChangePasswordInput { current_password: "correct-horse".into(), new_password: "another-pass".into() };
        svc.change_password(user.id, right).await.unwrap();
        assert!(svc.login(LoginInput { email: "pw@example.com".into(), password: "another-pass".into() }).await.is_ok());
    }

    #[tokio::test]
    async fn test_google_callback_upserts() {
        let svc = service();
        let input = GoogleCallbackInput { email: "g@example.com".into(), name: None, image: Some("https://img/1".into()) };
        let first = svc.google_callback(input.clone()).await.unwrap();
        assert_eq!(first.user.name, "g");
        let second = svc.google_callback(input).await.unwrap();
        assert_eq!(first.user.id, second.user.id);
        // Google-only accounts have no password to log in with.
        assert!(svc.login(LoginInput { email: "g@example.com".into(), password: "anything".into() }).await.is_err());
    }

    #[tokio::test]
    async fn test_external_sign_in_cannot_enter_password_account() {
        let svc = service();
        let owner = svc.register(register("owner@example.com")).await.unwrap().user;
        let input = GoogleCallbackInput { email: "Owner@Example.com".into(), name: None, image: Some("https://img/evil".into()) };
        assert!(matches!(svc.google_callback(input).await, Err(CatalogError::Unauthorized(_))));

        let profile = GoogleProfile { email: "owner@example.com".into(), name: None, picture: None, email_verified: Some(true) };
        assert!(matches!(svc.google_login(profile).await, Err(CatalogError::Unauthorized(_))));
        assert_eq!(svc.profile(owner.id).await.unwrap().image, None);
    }

    #[tokio::test]
    async fn test_google_login_requires_verified_email() {
        let svc = service();
        let profile = GoogleProfile { email: "new@example.com".into(), name: Some("New".into()), picture: None, email_verified: None };
        assert!(matches!(svc.google_login(profile.clone()).await, Err(CatalogError::Unauthorized(_))));
        let verified = GoogleProfile { email_verified: Some(true), ..profile };
        assert_eq!(svc.google_login(verified).await.unwrap().user.name, "New");
    }
}
