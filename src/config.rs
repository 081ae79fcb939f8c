//! Service configuration

use chrono::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres URL; `None` runs against the in-memory catalog.
    pub database_url: Option<String>,
    pub port: u16,
    /// development | staging | production
    pub environment: String,
    pub jwt_secret: String,
    pub jwt_refresh_secret: String,
    pub jwt_expires_in: Duration,
    pub jwt_refresh_expires_in: Duration,
    pub google: Option<GoogleConfig>,
    /// Shared secret the frontend signs `/auth/google/callback` bodies with.
    /// Unset disables that route.
    pub google_callback_secret: Option<String>,
    pub frontend_url: String,
    pub cloudinary: Option<CloudinaryConfig>,
    pub nats_url: Option<String>,
    /// Days a product stays in trash before `empty_trash` may purge it.
    pub trash_retention_days: u32,
    pub asset_reconcile_interval_secs: u64,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
}

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Unset or blank falls back to `default`; anything else must parse.
fn parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T, BoxError> {
    match optional(name) {
        Some(v) => v.trim().parse().map_err(|_| format!("{name} is not a valid number: {v}").into()),
        None => Ok(default),
    }
}

/// Parses `15m`, `7d`, `12h`, `30s` or a bare number of seconds.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let (digits, unit) = match value.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((i, _)) => value.split_at(i),
        None => (value, "s"),
    };
    let n: i64 = digits.parse().ok()?;
    match unit {
        "s" => Duration::try_seconds(n),
        "m" => Duration::try_minutes(n),
        "h" => Duration::try_hours(n),
        "d" => Duration::try_days(n),
        _ => None,
    }
}

impl Config {
    /// Must be set and non-empty outside development.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    fn duration(name: &str, default: Duration) -> Result<Duration, BoxError> {
        match optional(name) {
            Some(v) => parse_duration(&v)
                .filter(|d| chrono::Utc::now().checked_add_signed(*d).is_some())
                .ok_or_else(|| format!("{name} is not a valid duration: {v}").into()),
            None => Ok(default),
        }
    }

    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let google = match (optional("GOOGLE_CLIENT_ID"), optional("GOOGLE_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(GoogleConfig {
                client_id,
                client_secret,
                callback_url: optional("GOOGLE_CALLBACK_URL")
                    .unwrap_or_else(|| "http://localhost:3000/api/auth/google/redirect".into()),
            }),
            _ => None,
        };
        let cloudinary = match (optional("CLOUDINARY_CLOUD_NAME"), optional("CLOUDINARY_API_KEY"), optional("CLOUDINARY_API_SECRET")) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig { cloud_name, api_key, api_secret }),
            _ => None,
        };

        Ok(Self {
            database_url: optional("DATABASE_URL"),
            port: parsed("PORT", 3000)?,
            environment: environment.clone(),
            jwt_secret: Self::require_secret("JWT_SECRET", &environment)?,
            jwt_refresh_secret: Self::require_secret("JWT_REFRESH_SECRET", &environment)?,
            jwt_expires_in: Self::duration("JWT_EXPIRES_IN", Duration::minutes(15))?,
            jwt_refresh_expires_in: Self::duration("JWT_REFRESH_EXPIRES_IN", Duration::days(7))?,
            google,
            google_callback_secret: optional("GOOGLE_CALLBACK_SECRET"),
            frontend_url: optional("FRONTEND_URL").unwrap_or_else(|| "http://localhost:3001".into()),
            cloudinary,
            nats_url: optional("NATS_URL"),
            trash_retention_days: parsed("TRASH_RETENTION_DAYS", 30)?,
            asset_reconcile_interval_secs: parsed("ASSET_RECONCILE_INTERVAL_SECS", 300)?,
        })
    }

    pub fn is_production(&self) -> bool { self.environment == "production" }

    /// Development defaults, no external services.
    pub fn for_tests() -> Self {
        Self {
            database_url: None,
            port: 0,
            environment: "development".into(),
            jwt_secret: "test-access-secret".into(),
            jwt_refresh_secret: "test-refresh-secret".into(),
            jwt_expires_in: Duration::minutes(15),
            jwt_refresh_expires_in: Duration::days(7),
            google: None,
            google_callback_secret: Some("test-callback-secret".into()),
            frontend_url: "http://localhost:3001".into(),
            cloudinary: None,
            nats_url: None,
            trash_retention_days: 30,
            asset_reconcile_interval_secs: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("15m"), Some(Duration::minutes(15)));
        assert_eq!(parse_duration("7d"), Some(Duration::days(7)));
        assert_eq!(parse_duration("3600"), Some(Duration::seconds(3600)));
        assert_eq!(parse_duration("2w"), None);
        assert_eq!(parse_duration("m"), None);
    }

    #[test]
    fn test_parse_duration_out_of_range_is_rejected() {
        assert_eq!(parse_duration(&format!("{}d", i64::MAX)), None);
        assert_eq!(parse_duration("99999999999999999999d"), None);
        std::env::set_var("CATALOG_TEST_HUGE_EXPIRY", "100000000d");
        assert!(Config::duration("CATALOG_TEST_HUGE_EXPIRY", Duration::minutes(1)).is_err());
    }

    #[test]
    fn test_parsed_rejects_malformed_numbers() {
        std::env::set_var("CATALOG_TEST_PORT", "80a");
        let err = parsed::<u16>("CATALOG_TEST_PORT", 3000).unwrap_err();
        assert!(err.to_string().contains("CATALOG_TEST_PORT"));
        std::env::set_var("CATALOG_TEST_RETENTION", "99999999999");
        assert!(parsed::<u32>("CATALOG_TEST_RETENTION", 30).is_err());
        std::env::set_var("CATALOG_TEST_RETENTION_OK", " 14 ");
        assert_eq!(parsed::<u32>("CATALOG_TEST_RETENTION_OK", 30).unwrap(), 14);
        assert_eq!(parsed::<u32>("CATALOG_TEST_UNSET_NUMBER", 30).unwrap(), 30);
    }

    #[test]
    fn test_require_secret_placeholder_in_development() {
        let secret = Config::require_secret("CATALOG_TEST_UNSET_SECRET", "development").unwrap();
        assert_eq!(secret, "dev-CATALOG_TEST_UNSET_SECRET-not-for-production");
        assert!(Config::require_secret("CATALOG_TEST_UNSET_SECRET", "production").is_err());
    }
}
