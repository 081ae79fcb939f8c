//! HMAC-SHA256 request signatures for server-to-server callbacks.
//!
//! Header format: `t=<unix seconds>,v1=<hex hmac>` where the MAC covers
//! `"{t}.{body}"`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{CatalogError, Result};

pub const SIGNATURE_HEADER: &str = "x-catalog-signature";

/// Seconds a signed request stays acceptable on either side of `now`.
const TOLERANCE_SECS: i64 = 300;

fn mac(secret: &str, timestamp: &str, payload: &[u8]) -> Result<Hmac<Sha256>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| CatalogError::internal("HMAC key error"))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Header value for `payload` signed at `timestamp`.
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> Result<String> {
    let ts = timestamp.to_string();
    let tag = mac(secret, &ts, payload)?.finalize().into_bytes();
    Ok(format!("t={ts},v1={}", hex::encode(tag)))
}

pub fn verify(payload: &[u8], header: &str, secret: &str, now: i64) -> Result<()> {
    let invalid = || CatalogError::unauthorized("Invalid callback signature");
    let mut timestamp = "";
    let mut signature = "";
    for part in header.split(',') {
        if let Some(t) = part.trim().strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.trim().strip_prefix("v1=") {
            signature = v;
        }
    }
    if timestamp.is_empty() || signature.is_empty() { return Err(invalid()); }

    let expected = hex::decode(signature).map_err(|_| invalid())?;
    mac(secret, timestamp, payload)?.verify_slice(&expected).map_err(|_| invalid())?;

    let ts: i64 = timestamp.parse().map_err(|_| invalid())?;
    if now.abs_diff(ts) > TOLERANCE_SECS.unsigned_abs() {
        return Err(CatalogError::unauthorized("Callback signature expired"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "shared-callback-secret";
    const BODY: &[u8] = br#"{"email":"g@example.com"}"#;

    #[test]
    fn test_signed_body_verifies() {
        let header = sign(BODY, SECRET, 1_700_000_000).unwrap();
        assert!(verify(BODY, &header, SECRET, 1_700_000_100).is_ok());
    }

    #[test]
    fn test_tampered_body_or_wrong_secret_fails() {
        let header = sign(BODY, SECRET, 1_700_000_000).unwrap();
        let tampered = br#"{"email":"victim@example.com"}"#;
        assert!(matches!(verify(tampered, &header, SECRET, 1_700_000_000), Err(CatalogError::Unauthorized(_))));
        assert!(verify(BODY, &header, "other-secret", 1_700_000_000).is_err());
    }

    #[test]
    fn test_stale_or_malformed_header_fails() {
        let header = sign(BODY, SECRET, 1_700_000_000).unwrap();
        assert!(verify(BODY, &header, SECRET, 1_700_000_301).is_err());
        assert!(verify(BODY, "v1=abcd", SECRET, 1_700_000_000).is_err());
        assert!(verify(BODY, "t=1700000000,v1=zz", SECRET, 1_700_000_000).is_err());
        assert!(verify(BODY, "", SECRET, 1_700_000_000).is_err());
    }
}
