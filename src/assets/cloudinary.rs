//! Cloudinary REST client (signed uploads and destroys)

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::transform::{prepare_upload, PreparedImage};
use super::{AssetHost, UploadFile, UploadedAsset};
use crate::{CatalogError, Result};

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

#[derive(Clone)]
pub struct CloudinaryHost {
    client: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
    width: u32,
    height: u32,
    bytes: u64,
    format: String,
}

#[derive(Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorMessage,
}

#[derive(Deserialize)]
struct ErrorMessage {
    message: String,
}

impl CloudinaryHost {
    pub fn new(cloud_name: impl Into<String>, api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), cloud_name: cloud_name.into(), api_key: api_key.into(), api_secret: api_secret.into() }
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{API_BASE}/{}/image/{action}", self.cloud_name)
    }

    /// Parameters sorted by name, joined as `k=v&k=v`, secret appended, SHA-256 hex.
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut sorted = params.to_vec();
        sorted.sort_by_key(|(k, _)| *k);
        let joined = sorted.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&");
        hex::encode(Sha256::digest(format!("{joined}{}", self.api_secret)))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() { return Ok(response); }
        let status = response.status();
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error.message,
            Err(_) => status.to_string(),
        };
        Err(CatalogError::AssetHost(message))
    }
}

#[async_trait]
impl AssetHost for CloudinaryHost {
    async fn upload_one(&self, file: UploadFile, folder: &str) -> Result<UploadedAsset> {
        let prepared = prepare_upload(&file)?;
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let public_id = prepared.digest[..24].to_string();
        let signature = self.sign(&[("folder", folder), ("public_id", public_id.as_str()), ("timestamp", timestamp.as_str())]);

        let size = prepared.bytes.len();
        let part = Part::bytes(prepared.bytes)
            .file_name(format!("{public_id}.{}", PreparedImage::FORMAT))
            .mime_str(PreparedImage::CONTENT_TYPE)?;
        let form = Form::new()
            .part("file", part)
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder.to_string())
            .text("public_id", public_id)
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self.client.post(self.endpoint("upload")).multipart(form).send().await?;
        let body: UploadResponse = Self::check(response).await?.json().await?;
        tracing::info!(asset_id = %body.public_id, bytes = size, "asset uploaded");
        Ok(UploadedAsset {
            url: body.secure_url, asset_id: body.public_id, width: body.width, height: body.height,
            bytes: body.bytes, format: body.format,
        })
    }

    async fn delete_one(&self, asset_id: &str) -> Result<()> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[("public_id", asset_id), ("timestamp", timestamp.as_str())]);
        let params = [
            ("public_id", asset_id),
            ("timestamp", timestamp.as_str()),
            ("api_key", self.api_key.as_str()),
            ("signature", signature.as_str()),
            ("signature_algorithm", "sha256"),
        ];
        let response = self.client.post(self.endpoint("destroy")).form(&params).send().await?;
        let body: DestroyResponse = Self::check(response).await?.json().await?;
        match body.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(CatalogError::AssetHost(format!("Destroy of {asset_id} returned {other}"))),
        }
    }
}
