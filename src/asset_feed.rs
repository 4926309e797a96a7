//! Asset feed client: fetches the raw media listing and normalizes its shape.
//!
//! The feed is loose about field names (`url`/`link`/`path`, `mime`/`type`)
//! and about whether the listing is a bare array or wrapped in `{files:[..]}`.
//! All of that tolerance lives here, in one adapter at the boundary; the rest
//! of the pipeline only ever sees `RawAsset`.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::SyncError;
use crate::media_filter;
use crate::remote::{call_json, RetryPolicy};

/// One asset as listed by the feed, after shape normalization.
#[derive(Debug, Clone)]
pub struct RawAsset {
    pub url: String,
    pub name: Option<String>,
    pub mime: Option<String>,
}

impl RawAsset {
    /// The declared name when present and non-blank, otherwise the URL's last
    /// path segment, percent-decoded. Doubles as the attachment alt text.
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => media_filter::filename_from_url(&self.url),
        }
    }
}

/// Anything that can produce the full asset listing for one run.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn fetch_assets(&self) -> Result<Vec<RawAsset>, SyncError>;
}

/// HTTP implementation over the configured feed endpoint.
pub struct AssetFeed {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl AssetFeed {
    pub fn new(
        http: reqwest::Client,
        url: impl Into<String>,
        api_key: Option<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            url: url.into(),
            api_key,
            retry,
        }
    }
}

#[async_trait]
impl AssetSource for AssetFeed {
    async fn fetch_assets(&self) -> Result<Vec<RawAsset>, SyncError> {
        let body = call_json(
            &self.retry,
            "asset_feed_list",
            || {
                let mut req = self.http.get(&self.url);
                if let Some(key) = &self.api_key {
                    req = req.bearer_auth(key);
                }
                req
            },
            |_| None,
        )
        .await?;
        normalize_listing(&body)
    }
}

/// Normalize the feed's listing payload into assets.
///
/// Field precedence mirrors the feed's own looseness: the first non-blank of
/// `url`/`link`/`path` locates the asset, the first non-blank of `mime`/`type`
/// types it. A payload that is neither an array nor `{files:[..]}`, or an
/// entry with no usable location, fails the whole run.
pub fn normalize_listing(body: &Value) -> Result<Vec<RawAsset>, SyncError> {
    let items = if let Some(arr) = body.as_array() {
        arr
    } else if let Some(arr) = body.get("files").and_then(|f| f.as_array()) {
        arr
    } else {
        return Err(SyncError::source_format(
            "expected a JSON array or an object with a `files` array",
        ));
    };

    let mut assets = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let obj = item
            .as_object()
            .ok_or_else(|| SyncError::source_format(format!("entry {idx} is not an object")))?;

        let url = ["url", "link", "path"]
            .iter()
            .find_map(|k| {
                obj.get(*k)
                    .and_then(|v| v.as_str())
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
            })
            .ok_or_else(|| {
                SyncError::source_format(format!("entry {idx} has none of url/link/path"))
            })?;

        let name = obj
            .get("name")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        let mime = ["mime", "type"]
            .iter()
            .find_map(|k| {
                obj.get(*k)
                    .and_then(|v| v.as_str())
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
            })
            .map(|s| s.to_string());

        assets.push(RawAsset {
            url: url.to_string(),
            name,
            mime,
        });
    }
    Ok(assets)
}
