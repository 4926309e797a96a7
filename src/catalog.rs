//! Catalog operations against the commerce platform's admin GraphQL API.
//!
//! Three logical operations: resolve a product (by handle, then by SKU
//! search), list a product's existing media alt texts, and attach a batch of
//! new media. Transport-level failures and top-level `errors` arrays go
//! through the shared retry policy; per-item `mediaUserErrors` are user
//! mistakes and fail the run without a retry.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::SyncError;
use crate::media_filter::MediaKind;
use crate::remote::{call_json, RetryPolicy};

/// First-page media listing size; no pagination beyond this.
pub const MEDIA_PAGE_SIZE: u32 = 250;

const PRODUCT_BY_HANDLE_QUERY: &str = r#"
query ProductByHandle($handle: String!) {
  productByHandle(handle: $handle) { id }
}"#;

const PRODUCT_BY_SKU_QUERY: &str = r#"
query ProductBySku($query: String!) {
  products(first: 1, query: $query) {
    edges { node { id } }
  }
}"#;

const PRODUCT_MEDIA_QUERY: &str = r#"
query ProductMedia($id: ID!, $first: Int!) {
  product(id: $id) {
    media(first: $first) {
      nodes { alt }
    }
  }
}"#;

const CREATE_MEDIA_MUTATION: &str = r#"
mutation CreateProductMedia($productId: ID!, $media: [CreateMediaInput!]!) {
  productCreateMedia(productId: $productId, media: $media) {
    media { alt }
    mediaUserErrors { field message }
  }
}"#;

/// Opaque catalog product id, resolved per code group and never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRef(pub String);

/// One media item ready to attach. `alt` doubles as the idempotence key the
/// diff step compares against existing catalog media.
#[derive(Debug, Clone)]
pub struct MediaAttachment {
    pub alt: String,
    pub media_kind: MediaKind,
    pub source_url: String,
}

/// The catalog surface the orchestrator drives. Kept as a trait so runs can
/// be exercised against an in-memory catalog in tests.
#[async_trait]
pub trait CatalogOps: Send + Sync {
    /// Resolve by handle, then by SKU-equals-code. `None` is a legitimate
    /// "no matching product" outcome, not an error.
    async fn resolve_product(
        &self,
        handle: &str,
        code: &str,
    ) -> Result<Option<ProductRef>, SyncError>;

    /// Non-empty, trimmed alt values of the product's current media
    /// (first page only).
    async fn list_media_alt_texts(
        &self,
        product: &ProductRef,
    ) -> Result<HashSet<String>, SyncError>;

    /// Attach one batch via a single mutation. Returns the created count.
    async fn create_media(
        &self,
        product: &ProductRef,
        batch: &[MediaAttachment],
    ) -> Result<usize, SyncError>;
}

/// HTTP client for the admin GraphQL endpoint.
pub struct CatalogClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
    retry: RetryPolicy,
}

impl CatalogClient {
    pub fn new(
        http: reqwest::Client,
        store_domain: &str,
        token: impl Into<String>,
        api_version: &str,
        retry: RetryPolicy,
    ) -> Self {
        let domain = normalize_domain(store_domain);
        Self {
            http,
            endpoint: format!("https://{domain}/admin/api/{api_version}/graphql.json"),
            token: token.into(),
            retry,
        }
    }

    async fn graphql(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> Result<Value, SyncError> {
        let payload = json!({ "query": query, "variables": variables });
        call_json(
            &self.retry,
            operation,
            || {
                self.http
                    .post(&self.endpoint)
                    .header("X-Shopify-Access-Token", &self.token)
                    .json(&payload)
            },
            graphql_errors,
        )
        .await
    }
}

#[async_trait]
impl CatalogOps for CatalogClient {
    async fn resolve_product(
        &self,
        handle: &str,
        code: &str,
    ) -> Result<Option<ProductRef>, SyncError> {
        let body = self
            .graphql(
                "product_by_handle",
                PRODUCT_BY_HANDLE_QUERY,
                json!({ "handle": handle }),
            )
            .await?;
        if let Some(id) = parse_product_id_by_handle(&body) {
            return Ok(Some(ProductRef(id)));
        }

        let body = self
            .graphql(
                "product_by_sku",
                PRODUCT_BY_SKU_QUERY,
                json!({ "query": format!("sku:{code}") }),
            )
            .await?;
        let found = parse_first_product_id(&body).map(ProductRef);
        if found.is_some() {
            debug!(handle, code, "product resolved via SKU search after handle miss");
        }
        Ok(found)
    }

    async fn list_media_alt_texts(
        &self,
        product: &ProductRef,
    ) -> Result<HashSet<String>, SyncError> {
        let body = self
            .graphql(
                "product_media",
                PRODUCT_MEDIA_QUERY,
                json!({ "id": product.0, "first": MEDIA_PAGE_SIZE }),
            )
            .await?;
        Ok(parse_media_alts(&body))
    }

    async fn create_media(
        &self,
        product: &ProductRef,
        batch: &[MediaAttachment],
    ) -> Result<usize, SyncError> {
        let media: Vec<Value> = batch
            .iter()
            .map(|m| {
                json!({
                    "alt": m.alt,
                    "mediaContentType": m.media_kind.as_str(),
                    "originalSource": m.source_url,
                })
            })
            .collect();
        let body = self
            .graphql(
                "product_create_media",
                CREATE_MEDIA_MUTATION,
                json!({ "productId": product.0, "media": media }),
            )
            .await?;

        let user_errors = parse_media_user_errors(&body);
        if !user_errors.is_empty() {
            return Err(SyncError::CatalogValidation {
                operation: "productCreateMedia".into(),
                errors: user_errors,
            });
        }
        Ok(parse_created_media_count(&body).unwrap_or(batch.len()))
    }
}

fn normalize_domain(raw: &str) -> String {
    raw.trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_string()
}

/// Top-level `errors` array of the response envelope; non-empty means the
/// whole call failed and is worth retrying.
fn graphql_errors(body: &Value) -> Option<String> {
    let errors = body.get("errors")?.as_array().filter(|a| !a.is_empty())?;
    let messages: Vec<&str> = errors
        .iter()
        .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
        .collect();
    if messages.is_empty() {
        Some(format!("{} query error(s)", errors.len()))
    } else {
        Some(messages.join("; "))
    }
}

fn parse_product_id_by_handle(body: &Value) -> Option<String> {
    body.get("data")?
        .get("productByHandle")?
        .get("id")?
        .as_str()
        .map(str::to_string)
}

fn parse_first_product_id(body: &Value) -> Option<String> {
    body.get("data")?
        .get("products")?
        .get("edges")?
        .as_array()?
        .first()?
        .get("node")?
        .get("id")?
        .as_str()
        .map(str::to_string)
}

fn parse_media_alts(body: &Value) -> HashSet<String> {
    let mut alts = HashSet::new();
    let nodes = body
        .get("data")
        .and_then(|d| d.get("product"))
        .and_then(|p| p.get("media"))
        .and_then(|m| m.get("nodes"))
        .and_then(|n| n.as_array());
    let Some(nodes) = nodes else {
        return alts;
    };
    for node in nodes {
        if let Some(alt) = node.get("alt").and_then(|a| a.as_str()) {
            let trimmed = alt.trim();
            if !trimmed.is_empty() {
                alts.insert(trimmed.to_string());
            }
        }
    }
    alts
}

fn parse_media_user_errors(body: &Value) -> Vec<String> {
    body.get("data")
        .and_then(|d| d.get("productCreateMedia"))
        .and_then(|p| p.get("mediaUserErrors"))
        .and_then(|e| e.as_array())
        .map(|errs| errs.iter().map(format_user_error).collect())
        .unwrap_or_default()
}

fn format_user_error(err: &Value) -> String {
    let message = err
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("unknown error");
    match err.get("field").and_then(|f| f.as_array()) {
        Some(fields) if !fields.is_empty() => {
            let path: Vec<&str> = fields.iter().filter_map(|f| f.as_str()).collect();
            format!("{}: {message}", path.join("."))
        }
        _ => message.to_string(),
    }
}

fn parse_created_media_count(body: &Value) -> Option<usize> {
    body.get("data")?
        .get("productCreateMedia")?
        .get("media")?
        .as_array()
        .map(|a| a.len())
}
