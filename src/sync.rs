//! End-to-end sync run: fetch, group, resolve, diff, attach, summarize.
//!
//! Strictly sequential: one feed fetch, then groups one at a time, each
//! group's resolve/diff/attach in order. A missing product skips its group
//! with a warning; any other failure aborts the whole run.

use std::time::{Duration, Instant};

use indexmap::IndexMap;
use regex::Regex;
use tracing::{info, warn};

use crate::asset_feed::{AssetSource, RawAsset};
use crate::catalog::{CatalogOps, MediaAttachment};
use crate::error::SyncError;
use crate::media_filter;
use crate::normalization::{code, handle};

/// Attachments per create-media call when no override is configured.
pub const DEFAULT_BATCH_SIZE: usize = 8;

/// Knobs for one run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub code_pattern: Regex,
    pub handle_template: String,
    pub batch_size: usize,
    pub dry_run: bool,
}

impl SyncOptions {
    pub fn new(
        code_pattern: &str,
        handle_template: impl Into<String>,
        batch_size: usize,
        dry_run: bool,
    ) -> Result<Self, SyncError> {
        if batch_size == 0 {
            return Err(SyncError::config("attach batch size must be at least 1"));
        }
        Ok(Self {
            code_pattern: code::compile_code_pattern(code_pattern)?,
            handle_template: handle_template.into(),
            batch_size,
            dry_run,
        })
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SyncSummary {
    pub assets_fetched: usize,
    pub assets_matched: usize,
    pub groups_total: usize,
    pub groups_missing_product: usize,
    pub groups_up_to_date: usize,
    /// Media actually created. Stays 0 in dry-run mode.
    pub attached: usize,
    /// Attachments skipped because an equal alt already exists.
    pub skipped_existing: usize,
    /// What a dry run would have attached.
    pub planned: usize,
}

impl SyncSummary {
    pub fn log_summary(&self, elapsed: Duration) {
        info!(
            assets_fetched = self.assets_fetched,
            assets_matched = self.assets_matched,
            groups = self.groups_total,
            groups_missing_product = self.groups_missing_product,
            groups_up_to_date = self.groups_up_to_date,
            attached = self.attached,
            skipped_existing = self.skipped_existing,
            planned = self.planned,
            elapsed_ms = elapsed.as_millis() as u64,
            "sync run summary"
        );
    }
}

/// Classify every asset and key it by extracted product code.
///
/// The code is taken from the display name first, then from the full URL.
/// Codeless assets are silently excluded. Key order and per-key order both
/// follow source order, which keeps batch slicing deterministic.
pub fn group_assets(
    assets: &[RawAsset],
    pattern: &Regex,
) -> IndexMap<String, Vec<MediaAttachment>> {
    let mut groups: IndexMap<String, Vec<MediaAttachment>> = IndexMap::new();
    for asset in assets {
        let display = asset.display_name();
        let Some(group_code) = code::extract_code(&display, pattern)
            .or_else(|| code::extract_code(&asset.url, pattern))
        else {
            continue;
        };
        let kind = media_filter::classify(asset.mime.as_deref(), &display);
        groups.entry(group_code).or_default().push(MediaAttachment {
            alt: display.trim().to_string(),
            media_kind: kind,
            source_url: asset.url.clone(),
        });
    }
    groups
}

/// Run the whole pipeline once.
pub async fn run_sync(
    source: &impl AssetSource,
    catalog: &impl CatalogOps,
    options: &SyncOptions,
) -> Result<SyncSummary, SyncError> {
    let started = Instant::now();
    let mut summary = SyncSummary::default();

    let assets = source.fetch_assets().await?;
    summary.assets_fetched = assets.len();
    if assets.is_empty() {
        info!("asset feed returned no assets; nothing to do");
        return Ok(summary);
    }

    let groups = group_assets(&assets, &options.code_pattern);
    summary.assets_matched = groups.values().map(Vec::len).sum();
    summary.groups_total = groups.len();
    if groups.is_empty() {
        info!(
            assets = summary.assets_fetched,
            "no asset matched the code pattern; nothing to do"
        );
        return Ok(summary);
    }
    info!(
        assets = summary.assets_fetched,
        matched = summary.assets_matched,
        groups = summary.groups_total,
        dry_run = options.dry_run,
        "asset groups assembled"
    );

    for (group_code, attachments) in &groups {
        let product_handle = handle::derive_handle(group_code, &options.handle_template);
        let Some(product) = catalog.resolve_product(&product_handle, group_code).await? else {
            warn!(
                code = %group_code,
                handle = %product_handle,
                assets = attachments.len(),
                "no catalog product for code; skipping group"
            );
            summary.groups_missing_product += 1;
            continue;
        };

        let existing = catalog.list_media_alt_texts(&product).await?;
        let fresh: Vec<MediaAttachment> = attachments
            .iter()
            .filter(|a| !existing.contains(a.alt.as_str()))
            .cloned()
            .collect();
        let skipped = attachments.len() - fresh.len();
        summary.skipped_existing += skipped;
        if fresh.is_empty() {
            info!(code = %group_code, existing = attachments.len(), "nothing new for group");
            summary.groups_up_to_date += 1;
            continue;
        }

        if options.dry_run {
            summary.planned += fresh.len();
            info!(
                code = %group_code,
                would_attach = fresh.len(),
                skipped,
                "dry run: attach skipped"
            );
            continue;
        }

        let mut attached_for_group = 0usize;
        for batch in fresh.chunks(options.batch_size) {
            attached_for_group += catalog.create_media(&product, batch).await?;
        }
        summary.attached += attached_for_group;
        info!(code = %group_code, attached = attached_for_group, skipped, "group synced");
    }

    summary.log_summary(started.elapsed());
    Ok(summary)
}
