//! Command implementations for the `lookalike` CLI.
//!
//! Each command takes the resolved configuration and an output format, and
//! returns what it did so callers (and tests) can inspect the outcome.

use crate::output::{self, OutputFormat, TableBuilder};
use anyhow::{Context, Result};
use lookalike_core::{ItemId, JsonMetadataStore, LookalikeConfig};
use lookalike_index::IndexStats;
use lookalike_neighbors::{BatchReport, IndexSource, NeighborService, Progress, Recommendation};
use std::path::Path;
use std::sync::Arc;

// ============================================================================
// Batch
// ============================================================================

/// Build the index if absent, then compute neighbors for every item.
pub async fn run_all(config: &LookalikeConfig, format: OutputFormat) -> Result<BatchReport> {
    let pb = if format == OutputFormat::Human {
        output::progress_bar("Computing similar products")
    } else {
        indicatif::ProgressBar::hidden()
    };

    let sink = pb.clone();
    let service = NeighborService::from_config(config.clone())
        .await
        .context("Failed to open item stores")?
        .with_progress(Arc::new(move |progress: Progress| {
            sink.set_length(progress.total as u64);
            sink.inc(1);
        }));

    let result = service.compute_for_all().await;
    pb.finish_and_clear();
    let report = result.context("Neighbor computation failed")?;

    if format.is_json() {
        output::output(&report)?;
        return Ok(report);
    }

    match report.index {
        None => output::warning(format!(
            "No items found in {}",
            config.paths.metadata_dir.display()
        )),
        Some(source) => {
            if source == IndexSource::Built {
                output::info(format!(
                    "Built index at {}",
                    service.index_files().graph.display()
                ));
            }
            output::success(format!(
                "Computed {} similar products for {} items in {}",
                service.k(),
                report.items,
                output::format_duration(report.elapsed)
            ));
        }
    }

    Ok(report)
}

// ============================================================================
// Index
// ============================================================================

/// Build and persist the index. Skipped when one exists unless `force` is set.
pub async fn build_index(
    config: &LookalikeConfig,
    force: bool,
    format: OutputFormat,
) -> Result<Option<IndexStats>> {
    let service = NeighborService::from_config(config.clone())
        .await
        .context("Failed to open item stores")?;

    let stats = service
        .build_index(force)
        .await
        .context("Failed to build index")?;

    if format.is_json() {
        output::output(&stats)?;
        return Ok(stats);
    }

    match &stats {
        Some(stats) => {
            output::success(format!(
                "Indexed {} vectors ({} dims) at {}",
                stats.total_vectors,
                stats.dimension,
                service.index_files().graph.display()
            ));
        }
        None => {
            output::info(format!(
                "Index already exists at {}; use --force to rebuild",
                service.index_files().graph.display()
            ));
        }
    }

    Ok(stats)
}

/// Print statistics of the persisted index.
pub async fn stats(config: &LookalikeConfig, format: OutputFormat) -> Result<IndexStats> {
    let service = NeighborService::from_config(config.clone())
        .await
        .context("Failed to open item stores")?;

    let stats = service.index_stats().await.with_context(|| {
        format!(
            "No usable index at {}; run `lookalike build-index` first",
            service.index_files().graph.display()
        )
    })?;

    if format.is_json() {
        output::output(&stats)?;
        return Ok(stats);
    }

    output::header("Index Statistics");
    output::kv("Location", service.index_files().graph.display());
    output::kv("Vectors", stats.total_vectors);
    output::kv("Dimension", stats.dimension);
    output::kv("Metric", stats.metric);
    output::kv("ef_construction", stats.ef_construction);
    output::kv("ef_search", stats.ef_search);
    output::kv("Seed", stats.seed);

    Ok(stats)
}

// ============================================================================
// Metadata
// ============================================================================

/// Split a JSON Lines catalog into per-item metadata records.
pub async fn import_catalog(
    config: &LookalikeConfig,
    catalog: &Path,
    format: OutputFormat,
) -> Result<usize> {
    let store = JsonMetadataStore::open(&config.paths.metadata_dir)
        .await
        .context("Failed to open metadata store")?;

    let written = store
        .import_catalog(catalog)
        .await
        .with_context(|| format!("Failed to import {}", catalog.display()))?;

    if format.is_json() {
        output::output(&serde_json::json!({ "imported": written }))?;
    } else {
        output::success(format!(
            "Imported {} item records into {}",
            written,
            store.dir().display()
        ));
    }

    Ok(written)
}

/// Print the stored recommendations of one item.
pub async fn show(
    config: &LookalikeConfig,
    id: &ItemId,
    format: OutputFormat,
) -> Result<Vec<Recommendation>> {
    let service = NeighborService::from_config(config.clone())
        .await
        .context("Failed to open item stores")?;

    let recommendations = service
        .recommend(id)
        .await
        .with_context(|| format!("Failed to load recommendations for item {}", id))?;

    if format.is_json() {
        let rows: Vec<serde_json::Value> = recommendations
            .iter()
            .map(|r| {
                serde_json::json!({
                    "id": r.entry.id,
                    "similarity": r.entry.similarity,
                    "record": r.record,
                })
            })
            .collect();
        output::output(&rows)?;
        return Ok(recommendations);
    }

    output::header(format!("Similar products for item {}", id));

    if recommendations.is_empty() {
        output::info("No similar products stored");
        return Ok(recommendations);
    }

    let mut table = TableBuilder::new().header(["Rank", "ID", "Similarity", "Image"]);
    for (rank, r) in recommendations.iter().enumerate() {
        let image = r
            .record
            .extra
            .get("imPath")
            .and_then(|v| v.as_str())
            .unwrap_or("-")
            .to_string();
        table = table.row([
            (rank + 1).to_string(),
            r.entry.id.to_string(),
            format!("{:.4}", r.entry.similarity),
            image,
        ]);
    }
    table.print();

    Ok(recommendations)
}
