//! End-to-end comparison orchestration: load, cache lookup, pixel
//! diff, vision classification, reconciliation, artifacts, persist.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use vigil_core_types::{ComparisonResult, ExpectedChange, PixelDiffResult};
use vigil_pixel_diff::compare::DEFAULT_MIN_REGION_SIZE;
use vigil_pixel_diff::heatmap::DEFAULT_OPACITY;
use vigil_pixel_diff::{DiffError, HeatmapPalette, PixelComparator};
use vigil_result_cache::{cache_key, ResultCache};
use vigil_vision::VisionClassifier;

use crate::config::AppConfig;
use crate::reconciler::ChangeReconciler;
use crate::report;
use crate::storage::{ResultStore, StoreError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read {role} image {path}: {source}")]
    Load {
        role: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Diff(#[from] DiffError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("comparison task failed: {0}")]
    Task(String),
}

/// Orchestrates one comparison from screenshot paths to a persisted,
/// cached result with artifacts.
pub struct ComparisonPipeline {
    config: AppConfig,
    comparator: Arc<PixelComparator>,
    cache: Arc<ResultCache>,
    store: Arc<dyn ResultStore>,
    vision: Option<Arc<VisionClassifier>>,
}

impl ComparisonPipeline {
    pub fn new(
        config: AppConfig,
        cache: Arc<ResultCache>,
        store: Arc<dyn ResultStore>,
        vision: Option<Arc<VisionClassifier>>,
    ) -> Self {
        let comparator = Arc::new(PixelComparator::new(config.comparison.clone()));
        Self {
            config,
            comparator,
            cache,
            store,
            vision,
        }
    }

    /// Run the full comparison. The cache key covers both image
    /// contents and the threshold, so an identical request
    /// short-circuits to the cached result.
    pub async fn compare(
        &self,
        before_path: &Path,
        after_path: &Path,
        expected: &[ExpectedChange],
        vision_override: Option<bool>,
    ) -> Result<ComparisonResult, PipelineError> {
        let started_at = Utc::now();
        info!(
            before = %before_path.display(),
            after = %after_path.display(),
            "starting comparison"
        );

        let before = Arc::new(read_image(before_path, "before").await?);
        let after = Arc::new(read_image(after_path, "after").await?);

        let threshold = self.config.comparison.pixel_threshold;
        let key = cache_key(&before, &after, threshold);
        if let Some(hit) = self.cache.get(&key) {
            info!(cached_at = %hit.timestamp, "returning cached result");
            return Ok(hit);
        }

        let pixel = {
            let comparator = Arc::clone(&self.comparator);
            let before = Arc::clone(&before);
            let after = Arc::clone(&after);
            tokio::task::spawn_blocking(move || -> Result<PixelDiffResult, DiffError> {
                let mut result = comparator.compare(&before, &after, threshold)?;
                result.regions = comparator.find_change_regions(
                    &before,
                    &after,
                    threshold,
                    DEFAULT_MIN_REGION_SIZE,
                )?;
                Ok(result)
            })
            .await
            .map_err(|err| PipelineError::Task(err.to_string()))??
        };

        let use_vision =
            vision_override.unwrap_or(self.config.comparison.enable_vision_classification);
        let mut detected = Vec::new();
        let mut analysis_summary = None;
        match &self.vision {
            Some(classifier) if use_vision => {
                match classifier
                    .analyze(
                        &before,
                        &after,
                        expected,
                        self.config.comparison.min_confidence_threshold,
                        self.config.comparison.progressive_resolution,
                    )
                    .await
                {
                    Ok(analysis) => {
                        info!(
                            changes = analysis.changes.len(),
                            confidence = analysis.overall_confidence,
                            tier = analysis.tier.label(),
                            "vision analysis complete"
                        );
                        detected = analysis.changes;
                        analysis_summary = Some(analysis.summary);
                    }
                    Err(err) => {
                        warn!(error = %err, "vision analysis failed, using pixel evidence only");
                    }
                }
            }
            _ => debug!("vision analysis disabled or unavailable"),
        }

        let (intended, unintended) = ChangeReconciler::classify(detected, expected);
        let (passed, failure_reason) = ChangeReconciler::determine_pass_fail(
            &pixel,
            &intended,
            &unintended,
            &self.config.comparison,
        );

        let artifact_stamp = started_at.format("%Y%m%d-%H%M%S%3f").to_string();
        let heatmap_path = if pixel.changed_pixels > 0 {
            self.render_heatmap(&before, &after, threshold, &artifact_stamp)
                .await
        } else {
            None
        };

        let mut result = ComparisonResult {
            before_path: before_path.to_path_buf(),
            after_path: after_path.to_path_buf(),
            threshold,
            changed_pixels: pixel.changed_pixels,
            total_pixels: pixel.total_pixels,
            changed_percentage: pixel.changed_percentage,
            intended_changes: intended,
            unintended_changes: unintended,
            passed,
            failure_reason,
            analysis_summary,
            heatmap_path,
            report_path: None,
            timestamp: started_at,
        };
        result.report_path = self.write_report(&result, &artifact_stamp).await;

        let stored = self.store.save(&result).await?;
        debug!(path = %stored.display(), "result persisted");
        self.cache.put(&key, &result);

        info!(
            passed,
            unintended = result.unintended_changes.len(),
            "comparison complete"
        );
        Ok(result)
    }

    async fn render_heatmap(
        &self,
        before: &Arc<Vec<u8>>,
        after: &Arc<Vec<u8>>,
        threshold: u8,
        stamp: &str,
    ) -> Option<PathBuf> {
        let output = self
            .config
            .storage
            .reports_dir()
            .join(format!("{}-heatmap.png", stamp));

        let comparator = Arc::clone(&self.comparator);
        let before = Arc::clone(before);
        let after = Arc::clone(after);
        let target = output.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            comparator.create_heatmap(
                &before,
                &after,
                threshold,
                HeatmapPalette::YellowOrangeRed,
                DEFAULT_OPACITY,
                &target,
            )
        })
        .await;

        match outcome {
            Ok(Ok(path)) => {
                info!(path = %path.display(), "heatmap created");
                Some(path)
            }
            Ok(Err(err)) => {
                error!(error = %err, "failed to create heatmap");
                None
            }
            Err(err) => {
                error!(error = %err, "heatmap task failed");
                None
            }
        }
    }

    async fn write_report(&self, result: &ComparisonResult, stamp: &str) -> Option<PathBuf> {
        let dir = self.config.storage.reports_dir();
        let path = dir.join(format!("{}-report.md", stamp));
        let rendered = report::render(result);

        let written: std::io::Result<()> = async {
            tokio::fs::create_dir_all(&dir).await?;
            tokio::fs::write(&path, rendered.as_bytes()).await
        }
        .await;

        match written {
            Ok(()) => {
                info!(path = %path.display(), "report created");
                Some(path)
            }
            Err(err) => {
                error!(error = %err, "failed to create report");
                None
            }
        }
    }
}

async fn read_image(path: &Path, role: &'static str) -> Result<Vec<u8>, PipelineError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| PipelineError::Load {
            role,
            path: path.to_path_buf(),
            source,
        })
}
