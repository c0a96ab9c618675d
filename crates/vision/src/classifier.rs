//! Progressive-resolution orchestration of the vision model.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use vigil_core_types::{ChangeRegion, ExpectedChange};
use vigil_rate_limiter::RateLimiter;

use crate::errors::VisionError;
use crate::model::{EncodedImage, VisionModel};
use crate::parse::parse_reply;
use crate::prompt::build_analysis_prompt;

/// Default wait for a rate-limiter token before failing fast
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(300);

/// Fixed, strictly increasing resolution sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionTier {
    Low,
    Medium,
    High,
    Ultra,
}

impl ResolutionTier {
    pub const ALL: [ResolutionTier; 4] = [
        ResolutionTier::Low,
        ResolutionTier::Medium,
        ResolutionTier::High,
        ResolutionTier::Ultra,
    ];

    /// Target (width, height) for resampling
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            ResolutionTier::Low => (1280, 720),
            ResolutionTier::Medium => (1920, 1080),
            ResolutionTier::High => (3840, 2160),
            ResolutionTier::Ultra => (7680, 4320),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResolutionTier::Low => "720p",
            ResolutionTier::Medium => "1080p",
            ResolutionTier::High => "4K",
            ResolutionTier::Ultra => "8K",
        }
    }
}

/// Outcome of one classification call
#[derive(Debug, Clone)]
pub struct VisionAnalysis {
    pub changes: Vec<ChangeRegion>,
    pub overall_confidence: f64,
    pub summary: String,
    /// Raw reply text, present only when structured parsing failed
    pub raw_response: Option<String>,
    /// Tier that produced this result
    pub tier: ResolutionTier,
    /// True when even the last tier stayed under the confidence target
    pub below_target: bool,
}

/// Escalating, rate-limited orchestration of the external model.
pub struct VisionClassifier {
    model: Arc<dyn VisionModel>,
    limiter: RateLimiter,
    acquire_timeout: Duration,
}

impl VisionClassifier {
    pub fn new(model: Arc<dyn VisionModel>, limiter: RateLimiter) -> Self {
        Self {
            model,
            limiter,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Analyze a screenshot pair, escalating through resolution tiers
    /// until `min_confidence` is reached. Each external call consumes
    /// one rate-limiter token; tokens are never refunded. Errors only
    /// when no token is available in time or every tier fails.
    pub async fn analyze(
        &self,
        before: &[u8],
        after: &[u8],
        expected: &[ExpectedChange],
        min_confidence: f64,
        progressive: bool,
    ) -> Result<VisionAnalysis, VisionError> {
        let tiers: &[ResolutionTier] = if progressive {
            &ResolutionTier::ALL
        } else {
            &[ResolutionTier::Medium]
        };

        let prompt = build_analysis_prompt(expected);
        let mut best: Option<VisionAnalysis> = None;
        let mut last_error: Option<VisionError> = None;

        for tier in tiers {
            if !self.limiter.acquire(self.acquire_timeout).await {
                return Err(VisionError::RateLimited(self.acquire_timeout));
            }

            debug!(tier = tier.label(), "analyzing at resolution tier");
            let images = [
                resample_for_tier(before, *tier)?,
                resample_for_tier(after, *tier)?,
            ];

            let raw = match self.model.generate(&prompt, &images).await {
                Ok(raw) => raw,
                Err(err) => {
                    // Vision unavailable for this tier; escalate with
                    // whatever evidence we already have.
                    warn!(tier = tier.label(), error = %err, "vision call failed");
                    last_error = Some(err);
                    continue;
                }
            };

            let parsed = parse_reply(&raw);
            let analysis = VisionAnalysis {
                changes: parsed.changes,
                overall_confidence: parsed.overall_confidence,
                summary: parsed.summary,
                raw_response: parsed.raw_response,
                tier: *tier,
                below_target: false,
            };

            if analysis.overall_confidence >= min_confidence {
                info!(
                    tier = tier.label(),
                    confidence = analysis.overall_confidence,
                    "confidence target reached"
                );
                return Ok(analysis);
            }

            debug!(
                tier = tier.label(),
                confidence = analysis.overall_confidence,
                min_confidence,
                "confidence below target, escalating"
            );
            let keep = best
                .as_ref()
                .map(|current| analysis.overall_confidence >= current.overall_confidence)
                .unwrap_or(true);
            if keep {
                best = Some(analysis);
            }
        }

        match best {
            Some(mut analysis) => {
                analysis.below_target = true;
                Ok(analysis)
            }
            None => Err(last_error.unwrap_or_else(|| {
                VisionError::CallFailed("no resolution tier produced a reply".to_string())
            })),
        }
    }

    pub async fn limiter_status(&self) -> vigil_rate_limiter::RateLimiterStatus {
        self.limiter.status().await
    }
}

/// Decode, resample to the tier's dimensions and base64-encode as PNG.
fn resample_for_tier(bytes: &[u8], tier: ResolutionTier) -> Result<EncodedImage, VisionError> {
    let image = image::load_from_memory(bytes)
        .map_err(|err| VisionError::Image(format!("cannot load image: {err}")))?;

    let (width, height) = tier.dimensions();
    let image = if image.width() != width || image.height() != height {
        image.resize_exact(width, height, FilterType::Triangle)
    } else {
        image
    };

    let mut buf = Vec::new();
    image
        .write_to(
            &mut std::io::Cursor::new(&mut buf),
            image::ImageOutputFormat::Png,
        )
        .map_err(|err| VisionError::Image(format!("failed to encode image: {err}")))?;

    Ok(EncodedImage {
        mime_type: "image/png".to_string(),
        data: BASE64.encode(buf),
    })
}
