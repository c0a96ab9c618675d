//! Reconciliation of detected changes against expected changes, plus
//! the pass/fail policy.

use tracing::{debug, info};
use vigil_core_types::{
    ChangeRegion, ComparisonConfig, ExpectedChange, Intent, PixelDiffResult, Severity,
};

/// Splits detected changes into intended and unintended buckets and
/// applies the pass/fail policy.
pub struct ChangeReconciler;

impl ChangeReconciler {
    /// Match each detected change against the expected list.
    ///
    /// Matching is case-insensitive bidirectional substring
    /// containment on the descriptions; the first expected entry that
    /// matches wins. A detector verdict already present on a change
    /// is kept, but list placement follows the expected-change match.
    pub fn classify(
        detected: Vec<ChangeRegion>,
        expected: &[ExpectedChange],
    ) -> (Vec<ChangeRegion>, Vec<ChangeRegion>) {
        let mut intended = Vec::new();
        let mut unintended = Vec::new();

        for mut change in detected {
            let matched = expected
                .iter()
                .any(|candidate| descriptions_match(&change.description, &candidate.description));

            if matched {
                if !change.intent.is_decided() {
                    change.intent = Intent::Intended;
                }
                intended.push(change);
            } else {
                if !change.intent.is_decided() {
                    change.intent = Intent::Unintended;
                }
                unintended.push(change);
            }
        }

        info!(
            intended = intended.len(),
            unintended = unintended.len(),
            "changes classified"
        );
        (intended, unintended)
    }

    /// Evaluate the pass/fail checks in fixed order and return the
    /// first failure, if any.
    pub fn determine_pass_fail(
        pixel: &PixelDiffResult,
        intended: &[ChangeRegion],
        unintended: &[ChangeRegion],
        config: &ComparisonConfig,
    ) -> (bool, Option<String>) {
        let total_changes = intended.len() + unintended.len();
        if total_changes > config.max_changed_regions {
            return (
                false,
                Some(format!(
                    "Too many changed regions: {} > {}",
                    total_changes, config.max_changed_regions
                )),
            );
        }

        if pixel.changed_percentage > config.max_changed_percentage {
            return (
                false,
                Some(format!(
                    "Too many changed pixels: {:.2}% > {}%",
                    pixel.changed_percentage, config.max_changed_percentage
                )),
            );
        }

        let critical_count = unintended
            .iter()
            .filter(|change| change.severity == Some(Severity::Critical))
            .count();
        if critical_count > 0 {
            return (
                false,
                Some(format!(
                    "{} critical unintended change(s) detected",
                    critical_count
                )),
            );
        }

        let major_count = unintended
            .iter()
            .filter(|change| change.severity == Some(Severity::Major))
            .count();
        if major_count > 0 {
            return (
                false,
                Some(format!(
                    "{} major unintended change(s) detected",
                    major_count
                )),
            );
        }

        debug!("all pass/fail checks passed");
        (true, None)
    }
}

fn descriptions_match(detected: &str, expected: &str) -> bool {
    let detected = detected.to_lowercase();
    let expected = expected.to_lowercase();
    detected.contains(&expected) || expected.contains(&detected)
}
