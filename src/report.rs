//! Markdown report rendering for a completed comparison.

use vigil_core_types::{ChangeRegion, ComparisonResult};

/// Render the markdown report for one comparison.
pub fn render(result: &ComparisonResult) -> String {
    let status = if result.passed {
        "✅ PASSED"
    } else {
        "❌ FAILED"
    };

    let verdict = if result.passed {
        "All checks passed!".to_string()
    } else {
        format!(
            "**Reason**: {}",
            result.failure_reason.as_deref().unwrap_or("unknown")
        )
    };

    let intended = if result.intended_changes.is_empty() {
        "No intended changes detected.".to_string()
    } else {
        result
            .intended_changes
            .iter()
            .map(intended_line)
            .collect::<Vec<_>>()
            .join("\n")
    };

    let unintended = if result.unintended_changes.is_empty() {
        "No unintended changes detected - excellent!".to_string()
    } else {
        result
            .unintended_changes
            .iter()
            .map(unintended_line)
            .collect::<Vec<_>>()
            .join("\n")
    };

    let summary = match &result.analysis_summary {
        Some(text) => format!("**Vision Analysis**: {}", text),
        None => "**Pixel-level comparison only** (vision analysis disabled)".to_string(),
    };

    let heatmap = match &result.heatmap_path {
        Some(path) => format!("**Heatmap**: See {}\n", path.display()),
        None => String::new(),
    };

    format!(
        "# Visual Regression Comparison Report\n\n\
         **Generated**: {generated}\n\
         **Status**: {status}\n\n\
         ---\n\n\
         ## Comparison Details\n\n\
         - **Before**: `{before}`\n\
         - **After**: `{after}`\n\
         - **Threshold**: {threshold}px\n\
         - **Changed Pixels**: {changed} / {total} ({percentage:.2}%)\n\n\
         ---\n\n\
         ## Result\n\n\
         ### {status}\n\n\
         {verdict}\n\n\
         ---\n\n\
         ## Intended Changes ({intended_count})\n\n\
         {intended}\n\n\
         ---\n\n\
         ## Unintended Changes ({unintended_count})\n\n\
         {unintended}\n\n\
         ---\n\n\
         ## Summary\n\n\
         {summary}\n\n\
         {heatmap}\
         ---\n\n\
         *Generated by Vigil - Visual Regression Toolkit*\n",
        generated = result.timestamp.format("%Y-%m-%d %H:%M:%S"),
        status = status,
        before = file_name(&result.before_path),
        after = file_name(&result.after_path),
        threshold = result.threshold,
        changed = group_thousands(result.changed_pixels),
        total = group_thousands(result.total_pixels),
        percentage = result.changed_percentage,
        verdict = verdict,
        intended_count = result.intended_changes.len(),
        intended = intended,
        unintended_count = result.unintended_changes.len(),
        unintended = unintended,
        summary = summary,
        heatmap = heatmap,
    )
}

fn intended_line(change: &ChangeRegion) -> String {
    format!(
        "1. **{}** (confidence: {:.2})",
        change.description, change.confidence
    )
}

fn unintended_line(change: &ChangeRegion) -> String {
    let severity = change
        .severity
        .map(|severity| format!("{:?}", severity).to_lowercase())
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        "1. **{}** (severity: {}, confidence: {:.2})",
        change.description, severity, change.confidence
    )
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;
    use vigil_core_types::{Intent, Severity};

    fn base_result() -> ComparisonResult {
        ComparisonResult {
            before_path: PathBuf::from("/shots/before.png"),
            after_path: PathBuf::from("/shots/after.png"),
            threshold: 2,
            changed_pixels: 2500,
            total_pixels: 2_073_600,
            changed_percentage: 0.12,
            intended_changes: Vec::new(),
            unintended_changes: Vec::new(),
            passed: true,
            failure_reason: None,
            analysis_summary: None,
            heatmap_path: None,
            report_path: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn passing_report_has_pass_markers() {
        let report = render(&base_result());
        assert!(report.contains("✅ PASSED"));
        assert!(report.contains("All checks passed!"));
        assert!(report.contains("`before.png`"));
        assert!(report.contains("2,500 / 2,073,600 (0.12%)"));
        assert!(report.contains("No intended changes detected."));
        assert!(report.contains("(vision analysis disabled)"));
    }

    #[test]
    fn failing_report_names_the_reason() {
        let mut result = base_result();
        result.passed = false;
        result.failure_reason = Some("1 critical unintended change(s) detected".to_string());
        let mut change = ChangeRegion {
            bbox: None,
            description: "login form missing".to_string(),
            confidence: 0.95,
            intent: Intent::Unintended,
            severity: Some(Severity::Critical),
        };
        result.unintended_changes.push(change.clone());
        change.severity = None;
        result.unintended_changes.push(change);

        let report = render(&result);
        assert!(report.contains("❌ FAILED"));
        assert!(report.contains("**Reason**: 1 critical unintended change(s) detected"));
        assert!(report.contains("(severity: critical, confidence: 0.95)"));
        assert!(report.contains("(severity: unknown, confidence: 0.95)"));
    }

    #[test]
    fn summary_and_heatmap_lines_appear_when_present() {
        let mut result = base_result();
        result.analysis_summary = Some("One intentional banner swap.".to_string());
        result.heatmap_path = Some(PathBuf::from("/data/reports/x-heatmap.png"));

        let report = render(&result);
        assert!(report.contains("**Vision Analysis**: One intentional banner swap."));
        assert!(report.contains("**Heatmap**: See /data/reports/x-heatmap.png"));
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(2_073_600), "2,073,600");
    }
}
