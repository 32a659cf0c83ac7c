//! Report rendering for archival.
//!
//! Fixed sections in fixed order; output depends only on the result.

use chrono::{DateTime, Utc};
use rca_common::RcaResult;
use std::fmt::Write;

/// Render a diagnosis as Markdown
pub fn render(entity_ref: &str, result: &RcaResult) -> String {
    let mut out = String::new();
    let evidence = &result.evidence;

    let _ = writeln!(out, "# Root Cause Analysis: {}", entity_ref);
    let _ = writeln!(out);
    let _ = writeln!(out, "- Generated: {}", result.generated_at.to_rfc3339());
    let _ = writeln!(out, "- Confidence: {}/100", result.confidence_score);
    let _ = writeln!(out);

    let _ = writeln!(out, "## Summary");
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", result.summary);
    let _ = writeln!(out);

    let _ = writeln!(out, "## Contributing Factors");
    let _ = writeln!(out);
    numbered(&mut out, &result.factors);

    let _ = writeln!(out, "## Recommended Actions");
    let _ = writeln!(out);
    numbered(&mut out, &result.actions);

    let _ = writeln!(out, "## Evidence");
    let _ = writeln!(out);

    let _ = writeln!(out, "### Data Sources");
    let _ = writeln!(out);
    for source in &evidence.sources {
        match &source.detail {
            Some(detail) => {
                let _ = writeln!(out, "- {}: {} ({})", source.kind, source.status, detail);
            }
            None => {
                let _ = writeln!(out, "- {}: {}", source.kind, source.status);
            }
        }
    }
    let _ = writeln!(out);

    if !evidence.critical_events.is_empty() {
        let _ = writeln!(out, "### Critical Kubernetes Events");
        let _ = writeln!(out);
        for event in &evidence.critical_events {
            let _ = writeln!(
                out,
                "- [{:?}] {} {} (x{}): {}",
                event.severity, event.reason, event.involved_object, event.count, event.message
            );
        }
        let _ = writeln!(out);
    }

    if !evidence.pods.is_empty() {
        let _ = writeln!(out, "### Unhealthy Pods");
        let _ = writeln!(out);
        for pod in &evidence.pods {
            let _ = writeln!(
                out,
                "- {} phase={} ready={} restarts={}",
                pod.name, pod.phase, pod.ready, pod.restarts
            );
        }
        let _ = writeln!(out);
    }

    if evidence.error_count > 0 || evidence.warning_count > 0 || !evidence.log_samples.is_empty() {
        let _ = writeln!(out, "### Logs");
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{} errors, {} warnings",
            evidence.error_count, evidence.warning_count
        );
        let _ = writeln!(out);
        for pattern in &evidence.log_patterns {
            let _ = writeln!(out, "- pattern: {}", pattern);
        }
        for entry in &evidence.log_samples {
            let _ = writeln!(
                out,
                "- `{} {} {}`",
                entry.timestamp.to_rfc3339(),
                entry.level,
                entry.message
            );
        }
        let _ = writeln!(out);
    }

    if let Some(ai) = &evidence.ai_analysis {
        let _ = writeln!(out, "### AI Analysis");
        let _ = writeln!(out);
        let _ = writeln!(out, "```json");
        let _ = writeln!(
            out,
            "{}",
            serde_json::to_string_pretty(ai).unwrap_or_else(|_| ai.to_string())
        );
        let _ = writeln!(out, "```");
        let _ = writeln!(out);
    }

    out
}

fn numbered(out: &mut String, items: &[String]) {
    if items.is_empty() {
        let _ = writeln!(out, "_None._");
    }
    for (i, item) in items.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, item);
    }
    let _ = writeln!(out);
}

/// e.g. `rca-component-default-checkout-20261019T101500Z.md`
pub fn suggested_filename(entity_ref: &str, generated_at: DateTime<Utc>) -> String {
    let mut slug = String::with_capacity(entity_ref.len());
    for c in entity_ref.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '_' { c.to_ascii_lowercase() } else { '-' };
        if !(c == '-' && slug.ends_with('-')) {
            slug.push(c);
        }
    }
    format!(
        "rca-{}-{}.md",
        slug.trim_matches('-'),
        generated_at.format("%Y%m%dT%H%M%SZ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rca_common::{EvidenceSnapshot, SourceKind, SourceRecord, SourceStatus};

    fn sample() -> RcaResult {
        RcaResult {
            summary: "Identified 2 contributing factors with 1 recommended action (confidence 45%)."
                .to_string(),
            confidence_score: 45,
            factors: vec!["Found 5 error logs".to_string(), "timeout (5x)".to_string()],
            actions: vec!["Investigate latency of upstream dependencies".to_string()],
            evidence: EvidenceSnapshot {
                sources: vec![
                    SourceRecord {
                        kind: SourceKind::KubernetesContext,
                        status: SourceStatus::Success,
                        detail: None,
                    },
                    SourceRecord {
                        kind: SourceKind::AiAnalysis,
                        status: SourceStatus::Failed,
                        detail: Some("circuit breaker open".to_string()),
                    },
                ],
                error_count: 5,
                log_patterns: vec!["timeout (5x)".to_string()],
                ..Default::default()
            },
            generated_at: Utc.with_ymd_and_hms(2026, 10, 19, 10, 15, 0).unwrap(),
        }
    }

    #[test]
    fn test_sections_in_fixed_order() {
        let text = render("component:default/checkout", &sample());
        let positions: Vec<usize> = [
            "## Summary",
            "## Contributing Factors",
            "## Recommended Actions",
            "## Evidence",
        ]
        .iter()
        .map(|h| text.find(h).unwrap())
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(text.contains("1. Found 5 error logs\n2. timeout (5x)"));
        assert!(text.contains("- ai_analysis: failed (circuit breaker open)"));
    }

    #[test]
    fn test_render_is_stable() {
        let result = sample();
        assert_eq!(render("a", &result), render("a", &result));
    }

    #[test]
    fn test_empty_lists_marked() {
        let mut result = sample();
        result.factors.clear();
        result.actions.clear();
        let text = render("a", &result);
        assert_eq!(text.matches("_None._").count(), 2);
    }

    #[test]
    fn test_suggested_filename() {
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 10, 15, 0).unwrap();
        assert_eq!(
            suggested_filename("component:default/Checkout", at),
            "rca-component-default-checkout-20261019T101500Z.md"
        );
    }
}
