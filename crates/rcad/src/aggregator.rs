//! Deterministic confidence scoring.
//!
//! Pure function of the evidence triple. Rules are evaluated in a fixed
//! order and are independent: each one that triggers adds its factors and
//! contributes its weight once. The score is the clamped sum of weights.

use chrono::{DateTime, Utc};
use rca_common::result::MAX_CONFIDENCE;
use rca_common::{
    ActionRuleConfig, AiAnalysis, EvidenceFactor, EvidenceLimits, EvidenceSnapshot,
    KubernetesContext, LogAnomalies, RcaResult, SourceKind, SourceOutcome,
};

/// AI reported at least one problem
pub const AI_PROBLEMS_WEIGHT: u8 = 30;
/// Logs contain errors
pub const LOG_ERRORS_WEIGHT: u8 = 25;
/// Cluster has Warning/Failed events
pub const CRITICAL_EVENTS_WEIGHT: u8 = 20;

pub const HEALTHY_SUMMARY: &str = "No significant issues detected. The system appears healthy.";

/// Emitted when factors exist but no action rule matched
pub const GENERIC_ACTION: &str = "Review recent deployments and configuration changes for the component";

// ============================================================================
// Action rules
// ============================================================================

/// Keyword predicate over detected log patterns, with the actions it contributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRule {
    pub name: String,
    /// Lowercased
    keywords: Vec<String>,
    pub actions: Vec<String>,
}

impl ActionRule {
    pub fn new(name: &str, keywords: &[&str], actions: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            actions: actions.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn matches(&self, patterns: &[String]) -> bool {
        patterns.iter().any(|pattern| {
            let pattern = pattern.to_lowercase();
            self.keywords.iter().any(|k| pattern.contains(k.as_str()))
        })
    }
}

impl From<&ActionRuleConfig> for ActionRule {
    fn from(config: &ActionRuleConfig) -> Self {
        Self {
            name: config.name.clone(),
            keywords: config.keywords.iter().map(|k| k.to_lowercase()).collect(),
            actions: config.actions.clone(),
        }
    }
}

/// Ordered rule table; every matching rule contributes, not just the first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionRules {
    rules: Vec<ActionRule>,
}

impl ActionRules {
    pub fn from_config(rules: &[ActionRuleConfig]) -> Self {
        Self {
            rules: rules.iter().map(ActionRule::from).collect(),
        }
    }

    pub fn builtin() -> Self {
        Self::from_config(&ActionRuleConfig::builtin())
    }

    pub fn push(&mut self, rule: ActionRule) {
        self.rules.push(rule);
    }

    /// Actions of all matching rules in table order, first occurrence kept
    pub fn recommend(&self, patterns: &[String]) -> Vec<String> {
        let mut actions: Vec<String> = Vec::new();
        for rule in self.rules.iter().filter(|r| r.matches(patterns)) {
            for action in &rule.actions {
                if !actions.contains(action) {
                    actions.push(action.clone());
                }
            }
        }
        actions
    }
}

// ============================================================================
// Aggregator
// ============================================================================

#[derive(Debug, Clone)]
pub struct Aggregator {
    rules: ActionRules,
    limits: EvidenceLimits,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(ActionRules::builtin(), EvidenceLimits::default())
    }
}

impl Aggregator {
    pub fn new(rules: ActionRules, limits: EvidenceLimits) -> Self {
        Self { rules, limits }
    }

    pub fn score(
        &self,
        k8s: &SourceOutcome<KubernetesContext>,
        logs: &SourceOutcome<LogAnomalies>,
        ai: &SourceOutcome<AiAnalysis>,
    ) -> RcaResult {
        self.score_at(k8s, logs, ai, Utc::now())
    }

    /// `score` with a fixed timestamp; identical inputs give identical results
    pub fn score_at(
        &self,
        k8s: &SourceOutcome<KubernetesContext>,
        logs: &SourceOutcome<LogAnomalies>,
        ai: &SourceOutcome<AiAnalysis>,
        generated_at: DateTime<Utc>,
    ) -> RcaResult {
        let factors = self.evidence_factors(k8s, logs, ai);
        let confidence_score = confidence(&factors);

        // Patterns only drive actions once the log rule itself has fired
        let patterns: &[String] = logs
            .success()
            .filter(|l| l.error_count > 0)
            .map(|l| l.patterns.as_slice())
            .unwrap_or(&[]);
        let mut actions = self.rules.recommend(patterns);
        if actions.is_empty() && !factors.is_empty() {
            actions.push(GENERIC_ACTION.to_string());
        }

        let summary = summarize(factors.len(), actions.len(), confidence_score);

        RcaResult {
            summary,
            confidence_score,
            factors: factors.into_iter().map(|f| f.description).collect(),
            actions,
            evidence: self.snapshot(k8s, logs, ai),
            generated_at,
        }
    }

    /// Triggered factors in evaluation order; a rule's weight sits on its first factor
    pub fn evidence_factors(
        &self,
        k8s: &SourceOutcome<KubernetesContext>,
        logs: &SourceOutcome<LogAnomalies>,
        ai: &SourceOutcome<AiAnalysis>,
    ) -> Vec<EvidenceFactor> {
        let mut factors = Vec::new();

        if let Some(analysis) = ai.success() {
            push_rule(
                &mut factors,
                SourceKind::AiAnalysis,
                AI_PROBLEMS_WEIGHT,
                analysis.problems.iter().map(|p| p.description.clone()),
            );
        }

        if let Some(anomalies) = logs.success().filter(|l| l.error_count > 0) {
            let lines = std::iter::once(format!("Found {} error logs", anomalies.error_count)).chain(
                anomalies
                    .patterns
                    .iter()
                    .take(self.limits.max_factor_patterns)
                    .cloned(),
            );
            push_rule(&mut factors, SourceKind::LogAnomalies, LOG_ERRORS_WEIGHT, lines);
        }

        if let Some(context) = k8s.success() {
            let critical = context.critical_events().count();
            if critical > 0 {
                push_rule(
                    &mut factors,
                    SourceKind::KubernetesContext,
                    CRITICAL_EVENTS_WEIGHT,
                    std::iter::once(format!("{} critical Kubernetes events", critical)),
                );
            }
        }

        factors
    }

    fn snapshot(
        &self,
        k8s: &SourceOutcome<KubernetesContext>,
        logs: &SourceOutcome<LogAnomalies>,
        ai: &SourceOutcome<AiAnalysis>,
    ) -> EvidenceSnapshot {
        let mut snapshot = EvidenceSnapshot {
            sources: vec![
                k8s.record(SourceKind::KubernetesContext),
                logs.record(SourceKind::LogAnomalies),
                ai.record(SourceKind::AiAnalysis),
            ],
            ..Default::default()
        };

        if let Some(context) = k8s.success() {
            snapshot.critical_events = context
                .critical_events()
                .take(self.limits.max_critical_events)
                .cloned()
                .collect();
            snapshot.pods = context
                .pods
                .iter()
                .filter(|p| !p.ready || p.restarts > 0)
                .take(self.limits.max_critical_events)
                .cloned()
                .collect();
        }

        if let Some(anomalies) = logs.success() {
            snapshot.log_samples = anomalies
                .entries
                .iter()
                .take(self.limits.max_log_samples)
                .cloned()
                .collect();
            snapshot.log_patterns = anomalies.patterns.clone();
            snapshot.error_count = anomalies.error_count;
            snapshot.warning_count = anomalies.warning_count;
        }

        snapshot.ai_analysis = ai.success().and_then(|a| serde_json::to_value(a).ok());
        snapshot
    }
}

/// Adds the rule's lines; no lines means the rule did not trigger
fn push_rule(
    factors: &mut Vec<EvidenceFactor>,
    source: SourceKind,
    weight: u8,
    lines: impl Iterator<Item = String>,
) {
    let mut first = true;
    for description in lines {
        factors.push(EvidenceFactor {
            description,
            weight: if first { weight } else { 0 },
            source,
        });
        first = false;
    }
}

fn confidence(factors: &[EvidenceFactor]) -> u8 {
    let total: u32 = factors.iter().map(|f| u32::from(f.weight)).sum();
    total.min(u32::from(MAX_CONFIDENCE)) as u8
}

fn summarize(factor_count: usize, action_count: usize, confidence_score: u8) -> String {
    if factor_count == 0 {
        return HEALTHY_SUMMARY.to_string();
    }
    format!(
        "Identified {} contributing factor{} with {} recommended action{} (confidence {}%).",
        factor_count,
        if factor_count == 1 { "" } else { "s" },
        action_count,
        if action_count == 1 { "" } else { "s" },
        confidence_score
    )
}
