//! Configuration management for rcad.
//!
//! Loads settings from /etc/rca/config.toml or uses defaults.
//! Every field is optional in the file; missing fields take the default.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/rca/config.toml";

/// Default config file path for fallback
pub const DEFAULT_CONFIG_PATH: &str = "/var/lib/rca/config.toml";

// ============================================================================
// Per-branch deadlines
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadlineConfig {
    /// Cluster-state fetch deadline
    #[serde(default = "default_kubernetes_ms")]
    pub kubernetes_ms: u64,

    /// Log-anomaly fetch deadline
    #[serde(default = "default_logs_ms")]
    pub logs_ms: u64,

    /// AI branch deadline, including time queued in the rate limiter
    #[serde(default = "default_ai_ms")]
    pub ai_ms: u64,

    /// Deadline of the raw AI provider call once it has a slot
    #[serde(default = "default_ai_call_ms")]
    pub ai_call_ms: u64,
}

fn default_kubernetes_ms() -> u64 {
    10_000
}

fn default_logs_ms() -> u64 {
    15_000
}

fn default_ai_ms() -> u64 {
    20_000
}

fn default_ai_call_ms() -> u64 {
    15_000
}

impl DeadlineConfig {
    pub fn kubernetes(&self) -> Duration {
        Duration::from_millis(self.kubernetes_ms)
    }

    pub fn logs(&self) -> Duration {
        Duration::from_millis(self.logs_ms)
    }

    pub fn ai(&self) -> Duration {
        Duration::from_millis(self.ai_ms)
    }

    pub fn ai_call(&self) -> Duration {
        Duration::from_millis(self.ai_call_ms)
    }
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            kubernetes_ms: default_kubernetes_ms(),
            logs_ms: default_logs_ms(),
            ai_ms: default_ai_ms(),
            ai_call_ms: default_ai_call_ms(),
        }
    }
}

// ============================================================================
// AI provider guards
// ============================================================================

/// Reservoir limiter settings for the AI provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Calls allowed per window
    #[serde(default = "default_window_capacity")]
    pub window_capacity: u32,

    /// Window length; the reservoir refills to full capacity at each boundary
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Hard ceiling on in-flight calls
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_window_capacity() -> u32 {
    10
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_max_concurrent() -> usize {
    2
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_capacity: default_window_capacity(),
            window_ms: default_window_ms(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures before the breaker opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Time the breaker stays open before closing again
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_cooldown_secs() -> u64 {
    60
}

impl BreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

// ============================================================================
// Aggregation
// ============================================================================

/// Sample sizes kept in the evidence snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceLimits {
    #[serde(default = "default_max_critical_events")]
    pub max_critical_events: usize,

    #[serde(default = "default_max_log_samples")]
    pub max_log_samples: usize,

    /// Log patterns listed as factors after the error-count line
    #[serde(default = "default_max_factor_patterns")]
    pub max_factor_patterns: usize,
}

fn default_max_critical_events() -> usize {
    10
}

fn default_max_log_samples() -> usize {
    5
}

fn default_max_factor_patterns() -> usize {
    3
}

impl Default for EvidenceLimits {
    fn default() -> Self {
        Self {
            max_critical_events: default_max_critical_events(),
            max_log_samples: default_max_log_samples(),
            max_factor_patterns: default_max_factor_patterns(),
        }
    }
}

/// One row of the action table: any keyword found in a detected log
/// pattern (case-insensitive) contributes all of `actions`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRuleConfig {
    pub name: String,
    pub keywords: Vec<String>,
    pub actions: Vec<String>,
}

impl ActionRuleConfig {
    fn new(name: &str, keywords: &[&str], actions: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            actions: actions.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Built-in remediation table, evaluated in this order
    pub fn builtin() -> Vec<Self> {
        vec![
            Self::new(
                "memory",
                &["oomkilled", "out of memory"],
                &[
                    "Increase memory limits for the affected containers",
                    "Check the application for memory leaks",
                    "Compare memory requests with observed usage",
                ],
            ),
            Self::new(
                "latency",
                &["timeout", "timed out", "deadline exceeded"],
                &[
                    "Investigate latency of upstream dependencies",
                    "Check network policies and service connectivity",
                    "Review client timeout and retry settings",
                ],
            ),
            Self::new(
                "connectivity",
                &["connection refused", "connection reset", "econnrefused"],
                &[
                    "Verify dependent services are running and reachable",
                    "Check service endpoints and DNS resolution",
                ],
            ),
            Self::new(
                "image",
                &["imagepullbackoff", "errimagepull"],
                &[
                    "Verify the image name and tag exist in the registry",
                    "Check image pull secrets for the namespace",
                ],
            ),
            Self::new(
                "crashloop",
                &["crashloopbackoff"],
                &[
                    "Inspect logs of the previous container instance",
                    "Check liveness probe configuration and startup time",
                ],
            ),
        ]
    }
}

fn default_action_rules() -> Vec<ActionRuleConfig> {
    ActionRuleConfig::builtin()
}

// ============================================================================
// Collaborators
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    /// Extra patterns passed to the log-anomaly provider
    #[serde(default)]
    pub extra_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Directory receiving rendered reports
    #[serde(default = "default_archive_dir")]
    pub dir: PathBuf,
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("/var/lib/rca/reports")
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            dir: default_archive_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_audit_path")]
    pub path: PathBuf,
}

fn default_audit_path() -> PathBuf {
    PathBuf::from("/var/log/rca/audit.jsonl")
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: default_audit_path(),
        }
    }
}

// ============================================================================
// Root config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RcaConfig {
    #[serde(default)]
    pub deadlines: DeadlineConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub breaker: BreakerConfig,

    #[serde(default)]
    pub evidence: EvidenceLimits,

    #[serde(default = "default_action_rules")]
    pub actions: Vec<ActionRuleConfig>,

    #[serde(default)]
    pub logs: LogConfig,

    #[serde(default)]
    pub archive: ArchiveConfig,

    #[serde(default)]
    pub audit: AuditConfig,
}

impl Default for RcaConfig {
    fn default() -> Self {
        Self {
            deadlines: DeadlineConfig::default(),
            rate_limit: RateLimitConfig::default(),
            breaker: BreakerConfig::default(),
            evidence: EvidenceLimits::default(),
            actions: default_action_rules(),
            logs: LogConfig::default(),
            archive: ArchiveConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

impl RcaConfig {
    /// Load config from the standard locations, falling back to defaults
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_PATH)
            .or_else(|_| Self::load_from_path(DEFAULT_CONFIG_PATH))
            .unwrap_or_else(|e| {
                warn!("Config not found, using defaults: {}", e);
                RcaConfig::default()
            })
    }

    /// Load config from specific path
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: RcaConfig = toml::from_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
