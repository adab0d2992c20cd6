//! Run-time settings shared by discovery, evaluation and the phase watcher.

use std::fmt;
use std::time::Duration;

/// Default deadline for a single provider or status-source call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default sleep between two poll attempts of a phase.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// How logical names are resolved to provider identifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DiscoveryStrategy {
    /// Walk provider listings and compare names.
    #[default]
    NameMatch,
    /// Query the global search service by cluster tag.
    TagSearch,
}

impl fmt::Display for DiscoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryStrategy::NameMatch => write!(f, "name-match"),
            DiscoveryStrategy::TagSearch => write!(f, "tag-search"),
        }
    }
}

/// What to do when a singleton kind matches several candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchMode {
    /// Keep the first candidate in provider-listing order.
    #[default]
    First,
    /// Treat more than one candidate as an error.
    Unique,
}

/// Bounds applied to every watch phase. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseLimits {
    pub max_attempts: Option<u32>,
    pub deadline: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct CheckConfig {
    pub call_timeout: Duration,
    pub retry_interval: Duration,
    pub strategy: DiscoveryStrategy,
    pub match_mode: MatchMode,
    pub phase_limits: PhaseLimits,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            strategy: DiscoveryStrategy::default(),
            match_mode: MatchMode::default(),
            phase_limits: PhaseLimits::default(),
        }
    }
}
