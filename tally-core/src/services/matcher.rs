//! Source matcher - decides whether a notification origin is monitored

use tracing::warn;

use crate::config::Config;
use crate::domain::result::Error;
use crate::domain::source::{PRIMARY_WALLET_IDENTIFIER, PRIMARY_WALLET_SOURCE_ID};
use crate::domain::MonitoredSource;

const WALLET_KEYWORD: &str = "wallet";

/// Which rule accepted an identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceMatch {
    PrimaryWallet,
    Identifier(String),
    Keyword(String),
    WalletHeuristic,
}

impl SourceMatch {
    /// Id of the configured source that matched, if any
    pub fn source_id(&self) -> Option<&str> {
        match self {
            SourceMatch::PrimaryWallet => Some(PRIMARY_WALLET_SOURCE_ID),
            SourceMatch::Identifier(id) | SourceMatch::Keyword(id) => Some(id),
            SourceMatch::WalletHeuristic => None,
        }
    }
}

/// Allow-list matcher over the enabled sources
///
/// Rules are checked in order and the first hit wins: the primary wallet
/// package, a configured identifier (exact or substring), a configured
/// keyword (substring), then any identifier containing "wallet".
#[derive(Debug, Clone, Default)]
pub struct SourceMatcher {
    sources: Vec<MonitoredSource>,
}

impl SourceMatcher {
    pub fn new(sources: Vec<MonitoredSource>) -> Self {
        // Lower-case once so matching stays case-insensitive
        let sources = sources
            .into_iter()
            .map(|mut s| {
                s.identifiers = lowercase_non_empty(s.identifiers);
                s.keywords = lowercase_non_empty(s.keywords);
                s
            })
            .collect();
        Self { sources }
    }

    /// Matcher that only knows the wallet rules
    pub fn wallet_only() -> Self {
        Self::default()
    }

    /// Build from a config load result, degrading to wallet-only on failure
    pub fn from_config(config: Result<&Config, &Error>) -> Self {
        match config {
            Ok(config) => Self::new(config.enabled_sources()),
            Err(e) => {
                warn!(error = %e, "Source configuration unavailable, using wallet-only matching");
                Self::wallet_only()
            }
        }
    }

    pub fn is_monitored(&self, identifier: &str) -> bool {
        self.match_source(identifier).is_some()
    }

    pub fn match_source(&self, identifier: &str) -> Option<SourceMatch> {
        let identifier = identifier.trim().to_lowercase();
        if identifier.is_empty() {
            return None;
        }

        if identifier == PRIMARY_WALLET_IDENTIFIER {
            return Some(SourceMatch::PrimaryWallet);
        }

        for source in &self.sources {
            if source
                .identifiers
                .iter()
                .any(|known| identifier == *known || identifier.contains(known.as_str()))
            {
                return Some(SourceMatch::Identifier(source.id.clone()));
            }
        }

        for source in &self.sources {
            if source
                .keywords
                .iter()
                .any(|keyword| identifier.contains(keyword.as_str()))
            {
                return Some(SourceMatch::Keyword(source.id.clone()));
            }
        }

        if identifier.contains(WALLET_KEYWORD) {
            return Some(SourceMatch::WalletHeuristic);
        }

        None
    }
}

fn lowercase_non_empty(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}
