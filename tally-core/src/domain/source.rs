//! Monitored notification sources

use serde::{Deserialize, Serialize};

/// Package identifier of the primary wallet app. Always monitored.
pub const PRIMARY_WALLET_IDENTIFIER: &str = "com.google.android.apps.walletnfcrel";

/// Catalog id of the primary wallet source
pub const PRIMARY_WALLET_SOURCE_ID: &str = "google_wallet";

/// An app the user can opt into as a financial-notification origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoredSource {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub icon: Option<String>,
    /// Package identifiers, matched exactly or as a substring
    #[serde(default)]
    pub identifiers: Vec<String>,
    /// Free keywords, matched as a substring of the identifier
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl MonitoredSource {
    fn builtin(
        id: &str,
        display_name: &str,
        icon: &str,
        identifiers: &[&str],
        keywords: &[&str],
    ) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            icon: Some(icon.to_string()),
            identifiers: identifiers.iter().map(|s| s.to_string()).collect(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Sources known out of the box. Users enable them by id.
pub fn builtin_sources() -> Vec<MonitoredSource> {
    vec![
        MonitoredSource::builtin(
            PRIMARY_WALLET_SOURCE_ID,
            "Google Wallet",
            "wallet",
            &[PRIMARY_WALLET_IDENTIFIER],
            &[],
        ),
        MonitoredSource::builtin(
            "samsung_wallet",
            "Samsung Wallet",
            "wallet",
            &["com.samsung.android.spay", "com.samsung.android.samsungpay.gear"],
            &["samsungpay"],
        ),
        MonitoredSource::builtin(
            "paypal",
            "PayPal",
            "paypal",
            &["com.paypal.android.p2pmobile"],
            &["paypal"],
        ),
        MonitoredSource::builtin(
            "revolut",
            "Revolut",
            "bank",
            &["com.revolut.revolut"],
            &["revolut"],
        ),
        MonitoredSource::builtin(
            "satispay",
            "Satispay",
            "phone",
            &["com.satispay.customer"],
            &["satispay"],
        ),
        MonitoredSource::builtin("n26", "N26", "bank", &["de.number26.android"], &["number26"]),
        MonitoredSource::builtin(
            "intesa",
            "Intesa Sanpaolo",
            "bank",
            &["com.latuabancaperandroid"],
            &["intesasanpaolo"],
        ),
        MonitoredSource::builtin(
            "unicredit",
            "UniCredit",
            "bank",
            &["eu.unicredit.mobile"],
            &["unicredit"],
        ),
        MonitoredSource::builtin(
            "postepay",
            "Postepay",
            "card",
            &["posteitaliane.posteapp.apppostepay"],
            &["postepay"],
        ),
        MonitoredSource::builtin("hype", "Hype", "card", &["it.hype.app"], &["hype.app"]),
        MonitoredSource::builtin(
            "bbva",
            "BBVA",
            "bank",
            &["com.bbva.mobile.android.it"],
            &["bbva"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_ids_are_unique() {
        let sources = builtin_sources();
        let mut ids: Vec<_> = sources.iter().map(|s| s.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), sources.len());
    }

    #[test]
    fn test_primary_wallet_is_in_catalog() {
        assert!(builtin_sources()
            .iter()
            .any(|s| s.identifiers.iter().any(|i| i == PRIMARY_WALLET_IDENTIFIER)));
    }
}
