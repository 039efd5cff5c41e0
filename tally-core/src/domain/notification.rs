//! Notification domain model
//!
//! `NotificationEvent` is the raw, loosely-typed payload handed to us by the
//! OS listener. Nothing downstream touches it: it is normalized into a
//! `NormalizedEvent` at the capture boundary, and persisted as a
//! `CapturedNotification`.

use std::sync::OnceLock;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

/// Epoch values below this are interpreted as seconds, above as milliseconds
const SECONDS_EPOCH_CEILING: i64 = 100_000_000_000;

/// Raw OS notification payload. Every field is optional and untrusted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    #[serde(default, deserialize_with = "lenient_string")]
    pub source_app: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub big_text: Option<String>,
    #[serde(default)]
    pub emitted_at: Option<EmittedAt>,
}

/// Emission time as delivered by the listener: an epoch number or a string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmittedAt {
    Epoch(i64),
    Fractional(f64),
    Text(String),
}

impl EmittedAt {
    /// Interpret the value as a UTC timestamp, if possible
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            EmittedAt::Epoch(n) => epoch_to_utc(*n),
            EmittedAt::Fractional(f) if f.is_finite() => epoch_to_utc(*f as i64),
            EmittedAt::Fractional(_) => None,
            EmittedAt::Text(s) => {
                let s = s.trim();
                if let Ok(n) = s.parse::<i64>() {
                    return epoch_to_utc(n);
                }
                DateTime::parse_from_rfc3339(s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok()
            }
        }
    }
}

fn epoch_to_utc(n: i64) -> Option<DateTime<Utc>> {
    if n <= 0 {
        return None;
    }
    if n < SECONDS_EPOCH_CEILING {
        DateTime::from_timestamp(n, 0)
    } else {
        DateTime::from_timestamp_millis(n)
    }
}

/// Accept strings, numbers and booleans; anything else becomes `None`
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// Accept RFC 3339 strings or epoch numbers; malformed values become `None`
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => EmittedAt::Text(s).to_utc(),
        Some(serde_json::Value::Number(n)) => n.as_i64().and_then(epoch_to_utc),
        _ => None,
    })
}

/// A notification event after boundary normalization
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    pub source_app: String,
    pub title: String,
    pub text: String,
    pub emitted_at: DateTime<Utc>,
    /// Identifier for payloads that carry no native id
    pub event_id: String,
}

impl NormalizedEvent {
    /// Normalize a raw event. `now` is used when the emission time is missing
    /// or unparseable.
    pub fn from_event(event: &NotificationEvent, now: DateTime<Utc>) -> Self {
        let source_app = clean(event.source_app.as_deref());
        let title = clean(event.title.as_deref());
        let text = clean(event.text.as_deref());
        let big_text = clean(event.big_text.as_deref());

        // Expanded notifications carry the full message in bigText
        let text = if big_text.chars().count() > text.chars().count() {
            big_text
        } else {
            text
        };

        let emitted_at = event
            .emitted_at
            .as_ref()
            .and_then(EmittedAt::to_utc)
            .unwrap_or(now);

        let event_id = fallback_event_id(&source_app, emitted_at);

        Self {
            source_app,
            title,
            text,
            emitted_at,
            event_id,
        }
    }

    /// Content hash shared by every delivery of the same notification
    pub fn dedup_key(&self) -> String {
        dedup_key(&self.source_app, &self.title, &self.text)
    }

    /// Identifies one transaction across the headless and foreground paths.
    /// Two purchases with identical text differ by emission time.
    pub fn transaction_key(&self) -> String {
        format!("{}@{}", self.dedup_key(), self.emitted_at.timestamp_millis())
    }
}

fn clean(value: Option<&str>) -> String {
    value.map(|s| s.trim().to_string()).unwrap_or_default()
}

/// Monotonic nanoseconds since the first call in this process
fn process_nanos() -> u128 {
    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_nanos()
}

/// Build an identifier from source app, emission time and process time
pub fn fallback_event_id(source_app: &str, emitted_at: DateTime<Utc>) -> String {
    let source = if source_app.is_empty() {
        "unknown"
    } else {
        source_app
    };
    format!(
        "{}:{}:{}",
        source,
        emitted_at.timestamp_millis(),
        process_nanos()
    )
}

/// Content hash over (source, title, text), 32 hex chars
pub fn dedup_key(source_app: &str, title: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_app.as_bytes());
    hasher.update([0x1f]);
    hasher.update(title.as_bytes());
    hasher.update([0x1f]);
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}

/// A notification as recorded in the notification log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedNotification {
    pub id: String,
    pub source_app: String,
    pub title: String,
    pub text: String,
    /// Emission time of the event. Older documents may hold malformed values.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub captured_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_monitored_source: bool,
    #[serde(default)]
    pub dedup_key: String,
}

impl CapturedNotification {
    pub fn from_event(event: &NormalizedEvent, is_monitored_source: bool) -> Self {
        Self {
            id: event.event_id.clone(),
            source_app: event.source_app.clone(),
            title: event.title.clone(),
            text: event.text.clone(),
            captured_at: Some(event.emitted_at),
            is_monitored_source,
            dedup_key: event.dedup_key(),
        }
    }

    /// Timestamp used for ordering; missing values sort as the epoch
    pub fn sort_timestamp(&self) -> DateTime<Utc> {
        self.captured_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Same (source, title, text)
    pub fn same_content(&self, other: &CapturedNotification) -> bool {
        self.source_app == other.source_app && self.title == other.title && self.text == other.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_emitted_at_accepts_seconds_millis_and_rfc3339() {
        let secs = EmittedAt::Epoch(1_700_000_000).to_utc().unwrap();
        let millis = EmittedAt::Epoch(1_700_000_000_000).to_utc().unwrap();
        let text = EmittedAt::Text("2023-11-14T22:13:20Z".to_string())
            .to_utc()
            .unwrap();
        let numeric_text = EmittedAt::Text("1700000000000".to_string()).to_utc().unwrap();

        assert_eq!(secs, at(1_700_000_000));
        assert_eq!(millis, secs);
        assert_eq!(text, secs);
        assert_eq!(numeric_text, secs);
    }

    #[test]
    fn test_emitted_at_rejects_garbage() {
        assert!(EmittedAt::Text("yesterday".to_string()).to_utc().is_none());
        assert!(EmittedAt::Epoch(0).to_utc().is_none());
        assert!(EmittedAt::Fractional(f64::NAN).to_utc().is_none());
    }

    #[test]
    fn test_event_deserializes_loose_payload() {
        let event: NotificationEvent = serde_json::from_str(
            r#"{"sourceApp": "com.revolut.revolut", "title": 42, "text": null,
                "bigText": "Pagamento di 7,00 € da AKATHOR", "emittedAt": "1700000000000"}"#,
        )
        .unwrap();

        assert_eq!(event.title.as_deref(), Some("42"));
        assert!(event.text.is_none());

        let normalized = NormalizedEvent::from_event(&event, at(0));
        assert_eq!(normalized.text, "Pagamento di 7,00 € da AKATHOR");
        assert_eq!(normalized.emitted_at, at(1_700_000_000));
    }

    #[test]
    fn test_missing_emitted_at_falls_back_to_now() {
        let event = NotificationEvent {
            source_app: Some("app".to_string()),
            ..Default::default()
        };
        let normalized = NormalizedEvent::from_event(&event, at(1_234_567));
        assert_eq!(normalized.emitted_at, at(1_234_567));
        assert!(normalized.event_id.starts_with("app:1234567000:"));
    }

    #[test]
    fn test_dedup_key_depends_on_content_only() {
        let a = dedup_key("app", "Title", "Body");
        let b = dedup_key("app", "Title", "Body");
        let c = dedup_key("app", "Title", "Body!");
        let d = dedup_key("appT", "itle", "Body");

        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_transaction_key_separates_repeat_purchases() {
        let event = |emitted_secs: i64| NotificationEvent {
            source_app: Some("app".to_string()),
            title: Some("Bar: dettagli".to_string()),
            text: Some("Pagamento di 1,20 €".to_string()),
            big_text: None,
            emitted_at: Some(EmittedAt::Epoch(emitted_secs)),
        };
        let first = NormalizedEvent::from_event(&event(1_700_000_000), at(0));
        let redelivered = NormalizedEvent::from_event(&event(1_700_000_000), at(5));
        let repeat = NormalizedEvent::from_event(&event(1_700_000_060), at(60));

        assert_eq!(first.transaction_key(), redelivered.transaction_key());
        assert_ne!(first.transaction_key(), repeat.transaction_key());
        assert_eq!(first.dedup_key(), repeat.dedup_key());
    }

    #[test]
    fn test_captured_notification_tolerates_bad_timestamp() {
        let entry: CapturedNotification = serde_json::from_str(
            r#"{"id": "x", "sourceApp": "a", "title": "t", "text": "b", "capturedAt": "not a date"}"#,
        )
        .unwrap();
        assert!(entry.captured_at.is_none());
        assert_eq!(entry.sort_timestamp(), DateTime::<Utc>::UNIX_EPOCH);
    }
}
