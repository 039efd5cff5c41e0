//! Classifier - turns notification text into transaction candidates
//!
//! A notification is rejected when its source is not monitored, when it reads
//! as promotional (promo language and no payment language), or when no
//! amount can be found. Everything else becomes a candidate.
//!
//! Amount strategies, tried in order:
//! 1. `[sign] number [space] currency`   e.g. `+10,00 €`, `0.29 USD`
//! 2. `[sign] currency [space] number`   e.g. `$10.00`, `EUR 5,50`

use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{Local, NaiveDate};
use regex::{Captures, Regex};
use rust_decimal::Decimal;

use crate::domain::{ParsedTransactionCandidate, Rejection, Sign, TransactionKind};

/// Merchant used when the title has nothing before its first colon
pub const UNKNOWN_MERCHANT: &str = "Unknown";

const CURRENCY: &str = r"(?P<cur>€|\$|£|¥|(?:EUR|USD|GBP|CHF|JPY|CAD|AUD|SEK|NOK|DKK|PLN|CZK|HUF|RON|BGN|CNY)\b)";
const NUMBER: &str = r"(?P<num>\d+(?:[.,]\d+)*)";
const SIGN: &str = r"(?P<sign>[+\-\x{2212}])?";

fn promotional_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(?:invita\w*|amic[oi]|bonus|premi[o]?|vinci|hai vinto|concorso|codice promo|promozion\w*|offerta|sconto|guadagna|invite\w*|refer\w*|friends?|prizes?|win|winner|rewards?|promo\w*|offer|discount|earn)\b",
        )
        .expect("invalid promotional regex")
    })
}

fn real_transaction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(?:pagamento|pagato|hai pagato|addebit\w*|accredit\w*|bonifico|transazione|acquisto|prelievo|rimbors\w*|ricevut\w*|payment|paid|purchase|transaction|transfer\w*|debited|credited|refund\w*|received|spent|charged|withdrawal)\b",
        )
        .expect("invalid real transaction regex")
    })
}

fn income_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:rimbors\w*|ricevut\w*|accredit\w*|refund\w*|received|credited)\b")
            .expect("invalid income regex")
    })
}

fn amount_then_currency_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"{}\s*{}\s?{}", SIGN, NUMBER, CURRENCY))
            .expect("invalid amount regex")
    })
}

fn currency_then_amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"{}\s*{}\s?{}", SIGN, CURRENCY, NUMBER))
            .expect("invalid amount regex")
    })
}

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{2,4})\b").expect("invalid date regex")
    })
}

/// Amount found in a notification
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedAmount {
    pub amount: Decimal,
    pub currency: String,
    pub sign: Sign,
}

/// Classify with today's local date as the fallback transaction date
pub fn classify(
    title: &str,
    text: &str,
    is_monitored: bool,
) -> Result<ParsedTransactionCandidate, Rejection> {
    classify_at(title, text, is_monitored, Local::now().date_naive())
}

pub fn classify_at(
    title: &str,
    text: &str,
    is_monitored: bool,
    today: NaiveDate,
) -> Result<ParsedTransactionCandidate, Rejection> {
    if !is_monitored {
        return Err(Rejection::Unmonitored);
    }

    let haystack = format!("{} {}", title, text).to_lowercase();
    if is_promotional(&haystack) {
        return Err(Rejection::Promotional);
    }

    let extracted = extract_amount(text)
        .or_else(|| extract_amount(title))
        .ok_or(Rejection::UnparseableAmount)?;

    Ok(ParsedTransactionCandidate {
        amount: extracted.amount,
        currency: extracted.currency,
        sign: extracted.sign,
        merchant: extract_merchant(title),
        date: extract_date(text, today),
        source_text: text.to_string(),
        kind: infer_kind(extracted.sign, &haystack),
        is_promotional: false,
        is_monitored,
    })
}

/// Promotional iff some promo pattern matches and no payment pattern does.
/// Expects lower-cased input.
pub fn is_promotional(haystack: &str) -> bool {
    promotional_re().is_match(haystack) && !real_transaction_re().is_match(haystack)
}

/// First amount found by the ordered strategies
pub fn extract_amount(text: &str) -> Option<ExtractedAmount> {
    let strategies = [amount_then_currency_re(), currency_then_amount_re()];
    strategies
        .iter()
        .find_map(|re| re.captures_iter(text).find_map(|caps| amount_from(&caps)))
}

fn amount_from(caps: &Captures<'_>) -> Option<ExtractedAmount> {
    let amount = normalize_decimal(caps.name("num")?.as_str())?;
    let sign = caps
        .name("sign")
        .map(|m| Sign::from_token(m.as_str()))
        .unwrap_or(Sign::None);

    Some(ExtractedAmount {
        amount,
        currency: caps.name("cur")?.as_str().to_string(),
        sign,
    })
}

/// Parse a number written with either `,` or `.` as decimal separator
///
/// The last separator is taken as the decimal point and all other
/// separators are dropped. Zero is not an amount.
pub fn normalize_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    let last_sep = raw.rfind(|c: char| c == ',' || c == '.');

    let normalized: String = match last_sep {
        None => raw.to_string(),
        Some(idx) => raw
            .char_indices()
            .filter_map(|(i, c)| match c {
                ',' | '.' if i == idx => Some('.'),
                ',' | '.' => None,
                c => Some(c),
            })
            .collect(),
    };

    let amount = Decimal::from_str(&normalized).ok()?;
    if amount.is_zero() {
        return None;
    }
    Some(amount)
}

/// Title up to the first colon, trimmed
pub fn extract_merchant(title: &str) -> String {
    let merchant = title.split(':').next().unwrap_or("").trim();
    if merchant.is_empty() {
        UNKNOWN_MERCHANT.to_string()
    } else {
        merchant.to_string()
    }
}

/// First `D/M/Y` style date in the text, or `today`
pub fn extract_date(text: &str, today: NaiveDate) -> NaiveDate {
    date_re()
        .captures(text)
        .and_then(|caps| {
            let day: u32 = caps[1].parse().ok()?;
            let month: u32 = caps[2].parse().ok()?;
            let year: i32 = match caps[3].len() {
                2 => 2000 + caps[3].parse::<i32>().ok()?,
                4 => caps[3].parse().ok()?,
                _ => return None,
            };
            NaiveDate::from_ymd_opt(year, month, day)
        })
        .unwrap_or(today)
}

/// Explicit sign wins; unsigned amounts are income only with income language
pub fn infer_kind(sign: Sign, haystack: &str) -> TransactionKind {
    match sign {
        Sign::Plus => TransactionKind::Income,
        Sign::Minus => TransactionKind::Expense,
        Sign::None if income_re().is_match(&haystack.to_lowercase()) => TransactionKind::Income,
        Sign::None => TransactionKind::Expense,
    }
}
