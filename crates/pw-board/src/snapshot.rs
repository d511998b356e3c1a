//! Live price snapshot: schema check, numeric parsing, comparison.
//!
//! The `/live_price` body is validated against an explicit shape before
//! anything is compared or rendered:
//!
//! | Field   | Aliases       | Type              |
//! |---------|---------------|-------------------|
//! | Symbol  | `symbol`      | string            |
//! | price   | `marketPrice` | string or number  |
//! | user    | `userPrice`   | string or number  |
//!
//! Prices are compared as base-10 integers read from the leading digits of
//! the text (`"50000.75"` compares as `50000`), but always rendered verbatim.

use std::cmp::Ordering;
use std::fmt;

use thiserror::Error;

const SYMBOL_KEYS: &[&str] = &["Symbol", "symbol"];
const MARKET_KEYS: &[&str] = &["price", "marketPrice"];
const USER_KEYS: &[&str] = &["user", "userPrice"];

/// Why a response body is not a usable snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("body is not a JSON object")]
    NotObject,

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' has unexpected type {found}")]
    WrongType { field: &'static str, found: &'static str },

    #[error("field '{field}' is not a base-10 integer: '{value}'")]
    NotNumeric { field: &'static str, value: String },
}

/// A price as delivered plus its integer value for comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceField {
    raw: String,
    value: IntValue,
}

impl PriceField {
    pub fn parse(field: &'static str, raw: impl Into<String>) -> Result<Self, SnapshotError> {
        let raw = raw.into();
        match parse_int_prefix(&raw) {
            Some(value) => Ok(Self { raw, value }),
            None => Err(SnapshotError::NotNumeric { field, value: raw }),
        }
    }

    /// Text exactly as the server sent it.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn value(&self) -> &IntValue {
        &self.value
    }
}

/// Base-10 integer of any length.
///
/// Kept as sign plus digits without leading zeros, so prices far beyond
/// `i64` still order correctly. Zero is never negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntValue {
    negative: bool,
    digits: String,
}

impl IntValue {
    fn new(negative: bool, digits: &str) -> Self {
        let trimmed = digits.trim_start_matches('0');
        let digits = if trimmed.is_empty() { "0" } else { trimmed };
        Self { negative: negative && digits != "0", digits: digits.to_string() }
    }

    fn cmp_magnitude(&self, other: &Self) -> Ordering {
        self.digits.len().cmp(&other.digits.len()).then_with(|| self.digits.cmp(&other.digits))
    }
}

impl Ord for IntValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, false) => self.cmp_magnitude(other),
            (true, true) => other.cmp_magnitude(self),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
        }
    }
}

impl PartialOrd for IntValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for IntValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            f.write_str("-")?;
        }
        f.write_str(&self.digits)
    }
}

/// Read a base-10 integer from the start of `s`.
///
/// Leading whitespace and one sign are allowed; reading stops at the first
/// non-digit. `None` if there are no digits.
pub fn parse_int_prefix(s: &str) -> Option<IntValue> {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let len = rest.bytes().take_while(u8::is_ascii_digit).count();
    (len > 0).then(|| IntValue::new(negative, &rest[..len]))
}

/// Outcome of comparing the user price against the market price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// User price at or below market.
    Favorable,
    /// User price above market.
    Warning,
}

impl Verdict {
    /// `Warning` only when `user > market`; equal prices are favorable.
    pub fn compare<T: Ord>(market: T, user: T) -> Self {
        if user > market { Verdict::Warning } else { Verdict::Favorable }
    }

    /// Inline style applied to the user price cell.
    pub fn style(self) -> &'static str {
        match self {
            Verdict::Favorable => "color:green",
            Verdict::Warning => "color:red",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Favorable => "favorable",
            Verdict::Warning => "warning",
        }
    }
}

/// One poll's worth of data. Built fresh per response and discarded after
/// rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceSnapshot {
    symbol: String,
    market_price: PriceField,
    user_price: PriceField,
}

impl PriceSnapshot {
    pub fn new(symbol: impl Into<String>, market_price: &str, user_price: &str) -> Result<Self, SnapshotError> {
        Ok(Self {
            symbol: symbol.into(),
            market_price: PriceField::parse(MARKET_KEYS[0], market_price)?,
            user_price: PriceField::parse(USER_KEYS[0], user_price)?,
        })
    }

    /// Validate a decoded `/live_price` body.
    pub fn from_json(body: &serde_json::Value) -> Result<Self, SnapshotError> {
        let obj = body.as_object().ok_or(SnapshotError::NotObject)?;

        let symbol = match lookup(obj, SYMBOL_KEYS)? {
            serde_json::Value::String(s) => s.clone(),
            other => return Err(SnapshotError::WrongType { field: SYMBOL_KEYS[0], found: type_name(other) }),
        };
        let market_price = PriceField::parse(MARKET_KEYS[0], price_text(lookup(obj, MARKET_KEYS)?, MARKET_KEYS[0])?)?;
        let user_price = PriceField::parse(USER_KEYS[0], price_text(lookup(obj, USER_KEYS)?, USER_KEYS[0])?)?;

        Ok(Self { symbol, market_price, user_price })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn market_price(&self) -> &PriceField {
        &self.market_price
    }

    pub fn user_price(&self) -> &PriceField {
        &self.user_price
    }

    pub fn verdict(&self) -> Verdict {
        Verdict::compare(&self.market_price.value, &self.user_price.value)
    }
}

fn lookup<'a>(
    obj: &'a serde_json::Map<String, serde_json::Value>,
    keys: &[&'static str],
) -> Result<&'a serde_json::Value, SnapshotError> {
    keys.iter().find_map(|k| obj.get(*k)).ok_or(SnapshotError::MissingField(keys[0]))
}

fn price_text(v: &serde_json::Value, field: &'static str) -> Result<String, SnapshotError> {
    match v {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(SnapshotError::WrongType { field, found: type_name(other) }),
    }
}

fn type_name(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
