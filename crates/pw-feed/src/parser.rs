//! Binance trade stream parser.
//!
//! A trade event looks like:
//!
//! ```json
//! {"e":"trade","E":1672515782136,"s":"BTCUSDT","t":12345,"p":"16500.50","q":"0.001","T":1672515782134,"m":true,"M":true}
//! ```
//!
//! Price and quantity are kept as the exchange's strings so the board shows
//! them exactly as received.

use pw_core::MarketTrade;

/// Parse a trade event. Returns `None` for anything else (subscription acks,
/// errors, other event types) or if a required field is missing.
pub fn parse_trade(text: &str) -> Option<MarketTrade> {
    let v: serde_json::Value = serde_json::from_str(text).ok()?;
    if v.get("e")?.as_str()? != "trade" {
        return None;
    }

    Some(MarketTrade {
        symbol: v.get("s")?.as_str()?.to_string(),
        price: str_field(&v, "p")?,
        quantity: str_field(&v, "q")?,
        event_time_ms: parse_str_u64(v.get("E"))?,
        trade_id: parse_str_u64(v.get("t"))?,
    })
}

/// Whether a trade price is strictly below the user's price.
///
/// Both sides are parsed as floats; an unparseable side never alerts.
pub fn below_user_price(trade_price: &str, user_price: &str) -> bool {
    match (parse_price(trade_price), parse_price(user_price)) {
        (Some(trade), Some(user)) => trade < user,
        _ => false,
    }
}

#[inline]
fn parse_price(s: &str) -> Option<f64> {
    fast_float2::parse::<f64, _>(s.trim()).ok()
}

/// String field that may also arrive as a bare JSON number.
fn str_field(v: &serde_json::Value, key: &str) -> Option<String> {
    let field = v.get(key)?;
    match field {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[inline]
fn parse_str_u64(v: Option<&serde_json::Value>) -> Option<u64> {
    let v = v?;
    if let Some(s) = v.as_str() { s.parse().ok() } else { v.as_u64() }
}
