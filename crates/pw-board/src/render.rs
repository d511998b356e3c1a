//! Comparison table markup.
//!
//! Every interpolated value goes through [`escape_html`]; server strings
//! never reach the markup raw.

use crate::snapshot::PriceSnapshot;

/// Render the single-row comparison table for one snapshot.
///
/// Output depends only on the snapshot, so the same input always yields
/// byte-identical markup.
pub fn render_table(snapshot: &PriceSnapshot) -> String {
    let verdict = snapshot.verdict();
    format!(
        r#"<table class="table table-striped">
  <thead>
    <tr>
      <th scope="col">COIN</th>
      <th scope="col">MARKET PRICE</th>
      <th scope="col">USER PRICE</th>
    </tr>
  </thead>
  <tbody>
    <tr>
      <td><b>{symbol}</b></td>
      <td><b>{market}</b></td>
      <td style="{style}" data-verdict="{verdict}"><b>{user}</b></td>
    </tr>
  </tbody>
</table>"#,
        symbol = escape_html(snapshot.symbol()),
        market = escape_html(snapshot.market_price().raw()),
        user = escape_html(snapshot.user_price().raw()),
        style = verdict.style(),
        verdict = verdict.as_str(),
    )
}

/// Escape text for use in element content or a quoted attribute value.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
