//! Host page handling.
//!
//! The board lives inside an element identified by `id` (default `log`) in
//! an ordinary HTML page. [`host_page`] produces a fresh page;
//! [`replace_inner`] swaps the element's content in an existing one, leaving
//! every other byte of the page untouched.

use pw_core::PwError;

use crate::render::escape_html;

/// Browser reload period of the host page, matching the default poll cadence.
pub const REFRESH_SECS: u64 = 1;

/// A minimal page hosting the board element, styled with Bootstrap's table
/// classes. The page reloads itself every [`REFRESH_SECS`] so an open tab
/// follows the board.
pub fn host_page(title: &str, target_id: &str, inner: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta http-equiv="refresh" content="{refresh}">
  <title>{title}</title>
  <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/css/bootstrap.min.css">
</head>
<body>
  <div class="container">
    <h1>{title}</h1>
    <div id="{id}">{inner}</div>
  </div>
</body>
</html>
"#,
        title = escape_html(title),
        id = escape_html(target_id),
        refresh = REFRESH_SECS,
    )
}

/// Replace the content of the element whose `id` is `target_id`.
///
/// Nested elements with the same tag name are balanced, so the closing tag
/// found is the target's own. Tag matching is ASCII case-insensitive.
pub fn replace_inner(page: &str, target_id: &str, inner: &str) -> Result<String, PwError> {
    let (tag, content_start) = find_open_tag(page, target_id)
        .ok_or_else(|| PwError::Target(format!("no element with id '{target_id}'")))?;
    // ASCII lowercasing keeps byte offsets valid for `page`.
    let lower = page.to_ascii_lowercase();
    let content_end = find_matching_close(page, &lower, &tag, content_start)
        .ok_or_else(|| PwError::Target(format!("element '{target_id}' is not closed")))?;

    let mut out = String::with_capacity(page.len() - (content_end - content_start) + inner.len());
    out.push_str(&page[..content_start]);
    out.push_str(inner);
    out.push_str(&page[content_end..]);
    Ok(out)
}

/// An opening tag read out of the page.
struct OpenTag {
    /// Lowercase tag name.
    name: String,
    id: Option<String>,
    /// Offset just past the tag's `>`.
    end: usize,
    self_closing: bool,
}

/// Parse the opening tag whose `<` is at `at`. Attribute values are read
/// whole, so `>` or `id=` inside a quoted value belongs to that value.
fn parse_open_tag(page: &str, at: usize) -> Option<OpenTag> {
    let bytes = page.as_bytes();
    let skip_ws = |mut i: usize| {
        while bytes.get(i).is_some_and(u8::is_ascii_whitespace) {
            i += 1;
        }
        i
    };

    let mut i = at + 1;
    let name_len = bytes[i..].iter().take_while(|b| b.is_ascii_alphanumeric()).count();
    if name_len == 0 {
        return None;
    }
    let name = page[i..i + name_len].to_ascii_lowercase();
    i += name_len;
    let mut id = None;

    loop {
        i = skip_ws(i);
        match *bytes.get(i)? {
            b'>' => return Some(OpenTag { name, id, end: i + 1, self_closing: false }),
            b'/' if bytes.get(i + 1) == Some(&b'>') => {
                return Some(OpenTag { name, id, end: i + 2, self_closing: true });
            }
            b'/' => {
                i += 1;
                continue;
            }
            _ => {}
        }

        let attr_start = i;
        while bytes.get(i).is_some_and(|b| !b.is_ascii_whitespace() && !matches!(*b, b'=' | b'>' | b'/')) {
            i += 1;
        }
        let attr = &page[attr_start..i];
        i = skip_ws(i);

        let mut value = None;
        if bytes.get(i) == Some(&b'=') {
            i = skip_ws(i + 1);
            match *bytes.get(i)? {
                quote @ (b'"' | b'\'') => {
                    let close = i + 1 + bytes[i + 1..].iter().position(|&b| b == quote)?;
                    value = Some(&page[i + 1..close]);
                    i = close + 1;
                }
                _ => {
                    let start = i;
                    while bytes.get(i).is_some_and(|b| !b.is_ascii_whitespace() && *b != b'>') {
                        i += 1;
                    }
                    value = Some(&page[start..i]);
                }
            }
        }
        if attr.eq_ignore_ascii_case("id") {
            id = value.map(str::to_string);
        }
    }
}

/// Offset just past the `-->` closing the comment whose `<!--` is at `at`.
fn skip_comment(page: &str, at: usize) -> Option<usize> {
    Some(at + 4 + page[at + 4..].find("-->")? + 3)
}

/// Locate the opening tag whose `id` attribute equals `target_id`. Returns
/// the lowercase tag name and the offset just past the tag's `>`.
fn find_open_tag(page: &str, target_id: &str) -> Option<(String, usize)> {
    let mut pos = 0;
    while let Some(rel) = page[pos..].find('<') {
        let at = pos + rel;
        if page[at..].starts_with("<!--") {
            pos = skip_comment(page, at)?;
            continue;
        }
        match parse_open_tag(page, at) {
            Some(tag) if tag.id.as_deref() == Some(target_id) => {
                return (!tag.self_closing).then_some((tag.name, tag.end));
            }
            Some(tag) => pos = tag.end,
            None => pos = at + 1,
        }
    }
    None
}

fn find_matching_close(page: &str, lower: &str, tag: &str, from: usize) -> Option<usize> {
    let close = format!("</{tag}");
    let mut depth = 1usize;
    let mut pos = from;

    while let Some(rel) = lower[pos..].find('<') {
        let at = pos + rel;
        let rest = &lower[at..];
        if rest.starts_with("<!--") {
            pos = skip_comment(page, at)?;
        } else if rest.starts_with(&close) && is_tag_boundary(&rest[close.len()..]) {
            depth -= 1;
            if depth == 0 {
                return Some(at);
            }
            pos = at + close.len();
        } else if let Some(open) = parse_open_tag(page, at) {
            if open.name == tag && !open.self_closing {
                depth += 1;
            }
            pos = open.end;
        } else {
            pos = at + 1;
        }
    }
    None
}

fn is_tag_boundary(rest: &str) -> bool {
    rest.starts_with(|c: char| c == '>' || c == '/' || c.is_ascii_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_page_contains_target() {
        let page = host_page("Live price", "log", "<p>hi</p>");
        assert!(page.contains(r#"<div id="log"><p>hi</p></div>"#));
        assert!(page.contains("<title>Live price</title>"));
        assert!(page.contains(r#"<meta http-equiv="refresh" content="1">"#));
    }

    #[test]
    fn replaces_only_target_content() {
        let page = host_page("t", "log", "old");
        let out = replace_inner(&page, "log", "new").unwrap();
        assert_eq!(out, host_page("t", "log", "new"));
    }

    #[test]
    fn nested_same_tag_balanced() {
        let page = r#"<body><div id="log"><div>a</div><div class="x">b</div></div><div>keep</div></body>"#;
        let out = replace_inner(page, "log", "T").unwrap();
        assert_eq!(out, r#"<body><div id="log">T</div><div>keep</div></body>"#);
    }

    #[test]
    fn other_tag_and_single_quotes() {
        let page = "<SECTION class='a' id='log'>\n<p>x</p>\n</SECTION><footer></footer>";
        let out = replace_inner(page, "log", "<b>y</b>").unwrap();
        assert_eq!(out, "<SECTION class='a' id='log'><b>y</b></SECTION><footer></footer>");
    }

    #[test]
    fn data_attribute_not_confused_with_id() {
        let page = r#"<div data-id="log">no</div><div id="log">yes</div>"#;
        let out = replace_inner(page, "log", "ok").unwrap();
        assert_eq!(out, r#"<div data-id="log">no</div><div id="log">ok</div>"#);
    }

    #[test]
    fn id_inside_attribute_value_ignored() {
        let page = r#"<div title='see id="log"'>decoy</div><div id="log">real</div>"#;
        let out = replace_inner(page, "log", "NEW").unwrap();
        assert_eq!(out, r#"<div title='see id="log"'>decoy</div><div id="log">NEW</div>"#);
    }

    #[test]
    fn quoted_gt_and_comments_skipped() {
        let page = r#"<!-- <div id="log"> --><div data-x="a>b" id=log><span title="</div>">x</span></div><p></p>"#;
        let out = replace_inner(page, "log", "NEW").unwrap();
        assert_eq!(out, r#"<!-- <div id="log"> --><div data-x="a>b" id=log>NEW</div><p></p>"#);
    }

    #[test]
    fn self_closing_target_is_error() {
        assert!(matches!(replace_inner(r#"<div id="log"/>"#, "log", "x"), Err(PwError::Target(_))));
    }

    #[test]
    fn replacing_twice_is_stable() {
        let page = host_page("t", "log", "");
        let once = replace_inner(&page, "log", "<table></table>").unwrap();
        let twice = replace_inner(&once, "log", "<table></table>").unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn missing_or_unclosed_target() {
        assert!(matches!(replace_inner("<div id=\"other\"></div>", "log", "x"), Err(PwError::Target(_))));
        assert!(matches!(replace_inner("<div id=\"log\">open", "log", "x"), Err(PwError::Target(_))));
    }
}
