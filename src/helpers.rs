//! Small string utilities shared by the lexers, parser and renderer:
//! HTML escaping, URL sanitizing and resolution, table cell splitting,
//! bracket matching and the typographic substitutions.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

/// Escapes HTML-significant characters.
///
/// With `encode` every `&` is escaped; without it, ampersands that already
/// begin an entity reference (`&amp;`, `&#39;`, ...) are left alone.
pub fn escape(html: &str, encode: bool) -> String {
    let mut out = String::with_capacity(html.len());
    let bytes = html.as_bytes();
    for (i, ch) in html.char_indices() {
        match ch {
            '&' => {
                if !encode && is_entity_start(bytes, i) {
                    out.push('&');
                } else {
                    out.push_str("&amp;");
                }
            }
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

// True when bytes[i] == '&' opens `&#?\w+;`.
fn is_entity_start(bytes: &[u8], i: usize) -> bool {
    let mut j = i + 1;
    if j < bytes.len() && bytes[j] == b'#' {
        j += 1;
    }
    let start = j;
    while j < bytes.len() && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_') {
        j += 1;
    }
    j > start && j < bytes.len() && bytes[j] == b';'
}

lazy_static! {
    static ref UNESCAPE_RE: Regex =
        Regex::new(r"(?i)&(#(?:\d+)|#[xX][0-9a-fA-F]+|\w+);?").unwrap();
}

/// Reverses entity references back to characters. Named entities other than
/// `&colon;` are dropped, matching the sanitizer's conservative stance.
pub fn unescape(html: &str) -> String {
    UNESCAPE_RE
        .replace_all(html, |caps: &Captures| {
            let n = caps[1].to_lowercase();
            if n == "colon" {
                return ":".to_string();
            }
            if let Some(num) = n.strip_prefix('#') {
                let parsed = if let Some(hex) = num.strip_prefix('x') {
                    u32::from_str_radix(hex, 16).ok()
                } else {
                    num.parse::<u32>().ok()
                };
                return parsed
                    .and_then(char::from_u32)
                    .map(|c| c.to_string())
                    .unwrap_or_default();
            }
            String::new()
        })
        .into_owned()
}

lazy_static! {
    static ref ORIGIN_INDEPENDENT_URL: Regex =
        Regex::new(r"(?i)^$|^[a-z][a-z0-9+.-]*:|^[?#]").unwrap();
    static ref NON_WORD_COLON: Regex = Regex::new(r"[^\w:]").unwrap();
    static ref JUST_DOMAIN: Regex = Regex::new(r"^[^:]+:/*[^/]*$").unwrap();
    static ref PROTOCOL: Regex = Regex::new(r"^([^:]+:)[\s\S]*$").unwrap();
    static ref DOMAIN: Regex = Regex::new(r"^([^:]+:/*[^/]*)[\s\S]*$").unwrap();
    static ref AFTER_LAST_SLASH: Regex = Regex::new(r"[^/]*$").unwrap();
}

/// Validates and normalizes a link destination.
///
/// With `sanitize` the href is decoded and inspected for `javascript:`,
/// `vbscript:` and `data:` schemes; those (and undecodable hrefs) yield
/// `None`. A relative href is resolved against `base` when one is given.
pub fn clean_url(sanitize: bool, base: Option<&str>, href: &str) -> Option<String> {
    if sanitize {
        let decoded = url_decode(&unescape(href))?;
        let prot = NON_WORD_COLON.replace_all(&decoded, "").to_lowercase();
        if prot.starts_with("javascript:")
            || prot.starts_with("vbscript:")
            || prot.starts_with("data:")
        {
            return None;
        }
    }
    let href = match base {
        Some(base) if !ORIGIN_INDEPENDENT_URL.is_match(href) => resolve_url(base, href),
        _ => href.to_string(),
    };
    Some(encode_uri(&href).replace("%25", "%"))
}

/// Resolves `href` against `base` the way a browser would for the three
/// relative forms: protocol-relative, root-relative and path-relative.
pub fn resolve_url(base: &str, href: &str) -> String {
    let base = if JUST_DOMAIN.is_match(base) {
        format!("{}/", base)
    } else {
        // Strip everything after the last slash.
        AFTER_LAST_SLASH.replace(base, "").into_owned()
    };
    if let Some(rest) = href.strip_prefix("//") {
        format!("{}//{}", PROTOCOL.replace(&base, "$1"), rest)
    } else if href.starts_with('/') {
        format!("{}{}", DOMAIN.replace(&base, "$1"), href)
    } else {
        format!("{}{}", base, href)
    }
}

// Percent-decodes an href. Returns None on malformed sequences or when the
// decoded bytes are not valid UTF-8.
fn url_decode(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = s.get(i + 1..i + 3)?;
            let byte = u8::from_str_radix(hex, 16).ok()?;
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

// Characters a URI encoder leaves untouched.
fn is_uri_unreserved(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(
            ch,
            ';' | ','
                | '/'
                | '?'
                | ':'
                | '@'
                | '&'
                | '='
                | '+'
                | '$'
                | '-'
                | '_'
                | '.'
                | '!'
                | '~'
                | '*'
                | '\''
                | '('
                | ')'
                | '#'
                | '%'
        )
}

/// Percent-encodes the characters a URI cannot carry verbatim.
pub fn encode_uri(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if is_uri_unreserved(ch) {
            out.push(ch);
        } else {
            let mut buf = [0u8; 4];
            for byte in ch.encode_utf8(&mut buf).as_bytes() {
                out.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    out
}

/// Splits a table row on unescaped pipes. Leading and trailing empty cells
/// are dropped; when `count` is given the result is truncated or padded
/// with empty cells to exactly that width.
pub fn split_cells(table_row: &str, count: Option<usize>) -> Vec<String> {
    // Tag unescaped pipes so escaped ones survive the split.
    let mut tagged = String::with_capacity(table_row.len() + 8);
    let bytes = table_row.as_bytes();
    for (i, ch) in table_row.char_indices() {
        if ch == '|' {
            let mut escaped = false;
            let mut j = i;
            while j > 0 && bytes[j - 1] == b'\\' {
                escaped = !escaped;
                j -= 1;
            }
            if escaped {
                tagged.push('|');
            } else {
                tagged.push_str(" |");
            }
        } else {
            tagged.push(ch);
        }
    }

    let mut cells: Vec<&str> = tagged.split(" |").collect();
    if cells.first().map_or(false, |c| c.trim().is_empty()) {
        cells.remove(0);
    }
    if cells.last().map_or(false, |c| c.trim().is_empty()) {
        cells.pop();
    }
    if let Some(count) = count {
        cells.truncate(count);
        while cells.len() < count {
            cells.push("");
        }
    }
    cells
        .into_iter()
        .map(|c| c.trim().replace("\\|", "|"))
        .collect()
}

/// Finds the byte index of the bracket closing an already-open pair,
/// honoring backslash escapes and nesting. The scan starts at depth zero,
/// so the match is the close that would take depth negative.
pub fn find_closing_bracket(s: &str, open: u8, close: u8) -> Option<usize> {
    let bytes = s.as_bytes();
    if !bytes.contains(&close) {
        return None;
    }
    let mut level: i32 = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 1;
        } else if bytes[i] == open {
            level += 1;
        } else if bytes[i] == close {
            level -= 1;
            if level < 0 {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

lazy_static! {
    static ref OPENING_SINGLE: Regex = Regex::new("(^|[-\u{2014}/(\\[{\"\\s])'").unwrap();
    static ref OPENING_DOUBLE: Regex = Regex::new("(^|[-\u{2014}/(\\[{\u{2018}\\s])\"").unwrap();
}

/// Applies the classic typographic substitutions: curly quotes, dashes
/// and ellipses.
pub fn smartypants(text: &str) -> String {
    let text = text.replace("---", "\u{2014}").replace("--", "\u{2013}");
    let text = OPENING_SINGLE.replace_all(&text, "${1}\u{2018}");
    let text = text.replace('\'', "\u{2019}");
    let text = OPENING_DOUBLE.replace_all(&text, "${1}\u{201c}");
    let text = text.replace('"', "\u{201d}");
    text.replace("...", "\u{2026}")
}

/// Obfuscates an address as numeric character references, alternating
/// decimal and hexadecimal forms so the output stays deterministic.
pub fn mangle(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 6);
    for (i, ch) in text.chars().enumerate() {
        if i % 2 == 1 {
            out.push_str(&format!("&#x{:x};", ch as u32));
        } else {
            out.push_str(&format!("&#{};", ch as u32));
        }
    }
    out
}

lazy_static! {
    static ref FENCE_INDENT: Regex = Regex::new(r"^(\s+)(?:```|~~~)").unwrap();
    static ref LEADING_WS: Regex = Regex::new(r"^\s+").unwrap();
}

/// Strips from every code line the indentation carried by the opening
/// fence, so an indented fenced block does not keep the fence's offset.
pub fn indent_code_compensation(raw: &str, text: &str) -> String {
    let indent = match FENCE_INDENT.captures(raw) {
        Some(caps) => caps.get(1).map(|m| m.as_str().len()).unwrap_or(0),
        None => return text.to_string(),
    };
    text.split('\n')
        .map(|line| {
            let ws = LEADING_WS.find(line).map(|m| m.end()).unwrap_or(0);
            if ws >= indent {
                &line[indent..]
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_preserves_entities() {
        assert_eq!(escape("a &amp; b", false), "a &amp; b");
        assert_eq!(escape("a & b", false), "a &amp; b");
        assert_eq!(escape("a &amp; b", true), "a &amp;amp; b");
        assert_eq!(escape("<i>\"x\"</i>", false), "&lt;i&gt;&quot;x&quot;&lt;/i&gt;");
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("&#65;&#x42;"), "AB");
        assert_eq!(unescape("&colon;"), ":");
        assert_eq!(unescape("&bogus;"), "");
    }

    #[test]
    fn test_escape_round_trip() {
        for s in ["plain text", "a.b-c_d", "tabs\tand spaces"] {
            assert_eq!(unescape(&escape(s, true)), s);
        }
    }

    #[test]
    fn test_clean_url_blocks_javascript() {
        assert_eq!(clean_url(true, None, "javascript:alert(1)"), None);
        assert_eq!(
            clean_url(true, None, "java&#x09;script:alert(1)"),
            None
        );
        assert_eq!(
            clean_url(true, None, "https://x.test/a"),
            Some("https://x.test/a".to_string())
        );
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(resolve_url("http://a.test", "b"), "http://a.test/b");
        assert_eq!(resolve_url("http://a.test/c/d", "b"), "http://a.test/c/b");
        assert_eq!(resolve_url("http://a.test/c/d", "/b"), "http://a.test/b");
        assert_eq!(resolve_url("http://a.test/c", "//z.test/q"), "http://z.test/q");
    }

    #[test]
    fn test_split_cells() {
        assert_eq!(split_cells("| a | b |", None), vec!["a", "b"]);
        assert_eq!(split_cells("a | b \\| c", None), vec!["a", "b | c"]);
        assert_eq!(
            split_cells("a | b", Some(3)),
            vec!["a".to_string(), "b".to_string(), String::new()]
        );
        assert_eq!(split_cells("a | b | c", Some(2)), vec!["a", "b"]);
    }

    #[test]
    fn test_find_closing_bracket() {
        assert_eq!(find_closing_bracket("ab]c", b'[', b']'), Some(2));
        assert_eq!(find_closing_bracket("a[b]c]", b'[', b']'), Some(5));
        assert_eq!(find_closing_bracket("a\\]b", b'[', b']'), None);
    }

    #[test]
    fn test_smartypants() {
        assert_eq!(smartypants("\"hi\"..."), "\u{201c}hi\u{201d}\u{2026}");
        assert_eq!(smartypants("a--b---c"), "a\u{2013}b\u{2014}c");
    }

    #[test]
    fn test_mangle_is_deterministic() {
        assert_eq!(mangle("ab"), "&#97;&#x62;");
        assert_eq!(mangle("ab"), mangle("ab"));
    }

    #[test]
    fn test_indent_code_compensation() {
        let raw = "  ```\n  let x;\n  ```";
        assert_eq!(indent_code_compensation(raw, "  let x;"), "let x;");
        assert_eq!(indent_code_compensation("```\nx", "x"), "x");
    }
}
