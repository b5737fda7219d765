//! Token recognizers for both lexer stages.
//!
//! Each recognizer inspects the start of the remaining source and, on a
//! match, returns a token carrying the exact `raw` span it consumed; the
//! lexer advances by that length. The [`Tokenizer`] trait exposes every
//! recognizer with a default body so embedders can override individual
//! constructs.
//!
//! Productions whose grammar needs backreferences or lookaround are
//! matched procedurally here on top of the opening patterns and
//! interruption tests from the rules module.

use lazy_static::lazy_static;
use regex::Regex;

use crate::helpers;
use crate::options::Options;
use crate::rules::{self, BlockRules, InlineRules};
use crate::token::{Links, ListItem, Token};

/// Result of a recognizer that may extend the previous token instead of
/// producing a new one (indented code after a paragraph, plain lines
/// after a text block).
#[derive(Debug)]
pub enum BlockPiece {
    Token(Token),
    Continuation { raw: String, text: String },
}

/// A link-reference definition captured at the top level.
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub raw: String,
    pub tag: String,
    pub href: String,
    pub title: Option<String>,
}

/// Outcome of the inline raw-tag recognizer, with the updated link and
/// raw-block states.
#[derive(Debug)]
pub struct TagPiece {
    pub token: Token,
    pub in_link: bool,
    pub in_raw_block: bool,
}

lazy_static! {
    static ref CODE_STRIP: Regex = Regex::new(r"(?m)^ {4}").unwrap();
    static ref WS_RUN: Regex = Regex::new(r"\s+").unwrap();
    static ref TABLE_HEADER_TRIM: Regex = Regex::new(r"^ *| *\| *$").unwrap();
    static ref TABLE_ALIGN_TRIM: Regex = Regex::new(r"^ *|\| *$").unwrap();
    static ref TABLE_ROW_TRIM: Regex = Regex::new(r"^ *\| *| *\| *$").unwrap();
    static ref LIST_HR_TERM: Regex =
        Regex::new(r"^(?:(?:- *){3,}|(?:_ *){3,}|(?:\* *){3,})(?:\n|$)").unwrap();
    static ref LIST_TERM_BULLET: Regex =
        Regex::new(r"^ {0,3}(?:[*+-]|\d{1,9}[.)]) ").unwrap();
    static ref TAG_A_OPEN: Regex = Regex::new(r"(?i)^<a ").unwrap();
    static ref TAG_A_CLOSE: Regex = Regex::new(r"(?i)^</a>").unwrap();
    static ref RAW_TAG_OPEN: Regex = Regex::new(r"(?i)^<(?:pre|code|kbd|script)[\s>]").unwrap();
    static ref RAW_TAG_CLOSE: Regex = Regex::new(r"(?i)^</(?:pre|code|kbd|script)[\s>]").unwrap();
    static ref PEDANTIC_TITLE_SINGLE: Regex =
        Regex::new(r"^([^'\x22]*[^\s])\s+'(.*)'").unwrap();
    static ref PEDANTIC_TITLE_DOUBLE: Regex =
        Regex::new(r#"^([^'"]*[^\s])\s+"(.*)""#).unwrap();
    static ref BR_SPACES: Regex = Regex::new(r"^ {2,}\n").unwrap();
    static ref BR_ANY: Regex = Regex::new(r"^ *\n").unwrap();
}

// Tag names rendered inline by the pedantic grammar; a block of raw
// HTML may not open with one of them.
const PEDANTIC_INLINE_TAGS: &[&str] = &[
    "a", "em", "strong", "small", "s", "cite", "q", "dfn", "abbr", "data", "time", "code", "var",
    "samp", "kbd", "sub", "sup", "i", "b", "u", "mark", "ruby", "rt", "rp", "bdi", "bdo", "span",
    "br", "wbr", "ins", "del", "img",
];

/// Override points for every construct the lexers recognize. All
/// methods delegate to the stock recognizers by default.
pub trait Tokenizer: Send + Sync {
    fn space(&self, src: &str) -> Option<Token> {
        space(src)
    }

    fn code(&self, src: &str, prev_paragraph: bool, block: BlockRules) -> Option<BlockPiece> {
        code(src, prev_paragraph, block)
    }

    fn fences(&self, src: &str, block: BlockRules) -> Option<Token> {
        fences(src, block)
    }

    fn heading(&self, src: &str, block: BlockRules) -> Option<Token> {
        heading(src, block)
    }

    fn nptable(&self, src: &str, block: BlockRules) -> Option<Token> {
        nptable(src, block)
    }

    fn hr(&self, src: &str) -> Option<Token> {
        hr(src)
    }

    fn blockquote(&self, src: &str) -> Option<Token> {
        blockquote(src)
    }

    fn list(&self, src: &str, block: BlockRules, options: &Options) -> Option<Token> {
        list(src, block, options)
    }

    fn html(&self, src: &str, block: BlockRules, options: &Options) -> Option<Token> {
        html(src, block, options)
    }

    fn def(&self, src: &str, block: BlockRules) -> Option<Definition> {
        def(src, block)
    }

    fn table(&self, src: &str, block: BlockRules) -> Option<Token> {
        table(src, block)
    }

    fn lheading(&self, src: &str) -> Option<Token> {
        lheading(src)
    }

    fn paragraph(&self, src: &str, block: BlockRules) -> Option<Token> {
        paragraph(src, block)
    }

    fn text(&self, src: &str, prev_text: bool) -> Option<BlockPiece> {
        text(src, prev_text)
    }

    fn escape(&self, src: &str) -> Option<Token> {
        escape(src)
    }

    fn tag(
        &self,
        src: &str,
        in_link: bool,
        in_raw_block: bool,
        options: &Options,
    ) -> Option<TagPiece> {
        tag(src, in_link, in_raw_block, options)
    }

    fn link(&self, src: &str, inline: InlineRules) -> Option<Token> {
        link(src, inline)
    }

    fn reflink(&self, src: &str, links: &Links, inline: InlineRules) -> Option<Token> {
        reflink(src, links, inline)
    }

    fn strong(
        &self,
        src: &str,
        masked: &str,
        prev_char: Option<char>,
        inline: InlineRules,
    ) -> Option<Token> {
        emphasis(src, masked, prev_char, inline, true)
    }

    fn em(
        &self,
        src: &str,
        masked: &str,
        prev_char: Option<char>,
        inline: InlineRules,
    ) -> Option<Token> {
        emphasis(src, masked, prev_char, inline, false)
    }

    fn codespan(&self, src: &str) -> Option<Token> {
        codespan(src)
    }

    fn br(&self, src: &str, inline: InlineRules) -> Option<Token> {
        br(src, inline)
    }

    fn del(&self, src: &str, inline: InlineRules) -> Option<Token> {
        del(src, inline)
    }

    fn autolink(&self, src: &str, options: &Options) -> Option<Token> {
        autolink(src, options)
    }

    fn url(&self, src: &str, inline: InlineRules, options: &Options) -> Option<Token> {
        url(src, inline, options)
    }

    fn inline_text(
        &self,
        src: &str,
        in_raw_block: bool,
        inline: InlineRules,
        options: &Options,
    ) -> Option<Token> {
        inline_text(src, in_raw_block, inline, options)
    }
}

/// The stock recognizer set.
#[derive(Debug, Default)]
pub struct DefaultTokenizer;

impl Tokenizer for DefaultTokenizer {}

pub fn space(src: &str) -> Option<Token> {
    let m = rules::BLOCK_NEWLINE.find(src)?;
    Some(Token::Space {
        raw: m.as_str().to_string(),
    })
}

pub fn code(src: &str, prev_paragraph: bool, block: BlockRules) -> Option<BlockPiece> {
    let m = rules::BLOCK_CODE.find(src)?;
    let raw = m.as_str();
    if prev_paragraph {
        // An indented code block cannot interrupt a paragraph.
        return Some(BlockPiece::Continuation {
            raw: raw.to_string(),
            text: raw.trim_end().to_string(),
        });
    }
    let text = CODE_STRIP.replace_all(raw, "").into_owned();
    let text = if block.pedantic {
        text
    } else {
        text.trim_end_matches('\n').to_string()
    };
    Some(BlockPiece::Token(Token::Code {
        raw: raw.to_string(),
        text,
        lang: None,
        escaped: false,
        indented: true,
    }))
}

// A closing fence line: up to three spaces, the opening delimiter run,
// any further fence characters, then spaces to the end of the line.
fn is_fence_close(line: &str, fence: &str) -> bool {
    let trimmed = line.trim_start_matches(' ');
    if line.len() - trimmed.len() > 3 || !trimmed.starts_with(fence) {
        return false;
    }
    let rest = trimmed[fence.len()..].trim_start_matches(['~', '`']);
    rest.chars().all(|c| c == ' ')
}

pub fn fences(src: &str, block: BlockRules) -> Option<Token> {
    if !block.fences_enabled() {
        return None;
    }
    let caps = rules::FENCE_OPEN.captures(src)?;
    let open = caps.get(0)?;
    let fence = caps.get(2)?.as_str();
    let info = caps.get(3)?.as_str();
    if fence.starts_with('`') && info.contains('`') {
        return None;
    }

    let rest = &src[open.end()..];
    let mut offset = 0;
    let mut close: Option<(usize, usize)> = None;
    while offset < rest.len() {
        let line_end = rest[offset..].find('\n').map(|i| offset + i);
        let line = match line_end {
            Some(end) => &rest[offset..end],
            None => &rest[offset..],
        };
        if is_fence_close(line, fence) {
            let end = line_end.map(|e| e + 1).unwrap_or(rest.len());
            close = Some((offset, end));
            break;
        }
        match line_end {
            Some(end) => offset = end + 1,
            None => break,
        }
    }

    let (raw, text) = match close {
        Some((content_end, mut raw_end)) => {
            while raw_end < rest.len() && rest.as_bytes()[raw_end] == b'\n' {
                raw_end += 1;
            }
            let content = &rest[..content_end];
            let text = content.strip_suffix('\n').unwrap_or(content);
            (&src[..open.end() + raw_end], text)
        }
        None if rest.is_empty() => (&src[..open.end()], ""),
        // An unclosed fence swallows the remaining source, provided it
        // ends at a line boundary.
        None if rest.ends_with('\n') => (src, &rest[..rest.len() - 1]),
        None => return None,
    };

    let lang = info.trim();
    Some(Token::Code {
        raw: raw.to_string(),
        text: helpers::indent_code_compensation(raw, text),
        lang: if lang.is_empty() {
            None
        } else {
            Some(lang.to_string())
        },
        escaped: false,
        indented: false,
    })
}

pub fn heading(src: &str, block: BlockRules) -> Option<Token> {
    let caps = block.heading().captures(src)?;
    let mut text = caps
        .get(2)
        .map(|m| m.as_str())
        .unwrap_or("")
        .trim()
        .to_string();

    if text.ends_with('#') {
        let trimmed = text.trim_end_matches('#');
        // A space must precede trailing hashes, unless pedantic.
        if block.pedantic || trimmed.is_empty() || trimmed.ends_with(' ') {
            text = trimmed.trim().to_string();
        }
    }

    Some(Token::Heading {
        raw: caps.get(0)?.as_str().to_string(),
        depth: caps.get(1)?.as_str().len() as u8,
        text,
        tokens: Vec::new(),
    })
}

// Collects table body rows until a blank line or an interrupting
// construct, then eats trailing newlines. Returns the rows and the
// number of bytes consumed.
fn gather_table_rows(rest: &str) -> (Vec<&str>, usize) {
    let mut rows = Vec::new();
    let mut offset = 0;
    while offset < rest.len() {
        let r = &rest[offset..];
        if rules::interrupts_table_row(r) {
            break;
        }
        match r.find('\n') {
            Some(i) => {
                rows.push(&r[..i]);
                offset += i + 1;
            }
            None => {
                rows.push(r);
                offset = rest.len();
            }
        }
    }
    while offset < rest.len() && rest.as_bytes()[offset] == b'\n' {
        offset += 1;
    }
    (rows, offset)
}

fn parse_align(align_row: &str) -> Vec<crate::token::Align> {
    use crate::token::Align;
    TABLE_ALIGN_TRIM
        .replace_all(align_row, "")
        .split('|')
        .map(|cell| {
            if rules::ALIGN_RIGHT.is_match(cell) {
                Align::Right
            } else if rules::ALIGN_CENTER.is_match(cell) {
                Align::Center
            } else if rules::ALIGN_LEFT.is_match(cell) {
                Align::Left
            } else {
                Align::None
            }
        })
        .collect()
}

fn build_table(
    raw: &str,
    header_row: &str,
    align_row: &str,
    rows: Vec<&str>,
    piped_rows: bool,
) -> Option<Token> {
    let header = helpers::split_cells(&TABLE_HEADER_TRIM.replace_all(header_row, ""), None);
    let align = parse_align(align_row);
    if header.len() != align.len() {
        return None;
    }
    let count = header.len();
    let cells: Vec<Vec<String>> = rows
        .into_iter()
        .map(|row| {
            let row = if piped_rows {
                TABLE_ROW_TRIM.replace_all(row, "").into_owned()
            } else {
                row.to_string()
            };
            helpers::split_cells(&row, Some(count))
        })
        .collect();

    Some(Token::Table {
        raw: raw.to_string(),
        header,
        align,
        cells,
        header_tokens: Vec::new(),
        cell_tokens: Vec::new(),
    })
}

pub fn table(src: &str, block: BlockRules) -> Option<Token> {
    if !block.tables_enabled() {
        return None;
    }
    let caps = rules::TABLE_HEAD.captures(src)?;
    let head = caps.get(0)?;
    let (rows, consumed) = gather_table_rows(&src[head.end()..]);
    build_table(
        &src[..head.end() + consumed],
        caps.get(1)?.as_str(),
        caps.get(2)?.as_str(),
        rows,
        true,
    )
}

pub fn nptable(src: &str, block: BlockRules) -> Option<Token> {
    if !block.tables_enabled() {
        return None;
    }
    let caps = rules::NPTABLE_HEAD.captures(src)?;
    let head = caps.get(0)?;
    let (rows, consumed) = gather_table_rows(&src[head.end()..]);
    build_table(
        &src[..head.end() + consumed],
        caps.get(1)?.as_str(),
        caps.get(2)?.as_str(),
        rows,
        false,
    )
}

pub fn hr(src: &str) -> Option<Token> {
    let m = rules::BLOCK_HR.find(src)?;
    Some(Token::Hr {
        raw: m.as_str().to_string(),
    })
}

pub fn blockquote(src: &str) -> Option<Token> {
    let mut pos = 0;
    while pos < src.len() {
        let m = match rules::BQ_MARKER.find(&src[pos..]) {
            Some(m) => m,
            None => break,
        };
        let mut p = pos + m.end();
        let line_len = src[p..].find('\n').unwrap_or(src.len() - p);
        if line_len > 0 {
            // The quoted line opens a paragraph that may lazily continue
            // onto unmarked lines.
            p += line_len;
            while src[p..].starts_with('\n') {
                let next = &src[p + 1..];
                let next_len = next.find('\n').unwrap_or(next.len());
                if next_len == 0 || rules::interrupts_paragraph(next, false) {
                    break;
                }
                p += 1 + next_len;
            }
        }
        if src[p..].starts_with('\n') {
            p += 1;
        }
        pos = p;
    }
    if pos == 0 {
        return None;
    }
    let raw = &src[..pos];
    Some(Token::Blockquote {
        raw: raw.to_string(),
        text: rules::BQ_STRIP.replace_all(raw, "").into_owned(),
        tokens: Vec::new(),
    })
}

// Leading indent, bullet, and total marker length of a list item.
fn item_start(item: &str) -> (usize, usize, &str) {
    match rules::LIST_ITEM_START.captures(item) {
        Some(caps) => {
            let full = caps.get(0).map(|m| m.end()).unwrap_or(0);
            let indent = caps.get(1).map(|m| m.end()).unwrap_or(0);
            let bullet = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            (full, indent, bullet)
        }
        None => (0, 0, ""),
    }
}

fn last_char(s: &str) -> Option<char> {
    s.chars().next_back()
}

// True when a blank line separates two chunks of item content.
fn has_inner_blank(text: &str) -> bool {
    match text.find("\n\n") {
        Some(i) => text[i + 2..].chars().any(|c| !c.is_whitespace()),
        None => false,
    }
}

fn outdent(text: &str, space: usize) -> String {
    text.split('\n')
        .map(|line| {
            let indent = line.len() - line.trim_start_matches(' ').len();
            &line[indent.min(space)..]
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// Locates the end of the whole list: a newline run followed by a
// thematic break at the list's own indent, or a blank line followed by
// a line that neither indents nor opens a new item.
fn list_raw_end(src: &str, content_start: usize, indent: &str) -> usize {
    let bytes = src.as_bytes();
    let mut i = content_start + 1;
    while i < src.len() {
        if bytes[i] != b'\n' {
            i += 1;
            continue;
        }
        let mut j = i;
        while j < src.len() && bytes[j] == b'\n' {
            j += 1;
        }
        let after = &src[j..];
        let hr_term = LIST_HR_TERM.is_match(after)
            || (!indent.is_empty()
                && after.starts_with(indent)
                && LIST_HR_TERM.is_match(&after[indent.len()..]));
        if hr_term {
            return j;
        }
        if j - i >= 2 && !after.starts_with(' ') && !LIST_TERM_BULLET.is_match(after) {
            return j;
        }
        i = j;
    }
    src.len()
}

pub fn list(src: &str, block: BlockRules, options: &Options) -> Option<Token> {
    let caps = rules::LIST_START.captures(src)?;
    let indent = caps.get(1)?.as_str();
    let bull = caps.get(2)?.as_str().to_string();
    let content_start = caps.get(0)?.end();
    let ordered = bull.len() > 1;
    let start = if ordered {
        bull[..bull.len() - 1].parse::<u64>().ok()
    } else {
        None
    };

    let raw_end = list_raw_end(src, content_start, indent);
    let mut list_raw = src[..raw_end].to_string();

    // Split the raw span into top-level items: a new item begins at any
    // line carrying a bullet, everything else continues the current one.
    let mut items: Vec<String> = Vec::new();
    for line in list_raw.split('\n') {
        if rules::BULLET_LINE.is_match(line) || items.is_empty() {
            items.push(line.to_string());
        } else if let Some(open) = items.last_mut() {
            open.push('\n');
            open.push_str(line);
        }
    }

    let mut list_items: Vec<ListItem> = Vec::new();
    let mut list_loose = false;
    let (mut bcurr_full, _, _) = item_start(&items[0]);

    let mut i = 0;
    while i < items.len() {
        if i + 1 < items.len() {
            let (next_full, next_indent, next_bullet) = {
                let (f, ind, b) = item_start(&items[i + 1]);
                (f, ind, b.to_string())
            };

            // A deeper marker folds the next chunk into this item.
            if next_indent > bcurr_full || next_indent > 3 {
                let merged = format!("{}\n{}", items[i], items[i + 1]);
                items[i] = merged;
                items.remove(i + 1);
                continue;
            }

            // A different bullet style ends the list early.
            let style_break = if !options.pedantic || options.smart_lists {
                last_char(&next_bullet) != last_char(&bull)
            } else {
                ordered == (next_bullet.len() == 1)
            };
            if style_break {
                let add_back = items[i + 1..].join("\n");
                list_raw.truncate(list_raw.len() - add_back.len());
                items.truncate(i + 1);
            } else {
                bcurr_full = next_full;
            }
        }

        let item_raw = items[i].clone();
        let mut space = item_raw.len();
        let mut text = rules::BULLET_STRIP.replace(&item_raw, "").into_owned();

        if text.contains("\n ") {
            space -= text.len();
            text = if block.pedantic {
                outdent(&text, 4)
            } else {
                outdent(&text, space)
            };
        }

        let mut loose = has_inner_blank(&text);
        if !loose && i != items.len() - 1 {
            loose = text.ends_with('\n');
        }
        if loose {
            list_loose = true;
        }

        let mut task = false;
        let mut checked = false;
        if options.gfm {
            if let Some(m) = rules::TASK_ITEM.find(&text) {
                task = true;
                checked = text.as_bytes().get(1) != Some(&b' ');
                text = text[m.end()..].to_string();
            }
        }

        list_items.push(ListItem {
            raw: item_raw,
            task,
            checked,
            loose,
            text,
            tokens: Vec::new(),
        });
        i += 1;
    }

    Some(Token::List {
        raw: list_raw,
        ordered,
        start,
        loose: list_loose,
        items: list_items,
    })
}

fn html_token(raw: &str, pre: bool, options: &Options) -> Token {
    if options.sanitize {
        let text = match &options.sanitizer {
            Some(sanitizer) => sanitizer.sanitize(raw),
            None => helpers::escape(raw, false),
        };
        Token::Paragraph {
            raw: raw.to_string(),
            text,
            tokens: Vec::new(),
        }
    } else {
        Token::Html {
            raw: raw.to_string(),
            text: raw.to_string(),
            pre,
        }
    }
}

fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || h.len() < n.len() {
        return None;
    }
    (0..=h.len() - n.len()).find(|&i| h[i..i + n.len()].eq_ignore_ascii_case(n))
}

// Consumes up to and including the next blank-line run, or the rest of
// the source.
fn consume_to_blank(src: &str, from: usize) -> usize {
    match src[from..].find("\n\n") {
        Some(i) => {
            let mut end = from + i;
            while end < src.len() && src.as_bytes()[end] == b'\n' {
                end += 1;
            }
            end
        }
        None => src.len(),
    }
}

// Rest of the current line plus any following newlines.
fn consume_line_and_newlines(src: &str, from: usize) -> usize {
    let mut end = match src[from..].find('\n') {
        Some(i) => from + i,
        None => return src.len(),
    };
    while end < src.len() && src.as_bytes()[end] == b'\n' {
        end += 1;
    }
    end
}

fn consume_newlines(src: &str, mut from: usize) -> usize {
    while from < src.len() && src.as_bytes()[from] == b'\n' {
        from += 1;
    }
    from
}

// The tail of an open or close tag must be only spaces or tabs up to
// the end of its line.
fn tag_line_is_blank(rest: &str) -> bool {
    for ch in rest.chars() {
        match ch {
            ' ' | '\t' => continue,
            '\n' => return true,
            _ => return false,
        }
    }
    true
}

pub fn html(src: &str, block: BlockRules, options: &Options) -> Option<Token> {
    if block.pedantic {
        return pedantic_html(src, options);
    }

    // script, pre and style blocks run to their own closing tag.
    if let Some(caps) = rules::HTML_PRE_OPEN.captures(src) {
        let name = caps.get(1)?.as_str().to_lowercase();
        let close = format!("</{}>", name);
        let end = match find_ignore_ascii_case(src, &close) {
            Some(i) => consume_line_and_newlines(src, i + close.len()),
            None => src.len(),
        };
        let pre = options.sanitizer.is_none();
        return Some(html_token(&src[..end], pre, options));
    }

    if rules::HTML_COMMENT_OPEN.is_match(src) {
        let after = src.trim_start_matches(' ');
        if after.starts_with("<!-->") || after.starts_with("<!--->") {
            return None;
        }
        let open = src.len() - after.len() + 4;
        let end = match src[open..].find("-->") {
            Some(i) => consume_line_and_newlines(src, open + i + 3),
            None => src.len(),
        };
        return Some(html_token(&src[..end], false, options));
    }

    if let Some(m) = rules::HTML_PI_OPEN.find(src) {
        let end = match src[m.end()..].find("?>") {
            Some(i) => consume_newlines(src, m.end() + i + 2),
            None => src.len(),
        };
        return Some(html_token(&src[..end], false, options));
    }

    if let Some(m) = rules::HTML_DECL_OPEN.find(src) {
        let end = match src[m.end()..].find('>') {
            Some(i) => consume_newlines(src, m.end() + i + 1),
            None => src.len(),
        };
        return Some(html_token(&src[..end], false, options));
    }

    if let Some(m) = rules::HTML_CDATA_OPEN.find(src) {
        let end = match src[m.end()..].find("]]>") {
            Some(i) => consume_newlines(src, m.end() + i + 3),
            None => src.len(),
        };
        return Some(html_token(&src[..end], false, options));
    }

    if let Some(m) = rules::HTML_BLOCK_TAG.find(src) {
        let end = consume_to_blank(src, m.end());
        return Some(html_token(&src[..end], false, options));
    }

    // An arbitrary open or close tag alone on its line.
    if let Some(caps) = rules::HTML_OPEN_TAG.captures(src) {
        let name = caps.get(1)?.as_str().to_lowercase();
        let tag_end = caps.get(0)?.end();
        if !matches!(name.as_str(), "script" | "pre" | "style")
            && tag_line_is_blank(&src[tag_end..])
        {
            let end = consume_to_blank(src, tag_end);
            return Some(html_token(&src[..end], false, options));
        }
    }
    if let Some(caps) = rules::HTML_CLOSE_TAG.captures(src) {
        let name = caps.get(1)?.as_str().to_lowercase();
        let tag_end = caps.get(0)?.end();
        if !matches!(name.as_str(), "script" | "pre" | "style")
            && tag_line_is_blank(&src[tag_end..])
        {
            let end = consume_to_blank(src, tag_end);
            return Some(html_token(&src[..end], false, options));
        }
    }

    None
}

// A pedantic raw block may not open with an inline-level tag, a scheme
// or anything address-shaped.
fn pedantic_tag_allowed(name: &str, after: &str) -> bool {
    if PEDANTIC_INLINE_TAGS.contains(&name) {
        return false;
    }
    if after.starts_with(':') {
        return false;
    }
    let tail: String = after
        .chars()
        .take_while(|c| !rules::is_word_char(*c) && !c.is_whitespace() && *c != '@')
        .collect();
    !after[tail.len()..].starts_with('@')
}

// Trailing requirement of the pedantic arms: spaces, then a blank line
// or whitespace to the end of input. Returns the consumed end.
fn pedantic_tail(src: &str, from: usize) -> Option<usize> {
    let rest = &src[from..];
    let spaces = rest.len() - rest.trim_start_matches(' ').len();
    let after = &rest[spaces..];
    if after.starts_with("\n\n") {
        return Some(consume_newlines(src, from + spaces));
    }
    if after.chars().all(|c| c.is_whitespace()) {
        return Some(src.len());
    }
    None
}

fn pedantic_html(src: &str, options: &Options) -> Option<Token> {
    let stripped = src.trim_start_matches(' ');
    let lead = src.len() - stripped.len();

    if stripped.starts_with("<!--")
        && !stripped.starts_with("<!-->")
        && !stripped.starts_with("<!--->")
    {
        if let Some(i) = stripped.find("-->") {
            let close = lead + i + 3;
            let rest = &src[close..];
            let spaces = rest.len() - rest.trim_start_matches(' ').len();
            let after = &rest[spaces..];
            if after.starts_with('\n') {
                return Some(html_token(&src[..close + spaces + 1], false, options));
            }
            if after.chars().all(|c| c.is_whitespace()) {
                return Some(html_token(src, false, options));
            }
        }
        return None;
    }

    if let Some(caps) = PEDANTIC_HTML_NAME.captures(stripped) {
        let name = caps.get(1)?.as_str();
        let after = &stripped[caps.get(0)?.end()..];
        if !pedantic_tag_allowed(name, after) {
            return None;
        }
        // Closed tag pair, with at least one character between.
        let close = format!("</{}>", name);
        let mut search = caps.get(0)?.end() + 1;
        while search <= stripped.len() {
            let i = match stripped[search..].find(&close) {
                Some(off) => search + off,
                None => break,
            };
            if let Some(end) = pedantic_tail(src, lead + i + close.len()) {
                return Some(html_token(&src[..end], false, options));
            }
            search = i + 1;
        }
        // Lone open tag.
        if let Some(m) = rules::PEDANTIC_HTML_OPEN.find(src) {
            if let Some(end) = pedantic_tail(src, m.end()) {
                return Some(html_token(&src[..end], false, options));
            }
        }
    }
    None
}

lazy_static! {
    static ref PEDANTIC_HTML_NAME: Regex = Regex::new(r"^<(\w+)").unwrap();
}

pub fn def(src: &str, block: BlockRules) -> Option<Definition> {
    let caps = block.def().captures(src)?;
    let label = caps.get(1)?.as_str();
    if label.trim().is_empty() {
        return None;
    }
    let title = caps.get(3).map(|m| {
        let t = m.as_str();
        t[1..t.len() - 1].to_string()
    });
    Some(Definition {
        raw: caps.get(0)?.as_str().to_string(),
        tag: WS_RUN
            .replace_all(&label.to_lowercase(), " ")
            .into_owned(),
        href: caps.get(2)?.as_str().to_string(),
        title,
    })
}

pub fn lheading(src: &str) -> Option<Token> {
    let caps = rules::BLOCK_LHEADING.captures(src)?;
    Some(Token::Heading {
        raw: caps.get(0)?.as_str().to_string(),
        depth: if caps.get(2)?.as_str().starts_with('=') {
            1
        } else {
            2
        },
        text: caps.get(1)?.as_str().to_string(),
        tokens: Vec::new(),
    })
}

pub fn paragraph(src: &str, block: BlockRules) -> Option<Token> {
    let first_len = src.find('\n').unwrap_or(src.len());
    if first_len == 0 {
        return None;
    }
    let mut pos = first_len;
    while src[pos..].starts_with('\n') {
        let next = &src[pos + 1..];
        let next_len = next.find('\n').unwrap_or(next.len());
        if next_len == 0 || rules::interrupts_paragraph(next, block.pedantic) {
            break;
        }
        pos += 1 + next_len;
    }
    let raw = &src[..pos];
    Some(Token::Paragraph {
        raw: raw.to_string(),
        text: raw.to_string(),
        tokens: Vec::new(),
    })
}

pub fn text(src: &str, prev_text: bool) -> Option<BlockPiece> {
    let m = rules::BLOCK_TEXT.find(src)?;
    let raw = m.as_str().to_string();
    if prev_text {
        return Some(BlockPiece::Continuation {
            raw: raw.clone(),
            text: raw,
        });
    }
    Some(BlockPiece::Token(Token::Text {
        raw: raw.clone(),
        text: raw,
        tokens: Vec::new(),
    }))
}

pub fn escape(src: &str) -> Option<Token> {
    let caps = rules::INLINE_ESCAPE.captures(src)?;
    Some(Token::Escape {
        raw: caps.get(0)?.as_str().to_string(),
        text: helpers::escape(caps.get(1)?.as_str(), false),
    })
}

pub fn tag(src: &str, in_link: bool, in_raw_block: bool, options: &Options) -> Option<TagPiece> {
    let raw = match rules::INLINE_COMMENT.find(src) {
        Some(m) if !src.starts_with("<!-->") && !src.starts_with("<!--->") => m.as_str(),
        _ => rules::INLINE_TAG.find(src)?.as_str(),
    };

    let in_link = if !in_link && TAG_A_OPEN.is_match(raw) {
        true
    } else if in_link && TAG_A_CLOSE.is_match(raw) {
        false
    } else {
        in_link
    };
    let in_raw_block = if !in_raw_block && RAW_TAG_OPEN.is_match(raw) {
        true
    } else if in_raw_block && RAW_TAG_CLOSE.is_match(raw) {
        false
    } else {
        in_raw_block
    };

    let token = if options.sanitize {
        let text = match &options.sanitizer {
            Some(sanitizer) => sanitizer.sanitize(raw),
            None => helpers::escape(raw, false),
        };
        Token::Text {
            raw: raw.to_string(),
            text,
            tokens: Vec::new(),
        }
    } else {
        Token::Html {
            raw: raw.to_string(),
            text: raw.to_string(),
            pre: false,
        }
    };
    Some(TagPiece {
        token,
        in_link,
        in_raw_block,
    })
}

fn output_link(
    raw: &str,
    label: &str,
    href: String,
    title: Option<String>,
) -> Token {
    if raw.starts_with('!') {
        Token::Image {
            raw: raw.to_string(),
            href,
            title,
            text: helpers::escape(label, false),
        }
    } else {
        Token::Link {
            raw: raw.to_string(),
            href,
            title,
            text: label.to_string(),
            tokens: Vec::new(),
        }
    }
}

fn unescape_link_part(part: &str) -> String {
    rules::ESCAPED_CHAR.replace_all(part, "$1").into_owned()
}

pub fn link(src: &str, inline: InlineRules) -> Option<Token> {
    let caps = inline.link().captures(src)?;
    let label = caps.get(1)?.as_str();
    let mut raw = caps.get(0)?.as_str().to_string();
    let mut href_part = caps.get(2)?.as_str().to_string();
    let mut title_part = caps.get(3).map(|m| m.as_str().to_string());

    let trimmed_url = href_part.trim().to_string();
    if !inline.pedantic && trimmed_url.starts_with('<') {
        // Angle-bracketed destinations must close, and the closing
        // bracket cannot be escaped.
        if !trimmed_url.ends_with('>') {
            return None;
        }
        let rtrimmed = trimmed_url[..trimmed_url.len() - 1].trim_end_matches('\\');
        if (trimmed_url.len() - rtrimmed.len()) % 2 == 0 {
            return None;
        }
    } else {
        // Rebalance: the match may have swallowed parentheses past the
        // real closing one.
        if let Some(idx) = helpers::find_closing_bracket(&href_part, b'(', b')') {
            let start = if raw.starts_with('!') { 5 } else { 4 };
            let link_len = start + label.len() + idx;
            href_part.truncate(idx);
            raw = src[..link_len].trim().to_string();
            title_part = None;
        }
    }

    let mut href = href_part;
    let mut title = None;
    if inline.pedantic {
        let whole = href.clone();
        for splitter in [&*PEDANTIC_TITLE_DOUBLE, &*PEDANTIC_TITLE_SINGLE] {
            if let Some(caps) = splitter.captures(&whole) {
                title = caps.get(2).map(|m| m.as_str().to_string());
                if let Some(m) = caps.get(1) {
                    href = m.as_str().to_string();
                }
                break;
            }
        }
    } else {
        title = title_part.map(|t| t[1..t.len() - 1].to_string());
    }

    let mut href = href.trim().to_string();
    if href.starts_with('<') {
        if inline.pedantic && !trimmed_url.ends_with('>') {
            href = href[1..].to_string();
        } else {
            href = href[1..href.len() - 1].to_string();
        }
    }

    let href = unescape_link_part(&href);
    let title = title
        .filter(|t| !t.is_empty())
        .map(|t| unescape_link_part(&t));
    Some(output_link(&raw, label, href, title))
}

pub fn reflink(src: &str, links: &Links, inline: InlineRules) -> Option<Token> {
    let (raw, label, ref_label) = if let Some(caps) = inline.reflink().captures(src) {
        let reference = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        if !inline.pedantic && reference.trim().is_empty() {
            return None;
        }
        let label = caps.get(1)?.as_str();
        let reference = if reference.is_empty() { label } else { reference };
        (caps.get(0)?.as_str(), label, reference)
    } else {
        let caps = rules::INLINE_NOLINK.captures(src)?;
        let label = caps.get(1)?.as_str();
        if label.trim().is_empty() {
            return None;
        }
        (caps.get(0)?.as_str(), label, label)
    };

    let key = WS_RUN.replace_all(ref_label, " ").to_lowercase();
    match links.get(&key) {
        Some(def) if !def.href.is_empty() => Some(output_link(
            raw,
            label,
            def.href.clone(),
            def.title.clone(),
        )),
        // An unresolved reference degrades to its leading bracket.
        _ => {
            let text = &raw[..1];
            Some(Token::Text {
                raw: text.to_string(),
                text: text.to_string(),
                tokens: Vec::new(),
            })
        }
    }
}

// Counts delimiters not consumed by a backslash escape.
fn count_unescaped(s: &str, delim: char) -> usize {
    let mut count = 0;
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            chars.next();
        } else if c == delim {
            count += 1;
        }
    }
    count
}

// Whole-prefix validation of an emphasis candidate: delimited on both
// sides, non-empty interior whose stray delimiters pair up.
fn emphasis_middle(prefix: &str, delim: char, delim_len: usize, pedantic: bool) -> bool {
    let open: String = std::iter::repeat(delim).take(delim_len).collect();
    if prefix.len() < 2 * delim_len + 1
        || !prefix.starts_with(&open)
        || !prefix.ends_with(&open)
    {
        return false;
    }
    let interior = &prefix[delim_len..prefix.len() - delim_len];
    let first = match interior.chars().next() {
        Some(c) => c,
        None => return false,
    };
    if pedantic {
        let last = interior.chars().next_back().unwrap_or(' ');
        return !first.is_whitespace() && !last.is_whitespace();
    }
    if delim == '_' {
        if delim_len == 1 && (first == '_' || first.is_whitespace()) {
            return false;
        }
        if delim_len == 2 && first.is_whitespace() {
            return false;
        }
    }
    if delim == '*' && delim_len == 2 && first.is_whitespace() {
        return false;
    }
    count_unescaped(interior, delim) % 2 == 0
}

// Scans the masked source for the next closing delimiter-run candidate,
// returning the byte range that a validation prefix should end at and
// where the next scan resumes.
fn scan_emphasis_end(
    masked: &str,
    from: usize,
    delim: char,
    delim_len: usize,
    pedantic: bool,
) -> Option<(usize, usize)> {
    let run: String = std::iter::repeat(delim).take(delim_len).collect();

    if pedantic {
        // Any delimiter run not extended by another delimiter closes.
        let mut pos = from;
        while let Some(i) = masked[pos..].find(&run) {
            let at = pos + i;
            let after = masked[at + delim_len..].chars().next();
            if after != Some(delim) {
                return Some((at + delim_len, at + delim_len));
            }
            pos = at + 1;
        }
        return None;
    }

    for (i, c) in masked.char_indices() {
        if i < from || c.is_whitespace() {
            continue;
        }
        let tail = &masked[i + c.len_utf8()..];
        if !tail.starts_with(&run) {
            continue;
        }
        if tail[delim_len..].starts_with(delim) {
            continue;
        }
        let prefix_end = i + c.len_utf8() + delim_len;
        // An asterisk run preceded by plain text always closes; an
        // underscore run, or a punctuation-preceded asterisk run, must
        // additionally land on a boundary character or the end.
        if delim == '*' && !rules::is_punctuation(c) {
            return Some((prefix_end, prefix_end));
        }
        let boundary = if delim == '*' {
            |a: char| rules::is_punctuation(a) || a == '_' || a.is_whitespace()
        } else {
            |a: char| rules::is_punctuation(a) || a == '*' || a.is_whitespace()
        };
        match masked[prefix_end..].chars().next() {
            None => return Some((prefix_end, prefix_end)),
            Some(a) if boundary(a) => return Some((prefix_end, prefix_end)),
            _ => continue,
        }
    }
    None
}

// Start-of-source checks shared by strong and em. Returns the
// delimiter and run length, or None when the opener is rejected.
fn emphasis_start(
    src: &str,
    prev_char: Option<char>,
    strong: bool,
    pedantic: bool,
) -> Option<(char, usize)> {
    let delim_len = if strong { 2 } else { 1 };
    let mut chars = src.chars();
    let first = chars.next()?;
    if first != '*' && first != '_' {
        return None;
    }
    if strong {
        let second = chars.next()?;
        if second != first {
            return None;
        }
    }
    if pedantic {
        return Some((first, delim_len));
    }

    if first == '*' {
        let after = src[delim_len..].chars().next()?;
        if after.is_whitespace() || (!strong && after == '*') {
            return None;
        }
        // With punctuation right after the run, the opener is only
        // valid at a word or punctuation boundary.
        let gated = if strong {
            after == '*' || rules::is_punctuation(after)
        } else {
            rules::is_punctuation(after)
        };
        if gated {
            if let Some(prev) = prev_char {
                if !rules::is_emphasis_boundary(prev) {
                    return None;
                }
            }
        }
    }
    Some((first, delim_len))
}

fn emphasis(
    src: &str,
    masked: &str,
    prev_char: Option<char>,
    inline: InlineRules,
    strong: bool,
) -> Option<Token> {
    let (delim, delim_len) = emphasis_start(src, prev_char, strong, inline.pedantic)?;
    let masked_tail = &masked[masked.len() - src.len()..];

    let mut from = 0;
    while let Some((prefix_end, resume)) =
        scan_emphasis_end(masked_tail, from, delim, delim_len, inline.pedantic)
    {
        if emphasis_middle(&masked_tail[..prefix_end], delim, delim_len, inline.pedantic) {
            let raw = &src[..prefix_end];
            let text = &src[delim_len..prefix_end - delim_len];
            return Some(if strong {
                Token::Strong {
                    raw: raw.to_string(),
                    text: text.to_string(),
                    tokens: Vec::new(),
                }
            } else {
                Token::Em {
                    raw: raw.to_string(),
                    text: text.to_string(),
                    tokens: Vec::new(),
                }
            });
        }
        if resume <= from {
            break;
        }
        from = resume;
    }
    None
}

pub fn codespan(src: &str) -> Option<Token> {
    let bytes = src.as_bytes();
    if bytes.first() != Some(&b'`') {
        return None;
    }
    let n = bytes.iter().take_while(|&&b| b == b'`').count();

    // Closing run of exactly the same length, left- and right-maximal.
    let mut i = n + 1;
    while i + n <= bytes.len() {
        if bytes[i] != b'`' || bytes[i - 1] == b'`' {
            i += 1;
            continue;
        }
        if bytes[i..i + n].iter().all(|&b| b == b'`')
            && bytes.get(i + n) != Some(&b'`')
        {
            let text = src[n..i].replace('\n', " ");
            let has_content = text.chars().any(|c| c != ' ');
            let text = if has_content && text.starts_with(' ') && text.ends_with(' ') {
                text[1..text.len() - 1].to_string()
            } else {
                text
            };
            return Some(Token::Codespan {
                raw: src[..i + n].to_string(),
                text: helpers::escape(&text, true),
            });
        }
        i += 1;
    }
    None
}

pub fn br(src: &str, inline: InlineRules) -> Option<Token> {
    let m = inline.br().find(src)?;
    let rest = &src[m.end()..];
    if rest.chars().all(|c| c.is_whitespace()) {
        return None;
    }
    Some(Token::Br {
        raw: m.as_str().to_string(),
    })
}

// The strikethrough body must end on an escape pair or on a character
// that is not whitespace, a tilde or a bare backslash.
fn del_content_ok(content: &str) -> bool {
    let mut last_escaped = false;
    let mut last_char = None;
    let mut chars = content.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(e) => {
                    last_escaped = true;
                    last_char = Some(e);
                }
                None => {
                    last_escaped = false;
                    last_char = Some(c);
                }
            }
        } else {
            last_escaped = false;
            last_char = Some(c);
        }
    }
    match last_char {
        None => false,
        Some(c) => last_escaped || (!c.is_whitespace() && c != '~' && c != '\\'),
    }
}

pub fn del(src: &str, inline: InlineRules) -> Option<Token> {
    if !inline.gfm || inline.pedantic {
        return None;
    }
    let bytes = src.as_bytes();
    if bytes.first() != Some(&b'~') {
        return None;
    }
    let run = bytes.iter().take_while(|&&b| b == b'~').count().min(2);

    for delim in (1..=run).rev() {
        // Opening run must touch content.
        match src[delim..].chars().next() {
            Some(c) if !c.is_whitespace() && c != '~' => {}
            _ => continue,
        }
        let mut i = delim + 1;
        while i + delim <= bytes.len() {
            if bytes[i..i + delim].iter().all(|&b| b == b'~')
                && bytes.get(i + delim) != Some(&b'~')
                && del_content_ok(&src[delim..i])
            {
                return Some(Token::Del {
                    raw: src[..i + delim].to_string(),
                    text: src[delim..i].to_string(),
                    tokens: Vec::new(),
                });
            }
            i += 1;
        }
    }
    None
}

pub fn autolink(src: &str, options: &Options) -> Option<Token> {
    let caps = rules::AUTOLINK.captures(src)?;
    let content = caps.get(1)?.as_str();
    let (text, href) = if caps.get(2).is_some() {
        let text = if options.mangle {
            helpers::escape(&helpers::mangle(content), false)
        } else {
            helpers::escape(content, false)
        };
        let href = format!("mailto:{}", text);
        (text, href)
    } else {
        let text = helpers::escape(content, false);
        (text.clone(), text)
    };
    Some(Token::Link {
        raw: caps.get(0)?.as_str().to_string(),
        href,
        title: None,
        text: text.clone(),
        tokens: vec![Token::plain_text(text)],
    })
}

// Trims trailing punctuation, unbalanced parentheses and entity tails
// from a bare URL match. Applied repeatedly until it stops shrinking.
fn backpedal(s: &str) -> &str {
    const TRAILING: &[char] = &['?', '!', '.', ',', ':', ';', '*', '_', '~', ')'];
    let mut pos = 0;
    while pos < s.len() {
        let rest = &s[pos..];

        // Run of plain URL characters.
        let plain: usize = rest
            .chars()
            .take_while(|c| *c != '(' && *c != '&' && !TRAILING.contains(c))
            .map(|c| c.len_utf8())
            .sum();
        if plain > 0 {
            pos += plain;
            continue;
        }

        let ch = match rest.chars().next() {
            Some(c) => c,
            None => break,
        };
        if ch == '(' {
            // A balanced parenthesized group survives.
            match rest[1..].find(')') {
                Some(i) => {
                    pos += i + 2;
                    continue;
                }
                None => break,
            }
        }
        if ch == '&' {
            // Drop an ampersand only when it opens an entity that ends
            // the candidate.
            let tail = &rest[1..];
            let run = tail
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric())
                .count();
            if run > 0 && tail[run..] == *";" {
                break;
            }
            pos += 1;
            continue;
        }
        // Trailing punctuation may not swallow the end of the match.
        let run = rest.chars().take_while(|c| TRAILING.contains(c)).count();
        if pos + run == s.len() {
            pos += run.saturating_sub(1);
            break;
        }
        pos += run;
    }
    &s[..pos]
}

pub fn url(src: &str, inline: InlineRules, options: &Options) -> Option<Token> {
    if !inline.gfm || inline.pedantic {
        return None;
    }
    if let Some(caps) = rules::GFM_URL.captures(src) {
        let mut cap0 = caps.get(0)?.as_str();
        loop {
            let shrunk = backpedal(cap0);
            if shrunk == cap0 {
                break;
            }
            cap0 = shrunk;
        }
        if cap0.is_empty() {
            return None;
        }
        let text = helpers::escape(cap0, false);
        let href = if caps.get(1)?.as_str() == "www." {
            format!("http://{}", text)
        } else {
            text.clone()
        };
        return Some(Token::Link {
            raw: cap0.to_string(),
            href,
            title: None,
            text: text.clone(),
            tokens: vec![Token::plain_text(text)],
        });
    }

    let m = rules::GFM_EMAIL.find(src)?;
    if src[m.end()..].starts_with(['-', '_']) {
        return None;
    }
    let content = m.as_str();
    let text = if options.mangle {
        helpers::escape(&helpers::mangle(content), false)
    } else {
        helpers::escape(content, false)
    };
    Some(Token::Link {
        raw: content.to_string(),
        href: format!("mailto:{}", text),
        title: None,
        text: text.clone(),
        tokens: vec![Token::plain_text(text)],
    })
}

// Returns true when the plain-text scan must stop before `rest`.
fn text_stop(rest: &str, prev: char, inline: InlineRules) -> bool {
    let first = match rest.chars().next() {
        Some(c) => c,
        None => return true,
    };
    if matches!(first, '\\' | '<' | '!' | '[' | '`' | '*') {
        return true;
    }
    if first == '_' && !rules::is_word_char(prev) {
        return true;
    }
    if inline.gfm {
        if first == '~' {
            return true;
        }
        if rest.starts_with("http://")
            || rest.starts_with("https://")
            || rest.starts_with("ftp://")
            || rest.starts_with("www.")
        {
            return true;
        }
    }
    if inline.breaks && BR_ANY.is_match(rest) {
        return true;
    }
    false
}

fn email_ahead(rest: &str) -> bool {
    let run: usize = rest
        .chars()
        .take_while(|c| rules::is_email_char(*c))
        .map(|c| c.len_utf8())
        .sum();
    run > 0 && rest[run..].starts_with('@')
}

pub fn inline_text(
    src: &str,
    in_raw_block: bool,
    inline: InlineRules,
    options: &Options,
) -> Option<Token> {
    let mut chars = src.chars();
    let first = chars.next()?;

    // Leading unit: a fence-character run or a single character.
    let mut pos = first.len_utf8();
    if first == '`' || (inline.gfm && first == '~') {
        pos = src
            .chars()
            .take_while(|c| *c == '`' || (inline.gfm && *c == '~'))
            .map(|c| c.len_utf8())
            .sum();
    }

    let br_re: &Regex = if inline.breaks { &BR_ANY } else { &BR_SPACES };
    if br_re.is_match(&src[pos..]) || (inline.gfm && email_ahead(&src[pos..])) {
        return Some(make_text(&src[..pos], in_raw_block, options));
    }

    let mut prev = src[..pos].chars().next_back()?;
    while pos < src.len() {
        let rest = &src[pos..];
        if text_stop(rest, prev, inline) {
            break;
        }
        let ch = match rest.chars().next() {
            Some(c) => c,
            None => break,
        };
        let after = &src[pos + ch.len_utf8()..];
        if ch != ' ' && br_re.is_match(after) {
            pos += ch.len_utf8();
            break;
        }
        if inline.gfm && !rules::is_email_char(ch) && email_ahead(after) {
            pos += ch.len_utf8();
            break;
        }
        pos += ch.len_utf8();
        prev = ch;
    }
    Some(make_text(&src[..pos], in_raw_block, options))
}

fn make_text(raw: &str, in_raw_block: bool, options: &Options) -> Token {
    let text = if in_raw_block {
        if options.sanitize {
            match &options.sanitizer {
                Some(sanitizer) => sanitizer.sanitize(raw),
                None => helpers::escape(raw, false),
            }
        } else {
            raw.to_string()
        }
    } else if options.smartypants {
        helpers::escape(&helpers::smartypants(raw), false)
    } else {
        helpers::escape(raw, false)
    };
    Token::Text {
        raw: raw.to_string(),
        text,
        tokens: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Align;

    fn block() -> BlockRules {
        BlockRules::new(true, false)
    }

    fn inline() -> InlineRules {
        InlineRules::new(true, false, false)
    }

    #[test]
    fn test_heading_trailing_hashes() {
        let tok = heading("## Title ##\n", block()).unwrap();
        match tok {
            Token::Heading { depth, text, .. } => {
                assert_eq!(depth, 2);
                assert_eq!(text, "Title");
            }
            other => panic!("unexpected token {:?}", other),
        }
        // No space before the trailing hashes keeps them.
        let tok = heading("# a#\n", block()).unwrap();
        match tok {
            Token::Heading { text, .. } => assert_eq!(text, "a#"),
            other => panic!("unexpected token {:?}", other),
        }
    }

    #[test]
    fn test_fences_basic() {
        let tok = fences("```rust\nlet x;\n```\nafter", block()).unwrap();
        match tok {
            Token::Code {
                raw, text, lang, ..
            } => {
                assert_eq!(raw, "```rust\nlet x;\n```\n");
                assert_eq!(text, "let x;");
                assert_eq!(lang.as_deref(), Some("rust"));
            }
            other => panic!("unexpected token {:?}", other),
        }
    }

    #[test]
    fn test_unclosed_fence_runs_out() {
        let tok = fences("```\na\nb\n", block()).unwrap();
        match tok {
            Token::Code { raw, text, .. } => {
                assert_eq!(raw, "```\na\nb\n");
                assert_eq!(text, "a\nb");
            }
            other => panic!("unexpected token {:?}", other),
        }
    }

    #[test]
    fn test_blockquote_lazy_continuation() {
        let tok = blockquote("> a\nb\n> c\n").unwrap();
        match tok {
            Token::Blockquote { raw, text, .. } => {
                assert_eq!(raw, "> a\nb\n> c\n");
                assert_eq!(text, "a\nb\nc\n");
            }
            other => panic!("unexpected token {:?}", other),
        }
    }

    #[test]
    fn test_list_style_break() {
        let options = Options::default();
        let tok = list("- a\n- b\n+ c\n", block(), &options).unwrap();
        match tok {
            Token::List { raw, items, .. } => {
                assert_eq!(items.len(), 2);
                assert_eq!(raw, "- a\n- b\n");
            }
            other => panic!("unexpected token {:?}", other),
        }
    }

    #[test]
    fn test_list_tasks() {
        let options = Options::default();
        let tok = list("- [x] done\n- [ ] open\n", block(), &options).unwrap();
        match tok {
            Token::List { items, loose, .. } => {
                assert!(!loose);
                assert!(items[0].task && items[0].checked);
                assert!(items[1].task && !items[1].checked);
                assert_eq!(items[0].text, "done");
            }
            other => panic!("unexpected token {:?}", other),
        }
    }

    #[test]
    fn test_ordered_list_start() {
        let options = Options::default();
        let tok = list("3. a\n4. b\n", block(), &options).unwrap();
        match tok {
            Token::List { ordered, start, .. } => {
                assert!(ordered);
                assert_eq!(start, Some(3));
            }
            other => panic!("unexpected token {:?}", other),
        }
    }

    #[test]
    fn test_table_alignment_and_fallback() {
        let tok = table("| a | b |\n|:-:|--:|\n| 1 | 2 |\n", block()).unwrap();
        match tok {
            Token::Table {
                header,
                align,
                cells,
                ..
            } => {
                assert_eq!(header, vec!["a", "b"]);
                assert_eq!(align, vec![Align::Center, Align::Right]);
                assert_eq!(cells, vec![vec!["1".to_string(), "2".to_string()]]);
            }
            other => panic!("unexpected token {:?}", other),
        }
        // Header/alignment width mismatch rejects the table.
        assert!(table("| a | b | c |\n|---|---|\n", block()).is_none());
    }

    #[test]
    fn test_codespan_trimming() {
        let tok = codespan("`` `x` `` rest").unwrap();
        match tok {
            Token::Codespan { raw, text } => {
                assert_eq!(raw, "`` `x` ``");
                assert_eq!(text, "`x`");
            }
            other => panic!("unexpected token {:?}", other),
        }
        assert!(codespan("``ab`").is_none());
    }

    #[test]
    fn test_strong_and_em() {
        let tok = emphasis("**bold** x", "**bold** x", None, inline(), true).unwrap();
        match tok {
            Token::Strong { raw, text, .. } => {
                assert_eq!(raw, "**bold**");
                assert_eq!(text, "bold");
            }
            other => panic!("unexpected token {:?}", other),
        }
        let tok = emphasis("*a* *b*", "*a* *b*", None, inline(), false).unwrap();
        match tok {
            Token::Em { raw, text, .. } => {
                assert_eq!(raw, "*a*");
                assert_eq!(text, "a");
            }
            other => panic!("unexpected token {:?}", other),
        }
        assert!(emphasis("** not **", "** not **", None, inline(), true).is_none());
    }

    #[test]
    fn test_del() {
        let tok = del("~~gone~~ rest", inline()).unwrap();
        match tok {
            Token::Del { raw, text, .. } => {
                assert_eq!(raw, "~~gone~~");
                assert_eq!(text, "gone");
            }
            other => panic!("unexpected token {:?}", other),
        }
        assert!(del("~~ x~~", inline()).is_none());
    }

    #[test]
    fn test_url_backpedal() {
        let options = Options::default();
        let tok = url("https://x.test/a. rest", inline(), &options).unwrap();
        match tok {
            Token::Link { raw, href, .. } => {
                assert_eq!(raw, "https://x.test/a");
                assert_eq!(href, "https://x.test/a");
            }
            other => panic!("unexpected token {:?}", other),
        }
    }

    #[test]
    fn test_inline_text_stops_at_specials() {
        let options = Options::default();
        let tok = inline_text("plain *em*", false, inline(), &options).unwrap();
        match tok {
            Token::Text { raw, .. } => assert_eq!(raw, "plain "),
            other => panic!("unexpected token {:?}", other),
        }
    }

    #[test]
    fn test_def_normalizes_label() {
        let d = def("[Foo  Bar]: /x \"t\"\n", block()).unwrap();
        assert_eq!(d.tag, "foo bar");
        assert_eq!(d.href, "/x");
        assert_eq!(d.title.as_deref(), Some("t"));
    }
}
