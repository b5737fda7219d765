//! Grammar tables for the block and inline lexers.
//!
//! Productions that a finite automaton can express live here as compiled
//! patterns, assembled from shared fragments. Productions that need
//! backreferences or lookaround (fences, code spans, emphasis, lists,
//! raw HTML) are matched by hand in the tokenizer; this module supplies
//! the opening patterns, interruption tests and character classes those
//! matchers are built on.

use lazy_static::lazy_static;
use regex::Regex;

/// Tag names that open a type (6) HTML block and interrupt a paragraph.
pub const BLOCK_TAGS: &str = "address|article|aside|base|basefont|blockquote|body|caption\
    |center|col|colgroup|dd|details|dialog|dir|div|dl|dt|fieldset|figcaption\
    |figure|footer|form|frame|frameset|h[1-6]|head|header|hr|html|iframe\
    |legend|li|link|main|menu|menuitem|meta|nav|noframes|ol|optgroup|option\
    |p|param|section|source|summary|table|tbody|td|tfoot|th|thead|title|tr\
    |track|ul";

// Reference label and title fragments for link definitions.
const DEF_LABEL: &str = r"(?:\\[\[\]]|[^\[\]])+";
const DEF_TITLE: &str = r#"(?:"(?:\\"?|[^"\\])*"|'[^'\n]*(?:\n[^'\n]+)*\n?'|\([^()]*\))"#;

// Inline link fragments.
const LINK_LABEL: &str = r"(?:\[(?:\\.|[^\[\]\\])*\]|\\.|`[^`]*`|[^\[\]\\`])*?";
const LINK_HREF: &str = r"<(?:\\.|[^\n<>\\])+>|[^\s\x00-\x1f]*";
const LINK_TITLE: &str = r#""(?:\\"?|[^"\\])*"|'(?:\\'?|[^'\\])*'|\((?:\\\)?|[^)\\])*\)"#;

const TAG_ATTRIBUTE: &str =
    r#"\s+[a-zA-Z:_][\w.:-]*(?:\s*=\s*"[^"]*"|\s*=\s*'[^']*'|\s*=\s*[^\s"'=<>`]+)?"#;

lazy_static! {
    // Block level.
    pub static ref BLOCK_NEWLINE: Regex = Regex::new(r"^\n+").unwrap();
    pub static ref BLOCK_CODE: Regex = Regex::new(r"^( {4}[^\n]+\n*)+").unwrap();
    pub static ref FENCE_OPEN: Regex =
        Regex::new(r"^( {0,3})(`{3,}|~{3,})([^\n]*)\n").unwrap();
    pub static ref BLOCK_HR: Regex =
        Regex::new(r"^ {0,3}((?:- *){3,}|(?:_ *){3,}|(?:\* *){3,})(?:\n+|$)").unwrap();
    pub static ref BLOCK_HEADING: Regex =
        Regex::new(r"^ {0,3}(#{1,6})([ \t][^\n]*)?(?:\n+|$)").unwrap();
    pub static ref PEDANTIC_HEADING: Regex =
        Regex::new(r"^(#{1,6})(.*)(?:\n+|$)").unwrap();
    pub static ref BLOCK_LHEADING: Regex =
        Regex::new(r"^([^\n]+)\n {0,3}(=+|-+) *(?:\n+|$)").unwrap();
    pub static ref BLOCK_DEF: Regex = Regex::new(&format!(
        r"^ {{0,3}}\[({})\]: *\n? *<?([^\s>]+)>?(?:(?: +\n? *| *\n *)({}))? *(?:\n+|$)",
        DEF_LABEL, DEF_TITLE
    ))
    .unwrap();
    pub static ref PEDANTIC_DEF: Regex = Regex::new(
        r#"^ *\[([^\]]+)\]: *<?([^\s>]+)>?(?: +(["(][^\n]+[")]))? *(?:\n+|$)"#
    )
    .unwrap();
    pub static ref BLOCK_TEXT: Regex = Regex::new(r"^[^\n]+").unwrap();

    // List scanning pieces. The outer terminators and item folding are
    // driven from the tokenizer.
    pub static ref LIST_START: Regex =
        Regex::new(r"^( {0,3})((?:[*+-]|\d{1,9}[.)])) ").unwrap();
    pub static ref LIST_ITEM_START: Regex =
        Regex::new(r"^( *)((?:[*+-]|\d{1,9}[.)]))").unwrap();
    pub static ref BULLET_LINE: Regex = Regex::new(r"^ *(?:[*+-]|\d{1,9}[.)])").unwrap();
    pub static ref BULLET_STRIP: Regex = Regex::new(r"^ *([*+-]|\d+[.)]) ?").unwrap();
    pub static ref TASK_ITEM: Regex = Regex::new(r"^\[[ xX]\] +").unwrap();

    // Table heads; the cell rows are gathered line by line behind an
    // interruption test.
    pub static ref TABLE_HEAD: Regex =
        Regex::new(r"^ *\|(.+)\n {0,3}\|?( *[-:]+[-| :]*)(?:\n|$)").unwrap();
    pub static ref NPTABLE_HEAD: Regex =
        Regex::new(r"^ *([^|\n ].*\|.*)\n {0,3}([-:]+ *\|[-| :]*)(?:\n|$)").unwrap();
    pub static ref ALIGN_RIGHT: Regex = Regex::new(r"^ *-+: *$").unwrap();
    pub static ref ALIGN_CENTER: Regex = Regex::new(r"^ *:-+: *$").unwrap();
    pub static ref ALIGN_LEFT: Regex = Regex::new(r"^ *:-+ *$").unwrap();

    // Blockquote marker; the lazy paragraph continuation is handled in
    // the tokenizer with the paragraph interruption test.
    pub static ref BQ_MARKER: Regex = Regex::new(r"^ {0,3}> ?").unwrap();
    pub static ref BQ_STRIP: Regex = Regex::new(r"(?m)^ *> ?").unwrap();

    // HTML block openers, one per case of the grammar.
    pub static ref HTML_PRE_OPEN: Regex =
        Regex::new(r"(?i)^ {0,3}<(script|pre|style)[\s>]").unwrap();
    pub static ref HTML_COMMENT_OPEN: Regex = Regex::new(r"^ {0,3}<!--").unwrap();
    pub static ref HTML_PI_OPEN: Regex = Regex::new(r"^ {0,3}<\?").unwrap();
    pub static ref HTML_DECL_OPEN: Regex = Regex::new(r"^ {0,3}<![A-Z]").unwrap();
    pub static ref HTML_CDATA_OPEN: Regex = Regex::new(r"^ {0,3}<!\[CDATA\[").unwrap();
    pub static ref HTML_BLOCK_TAG: Regex = Regex::new(&format!(
        r"(?i)^ {{0,3}}</?(?:{})(?: +|\n|/?>)",
        BLOCK_TAGS
    ))
    .unwrap();
    pub static ref HTML_OPEN_TAG: Regex = Regex::new(&format!(
        r#"(?i)^ {{0,3}}<([a-zA-Z][\w-]*)(?:{})*? */?>"#,
        r#" +[a-zA-Z:_][\w.:-]*(?: *= *"[^"\n]*"| *= *'[^'\n]*'| *= *[^\s"'=<>`]+)?"#
    ))
    .unwrap();
    pub static ref HTML_CLOSE_TAG: Regex =
        Regex::new(r"(?i)^ {0,3}</([a-zA-Z][\w-]*)\s*>").unwrap();
    pub static ref PEDANTIC_HTML_OPEN: Regex = Regex::new(
        r#"^ *<(\w+)((?:"[^"]*"|'[^']*'|\s[^'">\s]*)*?)/?>"#
    )
    .unwrap();

    // Inline level.
    pub static ref INLINE_ESCAPE: Regex =
        Regex::new(r##"^\\([!"#$%&'()*+,\-./:;<=>?@\[\]\\^_`{|}~])"##).unwrap();
    pub static ref INLINE_COMMENT: Regex = Regex::new(r"^<!--[\s\S]*?-->").unwrap();
    pub static ref INLINE_TAG: Regex = Regex::new(&format!(
        r"^(?:</[a-zA-Z][\w:-]*\s*>|<[a-zA-Z][\w-]*(?:{})*?\s*/?>|<\?[\s\S]*?\?>|<![a-zA-Z]+\s[\s\S]*?>|<!\[CDATA\[[\s\S]*?\]\]>)",
        TAG_ATTRIBUTE
    ))
    .unwrap();
    pub static ref INLINE_LINK: Regex = Regex::new(&format!(
        r"^!?\[({})\]\(\s*({})(?:\s+({}))?\s*\)",
        LINK_LABEL, LINK_HREF, LINK_TITLE
    ))
    .unwrap();
    pub static ref PEDANTIC_LINK: Regex =
        Regex::new(&format!(r"^!?\[({})\]\((.*?)\)", LINK_LABEL)).unwrap();
    pub static ref INLINE_REFLINK: Regex = Regex::new(&format!(
        r"^!?\[({})\]\[((?:\\[\[\]]?|[^\[\]\\])+)\]",
        LINK_LABEL
    ))
    .unwrap();
    pub static ref PEDANTIC_REFLINK: Regex =
        Regex::new(&format!(r"^!?\[({})\]\s*\[([^\]]*)\]", LINK_LABEL)).unwrap();
    pub static ref INLINE_NOLINK: Regex =
        Regex::new(r"^!?\[((?:\[[^\[\]]*\]|\\[\[\]]|[^\[\]])*)\](?:\[\])?").unwrap();
    pub static ref REFLINK_MASK: Regex = Regex::new(&format!(
        r"!?\[({})\]\[((?:\\[\[\]]?|[^\[\]\\])+)\]",
        LINK_LABEL
    ))
    .unwrap();
    pub static ref NOLINK_MASK: Regex =
        Regex::new(r"!?\[((?:\[[^\[\]]*\]|\\[\[\]]|[^\[\]])*)\](?:\[\])?").unwrap();
    pub static ref BLOCK_SKIP: Regex =
        Regex::new(r"\[[^\]]*?\]\([^)]*?\)|`[^`]*?`|<[^>]*?>").unwrap();
    pub static ref INLINE_BR: Regex = Regex::new(r"^( {2,}|\\)\n").unwrap();
    pub static ref BREAKS_BR: Regex = Regex::new(r"^( *|\\)\n").unwrap();
    pub static ref AUTOLINK: Regex = Regex::new(
        r"^<([a-zA-Z][a-zA-Z0-9+.-]{1,31}:[^\s\x00-\x1f<>]*|[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+(@)[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+)>"
    )
    .unwrap();
    pub static ref GFM_URL: Regex =
        Regex::new(r"(?i)^((?:ftp|https?)://|www\.)(?:[a-zA-Z0-9\-]+\.?)+[^\s<]*").unwrap();
    pub static ref GFM_EMAIL: Regex = Regex::new(
        r"(?i)^[A-Za-z0-9._+-]+@[a-zA-Z0-9\-_]+(?:\.[a-zA-Z0-9\-_]*[a-zA-Z0-9])+"
    )
    .unwrap();
    pub static ref ESCAPED_CHAR: Regex =
        Regex::new(r##"\\([!"#$%&'()*+,\-./:;<=>?@\[\]\\^_`{|}~])"##).unwrap();

    // Paragraph interruption tests, applied to the remainder of the
    // source at a line boundary.
    static ref INT_HR: Regex =
        Regex::new(r"^ {0,3}(?:(?:- *){3,}|(?:_ *){3,}|(?:\* *){3,})(?:\n|$)").unwrap();
    static ref INT_HEADING: Regex = Regex::new(r"^ {0,3}#{1,6} ").unwrap();
    static ref INT_HEADING_PEDANTIC: Regex = Regex::new(r"^ *#{1,6} *[^\n]").unwrap();
    static ref INT_LHEADING: Regex =
        Regex::new(r"^[^\n]+\n {0,3}(?:=+|-+) *(?:\n|$)").unwrap();
    static ref INT_BLOCKQUOTE: Regex = Regex::new(r"^ {0,3}>").unwrap();
    static ref INT_FENCES: Regex =
        Regex::new(r"^ {0,3}(?:`{3,}[^`\n]*\n|~{3,}[^\n]*\n)").unwrap();
    static ref INT_LIST: Regex = Regex::new(r"^ {0,3}(?:[*+-]|1[.)]) ").unwrap();
    static ref INT_HTML: Regex = Regex::new(&format!(
        r"^(?:</?(?:{})(?: +|\n|/?>)|<(?:script|pre|style|!--))",
        BLOCK_TAGS
    ))
    .unwrap();
    static ref INT_CODE: Regex = Regex::new(r"^ {4}[^\n]").unwrap();
}

/// Block grammar variant selected from the options.
#[derive(Debug, Clone, Copy)]
pub struct BlockRules {
    pub gfm: bool,
    pub pedantic: bool,
}

impl BlockRules {
    pub fn new(gfm: bool, pedantic: bool) -> Self {
        BlockRules { gfm, pedantic }
    }

    pub fn heading(&self) -> &'static Regex {
        if self.pedantic {
            &PEDANTIC_HEADING
        } else {
            &BLOCK_HEADING
        }
    }

    pub fn def(&self) -> &'static Regex {
        if self.pedantic {
            &PEDANTIC_DEF
        } else {
            &BLOCK_DEF
        }
    }

    /// The pedantic grammar predates fenced code blocks.
    pub fn fences_enabled(&self) -> bool {
        !self.pedantic
    }

    pub fn tables_enabled(&self) -> bool {
        self.gfm && !self.pedantic
    }
}

/// Inline grammar variant selected from the options.
#[derive(Debug, Clone, Copy)]
pub struct InlineRules {
    pub gfm: bool,
    pub breaks: bool,
    pub pedantic: bool,
}

impl InlineRules {
    pub fn new(gfm: bool, breaks: bool, pedantic: bool) -> Self {
        InlineRules {
            gfm,
            breaks,
            pedantic,
        }
    }

    pub fn link(&self) -> &'static Regex {
        if self.pedantic {
            &PEDANTIC_LINK
        } else {
            &INLINE_LINK
        }
    }

    pub fn reflink(&self) -> &'static Regex {
        if self.pedantic {
            &PEDANTIC_REFLINK
        } else {
            &INLINE_REFLINK
        }
    }

    pub fn br(&self) -> &'static Regex {
        if self.breaks {
            &BREAKS_BR
        } else {
            &INLINE_BR
        }
    }
}

/// True when the text at a line boundary begins a construct that ends
/// a paragraph. `rest` starts at the candidate line.
pub fn interrupts_paragraph(rest: &str, pedantic: bool) -> bool {
    if pedantic {
        INT_HR.is_match(rest)
            || INT_HEADING_PEDANTIC.is_match(rest)
            || INT_LHEADING.is_match(rest)
            || INT_BLOCKQUOTE.is_match(rest)
    } else {
        INT_HR.is_match(rest)
            || INT_HEADING.is_match(rest)
            || INT_BLOCKQUOTE.is_match(rest)
            || INT_FENCES.is_match(rest)
            || INT_LIST.is_match(rest)
            || INT_HTML.is_match(rest)
    }
}

/// True when the text at a line boundary ends the body of a table.
pub fn interrupts_table_row(rest: &str) -> bool {
    rest.starts_with('\n')
        || INT_HR.is_match(rest)
        || INT_HEADING.is_match(rest)
        || INT_BLOCKQUOTE.is_match(rest)
        || INT_CODE.is_match(rest)
        || INT_FENCES.is_match(rest)
        || INT_LIST.is_match(rest)
        || INT_HTML.is_match(rest)
}

/// Punctuation set used by the emphasis delimiter rules. Asterisk and
/// underscore are deliberately absent so doubled emphasis can resolve.
pub fn is_punctuation(ch: char) -> bool {
    matches!(
        ch,
        '!' | '"'
            | '#'
            | '$'
            | '%'
            | '&'
            | '\''
            | '('
            | ')'
            | '+'
            | '-'
            | '.'
            | ','
            | '/'
            | ':'
            | ';'
            | '<'
            | '='
            | '>'
            | '?'
            | '@'
            | '['
            | ']'
            | '`'
            | '^'
            | '{'
            | '|'
            | '}'
            | '~'
    )
}

/// Characters allowed before a gated emphasis opener: whitespace,
/// an asterisk, or delimiter punctuation.
pub fn is_emphasis_boundary(ch: char) -> bool {
    ch.is_whitespace() || ch == '*' || is_punctuation(ch)
}

pub fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Local-part characters of an autolinked address, used by the plain
/// text scanner to stop ahead of one.
pub fn is_email_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(
            ch,
            '.' | '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '/' | '=' | '?' | '_' | '`'
                | '{' | '|' | '}' | '~' | '-'
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_rule() {
        let caps = BLOCK_HEADING.captures("## Title\nrest").unwrap();
        assert_eq!(&caps[1], "##");
        assert_eq!(caps.get(2).map(|m| m.as_str()), Some(" Title"));
        assert!(BLOCK_HEADING.is_match("#\n"));
        assert!(!BLOCK_HEADING.is_match("#hash\n"));
    }

    #[test]
    fn test_hr_rule() {
        assert!(BLOCK_HR.is_match("---\n"));
        assert!(BLOCK_HR.is_match(" * * *\n"));
        assert!(!BLOCK_HR.is_match("--\n"));
    }

    #[test]
    fn test_def_rule() {
        let caps = BLOCK_DEF.captures("[a]: /x \"t\"\n").unwrap();
        assert_eq!(&caps[1], "a");
        assert_eq!(&caps[2], "/x");
        assert_eq!(caps.get(3).map(|m| m.as_str()), Some("\"t\""));
    }

    #[test]
    fn test_paragraph_interruption() {
        assert!(interrupts_paragraph("## h\n", false));
        assert!(interrupts_paragraph("> q\n", false));
        assert!(interrupts_paragraph("- item\n", false));
        assert!(interrupts_paragraph("2. item\n", false) == false);
        assert!(!interrupts_paragraph("plain line\n", false));
        assert!(interrupts_paragraph("setext\n===\n", true));
    }

    #[test]
    fn test_autolink_rule() {
        let caps = AUTOLINK.captures("<https://x.test>").unwrap();
        assert_eq!(&caps[1], "https://x.test");
        assert!(caps.get(2).is_none());
        let caps = AUTOLINK.captures("<a@b.test>").unwrap();
        assert_eq!(caps.get(2).map(|m| m.as_str()), Some("@"));
    }

    #[test]
    fn test_table_head_rule() {
        assert!(TABLE_HEAD.is_match("| a | b |\n|---|---|\n"));
        assert!(NPTABLE_HEAD.is_match("a | b\n--- | ---\n"));
    }
}
