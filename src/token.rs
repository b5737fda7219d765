//! Token tree produced by the block and inline lexers.
//!
//! Tokens form a forest: block tokens may own block children (blockquotes,
//! list items) and, after the inline pass, inline children. Every token owns
//! its `raw` span, the exact substring consumed from the source, which the
//! lexers use only for length bookkeeping and never re-parse.

use std::collections::HashMap;

/// Column alignment of a table cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    None,
    Left,
    Center,
    Right,
}

impl Align {
    /// Returns the HTML `align` attribute value, if any.
    pub fn as_attr(&self) -> Option<&'static str> {
        match self {
            Align::None => None,
            Align::Left => Some("left"),
            Align::Center => Some("center"),
            Align::Right => Some("right"),
        }
    }
}

/// A resolved link-reference definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkDef {
    pub href: String,
    pub title: Option<String>,
}

/// Table of link-reference definitions keyed by normalized label
/// (lowercased, internal whitespace collapsed to single spaces).
pub type Links = HashMap<String, LinkDef>;

/// One item of a `Token::List`.
#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    pub raw: String,
    pub task: bool,
    pub checked: bool,
    pub loose: bool,
    pub text: String,
    pub tokens: Vec<Token>,
}

/// A tagged token covering both block and inline levels.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A run of blank lines between blocks.
    Space { raw: String },
    /// Fenced or indented code block. `indented` distinguishes the two
    /// styles; `escaped` marks text already HTML-safe (highlight hooks).
    Code {
        raw: String,
        text: String,
        lang: Option<String>,
        escaped: bool,
        indented: bool,
    },
    /// ATX or setext heading, depth 1..=6.
    Heading {
        raw: String,
        depth: u8,
        text: String,
        tokens: Vec<Token>,
    },
    /// GFM table. `header`/`align` always have equal length; a mismatch
    /// rejects table recognition entirely.
    Table {
        raw: String,
        header: Vec<String>,
        align: Vec<Align>,
        cells: Vec<Vec<String>>,
        header_tokens: Vec<Vec<Token>>,
        cell_tokens: Vec<Vec<Vec<Token>>>,
    },
    /// Thematic break.
    Hr { raw: String },
    /// Blockquote owning re-tokenized block children.
    Blockquote {
        raw: String,
        text: String,
        tokens: Vec<Token>,
    },
    /// Ordered or unordered list.
    List {
        raw: String,
        ordered: bool,
        start: Option<u64>,
        loose: bool,
        items: Vec<ListItem>,
    },
    /// Raw HTML, block or inline. `pre` marks pre/script/style blocks.
    Html {
        raw: String,
        text: String,
        pre: bool,
    },
    /// Top-level paragraph.
    Paragraph {
        raw: String,
        text: String,
        tokens: Vec<Token>,
    },
    /// A plain text line (block level) or plain inline text run.
    Text {
        raw: String,
        text: String,
        tokens: Vec<Token>,
    },
    /// A backslash escape, text already HTML-escaped.
    Escape { raw: String, text: String },
    /// Inline link; `tokens` hold the re-tokenized link text.
    Link {
        raw: String,
        href: String,
        title: Option<String>,
        text: String,
        tokens: Vec<Token>,
    },
    /// Inline image; the alt text is not re-tokenized.
    Image {
        raw: String,
        href: String,
        title: Option<String>,
        text: String,
    },
    Strong {
        raw: String,
        text: String,
        tokens: Vec<Token>,
    },
    Em {
        raw: String,
        text: String,
        tokens: Vec<Token>,
    },
    Codespan { raw: String, text: String },
    /// Hard line break.
    Br { raw: String },
    /// GFM strikethrough.
    Del {
        raw: String,
        text: String,
        tokens: Vec<Token>,
    },
}

impl Token {
    /// Returns the exact source substring this token consumed.
    pub fn raw(&self) -> &str {
        match self {
            Token::Space { raw }
            | Token::Code { raw, .. }
            | Token::Heading { raw, .. }
            | Token::Table { raw, .. }
            | Token::Hr { raw }
            | Token::Blockquote { raw, .. }
            | Token::List { raw, .. }
            | Token::Html { raw, .. }
            | Token::Paragraph { raw, .. }
            | Token::Text { raw, .. }
            | Token::Escape { raw, .. }
            | Token::Link { raw, .. }
            | Token::Image { raw, .. }
            | Token::Strong { raw, .. }
            | Token::Em { raw, .. }
            | Token::Codespan { raw, .. }
            | Token::Br { raw }
            | Token::Del { raw, .. } => raw,
        }
    }

    /// Returns the length in bytes of the consumed source substring.
    pub fn raw_len(&self) -> usize {
        self.raw().len()
    }

    /// Returns the token kind name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Token::Space { .. } => "space",
            Token::Code { .. } => "code",
            Token::Heading { .. } => "heading",
            Token::Table { .. } => "table",
            Token::Hr { .. } => "hr",
            Token::Blockquote { .. } => "blockquote",
            Token::List { .. } => "list",
            Token::Html { .. } => "html",
            Token::Paragraph { .. } => "paragraph",
            Token::Text { .. } => "text",
            Token::Escape { .. } => "escape",
            Token::Link { .. } => "link",
            Token::Image { .. } => "image",
            Token::Strong { .. } => "strong",
            Token::Em { .. } => "em",
            Token::Codespan { .. } => "codespan",
            Token::Br { .. } => "br",
            Token::Del { .. } => "del",
        }
    }

    /// Creates a plain text token whose raw and text are the same string.
    pub fn plain_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Token::Text {
            raw: text.clone(),
            text,
            tokens: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_accessor() {
        let tok = Token::Hr {
            raw: "---\n".to_string(),
        };
        assert_eq!(tok.raw(), "---\n");
        assert_eq!(tok.raw_len(), 4);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Token::plain_text("x").kind(), "text");
        let tok = Token::Br {
            raw: "  \n".to_string(),
        };
        assert_eq!(tok.kind(), "br");
    }

    #[test]
    fn test_align_attr() {
        assert_eq!(Align::None.as_attr(), None);
        assert_eq!(Align::Center.as_attr(), Some("center"));
    }
}
