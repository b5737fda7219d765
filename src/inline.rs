//! Inline lexer stage.
//!
//! Emphasis delimiters are matched against a masked copy of the source
//! in which resolvable reference links, inline links, code spans and
//! raw tags are blanked out, so delimiters inside them cannot pair with
//! delimiters outside. The mask preserves byte length, keeping offsets
//! into the real source valid.

use log::warn;

use crate::error::{MarqError, Result};
use crate::lexer::Lexer;
use crate::rules;
use crate::token::Token;

// Replaces a matched span with `[aaa…a]` of the same byte length.
fn blank_span(masked: &mut String, start: usize, end: usize) {
    let filler = format!("[{}]", "a".repeat(end - start - 2));
    masked.replace_range(start..end, &filler);
}

impl Lexer {
    fn mask_src(&self, src: &str) -> String {
        let mut masked = src.to_string();

        if !self.links.is_empty() {
            let mut pos = 0;
            loop {
                let reflink = rules::REFLINK_MASK.find_at(&masked, pos);
                let nolink = rules::NOLINK_MASK.find_at(&masked, pos);
                let span = match (reflink, nolink) {
                    (Some(r), Some(n)) if n.start() < r.start() => (n.start(), n.end()),
                    (Some(r), _) => (r.start(), r.end()),
                    (None, Some(n)) => (n.start(), n.end()),
                    (None, None) => break,
                };
                let (start, end) = span;
                let matched = &masked[start..end];
                // The label is whatever follows the last opening
                // bracket, compared against the table unnormalized.
                let label_start = matched.rfind('[').map(|i| i + 1).unwrap_or(0);
                let label = matched[label_start..matched.len() - 1].to_string();
                if self.links.contains_key(&label) {
                    blank_span(&mut masked, start, end);
                }
                pos = end;
            }
        }

        let mut pos = 0;
        while let Some(m) = rules::BLOCK_SKIP.find_at(&masked, pos) {
            let (start, end) = (m.start(), m.end());
            blank_span(&mut masked, start, end);
            pos = end;
        }

        masked
    }

    /// Tokenizes inline content. `in_link` suppresses nested links and
    /// bare URLs; `in_raw_block` keeps text verbatim inside pre, code,
    /// kbd and script tags.
    pub fn inline_tokens(
        &self,
        src: &str,
        in_link: bool,
        in_raw_block: bool,
    ) -> Result<Vec<Token>> {
        let masked = self.mask_src(src);
        let mut src = src;
        let mut in_link = in_link;
        let mut in_raw_block = in_raw_block;
        let mut tokens = Vec::new();
        let mut prev_char: Option<char> = None;
        let mut keep_prev = false;

        while !src.is_empty() {
            if !keep_prev {
                prev_char = None;
            }
            keep_prev = false;

            if let Some(token) = self.tokenizer.escape(src) {
                src = &src[token.raw_len()..];
                tokens.push(token);
                continue;
            }

            if let Some(piece) = self.tokenizer.tag(src, in_link, in_raw_block, &self.options) {
                in_link = piece.in_link;
                in_raw_block = piece.in_raw_block;
                src = &src[piece.token.raw_len()..];
                tokens.push(piece.token);
                continue;
            }

            if let Some(mut token) = self.tokenizer.link(src, self.inline) {
                src = &src[token.raw_len()..];
                if let Token::Link {
                    text,
                    tokens: children,
                    ..
                } = &mut token
                {
                    *children = self.inline_tokens(text, true, in_raw_block)?;
                }
                tokens.push(token);
                continue;
            }

            if let Some(mut token) = self.tokenizer.reflink(src, &self.links, self.inline) {
                src = &src[token.raw_len()..];
                if let Token::Link {
                    text,
                    tokens: children,
                    ..
                } = &mut token
                {
                    *children = self.inline_tokens(text, true, in_raw_block)?;
                }
                tokens.push(token);
                continue;
            }

            if let Some(mut token) = self.tokenizer.strong(src, &masked, prev_char, self.inline) {
                src = &src[token.raw_len()..];
                if let Token::Strong {
                    text,
                    tokens: children,
                    ..
                } = &mut token
                {
                    *children = self.inline_tokens(text, in_link, in_raw_block)?;
                }
                tokens.push(token);
                continue;
            }

            if let Some(mut token) = self.tokenizer.em(src, &masked, prev_char, self.inline) {
                src = &src[token.raw_len()..];
                if let Token::Em {
                    text,
                    tokens: children,
                    ..
                } = &mut token
                {
                    *children = self.inline_tokens(text, in_link, in_raw_block)?;
                }
                tokens.push(token);
                continue;
            }

            if let Some(token) = self.tokenizer.codespan(src) {
                src = &src[token.raw_len()..];
                tokens.push(token);
                continue;
            }

            if let Some(token) = self.tokenizer.br(src, self.inline) {
                src = &src[token.raw_len()..];
                tokens.push(token);
                continue;
            }

            if let Some(mut token) = self.tokenizer.del(src, self.inline) {
                src = &src[token.raw_len()..];
                if let Token::Del {
                    text,
                    tokens: children,
                    ..
                } = &mut token
                {
                    *children = self.inline_tokens(text, in_link, in_raw_block)?;
                }
                tokens.push(token);
                continue;
            }

            if let Some(token) = self.tokenizer.autolink(src, &self.options) {
                src = &src[token.raw_len()..];
                tokens.push(token);
                continue;
            }

            if !in_link {
                if let Some(token) = self.tokenizer.url(src, self.inline, &self.options) {
                    src = &src[token.raw_len()..];
                    tokens.push(token);
                    continue;
                }
            }

            if let Some(token) = self.tokenizer.inline_text(
                src,
                in_raw_block,
                self.inline,
                &self.options,
            ) {
                src = &src[token.raw_len()..];
                prev_char = token.raw().chars().next_back();
                keep_prev = true;
                tokens.push(token);
                continue;
            }

            let err = MarqError::stall(src);
            if self.options.silent {
                warn!("{}", err);
                break;
            }
            return Err(err);
        }

        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use crate::token::LinkDef;

    fn lexer() -> Lexer {
        Lexer::new(Options::default())
    }

    #[test]
    fn test_strong_and_em_split() {
        let tokens = lexer().inline_tokens("*a* and **b**", false, false).unwrap();
        assert_eq!(tokens[0].kind(), "em");
        assert_eq!(tokens[1].kind(), "text");
        assert_eq!(tokens[2].kind(), "strong");
    }

    #[test]
    fn test_codespan_shields_emphasis() {
        let tokens = lexer().inline_tokens("`*a*`", false, false).unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind(), "codespan");
    }

    #[test]
    fn test_reference_link_resolves() {
        let mut lexer = lexer();
        lexer.links.insert(
            "a".to_string(),
            LinkDef {
                href: "/x".to_string(),
                title: Some("t".to_string()),
            },
        );
        let tokens = lexer.inline_tokens("[a]", false, false).unwrap();
        match &tokens[0] {
            Token::Link { href, title, .. } => {
                assert_eq!(href, "/x");
                assert_eq!(title.as_deref(), Some("t"));
            }
            other => panic!("unexpected token {:?}", other),
        }
    }

    #[test]
    fn test_unresolved_reference_degrades() {
        let tokens = lexer().inline_tokens("[missing]", false, false).unwrap();
        assert_eq!(tokens[0].kind(), "text");
        assert_eq!(tokens[0].raw(), "[");
    }

    #[test]
    fn test_masked_link_hides_delimiters() {
        // The asterisk inside the link target cannot close emphasis
        // started outside it.
        let tokens = lexer()
            .inline_tokens("a [x](/b*c) d", false, false)
            .unwrap();
        assert!(tokens.iter().all(|t| t.kind() != "em"));
    }

    #[test]
    fn test_autolink() {
        let tokens = lexer().inline_tokens("<https://x.test>", false, false).unwrap();
        match &tokens[0] {
            Token::Link { href, .. } => assert_eq!(href, "https://x.test"),
            other => panic!("unexpected token {:?}", other),
        }
    }

    #[test]
    fn test_hard_break() {
        let tokens = lexer().inline_tokens("a  \nb", false, false).unwrap();
        assert_eq!(tokens[0].kind(), "text");
        assert_eq!(tokens[1].kind(), "br");
        assert_eq!(tokens[2].kind(), "text");
    }
}
