//! Block-level lexer.
//!
//! [`Lexer::lex`] normalizes line endings, runs the block grammar over
//! the whole document, then walks the resulting tree once more to
//! tokenize inline content (the inline stage lives in the `inline`
//! module). Reference definitions are collected into [`Lexer::links`]
//! during the block stage so the inline stage can resolve them.

use std::sync::Arc;

use lazy_static::lazy_static;
use log::warn;
use regex::Regex;

use crate::error::{MarqError, Result};
use crate::options::Options;
use crate::rules::{BlockRules, InlineRules};
use crate::token::{Links, Token};
use crate::tokenizer::{BlockPiece, DefaultTokenizer, Tokenizer};

lazy_static! {
    static ref WS_ONLY_LINE: Regex = Regex::new(r"(?m)^ +$").unwrap();
}

pub struct Lexer {
    pub(crate) options: Options,
    pub(crate) tokenizer: Arc<dyn Tokenizer>,
    pub(crate) block: BlockRules,
    pub(crate) inline: InlineRules,
    pub links: Links,
}

impl Lexer {
    pub fn new(options: Options) -> Self {
        let tokenizer = options
            .tokenizer
            .clone()
            .unwrap_or_else(|| Arc::new(DefaultTokenizer) as Arc<dyn Tokenizer>);
        Lexer::with_tokenizer(options, tokenizer)
    }

    pub fn with_tokenizer(options: Options, tokenizer: Arc<dyn Tokenizer>) -> Self {
        let block = BlockRules::new(options.gfm, options.pedantic);
        let inline = InlineRules::new(options.gfm, options.breaks, options.pedantic);
        Lexer {
            options,
            tokenizer,
            block,
            inline,
            links: Links::new(),
        }
    }

    /// Tokenizes a whole document.
    pub fn lex(&mut self, src: &str) -> Result<Vec<Token>> {
        let src = src
            .replace("\r\n", "\n")
            .replace('\r', "\n")
            .replace('\t', "    ");

        let mut tokens = Vec::new();
        self.block_tokens(&src, &mut tokens, true)?;
        self.inline_pass(&mut tokens)?;
        Ok(tokens)
    }

    /// Runs the block grammar over `src`, appending to `tokens`. `top`
    /// is true at document level, where paragraphs and definitions are
    /// permitted.
    pub fn block_tokens(&mut self, src: &str, tokens: &mut Vec<Token>, top: bool) -> Result<()> {
        let src = WS_ONLY_LINE.replace_all(src, "").into_owned();
        let mut src = src.as_str();

        while !src.is_empty() {
            if let Some(token) = self.tokenizer.space(src) {
                let len = token.raw_len();
                src = &src[len..];
                if len > 1 {
                    tokens.push(token);
                }
                continue;
            }

            let prev_paragraph = matches!(tokens.last(), Some(Token::Paragraph { .. }));
            if let Some(piece) = self.tokenizer.code(src, prev_paragraph, self.block) {
                match piece {
                    BlockPiece::Token(token) => {
                        src = &src[token.raw_len()..];
                        tokens.push(token);
                    }
                    BlockPiece::Continuation { raw, text } => {
                        src = &src[raw.len()..];
                        if let Some(Token::Paragraph {
                            raw: prev_raw,
                            text: prev_text,
                            ..
                        }) = tokens.last_mut()
                        {
                            prev_raw.push('\n');
                            prev_raw.push_str(&raw);
                            prev_text.push('\n');
                            prev_text.push_str(&text);
                        }
                    }
                }
                continue;
            }

            if let Some(token) = self.tokenizer.fences(src, self.block) {
                src = &src[token.raw_len()..];
                tokens.push(token);
                continue;
            }

            if let Some(token) = self.tokenizer.heading(src, self.block) {
                src = &src[token.raw_len()..];
                tokens.push(token);
                continue;
            }

            if let Some(token) = self.tokenizer.nptable(src, self.block) {
                src = &src[token.raw_len()..];
                tokens.push(token);
                continue;
            }

            if let Some(token) = self.tokenizer.hr(src) {
                src = &src[token.raw_len()..];
                tokens.push(token);
                continue;
            }

            if let Some(mut token) = self.tokenizer.blockquote(src) {
                src = &src[token.raw_len()..];
                if let Token::Blockquote {
                    text,
                    tokens: children,
                    ..
                } = &mut token
                {
                    let text = text.clone();
                    self.block_tokens(&text, children, top)?;
                }
                tokens.push(token);
                continue;
            }

            if let Some(mut token) = self.tokenizer.list(src, self.block, &self.options) {
                src = &src[token.raw_len()..];
                if let Token::List { items, .. } = &mut token {
                    for item in items.iter_mut() {
                        let text = item.text.clone();
                        self.block_tokens(&text, &mut item.tokens, false)?;
                    }
                }
                tokens.push(token);
                continue;
            }

            if let Some(token) = self.tokenizer.html(src, self.block, &self.options) {
                src = &src[token.raw_len()..];
                tokens.push(token);
                continue;
            }

            if top {
                if let Some(def) = self.tokenizer.def(src, self.block) {
                    src = &src[def.raw.len()..];
                    // The first definition of a label wins.
                    self.links.entry(def.tag).or_insert(crate::token::LinkDef {
                        href: def.href,
                        title: def.title,
                    });
                    continue;
                }
            }

            if let Some(token) = self.tokenizer.table(src, self.block) {
                src = &src[token.raw_len()..];
                tokens.push(token);
                continue;
            }

            if let Some(token) = self.tokenizer.lheading(src) {
                src = &src[token.raw_len()..];
                tokens.push(token);
                continue;
            }

            if top {
                if let Some(token) = self.tokenizer.paragraph(src, self.block) {
                    src = &src[token.raw_len()..];
                    tokens.push(token);
                    continue;
                }
            }

            let prev_text = matches!(tokens.last(), Some(Token::Text { .. }));
            if let Some(piece) = self.tokenizer.text(src, prev_text) {
                match piece {
                    BlockPiece::Token(token) => {
                        src = &src[token.raw_len()..];
                        tokens.push(token);
                    }
                    BlockPiece::Continuation { raw, text } => {
                        src = &src[raw.len()..];
                        if let Some(Token::Text {
                            raw: prev_raw,
                            text: prev_text,
                            ..
                        }) = tokens.last_mut()
                        {
                            prev_raw.push('\n');
                            prev_raw.push_str(&raw);
                            prev_text.push('\n');
                            prev_text.push_str(&text);
                        }
                    }
                }
                continue;
            }

            let err = MarqError::stall(src);
            if self.options.silent {
                warn!("{}", err);
                break;
            }
            return Err(err);
        }

        Ok(())
    }

    /// Second pass: tokenize the inline content of every block token,
    /// recursing through containers.
    pub(crate) fn inline_pass(&mut self, tokens: &mut [Token]) -> Result<()> {
        for token in tokens.iter_mut() {
            match token {
                Token::Paragraph {
                    text,
                    tokens: children,
                    ..
                }
                | Token::Text {
                    text,
                    tokens: children,
                    ..
                }
                | Token::Heading {
                    text,
                    tokens: children,
                    ..
                } => {
                    *children = self.inline_tokens(text, false, false)?;
                }
                Token::Table {
                    header,
                    cells,
                    header_tokens,
                    cell_tokens,
                    ..
                } => {
                    header_tokens.clear();
                    for cell in header.iter() {
                        header_tokens.push(self.inline_tokens(cell, false, false)?);
                    }
                    cell_tokens.clear();
                    for row in cells.iter() {
                        let mut out_row = Vec::with_capacity(row.len());
                        for cell in row.iter() {
                            out_row.push(self.inline_tokens(cell, false, false)?);
                        }
                        cell_tokens.push(out_row);
                    }
                }
                Token::Blockquote {
                    tokens: children, ..
                } => {
                    self.inline_pass(children)?;
                }
                Token::List { items, .. } => {
                    for item in items.iter_mut() {
                        self.inline_pass(&mut item.tokens)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<Token> {
        Lexer::new(Options::default()).lex(src).unwrap()
    }

    #[test]
    fn test_paragraph_and_heading() {
        // The heading match swallows the trailing blank line.
        let tokens = lex("# Title\n\nbody text\n");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].kind(), "heading");
        assert_eq!(tokens[1].kind(), "paragraph");
    }

    #[test]
    fn test_single_newline_consumed_silently() {
        let tokens = lex("a\nb\n");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind(), "paragraph");
        assert_eq!(tokens[0].raw(), "a\nb");
    }

    #[test]
    fn test_code_merges_into_paragraph() {
        let tokens = lex("para\n    still para\n");
        assert_eq!(tokens.len(), 1);
        match &tokens[0] {
            Token::Paragraph { text, .. } => {
                assert_eq!(text, "para\n    still para");
            }
            other => panic!("unexpected token {:?}", other),
        }
    }

    #[test]
    fn test_carriage_returns_normalized() {
        let tokens = lex("a\r\nb\rc");
        assert_eq!(tokens[0].raw(), "a\nb\nc");
    }

    #[test]
    fn test_first_definition_wins() {
        let mut lexer = Lexer::new(Options::default());
        lexer.lex("[a]: /one\n\n[a]: /two\n").unwrap();
        assert_eq!(lexer.links["a"].href, "/one");
    }

    #[test]
    fn test_nptable_inside_list_item() {
        let tokens = lex("* intro\n  a|b\n  -|-\n  1|2\n");
        match &tokens[0] {
            Token::List { items, .. } => {
                assert_eq!(items[0].tokens[0].kind(), "text");
                assert_eq!(items[0].tokens[1].kind(), "table");
            }
            other => panic!("unexpected token {:?}", other),
        }
    }

    #[test]
    fn test_blockquote_recurses() {
        let tokens = lex("> # h\n> text\n");
        match &tokens[0] {
            Token::Blockquote { tokens, .. } => {
                assert_eq!(tokens[0].kind(), "heading");
            }
            other => panic!("unexpected token {:?}", other),
        }
    }

    #[test]
    fn test_task_list_inline_pass() {
        let tokens = lex("- [x] **done**\n");
        match &tokens[0] {
            Token::List { items, .. } => {
                assert!(items[0].task);
                assert_eq!(items[0].tokens[0].kind(), "text");
            }
            other => panic!("unexpected token {:?}", other),
        }
    }
}
