//! A two-stage Markdown to HTML compiler.
//!
//! The block lexer splits a document into a token tree, a second pass
//! tokenizes inline content, and the parser renders the tree through a
//! pluggable [`Renderer`]. The grammar follows GitHub Flavored Markdown
//! by default, with `pedantic` switching to the original markdown.pl
//! behavior.
//!
//! ```
//! let html = marq::to_html("# Hello *world*").unwrap();
//! assert_eq!(html, "<h1 id=\"hello-world\">Hello <em>world</em></h1>\n");
//! ```
//!
//! Conversion behavior is controlled through [`Options`], either per
//! call with [`to_html_with`] or process-wide with [`set_defaults`]:
//!
//! ```
//! use marq::Options;
//!
//! let options = Options::builder().breaks(true).build();
//! let html = marq::to_html_with("a\nb", &options).unwrap();
//! assert_eq!(html, "<p>a<br>b</p>\n");
//! ```

pub mod error;
pub mod helpers;
mod inline;
pub mod lexer;
pub mod options;
pub mod parser;
pub mod renderer;
pub mod rules;
pub mod slugger;
pub mod token;
pub mod tokenizer;

pub use error::{MarqError, Result};
pub use lexer::Lexer;
pub use options::{defaults, set_defaults, Highlighter, Options, OptionsBuilder, Sanitizer};
pub use parser::Parser;
pub use renderer::{HtmlRenderer, Renderer, TextRenderer};
pub use slugger::Slugger;
pub use token::{Align, LinkDef, Links, ListItem, Token};
pub use tokenizer::{DefaultTokenizer, Tokenizer};

/// Converts Markdown to HTML with the process-wide default options.
pub fn to_html(src: &str) -> Result<String> {
    to_html_with(src, &options::defaults())
}

/// Converts Markdown to HTML with the given options.
///
/// With `silent` set, conversion errors are rendered into the output
/// instead of being returned.
pub fn to_html_with(src: &str, options: &Options) -> Result<String> {
    if src.is_empty() {
        return Ok(String::new());
    }
    if (options.sanitize || options.sanitizer.is_some()) && !options.silent {
        log::warn!(
            "sanitize and sanitizer are deprecated; filter the output HTML instead"
        );
    }

    let result = convert(src, options);
    match result {
        Err(err) if options.silent => Ok(format!(
            "<p>An error occurred:</p><pre>{}</pre>",
            helpers::escape(&err.to_string(), true)
        )),
        other => other,
    }
}

/// Converts raw bytes, rejecting input that is not valid UTF-8.
pub fn to_html_bytes(input: &[u8]) -> Result<String> {
    let src = std::str::from_utf8(input)
        .map_err(|_| MarqError::invalid_input("input is not valid UTF-8"))?;
    to_html(src)
}

fn convert(src: &str, options: &Options) -> Result<String> {
    let mut lexer = Lexer::new(options.clone());
    let mut tokens = lexer.lex(src)?;
    apply_highlight(&mut tokens, options)?;
    Parser::new(options.clone()).parse(&mut tokens, true)
}

// Runs the highlight hook over every code block before parsing, so a
// hook failure discards the whole conversion.
fn apply_highlight(tokens: &mut [Token], options: &Options) -> Result<()> {
    match &options.highlighter {
        Some(highlighter) => highlight_tokens(tokens, highlighter.as_ref()),
        None => Ok(()),
    }
}

fn highlight_tokens(tokens: &mut [Token], highlighter: &dyn Highlighter) -> Result<()> {
    for token in tokens.iter_mut() {
        match token {
            Token::Code {
                text,
                lang,
                escaped,
                ..
            } => match highlighter.highlight(text, lang.as_deref()) {
                Ok(Some(out)) if out != *text => {
                    *text = out;
                    *escaped = true;
                }
                Ok(_) => {}
                Err(message) => return Err(MarqError::highlight(message)),
            },
            Token::Blockquote {
                tokens: children, ..
            } => highlight_tokens(children, highlighter)?,
            Token::List { items, .. } => {
                for item in items.iter_mut() {
                    highlight_tokens(&mut item.tokens, highlighter)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_empty_input() {
        assert_eq!(to_html("").unwrap(), "");
    }

    #[test]
    fn test_basic_paragraph() {
        assert_eq!(to_html("hello").unwrap(), "<p>hello</p>\n");
    }

    #[test]
    fn test_invalid_bytes() {
        let err = to_html_bytes(&[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, MarqError::InvalidInput { .. }));
    }

    struct Upper;

    impl Highlighter for Upper {
        fn highlight(
            &self,
            code: &str,
            _lang: Option<&str>,
        ) -> std::result::Result<Option<String>, String> {
            Ok(Some(code.to_uppercase()))
        }
    }

    struct Failing;

    impl Highlighter for Failing {
        fn highlight(
            &self,
            _code: &str,
            _lang: Option<&str>,
        ) -> std::result::Result<Option<String>, String> {
            Err("boom".to_string())
        }
    }

    #[test]
    fn test_highlight_rewrites_code() {
        let options = Options::builder().highlighter(Arc::new(Upper)).build();
        let html = to_html_with("```\nabc\n```\n", &options).unwrap();
        assert_eq!(html, "<pre><code>ABC</code></pre>\n");
    }

    #[test]
    fn test_highlight_reaches_nested_code() {
        let options = Options::builder().highlighter(Arc::new(Upper)).build();
        let html = to_html_with("> ```\n> abc\n> ```\n", &options).unwrap();
        assert!(html.contains("<pre><code>ABC</code></pre>"));
        let html = to_html_with("- ```\n  abc\n  ```\n", &options).unwrap();
        assert!(html.contains("<pre><code>ABC</code></pre>"));
    }

    #[test]
    fn test_highlight_failure_in_blockquote_aborts() {
        let options = Options::builder().highlighter(Arc::new(Failing)).build();
        let err = to_html_with("> ```\n> abc\n> ```\n", &options).unwrap_err();
        assert!(matches!(err, MarqError::Highlight { .. }));
    }

    #[test]
    fn test_highlight_failure_surfaces() {
        let options = Options::builder().highlighter(Arc::new(Failing)).build();
        let err = to_html_with("```\nabc\n```\n", &options).unwrap_err();
        assert!(matches!(err, MarqError::Highlight { .. }));
    }

    #[test]
    fn test_silent_wraps_errors() {
        let options = Options::builder()
            .highlighter(Arc::new(Failing))
            .silent(true)
            .build();
        let html = to_html_with("```\nabc\n```\n", &options).unwrap();
        assert!(html.starts_with("<p>An error occurred:</p><pre>"));
        assert!(html.contains("boom"));
    }
}
