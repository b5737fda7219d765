//! Conversion options and the hook traits they carry.
//!
//! An [`Options`] value travels through the lexer, parser and renderer.
//! A process-wide default set can be installed with [`set_defaults`] so
//! embedders configure once and call the convenience functions after.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use lazy_static::lazy_static;

use crate::renderer::Renderer;
use crate::tokenizer::Tokenizer;

/// Syntax highlighting hook applied to fenced and indented code blocks.
///
/// Returning `Ok(None)` leaves the block to the default escaping path.
/// An `Err` aborts the conversion with a highlight error.
pub trait Highlighter: Send + Sync {
    fn highlight(&self, code: &str, lang: Option<&str>)
        -> std::result::Result<Option<String>, String>;
}

/// Custom HTML sanitizer, consulted instead of plain escaping when the
/// `sanitize` option is on.
pub trait Sanitizer: Send + Sync {
    fn sanitize(&self, html: &str) -> String;
}

/// Settings controlling tokenization and rendering.
#[derive(Clone)]
pub struct Options {
    /// Base URL that relative link destinations resolve against.
    pub base_url: Option<String>,
    /// Render every newline inside a paragraph as a line break.
    pub breaks: bool,
    /// GitHub-flavored extensions: tables, strikethrough, task lists,
    /// bare URL autolinking.
    pub gfm: bool,
    /// Emit `id` attributes on headings.
    pub header_ids: bool,
    /// Prefix prepended to every heading id.
    pub header_prefix: String,
    /// Class prefix for fenced code block languages.
    pub lang_prefix: String,
    /// Obfuscate autolinked addresses as character references.
    pub mangle: bool,
    /// The original loose markdown grammar; disables GFM.
    pub pedantic: bool,
    /// Escape or sanitize raw HTML in the source.
    pub sanitize: bool,
    /// Swallow conversion errors and return the error text as HTML.
    pub silent: bool,
    /// End a list when the bullet style changes, even in pedantic mode.
    pub smart_lists: bool,
    /// Typographic quotes, dashes and ellipses in plain text.
    pub smartypants: bool,
    /// Self-close void elements for XHTML output.
    pub xhtml: bool,
    /// Code block highlighting hook.
    pub highlighter: Option<Arc<dyn Highlighter>>,
    /// Raw HTML sanitizing hook.
    pub sanitizer: Option<Arc<dyn Sanitizer>>,
    /// Output backend replacing [`HtmlRenderer`](crate::HtmlRenderer).
    pub renderer: Option<Arc<dyn Renderer>>,
    /// Recognizer set replacing the stock tokenizer.
    pub tokenizer: Option<Arc<dyn Tokenizer>>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            base_url: None,
            breaks: false,
            gfm: true,
            header_ids: true,
            header_prefix: String::new(),
            lang_prefix: "language-".to_string(),
            mangle: true,
            pedantic: false,
            sanitize: false,
            silent: false,
            smart_lists: false,
            smartypants: false,
            xhtml: false,
            highlighter: None,
            sanitizer: None,
            renderer: None,
            tokenizer: None,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("base_url", &self.base_url)
            .field("breaks", &self.breaks)
            .field("gfm", &self.gfm)
            .field("header_ids", &self.header_ids)
            .field("header_prefix", &self.header_prefix)
            .field("lang_prefix", &self.lang_prefix)
            .field("mangle", &self.mangle)
            .field("pedantic", &self.pedantic)
            .field("sanitize", &self.sanitize)
            .field("silent", &self.silent)
            .field("smart_lists", &self.smart_lists)
            .field("smartypants", &self.smartypants)
            .field("xhtml", &self.xhtml)
            .field("highlighter", &self.highlighter.is_some())
            .field("sanitizer", &self.sanitizer.is_some())
            .field("renderer", &self.renderer.is_some())
            .field("tokenizer", &self.tokenizer.is_some())
            .finish()
    }
}

impl Options {
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::default()
    }
}

/// Fluent construction of [`Options`], starting from the defaults.
#[derive(Default)]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.options.base_url = Some(base_url.into());
        self
    }

    pub fn breaks(mut self, breaks: bool) -> Self {
        self.options.breaks = breaks;
        self
    }

    pub fn gfm(mut self, gfm: bool) -> Self {
        self.options.gfm = gfm;
        self
    }

    pub fn header_ids(mut self, header_ids: bool) -> Self {
        self.options.header_ids = header_ids;
        self
    }

    pub fn header_prefix(mut self, header_prefix: impl Into<String>) -> Self {
        self.options.header_prefix = header_prefix.into();
        self
    }

    pub fn lang_prefix(mut self, lang_prefix: impl Into<String>) -> Self {
        self.options.lang_prefix = lang_prefix.into();
        self
    }

    pub fn mangle(mut self, mangle: bool) -> Self {
        self.options.mangle = mangle;
        self
    }

    pub fn pedantic(mut self, pedantic: bool) -> Self {
        self.options.pedantic = pedantic;
        self
    }

    pub fn sanitize(mut self, sanitize: bool) -> Self {
        self.options.sanitize = sanitize;
        self
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.options.silent = silent;
        self
    }

    pub fn smart_lists(mut self, smart_lists: bool) -> Self {
        self.options.smart_lists = smart_lists;
        self
    }

    pub fn smartypants(mut self, smartypants: bool) -> Self {
        self.options.smartypants = smartypants;
        self
    }

    pub fn xhtml(mut self, xhtml: bool) -> Self {
        self.options.xhtml = xhtml;
        self
    }

    pub fn highlighter(mut self, highlighter: Arc<dyn Highlighter>) -> Self {
        self.options.highlighter = Some(highlighter);
        self
    }

    pub fn sanitizer(mut self, sanitizer: Arc<dyn Sanitizer>) -> Self {
        self.options.sanitizer = Some(sanitizer);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.options.renderer = Some(renderer);
        self
    }

    pub fn tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.options.tokenizer = Some(tokenizer);
        self
    }

    pub fn build(self) -> Options {
        self.options
    }
}

lazy_static! {
    static ref DEFAULTS: RwLock<Options> = RwLock::new(Options::default());
}

/// Returns a copy of the process-wide default options.
pub fn defaults() -> Options {
    DEFAULTS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Replaces the process-wide default options.
pub fn set_defaults(options: Options) {
    *DEFAULTS.write().unwrap_or_else(PoisonError::into_inner) = options;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = Options::default();
        assert!(options.gfm);
        assert!(options.header_ids);
        assert!(options.mangle);
        assert!(!options.breaks);
        assert_eq!(options.lang_prefix, "language-");
    }

    #[test]
    fn test_builder() {
        let options = Options::builder()
            .breaks(true)
            .gfm(false)
            .header_prefix("doc-")
            .build();
        assert!(options.breaks);
        assert!(!options.gfm);
        assert_eq!(options.header_prefix, "doc-");
    }
}
