//! Output backends for the parser.
//!
//! [`Renderer`] turns parsed constructs into output fragments; every
//! method has a default HTML body, so an implementation overrides only
//! what it wants to change. [`TextRenderer`] flattens inline markup to
//! plain text and backs alt text and heading ids.

use lazy_static::lazy_static;
use regex::Regex;

use crate::helpers;
use crate::options::Options;
use crate::slugger::Slugger;
use crate::token::Align;

lazy_static! {
    static ref INFO_WORD: Regex = Regex::new(r"\S*").unwrap();
}

/// Rendering capability consulted for every construct the parser emits.
pub trait Renderer: Send + Sync {
    fn code(&self, code: &str, info: Option<&str>, escaped: bool, options: &Options) -> String {
        let lang = info
            .and_then(|i| INFO_WORD.find(i))
            .map(|m| m.as_str())
            .filter(|l| !l.is_empty());

        let class = match lang {
            Some(lang) => format!(
                " class=\"{}{}\"",
                options.lang_prefix,
                helpers::escape(lang, true)
            ),
            None => String::new(),
        };
        let body = if escaped {
            code.to_string()
        } else {
            helpers::escape(code, true)
        };
        format!("<pre><code{}>{}</code></pre>\n", class, body)
    }

    fn blockquote(&self, body: &str, _options: &Options) -> String {
        format!("<blockquote>\n{}</blockquote>\n", body)
    }

    fn html(&self, html: &str, _options: &Options) -> String {
        html.to_string()
    }

    /// `raw` is the flattened heading text used to derive the id.
    fn heading(
        &self,
        text: &str,
        level: u8,
        raw: &str,
        slugger: &mut Slugger,
        options: &Options,
    ) -> String {
        if options.header_ids {
            format!(
                "<h{} id=\"{}{}\">{}</h{}>\n",
                level,
                options.header_prefix,
                slugger.slug(raw),
                text,
                level
            )
        } else {
            format!("<h{}>{}</h{}>\n", level, text, level)
        }
    }

    fn hr(&self, options: &Options) -> String {
        if options.xhtml {
            "<hr/>\n".to_string()
        } else {
            "<hr>\n".to_string()
        }
    }

    fn list(&self, body: &str, ordered: bool, start: Option<u64>, _options: &Options) -> String {
        if !ordered {
            return format!("<ul>\n{}</ul>\n", body);
        }
        match start {
            Some(start) if start != 1 => format!("<ol start=\"{}\">\n{}</ol>\n", start, body),
            _ => format!("<ol>\n{}</ol>\n", body),
        }
    }

    fn list_item(&self, text: &str, task: bool, checked: bool, _options: &Options) -> String {
        if task {
            let class = if checked { "task checked" } else { "task" };
            format!("<li class=\"{}\">{}</li>\n", class, text)
        } else {
            format!("<li>{}</li>\n", text)
        }
    }

    fn checkbox(&self, checked: bool, options: &Options) -> String {
        format!(
            "<input {}disabled=\"\" type=\"checkbox\"{}> ",
            if checked { "checked=\"\" " } else { "" },
            if options.xhtml { " /" } else { "" }
        )
    }

    fn paragraph(&self, text: &str, _options: &Options) -> String {
        format!("<p>{}</p>\n", text)
    }

    fn table(&self, header: &str, body: &str, _options: &Options) -> String {
        let body = if body.is_empty() {
            String::new()
        } else {
            format!("<tbody>\n{}</tbody>\n", body)
        };
        format!("<table>\n<thead>\n{}</thead>\n{}</table>\n", header, body)
    }

    fn table_row(&self, content: &str, _options: &Options) -> String {
        format!("<tr>{}</tr>\n", content)
    }

    fn table_cell(&self, content: &str, align: Align, header: bool, _options: &Options) -> String {
        let tag = if header { "th" } else { "td" };
        match align.as_attr() {
            Some(align) => format!("<{} align=\"{}\">{}</{}>\n", tag, align, content, tag),
            None => format!("<{}>{}</{}>\n", tag, content, tag),
        }
    }

    fn strong(&self, text: &str, _options: &Options) -> String {
        format!("<strong>{}</strong>", text)
    }

    fn em(&self, text: &str, _options: &Options) -> String {
        format!("<em>{}</em>", text)
    }

    fn codespan(&self, text: &str, _options: &Options) -> String {
        format!("<code>{}</code>", text)
    }

    fn br(&self, options: &Options) -> String {
        if options.xhtml {
            "<br/>".to_string()
        } else {
            "<br>".to_string()
        }
    }

    fn del(&self, text: &str, _options: &Options) -> String {
        format!("<del>{}</del>", text)
    }

    /// Renders to the link text alone when the destination is rejected
    /// by the sanitizer.
    fn link(&self, href: &str, title: Option<&str>, text: &str, options: &Options) -> String {
        let href = match helpers::clean_url(options.sanitize, options.base_url.as_deref(), href) {
            Some(href) => href,
            None => return text.to_string(),
        };
        let mut out = format!("<a href=\"{}\"", helpers::escape(&href, false));
        if let Some(title) = title.filter(|t| !t.is_empty()) {
            out.push_str(&format!(" title=\"{}\"", title));
        }
        out.push_str(&format!(">{}</a>", text));
        out
    }

    fn image(&self, href: &str, title: Option<&str>, text: &str, options: &Options) -> String {
        let href = match helpers::clean_url(options.sanitize, options.base_url.as_deref(), href) {
            Some(href) => href,
            None => return text.to_string(),
        };
        let mut out = format!("<img src=\"{}\" alt=\"{}\"", href, text);
        if let Some(title) = title.filter(|t| !t.is_empty()) {
            out.push_str(&format!(" title=\"{}\"", title));
        }
        out.push_str(if options.xhtml { "/>" } else { ">" });
        out
    }

    fn text(&self, text: &str, _options: &Options) -> String {
        text.to_string()
    }
}

/// The stock HTML backend.
#[derive(Debug, Default)]
pub struct HtmlRenderer;

impl Renderer for HtmlRenderer {}

/// Backend that keeps only the textual content of inline tokens.
#[derive(Debug, Default)]
pub struct TextRenderer;

impl Renderer for TextRenderer {
    fn strong(&self, text: &str, _options: &Options) -> String {
        text.to_string()
    }

    fn em(&self, text: &str, _options: &Options) -> String {
        text.to_string()
    }

    fn codespan(&self, text: &str, _options: &Options) -> String {
        text.to_string()
    }

    fn del(&self, text: &str, _options: &Options) -> String {
        text.to_string()
    }

    fn html(&self, html: &str, _options: &Options) -> String {
        html.to_string()
    }

    fn br(&self, _options: &Options) -> String {
        String::new()
    }

    fn link(&self, _href: &str, _title: Option<&str>, text: &str, _options: &Options) -> String {
        text.to_string()
    }

    fn image(&self, _href: &str, _title: Option<&str>, text: &str, _options: &Options) -> String {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_with_language() {
        let options = Options::default();
        let out = HtmlRenderer.code("let x;", Some("rust extra"), false, &options);
        assert_eq!(
            out,
            "<pre><code class=\"language-rust\">let x;</code></pre>\n"
        );
    }

    #[test]
    fn test_heading_ids() {
        let options = Options::default();
        let mut slugger = Slugger::new();
        let out = HtmlRenderer.heading("Hi", 2, "Hi", &mut slugger, &options);
        assert_eq!(out, "<h2 id=\"hi\">Hi</h2>\n");

        let plain = Options::builder().header_ids(false).build();
        let out = HtmlRenderer.heading("Hi", 2, "Hi", &mut slugger, &plain);
        assert_eq!(out, "<h2>Hi</h2>\n");
    }

    #[test]
    fn test_link_sanitizes() {
        let options = Options::builder().sanitize(true).build();
        let out = HtmlRenderer.link("javascript:alert(1)", None, "x", &options);
        assert_eq!(out, "x");
    }

    #[test]
    fn test_list_start_attr() {
        let options = Options::default();
        let out = HtmlRenderer.list("<li>a</li>\n", true, Some(3), &options);
        assert_eq!(out, "<ol start=\"3\">\n<li>a</li>\n</ol>\n");
        let out = HtmlRenderer.list("<li>a</li>\n", true, Some(1), &options);
        assert_eq!(out, "<ol>\n<li>a</li>\n</ol>\n");
    }

    #[test]
    fn test_checkbox_xhtml() {
        let xhtml = Options::builder().xhtml(true).build();
        assert_eq!(
            HtmlRenderer.checkbox(true, &xhtml),
            "<input checked=\"\" disabled=\"\" type=\"checkbox\" /> "
        );
        assert_eq!(HtmlRenderer.br(&xhtml), "<br/>");
    }
}
