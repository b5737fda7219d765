//! Renders a lexed token tree to output through a [`Renderer`].

use std::sync::Arc;

use log::warn;

use crate::error::{MarqError, Result};
use crate::helpers;
use crate::options::Options;
use crate::renderer::{HtmlRenderer, Renderer, TextRenderer};
use crate::slugger::Slugger;
use crate::token::{Align, Token};

pub struct Parser {
    options: Options,
    renderer: Arc<dyn Renderer>,
    text_renderer: TextRenderer,
    slugger: Slugger,
}

impl Parser {
    pub fn new(options: Options) -> Self {
        let renderer = options
            .renderer
            .clone()
            .unwrap_or_else(|| Arc::new(HtmlRenderer) as Arc<dyn Renderer>);
        Parser::with_renderer(options, renderer)
    }

    pub fn with_renderer(options: Options, renderer: Arc<dyn Renderer>) -> Self {
        Parser {
            options,
            renderer,
            text_renderer: TextRenderer,
            slugger: Slugger::new(),
        }
    }

    /// Renders block tokens. At the top level loose text becomes
    /// paragraphs; inside tight list items it stays bare.
    pub fn parse(&mut self, tokens: &mut Vec<Token>, top: bool) -> Result<String> {
        let renderer = Arc::clone(&self.renderer);
        let mut out = String::new();

        let mut i = 0;
        while i < tokens.len() {
            match &mut tokens[i] {
                Token::Space { .. } => {}

                Token::Hr { .. } => {
                    out.push_str(&renderer.hr(&self.options));
                }

                Token::Heading { depth, tokens: children, .. } => {
                    let depth = *depth;
                    let text = self.parse_inline(children, renderer.as_ref())?;
                    let raw =
                        helpers::unescape(&self.parse_inline(children, &self.text_renderer)?);
                    out.push_str(&renderer.heading(
                        &text,
                        depth,
                        &raw,
                        &mut self.slugger,
                        &self.options,
                    ));
                }

                Token::Code { text, lang, escaped, .. } => {
                    out.push_str(&renderer.code(
                        text,
                        lang.as_deref(),
                        *escaped,
                        &self.options,
                    ));
                }

                Token::Table {
                    align,
                    header_tokens,
                    cell_tokens,
                    ..
                } => {
                    let mut header_cells = String::new();
                    for (j, cell) in header_tokens.iter().enumerate() {
                        let content = self.parse_inline(cell, renderer.as_ref())?;
                        header_cells.push_str(&renderer.table_cell(
                            &content,
                            align.get(j).copied().unwrap_or(Align::None),
                            true,
                            &self.options,
                        ));
                    }
                    let header = renderer.table_row(&header_cells, &self.options);

                    let mut body = String::new();
                    for row in cell_tokens.iter() {
                        let mut cells = String::new();
                        for (j, cell) in row.iter().enumerate() {
                            let content = self.parse_inline(cell, renderer.as_ref())?;
                            cells.push_str(&renderer.table_cell(
                                &content,
                                align.get(j).copied().unwrap_or(Align::None),
                                false,
                                &self.options,
                            ));
                        }
                        body.push_str(&renderer.table_row(&cells, &self.options));
                    }
                    out.push_str(&renderer.table(&header, &body, &self.options));
                }

                Token::Blockquote { tokens: children, .. } => {
                    let body = self.parse(children, true)?;
                    out.push_str(&renderer.blockquote(&body, &self.options));
                }

                Token::List {
                    ordered,
                    start,
                    loose,
                    items,
                    ..
                } => {
                    let ordered = *ordered;
                    let start = *start;
                    let loose = *loose;
                    let mut body = String::new();

                    for item in items.iter_mut() {
                        let mut item_body = String::new();
                        if item.task {
                            let checkbox = renderer.checkbox(item.checked, &self.options);
                            if loose {
                                // Fold the checkbox into the leading text
                                // token so it renders inside the paragraph.
                                match item.tokens.first_mut() {
                                    Some(Token::Text {
                                        text,
                                        tokens: nested,
                                        ..
                                    }) => {
                                        *text = format!("{} {}", checkbox, text);
                                        if let Some(Token::Text {
                                            text: nested_text, ..
                                        }) = nested.first_mut()
                                        {
                                            *nested_text =
                                                format!("{} {}", checkbox, nested_text);
                                        }
                                    }
                                    _ => {
                                        item.tokens.insert(
                                            0,
                                            Token::Text {
                                                raw: String::new(),
                                                text: checkbox.clone(),
                                                tokens: Vec::new(),
                                            },
                                        );
                                    }
                                }
                            } else {
                                item_body.push_str(&checkbox);
                            }
                        }
                        item_body.push_str(&self.parse(&mut item.tokens, loose)?);
                        body.push_str(&renderer.list_item(
                            &item_body,
                            item.task,
                            item.checked,
                            &self.options,
                        ));
                    }

                    out.push_str(&renderer.list(&body, ordered, start, &self.options));
                }

                Token::Html { text, .. } => {
                    out.push_str(&renderer.html(text, &self.options));
                }

                Token::Paragraph { tokens: children, .. } => {
                    let content = self.parse_inline(children, renderer.as_ref())?;
                    out.push_str(&renderer.paragraph(&content, &self.options));
                }

                Token::Text { .. } => {
                    let mut body = self.text_body(&tokens[i])?;
                    while i + 1 < tokens.len()
                        && matches!(tokens[i + 1], Token::Text { .. })
                    {
                        i += 1;
                        body.push('\n');
                        body.push_str(&self.text_body(&tokens[i])?);
                    }
                    if top {
                        out.push_str(&renderer.paragraph(&body, &self.options));
                    } else {
                        out.push_str(&body);
                    }
                }

                other => {
                    let err = MarqError::unknown_token(other.kind());
                    if self.options.silent {
                        warn!("{}", err);
                        break;
                    }
                    return Err(err);
                }
            }
            i += 1;
        }

        Ok(out)
    }

    // A text token renders through its inline children when it has
    // them, otherwise through its literal text.
    fn text_body(&self, token: &Token) -> Result<String> {
        match token {
            Token::Text { text, tokens, .. } => {
                if tokens.is_empty() {
                    Ok(text.clone())
                } else {
                    self.parse_inline(tokens, self.renderer.as_ref())
                }
            }
            _ => Ok(String::new()),
        }
    }

    /// Renders inline tokens with the given backend.
    pub fn parse_inline(&self, tokens: &[Token], renderer: &dyn Renderer) -> Result<String> {
        let mut out = String::new();
        for token in tokens {
            match token {
                Token::Escape { text, .. } => {
                    out.push_str(&renderer.text(text, &self.options));
                }
                Token::Html { text, .. } => {
                    out.push_str(&renderer.html(text, &self.options));
                }
                Token::Link {
                    href,
                    title,
                    tokens: children,
                    ..
                } => {
                    let content = self.parse_inline(children, renderer)?;
                    out.push_str(&renderer.link(
                        href,
                        title.as_deref(),
                        &content,
                        &self.options,
                    ));
                }
                Token::Image {
                    href, title, text, ..
                } => {
                    out.push_str(&renderer.image(
                        href,
                        title.as_deref(),
                        text,
                        &self.options,
                    ));
                }
                Token::Strong { tokens: children, .. } => {
                    let content = self.parse_inline(children, renderer)?;
                    out.push_str(&renderer.strong(&content, &self.options));
                }
                Token::Em { tokens: children, .. } => {
                    let content = self.parse_inline(children, renderer)?;
                    out.push_str(&renderer.em(&content, &self.options));
                }
                Token::Codespan { text, .. } => {
                    out.push_str(&renderer.codespan(text, &self.options));
                }
                Token::Br { .. } => {
                    out.push_str(&renderer.br(&self.options));
                }
                Token::Del { tokens: children, .. } => {
                    let content = self.parse_inline(children, renderer)?;
                    out.push_str(&renderer.del(&content, &self.options));
                }
                Token::Text { text, .. } => {
                    out.push_str(&renderer.text(text, &self.options));
                }
                other => {
                    let err = MarqError::unknown_token(other.kind());
                    if self.options.silent {
                        warn!("{}", err);
                        break;
                    }
                    return Err(err);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::options::Options;

    fn render(src: &str) -> String {
        let options = Options::default();
        let mut tokens = Lexer::new(options.clone()).lex(src).unwrap();
        Parser::new(options).parse(&mut tokens, true).unwrap()
    }

    #[test]
    fn test_paragraph() {
        assert_eq!(render("hello *world*"), "<p>hello <em>world</em></p>\n");
    }

    #[test]
    fn test_heading_with_id() {
        assert_eq!(
            render("## Some Title"),
            "<h2 id=\"some-title\">Some Title</h2>\n"
        );
    }

    #[test]
    fn test_tight_list_text_stays_bare() {
        assert_eq!(
            render("- a\n- b\n"),
            "<ul>\n<li>a</li>\n<li>b</li>\n</ul>\n"
        );
    }

    #[test]
    fn test_loose_list_wraps_paragraphs() {
        assert_eq!(
            render("- a\n\n- b\n"),
            "<ul>\n<li><p>a</p>\n</li>\n<li><p>b</p>\n</li>\n</ul>\n"
        );
    }

    #[test]
    fn test_table_rendering() {
        let html = render("| a | b |\n|---|--:|\n| 1 | 2 |\n");
        assert!(html.contains("<th>a</th>"));
        assert!(html.contains("<td align=\"right\">2</td>"));
        assert!(html.contains("<tbody>"));
    }

    #[test]
    fn test_tight_task_list_checkbox() {
        let html = render("- [x] done\n");
        assert!(html.contains("<li class=\"task checked\">"));
        assert!(html.contains("checked=\"\" disabled=\"\" type=\"checkbox\""));
        assert!(html.contains("> done"));
    }

    #[test]
    fn test_blockquote_paragraphs() {
        assert_eq!(
            render("> quote\n"),
            "<blockquote>\n<p>quote</p>\n</blockquote>\n"
        );
    }
}
