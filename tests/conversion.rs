//! End-to-end conversion tests against the default options.

use std::sync::Arc;

use anyhow::Result;

use marq::{to_html, to_html_with, Options, Renderer};

#[test]
fn repeated_headings_get_numbered_ids() -> Result<()> {
    let html = to_html("# Foo Bar\n# Foo Bar\n# Foo Bar\n")?;
    assert!(html.contains("id=\"foo-bar\""));
    assert!(html.contains("id=\"foo-bar-1\""));
    assert!(html.contains("id=\"foo-bar-2\""));
    Ok(())
}

#[test]
fn strong_and_em_render() -> Result<()> {
    assert_eq!(to_html("**bold**")?, "<p><strong>bold</strong></p>\n");
    assert_eq!(
        to_html("*a* *b*")?,
        "<p><em>a</em> <em>b</em></p>\n"
    );
    Ok(())
}

#[test]
fn mismatched_table_header_falls_back_to_paragraph() -> Result<()> {
    let html = to_html("| a | b | c |\n|---|---|\n")?;
    assert!(!html.contains("<table>"));
    assert!(html.contains("<p>"));
    Ok(())
}

#[test]
fn task_list_renders_checkboxes() -> Result<()> {
    let html = to_html("- [x] done\n- [ ] open\n")?;
    assert!(html.contains("<li class=\"task checked\">"));
    assert!(html.contains("checked=\"\" disabled=\"\" type=\"checkbox\""));
    assert!(html.contains("<li class=\"task\">"));
    assert_eq!(html.matches("<input").count(), 2);
    Ok(())
}

#[test]
fn reference_definition_resolves_late_use() -> Result<()> {
    let html = to_html("[a]: /x \"t\"\n\n[a]")?;
    assert_eq!(html, "<p><a href=\"/x\" title=\"t\">a</a></p>\n");
    Ok(())
}

#[test]
fn bullet_style_change_starts_a_new_list() -> Result<()> {
    let html = to_html("- a\n- b\n+ c\n")?;
    assert_eq!(html.matches("<ul>").count(), 2);
    assert_eq!(html.matches("<li>").count(), 3);
    Ok(())
}

#[test]
fn conversion_is_deterministic() -> Result<()> {
    let src = "# T\n\n<a@b.test>\n\n```rust\nfn main() {}\n```\n";
    assert_eq!(to_html(src)?, to_html(src)?);
    Ok(())
}

#[test]
fn autolinked_email_is_mangled() -> Result<()> {
    let html = to_html("<a@b.test>")?;
    assert!(html.contains("mailto:"));
    // Every character of the address is entity-encoded.
    assert!(!html.contains("a@b.test"));
    assert!(html.contains("&#"));
    Ok(())
}

#[test]
fn gfm_url_is_linked() -> Result<()> {
    let html = to_html("see https://example.test/x.")?;
    assert_eq!(
        html,
        "<p>see <a href=\"https://example.test/x\">https://example.test/x</a>.</p>\n"
    );
    Ok(())
}

#[test]
fn breaks_option_turns_newlines_into_br() -> Result<()> {
    let options = Options::builder().breaks(true).build();
    assert_eq!(to_html_with("a\nb", &options)?, "<p>a<br>b</p>\n");
    // Without it, a single newline is a soft break.
    assert_eq!(to_html("a\nb")?, "<p>a\nb</p>\n");
    Ok(())
}

#[test]
fn xhtml_option_closes_void_tags() -> Result<()> {
    let options = Options::builder().xhtml(true).build();
    assert_eq!(to_html_with("---\n", &options)?, "<hr/>\n");
    Ok(())
}

#[test]
fn sanitize_option_escapes_raw_html() -> Result<()> {
    let options = Options::builder().sanitize(true).build();
    let html = to_html_with("<div>x</div>\n", &options)?;
    assert!(!html.contains("<div>"));
    assert!(html.contains("&lt;div&gt;"));
    Ok(())
}

#[test]
fn javascript_urls_are_dropped_when_sanitizing() -> Result<()> {
    let options = Options::builder().sanitize(true).build();
    let html = to_html_with("[x](javascript:alert(1))", &options)?;
    assert!(!html.contains("<a"));
    assert!(html.contains("x"));
    Ok(())
}

#[test]
fn header_ids_can_be_disabled() -> Result<()> {
    let options = Options::builder().header_ids(false).build();
    assert_eq!(to_html_with("# T", &options)?, "<h1>T</h1>\n");
    Ok(())
}

#[test]
fn fenced_code_carries_language_class() -> Result<()> {
    let html = to_html("```rust\nlet x = 1;\n```\n")?;
    assert_eq!(
        html,
        "<pre><code class=\"language-rust\">let x = 1;</code></pre>\n"
    );
    Ok(())
}

#[test]
fn indented_code_block() -> Result<()> {
    assert_eq!(
        to_html("    let x;\n")?,
        "<pre><code>let x;</code></pre>\n"
    );
    Ok(())
}

#[test]
fn setext_heading() -> Result<()> {
    assert_eq!(to_html("Title\n=====\n")?, "<h1 id=\"title\">Title</h1>\n");
    Ok(())
}

#[test]
fn nested_blockquote_and_list() -> Result<()> {
    let html = to_html("> - a\n> - b\n")?;
    assert!(html.starts_with("<blockquote>\n<ul>\n<li>a</li>"));
    Ok(())
}

#[test]
fn escaped_characters_stay_literal() -> Result<()> {
    assert_eq!(to_html("\\*not em\\*")?, "<p>*not em*</p>\n");
    Ok(())
}

#[test]
fn codespan_shields_markup() -> Result<()> {
    assert_eq!(
        to_html("`<b>*x*</b>`")?,
        "<p><code>&lt;b&gt;*x*&lt;/b&gt;</code></p>\n"
    );
    Ok(())
}

struct BareHeadings;

impl Renderer for BareHeadings {
    fn heading(
        &self,
        text: &str,
        level: u8,
        _raw: &str,
        _slugger: &mut marq::Slugger,
        _options: &Options,
    ) -> String {
        format!("<h{level}>{text}</h{level}>\n")
    }
}

#[test]
fn custom_renderer_overrides_one_method() -> Result<()> {
    let mut tokens = marq::Lexer::new(Options::default()).lex("# T\n\npara\n")?;
    let mut parser = marq::Parser::with_renderer(Options::default(), Arc::new(BareHeadings));
    let html = parser.parse(&mut tokens, true)?;
    assert_eq!(html, "<h1>T</h1>\n<p>para</p>\n");
    Ok(())
}

#[test]
fn renderer_carried_by_options() -> Result<()> {
    let options = Options::builder().renderer(Arc::new(BareHeadings)).build();
    let html = to_html_with("# T\n\npara\n", &options)?;
    assert_eq!(html, "<h1>T</h1>\n<p>para</p>\n");
    Ok(())
}

struct NoCodespans;

impl marq::Tokenizer for NoCodespans {
    fn codespan(&self, _src: &str) -> Option<marq::Token> {
        None
    }
}

#[test]
fn tokenizer_carried_by_options() -> Result<()> {
    let options = Options::builder().tokenizer(Arc::new(NoCodespans)).build();
    let html = to_html_with("`x`", &options)?;
    assert_eq!(html, "<p>`x`</p>\n");
    Ok(())
}

#[test]
fn pedantic_mode_skips_fences() -> Result<()> {
    let options = Options::builder().pedantic(true).build();
    let html = to_html_with("```\ncode\n```\n", &options)?;
    assert!(!html.contains("<pre>"));
    Ok(())
}

#[test]
fn smartypants_educates_quotes() -> Result<()> {
    let options = Options::builder().smartypants(true).build();
    let html = to_html_with("\"quote\" -- dash...", &options)?;
    assert!(html.contains("\u{201c}quote\u{201d}"));
    assert!(html.contains("\u{2013}"));
    assert!(html.contains("\u{2026}"));
    Ok(())
}
