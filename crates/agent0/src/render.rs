//! Terminal rendering of assistant markdown.
//!
//! Uses comrak for CommonMark parsing and syntect for code highlighting,
//! emitting ANSI escapes instead of HTML. With color disabled the output
//! is plain wrapped text with indented code blocks.

use comrak::nodes::{AstNode, NodeValue};
use comrak::{parse_document, Arena, Options};
use once_cell::sync::Lazy;
use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxSet;
use syntect::util::{as_24_bit_terminal_escaped, LinesWithEndings};

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

const CODE_THEME: &str = "base16-ocean.dark";

const BOLD: &str = "\x1b[1m";
const ITALIC: &str = "\x1b[3m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Markdown-to-terminal renderer.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// Render one assistant turn for the terminal.
    pub fn render(&self, content: &str) -> String {
        let mut options = Options::default();
        options.extension.strikethrough = true;
        options.extension.table = true;
        options.extension.autolink = true;
        options.extension.tasklist = true;

        let arena = Arena::new();
        let root = parse_document(&arena, content, &options);

        let mut out = String::new();
        self.render_node(root, &mut out);
        out.trim_end().to_string()
    }

    fn render_children<'a>(&self, node: &'a AstNode<'a>, out: &mut String) {
        for child in node.children() {
            self.render_node(child, out);
        }
    }

    fn render_node<'a>(&self, node: &'a AstNode<'a>, out: &mut String) {
        match &node.data.borrow().value {
            NodeValue::Document => self.render_children(node, out),
            NodeValue::Paragraph => {
                self.render_children(node, out);
                out.push_str("\n\n");
            }
            NodeValue::Heading(_) => {
                self.styled(out, BOLD, |r, out| r.render_children(node, out));
                out.push_str("\n\n");
            }
            NodeValue::Text(text) => out.push_str(text),
            NodeValue::Strong => self.styled(out, BOLD, |r, out| r.render_children(node, out)),
            NodeValue::Emph => self.styled(out, ITALIC, |r, out| r.render_children(node, out)),
            NodeValue::Code(code) => {
                self.styled(out, DIM, |_, out| {
                    out.push('`');
                    out.push_str(&code.literal);
                    out.push('`');
                });
            }
            NodeValue::CodeBlock(block) => {
                out.push_str(&self.render_code_block(&block.info, &block.literal));
                out.push('\n');
            }
            NodeValue::SoftBreak | NodeValue::LineBreak => out.push('\n'),
            NodeValue::Item(_) => {
                out.push_str("- ");
                self.render_children(node, out);
            }
            NodeValue::Link(link) => {
                self.render_children(node, out);
                self.styled(out, DIM, |_, out| {
                    out.push_str(" (");
                    out.push_str(&link.url);
                    out.push(')');
                });
            }
            NodeValue::ThematicBreak => out.push_str("----\n\n"),
            _ => self.render_children(node, out),
        }
    }

    fn styled(
        &self,
        out: &mut String,
        style: &str,
        body: impl FnOnce(&Self, &mut String),
    ) {
        if self.color {
            out.push_str(style);
        }
        body(self, out);
        if self.color {
            out.push_str(RESET);
        }
    }

    fn render_code_block(&self, info: &str, code: &str) -> String {
        if !self.color {
            return code
                .lines()
                .map(|line| format!("    {line}\n"))
                .collect();
        }

        let syntax = SYNTAX_SET
            .find_syntax_by_token(info.trim())
            .unwrap_or_else(|| SYNTAX_SET.find_syntax_plain_text());
        let theme = &THEME_SET.themes[CODE_THEME];
        let mut highlighter = HighlightLines::new(syntax, theme);

        let mut out = String::new();
        for line in LinesWithEndings::from(code) {
            match highlighter.highlight_line(line, &SYNTAX_SET) {
                Ok(ranges) => out.push_str(&as_24_bit_terminal_escaped(&ranges, false)),
                Err(_) => out.push_str(line),
            }
        }
        out.push_str(RESET);
        out
    }
}
