//! Block-level HTML emission with source-line anchors.
//!
//! Every block element reads the per-call [`LineCycle`] after its children have
//! been written, so nested elements are numbered before their containers
//! (`li` 1, `li` 2, then `ul` 3). Inline content and blocks without an anchor
//! are delegated to comrak's own formatter.

use comrak::{
    format_html,
    nodes::{AstNode, ListType, NodeValue},
    options::Options,
};
use syntect::{html::ClassStyle, parsing::SyntaxSet};

use crate::{
    application::render::types::{DIAGRAM_CLASS, DIAGRAM_SOURCE_ATTR, LINE_ATTR, RenderError},
    util::encoding::{encode_uri_component, escape_html},
};

use super::highlight::highlight_code;

const DIAGRAM_LANGUAGE: &str = "mermaid";
const FALLBACK_LANGUAGE: &str = "text";

/// Line counter scoped to a single render call. Starts at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LineCycle {
    current: u32,
}

impl Default for LineCycle {
    fn default() -> Self {
        Self { current: 1 }
    }
}

impl LineCycle {
    /// Read the current line and advance by one.
    pub(crate) fn advance(&mut self) -> u32 {
        self.advance_by(1)
    }

    /// Read the current line and advance by `span` lines (at least one).
    pub(crate) fn advance_by(&mut self, span: u32) -> u32 {
        let line = self.current;
        self.current = self.current.saturating_add(span.max(1));
        line
    }
}

#[derive(Debug, Default)]
pub(crate) struct BlockOutcome {
    pub(crate) html: String,
    pub(crate) contains_code: bool,
    pub(crate) diagram_count: u32,
}

/// Dispatch table entry for a block node.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BlockKind {
    Heading { level: u8 },
    Paragraph { tight: bool },
    List { ordered: bool, start: usize },
    Item,
    TaskItem { checked: bool },
    BlockQuote,
    Table,
    TableRow { header: bool },
    ThematicBreak,
    CodeBlock { info: String, literal: String },
    Container,
    Passthrough,
}

impl BlockKind {
    fn of(node: &AstNode<'_>) -> Self {
        let data = node.data.borrow();
        match &data.value {
            NodeValue::Document => BlockKind::Container,
            NodeValue::Heading(heading) => BlockKind::Heading {
                level: heading.level,
            },
            NodeValue::Paragraph => BlockKind::Paragraph {
                tight: in_tight_list(node),
            },
            NodeValue::List(list) => BlockKind::List {
                ordered: matches!(list.list_type, ListType::Ordered),
                start: list.start,
            },
            NodeValue::Item(_) => BlockKind::Item,
            NodeValue::TaskItem(task) => BlockKind::TaskItem {
                checked: task.symbol.is_some(),
            },
            NodeValue::BlockQuote => BlockKind::BlockQuote,
            NodeValue::Table(_) => BlockKind::Table,
            NodeValue::TableRow(header) => BlockKind::TableRow { header: *header },
            NodeValue::ThematicBreak => BlockKind::ThematicBreak,
            NodeValue::CodeBlock(block) => BlockKind::CodeBlock {
                info: block.info.clone(),
                literal: block.literal.clone(),
            },
            _ => BlockKind::Passthrough,
        }
    }
}

fn in_tight_list(paragraph: &AstNode<'_>) -> bool {
    let Some(list) = paragraph.parent().and_then(|item| item.parent()) else {
        return false;
    };
    let data = list.data.borrow();
    matches!(&data.value, NodeValue::List(list) if list.tight)
}

pub(crate) fn write_document<'a>(
    root: &'a AstNode<'a>,
    options: &Options<'static>,
    syntax_set: &SyntaxSet,
    class_style: &ClassStyle,
) -> Result<BlockOutcome, RenderError> {
    let mut writer = BlockWriter {
        options,
        syntax_set,
        class_style,
        cycle: LineCycle::default(),
        contains_code: false,
        diagram_count: 0,
    };

    let mut html = String::new();
    writer.write_block(root, &mut html)?;

    Ok(BlockOutcome {
        html,
        contains_code: writer.contains_code,
        diagram_count: writer.diagram_count,
    })
}

struct BlockWriter<'o> {
    options: &'o Options<'static>,
    syntax_set: &'o SyntaxSet,
    class_style: &'o ClassStyle,
    cycle: LineCycle,
    contains_code: bool,
    diagram_count: u32,
}

impl BlockWriter<'_> {
    fn write_block<'a>(
        &mut self,
        node: &'a AstNode<'a>,
        out: &mut String,
    ) -> Result<(), RenderError> {
        match BlockKind::of(node) {
            BlockKind::Container => self.write_children(node, out)?,
            BlockKind::Heading { level } => {
                let inline = self.inline(node)?;
                let line = self.cycle.advance();
                cr(out);
                out.push_str(&format!("<h{level} {LINE_ATTR}=\"{line}\">{inline}</h{level}>\n"));
            }
            BlockKind::Paragraph { tight: true } => {
                out.push_str(&self.inline(node)?);
            }
            BlockKind::Paragraph { tight: false } => {
                let inline = self.inline(node)?;
                let line = self.cycle.advance();
                cr(out);
                out.push_str(&format!("<p {LINE_ATTR}=\"{line}\">{inline}</p>\n"));
            }
            BlockKind::List { ordered, start } => {
                let mut body = String::new();
                self.write_children(node, &mut body)?;
                let line = self.cycle.advance();
                let open = match (ordered, start) {
                    (false, _) => "<ul".to_string(),
                    (true, 1) => "<ol".to_string(),
                    (true, start) => format!("<ol start=\"{start}\""),
                };
                let tag = if ordered { "ol" } else { "ul" };
                cr(out);
                out.push_str(&format!("{open} {LINE_ATTR}=\"{line}\">\n{body}</{tag}>\n"));
            }
            BlockKind::Item => {
                let mut body = String::new();
                self.write_children(node, &mut body)?;
                let line = self.cycle.advance();
                cr(out);
                out.push_str(&format!("<li {LINE_ATTR}=\"{line}\">{body}</li>\n"));
            }
            BlockKind::TaskItem { checked } => {
                let mut body = String::new();
                self.write_children(node, &mut body)?;
                let line = self.cycle.advance();
                let checked = if checked { " checked=\"\"" } else { "" };
                cr(out);
                out.push_str(&format!(
                    "<li {LINE_ATTR}=\"{line}\"><input type=\"checkbox\"{checked} disabled=\"\" /> {body}</li>\n"
                ));
            }
            BlockKind::BlockQuote => {
                let mut body = String::new();
                self.write_children(node, &mut body)?;
                let line = self.cycle.advance();
                cr(out);
                out.push_str(&format!(
                    "<blockquote {LINE_ATTR}=\"{line}\">\n{body}</blockquote>\n"
                ));
            }
            BlockKind::Table => self.write_table(node, out)?,
            BlockKind::TableRow { .. } => self.write_row(node, out)?,
            BlockKind::ThematicBreak => {
                let line = self.cycle.advance();
                cr(out);
                out.push_str(&format!("<hr {LINE_ATTR}=\"{line}\" />\n"));
            }
            BlockKind::CodeBlock { info, literal } => self.write_code(&info, &literal, out),
            BlockKind::Passthrough => {
                cr(out);
                self.format(node, out)?;
            }
        }

        Ok(())
    }

    fn write_children<'a>(
        &mut self,
        node: &'a AstNode<'a>,
        out: &mut String,
    ) -> Result<(), RenderError> {
        let mut child = node.first_child();
        while let Some(next) = child {
            self.write_block(next, out)?;
            child = next.next_sibling();
        }
        Ok(())
    }

    fn write_table<'a>(
        &mut self,
        node: &'a AstNode<'a>,
        out: &mut String,
    ) -> Result<(), RenderError> {
        let mut header = String::new();
        let mut body = String::new();

        let mut child = node.first_child();
        while let Some(row) = child {
            match BlockKind::of(row) {
                BlockKind::TableRow { header: true } => self.write_row(row, &mut header)?,
                _ => self.write_row(row, &mut body)?,
            }
            child = row.next_sibling();
        }

        let line = self.cycle.advance();
        cr(out);
        out.push_str(&format!(
            "<table {LINE_ATTR}=\"{line}\"><thead>{header}</thead><tbody>{body}</tbody></table>\n"
        ));
        Ok(())
    }

    fn write_row<'a>(
        &mut self,
        node: &'a AstNode<'a>,
        out: &mut String,
    ) -> Result<(), RenderError> {
        let mut cells = String::new();
        let mut child = node.first_child();
        while let Some(cell) = child {
            self.format(cell, &mut cells)?;
            child = cell.next_sibling();
        }

        let line = self.cycle.advance();
        out.push_str(&format!("<tr {LINE_ATTR}=\"{line}\">{cells}</tr>"));
        Ok(())
    }

    fn write_code(&mut self, info: &str, literal: &str, out: &mut String) {
        let code = literal.strip_suffix('\n').unwrap_or(literal);
        let span = u32::try_from(code.split('\n').count()).unwrap_or(u32::MAX);
        let line = self.cycle.advance_by(span);
        let language = info.split_whitespace().next().filter(|lang| !lang.is_empty());

        cr(out);
        if language == Some(DIAGRAM_LANGUAGE) {
            self.diagram_count = self.diagram_count.saturating_add(1);
            out.push_str(&format!(
                "<div class=\"{DIAGRAM_CLASS}\" {DIAGRAM_SOURCE_ATTR}=\"{}\" {LINE_ATTR}=\"{line}\"></div>\n",
                encode_uri_component(code.trim())
            ));
            return;
        }

        self.contains_code = true;
        let highlighted = highlight_code(language, code, self.syntax_set, self.class_style);
        let language_class = escape_html(language.unwrap_or(FALLBACK_LANGUAGE));
        out.push_str(&format!(
            "<pre {LINE_ATTR}=\"{line}\"><code class=\"hljs language-{language_class}\">{highlighted}</code></pre>\n"
        ));
    }

    fn inline<'a>(&self, node: &'a AstNode<'a>) -> Result<String, RenderError> {
        let mut html = String::new();
        let mut child = node.first_child();
        while let Some(next) = child {
            self.format(next, &mut html)?;
            child = next.next_sibling();
        }
        Ok(html)
    }

    fn format<'a>(&self, node: &'a AstNode<'a>, out: &mut String) -> Result<(), RenderError> {
        format_html(node, self.options, out).map_err(|err| RenderError::Markdown {
            message: err.to_string(),
        })
    }
}

fn cr(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}
