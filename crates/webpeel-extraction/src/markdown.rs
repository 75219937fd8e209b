//! HTML to markdown conversion.
//!
//! A deterministic walk over the parsed DOM: the same input HTML always
//! produces byte-identical markdown. Headings, lists, fenced code blocks,
//! emphasis, tables, blockquotes and inline links/images are preserved;
//! scripts, styles and other non-content nodes are dropped.

use once_cell::sync::Lazy;
use regex::Regex;
use ego_tree::NodeRef;
use scraper::{Html, Node};

/// Convert an HTML document or fragment to markdown.
pub fn html_to_markdown(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut r = Renderer::default();
    r.render_children(doc.tree.root(), &Ctx::default());
    collapse_blank_runs(r.out.trim())
}

#[derive(Debug, Clone, Default)]
struct Ctx {
    in_pre: bool,
    list_depth: usize,
}

#[derive(Default)]
struct Renderer {
    out: String,
}

impl Renderer {
    /// Ensure the output ends on a blank line before a new block.
    fn break_block(&mut self) {
        if self.out.is_empty() {
            return;
        }
        while self.out.ends_with(' ') {
            self.out.pop();
        }
        if !self.out.ends_with("\n\n") {
            if self.out.ends_with('\n') {
                self.out.push('\n');
            } else {
                self.out.push_str("\n\n");
            }
        }
    }

    fn push_text(&mut self, text: &str, ctx: &Ctx) {
        if ctx.in_pre {
            self.out.push_str(text);
            return;
        }
        let collapsed = collapse_ws(text);
        if collapsed.is_empty() {
            // Whitespace-only node still separates words.
            if !text.is_empty()
                && !self.out.is_empty()
                && !self.out.ends_with(char::is_whitespace)
            {
                self.out.push(' ');
            }
            return;
        }
        if collapsed.starts_with(' ')
            && (self.out.is_empty() || self.out.ends_with(char::is_whitespace))
        {
            self.out.push_str(collapsed.trim_start());
        } else {
            self.out.push_str(&collapsed);
        }
    }

    fn render_children(&mut self, node: NodeRef<'_, Node>, ctx: &Ctx) {
        for child in node.children() {
            self.render_node(child, ctx);
        }
    }

    fn render_node(&mut self, node: NodeRef<'_, Node>, ctx: &Ctx) {
        match node.value() {
            Node::Text(text) => self.push_text(&text.text, ctx),
            Node::Element(el) => {
                let name = el.name();
                match name {
                    "script" | "style" | "noscript" | "template" | "head" | "svg" | "iframe" => {}
                    "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                        let level = name.as_bytes()[1] - b'0';
                        self.break_block();
                        self.out.push_str(&"#".repeat(level as usize));
                        self.out.push(' ');
                        self.out.push_str(&inline_of(node));
                        self.break_block();
                    }
                    "p" => {
                        self.break_block();
                        self.render_children(node, ctx);
                        self.break_block();
                    }
                    "br" => self.out.push('\n'),
                    "hr" => {
                        self.break_block();
                        self.out.push_str("---");
                        self.break_block();
                    }
                    "pre" => {
                        self.break_block();
                        let lang = code_language(node).unwrap_or_default();
                        let body = raw_text_of(node);
                        self.out.push_str("```");
                        self.out.push_str(&lang);
                        self.out.push('\n');
                        self.out.push_str(body.trim_end_matches('\n'));
                        self.out.push_str("\n```");
                        self.break_block();
                    }
                    "code" => {
                        self.out.push('`');
                        self.out.push_str(&raw_text_of(node));
                        self.out.push('`');
                    }
                    "strong" | "b" => {
                        let inner = inline_of(node);
                        if !inner.is_empty() {
                            self.out.push_str("**");
                            self.out.push_str(&inner);
                            self.out.push_str("**");
                        }
                    }
                    "em" | "i" => {
                        let inner = inline_of(node);
                        if !inner.is_empty() {
                            self.out.push('*');
                            self.out.push_str(&inner);
                            self.out.push('*');
                        }
                    }
                    "a" => {
                        let inner = inline_of(node);
                        match el.attr("href") {
                            Some(href) if !href.is_empty() => {
                                self.out.push('[');
                                self.out.push_str(&inner);
                                self.out.push_str("](");
                                self.out.push_str(href);
                                self.out.push(')');
                            }
                            _ => self.out.push_str(&inner),
                        }
                    }
                    "img" => {
                        let src = el.attr("src").unwrap_or("");
                        if !src.is_empty() {
                            let alt = el.attr("alt").unwrap_or("");
                            self.out.push_str("![");
                            self.out.push_str(&collapse_ws(alt));
                            self.out.push_str("](");
                            self.out.push_str(src);
                            self.out.push(')');
                        }
                    }
                    "ul" | "ol" => {
                        if ctx.list_depth == 0 {
                            self.break_block();
                        } else if !self.out.ends_with('\n') {
                            self.out.push('\n');
                        }
                        self.render_list(node, ctx, name == "ol");
                        if ctx.list_depth == 0 {
                            self.break_block();
                        }
                    }
                    "blockquote" => {
                        self.break_block();
                        let mut inner = Renderer::default();
                        inner.render_children(node, ctx);
                        let body = collapse_blank_runs(inner.out.trim());
                        for (i, line) in body.lines().enumerate() {
                            if i > 0 {
                                self.out.push('\n');
                            }
                            self.out.push_str("> ");
                            self.out.push_str(line);
                        }
                        self.break_block();
                    }
                    "table" => {
                        self.break_block();
                        self.render_table(node);
                        self.break_block();
                    }
                    "div" | "section" | "article" | "main" | "header" | "footer" | "aside"
                    | "nav" | "figure" | "figcaption" | "details" | "summary" | "form"
                    | "fieldset" => {
                        self.break_block();
                        self.render_children(node, ctx);
                        self.break_block();
                    }
                    "li" | "dt" | "dd" => {
                        // Reached outside a list container; treat as block.
                        self.break_block();
                        self.render_children(node, ctx);
                        self.break_block();
                    }
                    _ => self.render_children(node, ctx),
                }
            }
            _ => self.render_children(node, ctx),
        }
    }

    fn render_list(&mut self, node: NodeRef<'_, Node>, ctx: &Ctx, ordered: bool) {
        let indent = "  ".repeat(ctx.list_depth);
        let item_ctx = Ctx {
            list_depth: ctx.list_depth + 1,
            ..ctx.clone()
        };
        let mut index = 0usize;
        for child in node.children() {
            let is_li = matches!(child.value(), Node::Element(el) if el.name() == "li");
            if !is_li {
                continue;
            }
            index += 1;
            let marker = if ordered {
                format!("{}. ", index)
            } else {
                "- ".to_string()
            };

            let mut inner = Renderer::default();
            inner.render_children(child, &item_ctx);
            let body = collapse_blank_runs(inner.out.trim());

            self.out.push_str(&indent);
            self.out.push_str(&marker);
            for (i, line) in body.lines().enumerate() {
                if i > 0 {
                    self.out.push('\n');
                    // Continuation lines align under the item text unless
                    // they are nested list markers that carry their own
                    // indentation.
                    if !line.trim_start().starts_with("- ")
                        && !starts_with_ordered_marker(line.trim_start())
                    {
                        self.out.push_str(&indent);
                        self.out.push_str(&" ".repeat(marker.len()));
                    }
                }
                self.out.push_str(line);
            }
            self.out.push('\n');
        }
    }

    fn render_table(&mut self, node: NodeRef<'_, Node>) {
        let mut rows: Vec<Vec<String>> = Vec::new();
        collect_rows(node, &mut rows);
        if rows.is_empty() {
            return;
        }
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        if width == 0 {
            return;
        }
        for row in &mut rows {
            row.resize(width, String::new());
        }

        let mut lines = Vec::with_capacity(rows.len() + 1);
        lines.push(format!("| {} |", rows[0].join(" | ")));
        lines.push(format!("|{}|", " --- |".repeat(width)));
        for row in &rows[1..] {
            lines.push(format!("| {} |", row.join(" | ")));
        }
        self.out.push_str(&lines.join("\n"));
    }
}

fn collect_rows(node: NodeRef<'_, Node>, rows: &mut Vec<Vec<String>>) {
    for child in node.children() {
        if let Node::Element(el) = child.value() {
            match el.name() {
                "tr" => {
                    let mut cells = Vec::new();
                    for cell in child.children() {
                        if let Node::Element(cell_el) = cell.value() {
                            if matches!(cell_el.name(), "td" | "th") {
                                cells.push(inline_of(cell).replace('|', "\\|"));
                            }
                        }
                    }
                    rows.push(cells);
                }
                "thead" | "tbody" | "tfoot" => collect_rows(child, rows),
                _ => {}
            }
        }
    }
}

/// Inline markdown of a node's children: emphasis, links and code kept,
/// block structure flattened to spaces.
fn inline_of(node: NodeRef<'_, Node>) -> String {
    let mut r = Renderer::default();
    r.render_children(
        node,
        &Ctx {
            in_pre: false,
            list_depth: 0,
        },
    );
    collapse_ws(&r.out.replace('\n', " ")).trim().to_string()
}

/// All descendant text, whitespace preserved. Used for code blocks.
fn raw_text_of(node: NodeRef<'_, Node>) -> String {
    let mut out = String::new();
    for child in node.descendants() {
        if let Node::Text(text) = child.value() {
            out.push_str(&text.text);
        }
    }
    out
}

/// Language hint from `<pre><code class="language-x">`.
fn code_language(pre: NodeRef<'_, Node>) -> Option<String> {
    for child in pre.descendants() {
        if let Node::Element(el) = child.value() {
            if el.name() == "code" {
                for class in el.classes() {
                    if let Some(lang) = class
                        .strip_prefix("language-")
                        .or_else(|| class.strip_prefix("lang-"))
                    {
                        return Some(lang.to_string());
                    }
                }
            }
        }
    }
    None
}

fn starts_with_ordered_marker(line: &str) -> bool {
    let digits: String = line.chars().take_while(|c| c.is_ascii_digit()).collect();
    !digits.is_empty() && line[digits.len()..].starts_with(". ")
}

static WS_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\r\n]+").unwrap());
static BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_ws(text: &str) -> String {
    WS_RUN.replace_all(text, " ").to_string()
}

fn collapse_blank_runs(text: &str) -> String {
    BLANK_RUN.replace_all(text, "\n\n").to_string()
}

static MD_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").unwrap());
static MD_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());
static MD_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s*").unwrap());
static MD_EMPHASIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\*{1,3}|`{1,3})").unwrap());
static MD_QUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^>\s?").unwrap());
static MD_TABLE_SEP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\|(\s*---\s*\|)+\s*$\n?").unwrap());

/// Flatten markdown to plain text: markers stripped, link and image
/// targets dropped in favor of their text.
pub fn markdown_to_text(markdown: &str) -> String {
    let text = MD_IMAGE.replace_all(markdown, "$1");
    let text = MD_LINK.replace_all(&text, "$1");
    let text = MD_HEADING.replace_all(&text, "");
    let text = MD_TABLE_SEP.replace_all(&text, "");
    let text = MD_QUOTE.replace_all(&text, "");
    let text = MD_EMPHASIS.replace_all(&text, "");
    let text = text.replace(" | ", "  ").replace("| ", "").replace(" |", "");
    collapse_blank_runs(text.trim())
}
