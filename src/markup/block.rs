//! Block-level parsing of message text.
//!
//! Groups lines into block elements with a first-match-wins rule cascade:
//!
//! ```text
//! code fence -> header -> horizontal rule -> block quote
//!     -> unordered list -> ordered list -> table -> paragraph -> blank
//! ```
//!
//! Parsing never fails. Malformed or unterminated constructs (unclosed
//! fences, ambiguous tables) degrade to a best-effort block instead of
//! raising an error.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::markup::inline::{InlineFormatter, InlineSegment};

/// One structural unit of a parsed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockNode {
    Header {
        level: u8,
        content: Vec<InlineSegment>,
    },
    /// Fenced code. Inline formatting is never applied to the body.
    CodeBlock {
        language: String,
        code: String,
    },
    HorizontalRule,
    /// Quote content keeps its internal newlines as `LineBreak` segments.
    BlockQuote {
        content: Vec<InlineSegment>,
    },
    List {
        ordered: bool,
        items: Vec<ListItem>,
    },
    Table {
        header: Vec<Vec<InlineSegment>>,
        rows: Vec<Vec<Vec<InlineSegment>>>,
    },
    Paragraph {
        content: Vec<InlineSegment>,
    },
}

/// One list entry with its leading-whitespace depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    pub indent: usize,
    pub content: Vec<InlineSegment>,
}

/// Parses message text into block nodes.
///
/// Owns a compiled [`InlineFormatter`] for the per-block inline pass.
/// Stateless between calls; safe to share across tasks.
pub struct MarkdownParser {
    formatter: InlineFormatter,
    unordered_item: Regex,
    ordered_item: Regex,
    ordered_marker: Regex,
}

impl MarkdownParser {
    pub fn new() -> Self {
        Self {
            formatter: InlineFormatter::new(),
            unordered_item: Regex::new(r"^(\s*)[-*+]\s(.*)$").expect("valid unordered regex"),
            ordered_item: Regex::new(r"^(\s*)\d+\.\s(.*)$").expect("valid ordered regex"),
            ordered_marker: Regex::new(r"^\d+\.\s").expect("valid ordered marker regex"),
        }
    }

    /// Access the inline formatter for callers that only need inline runs.
    pub fn inline(&self) -> &InlineFormatter {
        &self.formatter
    }

    /// Parse a full text buffer into an ordered sequence of block nodes.
    pub fn parse(&self, text: &str) -> Vec<BlockNode> {
        let normalized = self.formatter.normalize_breaks(text);
        let lines: Vec<&str> = normalized.split('\n').collect();
        let mut blocks = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];

            // Code fence. Consumed verbatim until the closing fence, or
            // through end of input when unterminated.
            if line.starts_with("```") {
                let language = line[3..].trim().to_string();
                let mut code_lines = Vec::new();
                i += 1;
                while i < lines.len() && !lines[i].starts_with("```") {
                    code_lines.push(lines[i]);
                    i += 1;
                }
                i += 1; // Skip the closing fence if present.
                blocks.push(BlockNode::CodeBlock {
                    language,
                    code: code_lines.join("\n"),
                });
                continue;
            }

            // Header. Level is the count of leading '#', clamped to 6.
            if line.starts_with('#') {
                let count = line.chars().take_while(|&c| c == '#').count();
                let after = &line[count..];
                let text = after.strip_prefix(' ').unwrap_or(after);
                blocks.push(BlockNode::Header {
                    level: count.min(6) as u8,
                    content: self.formatter.format(text),
                });
                i += 1;
                continue;
            }

            // Horizontal rule: three or more dashes and nothing else.
            if line.len() >= 3 && line.bytes().all(|b| b == b'-') {
                blocks.push(BlockNode::HorizontalRule);
                i += 1;
                continue;
            }

            // Block quote. Blank lines inside the quote are kept as empty
            // lines, not treated as a terminator.
            if line.starts_with("> ") {
                let mut quote_lines = Vec::new();
                while i < lines.len()
                    && (lines[i].starts_with("> ") || lines[i].trim().is_empty())
                {
                    if lines[i].starts_with("> ") {
                        quote_lines.push(&lines[i][2..]);
                    } else {
                        quote_lines.push("");
                    }
                    i += 1;
                }
                blocks.push(BlockNode::BlockQuote {
                    content: self.formatter.format(&quote_lines.join("\n")),
                });
                continue;
            }

            // Unordered list.
            if self.unordered_item.is_match(line) {
                let items = self.consume_list(&lines, &mut i, &self.unordered_item);
                blocks.push(BlockNode::List {
                    ordered: false,
                    items,
                });
                continue;
            }

            // Ordered list.
            if self.ordered_item.is_match(line) {
                let items = self.consume_list(&lines, &mut i, &self.ordered_item);
                blocks.push(BlockNode::List {
                    ordered: true,
                    items,
                });
                continue;
            }

            // Table: a '|' line whose successor contains both '|' and '-'.
            if line.contains('|')
                && i + 1 < lines.len()
                && lines[i + 1].contains('|')
                && lines[i + 1].contains('-')
            {
                let header = self.split_cells(line);
                i += 2; // Skip the separator row.

                let mut rows = Vec::new();
                while i < lines.len() && lines[i].contains('|') {
                    let cells = self.split_cells(lines[i]);
                    if !cells.is_empty() {
                        rows.push(cells);
                    }
                    i += 1;
                }
                blocks.push(BlockNode::Table { header, rows });
                continue;
            }

            // Paragraph: any other non-blank line, reflowed with following
            // continuation lines joined by a single space.
            if !line.trim().is_empty() {
                let mut paragraph_lines = vec![line];
                i += 1;
                while i < lines.len() && self.continues_paragraph(lines[i]) {
                    paragraph_lines.push(lines[i]);
                    i += 1;
                }
                blocks.push(BlockNode::Paragraph {
                    content: self.formatter.format(&paragraph_lines.join(" ")),
                });
                continue;
            }

            // Blank line: emits nothing.
            i += 1;
        }

        blocks
    }

    /// Consume consecutive list item lines matching `item_regex`.
    fn consume_list(&self, lines: &[&str], i: &mut usize, item_regex: &Regex) -> Vec<ListItem> {
        let mut items = Vec::new();
        while *i < lines.len() {
            let Some(caps) = item_regex.captures(lines[*i]) else {
                break;
            };
            items.push(ListItem {
                indent: caps[1].len(),
                content: self.formatter.format(&caps[2]),
            });
            *i += 1;
        }
        items
    }

    /// Split a table line into trimmed, non-empty, inline-formatted cells.
    fn split_cells(&self, line: &str) -> Vec<Vec<InlineSegment>> {
        line.split('|')
            .map(str::trim)
            .filter(|cell| !cell.is_empty())
            .map(|cell| self.formatter.format(cell))
            .collect()
    }

    /// Whether a line extends the current paragraph.
    fn continues_paragraph(&self, line: &str) -> bool {
        !line.trim().is_empty()
            && !line.starts_with('#')
            && !line.starts_with("```")
            && !line.starts_with("- ")
            && !line.starts_with("* ")
            && !line.starts_with("+ ")
            && !self.ordered_marker.is_match(line)
            && !line.starts_with("> ")
            && !line.contains('|')
    }
}

impl Default for MarkdownParser {
    fn default() -> Self {
        Self::new()
    }
}
