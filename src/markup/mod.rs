//! Message markup parsing.
//!
//! Converts a flat text buffer into a tree of typed block and inline
//! elements for a rendering layer to consume:
//!
//! ```text
//! raw text --> MarkdownParser --> [BlockNode]
//!                  |  (per block)
//!                  v
//!            InlineFormatter --> [InlineSegment]
//! ```
//!
//! Only a fixed markdown subset is recognized (headers, code fences,
//! quotes, lists, tables, horizontal rules, paragraphs; bold, italic,
//! strikethrough, inline code, links). Not a CommonMark implementation.
//! Parsing is pure and synchronous; parsers can be shared freely.

mod block;
mod inline;

pub use block::{BlockNode, ListItem, MarkdownParser};
pub use inline::{InlineFormatter, InlineSegment};
