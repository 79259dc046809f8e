#![allow(clippy::type_complexity)]

//! Parse token streams against [lltable](../lltable/index.html) parse tables.
//!
//! The parser is a recursive-descent walk over a table's decision trees. As it goes it reports
//! every reduction to a [`ParseListener`](trait.ParseListener.html): one event per terminal
//! consumed and one per caller-defined rule applied, in left-to-right, bottom-up order, so a
//! listener can rebuild a parse tree by pushing a leaf per terminal and, per rule event,
//! popping as many nodes as the rule's production has symbols. [`TreeBuilder`](struct.TreeBuilder.html)
//! does exactly that, and [`parse_tree`](fn.parse_tree.html) wraps the whole dance.
//!
//! A table is immutable and can serve concurrent parses; each call to [`parse`](fn.parse.html)
//! owns its own cursors and parser variable stacks.

mod parser;

pub use crate::parser::{
    Node, ParseError, ParseErrorKind, ParseListener, TreeBuilder, parse, parse_tree,
};
