#![allow(clippy::cognitive_complexity)]
#![allow(clippy::too_many_arguments)]

//! Build generalized LL parse tables from [llgrammar](../llgrammar/index.html) grammars. The
//! table for a grammar is a forest of decision trees, one per rule: each tree spells out, for a
//! set of candidate productions, how a parser should choose between them using one token of
//! lookahead, falling back to speculative parsing of a synthesized *discriminator* rule when a
//! single token is not enough.
//!
//! Before the trees are built the grammar is rewritten in place: single-use alias rules are
//! inlined, and simple direct left recursion is eliminated (left- or right-associatively, as
//! each production requests). Indirect and hidden left recursion are reported as errors.
//! Rewriting only ever grows the grammar's production storage, so productions are tracked back
//! to the ones the caller defined through an *origins* table which the parser uses to report
//! the caller's rules, not the rewritten ones.

use std::{error::Error, fmt};

use llgrammar::{Grammar, PIdx, Symbol};
use num_traits::{AsPrimitive, PrimInt, Unsigned};

mod builder;
mod node;
mod rewrite;

pub use crate::builder::ParseTable;
pub use crate::node::{NdIdx, ParserNode};

/// An override for one ambiguity: when the builder cannot choose between productions at the
/// context whose path ends with `path_suffix`, prefer candidates descending from the
/// caller-defined production `pidx`.
#[derive(Clone, Debug)]
pub struct AmbiguityOverride<StorageT> {
    /// A suffix of a context path. A context path names a choice point: the rule the choice is
    /// for, then the lookahead tokens of each enclosing speculation, innermost last.
    pub path_suffix: Vec<Symbol<StorageT>>,
    /// The production to prefer, as defined by the caller before rewriting.
    pub pidx: PIdx<StorageT>,
}

/// The various different possible table construction errors.
#[derive(Debug, Eq, PartialEq)]
pub enum TableErrorKind<StorageT> {
    /// A rule is left-recursive through one or more other rules. The chain holds the
    /// productions walked from the rule back to itself.
    IndirectLeftRecursion {
        rule: String,
        chain: Vec<PIdx<StorageT>>,
    },
    /// A rule recurses into itself behind a nullable prefix.
    HiddenLeftRecursion {
        rule: String,
        chain: Vec<PIdx<StorageT>>,
    },
    /// Every production of a left-recursive rule is left-recursive, so the rule derives no
    /// finite sentence.
    UnterminatingRecursion { rule: String },
    /// No combination of lookahead token, discriminator and override could decide between the
    /// named rules' productions.
    UnresolvableAmbiguity {
        rule: String,
        token: String,
        rules: Vec<String>,
    },
    /// Discriminator synthesis failed to make progress for a rule/token pair.
    ParsingCycle { rule: String, token: String },
    /// Two overrides with equally long path suffixes matched the same choice point.
    AmbiguousOverride { rule: String, token: String },
}

/// Any error from parse table construction returns an instance of this struct.
#[derive(Debug, Eq, PartialEq)]
pub struct TableError<StorageT> {
    pub kind: TableErrorKind<StorageT>,
}

impl<StorageT: fmt::Debug> Error for TableError<StorageT> {}

impl<StorageT> fmt::Display for TableError<StorageT> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            TableErrorKind::IndirectLeftRecursion { rule, .. } => {
                write!(f, "Rule '{}' is indirectly left-recursive", rule)
            }
            TableErrorKind::HiddenLeftRecursion { rule, .. } => write!(
                f,
                "Rule '{}' is left-recursive behind a nullable prefix",
                rule
            ),
            TableErrorKind::UnterminatingRecursion { rule } => write!(
                f,
                "Rule '{}' has no non-recursive production",
                rule
            ),
            TableErrorKind::UnresolvableAmbiguity { rule, token, rules } => write!(
                f,
                "Rule '{}' is ambiguous on token '{}' between: {}",
                rule,
                token,
                rules.join(", ")
            ),
            TableErrorKind::ParsingCycle { rule, token } => write!(
                f,
                "Lookahead for rule '{}' on token '{}' cannot make progress",
                rule, token
            ),
            TableErrorKind::AmbiguousOverride { rule, token } => write!(
                f,
                "Multiple overrides match the ambiguity in rule '{}' on token '{}'",
                rule, token
            ),
        }
    }
}

/// Build a parse table from `grm`, consuming it. The rewritten grammar can be retrieved from
/// the table afterwards.
pub fn from_grammar<StorageT: 'static + fmt::Debug + std::hash::Hash + PrimInt + Unsigned>(
    grm: Grammar<StorageT>,
) -> Result<ParseTable<StorageT>, TableError<StorageT>>
where
    usize: AsPrimitive<StorageT>,
{
    from_grammar_with_overrides(grm, Vec::new())
}

/// As [`from_grammar`](fn.from_grammar.html), additionally resolving ambiguities the builder
/// cannot decide itself with `overrides`.
pub fn from_grammar_with_overrides<
    StorageT: 'static + fmt::Debug + std::hash::Hash + PrimInt + Unsigned,
>(
    grm: Grammar<StorageT>,
    overrides: Vec<AmbiguityOverride<StorageT>>,
) -> Result<ParseTable<StorageT>, TableError<StorageT>>
where
    usize: AsPrimitive<StorageT>,
{
    builder::build(grm, overrides)
}
