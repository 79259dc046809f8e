#![allow(clippy::new_without_default)]
#![allow(clippy::upper_case_acronyms)]

//! A library for building and analysing Context Free Grammars destined for generalized LL
//! parsing. Grammars are handed over as in-memory rule sets (there is no textual input format):
//! callers intern tokens and rules through a [`GrammarBuilder`](grammar/struct.GrammarBuilder.html)
//! and then hand the resulting [`Grammar`](grammar/struct.Grammar.html) to a table builder.
//!
//! CFG terminology is something of a mess, so this library follows some basic guidelines:
//!
//!   * A *token* (a terminal) is the name of a syntactic element.
//!   * A *production* is an ordered sequence of *symbols* (tokens or rules).
//!   * A *rule* (a non-terminal) maps a name to one or more productions; the order of a rule's
//!     productions encodes their priority.
//!
//! For example, in the grammar:
//!
//!   R1: "a" "b" | R2;
//!   R2: "c";
//!
//! the following statements are true:
//!
//!   * There are 3 productions. 1: ["a", "b"] 2: ["R2"] 3: ["c"]
//!   * There are two rules: R1 and R2. The mapping to productions is {R1: {1, 2}, R2: {3}}
//!   * There are three tokens: a, b, and c.
//!
//! llgrammar makes the following guarantees about grammars:
//!
//!   * Productions are numbered from `0` to `prods_len() - 1` (inclusive) and production storage
//!     only ever grows, so a `PIdx` stays valid for the lifetime of the grammar even after the
//!     grammar has been rewritten.
//!   * Rules are numbered from `0` to `rules_len() - 1` (inclusive).
//!   * Tokens are numbered from `0` to `tokens_len() - 1` (inclusive); the EOF token is always
//!     present and always last at build time.
//!   * Two symbols are the same symbol iff their indices are equal: names are display metadata
//!     and two distinct symbols may share a name.
//!   * The `StorageT` type used to store production, rule, and token indices can be infallibly
//!     converted into `usize` (see [`TIdx`](struct.TIdx.html) and friends for more details).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

mod firsts;
mod follows;
pub mod grammar;
mod idxnewtype;

pub use crate::firsts::Firsts;
pub use crate::follows::Follows;
pub use crate::grammar::{
    Grammar, GrammarBuilder, GrammarError, GrammarErrorKind, PartialProd, ProdExtras, VarAction,
};
pub use crate::idxnewtype::{PIdx, RIdx, SIdx, TIdx};

#[derive(Clone, Copy, Debug, Hash, Eq, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Symbol<StorageT> {
    Rule(RIdx<StorageT>),
    Token(TIdx<StorageT>),
}
