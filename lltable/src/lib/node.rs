#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use llgrammar::{PIdx, PartialProd, RIdx, Symbol, TIdx};

/// An index into a [`ParseTable`](struct.ParseTable.html)'s node arena.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NdIdx(pub(crate) u32);

impl From<NdIdx> for usize {
    fn from(ndidx: NdIdx) -> usize {
        ndidx.0 as usize
    }
}

impl From<usize> for NdIdx {
    fn from(v: usize) -> NdIdx {
        if v > u32::MAX as usize {
            panic!("Overflow");
        }
        NdIdx(v as u32)
    }
}

/// A node in a rule's decision tree. Leaves commit to a production window; interior nodes
/// narrow down a candidate set using one token of lookahead or, in the worst case, a
/// speculative parse of a discriminator rule.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ParserNode<StorageT> {
    /// Parse rule `RIdx` by evaluating its decision tree.
    Symbol(RIdx<StorageT>),
    /// Commit: parse the symbols of this production window.
    Prod(PartialProd<StorageT>),
    /// All remaining candidates start with the same `symbols`: parse them, then continue with
    /// `rest`, whose candidates are the same windows advanced past the prefix.
    Prefix {
        symbols: Vec<Symbol<StorageT>>,
        rest: NdIdx,
    },
    /// Dispatch on the next unconsumed token. A token with no arm is a parse error.
    TokenLookahead {
        arms: Vec<(TIdx<StorageT>, NdIdx)>,
    },
    /// One token of lookahead was not enough. After seeing `tidx`, speculatively parse the
    /// discriminator rule `disc`; whichever of `disc`'s productions the speculation applies at
    /// the top level selects the window to really parse.
    GrammarLookahead {
        tidx: TIdx<StorageT>,
        disc: RIdx<StorageT>,
        arms: Vec<(PIdx<StorageT>, PartialProd<StorageT>)>,
    },
    /// Evaluate `inner` (a committed parse, not a speculation) and dispatch on the production
    /// it applied at the top level.
    MapResult {
        inner: NdIdx,
        arms: Vec<(PIdx<StorageT>, NdIdx)>,
    },
}
