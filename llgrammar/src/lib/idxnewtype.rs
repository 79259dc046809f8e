// Newtype wrappers for the various index spaces of a grammar. Each is a thin wrapper over the
// user's chosen storage type, so that (e.g.) a rule index can never be passed where a production
// index is expected.

use std::mem::size_of;

use num_traits::{PrimInt, ToPrimitive, Unsigned};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! idx_newtype {
    ($(#[$attr:meta])* $n: ident) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
        #[cfg_attr(feature="serde", derive(Serialize, Deserialize))]
        pub struct $n<T>(pub T);

        impl<T: PrimInt + Unsigned> From<$n<T>> for usize {
            fn from(idx: $n<T>) -> Self {
                debug_assert!(size_of::<usize>() >= size_of::<T>());
                idx.0.to_usize().unwrap()
            }
        }
    }
}

idx_newtype!(
    /// An index of a rule (non-terminal). Converting an `RIdx` to `usize` with
    /// `usize::from(x_ridx)` never loses precision.
    RIdx);
idx_newtype!(
    /// An index of a production. A rule `E::=A|B` has two productions, each with its own `PIdx`.
    /// Converting a `PIdx` to `usize` with `usize::from(x_pidx)` never loses precision.
    PIdx);
idx_newtype!(
    /// An offset of a symbol within a production. Converting an `SIdx` to `usize` with
    /// `usize::from(x_sidx)` never loses precision.
    SIdx);
idx_newtype!(
    /// An index of a token (terminal). Converting a `TIdx` to `usize` with `usize::from(x_tidx)`
    /// never loses precision.
    TIdx);
