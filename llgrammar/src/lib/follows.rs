use std::marker::PhantomData;

use num_traits::{AsPrimitive, PrimInt, Unsigned};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use vob::Vob;

use crate::{Firsts, Grammar, RIdx, Symbol, TIdx};

/// `Follows` stores all the FOLLOW sets for a given grammar. For example, given this code and
/// grammar:
/// ```text
///   let grm = /* some grammar */;
///   let follows = Follows::new(&grm);
/// ```
/// then the following invariant holds:
/// ```text
///   // If a rule's follow set contains a token idx, it's set in the bitfield
///   follows.is_set(ridx, tidx)
/// ```
/// The FOLLOW set of the start rule always contains the EOF token.
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Follows<StorageT> {
    // Each rule has a bitfield over all tokens, EOF included.
    follows: Vec<Vob>,
    phantom: PhantomData<StorageT>,
}

impl<StorageT: 'static + PrimInt + Unsigned> Follows<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Generates and returns the FOLLOW sets for the given grammar.
    pub fn new(grm: &Grammar<StorageT>, firsts: &Firsts<StorageT>) -> Self {
        let mut follows = Follows {
            follows: vec![
                Vob::from_elem(usize::from(grm.tokens_len()), false);
                usize::from(grm.rules_len())
            ],
            phantom: PhantomData,
        };
        follows.follows[usize::from(grm.start_rule_idx())]
            .set(usize::from(grm.eof_token_idx()), true);

        loop {
            let mut changed = false;
            for ridx in grm.iter_rules() {
                for &pidx in grm.rule_to_prods(ridx) {
                    let prod = grm.prod(pidx);
                    // Our implementation of the FOLLOW-set algorithm is simple: we start from
                    // the right-hand side of a production and work backwards. While epsilon is
                    // true, any rules we encounter have the LHS rule's FOLLOW set added to
                    // their FOLLOW set.
                    let mut epsilon = true;
                    for sidx in (0..prod.len()).rev() {
                        match prod[sidx] {
                            Symbol::Token(_) => {
                                epsilon = false;
                            }
                            Symbol::Rule(s_ridx) => {
                                if epsilon {
                                    changed |= follows.union(s_ridx, ridx);
                                }
                                // Add the FIRST sets of the symbols after this rule to its
                                // FOLLOW set.
                                let mut nullable = true;
                                for nidx in sidx + 1..prod.len() {
                                    match prod[nidx] {
                                        Symbol::Token(n_tidx) => {
                                            changed |= follows.set(s_ridx, n_tidx);
                                            nullable = false;
                                        }
                                        Symbol::Rule(n_ridx) => {
                                            changed |= follows
                                                .union_firsts(s_ridx, firsts.firsts(n_ridx));
                                            if !firsts.is_epsilon_set(n_ridx) {
                                                nullable = false;
                                            }
                                        }
                                    }
                                    if !nullable {
                                        break;
                                    }
                                }
                                if !firsts.is_epsilon_set(s_ridx) {
                                    epsilon = false;
                                }
                            }
                        }
                    }
                }
            }
            if !changed {
                return follows;
            }
        }
    }

    /// Returns true if the token `tidx` is in the follow set for rule `ridx`.
    pub fn is_set(&self, ridx: RIdx<StorageT>, tidx: TIdx<StorageT>) -> bool {
        self.follows[usize::from(ridx)][usize::from(tidx)]
    }

    /// Get all the follows for rule `ridx` as a `Vob`.
    pub fn follows(&self, ridx: RIdx<StorageT>) -> &Vob {
        &self.follows[usize::from(ridx)]
    }

    fn set(&mut self, ridx: RIdx<StorageT>, tidx: TIdx<StorageT>) -> bool {
        self.follows[usize::from(ridx)].set(usize::from(tidx), true)
    }

    fn union(&mut self, into_ridx: RIdx<StorageT>, from_ridx: RIdx<StorageT>) -> bool {
        if into_ridx == from_ridx {
            return false;
        }
        let from = self.follows[usize::from(from_ridx)].clone();
        self.follows[usize::from(into_ridx)].or(&from)
    }

    fn union_firsts(&mut self, into_ridx: RIdx<StorageT>, from: &Vob) -> bool {
        self.follows[usize::from(into_ridx)].or(from)
    }
}
