use std::marker::PhantomData;

use num_traits::{AsPrimitive, PrimInt, Unsigned};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use vob::Vob;

use crate::{Grammar, RIdx, Symbol, TIdx};

/// `Firsts` stores all the FIRST sets for a given grammar. For example, given this code and
/// grammar:
/// ```text
///   let grm = /* some grammar */;
///   let firsts = Firsts::new(&grm);
/// ```
/// then the following invariants hold:
/// ```text
///   // If a rule's first set contains a token idx, it's set in the bitfield
///   firsts.is_set(ridx, tidx)
///   // If a rule can be empty, its epsilon bit is set
///   firsts.is_epsilon_set(ridx)
/// ```
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Firsts<StorageT> {
    // Each rule has a bitfield over all tokens (including EOF, though EOF can never be in a
    // FIRST set).
    firsts: Vec<Vob>,
    epsilons: Vob,
    phantom: PhantomData<StorageT>,
}

impl<StorageT: 'static + PrimInt + Unsigned> Firsts<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Generates and returns the FIRST sets for the given grammar.
    pub fn new(grm: &Grammar<StorageT>) -> Self {
        let mut firsts = Vec::with_capacity(usize::from(grm.rules_len()));
        for _ in grm.iter_rules() {
            firsts.push(Vob::from_elem(usize::from(grm.tokens_len()), false));
        }
        let mut firsts = Firsts {
            firsts,
            epsilons: Vob::from_elem(usize::from(grm.rules_len()), false),
            phantom: PhantomData,
        };

        // Loop until the fixed-point is reached: the FIRST sets are complete when one pass
        // changes nothing.
        loop {
            let mut changed = false;
            for ridx in grm.iter_rules() {
                for &pidx in grm.rule_to_prods(ridx) {
                    let prod = grm.prod(pidx);
                    if prod.is_empty() {
                        changed |= firsts.set_epsilon(ridx);
                        continue;
                    }
                    // Walk the production left to right, stopping at the first
                    // non-epsilon-able symbol.
                    let mut all_epsilon = true;
                    for sym in prod {
                        match *sym {
                            Symbol::Token(tidx) => {
                                changed |= firsts.set(ridx, tidx);
                                all_epsilon = false;
                                break;
                            }
                            Symbol::Rule(sridx) => {
                                changed |= firsts.union(ridx, sridx);
                                if !firsts.is_epsilon_set(sridx) {
                                    all_epsilon = false;
                                    break;
                                }
                            }
                        }
                    }
                    if all_epsilon {
                        changed |= firsts.set_epsilon(ridx);
                    }
                }
            }
            if !changed {
                return firsts;
            }
        }
    }

    /// Returns true if the token `tidx` is in the first set for rule `ridx`.
    pub fn is_set(&self, ridx: RIdx<StorageT>, tidx: TIdx<StorageT>) -> bool {
        self.firsts[usize::from(ridx)][usize::from(tidx)]
    }

    /// Get all the firsts for rule `ridx` as a `Vob`.
    pub fn firsts(&self, ridx: RIdx<StorageT>) -> &Vob {
        &self.firsts[usize::from(ridx)]
    }

    /// Returns true if the rule `ridx` has epsilon in its first set.
    pub fn is_epsilon_set(&self, ridx: RIdx<StorageT>) -> bool {
        self.epsilons[usize::from(ridx)]
    }

    /// Ensures that the firsts bit for token `tidx` rule `ridx` is set. Returns true if it
    /// changed anything, or false otherwise.
    fn set(&mut self, ridx: RIdx<StorageT>, tidx: TIdx<StorageT>) -> bool {
        self.firsts[usize::from(ridx)].set(usize::from(tidx), true)
    }

    fn set_epsilon(&mut self, ridx: RIdx<StorageT>) -> bool {
        self.epsilons.set(usize::from(ridx), true)
    }

    /// Union the firsts of rule `from_ridx` into the firsts of rule `into_ridx`. Returns true
    /// if it changed anything, or false otherwise.
    fn union(&mut self, into_ridx: RIdx<StorageT>, from_ridx: RIdx<StorageT>) -> bool {
        if into_ridx == from_ridx {
            return false;
        }
        let from = self.firsts[usize::from(from_ridx)].clone();
        self.firsts[usize::from(into_ridx)].or(&from)
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::Firsts;
    use crate::{Grammar, GrammarBuilder, Symbol, TIdx};

    fn has(grm: &Grammar<u32>, firsts: &Firsts<u32>, rn: &str, should_be: &[&str]) {
        let ridx = grm.rule_idx(rn).unwrap();
        for tidx in grm.iter_tidxs() {
            let n = match grm.token_name(tidx) {
                Some(n) => n,
                None => continue,
            };
            if should_be.iter().any(|x| x == &n) {
                if !firsts.is_set(ridx, tidx) {
                    panic!("{} is not in the firsts set for {} when it should be", n, rn);
                }
            } else if firsts.is_set(ridx, tidx) {
                panic!("{} is in the firsts set for {} when it shouldn't be", n, rn);
            }
        }
    }

    fn eco_grammar() -> Grammar<u32> {
        // Z: S 'b';
        // S: S 'b' | 'b' A 'a' | 'a';
        // A: 'a' S 'c' | 'a' | 'a' S 'b';
        let mut gb = GrammarBuilder::<u32>::new();
        let z = gb.rule("Z");
        let s = gb.rule("S");
        let a_rule = gb.rule("A");
        let a = Symbol::Token(gb.token("a"));
        let b = Symbol::Token(gb.token("b"));
        let c = Symbol::Token(gb.token("c"));
        let sr = Symbol::Rule(s);
        let ar = Symbol::Rule(a_rule);
        gb.prod(z, &[sr, b]);
        gb.prod(s, &[sr, b]);
        gb.prod(s, &[b, ar, a]);
        gb.prod(s, &[a]);
        gb.prod(a_rule, &[a, sr, c]);
        gb.prod(a_rule, &[a]);
        gb.prod(a_rule, &[a, sr, b]);
        gb.build().unwrap()
    }

    #[test]
    fn test_first() {
        let grm = eco_grammar();
        let firsts = Firsts::new(&grm);
        has(&grm, &firsts, "Z", &["a", "b"]);
        has(&grm, &firsts, "S", &["a", "b"]);
        has(&grm, &firsts, "A", &["a"]);
        assert!(!firsts.is_epsilon_set(grm.rule_idx("S").unwrap()));
    }

    #[test]
    fn test_first_no_subsequent_rules() {
        // Z: A B 'c'; A: 'a'; B: 'b';
        let mut gb = GrammarBuilder::<u32>::new();
        let z = gb.rule("Z");
        let a_rule = gb.rule("A");
        let b_rule = gb.rule("B");
        let a = Symbol::Token(gb.token("a"));
        let b = Symbol::Token(gb.token("b"));
        let c = Symbol::Token(gb.token("c"));
        gb.prod(z, &[Symbol::Rule(a_rule), Symbol::Rule(b_rule), c]);
        gb.prod(a_rule, &[a]);
        gb.prod(b_rule, &[b]);
        let grm = gb.build().unwrap();
        let firsts = Firsts::new(&grm);
        has(&grm, &firsts, "Z", &["a"]);
    }

    #[test]
    fn test_first_epsilon() {
        // Z: A B 'c'; A: 'a' | ; B: 'b' | ;
        let mut gb = GrammarBuilder::<u32>::new();
        let z = gb.rule("Z");
        let a_rule = gb.rule("A");
        let b_rule = gb.rule("B");
        let a = Symbol::Token(gb.token("a"));
        let b = Symbol::Token(gb.token("b"));
        let c = Symbol::Token(gb.token("c"));
        gb.prod(z, &[Symbol::Rule(a_rule), Symbol::Rule(b_rule), c]);
        gb.prod(a_rule, &[a]);
        gb.prod(a_rule, &[]);
        gb.prod(b_rule, &[b]);
        gb.prod(b_rule, &[]);
        let grm = gb.build().unwrap();
        let firsts = Firsts::new(&grm);
        has(&grm, &firsts, "A", &["a"]);
        has(&grm, &firsts, "B", &["b"]);
        // A and B can both be empty, so 'c' percolates into Z's firsts.
        has(&grm, &firsts, "Z", &["a", "b", "c"]);
        assert!(firsts.is_epsilon_set(grm.rule_idx("A").unwrap()));
        assert!(firsts.is_epsilon_set(grm.rule_idx("B").unwrap()));
        assert!(!firsts.is_epsilon_set(grm.rule_idx("Z").unwrap()));
    }

    // Enumerate sentential forms from `rn` breadth-first (up to `max_forms` of them) and
    // record every terminal observed in leading position, plus whether the empty sentence was
    // derived.
    fn brute_force_first(
        grm: &Grammar<u32>,
        rn: &str,
        max_forms: usize,
    ) -> (HashSet<TIdx<u32>>, bool) {
        let mut tokens = HashSet::new();
        let mut nullable = false;
        let start = vec![Symbol::Rule(grm.rule_idx(rn).unwrap())];
        let mut seen = HashSet::new();
        seen.insert(start.clone());
        let mut forms = vec![start];
        let mut i = 0;
        while i < forms.len() && forms.len() < max_forms {
            let form = forms[i].clone();
            i += 1;
            match form.first() {
                None => nullable = true,
                Some(&Symbol::Token(tidx)) => {
                    tokens.insert(tidx);
                }
                Some(&Symbol::Rule(ridx)) => {
                    for &pidx in grm.rule_to_prods(ridx) {
                        let mut nf = grm.prod(pidx).to_vec();
                        nf.extend_from_slice(&form[1..]);
                        if seen.insert(nf.clone()) {
                            forms.push(nf);
                        }
                    }
                }
            }
        }
        (tokens, nullable)
    }

    fn check_against_brute_force(grm: &Grammar<u32>, firsts: &Firsts<u32>) {
        for ridx in grm.iter_rules() {
            let (tokens, nullable) = brute_force_first(grm, grm.rule_name(ridx), 10000);
            for tidx in grm.iter_tidxs() {
                assert_eq!(
                    firsts.is_set(ridx, tidx),
                    tokens.contains(&tidx),
                    "mismatch for rule {} token {:?}",
                    grm.rule_name(ridx),
                    grm.token_name(tidx)
                );
            }
            assert_eq!(firsts.is_epsilon_set(ridx), nullable);
        }
    }

    #[test]
    fn test_first_matches_brute_force() {
        let grm = eco_grammar();
        check_against_brute_force(&grm, &Firsts::new(&grm));

        // Z: A B 'c'; A: 'a' | ; B: A 'b' | ;
        let mut gb = GrammarBuilder::<u32>::new();
        let z = gb.rule("Z");
        let a_rule = gb.rule("A");
        let b_rule = gb.rule("B");
        let a = Symbol::Token(gb.token("a"));
        let b = Symbol::Token(gb.token("b"));
        let c = Symbol::Token(gb.token("c"));
        gb.prod(z, &[Symbol::Rule(a_rule), Symbol::Rule(b_rule), c]);
        gb.prod(a_rule, &[a]);
        gb.prod(a_rule, &[]);
        gb.prod(b_rule, &[Symbol::Rule(a_rule), b]);
        gb.prod(b_rule, &[]);
        let grm = gb.build().unwrap();
        check_against_brute_force(&grm, &Firsts::new(&grm));
    }

    #[test]
    fn test_first_self_referential() {
        // T: T '+' A | A; A: 'a';
        let mut gb = GrammarBuilder::<u32>::new();
        let s = gb.rule("S");
        let t = gb.rule("T");
        let a_rule = gb.rule("A");
        let plus = Symbol::Token(gb.token("+"));
        let a = Symbol::Token(gb.token("a"));
        gb.prod(s, &[Symbol::Rule(t)]);
        gb.prod(t, &[Symbol::Rule(t), plus, Symbol::Rule(a_rule)]);
        gb.prod(t, &[Symbol::Rule(a_rule)]);
        gb.prod(a_rule, &[a]);
        let grm = gb.build().unwrap();
        let firsts = Firsts::new(&grm);
        has(&grm, &firsts, "T", &["a"]);
        has(&grm, &firsts, "S", &["a"]);
    }
}
