//! In-place grammar rewriting: alias inlining and simple direct left recursion elimination.
//!
//! Every production the rewrite creates is tracked in an *origins* table mapping it to the
//! chain of caller-defined productions it stands in for, innermost first. Glue productions
//! (such as `A -> A'`) have no origins and are invisible to listeners; a production moved or
//! substituted from a caller-defined one carries that production's origins so the parser can
//! report the caller's rule when it completes.

use llgrammar::{Firsts, Grammar, PIdx, ProdExtras, RIdx, Symbol};
use num_traits::{AsPrimitive, PrimInt, Unsigned};

use crate::{TableError, TableErrorKind};

pub(crate) fn rewrite<StorageT: 'static + PrimInt + Unsigned>(
    grm: &mut Grammar<StorageT>,
) -> Result<Vec<Vec<PIdx<StorageT>>>, TableError<StorageT>>
where
    usize: AsPrimitive<StorageT>,
{
    let mut origins = grm.iter_pidxs().map(|pidx| vec![pidx]).collect::<Vec<_>>();
    inline_aliases(grm, &mut origins);
    loop {
        let firsts = Firsts::new(grm);
        check_recursion(grm, &firsts)?;
        match find_left_recursive(grm) {
            Some(ridx) => eliminate(grm, &mut origins, ridx)?,
            None => return Ok(origins),
        }
    }
}

/// How many times is `ridx` referenced across all live productions (its own included)?
fn rule_ref_count<StorageT: 'static + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    ridx: RIdx<StorageT>,
) -> usize
where
    usize: AsPrimitive<StorageT>,
{
    let mut c = 0;
    for r in grm.iter_rules() {
        if grm.rule_retired(r) {
            continue;
        }
        for &pidx in grm.rule_to_prods(r) {
            c += grm
                .prod(pidx)
                .iter()
                .filter(|&&sym| sym == Symbol::Rule(ridx))
                .count();
        }
    }
    c
}

/// A rule `B` referenced exactly once in the whole grammar, by a length-1 production
/// `A -> B`, is an alias of `A`: clone `B`'s productions into `A` at the alias's priority
/// position and retire `B`. Recursive rules reference themselves and so are never aliases.
fn inline_aliases<StorageT: 'static + PrimInt + Unsigned>(
    grm: &mut Grammar<StorageT>,
    origins: &mut Vec<Vec<PIdx<StorageT>>>,
) where
    usize: AsPrimitive<StorageT>,
{
    loop {
        let mut found = None;
        'search: for a_ridx in grm.iter_rules() {
            if grm.rule_retired(a_ridx) {
                continue;
            }
            for &pidx in grm.rule_to_prods(a_ridx) {
                if let [Symbol::Rule(b_ridx)] = *grm.prod(pidx) {
                    if b_ridx != a_ridx
                        && b_ridx != grm.start_rule_idx()
                        && rule_ref_count(grm, b_ridx) == 1
                    {
                        found = Some((a_ridx, pidx, b_ridx));
                        break 'search;
                    }
                }
            }
        }
        let Some((a_ridx, alias_pidx, b_ridx)) = found else {
            return;
        };

        let mut new_pidxs = Vec::new();
        for &b_pidx in &grm.rule_to_prods(b_ridx).to_vec() {
            let syms = grm.prod(b_pidx).to_vec();
            // The alias production's metadata applies to whatever replaces it, unless the
            // inlined production carries its own.
            let extras = ProdExtras {
                right_assoc: grm.prod_right_assoc(b_pidx),
                required_var: grm
                    .prod_required_var(b_pidx)
                    .or_else(|| grm.prod_required_var(alias_pidx))
                    .map(|s| s.to_string()),
                action: grm
                    .prod_action(b_pidx)
                    .or_else(|| grm.prod_action(alias_pidx))
                    .cloned(),
            };
            let mut o = origins[usize::from(b_pidx)].clone();
            o.extend_from_slice(&origins[usize::from(alias_pidx)]);
            new_pidxs.push(add_prod_tracked(grm, origins, a_ridx, syms, extras, o));
        }

        // add_prod appended the clones to A's list; splice them in at the alias's position
        // instead.
        let mut a_prods = grm.rule_to_prods(a_ridx).to_vec();
        a_prods.truncate(a_prods.len() - new_pidxs.len());
        let pos = a_prods.iter().position(|&p| p == alias_pidx).unwrap();
        a_prods.splice(pos..=pos, new_pidxs);
        grm.set_rule_prods(a_ridx, a_prods);
        grm.retire_rule(b_ridx);
    }
}

/// Walk every rule transitively through its left corners (advancing past nullable symbols)
/// and fail on indirect or hidden left recursion. Only simple direct left recursion
/// (`A -> A ...`) survives to be eliminated.
fn check_recursion<StorageT: 'static + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    firsts: &Firsts<StorageT>,
) -> Result<(), TableError<StorageT>>
where
    usize: AsPrimitive<StorageT>,
{
    for target in grm.iter_rules() {
        if grm.rule_retired(target) {
            continue;
        }
        let mut visited = vec![false; usize::from(grm.rules_len())];
        visit(grm, firsts, target, target, &mut visited, &mut Vec::new())?;
    }
    Ok(())
}

fn visit<StorageT: 'static + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    firsts: &Firsts<StorageT>,
    target: RIdx<StorageT>,
    cur: RIdx<StorageT>,
    visited: &mut [bool],
    chain: &mut Vec<PIdx<StorageT>>,
) -> Result<(), TableError<StorageT>>
where
    usize: AsPrimitive<StorageT>,
{
    visited[usize::from(cur)] = true;
    for &pidx in grm.rule_to_prods(cur) {
        chain.push(pidx);
        for (i, sym) in grm.prod(pidx).iter().enumerate() {
            match *sym {
                Symbol::Token(_) => break,
                Symbol::Rule(next) => {
                    if next == target {
                        if i > 0 {
                            return Err(TableError {
                                kind: TableErrorKind::HiddenLeftRecursion {
                                    rule: grm.rule_name(target).to_string(),
                                    chain: chain.clone(),
                                },
                            });
                        } else if chain.len() > 1 {
                            return Err(TableError {
                                kind: TableErrorKind::IndirectLeftRecursion {
                                    rule: grm.rule_name(target).to_string(),
                                    chain: chain.clone(),
                                },
                            });
                        }
                        // Direct recursion in the target's own production: the
                        // elimination pass handles this.
                    } else if !visited[usize::from(next)] {
                        visit(grm, firsts, target, next, visited, chain)?;
                    }
                    if !firsts.is_epsilon_set(next) {
                        break;
                    }
                }
            }
        }
        chain.pop();
    }
    Ok(())
}

fn leading_self<StorageT: 'static + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    ridx: RIdx<StorageT>,
    pidx: PIdx<StorageT>,
) -> bool
where
    usize: AsPrimitive<StorageT>,
{
    matches!(grm.prod(pidx).first(), Some(&Symbol::Rule(r)) if r == ridx)
}

fn find_left_recursive<StorageT: 'static + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
) -> Option<RIdx<StorageT>>
where
    usize: AsPrimitive<StorageT>,
{
    grm.iter_rules().find(|&ridx| {
        !grm.rule_retired(ridx)
            && grm
                .rule_to_prods(ridx)
                .iter()
                .any(|&pidx| leading_self(grm, ridx, pidx))
    })
}

/// Eliminate the earliest-listed left-recursive production of `a_ridx`.
///
/// All of `A`'s other productions move to a fresh rule `A'`: non-recursive ones verbatim,
/// recursive ones with every `A` substituted by `A'` (they become left-recursive at the `A'`
/// level and are eliminated on a later pass, which is what stratifies operator precedence:
/// earlier-listed recursive productions bind loosest). `A` itself is rebuilt around `A'`
/// according to the chosen production's associativity.
fn eliminate<StorageT: 'static + PrimInt + Unsigned>(
    grm: &mut Grammar<StorageT>,
    origins: &mut Vec<Vec<PIdx<StorageT>>>,
    a_ridx: RIdx<StorageT>,
) -> Result<(), TableError<StorageT>>
where
    usize: AsPrimitive<StorageT>,
{
    let a_prods = grm.rule_to_prods(a_ridx).to_vec();
    let chosen = *a_prods
        .iter()
        .find(|&&pidx| leading_self(grm, a_ridx, pidx))
        .unwrap();
    let a_name = grm.rule_name(a_ridx).to_string();
    if a_prods.len() == 1 {
        // The continuation rule would have no productions: nothing ever ends the recursion.
        return Err(TableError {
            kind: TableErrorKind::UnterminatingRecursion { rule: a_name },
        });
    }
    let sub_ridx = grm.add_rule(synth_name(grm, &a_name, None));
    let subst = |syms: &[Symbol<StorageT>]| {
        syms.iter()
            .map(|&sym| {
                if sym == Symbol::Rule(a_ridx) {
                    Symbol::Rule(sub_ridx)
                } else {
                    sym
                }
            })
            .collect::<Vec<_>>()
    };

    for &pidx in &a_prods {
        if pidx == chosen {
            continue;
        }
        let syms = if leading_self(grm, a_ridx, pidx) {
            subst(grm.prod(pidx))
        } else {
            grm.prod(pidx).to_vec()
        };
        let extras = prod_extras_of(grm, pidx);
        let o = origins[usize::from(pidx)].clone();
        add_prod_tracked(grm, origins, sub_ridx, syms, extras, o);
    }

    let chosen_syms = grm.prod(chosen).to_vec();
    let chosen_extras = prod_extras_of(grm, chosen);
    let chosen_origins = origins[usize::from(chosen)].clone();
    let new_a = if chosen_extras.right_assoc {
        // A -> A' | A' <rest of chosen>. Trailing references to A stay as A, which is what
        // keeps the recursion right-associated.
        let glue = add_prod_tracked(
            grm,
            origins,
            a_ridx,
            vec![Symbol::Rule(sub_ridx)],
            ProdExtras::default(),
            vec![],
        );
        let mut suffix_syms = vec![Symbol::Rule(sub_ridx)];
        suffix_syms.extend_from_slice(&chosen_syms[1..]);
        let suffix = add_prod_tracked(
            grm,
            origins,
            a_ridx,
            suffix_syms,
            chosen_extras,
            chosen_origins,
        );
        vec![glue, suffix]
    } else {
        // A -> A' Tail; Tail -> Item Tail | ε; Item -> <rest of chosen, A substituted by
        // A'>. Only Item carries the chosen production's origins, so each iteration of the
        // flat suffix list is reported as one application of the caller's binary rule,
        // reconstructing a left-associated tree.
        let tail_ridx = grm.add_rule(synth_name(grm, &a_name, Some("tail")));
        let item_ridx = grm.add_rule(synth_name(grm, &a_name, Some("op")));
        let glue = add_prod_tracked(
            grm,
            origins,
            a_ridx,
            vec![Symbol::Rule(sub_ridx), Symbol::Rule(tail_ridx)],
            ProdExtras::default(),
            vec![],
        );
        add_prod_tracked(
            grm,
            origins,
            tail_ridx,
            vec![Symbol::Rule(item_ridx), Symbol::Rule(tail_ridx)],
            ProdExtras::default(),
            vec![],
        );
        add_prod_tracked(
            grm,
            origins,
            tail_ridx,
            vec![],
            ProdExtras::default(),
            vec![],
        );
        add_prod_tracked(
            grm,
            origins,
            item_ridx,
            subst(&chosen_syms[1..]),
            chosen_extras,
            chosen_origins,
        );
        vec![glue]
    };
    grm.set_rule_prods(a_ridx, new_a);
    Ok(())
}

fn add_prod_tracked<StorageT: 'static + PrimInt + Unsigned>(
    grm: &mut Grammar<StorageT>,
    origins: &mut Vec<Vec<PIdx<StorageT>>>,
    ridx: RIdx<StorageT>,
    syms: Vec<Symbol<StorageT>>,
    extras: ProdExtras,
    o: Vec<PIdx<StorageT>>,
) -> PIdx<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    let pidx = grm.add_prod(ridx, syms, extras);
    debug_assert_eq!(usize::from(pidx), origins.len());
    origins.push(o);
    pidx
}

fn prod_extras_of<StorageT: 'static + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    pidx: PIdx<StorageT>,
) -> ProdExtras
where
    usize: AsPrimitive<StorageT>,
{
    ProdExtras {
        right_assoc: grm.prod_right_assoc(pidx),
        required_var: grm.prod_required_var(pidx).map(|s| s.to_string()),
        action: grm.prod_action(pidx).cloned(),
    }
}

/// Deterministic synthetic rule names: `E` yields `E_0`, `E_1`, ... and any existing
/// numbering on the base is stripped first so eliminating `E_0` yields `E_1`, not `E_0_0`.
fn synth_name<StorageT: 'static + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    base: &str,
    infix: Option<&str>,
) -> String
where
    usize: AsPrimitive<StorageT>,
{
    let root = match base.rfind('_') {
        Some(i)
            if !base[i + 1..].is_empty()
                && base[i + 1..].chars().all(|c| c.is_ascii_digit()) =>
        {
            &base[..i]
        }
        _ => base,
    };
    let mut k = 0;
    loop {
        let cand = match infix {
            Some(infix) => format!("{}_{}_{}", root, infix, k),
            None => format!("{}_{}", root, k),
        };
        if grm.rule_idx(&cand).is_none() && grm.token_idx(&cand).is_none() {
            return cand;
        }
        k += 1;
    }
}

#[cfg(test)]
mod test {
    use super::rewrite;
    use crate::TableErrorKind;
    use llgrammar::{Grammar, GrammarBuilder, PIdx, ProdExtras, Symbol};

    fn prods_of<'a>(grm: &'a Grammar<u32>, rn: &str) -> Vec<&'a [Symbol<u32>]> {
        grm.rule_to_prods(grm.rule_idx(rn).unwrap())
            .iter()
            .map(|&pidx| grm.prod(pidx))
            .collect()
    }

    #[test]
    fn test_alias_inlining() {
        // Start: A 'x'; A: B; B: 'b' | 'c';
        let mut gb = GrammarBuilder::<u32>::new();
        let start = gb.rule("Start");
        let a_rule = gb.rule("A");
        let b_rule = gb.rule("B");
        let x = Symbol::Token(gb.token("x"));
        let b = Symbol::Token(gb.token("b"));
        let c = Symbol::Token(gb.token("c"));
        gb.prod(start, &[Symbol::Rule(a_rule), x]);
        let alias = gb.prod(a_rule, &[Symbol::Rule(b_rule)]);
        let pb = gb.prod(b_rule, &[b]);
        let pc = gb.prod(b_rule, &[c]);
        let mut grm = gb.build().unwrap();
        let origins = rewrite(&mut grm).unwrap();

        assert!(grm.rule_retired(grm.rule_idx("B").unwrap()));
        assert!(!grm.rule_retired(a_rule));
        assert_eq!(prods_of(&grm, "A"), vec![&[b][..], &[c][..]]);
        let a_prods = grm.rule_to_prods(a_rule);
        assert_eq!(origins[usize::from(a_prods[0])], vec![pb, alias]);
        assert_eq!(origins[usize::from(a_prods[1])], vec![pc, alias]);
    }

    #[test]
    fn test_alias_chain() {
        // Start: A 'x'; A: B; B: C; C: 'c';
        let mut gb = GrammarBuilder::<u32>::new();
        let start = gb.rule("Start");
        let a_rule = gb.rule("A");
        let b_rule = gb.rule("B");
        let c_rule = gb.rule("C");
        let x = Symbol::Token(gb.token("x"));
        let c = Symbol::Token(gb.token("c"));
        gb.prod(start, &[Symbol::Rule(a_rule), x]);
        let pab = gb.prod(a_rule, &[Symbol::Rule(b_rule)]);
        let pbc = gb.prod(b_rule, &[Symbol::Rule(c_rule)]);
        let pc = gb.prod(c_rule, &[c]);
        let mut grm = gb.build().unwrap();
        let origins = rewrite(&mut grm).unwrap();

        assert!(grm.rule_retired(b_rule));
        assert!(grm.rule_retired(c_rule));
        assert_eq!(prods_of(&grm, "A"), vec![&[c][..]]);
        // Innermost first: a parse of 'c' reports C, then B, then A.
        let a_pidx = grm.rule_to_prods(a_rule)[0];
        assert_eq!(origins[usize::from(a_pidx)], vec![pc, pbc, pab]);
    }

    fn expr_grammar(right_assoc: bool) -> (Grammar<u32>, PIdx<u32>, PIdx<u32>, PIdx<u32>) {
        // S: E; E: E '+' E | E '*' E | 'a';
        let mut gb = GrammarBuilder::<u32>::new();
        let s = gb.rule("S");
        let e = gb.rule("E");
        let plus = Symbol::Token(gb.token("+"));
        let star = Symbol::Token(gb.token("*"));
        let a = Symbol::Token(gb.token("a"));
        let er = Symbol::Rule(e);
        gb.prod(s, &[er]);
        let extras = ProdExtras {
            right_assoc,
            ..ProdExtras::default()
        };
        let p_add = gb.prod_extras(e, &[er, plus, er], extras.clone());
        let p_mul = gb.prod_extras(e, &[er, star, er], extras);
        let p_a = gb.prod(e, &[a]);
        (gb.build().unwrap(), p_add, p_mul, p_a)
    }

    #[test]
    fn test_right_assoc_elimination() {
        let (mut grm, p_add, p_mul, p_a) = expr_grammar(true);
        let origins = rewrite(&mut grm).unwrap();

        let e = grm.rule_idx("E").unwrap();
        let e0 = grm.rule_idx("E_0").unwrap();
        let e1 = grm.rule_idx("E_1").unwrap();
        let plus = Symbol::Token(grm.token_idx("+").unwrap());
        let star = Symbol::Token(grm.token_idx("*").unwrap());
        let a = Symbol::Token(grm.token_idx("a").unwrap());

        // E: E_0 | E_0 '+' E;  E_0: E_1 | E_1 '*' E_0;  E_1: 'a';
        assert_eq!(
            prods_of(&grm, "E"),
            vec![
                &[Symbol::Rule(e0)][..],
                &[Symbol::Rule(e0), plus, Symbol::Rule(e)][..]
            ]
        );
        assert_eq!(
            prods_of(&grm, "E_0"),
            vec![
                &[Symbol::Rule(e1)][..],
                &[Symbol::Rule(e1), star, Symbol::Rule(e0)][..]
            ]
        );
        assert_eq!(prods_of(&grm, "E_1"), vec![&[a][..]]);

        let e_prods = grm.rule_to_prods(e);
        assert!(origins[usize::from(e_prods[0])].is_empty());
        assert_eq!(origins[usize::from(e_prods[1])], vec![p_add]);
        let e0_prods = grm.rule_to_prods(e0);
        assert_eq!(origins[usize::from(e0_prods[1])], vec![p_mul]);
        let e1_prods = grm.rule_to_prods(e1);
        assert_eq!(origins[usize::from(e1_prods[0])], vec![p_a]);
    }

    #[test]
    fn test_left_assoc_elimination() {
        let (mut grm, p_add, _, _) = expr_grammar(false);
        let origins = rewrite(&mut grm).unwrap();

        let e0 = grm.rule_idx("E_0").unwrap();
        let tail = grm.rule_idx("E_tail_0").unwrap();
        let op = grm.rule_idx("E_op_0").unwrap();
        let plus = Symbol::Token(grm.token_idx("+").unwrap());

        // E: E_0 E_tail_0;  E_tail_0: E_op_0 E_tail_0 | ε;  E_op_0: '+' E_0;
        assert_eq!(
            prods_of(&grm, "E"),
            vec![&[Symbol::Rule(e0), Symbol::Rule(tail)][..]]
        );
        assert_eq!(
            prods_of(&grm, "E_tail_0"),
            vec![&[Symbol::Rule(op), Symbol::Rule(tail)][..], &[][..]]
        );
        assert_eq!(prods_of(&grm, "E_op_0"), vec![&[plus, Symbol::Rule(e0)][..]]);
        // The op production carries the caller's binary rule.
        let op_pidx = grm.rule_to_prods(op)[0];
        assert_eq!(origins[usize::from(op_pidx)], vec![p_add]);
    }

    #[test]
    fn test_indirect_left_recursion() {
        // S: A 'x'; A: B 'a' | 'c'; B: A 'b' | 'd';
        let mut gb = GrammarBuilder::<u32>::new();
        let s = gb.rule("S");
        let a_rule = gb.rule("A");
        let b_rule = gb.rule("B");
        let x = Symbol::Token(gb.token("x"));
        let a = Symbol::Token(gb.token("a"));
        let b = Symbol::Token(gb.token("b"));
        let c = Symbol::Token(gb.token("c"));
        let d = Symbol::Token(gb.token("d"));
        gb.prod(s, &[Symbol::Rule(a_rule), x]);
        let pab = gb.prod(a_rule, &[Symbol::Rule(b_rule), a]);
        gb.prod(a_rule, &[c]);
        let pba = gb.prod(b_rule, &[Symbol::Rule(a_rule), b]);
        gb.prod(b_rule, &[d]);
        let mut grm = gb.build().unwrap();
        match rewrite(&mut grm) {
            Err(e) => match e.kind {
                TableErrorKind::IndirectLeftRecursion { rule, chain } => {
                    assert_eq!(rule, "A");
                    assert_eq!(chain, vec![pab, pba]);
                }
                k => panic!("expected IndirectLeftRecursion, got {:?}", k),
            },
            Ok(_) => panic!("expected IndirectLeftRecursion"),
        }
    }

    #[test]
    fn test_left_recursion_without_base_case() {
        // S: E; E: E '+' E;
        // Nothing ever ends E's recursion, so elimination would leave the continuation rule
        // empty. This must be a build error, not a panic later on.
        let mut gb = GrammarBuilder::<u32>::new();
        let s = gb.rule("S");
        let e = gb.rule("E");
        let plus = Symbol::Token(gb.token("+"));
        gb.prod(s, &[Symbol::Rule(e)]);
        gb.prod(e, &[Symbol::Rule(e), plus, Symbol::Rule(e)]);
        let mut grm = gb.build().unwrap();
        match rewrite(&mut grm) {
            Err(e) => match e.kind {
                TableErrorKind::UnterminatingRecursion { rule } => assert_eq!(rule, "E"),
                k => panic!("expected UnterminatingRecursion, got {:?}", k),
            },
            Ok(_) => panic!("expected UnterminatingRecursion"),
        }
    }

    #[test]
    fn test_hidden_left_recursion() {
        // S: A 'x'; A: N A 'b' | 'c'; N: 'n' | ;
        let mut gb = GrammarBuilder::<u32>::new();
        let s = gb.rule("S");
        let a_rule = gb.rule("A");
        let n_rule = gb.rule("N");
        let x = Symbol::Token(gb.token("x"));
        let b = Symbol::Token(gb.token("b"));
        let c = Symbol::Token(gb.token("c"));
        let n = Symbol::Token(gb.token("n"));
        gb.prod(s, &[Symbol::Rule(a_rule), x]);
        let pa = gb.prod(a_rule, &[Symbol::Rule(n_rule), Symbol::Rule(a_rule), b]);
        gb.prod(a_rule, &[c]);
        gb.prod(n_rule, &[n]);
        gb.prod(n_rule, &[]);
        let mut grm = gb.build().unwrap();
        match rewrite(&mut grm) {
            Err(e) => match e.kind {
                TableErrorKind::HiddenLeftRecursion { rule, chain } => {
                    assert_eq!(rule, "A");
                    assert_eq!(chain, vec![pa]);
                }
                k => panic!("expected HiddenLeftRecursion, got {:?}", k),
            },
            Ok(_) => panic!("expected HiddenLeftRecursion"),
        }
    }
}
