//! Decision tree construction. One tree is built per live rule; LL(1) conflicts inside a
//! single lookahead-token bucket are resolved, in order, by common prefix factoring,
//! discriminator reuse (when the rule being resolved is itself a discriminator), discriminator
//! synthesis, and finally the caller's ambiguity overrides.

use std::fmt;
use std::hash::Hash;

use fnv::{FnvHashMap, FnvHashSet};
use llgrammar::{Firsts, Follows, Grammar, PIdx, PartialProd, ProdExtras, RIdx, Symbol, TIdx};
use num_traits::{AsPrimitive, PrimInt, Unsigned};
use vob::Vob;

use crate::{AmbiguityOverride, NdIdx, ParserNode, TableError, TableErrorKind, rewrite::rewrite};

/// A parse table: the rewritten grammar, one decision tree root per live rule, and the origins
/// table mapping every production back to the caller-defined productions it stands in for.
///
/// A table is immutable once built and may be shared between any number of concurrent parses.
pub struct ParseTable<StorageT> {
    grm: Grammar<StorageT>,
    prod_origins: Vec<Vec<PIdx<StorageT>>>,
    nodes: Vec<ParserNode<StorageT>>,
    rule_roots: Vec<Option<NdIdx>>,
}

impl<StorageT: 'static + PrimInt + Unsigned> ParseTable<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// The rewritten grammar this table was built from.
    pub fn grammar(&self) -> &Grammar<StorageT> {
        &self.grm
    }

    pub fn node(&self, ndidx: NdIdx) -> &ParserNode<StorageT> {
        &self.nodes[usize::from(ndidx)]
    }

    /// The decision tree root for rule `ridx`, or `None` if the rule was retired by
    /// rewriting.
    pub fn rule_root(&self, ridx: RIdx<StorageT>) -> Option<NdIdx> {
        self.rule_roots[usize::from(ridx)]
    }

    /// The caller-defined productions that production `pidx` stands in for, innermost first.
    /// Empty for glue and discriminator productions.
    pub fn prod_origins(&self, pidx: PIdx<StorageT>) -> &[PIdx<StorageT>] {
        &self.prod_origins[usize::from(pidx)]
    }
}

struct DiscInfo<StorageT> {
    ridx: RIdx<StorageT>,
    /// The rule and lookahead token whose resolution caused this discriminator's creation.
    /// Chained, these form the context path used for override matching.
    created_for: (RIdx<StorageT>, TIdx<StorageT>),
    /// Maps each of this discriminator's productions to the production it descends from.
    prod_origin: FnvHashMap<PIdx<StorageT>, PIdx<StorageT>>,
}

struct Builder<StorageT> {
    grm: Grammar<StorageT>,
    prod_origins: Vec<Vec<PIdx<StorageT>>>,
    firsts: Firsts<StorageT>,
    /// FOLLOW sets indexed by rule, growable: discriminators minted during building get the
    /// FOLLOW set of the rule they were minted for.
    follows: Vec<Vob>,
    overrides: Vec<AmbiguityOverride<StorageT>>,
    nodes: Vec<ParserNode<StorageT>>,
    memo: FnvHashMap<Vec<PartialProd<StorageT>>, NdIdx>,
    discs: Vec<DiscInfo<StorageT>>,
    disc_idx: FnvHashMap<RIdx<StorageT>, usize>,
    in_progress: FnvHashSet<(RIdx<StorageT>, TIdx<StorageT>, Vec<PartialProd<StorageT>>)>,
    pending: Vec<RIdx<StorageT>>,
    roots: FnvHashMap<RIdx<StorageT>, NdIdx>,
}

pub(crate) fn build<StorageT: 'static + fmt::Debug + Hash + PrimInt + Unsigned>(
    mut grm: Grammar<StorageT>,
    overrides: Vec<AmbiguityOverride<StorageT>>,
) -> Result<ParseTable<StorageT>, TableError<StorageT>>
where
    usize: AsPrimitive<StorageT>,
{
    let prod_origins = rewrite(&mut grm)?;
    let firsts = Firsts::new(&grm);
    let base_follows = Follows::new(&grm, &firsts);
    let follows = grm
        .iter_rules()
        .map(|ridx| base_follows.follows(ridx).clone())
        .collect();
    let mut bld = Builder {
        grm,
        prod_origins,
        firsts,
        follows,
        overrides,
        nodes: Vec::new(),
        memo: FnvHashMap::default(),
        discs: Vec::new(),
        disc_idx: FnvHashMap::default(),
        in_progress: FnvHashSet::default(),
        pending: Vec::new(),
        roots: FnvHashMap::default(),
    };

    let live = bld
        .grm
        .iter_rules()
        .filter(|&ridx| !bld.grm.rule_retired(ridx))
        .collect::<Vec<_>>();
    for ridx in live {
        bld.resolve_root(ridx)?;
    }
    // Discriminators minted above (and below: resolving one discriminator can mint another)
    // need their own trees.
    let mut i = 0;
    while i < bld.pending.len() {
        let dridx = bld.pending[i];
        bld.resolve_root(dridx)?;
        i += 1;
    }

    let rule_roots = bld
        .grm
        .iter_rules()
        .map(|ridx| bld.roots.get(&ridx).copied())
        .collect();
    Ok(ParseTable {
        grm: bld.grm,
        prod_origins: bld.prod_origins,
        nodes: bld.nodes,
        rule_roots,
    })
}

/// The NEXT set of a symbol sequence: FIRST of the sequence, unioned with `fallback` (the
/// producing rule's FOLLOW set) if the whole sequence is nullable.
fn seq_next<StorageT: 'static + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    firsts: &Firsts<StorageT>,
    syms: &[Symbol<StorageT>],
    fallback: &Vob,
) -> Vob
where
    usize: AsPrimitive<StorageT>,
{
    let mut out = Vob::from_elem(usize::from(grm.tokens_len()), false);
    for sym in syms {
        match *sym {
            Symbol::Token(tidx) => {
                out.set(usize::from(tidx), true);
                return out;
            }
            Symbol::Rule(ridx) => {
                out.or(firsts.firsts(ridx));
                if !firsts.is_epsilon_set(ridx) {
                    return out;
                }
            }
        }
    }
    out.or(fallback);
    out
}

fn vob_subset(a: &Vob, b: &Vob) -> bool {
    a.iter_set_bits(..).all(|i| b[i])
}

impl<StorageT: 'static + fmt::Debug + Hash + PrimInt + Unsigned> Builder<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    fn add_node(&mut self, node: ParserNode<StorageT>) -> NdIdx {
        self.nodes.push(node);
        NdIdx::from(self.nodes.len() - 1)
    }

    fn resolve_root(&mut self, ridx: RIdx<StorageT>) -> Result<(), TableError<StorageT>> {
        let cands = self
            .grm
            .rule_to_prods(ridx)
            .iter()
            .map(|&pidx| PartialProd::spanning(&self.grm, pidx))
            .collect::<Vec<_>>();
        let root = self.resolve(&cands)?;
        self.roots.insert(ridx, root);
        Ok(())
    }

    /// Build the decision tree for a set of candidate windows, memoized by the (order
    /// independent) window set so equivalent choice points share nodes and discriminators.
    fn resolve(
        &mut self,
        cands: &[PartialProd<StorageT>],
    ) -> Result<NdIdx, TableError<StorageT>> {
        let mut key = cands.to_vec();
        key.sort_unstable();
        if let Some(&ndidx) = self.memo.get(&key) {
            return Ok(ndidx);
        }
        let ndidx = if cands.len() == 1 {
            self.add_node(ParserNode::Prod(cands[0]))
        } else {
            let ridx = self.grm.prod_to_rule(cands[0].pidx());
            let next_sets = cands
                .iter()
                .map(|c| {
                    seq_next(
                        &self.grm,
                        &self.firsts,
                        c.symbols(&self.grm),
                        &self.follows[usize::from(ridx)],
                    )
                })
                .collect::<Vec<_>>();
            let mut union = Vob::from_elem(usize::from(self.grm.tokens_len()), false);
            for ns in &next_sets {
                union.or(ns);
            }
            let mut buckets = Vec::new();
            for t in union.iter_set_bits(..) {
                let bucket = cands
                    .iter()
                    .zip(&next_sets)
                    .filter(|&(_, ns)| ns[t])
                    .map(|(&c, _)| c)
                    .collect::<Vec<_>>();
                buckets.push((TIdx(t.as_()), bucket));
            }
            if buckets.len() == 1 {
                let (tidx, bucket) = buckets.pop().unwrap();
                self.resolve_entry(ridx, tidx, bucket)?
            } else {
                let mut arms = Vec::with_capacity(buckets.len());
                for (tidx, bucket) in buckets {
                    arms.push((tidx, self.resolve_entry(ridx, tidx, bucket)?));
                }
                self.add_node(ParserNode::TokenLookahead { arms })
            }
        };
        self.memo.insert(key, ndidx);
        Ok(ndidx)
    }

    fn resolve_entry(
        &mut self,
        ridx: RIdx<StorageT>,
        tidx: TIdx<StorageT>,
        bucket: Vec<PartialProd<StorageT>>,
    ) -> Result<NdIdx, TableError<StorageT>> {
        if bucket.len() == 1 {
            Ok(self.add_node(ParserNode::Prod(bucket[0])))
        } else {
            self.resolve_ambiguous(ridx, tidx, bucket)
        }
    }

    fn resolve_ambiguous(
        &mut self,
        ridx: RIdx<StorageT>,
        tidx: TIdx<StorageT>,
        cands: Vec<PartialProd<StorageT>>,
    ) -> Result<NdIdx, TableError<StorageT>> {
        let mut sorted = cands.clone();
        sorted.sort_unstable();
        let key = (ridx, tidx, sorted);
        if self.in_progress.contains(&key) {
            return Err(TableError {
                kind: TableErrorKind::ParsingCycle {
                    rule: self.context_root_name(ridx),
                    token: self.token_display(tidx),
                },
            });
        }
        self.in_progress.insert(key.clone());
        let r = self.resolve_ambiguous_inner(ridx, tidx, &cands);
        self.in_progress.remove(&key);
        r
    }

    fn resolve_ambiguous_inner(
        &mut self,
        ridx: RIdx<StorageT>,
        tidx: TIdx<StorageT>,
        cands: &[PartialProd<StorageT>],
    ) -> Result<NdIdx, TableError<StorageT>> {
        // Common prefix factoring. An all-token prefix is left for discriminator synthesis,
        // which gathers the suffixes behind the lookahead token directly.
        let mut prefix = cands[0].symbols(&self.grm).to_vec();
        for c in &cands[1..] {
            let syms = c.symbols(&self.grm);
            let mut i = 0;
            while i < prefix.len() && i < syms.len() && prefix[i] == syms[i] {
                i += 1;
            }
            prefix.truncate(i);
        }
        if !prefix.is_empty() && prefix.iter().any(|sym| matches!(sym, Symbol::Rule(_))) {
            let advanced = cands
                .iter()
                .map(|c| c.advance(prefix.len()))
                .collect::<Vec<_>>();
            let rest = self.resolve(&advanced)?;
            return Ok(self.add_node(ParserNode::Prefix {
                symbols: prefix,
                rest,
            }));
        }

        if self.disc_idx.contains_key(&ridx) {
            // Inside a discriminator, synthesizing a fresh discriminator would nest
            // speculation at parse time; reuse an existing one instead.
            if let Some(ndidx) = self.reuse_discriminator(ridx, tidx, cands)? {
                return Ok(ndidx);
            }
        } else if let Some(ndidx) = self.synthesize_discriminator(ridx, tidx, cands)? {
            return Ok(ndidx);
        }

        self.resolve_with_override(ridx, tidx, cands)
    }

    /// Expand `seq`'s leading rules (only through productions whose NEXT set contains `tidx`)
    /// until `tidx` itself is the leading symbol, recording each distinct suffix behind it.
    /// Returns false if `origin` cannot put `tidx` at the front at all.
    fn gather(
        &self,
        seq: Vec<Symbol<StorageT>>,
        tidx: TIdx<StorageT>,
        ridx: RIdx<StorageT>,
        origin: PartialProd<StorageT>,
        out: &mut Vec<(Vec<Symbol<StorageT>>, PartialProd<StorageT>)>,
        conflict: &mut bool,
    ) -> bool {
        match seq.first().copied() {
            None => false,
            Some(Symbol::Token(t)) if t == tidx => {
                let suffix = seq[1..].to_vec();
                if let Some((_, o)) = out.iter().find(|(s, _)| *s == suffix) {
                    if *o != origin {
                        *conflict = true;
                    }
                    return true;
                }
                out.push((suffix, origin));
                true
            }
            Some(Symbol::Token(_)) => false,
            Some(Symbol::Rule(lead)) => {
                let mut any = false;
                for &pidx in self.grm.rule_to_prods(lead) {
                    let mut expanded = self.grm.prod(pidx).to_vec();
                    expanded.extend_from_slice(&seq[1..]);
                    let next = seq_next(
                        &self.grm,
                        &self.firsts,
                        &expanded,
                        &self.follows[usize::from(ridx)],
                    );
                    if next[usize::from(tidx)] {
                        any |= self.gather(expanded, tidx, ridx, origin, out, conflict);
                    }
                }
                any
            }
        }
    }

    fn synthesize_discriminator(
        &mut self,
        ridx: RIdx<StorageT>,
        tidx: TIdx<StorageT>,
        cands: &[PartialProd<StorageT>],
    ) -> Result<Option<NdIdx>, TableError<StorageT>> {
        let mut suffixes = Vec::new();
        let mut conflict = false;
        for &c in cands {
            let seq = c.symbols(&self.grm).to_vec();
            if !self.gather(seq, tidx, ridx, c, &mut suffixes, &mut conflict) || conflict {
                // A candidate with no suffix behind the token, or two candidates sharing a
                // suffix: genuinely ambiguous at this depth.
                return Ok(None);
            }
        }

        // Reuse a discriminator with exactly this suffix set, provided its FOLLOW set is a
        // superset of ours so its boundary decisions stay sound here.
        let mut reused = None;
        'disc: for d in &self.discs {
            let dprods = self.grm.rule_to_prods(d.ridx);
            if dprods.len() != suffixes.len() {
                continue;
            }
            let mut arms = Vec::with_capacity(dprods.len());
            for &dp in dprods {
                match suffixes
                    .iter()
                    .find(|(s, _)| s.as_slice() == self.grm.prod(dp))
                {
                    Some(&(_, origin)) => arms.push((dp, origin)),
                    None => continue 'disc,
                }
            }
            if !vob_subset(
                &self.follows[usize::from(ridx)],
                &self.follows[usize::from(d.ridx)],
            ) {
                continue;
            }
            reused = Some((d.ridx, arms));
            break;
        }
        if let Some((disc, arms)) = reused {
            return Ok(Some(self.add_node(ParserNode::GrammarLookahead {
                tidx,
                disc,
                arms,
            })));
        }

        let dridx = self.mint_disc_rule(ridx);
        let mut prod_origin = FnvHashMap::default();
        let mut arms = Vec::with_capacity(suffixes.len());
        for (syms, origin) in suffixes {
            let dp = self.add_disc_prod(dridx, syms);
            prod_origin.insert(dp, origin.pidx());
            arms.push((dp, origin));
        }
        self.register_disc(dridx, (ridx, tidx), prod_origin);
        Ok(Some(self.add_node(ParserNode::GrammarLookahead {
            tidx,
            disc: dridx,
            arms,
        })))
    }

    /// Search existing discriminators for one whose productions form a longest-match prefix
    /// mapping over the candidates: every candidate has exactly one best (longest, non-empty)
    /// matching production and the truncated remainders stay within the discriminator's
    /// FOLLOW set. If only a subset of the discriminator's token-compatible productions is
    /// used, a narrowed copy is minted so the parse cannot commit to an unmapped production.
    fn reuse_discriminator(
        &mut self,
        ridx: RIdx<StorageT>,
        tidx: TIdx<StorageT>,
        cands: &[PartialProd<StorageT>],
    ) -> Result<Option<NdIdx>, TableError<StorageT>> {
        let cand_syms = cands
            .iter()
            .map(|c| c.symbols(&self.grm).to_vec())
            .collect::<Vec<_>>();
        let mut choice = None;
        'disc: for d in &self.discs {
            if d.ridx == ridx {
                continue;
            }
            let df = &self.follows[usize::from(d.ridx)];
            let compat = self
                .grm
                .rule_to_prods(d.ridx)
                .iter()
                .copied()
                .filter(|&dp| {
                    seq_next(&self.grm, &self.firsts, self.grm.prod(dp), df)[usize::from(tidx)]
                })
                .collect::<Vec<_>>();
            if compat.is_empty() {
                continue;
            }
            let mut best = Vec::with_capacity(cands.len());
            for (c, syms) in cands.iter().zip(&cand_syms) {
                let mut best_dp = None;
                let mut best_len = 0;
                let mut dup = false;
                for &dp in &compat {
                    let dsyms = self.grm.prod(dp);
                    if !dsyms.is_empty()
                        && dsyms.len() <= syms.len()
                        && dsyms == &syms[..dsyms.len()]
                    {
                        if dsyms.len() > best_len {
                            best_dp = Some(dp);
                            best_len = dsyms.len();
                            dup = false;
                        } else if dsyms.len() == best_len {
                            dup = true;
                        }
                    }
                }
                match best_dp {
                    Some(dp) if !dup => best.push((*c, dp, best_len)),
                    _ => continue 'disc,
                }
            }
            for &(c, _, len) in &best {
                let rem = c.advance(len);
                let s = seq_next(
                    &self.grm,
                    &self.firsts,
                    rem.symbols(&self.grm),
                    &self.follows[usize::from(ridx)],
                );
                if !vob_subset(&s, df) {
                    continue 'disc;
                }
            }
            let used = compat
                .iter()
                .copied()
                .filter(|dp| best.iter().any(|&(_, b, _)| b == *dp))
                .collect::<Vec<_>>();
            choice = Some((d.ridx, compat, used, best));
            break;
        }
        let Some((dridx, compat, used, best)) = choice else {
            return Ok(None);
        };

        let (inner_ridx, remap) = if used.len() == compat.len() {
            (
                dridx,
                used.iter().map(|&dp| (dp, dp)).collect::<FnvHashMap<_, _>>(),
            )
        } else {
            let nridx = self.mint_disc_rule(dridx);
            let mut prod_origin = FnvHashMap::default();
            let mut remap = FnvHashMap::default();
            for &dp in &used {
                let syms = self.grm.prod(dp).to_vec();
                let np = self.add_disc_prod(nridx, syms);
                prod_origin.insert(np, dp);
                remap.insert(dp, np);
            }
            self.register_disc(nridx, (ridx, tidx), prod_origin);
            (nridx, remap)
        };

        let mut arms = Vec::with_capacity(used.len());
        for &dp in &used {
            let group = best
                .iter()
                .filter(|&&(_, b, _)| b == dp)
                .map(|&(c, _, len)| c.advance(len))
                .collect::<Vec<_>>();
            let node = self.resolve(&group)?;
            arms.push((remap[&dp], node));
        }
        let inner = self.add_node(ParserNode::Symbol(inner_ridx));
        Ok(Some(self.add_node(ParserNode::MapResult { inner, arms })))
    }

    /// A fresh discriminator rule inheriting `follow_of`'s FOLLOW set.
    fn mint_disc_rule(&mut self, follow_of: RIdx<StorageT>) -> RIdx<StorageT> {
        let name = self.grm.fresh_rule_name(&format!("%{}", self.discs.len()));
        let dridx = self.grm.add_rule(name);
        debug_assert_eq!(usize::from(dridx), self.follows.len());
        let f = self.follows[usize::from(follow_of)].clone();
        self.follows.push(f);
        dridx
    }

    fn add_disc_prod(
        &mut self,
        dridx: RIdx<StorageT>,
        syms: Vec<Symbol<StorageT>>,
    ) -> PIdx<StorageT> {
        let dp = self.grm.add_prod(dridx, syms, ProdExtras::default());
        debug_assert_eq!(usize::from(dp), self.prod_origins.len());
        self.prod_origins.push(Vec::new());
        dp
    }

    fn register_disc(
        &mut self,
        dridx: RIdx<StorageT>,
        created_for: (RIdx<StorageT>, TIdx<StorageT>),
        prod_origin: FnvHashMap<PIdx<StorageT>, PIdx<StorageT>>,
    ) {
        self.disc_idx.insert(dridx, self.discs.len());
        self.discs.push(DiscInfo {
            ridx: dridx,
            created_for,
            prod_origin,
        });
        self.pending.push(dridx);
    }

    fn resolve_with_override(
        &mut self,
        ridx: RIdx<StorageT>,
        tidx: TIdx<StorageT>,
        cands: &[PartialProd<StorageT>],
    ) -> Result<NdIdx, TableError<StorageT>> {
        let mut path = self.rule_path(ridx);
        path.push(Symbol::Token(tidx));
        let rule = self.context_root_name(ridx);
        let token = self.token_display(tidx);

        let mut best: Option<&AmbiguityOverride<StorageT>> = None;
        let mut tied = false;
        for ov in &self.overrides {
            if !path.ends_with(&ov.path_suffix) {
                continue;
            }
            match best {
                Some(b) if ov.path_suffix.len() < b.path_suffix.len() => {}
                Some(b) if ov.path_suffix.len() == b.path_suffix.len() => tied = true,
                _ => {
                    best = Some(ov);
                    tied = false;
                }
            }
        }
        let preferred = match best {
            None => {
                return Err(TableError {
                    kind: TableErrorKind::UnresolvableAmbiguity {
                        rule,
                        token,
                        rules: self.cand_rule_names(cands),
                    },
                });
            }
            Some(_) if tied => {
                return Err(TableError {
                    kind: TableErrorKind::AmbiguousOverride { rule, token },
                });
            }
            Some(ov) => ov.pidx,
        };

        let winners = cands
            .iter()
            .copied()
            .filter(|c| self.user_pidx(c.pidx()) == Some(preferred))
            .collect::<Vec<_>>();
        match winners.len() {
            0 => Err(TableError {
                kind: TableErrorKind::UnresolvableAmbiguity {
                    rule,
                    token,
                    rules: self.cand_rule_names(cands),
                },
            }),
            1 => Ok(self.add_node(ParserNode::Prod(winners[0]))),
            _ => {
                // Several candidates descend from the preferred production: pick the one
                // whose window shares the longest tail with it.
                let psyms = self.grm.prod(preferred).to_vec();
                let tails = winners
                    .iter()
                    .map(|c| {
                        let syms = c.symbols(&self.grm);
                        let mut l = 0;
                        while l < syms.len()
                            && l < psyms.len()
                            && syms[syms.len() - 1 - l] == psyms[psyms.len() - 1 - l]
                        {
                            l += 1;
                        }
                        l
                    })
                    .collect::<Vec<_>>();
                let max = *tails.iter().max().unwrap();
                if tails.iter().filter(|&&l| l == max).count() > 1 {
                    return Err(TableError {
                        kind: TableErrorKind::AmbiguousOverride { rule, token },
                    });
                }
                let i = tails.iter().position(|&l| l == max).unwrap();
                Ok(self.add_node(ParserNode::Prod(winners[i])))
            }
        }
    }

    /// The context path of a choice point: the original rule the chain of discriminators was
    /// rooted at, followed by the lookahead token of each nested discriminator, outermost
    /// first.
    fn rule_path(&self, ridx: RIdx<StorageT>) -> Vec<Symbol<StorageT>> {
        match self.disc_idx.get(&ridx) {
            Some(&i) => {
                let (pr, pt) = self.discs[i].created_for;
                let mut path = self.rule_path(pr);
                path.push(Symbol::Token(pt));
                path
            }
            None => vec![Symbol::Rule(ridx)],
        }
    }

    fn context_root_name(&self, mut ridx: RIdx<StorageT>) -> String {
        while let Some(&i) = self.disc_idx.get(&ridx) {
            ridx = self.discs[i].created_for.0;
        }
        self.grm.rule_name(ridx).to_string()
    }

    fn token_display(&self, tidx: TIdx<StorageT>) -> String {
        self.grm.token_name(tidx).unwrap_or("$").to_string()
    }

    /// Chase a production back through discriminator descent and rewrite origins to the
    /// caller-defined production it reports as, if any.
    fn user_pidx(&self, mut pidx: PIdx<StorageT>) -> Option<PIdx<StorageT>> {
        loop {
            let ridx = self.grm.prod_to_rule(pidx);
            match self.disc_idx.get(&ridx) {
                Some(&i) => match self.discs[i].prod_origin.get(&pidx) {
                    Some(&p) => pidx = p,
                    None => return None,
                },
                None => break,
            }
        }
        self.prod_origins[usize::from(pidx)].last().copied()
    }

    fn cand_rule_names(&self, cands: &[PartialProd<StorageT>]) -> Vec<String> {
        let mut out = Vec::new();
        for c in cands {
            let name = match self.user_pidx(c.pidx()) {
                Some(p) => self.grm.rule_name(self.grm.prod_to_rule(p)).to_string(),
                None => self
                    .grm
                    .rule_name(self.grm.prod_to_rule(c.pidx()))
                    .to_string(),
            };
            if !out.contains(&name) {
                out.push(name);
            }
        }
        out
    }
}
