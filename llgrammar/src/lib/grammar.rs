use std::{error::Error, fmt};

use indexmap::IndexMap;
use num_traits::{AsPrimitive, PrimInt, Unsigned};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use vob::Vob;

use crate::{PIdx, RIdx, SIdx, Symbol, TIdx};

/// An action against a named parser variable, attached to at most one production. Parser
/// variables are stacks of booleans which only exist while a parse is running; they let a
/// grammar gate context-sensitive productions (e.g. contextual keywords).
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VarAction {
    /// Push a new `false` entry onto the named variable's stack.
    Push(String),
    /// Flip the top entry of the named variable's stack to `true`.
    Set(String),
    /// Remove the top entry of the named variable's stack.
    Pop(String),
}

impl VarAction {
    /// The name of the variable this action operates on.
    pub fn var(&self) -> &str {
        match self {
            VarAction::Push(n) | VarAction::Set(n) | VarAction::Pop(n) => n,
        }
    }
}

/// Optional per-production metadata.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProdExtras {
    /// Should a simple recursive production be rewritten right-associatively? Everything binary
    /// not marked is treated as left-associative.
    pub right_assoc: bool,
    /// The production may only be applied while this variable's stack is non-empty with a
    /// `true` top entry.
    pub required_var: Option<String>,
    /// Applied when the production is applied during a non-speculative parse.
    pub action: Option<VarAction>,
}

/// A window into a production's symbols: the suffix of a production still to be matched.
/// Equality, ordering and hashing are by `(production, start, length)`.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PartialProd<StorageT> {
    pidx: PIdx<StorageT>,
    start: SIdx<StorageT>,
    len: SIdx<StorageT>,
}

impl<StorageT: 'static + PrimInt + Unsigned> PartialProd<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// A window spanning the whole of production `pidx`.
    pub fn spanning(grm: &Grammar<StorageT>, pidx: PIdx<StorageT>) -> Self {
        PartialProd {
            pidx,
            start: SIdx(StorageT::zero()),
            len: grm.prod_len(pidx),
        }
    }

    pub fn pidx(&self) -> PIdx<StorageT> {
        self.pidx
    }

    pub fn start(&self) -> SIdx<StorageT> {
        self.start
    }

    pub fn len(&self) -> usize {
        usize::from(self.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len == SIdx(StorageT::zero())
    }

    /// The symbols still to be matched. Slicing never copies: a window spanning the whole
    /// production is the production's own symbol slice.
    pub fn symbols<'a>(&self, grm: &'a Grammar<StorageT>) -> &'a [Symbol<StorageT>] {
        let start = usize::from(self.start);
        &grm.prod(self.pidx)[start..start + usize::from(self.len)]
    }

    /// This window advanced past its first `n` symbols. Panics if `n` exceeds the window.
    pub fn advance(&self, n: usize) -> Self {
        assert!(n <= usize::from(self.len));
        PartialProd {
            pidx: self.pidx,
            start: SIdx((usize::from(self.start) + n).as_()),
            len: SIdx((usize::from(self.len) - n).as_()),
        }
    }

    /// Does this window extend to the end of its production?
    pub fn ends_prod(&self, grm: &Grammar<StorageT>) -> bool {
        usize::from(self.start) + usize::from(self.len) == usize::from(grm.prod_len(self.pidx))
    }
}

/// Representation of a context-free grammar. See the [top-level documentation](../index.html)
/// for the guarantees this struct makes about rules, tokens, productions, and symbols.
///
/// A `Grammar` is immutable from the caller's point of view, but exposes a small growth API
/// (`add_rule`, `add_prod`, `retire_rule`) used by table construction: rewriting never
/// invalidates an index the caller has already been given.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Grammar<StorageT = u32> {
    /// A mapping from name -> `RIdx`, in rule insertion order.
    rule_map: IndexMap<String, RIdx<StorageT>>,
    /// A mapping from `TIdx` -> `Option<String>`. Every user-specified token has a name; the
    /// EOF token inserted at build time doesn't.
    token_names: Vec<Option<String>>,
    token_map: IndexMap<String, TIdx<StorageT>>,
    /// The offset of the EOF token.
    eof_token_idx: TIdx<StorageT>,
    /// The unique rule never referenced on any production's right-hand side.
    start_rule: RIdx<StorageT>,
    /// A list of all productions. Storage is append-only.
    prods: Vec<Vec<Symbol<StorageT>>>,
    /// A mapping from productions to their corresponding rule indexes.
    prods_rules: Vec<RIdx<StorageT>>,
    /// A mapping from rules to their productions, in priority order. A production may be
    /// dropped from this list by rewriting while remaining valid in `prods`.
    rules_prods: Vec<Vec<PIdx<StorageT>>>,
    prod_extras: Vec<ProdExtras>,
    /// Rules emptied by rewriting. Their indices stay valid for name lookups but they take no
    /// further part in parsing.
    retired_rules: Vob,
}

impl<StorageT: 'static + PrimInt + Unsigned> Grammar<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// How many rules does this grammar have?
    pub fn rules_len(&self) -> RIdx<StorageT> {
        RIdx(self.rules_prods.len().as_())
    }

    /// Return an iterator which produces (in order from `0..self.rules_len()`) all this
    /// grammar's valid `RIdx`s.
    pub fn iter_rules(&self) -> impl Iterator<Item = RIdx<StorageT>> + use<StorageT> {
        (0..self.rules_prods.len()).map(|x| RIdx(x.as_()))
    }

    /// How many tokens does this grammar have?
    pub fn tokens_len(&self) -> TIdx<StorageT> {
        TIdx(self.token_names.len().as_())
    }

    /// Return an iterator which produces (in order from `0..self.tokens_len()`) all this
    /// grammar's valid `TIdx`s.
    pub fn iter_tidxs(&self) -> impl Iterator<Item = TIdx<StorageT>> + use<StorageT> {
        (0..self.token_names.len()).map(|x| TIdx(x.as_()))
    }

    /// How many productions does this grammar have?
    pub fn prods_len(&self) -> PIdx<StorageT> {
        PIdx(self.prods.len().as_())
    }

    /// Return an iterator which produces (in order from `0..self.prods_len()`) all this
    /// grammar's valid `PIdx`s.
    pub fn iter_pidxs(&self) -> impl Iterator<Item = PIdx<StorageT>> + use<StorageT> {
        (0..self.prods.len()).map(|x| PIdx(x.as_()))
    }

    /// Get the sequence of symbols for production `pidx`. Panics if `pidx` doesn't exist.
    pub fn prod(&self, pidx: PIdx<StorageT>) -> &[Symbol<StorageT>] {
        &self.prods[usize::from(pidx)]
    }

    /// How many symbols does production `pidx` have? Panics if `pidx` doesn't exist.
    pub fn prod_len(&self, pidx: PIdx<StorageT>) -> SIdx<StorageT> {
        SIdx(self.prods[usize::from(pidx)].len().as_())
    }

    /// Return the rule index of the production `pidx`. Panics if `pidx` doesn't exist.
    pub fn prod_to_rule(&self, pidx: PIdx<StorageT>) -> RIdx<StorageT> {
        self.prods_rules[usize::from(pidx)]
    }

    /// Return the productions of rule `ridx`, in priority order. Panics if `ridx` doesn't
    /// exist.
    pub fn rule_to_prods(&self, ridx: RIdx<StorageT>) -> &[PIdx<StorageT>] {
        &self.rules_prods[usize::from(ridx)]
    }

    /// Return the name of rule `ridx`.
    pub fn rule_name(&self, ridx: RIdx<StorageT>) -> &str {
        self.rule_map.get_index(usize::from(ridx)).unwrap().0
    }

    /// Return the index of the rule named `n` or `None` if it doesn't exist.
    pub fn rule_idx(&self, n: &str) -> Option<RIdx<StorageT>> {
        self.rule_map.get(n).copied()
    }

    /// Return the name of token `tidx`, or `None` for the EOF token.
    pub fn token_name(&self, tidx: TIdx<StorageT>) -> Option<&str> {
        self.token_names[usize::from(tidx)].as_deref()
    }

    /// Return the index of the token named `n` or `None` if it doesn't exist.
    pub fn token_idx(&self, n: &str) -> Option<TIdx<StorageT>> {
        self.token_map.get(n).copied()
    }

    /// The index of the EOF token.
    pub fn eof_token_idx(&self) -> TIdx<StorageT> {
        self.eof_token_idx
    }

    /// The start rule: the unique rule never referenced on any production's right-hand side.
    pub fn start_rule_idx(&self) -> RIdx<StorageT> {
        self.start_rule
    }

    /// Is production `pidx` marked right-associative?
    pub fn prod_right_assoc(&self, pidx: PIdx<StorageT>) -> bool {
        self.prod_extras[usize::from(pidx)].right_assoc
    }

    /// The variable which must be set for production `pidx` to be applied, if any.
    pub fn prod_required_var(&self, pidx: PIdx<StorageT>) -> Option<&str> {
        self.prod_extras[usize::from(pidx)].required_var.as_deref()
    }

    /// The variable action of production `pidx`, if any.
    pub fn prod_action(&self, pidx: PIdx<StorageT>) -> Option<&VarAction> {
        self.prod_extras[usize::from(pidx)].action.as_ref()
    }

    /// Has rule `ridx` been retired by rewriting?
    pub fn rule_retired(&self, ridx: RIdx<StorageT>) -> bool {
        self.retired_rules[usize::from(ridx)]
    }

    /// Add a fresh rule with no productions. The name must not already be in use (see
    /// [`fresh_rule_name`](#method.fresh_rule_name)).
    pub fn add_rule(&mut self, name: String) -> RIdx<StorageT> {
        assert!(!self.rule_map.contains_key(&name) && !self.token_map.contains_key(&name));
        if self.rules_prods.len() > num_traits::cast(StorageT::max_value()).unwrap() {
            panic!("StorageT is not big enough to store this grammar's rules.");
        }
        let ridx = RIdx(self.rules_prods.len().as_());
        self.rule_map.insert(name, ridx);
        self.rules_prods.push(Vec::new());
        self.retired_rules.push(false);
        ridx
    }

    /// Append a production to rule `ridx`.
    pub fn add_prod(
        &mut self,
        ridx: RIdx<StorageT>,
        symbols: Vec<Symbol<StorageT>>,
        extras: ProdExtras,
    ) -> PIdx<StorageT> {
        if self.prods.len() > num_traits::cast(StorageT::max_value()).unwrap() {
            panic!("StorageT is not big enough to store this grammar's productions.");
        }
        let pidx = PIdx(self.prods.len().as_());
        self.prods.push(symbols);
        self.prods_rules.push(ridx);
        self.prod_extras.push(extras);
        self.rules_prods[usize::from(ridx)].push(pidx);
        pidx
    }

    /// Replace rule `ridx`'s production list wholesale. Productions dropped from the list stay
    /// valid in storage; they simply take no further part in parsing.
    pub fn set_rule_prods(&mut self, ridx: RIdx<StorageT>, pidxs: Vec<PIdx<StorageT>>) {
        for &pidx in &pidxs {
            self.prods_rules[usize::from(pidx)] = ridx;
        }
        self.rules_prods[usize::from(ridx)] = pidxs;
    }

    /// Empty rule `ridx`'s production list and flag it as no longer participating in parsing.
    pub fn retire_rule(&mut self, ridx: RIdx<StorageT>) {
        self.rules_prods[usize::from(ridx)].clear();
        self.retired_rules.set(usize::from(ridx), true);
    }

    /// Generate a rule name based on `base` that is guaranteed not to clash with any existing
    /// rule or token name.
    pub fn fresh_rule_name(&self, base: &str) -> String {
        let mut n = base.to_string();
        while self.rule_map.contains_key(&n) || self.token_map.contains_key(&n) {
            n.push('\'');
        }
        n
    }
}

impl<StorageT: 'static + PrimInt + Unsigned + fmt::Debug> fmt::Debug for Grammar<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Grammar {{")?;
        for ridx in self.iter_rules() {
            if self.rule_retired(ridx) {
                continue;
            }
            write!(f, "  {}:", self.rule_name(ridx))?;
            for (i, &pidx) in self.rule_to_prods(ridx).iter().enumerate() {
                if i > 0 {
                    write!(f, " |")?;
                }
                for sym in self.prod(pidx) {
                    match *sym {
                        Symbol::Rule(r) => write!(f, " {}", self.rule_name(r))?,
                        Symbol::Token(t) => {
                            write!(f, " '{}'", self.token_name(t).unwrap_or("$"))?
                        }
                    }
                }
            }
            writeln!(f, ";")?;
        }
        write!(f, "}}")
    }
}

/// The various different possible grammar validation errors.
#[derive(Debug, Eq, PartialEq)]
pub enum GrammarErrorKind {
    /// A rule was referenced (or declared) but given no productions.
    UndefinedRule(String),
    /// Every rule is referenced on some right-hand side, so no start rule exists.
    NoStartRule,
    /// More than one rule is never referenced on a right-hand side.
    MultipleStartRules(Vec<String>),
    /// A rule has the trivial self-referencing production `S -> S`.
    SelfReference(String),
}

/// Any error from grammar validation returns an instance of this struct.
#[derive(Debug, Eq, PartialEq)]
pub struct GrammarError {
    pub kind: GrammarErrorKind,
}

impl Error for GrammarError {}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            GrammarErrorKind::UndefinedRule(n) => {
                write!(f, "Rule '{}' is referenced but has no productions", n)
            }
            GrammarErrorKind::NoStartRule => {
                write!(f, "No rule is unreferenced, so no start rule exists")
            }
            GrammarErrorKind::MultipleStartRules(ns) => {
                write!(f, "Multiple possible start rules: {}", ns.join(", "))
            }
            GrammarErrorKind::SelfReference(n) => {
                write!(f, "Rule '{}' has the trivial self-reference '{0} -> {0}'", n)
            }
        }
    }
}

/// Incrementally construct a [`Grammar`](struct.Grammar.html). Tokens and rules are interned by
/// name: interning the same name twice returns the same symbol. The order in which productions
/// are added to a rule is their priority order.
pub struct GrammarBuilder<StorageT = u32> {
    rule_map: IndexMap<String, RIdx<StorageT>>,
    token_map: IndexMap<String, TIdx<StorageT>>,
    prods: Vec<Vec<Symbol<StorageT>>>,
    prods_rules: Vec<RIdx<StorageT>>,
    rules_prods: Vec<Vec<PIdx<StorageT>>>,
    prod_extras: Vec<ProdExtras>,
}

impl<StorageT: 'static + PrimInt + Unsigned> GrammarBuilder<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    pub fn new() -> Self {
        GrammarBuilder {
            rule_map: IndexMap::new(),
            token_map: IndexMap::new(),
            prods: Vec::new(),
            prods_rules: Vec::new(),
            rules_prods: Vec::new(),
            prod_extras: Vec::new(),
        }
    }

    /// Intern the token named `n`.
    pub fn token(&mut self, n: &str) -> TIdx<StorageT> {
        if let Some(&tidx) = self.token_map.get(n) {
            return tidx;
        }
        if self.token_map.len() + 1 > num_traits::cast(StorageT::max_value()).unwrap() {
            panic!("StorageT is not big enough to store this grammar's tokens.");
        }
        let tidx = TIdx(self.token_map.len().as_());
        self.token_map.insert(n.to_string(), tidx);
        tidx
    }

    /// Intern the rule named `n`.
    pub fn rule(&mut self, n: &str) -> RIdx<StorageT> {
        if let Some(&ridx) = self.rule_map.get(n) {
            return ridx;
        }
        if self.rule_map.len() > num_traits::cast(StorageT::max_value()).unwrap() {
            panic!("StorageT is not big enough to store this grammar's rules.");
        }
        let ridx = RIdx(self.rule_map.len().as_());
        self.rule_map.insert(n.to_string(), ridx);
        self.rules_prods.push(Vec::new());
        ridx
    }

    /// Add a production for `ridx` with default metadata.
    pub fn prod(&mut self, ridx: RIdx<StorageT>, symbols: &[Symbol<StorageT>]) -> PIdx<StorageT> {
        self.prod_extras(ridx, symbols, ProdExtras::default())
    }

    /// Add a production for `ridx`.
    pub fn prod_extras(
        &mut self,
        ridx: RIdx<StorageT>,
        symbols: &[Symbol<StorageT>],
        extras: ProdExtras,
    ) -> PIdx<StorageT> {
        if self.prods.len() > num_traits::cast(StorageT::max_value()).unwrap() {
            panic!("StorageT is not big enough to store this grammar's productions.");
        }
        let pidx = PIdx(self.prods.len().as_());
        self.prods.push(symbols.to_vec());
        self.prods_rules.push(ridx);
        self.prod_extras.push(extras);
        self.rules_prods[usize::from(ridx)].push(pidx);
        pidx
    }

    /// Validate and freeze the grammar. The EOF token is appended here; the start rule is
    /// inferred as the unique rule never referenced on a right-hand side.
    pub fn build(mut self) -> Result<Grammar<StorageT>, GrammarError> {
        let mut referenced = vec![false; self.rules_prods.len()];
        for (pidx, prod) in self.prods.iter().enumerate() {
            for sym in prod {
                if let Symbol::Rule(ridx) = *sym {
                    if prod.len() == 1 && self.prods_rules[pidx] == ridx {
                        return Err(GrammarError {
                            kind: GrammarErrorKind::SelfReference(
                                self.rule_map.get_index(usize::from(ridx)).unwrap().0.clone(),
                            ),
                        });
                    }
                    referenced[usize::from(ridx)] = true;
                }
            }
        }

        for (n, &ridx) in &self.rule_map {
            if self.rules_prods[usize::from(ridx)].is_empty() {
                return Err(GrammarError {
                    kind: GrammarErrorKind::UndefinedRule(n.clone()),
                });
            }
        }

        let mut starts = self
            .rule_map
            .iter()
            .filter(|&(_, &ridx)| !referenced[usize::from(ridx)])
            .map(|(n, &ridx)| (n.clone(), ridx))
            .collect::<Vec<_>>();
        let start_rule = match starts.len() {
            0 => {
                return Err(GrammarError {
                    kind: GrammarErrorKind::NoStartRule,
                });
            }
            1 => starts.pop().unwrap().1,
            _ => {
                return Err(GrammarError {
                    kind: GrammarErrorKind::MultipleStartRules(
                        starts.into_iter().map(|(n, _)| n).collect(),
                    ),
                });
            }
        };

        let mut token_names = self
            .token_map
            .keys()
            .map(|n| Some(n.clone()))
            .collect::<Vec<_>>();
        let eof_token_idx = TIdx(token_names.len().as_());
        token_names.push(None);

        let rules_len = self.rules_prods.len();
        Ok(Grammar {
            rule_map: self.rule_map,
            token_names,
            token_map: self.token_map,
            eof_token_idx,
            start_rule,
            prods: self.prods,
            prods_rules: self.prods_rules,
            rules_prods: self.rules_prods,
            prod_extras: self.prod_extras,
            retired_rules: Vob::from_elem(rules_len, false),
        })
    }
}
