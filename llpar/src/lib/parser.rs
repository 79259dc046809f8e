use std::{error::Error, fmt};

use fnv::FnvHashMap;
use llgrammar::{Grammar, PIdx, PartialProd, RIdx, Symbol, TIdx, VarAction};
use lltable::{ParseTable, ParserNode};
use num_traits::{AsPrimitive, PrimInt, Unsigned};

/// Receives reduction events during a parse, in left-to-right, bottom-up order.
pub trait ParseListener<StorageT> {
    /// A terminal was consumed.
    fn token_parsed(&mut self, tidx: TIdx<StorageT>);
    /// A caller-defined rule was applied: production `pidx` of rule `ridx`. Events for the
    /// rule's children have already been delivered.
    fn rule_parsed(&mut self, ridx: RIdx<StorageT>, pidx: PIdx<StorageT>);
}

/// The various different possible parse errors.
#[derive(Debug, Eq, PartialEq)]
pub enum ParseErrorKind {
    /// The next token matched none of the alternatives valid at this point.
    UnexpectedToken {
        expected: Vec<String>,
        found: String,
    },
    /// A context-sensitive production was applied while its governing variable was unset.
    RequiredVarUnset { var: String },
    /// A `Set` or `Pop` action ran against an empty variable stack.
    VarStackEmpty { var: String },
    /// The grammar demanded a speculative sub-parse while one was already active.
    NestedLookahead,
}

/// Any parse failure returns an instance of this struct; `off` is the offset into the token
/// sequence at which the failure was detected.
#[derive(Debug, Eq, PartialEq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub off: usize,
}

impl Error for ParseError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            ParseErrorKind::UnexpectedToken { expected, found } => write!(
                f,
                "Unexpected token '{}' at offset {} (expected one of: {})",
                found,
                self.off,
                expected.join(", ")
            ),
            ParseErrorKind::RequiredVarUnset { var } => write!(
                f,
                "Parser variable '{}' must be set at offset {}",
                var, self.off
            ),
            ParseErrorKind::VarStackEmpty { var } => write!(
                f,
                "Parser variable '{}' has an empty stack at offset {}",
                var, self.off
            ),
            ParseErrorKind::NestedLookahead => write!(
                f,
                "Nested speculative lookahead at offset {} is not supported",
                self.off
            ),
        }
    }
}

/// Parse `tokens` (implicitly EOF-terminated) against `tbl`, reporting reductions to
/// `listener`. The whole input must be consumed.
pub fn parse<StorageT: 'static + PrimInt + Unsigned, L: ParseListener<StorageT>>(
    tbl: &ParseTable<StorageT>,
    tokens: &[TIdx<StorageT>],
    listener: &mut L,
) -> Result<(), ParseError>
where
    usize: AsPrimitive<StorageT>,
{
    let mut psr = Parser {
        tbl,
        tokens,
        listener,
        idx: 0,
        la_idx: None,
        vars: FnvHashMap::default(),
    };
    psr.parse_rule(tbl.grammar().start_rule_idx())?;
    let next = psr.peek();
    if next != tbl.grammar().eof_token_idx() {
        return Err(ParseError {
            kind: ParseErrorKind::UnexpectedToken {
                expected: vec!["$".to_string()],
                found: psr.token_display(next),
            },
            off: psr.cur(),
        });
    }
    Ok(())
}

struct Parser<'a, StorageT, L> {
    tbl: &'a ParseTable<StorageT>,
    tokens: &'a [TIdx<StorageT>],
    listener: &'a mut L,
    /// The committed consumption cursor.
    idx: usize,
    /// A second cursor, active only inside a speculative discriminator parse. While it is
    /// active no listener events fire and no variable actions run.
    la_idx: Option<usize>,
    vars: FnvHashMap<String, Vec<bool>>,
}

impl<StorageT: 'static + PrimInt + Unsigned, L: ParseListener<StorageT>>
    Parser<'_, StorageT, L>
where
    usize: AsPrimitive<StorageT>,
{
    fn cur(&self) -> usize {
        self.la_idx.unwrap_or(self.idx)
    }

    fn peek(&self) -> TIdx<StorageT> {
        self.tokens
            .get(self.cur())
            .copied()
            .unwrap_or_else(|| self.tbl.grammar().eof_token_idx())
    }

    fn bump(&mut self) {
        match self.la_idx {
            Some(i) => self.la_idx = Some(i + 1),
            None => self.idx += 1,
        }
    }

    fn token_display(&self, tidx: TIdx<StorageT>) -> String {
        self.tbl
            .grammar()
            .token_name(tidx)
            .unwrap_or("$")
            .to_string()
    }

    fn eat(&mut self, tidx: TIdx<StorageT>) -> Result<(), ParseError> {
        let next = self.peek();
        if next != tidx {
            return Err(ParseError {
                kind: ParseErrorKind::UnexpectedToken {
                    expected: vec![self.token_display(tidx)],
                    found: self.token_display(next),
                },
                off: self.cur(),
            });
        }
        self.bump();
        if self.la_idx.is_none() {
            self.listener.token_parsed(tidx);
        }
        Ok(())
    }

    /// Parse rule `ridx`, returning the production applied at its top level.
    fn parse_rule(&mut self, ridx: RIdx<StorageT>) -> Result<PIdx<StorageT>, ParseError> {
        match self.tbl.rule_root(ridx) {
            Some(root) => self.eval(root),
            None => panic!("Internal error: no decision tree for rule"),
        }
    }

    fn eval(&mut self, ndidx: lltable::NdIdx) -> Result<PIdx<StorageT>, ParseError> {
        match self.tbl.node(ndidx) {
            ParserNode::Symbol(ridx) => self.parse_rule(*ridx),
            ParserNode::Prod(pp) => self.parse_prod(*pp),
            ParserNode::Prefix { symbols, rest } => {
                let (symbols, rest) = (symbols.clone(), *rest);
                self.consume_syms(&symbols)?;
                self.eval(rest)
            }
            ParserNode::TokenLookahead { arms } => {
                let next = self.peek();
                match arms.iter().find(|&&(tidx, _)| tidx == next) {
                    Some(&(_, arm)) => self.eval(arm),
                    None => Err(ParseError {
                        kind: ParseErrorKind::UnexpectedToken {
                            expected: arms
                                .iter()
                                .map(|&(tidx, _)| self.token_display(tidx))
                                .collect(),
                            found: self.token_display(next),
                        },
                        off: self.cur(),
                    }),
                }
            }
            ParserNode::GrammarLookahead { tidx, disc, arms } => {
                let (tidx, disc, arms) = (*tidx, *disc, arms.clone());
                let next = self.peek();
                if next != tidx {
                    return Err(ParseError {
                        kind: ParseErrorKind::UnexpectedToken {
                            expected: vec![self.token_display(tidx)],
                            found: self.token_display(next),
                        },
                        off: self.cur(),
                    });
                }
                if self.la_idx.is_some() {
                    return Err(ParseError {
                        kind: ParseErrorKind::NestedLookahead,
                        off: self.cur(),
                    });
                }
                // Speculate from just past the lookahead token; the committed parse below
                // re-consumes from the real cursor.
                self.la_idx = Some(self.idx + 1);
                let applied = self.parse_rule(disc);
                self.la_idx = None;
                let applied = applied?;
                match arms.iter().find(|&&(dp, _)| dp == applied) {
                    Some(&(_, pp)) => self.parse_prod(pp),
                    None => panic!("Internal error: discriminator applied an unmapped production"),
                }
            }
            ParserNode::MapResult { inner, arms } => {
                let (inner, arms) = (*inner, arms.clone());
                let applied = self.eval(inner)?;
                match arms.iter().find(|&&(pidx, _)| pidx == applied) {
                    Some(&(_, arm)) => self.eval(arm),
                    None => panic!("Internal error: unmapped inner production"),
                }
            }
        }
    }

    fn consume_syms(&mut self, syms: &[Symbol<StorageT>]) -> Result<(), ParseError> {
        for sym in syms {
            match *sym {
                Symbol::Token(tidx) => self.eat(tidx)?,
                Symbol::Rule(ridx) => {
                    self.parse_rule(ridx)?;
                }
            }
        }
        Ok(())
    }

    fn parse_prod(&mut self, pp: PartialProd<StorageT>) -> Result<PIdx<StorageT>, ParseError> {
        let grm = self.tbl.grammar();
        let pidx = pp.pidx();
        if let Some(var) = grm.prod_required_var(pidx) {
            let set = self
                .vars
                .get(var)
                .and_then(|stack| stack.last())
                .copied()
                .unwrap_or(false);
            if !set {
                return Err(ParseError {
                    kind: ParseErrorKind::RequiredVarUnset {
                        var: var.to_string(),
                    },
                    off: self.cur(),
                });
            }
        }
        if self.la_idx.is_none() {
            if let Some(action) = grm.prod_action(pidx) {
                self.apply_action(action)?;
            }
        }
        let syms = pp.symbols(grm).to_vec();
        self.consume_syms(&syms)?;
        if pp.ends_prod(grm) && self.la_idx.is_none() {
            // Innermost first: an inlined alias chain reports the deepest original rule
            // before the ones that wrapped it.
            for &opidx in self.tbl.prod_origins(pidx) {
                self.listener
                    .rule_parsed(grm.prod_to_rule(opidx), opidx);
            }
        }
        Ok(pidx)
    }

    fn apply_action(&mut self, action: &VarAction) -> Result<(), ParseError> {
        match action {
            VarAction::Push(var) => {
                self.vars.entry(var.clone()).or_default().push(false);
            }
            VarAction::Set(var) => match self.vars.get_mut(var).and_then(|s| s.last_mut()) {
                Some(top) => *top = true,
                None => {
                    return Err(ParseError {
                        kind: ParseErrorKind::VarStackEmpty { var: var.clone() },
                        off: self.cur(),
                    });
                }
            },
            VarAction::Pop(var) => {
                if self.vars.get_mut(var).and_then(|s| s.pop()).is_none() {
                    return Err(ParseError {
                        kind: ParseErrorKind::VarStackEmpty { var: var.clone() },
                        off: self.cur(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// A generic parse tree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Node<StorageT> {
    /// Terminals are leaves.
    Term { tidx: TIdx<StorageT> },
    /// Nonterminals are interior nodes.
    Nonterm {
        ridx: RIdx<StorageT>,
        nodes: Vec<Node<StorageT>>,
    },
}

impl<StorageT: 'static + PrimInt + Unsigned> Node<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Return a pretty-printed version of this node.
    pub fn pp(&self, grm: &Grammar<StorageT>) -> String {
        let mut st = vec![(0, self)];
        let mut s = String::new();
        while let Some((indent, e)) = st.pop() {
            for _ in 0..indent {
                s.push(' ');
            }
            match *e {
                Node::Term { tidx } => {
                    s.push_str(grm.token_name(tidx).unwrap_or("$"));
                    s.push('\n');
                }
                Node::Nonterm { ridx, ref nodes } => {
                    s.push_str(grm.rule_name(ridx));
                    s.push('\n');
                    for x in nodes.iter().rev() {
                        st.push((indent + 1, x));
                    }
                }
            }
        }
        s
    }
}

/// A listener which builds a parse tree: a leaf per terminal, and per rule event a parent
/// wrapping as many nodes as the rule's production has symbols.
pub struct TreeBuilder<'a, StorageT> {
    grm: &'a Grammar<StorageT>,
    stack: Vec<Node<StorageT>>,
}

impl<'a, StorageT: 'static + PrimInt + Unsigned> TreeBuilder<'a, StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    pub fn new(grm: &'a Grammar<StorageT>) -> Self {
        TreeBuilder {
            grm,
            stack: Vec::new(),
        }
    }

    /// The completed tree, or `None` if the events seen so far don't form exactly one.
    pub fn finish(mut self) -> Option<Node<StorageT>> {
        if self.stack.len() == 1 {
            self.stack.pop()
        } else {
            None
        }
    }
}

impl<StorageT: 'static + PrimInt + Unsigned> ParseListener<StorageT>
    for TreeBuilder<'_, StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    fn token_parsed(&mut self, tidx: TIdx<StorageT>) {
        self.stack.push(Node::Term { tidx });
    }

    fn rule_parsed(&mut self, ridx: RIdx<StorageT>, pidx: PIdx<StorageT>) {
        let n = self.grm.prod(pidx).len();
        let nodes = self.stack.split_off(self.stack.len() - n);
        self.stack.push(Node::Nonterm { ridx, nodes });
    }
}

/// Parse `tokens` and return the parse tree, in terms of the caller's original rules.
pub fn parse_tree<StorageT: 'static + PrimInt + Unsigned>(
    tbl: &ParseTable<StorageT>,
    tokens: &[TIdx<StorageT>],
) -> Result<Node<StorageT>, ParseError>
where
    usize: AsPrimitive<StorageT>,
{
    let mut tb = TreeBuilder::new(tbl.grammar());
    parse(tbl, tokens, &mut tb)?;
    match tb.finish() {
        Some(node) => Ok(node),
        None => panic!("Internal error: listener events did not form a single tree"),
    }
}
