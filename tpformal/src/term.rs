use std::collections::BTreeMap;

use bigdecimal::BigDecimal;
use strum::{EnumDiscriminants, EnumIs};

use crate::sort::Sort;

/// A first-order term over `Bool`, `Int` and `Real`.
///
/// `And` and `Or` are n-ary; every other connective is fixed-arity. Sorts of
/// variables are carried by the leaves, so a term is self-describing and
/// [`Term::free_symbols`] yields everything a solver needs declared.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, EnumIs, EnumDiscriminants)]
#[strum_discriminants(name(TermKind))]
pub enum Term {
    Bool(bool),
    Int(i64),
    Real(BigDecimal),
    Var { name: String, sort: Sort },

    Not(Box<Term>),
    And(Vec<Term>),
    Or(Vec<Term>),
    Implies(Box<Term>, Box<Term>),
    Eq(Box<Term>, Box<Term>),
    Ite(Box<Term>, Box<Term>, Box<Term>),

    Neg(Box<Term>),
    Add(Box<Term>, Box<Term>),
    Sub(Box<Term>, Box<Term>),
    Mul(Box<Term>, Box<Term>),
    /// Real division.
    Div(Box<Term>, Box<Term>),
    /// Integer division, SMT-LIB `div`.
    IntDiv(Box<Term>, Box<Term>),
    Mod(Box<Term>, Box<Term>),

    Lt(Box<Term>, Box<Term>),
    Le(Box<Term>, Box<Term>),
    Gt(Box<Term>, Box<Term>),
    Ge(Box<Term>, Box<Term>),

    ToReal(Box<Term>),
}

#[allow(clippy::should_implement_trait)]
impl Term {
    pub fn var(name: impl Into<String>, sort: Sort) -> Self {
        Term::Var {
            name: name.into(),
            sort,
        }
    }

    pub fn bool(value: bool) -> Self {
        Term::Bool(value)
    }

    pub fn int(value: i64) -> Self {
        Term::Int(value)
    }

    pub fn real(value: BigDecimal) -> Self {
        Term::Real(value)
    }

    pub fn not(self) -> Self {
        Term::Not(Box::new(self))
    }

    pub fn and(terms: Vec<Term>) -> Self {
        Term::And(terms)
    }

    pub fn or(terms: Vec<Term>) -> Self {
        Term::Or(terms)
    }

    pub fn implies(self, rhs: Term) -> Self {
        Term::Implies(Box::new(self), Box::new(rhs))
    }

    pub fn eq(self, rhs: Term) -> Self {
        Term::Eq(Box::new(self), Box::new(rhs))
    }

    pub fn ite(cond: Term, then: Term, otherwise: Term) -> Self {
        Term::Ite(Box::new(cond), Box::new(then), Box::new(otherwise))
    }

    pub fn neg(self) -> Self {
        Term::Neg(Box::new(self))
    }

    pub fn add(self, rhs: Term) -> Self {
        Term::Add(Box::new(self), Box::new(rhs))
    }

    pub fn sub(self, rhs: Term) -> Self {
        Term::Sub(Box::new(self), Box::new(rhs))
    }

    pub fn mul(self, rhs: Term) -> Self {
        Term::Mul(Box::new(self), Box::new(rhs))
    }

    pub fn div(self, rhs: Term) -> Self {
        Term::Div(Box::new(self), Box::new(rhs))
    }

    pub fn int_div(self, rhs: Term) -> Self {
        Term::IntDiv(Box::new(self), Box::new(rhs))
    }

    pub fn modulo(self, rhs: Term) -> Self {
        Term::Mod(Box::new(self), Box::new(rhs))
    }

    pub fn lt(self, rhs: Term) -> Self {
        Term::Lt(Box::new(self), Box::new(rhs))
    }

    pub fn le(self, rhs: Term) -> Self {
        Term::Le(Box::new(self), Box::new(rhs))
    }

    pub fn gt(self, rhs: Term) -> Self {
        Term::Gt(Box::new(self), Box::new(rhs))
    }

    pub fn ge(self, rhs: Term) -> Self {
        Term::Ge(Box::new(self), Box::new(rhs))
    }

    pub fn to_real(self) -> Self {
        Term::ToReal(Box::new(self))
    }

    /// `!=` has no primitive in SMT-LIB; it is encoded as a negated equality.
    pub fn ne(self, rhs: Term) -> Self {
        self.eq(rhs).not()
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Term::Bool(true))
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Term::Bool(false))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Bool(_) | Term::Int(_) | Term::Real(_))
    }

    /// Direct subterms, left to right.
    pub fn children(&self) -> Vec<&Term> {
        match self {
            Term::Bool(_) | Term::Int(_) | Term::Real(_) | Term::Var { .. } => vec![],
            Term::Not(t) | Term::Neg(t) | Term::ToReal(t) => vec![t],
            Term::And(ts) | Term::Or(ts) => ts.iter().collect(),
            Term::Ite(c, t, e) => vec![c, t, e],
            Term::Implies(l, r)
            | Term::Eq(l, r)
            | Term::Add(l, r)
            | Term::Sub(l, r)
            | Term::Mul(l, r)
            | Term::Div(l, r)
            | Term::IntDiv(l, r)
            | Term::Mod(l, r)
            | Term::Lt(l, r)
            | Term::Le(l, r)
            | Term::Gt(l, r)
            | Term::Ge(l, r) => vec![l, r],
        }
    }

    pub fn sort(&self) -> Sort {
        match self {
            Term::Bool(_)
            | Term::Not(_)
            | Term::And(_)
            | Term::Or(_)
            | Term::Implies(..)
            | Term::Eq(..)
            | Term::Lt(..)
            | Term::Le(..)
            | Term::Gt(..)
            | Term::Ge(..) => Sort::Bool,
            Term::Int(_) | Term::IntDiv(..) | Term::Mod(..) => Sort::Int,
            Term::Real(_) | Term::Div(..) | Term::ToReal(_) => Sort::Real,
            Term::Var { sort, .. } => *sort,
            Term::Neg(t) => t.sort(),
            Term::Ite(_, t, e) => t.sort().join(e.sort()),
            Term::Add(l, r) | Term::Sub(l, r) | Term::Mul(l, r) => l.sort().join(r.sort()),
        }
    }

    /// Every variable occurring in the term with its sort.
    pub fn free_symbols(&self) -> BTreeMap<String, Sort> {
        let mut symbols = BTreeMap::new();
        self.collect_symbols(&mut symbols);
        symbols
    }

    pub(crate) fn collect_symbols(&self, symbols: &mut BTreeMap<String, Sort>) {
        match self {
            Term::Var { name, sort } => {
                symbols.insert(name.clone(), *sort);
            }
            _ => {
                for child in self.children() {
                    child.collect_symbols(symbols);
                }
            }
        }
    }

    /// Number of nodes in the term tree.
    pub fn size(&self) -> usize {
        1 + self.children().into_iter().map(Term::size).sum::<usize>()
    }
}

impl From<bool> for Term {
    fn from(value: bool) -> Self {
        Term::Bool(value)
    }
}

impl From<i64> for Term {
    fn from(value: i64) -> Self {
        Term::Int(value)
    }
}

impl From<BigDecimal> for Term {
    fn from(value: BigDecimal) -> Self {
        Term::Real(value)
    }
}
