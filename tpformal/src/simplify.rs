//! Equivalence-preserving rewriting of terms.
//!
//! [`canonicalize`] works bottom-up and is idempotent. Boolean structure is
//! normalized so that syntactically different encodings of the same condition
//! collapse (conjunctions and disjunctions are flattened, sorted and
//! deduplicated), and literal arithmetic is folded when it cannot overflow.
//! It is not a decision procedure: anything it cannot prove stays as is.
use std::collections::BTreeSet;

use bigdecimal::BigDecimal;

use crate::term::Term;

pub fn canonicalize(term: &Term) -> Term {
    match term {
        Term::Bool(_) | Term::Int(_) | Term::Real(_) | Term::Var { .. } => term.clone(),
        Term::Not(inner) => simplify_not(canonicalize(inner)),
        Term::And(terms) => simplify_and(terms.iter().map(canonicalize).collect()),
        Term::Or(terms) => simplify_or(terms.iter().map(canonicalize).collect()),
        Term::Implies(lhs, rhs) => simplify_implies(canonicalize(lhs), canonicalize(rhs)),
        Term::Eq(lhs, rhs) => simplify_eq(canonicalize(lhs), canonicalize(rhs)),
        Term::Ite(c, t, e) => simplify_ite(canonicalize(c), canonicalize(t), canonicalize(e)),
        Term::Neg(inner) => match canonicalize(inner) {
            Term::Int(v) => v.checked_neg().map_or_else(|| Term::int(v).neg(), Term::Int),
            Term::Real(v) => Term::Real(-v),
            Term::Neg(t) => *t,
            t => t.neg(),
        },
        Term::Add(l, r) => fold_arith(canonicalize(l), canonicalize(r), ArithFold::Add),
        Term::Sub(l, r) => fold_arith(canonicalize(l), canonicalize(r), ArithFold::Sub),
        Term::Mul(l, r) => fold_arith(canonicalize(l), canonicalize(r), ArithFold::Mul),
        Term::Div(l, r) => canonicalize(l).div(canonicalize(r)),
        Term::IntDiv(l, r) => canonicalize(l).int_div(canonicalize(r)),
        Term::Mod(l, r) => canonicalize(l).modulo(canonicalize(r)),
        Term::Lt(l, r) => fold_cmp(canonicalize(l), canonicalize(r), |o| o.is_lt(), Term::lt),
        Term::Le(l, r) => fold_cmp(canonicalize(l), canonicalize(r), |o| o.is_le(), Term::le),
        Term::Gt(l, r) => fold_cmp(canonicalize(l), canonicalize(r), |o| o.is_gt(), Term::gt),
        Term::Ge(l, r) => fold_cmp(canonicalize(l), canonicalize(r), |o| o.is_ge(), Term::ge),
        Term::ToReal(inner) => match canonicalize(inner) {
            Term::Int(v) => Term::Real(BigDecimal::from(v)),
            t if t.sort().is_real() => t,
            t => t.to_real(),
        },
    }
}

fn simplify_not(inner: Term) -> Term {
    match inner {
        Term::Bool(b) => Term::Bool(!b),
        Term::Not(t) => *t,
        t => t.not(),
    }
}

/// Whether `a` is syntactically the negation of `b`.
fn complementary(a: &Term, b: &Term) -> bool {
    matches!(a, Term::Not(inner) if **inner == *b) || matches!(b, Term::Not(inner) if **inner == *a)
}

fn has_complementary_pair(terms: &BTreeSet<Term>) -> bool {
    terms
        .iter()
        .any(|t| matches!(t, Term::Not(inner) if terms.contains(inner)))
}

fn simplify_and(terms: Vec<Term>) -> Term {
    let mut flat = BTreeSet::new();
    for term in terms {
        match term {
            Term::Bool(true) => {}
            Term::Bool(false) => return Term::Bool(false),
            Term::And(inner) => flat.extend(inner),
            t => {
                flat.insert(t);
            }
        }
    }
    if has_complementary_pair(&flat) {
        return Term::Bool(false);
    }
    match flat.len() {
        0 => Term::Bool(true),
        1 => flat.into_iter().next().unwrap_or(Term::Bool(true)),
        _ => Term::And(flat.into_iter().collect()),
    }
}

/// Conjuncts of a disjunct, viewing an atom as a singleton conjunction.
fn conjuncts(term: &Term) -> BTreeSet<Term> {
    match term {
        Term::And(ts) => ts.iter().cloned().collect(),
        t => BTreeSet::from([t.clone()]),
    }
}

fn simplify_or(terms: Vec<Term>) -> Term {
    let mut flat = BTreeSet::new();
    for term in terms {
        match term {
            Term::Bool(false) => {}
            Term::Bool(true) => return Term::Bool(true),
            Term::Or(inner) => flat.extend(inner),
            t => {
                flat.insert(t);
            }
        }
    }
    if has_complementary_pair(&flat) {
        return Term::Bool(true);
    }

    // Absorption: `a or (a and b)` is `a`.
    let sets: Vec<(Term, BTreeSet<Term>)> = flat.iter().map(|t| (t.clone(), conjuncts(t))).collect();
    let kept: Vec<(Term, BTreeSet<Term>)> = sets
        .iter()
        .filter(|(t, set)| {
            !sets
                .iter()
                .any(|(other, other_set)| other != t && other_set.is_subset(set))
        })
        .cloned()
        .collect();

    if kept.len() > 1 {
        // Factor conjuncts shared by every disjunct:
        // `(p and c) or (p and not c)` is `p and (c or not c)`.
        let common = kept
            .iter()
            .skip(1)
            .fold(kept[0].1.clone(), |acc, (_, set)| acc.intersection(set).cloned().collect());
        if !common.is_empty() {
            let remainders = kept
                .iter()
                .map(|(_, set)| simplify_and(set.difference(&common).cloned().collect()))
                .collect();
            let mut factored: Vec<Term> = common.into_iter().collect();
            factored.push(simplify_or(remainders));
            return simplify_and(factored);
        }

        // Resolution on a single literal: `(a and c) or (a and not c)` where
        // the two disjuncts differ by one complementary conjunct.
        for (i, (_, left)) in kept.iter().enumerate() {
            for (_, right) in kept.iter().skip(i + 1) {
                let l_only: Vec<&Term> = left.difference(right).collect();
                let r_only: Vec<&Term> = right.difference(left).collect();
                if l_only.len() == 1 && r_only.len() == 1 && complementary(l_only[0], r_only[0]) {
                    let shared: Vec<Term> = left.intersection(right).cloned().collect();
                    let mut rest: Vec<Term> = kept
                        .iter()
                        .filter(|(_, s)| s != left && s != right)
                        .map(|(t, _)| t.clone())
                        .collect();
                    rest.push(simplify_and(shared));
                    return simplify_or(rest);
                }
            }
        }
    }

    match kept.len() {
        0 => Term::Bool(false),
        1 => kept.into_iter().next().map_or(Term::Bool(false), |(t, _)| t),
        _ => Term::Or(kept.into_iter().map(|(t, _)| t).collect()),
    }
}

fn simplify_implies(lhs: Term, rhs: Term) -> Term {
    match (&lhs, &rhs) {
        (Term::Bool(true), _) => rhs,
        (Term::Bool(false), _) | (_, Term::Bool(true)) => Term::Bool(true),
        (_, Term::Bool(false)) => simplify_not(lhs),
        _ if lhs == rhs => Term::Bool(true),
        _ => lhs.implies(rhs),
    }
}

fn simplify_eq(lhs: Term, rhs: Term) -> Term {
    if lhs == rhs {
        return Term::Bool(true);
    }
    match (&lhs, &rhs) {
        (Term::Bool(a), Term::Bool(b)) => Term::Bool(a == b),
        (Term::Int(a), Term::Int(b)) => Term::Bool(a == b),
        (Term::Real(a), Term::Real(b)) => Term::Bool(a == b),
        (Term::Bool(true), _) => rhs,
        (_, Term::Bool(true)) => lhs,
        (Term::Bool(false), _) => simplify_not(rhs),
        (_, Term::Bool(false)) => simplify_not(lhs),
        _ => lhs.eq(rhs),
    }
}

fn simplify_ite(cond: Term, then: Term, otherwise: Term) -> Term {
    match cond {
        Term::Bool(true) => then,
        Term::Bool(false) => otherwise,
        _ if then == otherwise => then,
        Term::Not(inner) => Term::ite(*inner, otherwise, then),
        c => Term::ite(c, then, otherwise),
    }
}

#[derive(Clone, Copy)]
enum ArithFold {
    Add,
    Sub,
    Mul,
}

fn fold_arith(lhs: Term, rhs: Term, op: ArithFold) -> Term {
    match (&lhs, &rhs, op) {
        (Term::Int(a), Term::Int(b), ArithFold::Add) if a.checked_add(*b).is_some() => Term::Int(a + b),
        (Term::Int(a), Term::Int(b), ArithFold::Sub) if a.checked_sub(*b).is_some() => Term::Int(a - b),
        (Term::Int(a), Term::Int(b), ArithFold::Mul) if a.checked_mul(*b).is_some() => Term::Int(a * b),
        (Term::Real(a), Term::Real(b), ArithFold::Add) => Term::Real(a + b),
        (Term::Real(a), Term::Real(b), ArithFold::Sub) => Term::Real(a - b),
        (Term::Real(a), Term::Real(b), ArithFold::Mul) => Term::Real(a * b),
        (Term::Int(0), _, ArithFold::Add) => rhs,
        (_, Term::Int(0), ArithFold::Add | ArithFold::Sub) => lhs,
        (Term::Int(1), _, ArithFold::Mul) => rhs,
        (_, Term::Int(1), ArithFold::Mul) => lhs,
        (_, _, ArithFold::Add) => lhs.add(rhs),
        (_, _, ArithFold::Sub) => lhs.sub(rhs),
        (_, _, ArithFold::Mul) => lhs.mul(rhs),
    }
}

fn fold_cmp(
    lhs: Term,
    rhs: Term,
    holds: impl Fn(std::cmp::Ordering) -> bool,
    build: impl Fn(Term, Term) -> Term,
) -> Term {
    match (&lhs, &rhs) {
        (Term::Int(a), Term::Int(b)) => Term::Bool(holds(a.cmp(b))),
        (Term::Real(a), Term::Real(b)) => Term::Bool(holds(a.cmp(b))),
        _ => build(lhs, rhs),
    }
}
