//! Shared helpers for the integration tests.
#![allow(dead_code)]

use std::{collections::BTreeMap, str::FromStr};

use bigdecimal::BigDecimal;
use tpformal::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Val {
    B(bool),
    I(i64),
    R(f64),
}

impl Val {
    fn real(self) -> Option<f64> {
        match self {
            Val::I(v) => Some(v as f64),
            Val::R(v) => Some(v),
            Val::B(_) => None,
        }
    }
}

/// Decides queries by trying every input assignment over a small integer
/// domain. Symbols defined by an equality (possibly under an implication) are
/// computed from the inputs instead of being enumerated.
///
/// `Unsat` only means "no model within the domain", which is enough for the
/// small programs of the tests.
pub struct EnumeratingSolver {
    domain: Vec<i64>,
    declared: BTreeMap<String, Sort>,
    asserted: Vec<Term>,
    found: BTreeMap<String, Val>,
    pub checks: usize,
}

impl EnumeratingSolver {
    pub fn new() -> Self {
        Self::with_domain(-3..=3)
    }

    pub fn with_domain(domain: impl IntoIterator<Item = i64>) -> Self {
        EnumeratingSolver {
            domain: domain.into_iter().collect(),
            declared: BTreeMap::new(),
            asserted: Vec::new(),
            found: BTreeMap::new(),
            checks: 0,
        }
    }

    fn definitions(&self) -> Vec<(Option<&Term>, &str, &Term)> {
        self.asserted
            .iter()
            .filter_map(|term| match term {
                Term::Eq(lhs, rhs) => match lhs.as_ref() {
                    Term::Var { name, .. } => Some((None, name.as_str(), rhs.as_ref())),
                    _ => None,
                },
                Term::Implies(guard, body) => match body.as_ref() {
                    Term::Eq(lhs, rhs) => match lhs.as_ref() {
                        Term::Var { name, .. } => Some((Some(guard.as_ref()), name.as_str(), rhs.as_ref())),
                        _ => None,
                    },
                    _ => None,
                },
                _ => None,
            })
            .collect()
    }

    fn complete(&self, env: &mut BTreeMap<String, Val>) {
        let definitions = self.definitions();
        loop {
            let mut progress = false;
            for (guard, name, rhs) in &definitions {
                if env.contains_key(*name) {
                    continue;
                }
                let active = match guard {
                    None => true,
                    Some(guard) => match eval(guard, env) {
                        Some(Val::B(active)) => active,
                        _ => continue,
                    },
                };
                let value = if active {
                    match eval(rhs, env) {
                        Some(value) => value,
                        None => continue,
                    }
                } else {
                    default_value(self.declared.get(*name).copied().unwrap_or(Sort::Int))
                };
                env.insert(name.to_string(), value);
                progress = true;
            }
            if !progress {
                break;
            }
        }
        for (name, sort) in &self.declared {
            env.entry(name.clone()).or_insert(default_value(*sort));
        }
    }
}

fn default_value(sort: Sort) -> Val {
    match sort {
        Sort::Bool => Val::B(false),
        Sort::Int => Val::I(0),
        Sort::Real => Val::R(0.0),
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

fn eval(term: &Term, env: &BTreeMap<String, Val>) -> Option<Val> {
    use Val::*;
    let num = |t: &Term| eval(t, env);
    Some(match term {
        Term::Bool(b) => B(*b),
        Term::Int(v) => I(*v),
        Term::Real(v) => R(f64::from_str(&v.to_string()).ok()?),
        Term::Var { name, .. } => *env.get(name)?,
        Term::Not(t) => match num(t)? {
            B(b) => B(!b),
            _ => return None,
        },
        Term::And(ts) => {
            let mut all = true;
            for t in ts {
                match num(t)? {
                    B(b) => all &= b,
                    _ => return None,
                }
            }
            B(all)
        }
        Term::Or(ts) => {
            let mut any = false;
            for t in ts {
                match num(t)? {
                    B(b) => any |= b,
                    _ => return None,
                }
            }
            B(any)
        }
        Term::Implies(l, r) => match (num(l)?, num(r)?) {
            (B(l), B(r)) => B(!l || r),
            _ => return None,
        },
        Term::Eq(l, r) => match (num(l)?, num(r)?) {
            (B(l), B(r)) => B(l == r),
            (I(l), I(r)) => B(l == r),
            (l, r) => B(close(l.real()?, r.real()?)),
        },
        Term::Ite(c, t, e) => match num(c)? {
            B(true) => num(t)?,
            B(false) => num(e)?,
            _ => return None,
        },
        Term::Neg(t) => match num(t)? {
            I(v) => I(v.checked_neg()?),
            R(v) => R(-v),
            _ => return None,
        },
        Term::ToReal(t) => R(num(t)?.real()?),
        Term::Add(l, r) | Term::Sub(l, r) | Term::Mul(l, r) | Term::Div(l, r) => {
            match (num(l)?, num(r)?) {
                (I(a), I(b)) => I(match term {
                    Term::Add(..) => a.checked_add(b)?,
                    Term::Sub(..) => a.checked_sub(b)?,
                    Term::Mul(..) => a.checked_mul(b)?,
                    _ => return None,
                }),
                (a, b) => {
                    let (a, b) = (a.real()?, b.real()?);
                    R(match term {
                        Term::Add(..) => a + b,
                        Term::Sub(..) => a - b,
                        Term::Mul(..) => a * b,
                        _ if b == 0.0 => 0.0,
                        _ => a / b,
                    })
                }
            }
        }
        Term::IntDiv(l, r) | Term::Mod(l, r) => match (num(l)?, num(r)?) {
            (I(_), I(0)) => I(0),
            (I(a), I(b)) if term.is_int_div() => I(a.div_euclid(b)),
            (I(a), I(b)) => I(a.rem_euclid(b)),
            _ => return None,
        },
        Term::Lt(l, r) | Term::Le(l, r) | Term::Gt(l, r) | Term::Ge(l, r) => {
            let ordering = match (num(l)?, num(r)?) {
                (I(a), I(b)) => a.cmp(&b),
                (a, b) => a.real()?.partial_cmp(&b.real()?)?,
            };
            B(match term {
                Term::Lt(..) => ordering.is_lt(),
                Term::Le(..) => ordering.is_le(),
                Term::Gt(..) => ordering.is_gt(),
                _ => ordering.is_ge(),
            })
        }
    })
}

impl Solver for EnumeratingSolver {
    fn name(&self) -> &str {
        "enumerating"
    }

    fn declare(&mut self, name: &str, sort: Sort) -> Result<(), Error> {
        self.declared.insert(name.to_string(), sort);
        Ok(())
    }

    fn assert(&mut self, term: &Term) -> Result<(), Error> {
        for name in term.free_symbols().keys() {
            if !self.declared.contains_key(name) {
                return Err(Error::UndeclaredSymbol(name.clone()));
            }
        }
        self.asserted.push(term.clone());
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, Error> {
        self.checks += 1;
        let defined: Vec<&str> = self.definitions().iter().map(|(_, name, _)| *name).collect();
        let inputs: Vec<(String, Sort)> = self
            .declared
            .iter()
            .filter(|(name, _)| !defined.contains(&name.as_str()))
            .map(|(name, sort)| (name.clone(), *sort))
            .collect();
        let choices: Vec<Vec<Val>> = inputs
            .iter()
            .map(|(_, sort)| match sort {
                Sort::Bool => vec![Val::B(false), Val::B(true)],
                Sort::Int => self.domain.iter().map(|v| Val::I(*v)).collect(),
                Sort::Real => self.domain.iter().map(|v| Val::R(*v as f64)).collect(),
            })
            .collect();
        let space: usize = choices.iter().map(Vec::len).product();
        if space > 200_000 {
            return Ok(SatResult::Unknown(format!("{} assignments to try", space)));
        }

        let mut cursor = vec![0usize; inputs.len()];
        loop {
            let mut env: BTreeMap<String, Val> = inputs
                .iter()
                .zip(&cursor)
                .zip(&choices)
                .map(|(((name, _), &i), values)| (name.clone(), values[i]))
                .collect();
            self.complete(&mut env);
            if self
                .asserted
                .iter()
                .all(|term| eval(term, &env) == Some(Val::B(true)))
            {
                self.found = env;
                return Ok(SatResult::Sat);
            }

            // Odometer increment over the cartesian product.
            let mut position = 0;
            loop {
                if position == cursor.len() {
                    return Ok(SatResult::Unsat);
                }
                cursor[position] += 1;
                if cursor[position] < choices[position].len() {
                    break;
                }
                cursor[position] = 0;
                position += 1;
            }
        }
    }

    fn model(&mut self, symbols: &[(&str, Sort)]) -> Result<Model, Error> {
        Ok(symbols
            .iter()
            .filter_map(|(name, _)| {
                let value = match self.found.get(*name)? {
                    Val::B(b) => Value::Bool(*b),
                    Val::I(v) => Value::Int(*v),
                    Val::R(v) => Value::Real(BigDecimal::from_str(&v.to_string()).ok()?),
                };
                Some((name.to_string(), value))
            })
            .collect())
    }

    fn reset(&mut self) -> Result<(), Error> {
        self.declared.clear();
        self.asserted.clear();
        self.found.clear();
        Ok(())
    }
}

/// A solver binary on `PATH`, or `None` after telling the test log why the
/// test is skipped.
pub fn z3_process() -> Option<tpformal::backends::SmtLibProcess> {
    match tpformal::backends::SmtLibProcess::z3(Some(10_000)) {
        Ok(solver) => Some(solver),
        Err(err) => {
            eprintln!("skipping: no usable z3 binary ({})", err);
            None
        }
    }
}
