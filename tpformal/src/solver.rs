use std::collections::BTreeMap;

use bigdecimal::BigDecimal;
use strum::{EnumIs, EnumTryAs};

use crate::{error::Error, simplify::canonicalize, sort::Sort, term::Term};

#[derive(Debug, Clone, PartialEq, Eq, EnumIs)]
pub enum SatResult {
    Sat,
    Unsat,
    /// The solver gave up; carries its stated reason when it gives one.
    Unknown(String),
}

impl std::fmt::Display for SatResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SatResult::Sat => write!(f, "sat"),
            SatResult::Unsat => write!(f, "unsat"),
            SatResult::Unknown(reason) => write!(f, "unknown ({})", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, EnumIs, EnumTryAs)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Real(BigDecimal),
    /// A value the reader does not interpret, kept verbatim.
    Opaque(String),
}

impl Value {
    pub fn as_decimal(&self) -> Option<BigDecimal> {
        match self {
            Value::Int(v) => Some(BigDecimal::from(*v)),
            Value::Real(v) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn sort(&self) -> Option<Sort> {
        match self {
            Value::Bool(_) => Some(Sort::Bool),
            Value::Int(_) => Some(Sort::Int),
            Value::Real(_) => Some(Sort::Real),
            Value::Opaque(_) => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(v) => write!(f, "{}", v),
            Value::Real(v) => write!(f, "{}", v),
            Value::Opaque(s) => write!(f, "{}", s),
        }
    }
}

/// Assignment of values to the symbols a caller asked about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Model {
    pub values: BTreeMap<String, Value>,
}

impl Model {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.values.get(name).and_then(|v| v.try_as_int_ref().copied())
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.values.get(name).and_then(|v| v.try_as_bool_ref().copied())
    }

    pub fn get_real(&self, name: &str) -> Option<BigDecimal> {
        self.values.get(name).and_then(Value::as_decimal)
    }
}

impl FromIterator<(String, Value)> for Model {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Model {
            values: iter.into_iter().collect(),
        }
    }
}

/// Incremental interface to a satisfiability solver.
///
/// Symbols must be declared before any assertion mentions them. `model` is
/// only meaningful right after a `check_sat` that returned [`SatResult::Sat`].
pub trait Solver {
    /// Short backend name, used in logs.
    fn name(&self) -> &str;

    fn declare(&mut self, name: &str, sort: Sort) -> Result<(), Error>;

    fn assert(&mut self, term: &Term) -> Result<(), Error>;

    fn check_sat(&mut self) -> Result<SatResult, Error>;

    fn model(&mut self, symbols: &[(&str, Sort)]) -> Result<Model, Error>;

    /// Simplify a term. Backends may delegate to the solver's own
    /// simplifier; the default applies [`canonicalize`].
    fn simplify(&mut self, term: &Term) -> Result<Term, Error> {
        Ok(canonicalize(term))
    }

    /// Forget every declaration and assertion.
    fn reset(&mut self) -> Result<(), Error>;

    /// Declare every free symbol of `terms`, assert them and check.
    fn check_terms(&mut self, terms: &[Term]) -> Result<SatResult, Error> {
        let mut symbols = BTreeMap::new();
        for term in terms {
            term.collect_symbols(&mut symbols);
        }
        for (name, sort) in &symbols {
            self.declare(name, *sort)?;
        }
        for term in terms {
            self.assert(term)?;
        }
        self.check_sat()
    }
}
