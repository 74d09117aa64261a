use std::collections::BTreeMap;

use log::debug;
use z3::SatResult as Z3SatResult;

use crate::{
    error::Error,
    sexpr,
    smtlib,
    solver::{Model, SatResult, Solver},
    sort::Sort,
    term::Term,
};

/// In-process Z3. Declarations and assertions are buffered and loaded as an
/// SMT-LIB script at every `check_sat`, so the term language needs no second
/// translation.
pub struct Z3Solver {
    solver: z3::Solver,
    declarations: BTreeMap<String, Sort>,
    assertions: Vec<String>,
    params: Option<z3::Params>,
}

impl Z3Solver {
    pub fn new() -> Self {
        Self {
            solver: z3::Solver::new(),
            declarations: BTreeMap::new(),
            assertions: Vec::new(),
            params: None,
        }
    }

    pub fn with_timeout_ms(timeout_ms: u64) -> Self {
        if timeout_ms == 0 {
            return Self::new();
        }
        let solver = z3::Solver::new();
        let mut params = z3::Params::new();
        let timeout = u32::try_from(timeout_ms).unwrap_or(u32::MAX);
        params.set_u32("timeout", timeout);
        solver.set_params(&params);
        Self {
            solver,
            declarations: BTreeMap::new(),
            assertions: Vec::new(),
            params: Some(params),
        }
    }

    fn script(&self) -> String {
        let mut script = String::new();
        for (name, sort) in &self.declarations {
            script.push_str(&smtlib::declare_const(name, *sort));
            script.push('\n');
        }
        for assertion in &self.assertions {
            script.push_str(assertion);
            script.push('\n');
        }
        script
    }

    fn eval(model: &z3::Model, name: &str, sort: Sort) -> Option<String> {
        match sort {
            Sort::Bool => model
                .eval(&z3::ast::Bool::new_const(name), true)
                .map(|v| v.to_string()),
            Sort::Int => model
                .eval(&z3::ast::Int::new_const(name), true)
                .map(|v| v.to_string()),
            Sort::Real => model
                .eval(&z3::ast::Real::new_const(name), true)
                .map(|v| v.to_string()),
        }
    }
}

impl Default for Z3Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for Z3Solver {
    fn name(&self) -> &str {
        "z3 (in-process)"
    }

    fn declare(&mut self, name: &str, sort: Sort) -> Result<(), Error> {
        self.declarations.insert(name.to_string(), sort);
        Ok(())
    }

    fn assert(&mut self, term: &Term) -> Result<(), Error> {
        if let Some(name) = term
            .free_symbols()
            .into_keys()
            .find(|n| !self.declarations.contains_key(n))
        {
            return Err(Error::UndeclaredSymbol(name));
        }
        self.assertions.push(smtlib::assert(term));
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, Error> {
        self.solver.reset();
        if let Some(params) = &self.params {
            self.solver.set_params(params);
        }
        let script = self.script();
        debug!(
            "Loading {} declarations and {} assertions into z3",
            self.declarations.len(),
            self.assertions.len()
        );
        self.solver.from_string(script);
        match self.solver.check() {
            Z3SatResult::Sat => Ok(SatResult::Sat),
            Z3SatResult::Unsat => Ok(SatResult::Unsat),
            Z3SatResult::Unknown => Ok(SatResult::Unknown(
                self.solver
                    .get_reason_unknown()
                    .unwrap_or_else(|| "z3 returned unknown".to_string()),
            )),
        }
    }

    fn model(&mut self, symbols: &[(&str, Sort)]) -> Result<Model, Error> {
        let model = self.solver.get_model().ok_or_else(|| Error::Protocol {
            command: "get-model".to_string(),
            response: "no model available".to_string(),
        })?;
        let mut values = BTreeMap::new();
        for &(name, sort) in symbols {
            if let Some(text) = Self::eval(&model, name, sort) {
                let parsed = sexpr::parse_sexprs(&text)?;
                if let Some(expr) = parsed.first() {
                    values.insert(name.to_string(), sexpr::value_from_sexpr(expr));
                }
            }
        }
        Ok(Model { values })
    }

    fn reset(&mut self) -> Result<(), Error> {
        self.solver.reset();
        if let Some(params) = &self.params {
            self.solver.set_params(params);
        }
        self.declarations.clear();
        self.assertions.clear();
        Ok(())
    }
}
