//! Bounded model checking of SSA programs.
//!
//! Encoding happens in two passes over a loop-free SSA control-flow graph:
//!
//! 1. [`PathConditions::compute`] walks the blocks in topological order and
//!    assigns each one the condition under which it is reached, built from
//!    the branch variables on the edges into it.
//! 2. [`encode`] turns every instruction of a reachable block into an equality
//!    guarded by that condition, and conjoins the assertions into the safety
//!    property.
//!
//! The query asks the solver for inputs violating the property; a model is a
//! counterexample, `unsat` proves the assertions for every execution of the
//! unrolled program.
use std::collections::{BTreeMap, BTreeSet};

use bigdecimal::{BigDecimal, num_bigint::BigInt};
use log::{debug, info};
use strum::EnumIs;
use tpformal::{
    pretty::PrettyTerm,
    simplify::canonicalize,
    smtlib,
    solver::{Model, SatResult, Solver},
    sort::Sort,
    term::Term,
};
use tpinstr::{
    Branch, Instruction,
    cfg::{BlockId, EdgeLabel, TacCfg},
    name,
    tac::{Operand, TacInstr, TacOp},
};

use crate::{
    config::{AngleRow, AngleTable, BmcConfig, TrigEncoding},
    error::{TpError, TpResult},
};

/// Significant digits of π used by the degree to radian conversion.
const PI_DIGITS: i128 = 314_159_265_358_979_323_846;
const PI_SCALE: i64 = 20;

pub fn pi() -> BigDecimal {
    BigDecimal::new(BigInt::from(PI_DIGITS), PI_SCALE)
}

fn real(value: i64) -> Term {
    Term::real(BigDecimal::from(value))
}

/// Trigonometric model shared by the encoder and the interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrigModel {
    /// `cos x ≈ 1 - x²/2 + x⁴/24`, `sin x ≈ x - x³/6`, x in radians.
    Taylor,
    /// Exact values for the headings of the table; other headings are
    /// excluded from the search.
    Table(AngleTable),
}

impl TrigModel {
    pub fn from_config(config: &BmcConfig) -> TpResult<Self> {
        Ok(match config.trig.encoding {
            TrigEncoding::Taylor => TrigModel::Taylor,
            TrigEncoding::AngleTable => TrigModel::Table(config.angle_table()?),
        })
    }
}

/// Reachability condition of every block.
#[derive(Debug, Clone, Default)]
pub struct PathConditions {
    conditions: BTreeMap<BlockId, Term>,
}

impl PathConditions {
    /// Compute the conditions in topological order, passing each one through
    /// `simplify` before it is used by any successor.
    ///
    /// Fails on a back edge: loops must be unrolled beforehand.
    pub fn compute(
        cfg: &TacCfg,
        mut simplify: impl FnMut(&Term) -> TpResult<Term>,
    ) -> TpResult<Self> {
        let mut conditions: BTreeMap<BlockId, Term> = BTreeMap::new();
        for block in cfg.topological_order() {
            let condition = if block == cfg.entry() {
                Term::bool(true)
            } else if !cfg.is_reachable(block) {
                Term::bool(false)
            } else {
                let mut disjuncts = Vec::new();
                for pred in cfg.predecessors(block) {
                    if !cfg.is_reachable(pred) {
                        continue;
                    }
                    let Some(reach) = conditions.get(&pred) else {
                        return Err(TpError::CyclicControlFlow {
                            block: cfg.block(block).name.clone(),
                        });
                    };
                    disjuncts.push(edge_condition(cfg, pred, block, reach.clone()));
                }
                let merged = match disjuncts.len() {
                    0 => Term::bool(false),
                    1 => disjuncts.remove(0),
                    _ => Term::or(disjuncts),
                };
                simplify(&merged)?
            };
            debug!("Path condition of {}: {}", cfg.block(block).name, condition);
            conditions.insert(block, condition);
        }
        Ok(PathConditions { conditions })
    }

    /// Condition of `block`; `false` for a block the graph does not contain.
    pub fn get(&self, block: BlockId) -> Term {
        self.conditions
            .get(&block)
            .cloned()
            .unwrap_or(Term::bool(false))
    }

    pub fn iter(&self) -> impl Iterator<Item = (BlockId, &Term)> {
        self.conditions.iter().map(|(b, t)| (*b, t))
    }
}

/// Condition of taking the edge `pred -> succ`, given that `pred` is reached
/// under `reach`.
fn edge_condition(cfg: &TacCfg, pred: BlockId, succ: BlockId, reach: Term) -> Term {
    let branch = cfg.block(pred).terminator().and_then(|i| i.branch());
    match (branch, cfg.edge_label(pred, succ)) {
        (Some(Branch::Variable(v)), Some(EdgeLabel::CondTrue)) => {
            Term::and(vec![reach, Term::var(v, Sort::Bool)])
        }
        (Some(Branch::Variable(v)), Some(EdgeLabel::CondFalse)) => {
            Term::and(vec![reach, Term::var(v, Sort::Bool).not()])
        }
        _ => reach,
    }
}

/// Sort of every variable of an SSA program.
///
/// Each SSA name is its own solver symbol, so two versions of one variable
/// may have different sorts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortMap {
    sorts: BTreeMap<String, Sort>,
}

impl SortMap {
    /// Infer sorts from definitions first, then from the positions in which
    /// the still unsorted names are used.
    ///
    /// Comparisons and logical operators define booleans, trigonometric
    /// helpers and reserved real prefixes define reals, arithmetic over a
    /// real operand stays real. A phi shares the sort of its operands.
    /// Declarations, phis and unresolved reads that no use pins down are
    /// numeric when they feed arithmetic or an ordering, and otherwise take the
    /// sort of another version of the same variable. Everything else is an
    /// integer.
    pub fn infer(cfg: &TacCfg) -> Self {
        let instructions: Vec<&TacInstr> = cfg
            .nodes()
            .flat_map(|b| cfg.block(b).iter())
            .collect();
        let mut map = SortMap::default();

        for instr in &instructions {
            let Some(lvar) = instr.write_variable() else {
                continue;
            };
            let sort = match instr {
                TacInstr::Assign { op, .. } if op.is_comparison() || op.is_logical() => Sort::Bool,
                TacInstr::Cos { .. } | TacInstr::Sin { .. } | TacInstr::DegToRad { .. } => Sort::Real,
                _ if name::is_real_valued(lvar) => Sort::Real,
                _ => continue,
            };
            map.sorts.insert(lvar.to_string(), sort);
        }

        let open: BTreeSet<&str> = instructions
            .iter()
            .copied()
            .flat_map(|instr| {
                let declared = match instr {
                    TacInstr::Assign {
                        lvar,
                        op: TacOp::Decl,
                        ..
                    }
                    | TacInstr::Phi { lvar, .. } => Some(lvar.as_str()),
                    _ => None,
                };
                declared
                    .into_iter()
                    .chain(instr.read_variables().filter(|v| name::generation(v).is_none()))
            })
            .collect();

        let numeric: BTreeSet<&str> = instructions
            .iter()
            .copied()
            .filter_map(|instr| match instr {
                TacInstr::Assign { lhs, op, rhs, .. }
                    if op.is_arithmetic() || (op.is_comparison() && !matches!(op, TacOp::Eq | TacOp::Ne)) =>
                {
                    Some([lhs, rhs].into_iter().filter_map(Operand::variable))
                }
                _ => None,
            })
            .flatten()
            .collect();

        loop {
            map.propagate(&instructions);
            let mut changed = false;
            for &variable in &open {
                if map.sorts.contains_key(variable) {
                    continue;
                }
                let fallback = if numeric.contains(variable) {
                    Some(map.of(variable))
                } else {
                    map.sibling(variable)
                };
                if let Some(sort) = fallback {
                    map.sorts.insert(variable.to_string(), sort);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        map
    }

    /// Spread sorts along uses until nothing changes.
    fn propagate(&mut self, instructions: &[&TacInstr]) {
        loop {
            let mut changed = false;
            for instr in instructions {
                let (lvar, lhs, op, rhs) = match instr {
                    TacInstr::Assign { lvar, lhs, op, rhs } => (lvar, lhs, op, rhs),
                    TacInstr::Condition(Operand::Var(v)) | TacInstr::Assert(Operand::Var(v)) => {
                        changed |= self.set_if_unknown(v, Sort::Bool);
                        continue;
                    }
                    TacInstr::Phi { lvar, operands } => {
                        match self.get(lvar) {
                            Some(sort) => {
                                for operand in operands {
                                    changed |= self.set_if_unknown(operand, sort);
                                }
                            }
                            None => {
                                if let Some(sort) = operands.iter().find_map(|o| self.get(o)) {
                                    changed |= self.set_if_unknown(lvar, sort);
                                }
                            }
                        }
                        continue;
                    }
                    _ => continue,
                };
                let operand_sort = |operand: &Operand| match operand {
                    Operand::Var(v) => self.get(v),
                    Operand::Num(_) => Some(Sort::Int),
                    Operand::Bool(_) => Some(Sort::Bool),
                    Operand::Unused => None,
                };
                let (left, right) = (operand_sort(lhs), operand_sort(rhs));
                let mut updates = Vec::new();
                if op.is_arithmetic() && (left == Some(Sort::Real) || right == Some(Sort::Real)) {
                    updates.push((lvar.as_str(), Sort::Real));
                }
                if op.is_logical() {
                    updates.extend([lhs, rhs].into_iter().filter_map(Operand::variable).map(|v| (v, Sort::Bool)));
                }
                if matches!(op, TacOp::Eq | TacOp::Ne) {
                    if left == Some(Sort::Bool) {
                        updates.extend(rhs.variable().map(|v| (v, Sort::Bool)));
                    }
                    if right == Some(Sort::Bool) {
                        updates.extend(lhs.variable().map(|v| (v, Sort::Bool)));
                    }
                }
                for (variable, sort) in updates {
                    changed |= self.set_if_unknown(variable, sort);
                }
            }
            if !changed {
                break;
            }
        }
    }

    fn set_if_unknown(&mut self, variable: &str, sort: Sort) -> bool {
        if self.sorts.contains_key(variable) {
            return false;
        }
        self.sorts.insert(variable.to_string(), sort);
        true
    }

    fn get(&self, variable: &str) -> Option<Sort> {
        self.sorts.get(variable).copied()
    }

    /// Sort of some other known version of `variable`.
    fn sibling(&self, variable: &str) -> Option<Sort> {
        let base = name::original_name(variable);
        self.sorts
            .iter()
            .find(|(known, _)| name::original_name(known) == base)
            .map(|(_, sort)| *sort)
    }

    /// Sort of the SSA name `variable`.
    pub fn of(&self, variable: &str) -> Sort {
        self.get(variable).unwrap_or(if name::is_real_valued(variable) {
            Sort::Real
        } else {
            Sort::Int
        })
    }
}

/// A self-contained safety query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BmcQuery {
    pub declarations: BTreeMap<String, Sort>,
    /// Program semantics and heading assumptions.
    pub assertions: Vec<Term>,
    /// Conjunction of the program assertions, each guarded by its block's
    /// path condition.
    pub property: Term,
    /// Generation-0 names of the program inputs, followed by names no
    /// definition reaches.
    pub inputs: Vec<(String, Sort)>,
}

impl BmcQuery {
    /// The formula handed to the solver: a model violates the property.
    pub fn negated_property(&self) -> Term {
        self.property.clone().not()
    }

    pub fn to_smtlib(&self) -> String {
        let mut terms = self.assertions.clone();
        terms.push(self.negated_property());
        smtlib::script(&self.declarations, &terms)
    }
}

impl std::fmt::Display for BmcQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for term in &self.assertions {
            writeln!(f, "{}", term.pretty_string())?;
        }
        writeln!(f, "violated: {}", self.negated_property().pretty_string())
    }
}

/// Outcome of a bounded safety check.
#[derive(Debug, Clone, PartialEq, Eq, EnumIs)]
pub enum Verdict {
    /// No input violates an assertion within the unrolling bound.
    Safe,
    /// Input values under which some assertion fails.
    Counterexample { inputs: Model },
    /// The solver gave up; nothing is known about the property.
    Unknown { reason: String },
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Safe => write!(f, "safe: every assertion holds"),
            Verdict::Counterexample { inputs } => {
                write!(f, "counterexample:")?;
                if inputs.values.is_empty() {
                    write!(f, " (no inputs)")?;
                }
                for (name, value) in &inputs.values {
                    write!(f, "\n  {} = {}", name, value)?;
                }
                Ok(())
            }
            Verdict::Unknown { reason } => write!(f, "unknown: {}", reason),
        }
    }
}

/// Encode the SSA program `cfg` into a safety query.
///
/// `solver` is only used to simplify path conditions, when the configuration
/// asks for it.
pub fn encode(cfg: &TacCfg, config: &BmcConfig, solver: &mut dyn Solver) -> TpResult<BmcQuery> {
    let simplify = config.encoder.simplify_path_conditions;
    let paths = PathConditions::compute(cfg, |term| {
        if simplify {
            Ok(solver.simplify(term)?)
        } else {
            Ok(term.clone())
        }
    })?;
    let encoder = Encoder::new(cfg, &paths, TrigModel::from_config(config)?);
    encoder.run()
}

struct Encoder<'a> {
    cfg: &'a TacCfg,
    paths: &'a PathConditions,
    trig: TrigModel,
    sorts: SortMap,
    definitions: BTreeMap<String, BlockId>,
    constraints: Vec<Term>,
    asserts: Vec<Term>,
    radians: BTreeSet<String>,
}

impl<'a> Encoder<'a> {
    fn new(cfg: &'a TacCfg, paths: &'a PathConditions, trig: TrigModel) -> Self {
        let mut definitions = BTreeMap::new();
        for block in cfg.nodes().filter(|&b| cfg.is_reachable(b)) {
            for instr in cfg.block(block).iter() {
                if let Some(variable) = instr.write_variable() {
                    definitions.insert(variable.to_string(), block);
                }
            }
        }
        Encoder {
            cfg,
            paths,
            trig,
            sorts: SortMap::infer(cfg),
            definitions,
            constraints: Vec::new(),
            asserts: Vec::new(),
            radians: BTreeSet::new(),
        }
    }

    fn run(mut self) -> TpResult<BmcQuery> {
        let mut inputs = BTreeMap::new();
        let mut unresolved = BTreeMap::new();
        let cfg = self.cfg;

        for block in cfg.topological_order() {
            if !cfg.is_reachable(block) {
                continue;
            }
            let guard = self.paths.get(block);
            for instr in cfg.block(block).iter() {
                if let TacInstr::Assign {
                    lvar,
                    op: TacOp::Decl,
                    ..
                } = instr
                {
                    inputs.insert(lvar.clone(), self.sorts.of(lvar));
                }
                for variable in instr.read_variables() {
                    if name::generation(variable).is_none() {
                        unresolved.insert(variable.to_string(), self.sorts.of(variable));
                    }
                }
                if !guard.is_false() {
                    self.instruction(block, &guard, instr)?;
                }
            }
        }

        let property = match self.asserts.len() {
            0 => Term::bool(true),
            1 => self.asserts.remove(0),
            _ => Term::and(self.asserts),
        };
        let inputs: Vec<(String, Sort)> = inputs.into_iter().chain(unresolved).collect();

        let mut declarations = BTreeMap::new();
        for term in self.constraints.iter().chain(std::iter::once(&property)) {
            declarations.extend(term.free_symbols());
        }
        declarations.extend(inputs.iter().cloned());

        debug!(
            "Encoded {} constraint(s) over {} symbol(s), {} input(s)",
            self.constraints.len(),
            declarations.len(),
            inputs.len()
        );
        Ok(BmcQuery {
            declarations,
            assertions: self.constraints,
            property,
            inputs,
        })
    }

    fn error(&self, block: BlockId, instr: &TacInstr, reason: impl Into<String>) -> TpError {
        TpError::Encoding {
            block: self.cfg.block(block).name.clone(),
            instruction: instr.to_string(),
            reason: reason.into(),
        }
    }

    fn emit(&mut self, guard: &Term, fact: Term) {
        if guard.is_true() {
            self.constraints.push(fact);
        } else if !guard.is_false() {
            self.constraints.push(guard.clone().implies(fact));
        }
    }

    fn variable(&self, name: &str) -> Term {
        Term::var(name, self.sorts.of(name))
    }

    fn operand(&self, operand: &Operand) -> Option<Term> {
        match operand {
            Operand::Var(name) => Some(self.variable(name)),
            Operand::Num(value) => Some(Term::int(*value)),
            Operand::Bool(value) => Some(Term::bool(*value)),
            Operand::Unused => None,
        }
    }

    fn coerce(&self, block: BlockId, instr: &TacInstr, term: Term, sort: Sort) -> TpResult<Term> {
        match (term.sort(), sort) {
            (found, expected) if found == expected => Ok(term),
            (Sort::Int, Sort::Real) => Ok(term.to_real()),
            (found, expected) => Err(self.error(
                block,
                instr,
                format!("expected a {} value, found `{}` of sort {}", expected, term, found),
            )),
        }
    }

    fn instruction(&mut self, block: BlockId, guard: &Term, instr: &TacInstr) -> TpResult<()> {
        match instr {
            TacInstr::Assign { op: TacOp::Decl, .. } => {}
            TacInstr::Assign { lvar, lhs, op, rhs } => {
                let value = self.assignment(block, instr, lvar, lhs, *op, rhs)?;
                let fact = self.variable(lvar).eq(value);
                self.emit(guard, fact);
            }
            TacInstr::Phi { lvar, operands } => {
                if operands.is_empty() {
                    debug!("Phi `{}` has no operand, leaving it unconstrained", lvar);
                    return Ok(());
                }
                let value = self.phi(block, instr, lvar, operands)?;
                let fact = self.variable(lvar).eq(value);
                self.emit(guard, fact);
            }
            TacInstr::Cos { lvar, source } | TacInstr::Sin { lvar, source } => {
                let value = self.trig(block, instr, source)?;
                let fact = Term::var(lvar, Sort::Real).eq(value);
                self.emit(guard, fact);
            }
            TacInstr::DegToRad { lvar, source } => {
                let degrees = self.source(block, instr, source)?;
                let fact = Term::var(lvar, Sort::Real).eq(to_radians(degrees));
                self.emit(guard, fact);
            }
            TacInstr::Assert(operand) => {
                let cond = self.source(block, instr, operand)?;
                let cond = self.coerce(block, instr, cond, Sort::Bool)?;
                if guard.is_true() {
                    self.asserts.push(cond);
                } else {
                    self.asserts.push(guard.clone().implies(cond));
                }
            }
            TacInstr::Condition(_)
            | TacInstr::Move { .. }
            | TacInstr::Pen(_)
            | TacInstr::Goto { .. }
            | TacInstr::NoOp
            | TacInstr::Pause => {}
        }
        Ok(())
    }

    fn source(&self, block: BlockId, instr: &TacInstr, operand: &Operand) -> TpResult<Term> {
        self.operand(operand)
            .ok_or_else(|| self.error(block, instr, "missing operand"))
    }

    fn assignment(
        &self,
        block: BlockId,
        instr: &TacInstr,
        lvar: &str,
        lhs: &Operand,
        op: TacOp,
        rhs: &Operand,
    ) -> TpResult<Term> {
        let target = self.sorts.of(lvar);
        let right = self.source(block, instr, rhs)?;
        if op == TacOp::Not {
            let value = self.coerce(block, instr, right, Sort::Bool)?.not();
            return self.coerce(block, instr, value, target);
        }
        let left = self.source(block, instr, lhs)?;

        let value = if op.is_arithmetic() {
            if left.sort().is_bool() || right.sort().is_bool() {
                return Err(self.error(block, instr, "arithmetic over a boolean operand"));
            }
            let domain = if target.is_real() {
                Sort::Real
            } else {
                left.sort().join(right.sort())
            };
            let left = self.coerce(block, instr, left, domain)?;
            let right = self.coerce(block, instr, right, domain)?;
            match (op, domain) {
                (TacOp::Add, _) => left.add(right),
                (TacOp::Sub, _) => left.sub(right),
                (TacOp::Mul, _) => left.mul(right),
                (TacOp::Div, Sort::Real) => left.div(right),
                (TacOp::Div, _) => left.int_div(right),
                (TacOp::Mod, Sort::Int) => left.modulo(right),
                (TacOp::Mod, _) => {
                    return Err(self.error(block, instr, "remainder of real operands"));
                }
                _ => return Err(self.error(block, instr, format!("unknown operator `{}`", op.to_str()))),
            }
        } else if op.is_logical() {
            let left = self.coerce(block, instr, left, Sort::Bool)?;
            let right = self.coerce(block, instr, right, Sort::Bool)?;
            match op {
                TacOp::And => Term::and(vec![left, right]),
                TacOp::Or => Term::or(vec![left, right]),
                _ => return Err(self.error(block, instr, format!("unknown operator `{}`", op.to_str()))),
            }
        } else if op.is_comparison() {
            let domain = if left.sort().is_bool() || right.sort().is_bool() {
                if !matches!(op, TacOp::Eq | TacOp::Ne) {
                    return Err(self.error(block, instr, "ordering of boolean operands"));
                }
                Sort::Bool
            } else {
                left.sort().join(right.sort())
            };
            let left = self.coerce(block, instr, left, domain)?;
            let right = self.coerce(block, instr, right, domain)?;
            match op {
                TacOp::Lt => left.lt(right),
                TacOp::Gt => left.gt(right),
                TacOp::Le => left.le(right),
                TacOp::Ge => left.ge(right),
                TacOp::Eq => left.eq(right),
                TacOp::Ne => left.ne(right),
                _ => return Err(self.error(block, instr, format!("unknown operator `{}`", op.to_str()))),
            }
        } else {
            return Err(self.error(block, instr, format!("unknown operator `{}`", op.to_str())));
        };
        self.coerce(block, instr, value, target)
    }

    fn depth(&self, block: BlockId) -> usize {
        std::iter::successors(Some(block), |&b| self.cfg.idom(b)).count()
    }

    /// Every reachable predecessor contributes the operand whose definition
    /// is its nearest dominator, selected by the condition of the edge into
    /// `block`. Edges are mutually exclusive, so the last arm is the default.
    fn phi(&self, block: BlockId, instr: &TacInstr, lvar: &str, operands: &[String]) -> TpResult<Term> {
        let sort = self.sorts.of(lvar);
        let mut arms = Vec::new();
        for pred in self.cfg.predecessors(block) {
            if !self.cfg.is_reachable(pred) {
                continue;
            }
            let reaching = operands
                .iter()
                .filter_map(|o| self.definitions.get(o).map(|&def| (def, o)))
                .filter(|&(def, _)| self.cfg.dominates(def, pred))
                .max_by_key(|&(def, _)| self.depth(def));
            if let Some((_, operand)) = reaching {
                let edge = edge_condition(self.cfg, pred, block, self.paths.get(pred));
                arms.push((canonicalize(&edge), operand));
            }
        }

        let mut arms = arms.into_iter().rev();
        let Some((_, last)) = arms.next() else {
            let first = operands
                .first()
                .ok_or_else(|| self.error(block, instr, "phi without operands"))?;
            return self.coerce(block, instr, self.variable(first), sort);
        };
        let mut value = self.coerce(block, instr, self.variable(last), sort)?;
        for (edge, operand) in arms {
            let term = self.coerce(block, instr, self.variable(operand), sort)?;
            value = Term::ite(edge, term, value);
        }
        Ok(value)
    }

    fn trig(&mut self, block: BlockId, instr: &TacInstr, source: &Operand) -> TpResult<Term> {
        let is_cos = instr.is_cos();
        let trig = self.trig.clone();
        match &trig {
            TrigModel::Taylor => {
                let x = match source {
                    Operand::Var(v) if name::is_real_valued(v) => Term::var(v, Sort::Real),
                    _ => {
                        let degrees = self.source(block, instr, source)?;
                        let radians = format!("{}@{}", name::THETA_RAD, source);
                        if self.radians.insert(radians.clone()) {
                            let fact = Term::var(&radians, Sort::Real).eq(to_radians(degrees));
                            self.constraints.push(fact);
                        }
                        Term::var(radians, Sort::Real)
                    }
                };
                Ok(if is_cos { taylor_cos(x) } else { taylor_sin(x) })
            }
            TrigModel::Table(table) => {
                let degrees = self.source(block, instr, source)?;
                if !degrees.sort().is_int() {
                    return Err(self.error(
                        block,
                        instr,
                        "the angle table needs an integer heading in degrees",
                    ));
                }
                let heading = degrees.modulo(Term::int(360));
                let (value, admissible) = table_lookup(table, &heading, is_cos);
                let value = value.ok_or_else(|| self.error(block, instr, "empty angle table"))?;
                let guard = self.paths.get(block);
                self.emit(&guard, admissible);
                Ok(value)
            }
        }
    }
}

/// Nested conditional over the rows of `table`, and the disjunction
/// restricting `heading` to them.
fn table_lookup(table: &AngleTable, heading: &Term, is_cos: bool) -> (Option<Term>, Term) {
    let rows = table.rows();
    let admissible = Term::or(
        rows.iter()
            .map(|row| heading.clone().eq(Term::int(row.degrees)))
            .collect(),
    );
    let pick = |row: &AngleRow| Term::real(if is_cos { row.cos.clone() } else { row.sin.clone() });
    let mut value: Option<Term> = None;
    for row in rows.iter().rev() {
        value = Some(match value {
            None => pick(row),
            Some(otherwise) => Term::ite(
                heading.clone().eq(Term::int(row.degrees)),
                pick(row),
                otherwise,
            ),
        });
    }
    (value, admissible)
}

/// `degrees * π / 180` over the reals.
fn to_radians(degrees: Term) -> Term {
    let degrees = if degrees.sort().is_real() {
        degrees
    } else {
        degrees.to_real()
    };
    degrees.mul(Term::real(pi())).div(real(180))
}

/// `1 - x²/2 + x⁴/24`
pub fn taylor_cos(x: Term) -> Term {
    let x2 = x.clone().mul(x);
    let x4 = x2.clone().mul(x2.clone());
    real(1).sub(x2.div(real(2))).add(x4.div(real(24)))
}

/// `x - x³/6`
pub fn taylor_sin(x: Term) -> Term {
    let x3 = x.clone().mul(x.clone()).mul(x.clone());
    x.sub(x3.div(real(6)))
}

/// Submit `query` to `solver` and interpret the answer.
pub fn check(query: &BmcQuery, solver: &mut dyn Solver) -> TpResult<Verdict> {
    solver.reset()?;
    for (name, sort) in &query.declarations {
        solver.declare(name, *sort)?;
    }
    for term in &query.assertions {
        solver.assert(term)?;
    }
    solver.assert(&query.negated_property())?;

    let verdict = match solver.check_sat()? {
        SatResult::Unsat => Verdict::Safe,
        SatResult::Sat => {
            let symbols: Vec<(&str, Sort)> = query
                .inputs
                .iter()
                .map(|(name, sort)| (name.as_str(), *sort))
                .collect();
            Verdict::Counterexample {
                inputs: solver.model(&symbols)?,
            }
        }
        SatResult::Unknown(reason) => Verdict::Unknown { reason },
    };
    info!("{} answered: {}", solver.name(), verdict);
    Ok(verdict)
}
