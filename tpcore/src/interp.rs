//! Concrete execution of three-address programs.
//!
//! Used to replay counterexamples: running the program on the inputs of a
//! model must make at least one assertion fail. Heading trigonometry follows
//! the same [`TrigModel`] as the encoder, so replays agree with the solver.
use std::collections::BTreeMap;

use bigdecimal::ToPrimitive;
use log::{debug, warn};
use tpformal::solver::{Model, Value};
use tpinstr::{
    name,
    tac::{Operand, TacInstr, TacOp, TacProgram},
};

use crate::{
    bmc::TrigModel,
    error::{TpError, TpResult},
};

/// Runtime value of a variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Concrete {
    Int(i64),
    Bool(bool),
    Real(f64),
}

impl Concrete {
    fn as_f64(self) -> Option<f64> {
        match self {
            Concrete::Int(v) => Some(v as f64),
            Concrete::Real(v) => Some(v),
            Concrete::Bool(_) => None,
        }
    }
}

impl std::fmt::Display for Concrete {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Concrete::Int(v) => write!(f, "{}", v),
            Concrete::Bool(v) => write!(f, "{}", v),
            Concrete::Real(v) => write!(f, "{}", v),
        }
    }
}

/// Final state of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Execution {
    pub env: BTreeMap<String, Concrete>,
    /// Lines of the assertions that evaluated to `false`, in execution order.
    pub failed_asserts: Vec<usize>,
    pub steps: usize,
    /// `false` when the run stopped because it ran out of fuel.
    pub completed: bool,
}

impl Execution {
    pub fn get(&self, variable: &str) -> Option<Concrete> {
        self.env.get(variable).copied()
    }
}

/// Convert a model over SSA names into inputs keyed by original name.
pub fn inputs_from_model(model: &Model) -> BTreeMap<String, Concrete> {
    model
        .values
        .iter()
        .filter_map(|(name, value)| {
            let concrete = match value {
                Value::Int(v) => Concrete::Int(*v),
                Value::Bool(v) => Concrete::Bool(*v),
                Value::Real(v) => Concrete::Real(v.to_f64()?),
                Value::Opaque(text) => {
                    warn!("Ignoring opaque model value `{}` for {}", text, name);
                    return None;
                }
            };
            Some((name::original_name(name).to_string(), concrete))
        })
        .collect()
}

pub struct Interpreter<'a> {
    trig: &'a TrigModel,
    fuel: usize,
}

impl<'a> Interpreter<'a> {
    pub const DEFAULT_FUEL: usize = 1_000_000;

    pub fn new(trig: &'a TrigModel) -> Self {
        Interpreter {
            trig,
            fuel: Self::DEFAULT_FUEL,
        }
    }

    /// Bound the number of executed instructions.
    pub fn with_fuel(mut self, fuel: usize) -> Self {
        self.fuel = fuel;
        self
    }

    /// Execute `tac`. Declarations take their value from `inputs`, which also
    /// answers reads of variables no assignment has reached.
    pub fn run(
        &self,
        tac: &TacProgram,
        inputs: &BTreeMap<String, Concrete>,
    ) -> TpResult<Execution> {
        let mut state = Execution::default();
        let mut pc = 0usize;

        while let Some((instr, jump)) = tac.get(pc) {
            if state.steps == self.fuel {
                warn!("Out of fuel after {} steps at line {}", state.steps, pc);
                return Ok(state);
            }
            state.steps += 1;
            let fail = |reason: &str| TpError::Unsupported {
                line: pc,
                instruction: instr.to_string(),
                reason: reason.to_string(),
            };
            let read = |env: &BTreeMap<String, Concrete>, operand: &Operand| match operand {
                Operand::Var(v) => env
                    .get(v)
                    .or_else(|| inputs.get(v))
                    .copied()
                    .ok_or_else(|| fail(&format!("`{}` has no value", v))),
                Operand::Num(v) => Ok(Concrete::Int(*v)),
                Operand::Bool(v) => Ok(Concrete::Bool(*v)),
                Operand::Unused => Err(fail("missing operand")),
            };

            let mut next = pc + 1;
            match instr {
                TacInstr::Assign {
                    lvar,
                    op: TacOp::Decl,
                    ..
                } => {
                    let value = inputs
                        .get(lvar)
                        .copied()
                        .ok_or_else(|| fail("no value for input"))?;
                    state.env.insert(lvar.clone(), value);
                }
                TacInstr::Assign { lvar, lhs, op, rhs } => {
                    let rhs = read(&state.env, rhs)?;
                    let value = if *op == TacOp::Not {
                        match rhs {
                            Concrete::Bool(b) => Concrete::Bool(!b),
                            _ => return Err(fail("negation of a number")),
                        }
                    } else {
                        binary(*op, read(&state.env, lhs)?, rhs).map_err(|r| fail(r))?
                    };
                    let value = match value {
                        Concrete::Int(v) if name::is_real_valued(lvar) => Concrete::Real(v as f64),
                        other => other,
                    };
                    state.env.insert(lvar.clone(), value);
                }
                TacInstr::Cos { lvar, source } | TacInstr::Sin { lvar, source } => {
                    let source_value = read(&state.env, source)?;
                    let already_radians = source.variable().is_some_and(name::is_real_valued);
                    let value = self
                        .trig(source_value, already_radians, instr.is_cos())
                        .map_err(|r| fail(&r))?;
                    state.env.insert(lvar.clone(), Concrete::Real(value));
                }
                TacInstr::DegToRad { lvar, source } => {
                    let degrees = read(&state.env, source)?
                        .as_f64()
                        .ok_or_else(|| fail("heading is not a number"))?;
                    state.env.insert(lvar.clone(), Concrete::Real(to_radians(degrees)));
                }
                TacInstr::Condition(operand) => match read(&state.env, operand)? {
                    Concrete::Bool(true) => {}
                    Concrete::Bool(false) => next = (pc as i64 + jump) as usize,
                    _ => return Err(fail("branch on a number")),
                },
                TacInstr::Assert(operand) => match read(&state.env, operand)? {
                    Concrete::Bool(true) => {}
                    Concrete::Bool(false) => {
                        debug!("Assertion at line {} failed", pc);
                        state.failed_asserts.push(pc);
                    }
                    _ => return Err(fail("assertion of a number")),
                },
                TacInstr::Phi { .. } => return Err(fail("phi outside of SSA encoding")),
                TacInstr::Move { .. }
                | TacInstr::Pen(_)
                | TacInstr::Goto { .. }
                | TacInstr::NoOp
                | TacInstr::Pause => {}
            }
            pc = next;
        }
        state.completed = true;
        Ok(state)
    }

    fn trig(&self, source: Concrete, already_radians: bool, is_cos: bool) -> Result<f64, String> {
        match self.trig {
            TrigModel::Taylor => {
                let value = source
                    .as_f64()
                    .ok_or_else(|| "heading is not a number".to_string())?;
                let x = if already_radians { value } else { to_radians(value) };
                Ok(if is_cos {
                    1.0 - x * x / 2.0 + x.powi(4) / 24.0
                } else {
                    x - x.powi(3) / 6.0
                })
            }
            TrigModel::Table(table) => {
                let Concrete::Int(degrees) = source else {
                    return Err("the angle table needs an integer heading".to_string());
                };
                let row = table
                    .lookup(degrees)
                    .ok_or_else(|| format!("heading {} is not in the angle table", degrees))?;
                let value = if is_cos { &row.cos } else { &row.sin };
                value
                    .to_f64()
                    .ok_or_else(|| format!("`{}` does not fit a float", value))
            }
        }
    }
}

fn to_radians(degrees: f64) -> f64 {
    degrees * std::f64::consts::PI / 180.0
}

/// Integer division and remainder follow SMT-LIB: the remainder is never
/// negative.
fn binary(op: TacOp, lhs: Concrete, rhs: Concrete) -> Result<Concrete, &'static str> {
    use Concrete::*;
    Ok(match (lhs, rhs) {
        (Bool(a), Bool(b)) => match op {
            TacOp::And => Bool(a && b),
            TacOp::Or => Bool(a || b),
            TacOp::Eq => Bool(a == b),
            TacOp::Ne => Bool(a != b),
            _ => return Err("arithmetic over booleans"),
        },
        (Bool(_), _) | (_, Bool(_)) => return Err("mixed boolean and numeric operands"),
        (Int(a), Int(b)) => match op {
            TacOp::Add => Int(a.checked_add(b).ok_or("integer overflow")?),
            TacOp::Sub => Int(a.checked_sub(b).ok_or("integer overflow")?),
            TacOp::Mul => Int(a.checked_mul(b).ok_or("integer overflow")?),
            TacOp::Div => Int(a.checked_div_euclid(b).ok_or("division by zero")?),
            TacOp::Mod => Int(a.checked_rem_euclid(b).ok_or("division by zero")?),
            _ => compare(op, a.cmp(&b))?,
        },
        (a, b) => {
            let (Some(a), Some(b)) = (a.as_f64(), b.as_f64()) else {
                return Err("non-numeric operand");
            };
            match op {
                TacOp::Add => Real(a + b),
                TacOp::Sub => Real(a - b),
                TacOp::Mul => Real(a * b),
                TacOp::Div if b == 0.0 => return Err("division by zero"),
                TacOp::Div => Real(a / b),
                TacOp::Mod => return Err("remainder of real operands"),
                _ => compare(op, a.partial_cmp(&b).ok_or("comparison with NaN")?)?,
            }
        }
    })
}

fn compare(op: TacOp, ordering: std::cmp::Ordering) -> Result<Concrete, &'static str> {
    use std::cmp::Ordering::*;
    Ok(Concrete::Bool(match op {
        TacOp::Lt => ordering == Less,
        TacOp::Gt => ordering == Greater,
        TacOp::Le => ordering != Greater,
        TacOp::Ge => ordering != Less,
        TacOp::Eq => ordering == Equal,
        TacOp::Ne => ordering != Equal,
        _ => return Err("logical operator over numbers"),
    }))
}

#[cfg(test)]
mod tests {
    use tpinstr::{parser::parse_program, program::Program};

    use super::*;
    use crate::{config::AngleTable, tac::generate_tac};

    fn run(source: &str, inputs: &[(&str, Concrete)], trig: &TrigModel) -> Execution {
        let tac = generate_tac(&parse_program(source, None).unwrap()).unwrap().tac;
        let inputs = inputs.iter().map(|(n, v)| (n.to_string(), *v)).collect();
        Interpreter::new(trig).run(&tac, &inputs).unwrap()
    }

    #[test]
    fn branches_follow_conditions() {
        let source = ":y = 0\ncond (:x > 0) [2]\n:y = 1\nassert :y == 1\n";
        let taken = run(source, &[(":x", Concrete::Int(4))], &TrigModel::Taylor);
        assert_eq!(taken.get(":y"), Some(Concrete::Int(1)));
        assert!(taken.failed_asserts.is_empty());
        assert!(taken.completed);

        let skipped = run(source, &[(":x", Concrete::Int(-4))], &TrigModel::Taylor);
        assert_eq!(skipped.get(":y"), Some(Concrete::Int(0)));
        assert_eq!(skipped.failed_asserts.len(), 1);
    }

    #[test]
    fn integer_division_is_euclidean() {
        let exec = run(":q = -7 / 2\n:r = -7 % 2\n", &[], &TrigModel::Taylor);
        assert_eq!(exec.get(":q"), Some(Concrete::Int(-4)));
        assert_eq!(exec.get(":r"), Some(Concrete::Int(1)));
    }

    #[test]
    fn turtle_moves_with_either_trig_model() {
        let exec = run("right 90\nforward 10\n", &[], &TrigModel::Table(AngleTable::default()));
        assert_eq!(exec.get(name::TURTLE_X), Some(Concrete::Real(0.0)));
        assert_eq!(exec.get(name::TURTLE_Y), Some(Concrete::Real(10.0)));
        assert_eq!(exec.get(name::TURTLE_THETA), Some(Concrete::Int(90)));

        let exec = run("forward 10\n", &[], &TrigModel::Taylor);
        assert_eq!(exec.get(name::TURTLE_X), Some(Concrete::Real(10.0)));
        assert_eq!(exec.get(name::TURTLE_Y), Some(Concrete::Real(0.0)));
    }

    #[test]
    fn loops_stop_when_fuel_runs_out() {
        let tac = generate_tac(&parse_program("nop\ncond false [-1]\n", None).unwrap())
            .unwrap()
            .tac;
        let exec = Interpreter::new(&TrigModel::Taylor)
            .with_fuel(50)
            .run(&tac, &BTreeMap::new())
            .unwrap();
        assert!(!exec.completed);
        assert_eq!(exec.steps, 50);
    }

    #[test]
    fn missing_inputs_are_reported() {
        let tac = generate_tac(&parse_program("assert :b\n", None).unwrap()).unwrap().tac;
        let err = Interpreter::new(&TrigModel::Taylor)
            .run(&tac, &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, TpError::Unsupported { .. }));
    }

    #[test]
    fn model_values_are_keyed_by_original_name() {
        let model: Model = [
            (":x#0".to_string(), Value::Int(3)),
            (":b#0".to_string(), Value::Bool(true)),
            (":s".to_string(), Value::Opaque("(_ bv0 8)".into())),
        ]
        .into_iter()
        .collect();
        let inputs = inputs_from_model(&model);
        assert_eq!(inputs.get(":x"), Some(&Concrete::Int(3)));
        assert_eq!(inputs.get(":b"), Some(&Concrete::Bool(true)));
        assert!(!inputs.contains_key(":s"));
    }

    #[test]
    fn degree_conversion_feeds_cosine() {
        let tac = Program::straight_line([
            TacInstr::declare(":d"),
            TacInstr::DegToRad {
                lvar: name::THETA_RAD.to_string(),
                source: Operand::var(":d"),
            },
            TacInstr::Cos {
                lvar: name::COS_THETA.to_string(),
                source: Operand::var(name::THETA_RAD),
            },
        ]);
        let inputs = [(":d".to_string(), Concrete::Int(180))].into_iter().collect();
        let exec = Interpreter::new(&TrigModel::Taylor).run(&tac, &inputs).unwrap();

        let Some(Concrete::Real(rad)) = exec.get(name::THETA_RAD) else {
            panic!("no radian value: {:?}", exec.env);
        };
        assert!((rad - std::f64::consts::PI).abs() < 1e-12);
        let Some(Concrete::Real(cos)) = exec.get(name::COS_THETA) else {
            panic!("no cosine: {:?}", exec.env);
        };
        let expected = 1.0 - rad * rad / 2.0 + rad.powi(4) / 24.0;
        assert!((cos - expected).abs() < 1e-12);
    }
}
