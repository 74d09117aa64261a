//! Lowering of source listings into three-address code.
//!
//! Every source line expands into a deterministic run of TAC instructions.
//! Turtle motion becomes arithmetic over the reserved state variables of
//! [`tpinstr::name`], expression trees are linearized through temporaries and
//! conditional jumps are retargeted to the expanded numbering.
use std::collections::BTreeSet;

use log::debug;
use tpinstr::{
    Instruction,
    ast::{AstProgram, Direction, Stmt},
    expr::{BoolOp, Expr, ExprKind},
    name,
    program::FALL_THROUGH,
    tac::{Operand, TacInstr, TacOp, TacProgram},
};

use crate::error::{TpError, TpResult};

/// Result of lowering a source listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TacOutput {
    pub tac: TacProgram,
    /// First TAC line of every source line, followed by the TAC length for
    /// the one-past-the-end target.
    pub line_map: Vec<usize>,
    /// Variables supplied from outside, declared at the top of `tac`.
    pub free_vars: BTreeSet<String>,
    pub assert_count: usize,
}

/// Whether a leaf ends up in a boolean or an arithmetic position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Arith,
    Bool,
}

type Lines = Vec<(TacInstr, Option<usize>)>;

/// Lowering state. Each temporary prefix has its own counter.
#[derive(Debug, Default)]
pub struct TacGenerator {
    temps: usize,
    branches: usize,
    asserts: usize,
    moves: usize,
    gotos: usize,
    /// Variables last assigned a boolean value.
    boolean_vars: BTreeSet<String>,
    assert_count: usize,
}

/// Lower `ast` with a fresh [`TacGenerator`].
pub fn generate_tac(ast: &AstProgram) -> TpResult<TacOutput> {
    TacGenerator::default().generate(ast)
}

/// Variables read before any write in a forward scan of `tac`.
///
/// Declarations count as inputs, so the result is stable on the output of
/// [`generate_tac`].
pub fn free_variables(tac: &TacProgram) -> BTreeSet<String> {
    let mut bound = BTreeSet::new();
    let mut free = BTreeSet::new();
    for instr in tac.instructions() {
        if let TacInstr::Assign {
            lvar,
            op: TacOp::Decl,
            ..
        } = instr
        {
            free.insert(lvar.clone());
        }
        for variable in instr.read_variables() {
            if !bound.contains(variable) {
                free.insert(variable.to_string());
            }
        }
        if let Some(variable) = instr.write_variable() {
            bound.insert(variable.to_string());
        }
    }
    free
}

impl TacGenerator {
    pub fn generate(mut self, ast: &AstProgram) -> TpResult<TacOutput> {
        let len = ast.len();
        let mut body: Lines = Vec::new();
        let mut line_map = Vec::with_capacity(len + 1);

        for (line, (stmt, jump)) in ast.iter().enumerate() {
            line_map.push(body.len());
            let before = body.len();
            self.lower(line, stmt, *jump, len, &mut body)?;
            debug!(
                "Lowered line {} `{}` into {} instruction(s)",
                line,
                stmt,
                body.len() - before
            );
        }
        line_map.push(body.len());

        // Turn provisional source targets into offsets in the expanded numbering.
        let mut program = TacProgram::new();
        for (index, (instr, target)) in body.into_iter().enumerate() {
            match target {
                Some(target) => program.push_jump(instr, line_map[target] as i64 - index as i64),
                None => program.push(instr),
            }
        }

        // State initialization, pen first so that x ends up right above the body.
        let listing: TacProgram = [name::TURTLE_PEN, name::TURTLE_THETA, name::TURTLE_Y, name::TURTLE_X]
            .into_iter()
            .map(|state| (zero(state), FALL_THROUGH))
            .chain(program)
            .collect();

        let free_vars = free_variables(&listing);
        let declarations = free_vars
            .iter()
            .map(|variable| (TacInstr::declare(variable.as_str()), FALL_THROUGH));
        let tac: TacProgram = declarations.chain(listing).collect();

        let offset = tac.len() - line_map.last().copied().unwrap_or(0);
        let line_map = line_map.into_iter().map(|l| l + offset).collect();

        debug!(
            "Generated {} TAC instruction(s) from {} line(s), {} input(s)",
            tac.len(),
            len,
            free_vars.len()
        );
        Ok(TacOutput {
            tac,
            line_map,
            free_vars,
            assert_count: self.assert_count,
        })
    }

    fn lower(
        &mut self,
        line: usize,
        stmt: &Stmt,
        jump: i64,
        len: usize,
        out: &mut Lines,
    ) -> TpResult<()> {
        let unsupported = |reason: &str| TpError::Unsupported {
            line,
            instruction: stmt.to_string(),
            reason: reason.to_string(),
        };
        if jump != FALL_THROUGH && !stmt.is_condition() {
            return Err(unsupported("only conditions may carry a jump"));
        }

        match stmt {
            Stmt::Assignment { lvar, expr } => {
                let context = if self.is_boolean(expr) {
                    Context::Bool
                } else {
                    Context::Arith
                };
                self.flatten_into(line, stmt, lvar, expr, context, out)?;
                if context == Context::Bool {
                    self.boolean_vars.insert(lvar.clone());
                } else {
                    self.boolean_vars.remove(lvar);
                }
            }
            Stmt::Condition(cond) => {
                let target = line as i64 + jump;
                if target < 0 || target > len as i64 {
                    return Err(unsupported(&format!(
                        "jump target {} lies outside of 0..={}",
                        target, len
                    )));
                }
                let operand = match cond.kind() {
                    ExprKind::Bool(value) => Operand::Bool(*value),
                    ExprKind::Var(variable) => Operand::var(variable.as_str()),
                    ExprKind::Num(_) => return Err(unsupported("numeric literal used as a condition")),
                    _ => {
                        let branch = fresh(name::BRANCH_PREFIX, &mut self.branches);
                        self.flatten_into(line, stmt, &branch, cond, Context::Bool, out)?;
                        Operand::Var(branch)
                    }
                };
                out.push((TacInstr::Condition(operand), Some(target as usize)));
            }
            Stmt::Assert(cond) => {
                if cond.kind().is_num() {
                    return Err(unsupported("numeric literal used as an assertion"));
                }
                let temp = fresh(name::ASSERT_PREFIX, &mut self.asserts);
                self.flatten_into(line, stmt, &temp, cond, Context::Bool, out)?;
                out.push((TacInstr::Assert(Operand::Var(temp)), None));
                self.assert_count += 1;
            }
            Stmt::Move { direction, expr } => {
                if self.is_boolean(expr) {
                    return Err(unsupported("boolean move amount"));
                }
                let amount = match leaf(expr) {
                    Some(operand) => operand,
                    None => {
                        let temp = fresh(name::MOVE_PREFIX, &mut self.moves);
                        self.flatten_into(line, stmt, &temp, expr, Context::Arith, out)?;
                        Operand::Var(temp)
                    }
                };
                out.push((
                    TacInstr::Move {
                        direction: *direction,
                        operand: amount.clone(),
                    },
                    None,
                ));
                lower_motion(*direction, amount, out);
            }
            Stmt::Pen(status) => {
                out.push((TacInstr::Pen(*status), None));
                out.push((
                    TacInstr::assign(
                        name::TURTLE_PEN,
                        Operand::Num(status.state_value()),
                        TacOp::Add,
                        Operand::Num(0),
                    ),
                    None,
                ));
            }
            Stmt::Goto { x, y } => {
                if self.is_boolean(x) || self.is_boolean(y) {
                    return Err(unsupported("boolean goto coordinate"));
                }
                let index = self.gotos;
                let (lx, ly) = (leaf(x), leaf(y));
                if lx.is_none() || ly.is_none() {
                    self.gotos += 1;
                }
                let x = match lx {
                    Some(operand) => operand,
                    None => {
                        let temp = format!("{}{}", name::GOTO_X_PREFIX, index);
                        self.flatten_into(line, stmt, &temp, x, Context::Arith, out)?;
                        Operand::Var(temp)
                    }
                };
                let y = match ly {
                    Some(operand) => operand,
                    None => {
                        let temp = format!("{}{}", name::GOTO_Y_PREFIX, index);
                        self.flatten_into(line, stmt, &temp, y, Context::Arith, out)?;
                        Operand::Var(temp)
                    }
                };
                out.push((
                    TacInstr::Goto {
                        x: x.clone(),
                        y: y.clone(),
                    },
                    None,
                ));
                out.push((
                    TacInstr::assign(name::TURTLE_X, x, TacOp::Add, Operand::Num(0)),
                    None,
                ));
                out.push((
                    TacInstr::assign(name::TURTLE_Y, y, TacOp::Add, Operand::Num(0)),
                    None,
                ));
            }
            Stmt::NoOp => out.push((TacInstr::NoOp, None)),
            Stmt::Pause => out.push((TacInstr::Pause, None)),
            Stmt::PhiAssignment { .. } => {
                return Err(unsupported("phi assignments cannot appear before SSA construction"));
            }
        }
        Ok(())
    }

    fn is_boolean(&self, expr: &Expr) -> bool {
        match expr.kind() {
            ExprKind::Var(variable) => self.boolean_vars.contains(variable),
            _ => expr.is_boolean(),
        }
    }

    /// Emit the instructions computing `expr` into `dest`.
    fn flatten_into(
        &mut self,
        line: usize,
        stmt: &Stmt,
        dest: &str,
        expr: &Expr,
        context: Context,
        out: &mut Lines,
    ) -> TpResult<()> {
        let instr = match expr.kind() {
            ExprKind::Num(value) => {
                if context == Context::Bool {
                    return Err(numeric_in_boolean_position(line, stmt, *value));
                }
                TacInstr::assign(dest, Operand::Num(0), TacOp::Add, Operand::Num(*value))
            }
            ExprKind::Bool(value) => {
                TacInstr::assign(dest, Operand::Bool(*value), TacOp::And, Operand::Bool(true))
            }
            ExprKind::Var(variable) => {
                if context == Context::Bool || self.boolean_vars.contains(variable) {
                    TacInstr::assign(dest, Operand::var(variable.as_str()), TacOp::And, Operand::Bool(true))
                } else {
                    TacInstr::assign(dest, Operand::Num(0), TacOp::Add, Operand::var(variable.as_str()))
                }
            }
            ExprKind::PenDown => TacInstr::assign(
                dest,
                Operand::var(name::TURTLE_PEN),
                TacOp::Eq,
                Operand::Num(0),
            ),
            ExprKind::Neg(inner) => {
                let operand = self.operand(line, stmt, inner, Context::Arith, out)?;
                TacInstr::assign(dest, Operand::Num(0), TacOp::Sub, operand)
            }
            ExprKind::Arith { op, lhs, rhs } => {
                let lhs = self.operand(line, stmt, lhs, Context::Arith, out)?;
                let rhs = self.operand(line, stmt, rhs, Context::Arith, out)?;
                TacInstr::assign(dest, lhs, (*op).into(), rhs)
            }
            ExprKind::Not(inner) => {
                let operand = self.operand(line, stmt, inner, Context::Bool, out)?;
                TacInstr::assign(dest, Operand::Unused, TacOp::Not, operand)
            }
            ExprKind::Logic { op, lhs, rhs } => {
                let context = match op {
                    BoolOp::And | BoolOp::Or => Context::Bool,
                    BoolOp::Eq | BoolOp::Ne if self.is_boolean(lhs) || self.is_boolean(rhs) => {
                        Context::Bool
                    }
                    _ => Context::Arith,
                };
                let lhs = self.operand(line, stmt, lhs, context, out)?;
                let rhs = self.operand(line, stmt, rhs, context, out)?;
                TacInstr::assign(dest, lhs, (*op).into(), rhs)
            }
        };
        out.push((instr, None));
        Ok(())
    }

    /// Atomic operand for `expr`, computing compound expressions into a fresh
    /// temporary first.
    fn operand(
        &mut self,
        line: usize,
        stmt: &Stmt,
        expr: &Expr,
        context: Context,
        out: &mut Lines,
    ) -> TpResult<Operand> {
        if let Some(operand) = leaf(expr) {
            if let (Operand::Num(value), Context::Bool) = (&operand, context) {
                return Err(numeric_in_boolean_position(line, stmt, *value));
            }
            return Ok(operand);
        }
        let temp = fresh(name::TEMP_PREFIX, &mut self.temps);
        let context = if expr.is_boolean() {
            Context::Bool
        } else {
            context
        };
        self.flatten_into(line, stmt, &temp, expr, context, out)?;
        Ok(Operand::Var(temp))
    }
}

fn numeric_in_boolean_position(line: usize, stmt: &Stmt, value: i64) -> TpError {
    TpError::Unsupported {
        line,
        instruction: stmt.to_string(),
        reason: format!("numeric literal {} in a boolean position", value),
    }
}

fn fresh(prefix: &str, counter: &mut usize) -> String {
    let name = format!("{}{}", prefix, counter);
    *counter += 1;
    name
}

fn leaf(expr: &Expr) -> Option<Operand> {
    match expr.kind() {
        ExprKind::Num(value) => Some(Operand::Num(*value)),
        ExprKind::Bool(value) => Some(Operand::Bool(*value)),
        ExprKind::Var(variable) => Some(Operand::var(variable.as_str())),
        _ => None,
    }
}

fn zero(variable: &str) -> TacInstr {
    TacInstr::assign(variable, Operand::Num(0), TacOp::Add, Operand::Num(0))
}

/// Expand a move into arithmetic over the turtle state.
fn lower_motion(direction: Direction, amount: Operand, out: &mut Lines) {
    let var = |variable: &str| Operand::var(variable);
    let heading = || var(name::TURTLE_THETA);
    let mut emit = |instr| out.push((instr, None));
    match direction {
        Direction::Forward | Direction::Backward => {
            let op = if direction == Direction::Forward {
                TacOp::Add
            } else {
                TacOp::Sub
            };
            emit(TacInstr::Cos {
                lvar: name::COS_THETA.to_string(),
                source: heading(),
            });
            emit(TacInstr::Sin {
                lvar: name::SIN_THETA.to_string(),
                source: heading(),
            });
            emit(TacInstr::assign(name::DELTA_X, amount.clone(), TacOp::Mul, var(name::COS_THETA)));
            emit(TacInstr::assign(name::DELTA_Y, amount, TacOp::Mul, var(name::SIN_THETA)));
            emit(TacInstr::assign(name::TURTLE_X, var(name::TURTLE_X), op, var(name::DELTA_X)));
            emit(TacInstr::assign(name::TURTLE_Y, var(name::TURTLE_Y), op, var(name::DELTA_Y)));
        }
        Direction::Left => emit(TacInstr::assign(name::TURTLE_THETA, heading(), TacOp::Sub, amount)),
        Direction::Right => emit(TacInstr::assign(name::TURTLE_THETA, heading(), TacOp::Add, amount)),
    }
}

#[cfg(test)]
mod tests {
    use tpinstr::{ast::PenStatus, parser::parse_program};

    use super::*;

    fn lower(source: &str) -> TacOutput {
        generate_tac(&parse_program(source, None).unwrap()).unwrap()
    }

    fn listing(output: &TacOutput) -> Vec<String> {
        output.tac.instructions().map(ToString::to_string).collect()
    }

    #[test]
    fn prologue_order_and_declarations() {
        let output = lower(":y = :x + :w\n");
        assert_eq!(
            listing(&output),
            vec![
                ":w = input",
                ":x = input",
                ":__turtle_pen = 0 + 0",
                ":__turtle_theta = 0 + 0",
                ":__turtle_y = 0 + 0",
                ":__turtle_x = 0 + 0",
                ":y = :x + :w",
            ]
        );
        assert_eq!(output.free_vars, BTreeSet::from([":w".to_string(), ":x".to_string()]));
        assert_eq!(output.line_map, vec![6, 7]);
        assert_eq!(free_variables(&output.tac), output.free_vars);
        assert_eq!(free_variables(&output.tac), free_variables(&output.tac));
    }

    #[test]
    fn nested_expressions_go_through_temporaries() {
        let output = lower(":z = (:a + 1) * -(:b)\n:z = 4\n:z = :a\n");
        let body: Vec<_> = listing(&output).into_iter().skip(6).collect();
        assert_eq!(
            body,
            vec![
                ":__temp_0 = :a + 1",
                ":__temp_1 = 0 - :b",
                ":z = :__temp_0 * :__temp_1",
                ":z = 0 + 4",
                ":z = 0 + :a",
            ]
        );
        for instr in output.tac.instructions() {
            if let TacInstr::Assign { lhs, rhs, .. } = instr {
                assert!(matches!(lhs, Operand::Var(_) | Operand::Num(_) | Operand::Bool(_) | Operand::Unused));
                assert!(matches!(rhs, Operand::Var(_) | Operand::Num(_) | Operand::Bool(_) | Operand::Unused));
            }
        }
    }

    #[test]
    fn boolean_leaves_use_the_identity() {
        let output = lower(":b = :x > 0\n:c = :b\nassert :c\nassert true\n:d = not :c\n");
        let body: Vec<_> = listing(&output).into_iter().skip(5).collect();
        assert_eq!(
            body,
            vec![
                ":b = :x > 0",
                ":c = :b and true",
                ":__assert_0 = :c and true",
                "assert :__assert_0",
                ":__assert_1 = true and true",
                "assert :__assert_1",
                ":d = not :c",
            ]
        );
        assert_eq!(output.assert_count, 2);
    }

    #[test]
    fn conditions_are_retargeted() {
        let source = "\
cond (:x > 0) [3]
forward :x
cond false [2]
left 90
pendown
";
        let ast = parse_program(source, None).unwrap();
        let output = generate_tac(&ast).unwrap();
        for (line, (stmt, jump)) in ast.iter().enumerate() {
            if stmt.is_condition() {
                let target = (line as i64 + jump) as usize;
                let tac_line = output.line_map[line + 1] - 1;
                let landing = output.tac.target(tac_line).unwrap() as usize;
                assert_eq!(landing, output.line_map[target]);
            }
        }
        let cond = output.line_map[1] - 1;
        assert_eq!(
            output.tac.get(cond).map(|(i, _)| i.to_string()),
            Some("cond :__branch_0".to_string())
        );
        assert_eq!(output.line_map.len(), ast.len() + 1);
        assert_eq!(*output.line_map.last().unwrap(), output.tac.len());
    }

    #[test]
    fn forward_expands_into_state_updates() {
        let output = lower("forward 10\n");
        let body: Vec<_> = listing(&output).into_iter().skip(4).collect();
        assert_eq!(
            body,
            vec![
                "forward 10",
                ":__cos_theta = cos :__turtle_theta",
                ":__sin_theta = sin :__turtle_theta",
                ":__delta_x = 10 * :__cos_theta",
                ":__delta_y = 10 * :__sin_theta",
                ":__turtle_x = :__turtle_x + :__delta_x",
                ":__turtle_y = :__turtle_y + :__delta_y",
            ]
        );
        assert!(output.free_vars.is_empty());
    }

    #[test]
    fn turns_pen_and_goto() {
        let output = lower("backward (:d * 2)\nleft :a\nright 45\npenup\ngoto (:d + 1), 3\n");
        let body: Vec<_> = listing(&output).into_iter().skip(6).collect();
        assert_eq!(body[0], ":__move_0 = :d * 2");
        assert_eq!(body[1], "backward :__move_0");
        assert_eq!(body[6], ":__turtle_x = :__turtle_x - :__delta_x");
        assert_eq!(body[8], "left :a");
        assert_eq!(body[9], ":__turtle_theta = :__turtle_theta - :a");
        assert_eq!(body[10], "right 45");
        assert_eq!(body[11], ":__turtle_theta = :__turtle_theta + 45");
        assert_eq!(body[12], "penup");
        assert_eq!(body[13], ":__turtle_pen = 1 + 0");
        assert_eq!(
            &body[14..],
            &[
                ":__x_0 = :d + 1",
                "goto :__x_0, 3",
                ":__turtle_x = :__x_0 + 0",
                ":__turtle_y = 3 + 0",
            ]
        );
        assert!(matches!(
            output.tac.get(18),
            Some((TacInstr::Pen(PenStatus::Up), 1))
        ));
    }

    #[test]
    fn pendown_query_reads_the_pen() {
        let output = lower("assert pendown?\n");
        assert_eq!(
            listing(&output)[4],
            ":__assert_0 = :__turtle_pen == 0"
        );
    }

    #[test]
    fn unsupported_constructs_abort() {
        let cases = [
            ":y = phi(:a, :b)\n",
            "cond 3 [1]\n",
            "cond :x [7]\n",
            "assert 1\n",
            "forward (:x > 1)\n",
        ];
        for source in cases {
            let ast = parse_program(source, None).unwrap();
            let err = generate_tac(&ast).unwrap_err();
            assert!(
                matches!(err, TpError::Unsupported { line: 0, .. }),
                "{} lowered: {:?}",
                source,
                err
            );
        }

        let mut ast = AstProgram::new();
        ast.push_jump(Stmt::NoOp, 2);
        assert!(matches!(
            generate_tac(&ast),
            Err(TpError::Unsupported { .. })
        ));
    }

    #[test]
    fn numeric_literal_compared_with_a_boolean_is_rejected_on_its_line() {
        for source in [
            ":a = 2\n:c = (:a > 0) == 1\n",
            ":a = 2\nassert 0 != (:a < 5)\n",
            ":a = 2\n:c = :a > 0 and 1\n",
        ] {
            let ast = parse_program(source, None).unwrap();
            let err = generate_tac(&ast).unwrap_err();
            let TpError::Unsupported { line, reason, .. } = &err else {
                panic!("{} lowered: {:?}", source, err);
            };
            assert_eq!(*line, 1, "{}", source);
            assert!(reason.contains("boolean position"), "{}", reason);
        }
    }
}
