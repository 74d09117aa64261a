//! Statements of the flat, jump-annotated source listing.
use std::str::FromStr;

use auto_enums::auto_enum;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::{EnumDiscriminants, EnumIs, EnumIter, IntoEnumIterator};

use crate::{Branch, Instruction, expr::Expr, expr::ExprKind, program::Program, utils::Error};

/// Turtle motion commands.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EnumIter)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
}

impl Direction {
    pub fn to_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }

    /// Whether this direction moves the turtle rather than turning it.
    pub fn is_translation(&self) -> bool {
        matches!(self, Direction::Forward | Direction::Backward)
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Direction::iter()
            .find(|d| d.to_str() == s)
            .ok_or_else(|| Error::UnknownDirection(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, EnumIter)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PenStatus {
    Up,
    Down,
}

impl PenStatus {
    pub fn to_str(&self) -> &'static str {
        match self {
            PenStatus::Up => "penup",
            PenStatus::Down => "pendown",
        }
    }

    /// Value stored in the pen state variable.
    pub fn state_value(&self) -> i64 {
        match self {
            PenStatus::Down => 0,
            PenStatus::Up => 1,
        }
    }
}

impl FromStr for PenStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PenStatus::iter()
            .find(|p| p.to_str() == s)
            .ok_or_else(|| Error::UnknownPenStatus(s.to_string()))
    }
}

/// A statement of the source listing.
#[derive(Debug, Clone, Hash, PartialEq, Eq, EnumIs, EnumDiscriminants)]
#[strum_discriminants(name(StmtKind))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Stmt {
    Assignment { lvar: String, expr: Expr },
    /// Falls through when the condition holds, jumps otherwise.
    Condition(Expr),
    Assert(Expr),
    Move { direction: Direction, expr: Expr },
    Pen(PenStatus),
    Goto { x: Expr, y: Expr },
    NoOp,
    Pause,
    PhiAssignment { lvar: String, operands: Vec<String> },
}

/// A source listing.
pub type AstProgram = Program<Stmt>;

impl Instruction for Stmt {
    #[auto_enum(Iterator)]
    fn read_variables(&self) -> impl Iterator<Item = &str> {
        match self {
            Stmt::Assignment { expr, .. }
            | Stmt::Condition(expr)
            | Stmt::Assert(expr)
            | Stmt::Move { expr, .. } => expr.variables().iter().map(String::as_str),
            Stmt::Goto { x, y } => x
                .variables()
                .iter()
                .chain(y.variables().iter())
                .map(String::as_str),
            Stmt::PhiAssignment { operands, .. } => operands.iter().map(String::as_str),
            Stmt::Pen(_) | Stmt::NoOp | Stmt::Pause => std::iter::empty(),
        }
    }

    fn write_variable(&self) -> Option<&str> {
        match self {
            Stmt::Assignment { lvar, .. } | Stmt::PhiAssignment { lvar, .. } => Some(lvar),
            _ => None,
        }
    }

    fn rename_read(&mut self, old: &str, new: &str) {
        match self {
            Stmt::Assignment { expr, .. }
            | Stmt::Condition(expr)
            | Stmt::Assert(expr)
            | Stmt::Move { expr, .. } => expr.rename_variable(old, new),
            Stmt::Goto { x, y } => {
                x.rename_variable(old, new);
                y.rename_variable(old, new);
            }
            Stmt::PhiAssignment { operands, .. } => {
                for operand in operands.iter_mut().filter(|o| o.as_str() == old) {
                    *operand = new.to_string();
                }
            }
            Stmt::Pen(_) | Stmt::NoOp | Stmt::Pause => {}
        }
    }

    fn rename_write(&mut self, old: &str, new: &str) -> Result<(), Error> {
        let instruction = self.to_string();
        match self {
            Stmt::Assignment { lvar, .. } | Stmt::PhiAssignment { lvar, .. } => {
                if lvar != old {
                    return Err(Error::WriteTargetMismatch {
                        instruction,
                        requested: old.to_string(),
                        actual: lvar.clone(),
                    });
                }
                *lvar = new.to_string();
                Ok(())
            }
            _ => Err(Error::NoWriteTarget {
                instruction,
                requested: old.to_string(),
            }),
        }
    }

    fn branch(&self) -> Option<Branch<'_>> {
        match self {
            Stmt::Condition(expr) => Some(match expr.kind() {
                ExprKind::Var(name) => Branch::Variable(name),
                ExprKind::Bool(value) => Branch::Literal(*value),
                _ => Branch::Predicate,
            }),
            _ => None,
        }
    }

    fn is_phi(&self) -> bool {
        self.is_phi_assignment()
    }
}

impl std::fmt::Display for Stmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stmt::Assignment { lvar, expr } => write!(f, "{} = {}", lvar, expr),
            Stmt::Condition(expr) => write!(f, "cond {}", expr),
            Stmt::Assert(expr) => write!(f, "assert {}", expr),
            Stmt::Move { direction, expr } => write!(f, "{} {}", direction.to_str(), expr),
            Stmt::Pen(status) => write!(f, "{}", status.to_str()),
            Stmt::Goto { x, y } => write!(f, "goto {}, {}", x, y),
            Stmt::NoOp => write!(f, "nop"),
            Stmt::Pause => write!(f, "pause"),
            Stmt::PhiAssignment { lvar, operands } => {
                write!(f, "{} = phi({})", lvar, operands.join(", "))
            }
        }
    }
}
