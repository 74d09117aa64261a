//! Three-address instructions.
//!
//! Every [`TacInstr::Assign`] carries a single operator and at most two atomic
//! operands. The same instruction set represents SSA form, where variables are
//! versioned and merges use [`TacInstr::Phi`].
use auto_enums::auto_enum;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::{EnumDiscriminants, EnumIs, EnumIter, EnumTryAs, IntoEnumIterator};

use crate::{
    Branch, Instruction,
    ast::{Direction, PenStatus},
    expr::{ArithOp, BoolOp},
    program::Program,
    utils::Error,
};

/// Atomic operand of a three-address instruction.
#[derive(Debug, Clone, Hash, PartialEq, Eq, EnumIs, EnumTryAs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Operand {
    Var(String),
    Num(i64),
    Bool(bool),
    /// Empty slot of unary operators and declarations.
    Unused,
}

impl Operand {
    pub fn var(name: impl Into<String>) -> Self {
        Operand::Var(name.into())
    }

    pub fn variable(&self) -> Option<&str> {
        match self {
            Operand::Var(name) => Some(name),
            _ => None,
        }
    }

    fn rename(&mut self, old: &str, new: &str) {
        if let Operand::Var(name) = self {
            if name == old {
                *name = new.to_string();
            }
        }
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Var(name) => write!(f, "{}", name),
            Operand::Num(value) => write!(f, "{}", value),
            Operand::Bool(value) => write!(f, "{}", value),
            Operand::Unused => write!(f, "_"),
        }
    }
}

/// Operator of a three-address assignment.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, EnumIs, EnumIter)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TacOp {
    /// Empty operator: the variable is declared and supplied from outside.
    Decl,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    Not,
}

impl TacOp {
    pub fn to_str(&self) -> &'static str {
        match self {
            TacOp::Decl => "",
            TacOp::Add => "+",
            TacOp::Sub => "-",
            TacOp::Mul => "*",
            TacOp::Div => "/",
            TacOp::Mod => "%",
            TacOp::Lt => "<",
            TacOp::Gt => ">",
            TacOp::Le => "<=",
            TacOp::Ge => ">=",
            TacOp::Eq => "==",
            TacOp::Ne => "!=",
            TacOp::And => "and",
            TacOp::Or => "or",
            TacOp::Not => "not",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        TacOp::iter().find(|op| op.to_str() == s)
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            TacOp::Add | TacOp::Sub | TacOp::Mul | TacOp::Div | TacOp::Mod
        )
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            TacOp::Lt | TacOp::Gt | TacOp::Le | TacOp::Ge | TacOp::Eq | TacOp::Ne
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, TacOp::And | TacOp::Or | TacOp::Not)
    }
}

impl From<ArithOp> for TacOp {
    fn from(op: ArithOp) -> Self {
        match op {
            ArithOp::Add => TacOp::Add,
            ArithOp::Sub => TacOp::Sub,
            ArithOp::Mul => TacOp::Mul,
            ArithOp::Div => TacOp::Div,
            ArithOp::Mod => TacOp::Mod,
        }
    }
}

impl From<BoolOp> for TacOp {
    fn from(op: BoolOp) -> Self {
        match op {
            BoolOp::And => TacOp::And,
            BoolOp::Or => TacOp::Or,
            BoolOp::Lt => TacOp::Lt,
            BoolOp::Gt => TacOp::Gt,
            BoolOp::Le => TacOp::Le,
            BoolOp::Ge => TacOp::Ge,
            BoolOp::Eq => TacOp::Eq,
            BoolOp::Ne => TacOp::Ne,
        }
    }
}

/// Three-address (and SSA) instruction.
#[derive(Debug, Clone, Hash, PartialEq, Eq, EnumIs, EnumDiscriminants)]
#[strum_discriminants(name(TacKind))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TacInstr {
    /// `lvar = lhs op rhs`
    Assign {
        lvar: String,
        lhs: Operand,
        op: TacOp,
        rhs: Operand,
    },
    /// Falls through when the operand holds, jumps otherwise.
    Condition(Operand),
    Assert(Operand),
    Move {
        direction: Direction,
        operand: Operand,
    },
    Pen(PenStatus),
    Goto { x: Operand, y: Operand },
    /// `lvar = cos(source)`, source in degrees unless it is already a radian value.
    Cos { lvar: String, source: Operand },
    /// `lvar = sin(source)`, source in degrees unless it is already a radian value.
    Sin { lvar: String, source: Operand },
    /// `lvar = source * pi / 180`
    DegToRad { lvar: String, source: Operand },
    NoOp,
    Pause,
    Phi { lvar: String, operands: Vec<String> },
}

/// A three-address listing.
pub type TacProgram = Program<TacInstr>;

impl TacInstr {
    pub fn assign(lvar: impl Into<String>, lhs: Operand, op: TacOp, rhs: Operand) -> Self {
        TacInstr::Assign {
            lvar: lvar.into(),
            lhs,
            op,
            rhs,
        }
    }

    /// Declaration of an externally supplied variable.
    pub fn declare(lvar: impl Into<String>) -> Self {
        TacInstr::assign(lvar, Operand::Unused, TacOp::Decl, Operand::Unused)
    }

    pub fn phi(lvar: impl Into<String>) -> Self {
        TacInstr::Phi {
            lvar: lvar.into(),
            operands: Vec::new(),
        }
    }

    /// Iterate over the operand slots of this instruction.
    #[auto_enum(Iterator)]
    pub fn operands(&self) -> impl Iterator<Item = &Operand> {
        match self {
            TacInstr::Assign { lhs, rhs, .. } => [lhs, rhs].into_iter(),
            TacInstr::Condition(operand)
            | TacInstr::Assert(operand)
            | TacInstr::Move { operand, .. }
            | TacInstr::Cos {
                source: operand, ..
            }
            | TacInstr::Sin {
                source: operand, ..
            }
            | TacInstr::DegToRad {
                source: operand, ..
            } => std::iter::once(operand),
            TacInstr::Goto { x, y } => [x, y].into_iter(),
            TacInstr::Pen(_) | TacInstr::NoOp | TacInstr::Pause | TacInstr::Phi { .. } => {
                std::iter::empty()
            }
        }
    }

    #[auto_enum(Iterator)]
    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        match self {
            TacInstr::Assign { lhs, rhs, .. } => [lhs, rhs].into_iter(),
            TacInstr::Condition(operand)
            | TacInstr::Assert(operand)
            | TacInstr::Move { operand, .. }
            | TacInstr::Cos {
                source: operand, ..
            }
            | TacInstr::Sin {
                source: operand, ..
            }
            | TacInstr::DegToRad {
                source: operand, ..
            } => std::iter::once(operand),
            TacInstr::Goto { x, y } => [x, y].into_iter(),
            TacInstr::Pen(_) | TacInstr::NoOp | TacInstr::Pause | TacInstr::Phi { .. } => {
                std::iter::empty()
            }
        }
    }
}

impl Instruction for TacInstr {
    #[auto_enum(Iterator)]
    fn read_variables(&self) -> impl Iterator<Item = &str> {
        match self {
            TacInstr::Phi { operands, .. } => operands.iter().map(String::as_str),
            _ => self.operands().filter_map(Operand::variable),
        }
    }

    fn write_variable(&self) -> Option<&str> {
        match self {
            TacInstr::Assign { lvar, .. }
            | TacInstr::Cos { lvar, .. }
            | TacInstr::Sin { lvar, .. }
            | TacInstr::DegToRad { lvar, .. }
            | TacInstr::Phi { lvar, .. } => Some(lvar),
            _ => None,
        }
    }

    fn rename_read(&mut self, old: &str, new: &str) {
        match self {
            TacInstr::Phi { operands, .. } => {
                for operand in operands.iter_mut().filter(|o| o.as_str() == old) {
                    *operand = new.to_string();
                }
            }
            _ => {
                for operand in self.operands_mut() {
                    operand.rename(old, new);
                }
            }
        }
    }

    fn rename_write(&mut self, old: &str, new: &str) -> Result<(), Error> {
        let instruction = self.to_string();
        match self {
            TacInstr::Assign { lvar, .. }
            | TacInstr::Cos { lvar, .. }
            | TacInstr::Sin { lvar, .. }
            | TacInstr::DegToRad { lvar, .. }
            | TacInstr::Phi { lvar, .. } => {
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
            TacInstr::Condition(Operand::Var(name)) => Some(Branch::Variable(name)),
            TacInstr::Condition(Operand::Bool(value)) => Some(Branch::Literal(*value)),
            TacInstr::Condition(_) => Some(Branch::Predicate),
            _ => None,
        }
    }

    fn is_phi(&self) -> bool {
        TacInstr::is_phi(self)
    }
}

impl std::fmt::Display for TacInstr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TacInstr::Assign { lvar, op: TacOp::Decl, .. } => write!(f, "{} = input", lvar),
            TacInstr::Assign {
                lvar,
                op: TacOp::Not,
                rhs,
                ..
            } => write!(f, "{} = not {}", lvar, rhs),
            TacInstr::Assign { lvar, lhs, op, rhs } => {
                write!(f, "{} = {} {} {}", lvar, lhs, op.to_str(), rhs)
            }
            TacInstr::Condition(operand) => write!(f, "cond {}", operand),
            TacInstr::Assert(operand) => write!(f, "assert {}", operand),
            TacInstr::Move { direction, operand } => {
                write!(f, "{} {}", direction.to_str(), operand)
            }
            TacInstr::Pen(status) => write!(f, "{}", status.to_str()),
            TacInstr::Goto { x, y } => write!(f, "goto {}, {}", x, y),
            TacInstr::Cos { lvar, source } => write!(f, "{} = cos {}", lvar, source),
            TacInstr::Sin { lvar, source } => write!(f, "{} = sin {}", lvar, source),
            TacInstr::DegToRad { lvar, source } => write!(f, "{} = rad {}", lvar, source),
            TacInstr::NoOp => write!(f, "nop"),
            TacInstr::Pause => write!(f, "pause"),
            TacInstr::Phi { lvar, operands } => {
                write!(f, "{} = phi({})", lvar, operands.join(", "))
            }
        }
    }
}
