//! Expression trees of the source listing.
//!
//! Each [`Expr`] node owns its children and caches the set of variable names it
//! references. The cache is filled on construction and recomputed bottom-up
//! after renaming.
use std::collections::BTreeSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::{EnumIs, EnumIter, EnumTryAs, IntoEnumIterator};

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, EnumIter)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    pub fn to_str(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        ArithOp::iter().find(|op| op.to_str() == s)
    }
}

/// Binary boolean operators, including comparisons.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, EnumIter)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BoolOp {
    And,
    Or,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

impl BoolOp {
    pub fn to_str(&self) -> &'static str {
        match self {
            BoolOp::And => "and",
            BoolOp::Or => "or",
            BoolOp::Lt => "<",
            BoolOp::Gt => ">",
            BoolOp::Le => "<=",
            BoolOp::Ge => ">=",
            BoolOp::Eq => "==",
            BoolOp::Ne => "!=",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        BoolOp::iter().find(|op| op.to_str() == s)
    }

    /// Whether the operands are compared rather than combined.
    pub fn is_comparison(&self) -> bool {
        !matches!(self, BoolOp::And | BoolOp::Or)
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EnumIs, EnumTryAs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ExprKind {
    Num(i64),
    Bool(bool),
    Var(String),
    Neg(Box<Expr>),
    Arith {
        op: ArithOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Not(Box<Expr>),
    Logic {
        op: BoolOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `pendown?`, true while the pen touches the canvas.
    PenDown,
}

impl ExprKind {
    fn collect_variables(&self) -> BTreeSet<String> {
        match self {
            ExprKind::Var(name) => BTreeSet::from([name.clone()]),
            ExprKind::Neg(inner) | ExprKind::Not(inner) => inner.vars.clone(),
            ExprKind::Arith { lhs, rhs, .. } | ExprKind::Logic { lhs, rhs, .. } => {
                lhs.vars.union(&rhs.vars).cloned().collect()
            }
            ExprKind::Num(_) | ExprKind::Bool(_) | ExprKind::PenDown => BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Expr {
    kind: ExprKind,
    vars: BTreeSet<String>,
}

impl From<ExprKind> for Expr {
    fn from(kind: ExprKind) -> Self {
        let vars = kind.collect_variables();
        Expr { kind, vars }
    }
}

impl Expr {
    pub fn num(value: i64) -> Self {
        ExprKind::Num(value).into()
    }

    pub fn bool(value: bool) -> Self {
        ExprKind::Bool(value).into()
    }

    pub fn var(name: impl Into<String>) -> Self {
        ExprKind::Var(name.into()).into()
    }

    pub fn pen_down() -> Self {
        ExprKind::PenDown.into()
    }

    pub fn neg(inner: Expr) -> Self {
        ExprKind::Neg(Box::new(inner)).into()
    }

    pub fn not(inner: Expr) -> Self {
        ExprKind::Not(Box::new(inner)).into()
    }

    pub fn arith(op: ArithOp, lhs: Expr, rhs: Expr) -> Self {
        ExprKind::Arith {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
        .into()
    }

    pub fn logic(op: BoolOp, lhs: Expr, rhs: Expr) -> Self {
        ExprKind::Logic {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
        .into()
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    /// Variables referenced anywhere in this expression.
    pub fn variables(&self) -> &BTreeSet<String> {
        &self.vars
    }

    /// Literal or variable reference.
    pub fn is_atomic(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Num(_) | ExprKind::Bool(_) | ExprKind::Var(_)
        )
    }

    /// Whether this expression evaluates to a boolean.
    pub fn is_boolean(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Bool(_) | ExprKind::Not(_) | ExprKind::Logic { .. } | ExprKind::PenDown
        )
    }

    /// Rename every occurrence of `old` into `new`.
    ///
    /// Does nothing when `old` is not referenced. The variable cache of every
    /// touched node is rebuilt from the caches of its children.
    pub fn rename_variable(&mut self, old: &str, new: &str) {
        if !self.vars.contains(old) {
            return;
        }

        match &mut self.kind {
            ExprKind::Var(name) => *name = new.to_string(),
            ExprKind::Neg(inner) | ExprKind::Not(inner) => inner.rename_variable(old, new),
            ExprKind::Arith { lhs, rhs, .. } | ExprKind::Logic { lhs, rhs, .. } => {
                lhs.rename_variable(old, new);
                rhs.rename_variable(old, new);
            }
            ExprKind::Num(_) | ExprKind::Bool(_) | ExprKind::PenDown => {}
        }

        self.vars = self.kind.collect_variables();
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ExprKind::Num(value) => write!(f, "{}", value),
            ExprKind::Bool(value) => write!(f, "{}", value),
            ExprKind::Var(name) => write!(f, "{}", name),
            ExprKind::Neg(inner) => write!(f, "-({})", inner),
            ExprKind::Not(inner) => write!(f, "not ({})", inner),
            ExprKind::Arith { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op.to_str(), rhs),
            ExprKind::Logic { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op.to_str(), rhs),
            ExprKind::PenDown => write!(f, "pendown?"),
        }
    }
}
