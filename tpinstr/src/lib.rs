//! Instruction model for turtle programs.
//!
//! This crate groups the program representations shared by every stage of the
//! verification pipeline:
//!
//! - `expr`: expression trees with eagerly cached variable sets
//! - `ast`: statements of the flat, jump-annotated source listing
//! - `tac`: three-address instructions, also used for SSA form
//! - `program`: ordered `(instruction, relative-jump)` listings
//! - `cfg`: basic-block graph with dominator tree and dominance frontiers
//! - `name`: reserved variable names and SSA versioning helpers
//! - `parser`: text front-end for listings (feature `chumsky`)
//!
//! Every instruction kind implements [`Instruction`], which exposes the read and
//! write variable sets consumed by SSA construction.
use std::collections::BTreeSet;

use crate::utils::Error;

pub mod ast;
pub mod cfg;
pub mod expr;
pub mod name;
#[cfg(feature = "chumsky")]
pub mod parser;
pub mod program;
pub mod tac;
pub mod utils;

/// Outcome selector of an instruction that may transfer control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch<'a> {
    /// Branch on the value of a boolean variable.
    Variable(&'a str),
    /// Branch on a constant; `false` always jumps, `true` always falls through.
    Literal(bool),
    /// Branch on a compound predicate that has not been flattened yet.
    Predicate,
}

/// Common interface implemented by every instruction kind.
///
/// Read and write sets are derived structurally from the operands and stay
/// consistent under renaming. Names are matched by exact equality.
pub trait Instruction {
    /// Iterate over the variables read by this instruction. A variable read in
    /// several operand positions may be yielded more than once.
    fn read_variables(&self) -> impl Iterator<Item = &str>;

    /// Return the variable written by this instruction, if any.
    fn write_variable(&self) -> Option<&str> {
        None
    }

    /// Replace every read occurrence of `old` with `new`. No-op if `old` is not read.
    fn rename_read(&mut self, old: &str, new: &str);

    /// Replace the written variable `old` with `new`.
    ///
    /// Fails if `old` is not the variable this instruction writes.
    fn rename_write(&mut self, old: &str, new: &str) -> Result<(), Error>;

    /// Return the branch selector if this instruction is a conditional jump.
    fn branch(&self) -> Option<Branch<'_>> {
        None
    }

    /// Whether this instruction is a phi assignment.
    fn is_phi(&self) -> bool {
        false
    }

    /// Deduplicated read set.
    fn read_set(&self) -> BTreeSet<&str> {
        self.read_variables().collect()
    }

    /// Whether `variable` is read by this instruction.
    fn reads(&self, variable: &str) -> bool {
        self.read_variables().any(|v| v == variable)
    }
}
