//! Ordered `(instruction, relative-jump)` listings.
//!
//! A jump of 1 falls through to the next line; any other value is a signed
//! offset to the branch target, counted in lines. A target equal to the listing
//! length designates the program exit.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Jump value of an instruction that falls through.
pub const FALL_THROUGH: i64 = 1;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Program<I> {
    lines: Vec<(I, i64)>,
}

impl<I> Default for Program<I> {
    fn default() -> Self {
        Program { lines: Vec::new() }
    }
}

impl<I> Program<I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a straight-line listing where every instruction falls through.
    pub fn straight_line(instrs: impl IntoIterator<Item = I>) -> Self {
        Program {
            lines: instrs.into_iter().map(|i| (i, FALL_THROUGH)).collect(),
        }
    }

    /// Append an instruction that falls through.
    pub fn push(&mut self, instr: I) {
        self.lines.push((instr, FALL_THROUGH));
    }

    /// Append an instruction with an explicit relative jump.
    pub fn push_jump(&mut self, instr: I, jump: i64) {
        self.lines.push((instr, jump));
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn get(&self, line: usize) -> Option<&(I, i64)> {
        self.lines.get(line)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(I, i64)> {
        self.lines.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut (I, i64)> {
        self.lines.iter_mut()
    }

    pub fn instructions(&self) -> impl Iterator<Item = &I> {
        self.lines.iter().map(|(instr, _)| instr)
    }

    /// Absolute target of the jump stored at `line`.
    pub fn target(&self, line: usize) -> Option<i64> {
        self.lines.get(line).map(|(_, jump)| line as i64 + jump)
    }

    pub fn into_lines(self) -> Vec<(I, i64)> {
        self.lines
    }
}

impl<I> FromIterator<(I, i64)> for Program<I> {
    fn from_iter<T: IntoIterator<Item = (I, i64)>>(iter: T) -> Self {
        Program {
            lines: iter.into_iter().collect(),
        }
    }
}

impl<I> IntoIterator for Program<I> {
    type Item = (I, i64);
    type IntoIter = std::vec::IntoIter<(I, i64)>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.into_iter()
    }
}

impl<I: std::fmt::Display + crate::Instruction> std::fmt::Display for Program<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, (instr, jump)) in self.lines.iter().enumerate() {
            write!(f, "[L{}] {}", index, instr)?;
            if *jump != FALL_THROUGH || instr.branch().is_some() {
                write!(f, " [{}]", jump)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
