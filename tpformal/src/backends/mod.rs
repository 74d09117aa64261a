/// Any SMT-LIB 2 solver driven over stdin/stdout (z3, cvc5, ...).
pub mod process;
/// In-process Z3 through the `z3` crate.
#[cfg(feature = "z3")]
pub mod z3_backend;

pub use process::SmtLibProcess;
#[cfg(feature = "z3")]
pub use z3_backend::Z3Solver;
