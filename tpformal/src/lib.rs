//! Tpformal: the solver-facing side of the turtle program checker.
//!
//! Constraints are built as [`Term`] trees over three sorts (`Bool`, `Int`,
//! `Real`). A term can be
//!  - canonicalized locally with [`simplify::canonicalize`] (flattening,
//!    constant folding, complementary literals, common-factor extraction),
//!  - rendered to SMT-LIB 2 with [`smtlib`],
//!  - pretty-printed with colors through [`pretty::PrettyTerm`],
//!  - handed to any [`solver::Solver`] backend.
//!
//! Example
//! ```
//! use tpformal::prelude::*;
//!
//! let c = Term::var(":c#0", Sort::Bool);
//! let p = Term::var(":p#0", Sort::Bool);
//! let merged = Term::or(vec![
//!     Term::and(vec![p.clone(), c.clone()]),
//!     Term::and(vec![p.clone(), c.not()]),
//! ]);
//! assert_eq!(canonicalize(&merged), p);
//! ```

/// Solver backends.
pub mod backends;
/// Error type shared by every backend.
pub mod error;
/// RcDoc pretty-printer for terms.
pub mod pretty;
/// S-expression reader for solver replies.
pub mod sexpr;
/// SMT-LIB 2 rendering.
pub mod smtlib;
/// Local, equivalence-preserving rewriting.
pub mod simplify;
/// Solver interface, verdicts and models.
pub mod solver;
/// Sorts of terms.
pub mod sort;
/// Term trees and builders.
pub mod term;

pub use error::Error;

pub mod prelude {
    //! Convenient re-exports for end users.
    pub use crate::error::Error;
    pub use crate::pretty::PrettyTerm;
    pub use crate::simplify::canonicalize;
    pub use crate::solver::{Model, SatResult, Solver, Value};
    pub use crate::sort::Sort;
    pub use crate::term::Term;
}
