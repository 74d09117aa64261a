//! Lowering and bounded model checking of turtle programs.
//!
//! A program goes through [`tac::generate_tac`], then the control-flow graph
//! of `tpinstr` and [`ssa::convert_to_ssa`], and finally [`bmc::encode`] and
//! [`bmc::check`] against any [`tpformal::solver::Solver`].
//! [`pipeline::Pipeline`] chains the stages and keeps every artifact.

pub mod bmc;
pub mod config;
pub mod error;
pub mod interp;
pub mod pipeline;
pub mod ssa;
pub mod tac;

pub use error::{TpError, TpResult};
