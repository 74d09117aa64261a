//! Every stage chained: lowering, SSA construction, encoding and checking.
use log::{debug, warn};
use tpformal::{
    backends::SmtLibProcess,
    solver::{Model, Solver},
};
use tpinstr::{
    ast::AstProgram,
    cfg::{Cfg, TacCfg},
};

use crate::{
    bmc::{self, BmcQuery, TrigModel, Verdict},
    config::{BmcConfig, SolverConfig},
    error::TpResult,
    interp::{Execution, Interpreter, inputs_from_model},
    ssa::{SsaReport, check_ssa, convert_to_ssa},
    tac::{TacOutput, generate_tac},
};

/// Solver command selecting the in-process Z3 backend.
#[cfg(feature = "z3")]
pub const BUILTIN_Z3: &str = "builtin-z3";

/// Start the solver described by `config`.
pub fn spawn_solver(config: &SolverConfig) -> TpResult<Box<dyn Solver>> {
    #[cfg(feature = "z3")]
    if config.command == BUILTIN_Z3 {
        return Ok(Box::new(tpformal::backends::Z3Solver::with_timeout_ms(
            config.timeout_ms.unwrap_or(0),
        )));
    }
    Ok(Box::new(SmtLibProcess::spawn(
        &config.command,
        &config.args,
        config.timeout_ms,
    )?))
}

/// Intermediate results of the lowering stages.
#[derive(Debug, Clone)]
pub struct Lowered {
    pub tac: TacOutput,
    /// SSA form of `tac`.
    pub ssa: TacCfg,
    pub report: SsaReport,
}

#[derive(Debug, Clone)]
pub struct Artifacts {
    pub lowered: Lowered,
    pub query: BmcQuery,
    pub verdict: Verdict,
    /// Concrete run of the TAC program on the counterexample inputs.
    pub replay: Option<Execution>,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: BmcConfig,
    trig: TrigModel,
}

impl Pipeline {
    pub fn new(config: BmcConfig) -> TpResult<Self> {
        let trig = TrigModel::from_config(&config)?;
        Ok(Pipeline { config, trig })
    }

    pub fn config(&self) -> &BmcConfig {
        &self.config
    }

    pub fn trig(&self) -> &TrigModel {
        &self.trig
    }

    pub fn lower(&self, ast: &AstProgram) -> TpResult<Lowered> {
        let tac = generate_tac(ast)?;
        let mut ssa = Cfg::build(tac.tac.clone())?;
        let report = convert_to_ssa(&mut ssa)?;
        check_ssa(&ssa)?;
        debug!(
            "Lowered {} line(s) into {} TAC line(s) over {} block(s)",
            ast.len(),
            tac.tac.len(),
            ssa.len()
        );
        Ok(Lowered { tac, ssa, report })
    }

    pub fn encode(&self, lowered: &Lowered, solver: &mut dyn Solver) -> TpResult<BmcQuery> {
        bmc::encode(&lowered.ssa, &self.config, solver)
    }

    /// Decide `query` and replay a counterexample on the TAC program.
    pub fn check(
        &self,
        lowered: Lowered,
        query: BmcQuery,
        solver: &mut dyn Solver,
    ) -> TpResult<Artifacts> {
        let verdict = bmc::check(&query, solver)?;
        let replay = match &verdict {
            Verdict::Counterexample { inputs } => self.replay(&lowered, inputs),
            Verdict::Safe | Verdict::Unknown { .. } => None,
        };
        Ok(Artifacts {
            lowered,
            query,
            verdict,
            replay,
        })
    }

    pub fn run(&self, ast: &AstProgram, solver: &mut dyn Solver) -> TpResult<Artifacts> {
        let lowered = self.lower(ast)?;
        let query = self.encode(&lowered, solver)?;
        self.check(lowered, query, solver)
    }

    fn replay(&self, lowered: &Lowered, inputs: &Model) -> Option<Execution> {
        let interpreter = Interpreter::new(&self.trig);
        match interpreter.run(&lowered.tac.tac, &inputs_from_model(inputs)) {
            Ok(execution) => {
                if execution.failed_asserts.is_empty() {
                    warn!("Replaying the counterexample fails no assertion");
                }
                Some(execution)
            }
            Err(err) => {
                warn!("Could not replay the counterexample: {}", err);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tpinstr::{Instruction, parser::parse_program, tac::TacInstr};

    use super::*;

    #[test]
    fn lowering_produces_well_formed_ssa() {
        let pipeline = Pipeline::new(BmcConfig::default()).unwrap();
        let ast = parse_program(
            "cond (:x > 0) [3]\n:y = 1\ncond false [2]\n:y = 2\nassert :y != 0\n",
            None,
        )
        .unwrap();
        let lowered = pipeline.lower(&ast).unwrap();
        assert!(lowered.report.diagnostics.is_empty());
        assert_eq!(lowered.tac.assert_count, 1);

        let phis: Vec<&TacInstr> = lowered
            .ssa
            .nodes()
            .flat_map(|b| lowered.ssa.block(b).iter())
            .filter(|i| i.is_phi())
            .collect();
        let y_phis: Vec<_> = phis
            .iter()
            .filter(|i| i.write_variable().is_some_and(|v| v.starts_with(":y#")))
            .collect();
        assert_eq!(y_phis.len(), 1);
        let TacInstr::Phi { operands, .. } = y_phis[0] else {
            unreachable!()
        };
        assert_eq!(operands.len(), 2);
    }

    #[test]
    fn invalid_angle_configuration_is_rejected_up_front() {
        let mut config = BmcConfig::default();
        config.trig.encoding = crate::config::TrigEncoding::AngleTable;
        config.trig.angles = vec![
            crate::config::AngleEntry { degrees: 0, cos: 1.0, sin: 0.0 },
            crate::config::AngleEntry { degrees: 360, cos: 1.0, sin: 0.0 },
        ];
        assert!(Pipeline::new(config).is_err());
    }
}
