//! Construction of SSA form over a TAC control-flow graph.
//!
//! Phis are placed with the worklist algorithm over dominance frontiers and
//! names are versioned during a preorder walk of the dominator tree. The walk
//! keeps its own frame stack, so deep dominator trees do not grow the call
//! stack.
use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
use tpinstr::{
    Instruction,
    cfg::{BlockId, TacCfg},
    name,
    tac::TacInstr,
    utils::Error,
};

use crate::error::TpResult;

/// A use that renaming could not connect to a definition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SsaDiagnostic {
    /// `variable` is read in `block` with no definition on any path from the entry.
    UnresolvedUse { block: String, variable: String },
    /// No definition of `variable` reaches the end of `predecessor`, so the
    /// phi in `block` has no operand for that edge.
    MissingPhiOperand {
        block: String,
        predecessor: String,
        variable: String,
    },
}

impl std::fmt::Display for SsaDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SsaDiagnostic::UnresolvedUse { block, variable } => {
                write!(f, "`{}` is read in {} without a reaching definition", variable, block)
            }
            SsaDiagnostic::MissingPhiOperand {
                block,
                predecessor,
                variable,
            } => write!(
                f,
                "phi for `{}` in {} has no operand from {}",
                variable, block, predecessor
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SsaReport {
    pub diagnostics: Vec<SsaDiagnostic>,
    /// Number of phi instructions inserted.
    pub phi_count: usize,
    /// Variables that may be live on entry to some block.
    pub globals: BTreeSet<String>,
}

impl SsaReport {
    /// Names that stayed unversioned because no definition reaches them.
    pub fn unresolved(&self) -> BTreeSet<&str> {
        self.diagnostics
            .iter()
            .filter_map(|d| match d {
                SsaDiagnostic::UnresolvedUse { variable, .. } => Some(variable.as_str()),
                SsaDiagnostic::MissingPhiOperand { .. } => None,
            })
            .collect()
    }
}

/// Rewrite `cfg` into SSA form in place.
pub fn convert_to_ssa(cfg: &mut TacCfg) -> TpResult<SsaReport> {
    SsaConverter::default().convert(cfg)
}

enum Frame {
    Enter(BlockId),
    /// Restore the stacks of the variables a block defined.
    Exit(Vec<String>),
}

/// Renaming state: per-variable generation counter and reaching-definition stack.
#[derive(Debug, Default)]
pub struct SsaConverter {
    counters: BTreeMap<String, u32>,
    stacks: BTreeMap<String, Vec<String>>,
    report: SsaReport,
}

impl SsaConverter {
    pub fn convert(mut self, cfg: &mut TacCfg) -> TpResult<SsaReport> {
        let var_blocks = self.find_globals(cfg);
        self.insert_phis(cfg, &var_blocks);
        self.rename(cfg)?;
        debug!(
            "SSA construction: {} global(s), {} phi(s), {} diagnostic(s)",
            self.report.globals.len(),
            self.report.phi_count,
            self.report.diagnostics.len()
        );
        Ok(self.report)
    }

    /// Collect the variables read before being written in some block, and the
    /// blocks writing each variable.
    fn find_globals(&mut self, cfg: &TacCfg) -> BTreeMap<String, BTreeSet<BlockId>> {
        let mut var_blocks: BTreeMap<String, BTreeSet<BlockId>> = BTreeMap::new();
        for block in cfg.nodes() {
            let mut killed = BTreeSet::new();
            for instr in cfg.block(block).iter() {
                for variable in instr.read_variables() {
                    if !killed.contains(variable) {
                        self.report.globals.insert(variable.to_string());
                    }
                }
                if let Some(variable) = instr.write_variable() {
                    killed.insert(variable);
                    var_blocks
                        .entry(variable.to_string())
                        .or_default()
                        .insert(block);
                }
            }
        }
        var_blocks
    }

    fn insert_phis(&mut self, cfg: &mut TacCfg, var_blocks: &BTreeMap<String, BTreeSet<BlockId>>) {
        for variable in &self.report.globals {
            let Some(defining) = var_blocks.get(variable) else {
                continue;
            };
            let mut queued = defining.clone();
            let mut worklist: Vec<BlockId> = defining.iter().copied().collect();
            let mut has_phi = BTreeSet::new();

            while let Some(block) = worklist.pop() {
                let frontier: Vec<BlockId> = cfg.dominance_frontier(block).collect();
                for join in frontier {
                    if has_phi.insert(join) {
                        cfg.prepend(join, TacInstr::phi(variable.as_str()));
                        self.report.phi_count += 1;
                        if queued.insert(join) {
                            worklist.push(join);
                        }
                    }
                }
            }
        }
        debug!("Inserted {} phi instruction(s)", self.report.phi_count);
    }

    fn fresh(&mut self, base: &str) -> String {
        let counter = self.counters.entry(base.to_string()).or_insert(0);
        let versioned = name::ssa_name(base, *counter);
        *counter += 1;
        self.stacks
            .entry(base.to_string())
            .or_default()
            .push(versioned.clone());
        versioned
    }

    fn top(&self, base: &str) -> Option<&String> {
        self.stacks.get(base).and_then(|stack| stack.last())
    }

    fn rename(&mut self, cfg: &mut TacCfg) -> TpResult<()> {
        let mut frames = vec![Frame::Enter(cfg.entry())];
        let mut visited = 0usize;

        while let Some(frame) = frames.pop() {
            let block = match frame {
                Frame::Enter(block) => block,
                Frame::Exit(defined) => {
                    for base in defined {
                        if let Some(stack) = self.stacks.get_mut(&base) {
                            stack.pop();
                        }
                    }
                    continue;
                }
            };
            visited += 1;
            let block_name = cfg.block(block).name.clone();
            let mut defined = Vec::new();

            // Phi definitions are visible to every instruction of the block.
            for instr in cfg.block_mut(block).iter_mut().filter(|i| i.is_phi()) {
                let Some(base) = instr.write_variable().map(str::to_string) else {
                    continue;
                };
                let versioned = self.fresh(&base);
                instr.rename_write(&base, &versioned)?;
                defined.push(base);
            }

            for instr in cfg.block_mut(block).iter_mut().filter(|i| !i.is_phi()) {
                let reads: Vec<String> = instr.read_set().into_iter().map(str::to_string).collect();
                for variable in reads {
                    match self.top(&variable).cloned() {
                        Some(versioned) => instr.rename_read(&variable, &versioned),
                        None => {
                            warn!(
                                "`{}` is read in {} without a reaching definition",
                                variable, block_name
                            );
                            self.report.diagnostics.push(SsaDiagnostic::UnresolvedUse {
                                block: block_name.clone(),
                                variable,
                            });
                        }
                    }
                }
                if let Some(base) = instr.write_variable().map(str::to_string) {
                    let versioned = self.fresh(&base);
                    instr.rename_write(&base, &versioned)?;
                    defined.push(base);
                }
            }

            for successor in cfg.successors(block) {
                let successor_name = cfg.block(successor).name.clone();
                for instr in cfg.block_mut(successor).iter_mut() {
                    let TacInstr::Phi { lvar, operands } = instr else {
                        continue;
                    };
                    let base = name::original_name(lvar);
                    match self.top(base).cloned() {
                        Some(versioned) => operands.push(versioned),
                        None => {
                            warn!(
                                "No definition of `{}` reaches {} from {}",
                                base, successor_name, block_name
                            );
                            self.report.diagnostics.push(SsaDiagnostic::MissingPhiOperand {
                                block: successor_name.clone(),
                                predecessor: block_name.clone(),
                                variable: base.to_string(),
                            });
                        }
                    }
                }
            }

            frames.push(Frame::Exit(defined));
            frames.extend(
                cfg.dominator_children(block)
                    .iter()
                    .rev()
                    .map(|&child| Frame::Enter(child)),
            );
        }

        debug!("Renamed {} block(s)", visited);
        Ok(())
    }
}

/// Check the single-assignment and dominance properties of `cfg`.
///
/// Unreachable blocks and unversioned names are ignored. A phi operand must
/// be defined in a block dominating at least one reachable predecessor of the
/// phi's block.
pub fn check_ssa(cfg: &TacCfg) -> Result<(), Error> {
    let reachable: Vec<BlockId> = cfg.nodes().filter(|&b| cfg.is_reachable(b)).collect();

    let mut definitions: BTreeMap<&str, (BlockId, usize)> = BTreeMap::new();
    for &block in &reachable {
        for (index, instr) in cfg.block(block).iter().enumerate() {
            let Some(variable) = instr.write_variable() else {
                continue;
            };
            if name::generation(variable).is_none() {
                continue;
            }
            if definitions.insert(variable, (block, index)).is_some() {
                return Err(Error::DuplicateSsaName {
                    duplicate: variable.to_string(),
                });
            }
        }
    }

    let undominated = |variable: &str, block: BlockId, definition: Option<BlockId>| Error::UndominatedUse {
        name: variable.to_string(),
        block: cfg.block(block).name.clone(),
        definition: definition
            .map(|d| cfg.block(d).name.clone())
            .unwrap_or_else(|| "<nowhere>".to_string()),
    };

    for &block in &reachable {
        let predecessors: Vec<BlockId> = cfg
            .predecessors(block)
            .into_iter()
            .filter(|&p| cfg.is_reachable(p))
            .collect();
        for (index, instr) in cfg.block(block).iter().enumerate() {
            for variable in instr.read_set() {
                if name::generation(variable).is_none() {
                    continue;
                }
                let Some(&(def_block, def_index)) = definitions.get(variable) else {
                    return Err(undominated(variable, block, None));
                };
                let dominated = if instr.is_phi() {
                    predecessors.iter().any(|&p| cfg.dominates(def_block, p))
                } else if def_block == block {
                    def_index < index
                } else {
                    cfg.dominates(def_block, block)
                };
                if !dominated {
                    return Err(undominated(variable, block, Some(def_block)));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use tpinstr::{cfg::Cfg, parser::parse_program, program::Program, tac::{Operand, TacOp}};

    use super::*;
    use crate::tac::generate_tac;

    fn ssa_of(source: &str) -> (TacCfg, SsaReport) {
        let output = generate_tac(&parse_program(source, None).unwrap()).unwrap();
        let mut cfg = Cfg::build(output.tac).unwrap();
        let report = convert_to_ssa(&mut cfg).unwrap();
        (cfg, report)
    }

    fn phis(cfg: &TacCfg) -> Vec<(BlockId, String, Vec<String>)> {
        cfg.nodes()
            .flat_map(move |b| {
                cfg.block(b).iter().filter_map(move |i| match i {
                    TacInstr::Phi { lvar, operands } => Some((b, lvar.clone(), operands.clone())),
                    _ => None,
                })
            })
            .collect()
    }

    const DIAMOND: &str = "\
cond (:x > 0) [3]
:y = 1
cond false [2]
:y = 2
assert :y > 0
";

    #[test]
    fn diamond_merges_y_once() {
        let (cfg, report) = ssa_of(DIAMOND);
        check_ssa(&cfg).unwrap();
        assert!(report.diagnostics.is_empty());

        let y_phis: Vec<_> = phis(&cfg)
            .into_iter()
            .filter(|(_, lvar, _)| name::original_name(lvar) == ":y")
            .collect();
        assert_eq!(y_phis.len(), 1);
        let (join, _, operands) = &y_phis[0];
        assert_eq!(operands.len(), 2);

        let mut branch_defs: Vec<String> = cfg
            .predecessors(*join)
            .into_iter()
            .flat_map(|p| cfg.block(p).iter().filter_map(|i| i.write_variable().map(str::to_string)).collect::<Vec<_>>())
            .filter(|w| name::original_name(w) == ":y")
            .collect();
        branch_defs.sort();
        let mut operands = operands.clone();
        operands.sort();
        assert_eq!(operands, branch_defs);
    }

    #[test]
    fn every_name_is_defined_once() {
        let (cfg, _) = ssa_of(DIAMOND);
        let mut seen = BTreeSet::new();
        for block in cfg.nodes() {
            for instr in cfg.block(block).iter() {
                if let Some(w) = instr.write_variable() {
                    assert!(name::generation(w).is_some(), "{} left unversioned", w);
                    assert!(seen.insert(w.to_string()), "{} defined twice", w);
                }
            }
        }
        assert!(seen.contains(":x#0"));
    }

    #[test]
    fn read_before_write_in_one_instruction() {
        let (cfg, _) = ssa_of(":x = 1\n:x = :x + 1\n");
        let listing: Vec<String> = cfg
            .nodes()
            .flat_map(|b| cfg.block(b).iter().map(ToString::to_string).collect::<Vec<_>>())
            .collect();
        assert!(listing.contains(&":x#1 = :x#0 + 1".to_string()));
    }

    #[test]
    fn unresolved_use_is_reported() {
        // Hand-built listing without declarations: `:u` has no definition.
        let program = Program::straight_line([
            TacInstr::assign(":v", Operand::var(":u"), TacOp::Add, Operand::Num(1)),
            TacInstr::Assert(Operand::var(":v")),
        ]);
        let mut cfg = Cfg::build(program).unwrap();
        let report = convert_to_ssa(&mut cfg).unwrap();
        assert_eq!(report.unresolved(), BTreeSet::from([":u"]));
        let block = cfg.block_starting_at(0).unwrap();
        assert_eq!(
            cfg.block(block).iter().next().map(ToString::to_string),
            Some(":v#0 = :u + 1".to_string())
        );
        check_ssa(&cfg).unwrap();
    }

    #[test]
    fn one_sided_definition_reports_missing_operand() {
        // `:w` is only defined on the fall-through path and read after the join.
        let mut program = Program::new();
        program.push(TacInstr::declare(":c"));
        program.push_jump(TacInstr::Condition(Operand::var(":c")), 2);
        program.push(TacInstr::assign(":w", Operand::Num(0), TacOp::Add, Operand::Num(3)));
        program.push(TacInstr::Assert(Operand::var(":w")));
        let mut cfg = Cfg::build(program).unwrap();
        let report = convert_to_ssa(&mut cfg).unwrap();

        assert!(report.diagnostics.iter().any(|d| matches!(
            d,
            SsaDiagnostic::MissingPhiOperand { variable, .. } if variable == ":w"
        )));
        let w_phi = phis(&cfg)
            .into_iter()
            .find(|(_, lvar, _)| name::original_name(lvar) == ":w")
            .unwrap();
        assert_eq!(w_phi.2, vec![":w#0".to_string()]);
        check_ssa(&cfg).unwrap();
    }

    #[test]
    fn check_ssa_rejects_duplicates_and_undominated_uses() {
        let program = Program::straight_line([
            TacInstr::assign(":a#0", Operand::Num(0), TacOp::Add, Operand::Num(1)),
            TacInstr::assign(":a#0", Operand::Num(0), TacOp::Add, Operand::Num(2)),
        ]);
        let cfg = Cfg::build(program).unwrap();
        assert!(check_ssa(&cfg).unwrap_err().is_duplicate_ssa_name());

        let program = Program::straight_line([
            TacInstr::Assert(Operand::var(":b#0")),
            TacInstr::assign(":b#0", Operand::Bool(true), TacOp::And, Operand::Bool(true)),
        ]);
        let cfg = Cfg::build(program).unwrap();
        assert!(check_ssa(&cfg).unwrap_err().is_undominated_use());
    }

    #[test]
    fn deep_dominator_tree_does_not_recurse() {
        // A long chain of diamonds gives a dominator tree as deep as the program.
        let mut source = String::from(":s = 0\n");
        for _ in 0..400 {
            source.push_str("cond (:s < 1000) [2]\n:s = :s + 1\n");
        }
        source.push_str("assert :s >= 0\n");
        let (cfg, report) = ssa_of(&source);
        check_ssa(&cfg).unwrap();
        assert!(report.phi_count >= 400);
        assert!(report.diagnostics.is_empty());
    }
}
