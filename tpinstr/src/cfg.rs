//! Basic-block graph over a jump-annotated listing.
//!
//! The graph always carries an empty `START` block (the entry) and an empty
//! `END` block reached by falling off the end of the listing or by jumping one
//! past its last line. Dominance information is computed once on construction;
//! instruction edits through [`Cfg::prepend`], [`Cfg::append`] and
//! [`Cfg::block_mut`] leave the edge structure, and thus dominance, untouched.
use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use petgraph::{
    algo::dominators::simple_fast,
    graph::{DiGraph, NodeIndex},
    visit::DfsPostOrder,
};

use crate::{Branch, Instruction, program::FALL_THROUGH, program::Program, tac::TacInstr, utils::Error};

pub type BlockId = NodeIndex;

/// Control-flow graph over three-address instructions.
pub type TacCfg = Cfg<TacInstr>;

/// Branch outcome attached to an edge.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum EdgeLabel {
    /// Taken when the branch operand holds (fall-through).
    CondTrue,
    /// Taken when the branch operand does not hold (jump).
    CondFalse,
    Unconditional,
}

#[derive(Debug, Clone)]
pub struct BasicBlock<I> {
    pub name: String,
    /// Listing line of the first original instruction, `None` for `START` and `END`.
    pub first_line: Option<usize>,
    pub instructions: Vec<(I, i64)>,
}

impl<I> BasicBlock<I> {
    fn empty(name: &str) -> Self {
        BasicBlock {
            name: name.to_string(),
            first_line: None,
            instructions: Vec::new(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &I> {
        self.instructions.iter().map(|(instr, _)| instr)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut I> {
        self.instructions.iter_mut().map(|(instr, _)| instr)
    }

    /// Last instruction of the block.
    pub fn terminator(&self) -> Option<&I> {
        self.instructions.last().map(|(instr, _)| instr)
    }
}

#[derive(Debug, Clone)]
pub struct Cfg<I> {
    graph: DiGraph<BasicBlock<I>, EdgeLabel>,
    entry: BlockId,
    exit: BlockId,
    idom: BTreeMap<BlockId, BlockId>,
    children: BTreeMap<BlockId, Vec<BlockId>>,
    frontiers: BTreeMap<BlockId, BTreeSet<BlockId>>,
    reverse_postorder: Vec<BlockId>,
}

impl<I: Instruction> Cfg<I> {
    /// Split `program` into basic blocks and compute dominance.
    ///
    /// Leaders are the first line, every branch target and every line
    /// following a branch. A conditional branch on a variable or predicate
    /// yields a `CondTrue` edge to the next line and a `CondFalse` edge to its
    /// target; a branch whose target is the next line collapses into a single
    /// unconditional edge. Constant branches yield a single unconditional edge.
    pub fn build(program: Program<I>) -> Result<Self, Error> {
        let lines = program.into_lines();
        let len = lines.len();

        let mut leaders = BTreeSet::from([0usize]);
        for (index, (instr, jump)) in lines.iter().enumerate() {
            if instr.branch().is_some() {
                let target = index as i64 + jump;
                if target < 0 || target > len as i64 {
                    return Err(Error::JumpOutOfRange {
                        line: index,
                        target,
                        len,
                    });
                }
                leaders.insert(index + 1);
                leaders.insert(target as usize);
            }
        }
        let starts: Vec<usize> = leaders.into_iter().filter(|&l| l < len).collect();

        let mut graph = DiGraph::new();
        let entry = graph.add_node(BasicBlock::empty("START"));

        let mut block_at_leader = BTreeMap::new();
        let mut ranges = Vec::with_capacity(starts.len());
        let mut remaining = lines.into_iter();
        for (k, &start) in starts.iter().enumerate() {
            let end = starts.get(k + 1).copied().unwrap_or(len);
            let id = graph.add_node(BasicBlock {
                name: format!("B{}", k + 1),
                first_line: Some(start),
                instructions: remaining.by_ref().take(end - start).collect(),
            });
            block_at_leader.insert(start, id);
            ranges.push((id, end));
        }

        let exit = graph.add_node(BasicBlock::empty("END"));
        let block_at = |line: usize| block_at_leader.get(&line).copied().unwrap_or(exit);

        graph.add_edge(entry, block_at(0), EdgeLabel::Unconditional);
        for (id, end) in ranges {
            let next = block_at(end);
            let Some((instr, jump)) = graph[id].instructions.last() else {
                continue;
            };
            let target = (end as i64 - 1 + jump) as usize;

            let edges = match instr.branch() {
                None | Some(Branch::Literal(true)) => vec![(next, EdgeLabel::Unconditional)],
                Some(Branch::Literal(false)) => vec![(block_at(target), EdgeLabel::Unconditional)],
                Some(_) if target == end => vec![(next, EdgeLabel::Unconditional)],
                Some(_) => vec![
                    (next, EdgeLabel::CondTrue),
                    (block_at(target), EdgeLabel::CondFalse),
                ],
            };
            for (succ, label) in edges {
                graph.add_edge(id, succ, label);
            }
        }

        let mut cfg = Cfg {
            graph,
            entry,
            exit,
            idom: BTreeMap::new(),
            children: BTreeMap::new(),
            frontiers: BTreeMap::new(),
            reverse_postorder: Vec::new(),
        };
        cfg.compute_dominance();
        let unreachable = cfg.nodes().filter(|&b| !cfg.is_reachable(b)).count();
        if unreachable > 0 {
            debug!("{} of {} block(s) are unreachable from START", unreachable, cfg.len());
        }
        Ok(cfg)
    }
}

impl<I> Cfg<I> {
    fn compute_dominance(&mut self) {
        let dominators = simple_fast(&self.graph, self.entry);

        let mut postorder = Vec::new();
        let mut dfs = DfsPostOrder::new(&self.graph, self.entry);
        while let Some(node) = dfs.next(&self.graph) {
            postorder.push(node);
        }
        postorder.reverse();
        self.reverse_postorder = postorder;

        for &node in &self.reverse_postorder {
            if let Some(dom) = dominators.immediate_dominator(node) {
                self.idom.insert(node, dom);
                self.children.entry(dom).or_default().push(node);
            }
        }
        for children in self.children.values_mut() {
            children.sort();
        }

        // Cooper, Harvey and Kennedy: walk up from each predecessor of a join
        // point until reaching its immediate dominator.
        for &block in &self.reverse_postorder {
            let preds: Vec<BlockId> = self
                .predecessors(block)
                .into_iter()
                .filter(|p| self.is_reachable(*p))
                .collect();
            if preds.len() < 2 {
                continue;
            }
            let Some(&block_idom) = self.idom.get(&block) else {
                continue;
            };
            for pred in preds {
                let mut runner = pred;
                while runner != block_idom {
                    self.frontiers.entry(runner).or_default().insert(block);
                    match self.idom.get(&runner) {
                        Some(&up) => runner = up,
                        None => break,
                    }
                }
            }
        }
    }

    pub fn entry(&self) -> BlockId {
        self.entry
    }

    pub fn exit(&self) -> BlockId {
        self.exit
    }

    pub fn nodes(&self) -> impl Iterator<Item = BlockId> {
        self.graph.node_indices()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn block(&self, block: BlockId) -> &BasicBlock<I> {
        &self.graph[block]
    }

    pub fn block_mut(&mut self, block: BlockId) -> &mut BasicBlock<I> {
        &mut self.graph[block]
    }

    /// Block whose first original instruction is at `line`.
    pub fn block_starting_at(&self, line: usize) -> Option<BlockId> {
        self.graph
            .node_indices()
            .find(|&b| self.graph[b].first_line == Some(line))
    }

    pub fn prepend(&mut self, block: BlockId, instr: I) {
        self.graph[block].instructions.insert(0, (instr, FALL_THROUGH));
    }

    pub fn append(&mut self, block: BlockId, instr: I) {
        self.graph[block].instructions.push((instr, FALL_THROUGH));
    }

    /// Distinct predecessors, in ascending block order.
    pub fn predecessors(&self, block: BlockId) -> Vec<BlockId> {
        let mut preds: Vec<BlockId> = self
            .graph
            .neighbors_directed(block, petgraph::Direction::Incoming)
            .collect();
        preds.sort();
        preds.dedup();
        preds
    }

    /// Distinct successors, in ascending block order.
    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        let mut succs: Vec<BlockId> = self
            .graph
            .neighbors_directed(block, petgraph::Direction::Outgoing)
            .collect();
        succs.sort();
        succs.dedup();
        succs
    }

    pub fn edge_label(&self, pred: BlockId, succ: BlockId) -> Option<EdgeLabel> {
        self.graph.find_edge(pred, succ).map(|edge| self.graph[edge])
    }

    /// Immediate dominator; `None` for the entry and unreachable blocks.
    pub fn idom(&self, block: BlockId) -> Option<BlockId> {
        self.idom.get(&block).copied()
    }

    pub fn dominance_frontier(&self, block: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self.frontiers.get(&block).into_iter().flatten().copied()
    }

    /// Children in the dominator tree, in ascending block order.
    pub fn dominator_children(&self, block: BlockId) -> &[BlockId] {
        self.children.get(&block).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `a` dominates `b` (reflexive).
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        let mut current = Some(b);
        while let Some(block) = current {
            if block == a {
                return true;
            }
            current = self.idom(block);
        }
        false
    }

    pub fn is_reachable(&self, block: BlockId) -> bool {
        block == self.entry || self.idom.contains_key(&block)
    }

    /// Reverse postorder from the entry, followed by unreachable blocks.
    pub fn topological_order(&self) -> Vec<BlockId> {
        let mut order = self.reverse_postorder.clone();
        order.extend(self.graph.node_indices().filter(|b| !self.is_reachable(*b)));
        order
    }
}

impl<I: std::fmt::Display> std::fmt::Display for Cfg<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |blocks: Vec<BlockId>| {
            blocks
                .into_iter()
                .map(|b| self.graph[b].name.clone())
                .collect::<Vec<_>>()
                .join(", ")
        };

        for block in self.topological_order() {
            writeln!(
                f,
                "{}: ; preds = [{}], succs = [{}]",
                self.graph[block].name,
                names(self.predecessors(block)),
                names(self.successors(block))
            )?;
            for (instr, jump) in &self.graph[block].instructions {
                if *jump == FALL_THROUGH {
                    writeln!(f, "    {}", instr)?;
                } else {
                    writeln!(f, "    {} [{}]", instr, jump)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tac::{Operand, TacInstr, TacOp};

    fn diamond() -> Program<TacInstr> {
        let mut program = Program::new();
        program.push(TacInstr::declare(":c"));
        program.push_jump(TacInstr::Condition(Operand::var(":c")), 3);
        program.push(TacInstr::assign(":y", Operand::Num(1), TacOp::Add, Operand::Num(0)));
        program.push_jump(TacInstr::Condition(Operand::Bool(false)), 2);
        program.push(TacInstr::assign(":y", Operand::Num(2), TacOp::Add, Operand::Num(0)));
        program.push(TacInstr::Assert(Operand::var(":y")));
        program
    }

    #[test]
    fn diamond_blocks_and_labels() {
        let cfg = Cfg::build(diamond()).unwrap();
        let head = cfg.block_starting_at(0).unwrap();
        let then = cfg.block_starting_at(2).unwrap();
        let other = cfg.block_starting_at(4).unwrap();
        let join = cfg.block_starting_at(5).unwrap();

        assert_eq!(cfg.len(), 6);
        assert_eq!(cfg.block(head).instructions.len(), 2);
        assert_eq!(cfg.edge_label(head, then), Some(EdgeLabel::CondTrue));
        assert_eq!(cfg.edge_label(head, other), Some(EdgeLabel::CondFalse));
        assert_eq!(cfg.edge_label(then, join), Some(EdgeLabel::Unconditional));
        assert_eq!(cfg.successors(join), vec![cfg.exit()]);
        assert_eq!(cfg.predecessors(join), vec![then, other]);
    }

    #[test]
    fn diamond_dominance() {
        let cfg = Cfg::build(diamond()).unwrap();
        let head = cfg.block_starting_at(0).unwrap();
        let then = cfg.block_starting_at(2).unwrap();
        let other = cfg.block_starting_at(4).unwrap();
        let join = cfg.block_starting_at(5).unwrap();

        assert_eq!(cfg.idom(head), Some(cfg.entry()));
        assert_eq!(cfg.idom(join), Some(head));
        assert_eq!(cfg.dominator_children(head), &[then, other, join]);
        assert_eq!(cfg.dominance_frontier(then).collect::<Vec<_>>(), vec![join]);
        assert_eq!(cfg.dominance_frontier(other).collect::<Vec<_>>(), vec![join]);
        assert_eq!(cfg.dominance_frontier(head).count(), 0);
        assert!(cfg.dominates(head, join));
        assert!(!cfg.dominates(then, join));

        let order = cfg.topological_order();
        let pos = |b: BlockId| order.iter().position(|&x| x == b).unwrap();
        assert_eq!(order[0], cfg.entry());
        assert!(pos(head) < pos(then) && pos(then) < pos(join) && pos(other) < pos(join));
    }

    #[test]
    fn loop_header_is_in_its_own_frontier() {
        let mut program = Program::new();
        program.push(TacInstr::assign(":i", Operand::Num(0), TacOp::Add, Operand::Num(0)));
        program.push(TacInstr::assign(":c", Operand::var(":i"), TacOp::Lt, Operand::Num(3)));
        program.push_jump(TacInstr::Condition(Operand::var(":c")), 3);
        program.push(TacInstr::assign(":i", Operand::var(":i"), TacOp::Add, Operand::Num(1)));
        program.push_jump(TacInstr::Condition(Operand::Bool(false)), -3);

        let cfg = Cfg::build(program).unwrap();
        let header = cfg.block_starting_at(1).unwrap();
        let body = cfg.block_starting_at(3).unwrap();

        assert_eq!(cfg.edge_label(header, cfg.exit()), Some(EdgeLabel::CondFalse));
        assert_eq!(cfg.edge_label(body, header), Some(EdgeLabel::Unconditional));
        assert_eq!(cfg.dominance_frontier(body).collect::<Vec<_>>(), vec![header]);
        assert_eq!(cfg.dominance_frontier(header).collect::<Vec<_>>(), vec![header]);
    }

    #[test]
    fn branch_to_next_line_collapses() {
        let mut program = Program::new();
        program.push(TacInstr::declare(":c"));
        program.push_jump(TacInstr::Condition(Operand::var(":c")), 1);
        program.push(TacInstr::NoOp);

        let cfg = Cfg::build(program).unwrap();
        let head = cfg.block_starting_at(0).unwrap();
        let next = cfg.block_starting_at(2).unwrap();
        assert_eq!(cfg.successors(head), vec![next]);
        assert_eq!(cfg.edge_label(head, next), Some(EdgeLabel::Unconditional));
    }

    #[test]
    fn jump_out_of_range_is_rejected() {
        let mut program = Program::new();
        program.push_jump(TacInstr::Condition(Operand::Bool(false)), 5);
        program.push(TacInstr::NoOp);
        let err = Cfg::build(program).unwrap_err();
        assert!(matches!(err, Error::JumpOutOfRange { line: 0, target: 5, len: 2 }));
    }

    #[test]
    fn empty_program_links_start_to_end() {
        let cfg = Cfg::<TacInstr>::build(Program::new()).unwrap();
        assert_eq!(cfg.len(), 2);
        assert_eq!(cfg.successors(cfg.entry()), vec![cfg.exit()]);
        assert_eq!(cfg.idom(cfg.exit()), Some(cfg.entry()));
    }

    /// Random listings with forward and backward jumps, checked against the
    /// textbook definitions of dominance and dominance frontiers.
    #[test]
    fn dominance_matches_definitions_on_random_listings() {
        use rand::{Rng, SeedableRng};
        use rand_chacha::ChaCha8Rng;

        for seed in 0..100u64 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let len = rng.random_range(1..16i64);
            let mut program = Program::new();
            for line in 0..len {
                if rng.random_bool(0.35) {
                    let target = rng.random_range(0..=len);
                    let cond = match rng.random_range(0..4) {
                        0 => Operand::Bool(false),
                        _ => Operand::var(":c"),
                    };
                    program.push_jump(TacInstr::Condition(cond), target - line);
                } else {
                    program.push(TacInstr::NoOp);
                }
            }
            let cfg = Cfg::build(program).unwrap();

            let nodes: Vec<BlockId> = cfg.nodes().filter(|&b| cfg.is_reachable(b)).collect();
            let all: BTreeSet<BlockId> = nodes.iter().copied().collect();
            let mut dom: BTreeMap<BlockId, BTreeSet<BlockId>> = nodes
                .iter()
                .map(|&b| (b, if b == cfg.entry() { BTreeSet::from([b]) } else { all.clone() }))
                .collect();
            let mut changed = true;
            while changed {
                changed = false;
                for &b in nodes.iter().filter(|&&b| b != cfg.entry()) {
                    let mut next = all.clone();
                    for p in cfg.predecessors(b).into_iter().filter(|p| all.contains(p)) {
                        next = next.intersection(&dom[&p]).copied().collect();
                    }
                    next.insert(b);
                    if next != dom[&b] {
                        dom.insert(b, next);
                        changed = true;
                    }
                }
            }

            for &a in &nodes {
                for &b in &nodes {
                    assert_eq!(cfg.dominates(a, b), dom[&b].contains(&a), "seed {}", seed);
                }
                let expected: BTreeSet<BlockId> = nodes
                    .iter()
                    .copied()
                    .filter(|&y| {
                        let strictly = a != y && dom[&y].contains(&a);
                        !strictly
                            && cfg
                                .predecessors(y)
                                .iter()
                                .any(|p| all.contains(p) && dom[p].contains(&a))
                    })
                    .collect();
                let found: BTreeSet<BlockId> = cfg.dominance_frontier(a).collect();
                assert_eq!(found, expected, "seed {}: frontier of {}", seed, cfg.block(a).name);
            }
        }
    }
}
