//! Graph views for analyses.
//!
//! The program keeps its edges as id lists on every node; analyses usually
//! want a real graph to traverse. These views are snapshots: they do not
//! follow later mutations of the program.
use petgraph::{prelude::DiGraphMap, visit::Dfs};
use strum::{Display, EnumIs};

use crate::{
    operand::{BlockId, FunctionId, InstId},
    program::Program,
};

/// How a user references a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIs, Display)]
#[strum(serialize_all = "snake_case")]
pub enum UseKind {
    /// Operand of the instruction payload (call argument, phi edge, ...).
    Operand,

    /// Object or key of a member access.
    Access,
    MemberKey,
    MemberValue,
}

impl Program {
    /// Use-def graph: an edge `value -> user` for every reference. When a
    /// user references a value in several ways, the last kind seen is kept.
    pub fn use_def_graph(&self) -> DiGraphMap<InstId, UseKind> {
        let mut graph = DiGraphMap::new();
        for inst in self.instructions.values() {
            let user = inst.id();
            if inst.is_value() {
                graph.add_node(user);
            }

            for operand in inst.kind().operands() {
                graph.add_edge(operand, user, UseKind::Operand);
            }

            let Some(value) = inst.as_value() else {
                continue;
            };
            for access in value.object().into_iter().chain(value.key()) {
                graph.add_edge(access, user, UseKind::Access);
            }
            for (key, member) in value.members().iter() {
                graph.add_edge(*key, user, UseKind::MemberKey);
                graph.add_edge(*member, user, UseKind::MemberValue);
            }
        }
        graph
    }

    /// Points-to graph: an edge `pointer -> target` for every reference edge.
    pub fn points_to_graph(&self) -> DiGraphMap<InstId, ()> {
        let mut graph = DiGraphMap::new();
        for inst in self.instructions.values() {
            if let Some(target) = inst.as_value().and_then(|v| v.reference()) {
                graph.add_edge(inst.id(), target, ());
            }
        }
        graph
    }

    /// Control-flow graph of `function`, `None` for unknown functions.
    pub fn control_flow_graph(&self, function: FunctionId) -> Option<DiGraphMap<BlockId, ()>> {
        let function = self.function(function)?;
        let mut cfg = DiGraphMap::new();
        for block in &function.blocks {
            cfg.add_node(*block);
            let Some(body) = self.block(*block) else {
                continue;
            };
            for succ in &body.succs {
                cfg.add_edge(*block, *succ, ());
            }
        }
        Some(cfg)
    }

    /// Every node reachable from `id` following use-def edges, `id` excluded.
    pub fn transitive_users(&self, id: InstId) -> Vec<InstId> {
        let graph = self.use_def_graph();
        if !graph.contains_node(id) {
            return Vec::new();
        }
        let mut dfs = Dfs::new(&graph, id);
        let mut reached = Vec::new();
        while let Some(node) = dfs.next(&graph) {
            if node != id {
                reached.push(node);
            }
        }
        reached
    }
}
