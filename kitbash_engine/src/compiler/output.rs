// Copyright (C) 2024 kitbash contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;

use enum_map::EnumMap;
use serde::Serialize;

use super::cache::GenerateKind;
use super::components::ComponentInfo;
use super::diagnostics::{Diagnostic, Diagnostics};
use crate::graph::{NodeId, NodeKind, SourceGraph};
use crate::ir::IrObject;
use crate::prelude::*;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum ParameterKind {
    Enum { options: Vec<String>, default: usize },
    Bool { default: bool },
    Image { default_asset: Option<String> },
    Table { table: String, rows: Vec<String> },
}

/// Describes a parameter to the user interface of the runtime
#[derive(Clone, Debug, Serialize)]
pub struct ParameterUi {
    pub name: String,
    pub kind: ParameterKind,
    /// The node declaring the parameter
    pub node: NodeId,
}

#[derive(Clone, Debug, Serialize)]
pub struct StateData {
    pub name: String,
    pub object: String,
    pub runtime_parameters: Vec<String>,
    pub build_only_first_lod: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum ResourceKind {
    Mesh,
    Image,
}

/// An asset streamed by the runtime instead of being baked in the model
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StreamedResource {
    pub asset: String,
    pub kind: ResourceKind,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IrSocket {
    pub name: String,
    pub component_id: Option<u32>,
    pub priority: i32,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct CompileStats {
    /// How many times each dispatcher ran its construction logic
    pub constructions: EnumMap<GenerateKind, u32>,
    pub cache_hits: EnumMap<GenerateKind, u32>,
    /// How many times the construction logic ran for each node
    #[serde(skip)]
    pub node_constructions: HashMap<NodeId, u32>,
}

impl CompileStats {
    pub fn constructions_of(&self, node: NodeId) -> u32 {
        self.node_constructions.get(&node).copied().unwrap_or(0)
    }
}

/// The result of a compilation, handed over to the procedural generation
/// runtime.
#[derive(Debug, Default, Serialize)]
pub struct CompiledModel {
    pub objects: Vec<Rc<IrObject>>,
    pub parameters: BTreeMap<String, ParameterUi>,
    pub states: Vec<StateData>,
    pub streamed_resources: Vec<StreamedResource>,
    pub sockets: Vec<IrSocket>,
    pub components: Vec<ComponentInfo>,
    /// Interned names by id: bones, skin weight profiles, table rows and
    /// surfaces.
    pub identifiers: BTreeMap<u32, String>,
    pub optimization_level: u32,
}

#[derive(Debug)]
pub struct CompileOutput {
    pub model: CompiledModel,
    pub diagnostics: Diagnostics,
    /// Every node reached while generating
    pub visited_nodes: HashSet<NodeId>,
    /// The objects owning the closing edge of each reported cycle
    pub cycle_origins: Vec<NodeId>,
    pub stats: CompileStats,
}

impl CompileOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    pub fn diagnostics_for(&self, node: NodeId) -> Vec<&Diagnostic> {
        self.diagnostics.for_node(node).collect()
    }

    /// The nodes never reached from a root object, in graph order. Comments
    /// are never reached and are skipped.
    pub fn orphan_nodes(&self, graph: &SourceGraph) -> Vec<NodeId> {
        graph
            .nodes
            .iter()
            .filter(|(_, node)| !matches!(node.kind, NodeKind::Comment { .. }))
            .filter(|(node_id, _)| !self.visited_nodes.contains(node_id))
            .map(|(node_id, _)| node_id)
            .collect()
    }
}
