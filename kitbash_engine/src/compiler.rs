// Copyright (C) 2024 kitbash contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;

use crate::graph::{pin_names, DataType, NodeId, PinId, SourceGraph};
use crate::ir::{IrCategory, IrNode, IrObject};
use crate::prelude::*;

pub mod cache;
pub mod components;
pub mod context;
pub mod cycle_guard;
pub mod diagnostics;
pub mod interner;
pub mod options;
pub mod output;

/// The generation dispatchers, one per IR category
mod generate;

use cache::{CycleKey, GenerationCache};
use components::ComponentRegistry;
use context::ScopedContext;
use cycle_guard::CycleGuard;
use diagnostics::{DiagnosticKind, Diagnostics, Severity};
use interner::{IdInterner, InternOutcome};
pub use options::{CompileOptions, PlatformDescriptor, MAX_OPTIMIZATION_LEVEL};
use output::*;
pub use output::{CompileOutput, CompiledModel};

/// Holds the state of a single compilation. The compiler reads from the
/// source graph and writes the IR and the side tables describing it.
pub struct GraphCompiler<'g> {
    pub(crate) graph: &'g SourceGraph,
    pub(crate) options: CompileOptions,
    pub(crate) ctx: ScopedContext,
    pub(crate) cache: GenerationCache,
    pub(crate) cycles: CycleGuard,
    pub(crate) interner: IdInterner,
    pub(crate) components: ComponentRegistry,
    pub(crate) diagnostics: Diagnostics,

    pub(crate) parameters: BTreeMap<String, ParameterUi>,
    pub(crate) states: Vec<StateData>,
    pub(crate) streamed_resources: Vec<StreamedResource>,
    pub(crate) sockets: Vec<IrSocket>,

    pub(crate) visited_nodes: HashSet<NodeId>,
    /// Nodes already warned about having several consumers
    warned_nodes: HashSet<NodeId>,
    /// Input pins already warned about having several links
    warned_pins: HashSet<PinId>,
    pub(crate) cycle_origins: Vec<NodeId>,
    pub(crate) stats: CompileStats,
}

impl<'g> GraphCompiler<'g> {
    pub fn new(graph: &'g SourceGraph, mut options: CompileOptions) -> Self {
        let mut diagnostics = Diagnostics::default();
        if options.optimization_level > MAX_OPTIMIZATION_LEVEL {
            diagnostics.push(
                DiagnosticKind::Structural,
                Severity::Warning,
                format!(
                    "Optimization level {} is not supported, using {MAX_OPTIMIZATION_LEVEL}",
                    options.optimization_level
                ),
                None,
            );
            options.optimization_level = MAX_OPTIMIZATION_LEVEL;
        }

        Self {
            graph,
            options,
            ctx: ScopedContext::default(),
            cache: GenerationCache::default(),
            cycles: CycleGuard::default(),
            interner: IdInterner::new(),
            components: ComponentRegistry::default(),
            diagnostics,
            parameters: BTreeMap::new(),
            states: Vec::new(),
            streamed_resources: Vec::new(),
            sockets: Vec::new(),
            visited_nodes: HashSet::new(),
            warned_nodes: HashSet::new(),
            warned_pins: HashSet::new(),
            cycle_origins: Vec::new(),
            stats: CompileStats::default(),
        }
    }

    /// Replaces the identifier interner. Only useful before generation
    /// starts.
    pub fn with_interner(mut self, interner: IdInterner) -> Self {
        self.interner = interner;
        self
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn stats(&self) -> &CompileStats {
        &self.stats
    }

    pub fn interner(&self) -> &IdInterner {
        &self.interner
    }

    /// Generates the IR for the output pin `pin`, choosing the dispatcher
    /// from the pin's data type.
    pub fn generate(&mut self, pin: PinId) -> Option<IrNode> {
        let graph = self.graph;
        match graph[pin].data_type {
            DataType::Object => self.generate_object(pin).map(IrCategory::wrap),
            DataType::Component => self.generate_component(pin).map(IrCategory::wrap),
            DataType::Modifier => self.generate_modifier(pin).map(IrCategory::wrap),
            DataType::Surface => self.generate_surface(pin).map(IrCategory::wrap),
            DataType::Mesh => self.generate_mesh(pin).map(IrCategory::wrap),
            DataType::Image => self.generate_image(pin).map(IrCategory::wrap),
            DataType::Enum => {
                let node = graph.owning_node(pin);
                self.diagnostics.error(
                    DiagnosticKind::UnsupportedNodeKind,
                    format!(
                        "{}: enum values can only be read by switch nodes",
                        graph[node].label
                    ),
                    node,
                );
                None
            }
        }
    }

    /// Interns a name, reporting collisions against the given node.
    pub(crate) fn intern(&mut self, name: &str, node: NodeId) -> u32 {
        let (id, outcome) = self.interner.intern(name);
        if let InternOutcome::Remapped { base_id, occupant } = outcome {
            self.diagnostics.info(
                DiagnosticKind::CollisionNotice,
                format!("Id {base_id} of '{name}' is taken by '{occupant}', using {id} instead"),
                Some(node),
            );
        }
        id
    }

    /// Registers a parameter shown to the user. Parameters are identified by
    /// name: registering the same name from another node is reported and
    /// ignored.
    pub(crate) fn register_parameter(&mut self, name: &str, kind: ParameterKind, node: NodeId) {
        if let Some(existing) = self.parameters.get(name) {
            if existing.node != node {
                let graph = self.graph;
                self.diagnostics.warning(
                    DiagnosticKind::Structural,
                    format!(
                        "{}: parameter '{name}' is already declared by {}",
                        graph[node].label, graph[existing.node].label
                    ),
                    node,
                );
            }
            return;
        }
        self.parameters.insert(
            name.to_owned(),
            ParameterUi {
                name: name.to_owned(),
                kind,
                node,
            },
        );
    }

    /// Returns the index of the resource in the streamed resource list,
    /// adding it if needed.
    pub(crate) fn register_streamed(&mut self, asset: &str, kind: ResourceKind) -> u32 {
        let position = self
            .streamed_resources
            .iter()
            .position(|r| r.asset == asset && r.kind == kind);
        let idx = position.unwrap_or_else(|| {
            self.streamed_resources.push(StreamedResource {
                asset: asset.to_owned(),
                kind,
            });
            self.streamed_resources.len() - 1
        });
        idx as u32
    }

    /// Registers a socket with the active component and socket priority. On a
    /// name clash, the socket with the higher priority is kept.
    pub(crate) fn register_socket(&mut self, name: &str, node: NodeId) {
        let socket = IrSocket {
            name: name.to_owned(),
            component_id: self.ctx.component,
            priority: self.ctx.socket_priority,
        };
        let Some(idx) = self.sockets.iter().position(|s| s.name == name) else {
            self.sockets.push(socket);
            return;
        };
        let existing = &mut self.sockets[idx];
        if *existing == socket {
            return;
        }
        let message = format!(
            "Socket '{name}' is declared with priorities {} and {}, keeping the higher one",
            existing.priority, socket.priority
        );
        if socket.priority > existing.priority {
            *existing = socket;
        }
        self.diagnostics
            .info(DiagnosticKind::CollisionNotice, message, Some(node));
    }

    /// Consumes the compiler, returning the compiled model and everything
    /// recorded during the compilation.
    pub fn finish(self, objects: Vec<Rc<IrObject>>) -> CompileOutput {
        debug_assert_eq!(self.cycles.visiting_count(), 0);
        debug_assert!(self.ctx.macro_stack.is_empty());
        log::debug!(
            "Compilation finished: {} diagnostics, {} cache entries",
            self.diagnostics.len(),
            self.cache.len()
        );
        CompileOutput {
            model: CompiledModel {
                objects,
                parameters: self.parameters,
                states: self.states,
                streamed_resources: self.streamed_resources,
                sockets: self.sockets,
                components: self.components.into_vec(),
                identifiers: self
                    .interner
                    .entries()
                    .into_iter()
                    .map(|(id, name)| (id, name.to_owned()))
                    .collect(),
                optimization_level: self.options.optimization_level,
            },
            diagnostics: self.diagnostics,
            visited_nodes: self.visited_nodes,
            cycle_origins: self.cycle_origins,
            stats: self.stats,
        }
    }

    /// Reports a cycle closing at `key`, once per entry point.
    fn report_cycle(&mut self, key: &CycleKey, node: NodeId) {
        if !self.cycles.mark_reported(key) {
            return;
        }
        let graph = self.graph;
        let origin = self.ctx.object.unwrap_or(node);
        self.cycle_origins.push(origin);
        self.diagnostics.error(
            DiagnosticKind::Cycle,
            format!(
                "{} is part of a cycle (reached again while generating {})",
                graph[node].label, graph[origin].label
            ),
            node,
        );
    }
}

/// Compiles every root object of the graph.
#[profiling::function]
pub fn compile_graph(graph: &SourceGraph, options: CompileOptions) -> CompileOutput {
    let mut compiler = GraphCompiler::new(graph, options);

    log::debug!("Registering components");
    compiler.register_components();

    log::debug!("Generating objects");
    let objects = graph
        .root_objects()
        .into_iter()
        .filter_map(|node| graph.output_pin(node, pin_names::OBJECT))
        .filter_map(|pin| compiler.generate_object(pin))
        .collect();

    compiler.finish(objects)
}
