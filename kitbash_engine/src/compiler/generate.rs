// Copyright (C) 2024 kitbash contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Every dispatcher goes through [`GraphCompiler::dispatch`], which takes
//! care of macro boundaries, the memoization cache and cycle detection. The
//! per-category modules only implement the construction of each node kind.

use super::cache::{CycleKey, GenerationKey};
use super::diagnostics::DiagnosticKind;
use super::GraphCompiler;
use crate::graph::{
    MacroInstanceNode, ModifierNode, ModifierOp, NodeId, NodeKind, PinId, TunnelNode, TunnelSide,
};
use crate::ir::IrCategory;
use crate::prelude::*;

mod component;
mod image;
mod mesh;
mod modifier;
mod object;
mod surface;
mod table;
mod variants;

/// Generates the IR for an output pin. Used both for the dispatchers and
/// for the construction functions they wrap.
pub(crate) type GenerateFn<'g, T> = fn(&mut GraphCompiler<'g>, PinId) -> Option<Rc<T>>;

/// Clip modifiers are generated once per consumer. When shared, only the
/// first consumer in traversal order received correct content.
fn is_cacheable(kind: &NodeKind) -> bool {
    !matches!(
        kind,
        NodeKind::Modifier(ModifierNode {
            op: ModifierOp::ClipWithMesh | ModifierOp::ClipWithMask,
            ..
        })
    )
}

impl<'g> GraphCompiler<'g> {
    /// Generates the output pin `pin` with the construction function `build`.
    ///
    /// Macro instances and input tunnels are redirected to the pin they
    /// forward. For any other node, a request with the same key as a
    /// previous one returns the previous result, and a request for a pin
    /// already being generated is reported as a cycle.
    pub(crate) fn dispatch<T: IrCategory>(
        &mut self,
        pin: PinId,
        build: GenerateFn<'g, T>,
    ) -> Option<Rc<T>> {
        let graph = self.graph;
        let node_id = graph.owning_node(pin);
        let node = &graph[node_id];
        self.visited_nodes.insert(node_id);
        self.check_single_consumer(pin, node_id);

        match &node.kind {
            NodeKind::MacroInstance(instance) => {
                return self.enter_macro(pin, node_id, instance, build)
            }
            NodeKind::Tunnel(tunnel) if tunnel.side == TunnelSide::Input => {
                return self.exit_macro(pin, node_id, tunnel, build)
            }
            _ => {}
        }

        let cacheable = is_cacheable(&node.kind);
        let key = GenerationKey::new(T::KIND, pin, &self.ctx);
        if cacheable {
            if let Some(hit) = self.cache.get::<T>(&key) {
                log::trace!("Cache hit for {} ({})", node.label, T::KIND);
                self.stats.cache_hits[T::KIND] += 1;
                return hit;
            }
        }

        let cycle_key = CycleKey::new(T::KIND, pin, &self.ctx);
        if self.cycles.is_visiting(&cycle_key) {
            self.report_cycle(&cycle_key, node_id);
            return None;
        }

        let result = {
            let mut c = self.enter_visit(cycle_key);
            c.stats.constructions[T::KIND] += 1;
            *c.stats.node_constructions.entry(node_id).or_default() += 1;
            build(&mut c, pin)
        };

        if cacheable {
            self.cache.insert(key, result.clone());
        }
        result
    }

    /// Follows an output of a macro instance into the macro body.
    fn enter_macro<T: IrCategory>(
        &mut self,
        pin: PinId,
        instance_id: NodeId,
        instance: &'g MacroInstanceNode,
        build: GenerateFn<'g, T>,
    ) -> Option<Rc<T>> {
        let graph = self.graph;
        let label = &graph[instance_id].label;
        if self.ctx.macro_stack.contains(&instance_id) {
            let key = CycleKey::new(T::KIND, pin, &self.ctx);
            self.report_cycle(&key, instance_id);
            return None;
        }

        let Some(output_tunnel) = graph
            .macro_def(&instance.macro_name)
            .and_then(|def| def.output_tunnel)
        else {
            self.diagnostics.error(
                DiagnosticKind::Structural,
                format!("{label}: macro '{}' has no output tunnel", instance.macro_name),
                instance_id,
            );
            return None;
        };
        let param = &graph[pin].name;
        let Some(inner) = graph.input_pin(output_tunnel, param) else {
            self.diagnostics.error(
                DiagnosticKind::Structural,
                format!(
                    "{label}: macro '{}' has no output named '{param}'",
                    instance.macro_name
                ),
                instance_id,
            );
            return None;
        };
        self.visited_nodes.insert(output_tunnel);

        let mut c = self.push_macro_frame(instance_id);
        let source = c.follow_required_pin(inner)?;
        c.dispatch(source, build)
    }

    /// Follows an input tunnel out of the macro body, to the pin connected
    /// to the innermost macro instance.
    fn exit_macro<T: IrCategory>(
        &mut self,
        pin: PinId,
        tunnel_id: NodeId,
        tunnel: &'g TunnelNode,
        build: GenerateFn<'g, T>,
    ) -> Option<Rc<T>> {
        let graph = self.graph;
        let label = &graph[tunnel_id].label;
        let param = &graph[pin].name;

        let instance_id = match self.ctx.macro_stack.last() {
            Some(instance_id) => *instance_id,
            None => {
                self.diagnostics.error(
                    DiagnosticKind::Structural,
                    format!("{label}: reached outside of a macro instance"),
                    tunnel_id,
                );
                return None;
            }
        };
        let matches_tunnel = matches!(
            &graph[instance_id].kind,
            NodeKind::MacroInstance(instance) if instance.macro_name == tunnel.macro_name
        );
        if !matches_tunnel {
            self.diagnostics.error(
                DiagnosticKind::Structural,
                format!(
                    "{label}: reached from {}, which doesn't instance macro '{}'",
                    graph[instance_id].label, tunnel.macro_name
                ),
                tunnel_id,
            );
            return None;
        }
        let Some(outer) = graph.input_pin(instance_id, param) else {
            self.diagnostics.error(
                DiagnosticKind::Structural,
                format!(
                    "{}: no input named '{param}' for macro '{}'",
                    graph[instance_id].label, tunnel.macro_name
                ),
                instance_id,
            );
            return None;
        };

        let mut c = self.pop_macro_frame()?;
        let source = c.follow_required_pin(outer)?;
        c.dispatch(source, build)
    }

    fn check_single_consumer(&mut self, pin: PinId, node_id: NodeId) {
        let graph = self.graph;
        let node = &graph[node_id];
        let consumers = graph.consumers(pin).len();
        if node.kind.expects_single_consumer()
            && consumers > 1
            && self.warned_nodes.insert(node_id)
        {
            self.diagnostics.warning(
                DiagnosticKind::Structural,
                format!(
                    "{}: connected to {consumers} nodes, but it should only have one",
                    node.label
                ),
                node_id,
            );
        }
    }

    /// Follows an input pin taking a single value to its source. When the
    /// input is linked several times, this is reported once and the first
    /// link is used.
    pub(crate) fn follow_single(&mut self, input: PinId) -> Option<PinId> {
        let graph = self.graph;
        let sources = graph.follow_to_sources(input);
        if sources.len() > 1 && self.warned_pins.insert(input) {
            let node_id = graph.owning_node(input);
            self.diagnostics.warning(
                DiagnosticKind::Structural,
                format!(
                    "{}: input '{}' has {} connections, only the first one is used",
                    graph[node_id].label,
                    graph[input].name,
                    sources.len()
                ),
                node_id,
            );
        }
        sources.first().copied()
    }

    /// Like [`Self::follow_single`], reporting an error when the input is not
    /// connected.
    pub(crate) fn follow_required_pin(&mut self, input: PinId) -> Option<PinId> {
        let source = self.follow_single(input);
        if source.is_none() {
            let graph = self.graph;
            let node_id = graph.owning_node(input);
            self.diagnostics.error(
                DiagnosticKind::Structural,
                format!(
                    "{}: required input '{}' is not connected",
                    graph[node_id].label, graph[input].name
                ),
                node_id,
            );
        }
        source
    }

    /// The source of the input `name` of a node, if connected
    pub(crate) fn follow_optional(&mut self, node_id: NodeId, name: &str) -> Option<PinId> {
        let input = self.graph.input_pin(node_id, name)?;
        self.follow_single(input)
    }

    /// The source of the input `name` of a node. Reports an error when the
    /// input is not connected.
    pub(crate) fn follow_required(&mut self, node_id: NodeId, name: &str) -> Option<PinId> {
        let graph = self.graph;
        match graph.input_pin(node_id, name) {
            Some(input) => self.follow_required_pin(input),
            None => {
                self.diagnostics.error(
                    DiagnosticKind::Structural,
                    format!("{}: has no input named '{name}'", graph[node_id].label),
                    node_id,
                );
                None
            }
        }
    }

    /// Generates every source linked to an input accepting several links.
    /// Sources failing to generate are skipped.
    pub(crate) fn generate_all_sources<T>(
        &mut self,
        node_id: NodeId,
        name: &str,
        generate: GenerateFn<'g, T>,
    ) -> Vec<Rc<T>> {
        let graph = self.graph;
        let Some(input) = graph.input_pin(node_id, name) else {
            return vec![];
        };
        graph
            .follow_to_sources(input)
            .iter_cpy()
            .filter_map(|source| generate(self, source))
            .collect()
    }

    /// Reports a node kind the dispatcher has no construction logic for.
    pub(crate) fn unsupported<T>(&mut self, node_id: NodeId, category: &str) -> Option<T> {
        let graph = self.graph;
        let node = &graph[node_id];
        self.diagnostics.error(
            DiagnosticKind::UnsupportedNodeKind,
            format!(
                "{}: {} nodes can't generate {category}",
                node.label,
                node.kind.kind_name()
            ),
            node_id,
        );
        None
    }
}
