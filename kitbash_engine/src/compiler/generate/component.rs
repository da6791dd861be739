// Copyright (C) 2024 kitbash contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::compiler::components::ComponentInfo;
use crate::compiler::diagnostics::DiagnosticKind;
use crate::compiler::GraphCompiler;
use crate::graph::{
    pin_names, AutoLodStrategy, ComponentNode, ComponentVariant, NodeId, NodeKind, PinId,
};
use crate::ir::{IrComponent, IrLod};
use crate::prelude::*;

impl<'g> GraphCompiler<'g> {
    pub fn generate_component(&mut self, pin: PinId) -> Option<Rc<IrComponent>> {
        self.dispatch(pin, Self::build_component)
    }

    fn build_component(&mut self, pin: PinId) -> Option<Rc<IrComponent>> {
        let graph = self.graph;
        let node_id = graph.owning_node(pin);
        let NodeKind::Component(component) = &graph[node_id].kind else {
            return self.unsupported(node_id, "components");
        };

        let (info, extends) = match &component.variant {
            ComponentVariant::Mesh { .. } => (self.components.get_by_node(node_id), None),
            ComponentVariant::Extension { parent, .. } => {
                (self.components.get(parent), Some(parent.clone()))
            }
        };
        let Some(info) = info.cloned() else {
            let name = extends.as_ref().unwrap_or(&component.name);
            self.diagnostics.error(
                DiagnosticKind::Structural,
                format!(
                    "{}: component '{name}' was not registered",
                    graph[node_id].label
                ),
                node_id,
            );
            return None;
        };

        let lods = self.build_component_lods(node_id, component, &info);
        Some(Rc::new(IrComponent {
            name: component.name.clone(),
            component_id: info.component_id,
            extends,
            first_lod: info.first_lod,
            lods,
        }))
    }

    /// Generates the surfaces of every LOD available on the target platform.
    /// Components with automatic LODs only author LOD 0, and its surfaces are
    /// generated again for each LOD.
    fn build_component_lods(
        &mut self,
        node_id: NodeId,
        component: &ComponentNode,
        info: &ComponentInfo,
    ) -> Vec<IrLod> {
        let mut c = self.with_component(info.component_id);
        let mut c = c.with_socket_priority(component.socket_priority);

        let automatic = info.auto_lod == AutoLodStrategy::AutomaticFromMesh
            && matches!(component.variant, ComponentVariant::Mesh { .. });

        let mut lods = Vec::with_capacity(info.lods().len());
        for lod in info.lods() {
            let authored = if automatic { 0 } else { lod };
            let pin_name = indexed_name(pin_names::LOD, authored as usize);
            let mut c = c.with_lod(lod);
            let surfaces = c.generate_all_sources(node_id, &pin_name, Self::generate_surface);
            lods.push(IrLod { lod, surfaces });
        }
        lods
    }
}
