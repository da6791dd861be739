// Copyright (C) 2024 kitbash contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::compiler::context::LayoutFlags;
use crate::compiler::GraphCompiler;
use crate::graph::{pin_names, LayoutStrategy, NodeId, NodeKind, PinId, SurfaceNode};
use crate::ir::{IrImageSlot, IrMaterialSurface, IrSurface};
use crate::prelude::*;

impl<'g> GraphCompiler<'g> {
    pub fn generate_surface(&mut self, pin: PinId) -> Option<Rc<IrSurface>> {
        self.dispatch(pin, Self::build_surface)
    }

    fn build_surface(&mut self, pin: PinId) -> Option<Rc<IrSurface>> {
        let graph = self.graph;
        let node_id = graph.owning_node(pin);
        let surface = match &graph[node_id].kind {
            NodeKind::Surface(surface) => {
                IrSurface::Material(self.build_material_surface(node_id, surface)?)
            }
            NodeKind::Switch(switch) => {
                IrSurface::Switch(self.build_switch(node_id, switch, Self::generate_surface)?)
            }
            NodeKind::Variation(variation) => IrSurface::Variation(self.build_variation(
                node_id,
                variation,
                Self::generate_surface,
            )),
            _ => return self.unsupported(node_id, "surfaces"),
        };
        Some(Rc::new(surface))
    }

    fn build_material_surface(
        &mut self,
        node_id: NodeId,
        surface: &SurfaceNode,
    ) -> Option<IrMaterialSurface> {
        let layout = match surface.layout {
            LayoutStrategy::Keep => LayoutFlags::empty(),
            LayoutStrategy::Pack => LayoutFlags::PACK_UVS,
            LayoutStrategy::Ignore => LayoutFlags::IGNORE_LAYOUT,
        };
        let mut c = self.with_layout_flags(layout);

        let mesh_source = c.follow_required(node_id, pin_names::MESH)?;
        let mesh = c.generate_mesh(mesh_source)?;

        let mut images = Vec::new();
        for slot in &surface.image_slots {
            let Some(source) = c.follow_optional(node_id, slot) else {
                continue;
            };
            if let Some(image) = c.generate_image(source) {
                images.push(IrImageSlot {
                    slot: slot.clone(),
                    image,
                });
            }
        }

        let metadata_id = c.intern(&surface.name, node_id);
        Some(IrMaterialSurface {
            name: surface.name.clone(),
            metadata_id,
            material: surface.material.clone(),
            tags: surface.tags.clone(),
            lod: c.ctx.lod,
            mesh,
            images,
        })
    }
}
