// Copyright (C) 2024 kitbash contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::compiler::context::{LayoutFlags, MeshConversionFlags};
use crate::compiler::diagnostics::DiagnosticKind;
use crate::compiler::GraphCompiler;
use crate::graph::{pin_names, ModifierNode, ModifierOp, NodeId, NodeKind, PinId};
use crate::ir::{IrImageSlot, IrModifier, IrModifierLod, IrModifierOp};
use crate::prelude::*;

/// The modifier inputs, resolved to their source pins
enum ModifierSources {
    None,
    Surface(PinId),
    Slots(Vec<(String, PinId)>),
    ClipMesh(PinId),
    Mask(PinId),
}

impl<'g> GraphCompiler<'g> {
    pub fn generate_modifier(&mut self, pin: PinId) -> Option<Rc<IrModifier>> {
        self.dispatch(pin, Self::build_modifier)
    }

    fn build_modifier(&mut self, pin: PinId) -> Option<Rc<IrModifier>> {
        let graph = self.graph;
        let node_id = graph.owning_node(pin);
        let NodeKind::Modifier(modifier) = &graph[node_id].kind else {
            return self.unsupported(node_id, "modifiers");
        };

        let Some(info) = self.components.get(&modifier.target_component).cloned() else {
            self.diagnostics.error(
                DiagnosticKind::Structural,
                format!(
                    "{}: target component '{}' was not registered",
                    graph[node_id].label, modifier.target_component
                ),
                node_id,
            );
            return None;
        };

        let sources = self.modifier_sources(node_id, modifier)?;

        let mut c = self.with_component(info.component_id);
        let mut c = c.with_socket_priority(info.socket_priority);
        let mut lods = Vec::new();
        for lod in info.lods() {
            let mut c = c.with_lod(lod);
            if let Some(op) = c.build_modifier_op(modifier, &sources) {
                lods.push(IrModifierLod { lod, op });
            }
        }

        Some(Rc::new(IrModifier {
            target_component: modifier.target_component.clone(),
            component_id: info.component_id,
            required_tags: modifier.required_tags.clone(),
            lods,
        }))
    }

    /// Resolves the inputs of a modifier once, so that missing connections
    /// are not reported for every LOD.
    fn modifier_sources(
        &mut self,
        node_id: NodeId,
        modifier: &ModifierNode,
    ) -> Option<ModifierSources> {
        Some(match &modifier.op {
            ModifierOp::AddSurface => {
                ModifierSources::Surface(self.follow_required(node_id, pin_names::SURFACE)?)
            }
            ModifierOp::EditSurface { slots, .. } => ModifierSources::Slots(
                slots
                    .iter()
                    .filter_map(|slot| {
                        let source = self.follow_optional(node_id, slot)?;
                        Some((slot.clone(), source))
                    })
                    .collect(),
            ),
            ModifierOp::Morph { .. } | ModifierOp::Transform { .. } => ModifierSources::None,
            ModifierOp::ClipWithMesh => {
                ModifierSources::ClipMesh(self.follow_required(node_id, pin_names::CLIP_MESH)?)
            }
            ModifierOp::ClipWithMask => {
                ModifierSources::Mask(self.follow_required(node_id, pin_names::MASK)?)
            }
        })
    }

    /// Generates the operation of a modifier for the active LOD
    fn build_modifier_op(
        &mut self,
        modifier: &ModifierNode,
        sources: &ModifierSources,
    ) -> Option<IrModifierOp> {
        match (&modifier.op, sources) {
            (ModifierOp::AddSurface, ModifierSources::Surface(source)) => {
                let surface = self.generate_surface(*source)?;
                Some(IrModifierOp::AddSurface { surface })
            }
            (ModifierOp::EditSurface { target_surface, .. }, ModifierSources::Slots(slots)) => {
                let images = slots
                    .iter()
                    .filter_map(|(slot, source)| {
                        let image = self.generate_image(*source)?;
                        Some(IrImageSlot {
                            slot: slot.clone(),
                            image,
                        })
                    })
                    .collect();
                Some(IrModifierOp::EditSurface {
                    target_surface: target_surface.clone(),
                    images,
                })
            }
            (
                ModifierOp::Morph {
                    morph_target,
                    factor,
                },
                _,
            ) => Some(IrModifierOp::Morph {
                morph_target: morph_target.clone(),
                factor: *factor,
            }),
            (ModifierOp::Transform { transform }, _) => Some(IrModifierOp::Transform {
                transform: *transform,
            }),
            (ModifierOp::ClipWithMesh, ModifierSources::ClipMesh(source)) => {
                // Only the shape of the clip mesh matters
                let mut c = self.with_mesh_flags(MeshConversionFlags::all());
                let mut c = c.with_layout_flags(LayoutFlags::IGNORE_LAYOUT);
                let clip_mesh = c.generate_mesh(*source)?;
                Some(IrModifierOp::ClipWithMesh { clip_mesh })
            }
            (ModifierOp::ClipWithMask, ModifierSources::Mask(source)) => {
                let mask = self.generate_image(*source)?;
                Some(IrModifierOp::ClipWithMask { mask })
            }
            _ => None,
        }
    }
}
