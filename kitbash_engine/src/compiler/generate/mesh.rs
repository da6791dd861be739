// Copyright (C) 2024 kitbash contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::compiler::context::MeshConversionFlags;
use crate::compiler::diagnostics::DiagnosticKind;
use crate::compiler::output::ResourceKind;
use crate::compiler::GraphCompiler;
use crate::graph::{pin_names, MeshNode, NodeId, NodeKind, PinId};
use crate::ir::{IrMesh, IrMeshAsset};
use crate::prelude::*;

impl<'g> GraphCompiler<'g> {
    pub fn generate_mesh(&mut self, pin: PinId) -> Option<Rc<IrMesh>> {
        self.dispatch(pin, Self::build_mesh)
    }

    fn build_mesh(&mut self, pin: PinId) -> Option<Rc<IrMesh>> {
        let graph = self.graph;
        let node_id = graph.owning_node(pin);
        let mesh = match &graph[node_id].kind {
            NodeKind::Mesh(MeshNode::Asset { asset, section }) => {
                IrMesh::Asset(self.build_mesh_asset(node_id, asset, *section)?)
            }
            NodeKind::Mesh(MeshNode::Morph {
                morph_target,
                factor,
            }) => {
                let base_source = self.follow_required(node_id, pin_names::BASE)?;
                let base = self.generate_mesh(base_source)?;
                if self.ctx.mesh_flags.contains(MeshConversionFlags::IGNORE_MORPHS) {
                    return Some(base);
                }
                IrMesh::Morph {
                    base,
                    morph_target: morph_target.clone(),
                    factor: *factor,
                }
            }
            NodeKind::Mesh(MeshNode::Transform { transform }) => {
                let base_source = self.follow_required(node_id, pin_names::BASE)?;
                IrMesh::Transform {
                    base: self.generate_mesh(base_source)?,
                    transform: *transform,
                }
            }
            NodeKind::Table(_) => IrMesh::Table(self.table_column(pin)?),
            NodeKind::Switch(switch) => {
                IrMesh::Switch(self.build_switch(node_id, switch, Self::generate_mesh)?)
            }
            NodeKind::Variation(variation) => {
                IrMesh::Variation(self.build_variation(node_id, variation, Self::generate_mesh))
            }
            _ => return self.unsupported(node_id, "meshes"),
        };
        Some(Rc::new(mesh))
    }

    /// Converts a section of a mesh asset, for the active LOD. Meshes with
    /// fewer LODs than the component use their last LOD.
    fn build_mesh_asset(
        &mut self,
        node_id: NodeId,
        asset: &str,
        section: u32,
    ) -> Option<IrMeshAsset> {
        let graph = self.graph;
        let label = &graph[node_id].label;
        let Some(mesh) = graph.assets.meshes.get(asset) else {
            self.diagnostics.error(
                DiagnosticKind::Structural,
                format!("{label}: mesh asset '{asset}' not found"),
                node_id,
            );
            return None;
        };
        let Some(last_lod) = mesh.lods.len().checked_sub(1) else {
            self.diagnostics.error(
                DiagnosticKind::Structural,
                format!("{label}: mesh asset '{asset}' has no LODs"),
                node_id,
            );
            return None;
        };
        let lod = (self.ctx.lod as usize).min(last_lod);
        let sections = mesh.lods[lod].sections;
        if section >= sections {
            self.diagnostics.error(
                DiagnosticKind::Structural,
                format!(
                    "{label}: section {section} doesn't exist in LOD {lod} of '{asset}', \
                     which has {sections} sections"
                ),
                node_id,
            );
            return None;
        }

        let flags = self.ctx.mesh_flags;
        let skinned = !flags.contains(MeshConversionFlags::IGNORE_SKINNING);
        let mut bone_ids = vec![];
        let mut skin_weight_profiles = vec![];
        if skinned {
            let ids = mesh
                .bones
                .iter()
                .map(|bone| self.intern(bone, node_id))
                .collect_vec();
            // Bones removed from this LOD by the component are left out
            let info = self.ctx.component.and_then(|id| self.components.get_by_id(id));
            bone_ids = ids
                .into_iter()
                .filter(|id| !info.map_or(false, |info| info.removes_bone(self.ctx.lod, *id)))
                .collect();
            for profile in &mesh.skin_weight_profiles {
                let id = self.intern(profile, node_id);
                skin_weight_profiles.push(id);
            }
        }

        if !flags.contains(MeshConversionFlags::IGNORE_SOCKETS) {
            for socket in &mesh.sockets {
                self.register_socket(socket, node_id);
            }
        }

        let resource_index = mesh
            .streamable
            .then(|| self.register_streamed(asset, ResourceKind::Mesh));

        Some(IrMeshAsset {
            asset: asset.to_owned(),
            lod: lod as u8,
            section,
            bone_ids,
            skin_weight_profiles,
            mesh_flags: flags,
            layout_flags: self.ctx.layout_flags,
            resource_index,
        })
    }
}
