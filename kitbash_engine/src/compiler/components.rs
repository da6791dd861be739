// Copyright (C) 2024 kitbash contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;

use serde::Serialize;

use super::diagnostics::DiagnosticKind;
use super::options::PlatformDescriptor;
use super::GraphCompiler;
use crate::graph::{
    AutoLodStrategy, ComponentNode, ComponentVariant, MinLodSettings, NodeId, NodeKind,
};
use crate::prelude::*;

/// The data registered for each component declaration before generation
/// starts.
#[derive(Clone, Debug, Serialize)]
pub struct ComponentInfo {
    pub name: String,
    pub component_id: u32,
    pub node: NodeId,
    pub reference_mesh: String,
    pub skeleton: String,
    /// Number of LODs generated for the component
    pub lod_count: u8,
    /// The first LOD available on the target platform
    pub first_lod: u8,
    pub auto_lod: AutoLodStrategy,
    /// Priority of the sockets registered by the meshes of this component,
    /// whether they are reached from the component or from a modifier
    /// targeting it.
    pub socket_priority: i32,
    /// For each LOD, the interned bones removed at that LOD. Removals are
    /// cumulative: a LOD also drops every bone dropped by the LODs before it.
    pub bones_to_remove: Vec<Vec<u32>>,
}

impl ComponentInfo {
    pub fn lods(&self) -> std::ops::Range<u8> {
        self.first_lod..self.lod_count
    }

    pub fn removes_bone(&self, lod: u8, bone: u32) -> bool {
        self.bones_to_remove
            .get(lod as usize)
            .map_or(false, |bones| bones.binary_search(&bone).is_ok())
    }
}

#[derive(Default, Debug)]
pub struct ComponentRegistry {
    infos: Vec<ComponentInfo>,
    by_name: BTreeMap<String, usize>,
    by_node: HashMap<NodeId, usize>,
}

impl ComponentRegistry {
    pub fn get(&self, name: &str) -> Option<&ComponentInfo> {
        self.by_name.get(name).map(|idx| &self.infos[*idx])
    }

    /// Component ids are registration indices
    pub fn get_by_id(&self, component_id: u32) -> Option<&ComponentInfo> {
        self.infos.get(component_id as usize)
    }

    pub fn get_by_node(&self, node: NodeId) -> Option<&ComponentInfo> {
        self.by_node.get(&node).map(|idx| &self.infos[*idx])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ComponentInfo> {
        self.infos.iter()
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    fn insert(&mut self, info: ComponentInfo) {
        let idx = self.infos.len();
        self.by_name.insert(info.name.clone(), idx);
        self.by_node.insert(info.node, idx);
        self.infos.push(info);
    }

    pub(crate) fn into_vec(self) -> Vec<ComponentInfo> {
        self.infos
    }
}

/// The minimum LOD of a mesh available on the given platform. When the
/// platform uses quality levels, the lowest minimum across all of them is
/// used so that every quality level has the LODs it needs.
pub fn min_lod_for(platform: &PlatformDescriptor, settings: &MinLodSettings) -> u8 {
    if platform.use_quality_levels && !platform.quality_levels.is_empty() {
        platform
            .quality_levels
            .iter()
            .map(|level| {
                settings
                    .per_quality_level
                    .get(level)
                    .copied()
                    .unwrap_or(settings.default)
            })
            .min()
            .unwrap_or(settings.default)
    } else if let Some(min_lod) = platform.min_lod_override {
        min_lod
    } else {
        settings
            .per_platform
            .get(&platform.name)
            .copied()
            .unwrap_or(settings.default)
    }
}

impl<'g> GraphCompiler<'g> {
    /// First compilation pass. Registers the component declarations of the
    /// top level graph so that components and modifiers can reference each
    /// other by name during generation, regardless of traversal order.
    #[profiling::function]
    pub fn register_components(&mut self) {
        let graph = self.graph;
        for (node_id, node) in &graph.nodes {
            if node.owner.is_some() {
                continue;
            }
            let NodeKind::Component(component) = &node.kind else {
                continue;
            };
            let ComponentVariant::Mesh {
                reference_mesh,
                num_lods,
                auto_lod,
            } = &component.variant
            else {
                continue;
            };

            match self.validate_component(node_id, &component.name, reference_mesh, *num_lods) {
                Ok((mesh_name, lod_count)) => {
                    let info =
                        self.component_info(node_id, component, mesh_name, lod_count, *auto_lod);
                    log::debug!(
                        "Registered component '{}' with id {} (LODs {:?})",
                        info.name,
                        info.component_id,
                        info.lods()
                    );
                    self.components.insert(info);
                }
                Err(err) => {
                    self.diagnostics.error(
                        DiagnosticKind::FatalComponent,
                        format!("{}: {err}", node.label),
                        node_id,
                    );
                }
            }
        }
    }

    /// Checks that a component declaration is usable. Returns the reference
    /// mesh and the number of LODs to generate.
    fn validate_component(
        &mut self,
        node_id: NodeId,
        name: &str,
        reference_mesh: &Option<String>,
        num_lods: u8,
    ) -> Result<(&'g str, u8)> {
        let graph = self.graph;
        if self.components.get(name).is_some() {
            bail!("A component named '{name}' is already declared");
        }
        let mesh_name = reference_mesh
            .as_deref()
            .ok_or_else(|| anyhow!("Component '{name}' has no reference mesh"))?;
        let (mesh_name, mesh) = graph
            .assets
            .meshes
            .get_key_value(mesh_name)
            .ok_or_else(|| anyhow!("Reference mesh '{mesh_name}' not found"))?;
        if mesh.skeleton.is_none() {
            bail!("Reference mesh '{mesh_name}' has no skeleton");
        }

        let available = mesh.lod_count().min(u8::MAX as usize) as u8;
        if available == 0 {
            bail!("Reference mesh '{mesh_name}' has no LODs");
        }
        if num_lods == 0 {
            bail!("Component '{name}' declares no LODs");
        }
        if num_lods > available {
            self.diagnostics.warning(
                DiagnosticKind::Structural,
                format!(
                    "Component '{name}' requests {num_lods} LODs, but its reference mesh \
                     '{mesh_name}' only has {available}"
                ),
                node_id,
            );
        }
        Ok((mesh_name.as_str(), num_lods.min(available)))
    }

    fn component_info(
        &mut self,
        node_id: NodeId,
        component: &ComponentNode,
        mesh_name: &'g str,
        lod_count: u8,
        auto_lod: AutoLodStrategy,
    ) -> ComponentInfo {
        let graph = self.graph;
        let mesh = &graph.assets.meshes[mesh_name];

        let min_lod = min_lod_for(&self.options.target_platform, &mesh.min_lod);
        let first_lod = min_lod.min(lod_count - 1);

        let mut removed = Vec::new();
        let mut bones_to_remove = Vec::with_capacity(lod_count as usize);
        for lod in mesh.lods.iter().take(lod_count as usize) {
            for bone in &lod.bones_to_remove {
                removed.push(self.intern(bone, node_id));
            }
            removed.sort_unstable();
            removed.dedup();
            bones_to_remove.push(removed.clone());
        }

        ComponentInfo {
            name: component.name.clone(),
            component_id: self.components.len() as u32,
            node: node_id,
            reference_mesh: mesh_name.to_owned(),
            skeleton: mesh.skeleton.clone().unwrap_or_default(),
            lod_count,
            first_lod,
            auto_lod,
            socket_priority: component.socket_priority,
            bones_to_remove,
        }
    }
}
