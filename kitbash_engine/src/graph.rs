// Copyright (C) 2024 kitbash contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;
use std::ops::Index;

use crate::prelude::*;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

/// The closed set of node kinds and their pin layouts
pub mod node_kind;
pub use node_kind::*;

/// Metadata for the assets referenced by the graph
pub mod assets;
pub use assets::*;

/// The `kgraph` file format
pub mod serialization;

slotmap::new_key_type! { pub struct NodeId; }
slotmap::new_key_type! { pub struct PinId; }

impl NodeId {
    pub fn display_id(self) -> String {
        format!("{:?}", self.0)
    }
}

impl PinId {
    pub fn display_id(self) -> String {
        format!("{:?}", self.0)
    }
}

/// The data types that can flow through a connection
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum DataType {
    Object,
    Component,
    Modifier,
    Surface,
    Mesh,
    Image,
    Enum,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PinDirection {
    Input,
    Output,
}

/// A typed connection point, owned by exactly one node.
///
/// For input pins, `links` stores the upstream output pins feeding this pin.
/// For output pins, `links` stores the downstream input pins consuming it.
#[derive(Debug, Clone)]
pub struct Pin {
    pub node: NodeId,
    pub name: String,
    pub direction: PinDirection,
    pub data_type: DataType,
    pub links: SVec<PinId>,
}

/// A node in the source graph
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    /// A user-facing label, used when reporting diagnostics.
    pub label: String,
    /// When the node lives inside a macro definition, the macro's name.
    pub owner: Option<String>,
    pub inputs: Vec<PinId>,
    pub outputs: Vec<PinId>,
}

/// The boundary nodes of a macro definition. Both tunnels are optional while a
/// graph is being built, but traversal through a macro with a missing tunnel
/// is reported as a structural error.
#[derive(Debug, Clone, Default)]
pub struct MacroDef {
    pub name: String,
    pub input_tunnel: Option<NodeId>,
    pub output_tunnel: Option<NodeId>,
}

/// The designer-authored graph describing a customizable object. The compiler
/// only ever reads from it.
#[derive(Default, Debug, Clone)]
pub struct SourceGraph {
    pub nodes: SlotMap<NodeId, Node>,
    pub pins: SlotMap<PinId, Pin>,
    pub macros: BTreeMap<String, MacroDef>,
    pub assets: AssetLibrary,
}

impl SourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node to the top level graph. Pins are created from the node
    /// kind's pin layout.
    pub fn add_node(&mut self, kind: NodeKind) -> NodeId {
        let owner = match &kind {
            NodeKind::Tunnel(tunnel) => Some(tunnel.macro_name.clone()),
            _ => None,
        };
        self.insert_node(kind, owner)
    }

    /// Adds a node inside the definition of macro `macro_name`
    pub fn add_node_in_macro(&mut self, macro_name: &str, kind: NodeKind) -> NodeId {
        self.macros
            .entry(macro_name.to_owned())
            .or_insert_with(|| MacroDef {
                name: macro_name.to_owned(),
                ..Default::default()
            });
        self.insert_node(kind, Some(macro_name.to_owned()))
    }

    fn insert_node(&mut self, kind: NodeKind, owner: Option<String>) -> NodeId {
        let label = kind.default_label();
        let input_defs = kind.input_definitions();
        let output_defs = kind.output_definitions();
        let tunnel = match &kind {
            NodeKind::Tunnel(tunnel) => Some((tunnel.macro_name.clone(), tunnel.side)),
            _ => None,
        };

        let node_id = self.nodes.insert(Node {
            kind,
            label,
            owner,
            inputs: vec![],
            outputs: vec![],
        });

        for (defs, direction) in [
            (input_defs, PinDirection::Input),
            (output_defs, PinDirection::Output),
        ] {
            for def in defs {
                let pin = self.pins.insert(Pin {
                    node: node_id,
                    name: def.name,
                    direction,
                    data_type: def.data_type,
                    links: SVec::new(),
                });
                let node = &mut self.nodes[node_id];
                match direction {
                    PinDirection::Input => node.inputs.push(pin),
                    PinDirection::Output => node.outputs.push(pin),
                }
            }
        }

        if let Some((macro_name, side)) = tunnel {
            let def = self
                .macros
                .entry(macro_name.clone())
                .or_insert_with(|| MacroDef {
                    name: macro_name.clone(),
                    ..Default::default()
                });
            let slot = match side {
                TunnelSide::Input => &mut def.input_tunnel,
                TunnelSide::Output => &mut def.output_tunnel,
            };
            if slot.is_some() {
                log::warn!(
                    "Macro '{macro_name}' already has an {side:?} tunnel. Node {} is ignored.",
                    node_id.display_id()
                );
            } else {
                *slot = Some(node_id);
            }
        }

        node_id
    }

    /// Overrides the label of a node.
    pub fn set_label(&mut self, node_id: NodeId, label: impl ToString) {
        self.nodes[node_id].label = label.to_string();
    }

    /// Registers a connection so that the `dst_param` input of `dst_node` is
    /// fed by the `src_param` output of `src_node`. Inputs may receive several
    /// connections; whether that is meaningful depends on the node kind.
    pub fn connect(
        &mut self,
        src_node: NodeId,
        src_param: &str,
        dst_node: NodeId,
        dst_param: &str,
    ) -> Result<()> {
        let src_pin = self.output_pin(src_node, src_param).ok_or_else(|| {
            anyhow!(
                "Output parameter named {src_param} does not exist for node {}",
                src_node.display_id()
            )
        })?;
        let dst_pin = self.input_pin(dst_node, dst_param).ok_or_else(|| {
            anyhow!(
                "Input parameter named {dst_param} does not exist for node {}",
                dst_node.display_id()
            )
        })?;

        let src_type = self.pins[src_pin].data_type;
        let dst_type = self.pins[dst_pin].data_type;
        if src_type != dst_type {
            bail!(
                "Incompatible types. Input is {:?}, but its corresponding output is {:?}",
                dst_type,
                src_type
            );
        }
        if self.pins[dst_pin].links.contains(&src_pin) {
            bail!(
                "Connection from {src_param} of node {} to {dst_param} of node {} already exists",
                src_node.display_id(),
                dst_node.display_id()
            );
        }

        self.pins[dst_pin].links.push(src_pin);
        self.pins[src_pin].links.push(dst_pin);
        Ok(())
    }

    pub fn node(&self, node_id: NodeId) -> &Node {
        &self.nodes[node_id]
    }

    pub fn pin(&self, pin_id: PinId) -> &Pin {
        &self.pins[pin_id]
    }

    pub fn owning_node(&self, pin_id: PinId) -> NodeId {
        self.pins[pin_id].node
    }

    /// Returns the output pins feeding the given input pin. Output pins have
    /// no sources.
    pub fn follow_to_sources(&self, pin_id: PinId) -> &[PinId] {
        let pin = &self.pins[pin_id];
        match pin.direction {
            PinDirection::Input => &pin.links,
            PinDirection::Output => &[],
        }
    }

    /// Returns the input pins consuming the given output pin.
    pub fn consumers(&self, pin_id: PinId) -> &[PinId] {
        let pin = &self.pins[pin_id];
        match pin.direction {
            PinDirection::Input => &[],
            PinDirection::Output => &pin.links,
        }
    }

    /// Iterates all the pins of a node, inputs first.
    pub fn child_pins(&self, node_id: NodeId) -> impl Iterator<Item = PinId> + '_ {
        let node = &self.nodes[node_id];
        node.inputs.iter_cpy().chain(node.outputs.iter_cpy())
    }

    pub fn input_pin(&self, node_id: NodeId, name: &str) -> Option<PinId> {
        self.nodes[node_id]
            .inputs
            .iter_cpy()
            .find(|pin| self.pins[*pin].name == name)
    }

    pub fn output_pin(&self, node_id: NodeId, name: &str) -> Option<PinId> {
        self.nodes[node_id]
            .outputs
            .iter_cpy()
            .find(|pin| self.pins[*pin].name == name)
    }

    /// The input pin carrying the surfaces of the `n`-th LOD of a component
    pub fn lod_pin(&self, node_id: NodeId, n: usize) -> Option<PinId> {
        self.input_pin(node_id, &indexed_name(pin_names::LOD, n))
    }

    /// The `n`-th option pin of a switch node
    pub fn switch_option_pin(&self, node_id: NodeId, n: usize) -> Option<PinId> {
        self.input_pin(node_id, &indexed_name(pin_names::OPTION, n))
    }

    /// The `n`-th variation pin of a variation node
    pub fn variation_pin(&self, node_id: NodeId, n: usize) -> Option<PinId> {
        self.input_pin(node_id, &indexed_name(pin_names::VARIATION, n))
    }

    pub fn macro_def(&self, name: &str) -> Option<&MacroDef> {
        self.macros.get(name)
    }

    /// Returns the object nodes that are not consumed by any other node and
    /// don't live inside a macro. These are the roots of the compilation.
    pub fn root_objects(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.owner.is_none())
            .filter(|(_, node)| {
                matches!(node.kind, NodeKind::Object(_) | NodeKind::ObjectGroup(_))
            })
            .filter(|(_, node)| {
                node.outputs
                    .iter()
                    .all(|pin| self.pins[*pin].links.is_empty())
            })
            .map(|(node_id, _)| node_id)
            .collect()
    }
}

impl Index<NodeId> for SourceGraph {
    type Output = Node;

    fn index(&self, index: NodeId) -> &Self::Output {
        &self.nodes[index]
    }
}

impl Index<PinId> for SourceGraph {
    type Output = Pin;

    fn index(&self, index: PinId) -> &Self::Output {
        &self.pins[index]
    }
}
