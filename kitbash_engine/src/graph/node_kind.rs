// Copyright (C) 2024 kitbash contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use glam::{Mat4, UVec2, Vec4};
use serde::{Deserialize, Serialize};

use super::DataType;
use crate::prelude::*;

/// The names of the pins created by the node layouts. Indexed pins (LODs,
/// switch options, variations) are built with `indexed_name`.
pub mod pin_names {
    pub const OBJECT: &str = "object";
    pub const OBJECTS: &str = "objects";
    pub const COMPONENTS: &str = "components";
    pub const MODIFIERS: &str = "modifiers";
    pub const CHILDREN: &str = "children";
    pub const COMPONENT: &str = "component";
    pub const LOD: &str = "lod";
    pub const MODIFIER: &str = "modifier";
    pub const SURFACE: &str = "surface";
    pub const MESH: &str = "mesh";
    pub const BASE: &str = "base";
    pub const IMAGE: &str = "image";
    pub const BLENDED: &str = "blended";
    pub const MASK: &str = "mask";
    pub const CLIP_MESH: &str = "clip_mesh";
    pub const PARAMETER: &str = "parameter";
    pub const OPTION: &str = "option";
    pub const DEFAULT: &str = "default";
    pub const VARIATION: &str = "variation";
    pub const VALUE: &str = "value";
}

/// The definition of a pin inside a node layout
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinDefinition {
    pub name: String,
    pub data_type: DataType,
}

impl PinDefinition {
    pub fn new(name: impl ToString, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
        }
    }
}

/// A runtime state of the customizable object. States group the parameters
/// that can be modified at runtime.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateDefinition {
    pub name: String,
    pub runtime_parameters: Vec<String>,
    pub build_only_first_lod: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ObjectNode {
    pub name: String,
    #[serde(default)]
    pub states: Vec<StateDefinition>,
}

impl ObjectNode {
    pub fn named(name: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            states: vec![],
        }
    }
}

/// How the children of an object group can be enabled
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupType {
    /// Every child has its own on/off toggle
    Toggle,
    /// All children are always enabled
    AlwaysAll,
    /// At most one child is enabled
    OneOrNone,
    /// Exactly one child is enabled
    AlwaysOne,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObjectGroupNode {
    pub name: String,
    pub group_type: GroupType,
}

/// How the LODs of a component are authored
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutoLodStrategy {
    /// Every LOD has its own surfaces
    Manual,
    /// Only LOD 0 is authored, the other LODs reuse its surfaces and take the
    /// matching LOD from the source meshes.
    AutomaticFromMesh,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ComponentVariant {
    /// A component declaration, backed by a reference mesh
    Mesh {
        reference_mesh: Option<String>,
        num_lods: u8,
        auto_lod: AutoLodStrategy,
    },
    /// Adds surfaces to a component declared elsewhere
    Extension { parent: String, num_lods: u8 },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComponentNode {
    pub name: String,
    #[serde(default)]
    pub socket_priority: i32,
    pub variant: ComponentVariant,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ModifierOp {
    AddSurface,
    EditSurface {
        target_surface: String,
        slots: Vec<String>,
    },
    Morph {
        morph_target: String,
        factor: f32,
    },
    Transform {
        transform: Mat4,
    },
    ClipWithMesh,
    ClipWithMask,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModifierNode {
    pub target_component: String,
    #[serde(default)]
    pub required_tags: Vec<String>,
    pub op: ModifierOp,
}

/// What happens with the UV layouts of the meshes below a surface
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LayoutStrategy {
    #[default]
    Keep,
    Pack,
    Ignore,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceNode {
    pub name: String,
    pub material: String,
    pub layout: LayoutStrategy,
    pub tags: Vec<String>,
    pub image_slots: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum MeshNode {
    Asset { asset: String, section: u32 },
    Morph { morph_target: String, factor: f32 },
    Transform { transform: Mat4 },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlendMode {
    Multiply,
    Screen,
    Overlay,
    AlphaBlend,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ImageNode {
    Asset {
        asset: String,
    },
    Parameter {
        name: String,
        default_asset: Option<String>,
    },
    PlainColor {
        color: Vec4,
        size: UVec2,
    },
    Layer {
        blend: BlendMode,
    },
    Resize {
        size: UVec2,
    },
}

/// A data table. Every column becomes an output pin; the table rows become
/// the options of a parameter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableNode {
    pub table: String,
    pub parameter: String,
    pub columns: Vec<PinDefinition>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnumParameterNode {
    pub name: String,
    pub options: Vec<String>,
    #[serde(default)]
    pub default: usize,
}

/// Selects one of its options based on an enum parameter
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SwitchNode {
    pub data_type: DataType,
    pub options: usize,
}

/// Selects one of its inputs based on the tags active at runtime
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VariationNode {
    pub data_type: DataType,
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MacroInstanceNode {
    pub macro_name: String,
    pub inputs: Vec<PinDefinition>,
    pub outputs: Vec<PinDefinition>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TunnelSide {
    /// Exposes the inputs of the macro instance inside the macro
    Input,
    /// Collects the outputs of the macro, returned to the macro instance
    Output,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TunnelNode {
    pub macro_name: String,
    pub side: TunnelSide,
    pub params: Vec<PinDefinition>,
}

/// The closed set of node kinds in a source graph
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum NodeKind {
    Object(ObjectNode),
    ObjectGroup(ObjectGroupNode),
    Component(ComponentNode),
    Modifier(ModifierNode),
    Surface(SurfaceNode),
    Mesh(MeshNode),
    Image(ImageNode),
    Table(TableNode),
    EnumParameter(EnumParameterNode),
    Switch(SwitchNode),
    Variation(VariationNode),
    MacroInstance(MacroInstanceNode),
    Tunnel(TunnelNode),
    Comment { text: String },
}

fn indexed_pins(prefix: &str, count: usize, data_type: DataType) -> Vec<PinDefinition> {
    (0..count)
        .map(|i| PinDefinition::new(indexed_name(prefix, i), data_type))
        .collect()
}

fn named_pins(names: &[String], data_type: DataType) -> Vec<PinDefinition> {
    names
        .iter()
        .map(|name| PinDefinition::new(name, data_type))
        .collect()
}

impl NodeKind {
    /// A short, human readable name for the node kind
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeKind::Object(_) => "Object",
            NodeKind::ObjectGroup(_) => "Object Group",
            NodeKind::Component(c) => match c.variant {
                ComponentVariant::Mesh { .. } => "Component Mesh",
                ComponentVariant::Extension { .. } => "Component Extension",
            },
            NodeKind::Modifier(m) => match m.op {
                ModifierOp::AddSurface => "Add Surface",
                ModifierOp::EditSurface { .. } => "Edit Surface",
                ModifierOp::Morph { .. } => "Morph Modifier",
                ModifierOp::Transform { .. } => "Transform Modifier",
                ModifierOp::ClipWithMesh => "Clip With Mesh",
                ModifierOp::ClipWithMask => "Clip With Mask",
            },
            NodeKind::Surface(_) => "Surface",
            NodeKind::Mesh(m) => match m {
                MeshNode::Asset { .. } => "Mesh Asset",
                MeshNode::Morph { .. } => "Mesh Morph",
                MeshNode::Transform { .. } => "Mesh Transform",
            },
            NodeKind::Image(i) => match i {
                ImageNode::Asset { .. } => "Image Asset",
                ImageNode::Parameter { .. } => "Image Parameter",
                ImageNode::PlainColor { .. } => "Plain Color",
                ImageNode::Layer { .. } => "Image Layer",
                ImageNode::Resize { .. } => "Image Resize",
            },
            NodeKind::Table(_) => "Table",
            NodeKind::EnumParameter(_) => "Enum Parameter",
            NodeKind::Switch(_) => "Switch",
            NodeKind::Variation(_) => "Variation",
            NodeKind::MacroInstance(_) => "Macro Instance",
            NodeKind::Tunnel(t) => match t.side {
                TunnelSide::Input => "Macro Input",
                TunnelSide::Output => "Macro Output",
            },
            NodeKind::Comment { .. } => "Comment",
        }
    }

    /// The label given to new nodes of this kind
    pub fn default_label(&self) -> String {
        let name = match self {
            NodeKind::Object(o) => Some(&o.name),
            NodeKind::ObjectGroup(g) => Some(&g.name),
            NodeKind::Component(c) => Some(&c.name),
            NodeKind::Surface(s) => Some(&s.name),
            NodeKind::Table(t) => Some(&t.table),
            NodeKind::EnumParameter(p) => Some(&p.name),
            NodeKind::Image(ImageNode::Parameter { name, .. }) => Some(name),
            NodeKind::MacroInstance(m) => Some(&m.macro_name),
            _ => None,
        };
        match name {
            Some(name) => format!("{} '{}'", self.kind_name(), name),
            None => self.kind_name().to_owned(),
        }
    }

    /// Objects and components belong to a single parent. Wiring them to
    /// several consumers is reported, but doesn't stop generation.
    pub fn expects_single_consumer(&self) -> bool {
        matches!(
            self,
            NodeKind::Object(_) | NodeKind::ObjectGroup(_) | NodeKind::Component(_)
        )
    }

    pub fn input_definitions(&self) -> Vec<PinDefinition> {
        use pin_names::*;
        match self {
            NodeKind::Object(_) => vec![
                PinDefinition::new(COMPONENTS, DataType::Component),
                PinDefinition::new(MODIFIERS, DataType::Modifier),
                PinDefinition::new(CHILDREN, DataType::Object),
            ],
            NodeKind::ObjectGroup(_) => vec![PinDefinition::new(OBJECTS, DataType::Object)],
            NodeKind::Component(c) => match c.variant {
                ComponentVariant::Mesh {
                    auto_lod: AutoLodStrategy::AutomaticFromMesh,
                    ..
                } => indexed_pins(LOD, 1, DataType::Surface),
                ComponentVariant::Mesh { num_lods, .. }
                | ComponentVariant::Extension { num_lods, .. } => {
                    indexed_pins(LOD, num_lods as usize, DataType::Surface)
                }
            },
            NodeKind::Modifier(m) => match &m.op {
                ModifierOp::AddSurface => vec![PinDefinition::new(SURFACE, DataType::Surface)],
                ModifierOp::EditSurface { slots, .. } => named_pins(slots, DataType::Image),
                ModifierOp::Morph { .. } | ModifierOp::Transform { .. } => vec![],
                ModifierOp::ClipWithMesh => vec![PinDefinition::new(CLIP_MESH, DataType::Mesh)],
                ModifierOp::ClipWithMask => vec![PinDefinition::new(MASK, DataType::Image)],
            },
            NodeKind::Surface(s) => {
                let mut pins = vec![PinDefinition::new(MESH, DataType::Mesh)];
                pins.extend(named_pins(&s.image_slots, DataType::Image));
                pins
            }
            NodeKind::Mesh(m) => match m {
                MeshNode::Asset { .. } => vec![],
                MeshNode::Morph { .. } | MeshNode::Transform { .. } => {
                    vec![PinDefinition::new(BASE, DataType::Mesh)]
                }
            },
            NodeKind::Image(i) => match i {
                ImageNode::Asset { .. }
                | ImageNode::Parameter { .. }
                | ImageNode::PlainColor { .. } => vec![],
                ImageNode::Layer { .. } => vec![
                    PinDefinition::new(BASE, DataType::Image),
                    PinDefinition::new(BLENDED, DataType::Image),
                    PinDefinition::new(MASK, DataType::Image),
                ],
                ImageNode::Resize { .. } => vec![PinDefinition::new(BASE, DataType::Image)],
            },
            NodeKind::Table(_) | NodeKind::EnumParameter(_) | NodeKind::Comment { .. } => vec![],
            NodeKind::Switch(s) => {
                let mut pins = vec![PinDefinition::new(PARAMETER, DataType::Enum)];
                pins.extend(indexed_pins(OPTION, s.options, s.data_type));
                pins
            }
            NodeKind::Variation(v) => {
                let mut pins = vec![PinDefinition::new(DEFAULT, v.data_type)];
                pins.extend(indexed_pins(VARIATION, v.tags.len(), v.data_type));
                pins
            }
            NodeKind::MacroInstance(m) => m.inputs.clone(),
            NodeKind::Tunnel(t) => match t.side {
                TunnelSide::Input => vec![],
                TunnelSide::Output => t.params.clone(),
            },
        }
    }

    pub fn output_definitions(&self) -> Vec<PinDefinition> {
        use pin_names::*;
        match self {
            NodeKind::Object(_) | NodeKind::ObjectGroup(_) => {
                vec![PinDefinition::new(OBJECT, DataType::Object)]
            }
            NodeKind::Component(_) => vec![PinDefinition::new(COMPONENT, DataType::Component)],
            NodeKind::Modifier(_) => vec![PinDefinition::new(MODIFIER, DataType::Modifier)],
            NodeKind::Surface(_) => vec![PinDefinition::new(SURFACE, DataType::Surface)],
            NodeKind::Mesh(_) => vec![PinDefinition::new(MESH, DataType::Mesh)],
            NodeKind::Image(_) => vec![PinDefinition::new(IMAGE, DataType::Image)],
            NodeKind::Table(t) => t.columns.clone(),
            NodeKind::EnumParameter(_) => vec![PinDefinition::new(VALUE, DataType::Enum)],
            NodeKind::Switch(SwitchNode { data_type, .. })
            | NodeKind::Variation(VariationNode { data_type, .. }) => {
                vec![PinDefinition::new(VALUE, *data_type)]
            }
            NodeKind::MacroInstance(m) => m.outputs.clone(),
            NodeKind::Tunnel(t) => match t.side {
                TunnelSide::Input => t.params.clone(),
                TunnelSide::Output => vec![],
            },
            NodeKind::Comment { .. } => vec![],
        }
    }
}
