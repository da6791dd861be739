// Copyright (C) 2024 kitbash contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The intermediate representation handed over to the procedural generation
//! runtime. Children are reference counted: the memoization cache hands out
//! the same node to every parent that requests it, so the IR is a DAG.

use std::collections::BTreeMap;

use glam::{Mat4, UVec2, Vec4};
use serde::Serialize;

use crate::compiler::cache::GenerateKind;
use crate::compiler::context::{LayoutFlags, MeshConversionFlags};
use crate::graph::{BlendMode, GroupType, NodeId, PinDefinition};
use crate::prelude::*;

#[derive(Debug, Serialize)]
pub struct IrObject {
    pub name: String,
    pub node: NodeId,
    pub kind: IrObjectKind,
    pub components: Vec<Rc<IrComponent>>,
    pub modifiers: Vec<Rc<IrModifier>>,
    pub children: Vec<Rc<IrObject>>,
}

#[derive(Debug, Serialize)]
pub enum IrObjectKind {
    Object,
    Group {
        group_type: GroupType,
        /// The parameter controlling which children are enabled, if any
        parameter: Option<String>,
    },
}

#[derive(Debug, Serialize)]
pub struct IrComponent {
    pub name: String,
    pub component_id: u32,
    /// For component extensions, the name of the extended component
    pub extends: Option<String>,
    pub first_lod: u8,
    pub lods: Vec<IrLod>,
}

#[derive(Debug, Serialize)]
pub struct IrLod {
    pub lod: u8,
    pub surfaces: Vec<Rc<IrSurface>>,
}

#[derive(Debug, Serialize)]
pub struct IrModifier {
    pub target_component: String,
    pub component_id: u32,
    pub required_tags: Vec<String>,
    pub lods: Vec<IrModifierLod>,
}

#[derive(Debug, Serialize)]
pub struct IrModifierLod {
    pub lod: u8,
    pub op: IrModifierOp,
}

#[derive(Debug, Serialize)]
pub enum IrModifierOp {
    AddSurface {
        surface: Rc<IrSurface>,
    },
    EditSurface {
        target_surface: String,
        images: Vec<IrImageSlot>,
    },
    Morph {
        morph_target: String,
        factor: f32,
    },
    Transform {
        transform: Mat4,
    },
    ClipWithMesh {
        clip_mesh: Rc<IrMesh>,
    },
    ClipWithMask {
        mask: Rc<IrImage>,
    },
}

#[derive(Debug, Serialize)]
pub enum IrSurface {
    Material(IrMaterialSurface),
    Switch(IrSwitch<IrSurface>),
    Variation(IrVariation<IrSurface>),
}

#[derive(Debug, Serialize)]
pub struct IrMaterialSurface {
    pub name: String,
    /// Interned surface name, used by the runtime to match edits to surfaces
    pub metadata_id: u32,
    pub material: String,
    pub tags: Vec<String>,
    pub lod: u8,
    pub mesh: Rc<IrMesh>,
    pub images: Vec<IrImageSlot>,
}

#[derive(Debug, Serialize)]
pub struct IrImageSlot {
    pub slot: String,
    pub image: Rc<IrImage>,
}

#[derive(Debug, Serialize)]
pub enum IrMesh {
    Asset(IrMeshAsset),
    Morph {
        base: Rc<IrMesh>,
        morph_target: String,
        factor: f32,
    },
    Transform {
        base: Rc<IrMesh>,
        transform: Mat4,
    },
    Table(IrTableColumn),
    Switch(IrSwitch<IrMesh>),
    Variation(IrVariation<IrMesh>),
}

#[derive(Debug, Serialize)]
pub struct IrMeshAsset {
    pub asset: String,
    pub lod: u8,
    pub section: u32,
    /// Interned bone names. Empty when skinning is ignored.
    pub bone_ids: Vec<u32>,
    pub skin_weight_profiles: Vec<u32>,
    pub mesh_flags: MeshConversionFlags,
    pub layout_flags: LayoutFlags,
    /// Index into the streamed resource list, for streamable assets
    pub resource_index: Option<u32>,
}

#[derive(Debug, Serialize)]
pub enum IrImage {
    Asset {
        asset: String,
        size: UVec2,
        lod_bias: u32,
        resource_index: Option<u32>,
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
        base: Rc<IrImage>,
        blended: Rc<IrImage>,
        mask: Option<Rc<IrImage>>,
        blend: BlendMode,
    },
    Resize {
        base: Rc<IrImage>,
        size: UVec2,
    },
    Table(IrTableColumn),
    Switch(IrSwitch<IrImage>),
    Variation(IrVariation<IrImage>),
}

#[derive(Debug, Serialize)]
pub struct IrTable {
    pub name: String,
    pub parameter: String,
    pub columns: Vec<PinDefinition>,
    pub rows: Vec<IrTableRow>,
}

#[derive(Debug, Serialize)]
pub struct IrTableRow {
    /// Interned row name
    pub id: u32,
    pub name: String,
    pub cells: BTreeMap<String, String>,
}

/// A mesh or image read from one column of a data table
#[derive(Debug, Serialize)]
pub struct IrTableColumn {
    pub table: Rc<IrTable>,
    pub column: String,
}

/// A value selected at runtime by an enum parameter
#[derive(Debug, Serialize)]
pub struct IrSwitch<T> {
    pub parameter: String,
    pub options: Vec<IrSwitchOption<T>>,
}

#[derive(Debug, Serialize)]
pub struct IrSwitchOption<T> {
    pub name: String,
    pub value: Option<Rc<T>>,
}

/// A value selected at runtime by the active tags
#[derive(Debug, Serialize)]
pub struct IrVariation<T> {
    pub default: Option<Rc<T>>,
    pub variations: Vec<IrVariationOption<T>>,
}

#[derive(Debug, Serialize)]
pub struct IrVariationOption<T> {
    pub tag: String,
    pub value: Option<Rc<T>>,
}

/// An IR node of any category
#[derive(Clone, Debug)]
pub enum IrNode {
    Object(Rc<IrObject>),
    Component(Rc<IrComponent>),
    Modifier(Rc<IrModifier>),
    Surface(Rc<IrSurface>),
    Mesh(Rc<IrMesh>),
    Image(Rc<IrImage>),
    Table(Rc<IrTable>),
}

impl IrNode {
    pub fn kind(&self) -> GenerateKind {
        match self {
            IrNode::Object(_) => GenerateKind::Object,
            IrNode::Component(_) => GenerateKind::Component,
            IrNode::Modifier(_) => GenerateKind::Modifier,
            IrNode::Surface(_) => GenerateKind::Surface,
            IrNode::Mesh(_) => GenerateKind::Mesh,
            IrNode::Image(_) => GenerateKind::Image,
            IrNode::Table(_) => GenerateKind::Table,
        }
    }
}

/// Implemented by every IR node type that has its own dispatcher. Lets the
/// dispatch protocol and the cache be written once for all categories.
pub trait IrCategory: Sized {
    const KIND: GenerateKind;
    fn wrap(node: Rc<Self>) -> IrNode;
    fn unwrap(node: &IrNode) -> Option<Rc<Self>>;
}

macro_rules! impl_ir_category {
    ($ty:ty, $variant:ident) => {
        impl IrCategory for $ty {
            const KIND: GenerateKind = GenerateKind::$variant;

            fn wrap(node: Rc<Self>) -> IrNode {
                IrNode::$variant(node)
            }

            fn unwrap(node: &IrNode) -> Option<Rc<Self>> {
                match node {
                    IrNode::$variant(inner) => Some(Rc::clone(inner)),
                    _ => None,
                }
            }
        }
    };
}

impl_ir_category!(IrObject, Object);
impl_ir_category!(IrComponent, Component);
impl_ir_category!(IrModifier, Modifier);
impl_ir_category!(IrSurface, Surface);
impl_ir_category!(IrMesh, Mesh);
impl_ir_category!(IrImage, Image);
impl_ir_category!(IrTable, Table);

impl IrObject {
    /// Iterates this object and all its descendants, depth first.
    pub fn walk(self: &Rc<Self>) -> Vec<Rc<IrObject>> {
        let mut out = vec![Rc::clone(self)];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }
}

impl IrSurface {
    pub fn as_material(&self) -> Option<&IrMaterialSurface> {
        match self {
            IrSurface::Material(m) => Some(m),
            _ => None,
        }
    }
}
