// Copyright (C) 2024 kitbash contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use derive_more::Display;
use enum_map::Enum;
use serde::Serialize;

use super::context::{LayoutFlags, MacroStack, MeshConversionFlags, ScopedContext};
use crate::graph::PinId;
use crate::ir::{IrCategory, IrNode};
use crate::prelude::*;

/// The dispatcher that generated an IR node
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display, Enum, Serialize)]
pub enum GenerateKind {
    Object,
    Component,
    Modifier,
    Surface,
    Mesh,
    Image,
    Table,
}

impl GenerateKind {
    /// Whether the generated IR depends on the active LOD
    pub fn lod_sensitive(self) -> bool {
        matches!(
            self,
            GenerateKind::Surface | GenerateKind::Mesh | GenerateKind::Image
        )
    }

    /// Whether the generated IR depends on the active component
    pub fn component_sensitive(self) -> bool {
        matches!(self, GenerateKind::Surface | GenerateKind::Mesh)
    }

    /// Whether the generation registers sockets with the active priority.
    /// Surfaces count as they generate their meshes.
    pub fn socket_priority_sensitive(self) -> bool {
        matches!(self, GenerateKind::Surface | GenerateKind::Mesh)
    }

    pub fn mesh_flags_sensitive(self) -> bool {
        matches!(self, GenerateKind::Mesh)
    }

    pub fn layout_sensitive(self) -> bool {
        matches!(self, GenerateKind::Surface | GenerateKind::Mesh)
    }
}

/// Identifies a generation request. Two requests with equal keys produce
/// equivalent IR, so the second one is served from the cache.
///
/// Only the parts of the context the dispatcher depends on are part of the
/// key. The rest are stored as `None` or empty.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GenerationKey {
    pub kind: GenerateKind,
    pub pin: PinId,
    pub lod: Option<u8>,
    pub component: Option<u32>,
    pub socket_priority: Option<i32>,
    pub mesh_flags: MeshConversionFlags,
    pub layout_flags: LayoutFlags,
    pub macro_stack: MacroStack,
}

impl GenerationKey {
    pub fn new(kind: GenerateKind, pin: PinId, ctx: &ScopedContext) -> Self {
        Self {
            kind,
            pin,
            lod: kind.lod_sensitive().then_some(ctx.lod),
            component: if kind.component_sensitive() {
                ctx.component
            } else {
                None
            },
            socket_priority: kind
                .socket_priority_sensitive()
                .then_some(ctx.socket_priority),
            mesh_flags: if kind.mesh_flags_sensitive() {
                ctx.mesh_flags
            } else {
                MeshConversionFlags::empty()
            },
            layout_flags: if kind.layout_sensitive() {
                ctx.layout_flags
            } else {
                LayoutFlags::empty()
            },
            macro_stack: ctx.macro_stack.clone(),
        }
    }
}

/// Identifies a pin being generated, for cycle detection. Coarser than
/// [`GenerationKey`]: reentering a pin is a cycle whatever the LOD or the
/// flags are.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CycleKey {
    pub pin: PinId,
    pub kind: GenerateKind,
    pub macro_stack: MacroStack,
}

impl CycleKey {
    pub fn new(kind: GenerateKind, pin: PinId, ctx: &ScopedContext) -> Self {
        Self {
            pin,
            kind,
            macro_stack: ctx.macro_stack.clone(),
        }
    }
}

/// The memoization cache. Failed generations are cached too, so that their
/// diagnostics are only reported once.
#[derive(Default)]
pub struct GenerationCache {
    entries: HashMap<GenerationKey, Option<IrNode>>,
}

impl GenerationCache {
    /// Returns `Some` on a cache hit. The inner value is the cached result.
    pub fn get<T: IrCategory>(&self, key: &GenerationKey) -> Option<Option<Rc<T>>> {
        let entry = self.entries.get(key)?;
        debug_assert!(entry.as_ref().map_or(true, |node| node.kind() == key.kind));
        Some(entry.as_ref().and_then(T::unwrap))
    }

    pub fn insert<T: IrCategory>(&mut self, key: GenerationKey, value: Option<Rc<T>>) {
        debug_assert_eq!(key.kind, T::KIND);
        self.entries.insert(key, value.map(T::wrap));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
