// Copyright (C) 2024 kitbash contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The traversal state threaded through the dispatchers, and the guards used
//! to modify it.
//!
//! Every modification of the [`ScopedContext`] goes through a [`ScopeGuard`].
//! The guard mutably borrows the compiler, derefs to it, and puts the
//! previous value back when dropped. Nested modifications shadow the
//! previous guard, so values are restored in reverse order on every exit
//! path:
//!
//! ```ignore
//! let mut c = self.with_component(info.component_id);
//! let mut c = c.with_lod(lod);
//! let surface = c.generate_surface(pin);
//! ```

use std::ops::{Deref, DerefMut};

use serde::Serialize;

use super::cache::CycleKey;
use super::GraphCompiler;
use crate::graph::NodeId;
use crate::prelude::*;

bitflags::bitflags! {
    /// Parts of the source meshes dropped while converting them
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
    pub struct MeshConversionFlags: u8 {
        const IGNORE_SKINNING = 1 << 0;
        const IGNORE_PHYSICS = 1 << 1;
        const IGNORE_MORPHS = 1 << 2;
        const IGNORE_SOCKETS = 1 << 3;
    }
}

bitflags::bitflags! {
    /// How UV layouts are processed
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
    pub struct LayoutFlags: u8 {
        const IGNORE_LAYOUT = 1 << 0;
        const PACK_UVS = 1 << 1;
    }
}

/// The active macro instances, innermost last
pub type MacroStack = SVec<NodeId>;

#[derive(Clone, Debug, Default)]
pub struct ScopedContext {
    pub lod: u8,
    pub component: Option<u32>,
    pub mesh_flags: MeshConversionFlags,
    pub layout_flags: LayoutFlags,
    pub macro_stack: MacroStack,
    pub socket_priority: i32,
    /// The object node currently being generated. Used to attribute cycles.
    pub object: Option<NodeId>,
}

/// The value a guard puts back when dropped
#[derive(Debug)]
pub(crate) enum Restore {
    Lod(u8),
    Component(Option<u32>),
    MeshFlags(MeshConversionFlags),
    LayoutFlags(LayoutFlags),
    SocketPriority(i32),
    Object(Option<NodeId>),
    /// A macro frame was pushed, pop it
    MacroPush,
    /// A macro frame was popped, push it back
    MacroPop(NodeId),
    /// The key was marked as being visited, unmark it
    Visit(CycleKey),
}

pub struct ScopeGuard<'c, 'g> {
    compiler: &'c mut GraphCompiler<'g>,
    restore: Option<Restore>,
}

impl<'c, 'g> ScopeGuard<'c, 'g> {
    pub(crate) fn new(compiler: &'c mut GraphCompiler<'g>, restore: Restore) -> Self {
        Self {
            compiler,
            restore: Some(restore),
        }
    }
}

impl<'c, 'g> Deref for ScopeGuard<'c, 'g> {
    type Target = GraphCompiler<'g>;

    fn deref(&self) -> &Self::Target {
        self.compiler
    }
}

impl<'c, 'g> DerefMut for ScopeGuard<'c, 'g> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.compiler
    }
}

impl<'c, 'g> Drop for ScopeGuard<'c, 'g> {
    fn drop(&mut self) {
        let ctx = &mut self.compiler.ctx;
        match self.restore.take() {
            Some(Restore::Lod(lod)) => ctx.lod = lod,
            Some(Restore::Component(component)) => ctx.component = component,
            Some(Restore::MeshFlags(flags)) => ctx.mesh_flags = flags,
            Some(Restore::LayoutFlags(flags)) => ctx.layout_flags = flags,
            Some(Restore::SocketPriority(priority)) => ctx.socket_priority = priority,
            Some(Restore::Object(object)) => ctx.object = object,
            Some(Restore::MacroPush) => {
                ctx.macro_stack.pop();
            }
            Some(Restore::MacroPop(instance)) => ctx.macro_stack.push(instance),
            Some(Restore::Visit(key)) => self.compiler.cycles.exit(&key),
            None => {}
        }
    }
}

impl<'g> GraphCompiler<'g> {
    pub fn with_lod(&mut self, lod: u8) -> ScopeGuard<'_, 'g> {
        let prev = std::mem::replace(&mut self.ctx.lod, lod);
        ScopeGuard::new(self, Restore::Lod(prev))
    }

    pub fn with_component(&mut self, component: u32) -> ScopeGuard<'_, 'g> {
        let prev = self.ctx.component.replace(component);
        ScopeGuard::new(self, Restore::Component(prev))
    }

    /// Adds the given flags to the active mesh conversion flags
    pub fn with_mesh_flags(&mut self, flags: MeshConversionFlags) -> ScopeGuard<'_, 'g> {
        let prev = self.ctx.mesh_flags;
        self.ctx.mesh_flags |= flags;
        ScopeGuard::new(self, Restore::MeshFlags(prev))
    }

    /// Adds the given flags to the active layout flags
    pub fn with_layout_flags(&mut self, flags: LayoutFlags) -> ScopeGuard<'_, 'g> {
        let prev = self.ctx.layout_flags;
        self.ctx.layout_flags |= flags;
        ScopeGuard::new(self, Restore::LayoutFlags(prev))
    }

    pub fn with_socket_priority(&mut self, priority: i32) -> ScopeGuard<'_, 'g> {
        let prev = std::mem::replace(&mut self.ctx.socket_priority, priority);
        ScopeGuard::new(self, Restore::SocketPriority(prev))
    }

    pub fn with_object(&mut self, object: NodeId) -> ScopeGuard<'_, 'g> {
        let prev = self.ctx.object.replace(object);
        ScopeGuard::new(self, Restore::Object(prev))
    }

    /// Enters the body of a macro instance
    pub fn push_macro_frame(&mut self, instance: NodeId) -> ScopeGuard<'_, 'g> {
        self.ctx.macro_stack.push(instance);
        ScopeGuard::new(self, Restore::MacroPush)
    }

    /// Leaves the body of the innermost macro instance, to follow a tunnel
    /// back to the call site. Returns `None` when no macro is active.
    pub fn pop_macro_frame(&mut self) -> Option<ScopeGuard<'_, 'g>> {
        let instance = self.ctx.macro_stack.pop()?;
        Some(ScopeGuard::new(self, Restore::MacroPop(instance)))
    }

    /// Marks `key` as being visited until the guard is dropped.
    pub(crate) fn enter_visit(&mut self, key: CycleKey) -> ScopeGuard<'_, 'g> {
        self.cycles.enter(key.clone());
        ScopeGuard::new(self, Restore::Visit(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::cache::GenerateKind;
    use crate::compiler::CompileOptions;
    use crate::graph::*;

    #[test]
    pub fn guards_restore_in_reverse_order() {
        let mut graph = SourceGraph::new();
        let instance = graph.add_node(NodeKind::Comment { text: "".into() });
        let mut compiler = GraphCompiler::new(&graph, CompileOptions::default());

        {
            let mut c = compiler.with_lod(2);
            let mut c = c.with_component(7);
            let mut c = c.with_mesh_flags(MeshConversionFlags::IGNORE_SKINNING);
            let mut c = c.with_mesh_flags(MeshConversionFlags::IGNORE_MORPHS);
            let c = c.push_macro_frame(instance);
            assert_eq!(c.ctx.lod, 2);
            assert_eq!(c.ctx.component, Some(7));
            assert_eq!(
                c.ctx.mesh_flags,
                MeshConversionFlags::IGNORE_SKINNING | MeshConversionFlags::IGNORE_MORPHS
            );
            assert_eq!(c.ctx.macro_stack.as_slice(), &[instance]);
        }

        assert_eq!(compiler.ctx.lod, 0);
        assert_eq!(compiler.ctx.component, None);
        assert!(compiler.ctx.mesh_flags.is_empty());
        assert!(compiler.ctx.macro_stack.is_empty());
    }

    #[test]
    pub fn popped_macro_frames_are_pushed_back() {
        let mut graph = SourceGraph::new();
        let outer = graph.add_node(NodeKind::Comment { text: "".into() });
        let inner = graph.add_node(NodeKind::Comment { text: "".into() });
        let mut compiler = GraphCompiler::new(&graph, CompileOptions::default());

        let mut c = compiler.push_macro_frame(outer);
        let mut c = c.push_macro_frame(inner);
        {
            let c = c.pop_macro_frame().unwrap();
            assert_eq!(c.ctx.macro_stack.as_slice(), &[outer]);
        }
        assert_eq!(c.ctx.macro_stack.as_slice(), &[outer, inner]);
    }

    #[test]
    pub fn visit_guard_unmarks_on_early_return() {
        let mut graph = SourceGraph::new();
        let mesh = graph.add_node(NodeKind::Mesh(MeshNode::Asset {
            asset: "Body".into(),
            section: 0,
        }));
        let pin = graph.output_pin(mesh, "mesh").unwrap();
        let mut compiler = GraphCompiler::new(&graph, CompileOptions::default());
        let key = CycleKey::new(GenerateKind::Mesh, pin, &compiler.ctx);

        fn visit(compiler: &mut GraphCompiler, key: &CycleKey) -> Option<()> {
            let c = compiler.enter_visit(key.clone());
            assert!(c.cycles.is_visiting(key));
            Option::<()>::None?;
            Some(())
        }

        assert_eq!(visit(&mut compiler, &key), None);
        assert!(!compiler.cycles.is_visiting(&key));
    }
}
