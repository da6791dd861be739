// Copyright (C) 2024 kitbash contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::compiler::output::{ParameterKind, StateData};
use crate::compiler::GraphCompiler;
use crate::graph::{pin_names, GroupType, NodeId, NodeKind, ObjectGroupNode, ObjectNode, PinId};
use crate::ir::{IrObject, IrObjectKind};
use crate::prelude::*;

impl<'g> GraphCompiler<'g> {
    pub fn generate_object(&mut self, pin: PinId) -> Option<Rc<IrObject>> {
        self.dispatch(pin, Self::build_object)
    }

    fn build_object(&mut self, pin: PinId) -> Option<Rc<IrObject>> {
        let graph = self.graph;
        let node_id = graph.owning_node(pin);
        match &graph[node_id].kind {
            NodeKind::Object(object) => Some(Rc::new(self.build_plain_object(node_id, object))),
            NodeKind::ObjectGroup(group) => Some(Rc::new(self.build_object_group(node_id, group))),
            _ => self.unsupported(node_id, "objects"),
        }
    }

    /// Objects are generated in order: states, then components, then
    /// modifiers, then child objects.
    fn build_plain_object(&mut self, node_id: NodeId, object: &ObjectNode) -> IrObject {
        let mut c = self.with_object(node_id);

        for state in &object.states {
            c.states.push(StateData {
                name: state.name.clone(),
                object: object.name.clone(),
                runtime_parameters: state.runtime_parameters.clone(),
                build_only_first_lod: state.build_only_first_lod,
            });
        }

        let components =
            c.generate_all_sources(node_id, pin_names::COMPONENTS, Self::generate_component);
        let modifiers =
            c.generate_all_sources(node_id, pin_names::MODIFIERS, Self::generate_modifier);
        let children = c.generate_all_sources(node_id, pin_names::CHILDREN, Self::generate_object);

        IrObject {
            name: object.name.clone(),
            node: node_id,
            kind: IrObjectKind::Object,
            components,
            modifiers,
            children,
        }
    }

    fn build_object_group(&mut self, node_id: NodeId, group: &ObjectGroupNode) -> IrObject {
        let mut c = self.with_object(node_id);
        let children = c.generate_all_sources(node_id, pin_names::OBJECTS, Self::generate_object);
        let child_names = children.iter().map(|child| child.name.clone()).collect_vec();

        let parameter = match group.group_type {
            GroupType::AlwaysAll => None,
            GroupType::Toggle => {
                for name in &child_names {
                    c.register_parameter(name, ParameterKind::Bool { default: true }, node_id);
                }
                None
            }
            GroupType::OneOrNone | GroupType::AlwaysOne => {
                let mut options = child_names;
                if group.group_type == GroupType::OneOrNone {
                    options.insert(0, "None".to_owned());
                }
                c.register_parameter(
                    &group.name,
                    ParameterKind::Enum {
                        options,
                        default: 0,
                    },
                    node_id,
                );
                Some(group.name.clone())
            }
        };

        IrObject {
            name: group.name.clone(),
            node: node_id,
            kind: IrObjectKind::Group {
                group_type: group.group_type,
                parameter,
            },
            components: vec![],
            modifiers: vec![],
            children,
        }
    }
}
