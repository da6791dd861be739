// Copyright (C) 2024 kitbash contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::GenerateFn;
use crate::compiler::diagnostics::DiagnosticKind;
use crate::compiler::output::ParameterKind;
use crate::compiler::GraphCompiler;
use crate::graph::{pin_names, NodeId, NodeKind, SwitchNode, VariationNode};
use crate::ir::{IrSwitch, IrSwitchOption, IrVariation, IrVariationOption};
use crate::prelude::*;

impl<'g> GraphCompiler<'g> {
    /// Builds a switch, generic over the category of the routed values.
    ///
    /// The switch parameter must come straight from an enum parameter with as
    /// many options as the switch. When the build is restricted to one
    /// option of the parameter, the other options are left empty.
    pub(crate) fn build_switch<T>(
        &mut self,
        node_id: NodeId,
        switch: &SwitchNode,
        generate: GenerateFn<'g, T>,
    ) -> Option<IrSwitch<T>> {
        let graph = self.graph;
        let label = &graph[node_id].label;

        let param_pin = self.follow_required(node_id, pin_names::PARAMETER)?;
        let param_node = graph.owning_node(param_pin);
        self.visited_nodes.insert(param_node);
        let NodeKind::EnumParameter(param) = &graph[param_node].kind else {
            self.diagnostics.error(
                DiagnosticKind::Structural,
                format!(
                    "{label}: the parameter must be an enum parameter, found {}",
                    graph[param_node].label
                ),
                node_id,
            );
            return None;
        };
        if param.options.len() != switch.options {
            self.diagnostics.error(
                DiagnosticKind::Structural,
                format!(
                    "{label}: has {} options, but parameter '{}' has {}",
                    switch.options,
                    param.name,
                    param.options.len()
                ),
                node_id,
            );
            return None;
        }

        self.register_parameter(
            &param.name,
            ParameterKind::Enum {
                options: param.options.clone(),
                default: param.default,
            },
            param_node,
        );

        let mut selected = self.options.selected_option(&param.name).map(str::to_owned);
        if let Some(option) = &selected {
            if !param.options.contains(option) {
                self.diagnostics.warning(
                    DiagnosticKind::Structural,
                    format!(
                        "{label}: selected option '{option}' is not an option of '{}', \
                         generating all of them",
                        param.name
                    ),
                    node_id,
                );
                selected = None;
            }
        }

        let mut options = Vec::with_capacity(param.options.len());
        for (i, name) in param.options.iter().enumerate() {
            let enabled = selected.as_ref().map_or(true, |s| s == name);
            let value = if enabled {
                graph
                    .switch_option_pin(node_id, i)
                    .and_then(|pin| self.follow_single(pin))
                    .and_then(|source| generate(self, source))
            } else {
                None
            };
            options.push(IrSwitchOption {
                name: name.clone(),
                value,
            });
        }

        Some(IrSwitch {
            parameter: param.name.clone(),
            options,
        })
    }

    /// Builds a tag driven variation, generic over the category of the
    /// routed values. Unconnected variations are kept, with no value.
    pub(crate) fn build_variation<T>(
        &mut self,
        node_id: NodeId,
        variation: &VariationNode,
        generate: GenerateFn<'g, T>,
    ) -> IrVariation<T> {
        let graph = self.graph;
        let default = self
            .follow_optional(node_id, pin_names::DEFAULT)
            .and_then(|source| generate(self, source));

        let variations = variation
            .tags
            .iter()
            .enumerate()
            .map(|(i, tag)| IrVariationOption {
                tag: tag.clone(),
                value: graph
                    .variation_pin(node_id, i)
                    .and_then(|pin| self.follow_single(pin))
                    .and_then(|source| generate(self, source)),
            })
            .collect();

        IrVariation {
            default,
            variations,
        }
    }
}
