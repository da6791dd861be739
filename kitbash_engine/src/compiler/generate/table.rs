// Copyright (C) 2024 kitbash contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::compiler::diagnostics::DiagnosticKind;
use crate::compiler::output::ParameterKind;
use crate::compiler::GraphCompiler;
use crate::graph::{DataType, NodeId, NodeKind, PinId, TableNode};
use crate::ir::{IrTable, IrTableColumn, IrTableRow};
use crate::prelude::*;

impl<'g> GraphCompiler<'g> {
    /// Generates a table. Tables are always generated from their first output
    /// pin, so every column of a table shares the same IR table.
    pub fn generate_table(&mut self, pin: PinId) -> Option<Rc<IrTable>> {
        self.dispatch(pin, Self::build_table)
    }

    /// The IR for one column of a table, read through the output pin `pin`.
    pub(crate) fn table_column(&mut self, pin: PinId) -> Option<IrTableColumn> {
        let graph = self.graph;
        let node_id = graph.owning_node(pin);
        let canonical = graph[node_id].outputs.first().copied()?;
        let table = self.generate_table(canonical)?;
        Some(IrTableColumn {
            table,
            column: graph[pin].name.clone(),
        })
    }

    fn build_table(&mut self, pin: PinId) -> Option<Rc<IrTable>> {
        let graph = self.graph;
        let node_id = graph.owning_node(pin);
        let NodeKind::Table(table) = &graph[node_id].kind else {
            return self.unsupported(node_id, "tables");
        };
        let label = &graph[node_id].label;
        let Some(data) = graph.assets.tables.get(&table.table) else {
            self.diagnostics.error(
                DiagnosticKind::Structural,
                format!("{label}: data table '{}' not found", table.table),
                node_id,
            );
            return None;
        };

        let mut rows = data.rows.iter().collect_vec();
        if let Some(selected) = self.options.selected_option(&table.parameter) {
            let matching = rows
                .iter()
                .copied()
                .filter(|row| row.name == selected)
                .collect_vec();
            if matching.is_empty() {
                self.diagnostics.warning(
                    DiagnosticKind::Structural,
                    format!(
                        "{label}: selected row '{selected}' is not in table '{}', \
                         generating all rows",
                        table.table
                    ),
                    node_id,
                );
            } else {
                rows = matching;
            }
        }

        for row in &rows {
            self.check_table_row(node_id, table, &row.name, &row.cells);
        }

        self.register_parameter(
            &table.parameter,
            ParameterKind::Table {
                table: table.table.clone(),
                rows: rows.iter().map(|row| row.name.clone()).collect(),
            },
            node_id,
        );

        let rows = rows
            .into_iter()
            .map(|row| IrTableRow {
                id: self.intern(&row.name, node_id),
                name: row.name.clone(),
                cells: row.cells.clone(),
            })
            .collect();

        Some(Rc::new(IrTable {
            name: table.table.clone(),
            parameter: table.parameter.clone(),
            columns: table.columns.clone(),
            rows,
        }))
    }

    /// Reports cells referencing assets missing from the asset library.
    /// Empty cells are allowed.
    fn check_table_row(
        &mut self,
        node_id: NodeId,
        table: &TableNode,
        row: &str,
        cells: &std::collections::BTreeMap<String, String>,
    ) {
        let graph = self.graph;
        for column in &table.columns {
            let Some(asset) = cells.get(&column.name) else {
                continue;
            };
            let exists = match column.data_type {
                DataType::Mesh => graph.assets.meshes.contains_key(asset),
                DataType::Image => graph.assets.images.contains_key(asset),
                _ => true,
            };
            if !exists {
                self.diagnostics.warning(
                    DiagnosticKind::Structural,
                    format!(
                        "{}: row '{row}' column '{}' references missing asset '{asset}'",
                        graph[node_id].label, column.name
                    ),
                    node_id,
                );
            }
        }
    }
}
