// Copyright (C) 2024 kitbash contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

use super::{AssetLibrary, NodeId, NodeKind, SourceGraph};
use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializationVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SerializationVersion {
    pub fn latest() -> Self {
        Self {
            major: 0,
            minor: 2,
            patch: 0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SerializedNode {
    pub kind: NodeKind,
    /// Only stored when it differs from the kind's default label
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
}

/// A connection between the output `src_pin` of the `src_node`-th node and
/// the input `dst_pin` of the `dst_node`-th node.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedConnection {
    pub src_node: usize,
    pub src_pin: String,
    pub dst_node: usize,
    pub dst_pin: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SerializedGraph {
    pub version: SerializationVersion,
    pub nodes: Vec<SerializedNode>,
    #[serde(default)]
    pub connections: Vec<SerializedConnection>,
    #[serde(default)]
    pub assets: AssetLibrary,
}

/// Maps slotmap ids to serialized indices.
type IdToIdx = SecondaryMap<NodeId, usize>;

impl SerializedGraph {
    pub fn from_runtime_data(graph: &SourceGraph) -> Self {
        let id_to_idx: IdToIdx = graph.nodes.keys().zip(0..).collect();

        let mut nodes = vec![];
        let mut connections = vec![];
        for (node_id, node) in &graph.nodes {
            let default_label = node.kind.default_label();
            nodes.push(SerializedNode {
                kind: node.kind.clone(),
                label: (node.label != default_label).then(|| node.label.clone()),
                owner: node.owner.clone(),
            });

            for dst_pin in &node.inputs {
                for src_pin in graph.follow_to_sources(*dst_pin) {
                    let src = &graph[*src_pin];
                    connections.push(SerializedConnection {
                        src_node: id_to_idx[src.node],
                        src_pin: src.name.clone(),
                        dst_node: id_to_idx[node_id],
                        dst_pin: graph[*dst_pin].name.clone(),
                    });
                }
            }
        }

        Self {
            version: SerializationVersion::latest(),
            nodes,
            connections,
            assets: graph.assets.clone(),
        }
    }

    pub fn into_runtime(self) -> Result<SourceGraph> {
        let latest = SerializationVersion::latest();
        if self.version.major != latest.major {
            bail!(
                "Unsupported graph version {}.{}.{}, expected {}.x.x",
                self.version.major,
                self.version.minor,
                self.version.patch,
                latest.major
            );
        }

        let mut graph = SourceGraph::new();
        graph.assets = self.assets;

        let mut idx_to_id = Vec::with_capacity(self.nodes.len());
        for node in self.nodes {
            let node_id = match &node.owner {
                Some(owner) => graph.add_node_in_macro(owner, node.kind),
                None => graph.add_node(node.kind),
            };
            if let Some(label) = node.label {
                graph.set_label(node_id, label);
            }
            idx_to_id.push(node_id);
        }

        for (i, conn) in self.connections.iter().enumerate() {
            let lookup = |idx: usize| {
                idx_to_id.get(idx).copied().ok_or_else(|| {
                    anyhow!("Connection {i} references node {idx}, which does not exist")
                })
            };
            let src = lookup(conn.src_node)?;
            let dst = lookup(conn.dst_node)?;
            graph
                .connect(src, &conn.src_pin, dst, &conn.dst_pin)
                .with_context(|| format!("Invalid connection {i}"))?;
        }

        Ok(graph)
    }

    pub fn load_from_string(data: &str) -> Result<Self> {
        Ok(ron::from_str(data)?)
    }

    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read graph file {}", path.display()))?;
        Self::load_from_string(&data)
            .with_context(|| format!("Invalid graph file {}", path.display()))
    }

    pub fn write_to_string(&self) -> Result<String> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }
}
