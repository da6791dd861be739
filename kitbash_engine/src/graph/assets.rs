// Copyright (C) 2024 kitbash contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;

use glam::UVec2;
use serde::{Deserialize, Serialize};

/// Metadata for one LOD of a mesh asset
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshLodInfo {
    pub sections: u32,
    pub bones_to_remove: Vec<String>,
}

/// The minimum LOD a mesh makes available, per platform or per quality level
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinLodSettings {
    pub default: u8,
    pub per_platform: BTreeMap<String, u8>,
    pub per_quality_level: BTreeMap<String, u8>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshAsset {
    pub skeleton: Option<String>,
    pub bones: Vec<String>,
    pub lods: Vec<MeshLodInfo>,
    pub skin_weight_profiles: Vec<String>,
    pub sockets: Vec<String>,
    pub min_lod: MinLodSettings,
    pub streamable: bool,
}

impl MeshAsset {
    /// A skinned mesh with `num_lods` single-section LODs. Mostly useful to
    /// build graphs programmatically.
    pub fn skinned(skeleton: &str, num_lods: usize) -> Self {
        Self {
            skeleton: Some(skeleton.to_owned()),
            lods: vec![
                MeshLodInfo {
                    sections: 1,
                    bones_to_remove: vec![],
                };
                num_lods
            ],
            ..Default::default()
        }
    }

    pub fn lod_count(&self) -> usize {
        self.lods.len()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageAsset {
    pub size: UVec2,
    pub streamable: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataTableRow {
    pub name: String,
    /// Column name to referenced asset
    pub cells: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataTable {
    pub rows: Vec<DataTableRow>,
}

/// Metadata for every asset referenced by a graph. Loading the assets
/// themselves is done by the runtime.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetLibrary {
    pub meshes: BTreeMap<String, MeshAsset>,
    pub images: BTreeMap<String, ImageAsset>,
    pub tables: BTreeMap<String, DataTable>,
}
