// Copyright (C) 2024 kitbash contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// Optimization levels above this one are clamped.
pub const MAX_OPTIMIZATION_LEVEL: u32 = 3;

/// The image LOD bias added on top of the LOD index when
/// `force_large_lod_bias` is set.
pub const LARGE_LOD_BIAS: u32 = 6;

/// Describes the platform the model is compiled for.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformDescriptor {
    pub name: String,
    /// The quality tiers supported by the platform. Used to compute the
    /// minimum available LOD of the components when `use_quality_levels` is
    /// set.
    pub quality_levels: Vec<String>,
    pub use_quality_levels: bool,
    /// When set, replaces the minimum LOD configured in the mesh assets.
    pub min_lod_override: Option<u8>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    pub target_platform: PlatformDescriptor,
    pub optimization_level: u32,
    /// Restricts table and switch generation to one option per named
    /// parameter. Used for partial and preview builds.
    pub selected_parameter_options: BTreeMap<String, String>,
    pub force_large_lod_bias: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            target_platform: PlatformDescriptor::default(),
            optimization_level: 1,
            selected_parameter_options: BTreeMap::new(),
            force_large_lod_bias: false,
        }
    }
}

impl CompileOptions {
    pub fn load_from_string(data: &str) -> Result<Self> {
        Ok(ron::from_str(data)?)
    }

    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read options file {}", path.display()))?;
        Self::load_from_string(&data)
            .with_context(|| format!("Invalid options file {}", path.display()))
    }

    /// The option selected for the given parameter, if the build is
    /// restricted to one.
    pub fn selected_option(&self, parameter: &str) -> Option<&str> {
        self.selected_parameter_options
            .get(parameter)
            .map(|s| s.as_str())
    }

    /// The LOD bias applied to the images generated for the given LOD
    pub fn image_lod_bias(&self, lod: u8) -> u32 {
        let bias = lod as u32;
        if self.force_large_lod_bias {
            bias + LARGE_LOD_BIAS
        } else {
            bias
        }
    }
}
