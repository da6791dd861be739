// Copyright (C) 2024 kitbash contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Some useful re-exports
pub mod prelude;

/// The source graph: nodes, pins, macro definitions and asset metadata
pub mod graph;

/// The intermediate representation produced by the compiler
pub mod ir;

/// Compiles a source graph into the intermediate representation consumed by
/// the procedural generation runtime.
pub mod compiler;

#[cfg(test)]
mod engine_tests;
