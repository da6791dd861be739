// Copyright (C) 2024 kitbash contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::cache::CycleKey;
use crate::prelude::*;

/// The set of pins currently being generated. A key is inserted when its
/// generation starts and removed when it ends, through the guard returned by
/// `GraphCompiler::enter_visit`.
#[derive(Default, Debug)]
pub struct CycleGuard {
    visiting: HashSet<CycleKey>,
    /// Cycle entry points already reported
    reported: HashSet<CycleKey>,
}

impl CycleGuard {
    pub fn is_visiting(&self, key: &CycleKey) -> bool {
        self.visiting.contains(key)
    }

    pub fn enter(&mut self, key: CycleKey) {
        let inserted = self.visiting.insert(key);
        debug_assert!(inserted, "Entered a key that was already being visited");
    }

    pub fn exit(&mut self, key: &CycleKey) {
        self.visiting.remove(key);
    }

    /// Returns true the first time a cycle entry point is reported.
    pub fn mark_reported(&mut self, key: &CycleKey) -> bool {
        self.reported.insert(key.clone())
    }

    pub fn visiting_count(&self) -> usize {
        self.visiting.len()
    }
}
