// Copyright (C) 2024 kitbash contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::prelude::*;

/// 32-bit FNV-1a hash of the lowercased name. Ids must be stable across
/// compiles and processes, so std's randomly seeded hasher can't be used.
pub fn hash32(name: &str) -> u32 {
    const OFFSET: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    name.chars()
        .flat_map(char::to_lowercase)
        .fold(OFFSET, |hash, c| {
            let mut buf = [0u8; 4];
            c.encode_utf8(&mut buf)
                .bytes()
                .fold(hash, |hash, b| (hash ^ b as u32).wrapping_mul(PRIME))
        })
}

/// How an id was obtained by [`IdInterner::intern`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InternOutcome {
    /// The name got its hash as id
    Inserted,
    /// The name was already interned
    Existing,
    /// The hash of the name was taken by `occupant`, so the name was moved to
    /// a free id after `base_id`.
    Remapped { base_id: u32, occupant: String },
}

/// Maps names to stable numeric ids. Once an id is bound to a name it stays
/// bound for the lifetime of the interner.
///
/// Names get their hash as id. On a collision the new name is moved to the
/// next free id after its hash, and the move is recorded in a remap table so
/// that later lookups don't need to probe again.
pub struct IdInterner {
    forward: HashMap<u32, String>,
    remap: HashMap<String, u32>,
    hasher: fn(&str) -> u32,
}

impl Default for IdInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl IdInterner {
    pub fn new() -> Self {
        Self::with_hasher(hash32)
    }

    pub fn with_hasher(hasher: fn(&str) -> u32) -> Self {
        Self {
            forward: HashMap::new(),
            remap: HashMap::new(),
            hasher,
        }
    }

    pub fn intern(&mut self, name: &str) -> (u32, InternOutcome) {
        let base_id = (self.hasher)(name);
        match self.forward.get(&base_id) {
            None => {
                self.forward.insert(base_id, name.to_owned());
                (base_id, InternOutcome::Inserted)
            }
            Some(stored) if stored == name => (base_id, InternOutcome::Existing),
            Some(occupant) => {
                if let Some(id) = self.remap.get(name) {
                    return (*id, InternOutcome::Existing);
                }
                let occupant = occupant.clone();
                let mut candidate = base_id.wrapping_add(1);
                while self.forward.contains_key(&candidate) {
                    candidate = candidate.wrapping_add(1);
                }
                self.forward.insert(candidate, name.to_owned());
                self.remap.insert(name.to_owned(), candidate);
                (candidate, InternOutcome::Remapped { base_id, occupant })
            }
        }
    }

    /// Returns the id of an already interned name
    pub fn lookup(&self, name: &str) -> Option<u32> {
        if let Some(id) = self.remap.get(name) {
            return Some(*id);
        }
        let base_id = (self.hasher)(name);
        match self.forward.get(&base_id) {
            Some(stored) if stored == name => Some(base_id),
            _ => None,
        }
    }

    pub fn name_of(&self, id: u32) -> Option<&str> {
        self.forward.get(&id).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// All the interned names with their ids, sorted by id
    pub fn entries(&self) -> Vec<(u32, &str)> {
        self.forward
            .iter()
            .map(|(id, name)| (*id, name.as_str()))
            .sorted()
            .collect()
    }
}
