// Copyright (C) 2024 kitbash contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use smallvec::SmallVec;

pub type SVec<T> = SmallVec<[T; 4]>;

pub trait SliceUtils<T> {
    /// Same as .iter().copied(), but doesn't trigger rustfmt line breaks
    fn iter_cpy(&self) -> std::iter::Copied<std::slice::Iter<'_, T>>;
}

impl<T: Copy> SliceUtils<T> for [T] {
    fn iter_cpy(&self) -> std::iter::Copied<std::slice::Iter<'_, T>> {
        self.iter().copied()
    }
}

/// Builds the name of an indexed pin, like `lod_2` or `option_0`.
pub fn indexed_name(prefix: &str, index: usize) -> String {
    format!("{prefix}_{index}")
}

#[test]
pub fn test() {
    let values: SVec<i32> = [1, 2, 3].iter_cpy().collect();
    assert_eq!(values.len(), 3);
    assert!(!values.spilled());

    assert_eq!(indexed_name("lod", 2), "lod_2");
    assert_eq!(indexed_name("option", 0), "option_0");
}
