//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::hash::Hash;

use rayon::iter::IntoParallelIterator;
use rayon::iter::ParallelIterator;

/// Aligned index pairs of equal elements across two unique-keyed slices.
///
/// Returns `(a_indices, b_indices)` such that `a[a_indices[i]] ==
/// b[b_indices[i]]` for every `i`; pairs follow the iteration order of `a`.
/// Both inputs are treated as duplicate-free.
pub fn intersection_indices<T>(a: &[T], b: &[T]) -> (Vec<usize>, Vec<usize>)
where
    T: Hash + Eq,
{
    let mut positions: HashMap<&T, usize> = HashMap::with_capacity(b.len());
    for (j, e) in b.iter().enumerate() {
        positions.insert(e, j);
    }

    let mut a_indices = Vec::new();
    let mut b_indices = Vec::new();
    for (i, e) in a.iter().enumerate() {
        if let Some(&j) = positions.get(e) {
            a_indices.push(i);
            b_indices.push(j);
        }
    }
    (a_indices, b_indices)
}

/// Gathers `v[i]` for every index in `indices`, preserving index order
pub fn select_rows<T>(v: &[T], indices: &[usize]) -> Vec<T>
where
    T: Clone + Send + Sync,
{
    indices
        .into_par_iter()
        .map(|&i| v[i].clone())
        .collect::<Vec<T>>()
}
