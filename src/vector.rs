//! Hybrid sparse/dense vector: a numeric vector that stores itself as a
//! dense array or as packed (value, index) pairs and automatically swaps
//! between the two as its nonzero count crosses a density threshold.
//!
//! Every dot product and `add_vector` funnels nonzero accumulation through
//! [`crate::tolerance::stable_add`] / [`crate::tolerance::stable_add_abs`];
//! a naive running `+=` is never used.

use crate::I;
use crate::tolerance::{Tolerances, stable_add, stable_add_abs};

#[derive(Debug, Clone)]
enum Repr {
    Dense(Vec<f64>),
    /// `indices`/`values` are parallel arrays; `sorted` records whether
    /// `indices` is ascending (required for binary search and for a
    /// sorted·sorted dot product merge).
    Sparse { values: Vec<f64>, indices: Vec<I>, sorted: bool },
}

/// A numeric vector with an automatically chosen internal representation.
#[derive(Debug, Clone)]
pub struct HybridVector {
    dim: I,
    repr: Repr,
    nnz: I,
    sparsity_ratio: f64,
}

impl HybridVector {
    /// An all-zero vector of the given dimension, starting in whichever
    /// representation the density threshold prescribes for zero nonzeros.
    pub fn zeros(dim: I, sparsity_ratio: f64) -> Self {
        let threshold = Self::threshold_for(dim, sparsity_ratio);
        let repr = if threshold == 0 {
            Repr::Dense(vec![0.0; dim])
        } else {
            Repr::Sparse { values: Vec::new(), indices: Vec::new(), sorted: true }
        };
        HybridVector { dim, repr, nnz: 0, sparsity_ratio }
    }

    /// Build from a dense slice, choosing the representation from the
    /// actual nonzero count.
    pub fn from_dense(values: &[f64], sparsity_ratio: f64) -> Self {
        let mut v = HybridVector::zeros(values.len(), sparsity_ratio);
        for (i, &x) in values.iter().enumerate() {
            if x != 0.0 {
                v.set(i, x);
            }
        }
        v
    }

    /// Build a sparse vector directly from (index, value) pairs. Indices
    /// need not be sorted or unique on input; duplicates are summed.
    pub fn from_sparse(dim: I, pairs: &[(I, f64)], sparsity_ratio: f64) -> Self {
        let mut v = HybridVector::zeros(dim, sparsity_ratio);
        for &(i, x) in pairs {
            let prior = v.at(i);
            v.set(i, prior + x);
        }
        v
    }

    fn threshold_for(dim: I, sparsity_ratio: f64) -> I {
        (dim as f64 * sparsity_ratio).round() as I
    }

    fn threshold(&self) -> I {
        Self::threshold_for(self.dim, self.sparsity_ratio)
    }

    pub fn length(&self) -> I {
        self.dim
    }

    pub fn nonzeros(&self) -> I {
        self.nnz
    }

    pub fn is_dense(&self) -> bool {
        matches!(self.repr, Repr::Dense(_))
    }

    fn sparse_find(indices: &[I], sorted: bool, i: I) -> Option<usize> {
        if sorted {
            indices.binary_search(&i).ok()
        } else {
            indices.iter().position(|&idx| idx == i)
        }
    }

    /// Value at index `i`. O(1) in DENSE, O(log s) in SPARSE when sorted,
    /// O(s) otherwise.
    pub fn at(&self, i: I) -> f64 {
        debug_assert!(i < self.dim);
        match &self.repr {
            Repr::Dense(data) => data[i],
            Repr::Sparse { values, indices, sorted } => {
                match Self::sparse_find(indices, *sorted, i) {
                    Some(pos) => values[pos],
                    None => 0.0,
                }
            }
        }
    }

    /// Overwrite index `i`, possibly promoting/demoting the representation.
    pub fn set(&mut self, i: I, x: f64) {
        debug_assert!(i < self.dim);
        let was_nonzero = self.at(i) != 0.0;
        match &mut self.repr {
            Repr::Dense(data) => {
                data[i] = x;
            }
            Repr::Sparse { values, indices, sorted } => {
                match Self::sparse_find(indices, *sorted, i) {
                    Some(pos) => {
                        if x == 0.0 {
                            values.remove(pos);
                            indices.remove(pos);
                        } else {
                            values[pos] = x;
                        }
                    }
                    None => {
                        if x != 0.0 {
                            if *sorted && indices.last().is_some_and(|&last| last > i) {
                                *sorted = false;
                            }
                            indices.push(i);
                            values.push(x);
                        }
                    }
                }
            }
        }
        let is_nonzero = x != 0.0;
        match (was_nonzero, is_nonzero) {
            (false, true) => self.nnz += 1,
            (true, false) => self.nnz -= 1,
            _ => {}
        }
        self.maybe_switch_representation();
    }

    /// Grow the vector by one element, appended at the end.
    pub fn append(&mut self, x: f64) {
        self.dim += 1;
        match &mut self.repr {
            Repr::Dense(data) => data.push(x),
            Repr::Sparse { .. } => {
                if x != 0.0 {
                    let last = self.dim - 1;
                    self.set(last, x);
                    return;
                }
            }
        }
        if x != 0.0 {
            self.nnz += 1;
        }
        self.maybe_switch_representation();
    }

    /// Insert a new element before position `i`; the dimension grows by one
    /// and indices at/after `i` shift up by one.
    pub fn insert(&mut self, i: I, x: f64) {
        debug_assert!(i <= self.dim);
        self.dim += 1;
        match &mut self.repr {
            Repr::Dense(data) => data.insert(i, x),
            Repr::Sparse { values, indices, .. } => {
                for idx in indices.iter_mut() {
                    if *idx >= i {
                        *idx += 1;
                    }
                }
                if x != 0.0 {
                    indices.push(i);
                    values.push(x);
                }
            }
        }
        if x != 0.0 {
            self.nnz += 1;
        }
        self.maybe_switch_representation();
    }

    /// Delete position `i`; the dimension shrinks by one and remaining
    /// indices shift down.
    pub fn remove(&mut self, i: I) {
        debug_assert!(i < self.dim);
        let was_nonzero = self.at(i) != 0.0;
        match &mut self.repr {
            Repr::Dense(data) => {
                data.remove(i);
            }
            Repr::Sparse { values, indices, .. } => {
                if let Some(pos) = indices.iter().position(|&idx| idx == i) {
                    values.remove(pos);
                    indices.remove(pos);
                }
                for idx in indices.iter_mut() {
                    if *idx > i {
                        *idx -= 1;
                    }
                }
            }
        }
        self.dim -= 1;
        if was_nonzero {
            self.nnz -= 1;
        }
        self.maybe_switch_representation();
    }

    /// In-place scale by `lambda`. `lambda == 0` yields the empty SPARSE
    /// vector, a specialization rather than a dense array of zeros.
    pub fn scale_by(&mut self, lambda: f64) {
        if lambda == 0.0 {
            self.repr = Repr::Sparse { values: Vec::new(), indices: Vec::new(), sorted: true };
            self.nnz = 0;
            return;
        }
        match &mut self.repr {
            Repr::Dense(data) => {
                for x in data.iter_mut() {
                    *x *= lambda;
                }
            }
            Repr::Sparse { values, .. } => {
                for x in values.iter_mut() {
                    *x *= lambda;
                }
            }
        }
    }

    /// Pointwise multiply by a dense array of length `length()`.
    pub fn scale_by_lambdas(&mut self, lambdas: &[f64]) {
        debug_assert_eq!(lambdas.len(), self.dim);
        match &mut self.repr {
            Repr::Dense(data) => {
                for (x, &l) in data.iter_mut().zip(lambdas.iter()) {
                    *x *= l;
                }
            }
            Repr::Sparse { values, indices, .. } => {
                for (x, &i) in values.iter_mut().zip(indices.iter()) {
                    *x *= lambdas[i];
                }
            }
        }
        let nnz = match &self.repr {
            Repr::Dense(data) => data.iter().filter(|&&x| x != 0.0).count(),
            Repr::Sparse { values, .. } => values.iter().filter(|&&x| x != 0.0).count(),
        };
        self.nnz = nnz;
        self.compact_zeros();
        self.maybe_switch_representation();
    }

    fn compact_zeros(&mut self) {
        if let Repr::Sparse { values, indices, .. } = &mut self.repr {
            let mut keep_v = Vec::with_capacity(values.len());
            let mut keep_i = Vec::with_capacity(indices.len());
            for (v, i) in values.iter().zip(indices.iter()) {
                if *v != 0.0 {
                    keep_v.push(*v);
                    keep_i.push(*i);
                }
            }
            *values = keep_v;
            *indices = keep_i;
        }
    }

    /// After every mutator that changes the nonzero count, swap
    /// representation if `nonzeros()` ends up on the wrong side of the
    /// density threshold. Preserves `at(i)` for every `i`.
    fn maybe_switch_representation(&mut self) {
        let t = self.threshold();
        match &self.repr {
            Repr::Sparse { .. } if self.nnz >= t && t > 0 => self.to_dense(),
            Repr::Dense(_) if self.nnz < t => self.to_sparse(),
            _ => {}
        }
    }

    fn to_dense(&mut self) {
        if let Repr::Sparse { values, indices, .. } = &self.repr {
            let mut data = vec![0.0; self.dim];
            for (&i, &v) in indices.iter().zip(values.iter()) {
                data[i] = v;
            }
            self.repr = Repr::Dense(data);
        }
    }

    fn to_sparse(&mut self) {
        if let Repr::Dense(data) = &self.repr {
            let mut values = Vec::new();
            let mut indices = Vec::new();
            for (i, &x) in data.iter().enumerate() {
                if x != 0.0 {
                    values.push(x);
                    indices.push(i);
                }
            }
            self.repr = Repr::Sparse { values, indices, sorted: true };
        }
    }

    /// Sort the sparse index array ascending. A no-op in DENSE
    /// representation. The sorting algorithm chosen internally is an
    /// optimization, not a behavioral contract; this always uses a stable
    /// sort of the paired (index, value) arrays.
    pub fn sort_elements(&mut self) {
        if let Repr::Sparse { values, indices, sorted } = &mut self.repr {
            if *sorted {
                return;
            }
            let mut pairs: Vec<(I, f64)> =
                indices.iter().copied().zip(values.iter().copied()).collect();
            pairs.sort_by_key(|&(i, _)| i);
            for (slot_i, slot_v, (i, v)) in
                itertools_zip3(indices.iter_mut(), values.iter_mut(), pairs.into_iter())
            {
                *slot_i = i;
                *slot_v = v;
            }
            *sorted = true;
        }
    }

    /// Iterate over every nonzero `(index, value)` pair exactly once.
    pub fn iter_nonzero(&self) -> Box<dyn Iterator<Item = (I, f64)> + '_> {
        match &self.repr {
            Repr::Dense(data) => {
                Box::new(data.iter().enumerate().filter(|&(_, &x)| x != 0.0).map(|(i, &x)| (i, x)))
            }
            Repr::Sparse { values, indices, .. } => {
                Box::new(indices.iter().copied().zip(values.iter().copied()))
            }
        }
    }

    /// Dot product with `other`, dispatching on the representation of each
    /// side. Accumulates positive and negative partial sums separately and
    /// combines them with one final [`stable_add`], matching the
    /// dense/sparse dual-accumulator convention of the reference
    /// compensated dot-product primitives.
    pub fn dot_product(&self, other: &HybridVector, tol: &Tolerances) -> f64 {
        debug_assert_eq!(self.dim, other.dim);
        let mut positive = 0.0;
        let mut negative = 0.0;
        match (&self.repr, &other.repr) {
            (Repr::Dense(a), Repr::Dense(b)) => {
                for (&x, &y) in a.iter().zip(b.iter()) {
                    accumulate(&mut positive, &mut negative, x * y);
                }
            }
            (Repr::Dense(a), Repr::Sparse { values, indices, .. }) => {
                for (&i, &v) in indices.iter().zip(values.iter()) {
                    accumulate(&mut positive, &mut negative, a[i] * v);
                }
            }
            (Repr::Sparse { values, indices, .. }, Repr::Dense(b)) => {
                for (&i, &v) in indices.iter().zip(values.iter()) {
                    accumulate(&mut positive, &mut negative, v * b[i]);
                }
            }
            (
                Repr::Sparse { values: av, indices: ai, sorted: a_sorted },
                Repr::Sparse { values: bv, indices: bi, sorted: b_sorted },
            ) => {
                if *a_sorted && *b_sorted {
                    let (mut p, mut q) = (0usize, 0usize);
                    while p < ai.len() && q < bi.len() {
                        if ai[p] == bi[q] {
                            accumulate(&mut positive, &mut negative, av[p] * bv[q]);
                            p += 1;
                            q += 1;
                        } else if ai[p] < bi[q] {
                            p += 1;
                        } else {
                            q += 1;
                        }
                    }
                } else {
                    // Scatter the shorter side, scan the longer one.
                    let (short_i, short_v, long_i, long_v) = if ai.len() <= bi.len() {
                        (ai, av, bi, bv)
                    } else {
                        (bi, bv, ai, av)
                    };
                    let mut scratch = vec![0.0; self.dim];
                    for (&i, &v) in short_i.iter().zip(short_v.iter()) {
                        scratch[i] = v;
                    }
                    for (&i, &v) in long_i.iter().zip(long_v.iter()) {
                        let other_v = scratch[i];
                        if other_v != 0.0 {
                            accumulate(&mut positive, &mut negative, v * other_v);
                        }
                    }
                    for &i in short_i.iter() {
                        scratch[i] = 0.0;
                    }
                }
            }
        }
        stable_add(positive, negative, tol.e_relative, tol.e_absolute)
    }

    /// `self <- self + lambda * w`, each nonzero contribution funneled
    /// through [`stable_add_abs`].
    pub fn add_vector(&mut self, lambda: f64, w: &HybridVector, tol: &Tolerances) {
        debug_assert_eq!(self.dim, w.dim);
        if lambda == 0.0 {
            return;
        }
        for (i, wv) in w.iter_nonzero().collect::<Vec<_>>() {
            let updated = stable_add_abs(self.at(i), lambda * wv, tol.e_absolute);
            self.set(i, updated);
        }
    }

    /// `self <- self + alpha * eta`, where `alpha = self[p]`, then
    /// `self[p] <- alpha * eta[p]`. This is the pivot-row-collapsing update
    /// an ETM applies during FTRAN.
    pub fn elementary_ftran(&mut self, eta: &HybridVector, p: I, tol: &Tolerances) {
        let alpha = self.at(p);
        if alpha == 0.0 {
            return;
        }
        for (i, eta_i) in eta.iter_nonzero().collect::<Vec<_>>() {
            if i == p {
                continue;
            }
            let updated = stable_add_abs(self.at(i), alpha * eta_i, tol.e_absolute);
            self.set(i, updated);
        }
        self.set(p, alpha * eta.at(p));
    }
}

#[inline]
fn accumulate(positive: &mut f64, negative: &mut f64, product: f64) {
    if product >= 0.0 {
        *positive += product;
    } else {
        *negative += product;
    }
}

/// Minimal local zip3 so `sort_elements` doesn't need an extra dependency
/// just for one call site.
fn itertools_zip3<A, B, C>(
    a: A,
    b: B,
    c: C,
) -> impl Iterator<Item = (A::Item, B::Item, C::Item)>
where
    A: Iterator,
    B: Iterator,
    C: Iterator,
{
    a.zip(b).zip(c).map(|((x, y), z)| (x, y, z))
}

/// A reusable scratch buffer for scatter/gather operations that would
/// otherwise need a full-length temporary on every call. Owned by one
/// engine instance (never a process global, per the engine's no-global-
/// mutable-state design), borrowed for the duration of one operation, and
/// guaranteed zero-on-return by clearing only the indices it touched.
#[derive(Debug, Default)]
pub struct Scratch {
    buffer: Vec<f64>,
    touched: Vec<I>,
}

impl Scratch {
    pub fn new(len: I) -> Self {
        Scratch { buffer: vec![0.0; len], touched: Vec::new() }
    }

    fn ensure_len(&mut self, len: I) {
        if self.buffer.len() < len {
            self.buffer.resize(len, 0.0);
        }
    }

    /// Scatter `v`'s nonzeros into the buffer, recording which indices were
    /// touched so [`Scratch::clear`] can zero exactly those back out.
    pub fn scatter(&mut self, v: &HybridVector) {
        self.ensure_len(v.length());
        for (i, x) in v.iter_nonzero() {
            self.buffer[i] = x;
            self.touched.push(i);
        }
    }

    pub fn get(&self, i: I) -> f64 {
        self.buffer.get(i).copied().unwrap_or(0.0)
    }

    /// Zero every touched index and drop the touched list. Must be called
    /// before the buffer is reused for another operation.
    pub fn clear(&mut self) {
        for &i in &self.touched {
            self.buffer[i] = 0.0;
        }
        self.touched.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tol() -> Tolerances {
        Tolerances::default()
    }

    #[test]
    fn set_and_at_round_trip_in_dense_mode() {
        let mut v = HybridVector::zeros(5, 0.0); // ratio 0 forces DENSE always
        v.set(2, 3.5);
        assert_eq!(v.at(2), 3.5);
        assert_eq!(v.nonzeros(), 1);
        assert!(v.is_dense());
    }

    #[test]
    fn representation_switches_both_ways() {
        // dim 10, ratio 0.5 => threshold 5
        let mut v = HybridVector::zeros(10, 0.5);
        assert!(!v.is_dense());
        for i in 0..5 {
            v.set(i, (i + 1) as f64);
        }
        assert!(v.is_dense(), "nnz >= threshold must promote to dense");
        for i in 0..5 {
            assert_eq!(v.at(i), (i + 1) as f64);
        }
        for i in 0..4 {
            v.set(i, 0.0);
        }
        assert!(!v.is_dense(), "nnz < threshold must demote to sparse");
        assert_eq!(v.at(4), 5.0);
    }

    #[test]
    fn dot_product_agrees_across_representations() {
        let dense = HybridVector::from_dense(&[1.0, 0.0, 3.0, 0.0, 5.0], 0.0);
        let sparse = HybridVector::from_dense(&[1.0, 0.0, 3.0, 0.0, 5.0], 1.0);
        assert!(!sparse.is_dense());
        let other = HybridVector::from_dense(&[2.0, 2.0, 2.0, 2.0, 2.0], 0.0);
        let d1 = dense.dot_product(&other, &tol());
        let d2 = sparse.dot_product(&other, &tol());
        assert_eq!(d1, d2);
        assert_eq!(d1, 18.0);
    }

    #[test]
    fn add_vector_updates_every_shared_nonzero() {
        let mut a = HybridVector::from_dense(&[1.0, 2.0, 0.0], 0.0);
        let b = HybridVector::from_dense(&[0.0, 1.0, 4.0], 0.0);
        a.add_vector(2.0, &b, &tol());
        assert_eq!(a.at(0), 1.0);
        assert_eq!(a.at(1), 4.0);
        assert_eq!(a.at(2), 8.0);
    }

    #[test]
    fn scale_by_zero_yields_empty_sparse() {
        let mut v = HybridVector::from_dense(&[1.0, 2.0, 3.0], 0.0);
        v.scale_by(0.0);
        assert!(!v.is_dense());
        assert_eq!(v.nonzeros(), 0);
        for i in 0..3 {
            assert_eq!(v.at(i), 0.0);
        }
    }

    #[test]
    fn insert_and_remove_preserve_other_indices() {
        let mut v = HybridVector::from_dense(&[10.0, 20.0, 30.0], 0.0);
        v.insert(1, 99.0);
        assert_eq!(v.length(), 4);
        assert_eq!(v.at(0), 10.0);
        assert_eq!(v.at(1), 99.0);
        assert_eq!(v.at(2), 20.0);
        assert_eq!(v.at(3), 30.0);
        v.remove(1);
        assert_eq!(v.length(), 3);
        assert_eq!(v.at(0), 10.0);
        assert_eq!(v.at(1), 20.0);
        assert_eq!(v.at(2), 30.0);
    }

    #[test]
    fn elementary_ftran_collapses_pivot_row() {
        let mut v = HybridVector::from_dense(&[2.0, 4.0, 6.0], 0.0);
        let eta = HybridVector::from_dense(&[0.5, 1.0, -2.0], 0.0);
        v.elementary_ftran(&eta, 1, &tol());
        // alpha = v[1] = 4.0
        // v[0] += 4.0 * 0.5 = 2.0 -> 4.0
        // v[2] += 4.0 * -2.0 = -8.0 -> -2.0
        // v[1] = 4.0 * eta[1] = 4.0
        assert_eq!(v.at(0), 4.0);
        assert_eq!(v.at(1), 4.0);
        assert_eq!(v.at(2), -2.0);
    }

    #[test]
    fn scratch_clears_only_touched_indices() {
        let mut scratch = Scratch::new(5);
        let v = HybridVector::from_dense(&[0.0, 3.0, 0.0, 7.0, 0.0], 1.0);
        scratch.scatter(&v);
        assert_eq!(scratch.get(1), 3.0);
        assert_eq!(scratch.get(3), 7.0);
        scratch.clear();
        assert_eq!(scratch.get(1), 0.0);
        assert_eq!(scratch.get(3), 0.0);
    }
}
