//! Product Form of the Inverse: a factored `B^-1` as an ordered list of
//! elementary transformation matrices (ETMs), with block-triangular
//! reordering of the non-triangular remainder during reinversion.
//!
//! Grounded on `original_source/src/simplex/pfibasis.cpp`'s four-pass
//! structure (R / C / M / C-flush) and `include/simplex/basis.h`.

use crate::I;
use crate::error::SimplexError;
use crate::model::ComputationalModel;
use crate::partition::IndexPartitionedList;
use crate::tolerance::Tolerances;
use crate::vector::HybridVector;

/// An elementary transformation matrix: logically `I + (eta - e_p) e_p^T`
/// once the unit column at `pivot` is removed.
#[derive(Debug, Clone)]
pub struct Etm {
    pub eta: HybridVector,
    pub pivot: I,
}

impl Etm {
    /// Build the ETM that pivots `alpha` (an already-FTRAN'd column) into
    /// row `pivot_row`: `eta[p] = 1/alpha[p]`, `eta[i] = -alpha[i]/alpha[p]`.
    fn from_pivot_column(
        alpha: &HybridVector,
        pivot_row: I,
        sparsity_ratio: f64,
        tol: &Tolerances,
    ) -> Result<Etm, SimplexError> {
        let ap = alpha.at(pivot_row);
        if ap.abs() <= tol.e_pivot {
            return Err(SimplexError::NumericalFailure { row: pivot_row, pivot: ap });
        }
        let mut eta = HybridVector::zeros(alpha.length(), sparsity_ratio);
        for (i, a_i) in alpha.iter_nonzero().collect::<Vec<_>>() {
            if i != pivot_row {
                eta.set(i, -a_i / ap);
            }
        }
        eta.set(pivot_row, 1.0 / ap);
        Ok(Etm { eta, pivot: pivot_row })
    }
}

/// Strategy used to pivot the non-triangular remainder (the "bump") left
/// after the R and C passes saturate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NontriangularMethod {
    Search,
    BlockTriangular,
    BlockOrderedTriangular,
}

/// Whether the bump pivot search applies the relative-pivot stability
/// check at all (`THRESHOLD`) or accepts the first live candidate
/// unconditionally (`NONE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NontriangularPivotRule {
    None,
    Threshold,
}

/// Product-Form-of-the-Inverse basis factorization.
#[derive(Debug, Clone)]
pub struct Pfi {
    head: Vec<I>,
    frozen: Vec<Etm>,
    updates: Vec<Etm>,
    singularity_count: usize,
    nontriangular_method: NontriangularMethod,
    pivot_rule: NontriangularPivotRule,
    sparsity_ratio: f64,
}

impl Pfi {
    pub fn new(
        nontriangular_method: NontriangularMethod,
        pivot_rule: NontriangularPivotRule,
        sparsity_ratio: f64,
    ) -> Self {
        Pfi {
            head: Vec::new(),
            frozen: Vec::new(),
            updates: Vec::new(),
            singularity_count: 0,
            nontriangular_method,
            pivot_rule,
            sparsity_ratio,
        }
    }

    fn ftran_through(list: &[Etm], v: &mut HybridVector, tol: &Tolerances) {
        for etm in list {
            v.elementary_ftran(&etm.eta, etm.pivot, tol);
        }
    }

    fn btran_through(list: &[Etm], v: &mut HybridVector, tol: &Tolerances) {
        for etm in list.iter().rev() {
            let d = v.dot_product(&etm.eta, tol);
            v.set(etm.pivot, d);
        }
    }
}

impl super::Basis for Pfi {
    fn invert(
        &mut self,
        model: &ComputationalModel,
        head: &[I],
        tol: &Tolerances,
    ) -> Result<(), SimplexError> {
        let m = head.len();
        self.frozen.clear();
        self.updates.clear();
        self.singularity_count = 0;

        let col_var = head.to_vec();
        let mut row_active = vec![true; m];
        let mut col_active = vec![true; m];
        let mut new_head: Vec<Option<I>> = vec![None; m];

        // Row/column live-degree bucket partitions: 0 -> dead (count 0),
        // 1 -> singleton (count 1), 2 -> everything else.
        let mut row_deg = vec![0usize; m];
        let mut col_deg = vec![0usize; m];
        let mut row_buckets: IndexPartitionedList<()> = IndexPartitionedList::new(m, 3);
        let mut col_buckets: IndexPartitionedList<()> = IndexPartitionedList::new(m, 3);

        // Column position -> (row, value) pattern, built once from the raw
        // matrix (R/C passes never need to re-read it under elimination,
        // since a genuinely triangular pivot introduces no fill).
        let col_pattern: Vec<Vec<(I, f64)>> = col_var
            .iter()
            .map(|&v| model.matrix.column(v).iter_nonzero().collect::<Vec<_>>())
            .collect();
        // Row -> list of (column position, value), filtered to live columns
        // at query time.
        let mut row_pattern: Vec<Vec<(I, f64)>> = vec![Vec::new(); m];
        for (k, pattern) in col_pattern.iter().enumerate() {
            for &(r, v) in pattern {
                row_pattern[r].push((k, v));
            }
        }

        for i in 0..m {
            row_deg[i] = row_pattern[i].len();
            row_buckets.move_to(i, bucket(row_deg[i]));
        }
        for k in 0..m {
            col_deg[k] = col_pattern[k].len();
            col_buckets.move_to(k, bucket(col_deg[k]));
        }

        // --- R pass: singleton rows. ---
        loop {
            let candidate = row_buckets.iter_partition(1).find(|&i| row_active[i]);
            let Some(i) = candidate else { break };
            let Some(&(k, _)) = row_pattern[i].iter().find(|&&(k, _)| col_active[k]) else {
                // Degree bookkeeping says 1 but nothing live; treat as dead.
                row_buckets.move_to(i, bucket(0));
                continue;
            };
            let var = col_var[k];
            let column = model.matrix.column(var).clone();
            self.frozen.push(Etm::from_pivot_column(&column, i, self.sparsity_ratio, tol)?);
            new_head[i] = Some(var);
            deactivate_row(&mut row_active, &row_pattern, &col_active, &mut col_deg, &mut col_buckets, i);
            deactivate_col(&mut col_active, &col_pattern, &row_active, &mut row_deg, &mut row_buckets, k);
        }

        // --- C pass: singleton columns (deferred). ---
        let mut deferred: Vec<(I, I)> = Vec::new(); // (row, column position)
        loop {
            let candidate = col_buckets.iter_partition(1).find(|&k| col_active[k]);
            let Some(k) = candidate else { break };
            let Some(&(i, _)) = col_pattern[k].iter().find(|&&(r, _)| row_active[r]) else {
                col_buckets.move_to(k, bucket(0));
                continue;
            };
            new_head[i] = Some(col_var[k]);
            deferred.push((i, k));
            deactivate_row(&mut row_active, &row_pattern, &col_active, &mut col_deg, &mut col_buckets, i);
            deactivate_col(&mut col_active, &col_pattern, &row_active, &mut row_deg, &mut row_buckets, k);
        }

        // --- M pass: the non-triangular bump. ---
        let bump_rows: Vec<I> = (0..m).filter(|&i| row_active[i]).collect();
        let bump_cols: Vec<I> = (0..m).filter(|&k| col_active[k]).collect();
        if !bump_rows.is_empty() {
            self.pivot_bump(
                model,
                &bump_rows,
                &bump_cols,
                &col_var,
                &mut row_active,
                &mut col_active,
                &mut new_head,
                tol,
            )?;
        }

        // --- C-pass flush: apply deferred pivots in reverse recording order. ---
        for &(i, k) in deferred.iter().rev() {
            let var = col_var[k];
            let column = model.matrix.column(var).clone();
            self.frozen.push(Etm::from_pivot_column(&column, i, self.sparsity_ratio, tol)?);
        }

        // Any row left unassigned is filled with its logical variable.
        let n_structural = model.n_structural;
        for i in 0..m {
            if new_head[i].is_none() {
                let logical = n_structural + i;
                new_head[i] = Some(logical);
                let column = model.matrix.column(logical).clone();
                self.frozen.push(Etm::from_pivot_column(&column, i, self.sparsity_ratio, tol)?);
                self.singularity_count += 1;
            }
        }

        self.head = new_head.into_iter().map(|v| v.expect("every row assigned")).collect();
        Ok(())
    }

    fn append(
        &mut self,
        alpha: &HybridVector,
        pivot_row: I,
        entering: I,
        tol: &Tolerances,
    ) -> Result<(), SimplexError> {
        let etm = Etm::from_pivot_column(alpha, pivot_row, self.sparsity_ratio, tol)?;
        self.updates.push(etm);
        self.head[pivot_row] = entering;
        Ok(())
    }

    fn ftran(&self, v: &mut HybridVector, tol: &Tolerances) {
        Self::ftran_through(&self.frozen, v, tol);
        Self::ftran_through(&self.updates, v, tol);
    }

    fn btran(&self, v: &mut HybridVector, tol: &Tolerances) {
        Self::btran_through(&self.updates, v, tol);
        Self::btran_through(&self.frozen, v, tol);
    }

    fn is_fresh(&self) -> bool {
        self.updates.is_empty()
    }

    fn singularity_count(&self) -> usize {
        self.singularity_count
    }

    fn head(&self) -> &[I] {
        &self.head
    }

    fn update_count(&self) -> usize {
        self.updates.len()
    }
}

fn bucket(degree: usize) -> usize {
    degree.min(2)
}

fn deactivate_row(
    row_active: &mut [bool],
    row_pattern: &[Vec<(I, f64)>],
    col_active: &[bool],
    col_deg: &mut [usize],
    col_buckets: &mut IndexPartitionedList<()>,
    i: I,
) {
    row_active[i] = false;
    for &(k, _) in &row_pattern[i] {
        if col_active[k] && col_deg[k] > 0 {
            col_deg[k] -= 1;
            col_buckets.move_to(k, bucket(col_deg[k]));
        }
    }
}

fn deactivate_col(
    col_active: &mut [bool],
    col_pattern: &[Vec<(I, f64)>],
    row_active: &[bool],
    row_deg: &mut [usize],
    row_buckets: &mut IndexPartitionedList<()>,
    k: I,
) {
    col_active[k] = false;
    for &(r, _) in &col_pattern[k] {
        if row_active[r] && row_deg[r] > 0 {
            row_deg[r] -= 1;
            row_buckets.move_to(r, bucket(row_deg[r]));
        }
    }
}

impl Pfi {
    /// Pivot the non-triangular remainder. `bump_rows`/`bump_cols` are the
    /// row indices and column positions left live after the R/C passes.
    #[allow(clippy::too_many_arguments)]
    fn pivot_bump(
        &mut self,
        model: &ComputationalModel,
        bump_rows: &[I],
        bump_cols: &[I],
        col_var: &[I],
        row_active: &mut [bool],
        col_active: &mut [bool],
        new_head: &mut [Option<I>],
        tol: &Tolerances,
    ) -> Result<(), SimplexError> {
        match self.nontriangular_method {
            NontriangularMethod::Search => {
                self.pivot_bump_search(model, bump_rows, col_var, row_active, col_active, new_head, tol)
            }
            NontriangularMethod::BlockTriangular | NontriangularMethod::BlockOrderedTriangular => {
                let ordered = block_triangular_order(
                    model,
                    bump_rows,
                    bump_cols,
                    col_var,
                    self.nontriangular_method == NontriangularMethod::BlockOrderedTriangular,
                );
                self.pivot_bump_ordered(model, &ordered, col_var, row_active, col_active, new_head, tol)
            }
        }
    }

    /// SEARCH strategy: scan live rows in order; for each, take the first
    /// live column and check numerical stability against the column's
    /// maximum absolute (live-row) element.
    fn pivot_bump_search(
        &mut self,
        model: &ComputationalModel,
        bump_rows: &[I],
        col_var: &[I],
        row_active: &mut [bool],
        col_active: &mut [bool],
        new_head: &mut [Option<I>],
        tol: &Tolerances,
    ) -> Result<(), SimplexError> {
        let mut working: Vec<Option<HybridVector>> = vec![None; col_var.len()];
        for &i in bump_rows {
            if !row_active[i] {
                continue;
            }
            let mut chosen: Option<(I, f64)> = None;
            for k in 0..col_var.len() {
                if !col_active[k] {
                    continue;
                }
                let column = working[k].get_or_insert_with(|| model.matrix.column(col_var[k]).clone());
                let val = column.at(i);
                if val == 0.0 {
                    continue;
                }
                if self.pivot_rule == NontriangularPivotRule::Threshold {
                    let max_abs = column
                        .iter_nonzero()
                        .filter(|&(r, _)| row_active[r])
                        .map(|(_, v)| v.abs())
                        .fold(0.0_f64, f64::max);
                    if max_abs > 0.0 && val.abs() < tol.pivot_threshold * max_abs {
                        continue;
                    }
                }
                chosen = Some((k, val));
                break;
            }
            let Some((k, _)) = chosen else {
                // No stable candidate this row; leave unassigned for the
                // logical-variable fallback in `invert`.
                continue;
            };
            let column = working[k].take().unwrap();
            let etm = Etm::from_pivot_column(&column, i, self.sparsity_ratio, tol)?;
            for (k2, slot) in working.iter_mut().enumerate() {
                if k2 != k && col_active[k2] {
                    if let Some(c) = slot {
                        c.elementary_ftran(&etm.eta, i, tol);
                    }
                }
            }
            self.frozen.push(etm);
            new_head[i] = Some(col_var[k]);
            row_active[i] = false;
            col_active[k] = false;
        }
        Ok(())
    }

    /// Pivot bump rows in the order given (block-triangular / Markowitz
    /// ordering already resolved), with lazy FTRAN column updates.
    fn pivot_bump_ordered(
        &mut self,
        model: &ComputationalModel,
        order: &[(I, I)],
        col_var: &[I],
        row_active: &mut [bool],
        col_active: &mut [bool],
        new_head: &mut [Option<I>],
        tol: &Tolerances,
    ) -> Result<(), SimplexError> {
        let mut working: Vec<Option<HybridVector>> = vec![None; col_var.len()];
        for &(i, k) in order {
            if !row_active[i] || !col_active[k] {
                continue;
            }
            let column = working[k].take().unwrap_or_else(|| model.matrix.column(col_var[k]).clone());
            let val = column.at(i);
            if val.abs() <= tol.e_pivot {
                continue;
            }
            let etm = Etm::from_pivot_column(&column, i, self.sparsity_ratio, tol)?;
            for (k2, slot) in working.iter_mut().enumerate() {
                if k2 != k && col_active[k2] {
                    let c = slot.get_or_insert_with(|| model.matrix.column(col_var[k2]).clone());
                    c.elementary_ftran(&etm.eta, i, tol);
                }
            }
            self.frozen.push(etm);
            new_head[i] = Some(col_var[k]);
            row_active[i] = false;
            col_active[k] = false;
        }
        Ok(())
    }
}

/// Build a square bump matrix, find a zero-free transversal, partition it
/// into strongly connected components (Tarjan), and return a pivot order
/// `(row, column position)` with SCCs appearing contiguously. When
/// `markowitz_tiebreak` is set, pivots within one SCC are additionally
/// ordered by ascending column nonzero count.
fn block_triangular_order(
    model: &ComputationalModel,
    bump_rows: &[I],
    bump_cols: &[I],
    col_var: &[I],
    markowitz_tiebreak: bool,
) -> Vec<(I, I)> {
    let n = bump_rows.len();
    if n == 0 {
        return Vec::new();
    }
    let row_pos: std::collections::HashMap<I, usize> =
        bump_rows.iter().enumerate().map(|(p, &r)| (r, p)).collect();

    // Dense-ish adjacency restricted to the bump, since the bump is
    // expected to be small relative to m.
    let mut entries: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n]; // by row-position
    for (cp, &k) in bump_cols.iter().enumerate() {
        for (r, v) in model.matrix.column(col_var[k]).iter_nonzero() {
            if let Some(&rp) = row_pos.get(&r) {
                entries[rp].push((cp, v));
            }
        }
    }

    // Find a zero-free transversal (perfect matching row -> column) via
    // augmenting-path search, matching the spec's "row-swaps + recursive
    // column search" description.
    let mut match_row_to_col = vec![usize::MAX; n];
    let mut match_col_to_row = vec![usize::MAX; n];
    for r in 0..n {
        let mut visited = vec![false; n];
        try_augment(r, &entries, &mut match_row_to_col, &mut match_col_to_row, &mut visited);
    }

    // Build directed adjacency among matched rows via off-diagonal nonzero
    // entries (row r depends on row r' if column matched to r has a
    // nonzero in row r's position other than its own match), then find
    // SCCs with Tarjan's algorithm.
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
    for r in 0..n {
        for &(cp, _) in &entries[r] {
            let other_row = match_col_to_row[cp];
            if other_row != usize::MAX && other_row != r {
                adj[r].push(other_row);
            }
        }
    }
    let sccs = tarjan_scc(&adj);

    let mut order = Vec::with_capacity(n);
    for scc in sccs {
        let mut scc = scc;
        if markowitz_tiebreak {
            scc.sort_by_key(|&r| {
                let cp = match_row_to_col[r];
                if cp == usize::MAX { usize::MAX } else { entries.iter().filter(|e| e.iter().any(|&(c, _)| c == cp)).count() }
            });
        }
        for r in scc {
            let cp = match_row_to_col[r];
            if cp != usize::MAX {
                order.push((bump_rows[r], bump_cols[cp]));
            } else {
                // Unmatched row in a singular bump: try any column that
                // still has a nonzero; the caller's stability check (in
                // `pivot_bump_ordered`) will reject it if unusable.
                if let Some(&(cp, _)) = entries[r].first() {
                    order.push((bump_rows[r], bump_cols[cp]));
                }
            }
        }
    }
    order
}

fn try_augment(
    r: usize,
    entries: &[Vec<(usize, f64)>],
    match_row_to_col: &mut [usize],
    match_col_to_row: &mut [usize],
    visited: &mut [bool],
) -> bool {
    for &(c, val) in &entries[r] {
        if val == 0.0 || visited[c] {
            continue;
        }
        visited[c] = true;
        if match_col_to_row[c] == usize::MAX
            || try_augment(match_col_to_row[c], entries, match_row_to_col, match_col_to_row, visited)
        {
            match_row_to_col[r] = c;
            match_col_to_row[c] = r;
            return true;
        }
    }
    false
}

/// Tarjan's strongly-connected-components algorithm, returning SCCs in
/// reverse topological order (the order the induced pivot sequence needs).
fn tarjan_scc(adj: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = adj.len();
    let mut index = vec![usize::MAX; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack = Vec::new();
    let mut next_index = 0usize;
    let mut sccs = Vec::new();

    struct Frame {
        v: usize,
        child_iter: usize,
    }

    for start in 0..n {
        if index[start] != usize::MAX {
            continue;
        }
        let mut call_stack = vec![Frame { v: start, child_iter: 0 }];
        index[start] = next_index;
        lowlink[start] = next_index;
        next_index += 1;
        stack.push(start);
        on_stack[start] = true;

        while let Some(frame) = call_stack.last_mut() {
            let v = frame.v;
            if frame.child_iter < adj[v].len() {
                let w = adj[v][frame.child_iter];
                frame.child_iter += 1;
                if index[w] == usize::MAX {
                    index[w] = next_index;
                    lowlink[w] = next_index;
                    next_index += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    call_stack.push(Frame { v: w, child_iter: 0 });
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index[w]);
                }
            } else {
                call_stack.pop();
                if let Some(parent) = call_stack.last() {
                    lowlink[parent.v] = lowlink[parent.v].min(lowlink[v]);
                }
                if lowlink[v] == index[v] {
                    let mut scc = Vec::new();
                    loop {
                        let w = stack.pop().unwrap();
                        on_stack[w] = false;
                        scc.push(w);
                        if w == v {
                            break;
                        }
                    }
                    sccs.push(scc);
                }
            }
        }
    }
    sccs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::Basis;
    use crate::model::{ConstraintShape, ModelBuilder, ObjectiveSense};

    fn tol() -> Tolerances {
        Tolerances::default()
    }

    fn identity_model(n: I) -> ComputationalModel {
        let mut b = ModelBuilder::new().objective_sense(ObjectiveSense::Minimize);
        let xs: Vec<I> = (0..n).map(|i| b.structural_var(format!("x{i}"), 0.0, 0.0, f64::INFINITY)).collect();
        for (i, &x) in xs.iter().enumerate() {
            b.constraint(format!("c{i}"), ConstraintShape::Eq, vec![(x, 1.0)], 0.0, (i + 1) as f64);
        }
        b.build()
    }

    #[test]
    fn invert_identity_basis_has_no_singularities() {
        let model = identity_model(3);
        // Basic variables: the logical (slack) columns, which are already
        // the identity -- purely an R-pass triangular basis.
        let head: Vec<I> = (3..6).collect();
        let mut pfi = Pfi::new(NontriangularMethod::Search, NontriangularPivotRule::Threshold, 0.3);
        pfi.invert(&model, &head, &tol()).unwrap();
        assert_eq!(pfi.singularity_count(), 0);
        assert!(pfi.is_fresh());
    }

    #[test]
    fn ftran_btran_round_trip_after_invert() {
        let model = identity_model(3);
        let head: Vec<I> = (3..6).collect();
        let mut pfi = Pfi::new(NontriangularMethod::Search, NontriangularPivotRule::Threshold, 0.3);
        pfi.invert(&model, &head, &tol()).unwrap();

        let v = HybridVector::from_dense(&[2.0, -1.0, 5.0], 0.0);
        let mut w = v.clone();
        pfi.ftran(&mut w, &tol());
        pfi.btran(&mut w, &tol());
        for i in 0..3 {
            assert!((w.at(i) - v.at(i)).abs() < 1e-9);
        }
    }

    #[test]
    fn append_updates_head_and_is_not_fresh() {
        let model = identity_model(2);
        let head: Vec<I> = vec![2, 3];
        let mut pfi = Pfi::new(NontriangularMethod::Search, NontriangularPivotRule::Threshold, 0.3);
        pfi.invert(&model, &head, &tol()).unwrap();
        let alpha = HybridVector::from_dense(&[1.0, 0.0], 0.0);
        pfi.append(&alpha, 0, 0, &tol()).unwrap();
        assert_eq!(pfi.head()[0], 0);
        assert!(!pfi.is_fresh());
        assert_eq!(pfi.update_count(), 1);
    }
}
