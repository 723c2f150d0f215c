//! Ratio test: shared breakpoint machinery, the dual ratio test (phase I
//! and II, with BFRT bound flips), the primal ratio test, and the EXPAND
//! working-tolerance scheme.
//!
//! Grounded on `original_source/src/simplex/dualratiotest.cpp` (the
//! breakpoint-heap traversal, the BFRT flip-before-step discipline) and
//! spec §4.H.1-§4.H.5.

use crate::I;
use crate::simplex::VariableState;

/// One blocking candidate: `value = |d_j / alpha_j|`, the step length at
/// which column/row `index` first becomes blocking. `slope_delta` is the
/// per-column contribution to the piecewise-linear walk's residual slope
/// (`|alpha_j|`), used to decide when the walk may stop.
#[derive(Debug, Clone, Copy)]
pub struct Breakpoint {
    pub index: I,
    pub value: f64,
    pub function_value: f64,
    pub slope_delta: f64,
}

/// A binary-heap-sorted prefix over breakpoints: `get_next_element`
/// extracts the minimum by value via one sift-down, shrinking the live
/// prefix by one, so the traversal never needs a full pre-sort.
#[derive(Debug, Clone, Default)]
pub struct BreakpointHeap {
    items: Vec<Breakpoint>,
}

impl BreakpointHeap {
    pub fn new() -> Self {
        BreakpointHeap { items: Vec::new() }
    }

    pub fn push(&mut self, bp: Breakpoint) {
        self.items.push(bp);
        let mut i = self.items.len() - 1;
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.items[parent].value <= self.items[i].value {
                break;
            }
            self.items.swap(parent, i);
            i = parent;
        }
    }

    fn sift_down(&mut self, mut i: I, live: I) {
        loop {
            let l = 2 * i + 1;
            let r = 2 * i + 2;
            let mut smallest = i;
            if l < live && self.items[l].value < self.items[smallest].value {
                smallest = l;
            }
            if r < live && self.items[r].value < self.items[smallest].value {
                smallest = r;
            }
            if smallest == i {
                break;
            }
            self.items.swap(i, smallest);
            i = smallest;
        }
    }

    /// Extract the minimum-value breakpoint, shrinking the live prefix.
    pub fn get_next_element(&mut self) -> Option<Breakpoint> {
        if self.items.is_empty() {
            return None;
        }
        let last = self.items.len() - 1;
        self.items.swap(0, last);
        let result = self.items.pop();
        if !self.items.is_empty() {
            self.sift_down(0, self.items.len());
        }
        result
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> I {
        self.items.len()
    }
}

/// The three ratio-test selection modes, shared by the primal and dual
/// variants (spec §4.H.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    #[default]
    Dantzig,
    Piecewise,
    PiecewiseGuarded,
}

/// EXPAND anti-cycling: a working tolerance that ramps from a small
/// starting value toward the master tolerance, resetting once reached.
/// Ratio tests block against `working_tolerance()`; feasibility checks
/// always use the master tolerance.
#[derive(Debug, Clone)]
pub struct ExpandTolerance {
    tau_m: f64,
    tau_w: f64,
    multiplier: f64,
    divider: f64,
    enabled: bool,
}

impl ExpandTolerance {
    pub fn new(tau_m: f64, multiplier: f64, divider: f64, enabled: bool) -> Self {
        let tau_w = if enabled { tau_m / divider } else { tau_m };
        ExpandTolerance { tau_m, tau_w, multiplier, divider, enabled }
    }

    pub fn working_tolerance(&self) -> f64 {
        self.tau_w
    }

    /// Advance the ramp by one iteration; called once per control-loop
    /// iteration (spec §4.J step 3.a).
    pub fn advance(&mut self) {
        if !self.enabled {
            return;
        }
        self.tau_w *= self.multiplier;
        if self.tau_w >= self.tau_m {
            self.tau_w = self.tau_m / self.divider;
        }
    }
}

/// A recorded bound flip: nonbasic variable `index` switched from its
/// lower to its upper bound, or vice versa, without becoming basic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundFlip {
    pub index: I,
    pub to_upper: bool,
}

/// Result of a dual ratio test: the incoming variable (if any), the dual
/// step, any bound flips to apply to `x_B` before the pivot, and the
/// per-column slope-delta updates used to patch reduced costs.
#[derive(Debug, Clone, Default)]
pub struct DualRatioTestResult {
    pub incoming: Option<I>,
    pub dual_step: f64,
    pub flips: Vec<BoundFlip>,
    pub slope_deltas: Vec<(I, f64)>,
}

/// Walk the breakpoint heap, decrementing `slope` by each breakpoint's
/// `slope_delta` until it is exhausted or the heap drains. Returns the
/// last breakpoint reached and the accumulated function-value delta.
/// Exactly spec §4.H.2 mode 2.
fn piecewise_walk(heap: &mut BreakpointHeap, mut slope: f64) -> (Option<Breakpoint>, f64) {
    let mut last = None;
    let mut accumulated = 0.0;
    let mut prev_value = 0.0;
    while slope > 0.0 {
        match heap.get_next_element() {
            Some(bp) => {
                accumulated += slope * (bp.value - prev_value);
                prev_value = bp.value;
                slope -= bp.slope_delta.abs();
                last = Some(bp);
            }
            None => break,
        }
    }
    (last, accumulated)
}

/// Dual ratio test, phase I: selects the incoming variable given the
/// pivot row `row[j] = <eta_leaving, A_j>` for every nonbasic column `j`,
/// the phase-I reduced costs `d`, and each column's feasibility-side
/// classification via `states`.
///
/// `leaving_sign`: +1 if the leaving basic variable is below its lower
/// bound (M, wants to increase), -1 if above its upper bound (P, wants
/// to decrease).
pub fn dual_ratio_test_phase1(
    row: &[f64],
    d: &[f64],
    states: &[VariableState],
    leaving_sign: f64,
    tau_w: f64,
    mode: SelectionMode,
) -> DualRatioTestResult {
    let mut heap = BreakpointHeap::new();
    for j in 0..row.len() {
        let alpha = leaving_sign * row[j];
        if alpha.abs() <= tau_w {
            continue;
        }
        let eligible = match states[j] {
            VariableState::Basic(_) => false,
            VariableState::NonbasicAtLower => alpha < 0.0,
            VariableState::NonbasicAtUpper => alpha > 0.0,
            VariableState::NonbasicFixed => false,
            VariableState::NonbasicFree => true,
        };
        if !eligible {
            continue;
        }
        heap.push(Breakpoint { index: j, value: (d[j] / alpha).abs(), function_value: 0.0, slope_delta: alpha.abs() });
        if matches!(states[j], VariableState::NonbasicFree) {
            // A free column blocks on either side; spec §4.H.2 duplicates the breakpoint.
            heap.push(Breakpoint { index: j, value: (d[j] / alpha).abs(), function_value: 0.0, slope_delta: alpha.abs() });
        }
    }
    dual_ratio_test_common(&mut heap, d, mode, tau_w)
}

/// Dual ratio test, phase II: as phase I, but restricted to dual-feasible
/// nonbasic columns and with bound-flip (BFRT) support for bounded
/// variables whose partner basic variable would otherwise cross its
/// opposite bound.
pub fn dual_ratio_test_phase2(
    row: &[f64],
    d: &[f64],
    states: &[VariableState],
    bounded: &[bool],
    leaving_sign: f64,
    tau_w: f64,
    mode: SelectionMode,
) -> DualRatioTestResult {
    let mut heap = BreakpointHeap::new();
    let mut flips = Vec::new();
    for j in 0..row.len() {
        let alpha = leaving_sign * row[j];
        if alpha.abs() <= tau_w {
            continue;
        }
        let eligible = match states[j] {
            VariableState::Basic(_) | VariableState::NonbasicFixed => false,
            VariableState::NonbasicAtLower => alpha < 0.0,
            VariableState::NonbasicAtUpper => alpha > 0.0,
            VariableState::NonbasicFree => true,
        };
        if !eligible {
            continue;
        }
        if bounded[j] {
            flips.push(BoundFlip { index: j, to_upper: matches!(states[j], VariableState::NonbasicAtLower) });
        }
        heap.push(Breakpoint { index: j, value: (d[j] / alpha).abs(), function_value: 0.0, slope_delta: alpha.abs() });
    }
    let mut result = dual_ratio_test_common(&mut heap, d, mode, tau_w);
    result.flips = flips;
    result
}

fn dual_ratio_test_common(heap: &mut BreakpointHeap, d: &[f64], mode: SelectionMode, tau_w: f64) -> DualRatioTestResult {
    match mode {
        SelectionMode::Dantzig => {
            let bp = heap.get_next_element();
            DualRatioTestResult {
                incoming: bp.map(|b| b.index),
                dual_step: bp.map_or(0.0, |b| b.value),
                flips: Vec::new(),
                slope_deltas: bp.map_or(Vec::new(), |b| vec![(b.index, b.slope_delta)]),
            }
        }
        SelectionMode::Piecewise | SelectionMode::PiecewiseGuarded => {
            let initial_slope = d.iter().fold(0.0_f64, |acc, &x| acc.max(x.abs()));
            let (last, _) = piecewise_walk(heap, initial_slope);
            let mut result = DualRatioTestResult {
                incoming: last.map(|b| b.index),
                dual_step: last.map_or(0.0, |b| b.value),
                flips: Vec::new(),
                slope_deltas: last.map_or(Vec::new(), |b| vec![(b.index, b.slope_delta)]),
            };
            if mode == SelectionMode::PiecewiseGuarded {
                if let Some(bp) = last {
                    if bp.slope_delta <= tau_w {
                        // Weak pivot: keep walking while the heap still offers candidates.
                        if let Some(next) = heap.get_next_element() {
                            result.incoming = Some(next.index);
                            result.dual_step = next.value;
                            result.slope_deltas.push((next.index, next.slope_delta));
                        }
                    }
                }
            }
            result
        }
    }
}

/// Result of a primal ratio test: the outgoing basis row (if any), the
/// primal step `theta`, and the computed nonbasic state the outgoing
/// variable settles into.
#[derive(Debug, Clone, Copy)]
pub struct PrimalRatioTestResult {
    pub outgoing_row: Option<I>,
    pub theta: f64,
    pub outgoing_state: VariableState,
}

/// Primal ratio test (spec §4.H.4): the dual of §4.H.2, over basis rows.
/// `alpha` is the FTRAN'd entering column; `x_b`/`lower`/`upper` are
/// indexed by basis row.
pub fn primal_ratio_test(
    alpha: &[f64],
    x_b: &[f64],
    lower: &[f64],
    upper: &[f64],
    entering_bound_width: f64,
    tau_w: f64,
    mode: SelectionMode,
) -> PrimalRatioTestResult {
    let mut heap = BreakpointHeap::new();
    for i in 0..alpha.len() {
        let a = alpha[i];
        if a.abs() <= tau_w {
            continue;
        }
        let free_row = !lower[i].is_finite() && !upper[i].is_finite();
        if free_row {
            continue;
        }
        let value = if a > 0.0 { (x_b[i] - lower[i]) / a } else { (x_b[i] - upper[i]) / a };
        heap.push(Breakpoint { index: i, value: value.max(0.0), function_value: 0.0, slope_delta: a.abs() });
    }
    match mode {
        SelectionMode::Dantzig => {
            let bp = heap.get_next_element();
            to_primal_result(bp, alpha, lower, upper)
        }
        SelectionMode::Piecewise | SelectionMode::PiecewiseGuarded => {
            let initial_slope = if entering_bound_width.is_finite() { entering_bound_width } else { f64::MAX };
            let (mut last, _) = piecewise_walk(&mut heap, initial_slope);
            if mode == SelectionMode::PiecewiseGuarded {
                if let Some(bp) = last {
                    if bp.slope_delta <= tau_w {
                        if let Some(next) = heap.get_next_element() {
                            last = Some(next);
                        }
                    }
                }
            }
            to_primal_result(last, alpha, lower, upper)
        }
    }
}

fn to_primal_result(bp: Option<Breakpoint>, alpha: &[f64], lower: &[f64], upper: &[f64]) -> PrimalRatioTestResult {
    match bp {
        None => PrimalRatioTestResult { outgoing_row: None, theta: 0.0, outgoing_state: VariableState::NonbasicFree },
        Some(bp) => {
            let state = if alpha[bp.index] > 0.0 {
                if lower[bp.index].is_finite() {
                    VariableState::NonbasicAtLower
                } else {
                    VariableState::NonbasicFree
                }
            } else if upper[bp.index].is_finite() {
                VariableState::NonbasicAtUpper
            } else {
                VariableState::NonbasicFree
            };
            PrimalRatioTestResult { outgoing_row: Some(bp.index), theta: bp.value, outgoing_state: state }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use macros::value_parameterized_test;

    #[test]
    fn heap_extracts_in_ascending_value_order() {
        let mut heap = BreakpointHeap::new();
        for (i, v) in [3.0, 1.0, 4.0, 1.5, 9.0].into_iter().enumerate() {
            heap.push(Breakpoint { index: i, value: v, function_value: 0.0, slope_delta: 1.0 });
        }
        let mut out = Vec::new();
        while let Some(bp) = heap.get_next_element() {
            out.push(bp.value);
        }
        assert_eq!(out, vec![1.0, 1.5, 3.0, 4.0, 9.0]);
    }

    #[test]
    fn expand_tolerance_ramps_and_resets() {
        let mut tol = ExpandTolerance::new(1e-8, 2.0, 1000.0, true);
        let first = tol.working_tolerance();
        assert!(first < 1e-8);
        for _ in 0..64 {
            tol.advance();
        }
        assert!(tol.working_tolerance() < 1e-8);
    }

    #[test]
    fn expand_tolerance_disabled_uses_master_tolerance() {
        let tol = ExpandTolerance::new(1e-8, 2.0, 1000.0, false);
        assert_eq!(tol.working_tolerance(), 1e-8);
    }

    #[test]
    fn primal_ratio_test_picks_tightest_lower_bound_block() {
        let alpha = vec![1.0, 2.0];
        let x_b = vec![5.0, 5.0];
        let lower = vec![0.0, 0.0];
        let upper = vec![f64::INFINITY, f64::INFINITY];
        let result = primal_ratio_test(&alpha, &x_b, &lower, &upper, f64::INFINITY, 1e-9, SelectionMode::Dantzig);
        // row 1: (5-0)/2 = 2.5 is tighter than row 0: (5-0)/1 = 5.0
        assert_eq!(result.outgoing_row, Some(1));
        assert!((result.theta - 2.5).abs() < 1e-12);
    }

    #[value_parameterized_test(values = [SelectionMode::Dantzig, SelectionMode::Piecewise, SelectionMode::PiecewiseGuarded])]
    fn primal_ratio_test_picks_a_row_under_every_mode(mode: SelectionMode) {
        let alpha = vec![1.0, 2.0];
        let x_b = vec![5.0, 5.0];
        let lower = vec![0.0, 0.0];
        let upper = vec![f64::INFINITY, f64::INFINITY];
        let result = primal_ratio_test(&alpha, &x_b, &lower, &upper, f64::INFINITY, 1e-9, mode);
        assert!(result.outgoing_row.is_some());
    }

    #[test]
    fn dual_phase2_ratio_test_records_bound_flip() {
        // leaving_sign=1.0 (leaving var below its lower bound, M); a
        // NonbasicAtLower column is only eligible when alpha = leaving_sign*row
        // < 0, so row must be negative here.
        let row = vec![-1.0];
        let d = vec![1.0];
        let states = vec![VariableState::NonbasicAtLower];
        let bounded = vec![true];
        let result = dual_ratio_test_phase2(&row, &d, &states, &bounded, 1.0, 1e-9, SelectionMode::Dantzig);
        assert_eq!(result.incoming, Some(0));
        assert_eq!(result.flips.len(), 1);
        assert_eq!(result.flips[0], BoundFlip { index: 0, to_upper: true });
    }
}
