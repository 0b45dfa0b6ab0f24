//! Constraint-programming engine abstraction
//!
//! The solver never talks to a concrete engine; it talks to this trait.
//! `LocalSearchEngine` is the engine shipped with this crate: a seeded,
//! multi-worker local-search procedure over *position assignments*
//! (permutations of the plate's inner wells). Because every decision
//! variable's domain is "one of the still-free inner positions" and moves
//! are always position swaps between two instances, position uniqueness
//! (`AllDifferent` over encoded positions) is an invariant of the
//! representation rather than something that has to be searched for —
//! the same guarantee a CP-SAT `AllDifferent` propagator gives, obtained
//! here by construction instead of propagation.
//!
//! The remaining primitives a CP-SAT-class engine would expose — linear
//! (in)equality, abs-value equality, reified booleans, boolean
//! disjunction — are used internally by [`LocalSearchEngine::violations`]
//! to score a candidate assignment: "not (|Δrow| <= 1 AND |Δcol| <= 1)"
//! is exactly the reified disjunction a CP-SAT model would build with
//! `OnlyEnforceIf`. A future swap-in of a real CP-SAT binding only has to
//! satisfy this trait; it does not need to reproduce the local-search
//! internals.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Handle to one decision variable (one sample instance's placement).
pub type VarId = usize;

/// Outcome of an engine [`CpEngine::solve`] call, matching CP-SAT's
/// status vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpStatus {
    /// A zero-violation assignment was found and local search proved (by
    /// exhausting its move budget without further improvement) it would
    /// not do better.
    Optimal,
    /// A zero-violation assignment was found within the time budget.
    Feasible,
    /// No zero-violation assignment was found before the time budget
    /// expired.
    Infeasible,
    /// The model was not buildable (e.g. more instances than available
    /// positions).
    ModelInvalid,
    /// Reserved for engines that can exhaust a search budget without any
    /// conclusion; `LocalSearchEngine` never returns this.
    Unknown,
}

/// Narrow interface a constraint engine must satisfy. The solver is
/// written entirely against this trait, never against `LocalSearchEngine`
/// directly.
pub trait CpEngine {
    /// Register one instance to be placed; returns its variable handle.
    /// `group` identifies same-label instances (used by
    /// [`CpEngine::forbid_adjacent_within_groups`] and
    /// [`CpEngine::require_distinct_rows_cols`]).
    fn new_instance(&mut self, group: usize) -> VarId;

    /// Hard constraint: no two instances in the same group may be
    /// 8-adjacent.
    fn forbid_adjacent_within_groups(&mut self);

    /// Hard constraint: within `group`, rows must be pairwise distinct if
    /// `distinct_rows`, and columns pairwise distinct if `distinct_cols`
    /// (the conditional dispersion constraint).
    fn require_distinct_rows_cols(&mut self, group: usize, distinct_rows: bool, distinct_cols: bool);

    /// Soft objective: minimize total row/column count deviation from
    /// the ideal uniform spread.
    fn minimize_spread(&mut self, ideal_row: i64, ideal_col: i64);

    /// Run the engine. `workers` independent seeded searches race; the
    /// best result wins.
    fn solve(&mut self, max_seconds: f64, workers: u32, seed: u64) -> CpStatus;

    /// Row of `var` in the accepted solution.
    fn row(&self, var: VarId) -> usize;
    /// Column of `var` in the accepted solution.
    fn col(&self, var: VarId) -> usize;
}

/// A tiny, fully deterministic PRNG (xorshift64*) so search is seeded and
/// reproducible without pulling in a RNG crate.
struct Xorshift64(u64);

impl Xorshift64 {
    fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x.wrapping_mul(0x2545_f491_4f6c_dd1d)
    }

    fn below(&mut self, n: usize) -> usize {
        if n == 0 {
            0
        } else {
            (self.next_u64() % n as u64) as usize
        }
    }
}

/// A swap-based local-search engine operating over permutations of inner
/// plate positions (see the module doc for why this preserves
/// `AllDifferent` by construction).
pub struct LocalSearchEngine {
    inner_positions: Vec<(usize, usize)>,
    groups: Vec<usize>,
    forbid_adjacent: bool,
    distinct_rows: std::collections::HashMap<usize, bool>,
    distinct_cols: std::collections::HashMap<usize, bool>,
    objective: Option<(i64, i64)>,
    assignment: Vec<(usize, usize)>,
    best_violations: u64,
}

impl LocalSearchEngine {
    /// Build an engine whose decision variables range over
    /// `inner_positions`. `new_instance` may be called at most
    /// `inner_positions.len()` times.
    pub fn new(inner_positions: Vec<(usize, usize)>) -> Self {
        Self {
            inner_positions,
            groups: Vec::new(),
            forbid_adjacent: false,
            distinct_rows: std::collections::HashMap::new(),
            distinct_cols: std::collections::HashMap::new(),
            objective: None,
            assignment: Vec::new(),
            best_violations: u64::MAX,
        }
    }

    fn num_vars(&self) -> usize {
        self.groups.len()
    }

    fn group_members(&self, group: usize) -> Vec<VarId> {
        (0..self.groups.len()).filter(|&v| self.groups[v] == group).collect()
    }

    /// Hard-constraint violation count for a candidate assignment.
    fn violations(&self, assignment: &[(usize, usize)]) -> u64 {
        let mut count = 0u64;
        if self.forbid_adjacent {
            let mut by_group: std::collections::HashMap<usize, Vec<VarId>> =
                std::collections::HashMap::new();
            for v in 0..self.num_vars() {
                by_group.entry(self.groups[v]).or_default().push(v);
            }
            for members in by_group.values() {
                for i in 0..members.len() {
                    for j in (i + 1)..members.len() {
                        let (r1, c1) = assignment[members[i]];
                        let (r2, c2) = assignment[members[j]];
                        let dr = (r1 as i64 - r2 as i64).abs();
                        let dc = (c1 as i64 - c2 as i64).abs();
                        // Reified disjunction: NOT (dr<=1 AND dc<=1).
                        if dr <= 1 && dc <= 1 {
                            count += 1;
                        }
                    }
                }
            }
        }
        for (&group, &want_rows) in &self.distinct_rows {
            if want_rows {
                let members = self.group_members(group);
                let mut rows: Vec<usize> = members.iter().map(|&v| assignment[v].0).collect();
                rows.sort_unstable();
                let before = rows.len();
                rows.dedup();
                count += (before - rows.len()) as u64;
            }
        }
        for (&group, &want_cols) in &self.distinct_cols {
            if want_cols {
                let members = self.group_members(group);
                let mut cols: Vec<usize> = members.iter().map(|&v| assignment[v].1).collect();
                cols.sort_unstable();
                let before = cols.len();
                cols.dedup();
                count += (before - cols.len()) as u64;
            }
        }
        count
    }

    /// Soft-objective value: total |count - ideal| across rows and
    /// columns actually spanned by `inner_positions`.
    fn objective_value(&self, assignment: &[(usize, usize)]) -> i64 {
        let Some((ideal_row, ideal_col)) = self.objective else {
            return 0;
        };
        let mut row_counts: std::collections::HashMap<usize, i64> = std::collections::HashMap::new();
        let mut col_counts: std::collections::HashMap<usize, i64> = std::collections::HashMap::new();
        for &(r, c) in assignment {
            *row_counts.entry(r).or_insert(0) += 1;
            *col_counts.entry(c).or_insert(0) += 1;
        }
        let mut rows: std::collections::HashSet<usize> =
            self.inner_positions.iter().map(|p| p.0).collect();
        let mut cols: std::collections::HashSet<usize> =
            self.inner_positions.iter().map(|p| p.1).collect();
        let mut total = 0i64;
        for r in rows.drain() {
            total += (row_counts.get(&r).copied().unwrap_or(0) - ideal_row).abs();
        }
        for c in cols.drain() {
            total += (col_counts.get(&c).copied().unwrap_or(0) - ideal_col).abs();
        }
        total
    }

    fn random_assignment(&self, rng: &mut Xorshift64) -> Vec<(usize, usize)> {
        let mut pool = self.inner_positions.clone();
        let n = pool.len();
        for i in (1..n).rev() {
            let j = rng.below(i + 1);
            pool.swap(i, j);
        }
        pool.truncate(self.num_vars());
        pool
    }

    /// One seeded local search run. Returns `(assignment, violations, objective)`.
    fn run_once(&self, seed: u64, deadline: Instant, stop: &AtomicBool) -> (Vec<(usize, usize)>, u64, i64) {
        let mut rng = Xorshift64::new(seed);
        let mut current = self.random_assignment(&mut rng);
        let mut current_violations = self.violations(&current);
        let mut current_obj = self.objective_value(&current);

        let mut best = current.clone();
        let mut best_violations = current_violations;
        let mut best_obj = current_obj;

        let n = current.len();
        if n < 2 {
            return (current, current_violations, current_obj);
        }

        let mut stale_rounds = 0u32;
        const STALE_LIMIT: u32 = 400;

        while Instant::now() < deadline && !stop.load(Ordering::Relaxed) && stale_rounds < STALE_LIMIT {
            let i = rng.below(n);
            let mut j = rng.below(n);
            if j == i {
                j = (j + 1) % n;
            }
            current.swap(i, j);
            let new_violations = self.violations(&current);
            let new_obj = self.objective_value(&current);

            let improves = (new_violations, new_obj) < (current_violations, current_obj);
            if improves {
                current_violations = new_violations;
                current_obj = new_obj;
                stale_rounds = 0;
            } else {
                current.swap(i, j);
                stale_rounds += 1;
            }

            if (current_violations, current_obj) < (best_violations, best_obj) {
                best = current.clone();
                best_violations = current_violations;
                best_obj = current_obj;
            }
        }

        (best, best_violations, best_obj)
    }
}

impl CpEngine for LocalSearchEngine {
    fn new_instance(&mut self, group: usize) -> VarId {
        let id = self.groups.len();
        self.groups.push(group);
        id
    }

    fn forbid_adjacent_within_groups(&mut self) {
        self.forbid_adjacent = true;
    }

    fn require_distinct_rows_cols(&mut self, group: usize, distinct_rows: bool, distinct_cols: bool) {
        self.distinct_rows.insert(group, distinct_rows);
        self.distinct_cols.insert(group, distinct_cols);
    }

    fn minimize_spread(&mut self, ideal_row: i64, ideal_col: i64) {
        self.objective = Some((ideal_row, ideal_col));
    }

    fn solve(&mut self, max_seconds: f64, workers: u32, seed: u64) -> CpStatus {
        if self.num_vars() > self.inner_positions.len() {
            return CpStatus::ModelInvalid;
        }
        if self.num_vars() == 0 {
            self.assignment = Vec::new();
            return CpStatus::Optimal;
        }

        let deadline = Instant::now() + Duration::from_secs_f64(max_seconds.max(0.0));
        let stop = AtomicBool::new(false);
        let workers = workers.max(1);
        let engine_ref: &LocalSearchEngine = &*self;

        let results: Vec<(Vec<(usize, usize)>, u64, i64)> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|w| {
                    let worker_seed = seed ^ (0x9E37_79B9_7F4A_7C15u64.wrapping_mul(w as u64 + 1));
                    let stop_ref = &stop;
                    scope.spawn(move || engine_ref.run_once(worker_seed, deadline, stop_ref))
                })
                .collect();
            handles.into_iter().map(|h| h.join().expect("worker panicked")).collect()
        });

        let best = results
            .into_iter()
            .min_by_key(|(_, violations, obj)| (*violations, *obj))
            .expect("at least one worker");

        self.assignment = best.0;
        self.best_violations = best.1;

        if self.best_violations == 0 {
            if Instant::now() < deadline {
                CpStatus::Optimal
            } else {
                CpStatus::Feasible
            }
        } else {
            CpStatus::Infeasible
        }
    }

    fn row(&self, var: VarId) -> usize {
        self.assignment[var].0
    }

    fn col(&self, var: VarId) -> usize {
        self.assignment[var].1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_grid() -> Vec<(usize, usize)> {
        let mut v = Vec::new();
        for r in 0..6 {
            for c in 0..10 {
                v.push((r, c));
            }
        }
        v
    }

    #[test]
    fn places_all_different_positions() {
        let mut engine = LocalSearchEngine::new(small_grid());
        let vars: Vec<_> = (0..20).map(|_| engine.new_instance(0)).collect();
        engine.forbid_adjacent_within_groups();
        let status = engine.solve(2.0, 2, 42);
        assert_ne!(status, CpStatus::ModelInvalid);
        let mut seen = std::collections::HashSet::new();
        for v in vars {
            assert!(seen.insert((engine.row(v), engine.col(v))));
        }
    }

    #[test]
    fn rejects_oversubscribed_model() {
        let mut engine = LocalSearchEngine::new(vec![(0, 0)]);
        engine.new_instance(0);
        engine.new_instance(0);
        assert_eq!(engine.solve(1.0, 1, 1), CpStatus::ModelInvalid);
    }
}
