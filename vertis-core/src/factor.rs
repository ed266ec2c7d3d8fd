//! Basis factorization kernel.
//!
//! Maintains an invertible representation of the m basic columns of
//! `[A | -I]` as a product form: INVERT runs Gauss-Jordan elimination
//! with partial pivoting, producing one elementary eta per basis slot,
//! and each simplex pivot appends one further eta via [`BasisFactor::update`].
//! `ftran` solves `B x = b` by applying the etas in order; `btran` solves
//! `B' x = b` by applying their transposes in reverse.
//!
//! A column with no acceptable pivot is declared singular and replaced by
//! the unit column of an unused pivot row; the caller substitutes the
//! matching logical variable. The kernel never reports success on a basis
//! it could not invert.

/// Sparse column as (row, value) pairs.
pub type SparseVec = Vec<(usize, f64)>;

/// One elementary transformation.
#[derive(Debug, Clone)]
struct Eta {
    pivot: usize,
    pivot_value: f64,
    /// Off-pivot entries of the transformed column.
    entries: Vec<(usize, f64)>,
}

/// Outcome of an INVERT.
#[derive(Debug, Clone)]
pub struct InvertOutcome {
    /// Pivot row assigned to each basis slot; the caller reorders its
    /// basic-variable list so that slot k lives on row `pivot_rows[k]`.
    pub pivot_rows: Vec<usize>,
    /// Slots whose column was singular, with the row whose logical was
    /// substituted.
    pub replaced: Vec<(usize, usize)>,
}

/// Result of a product-form update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// Update applied.
    Ok,
    /// Pivot too small relative to the column; refactorize instead.
    Unstable,
}

/// Product-form factorization of the basis matrix.
#[derive(Debug, Clone)]
pub struct BasisFactor {
    dim: usize,
    etas: Vec<Eta>,
    num_base_etas: usize,
    /// Number of INVERT calls over the factor's lifetime.
    pub num_invert: i64,
    /// Eta nonzeros produced by the most recent INVERT.
    pub last_invert_num_el: i64,
    /// Nonzeros of the most recently factored basis matrix.
    pub last_factored_basis_num_el: i64,
}

const PIVOT_TOL: f64 = 1e-10;
const UPDATE_PIVOT_RATIO_TOL: f64 = 1e-8;
const MAX_UPDATES: usize = 60;
const DROP_TOL: f64 = 1e-14;

impl BasisFactor {
    /// A factor for an m-row basis, initially empty.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            etas: Vec::new(),
            num_base_etas: 0,
            num_invert: 0,
            last_invert_num_el: 0,
            last_factored_basis_num_el: 0,
        }
    }

    /// Basis dimension m.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Updates applied since the last INVERT.
    pub fn num_updates(&self) -> usize {
        self.etas.len() - self.num_base_etas
    }

    /// Whether the update count alone warrants a refactorization.
    pub fn refactorization_due(&self) -> bool {
        self.num_updates() >= MAX_UPDATES
    }

    /// Factorize the given basis columns from scratch.
    ///
    /// Columns are eliminated in slot order with partial pivoting over the
    /// not-yet-pivotal rows; ties take the lowest row. Singular slots are
    /// replaced by unit columns of leftover rows and reported.
    pub fn invert(&mut self, columns: &[SparseVec]) -> InvertOutcome {
        assert_eq!(columns.len(), self.dim);
        let m = self.dim;
        self.etas.clear();
        self.num_base_etas = 0;
        self.num_invert += 1;
        self.last_factored_basis_num_el =
            columns.iter().map(|c| c.len() as i64).sum();

        let mut pivoted = vec![false; m];
        let mut pivot_rows = vec![usize::MAX; m];
        let mut singular_slots = Vec::new();
        let mut work = vec![0.0_f64; m];

        for (slot, column) in columns.iter().enumerate() {
            // Scatter and push through the etas built so far.
            work.fill(0.0);
            let mut col_scale = 0.0_f64;
            for &(i, v) in column {
                work[i] = v;
                col_scale = col_scale.max(v.abs());
            }
            self.apply_ftran(&mut work);

            // Partial pivot over unpivoted rows; lowest row wins ties.
            let mut best = 0.0_f64;
            let mut best_row = usize::MAX;
            for (i, &w) in work.iter().enumerate() {
                if !pivoted[i] && w.abs() > best {
                    best = w.abs();
                    best_row = i;
                }
            }
            let tol = PIVOT_TOL * col_scale.max(1.0);
            if best_row == usize::MAX || best <= tol {
                singular_slots.push(slot);
                continue;
            }
            pivoted[best_row] = true;
            pivot_rows[slot] = best_row;
            self.push_eta(&work, best_row);
        }

        // Pair singular slots with leftover rows; the unit column of a
        // fresh row passes through the existing etas unchanged.
        let mut replaced = Vec::new();
        if !singular_slots.is_empty() {
            let mut free_rows =
                (0..m).filter(|&i| !pivoted[i]).collect::<Vec<_>>().into_iter();
            for slot in singular_slots {
                let row = free_rows.next().expect("row count matches slot count");
                pivoted[row] = true;
                pivot_rows[slot] = row;
                self.etas.push(Eta {
                    pivot: row,
                    pivot_value: -1.0,
                    entries: Vec::new(),
                });
                replaced.push((slot, row));
            }
        }

        self.num_base_etas = self.etas.len();
        self.last_invert_num_el = self
            .etas
            .iter()
            .map(|e| e.entries.len() as i64 + 1)
            .sum();
        InvertOutcome { pivot_rows, replaced }
    }

    /// Solve `B x = b` in place.
    pub fn ftran(&self, rhs: &mut [f64]) {
        debug_assert_eq!(rhs.len(), self.dim);
        self.apply_ftran(rhs);
    }

    /// Solve `B' x = b` in place.
    pub fn btran(&self, rhs: &mut [f64]) {
        debug_assert_eq!(rhs.len(), self.dim);
        for eta in self.etas.iter().rev() {
            let p = eta.pivot;
            let mut acc = eta.pivot_value * rhs[p];
            for &(i, v) in &eta.entries {
                acc += v * rhs[i];
            }
            rhs[p] += (rhs[p] - acc) / eta.pivot_value;
        }
    }

    /// Append the product-form eta for a pivot that replaces the basic
    /// variable of `pivot_row` with a column whose FTRAN image is
    /// `col_aq`.
    pub fn update(&mut self, col_aq: &[f64], pivot_row: usize) -> UpdateStatus {
        debug_assert_eq!(col_aq.len(), self.dim);
        let pivot = col_aq[pivot_row];
        let max_abs = col_aq.iter().fold(0.0_f64, |a, &v| a.max(v.abs()));
        if pivot.abs() <= PIVOT_TOL || pivot.abs() < UPDATE_PIVOT_RATIO_TOL * max_abs {
            return UpdateStatus::Unstable;
        }
        self.push_eta(col_aq, pivot_row);
        UpdateStatus::Ok
    }

    fn apply_ftran(&self, rhs: &mut [f64]) {
        for eta in &self.etas {
            let p = eta.pivot;
            if rhs[p] == 0.0 {
                continue;
            }
            let wp = rhs[p] / eta.pivot_value;
            rhs[p] = wp;
            for &(i, v) in &eta.entries {
                rhs[i] -= v * wp;
            }
        }
    }

    fn push_eta(&mut self, column: &[f64], pivot: usize) {
        let mut entries = Vec::new();
        for (i, &v) in column.iter().enumerate() {
            if i != pivot && v.abs() > DROP_TOL {
                entries.push((i, v));
            }
        }
        self.etas.push(Eta {
            pivot,
            pivot_value: column[pivot],
            entries,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense_ftran(f: &BasisFactor, b: Vec<f64>) -> Vec<f64> {
        let mut w = b;
        f.ftran(&mut w);
        w
    }

    fn dense_btran(f: &BasisFactor, b: Vec<f64>) -> Vec<f64> {
        let mut w = b;
        f.btran(&mut w);
        w
    }

    #[test]
    fn test_invert_and_solve_2x2() {
        // B = [[2, 1], [0, 1]]
        let cols: Vec<SparseVec> = vec![vec![(0, 2.0)], vec![(0, 1.0), (1, 1.0)]];
        let mut f = BasisFactor::new(2);
        let out = f.invert(&cols);
        assert!(out.replaced.is_empty());
        assert_eq!(out.pivot_rows, vec![0, 1]);

        // B x = (3, 1) has x = (1, 1).
        let x = dense_ftran(&f, vec![3.0, 1.0]);
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 1.0).abs() < 1e-12);

        // B' y = (1, 3) has y = (0.5, 2.5).
        let y = dense_btran(&f, vec![1.0, 3.0]);
        assert!((y[0] - 0.5).abs() < 1e-12);
        assert!((y[1] - 2.5).abs() < 1e-12);

        assert_eq!(f.num_invert, 1);
        assert!(f.last_invert_num_el > 0);
        assert_eq!(f.last_factored_basis_num_el, 3);
    }

    #[test]
    fn test_partial_pivot_row_choice() {
        // First column is (0.001, 10); pivoting must take row 1.
        let cols: Vec<SparseVec> =
            vec![vec![(0, 0.001), (1, 10.0)], vec![(0, 1.0)]];
        let mut f = BasisFactor::new(2);
        let out = f.invert(&cols);
        assert_eq!(out.pivot_rows, vec![1, 0]);
        // Solve B x = b for B = [[0.001, 1], [10, 0]], b = (1.001, 10):
        // x = (1, 1).
        let x = dense_ftran(&f, vec![1.001, 10.0]);
        // Slot 0 lives on row 1, slot 1 on row 0.
        assert!((x[1] - 1.0).abs() < 1e-12);
        assert!((x[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_update_matches_fresh_invert() {
        let cols: Vec<SparseVec> = vec![vec![(0, 2.0)], vec![(0, 1.0), (1, 1.0)]];
        let mut f = BasisFactor::new(2);
        f.invert(&cols);

        // Replace the variable on row 0 with column (1, 2).
        let mut aq = vec![1.0, 2.0];
        f.ftran(&mut aq);
        assert_eq!(f.update(&aq, 0), UpdateStatus::Ok);

        // New basis (in row order): row-0 column is (1,2), row-1 column is
        // (1,1): B = [[1, 1], [2, 1]]. Check against direct solve of
        // B x = (2, 3): x = (1, 1).
        let x = dense_ftran(&f, vec![2.0, 3.0]);
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 1.0).abs() < 1e-12);

        let y = dense_btran(&f, vec![1.0, 1.0]);
        // B' y = (1, 1): y = (y0, y1) with y0 + 2 y1 = 1, y0 + y1 = 1
        // gives y = (1, 0).
        assert!((y[0] - 1.0).abs() < 1e-12);
        assert!(y[1].abs() < 1e-12);

        assert_eq!(f.num_updates(), 1);
    }

    #[test]
    fn test_singular_basis_repaired() {
        // Two identical columns: the second has no pivot left.
        let cols: Vec<SparseVec> = vec![
            vec![(0, 1.0), (1, 1.0)],
            vec![(0, 1.0), (1, 1.0)],
        ];
        let mut f = BasisFactor::new(2);
        let out = f.invert(&cols);
        assert_eq!(out.replaced.len(), 1);
        let (slot, row) = out.replaced[0];
        assert_eq!(slot, 1);
        // The repair slots in the logical column -e_row; solves must still
        // be consistent: with pivot rows (1, 0) the repaired basis in row
        // order is [[1, -1], [1, 0]] or its mirror.
        assert!(row < 2);
        let x = dense_ftran(&f, vec![1.0, 1.0]);
        assert!(x.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_unstable_update_rejected() {
        let cols: Vec<SparseVec> = vec![vec![(0, 1.0)], vec![(1, 1.0)]];
        let mut f = BasisFactor::new(2);
        f.invert(&cols);
        let aq = vec![1e-13, 1.0];
        assert_eq!(f.update(&aq, 0), UpdateStatus::Unstable);
        assert_eq!(f.num_updates(), 0);
    }
}
