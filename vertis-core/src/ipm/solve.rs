//! Mehrotra predictor-corrector iterations on the standard form.
//!
//! Each iteration reduces the KKT system to the normal equations
//! `(A D A' + delta I) dlambda = rhs` with `D = diag(x / s)`, factored by
//! a dense Cholesky with static regularization. The affine direction
//! sets the centering parameter `sigma = (mu_aff / mu)^3`; the combined
//! step carries the second-order correction.

use crate::standard_form::StandardFormLp;

use super::IpmControl;
use crate::simplex::deadline_exceeded;

const STEP_SCALE: f64 = 0.9995;
const STATIC_REG: f64 = 1e-10;
const DIVERGENCE_MU: f64 = 1e14;

/// Terminal state of the interior-point iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpmStatus {
    /// Feasibility and gap tolerances met.
    Converged,
    /// Iteration budget exhausted.
    IterationLimit,
    /// Deadline passed.
    TimeLimit,
    /// The problem has no rows and an improving ray.
    DualInfeasible,
    /// The iteration diverged or the normal equations lost definiteness.
    NumericalError,
}

/// Interior iterate returned by [`mehrotra`].
#[derive(Debug, Clone)]
pub struct IpmResult {
    /// Terminal status.
    pub status: IpmStatus,
    /// Iterations performed.
    pub iterations: i64,
    /// Primal point (standard-form space).
    pub x: Vec<f64>,
    /// Row duals.
    pub lambda: Vec<f64>,
    /// Reduced costs.
    pub s: Vec<f64>,
}

/// Run the predictor-corrector loop.
pub fn mehrotra(sf: &StandardFormLp, ctrl: &IpmControl) -> IpmResult {
    let n = sf.num_col;
    let m = sf.num_row;
    let gap_tol = ctrl.primal_tol.min(ctrl.dual_tol);

    if n == 0 {
        return IpmResult {
            status: IpmStatus::Converged,
            iterations: 0,
            x: Vec::new(),
            lambda: vec![0.0; m],
            s: Vec::new(),
        };
    }
    if m == 0 {
        // No constraints survive: y = 0 is optimal iff no cost improves.
        let status = if sf.cost.iter().any(|&c| c < 0.0) {
            IpmStatus::DualInfeasible
        } else {
            IpmStatus::Converged
        };
        return IpmResult {
            status,
            iterations: 0,
            x: vec![0.0; n],
            lambda: Vec::new(),
            s: sf.cost.clone(),
        };
    }

    let (mut x, mut lambda, mut s) = starting_point(sf);
    let mut iterations: i64 = 0;

    loop {
        // Residuals and gap.
        let ax = matvec(sf, &x);
        let rp: Vec<f64> = sf.rhs.iter().zip(ax.iter()).map(|(b, v)| b - v).collect();
        let atl = matvec_transpose(sf, &lambda);
        let rd: Vec<f64> = (0..n).map(|k| sf.cost[k] - atl[k] - s[k]).collect();
        let gap: f64 = x.iter().zip(s.iter()).map(|(a, b)| a * b).sum();
        let mu = gap / n as f64;

        let obj: f64 = sf.cost.iter().zip(x.iter()).map(|(c, v)| c * v).sum();
        let rel_p = inf_norm(&rp) / (1.0 + inf_norm(&sf.rhs));
        let rel_d = inf_norm(&rd) / (1.0 + inf_norm(&sf.cost));
        let rel_gap = gap / (1.0 + obj.abs());
        log::trace!(
            "ipm iter {iterations}: mu {mu:.3e}, rp {rel_p:.3e}, rd {rel_d:.3e}, gap {rel_gap:.3e}"
        );
        if rel_p <= ctrl.primal_tol && rel_d <= ctrl.dual_tol && rel_gap <= gap_tol {
            return IpmResult {
                status: IpmStatus::Converged,
                iterations,
                x,
                lambda,
                s,
            };
        }
        if !mu.is_finite() || mu > DIVERGENCE_MU {
            return IpmResult {
                status: IpmStatus::NumericalError,
                iterations,
                x,
                lambda,
                s,
            };
        }
        if iterations >= ctrl.iteration_limit {
            return IpmResult {
                status: IpmStatus::IterationLimit,
                iterations,
                x,
                lambda,
                s,
            };
        }
        if deadline_exceeded(ctrl.deadline) {
            return IpmResult {
                status: IpmStatus::TimeLimit,
                iterations,
                x,
                lambda,
                s,
            };
        }

        // Normal equations matrix A D A' with D = x / s.
        let d: Vec<f64> = x.iter().zip(s.iter()).map(|(a, b)| a / b).collect();
        let chol = match build_and_factor(sf, &d) {
            Some(c) => c,
            None => {
                return IpmResult {
                    status: IpmStatus::NumericalError,
                    iterations,
                    x,
                    lambda,
                    s,
                };
            }
        };

        // Affine direction.
        let rc_aff: Vec<f64> = x.iter().zip(s.iter()).map(|(a, b)| -a * b).collect();
        let (dx_aff, _dl_aff, ds_aff) =
            solve_direction(sf, &d, &x, &s, &rp, &rd, &rc_aff, &chol);
        let alpha_p_aff = max_step(&x, &dx_aff);
        let alpha_d_aff = max_step(&s, &ds_aff);
        let gap_aff: f64 = (0..n)
            .map(|k| (x[k] + alpha_p_aff * dx_aff[k]) * (s[k] + alpha_d_aff * ds_aff[k]))
            .sum();
        let mu_aff = gap_aff.max(0.0) / n as f64;
        let sigma = if mu > 0.0 {
            (mu_aff / mu).powi(3).clamp(0.0, 1.0)
        } else {
            0.0
        };

        // Combined direction with second-order correction.
        let rc: Vec<f64> = (0..n)
            .map(|k| sigma * mu - x[k] * s[k] - dx_aff[k] * ds_aff[k])
            .collect();
        let (dx, dl, ds) = solve_direction(sf, &d, &x, &s, &rp, &rd, &rc, &chol);
        let alpha_p = (STEP_SCALE * max_step(&x, &dx)).min(1.0);
        let alpha_d = (STEP_SCALE * max_step(&s, &ds)).min(1.0);

        for k in 0..n {
            x[k] += alpha_p * dx[k];
            s[k] += alpha_d * ds[k];
        }
        for i in 0..m {
            lambda[i] += alpha_d * dl[i];
        }
        iterations += 1;
    }
}

/// Mehrotra starting point: least-squares primal and dual estimates
/// shifted into the positive orthant.
fn starting_point(sf: &StandardFormLp) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let n = sf.num_col;
    let ones = vec![1.0; n];
    let chol = match build_and_factor(sf, &ones) {
        Some(c) => c,
        None => {
            // Fall back to the all-ones point; the iteration recovers.
            return (vec![1.0; n], vec![0.0; sf.num_row], vec![1.0; n]);
        }
    };
    // x = A'(A A')^{-1} b
    let mut w = sf.rhs.clone();
    chol.solve(&mut w);
    let x0 = matvec_transpose(sf, &w);
    // lambda = (A A')^{-1} A c
    let mut v = matvec(sf, &sf.cost);
    chol.solve(&mut v);
    let lambda = v;
    let atl = matvec_transpose(sf, &lambda);
    let s0: Vec<f64> = (0..n).map(|k| sf.cost[k] - atl[k]).collect();

    let dx = (-1.5 * x0.iter().cloned().fold(f64::INFINITY, f64::min)).max(0.0);
    let ds = (-1.5 * s0.iter().cloned().fold(f64::INFINITY, f64::min)).max(0.0);
    let mut x: Vec<f64> = x0.iter().map(|&v| v + dx).collect();
    let mut s: Vec<f64> = s0.iter().map(|&v| v + ds).collect();
    let dot: f64 = x.iter().zip(s.iter()).map(|(a, b)| a * b).sum();
    let sum_x: f64 = x.iter().sum();
    let sum_s: f64 = s.iter().sum();
    let shift_x = if sum_s > 0.0 { 0.5 * dot / sum_s } else { 1.0 };
    let shift_s = if sum_x > 0.0 { 0.5 * dot / sum_x } else { 1.0 };
    for v in x.iter_mut() {
        *v += shift_x;
        if *v <= 0.0 {
            *v = 1.0;
        }
    }
    for v in s.iter_mut() {
        *v += shift_s;
        if *v <= 0.0 {
            *v = 1.0;
        }
    }
    (x, lambda, s)
}

/// Solve one KKT system given the factored normal equations:
/// `M dlambda = rp + A D rd - A S^{-1} rc`, then back-substitute
/// `ds = rd - A' dlambda` and `dx = S^{-1} rc - D ds`.
#[allow(clippy::too_many_arguments)]
fn solve_direction(
    sf: &StandardFormLp,
    d: &[f64],
    _x: &[f64],
    s: &[f64],
    rp: &[f64],
    rd: &[f64],
    rc: &[f64],
    chol: &DenseCholesky,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let n = sf.num_col;
    let m = sf.num_row;
    let mut t = vec![0.0; n];
    for k in 0..n {
        t[k] = d[k] * rd[k] - rc[k] / s[k];
    }
    let at_t = matvec(sf, &t);
    let mut rhs = vec![0.0; m];
    for i in 0..m {
        rhs[i] = rp[i] + at_t[i];
    }
    chol.solve(&mut rhs);
    let dl = rhs;
    let atl = matvec_transpose(sf, &dl);
    let mut ds = vec![0.0; n];
    let mut dx = vec![0.0; n];
    for k in 0..n {
        ds[k] = rd[k] - atl[k];
        dx[k] = rc[k] / s[k] - d[k] * ds[k];
    }
    (dx, dl, ds)
}

/// Largest alpha in [0, 1e20] with `v + alpha dv >= 0`.
fn max_step(v: &[f64], dv: &[f64]) -> f64 {
    let mut alpha = f64::INFINITY;
    for (a, da) in v.iter().zip(dv.iter()) {
        if *da < 0.0 {
            alpha = alpha.min(-a / da);
        }
    }
    alpha.min(1e20)
}

fn inf_norm(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |acc, x| acc.max(x.abs()))
}

fn matvec(sf: &StandardFormLp, x: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; sf.num_row];
    for (j, col) in sf.matrix.outer_iterator().enumerate() {
        let xj = x[j];
        if xj == 0.0 {
            continue;
        }
        for (i, &v) in col.iter() {
            out[i] += v * xj;
        }
    }
    out
}

fn matvec_transpose(sf: &StandardFormLp, y: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; sf.num_col];
    for (j, col) in sf.matrix.outer_iterator().enumerate() {
        let mut dot = 0.0;
        for (i, &v) in col.iter() {
            dot += v * y[i];
        }
        out[j] = dot;
    }
    out
}

/// Assemble `A D A' + reg I` and factor it, escalating the
/// regularization a few times before giving up.
fn build_and_factor(sf: &StandardFormLp, d: &[f64]) -> Option<DenseCholesky> {
    let m = sf.num_row;
    let mut reg = STATIC_REG;
    for _ in 0..4 {
        let mut dense = vec![0.0; m * m];
        for (j, col) in sf.matrix.outer_iterator().enumerate() {
            let dj = d[j];
            if dj == 0.0 {
                continue;
            }
            let entries: Vec<(usize, f64)> = col.iter().map(|(i, &v)| (i, v)).collect();
            for &(ia, va) in &entries {
                for &(ib, vb) in &entries {
                    dense[ia * m + ib] += dj * va * vb;
                }
            }
        }
        let scale = (0..m).fold(0.0_f64, |acc, i| acc.max(dense[i * m + i]));
        for i in 0..m {
            dense[i * m + i] += reg * (1.0 + scale);
        }
        if let Some(chol) = DenseCholesky::factor(dense, m) {
            return Some(chol);
        }
        reg *= 1e4;
    }
    None
}

/// Dense Cholesky, row-major lower triangle.
struct DenseCholesky {
    n: usize,
    l: Vec<f64>,
}

impl DenseCholesky {
    fn factor(mut a: Vec<f64>, n: usize) -> Option<Self> {
        for k in 0..n {
            let mut diag = a[k * n + k];
            for t in 0..k {
                diag -= a[k * n + t] * a[k * n + t];
            }
            if diag <= 0.0 || !diag.is_finite() {
                return None;
            }
            let diag = diag.sqrt();
            a[k * n + k] = diag;
            for i in (k + 1)..n {
                let mut v = a[i * n + k];
                for t in 0..k {
                    v -= a[i * n + t] * a[k * n + t];
                }
                a[i * n + k] = v / diag;
            }
        }
        Some(Self { n, l: a })
    }

    /// Solve `L L' z = rhs` in place.
    fn solve(&self, rhs: &mut [f64]) {
        let n = self.n;
        for i in 0..n {
            let mut v = rhs[i];
            for t in 0..i {
                v -= self.l[i * n + t] * rhs[t];
            }
            rhs[i] = v / self.l[i * n + i];
        }
        for i in (0..n).rev() {
            let mut v = rhs[i];
            for t in (i + 1)..n {
                v -= self.l[t * n + i] * rhs[t];
            }
            rhs[i] = v / self.l[i * n + i];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Lp, ObjSense, INF};
    use crate::standard_form;

    fn control(limit: i64) -> IpmControl {
        IpmControl {
            iteration_limit: limit,
            deadline: None,
            primal_tol: 1e-8,
            dual_tol: 1e-8,
        }
    }

    #[test]
    fn test_cholesky_solves() {
        // A = [[4, 2], [2, 3]], rhs (8, 7) -> z = (1, ...).
        let a = vec![4.0, 2.0, 2.0, 3.0];
        let chol = DenseCholesky::factor(a, 2).unwrap();
        let mut rhs = vec![8.0, 7.0];
        chol.solve(&mut rhs);
        // Solution of [[4,2],[2,3]] z = (8,7): z = (1.25, 1.5).
        assert!((rhs[0] - 1.25).abs() < 1e-12);
        assert!((rhs[1] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_mehrotra_converges_on_blending() {
        let lp = Lp::from_column_arrays(
            2,
            2,
            ObjSense::Minimize,
            0.0,
            vec![-8.0, -10.0],
            vec![0.0, 0.0],
            vec![INF, INF],
            vec![-INF, -INF],
            vec![80.0, 120.0],
            &[0, 2, 4],
            &[0, 1, 0, 1],
            &[1.0, 1.0, 2.0, 4.0],
        )
        .unwrap();
        let sf = standard_form::build(&lp);
        let result = mehrotra(&sf, &control(100));
        assert_eq!(result.status, IpmStatus::Converged);
        assert!(result.iterations > 0);
        let x = sf.recover_col_values(&lp, &result.x);
        // Optimum (60, 0), objective -480.
        assert!((x[0] - 60.0).abs() < 1e-4);
        assert!(x[1].abs() < 1e-4);
    }

    #[test]
    fn test_zero_iteration_limit() {
        let lp = Lp::from_column_arrays(
            1,
            1,
            ObjSense::Minimize,
            0.0,
            vec![1.0],
            vec![0.0],
            vec![10.0],
            vec![1.0],
            vec![1.0],
            &[0, 1],
            &[0],
            &[1.0],
        )
        .unwrap();
        let sf = standard_form::build(&lp);
        let result = mehrotra(&sf, &control(0));
        assert_eq!(result.status, IpmStatus::IterationLimit);
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn test_iteration_counts_reproducible() {
        let lp = Lp::from_column_arrays(
            2,
            2,
            ObjSense::Minimize,
            0.0,
            vec![-8.0, -10.0],
            vec![0.0, 0.0],
            vec![INF, INF],
            vec![-INF, -INF],
            vec![80.0, 120.0],
            &[0, 2, 4],
            &[0, 1, 0, 1],
            &[1.0, 1.0, 2.0, 4.0],
        )
        .unwrap();
        let sf = standard_form::build(&lp);
        let a = mehrotra(&sf, &control(100));
        let b = mehrotra(&sf, &control(100));
        assert_eq!(a.iterations, b.iterations);
        assert_eq!(a.status, b.status);
    }
}
