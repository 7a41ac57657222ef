//! # Simplex Quadratic Programs
//!
//! $$
//! \min_{\mathbf w}\ \tfrac12\mathbf w^\top H\mathbf w + \mathbf c^\top\mathbf w
//! \quad\text{s.t.}\quad \mathbf 1^\top\mathbf w = 1,\ \mathbf w\ge 0,\ \boldsymbol\mu^\top\mathbf w \ge r^\*
//! $$
//!
//! Long-only, fully-invested QPs solved with the Clarabel interior-point method.
//! In Clarabel's standard form `Aw + s = b`, the budget row lives in the zero
//! cone and the long-only rows plus the optional return floor live in the
//! non-negative cone.

use clarabel::algebra::CscMatrix;
use clarabel::solver::DefaultSettingsBuilder;
use clarabel::solver::DefaultSolver;
use clarabel::solver::IPSolver;
use clarabel::solver::SolverStatus;
use clarabel::solver::SupportedConeT;
use nalgebra::DMatrix;
use nalgebra::SymmetricEigen;
use ndarray::Array1;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use ndarray::Axis;
use tracing::warn;

use crate::error::SolveFailure;

/// Interior-point controls.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolverSettings {
  /// Upper bound on interior-point iterations.
  pub max_iterations: u32,
  /// Absolute and relative duality-gap and feasibility tolerance.
  pub tolerance: f64,
}

impl Default for SolverSettings {
  fn default() -> Self {
    Self {
      max_iterations: 200,
      tolerance: 1e-8,
    }
  }
}

/// Quadratic program over the long-only, fully-invested simplex.
pub struct SimplexQp<'a> {
  hessian: ArrayView2<'a, f64>,
  linear: Array1<f64>,
  return_floor: Option<(ArrayView1<'a, f64>, f64)>,
}

impl<'a> SimplexQp<'a> {
  /// `min ½ wᵀHw + cᵀw` on the simplex.
  pub fn new(hessian: ArrayView2<'a, f64>, linear: Array1<f64>) -> Self {
    Self {
      hessian,
      linear,
      return_floor: None,
    }
  }

  /// Add the constraint `μᵀw ≥ target`.
  pub fn with_return_floor(mut self, mu: ArrayView1<'a, f64>, target: f64) -> Self {
    self.return_floor = Some((mu, target));
    self
  }

  /// Solve, returning weights on the simplex (before any pruning).
  pub fn solve(&self, settings: &SolverSettings) -> Result<Array1<f64>, SolveFailure> {
    let n = self.linear.len();
    if n == 0 || self.hessian.dim() != (n, n) {
      return Err(SolveFailure::Infeasible);
    }
    check_hessian(self.hessian)?;

    let Some((mu, target)) = self.return_floor else {
      return solve_standard_form(self.hessian, self.linear.view(), None, settings);
    };
    if mu.len() != n || !target.is_finite() {
      return Err(SolveFailure::Infeasible);
    }

    let best = mu.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let slack = 1e-12 * target.abs().max(1.0);
    if best < target - slack {
      return Err(SolveFailure::Infeasible);
    }
    if best > target + slack {
      return solve_standard_form(self.hessian, self.linear.view(), Some((mu, target)), settings);
    }

    // floor sits on the best mean: only the top assets are feasible
    let top: Vec<usize> = (0..n).filter(|&i| mu[i] >= best - slack).collect();
    let hessian = self.hessian.select(Axis(0), &top).select(Axis(1), &top);
    let linear = self.linear.select(Axis(0), &top);
    let sub = solve_standard_form(hessian.view(), linear.view(), None, settings)?;

    let mut w = Array1::zeros(n);
    for (&i, &wi) in top.iter().zip(sub.iter()) {
      w[i] = wi;
    }
    Ok(w)
  }
}

fn solve_standard_form(
  hessian: ArrayView2<f64>,
  linear: ArrayView1<f64>,
  floor: Option<(ArrayView1<f64>, f64)>,
  settings: &SolverSettings,
) -> Result<Array1<f64>, SolveFailure> {
  let n = linear.len();
  if n == 1 {
    return Ok(Array1::ones(1));
  }

  let p = upper_triangle(hessian);
  let q = linear.to_vec();
  let (a, b, cones) = simplex_constraints(n, floor);

  let clarabel_settings = DefaultSettingsBuilder::default()
    .verbose(false)
    .max_iter(settings.max_iterations)
    .tol_gap_abs(settings.tolerance)
    .tol_gap_rel(settings.tolerance)
    .tol_feas(settings.tolerance)
    .build()
    .map_err(|_| SolveFailure::NonConvergent { iterations: 0 })?;

  let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, clarabel_settings);
  solver.solve();

  let iterations = solver.info.iterations as usize;
  match solver.solution.status {
    SolverStatus::Solved | SolverStatus::AlmostSolved => Ok(onto_simplex(&solver.solution.x)),
    SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
      Err(SolveFailure::Infeasible)
    }
    status => {
      warn!(?status, iterations, "quadratic program did not converge");
      Err(SolveFailure::NonConvergent { iterations })
    }
  }
}

/// Upper triangle of the symmetrized Hessian in CSC form.
fn upper_triangle(hessian: ArrayView2<f64>) -> CscMatrix<f64> {
  let n = hessian.nrows();
  let mut colptr = Vec::with_capacity(n + 1);
  let mut rowval = Vec::new();
  let mut nzval = Vec::new();

  colptr.push(0);
  for j in 0..n {
    for i in 0..=j {
      let v = 0.5 * (hessian[[i, j]] + hessian[[j, i]]);
      if v != 0.0 {
        rowval.push(i);
        nzval.push(v);
      }
    }
    colptr.push(rowval.len());
  }

  CscMatrix::new(n, n, colptr, rowval, nzval)
}

/// Rows: `1ᵀw = 1`, then `−w ≤ 0`, then `−μᵀw ≤ −r*` when a floor is set.
fn simplex_constraints(
  n: usize,
  floor: Option<(ArrayView1<f64>, f64)>,
) -> (CscMatrix<f64>, Vec<f64>, Vec<SupportedConeT<f64>>) {
  let m = 1 + n + usize::from(floor.is_some());
  let mut colptr = Vec::with_capacity(n + 1);
  let mut rowval = Vec::with_capacity(3 * n);
  let mut nzval = Vec::with_capacity(3 * n);

  colptr.push(0);
  for j in 0..n {
    rowval.push(0);
    nzval.push(1.0);
    rowval.push(1 + j);
    nzval.push(-1.0);
    if let Some((mu, _)) = floor {
      if mu[j] != 0.0 {
        rowval.push(1 + n);
        nzval.push(-mu[j]);
      }
    }
    colptr.push(rowval.len());
  }

  let mut b = vec![0.0; m];
  b[0] = 1.0;
  if let Some((_, target)) = floor {
    b[1 + n] = -target;
  }

  let cones = vec![
    SupportedConeT::ZeroConeT(1),
    SupportedConeT::NonnegativeConeT(m - 1),
  ];
  (CscMatrix::new(m, n, colptr, rowval, nzval), b, cones)
}

/// Clip interior-point round-off below zero and restore the budget.
fn onto_simplex(x: &[f64]) -> Array1<f64> {
  let w = Array1::from_iter(x.iter().map(|&v| v.max(0.0)));
  let total = w.sum();
  if total > 0.0 {
    w / total
  } else {
    Array1::from_elem(x.len(), 1.0 / x.len() as f64)
  }
}

/// Reject non-finite, asymmetric or indefinite Hessians.
fn check_hessian(matrix: ArrayView2<f64>) -> Result<(), SolveFailure> {
  let n = matrix.nrows();
  if matrix.iter().any(|v| !v.is_finite()) {
    return Err(SolveFailure::SingularCovariance);
  }

  let scale = matrix.iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(1e-300);
  for i in 0..n {
    for j in (i + 1)..n {
      if (matrix[[i, j]] - matrix[[j, i]]).abs() > 1e-9 * scale {
        return Err(SolveFailure::SingularCovariance);
      }
    }
  }

  let dense = DMatrix::from_fn(n, n, |i, j| 0.5 * (matrix[[i, j]] + matrix[[j, i]]));
  let eigen = SymmetricEigen::try_new(dense, f64::EPSILON, 0).ok_or(SolveFailure::SingularCovariance)?;
  let max = eigen.eigenvalues.iter().copied().fold(f64::NEG_INFINITY, f64::max);
  let min = eigen.eigenvalues.iter().copied().fold(f64::INFINITY, f64::min);

  if min < -1e-8 * max.abs().max(1.0) {
    return Err(SolveFailure::SingularCovariance);
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;
  use ndarray::Array2;
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use rand_distr::Distribution;
  use rand_distr::StandardNormal;

  use super::*;

  #[test]
  fn two_asset_min_variance_has_closed_form() {
    // uncorrelated: w1 = s2² / (s1² + s2²)
    let cov = array![[0.04, 0.0], [0.0, 0.09]];
    let w = SimplexQp::new(cov.view(), Array1::zeros(2))
      .solve(&SolverSettings::default())
      .unwrap();
    assert_abs_diff_eq!(w[0], 0.09 / 0.13, epsilon = 1e-6);
    assert_abs_diff_eq!(w[1], 0.04 / 0.13, epsilon = 1e-6);
  }

  #[test]
  fn return_floor_is_respected() {
    let cov = array![[0.04, 0.0], [0.0, 0.09]];
    let mu = array![0.05, 0.15];
    let w = SimplexQp::new(cov.view(), Array1::zeros(2))
      .with_return_floor(mu.view(), 0.12)
      .solve(&SolverSettings::default())
      .unwrap();
    assert!(mu.dot(&w) >= 0.12 - 1e-7);
    assert_abs_diff_eq!(w[1], 0.7, epsilon = 1e-5);
  }

  #[test]
  fn floor_at_best_mean_picks_the_top_asset() {
    let cov = array![[0.04, 0.01, 0.0], [0.01, 0.09, 0.0], [0.0, 0.0, 0.16]];
    let mu = array![0.05, 0.10, 0.15];
    let w = SimplexQp::new(cov.view(), Array1::zeros(3))
      .with_return_floor(mu.view(), 0.15)
      .solve(&SolverSettings::default())
      .unwrap();
    assert_eq!(w.to_vec(), vec![0.0, 0.0, 1.0]);
  }

  #[test]
  fn unreachable_floor_is_infeasible() {
    let cov = array![[0.04, 0.0], [0.0, 0.09]];
    let mu = array![0.05, 0.15];
    let err = SimplexQp::new(cov.view(), Array1::zeros(2))
      .with_return_floor(mu.view(), 0.2)
      .solve(&SolverSettings::default())
      .unwrap_err();
    assert_eq!(err, SolveFailure::Infeasible);
  }

  #[test]
  fn indefinite_matrix_is_rejected() {
    let bad = array![[1.0, 2.0], [2.0, 1.0]];
    let err = SimplexQp::new(bad.view(), Array1::zeros(2))
      .solve(&SolverSettings::default())
      .unwrap_err();
    assert_eq!(err, SolveFailure::SingularCovariance);
  }

  #[test]
  fn exhausted_budget_is_non_convergent() {
    let cov = array![[0.04, 0.01], [0.01, 0.09]];
    let err = SimplexQp::new(cov.view(), Array1::zeros(2))
      .solve(&SolverSettings {
        max_iterations: 1,
        tolerance: 1e-8,
      })
      .unwrap_err();
    assert!(matches!(err, SolveFailure::NonConvergent { .. }));
  }

  #[test]
  fn duplicated_assets_split_evenly() {
    // rank-deficient: two identical assets plus an independent one
    let cov = array![[0.04, 0.04, 0.0], [0.04, 0.04, 0.0], [0.0, 0.0, 0.04]];
    let w = SimplexQp::new(cov.view(), Array1::zeros(3))
      .solve(&SolverSettings::default())
      .unwrap();
    assert_abs_diff_eq!(w[0] + w[1], 0.5, epsilon = 1e-5);
    assert_abs_diff_eq!(w[2], 0.5, epsilon = 1e-5);
  }

  #[test]
  fn correlated_factor_universe_solves() {
    // 10 assets, 252 days, pairwise correlation near 0.9
    let (n, t) = (10, 252);
    let mut rng = StdRng::seed_from_u64(7);
    let mut returns = Array2::<f64>::zeros((t, n));
    for mut row in returns.rows_mut() {
      let market: f64 = StandardNormal.sample(&mut rng);
      for (j, r) in row.iter_mut().enumerate() {
        let idio: f64 = StandardNormal.sample(&mut rng);
        let vol = 0.01 + 0.002 * j as f64;
        *r = vol * (0.9_f64.sqrt() * market + 0.1_f64.sqrt() * idio);
      }
    }
    let centered = &returns - &returns.mean_axis(Axis(0)).unwrap();
    let cov = centered.t().dot(&centered) / (t - 1) as f64 * 252.0;

    let w = SimplexQp::new(cov.view(), Array1::zeros(n))
      .solve(&SolverSettings::default())
      .unwrap();
    assert_abs_diff_eq!(w.sum(), 1.0, epsilon = 1e-12);

    let var = w.dot(&cov.dot(&w));
    for i in 0..n {
      assert!(var <= cov[[i, i]] + 1e-9);
    }
  }
}
