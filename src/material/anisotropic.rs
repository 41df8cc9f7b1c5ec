//! Homogeneous anisotropic (birefringent) media
//!
//! For a wave vector `k` (in units of the vacuum wave number) the electric field `E` of a plane wave in a medium
//! with relative dielectric tensor `ε` satisfies `(k kᵀ - |k|² I + ε) E = 0`. At a surface with unit normal `ν`
//! the tangential part `t` of the wave vector is conserved, so the transmitted (or reflected) wave vectors are
//! `k = t + ξ ν` where `ξ` is a real root of the quartic `det(k kᵀ - |k|² I + ε) = 0`.
//! Of these roots only those whose energy flow (Poynting vector `S ∝ |E|² k - (E·k) E`) points away from the
//! surface into the medium are admissible.
use nalgebra::{Matrix3, Vector3};
use roots::{find_roots_quadratic, find_roots_quartic};
use serde::{Deserialize, Serialize};

use crate::{
    error::{OpmResult, RaytraceError},
    parameters::{check_finite, unknown_parameter, Optimizable},
    utils::math_utils::polynomial,
};

/// Minimum normal component of the (unit) energy direction of an admissible wave.
const ADMISSIBLE_LIMIT: f64 = 1e-12;
/// Wave vectors closer than this are considered to be the same solution.
const SAME_WAVE_LIMIT: f64 = 1e-9;

/// Selection policy among the two admissible waves of a birefringent medium.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaveBranch {
    /// wave with the smaller index (e.g. the ordinary wave of a positive uniaxial crystal)
    #[default]
    Fast,
    /// wave with the larger index
    Slow,
}

/// A homogeneous medium with a (real, symmetric, positive definite) relative dielectric tensor.
///
/// The tensor is given in the root frame of the optical system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnisotropicMaterial {
    tensor: Matrix3<f64>,
    branch: WaveBranch,
}

impl AnisotropicMaterial {
    /// Create a new [`AnisotropicMaterial`] from a dielectric tensor.
    ///
    /// # Errors
    /// This function returns an error if the tensor is not finite, not symmetric or not positive definite.
    pub fn new(tensor: Matrix3<f64>) -> OpmResult<Self> {
        if tensor.iter().any(|e| !e.is_finite()) {
            return Err(RaytraceError::Material(
                "dielectric tensor must be finite".into(),
            ));
        }
        if (tensor - tensor.transpose()).amax() > 1e-12 * tensor.amax() {
            return Err(RaytraceError::Material(
                "dielectric tensor must be symmetric".into(),
            ));
        }
        if tensor.symmetric_eigenvalues().iter().any(|e| *e <= 0.0) {
            return Err(RaytraceError::Material(
                "dielectric tensor must be positive definite".into(),
            ));
        }
        Ok(Self {
            tensor,
            branch: WaveBranch::default(),
        })
    }
    /// Create a uniaxial medium with ordinary index `n_o`, extraordinary index `n_e` and the given optic axis.
    ///
    /// # Errors
    /// This function returns an error if an index is < 1.0 or not finite or the optic axis is zero.
    pub fn uniaxial(n_o: f64, n_e: f64, optic_axis: Vector3<f64>) -> OpmResult<Self> {
        if !(n_o.is_finite() && n_e.is_finite() && n_o >= 1.0 && n_e >= 1.0) {
            return Err(RaytraceError::Material(
                "indices must be >=1.0 and finite".into(),
            ));
        }
        let norm = optic_axis.norm();
        if !norm.is_normal() {
            return Err(RaytraceError::Material(
                "optic axis must be finite and non-zero".into(),
            ));
        }
        let a = optic_axis / norm;
        let tensor =
            Matrix3::identity() * (n_o * n_o) + (a * a.transpose()) * n_e.mul_add(n_e, -n_o * n_o);
        Self::new(tensor)
    }
    /// Create a biaxial medium with the principal indices along the root x, y and z axes.
    ///
    /// # Errors
    /// This function returns an error if an index is < 1.0 or not finite.
    pub fn biaxial(n_x: f64, n_y: f64, n_z: f64) -> OpmResult<Self> {
        if [n_x, n_y, n_z].iter().any(|n| !n.is_finite() || *n < 1.0) {
            return Err(RaytraceError::Material(
                "indices must be >=1.0 and finite".into(),
            ));
        }
        Self::new(Matrix3::from_diagonal(&Vector3::new(
            n_x * n_x,
            n_y * n_y,
            n_z * n_z,
        )))
    }
    /// Select the wave branch used for refraction and reflection.
    #[must_use]
    pub const fn with_branch(mut self, branch: WaveBranch) -> Self {
        self.branch = branch;
        self
    }
    /// Returns the dielectric tensor.
    #[must_use]
    pub const fn tensor(&self) -> &Matrix3<f64> {
        &self.tensor
    }
    /// Returns the selected wave branch.
    #[must_use]
    pub const fn branch(&self) -> WaveBranch {
        self.branch
    }
    /// Mean index `sqrt(tr(ε) / 3)`.
    #[must_use]
    pub fn mean_index(&self) -> f64 {
        (self.tensor.trace() / 3.0).sqrt()
    }
    /// Wave refracted into this medium. `facing` is the unit surface normal pointing against the incident ray.
    pub(crate) fn refract(
        &self,
        incident: &Vector3<f64>,
        facing: &Vector3<f64>,
    ) -> Option<(Vector3<f64>, Vector3<f64>)> {
        let into = -facing;
        let tangential = incident - incident.dot(&into) * into;
        self.select(self.admissible_waves(&tangential, &into))
    }
    /// Wave reflected back into this medium. `facing` is the unit surface normal pointing against the incident ray.
    pub(crate) fn reflect(
        &self,
        incident: &Vector3<f64>,
        facing: &Vector3<f64>,
    ) -> Option<(Vector3<f64>, Vector3<f64>)> {
        let tangential = incident - incident.dot(facing) * facing;
        self.select(self.admissible_waves(&tangential, facing))
    }
    /// Wave vector and energy direction of the wave with the given unit wave normal.
    pub(crate) fn wave_along(&self, wave_normal: &Vector3<f64>) -> Option<(Vector3<f64>, Vector3<f64>)> {
        // det(ε + q (u uᵀ - I)) = 0 with q = |k|²
        let u = wave_normal;
        let m = polynomial_matrix(|i, j| {
            vec![self.tensor[(i, j)], u[i].mul_add(u[j], -kronecker(i, j))]
        });
        let p = det3(&m);
        let waves: Vec<(Vector3<f64>, Vector3<f64>)> = find_roots_quadratic(p[2], p[1], p[0])
            .as_ref()
            .iter()
            .filter(|q| **q > 0.0)
            .map(|q| {
                let k = q.sqrt() * u;
                (k, self.energy_direction(&k))
            })
            .collect();
        self.select(waves)
    }
    fn select(
        &self,
        waves: Vec<(Vector3<f64>, Vector3<f64>)>,
    ) -> Option<(Vector3<f64>, Vector3<f64>)> {
        let by_index = |a: &(Vector3<f64>, Vector3<f64>), b: &(Vector3<f64>, Vector3<f64>)| {
            a.0.norm().total_cmp(&b.0.norm())
        };
        match self.branch {
            WaveBranch::Fast => waves.into_iter().min_by(by_index),
            WaveBranch::Slow => waves.into_iter().max_by(by_index),
        }
    }
    /// All admissible waves `k = t + ξ ν` propagating into the half space given by `into`.
    fn admissible_waves(
        &self,
        tangential: &Vector3<f64>,
        into: &Vector3<f64>,
    ) -> Vec<(Vector3<f64>, Vector3<f64>)> {
        let t = tangential;
        let nu = into;
        let t_nu = t.dot(nu);
        let t_sq = t.norm_squared();
        // k kᵀ - |k|² I + ε as polynomial in ξ
        let m = polynomial_matrix(|i, j| {
            let delta = kronecker(i, j);
            vec![
                delta.mul_add(-t_sq, t[i].mul_add(t[j], self.tensor[(i, j)])),
                (2.0 * delta).mul_add(-t_nu, t[i].mul_add(nu[j], nu[i] * t[j])),
                nu[i].mul_add(nu[j], -delta),
            ]
        });
        let p = det3(&m);
        let quartic = &p[..5];
        let mut waves: Vec<(Vector3<f64>, Vector3<f64>)> = Vec::with_capacity(2);
        for xi in find_roots_quartic(p[4], p[3], p[2], p[1], p[0]).as_ref() {
            let k = t + polish_root(quartic, *xi) * nu;
            let s = self.energy_direction(&k);
            if s.dot(nu) > ADMISSIBLE_LIMIT && !waves.iter().any(|w| (w.0 - k).norm() < SAME_WAVE_LIMIT)
            {
                waves.push((k, s));
            }
        }
        waves
    }
    /// Unit Poynting vector of the eigenwave with wave vector `k`.
    fn energy_direction(&self, k: &Vector3<f64>) -> Vector3<f64> {
        let m = k * k.transpose() - Matrix3::identity() * k.norm_squared() + self.tensor;
        let rows = [
            m.row(0).transpose(),
            m.row(1).transpose(),
            m.row(2).transpose(),
        ];
        let scale = rows.iter().map(|r| r.norm()).fold(0.0, f64::max);
        let candidates = [
            rows[0].cross(&rows[1]),
            rows[0].cross(&rows[2]),
            rows[1].cross(&rows[2]),
        ];
        let e = candidates
            .iter()
            .max_by(|a, b| a.norm().total_cmp(&b.norm()))
            .copied()
            .unwrap_or_else(Vector3::zeros);
        if e.norm() <= 1e-10 * scale * scale {
            // degenerate eigenwave: all fields transverse, energy flows along k
            return k.normalize();
        }
        let e = e.normalize();
        (k - e * e.dot(k)).normalize()
    }
    fn components(&self) -> [(&'static str, (usize, usize)); 6] {
        [
            ("exx", (0, 0)),
            ("eyy", (1, 1)),
            ("ezz", (2, 2)),
            ("exy", (0, 1)),
            ("exz", (0, 2)),
            ("eyz", (1, 2)),
        ]
    }
}

const fn kronecker(i: usize, j: usize) -> f64 {
    if i == j {
        1.0
    } else {
        0.0
    }
}

type PolyMatrix = [[Vec<f64>; 3]; 3];

fn polynomial_matrix(entry: impl Fn(usize, usize) -> Vec<f64>) -> PolyMatrix {
    std::array::from_fn(|i| std::array::from_fn(|j| entry(i, j)))
}

fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut r = vec![0.0; a.len() + b.len() - 1];
    for (i, ai) in a.iter().enumerate() {
        for (j, bj) in b.iter().enumerate() {
            r[i + j] = ai.mul_add(*bj, r[i + j]);
        }
    }
    r
}

fn poly_add(a: &[f64], b: &[f64], sign: f64) -> Vec<f64> {
    (0..a.len().max(b.len()))
        .map(|i| {
            let bi = b.get(i).copied().unwrap_or_default();
            sign.mul_add(bi, a.get(i).copied().unwrap_or_default())
        })
        .collect()
}

/// Determinant of a 3x3 matrix of polynomials (ascending coefficients), padded to at least 7 coefficients.
fn det3(m: &PolyMatrix) -> Vec<f64> {
    let minor = |r1: usize, c1: usize, r2: usize, c2: usize| {
        poly_add(
            &poly_mul(&m[r1][c1], &m[r2][c2]),
            &poly_mul(&m[r1][c2], &m[r2][c1]),
            -1.0,
        )
    };
    let t0 = poly_mul(&m[0][0], &minor(1, 1, 2, 2));
    let t1 = poly_mul(&m[0][1], &minor(1, 0, 2, 2));
    let t2 = poly_mul(&m[0][2], &minor(1, 0, 2, 1));
    let mut det = poly_add(&poly_add(&t0, &t1, -1.0), &t2, 1.0);
    det.resize(det.len().max(7), 0.0);
    det
}

/// A few Newton steps on the polynomial to recover the accuracy lost by the closed-form quartic solution.
fn polish_root(coeffs: &[f64], root: f64) -> f64 {
    let derivative: Vec<f64> = coeffs
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, c)| crate::utils::usize_to_f64(i) * c)
        .collect();
    let mut x = root;
    for _ in 0..3 {
        let d = polynomial(&derivative, x);
        if !d.is_normal() {
            break;
        }
        let step = polynomial(coeffs, x) / d;
        if !step.is_finite() || step.abs() > 1e-3 * x.abs().max(1.0) {
            break;
        }
        x -= step;
    }
    x
}

impl Optimizable for AnisotropicMaterial {
    fn parameter_names(&self) -> Vec<String> {
        self.components()
            .iter()
            .map(|(name, _)| (*name).to_string())
            .collect()
    }
    fn get_parameter(&self, name: &str) -> OpmResult<f64> {
        self.components()
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, idx)| self.tensor[*idx])
            .ok_or_else(|| unknown_parameter(name))
    }
    fn set_parameter(&mut self, name: &str, value: f64) -> OpmResult<()> {
        check_finite(name, value)?;
        let (i, j) = self
            .components()
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, idx)| *idx)
            .ok_or_else(|| unknown_parameter(name))?;
        let mut tensor = self.tensor;
        tensor[(i, j)] = value;
        tensor[(j, i)] = value;
        self.tensor = Self::new(tensor)?.tensor;
        Ok(())
    }
}
