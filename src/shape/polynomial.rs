//! Polynomial surfaces: even aspheres, biconics and xy polynomials.
use nalgebra::{Point3, Vector3};
use roots::find_roots_quartic;
use serde::{Deserialize, Serialize};

use super::{
    conic::{conic_line_parameter, conic_sag, conic_sqrt},
    numerical_central_curvature, SurfaceShape,
};
use crate::{
    error::{OpmResult, RaytraceError},
    parameters::{check_finite, unknown_parameter, Optimizable},
    utils::usize_to_f64,
};

/// Relative residual up to which a root of the squared biconic equation counts as surface point.
const BRANCH_TOLERANCE: f64 = 1e-6;

/// Index into the coefficient list for a parameter name like `A4` (`prefix` = `'A'`).
///
/// The coefficient `A<2i+2>` belongs to the term `r^(2i+2)` and is stored at index `i`.
fn even_coefficient_index(name: &str, prefix: char, len: usize) -> Option<usize> {
    let order: usize = name.strip_prefix(prefix)?.parse().ok()?;
    if order < 2 || order % 2 != 0 {
        return None;
    }
    let index = order / 2 - 1;
    (index < len).then_some(index)
}

fn power(base: f64, exponent: usize) -> f64 {
    (0..exponent).fold(1.0, |acc, _| acc * base)
}

fn even_coefficient_name(prefix: char, index: usize) -> String {
    format!("{prefix}{}", 2 * index + 2)
}

/// Product of two polynomials given by their coefficients in ascending order.
fn polynomial_product(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut product = vec![0.0; a.len() + b.len() - 1];
    for (i, ai) in a.iter().enumerate() {
        for (j, bj) in b.iter().enumerate() {
            product[i + j] += ai * bj;
        }
    }
    product
}

/// Coefficients (ascending) of `wx x(t)² + wy y(t)²` along the line `origin + t * direction`.
fn weighted_radius_squared(wx: f64, wy: f64, origin: &Point3<f64>, direction: &Vector3<f64>) -> [f64; 3] {
    let (o, d) = (origin, direction);
    [
        (wx * o.x).mul_add(o.x, wy * o.y * o.y),
        2.0 * (wx * o.x).mul_add(d.x, wy * o.y * d.y),
        (wx * d.x).mul_add(d.x, wy * d.y * d.y),
    ]
}

/// Rotationally symmetric even asphere.
///
/// `z = c r² / (1 + sqrt(1 - (1+k) c² r²)) + Σ A<2i+2> r^(2i+2)`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AsphereShape {
    curvature: f64,
    conic: f64,
    coefficients: Vec<f64>,
}

impl AsphereShape {
    /// Create a new [`AsphereShape`]. `coefficients[i]` is the coefficient of `r^(2i+2)` (`A2`, `A4`, ...).
    ///
    /// # Errors
    /// This function returns an error if any of the given values is not finite.
    pub fn new(curvature: f64, conic: f64, coefficients: Vec<f64>) -> OpmResult<Self> {
        if !curvature.is_finite() || !conic.is_finite() || coefficients.iter().any(|a| !a.is_finite())
        {
            return Err(RaytraceError::Shape(
                "asphere parameters must be finite".into(),
            ));
        }
        Ok(Self {
            curvature,
            conic,
            coefficients,
        })
    }
    /// Returns the polynomial coefficients (`A2`, `A4`, ...).
    #[must_use]
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }
    /// Line parameter of the intersection with the underlying conic.
    pub(crate) fn base_intersection(
        &self,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
    ) -> Option<f64> {
        conic_line_parameter(self.curvature, self.conic, true, origin, direction)
    }
}

impl SurfaceShape for AsphereShape {
    fn sag(&self, x: f64, y: f64) -> f64 {
        let r2 = x.mul_add(x, y * y);
        let mut z = conic_sag(self.curvature, self.conic, r2);
        let mut r_power = r2;
        for a in &self.coefficients {
            z += a * r_power;
            r_power *= r2;
        }
        z
    }
    fn gradient(&self, x: f64, y: f64) -> Vector3<f64> {
        let r2 = x.mul_add(x, y * y);
        let sq = conic_sqrt(self.curvature, self.conic, r2);
        // ∂f/∂x = x * radial_factor, ∂f/∂y = y * radial_factor
        let mut radial_factor = self.curvature / sq;
        let mut r_power = 1.0;
        let mut order = 1.0;
        for a in &self.coefficients {
            radial_factor += 2.0 * order * a * r_power;
            r_power *= r2;
            order += 1.0;
        }
        Vector3::new(-x * radial_factor, -y * radial_factor, 1.0)
    }
    fn central_curvature(&self) -> f64 {
        self.curvature + 2.0 * self.coefficients.first().copied().unwrap_or_default()
    }
    fn kind(&self) -> &'static str {
        "asphere"
    }
}

impl Optimizable for AsphereShape {
    fn parameter_names(&self) -> Vec<String> {
        let mut names = vec!["curvature".to_string(), "conic".to_string()];
        names.extend((0..self.coefficients.len()).map(|i| even_coefficient_name('A', i)));
        names
    }
    fn get_parameter(&self, name: &str) -> OpmResult<f64> {
        match name {
            "curvature" => Ok(self.curvature),
            "conic" => Ok(self.conic),
            _ => even_coefficient_index(name, 'A', self.coefficients.len())
                .map(|i| self.coefficients[i])
                .ok_or_else(|| unknown_parameter(name)),
        }
    }
    fn set_parameter(&mut self, name: &str, value: f64) -> OpmResult<()> {
        check_finite(name, value)?;
        match name {
            "curvature" => self.curvature = value,
            "conic" => self.conic = value,
            _ => {
                let i = even_coefficient_index(name, 'A', self.coefficients.len())
                    .ok_or_else(|| unknown_parameter(name))?;
                self.coefficients[i] = value;
            }
        }
        Ok(())
    }
}

/// Biconic surface with separate curvatures and conic constants in x and y.
///
/// `z = (cx x² + cy y²) / (1 + sqrt(1 - (1+kx) cx² x² - (1+ky) cy² y²)) + Σ A<2i+2> (r² - B<2i+2> (x² - y²))^(i+1)`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BiconicShape {
    curvx: f64,
    curvy: f64,
    ccx: f64,
    ccy: f64,
    coefficients: Vec<(f64, f64)>,
}

impl BiconicShape {
    /// Create a new [`BiconicShape`]. `coefficients[i]` holds the pair `(A<2i+2>, B<2i+2>)`.
    ///
    /// # Errors
    /// This function returns an error if any of the given values is not finite.
    pub fn new(
        curvx: f64,
        curvy: f64,
        ccx: f64,
        ccy: f64,
        coefficients: Vec<(f64, f64)>,
    ) -> OpmResult<Self> {
        let finite = [curvx, curvy, ccx, ccy].iter().all(|v| v.is_finite())
            && coefficients
                .iter()
                .all(|(a, b)| a.is_finite() && b.is_finite());
        if !finite {
            return Err(RaytraceError::Shape(
                "biconic parameters must be finite".into(),
            ));
        }
        Ok(Self {
            curvx,
            curvy,
            ccx,
            ccy,
            coefficients,
        })
    }
    /// Line parameter of the intersection with the biconic without polynomial terms.
    ///
    /// With `q = cx x² + cy y²` and `w = (1+kx) cx² x² + (1+ky) cy² y²` the base sag fulfills
    /// `q² - 2 q z + w z² = 0`, a quartic in the line parameter. Its roots also contain the far branch of the
    /// surface, so only roots that satisfy the sag equation are accepted. Of these, the one closest to `near` wins.
    pub(crate) fn base_intersection(
        &self,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        near: f64,
    ) -> Option<f64> {
        let q = weighted_radius_squared(self.curvx, self.curvy, origin, direction);
        let w = weighted_radius_squared(
            (1.0 + self.ccx) * self.curvx * self.curvx,
            (1.0 + self.ccy) * self.curvy * self.curvy,
            origin,
            direction,
        );
        let z = [origin.z, direction.z];
        let qq = polynomial_product(&q, &q);
        let qz = polynomial_product(&q, &z);
        let wzz = polynomial_product(&w, &polynomial_product(&z, &z));
        let p: Vec<f64> = (0..5)
            .map(|i| {
                let cross = qz.get(i).copied().unwrap_or_default();
                2.0f64.mul_add(-cross, qq[i] + wzz[i])
            })
            .collect();
        let scale = p.iter().fold(0.0, |m: f64, c| m.max(c.abs()));
        if scale == 0.0 {
            return None;
        }
        let base = Self {
            coefficients: Vec::new(),
            ..self.clone()
        };
        find_roots_quartic(p[4] / scale, p[3] / scale, p[2] / scale, p[1] / scale, p[0] / scale)
            .as_ref()
            .iter()
            .copied()
            .filter(|t| {
                let point = origin + *t * direction;
                let residual = point.z - base.sag(point.x, point.y);
                residual.abs() <= BRANCH_TOLERANCE * (1.0 + point.z.abs())
            })
            .min_by(|a, b| (*a - near).abs().total_cmp(&(*b - near).abs()))
    }
    fn sqrt_term(&self, x: f64, y: f64) -> f64 {
        let cx2 = (1.0 + self.ccx) * self.curvx * self.curvx;
        let cy2 = (1.0 + self.ccy) * self.curvy * self.curvy;
        (cx2 * x).mul_add(-x, (cy2 * y).mul_add(-y, 1.0))
    }
}

impl SurfaceShape for BiconicShape {
    fn sag(&self, x: f64, y: f64) -> f64 {
        let s = self.sqrt_term(x, y);
        if s < 0.0 {
            return f64::NAN;
        }
        let mut z = (self.curvx * x).mul_add(x, self.curvy * y * y) / (1.0 + s.sqrt());
        let r2 = x.mul_add(x, y * y);
        let ast2 = x.mul_add(x, -y * y);
        for (i, (a, b)) in self.coefficients.iter().enumerate() {
            z += a * power(b.mul_add(-ast2, r2), i + 1);
        }
        z
    }
    fn gradient(&self, x: f64, y: f64) -> Vector3<f64> {
        let s = self.sqrt_term(x, y).sqrt();
        let d = 1.0 + s;
        let numerator = (self.curvx * x).mul_add(x, self.curvy * y * y);
        let mut fx = 2.0 * self.curvx * x / d
            + numerator * (1.0 + self.ccx) * self.curvx * self.curvx * x / (s * d * d);
        let mut fy = 2.0 * self.curvy * y / d
            + numerator * (1.0 + self.ccy) * self.curvy * self.curvy * y / (s * d * d);
        let r2 = x.mul_add(x, y * y);
        let ast2 = x.mul_add(x, -y * y);
        for (i, (a, b)) in self.coefficients.iter().enumerate() {
            let order = usize_to_f64(i + 1);
            let p = power(b.mul_add(-ast2, r2), i);
            fx += 2.0 * a * order * x * (1.0 - b) * p;
            fy += 2.0 * a * order * y * (1.0 + b) * p;
        }
        Vector3::new(-fx, -fy, 1.0)
    }
    fn central_curvature(&self) -> f64 {
        0.5 * (self.curvx + self.curvy)
    }
    fn kind(&self) -> &'static str {
        "biconic"
    }
}

impl Optimizable for BiconicShape {
    fn parameter_names(&self) -> Vec<String> {
        let mut names: Vec<String> = ["curvx", "curvy", "ccx", "ccy"]
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        names.extend((0..self.coefficients.len()).map(|i| even_coefficient_name('A', i)));
        names.extend((0..self.coefficients.len()).map(|i| even_coefficient_name('B', i)));
        names
    }
    fn get_parameter(&self, name: &str) -> OpmResult<f64> {
        let len = self.coefficients.len();
        match name {
            "curvx" => Ok(self.curvx),
            "curvy" => Ok(self.curvy),
            "ccx" => Ok(self.ccx),
            "ccy" => Ok(self.ccy),
            _ => even_coefficient_index(name, 'A', len)
                .map(|i| self.coefficients[i].0)
                .or_else(|| even_coefficient_index(name, 'B', len).map(|i| self.coefficients[i].1))
                .ok_or_else(|| unknown_parameter(name)),
        }
    }
    fn set_parameter(&mut self, name: &str, value: f64) -> OpmResult<()> {
        check_finite(name, value)?;
        let len = self.coefficients.len();
        match name {
            "curvx" => self.curvx = value,
            "curvy" => self.curvy = value,
            "ccx" => self.ccx = value,
            "ccy" => self.ccy = value,
            _ => {
                if let Some(i) = even_coefficient_index(name, 'A', len) {
                    self.coefficients[i].0 = value;
                } else if let Some(i) = even_coefficient_index(name, 'B', len) {
                    self.coefficients[i].1 = value;
                } else {
                    return Err(unknown_parameter(name));
                }
            }
        }
        Ok(())
    }
}

/// A single term `C x^i y^j` of an [`XyPolynomialShape`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct XyTerm {
    /// power of x
    pub x_power: u8,
    /// power of y
    pub y_power: u8,
    /// coefficient
    pub coefficient: f64,
}

impl XyTerm {
    fn name(&self) -> String {
        format!("CX{}Y{}", self.x_power, self.y_power)
    }
}

/// Polynomial surface `z = Σ C_ij x^i y^j / R^(i+j)` with normalization radius `R`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XyPolynomialShape {
    normradius: f64,
    terms: Vec<XyTerm>,
}

impl XyPolynomialShape {
    /// Create a new [`XyPolynomialShape`].
    ///
    /// # Errors
    /// This function returns an error if the normalization radius is not positive and finite, a coefficient is not
    /// finite or a power combination occurs twice.
    pub fn new(normradius: f64, terms: Vec<XyTerm>) -> OpmResult<Self> {
        if !normradius.is_normal() || normradius < 0.0 {
            return Err(RaytraceError::Shape(
                "normalization radius must be positive and finite".into(),
            ));
        }
        if terms.iter().any(|t| !t.coefficient.is_finite()) {
            return Err(RaytraceError::Shape(
                "polynomial coefficients must be finite".into(),
            ));
        }
        for (i, t) in terms.iter().enumerate() {
            if terms[..i]
                .iter()
                .any(|o| o.x_power == t.x_power && o.y_power == t.y_power)
            {
                return Err(RaytraceError::Shape(format!(
                    "duplicate polynomial term {}",
                    t.name()
                )));
            }
        }
        Ok(Self { normradius, terms })
    }
    fn term_index(&self, name: &str) -> Option<usize> {
        self.terms.iter().position(|t| t.name() == name)
    }
}

impl SurfaceShape for XyPolynomialShape {
    fn sag(&self, x: f64, y: f64) -> f64 {
        let (xn, yn) = (x / self.normradius, y / self.normradius);
        self.terms
            .iter()
            .map(|t| {
                t.coefficient * xn.powi(i32::from(t.x_power)) * yn.powi(i32::from(t.y_power))
            })
            .sum()
    }
    fn gradient(&self, x: f64, y: f64) -> Vector3<f64> {
        let (xn, yn) = (x / self.normradius, y / self.normradius);
        let mut fx = 0.0;
        let mut fy = 0.0;
        for t in &self.terms {
            let (i, j) = (i32::from(t.x_power), i32::from(t.y_power));
            if i >= 1 {
                fx += t.coefficient * f64::from(i) * xn.powi(i - 1) * yn.powi(j);
            }
            if j >= 1 {
                fy += t.coefficient * f64::from(j) * xn.powi(i) * yn.powi(j - 1);
            }
        }
        Vector3::new(-fx / self.normradius, -fy / self.normradius, 1.0)
    }
    fn central_curvature(&self) -> f64 {
        numerical_central_curvature(|x, y| self.sag(x, y))
    }
    fn kind(&self) -> &'static str {
        "xy polynomial"
    }
}

impl Optimizable for XyPolynomialShape {
    fn parameter_names(&self) -> Vec<String> {
        let mut names = vec!["normradius".to_string()];
        names.extend(self.terms.iter().map(XyTerm::name));
        names
    }
    fn get_parameter(&self, name: &str) -> OpmResult<f64> {
        if name == "normradius" {
            return Ok(self.normradius);
        }
        self.term_index(name)
            .map(|i| self.terms[i].coefficient)
            .ok_or_else(|| unknown_parameter(name))
    }
    fn set_parameter(&mut self, name: &str, value: f64) -> OpmResult<()> {
        check_finite(name, value)?;
        if name == "normradius" {
            if value <= 0.0 {
                return Err(RaytraceError::Parameter(
                    "normalization radius must be positive".into(),
                ));
            }
            self.normradius = value;
            return Ok(());
        }
        let i = self
            .term_index(name)
            .ok_or_else(|| unknown_parameter(name))?;
        self.terms[i].coefficient = value;
        Ok(())
    }
}
