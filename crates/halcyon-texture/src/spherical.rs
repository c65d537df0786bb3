//! Precomputed diffuse lighting data carried by environment textures.

use std::future::Future;
use std::pin::Pin;

use glam::Vec3;

/// Second-order spherical polynomial approximating irradiance.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SphericalPolynomial {
    pub x: Vec3,
    pub y: Vec3,
    pub z: Vec3,
    pub xx: Vec3,
    pub yy: Vec3,
    pub zz: Vec3,
    pub xy: Vec3,
    pub yz: Vec3,
    pub zx: Vec3,
}

impl SphericalPolynomial {
    /// Constant-color polynomial: only the squared terms are set.
    pub fn uniform(color: Vec3) -> Self {
        Self {
            xx: color,
            yy: color,
            zz: color,
            ..Default::default()
        }
    }

    /// Multiply every coefficient by `factor`.
    pub fn scale(&mut self, factor: f32) {
        for coefficient in self.coefficients_mut() {
            *coefficient *= factor;
        }
    }

    /// Evaluate at a unit direction.
    pub fn evaluate(&self, n: Vec3) -> Vec3 {
        self.x * n.x
            + self.y * n.y
            + self.z * n.z
            + self.xx * (n.x * n.x)
            + self.yy * (n.y * n.y)
            + self.zz * (n.z * n.z)
            + self.xy * (n.x * n.y)
            + self.yz * (n.y * n.z)
            + self.zx * (n.z * n.x)
    }

    fn coefficients_mut(&mut self) -> [&mut Vec3; 9] {
        [
            &mut self.x,
            &mut self.y,
            &mut self.z,
            &mut self.xx,
            &mut self.yy,
            &mut self.zz,
            &mut self.xy,
            &mut self.yz,
            &mut self.zx,
        ]
    }
}

/// A polynomial computation still in flight.
pub type PolynomialFuture = Pin<Box<dyn Future<Output = SphericalPolynomial> + Send + 'static>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_evaluates_to_color_on_axes() {
        let color = Vec3::new(0.5, 0.25, 1.0);
        let polynomial = SphericalPolynomial::uniform(color);
        assert_eq!(polynomial.evaluate(Vec3::X), color);
        assert_eq!(polynomial.evaluate(Vec3::NEG_Z), color);
    }

    #[test]
    fn test_scale() {
        let mut polynomial = SphericalPolynomial::uniform(Vec3::ONE);
        polynomial.scale(2.0);
        assert_eq!(polynomial.xx, Vec3::splat(2.0));
        assert_eq!(polynomial.x, Vec3::ZERO);
    }
}
