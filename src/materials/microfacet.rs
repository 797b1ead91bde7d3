// Copyright @yucwang 2026

use crate::math::constants::{Float, Vector2f, Vector3f, PI};
use crate::math::spectrum::RGBSpectrum;

const MIN_ALPHA: Float = 1e-4;

pub fn ggx_d(cos_theta: Float, alpha: Float) -> Float {
    if cos_theta <= 0.0 {
        return 0.0;
    }
    let a = alpha.max(MIN_ALPHA);
    let a2 = a * a;
    let cos2 = cos_theta * cos_theta;
    let denom = cos2 * (a2 - 1.0) + 1.0;
    a2 / (PI * denom * denom)
}

/// Smith masking for one direction, `cos_theta` measured from the normal.
pub fn ggx_g1(cos_theta: Float, alpha: Float) -> Float {
    if cos_theta <= 0.0 {
        return 0.0;
    }
    let a = alpha.max(MIN_ALPHA);
    let cos2 = cos_theta * cos_theta;
    let sin2 = (1.0 - cos2).max(0.0);
    if sin2 <= 0.0 {
        return 1.0;
    }
    let tan2 = sin2 / cos2.max(1e-6);
    2.0 / (1.0 + (1.0 + a * a * tan2).sqrt())
}

pub fn ggx_g(cos_i: Float, cos_o: Float, alpha: Float) -> Float {
    ggx_g1(cos_i.abs(), alpha) * ggx_g1(cos_o.abs(), alpha)
}

/// Density of the visible normal `m` seen from `wi`, both in the upper hemisphere.
pub fn pdf_ggx_vndf(wi: &Vector3f, m: &Vector3f, alpha: Float) -> Float {
    if wi.z <= 1e-6 || m.z <= 0.0 {
        return 0.0;
    }
    ggx_d(m.z, alpha) * ggx_g1(wi.z, alpha) * wi.dot(m).abs() / wi.z
}

pub fn sample_ggx_vndf(wi: &Vector3f, u: &Vector2f, alpha: Float) -> Vector3f {
    let a = alpha.max(MIN_ALPHA);
    let wi = Vector3f::new(a * wi.x, a * wi.y, wi.z).normalize();

    let t1 = if wi.z < 0.9999 {
        Vector3f::new(0.0, 0.0, 1.0).cross(&wi).normalize()
    } else {
        Vector3f::new(1.0, 0.0, 0.0)
    };
    let t2 = wi.cross(&t1);

    let r = u.x.clamp(0.0, 1.0).sqrt();
    let phi = 2.0 * PI * u.y.clamp(0.0, 1.0);
    let t1p = r * phi.cos();
    let s = 0.5 * (1.0 + wi.z);
    let t2p = (1.0 - s) * (1.0 - t1p * t1p).max(0.0).sqrt() + s * r * phi.sin();

    let nh = t1 * t1p + t2 * t2p + wi * (1.0 - t1p * t1p - t2p * t2p).max(0.0).sqrt();
    Vector3f::new(a * nh.x, a * nh.y, nh.z.max(0.0)).normalize()
}

pub fn reflect(wi: &Vector3f, m: &Vector3f) -> Vector3f {
    2.0 * wi.dot(m) * m - wi
}

pub fn fresnel_schlick(f0: RGBSpectrum, cos_theta: Float) -> RGBSpectrum {
    let one_minus = (1.0 - cos_theta.clamp(0.0, 1.0)).powi(5);
    f0 + (RGBSpectrum::white() - f0) * one_minus
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vndf_sample_is_visible() {
        let wi = Vector3f::new(0.4, 0.1, 0.9).normalize();
        for (a, b) in [(0.1, 0.2), (0.7, 0.3), (0.95, 0.95)] {
            let m = sample_ggx_vndf(&wi, &Vector2f::new(a, b), 0.3);
            assert!((m.norm() - 1.0).abs() < 1e-4);
            assert!(m.z >= 0.0);
            assert!(pdf_ggx_vndf(&wi, &m, 0.3) >= 0.0);
        }
    }

    #[test]
    fn test_reflect_about_normal() {
        let wi = Vector3f::new(0.6, 0.0, 0.8);
        let r = reflect(&wi, &Vector3f::new(0.0, 0.0, 1.0));
        assert!((r - Vector3f::new(-0.6, 0.0, 0.8)).norm() < 1e-6);
    }

    #[test]
    fn test_schlick_limits() {
        let f0 = RGBSpectrum::splat(0.04);
        assert!((fresnel_schlick(f0, 1.0)[0] - 0.04).abs() < 1e-6);
        assert!((fresnel_schlick(f0, 0.0)[0] - 1.0).abs() < 1e-6);
    }
}
