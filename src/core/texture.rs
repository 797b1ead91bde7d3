// Copyright @yucwang 2026

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

use crate::core::computation_node::ComputationNode;
use crate::core::interaction::HitPoint;
use crate::math::constants::{Float, Vector2f, Vector3f};
use crate::math::spectrum::RGBSpectrum;

pub trait Texture: ComputationNode + Send + Sync {
    fn spectrum_value(&self, hit_point: &HitPoint) -> RGBSpectrum;

    fn float_value(&self, hit_point: &HitPoint) -> Float {
        self.spectrum_value(hit_point).y()
    }

    /// Average luminance over the whole texture.
    fn y(&self) -> Float;

    /// Average scalar value over the whole texture.
    fn filter(&self) -> Float;

    /// Shading normal perturbed by treating this texture as a height field.
    fn bump(&self, hit_point: &HitPoint, sample_distance: Float) -> Vector3f {
        let du = sample_distance;
        let dv = sample_distance;
        let base = self.float_value(hit_point);

        let mut shifted = hit_point.clone();
        shifted.p = hit_point.p + hit_point.dpdu * du;
        shifted.uv = hit_point.uv + Vector2f::new(du, 0.0);
        let u_displace = self.float_value(&shifted);

        shifted.p = hit_point.p + hit_point.dpdv * dv;
        shifted.uv = hit_point.uv + Vector2f::new(0.0, dv);
        let v_displace = self.float_value(&shifted);

        let dpdu = hit_point.dpdu + hit_point.shade_n * ((u_displace - base) / du);
        let dpdv = hit_point.dpdv + hit_point.shade_n * ((v_displace - base) / dv);
        let n = dpdu.cross(&dpdv);
        if n.norm_squared() <= 1e-12 {
            return hit_point.shade_n;
        }
        let n = n.normalize();
        if n.dot(&hit_point.shade_n) < 0.0 {
            -n
        } else {
            n
        }
    }
}

/// Shared texture handle compared by identity, not by value.
#[derive(Clone)]
pub struct TextureRef(Arc<dyn Texture>);

impl TextureRef {
    pub fn new<T: Texture + 'static>(texture: T) -> Self {
        Self(Arc::new(texture))
    }

    pub fn from_arc(texture: Arc<dyn Texture>) -> Self {
        Self(texture)
    }

    pub fn ptr_eq(&self, other: &TextureRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn address(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl Deref for TextureRef {
    type Target = dyn Texture;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl PartialEq for TextureRef {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl Eq for TextureRef {}

impl Hash for TextureRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

impl fmt::Debug for TextureRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TextureRef").field(&self.0.id()).finish()
    }
}
