// Copyright @yucwang 2023

use crate::math::constants::{ Float, Vector2f, Vector3f };
use crate::math::frame::Frame;

/// Shading point handed to every material query.
///
/// Directions passed alongside a hit point are expressed in the frame
/// returned by [`HitPoint::frame`].
#[derive(Debug, Clone, PartialEq)]
pub struct HitPoint {
    pub p: Vector3f,
    pub uv: Vector2f,
    pub geometry_n: Vector3f,
    pub shade_n: Vector3f,
    pub dpdu: Vector3f,
    pub dpdv: Vector3f,
    /// The traced ray enters the object through the front facing side.
    pub into_object: bool,
    /// The path this point belongs to was started at a light.
    pub from_light: bool,
    pub pass_through_event: Float,
}

impl Default for HitPoint {
    fn default() -> Self {
        Self {
            p: Vector3f::zeros(),
            uv: Vector2f::zeros(),
            geometry_n: Vector3f::new(0.0, 0.0, 1.0),
            shade_n: Vector3f::new(0.0, 0.0, 1.0),
            dpdu: Vector3f::new(1.0, 0.0, 0.0),
            dpdv: Vector3f::new(0.0, 1.0, 0.0),
            into_object: true,
            from_light: false,
            pass_through_event: 0.0,
        }
    }
}

impl HitPoint {
    pub fn new(new_p: Vector3f,
               new_uv: Vector2f,
               new_geometry_n: Vector3f,
               new_shade_n: Vector3f,
               new_dpdu: Vector3f,
               new_dpdv: Vector3f) -> Self {
        Self { p: new_p, uv: new_uv, geometry_n: new_geometry_n, shade_n: new_shade_n,
               dpdu: new_dpdu, dpdv: new_dpdv, ..Self::default() }
    }

    pub fn with_into_object(mut self, into_object: bool) -> Self {
        self.into_object = into_object;
        self
    }

    pub fn with_from_light(mut self, from_light: bool) -> Self {
        self.from_light = from_light;
        self
    }

    pub fn with_pass_through_event(mut self, pass_through_event: Float) -> Self {
        self.pass_through_event = pass_through_event;
        self
    }

    pub fn with_uv(mut self, uv: Vector2f) -> Self {
        self.uv = uv;
        self
    }

    /// Local shading frame: `z` is the shading normal, `x` follows `dpdu`.
    pub fn frame(&self) -> Frame {
        Frame::from_normal_and_tangent(&self.shade_n, &self.dpdu)
    }

    /// Replace the shading normal and rebuild orthonormal surface tangents.
    pub fn set_shading_normal(&mut self, n: Vector3f) {
        let frame = Frame::from_normal_and_tangent(&n, &self.dpdu);
        self.shade_n = frame.z;
        self.dpdu = frame.x;
        self.dpdv = frame.y;
    }
}
