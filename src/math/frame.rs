// Copyright @yucwang 2023

use crate::math::constants::{ Float, Vector3f };

/// Build two unit tangents orthogonal to `n`.
pub fn coordinate_system(n: &Vector3f) -> (Vector3f, Vector3f) {
    let up = if n.z.abs() < 0.999 {
        Vector3f::new(0.0, 0.0, 1.0)
    } else {
        Vector3f::new(1.0, 0.0, 0.0)
    };
    let tangent = n.cross(&up).normalize();
    let bitangent = n.cross(&tangent).normalize();
    (tangent, bitangent)
}

/// Orthonormal shading frame, `z` is the shading normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub x: Vector3f,
    pub y: Vector3f,
    pub z: Vector3f
}

impl Default for Frame {
    fn default() -> Self {
        Frame {
            x: Vector3f::new(1.0, 0.0, 0.0),
            y: Vector3f::new(0.0, 1.0, 0.0),
            z: Vector3f::new(0.0, 0.0, 1.0)
        }
    }
}

impl Frame {
    pub fn new(new_x: Vector3f, new_y: Vector3f, new_z: Vector3f) -> Frame {
        Frame {
            x: new_x,
            y: new_y,
            z: new_z
        }
    }

    pub fn from_normal(n: &Vector3f) -> Frame {
        let z = n.normalize();
        let (x, y) = coordinate_system(&z);
        Frame::new(x, y, z)
    }

    /// Gram-Schmidt `tangent` against `n`; falls back to an arbitrary
    /// tangent when the two are (nearly) parallel.
    pub fn from_normal_and_tangent(n: &Vector3f, tangent: &Vector3f) -> Frame {
        let z = n.normalize();
        let projected = tangent - z * z.dot(tangent);
        let len2: Float = projected.norm_squared();
        if len2 <= 1e-12 {
            return Frame::from_normal(&z);
        }
        let x = projected / len2.sqrt();
        let y = z.cross(&x);
        Frame::new(x, y, z)
    }

    pub fn to_local(&self, v: &Vector3f) -> Vector3f {
        Vector3f::new(v.dot(&self.x), v.dot(&self.y), v.dot(&self.z))
    }

    pub fn to_world(&self, v: &Vector3f) -> Vector3f {
        v.x * self.x + v.y * self.y + v.z * self.z
    }
}
