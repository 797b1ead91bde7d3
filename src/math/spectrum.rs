// Copyright 2020 @TwoCookingMice

use std::ops::{Add, AddAssign, Div, Index, Mul, MulAssign, Sub};

use super::constants::{Float, Vector3f};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RGBSpectrum {
    rgb: Vector3f
}

impl Default for RGBSpectrum {
    fn default() -> Self {
        Self { rgb: Vector3f::new(0.0f32, 0.0f32, 0.0f32) }
    }
}

impl RGBSpectrum {
    pub fn new(r: Float, g: Float, b: Float) -> Self {
        Self { rgb: Vector3f::new(r, g, b) }
    }

    pub fn splat(v: Float) -> Self {
        Self::new(v, v, v)
    }

    pub fn black() -> Self {
        Self::default()
    }

    pub fn white() -> Self {
        Self::splat(1.0)
    }

    pub fn from_vector(rgb: Vector3f) -> Self {
        Self { rgb }
    }

    pub fn to_vector(&self) -> Vector3f {
        self.rgb
    }

    pub fn is_black(&self) -> bool {
        self.rgb.iter().all(|c| *c == 0.0f32)
    }

    /// Luminance with the Rec. 709 weights.
    pub fn y(&self) -> Float {
        0.212671 * self.rgb.x + 0.715160 * self.rgb.y + 0.072169 * self.rgb.z
    }

    pub fn average(&self) -> Float {
        (self.rgb.x + self.rgb.y + self.rgb.z) / 3.0
    }

    pub fn max_component(&self) -> Float {
        self.rgb.max()
    }

    pub fn clamp(&self, lo: Float, hi: Float) -> Self {
        Self::new(
            self.rgb.x.clamp(lo, hi),
            self.rgb.y.clamp(lo, hi),
            self.rgb.z.clamp(lo, hi),
        )
    }

    pub fn is_finite(&self) -> bool {
        self.rgb.iter().all(|c| c.is_finite())
    }
}

impl Index<usize> for RGBSpectrum {
    type Output = Float;

    fn index(&self, idx: usize) -> &Float {
        &self.rgb[idx]
    }
}

impl Add for RGBSpectrum {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self { rgb: self.rgb + rhs.rgb }
    }
}

impl AddAssign for RGBSpectrum {
    fn add_assign(&mut self, rhs: Self) {
        self.rgb += rhs.rgb;
    }
}

impl Sub for RGBSpectrum {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self { rgb: self.rgb - rhs.rgb }
    }
}

impl Mul for RGBSpectrum {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self { rgb: self.rgb.component_mul(&rhs.rgb) }
    }
}

impl Mul<Float> for RGBSpectrum {
    type Output = Self;

    fn mul(self, rhs: Float) -> Self {
        Self { rgb: self.rgb * rhs }
    }
}

impl MulAssign<Float> for RGBSpectrum {
    fn mul_assign(&mut self, rhs: Float) {
        self.rgb *= rhs;
    }
}

impl Div<Float> for RGBSpectrum {
    type Output = Self;

    fn div(self, rhs: Float) -> Self {
        Self { rgb: self.rgb / rhs }
    }
}
