// Copyright @yucwang 2026

use crate::core::computation_node::{ComputationNode, generate_node_id};
use crate::core::interaction::HitPoint;
use crate::core::texture::Texture;
use crate::math::constants::{Float, PI};
use crate::math::spectrum::RGBSpectrum;

/// Height field `amplitude * sin(2 pi f u) * sin(2 pi f v)`, mostly useful as a bump map.
pub struct WavesTexture {
    id: String,
    amplitude: Float,
    frequency: Float,
}

impl WavesTexture {
    pub fn new(amplitude: Float, frequency: Float, id: Option<String>) -> Self {
        Self { id: id.unwrap_or_else(|| generate_node_id("WavesTexture")), amplitude, frequency }
    }
}

impl ComputationNode for WavesTexture {
    fn id(&self) -> &str {
        &self.id
    }

    fn describe(&self) -> String {
        format!("WavesTexture [id={}, amplitude={}, frequency={}]", self.id, self.amplitude, self.frequency)
    }
}

impl Texture for WavesTexture {
    fn spectrum_value(&self, hit_point: &HitPoint) -> RGBSpectrum {
        RGBSpectrum::splat(self.float_value(hit_point))
    }

    fn float_value(&self, hit_point: &HitPoint) -> Float {
        let w = 2.0 * PI * self.frequency;
        self.amplitude * (w * hit_point.uv.x).sin() * (w * hit_point.uv.y).sin()
    }

    // Zero mean over whole periods.
    fn y(&self) -> Float {
        0.0
    }

    fn filter(&self) -> Float {
        0.0
    }
}
