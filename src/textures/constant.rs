// Copyright @yucwang 2026

use crate::core::computation_node::{ComputationNode, generate_node_id};
use crate::core::interaction::HitPoint;
use crate::core::texture::Texture;
use crate::math::constants::Float;
use crate::math::spectrum::RGBSpectrum;

pub struct ConstantTexture {
    id: String,
    value: RGBSpectrum,
}

impl ConstantTexture {
    pub fn new(value: RGBSpectrum, id: Option<String>) -> Self {
        Self { id: id.unwrap_or_else(|| generate_node_id("ConstantTexture")), value }
    }

    pub fn from_float(value: Float, id: Option<String>) -> Self {
        Self::new(RGBSpectrum::splat(value), id)
    }
}

impl ComputationNode for ConstantTexture {
    fn id(&self) -> &str {
        &self.id
    }

    fn describe(&self) -> String {
        format!("ConstantTexture [id={}]", self.id)
    }
}

impl Texture for ConstantTexture {
    fn spectrum_value(&self, _hit_point: &HitPoint) -> RGBSpectrum {
        self.value
    }

    fn float_value(&self, _hit_point: &HitPoint) -> Float {
        self.value.average()
    }

    fn y(&self) -> Float {
        self.value.y()
    }

    fn filter(&self) -> Float {
        self.value.average()
    }
}
