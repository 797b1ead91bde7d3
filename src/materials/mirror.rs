// Copyright @yucwang 2026

use std::collections::HashSet;

use crate::core::bsdf::{BSDFEvaluation, BSDFEvent, BSDFPdf, BSDFSample, PdfRequest};
use crate::core::computation_node::ComputationNode;
use crate::core::interaction::HitPoint;
use crate::core::material::{Material, MaterialBase};
use crate::core::registry::MaterialRegistry;
use crate::core::texture::TextureRef;
use crate::io::properties::Properties;
use crate::math::constants::{Float, Vector3f};
use crate::math::spectrum::RGBSpectrum;

/// Perfect specular reflector.
pub struct MirrorMaterial {
    base: MaterialBase,
    kr: TextureRef,
}

impl MirrorMaterial {
    pub fn new(base: MaterialBase, kr: TextureRef) -> Self {
        Self { base, kr }
    }
}

impl ComputationNode for MirrorMaterial {
    fn id(&self) -> &str {
        self.base.id()
    }

    fn describe(&self) -> String {
        format!("MirrorMaterial [id={}, kr={}]", self.base.id(), self.kr.id())
    }
}

impl Material for MirrorMaterial {
    fn base(&self) -> &MaterialBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MaterialBase {
        &mut self.base
    }

    fn type_name(&self) -> &'static str {
        "mirror"
    }

    fn event_types(&self) -> BSDFEvent {
        BSDFEvent::SPECULAR | BSDFEvent::REFLECT
    }

    fn is_delta(&self) -> bool {
        true
    }

    fn albedo(&self, _registry: &MaterialRegistry, hit_point: &HitPoint) -> RGBSpectrum {
        self.kr.spectrum_value(hit_point).clamp(0.0, 1.0)
    }

    // A delta lobe has no density to evaluate against.
    fn evaluate(&self,
                _registry: &MaterialRegistry,
                _hit_point: &HitPoint,
                _local_light_dir: &Vector3f,
                _local_eye_dir: &Vector3f) -> BSDFEvaluation {
        BSDFEvaluation::default()
    }

    fn sample(&self,
              registry: &MaterialRegistry,
              hit_point: &HitPoint,
              local_fixed_dir: &Vector3f,
              _u0: Float,
              _u1: Float,
              _pass_through_event: Float,
              event_hint: BSDFEvent) -> Option<BSDFSample> {
        if !event_hint.intersects(BSDFEvent::SPECULAR | BSDFEvent::REFLECT) {
            return None;
        }
        let sampled_dir = Vector3f::new(-local_fixed_dir.x, -local_fixed_dir.y, local_fixed_dir.z);
        Some(BSDFSample::new(self.albedo(registry, hit_point), sampled_dir, 1.0, self.event_types()))
    }

    fn pdf(&self,
           _registry: &MaterialRegistry,
           _hit_point: &HitPoint,
           _local_light_dir: &Vector3f,
           _local_eye_dir: &Vector3f,
           request: PdfRequest) -> BSDFPdf {
        BSDFPdf::answer(request, 0.0, 0.0)
    }

    fn add_referenced_textures(&self, _registry: &MaterialRegistry, referenced: &mut HashSet<TextureRef>) {
        self.base.add_referenced_textures(referenced);
        referenced.insert(self.kr.clone());
    }

    fn update_texture_references(&mut self, registry: &MaterialRegistry, old: &TextureRef, new: &TextureRef) {
        if self.kr.ptr_eq(old) {
            self.kr = new.clone();
        }
        self.base.update_texture_references(old, new);
        self.preprocess(registry);
    }

    fn to_properties(&self, registry: &MaterialRegistry) -> Properties {
        let prefix = self.base.properties_prefix();
        let mut props = Properties::new();
        props.set(format!("{}type", prefix), self.type_name());
        props.set(format!("{}kr", prefix), self.kr.id());
        props.merge(self.base.to_properties(registry));
        props
    }
}
