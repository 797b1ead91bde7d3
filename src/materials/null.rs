// Copyright @yucwang 2026

use crate::core::bsdf::{BSDFEvaluation, BSDFEvent, BSDFPdf, BSDFSample, PdfRequest};
use crate::core::computation_node::ComputationNode;
use crate::core::interaction::HitPoint;
use crate::core::material::{Material, MaterialBase};
use crate::core::registry::MaterialRegistry;
use crate::io::properties::Properties;
use crate::math::constants::{Float, Vector3f};
use crate::math::spectrum::RGBSpectrum;

/// Invisible surface: rays continue straight through.
pub struct NullMaterial {
    base: MaterialBase,
}

impl NullMaterial {
    pub fn new(base: MaterialBase) -> Self {
        Self { base }
    }
}

impl ComputationNode for NullMaterial {
    fn id(&self) -> &str {
        self.base.id()
    }

    fn describe(&self) -> String {
        format!("NullMaterial [id={}]", self.base.id())
    }
}

impl Material for NullMaterial {
    fn base(&self) -> &MaterialBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MaterialBase {
        &mut self.base
    }

    fn type_name(&self) -> &'static str {
        "null"
    }

    fn event_types(&self) -> BSDFEvent {
        BSDFEvent::SPECULAR | BSDFEvent::TRANSMIT
    }

    fn is_delta(&self) -> bool {
        true
    }

    fn pass_through_transparency(&self,
                                 _registry: &MaterialRegistry,
                                 hit_point: &HitPoint,
                                 local_fixed_dir: &Vector3f,
                                 pass_through_event: Float,
                                 back_tracing: bool) -> RGBSpectrum {
        if self.base.has_transparency() {
            self.base.pass_through_transparency(hit_point, local_fixed_dir, pass_through_event, back_tracing)
        } else {
            RGBSpectrum::white()
        }
    }

    fn albedo(&self, _registry: &MaterialRegistry, _hit_point: &HitPoint) -> RGBSpectrum {
        RGBSpectrum::white()
    }

    fn evaluate(&self,
                _registry: &MaterialRegistry,
                _hit_point: &HitPoint,
                _local_light_dir: &Vector3f,
                _local_eye_dir: &Vector3f) -> BSDFEvaluation {
        BSDFEvaluation::default()
    }

    fn sample(&self,
              _registry: &MaterialRegistry,
              _hit_point: &HitPoint,
              local_fixed_dir: &Vector3f,
              _u0: Float,
              _u1: Float,
              _pass_through_event: Float,
              event_hint: BSDFEvent) -> Option<BSDFSample> {
        if !event_hint.contains(BSDFEvent::TRANSMIT) {
            return None;
        }
        Some(BSDFSample::new(RGBSpectrum::white(), -local_fixed_dir, 1.0, self.event_types()))
    }

    fn pdf(&self,
           _registry: &MaterialRegistry,
           _hit_point: &HitPoint,
           _local_light_dir: &Vector3f,
           _local_eye_dir: &Vector3f,
           request: PdfRequest) -> BSDFPdf {
        BSDFPdf::answer(request, 0.0, 0.0)
    }

    fn preprocess(&mut self, _registry: &MaterialRegistry) {
        if self.base.has_transparency() {
            self.base.update_avg_pass_through_transparency();
        } else {
            self.base.set_avg_pass_through_transparency(0.0);
        }
    }

    fn to_properties(&self, registry: &MaterialRegistry) -> Properties {
        let mut props = Properties::new();
        props.set(format!("{}type", self.base.properties_prefix()), self.type_name());
        props.merge(self.base.to_properties(registry));
        props
    }
}
