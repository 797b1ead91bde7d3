// Copyright @yucwang 2026

use std::collections::HashSet;

use crate::core::bsdf::{BSDFEvaluation, BSDFEvent, BSDFPdf, BSDFSample, PdfRequest};
use crate::core::computation_node::ComputationNode;
use crate::core::interaction::HitPoint;
use crate::core::material::{Material, MaterialBase};
use crate::core::registry::MaterialRegistry;
use crate::core::texture::TextureRef;
use crate::io::properties::Properties;
use crate::math::constants::{Float, INV_FOUR_PI, Vector2f, Vector3f};
use crate::math::spectrum::RGBSpectrum;
use crate::math::warp::{sample_uniform_sphere, sample_uniform_sphere_pdf};

/// Participating medium with constant coefficients and an isotropic phase function.
pub struct HomogeneousVolume {
    base: MaterialBase,
    absorption: TextureRef,
    scattering: TextureRef,
}

impl HomogeneousVolume {
    pub fn new(base: MaterialBase, absorption: TextureRef, scattering: TextureRef) -> Self {
        Self { base, absorption, scattering }
    }

    pub fn sigma_a(&self, hit_point: &HitPoint) -> RGBSpectrum {
        self.absorption.spectrum_value(hit_point).clamp(0.0, Float::INFINITY)
    }

    pub fn sigma_s(&self, hit_point: &HitPoint) -> RGBSpectrum {
        self.scattering.spectrum_value(hit_point).clamp(0.0, Float::INFINITY)
    }

    pub fn sigma_t(&self, hit_point: &HitPoint) -> RGBSpectrum {
        self.sigma_a(hit_point) + self.sigma_s(hit_point)
    }

    fn scattering_albedo(&self, hit_point: &HitPoint) -> RGBSpectrum {
        let sigma_s = self.sigma_s(hit_point);
        let sigma_t = self.sigma_t(hit_point);
        let ratio = |i: usize| if sigma_t[i] > 0.0 { sigma_s[i] / sigma_t[i] } else { 0.0 };
        RGBSpectrum::new(ratio(0), ratio(1), ratio(2)).clamp(0.0, 1.0)
    }
}

impl ComputationNode for HomogeneousVolume {
    fn id(&self) -> &str {
        self.base.id()
    }

    fn describe(&self) -> String {
        format!("HomogeneousVolume [id={}, absorption={}, scattering={}]",
                self.base.id(), self.absorption.id(), self.scattering.id())
    }
}

impl Material for HomogeneousVolume {
    fn base(&self) -> &MaterialBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MaterialBase {
        &mut self.base
    }

    fn type_name(&self) -> &'static str {
        "homogeneous"
    }

    fn event_types(&self) -> BSDFEvent {
        BSDFEvent::DIFFUSE | BSDFEvent::REFLECT | BSDFEvent::TRANSMIT
    }

    fn is_volume(&self) -> bool {
        true
    }

    fn albedo(&self, _registry: &MaterialRegistry, hit_point: &HitPoint) -> RGBSpectrum {
        self.scattering_albedo(hit_point)
    }

    fn evaluate(&self,
                _registry: &MaterialRegistry,
                hit_point: &HitPoint,
                local_light_dir: &Vector3f,
                local_eye_dir: &Vector3f) -> BSDFEvaluation {
        let event = if local_light_dir.z * local_eye_dir.z > 0.0 {
            BSDFEvent::DIFFUSE | BSDFEvent::REFLECT
        } else {
            BSDFEvent::DIFFUSE | BSDFEvent::TRANSMIT
        };
        BSDFEvaluation {
            value: self.scattering_albedo(hit_point) * INV_FOUR_PI,
            event,
            direct_pdf_w: INV_FOUR_PI,
            reverse_pdf_w: INV_FOUR_PI,
        }
    }

    fn sample(&self,
              _registry: &MaterialRegistry,
              hit_point: &HitPoint,
              local_fixed_dir: &Vector3f,
              u0: Float,
              u1: Float,
              _pass_through_event: Float,
              event_hint: BSDFEvent) -> Option<BSDFSample> {
        if !event_hint.contains(BSDFEvent::DIFFUSE) {
            return None;
        }
        let sampled_dir = sample_uniform_sphere(&Vector2f::new(u0, u1));
        let event = if sampled_dir.z * local_fixed_dir.z > 0.0 {
            BSDFEvent::DIFFUSE | BSDFEvent::REFLECT
        } else {
            BSDFEvent::DIFFUSE | BSDFEvent::TRANSMIT
        };
        Some(BSDFSample::new(self.scattering_albedo(hit_point), sampled_dir, sample_uniform_sphere_pdf(), event))
    }

    fn pdf(&self,
           _registry: &MaterialRegistry,
           _hit_point: &HitPoint,
           _local_light_dir: &Vector3f,
           _local_eye_dir: &Vector3f,
           request: PdfRequest) -> BSDFPdf {
        BSDFPdf::answer(request, INV_FOUR_PI, INV_FOUR_PI)
    }

    fn add_referenced_textures(&self, _registry: &MaterialRegistry, referenced: &mut HashSet<TextureRef>) {
        self.base.add_referenced_textures(referenced);
        referenced.insert(self.absorption.clone());
        referenced.insert(self.scattering.clone());
    }

    fn update_texture_references(&mut self, registry: &MaterialRegistry, old: &TextureRef, new: &TextureRef) {
        for slot in [&mut self.absorption, &mut self.scattering] {
            if slot.ptr_eq(old) {
                *slot = new.clone();
            }
        }
        self.base.update_texture_references(old, new);
        self.preprocess(registry);
    }

    fn to_properties(&self, registry: &MaterialRegistry) -> Properties {
        let prefix = self.base.properties_prefix();
        let mut props = Properties::new();
        props.set(format!("{}type", prefix), self.type_name());
        props.set(format!("{}absorption", prefix), self.absorption.id());
        props.set(format!("{}scattering", prefix), self.scattering.id());
        props.merge(self.base.to_properties(registry));
        props
    }
}
