// Copyright @yucwang 2026

use std::collections::HashSet;

use crate::core::bsdf::{BSDFEvaluation, BSDFEvent, BSDFPdf, BSDFSample, PdfRequest};
use crate::core::computation_node::ComputationNode;
use crate::core::interaction::HitPoint;
use crate::core::material::{Material, MaterialBase};
use crate::core::registry::MaterialRegistry;
use crate::core::texture::TextureRef;
use crate::io::properties::Properties;
use crate::math::constants::{Float, Vector2f, Vector3f};
use crate::math::spectrum::RGBSpectrum;
use crate::materials::microfacet::{fresnel_schlick, ggx_d, ggx_g, pdf_ggx_vndf, sample_ggx_vndf, reflect};

/// GGX rough conductor. Reflects on whichever side the directions lie.
pub struct GlossyMaterial {
    base: MaterialBase,
    ks: TextureRef,
    roughness: TextureRef,
    glossiness: Float,
}

impl GlossyMaterial {
    pub fn new(base: MaterialBase, ks: TextureRef, roughness: TextureRef) -> Self {
        let glossiness = roughness.filter().clamp(0.0, 1.0);
        Self { base, ks, roughness, glossiness }
    }

    fn alpha(&self, hit_point: &HitPoint) -> Float {
        self.roughness.float_value(hit_point).clamp(0.0, 1.0)
    }

    // Density of reaching `wo` from `wi`, both already in the upper hemisphere.
    fn reflection_pdf(wi: &Vector3f, wo: &Vector3f, alpha: Float) -> Float {
        let m = wi + wo;
        if m.norm_squared() <= 0.0 {
            return 0.0;
        }
        let m = m.normalize();
        let denom = 4.0 * wo.dot(&m).abs();
        if denom <= 1e-6 {
            return 0.0;
        }
        pdf_ggx_vndf(wi, &m, alpha) / denom
    }
}

/// Flip a pair of directions into the upper hemisphere.
fn upper(a: &Vector3f, b: &Vector3f) -> Option<(Vector3f, Vector3f)> {
    if a.z * b.z <= 0.0 {
        return None;
    }
    let sign = a.z.signum();
    Some((a * sign, b * sign))
}

impl ComputationNode for GlossyMaterial {
    fn id(&self) -> &str {
        self.base.id()
    }

    fn describe(&self) -> String {
        format!("GlossyMaterial [id={}, ks={}, roughness={}]", self.base.id(), self.ks.id(), self.roughness.id())
    }
}

impl Material for GlossyMaterial {
    fn base(&self) -> &MaterialBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MaterialBase {
        &mut self.base
    }

    fn type_name(&self) -> &'static str {
        "glossy"
    }

    fn event_types(&self) -> BSDFEvent {
        BSDFEvent::GLOSSY | BSDFEvent::REFLECT
    }

    fn glossiness(&self) -> Float {
        self.glossiness
    }

    fn albedo(&self, _registry: &MaterialRegistry, hit_point: &HitPoint) -> RGBSpectrum {
        self.ks.spectrum_value(hit_point).clamp(0.0, 1.0)
    }

    fn evaluate(&self,
                registry: &MaterialRegistry,
                hit_point: &HitPoint,
                local_light_dir: &Vector3f,
                local_eye_dir: &Vector3f) -> BSDFEvaluation {
        let (light, eye) = match upper(local_light_dir, local_eye_dir) {
            Some(dirs) => dirs,
            None => return BSDFEvaluation::default(),
        };
        let cos_l = light.z;
        let cos_e = eye.z;
        if cos_l <= 1e-6 || cos_e <= 1e-6 {
            return BSDFEvaluation::default();
        }

        let m = (light + eye).normalize();
        let alpha = self.alpha(hit_point);
        let f = fresnel_schlick(self.albedo(registry, hit_point), light.dot(&m).abs());
        let d = ggx_d(m.z, alpha);
        let g = ggx_g(cos_l, cos_e, alpha);
        let value = f * (d * g / (4.0 * cos_e));

        let pdf = self.pdf(registry, hit_point, local_light_dir, local_eye_dir, PdfRequest::BOTH);
        BSDFEvaluation {
            value,
            event: self.event_types(),
            direct_pdf_w: pdf.direct.unwrap_or(0.0),
            reverse_pdf_w: pdf.reverse.unwrap_or(0.0),
        }
    }

    fn sample(&self,
              registry: &MaterialRegistry,
              hit_point: &HitPoint,
              local_fixed_dir: &Vector3f,
              u0: Float,
              u1: Float,
              _pass_through_event: Float,
              event_hint: BSDFEvent) -> Option<BSDFSample> {
        if !event_hint.intersects(self.event_types()) || local_fixed_dir.z.abs() <= 1e-6 {
            return None;
        }
        let sign = local_fixed_dir.z.signum();
        let wi = local_fixed_dir * sign;
        let alpha = self.alpha(hit_point);

        let m = sample_ggx_vndf(&wi, &Vector2f::new(u0, u1), alpha);
        let cos_i_m = wi.dot(&m);
        if cos_i_m <= 0.0 {
            return None;
        }
        let wo = reflect(&wi, &m);
        if wo.z <= 1e-6 {
            return None;
        }

        let pdf_w = pdf_ggx_vndf(&wi, &m, alpha) / (4.0 * cos_i_m);
        if pdf_w <= 0.0 {
            return None;
        }
        let f = fresnel_schlick(self.albedo(registry, hit_point), cos_i_m);
        let value = f * (ggx_d(m.z, alpha) * ggx_g(wi.z, wo.z, alpha) * wo.z / (4.0 * wi.z * wo.z * pdf_w));

        Some(BSDFSample::new(value, wo * sign, pdf_w, self.event_types()))
    }

    fn pdf(&self,
           _registry: &MaterialRegistry,
           hit_point: &HitPoint,
           local_light_dir: &Vector3f,
           local_eye_dir: &Vector3f,
           request: PdfRequest) -> BSDFPdf {
        let (fixed, sampled) = if hit_point.from_light {
            (local_light_dir, local_eye_dir)
        } else {
            (local_eye_dir, local_light_dir)
        };
        let (fixed, sampled) = match upper(fixed, sampled) {
            Some(dirs) => dirs,
            None => return BSDFPdf::answer(request, 0.0, 0.0),
        };
        let alpha = self.alpha(hit_point);
        BSDFPdf::answer(request,
                        Self::reflection_pdf(&fixed, &sampled, alpha),
                        Self::reflection_pdf(&sampled, &fixed, alpha))
    }

    fn preprocess(&mut self, _registry: &MaterialRegistry) {
        self.glossiness = self.roughness.filter().clamp(0.0, 1.0);
        self.base.update_avg_pass_through_transparency();
    }

    fn add_referenced_textures(&self, _registry: &MaterialRegistry, referenced: &mut HashSet<TextureRef>) {
        self.base.add_referenced_textures(referenced);
        referenced.insert(self.ks.clone());
        referenced.insert(self.roughness.clone());
    }

    fn update_texture_references(&mut self, registry: &MaterialRegistry, old: &TextureRef, new: &TextureRef) {
        for slot in [&mut self.ks, &mut self.roughness] {
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
        props.set(format!("{}ks", prefix), self.ks.id());
        props.set(format!("{}uroughness", prefix), self.roughness.id());
        props.set(format!("{}vroughness", prefix), self.roughness.id());
        props.merge(self.base.to_properties(registry));
        props
    }
}
