// Copyright @yucwang 2023

use std::collections::HashSet;

use crate::core::bsdf::{BSDFEvaluation, BSDFEvent, BSDFPdf, BSDFSample, PdfRequest};
use crate::core::computation_node::ComputationNode;
use crate::core::interaction::HitPoint;
use crate::core::material::{Material, MaterialBase};
use crate::core::registry::MaterialRegistry;
use crate::core::texture::TextureRef;
use crate::io::properties::Properties;
use crate::math::constants::{ EPSILON, Float, INV_PI, Vector2f, Vector3f };
use crate::math::spectrum::RGBSpectrum;
use crate::math::warp::{ sample_cosine_hemisphere, sample_cosine_hemisphere_pdf };

/// Lambertian reflector on both sides of the surface.
pub struct MatteMaterial {
    base: MaterialBase,
    kd: TextureRef,
}

impl MatteMaterial {
    pub fn new(base: MaterialBase, kd: TextureRef) -> Self {
        Self { base, kd }
    }

    fn reflectance(&self, hit_point: &HitPoint) -> RGBSpectrum {
        self.kd.spectrum_value(hit_point).clamp(0.0, 1.0)
    }
}

impl ComputationNode for MatteMaterial {
    fn id(&self) -> &str {
        self.base.id()
    }

    fn describe(&self) -> String {
        format!("MatteMaterial [id={}, kd={}]", self.base.id(), self.kd.id())
    }
}

impl Material for MatteMaterial {
    fn base(&self) -> &MaterialBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MaterialBase {
        &mut self.base
    }

    fn type_name(&self) -> &'static str {
        "matte"
    }

    fn event_types(&self) -> BSDFEvent {
        BSDFEvent::DIFFUSE | BSDFEvent::REFLECT
    }

    fn albedo(&self, _registry: &MaterialRegistry, hit_point: &HitPoint) -> RGBSpectrum {
        self.reflectance(hit_point)
    }

    fn evaluate(&self,
                registry: &MaterialRegistry,
                hit_point: &HitPoint,
                local_light_dir: &Vector3f,
                local_eye_dir: &Vector3f) -> BSDFEvaluation {
        if local_light_dir.z.abs() < EPSILON
            || local_eye_dir.z.abs() < EPSILON
            || local_light_dir.z * local_eye_dir.z <= 0.0 {
            return BSDFEvaluation::default();
        }

        let pdf = self.pdf(registry, hit_point, local_light_dir, local_eye_dir, PdfRequest::BOTH);
        BSDFEvaluation {
            value: self.reflectance(hit_point) * (INV_PI * local_light_dir.z.abs()),
            event: self.event_types(),
            direct_pdf_w: pdf.direct.unwrap_or(0.0),
            reverse_pdf_w: pdf.reverse.unwrap_or(0.0),
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
        if !event_hint.intersects(BSDFEvent::DIFFUSE | BSDFEvent::REFLECT) || local_fixed_dir.z.abs() < EPSILON {
            return None;
        }

        let mut sampled_dir = sample_cosine_hemisphere(&Vector2f::new(u0, u1));
        if local_fixed_dir.z < 0.0 {
            sampled_dir.z = -sampled_dir.z;
        }
        if sampled_dir.z.abs() < EPSILON {
            return None;
        }
        let pdf_w = sample_cosine_hemisphere_pdf(sampled_dir.z.abs());

        Some(BSDFSample::new(self.reflectance(hit_point), sampled_dir, pdf_w, self.event_types()))
    }

    fn pdf(&self,
           _registry: &MaterialRegistry,
           hit_point: &HitPoint,
           local_light_dir: &Vector3f,
           local_eye_dir: &Vector3f,
           request: PdfRequest) -> BSDFPdf {
        // Each density is the cosine of the direction it produces.
        let (fixed_dir, sampled_dir) = if hit_point.from_light {
            (local_light_dir, local_eye_dir)
        } else {
            (local_eye_dir, local_light_dir)
        };
        BSDFPdf::answer(request,
                        sample_cosine_hemisphere_pdf(sampled_dir.z.abs()),
                        sample_cosine_hemisphere_pdf(fixed_dir.z.abs()))
    }

    fn add_referenced_textures(&self, _registry: &MaterialRegistry, referenced: &mut HashSet<TextureRef>) {
        self.base.add_referenced_textures(referenced);
        referenced.insert(self.kd.clone());
    }

    fn update_texture_references(&mut self, registry: &MaterialRegistry, old: &TextureRef, new: &TextureRef) {
        if self.kd.ptr_eq(old) {
            self.kd = new.clone();
        }
        self.base.update_texture_references(old, new);
        self.preprocess(registry);
    }

    fn to_properties(&self, registry: &MaterialRegistry) -> Properties {
        let prefix = self.base.properties_prefix();
        let mut props = Properties::new();
        props.set(format!("{}type", prefix), self.type_name());
        props.set(format!("{}kd", prefix), self.kd.id());
        props.merge(self.base.to_properties(registry));
        props
    }
}

#[cfg(test)]
mod tests {
    use super::MatteMaterial;
    use crate::core::bsdf::{BSDFEvent, PdfRequest};
    use crate::core::interaction::HitPoint;
    use crate::core::material::{Material, MaterialBase};
    use crate::core::registry::MaterialRegistry;
    use crate::core::texture::TextureRef;
    use crate::math::constants::{INV_PI, Vector3f};
    use crate::math::spectrum::RGBSpectrum;
    use crate::textures::constant::ConstantTexture;

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-5, "expected {} ≈ {}", a, b);
    }

    fn matte(kd: f32) -> MatteMaterial {
        let tex = TextureRef::new(ConstantTexture::from_float(kd, None));
        MatteMaterial::new(MaterialBase::new(None, "Matte"), tex)
    }

    #[test]
    fn test_evaluate_same_hemisphere() {
        let registry = MaterialRegistry::new();
        let m = matte(0.5);
        let hp = HitPoint::default();
        let light = Vector3f::new(0.0, 0.6, 0.8);
        let eye = Vector3f::new(0.0, 0.0, 1.0);
        let eval = m.evaluate(&registry, &hp, &light, &eye);
        assert_close(eval.value[0], 0.5 * INV_PI * 0.8);
        assert_close(eval.direct_pdf_w, 0.8 * INV_PI);
        assert_close(eval.reverse_pdf_w, INV_PI);
        assert_eq!(eval.event, BSDFEvent::DIFFUSE | BSDFEvent::REFLECT);

        let below = Vector3f::new(0.0, 0.6, -0.8);
        assert!(m.evaluate(&registry, &hp, &below, &eye).is_black());
        // Both below is still a reflection.
        assert!(!m.evaluate(&registry, &hp, &below, &-eye).is_black());
    }

    #[test]
    fn test_sample_follows_fixed_side() {
        let registry = MaterialRegistry::new();
        let m = matte(0.25);
        let hp = HitPoint::default();
        let fixed = Vector3f::new(0.1, 0.2, -0.97).normalize();
        let sample = m.sample(&registry, &hp, &fixed, 0.3, 0.8, 0.0, BSDFEvent::all()).unwrap();
        assert!(sample.sampled_dir.z < 0.0);
        assert_eq!(sample.value, RGBSpectrum::splat(0.25));
        assert_close(sample.pdf_w, sample.sampled_dir.z.abs() * INV_PI);

        assert!(m.sample(&registry, &hp, &fixed, 0.3, 0.8, 0.0, BSDFEvent::SPECULAR).is_none());
    }

    #[test]
    fn test_pdf_direction_roles() {
        let registry = MaterialRegistry::new();
        let m = matte(0.5);
        let light = Vector3f::new(0.0, 0.6, 0.8);
        let eye = Vector3f::new(0.0, 0.0, 1.0);

        let eye_path = m.pdf(&registry, &HitPoint::default(), &light, &eye, PdfRequest::BOTH);
        assert_close(eye_path.direct.unwrap(), 0.8 * INV_PI);
        assert_close(eye_path.reverse.unwrap(), INV_PI);

        let light_path = m.pdf(&registry, &HitPoint::default().with_from_light(true), &light, &eye, PdfRequest::DIRECT);
        assert_close(light_path.direct.unwrap(), INV_PI);
        assert_eq!(light_path.reverse, None);
    }
}
