// Copyright @yucwang 2026

use std::collections::HashSet;
use std::fmt;

use crate::core::bsdf::{BSDFEvaluation, BSDFEvent, BSDFPdf, BSDFSample, PdfRequest};
use crate::core::computation_node::{ComputationNode, generate_node_id};
use crate::core::interaction::HitPoint;
use crate::core::registry::MaterialRegistry;
use crate::core::texture::TextureRef;
use crate::io::properties::Properties;
use crate::math::constants::{Float, Vector3f};
use crate::math::spectrum::RGBSpectrum;

pub const DEFAULT_BUMP_SAMPLE_DISTANCE: Float = 0.001;

/// Handle of a material owned by a [`MaterialRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub(crate) usize);

impl MaterialId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Capability set shared by every node of the material graph.
///
/// Directions are local to `hit_point.frame()`. Queries that may need other
/// materials receive the registry that owns the graph. `evaluate` returns
/// `f * |cos(light)|`, `sample` returns the throughput weight `f * |cos| / pdf`.
pub trait Material: ComputationNode + Send + Sync {
    fn base(&self) -> &MaterialBase;
    fn base_mut(&mut self) -> &mut MaterialBase;

    /// Name of the material kind in property records.
    fn type_name(&self) -> &'static str;

    fn event_types(&self) -> BSDFEvent;

    fn glossiness(&self) -> Float {
        0.0
    }

    fn is_delta(&self) -> bool {
        false
    }

    fn is_volume(&self) -> bool {
        false
    }

    fn is_light_source(&self) -> bool {
        self.base().is_light_source()
    }

    fn has_bump_tex(&self) -> bool {
        self.base().has_bump_tex()
    }

    fn avg_pass_through_transparency(&self) -> Float {
        self.base().avg_pass_through_transparency()
    }

    fn interior_volume(&self, _registry: &MaterialRegistry, _hit_point: &HitPoint) -> Option<MaterialId> {
        self.base().interior_volume
    }

    fn exterior_volume(&self, _registry: &MaterialRegistry, _hit_point: &HitPoint) -> Option<MaterialId> {
        self.base().exterior_volume
    }

    fn pass_through_transparency(&self,
                                 _registry: &MaterialRegistry,
                                 hit_point: &HitPoint,
                                 local_fixed_dir: &Vector3f,
                                 pass_through_event: Float,
                                 back_tracing: bool) -> RGBSpectrum {
        self.base().pass_through_transparency(hit_point, local_fixed_dir, pass_through_event, back_tracing)
    }

    fn emitted_radiance(&self,
                        _registry: &MaterialRegistry,
                        hit_point: &HitPoint,
                        one_over_primitive_area: Float) -> RGBSpectrum {
        self.base().emitted_radiance(hit_point, one_over_primitive_area)
    }

    fn emitted_radiance_y(&self, _registry: &MaterialRegistry, one_over_primitive_area: Float) -> Float {
        self.base().emitted_radiance_y(one_over_primitive_area)
    }

    fn albedo(&self, registry: &MaterialRegistry, hit_point: &HitPoint) -> RGBSpectrum;

    fn evaluate(&self,
                registry: &MaterialRegistry,
                hit_point: &HitPoint,
                local_light_dir: &Vector3f,
                local_eye_dir: &Vector3f) -> BSDFEvaluation;

    #[allow(clippy::too_many_arguments)]
    fn sample(&self,
              registry: &MaterialRegistry,
              hit_point: &HitPoint,
              local_fixed_dir: &Vector3f,
              u0: Float,
              u1: Float,
              pass_through_event: Float,
              event_hint: BSDFEvent) -> Option<BSDFSample>;

    fn pdf(&self,
           registry: &MaterialRegistry,
           hit_point: &HitPoint,
           local_light_dir: &Vector3f,
           local_eye_dir: &Vector3f,
           request: PdfRequest) -> BSDFPdf;

    /// Perturb the shading frame of `hit_point` with this material's own bump map.
    fn bump(&self, hit_point: &mut HitPoint) {
        self.base().bump(hit_point);
    }

    /// Recompute every cached value. Called after construction and after each edit.
    fn preprocess(&mut self, _registry: &MaterialRegistry) {
        self.base_mut().update_avg_pass_through_transparency();
    }

    fn update_material_references(&mut self, registry: &MaterialRegistry, old: MaterialId, new: MaterialId) {
        self.base_mut().update_material_references(old, new);
        self.preprocess(registry);
    }

    fn is_referencing(&self, registry: &MaterialRegistry, material: MaterialId) -> bool {
        self.base().is_referencing(registry, material)
    }

    fn add_referenced_materials(&self, registry: &MaterialRegistry, referenced: &mut HashSet<MaterialId>) {
        self.base().add_referenced_materials(registry, referenced);
    }

    fn add_referenced_textures(&self, _registry: &MaterialRegistry, referenced: &mut HashSet<TextureRef>) {
        self.base().add_referenced_textures(referenced);
    }

    fn update_texture_references(&mut self, registry: &MaterialRegistry, old: &TextureRef, new: &TextureRef) {
        self.base_mut().update_texture_references(old, new);
        self.preprocess(registry);
    }

    fn to_properties(&self, registry: &MaterialRegistry) -> Properties;
}

/// State and behavior every material inherits: override textures,
/// volumes, emission and bump mapping.
#[derive(Clone)]
pub struct MaterialBase {
    id: String,
    /// Opacity seen from the front side, 1 is opaque.
    pub front_transparency: Option<TextureRef>,
    pub back_transparency: Option<TextureRef>,
    pub emission: Option<TextureRef>,
    pub bump: Option<TextureRef>,
    pub interior_volume: Option<MaterialId>,
    pub exterior_volume: Option<MaterialId>,
    pub emission_gain: Float,
    pub emission_normalized_by_area: bool,
    pub bump_sample_distance: Float,
    pub shadow_transparency: Option<RGBSpectrum>,
    avg_pass_through_transparency: Float,
}

impl MaterialBase {
    pub fn new(id: Option<String>, type_name: &str) -> Self {
        Self {
            id: id.unwrap_or_else(|| generate_node_id(type_name)),
            front_transparency: None,
            back_transparency: None,
            emission: None,
            bump: None,
            interior_volume: None,
            exterior_volume: None,
            emission_gain: 1.0,
            emission_normalized_by_area: false,
            bump_sample_distance: DEFAULT_BUMP_SAMPLE_DISTANCE,
            shadow_transparency: None,
            avg_pass_through_transparency: 1.0,
        }
    }

    pub fn with_transparency(mut self, front: Option<TextureRef>, back: Option<TextureRef>) -> Self {
        self.front_transparency = front;
        self.back_transparency = back;
        self
    }

    pub fn with_emission(mut self, emission: Option<TextureRef>) -> Self {
        self.emission = emission;
        self
    }

    pub fn with_bump(mut self, bump: Option<TextureRef>) -> Self {
        self.bump = bump;
        self
    }

    pub fn with_volumes(mut self, interior: Option<MaterialId>, exterior: Option<MaterialId>) -> Self {
        self.interior_volume = interior;
        self.exterior_volume = exterior;
        self
    }

    pub fn with_emission_gain(mut self, gain: Float) -> Self {
        self.emission_gain = gain;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_light_source(&self) -> bool {
        self.emission.is_some()
    }

    pub fn has_bump_tex(&self) -> bool {
        self.bump.is_some()
    }

    pub fn has_transparency(&self) -> bool {
        self.front_transparency.is_some() || self.back_transparency.is_some()
    }

    pub fn avg_pass_through_transparency(&self) -> Float {
        self.avg_pass_through_transparency
    }

    pub fn set_avg_pass_through_transparency(&mut self, value: Float) {
        self.avg_pass_through_transparency = value;
    }

    pub fn update_avg_pass_through_transparency(&mut self) {
        let tex = self.front_transparency.as_ref().or(self.back_transparency.as_ref());
        self.avg_pass_through_transparency = match tex {
            Some(tex) => tex.filter().clamp(0.0, 1.0),
            None => 1.0,
        };
    }

    pub fn pass_through_transparency(&self,
                                     hit_point: &HitPoint,
                                     local_fixed_dir: &Vector3f,
                                     pass_through_event: Float,
                                     back_tracing: bool) -> RGBSpectrum {
        let tex = if local_fixed_dir.z > 0.0 {
            self.front_transparency.as_ref()
        } else {
            self.back_transparency.as_ref()
        };

        let tex = match tex {
            Some(tex) => tex,
            None => return RGBSpectrum::black(),
        };
        let weight = tex.float_value(hit_point).clamp(0.0, 1.0);
        if pass_through_event > weight {
            match (back_tracing, self.shadow_transparency) {
                (true, Some(shadow)) => shadow,
                _ => RGBSpectrum::white(),
            }
        } else {
            RGBSpectrum::black()
        }
    }

    fn emission_scale(&self, one_over_primitive_area: Float) -> Float {
        if self.emission_normalized_by_area {
            self.emission_gain * one_over_primitive_area
        } else {
            self.emission_gain
        }
    }

    pub fn emitted_radiance(&self, hit_point: &HitPoint, one_over_primitive_area: Float) -> RGBSpectrum {
        match &self.emission {
            Some(tex) => {
                let value = tex.spectrum_value(hit_point).clamp(0.0, Float::INFINITY);
                value * self.emission_scale(one_over_primitive_area)
            }
            None => RGBSpectrum::black(),
        }
    }

    pub fn emitted_radiance_y(&self, one_over_primitive_area: Float) -> Float {
        match &self.emission {
            Some(tex) => tex.y().max(0.0) * self.emission_scale(one_over_primitive_area),
            None => 0.0,
        }
    }

    pub fn bump(&self, hit_point: &mut HitPoint) {
        if let Some(tex) = &self.bump {
            let n = tex.bump(hit_point, self.bump_sample_distance);
            hit_point.set_shading_normal(n);
        }
    }

    pub fn update_material_references(&mut self, old: MaterialId, new: MaterialId) {
        if self.interior_volume == Some(old) {
            self.interior_volume = Some(new);
        }
        if self.exterior_volume == Some(old) {
            self.exterior_volume = Some(new);
        }
    }

    fn volumes(&self) -> impl Iterator<Item = MaterialId> {
        self.interior_volume.into_iter().chain(self.exterior_volume)
    }

    pub fn is_referencing(&self, registry: &MaterialRegistry, material: MaterialId) -> bool {
        self.volumes()
            .any(|volume| volume == material || registry[volume].is_referencing(registry, material))
    }

    pub fn add_referenced_materials(&self, registry: &MaterialRegistry, referenced: &mut HashSet<MaterialId>) {
        for volume in self.volumes() {
            if referenced.insert(volume) {
                registry[volume].add_referenced_materials(registry, referenced);
            }
        }
    }

    fn textures(&self) -> impl Iterator<Item = &TextureRef> {
        self.front_transparency.iter()
            .chain(self.back_transparency.iter())
            .chain(self.emission.iter())
            .chain(self.bump.iter())
    }

    pub fn add_referenced_textures(&self, referenced: &mut HashSet<TextureRef>) {
        for tex in self.textures() {
            referenced.insert(tex.clone());
        }
    }

    pub fn update_texture_references(&mut self, old: &TextureRef, new: &TextureRef) {
        for slot in [&mut self.front_transparency, &mut self.back_transparency, &mut self.emission, &mut self.bump] {
            if slot.as_ref().map_or(false, |tex| tex.ptr_eq(old)) {
                *slot = Some(new.clone());
            }
        }
    }

    /// Key prefix of this material in property records.
    pub fn properties_prefix(&self) -> String {
        format!("scene.materials.{}.", self.id)
    }

    pub fn to_properties(&self, registry: &MaterialRegistry) -> Properties {
        let prefix = self.properties_prefix();
        let mut props = Properties::new();

        if let Some(tex) = &self.front_transparency {
            props.set(format!("{}transparency.front", prefix), tex.id());
        }
        if let Some(tex) = &self.back_transparency {
            props.set(format!("{}transparency.back", prefix), tex.id());
        }
        if let Some(shadow) = &self.shadow_transparency {
            props.set(format!("{}transparency.shadow", prefix), spectrum_value(shadow));
        }
        if let Some(tex) = &self.emission {
            props.set(format!("{}emission", prefix), tex.id());
            props.set(format!("{}emission.gain", prefix), self.emission_gain);
            props.set(format!("{}emission.normalizebyarea", prefix), self.emission_normalized_by_area);
        }
        if let Some(tex) = &self.bump {
            props.set(format!("{}bumptex", prefix), tex.id());
            props.set(format!("{}bumpsamplingdistance", prefix), self.bump_sample_distance);
        }
        if let Some(volume) = self.interior_volume {
            props.set(format!("{}volume.interior", prefix), registry[volume].id());
        }
        if let Some(volume) = self.exterior_volume {
            props.set(format!("{}volume.exterior", prefix), registry[volume].id());
        }

        props
    }
}

/// Property text for a spectrum: three space separated components.
pub fn spectrum_value(value: &RGBSpectrum) -> String {
    format!("{} {} {}", value[0], value[1], value[2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::textures::constant::ConstantTexture;

    fn constant(v: Float) -> TextureRef {
        TextureRef::new(ConstantTexture::from_float(v, None))
    }

    #[test]
    fn test_pass_through_picks_side_texture() {
        let base = MaterialBase::new(Some("m".to_string()), "Matte")
            .with_transparency(Some(constant(0.2)), Some(constant(0.9)));
        let hp = HitPoint::default();
        let up = Vector3f::new(0.0, 0.0, 1.0);
        let down = Vector3f::new(0.0, 0.0, -1.0);

        assert_eq!(base.pass_through_transparency(&hp, &up, 0.5, false), RGBSpectrum::white());
        assert_eq!(base.pass_through_transparency(&hp, &down, 0.5, false), RGBSpectrum::black());
    }

    #[test]
    fn test_pass_through_shadow_transparency_on_back_tracing() {
        let mut base = MaterialBase::new(None, "Matte")
            .with_transparency(Some(constant(0.0)), None);
        base.shadow_transparency = Some(RGBSpectrum::splat(0.25));
        let hp = HitPoint::default();
        let up = Vector3f::new(0.0, 0.0, 1.0);
        assert_eq!(base.pass_through_transparency(&hp, &up, 0.5, true), RGBSpectrum::splat(0.25));
        assert_eq!(base.pass_through_transparency(&hp, &up, 0.5, false), RGBSpectrum::white());
    }

    #[test]
    fn test_opaque_without_transparency() {
        let mut base = MaterialBase::new(None, "Matte");
        base.update_avg_pass_through_transparency();
        assert_eq!(base.avg_pass_through_transparency(), 1.0);
        let up = Vector3f::new(0.0, 0.0, 1.0);
        assert!(base.pass_through_transparency(&HitPoint::default(), &up, 0.99, false).is_black());
    }

    #[test]
    fn test_emission_gain_and_area() {
        let mut base = MaterialBase::new(None, "Matte")
            .with_emission(Some(constant(2.0)))
            .with_emission_gain(3.0);
        assert!(base.is_light_source());
        let hp = HitPoint::default();
        assert_eq!(base.emitted_radiance(&hp, 0.5), RGBSpectrum::splat(6.0));
        base.emission_normalized_by_area = true;
        assert_eq!(base.emitted_radiance(&hp, 0.5), RGBSpectrum::splat(3.0));
        assert!((base.emitted_radiance_y(0.5) - 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_texture_substitution_by_identity() {
        let old = constant(0.5);
        let new = constant(0.5);
        let mut base = MaterialBase::new(None, "Matte")
            .with_bump(Some(old.clone()))
            .with_emission(Some(old.clone()));
        base.update_texture_references(&old, &new);
        assert!(base.bump.as_ref().map_or(false, |t| t.ptr_eq(&new)));
        assert!(base.emission.as_ref().map_or(false, |t| t.ptr_eq(&new)));

        let mut set = HashSet::new();
        base.add_referenced_textures(&mut set);
        assert_eq!(set.len(), 1);
        assert!(set.contains(&new));
    }
}
