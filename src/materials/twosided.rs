// Copyright @yucwang 2026

use std::borrow::Cow;
use std::collections::HashSet;

use log::{debug, trace};

use crate::core::bsdf::{BSDFEvaluation, BSDFEvent, BSDFPdf, BSDFSample, PdfRequest};
use crate::core::computation_node::ComputationNode;
use crate::core::interaction::HitPoint;
use crate::core::material::{Material, MaterialBase, MaterialId};
use crate::core::registry::{MaterialRegistry, RegistryError};
use crate::core::texture::TextureRef;
use crate::io::properties::Properties;
use crate::math::constants::{Float, Vector3f};
use crate::math::frame::Frame;
use crate::math::spectrum::RGBSpectrum;

/// Material with one child for the front face and one for the back face.
///
/// Queries carrying a hit point are routed by `HitPoint::into_object`; the
/// children are handles into the registry and are never owned.
pub struct TwoSidedMaterial {
    base: MaterialBase,
    front: MaterialId,
    back: MaterialId,

    event_types: BSDFEvent,
    glossiness: Float,
    is_light_source: bool,
    has_bump_tex: bool,
    is_delta: bool,
}

impl TwoSidedMaterial {
    pub fn new(base: MaterialBase,
               front: MaterialId,
               back: MaterialId,
               registry: &MaterialRegistry) -> Result<Self, RegistryError> {
        for child in [front, back] {
            if !registry.contains(child) {
                return Err(RegistryError::DanglingHandle(child));
            }
        }

        let mut material = Self {
            base,
            front,
            back,
            event_types: BSDFEvent::empty(),
            glossiness: 0.0,
            is_light_source: false,
            has_bump_tex: false,
            is_delta: false,
        };
        material.preprocess(registry);
        Ok(material)
    }

    pub fn front(&self) -> MaterialId {
        self.front
    }

    pub fn back(&self) -> MaterialId {
        self.back
    }

    fn select<'r>(&self, registry: &'r MaterialRegistry, hit_point: &HitPoint) -> &'r dyn Material {
        if hit_point.into_object {
            &registry[self.front]
        } else {
            &registry[self.back]
        }
    }
}

/// Hit point and directions as seen by one child, in that child's bumped frame.
struct ChildView<'a, const N: usize> {
    hit_point: Cow<'a, HitPoint>,
    dirs: [Vector3f; N],
    // (caller frame, child frame), only when the child bumps.
    frames: Option<(Frame, Frame)>,
}

impl<'a, const N: usize> ChildView<'a, N> {
    fn new(child: &dyn Material, hit_point: &'a HitPoint, dirs: [Vector3f; N]) -> Self {
        if !child.has_bump_tex() {
            return Self { hit_point: Cow::Borrowed(hit_point), dirs, frames: None };
        }

        let frame = hit_point.frame();
        let mut bumped = hit_point.clone();
        child.bump(&mut bumped);
        let bumped_frame = bumped.frame();
        let dirs = dirs.map(|d| bumped_frame.to_local(&frame.to_world(&d)));

        Self {
            hit_point: Cow::Owned(bumped),
            dirs,
            frames: Some((frame, bumped_frame)),
        }
    }

    /// Map a direction from the child's bumped frame into the caller's `hit_point.frame()`.
    fn to_caller(&self, dir: Vector3f) -> Vector3f {
        match &self.frames {
            Some((frame, bumped_frame)) => frame.to_local(&bumped_frame.to_world(&dir)),
            None => dir,
        }
    }
}

impl ComputationNode for TwoSidedMaterial {
    fn id(&self) -> &str {
        self.base.id()
    }

    fn describe(&self) -> String {
        format!("TwoSidedMaterial [id={}, front={}, back={}]", self.base.id(), self.front, self.back)
    }
}

impl Material for TwoSidedMaterial {
    fn base(&self) -> &MaterialBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MaterialBase {
        &mut self.base
    }

    fn type_name(&self) -> &'static str {
        "twosided"
    }

    fn event_types(&self) -> BSDFEvent {
        self.event_types
    }

    fn glossiness(&self) -> Float {
        self.glossiness
    }

    fn is_delta(&self) -> bool {
        self.is_delta
    }

    fn is_light_source(&self) -> bool {
        self.is_light_source
    }

    fn has_bump_tex(&self) -> bool {
        self.has_bump_tex
    }

    fn interior_volume(&self, registry: &MaterialRegistry, hit_point: &HitPoint) -> Option<MaterialId> {
        self.base
            .interior_volume
            .or_else(|| self.select(registry, hit_point).interior_volume(registry, hit_point))
    }

    fn exterior_volume(&self, registry: &MaterialRegistry, hit_point: &HitPoint) -> Option<MaterialId> {
        self.base
            .exterior_volume
            .or_else(|| self.select(registry, hit_point).exterior_volume(registry, hit_point))
    }

    fn pass_through_transparency(&self,
                                 registry: &MaterialRegistry,
                                 hit_point: &HitPoint,
                                 local_fixed_dir: &Vector3f,
                                 pass_through_event: Float,
                                 back_tracing: bool) -> RGBSpectrum {
        if self.base.has_transparency() {
            return self.base.pass_through_transparency(hit_point, local_fixed_dir, pass_through_event, back_tracing);
        }
        self.select(registry, hit_point)
            .pass_through_transparency(registry, hit_point, local_fixed_dir, pass_through_event, back_tracing)
    }

    fn emitted_radiance(&self,
                        registry: &MaterialRegistry,
                        hit_point: &HitPoint,
                        one_over_primitive_area: Float) -> RGBSpectrum {
        if self.base.emission.is_some() {
            return self.base.emitted_radiance(hit_point, one_over_primitive_area);
        }
        self.select(registry, hit_point)
            .emitted_radiance(registry, hit_point, one_over_primitive_area)
    }

    fn emitted_radiance_y(&self, registry: &MaterialRegistry, one_over_primitive_area: Float) -> Float {
        if self.base.emission.is_some() {
            return self.base.emitted_radiance_y(one_over_primitive_area);
        }
        registry[self.front].emitted_radiance_y(registry, one_over_primitive_area)
    }

    fn albedo(&self, registry: &MaterialRegistry, hit_point: &HitPoint) -> RGBSpectrum {
        self.select(registry, hit_point).albedo(registry, hit_point)
    }

    fn evaluate(&self,
                registry: &MaterialRegistry,
                hit_point: &HitPoint,
                local_light_dir: &Vector3f,
                local_eye_dir: &Vector3f) -> BSDFEvaluation {
        let child = self.select(registry, hit_point);
        let view = ChildView::new(child, hit_point, [*local_light_dir, *local_eye_dir]);
        let [light_dir, eye_dir] = view.dirs;
        child.evaluate(registry, &view.hit_point, &light_dir, &eye_dir)
    }

    fn sample(&self,
              registry: &MaterialRegistry,
              hit_point: &HitPoint,
              local_fixed_dir: &Vector3f,
              u0: Float,
              u1: Float,
              pass_through_event: Float,
              event_hint: BSDFEvent) -> Option<BSDFSample> {
        let child = self.select(registry, hit_point);
        let view = ChildView::new(child, hit_point, [*local_fixed_dir]);
        let [fixed_dir] = view.dirs;
        child
            .sample(registry, &view.hit_point, &fixed_dir, u0, u1, pass_through_event, event_hint)
            .map(|mut sample| {
                sample.sampled_dir = view.to_caller(sample.sampled_dir);
                sample
            })
    }

    fn pdf(&self,
           registry: &MaterialRegistry,
           hit_point: &HitPoint,
           local_light_dir: &Vector3f,
           local_eye_dir: &Vector3f,
           request: PdfRequest) -> BSDFPdf {
        let (fixed_dir, sampled_dir) = if hit_point.from_light {
            (local_light_dir, local_eye_dir)
        } else {
            (local_eye_dir, local_light_dir)
        };
        let side = |dir: &Vector3f| if dir.z < 0.0 { self.back } else { self.front };

        // The two densities may come from different children.
        let mut pdf = BSDFPdf::default();
        if request.direct {
            pdf.direct = registry[side(fixed_dir)]
                .pdf(registry, hit_point, local_light_dir, local_eye_dir, PdfRequest::DIRECT)
                .direct;
        }
        if request.reverse {
            pdf.reverse = registry[side(sampled_dir)]
                .pdf(registry, hit_point, local_light_dir, local_eye_dir, PdfRequest::REVERSE)
                .reverse;
        }
        pdf
    }

    fn preprocess(&mut self, registry: &MaterialRegistry) {
        let front = &registry[self.front];
        let back = &registry[self.back];

        self.event_types = front.event_types() | back.event_types();
        let front_glossy = front.event_types().contains(BSDFEvent::GLOSSY);
        let back_glossy = back.event_types().contains(BSDFEvent::GLOSSY);
        self.glossiness = match (front_glossy, back_glossy) {
            (true, true) => front.glossiness().min(back.glossiness()),
            (true, false) => front.glossiness(),
            (false, true) => back.glossiness(),
            (false, false) => 0.0,
        };
        self.is_light_source = self.base.is_light_source() || front.is_light_source() || back.is_light_source();
        self.has_bump_tex = self.base.has_bump_tex() || front.has_bump_tex() || back.has_bump_tex();
        self.is_delta = front.is_delta() && back.is_delta();

        if self.base.has_transparency() {
            self.base.update_avg_pass_through_transparency();
        } else {
            self.base.set_avg_pass_through_transparency(front.avg_pass_through_transparency());
        }

        debug!("{}: events {:?}, glossiness {}, delta {}, light {}, bump {}",
               self.base.id(), self.event_types, self.glossiness, self.is_delta,
               self.is_light_source, self.has_bump_tex);
    }

    fn update_material_references(&mut self, registry: &MaterialRegistry, old: MaterialId, new: MaterialId) {
        if self.front == old {
            self.front = new;
        }
        if self.back == old {
            self.back = new;
        }
        self.base.update_material_references(old, new);
        self.preprocess(registry);
    }

    fn is_referencing(&self, registry: &MaterialRegistry, material: MaterialId) -> bool {
        self.front == material
            || registry[self.front].is_referencing(registry, material)
            || self.back == material
            || registry[self.back].is_referencing(registry, material)
            || self.base.is_referencing(registry, material)
    }

    fn add_referenced_materials(&self, registry: &MaterialRegistry, referenced: &mut HashSet<MaterialId>) {
        self.base.add_referenced_materials(registry, referenced);
        for child in [self.front, self.back] {
            if referenced.insert(child) {
                registry[child].add_referenced_materials(registry, referenced);
            }
        }
    }

    fn add_referenced_textures(&self, registry: &MaterialRegistry, referenced: &mut HashSet<TextureRef>) {
        self.base.add_referenced_textures(referenced);
        registry[self.front].add_referenced_textures(registry, referenced);
        registry[self.back].add_referenced_textures(registry, referenced);
    }

    fn to_properties(&self, registry: &MaterialRegistry) -> Properties {
        let prefix = self.base.properties_prefix();
        let mut props = Properties::new();
        props.set(format!("{}type", prefix), self.type_name());
        props.set(format!("{}frontmaterial", prefix), registry[self.front].id());
        props.set(format!("{}backmaterial", prefix), registry[self.back].id());
        props.merge(self.base.to_properties(registry));

        trace!("{}: {} properties", self.base.id(), props.len());
        props
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::glossy::GlossyMaterial;
    use crate::materials::matte::MatteMaterial;
    use crate::materials::mirror::MirrorMaterial;
    use crate::textures::constant::ConstantTexture;
    use crate::textures::waves::WavesTexture;
    use crate::math::constants::Vector2f;
    use approx::assert_relative_eq;

    /// Leaf with fixed, distinguishable answers.
    struct ProbeMaterial {
        base: MaterialBase,
        tag: Float,
        events: BSDFEvent,
        glossiness: Float,
        delta: bool,
    }

    impl ProbeMaterial {
        fn boxed(name: &str, tag: Float, events: BSDFEvent, glossiness: Float, delta: bool) -> Box<dyn Material> {
            Box::new(Self {
                base: MaterialBase::new(Some(name.to_string()), "Probe"),
                tag,
                events,
                glossiness,
                delta,
            })
        }
    }

    impl ComputationNode for ProbeMaterial {
        fn id(&self) -> &str {
            self.base.id()
        }

        fn describe(&self) -> String {
            format!("ProbeMaterial [id={}]", self.base.id())
        }
    }

    impl Material for ProbeMaterial {
        fn base(&self) -> &MaterialBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut MaterialBase {
            &mut self.base
        }

        fn type_name(&self) -> &'static str {
            "probe"
        }

        fn event_types(&self) -> BSDFEvent {
            self.events
        }

        fn glossiness(&self) -> Float {
            self.glossiness
        }

        fn is_delta(&self) -> bool {
            self.delta
        }

        fn albedo(&self, _registry: &MaterialRegistry, _hit_point: &HitPoint) -> RGBSpectrum {
            RGBSpectrum::splat(self.tag)
        }

        fn evaluate(&self,
                    _registry: &MaterialRegistry,
                    _hit_point: &HitPoint,
                    local_light_dir: &Vector3f,
                    _local_eye_dir: &Vector3f) -> BSDFEvaluation {
            BSDFEvaluation {
                value: RGBSpectrum::splat(self.tag * local_light_dir.z.abs()),
                event: self.events,
                direct_pdf_w: self.tag,
                reverse_pdf_w: self.tag + 0.5,
            }
        }

        fn sample(&self,
                  _registry: &MaterialRegistry,
                  _hit_point: &HitPoint,
                  local_fixed_dir: &Vector3f,
                  _u0: Float,
                  _u1: Float,
                  _pass_through_event: Float,
                  _event_hint: BSDFEvent) -> Option<BSDFSample> {
            let dir = Vector3f::new(-local_fixed_dir.x, -local_fixed_dir.y, local_fixed_dir.z);
            Some(BSDFSample::new(RGBSpectrum::splat(self.tag), dir, self.tag, self.events))
        }

        fn pdf(&self,
               _registry: &MaterialRegistry,
               _hit_point: &HitPoint,
               _local_light_dir: &Vector3f,
               _local_eye_dir: &Vector3f,
               request: PdfRequest) -> BSDFPdf {
            BSDFPdf::answer(request, self.tag, self.tag + 0.5)
        }

        fn to_properties(&self, _registry: &MaterialRegistry) -> Properties {
            let mut props = Properties::new();
            props.set(format!("{}type", self.base.properties_prefix()), self.type_name());
            props
        }
    }

    fn constant(v: Float) -> TextureRef {
        TextureRef::new(ConstantTexture::from_float(v, None))
    }

    fn base(name: &str) -> MaterialBase {
        MaterialBase::new(Some(name.to_string()), "TwoSided")
    }

    fn diffuse() -> BSDFEvent {
        BSDFEvent::DIFFUSE | BSDFEvent::REFLECT
    }

    fn glossy() -> BSDFEvent {
        BSDFEvent::GLOSSY | BSDFEvent::REFLECT
    }

    /// Registry with probes "front" (tag 0.1) and "back" (tag 0.3).
    fn probes(front_events: BSDFEvent, back_events: BSDFEvent) -> (MaterialRegistry, MaterialId, MaterialId) {
        let mut registry = MaterialRegistry::new();
        let front = registry.insert(ProbeMaterial::boxed("front", 0.1, front_events, 0.2, false)).unwrap();
        let back = registry.insert(ProbeMaterial::boxed("back", 0.3, back_events, 0.8, false)).unwrap();
        (registry, front, back)
    }

    fn matte_box(name: &str, kd: Float, bump: Option<TextureRef>) -> Box<dyn Material> {
        let base = MaterialBase::new(Some(name.to_string()), "Matte").with_bump(bump);
        Box::new(MatteMaterial::new(base, TextureRef::new(ConstantTexture::from_float(kd, None))))
    }

    fn mirror_box(name: &str) -> Box<dyn Material> {
        let base = MaterialBase::new(Some(name.to_string()), "Mirror");
        Box::new(MirrorMaterial::new(base, constant(1.0)))
    }

    #[test]
    fn test_orientation_routes_every_query() {
        let (registry, front, back) = probes(diffuse(), diffuse());
        let card = TwoSidedMaterial::new(base("card"), front, back, &registry).unwrap();
        let light = Vector3f::new(0.0, 0.6, 0.8);
        let eye = Vector3f::new(0.6, 0.0, 0.8);

        for (into_object, child) in [(true, front), (false, back)] {
            let hp = HitPoint::default().with_into_object(into_object);
            let child = &registry[child];
            assert_eq!(card.evaluate(&registry, &hp, &light, &eye),
                       child.evaluate(&registry, &hp, &light, &eye));
            assert_eq!(card.sample(&registry, &hp, &eye, 0.3, 0.7, 0.5, BSDFEvent::all()),
                       child.sample(&registry, &hp, &eye, 0.3, 0.7, 0.5, BSDFEvent::all()));
            assert_eq!(card.albedo(&registry, &hp), child.albedo(&registry, &hp));
        }
    }

    #[test]
    fn test_volumes_delegate_unless_overridden() {
        let (mut registry, _, _) = probes(diffuse(), diffuse());
        let fog = registry.insert(ProbeMaterial::boxed("fog", 0.9, diffuse(), 0.0, false)).unwrap();
        let smoke = registry.insert(ProbeMaterial::boxed("smoke", 0.9, diffuse(), 0.0, false)).unwrap();
        let front_base = MaterialBase::new(Some("inside".to_string()), "Probe").with_volumes(Some(fog), None);
        let front = registry.insert(Box::new(ProbeMaterial {
            base: front_base, tag: 0.1, events: diffuse(), glossiness: 0.0, delta: false,
        })).unwrap();
        let back = registry.lookup("back").unwrap();

        let card = TwoSidedMaterial::new(base("card"), front, back, &registry).unwrap();
        let into = HitPoint::default();
        let out = HitPoint::default().with_into_object(false);
        assert_eq!(card.interior_volume(&registry, &into), Some(fog));
        assert_eq!(card.interior_volume(&registry, &out), None);

        let card = TwoSidedMaterial::new(base("card2").with_volumes(Some(smoke), Some(smoke)), front, back, &registry).unwrap();
        assert_eq!(card.interior_volume(&registry, &into), Some(smoke));
        assert_eq!(card.exterior_volume(&registry, &out), Some(smoke));
        assert!(card.is_referencing(&registry, smoke));
    }

    #[test]
    fn test_transparency_and_emission_overrides() {
        let mut registry = MaterialRegistry::new();
        let glow = MaterialBase::new(Some("glow".to_string()), "Probe")
            .with_emission(Some(constant(2.0)))
            .with_transparency(Some(constant(0.0)), Some(constant(0.0)));
        let front = registry.insert(Box::new(ProbeMaterial {
            base: glow, tag: 0.1, events: diffuse(), glossiness: 0.0, delta: false,
        })).unwrap();
        let back = registry.insert(ProbeMaterial::boxed("back", 0.3, diffuse(), 0.0, false)).unwrap();

        let up = Vector3f::new(0.0, 0.0, 1.0);
        let into = HitPoint::default();
        let out = HitPoint::default().with_into_object(false);

        let card = TwoSidedMaterial::new(base("card"), front, back, &registry).unwrap();
        assert!(card.is_light_source());
        assert_eq!(card.emitted_radiance(&registry, &into, 1.0), RGBSpectrum::splat(2.0));
        assert!(card.emitted_radiance(&registry, &out, 1.0).is_black());
        assert!((card.emitted_radiance_y(&registry, 1.0) - 2.0).abs() < 1e-4);
        assert_eq!(card.pass_through_transparency(&registry, &into, &up, 0.5, false), RGBSpectrum::white());
        assert!(card.pass_through_transparency(&registry, &out, &up, 0.5, false).is_black());
        assert_relative_eq!(card.avg_pass_through_transparency(), 0.0);

        let own = base("card2")
            .with_emission(Some(constant(5.0)))
            .with_transparency(Some(constant(1.0)), None);
        let card = TwoSidedMaterial::new(own, front, back, &registry).unwrap();
        assert_eq!(card.emitted_radiance(&registry, &out, 1.0), RGBSpectrum::splat(5.0));
        assert!(card.pass_through_transparency(&registry, &into, &up, 0.5, false).is_black());
        assert_relative_eq!(card.avg_pass_through_transparency(), 1.0);
    }

    #[test]
    fn test_delta_requires_both_sides() {
        let mut registry = MaterialRegistry::new();
        let mirror = registry.insert(mirror_box("mirror")).unwrap();
        let matte = registry.insert(matte_box("matte", 0.5, None)).unwrap();
        let mirror2 = registry.insert(mirror_box("mirror2")).unwrap();

        let mixed = TwoSidedMaterial::new(base("mixed"), mirror, matte, &registry).unwrap();
        assert!(!mixed.is_delta());
        assert_eq!(mixed.event_types(),
                   BSDFEvent::SPECULAR | BSDFEvent::DIFFUSE | BSDFEvent::REFLECT);

        let pure = TwoSidedMaterial::new(base("pure"), mirror, mirror2, &registry).unwrap();
        assert!(pure.is_delta());
    }

    #[test]
    fn test_glossiness_aggregation() {
        let (registry, front, back) = probes(glossy(), glossy());
        let card = TwoSidedMaterial::new(base("both"), front, back, &registry).unwrap();
        assert_relative_eq!(card.glossiness(), 0.2);

        let (registry, front, back) = probes(diffuse(), glossy());
        let card = TwoSidedMaterial::new(base("back_only"), front, back, &registry).unwrap();
        assert_relative_eq!(card.glossiness(), 0.8);

        let (registry, front, back) = probes(glossy(), diffuse());
        let card = TwoSidedMaterial::new(base("front_only"), front, back, &registry).unwrap();
        assert_relative_eq!(card.glossiness(), 0.2);

        let (registry, front, back) = probes(diffuse(), diffuse());
        let card = TwoSidedMaterial::new(base("neither"), front, back, &registry).unwrap();
        assert_relative_eq!(card.glossiness(), 0.0);
    }

    #[test]
    fn test_preprocess_is_idempotent() {
        let mut registry = MaterialRegistry::new();
        let rough = GlossyMaterial::new(MaterialBase::new(Some("rough".to_string()), "Glossy"),
                                        constant(0.5), constant(0.3));
        let front = registry.insert(Box::new(rough)).unwrap();
        let back = registry.insert(matte_box("matte", 0.5, Some(TextureRef::new(WavesTexture::new(0.1, 4.0, None))))).unwrap();
        let mut card = TwoSidedMaterial::new(base("card"), front, back, &registry).unwrap();

        let snapshot = |m: &TwoSidedMaterial| {
            (m.event_types(), m.glossiness(), m.is_light_source(), m.has_bump_tex(), m.is_delta(),
             m.avg_pass_through_transparency())
        };
        let first = snapshot(&card);
        card.preprocess(&registry);
        card.preprocess(&registry);
        assert_eq!(first, snapshot(&card));
        assert!(card.has_bump_tex());
        assert_relative_eq!(card.glossiness(), 0.3);
    }

    #[test]
    fn test_pdf_sides_resolve_independently() {
        let (registry, front, back) = probes(diffuse(), diffuse());
        let card = TwoSidedMaterial::new(base("card"), front, back, &registry).unwrap();
        let up = Vector3f::new(0.0, 0.0, 1.0);
        let down = Vector3f::new(0.0, 0.0, -1.0);

        // Eye path: eye is fixed (front side), light was sampled (back side).
        let hp = HitPoint::default();
        let pdf = card.pdf(&registry, &hp, &down, &up, PdfRequest::BOTH);
        assert_eq!(pdf.direct, Some(0.1));
        assert_eq!(pdf.reverse, Some(0.3 + 0.5));

        // Light path: light is fixed.
        let hp = HitPoint::default().with_from_light(true);
        let pdf = card.pdf(&registry, &hp, &down, &up, PdfRequest::BOTH);
        assert_eq!(pdf.direct, Some(0.3));
        assert_eq!(pdf.reverse, Some(0.1 + 0.5));

        // The orientation flag plays no part.
        let hp = HitPoint::default().with_into_object(false);
        let pdf = card.pdf(&registry, &hp, &down, &up, PdfRequest::REVERSE);
        assert_eq!(pdf.direct, None);
        assert_eq!(pdf.reverse, Some(0.3 + 0.5));

        let pdf = card.pdf(&registry, &hp, &down, &up, PdfRequest::NONE);
        assert_eq!(pdf, BSDFPdf::default());
    }

    #[test]
    fn test_bumped_child_receives_its_own_frame() {
        let mut registry = MaterialRegistry::new();
        let waves = TextureRef::new(WavesTexture::new(0.05, 2.0, None));
        let bumpy = registry.insert(matte_box("bumpy", 0.5, Some(waves))).unwrap();
        let flat = registry.insert(matte_box("flat", 0.5, None)).unwrap();
        let card = TwoSidedMaterial::new(base("card"), bumpy, flat, &registry).unwrap();
        assert!(card.has_bump_tex());

        let hp = HitPoint::default().with_uv(Vector2f::new(0.05, 0.1));
        let light = Vector3f::new(0.3, 0.1, 0.9).normalize();
        let eye = Vector3f::new(-0.2, 0.4, 0.8).normalize();

        let child = &registry[bumpy];
        let mut bumped = hp.clone();
        child.bump(&mut bumped);
        assert_ne!(bumped.shade_n, hp.shade_n);
        let frame = hp.frame();
        let bumped_frame = bumped.frame();
        let to_child = |d: &Vector3f| bumped_frame.to_local(&frame.to_world(d));

        let expected = child.evaluate(&registry, &bumped, &to_child(&light), &to_child(&eye));
        let got = card.evaluate(&registry, &hp, &light, &eye);
        assert_relative_eq!(got.value[0], expected.value[0], epsilon = 1e-6);
        assert_relative_eq!(got.direct_pdf_w, expected.direct_pdf_w, epsilon = 1e-6);
        assert_relative_eq!(got.reverse_pdf_w, expected.reverse_pdf_w, epsilon = 1e-6);
        assert!((got.value[0] - child.evaluate(&registry, &hp, &light, &eye).value[0]).abs() > 1e-5);

        let expected = child
            .sample(&registry, &bumped, &to_child(&eye), 0.25, 0.6, 0.5, BSDFEvent::all())
            .unwrap();
        let got = card.sample(&registry, &hp, &eye, 0.25, 0.6, 0.5, BSDFEvent::all()).unwrap();
        assert_relative_eq!(got.pdf_w, expected.pdf_w, epsilon = 1e-6);
        let back_in_caller = frame.to_local(&bumped_frame.to_world(&expected.sampled_dir));
        assert_relative_eq!(got.sampled_dir, back_in_caller, epsilon = 1e-5);

        // The unbumped side takes the direct path.
        let out = hp.clone().with_into_object(false);
        assert_eq!(card.evaluate(&registry, &out, &light, &eye),
                   registry[flat].evaluate(&registry, &out, &light, &eye));
    }

    #[test]
    fn test_reference_substitution() {
        let mut registry = MaterialRegistry::new();
        let old = registry.insert(matte_box("old", 0.5, None)).unwrap();
        let back = registry.insert(matte_box("back", 0.5, None)).unwrap();
        let new = registry.insert(mirror_box("new")).unwrap();
        let mirror2 = registry.insert(mirror_box("mirror2")).unwrap();

        let mut card = TwoSidedMaterial::new(base("card"), old, mirror2, &registry).unwrap();
        assert!(card.is_referencing(&registry, old));
        assert!(!card.is_delta());

        card.update_material_references(&registry, old, new);
        assert_eq!(card.front(), new);
        assert!(!card.is_referencing(&registry, old));
        assert!(card.is_referencing(&registry, new));
        assert!(card.is_delta());
        assert!(!card.is_referencing(&registry, back));
    }

    #[test]
    fn test_referenced_materials_and_textures() {
        let mut registry = MaterialRegistry::new();
        let kd = constant(0.5);
        let matte = registry
            .insert(Box::new(MatteMaterial::new(MaterialBase::new(Some("matte".to_string()), "Matte"), kd.clone())))
            .unwrap();
        let mirror = registry.insert(mirror_box("mirror")).unwrap();
        let inner = TwoSidedMaterial::new(base("inner"), matte, mirror, &registry).unwrap();
        let inner = registry.insert(Box::new(inner)).unwrap();
        let bump = constant(0.0);
        let outer = TwoSidedMaterial::new(base("outer").with_bump(Some(bump.clone())), inner, matte, &registry).unwrap();

        let mut materials = HashSet::new();
        outer.add_referenced_materials(&registry, &mut materials);
        assert_eq!(materials, HashSet::from([inner, matte, mirror]));
        assert!(outer.is_referencing(&registry, mirror));

        let mut textures = HashSet::new();
        outer.add_referenced_textures(&registry, &mut textures);
        assert!(textures.contains(&kd));
        assert!(textures.contains(&bump));
    }

    #[test]
    fn test_dangling_child_is_rejected() {
        let (registry, front, _) = probes(diffuse(), diffuse());
        let bogus = MaterialId(42);
        assert!(matches!(TwoSidedMaterial::new(base("card"), front, bogus, &registry),
                         Err(RegistryError::DanglingHandle(id)) if id == bogus));
    }

    #[test]
    fn test_properties_name_children() {
        let mut registry = MaterialRegistry::new();
        let front = registry.insert(matte_box("matteA", 0.5, None)).unwrap();
        let back = registry.insert(mirror_box("glassB")).unwrap();
        let card = TwoSidedMaterial::new(base("card").with_bump(Some(constant(0.0))), front, back, &registry).unwrap();

        let props = card.to_properties(&registry);
        assert_eq!(props.get("scene.materials.card.type"), Some("twosided"));
        assert_eq!(props.get("scene.materials.card.frontmaterial"), Some("matteA"));
        assert_eq!(props.get("scene.materials.card.backmaterial"), Some("glassB"));
        assert!(props.contains("scene.materials.card.bumptex"));
        assert!(!props.keys().any(|k| k.contains("glossiness") || k.contains("delta")));
    }
}
