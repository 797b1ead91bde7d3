// Copyright @yucwang 2026

use log::debug;

use crate::core::bsdf::BSDFEvent;
use crate::core::computation_node::ComputationNode;
use crate::core::interaction::HitPoint;
use crate::core::material::{Material, MaterialId};
use crate::core::registry::MaterialRegistry;
use crate::core::rng::LcgRng;
use crate::math::constants::{Float, Vector3f};
use crate::math::spectrum::RGBSpectrum;

/// Directional albedo of both faces of a material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SideAlbedo {
    pub front: RGBSpectrum,
    pub back: RGBSpectrum,
}

/// White furnace estimator: average sampled throughput under unit illumination.
#[derive(Debug, Clone, Copy)]
pub struct FurnaceProbe {
    pub samples: u32,
    pub seed: u64,
}

impl Default for FurnaceProbe {
    fn default() -> Self {
        Self { samples: 1024, seed: 7 }
    }
}

impl FurnaceProbe {
    pub fn new(samples: u32, seed: u64) -> Self {
        Self { samples, seed }
    }

    /// Albedo seen along the normal of one face, `into_object` picks the face.
    pub fn side_albedo(&self, registry: &MaterialRegistry, id: MaterialId, into_object: bool) -> RGBSpectrum {
        self.side_albedo_with(registry, id, into_object, |_| {})
    }

    /// Same as [`FurnaceProbe::side_albedo`], calling `progress` once per sample.
    pub fn side_albedo_with<F: FnMut(u32)>(&self,
                                           registry: &MaterialRegistry,
                                           id: MaterialId,
                                           into_object: bool,
                                           mut progress: F) -> RGBSpectrum {
        if self.samples == 0 {
            return RGBSpectrum::black();
        }

        let material = &registry[id];
        let mut hit_point = HitPoint::default().with_into_object(into_object);
        material.bump(&mut hit_point);
        let fixed_dir = Vector3f::new(0.0, 0.0, if into_object { 1.0 } else { -1.0 });

        let mut rng = LcgRng::new(self.seed);
        let mut sum = RGBSpectrum::black();
        let mut failed = 0u32;
        for i in 0..self.samples {
            let u = rng.next_2d();
            let pass_through_event = rng.next_f32();
            match material.sample(registry, &hit_point, &fixed_dir, u.x, u.y, pass_through_event, BSDFEvent::all()) {
                Some(sample) if sample.value.is_finite() => sum += sample.value,
                _ => failed += 1,
            }
            progress(i);
        }

        debug!("furnace {} ({}): {} of {} samples failed",
               material.id(), if into_object { "front" } else { "back" }, failed, self.samples);
        sum / self.samples as Float
    }

    pub fn measure(&self, registry: &MaterialRegistry, id: MaterialId) -> SideAlbedo {
        SideAlbedo {
            front: self.side_albedo(registry, id, true),
            back: self.side_albedo(registry, id, false),
        }
    }
}
