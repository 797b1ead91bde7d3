// Copyright @yucwang 2023

use bitflags::bitflags;

use crate::math::constants::{ Float, Vector3f };
use crate::math::spectrum::RGBSpectrum;

bitflags! {
    /// Kinds of scattering a material can produce.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BSDFEvent: u8 {
        const DIFFUSE = 1 << 0;
        const GLOSSY = 1 << 1;
        const SPECULAR = 1 << 2;
        const REFLECT = 1 << 3;
        const TRANSMIT = 1 << 4;
    }
}

impl Default for BSDFEvent {
    fn default() -> Self {
        BSDFEvent::empty()
    }
}

// Definitions of types used in BSDF sampling and eval
// processes

/// Result of evaluating a material for a pair of directions.
///
/// `value` already includes the cosine of the light direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BSDFEvaluation {
    pub value: RGBSpectrum,
    pub event: BSDFEvent,
    pub direct_pdf_w: Float,
    pub reverse_pdf_w: Float,
}

impl Default for BSDFEvaluation {
    fn default() -> Self {
        Self {
            value: RGBSpectrum::default(),
            event: BSDFEvent::empty(),
            direct_pdf_w: 0.0,
            reverse_pdf_w: 0.0,
        }
    }
}

impl BSDFEvaluation {
    pub fn is_black(&self) -> bool {
        self.value.is_black()
    }
}

/// A sampled direction with its throughput weight `f * |cos| / pdf`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BSDFSample {
    pub value: RGBSpectrum,
    pub sampled_dir: Vector3f,
    pub pdf_w: Float,
    pub event: BSDFEvent,
}

impl BSDFSample {
    pub fn new(value: RGBSpectrum, sampled_dir: Vector3f, pdf_w: Float, event: BSDFEvent) -> Self {
        Self { value, sampled_dir, pdf_w, event }
    }
}

/// Which densities a caller of `Material::pdf` wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdfRequest {
    pub direct: bool,
    pub reverse: bool,
}

impl PdfRequest {
    pub const NONE: Self = Self { direct: false, reverse: false };
    pub const DIRECT: Self = Self { direct: true, reverse: false };
    pub const REVERSE: Self = Self { direct: false, reverse: true };
    pub const BOTH: Self = Self { direct: true, reverse: true };

    pub fn is_empty(&self) -> bool {
        !self.direct && !self.reverse
    }
}

/// Forward and reverse solid angle densities; `None` when not requested.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BSDFPdf {
    pub direct: Option<Float>,
    pub reverse: Option<Float>,
}

impl BSDFPdf {
    /// Answer `request` with the same pair of densities.
    pub fn answer(request: PdfRequest, direct_pdf_w: Float, reverse_pdf_w: Float) -> Self {
        Self {
            direct: request.direct.then_some(direct_pdf_w),
            reverse: request.reverse.then_some(reverse_pdf_w),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_union() {
        let a = BSDFEvent::DIFFUSE | BSDFEvent::REFLECT;
        let b = BSDFEvent::SPECULAR | BSDFEvent::TRANSMIT;
        let u = a | b;
        assert!(u.contains(BSDFEvent::DIFFUSE));
        assert!(u.contains(BSDFEvent::TRANSMIT));
        assert!(!u.contains(BSDFEvent::GLOSSY));
    }

    #[test]
    fn test_pdf_answer_respects_request() {
        let pdf = BSDFPdf::answer(PdfRequest::REVERSE, 0.3, 0.7);
        assert_eq!(pdf.direct, None);
        assert_eq!(pdf.reverse, Some(0.7));
        assert_eq!(BSDFPdf::answer(PdfRequest::NONE, 0.3, 0.7), BSDFPdf::default());
    }
}
