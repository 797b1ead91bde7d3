// Copyright @yucwang 2026

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::core::computation_node::ComputationNode;
use crate::core::material::{Material, MaterialBase, MaterialId};
use crate::core::registry::{MaterialRegistry, RegistryError};
use crate::core::texture::TextureRef;
use crate::materials::glossy::GlossyMaterial;
use crate::materials::matte::MatteMaterial;
use crate::materials::mirror::MirrorMaterial;
use crate::materials::null::NullMaterial;
use crate::materials::twosided::TwoSidedMaterial;
use crate::math::constants::Float;
use crate::math::spectrum::RGBSpectrum;
use crate::textures::constant::ConstantTexture;
use crate::textures::waves::WavesTexture;
use crate::volumes::homogeneous::HomogeneousVolume;

#[derive(Debug, Error)]
pub enum SceneLoadError {
    #[error("failed to read scene: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed scene XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("{0}")]
    Parse(String),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("unknown reference `{0}`")]
    UnknownReference(String),
    #[error("unsupported {kind} type `{type_name}`")]
    Unsupported { kind: &'static str, type_name: String },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub struct SceneLoadResult {
    pub registry: MaterialRegistry,
    pub textures: HashMap<String, TextureRef>,
}

pub fn load_scene<P: AsRef<Path>>(path: P) -> Result<SceneLoadResult, SceneLoadError> {
    let path = path.as_ref();
    log::info!("Loading material scene from: {}.", path.display());
    let xml = fs::read_to_string(path)?;
    load_scene_from_str(&xml)
}

pub fn load_scene_from_str(xml: &str) -> Result<SceneLoadResult, SceneLoadError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut loader = Loader::default();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                loader.open(&e)?;
            }
            Event::Empty(e) => {
                let tag = loader.open(&e)?;
                loader.close(&tag)?;
            }
            Event::End(e) => {
                loader.close(&String::from_utf8_lossy(e.name().as_ref()))?;
            }
            _ => {}
        }
        buf.clear();
    }

    if let Some(node) = loader.pending {
        return Err(SceneLoadError::Parse(format!("unterminated <{}>", node.tag)));
    }
    log::info!("Scene loaded, {} materials, {} textures.", loader.registry.len(), loader.textures.len());

    Ok(SceneLoadResult {
        registry: loader.registry,
        textures: loader.textures,
    })
}

/// A `<texture>`, `<medium>` or `<bsdf>` whose parameters are still being read.
struct PendingNode {
    tag: String,
    type_name: String,
    id: Option<String>,
    floats: HashMap<String, Float>,
    rgbs: HashMap<String, RGBSpectrum>,
    booleans: HashMap<String, bool>,
    refs: HashMap<String, String>,
}

impl PendingNode {
    fn new(tag: String, type_name: String, id: Option<String>) -> Self {
        Self {
            tag,
            type_name,
            id,
            floats: HashMap::new(),
            rgbs: HashMap::new(),
            booleans: HashMap::new(),
            refs: HashMap::new(),
        }
    }

    fn add_param(&mut self, tag: &str, attrs: &HashMap<String, String>) -> Result<(), SceneLoadError> {
        let name = attrs.get("name").cloned().ok_or(SceneLoadError::MissingField("name"))?;
        if tag == "ref" {
            let id = attrs.get("id").cloned().ok_or(SceneLoadError::MissingField("ref.id"))?;
            self.refs.insert(name, id);
            return Ok(());
        }

        let value = attrs.get("value").ok_or(SceneLoadError::MissingField("value"))?;
        match tag {
            "float" => {
                self.floats.insert(name, parse_float(value)?);
            }
            "rgb" => {
                self.rgbs.insert(name, parse_spectrum(value)?);
            }
            _ => {
                self.booleans.insert(name, parse_bool(value)?);
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct Loader {
    defaults: HashMap<String, String>,
    textures: HashMap<String, TextureRef>,
    registry: MaterialRegistry,
    pending: Option<PendingNode>,
}

impl Loader {
    fn attributes(&self, e: &BytesStart) -> Result<HashMap<String, String>, SceneLoadError> {
        let mut attrs = HashMap::new();
        for attr in e.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = resolve_value(&attr.unescape_value()?, &self.defaults);
            attrs.insert(key, value);
        }
        Ok(attrs)
    }

    fn open(&mut self, e: &BytesStart) -> Result<String, SceneLoadError> {
        let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let attrs = self.attributes(e)?;

        match tag.as_str() {
            "scene" => {}
            "default" => {
                let name = attrs.get("name").cloned().ok_or(SceneLoadError::MissingField("default.name"))?;
                let value = attrs.get("value").cloned().ok_or(SceneLoadError::MissingField("default.value"))?;
                self.defaults.insert(name, value);
            }
            "texture" | "medium" | "bsdf" => {
                if let Some(outer) = &self.pending {
                    return Err(SceneLoadError::Parse(format!("<{}> cannot be nested inside <{}>", tag, outer.tag)));
                }
                let type_name = attrs.get("type").cloned().ok_or(SceneLoadError::MissingField("type"))?;
                self.pending = Some(PendingNode::new(tag.clone(), type_name, attrs.get("id").cloned()));
            }
            "float" | "rgb" | "boolean" | "ref" => match self.pending.as_mut() {
                Some(node) => node.add_param(&tag, &attrs)?,
                None => log::warn!("Ignoring <{}> outside of a definition.", tag),
            },
            _ => log::warn!("Ignoring unsupported element <{}>.", tag),
        }
        Ok(tag)
    }

    fn close(&mut self, tag: &str) -> Result<(), SceneLoadError> {
        if !matches!(tag, "texture" | "medium" | "bsdf") {
            return Ok(());
        }
        let node = match self.pending.take() {
            Some(node) => node,
            None => return Ok(()),
        };
        match tag {
            "texture" => self.build_texture(node),
            "medium" => self.build_medium(node),
            _ => self.build_bsdf(node),
        }
    }

    fn build_texture(&mut self, node: PendingNode) -> Result<(), SceneLoadError> {
        let texture = match node.type_name.as_str() {
            "constant" => {
                let value = node.rgbs.get("value").copied()
                    .or_else(|| node.floats.get("value").map(|v| RGBSpectrum::splat(*v)))
                    .ok_or(SceneLoadError::MissingField("texture.value"))?;
                TextureRef::new(ConstantTexture::new(value, node.id.clone()))
            }
            "waves" => {
                let amplitude = node.floats.get("amplitude").copied().unwrap_or(0.05);
                let frequency = node.floats.get("frequency").copied().unwrap_or(4.0);
                TextureRef::new(WavesTexture::new(amplitude, frequency, node.id.clone()))
            }
            other => {
                return Err(SceneLoadError::Unsupported { kind: "texture", type_name: other.to_string() });
            }
        };

        let name = texture.id().to_string();
        if let Some(old) = self.textures.insert(name.clone(), texture.clone()) {
            self.registry.update_texture_references(&old, &texture);
            log::info!("Redefined texture `{}`.", name);
        }
        Ok(())
    }

    fn build_medium(&mut self, node: PendingNode) -> Result<(), SceneLoadError> {
        if node.type_name != "homogeneous" {
            return Err(SceneLoadError::Unsupported { kind: "medium", type_name: node.type_name });
        }
        let base = self.base(&node)?;
        let volume = HomogeneousVolume::new(base,
                                            self.texture_or(&node, "absorption", 0.0)?,
                                            self.texture_or(&node, "scattering", 1.0)?);
        self.define(Box::new(volume))
    }

    fn build_bsdf(&mut self, node: PendingNode) -> Result<(), SceneLoadError> {
        let base = self.base(&node)?;
        let material: Box<dyn Material> = match node.type_name.as_str() {
            "diffuse" => Box::new(MatteMaterial::new(base, self.texture_or(&node, "reflectance", 0.5)?)),
            "conductor" => Box::new(MirrorMaterial::new(base, self.texture_or(&node, "specular_reflectance", 1.0)?)),
            "roughconductor" => Box::new(GlossyMaterial::new(base,
                                                             self.texture_or(&node, "specular_reflectance", 0.5)?,
                                                             self.texture_or(&node, "alpha", 0.1)?)),
            "null" => Box::new(NullMaterial::new(base)),
            "twosided" => {
                let front = self.material_ref(&node, "front")?.ok_or(SceneLoadError::MissingField("bsdf.front"))?;
                let back = self.material_ref(&node, "back")?.ok_or(SceneLoadError::MissingField("bsdf.back"))?;
                Box::new(TwoSidedMaterial::new(base, front, back, &self.registry)?)
            }
            other => {
                return Err(SceneLoadError::Unsupported { kind: "bsdf", type_name: other.to_string() });
            }
        };
        self.define(material)
    }

    fn define(&mut self, material: Box<dyn Material>) -> Result<(), SceneLoadError> {
        let description = material.describe();
        let id = self.registry.define(material)?;
        log::info!("Defined {} as {}.", description, id);
        Ok(())
    }

    fn base(&self, node: &PendingNode) -> Result<MaterialBase, SceneLoadError> {
        let interior = self.volume_ref(node, "interior")?;
        let exterior = self.volume_ref(node, "exterior")?;
        let mut base = MaterialBase::new(node.id.clone(), &node.type_name)
            .with_transparency(self.texture_param(node, "transparency_front")?,
                               self.texture_param(node, "transparency_back")?)
            .with_emission(self.texture_param(node, "emission")?)
            .with_bump(self.texture_param(node, "bump")?)
            .with_volumes(interior, exterior);

        if let Some(gain) = node.floats.get("emission_gain") {
            base.emission_gain = *gain;
        }
        if let Some(normalize) = node.booleans.get("emission_normalize") {
            base.emission_normalized_by_area = *normalize;
        }
        if let Some(distance) = node.floats.get("bump_distance") {
            base.bump_sample_distance = *distance;
        }
        if let Some(shadow) = node.rgbs.get("shadow_transparency") {
            base.shadow_transparency = Some(*shadow);
        }
        Ok(base)
    }

    /// Texture parameter given by reference, inline `rgb` or inline `float`.
    fn texture_param(&self, node: &PendingNode, name: &str) -> Result<Option<TextureRef>, SceneLoadError> {
        if let Some(id) = node.refs.get(name) {
            return self.textures
                .get(id)
                .cloned()
                .map(Some)
                .ok_or_else(|| SceneLoadError::UnknownReference(id.clone()));
        }
        if let Some(rgb) = node.rgbs.get(name) {
            return Ok(Some(TextureRef::new(ConstantTexture::new(*rgb, None))));
        }
        Ok(node.floats.get(name).map(|v| TextureRef::new(ConstantTexture::from_float(*v, None))))
    }

    fn texture_or(&self, node: &PendingNode, name: &str, default: Float) -> Result<TextureRef, SceneLoadError> {
        Ok(self.texture_param(node, name)?
            .unwrap_or_else(|| TextureRef::new(ConstantTexture::from_float(default, None))))
    }

    fn material_ref(&self, node: &PendingNode, name: &str) -> Result<Option<MaterialId>, SceneLoadError> {
        match node.refs.get(name) {
            Some(id) => self.registry
                .lookup(id)
                .map(Some)
                .ok_or_else(|| SceneLoadError::UnknownReference(id.clone())),
            None => Ok(None),
        }
    }

    fn volume_ref(&self, node: &PendingNode, name: &str) -> Result<Option<MaterialId>, SceneLoadError> {
        let id = self.material_ref(node, name)?;
        if let Some(id) = id {
            if !self.registry[id].is_volume() {
                return Err(SceneLoadError::Parse(format!("`{}` is not a medium", self.registry[id].id())));
            }
        }
        Ok(id)
    }
}

fn resolve_value(raw: &str, defaults: &HashMap<String, String>) -> String {
    let mut out = raw.to_string();
    for (k, v) in defaults {
        out = out.replace(&format!("${}", k), v);
    }
    out
}

fn parse_float(value: &str) -> Result<Float, SceneLoadError> {
    value.trim().parse::<Float>().map_err(|_| SceneLoadError::Parse(format!("invalid float: {}", value)))
}

fn parse_bool(value: &str) -> Result<bool, SceneLoadError> {
    match value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(SceneLoadError::Parse(format!("invalid boolean: {}", value))),
    }
}

/// `"r, g, b"` or a single gray value.
fn parse_spectrum(value: &str) -> Result<RGBSpectrum, SceneLoadError> {
    let parts: Vec<&str> = value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect();
    match parts.as_slice() {
        [v] => Ok(RGBSpectrum::splat(parse_float(v)?)),
        [r, g, b] => Ok(RGBSpectrum::new(parse_float(r)?, parse_float(g)?, parse_float(b)?)),
        _ => Err(SceneLoadError::Parse(format!("invalid rgb: {}", value))),
    }
}
