// Copyright @yucwang 2026

use std::collections::{HashMap, HashSet};
use std::ops::Index;

use log::{debug, info};
use thiserror::Error;

use crate::core::computation_node::ComputationNode;
use crate::core::material::{Material, MaterialId};
use crate::core::texture::TextureRef;
use crate::io::properties::Properties;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("material `{0}` is already defined")]
    DuplicateName(String),
    #[error("material handle {0} is not live in the registry")]
    DanglingHandle(MaterialId),
    #[error("unknown material `{0}`")]
    UnknownMaterial(String),
    #[error("material `{0}` is still referenced by other materials")]
    InUse(String),
    #[error("redefining `{0}` would make the material graph cyclic")]
    Cycle(String),
}

/// Arena owning every material of a scene.
///
/// Materials reference each other through [`MaterialId`] handles; the
/// registry keeps the graph acyclic and every cached aggregate current.
pub struct MaterialRegistry {
    slots: Vec<Option<Box<dyn Material>>>,
    names: HashMap<String, MaterialId>,
}

impl Default for MaterialRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MaterialRegistry {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            names: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, id: MaterialId) -> bool {
        matches!(self.slots.get(id.0), Some(Some(_)))
    }

    pub fn get(&self, id: MaterialId) -> Option<&dyn Material> {
        self.slots.get(id.0).and_then(|slot| slot.as_deref())
    }

    pub fn lookup(&self, name: &str) -> Option<MaterialId> {
        self.names.get(name).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<&dyn Material> {
        self.lookup(name).and_then(|id| self.get(id))
    }

    /// Live handles in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = MaterialId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(idx, _)| MaterialId(idx))
    }

    /// Add a new material. Its cached values are computed before it becomes visible.
    pub fn insert(&mut self, material: Box<dyn Material>) -> Result<MaterialId, RegistryError> {
        if self.names.contains_key(material.id()) {
            return Err(RegistryError::DuplicateName(material.id().to_string()));
        }
        self.check_volumes(&*material)?;

        let mut material = material;
        material.preprocess(self);

        let id = MaterialId(self.slots.len());
        debug!("registering material {} as {}", material.describe(), id);
        self.names.insert(material.id().to_string(), id);
        self.slots.push(Some(material));
        Ok(id)
    }

    /// Insert `material`, or replace the material with the same name and
    /// redirect every reference to it.
    pub fn define(&mut self, material: Box<dyn Material>) -> Result<MaterialId, RegistryError> {
        self.check_volumes(&*material)?;
        let old = match self.lookup(material.id()) {
            Some(old) => old,
            None => return self.insert(material),
        };

        let name = material.id().to_string();
        if material.is_referencing(self, old) {
            return Err(RegistryError::Cycle(name));
        }

        let mut material = material;
        material.preprocess(self);
        let new = MaterialId(self.slots.len());
        self.slots.push(Some(material));
        self.names.insert(name.clone(), new);

        self.update_material_references(old, new);
        self.slots[old.0] = None;
        self.preprocess_all();

        info!("redefined material `{}` ({} -> {})", name, old, new);
        Ok(new)
    }

    /// Remove a material nobody references anymore.
    pub fn remove(&mut self, name: &str) -> Result<Box<dyn Material>, RegistryError> {
        let id = self
            .lookup(name)
            .ok_or_else(|| RegistryError::UnknownMaterial(name.to_string()))?;
        if self.is_referenced(id) {
            return Err(RegistryError::InUse(name.to_string()));
        }
        self.names.remove(name);
        self.slots[id.0]
            .take()
            .ok_or(RegistryError::DanglingHandle(id))
    }

    /// True when any other live material references `id`.
    pub fn is_referenced(&self, id: MaterialId) -> bool {
        self.ids()
            .filter(|other| *other != id)
            .any(|other| self[other].is_referencing(self, id))
    }

    // Redirect every reference to `old` so it points at `new`. Only `define`
    // may call this: it has already checked that `new` does not reach `old`.
    fn update_material_references(&mut self, old: MaterialId, new: MaterialId) {
        let ids: Vec<MaterialId> = self.ids().collect();
        for id in ids {
            self.edit(id, |material, registry| material.update_material_references(registry, old, new));
        }
    }

    /// Swap a texture across the whole graph, children before parents.
    pub fn update_texture_references(&mut self, old: &TextureRef, new: &TextureRef) {
        for id in self.dependency_order() {
            self.edit(id, |material, registry| material.update_texture_references(registry, old, new));
        }
        debug!("replaced texture `{}` with `{}`", old.id(), new.id());
    }

    /// Recompute the cache of every material, children before parents.
    pub fn preprocess_all(&mut self) {
        for id in self.dependency_order() {
            self.edit(id, |material, registry| material.preprocess(registry));
        }
    }

    /// Live handles ordered so that every material comes after everything it references.
    pub fn dependency_order(&self) -> Vec<MaterialId> {
        let mut order: Vec<(usize, MaterialId)> = self
            .ids()
            .map(|id| (self.referenced_materials(id).len(), id))
            .collect();
        order.sort();
        order.into_iter().map(|(_, id)| id).collect()
    }

    pub fn referenced_materials(&self, id: MaterialId) -> HashSet<MaterialId> {
        let mut referenced = HashSet::new();
        self[id].add_referenced_materials(self, &mut referenced);
        referenced
    }

    pub fn referenced_textures(&self) -> HashSet<TextureRef> {
        let mut referenced = HashSet::new();
        for id in self.ids() {
            self[id].add_referenced_textures(self, &mut referenced);
        }
        referenced
    }

    /// Property records of every material, children first.
    pub fn to_properties(&self) -> Properties {
        let mut props = Properties::new();
        for id in self.dependency_order() {
            props.merge(self[id].to_properties(self));
        }
        props
    }

    fn check_volumes(&self, material: &dyn Material) -> Result<(), RegistryError> {
        let base = material.base();
        match base.interior_volume.into_iter().chain(base.exterior_volume).find(|v| !self.contains(*v)) {
            Some(volume) => Err(RegistryError::DanglingHandle(volume)),
            None => Ok(()),
        }
    }

    // The edited material is moved out of its slot while it reads the rest
    // of the graph, so it must not be reachable from its own children.
    fn edit<R>(&mut self,
               id: MaterialId,
               f: impl FnOnce(&mut dyn Material, &MaterialRegistry) -> R) -> Option<R> {
        let mut material = self.slots.get_mut(id.0)?.take()?;
        let result = f(&mut *material, self);
        self.slots[id.0] = Some(material);
        Some(result)
    }
}

impl Index<MaterialId> for MaterialRegistry {
    type Output = dyn Material;

    fn index(&self, id: MaterialId) -> &Self::Output {
        match self.slots.get(id.0) {
            Some(Some(material)) => material.as_ref(),
            _ => panic!("material {} is not live in the registry", id),
        }
    }
}
