// Copyright @yucwang 2021

pub mod bsdf;
pub mod computation_node;
pub mod interaction;
pub mod material;
pub mod registry;
pub mod rng;
pub mod scene_loader;
pub mod texture;
