// Copyright @yucwang 2023

pub mod glossy;
pub mod matte;
pub mod microfacet;
pub mod mirror;
pub mod null;
pub mod twosided;
