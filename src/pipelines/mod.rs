//! Render pipelines.
//!
//! - `basic` holds the shared pipeline constructor and layout entry helpers
//! - `light` holds the light uniform buffer and bind group
//! - `scene` draws model meshes into the HDR target
//! - `post` runs bloom, tone mapping and FXAA

pub mod basic;
pub mod light;
pub mod post;
pub mod scene;
