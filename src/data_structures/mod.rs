//! Scene data: meshes, materials, lights, instances, textures and the scene graph.
//!
//! - `model` holds CPU-side mesh data, vertex layouts and bounds
//! - `material` holds shared material templates and their per-mesh instances
//! - `light` describes spot and ambient lights and packs them for the GPU
//! - `instance` holds per-copy transformation data
//! - `scene_graph` organizes nodes hierarchically and tracks model placements
//! - `texture` wraps GPU textures and render targets

pub mod instance;
pub mod light;
pub mod material;
pub mod model;
pub mod scene_graph;
pub mod texture;
