//! vitrine
//!
//! A small cross-platform showcase renderer for native and WASM targets. It
//! loads one glTF model, dresses its meshes in crystal or matte materials,
//! lights it with a studio rig and renders it through bloom, ACES tone
//! mapping and FXAA while the user orbits the camera. Frames can be saved as
//! PNG.
//!
//! High-level modules
//! - `camera`: orbit camera, its input controller and the projection
//! - `capture`: reading back a frame and saving it as PNG
//! - `config`: the stage defaults and the three showcase variants
//! - `context`: central GPU and window context that owns device/queue/pipelines
//! - `data_structures`: scene graph, meshes, materials, lights, textures
//! - `error`: the load failure reported by model decoders
//! - `flow`: the event loop, frame clock and per-frame update
//! - `pipelines`: scene and post-processing render pipelines
//! - `render`: the GPU copy of the scene and its draw order
//! - `resources`: asset IO, glTF decoding and the model cache/loader
//!

pub mod camera;
pub mod capture;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod flow;
pub mod pipelines;
pub mod render;
pub mod resources;

// Re-exports commonly used types for convenience in downstream code.
pub use config::{StageConfig, Variant};
pub use error::LoadFailure;
pub use flow::run;
pub use resources::loader::{ModelLoader, PlacementMode, RingLayout};

/// Browser entry point: renders into the page's `canvas` element.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn run_web() -> Result<(), wasm_bindgen::JsValue> {
    run(StageConfig::default()).map_err(|e| wasm_bindgen::JsValue::from_str(&e.to_string()))
}
