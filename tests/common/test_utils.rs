#![allow(dead_code)]

use std::{cell::Cell, rc::Rc, sync::Arc};

use futures::{
    channel::oneshot,
    future::{FutureExt, LocalBoxFuture, Shared},
};
use vitrine::{
    LoadFailure,
    data_structures::{
        instance::Instance,
        model::{MeshData, MeshVertex},
        scene_graph::SceneNode,
    },
    resources::loader::ModelDecoder,
};

pub fn assert_close(a: f32, b: f32) {
    assert!((a - b).abs() < 1e-4, "{a} != {b}");
}

/// The eight corners of `min..max`; only the bounds of this mesh matter.
pub fn box_mesh(min: [f32; 3], max: [f32; 3]) -> Arc<MeshData> {
    let vertices = (0..8)
        .map(|i| MeshVertex {
            position: [
                if i & 1 == 0 { min[0] } else { max[0] },
                if i & 2 == 0 { min[1] } else { max[1] },
                if i & 4 == 0 { min[2] } else { max[2] },
            ],
            normal: [0.0, 1.0, 0.0],
        })
        .collect();
    Arc::new(MeshData::new(vertices, vec![0, 1, 2, 1, 3, 2]))
}

/// A display case on a stand, both inside a group.
pub fn showcase_model() -> SceneNode {
    let mut root = SceneNode::group("exhibit");
    root.add_child(SceneNode::mesh(
        "glass_case",
        vec![box_mesh([-1.0, 0.0, -1.0], [1.0, 2.0, 1.0])],
    ));
    root.add_child(
        SceneNode::mesh("stand", vec![box_mesh([-1.0, -0.5, -1.0], [1.0, 0.0, 1.0])])
            .with_local(Instance::new()),
    );
    root
}

/// Decoder that hands out a fixed tree and counts its calls.
pub struct FakeDecoder {
    calls: Rc<Cell<usize>>,
    model: Option<SceneNode>,
    gate: Option<Shared<oneshot::Receiver<()>>>,
}

impl FakeDecoder {
    pub fn succeeding(model: SceneNode) -> Self {
        Self {
            calls: Rc::new(Cell::new(0)),
            model: Some(model),
            gate: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: Rc::new(Cell::new(0)),
            model: None,
            gate: None,
        }
    }

    /// Decodes only finish once the returned sender fires.
    pub fn gated(mut self) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        self.gate = Some(rx.shared());
        (self, tx)
    }

    pub fn calls(&self) -> Rc<Cell<usize>> {
        self.calls.clone()
    }
}

impl ModelDecoder for FakeDecoder {
    fn decode(&self, path: &str) -> LocalBoxFuture<'static, Result<SceneNode, LoadFailure>> {
        self.calls.set(self.calls.get() + 1);
        let gate = self.gate.clone();
        let model = self.model.clone();
        let path = path.to_string();
        async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            model.ok_or_else(|| LoadFailure::new(path, anyhow::anyhow!("truncated file")))
        }
        .boxed_local()
    }
}

/// Wraps a JSON document and a binary chunk into a GLB container.
pub fn glb(json: &str, bin: &[u8]) -> Vec<u8> {
    let mut json = json.as_bytes().to_vec();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let mut bin = bin.to_vec();
    while bin.len() % 4 != 0 {
        bin.push(0);
    }

    let mut total = 12 + 8 + json.len();
    if !bin.is_empty() {
        total += 8 + bin.len();
    }

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(b"JSON");
    out.extend_from_slice(&json);
    if !bin.is_empty() {
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(b"BIN\0");
        out.extend_from_slice(&bin);
    }
    out
}

/// One triangle in the XY plane, without normals, in a node lifted by one unit.
///
/// Returns the JSON document and its buffer; with `buffer_uri` the document
/// points at an external file instead of the GLB binary chunk.
pub fn triangle_document(node_name: &str, buffer_uri: Option<&str>) -> (String, Vec<u8>) {
    let positions: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    let indices: [u16; 3] = [0, 1, 2];
    let mut bin: Vec<u8> = bytemuck::cast_slice(&positions).to_vec();
    bin.extend_from_slice(bytemuck::cast_slice(&indices));

    let uri = buffer_uri
        .map(|uri| format!(r#", "uri": "{uri}""#))
        .unwrap_or_default();
    let json = format!(
        r#"{{
  "asset": {{"version": "2.0"}},
  "scene": 0,
  "scenes": [{{"nodes": [0]}}],
  "nodes": [{{"name": "{node_name}", "mesh": 0, "translation": [0.0, 1.0, 0.0]}}],
  "meshes": [{{"name": "triangle", "primitives": [{{"attributes": {{"POSITION": 0}}, "indices": 1}}]}}],
  "buffers": [{{"byteLength": 42{uri}}}],
  "bufferViews": [
    {{"buffer": 0, "byteOffset": 0, "byteLength": 36, "target": 34962}},
    {{"buffer": 0, "byteOffset": 36, "byteLength": 6, "target": 34963}}
  ],
  "accessors": [
    {{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]}},
    {{"bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR"}}
  ]
}}"#
    );
    (json, bin)
}

pub fn triangle_glb(node_name: &str) -> Vec<u8> {
    let (json, bin) = triangle_document(node_name, None);
    glb(&json, &bin)
}
