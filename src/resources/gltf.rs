//! glTF / GLB decoding into [`SceneNode`] trees.

use std::{collections::HashMap, sync::Arc};

use anyhow::{Context as _, anyhow, bail};
use cgmath::{InnerSpace, Vector3, Zero};

use crate::{
    data_structures::{
        instance::Instance,
        model::{MeshData, MeshVertex},
        scene_graph::{NodeKind, SceneNode},
    },
    resources::{AssetRoot, load_binary, sibling_path},
};

/// Extensions whose data we cannot decode; files that require them are rejected.
const UNSUPPORTED_EXTENSIONS: &[&str] = &["KHR_draco_mesh_compression", "EXT_meshopt_compression"];

/// Fetches and decodes the model at `path`, including external buffers.
pub async fn load_gltf(root: &AssetRoot, path: &str) -> anyhow::Result<SceneNode> {
    let bytes = load_binary(root, path).await?;
    let gltf = parse(&bytes)?;

    let mut fetched = HashMap::new();
    for buffer in gltf.buffers() {
        if let gltf::buffer::Source::Uri(uri) = buffer.source() {
            if !fetched.contains_key(uri) {
                let bin = load_binary(root, &sibling_path(path, uri)).await?;
                fetched.insert(uri.to_string(), bin);
            }
        }
    }
    let buffers = resolve_buffers(&gltf, path, |uri| {
        fetched
            .get(uri)
            .cloned()
            .ok_or_else(|| anyhow!("{path} references the unfetched buffer {uri}"))
    })?;
    build_scene(&gltf.document, &buffers, path)
}

/// Decodes a self-contained GLB (or glTF without external buffers).
pub fn decode_glb(bytes: &[u8], name: &str) -> anyhow::Result<SceneNode> {
    let gltf = parse(bytes)?;
    let buffers = resolve_buffers(&gltf, name, |uri| {
        bail!("{name} references the external buffer {uri}")
    })?;
    build_scene(&gltf.document, &buffers, name)
}

/// Buffer contents in document order; `external` supplies the ones stored
/// outside the file.
fn resolve_buffers(
    gltf: &gltf::Gltf,
    name: &str,
    mut external: impl FnMut(&str) -> anyhow::Result<Vec<u8>>,
) -> anyhow::Result<Vec<Vec<u8>>> {
    gltf.buffers()
        .map(|buffer| match buffer.source() {
            gltf::buffer::Source::Bin => gltf
                .blob
                .clone()
                .ok_or_else(|| anyhow!("{name} references a binary chunk it does not have")),
            gltf::buffer::Source::Uri(uri) => external(uri),
        })
        .collect()
}

fn parse(bytes: &[u8]) -> anyhow::Result<gltf::Gltf> {
    let gltf = gltf::Gltf::from_slice(bytes).context("not a valid glTF/GLB file")?;
    if let Some(ext) = gltf
        .extensions_required()
        .find(|ext| UNSUPPORTED_EXTENSIONS.contains(ext))
    {
        bail!("the file requires the unsupported extension {ext}");
    }
    Ok(gltf)
}

/// Builds the node tree of the default scene (or the first one).
pub fn build_scene(
    document: &gltf::Document,
    buffers: &[Vec<u8>],
    name: &str,
) -> anyhow::Result<SceneNode> {
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| anyhow!("{name} contains no scene"))?;

    let mut roots = scene
        .nodes()
        .map(|node| to_scene_node(node, buffers))
        .collect::<anyhow::Result<Vec<_>>>()?;

    if roots.len() == 1 {
        // one root: hand it out directly
        if let Some(root) = roots.pop() {
            return Ok(root);
        }
    }
    let mut root = SceneNode::group(scene.name().unwrap_or(name));
    root.children = roots;
    Ok(root)
}

fn to_scene_node(node: gltf::Node, buffers: &[Vec<u8>]) -> anyhow::Result<SceneNode> {
    let name = node
        .name()
        .or_else(|| node.mesh().and_then(|mesh| mesh.name()))
        .map(str::to_string)
        .unwrap_or_else(|| format!("node_{}", node.index()));

    let kind = match (node.mesh(), node.camera()) {
        (Some(mesh), _) => {
            let primitives = mesh
                .primitives()
                .filter_map(|primitive| match primitive.mode() {
                    gltf::mesh::Mode::Triangles => Some(read_primitive(&primitive, buffers)),
                    mode => {
                        log::warn!("skipping {:?} primitive of mesh {}", mode, name);
                        None
                    }
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            NodeKind::Mesh(crate::data_structures::scene_graph::MeshNode {
                primitives,
                material: None,
            })
        }
        (None, Some(_)) => NodeKind::Other,
        (None, None) => NodeKind::Group,
    };

    let (position, rotation, scale) = node.transform().decomposed();
    let mut scene_node = SceneNode::new(name, kind).with_local(Instance {
        position: position.into(),
        rotation: cgmath::Quaternion::new(rotation[3], rotation[0], rotation[1], rotation[2]),
        scale: scale.into(),
    });
    for child in node.children() {
        scene_node.add_child(to_scene_node(child, buffers)?);
    }
    Ok(scene_node)
}

fn read_primitive(
    primitive: &gltf::Primitive,
    buffers: &[Vec<u8>],
) -> anyhow::Result<Arc<MeshData>> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .ok_or_else(|| anyhow!("primitive {} has no positions", primitive.index()))?
        .collect();
    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };
    if let Some(&bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
        bail!("index {bad} is out of range for {} vertices", positions.len());
    }

    let normals: Vec<[f32; 3]> = match reader.read_normals() {
        Some(normals) => normals.collect(),
        None => smooth_normals(&positions, &indices),
    };

    let vertices = positions
        .iter()
        .enumerate()
        .map(|(i, &position)| MeshVertex {
            position,
            normal: normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
        })
        .collect();
    Ok(Arc::new(MeshData::new(vertices, indices)))
}

/// Area-weighted vertex normals for files that ship without them.
fn smooth_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut acc = vec![Vector3::zero(); positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let pa = Vector3::from(positions[a]);
        let pb = Vector3::from(positions[b]);
        let pc = Vector3::from(positions[c]);
        let face = (pb - pa).cross(pc - pa);
        acc[a] += face;
        acc[b] += face;
        acc[c] += face;
    }
    acc.into_iter()
        .map(|n| {
            if n.magnitude2() > 0.0 {
                n.normalize().into()
            } else {
                [0.0, 1.0, 0.0]
            }
        })
        .collect()
}
