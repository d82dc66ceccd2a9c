use vitrine::{
    data_structures::scene_graph::NodeKind,
    resources::{
        AssetRoot,
        gltf::decode_glb,
        loader::{GltfDecoder, ModelDecoder},
        sibling_path,
    },
};

mod common;
use common::test_utils::{assert_close, glb, triangle_document, triangle_glb};

#[test]
fn decodes_a_glb_triangle() {
    let root = decode_glb(&triangle_glb("glass_case"), "triangle.glb").unwrap();

    assert_eq!(root.name, "glass_case");
    assert_close(root.local.position.y, 1.0);
    let NodeKind::Mesh(mesh) = &root.kind else {
        panic!("expected a mesh, got {:?}", root.kind);
    };
    assert_eq!(mesh.primitives.len(), 1);
    let primitive = &mesh.primitives[0];
    assert_eq!(primitive.indices, vec![0, 1, 2]);
    assert_eq!(primitive.vertices.len(), 3);

    // the file has no normals, so they are computed from the face
    for vertex in &primitive.vertices {
        assert_close(vertex.normal[2], 1.0);
    }

    // bounds include the node's own translation
    let bounds = root.bounds().unwrap();
    assert_close(bounds.min.y, 1.0);
    assert_close(bounds.max.y, 2.0);
}

#[test]
fn rejects_garbage() {
    assert!(decode_glb(b"definitely not a model", "junk.glb").is_err());
}

#[test]
fn rejects_compressed_meshes() {
    let json = r#"{
  "asset": {"version": "2.0"},
  "extensionsUsed": ["KHR_draco_mesh_compression"],
  "extensionsRequired": ["KHR_draco_mesh_compression"],
  "scenes": [{"nodes": []}]
}"#;
    assert!(decode_glb(&glb(json, &[]), "draco.glb").is_err());
}

#[test]
fn self_contained_decoding_refuses_external_buffers() {
    let (json, _) = triangle_document("glass_case", Some("triangle.bin"));
    let err = decode_glb(json.as_bytes(), "triangle.gltf").unwrap_err();
    assert!(err.to_string().contains("triangle.bin"));
}

#[test]
fn external_buffers_resolve_next_to_the_model() {
    assert_eq!(sibling_path("models/case.gltf", "case.bin"), "models/case.bin");
    assert_eq!(sibling_path("case.gltf", "case.bin"), "case.bin");
}

#[tokio::test]
async fn gltf_decoder_reads_from_the_asset_root() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("triangle.glb"), triangle_glb("stand")).unwrap();
    let decoder = GltfDecoder::new(AssetRoot(dir.path().to_string_lossy().into_owned()));

    let root = decoder.decode("triangle.glb").await.unwrap();
    assert_eq!(root.name, "stand");
    assert_eq!(root.mesh_count(), 1);

    let failure = decoder.decode("missing.glb").await.unwrap_err();
    assert_eq!(failure.path, "missing.glb");
}

#[tokio::test]
async fn gltf_decoder_fetches_external_buffers() {
    let dir = tempfile::tempdir().unwrap();
    let models = dir.path().join("models");
    std::fs::create_dir(&models).unwrap();
    let (json, bin) = triangle_document("glass_case", Some("triangle.bin"));
    std::fs::write(models.join("triangle.gltf"), json).unwrap();
    std::fs::write(models.join("triangle.bin"), bin).unwrap();
    let decoder = GltfDecoder::new(AssetRoot(dir.path().to_string_lossy().into_owned()));

    let root = decoder.decode("models/triangle.gltf").await.unwrap();
    assert_eq!(root.name, "glass_case");
    let NodeKind::Mesh(mesh) = &root.kind else {
        panic!("expected a mesh, got {:?}", root.kind);
    };
    assert_eq!(mesh.primitives[0].indices, vec![0, 1, 2]);

    std::fs::remove_file(models.join("triangle.bin")).unwrap();
    assert!(decoder.decode("models/triangle.gltf").await.is_err());
}
