use std::sync::Arc;

use vitrine::{
    Variant,
    data_structures::{
        material::{MaterialInstance, MaterialRule, MaterialSpec},
        scene_graph::{NodeKind, SceneNode},
    },
    resources::loader::assign_materials,
};

mod common;
use common::test_utils::{assert_close, showcase_model};

fn material_of<'a>(root: &'a SceneNode, name: &str) -> &'a MaterialInstance {
    match &root.find(name).expect("node exists").kind {
        NodeKind::Mesh(mesh) => mesh.material.as_ref().expect("material assigned"),
        other => panic!("{name} is not a mesh: {other:?}"),
    }
}

#[test]
fn case_meshes_get_crystal_and_the_rest_flat_white() {
    let mut model = showcase_model();
    assign_materials(&mut model, &Variant::Showcase.material_rule());

    assert_eq!(material_of(&model, "glass_case").template.name, "crystal_case");
    assert_eq!(material_of(&model, "stand").template.name, "flat_white");
}

#[test]
fn uniform_variant_uses_one_material_everywhere() {
    let mut model = showcase_model();
    assign_materials(&mut model, &Variant::Uniform.material_rule());

    let case = material_of(&model, "glass_case");
    let stand = material_of(&model, "stand");
    assert_eq!(stand.template.name, "crystal_case");
    // one shared template, not a copy per mesh
    assert!(Arc::ptr_eq(&case.template, &stand.template));
}

#[test]
fn only_meshes_receive_materials() {
    let mut model = showcase_model();
    assign_materials(&mut model, &Variant::Showcase.material_rule());
    assert!(matches!(model.kind, NodeKind::Group));
    assert_eq!(model.mesh_count(), 2);
}

#[test]
fn every_mesh_animates_with_its_own_phase() {
    let mut model = showcase_model();
    let rule = MaterialRule::Uniform(Arc::new(MaterialSpec::crystal_case()));
    assign_materials(&mut model, &rule);

    let case = material_of(&model, "glass_case");
    let stand = material_of(&model, "stand");
    assert_ne!(case.phase, stand.phase);

    let time = 1.0;
    assert_ne!(case.evaluate(time).film[0], stand.evaluate(time).film[0]);
}

#[test]
fn iridescence_pulse_stays_in_range() {
    let crystal = MaterialInstance::new(Arc::new(MaterialSpec::crystal_case()), 0.0);
    for step in 0..100 {
        let thickness = crystal.evaluate(step as f32 * 0.37).film[0];
        assert!((100.0..=400.0).contains(&thickness), "{thickness}");
    }
    // sin(0) sits halfway between the bounds
    assert_close(crystal.evaluate(0.0).film[0], 250.0);
}

#[test]
fn uniform_packs_the_optical_parameters() {
    let uniform = MaterialInstance::new(Arc::new(MaterialSpec::crystal_case()), 0.0).evaluate(0.0);
    assert_eq!(uniform.color[3], 0.5);
    assert_eq!(uniform.surface, [0.0, 0.0, 1.0, 10.0]);
    assert_eq!(uniform.optics[0], 2.5);
    assert_eq!(uniform.optics[1], 1.0);
    assert_eq!(uniform.coat[0], 1.0);
    assert_close(uniform.coat[1], 0.1);

    let white = MaterialInstance::new(Arc::new(MaterialSpec::flat_white()), 0.0).evaluate(0.0);
    assert_eq!(white.optics[2], 0.0);
    assert_eq!(white.optics[3], 1.0);
}
