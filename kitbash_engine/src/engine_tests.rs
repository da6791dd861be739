// Copyright (C) 2024 kitbash contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use pretty_assertions::assert_eq;

use crate::compiler::cache::GenerateKind;
use crate::compiler::context::LayoutFlags;
use crate::compiler::diagnostics::{DiagnosticKind, Severity};
use crate::compiler::interner::{hash32, IdInterner};
use crate::compiler::output::{IrSocket, ParameterKind, ResourceKind};
use crate::compiler::{compile_graph, CompileOptions, GraphCompiler};
use crate::graph::serialization::SerializedGraph;
use crate::graph::*;
use crate::ir::*;
use crate::prelude::*;

fn body_mesh() -> MeshAsset {
    MeshAsset {
        bones: vec!["Hips".into(), "Spine".into(), "Head".into()],
        ..MeshAsset::skinned("Human", 1)
    }
}

fn test_graph() -> SourceGraph {
    let mut graph = SourceGraph::new();
    graph.assets.meshes.insert("Body".into(), body_mesh());
    graph
}

fn object(graph: &mut SourceGraph, name: &str) -> NodeId {
    graph.add_node(NodeKind::Object(ObjectNode::named(name)))
}

fn component(graph: &mut SourceGraph, name: &str, mesh: &str) -> NodeId {
    graph.add_node(NodeKind::Component(ComponentNode {
        name: name.into(),
        socket_priority: 0,
        variant: ComponentVariant::Mesh {
            reference_mesh: Some(mesh.into()),
            num_lods: 1,
            auto_lod: AutoLodStrategy::Manual,
        },
    }))
}

fn mesh_asset(graph: &mut SourceGraph, asset: &str) -> NodeId {
    graph.add_node(NodeKind::Mesh(MeshNode::Asset {
        asset: asset.into(),
        section: 0,
    }))
}

fn surface(graph: &mut SourceGraph, name: &str) -> NodeId {
    graph.add_node(NodeKind::Surface(SurfaceNode {
        name: name.into(),
        material: "Standard".into(),
        ..Default::default()
    }))
}

fn add_surface(graph: &mut SourceGraph, target: &str) -> NodeId {
    graph.add_node(NodeKind::Modifier(ModifierNode {
        target_component: target.into(),
        required_tags: vec![],
        op: ModifierOp::AddSurface,
    }))
}

fn connect(graph: &mut SourceGraph, src: NodeId, src_pin: &str, dst: NodeId, dst_pin: &str) {
    graph.connect(src, src_pin, dst, dst_pin).unwrap();
}

fn out(graph: &SourceGraph, node: NodeId, name: &str) -> PinId {
    graph.output_pin(node, name).unwrap()
}

fn asset_lod(surface: &IrSurface) -> u8 {
    match &*mesh_of(surface) {
        IrMesh::Asset(asset) => asset.lod,
        other => panic!("Unexpected mesh {other:?}"),
    }
}

fn bone_ids(surface: &IrSurface) -> Vec<u32> {
    match &*mesh_of(surface) {
        IrMesh::Asset(asset) => asset.bone_ids.clone(),
        other => panic!("Unexpected mesh {other:?}"),
    }
}

fn added_surface(modifier: &IrModifier) -> Rc<IrSurface> {
    match &modifier.lods[0].op {
        IrModifierOp::AddSurface { surface } => Rc::clone(surface),
        other => panic!("Expected an added surface, found {other:?}"),
    }
}

#[test]
pub fn memoized_generation_returns_the_same_node() {
    let mut graph = test_graph();
    let mesh = mesh_asset(&mut graph, "Body");
    let skin = surface(&mut graph, "Skin");
    connect(&mut graph, mesh, "mesh", skin, "mesh");
    let pin = out(&graph, skin, "surface");

    let mut compiler = GraphCompiler::new(&graph, CompileOptions::default());
    let first = compiler.generate_surface(pin).unwrap();
    let second = compiler.generate_surface(pin).unwrap();
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(compiler.stats().constructions_of(skin), 1);
    assert_eq!(compiler.stats().constructions[GenerateKind::Surface], 1);
    assert_eq!(compiler.stats().cache_hits[GenerateKind::Surface], 1);

    // Surfaces depend on the LOD, so a new one is generated
    let other_lod = compiler.with_lod(1).generate_surface(pin).unwrap();
    assert!(!Rc::ptr_eq(&first, &other_lod));
    assert_eq!(compiler.stats().constructions_of(skin), 2);
    // The mesh asset only has one LOD, so both surfaces read LOD 0
    assert_eq!(asset_lod(&first), 0);
    assert_eq!(asset_lod(&other_lod), 0);
    assert!(compiler.diagnostics().is_empty());
}

#[test]
pub fn cycles_terminate_and_are_reported_once() {
    let mut graph = test_graph();
    let root = object(&mut graph, "Root");
    let body = component(&mut graph, "Body", "Body");
    let a = graph.add_node(NodeKind::Mesh(MeshNode::Transform {
        transform: glam::Mat4::IDENTITY,
    }));
    let b = graph.add_node(NodeKind::Mesh(MeshNode::Transform {
        transform: glam::Mat4::IDENTITY,
    }));
    connect(&mut graph, a, "mesh", b, "base");
    connect(&mut graph, b, "mesh", a, "base");
    let skin = surface(&mut graph, "Skin");
    let cloth = surface(&mut graph, "Cloth");
    connect(&mut graph, a, "mesh", skin, "mesh");
    connect(&mut graph, a, "mesh", cloth, "mesh");
    connect(&mut graph, skin, "surface", body, "lod_0");
    connect(&mut graph, cloth, "surface", body, "lod_0");
    connect(&mut graph, body, "component", root, "components");

    let output = compile_graph(&graph, CompileOptions::default());

    let cycles = output.diagnostics.of_kind(DiagnosticKind::Cycle).collect_vec();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].severity, Severity::Error);
    assert_eq!(output.cycle_origins, vec![root]);

    // The component is still generated, without the surfaces in the cycle
    let root_ir = &output.model.objects[0];
    assert_eq!(root_ir.components.len(), 1);
    assert!(root_ir.components[0].lods[0].surfaces.is_empty());
}

#[test]
pub fn recursive_macros_are_cycles() {
    let mut graph = test_graph();
    let mesh_param = vec![PinDefinition::new("mesh", DataType::Mesh)];
    let instance = |graph: &mut SourceGraph, inside: bool| {
        let kind = NodeKind::MacroInstance(MacroInstanceNode {
            macro_name: "Loop".into(),
            inputs: vec![],
            outputs: mesh_param.clone(),
        });
        if inside {
            graph.add_node_in_macro("Loop", kind)
        } else {
            graph.add_node(kind)
        }
    };
    let inner = instance(&mut graph, true);
    let output_tunnel = graph.add_node(NodeKind::Tunnel(TunnelNode {
        macro_name: "Loop".into(),
        side: TunnelSide::Output,
        params: mesh_param.clone(),
    }));
    connect(&mut graph, inner, "mesh", output_tunnel, "mesh");
    let outer = instance(&mut graph, false);

    let mut compiler = GraphCompiler::new(&graph, CompileOptions::default());
    assert!(compiler.generate_mesh(out(&graph, outer, "mesh")).is_none());
    assert_eq!(
        compiler
            .diagnostics()
            .of_kind(DiagnosticKind::Cycle)
            .count(),
        1
    );
    assert!(compiler.ctx.macro_stack.is_empty());
}

#[test]
pub fn interning_is_deterministic() {
    let names = ["Hips", "Spine", "Neck", "Head", "LeftArm", "RightArm"];
    let intern_all = |names: &mut dyn Iterator<Item = &&str>| {
        let mut interner = IdInterner::new();
        for name in names {
            interner.intern(name);
        }
        interner
            .entries()
            .into_iter()
            .map(|(id, name)| (id, name.to_owned()))
            .collect_vec()
    };
    let forward = intern_all(&mut names.iter());
    let backward = intern_all(&mut names.iter().rev());
    assert_eq!(forward, backward);

    // Repeated compiles of the same graph produce the same identifiers
    let mut graph = test_graph();
    let root = object(&mut graph, "Root");
    let body = component(&mut graph, "Body", "Body");
    let mesh = mesh_asset(&mut graph, "Body");
    let skin = surface(&mut graph, "Skin");
    connect(&mut graph, mesh, "mesh", skin, "mesh");
    connect(&mut graph, skin, "surface", body, "lod_0");
    connect(&mut graph, body, "component", root, "components");

    let first = compile_graph(&graph, CompileOptions::default());
    let second = compile_graph(&graph, CompileOptions::default());
    assert_eq!(first.model.identifiers, second.model.identifiers);
    assert_eq!(first.model.identifiers[&hash32("Spine")], "Spine");
}

#[test]
pub fn colliding_names_get_distinct_ids() {
    fn colliding(name: &str) -> u32 {
        match name {
            "Shirt" | "Pants" => 42,
            _ => hash32(name),
        }
    }

    let mut graph = test_graph();
    let mesh = mesh_asset(&mut graph, "Body");
    let shirt = surface(&mut graph, "Shirt");
    let pants = surface(&mut graph, "Pants");
    connect(&mut graph, mesh, "mesh", shirt, "mesh");
    connect(&mut graph, mesh, "mesh", pants, "mesh");

    let mut compiler = GraphCompiler::new(&graph, CompileOptions::default())
        .with_interner(IdInterner::with_hasher(colliding));
    let ids = [shirt, pants]
        .into_iter()
        .map(|node| {
            let surface = compiler.generate_surface(out(&graph, node, "surface")).unwrap();
            surface.as_material().unwrap().metadata_id
        })
        .collect_vec();
    assert_eq!(ids, vec![42, 43]);
    assert_eq!(compiler.interner().lookup("Shirt"), Some(42));
    assert_eq!(compiler.interner().lookup("Pants"), Some(43));

    let notices = compiler
        .diagnostics()
        .of_kind(DiagnosticKind::CollisionNotice)
        .collect_vec();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].severity, Severity::Info);
    assert!(!compiler.diagnostics().has_errors());
}

/// Builds a macro producing two surfaces, `a` and `b`, sharing a morphed
/// version of the mesh given as input.
fn sleeve_macro(graph: &mut SourceGraph) -> (NodeId, NodeId, NodeId) {
    let input = graph.add_node(NodeKind::Tunnel(TunnelNode {
        macro_name: "Sleeve".into(),
        side: TunnelSide::Input,
        params: vec![PinDefinition::new("mesh", DataType::Mesh)],
    }));
    let morph = graph.add_node_in_macro(
        "Sleeve",
        NodeKind::Mesh(MeshNode::Morph {
            morph_target: "Rolled".into(),
            factor: 1.0,
        }),
    );
    let a = graph.add_node_in_macro(
        "Sleeve",
        NodeKind::Surface(SurfaceNode {
            name: "SleeveA".into(),
            ..Default::default()
        }),
    );
    let b = graph.add_node_in_macro(
        "Sleeve",
        NodeKind::Surface(SurfaceNode {
            name: "SleeveB".into(),
            ..Default::default()
        }),
    );
    let output = graph.add_node(NodeKind::Tunnel(TunnelNode {
        macro_name: "Sleeve".into(),
        side: TunnelSide::Output,
        params: vec![
            PinDefinition::new("a", DataType::Surface),
            PinDefinition::new("b", DataType::Surface),
        ],
    }));
    connect(graph, input, "mesh", morph, "base");
    connect(graph, morph, "mesh", a, "mesh");
    connect(graph, morph, "mesh", b, "mesh");
    connect(graph, a, "surface", output, "a");
    connect(graph, b, "surface", output, "b");
    (morph, a, b)
}

fn sleeve_instance(graph: &mut SourceGraph) -> NodeId {
    graph.add_node(NodeKind::MacroInstance(MacroInstanceNode {
        macro_name: "Sleeve".into(),
        inputs: vec![PinDefinition::new("mesh", DataType::Mesh)],
        outputs: vec![
            PinDefinition::new("a", DataType::Surface),
            PinDefinition::new("b", DataType::Surface),
        ],
    }))
}

fn mesh_of(surface: &IrSurface) -> Rc<IrMesh> {
    Rc::clone(&surface.as_material().unwrap().mesh)
}

#[test]
pub fn macro_call_sites_are_isolated() {
    let mut graph = test_graph();
    let (morph, a, _) = sleeve_macro(&mut graph);
    let mesh = mesh_asset(&mut graph, "Body");
    let left = sleeve_instance(&mut graph);
    let right = sleeve_instance(&mut graph);
    connect(&mut graph, mesh, "mesh", left, "mesh");
    connect(&mut graph, mesh, "mesh", right, "mesh");

    let mut compiler = GraphCompiler::new(&graph, CompileOptions::default());
    let left_a = compiler.generate_surface(out(&graph, left, "a")).unwrap();
    let right_a = compiler.generate_surface(out(&graph, right, "a")).unwrap();

    assert!(!Rc::ptr_eq(&left_a, &right_a));
    assert!(!Rc::ptr_eq(&mesh_of(&left_a), &mesh_of(&right_a)));
    assert_eq!(compiler.stats().constructions_of(a), 2);
    assert_eq!(compiler.stats().constructions_of(morph), 2);
    // The mesh feeding both call sites lives outside the macro
    assert_eq!(compiler.stats().constructions_of(mesh), 1);

    // Requesting a call site again hits the cache
    let again = compiler.generate_surface(out(&graph, left, "a")).unwrap();
    assert!(Rc::ptr_eq(&left_a, &again));
    assert!(compiler.ctx.macro_stack.is_empty());
    assert!(compiler.diagnostics().is_empty());
}

#[test]
pub fn diamonds_inside_a_macro_are_shared() {
    let mut graph = test_graph();
    let (morph, _, _) = sleeve_macro(&mut graph);
    let mesh = mesh_asset(&mut graph, "Body");
    let sleeve = sleeve_instance(&mut graph);
    connect(&mut graph, mesh, "mesh", sleeve, "mesh");

    let mut compiler = GraphCompiler::new(&graph, CompileOptions::default());
    let a = compiler.generate_surface(out(&graph, sleeve, "a")).unwrap();
    let b = compiler.generate_surface(out(&graph, sleeve, "b")).unwrap();

    assert!(Rc::ptr_eq(&mesh_of(&a), &mesh_of(&b)));
    assert_eq!(compiler.stats().constructions_of(morph), 1);
    assert_eq!(compiler.stats().cache_hits[GenerateKind::Mesh], 1);
}

#[test]
pub fn extensions_of_invalid_components_are_dropped() {
    let mut graph = test_graph();
    graph.assets.meshes.insert(
        "Rock".into(),
        MeshAsset {
            lods: vec![MeshLodInfo {
                sections: 1,
                bones_to_remove: vec![],
            }],
            ..Default::default()
        },
    );
    let root = object(&mut graph, "Root");
    let base = component(&mut graph, "Base", "Rock");
    let extension = graph.add_node(NodeKind::Component(ComponentNode {
        name: "BaseExtension".into(),
        socket_priority: 0,
        variant: ComponentVariant::Extension {
            parent: "Base".into(),
            num_lods: 1,
        },
    }));
    let body = component(&mut graph, "Body", "Body");
    let mesh = mesh_asset(&mut graph, "Body");
    let skin = surface(&mut graph, "Skin");
    connect(&mut graph, mesh, "mesh", skin, "mesh");
    connect(&mut graph, skin, "surface", body, "lod_0");
    for node in [base, extension, body] {
        connect(&mut graph, node, "component", root, "components");
    }

    let output = compile_graph(&graph, CompileOptions::default());

    let fatal = output
        .diagnostics
        .of_kind(DiagnosticKind::FatalComponent)
        .collect_vec();
    assert_eq!(fatal.len(), 1);
    assert_eq!(fatal[0].node, Some(base));

    let extension_errors = output.diagnostics_for(extension);
    assert_eq!(extension_errors.len(), 1);
    assert_eq!(extension_errors[0].severity, Severity::Error);

    let components = &output.model.objects[0].components;
    assert_eq!(components.len(), 1);
    assert_eq!(components[0].name, "Body");
    assert_eq!(components[0].lods[0].surfaces.len(), 1);
    assert!(output.has_errors());
}

#[test]
pub fn shared_surface_through_two_modifiers() {
    let mut graph = test_graph();
    let root = object(&mut graph, "Root");
    let left = object(&mut graph, "Left");
    let right = object(&mut graph, "Right");
    let body = component(&mut graph, "Body", "Body");
    let left_mod = add_surface(&mut graph, "Body");
    let right_mod = add_surface(&mut graph, "Body");
    let mesh = mesh_asset(&mut graph, "Body");
    let shared = surface(&mut graph, "S");

    connect(&mut graph, body, "component", root, "components");
    connect(&mut graph, left, "object", root, "children");
    connect(&mut graph, right, "object", root, "children");
    connect(&mut graph, left_mod, "modifier", left, "modifiers");
    connect(&mut graph, right_mod, "modifier", right, "modifiers");
    connect(&mut graph, mesh, "mesh", shared, "mesh");
    connect(&mut graph, shared, "surface", left_mod, "surface");
    connect(&mut graph, shared, "surface", right_mod, "surface");

    let output = compile_graph(&graph, CompileOptions::default());

    assert_eq!(output.stats.constructions_of(shared), 1);
    let root_ir = &output.model.objects[0];
    assert_eq!(root_ir.children.len(), 2);
    let left_surface = added_surface(&root_ir.children[0].modifiers[0]);
    let right_surface = added_surface(&root_ir.children[1].modifiers[0]);
    assert!(Rc::ptr_eq(&left_surface, &right_surface));
    assert!(output.diagnostics_for(shared).is_empty());
    assert!(!output.has_errors());
}

#[test]
pub fn switches_follow_the_selected_option() {
    let mut graph = test_graph();
    let hat = graph.add_node(NodeKind::EnumParameter(EnumParameterNode {
        name: "Hat".into(),
        options: vec!["Cap".into(), "Helmet".into()],
        default: 0,
    }));
    let switch = graph.add_node(NodeKind::Switch(SwitchNode {
        data_type: DataType::Surface,
        options: 2,
    }));
    let mesh = mesh_asset(&mut graph, "Body");
    let cap = surface(&mut graph, "Cap");
    let helmet = surface(&mut graph, "Helmet");
    connect(&mut graph, mesh, "mesh", cap, "mesh");
    connect(&mut graph, mesh, "mesh", helmet, "mesh");
    connect(&mut graph, hat, "value", switch, "parameter");
    connect(&mut graph, cap, "surface", switch, "option_0");
    connect(&mut graph, helmet, "surface", switch, "option_1");
    let pin = out(&graph, switch, "value");

    let mut compiler = GraphCompiler::new(&graph, CompileOptions::default());
    let all = compiler.generate_surface(pin).unwrap();
    let IrSurface::Switch(all) = &*all else {
        panic!("Expected a switch")
    };
    assert_eq!(all.parameter, "Hat");
    assert!(all.options.iter().all(|option| option.value.is_some()));

    let options = CompileOptions {
        selected_parameter_options: [("Hat".to_string(), "Helmet".to_string())]
            .into_iter()
            .collect(),
        ..Default::default()
    };
    let mut compiler = GraphCompiler::new(&graph, options);
    let selected = compiler.generate_surface(pin).unwrap();
    let IrSurface::Switch(selected) = &*selected else {
        panic!("Expected a switch")
    };
    assert!(selected.options[0].value.is_none());
    assert!(selected.options[1].value.is_some());
    assert_eq!(compiler.stats().constructions_of(cap), 0);
    assert!(compiler.parameters.contains_key("Hat"));
}

#[test]
pub fn switch_option_count_mismatch_is_an_error() {
    let mut graph = test_graph();
    let hat = graph.add_node(NodeKind::EnumParameter(EnumParameterNode {
        name: "Hat".into(),
        options: vec!["Cap".into(), "Helmet".into(), "Crown".into()],
        default: 0,
    }));
    let switch = graph.add_node(NodeKind::Switch(SwitchNode {
        data_type: DataType::Mesh,
        options: 2,
    }));
    connect(&mut graph, hat, "value", switch, "parameter");

    let mut compiler = GraphCompiler::new(&graph, CompileOptions::default());
    assert!(compiler.generate_mesh(out(&graph, switch, "value")).is_none());
    let errors = compiler.diagnostics().for_node(switch).collect_vec();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, DiagnosticKind::Structural);
}

#[test]
pub fn unsupported_node_kinds_are_reported() {
    let mut graph = test_graph();
    let switch = graph.add_node(NodeKind::Switch(SwitchNode {
        data_type: DataType::Object,
        options: 0,
    }));
    let hat = graph.add_node(NodeKind::EnumParameter(EnumParameterNode {
        name: "Hat".into(),
        options: vec![],
        default: 0,
    }));

    let mut compiler = GraphCompiler::new(&graph, CompileOptions::default());
    assert!(compiler.generate(out(&graph, switch, "value")).is_none());
    assert!(compiler.generate(out(&graph, hat, "value")).is_none());
    assert_eq!(
        compiler
            .diagnostics()
            .of_kind(DiagnosticKind::UnsupportedNodeKind)
            .count(),
        2
    );
}

#[test]
pub fn clip_modifiers_are_generated_per_consumer() {
    let mut graph = test_graph();
    let root = object(&mut graph, "Root");
    let left = object(&mut graph, "Left");
    let right = object(&mut graph, "Right");
    let body = component(&mut graph, "Body", "Body");
    let clip = graph.add_node(NodeKind::Modifier(ModifierNode {
        target_component: "Body".into(),
        required_tags: vec![],
        op: ModifierOp::ClipWithMesh,
    }));
    let clip_mesh = mesh_asset(&mut graph, "Body");

    connect(&mut graph, body, "component", root, "components");
    connect(&mut graph, left, "object", root, "children");
    connect(&mut graph, right, "object", root, "children");
    connect(&mut graph, clip, "modifier", left, "modifiers");
    connect(&mut graph, clip, "modifier", right, "modifiers");
    connect(&mut graph, clip_mesh, "mesh", clip, "clip_mesh");

    let output = compile_graph(&graph, CompileOptions::default());

    assert_eq!(output.stats.constructions_of(clip), 2);
    assert_eq!(output.stats.constructions_of(clip_mesh), 1);
    let children = &output.model.objects[0].children;
    assert!(!Rc::ptr_eq(&children[0].modifiers[0], &children[1].modifiers[0]));

    let IrModifierOp::ClipWithMesh { clip_mesh } = &children[0].modifiers[0].lods[0].op else {
        panic!("Expected a clip modifier")
    };
    let IrMesh::Asset(asset) = &**clip_mesh else {
        panic!("Expected a mesh asset")
    };
    assert!(asset.bone_ids.is_empty());
    assert!(asset.layout_flags.contains(LayoutFlags::IGNORE_LAYOUT));
    assert!(!output.has_errors());
}

#[test]
pub fn sockets_and_streamed_resources() {
    let mut graph = SourceGraph::new();
    let mut head = MeshAsset::skinned("Human", 1);
    head.sockets = vec!["Hat".into()];
    head.streamable = true;
    graph.assets.meshes.insert("Head".into(), head.clone());
    graph.assets.meshes.insert("Helmet".into(), head);

    let root = object(&mut graph, "Root");
    for (name, priority) in [("Head", 1), ("Helmet", 5)] {
        let node = graph.add_node(NodeKind::Component(ComponentNode {
            name: name.into(),
            socket_priority: priority,
            variant: ComponentVariant::Mesh {
                reference_mesh: Some(name.into()),
                num_lods: 1,
                auto_lod: AutoLodStrategy::Manual,
            },
        }));
        for _ in 0..2 {
            let mesh = mesh_asset(&mut graph, name);
            let skin = surface(&mut graph, &format!("{name}Skin"));
            connect(&mut graph, mesh, "mesh", skin, "mesh");
            connect(&mut graph, skin, "surface", node, "lod_0");
        }
        connect(&mut graph, node, "component", root, "components");
    }

    let output = compile_graph(&graph, CompileOptions::default());

    assert_eq!(
        output.model.sockets,
        vec![IrSocket {
            name: "Hat".into(),
            component_id: Some(1),
            priority: 5,
        }]
    );
    let kinds = output
        .model
        .streamed_resources
        .iter()
        .map(|r| (r.asset.as_str(), r.kind))
        .collect_vec();
    assert_eq!(
        kinds,
        vec![("Head", ResourceKind::Mesh), ("Helmet", ResourceKind::Mesh)]
    );
    assert!(!output.has_errors());
}

#[test]
pub fn orphans_and_shared_components_are_reported() {
    let mut graph = test_graph();
    let left = object(&mut graph, "Left");
    let right = object(&mut graph, "Right");
    let body = component(&mut graph, "Body", "Body");
    connect(&mut graph, body, "component", left, "components");
    connect(&mut graph, body, "component", right, "components");
    let orphan = mesh_asset(&mut graph, "Body");
    graph.add_node(NodeKind::Comment {
        text: "Unused".into(),
    });

    let output = compile_graph(&graph, CompileOptions::default());

    assert_eq!(output.model.objects.len(), 2);
    let warnings = output.diagnostics_for(body);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].severity, Severity::Warning);
    assert_eq!(output.orphan_nodes(&graph), vec![orphan]);
}

#[test]
pub fn socket_priority_does_not_depend_on_traversal_order() {
    // The component and a modifier targeting it share one mesh node. The
    // socket must get the component priority whichever is reached first.
    let sockets_with = |component_first: bool| {
        let mut graph = SourceGraph::new();
        let mut head = MeshAsset::skinned("Human", 1);
        head.sockets = vec!["Hat".into()];
        graph.assets.meshes.insert("Head".into(), head);

        let root = object(&mut graph, "Root");
        let wearer = object(&mut graph, "Wearer");
        let decor = object(&mut graph, "Decor");
        let component = graph.add_node(NodeKind::Component(ComponentNode {
            name: "Head".into(),
            socket_priority: 5,
            variant: ComponentVariant::Mesh {
                reference_mesh: Some("Head".into()),
                num_lods: 1,
                auto_lod: AutoLodStrategy::Manual,
            },
        }));
        let modifier = add_surface(&mut graph, "Head");
        let mesh = mesh_asset(&mut graph, "Head");
        let skin = surface(&mut graph, "Skin");
        let paint = surface(&mut graph, "Paint");
        connect(&mut graph, mesh, "mesh", skin, "mesh");
        connect(&mut graph, mesh, "mesh", paint, "mesh");
        connect(&mut graph, skin, "surface", component, "lod_0");
        connect(&mut graph, paint, "surface", modifier, "surface");
        connect(&mut graph, component, "component", wearer, "components");
        connect(&mut graph, modifier, "modifier", decor, "modifiers");
        if component_first {
            connect(&mut graph, wearer, "object", root, "children");
            connect(&mut graph, decor, "object", root, "children");
        } else {
            connect(&mut graph, decor, "object", root, "children");
            connect(&mut graph, wearer, "object", root, "children");
        }

        let output = compile_graph(&graph, CompileOptions::default());
        assert!(!output.has_errors());
        output.model.sockets
    };

    let expected = vec![IrSocket {
        name: "Hat".into(),
        component_id: Some(0),
        priority: 5,
    }];
    assert_eq!(sockets_with(true), expected);
    assert_eq!(sockets_with(false), expected);
}

#[test]
pub fn automatic_lods_reuse_the_first_lod_surfaces() {
    let mut graph = SourceGraph::new();
    let mut body = MeshAsset {
        bones: vec!["Hips".into(), "Spine".into(), "Head".into()],
        ..MeshAsset::skinned("Human", 2)
    };
    body.lods[1].bones_to_remove = vec!["Spine".into()];
    graph.assets.meshes.insert("Body".into(), body);

    let root = object(&mut graph, "Root");
    let mut skins = vec![];
    for (name, auto_lod) in [
        ("Auto", AutoLodStrategy::AutomaticFromMesh),
        ("Manual", AutoLodStrategy::Manual),
    ] {
        let node = graph.add_node(NodeKind::Component(ComponentNode {
            name: name.into(),
            socket_priority: 0,
            variant: ComponentVariant::Mesh {
                reference_mesh: Some("Body".into()),
                num_lods: 2,
                auto_lod,
            },
        }));
        let mesh = mesh_asset(&mut graph, "Body");
        let skin = surface(&mut graph, "Skin");
        connect(&mut graph, mesh, "mesh", skin, "mesh");
        connect(&mut graph, skin, "surface", node, "lod_0");
        connect(&mut graph, node, "component", root, "components");
        skins.push(skin);
    }

    let output = compile_graph(&graph, CompileOptions::default());

    let auto = &output.model.objects[0].components[0];
    assert_eq!(auto.lods.len(), 2);
    let lod0 = &auto.lods[0].surfaces[0];
    let lod1 = &auto.lods[1].surfaces[0];
    assert!(!Rc::ptr_eq(lod0, lod1));
    assert_eq!(asset_lod(lod0), 0);
    assert_eq!(asset_lod(lod1), 1);
    assert_eq!(output.stats.constructions_of(skins[0]), 2);

    // Bones removed by LOD 1 of the component are left out of its mesh
    assert_eq!(bone_ids(lod0).len(), 3);
    assert_eq!(bone_ids(lod1), vec![hash32("Hips"), hash32("Head")]);

    // Manual components only get the LODs they author
    let manual = &output.model.objects[0].components[1];
    assert_eq!(manual.lods.len(), 2);
    assert_eq!(manual.lods[0].surfaces.len(), 1);
    assert!(manual.lods[1].surfaces.is_empty());
    assert_eq!(output.stats.constructions_of(skins[1]), 1);
    assert!(!output.has_errors());
}

fn outfits_graph() -> (SourceGraph, NodeId) {
    let mut graph = test_graph();
    graph
        .assets
        .images
        .insert("CasualAlbedo".into(), ImageAsset::default());
    let row = |name: &str, shape: &str, albedo: &str| DataTableRow {
        name: name.into(),
        cells: [
            ("Shape".to_string(), shape.to_string()),
            ("Albedo".to_string(), albedo.to_string()),
        ]
        .into_iter()
        .collect(),
    };
    graph.assets.tables.insert(
        "Outfits".into(),
        DataTable {
            rows: vec![
                row("Casual", "Body", "CasualAlbedo"),
                row("Formal", "Suit", "FormalAlbedo"),
            ],
        },
    );
    let table = graph.add_node(NodeKind::Table(TableNode {
        table: "Outfits".into(),
        parameter: "Outfit".into(),
        columns: vec![
            PinDefinition::new("Shape", DataType::Mesh),
            PinDefinition::new("Albedo", DataType::Image),
        ],
    }));
    (graph, table)
}

fn table_columns(compiler: &mut GraphCompiler, table: NodeId) -> (IrTableColumn, IrTableColumn) {
    let graph = compiler.graph;
    let mesh = compiler.generate_mesh(out(graph, table, "Shape")).unwrap();
    let image = compiler.generate_image(out(graph, table, "Albedo")).unwrap();
    let IrMesh::Table(shape) = &*mesh else {
        panic!("Expected a table column, found {mesh:?}")
    };
    let IrImage::Table(albedo) = &*image else {
        panic!("Expected a table column, found {image:?}")
    };
    let column = |c: &IrTableColumn| IrTableColumn {
        table: Rc::clone(&c.table),
        column: c.column.clone(),
    };
    (column(shape), column(albedo))
}

#[test]
pub fn table_columns_share_one_table() {
    let (graph, table) = outfits_graph();

    let mut compiler = GraphCompiler::new(&graph, CompileOptions::default());
    let (shape, albedo) = table_columns(&mut compiler, table);

    assert!(Rc::ptr_eq(&shape.table, &albedo.table));
    assert_eq!(shape.column, "Shape");
    assert_eq!(albedo.column, "Albedo");
    assert_eq!(compiler.stats().constructions[GenerateKind::Table], 1);

    let rows = &shape.table.rows;
    assert_eq!(
        rows.iter().map(|r| r.name.as_str()).collect_vec(),
        vec!["Casual", "Formal"]
    );
    for row in rows {
        assert_eq!(compiler.interner().lookup(&row.name), Some(row.id));
    }

    // The formal row references a missing mesh and a missing image
    let warnings = compiler.diagnostics().for_node(table).collect_vec();
    assert_eq!(warnings.len(), 2);
    assert!(warnings.iter().all(|d| d.severity == Severity::Warning));
    assert!(warnings.iter().all(|d| d.message.contains("'Formal'")));
    assert_eq!(
        compiler.parameters["Outfit"].kind,
        ParameterKind::Table {
            table: "Outfits".into(),
            rows: vec!["Casual".into(), "Formal".into()],
        }
    );
}

#[test]
pub fn selected_table_rows_restrict_the_table() {
    let (graph, table) = outfits_graph();
    let selecting = |row: &str| CompileOptions {
        selected_parameter_options: [("Outfit".to_string(), row.to_string())]
            .into_iter()
            .collect(),
        ..Default::default()
    };

    let mut compiler = GraphCompiler::new(&graph, selecting("Casual"));
    let (shape, _) = table_columns(&mut compiler, table);
    assert_eq!(shape.table.rows.len(), 1);
    assert_eq!(shape.table.rows[0].name, "Casual");
    assert!(compiler.diagnostics().is_empty());
    assert_eq!(
        compiler.parameters["Outfit"].kind,
        ParameterKind::Table {
            table: "Outfits".into(),
            rows: vec!["Casual".into()],
        }
    );

    // An unknown row falls back to the whole table
    let mut compiler = GraphCompiler::new(&graph, selecting("Pirate"));
    let (shape, _) = table_columns(&mut compiler, table);
    assert_eq!(shape.table.rows.len(), 2);
    let fallback = compiler
        .diagnostics()
        .for_node(table)
        .filter(|d| d.message.contains("'Pirate'"))
        .collect_vec();
    assert_eq!(fallback.len(), 1);
    assert_eq!(fallback[0].severity, Severity::Warning);
    assert!(!compiler.diagnostics().has_errors());
}

#[test]
pub fn input_tunnels_of_another_macro_are_rejected() {
    let mut graph = test_graph();
    let mesh_param = vec![PinDefinition::new("mesh", DataType::Mesh)];
    let stray = graph.add_node(NodeKind::Tunnel(TunnelNode {
        macro_name: "Stray".into(),
        side: TunnelSide::Input,
        params: mesh_param.clone(),
    }));
    let output_tunnel = graph.add_node(NodeKind::Tunnel(TunnelNode {
        macro_name: "Wrap".into(),
        side: TunnelSide::Output,
        params: mesh_param.clone(),
    }));
    connect(&mut graph, stray, "mesh", output_tunnel, "mesh");
    let wrap = graph.add_node(NodeKind::MacroInstance(MacroInstanceNode {
        macro_name: "Wrap".into(),
        inputs: mesh_param.clone(),
        outputs: mesh_param,
    }));
    let mesh = mesh_asset(&mut graph, "Body");
    connect(&mut graph, mesh, "mesh", wrap, "mesh");

    let mut compiler = GraphCompiler::new(&graph, CompileOptions::default());
    assert!(compiler.generate_mesh(out(&graph, wrap, "mesh")).is_none());

    let errors = compiler.diagnostics().for_node(stray).collect_vec();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, DiagnosticKind::Structural);
    assert_eq!(errors[0].severity, Severity::Error);
    assert_eq!(compiler.stats().constructions_of(mesh), 0);
    assert!(compiler.ctx.macro_stack.is_empty());
}

#[test]
pub fn demo_graphs_compile() {
    let demos = ["../demos/character.kgraph.ron"];
    for path in demos {
        let graph = SerializedGraph::load_from_file(path)
            .unwrap()
            .into_runtime()
            .unwrap();
        let output = compile_graph(&graph, CompileOptions::default());
        let errors = output
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .collect_vec();
        assert!(errors.is_empty(), "{path}: {errors:?}");
        assert_eq!(output.model.objects.len(), 1);
        assert!(output.orphan_nodes(&graph).is_empty());
    }
}
