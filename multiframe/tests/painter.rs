use glam::{uvec2, vec2, vec3, UVec2};
use multiframe::{
    gpu, Camera, DrawCall, Drawable, Event, MaskTable, Material, MaterialId,
    MeshData, MultiFramePainter, PainterConfig, PropertyValue,
    RecordingBackend, RenderToggles, Scene,
};

fn config(size: UVec2) -> PainterConfig {
    PainterConfig {
        viewport_size: size,
        ..Default::default()
    }
}

fn painter(
    backend: &mut RecordingBackend,
    config: PainterConfig,
) -> MultiFramePainter {
    MultiFramePainter::new(backend, config).unwrap()
}

fn pyramid(backend: &mut RecordingBackend) -> Scene {
    let vertex = |x: f32, y: f32, z: f32| {
        gpu::Vertex::new(vec3(x, y, z), vec3(x, 1.0, z).normalize(), vec2(x, z))
    };

    let mesh = MeshData {
        vertices: vec![
            vertex(-1.0, 0.0, -1.0),
            vertex(1.0, 0.0, -1.0),
            vertex(1.0, 0.0, 1.0),
            vertex(-1.0, 0.0, 1.0),
            vertex(0.0, 1.5, 0.0),
        ],
        indices: vec![0, 1, 4, 1, 2, 4, 2, 3, 4, 3, 0, 4],
    };

    let mut scene = Scene::default();

    scene.materials.insert(MaterialId(0), Material::default());

    scene.drawables.insert(
        MaterialId(0),
        vec![Drawable::new(backend, "pyramid", mesh)],
    );

    scene
}

fn pass_labels(events: &[Event]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Rendered { label, .. } | Event::Computed { label, .. } => {
                Some(label.as_str())
            }
            _ => None,
        })
        .collect()
}

fn meshes_created(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, Event::MeshCreated { .. }))
        .count()
}

fn meshes_destroyed(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, Event::MeshDestroyed { .. }))
        .count()
}

fn params<P>(draw: &DrawCall) -> P
where
    P: bytemuck::Pod,
{
    bytemuck::pod_read_unaligned(&draw.params)
}

fn position(labels: &[&str], label: &str) -> usize {
    labels
        .iter()
        .position(|l| *l == label)
        .unwrap_or_else(|| panic!("Pass not found: {label}"))
}

#[test]
fn stages_run_in_order() {
    let mut backend = RecordingBackend::new();
    let mut target = painter(&mut backend, config(uvec2(320, 240)));

    target.paint(&mut backend).unwrap();

    let events = backend.take_events();
    let labels = pass_labels(&events);

    let expected = [
        "point_shadowmap",
        "gbuffer_geometry",
        "shadowmap",
        "rsm_geometry",
        "vpl_processor",
        "ism_resolve",
        "light_clustering",
        "final_gathering",
        "gi_blur_x",
        "gi_blur_y",
        "deferred_shading",
        "frame_accumulation",
    ];

    let positions: Vec<_> = expected
        .iter()
        .map(|label| position(&labels, label))
        .collect();

    assert!(
        positions.windows(2).all(|pair| pair[0] < pair[1]),
        "{labels:?}"
    );

    assert_eq!(Some(&Event::FrameFinished), events.last());
}

#[test]
fn resizing_happens_before_drawing() {
    let mut backend = RecordingBackend::new();
    let mut target = painter(&mut backend, config(uvec2(320, 240)));

    target.paint(&mut backend).unwrap();
    backend.take_events();

    target.resize(uvec2(640, 360));
    target.paint(&mut backend).unwrap();

    let events = backend.take_events();

    let resized = |label: &str| {
        events.iter().position(|event| {
            matches!(
                event,
                Event::TextureResized { label: l, size, .. }
                    if l == label && *size == uvec2(640, 360)
            )
        })
    };

    let rendered = |label: &str| {
        events.iter().position(|event| {
            matches!(event, Event::Rendered { label: l, .. } if l == label)
        })
    };

    let shaded_frame = resized("shaded_frame").unwrap();
    let shading = rendered("deferred_shading").unwrap();

    assert!(shaded_frame < shading);

    for event in &events {
        if let Event::Rendered {
            label, target_size, ..
        } = event
        {
            if !label.starts_with("rsm") && !label.ends_with("shadowmap") {
                assert_eq!(uvec2(640, 360), *target_size, "{label}");
            }
        }
    }

    assert_eq!(uvec2(640, 360), target.virtual_viewport().size());
}

#[test]
fn full_hd_ignores_host_viewport() {
    let mut backend = RecordingBackend::new();

    let mut target = painter(
        &mut backend,
        PainterConfig {
            full_hd: true,
            ..config(uvec2(320, 240))
        },
    );

    target.resize(uvec2(640, 360));
    target.paint(&mut backend).unwrap();

    assert_eq!(multiframe::FULL_HD, target.virtual_viewport().size());

    target.set_full_hd(false);
    target.paint(&mut backend).unwrap();

    assert_eq!(uvec2(640, 360), target.virtual_viewport().size());
}

#[test]
fn accumulation_stops_after_multi_frame_count() {
    let mut backend = RecordingBackend::new();

    let mut target = painter(
        &mut backend,
        PainterConfig {
            toggles: RenderToggles {
                multi_frame_count: 4,
                ..Default::default()
            },
            ..config(uvec2(64, 64))
        },
    );

    for frame in 1..=4 {
        target.paint(&mut backend).unwrap();

        assert_eq!(frame, target.current_frame());
        assert!(target.is_accumulating());
    }

    target.paint(&mut backend).unwrap();
    target.paint(&mut backend).unwrap();

    assert!(!target.is_accumulating());
    assert_eq!(4, backend.renders("frame_accumulation"));
    assert_eq!(4, backend.renders("gbuffer_geometry"));

    target.set_camera(Camera::new(vec3(1.0, 2.0, 3.0), vec3(0.0, 0.0, 0.0)));
    target.paint(&mut backend).unwrap();

    assert_eq!(1, target.current_frame());
    assert!(target.is_accumulating());
    assert_eq!(5, backend.renders("frame_accumulation"));
}

#[test]
fn changing_multi_frame_count_restarts_accumulation() {
    let mut backend = RecordingBackend::new();
    let mut target = painter(&mut backend, config(uvec2(64, 64)));

    for _ in 0..3 {
        target.paint(&mut backend).unwrap();
    }

    assert_eq!(3, target.current_frame());

    target.set_toggles(RenderToggles {
        multi_frame_count: 8,
        ..*target.toggles().get()
    });

    target.paint(&mut backend).unwrap();

    assert_eq!(1, target.current_frame());
}

#[test]
fn final_gathering_variants_are_reused() {
    let mut backend = RecordingBackend::new();
    let mut target = painter(&mut backend, config(uvec2(64, 64)));

    target.paint(&mut backend).unwrap();

    let first = target.gi().fg_program();

    assert_eq!(1, target.gi().fg_variant_count());

    target.set_property("GIShadowing", false).unwrap();
    target.paint(&mut backend).unwrap();

    let second = target.gi().fg_program();

    assert_ne!(first, second);
    assert_eq!(2, target.gi().fg_variant_count());

    let compiled = backend.compiled_programs();

    target.set_property("GIShadowing", true).unwrap();
    target.paint(&mut backend).unwrap();

    assert_eq!(first, target.gi().fg_program());
    assert_eq!(2, target.gi().fg_variant_count());
    assert_eq!(compiled, backend.compiled_programs());

    // Knobs that live in uniforms don't touch the program
    target.set_property("LightIntensity", 3.0f32).unwrap();
    target.set_property("UsePushPull", false).unwrap();
    target.paint(&mut backend).unwrap();

    assert_eq!(compiled, backend.compiled_programs());
}

#[test]
fn reloading_shaders_rebuilds_programs() {
    let mut backend = RecordingBackend::new();
    let mut target = painter(&mut backend, config(uvec2(64, 64)));

    target.paint(&mut backend).unwrap();

    let compiled = backend.compiled_programs();

    target.reload_shaders(&mut backend);

    assert_eq!(0, target.gi().fg_variant_count());
    assert!(target.gi().blur_dirty());

    target.paint(&mut backend).unwrap();

    assert_eq!(compiled + 3, backend.compiled_programs());
    assert_eq!(1, target.gi().fg_variant_count());
    assert!(!target.gi().blur_dirty());
}

#[test]
fn vpl_range_stays_ordered() {
    let mut backend = RecordingBackend::new();
    let mut target = painter(&mut backend, config(uvec2(64, 64)));

    target.set_property("VPLEndIndex", 16).unwrap();
    target.set_property("VPLStartIndex", 32).unwrap();
    target.set_property("VPLEndIndex", 2048).unwrap();

    assert_eq!(
        PropertyValue::Int(0),
        target.property("VPLStartIndex").unwrap()
    );

    assert_eq!(
        PropertyValue::Int(16),
        target.property("VPLEndIndex").unwrap()
    );

    target.set_property("VPLStartIndex", 8).unwrap();
    target.paint(&mut backend).unwrap();

    assert_eq!(8..16, target.gi().params().vpl_range());
}

#[test]
fn sun_stays_within_its_arc() {
    let mut backend = RecordingBackend::new();
    let mut target = painter(&mut backend, config(uvec2(64, 64)));

    target.set_property("MoveSun", true).unwrap();
    target.set_property("SunCycleSpeed", 7.0f32).unwrap();

    let center = target.gi().light_camera().center();
    let min_height = 4.0 * 50.0f32.to_radians().sin();

    for _ in 0..64 {
        target.paint(&mut backend).unwrap();

        let PropertyValue::Float(position) =
            target.property("SunCyclePosition").unwrap()
        else {
            panic!("SunCyclePosition is not a float");
        };

        assert!((0.0..160.0).contains(&position), "{position}");

        let height = target.light_position().y - center.y;

        assert!(height >= min_height - 1e-4, "{height}");
        assert!(height <= 4.0 + 1e-4, "{height}");
    }
}

#[test]
fn scene_preset_is_applied() {
    let mut backend = RecordingBackend::new();
    let mut target = painter(&mut backend, config(uvec2(64, 64)));
    let mut scene = pyramid(&mut backend);

    scene.preset.cam_eye = vec3(0.0, 3.0, 9.0);
    scene.preset.near_far = vec2(0.5, 32.0);
    scene.preset.light_center = vec3(0.0, 0.5, 0.0);

    target.set_scene(scene);
    target.paint(&mut backend).unwrap();

    assert_eq!(vec3(0.0, 3.0, 9.0), target.camera().eye());
    assert_eq!(0.5, target.projection().z_near());
    assert_eq!(32.0, target.projection().z_far());
    assert_eq!(vec3(0.0, 0.5, 0.0), target.gi().light_camera().center());
    assert!(target.gi().ism().point_count() > 0);
    assert!(!backend.dispatches("ism_splat").is_empty());
}

#[test]
fn rendering_is_deterministic() {
    let run = || {
        let mut backend = RecordingBackend::new();
        let mut target = painter(&mut backend, config(uvec2(1024, 1024)));
        let scene = pyramid(&mut backend);

        target.set_scene(scene);

        for _ in 0..3 {
            target.paint(&mut backend).unwrap();
        }

        for texture in [
            target.output(),
            target.shaded_frame(),
            target.gi().handles().gi_blur_final,
        ] {
            let desc = backend.texture(texture);

            assert_eq!(uvec2(1024, 1024), desc.size, "{}", desc.label);
        }

        backend.take_events()
    };

    let a = run();
    let b = run();

    assert!(!a.is_empty());
    assert_eq!(a, b);

    let fg_groups = a
        .iter()
        .find_map(|event| match event {
            Event::Computed { label, workgroups }
                if label == "final_gathering" =>
            {
                Some(*workgroups)
            }
            _ => None,
        })
        .unwrap();

    assert_eq!(128, fg_groups.x);
    assert_eq!(128, fg_groups.y);
}

#[test]
fn ground_is_rebuilt_only_when_its_height_changes() {
    let mut backend = RecordingBackend::new();
    let mut target = painter(&mut backend, config(uvec2(64, 64)));

    for _ in 0..10 {
        target.set_scene(Scene::default());
        target.paint(&mut backend).unwrap();
    }

    let events = backend.take_events();

    // One ground for the G-buffer, one for the reflective shadow map
    assert_eq!(2, meshes_created(&events));
    assert_eq!(0, meshes_destroyed(&events));

    let mut scene = Scene::default();

    scene.preset.ground_height = -1.5;

    target.set_scene(scene);
    target.paint(&mut backend).unwrap();

    let events = backend.take_events();

    assert_eq!(2, meshes_created(&events));
    assert_eq!(2, meshes_destroyed(&events));
    assert_eq!(2, backend.live_meshes());
}

#[test]
fn point_shadows_follow_the_jittered_light() {
    let mut backend = RecordingBackend::new();
    let mut target = painter(&mut backend, config(uvec2(64, 64)));
    let mut scene = pyramid(&mut backend);

    scene.preset.light_max_shift = 0.5;

    let preset = scene.preset.clone();

    target.set_scene(scene);

    let mut lights = Vec::new();

    for _ in 0..3 {
        target.paint(&mut backend).unwrap();
        lights.push(target.rasterization().frame_light_position());
    }

    // The first sample of each kernel is the centered one
    assert_eq!(preset.light_position, lights[0]);
    assert_ne!(lights[0], lights[1]);
    assert_ne!(lights[1], lights[2]);

    for light in &lights {
        assert_eq!(preset.light_position.y, light.y);
        assert!(light.distance(preset.light_position) <= 0.5 + 1e-4);
    }

    let passes = backend.render_passes("point_shadowmap");

    assert_eq!(3 * 6, passes.len());

    for (frame, faces) in passes.chunks(6).enumerate() {
        for (face, pass) in faces.iter().enumerate() {
            assert_eq!(face == 0, pass.color_targets[0].clear.is_some());
        }

        for pass in faces {
            assert!(pass.viewport.is_some());

            let pass_params: gpu::PointShadowmapPassParams =
                params(&pass.draws[0]);

            assert_eq!(lights[frame], pass_params.light_position.truncate());
            assert_eq!(preset.near_far.y, pass_params.light_position.w);
        }
    }

    let geometry = backend.render_passes("gbuffer_geometry");
    let shadow = target.gbuffer().shadow;

    for (frame, pass) in geometry.iter().enumerate() {
        assert!(pass.color_targets.iter().any(|t| t.texture == shadow));

        let pass_params: gpu::RasterPassParams = params(&pass.draws[0]);

        assert_eq!(lights[frame], pass_params.light_position.truncate());
        assert!(
            pass_params.has_flag(gpu::RasterPassParams::HAS_POINT_SHADOW)
        );
    }

    // The reflective shadow map has no point shadows of its own
    for pass in backend.render_passes("rsm_geometry") {
        let pass_params: gpu::RasterPassParams = params(&pass.draws[0]);

        assert!(
            !pass_params.has_flag(gpu::RasterPassParams::HAS_POINT_SHADOW)
        );
    }

    let shading = backend.render_passes("deferred_shading");

    assert!(shading[0].draws[0]
        .bindings
        .contains(&shadow.bind_readable()));
}

#[test]
fn transparency_masks_shift_across_sub_frames() {
    let mut backend = RecordingBackend::new();
    let mut target = painter(&mut backend, config(uvec2(64, 64)));
    let mut scene = pyramid(&mut backend);

    scene.preset.alpha = 0.5;

    target.set_scene(scene);

    for _ in 0..3 {
        target.paint(&mut backend).unwrap();
    }

    let masks = backend.find_texture("gbuffer_masks").unwrap();
    let noise = backend.find_texture("gbuffer_noise").unwrap();
    let prepasses = backend.render_passes("gbuffer_prepass");
    let geometry = backend.render_passes("gbuffer_geometry");

    assert_eq!(3, geometry.len());

    for (idx, pass) in geometry.iter().enumerate() {
        let frame = idx as u32 + 1;
        let model = &pass.draws[0];
        let model_params: gpu::RasterPassParams = params(model);

        assert_eq!(0.5, model_params.transparency.x);
        assert_eq!(
            MaskTable::masks_offset(frame),
            model_params.transparency.y,
        );

        assert!(model.bindings.contains(&masks.bind_readable()));
        assert!(model.bindings.contains(&noise.bind_readable()));

        // The pre-pass has to discard exactly the same fragments
        let prepass_params: gpu::RasterPassParams =
            params(&prepasses[idx].draws[0]);

        assert_eq!(model_params, prepass_params);

        let ground: gpu::RasterPassParams =
            params(pass.draws.last().unwrap());

        assert!(ground.has_flag(gpu::RasterPassParams::IS_GROUND));
        assert_eq!(1.0, ground.transparency.x);
    }

    let offsets: Vec<f32> = geometry
        .iter()
        .map(|pass| params::<gpu::RasterPassParams>(&pass.draws[0]))
        .map(|pass_params| pass_params.transparency.y)
        .collect();

    assert!(offsets.windows(2).all(|pair| pair[0] != pair[1]));
}

#[test]
fn deserialized_vpl_range_stays_ordered() {
    let config: PainterConfig = serde_json::from_str(
        r#"{
            "viewport_size": [64, 64],
            "gi": { "vpl_start": 900, "vpl_end": 100 }
        }"#,
    )
    .unwrap();

    let mut backend = RecordingBackend::new();
    let mut target = painter(&mut backend, config);

    target.paint(&mut backend).unwrap();

    let range = target.gi().params().vpl_range();

    assert!(range.start < range.end, "{range:?}");
    assert!(range.end <= gpu::VPL_COUNT as u32, "{range:?}");
}

#[test]
fn huge_multi_frame_count_is_capped() {
    let mut backend = RecordingBackend::new();

    let mut target = painter(
        &mut backend,
        PainterConfig {
            toggles: RenderToggles {
                multi_frame_count: u32::MAX,
                ..Default::default()
            },
            ..config(uvec2(64, 64))
        },
    );

    target.paint(&mut backend).unwrap();
    target.paint(&mut backend).unwrap();

    assert_eq!(2, target.current_frame());
    assert!(target.is_accumulating());

    target.set_toggles(RenderToggles {
        multi_frame_count: u32::MAX - 1,
        ..*target.toggles().get()
    });

    target.paint(&mut backend).unwrap();

    assert_eq!(1, target.current_frame());
}

#[test]
fn config_survives_json() {
    let config = PainterConfig {
        full_hd: true,
        seed: 42,
        ..Default::default()
    };

    let json = serde_json::to_string(&config).unwrap();
    let actual: PainterConfig = serde_json::from_str(&json).unwrap();

    assert_eq!(config, actual);

    let partial: PainterConfig =
        serde_json::from_str(r#"{ "seed": 7 }"#).unwrap();

    assert_eq!(7, partial.seed);
    assert_eq!(PainterConfig::default().viewport_size, partial.viewport_size);
}

#[test]
fn ceil_div() {
    assert_eq!(0, multiframe::ceil_div(0, 32));
    assert_eq!(1, multiframe::ceil_div(1, 32));
    assert_eq!(1, multiframe::ceil_div(32, 32));
    assert_eq!(2, multiframe::ceil_div(33, 32));
}
