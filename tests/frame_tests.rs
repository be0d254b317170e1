//! Frame Compiler Tests
//!
//! Tests for:
//! - The SIGMA_SHADOW_TRANSLUCENCY 1920×1080 dispatch scenario
//! - Binding resolution (external, transient, ping-pong permanent)
//! - Constant ring offsets and packed header contents
//! - Checkerboard parity
//! - Accumulation modes and history counters
//! - Per-frame validation and subset dispatch

use glam::{Mat4, Vec2, Vec3};

use myth_denoise::graph::{SharedConstants, kernel_rotator};
use myth_denoise::{
    AccumulationMode, CheckerboardMode, CommonSettings, DenoiseError, DescriptorType, DispatchDesc,
    ExternalTexture, FrameDispatches, Identifier, Instance, InstanceCreationDesc, Method, MethodDesc,
    MethodSettings, ReblurSettings, ResourceBinding, ResourceType, ResultCode, UserPool,
};

const ID: Identifier = Identifier(1);

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn texture(ty: ResourceType) -> ExternalTexture {
    ExternalTexture(100 + ty as u64)
}

fn full_pool() -> UserPool {
    let mut pool = UserPool::new();
    for ty in ResourceType::USER_ROLES {
        pool.set(ty, texture(ty));
    }
    pool
}

fn instance_with(methods: &[(Identifier, Method)], width: u32, height: u32, buffered: u32) -> Instance {
    init_logger();
    Instance::new(&InstanceCreationDesc {
        methods: methods
            .iter()
            .map(|&(id, method)| MethodDesc::new(id, method, width, height))
            .collect(),
        buffered_frame_max_num: buffered,
        ..Default::default()
    })
    .unwrap()
}

fn single(method: Method) -> Instance {
    instance_with(&[(ID, method)], 1920, 1080, 3)
}

fn at(frame_index: u32) -> CommonSettings {
    CommonSettings {
        frame_index,
        ..Default::default()
    }
}

fn with_mode(frame_index: u32, accumulation_mode: AccumulationMode) -> CommonSettings {
    CommonSettings {
        accumulation_mode,
        ..at(frame_index)
    }
}

fn header(frame: &FrameDispatches<'_>, dispatch: &DispatchDesc) -> SharedConstants {
    let bytes = frame.constants(dispatch);
    bytemuck::pod_read_unaligned(&bytes[..std::mem::size_of::<SharedConstants>()])
}

fn names(frame: &FrameDispatches<'_>) -> Vec<&'static str> {
    frame.iter().map(|d| d.name).collect()
}

// ============================================================================
// SIGMA_SHADOW_TRANSLUCENCY scenario
// ============================================================================

#[test]
fn sigma_translucency_first_frame() {
    let mut instance = single(Method::SigmaShadowTranslucency);
    assert_eq!(instance.desc().transient_pool.len(), 4);

    let frame = instance
        .compute_dispatches(&CommonSettings::default(), &full_pool())
        .unwrap();

    assert_eq!(
        names(&frame),
        [
            "SIGMA::PreBlur",
            "SIGMA::Blur",
            "SIGMA::TemporalStabilization"
        ]
    );
    for dispatch in frame.iter() {
        assert_eq!(dispatch.identifier, ID);
        assert_eq!((dispatch.grid_width, dispatch.grid_height), (120, 68));
    }
}

#[test]
fn sigma_pre_blur_bindings() {
    let mut instance = single(Method::SigmaShadowTranslucency);
    let frame = instance
        .compute_dispatches(&CommonSettings::default(), &full_pool())
        .unwrap();
    let pre_blur = &frame.dispatches[0];

    let external = |ty| ResourceBinding::External { ty, texture: texture(ty) };
    let bindings: Vec<ResourceBinding> = pre_blur.resources.iter().map(|r| r.binding).collect();
    assert_eq!(
        bindings,
        [
            external(ResourceType::InNormalRoughness),
            external(ResourceType::InViewZ),
            external(ResourceType::InShadowData),
            external(ResourceType::InShadowTranslucency),
            external(ResourceType::OutShadowTranslucency),
            ResourceBinding::Transient(0),
            ResourceBinding::Transient(1),
            ResourceBinding::Transient(3),
        ]
    );
    assert!(pre_blur.resources[..5]
        .iter()
        .all(|r| r.descriptor_type == DescriptorType::Texture));
    assert!(pre_blur.resources[5..]
        .iter()
        .all(|r| r.descriptor_type == DescriptorType::StorageTexture));
}

// ============================================================================
// Constant ring
// ============================================================================

fn snapshot(instance: &mut Instance, common: &CommonSettings) -> Vec<(DispatchDesc, Vec<u8>)> {
    let frame = instance.compute_dispatches(common, &full_pool()).unwrap();
    frame
        .iter()
        .map(|d| (d.clone(), frame.constants(d).to_vec()))
        .collect()
}

#[test]
fn repeated_frames_differ_only_in_constant_offsets() {
    for method in [
        Method::SigmaShadow,
        Method::ReblurDiffuse,
        Method::RelaxDiffuseSpecular,
        Method::Reference,
    ] {
        let mut instance = instance_with(&[(ID, method)], 640, 480, 3);
        let region = instance.desc().constant_buffer_size / instance.desc().buffered_frame_max_num;

        // Advance past the first frame so ping-pong parity is odd.
        snapshot(&mut instance, &at(0));
        let common = at(1);
        let first = snapshot(&mut instance, &common);
        let second = snapshot(&mut instance, &common);

        assert_eq!(first.len(), second.len(), "{}", method.name());
        for ((a, a_bytes), (b, b_bytes)) in first.iter().zip(&second) {
            assert_eq!(
                b.constant_buffer_offset,
                (a.constant_buffer_offset + region) % instance.desc().constant_buffer_size,
                "{}",
                a.name
            );
            let rebased = DispatchDesc {
                constant_buffer_offset: a.constant_buffer_offset,
                ..b.clone()
            };
            assert_eq!(&rebased, a);
            assert_eq!(a_bytes, b_bytes, "{}", a.name);
        }
        assert_eq!(instance.history_length(ID), Some(1), "{}", method.name());
    }
}

#[test]
fn next_frame_after_repeat_advances_once() {
    let mut instance = single(Method::Reference);
    let history = |frame: &[(DispatchDesc, Vec<u8>)]| -> Vec<ResourceBinding> {
        frame[0].0.resources[1..].iter().map(|r| r.binding).collect()
    };

    snapshot(&mut instance, &at(0));
    snapshot(&mut instance, &at(0));
    let next = snapshot(&mut instance, &at(1));

    assert_eq!(
        history(&next),
        [ResourceBinding::Permanent(0), ResourceBinding::Permanent(1)]
    );
    assert_eq!(instance.history_length(ID), Some(1));
}

#[test]
fn ring_wraps_after_buffered_frames() {
    let mut instance = instance_with(&[(ID, Method::ReblurDiffuse)], 640, 480, 2);
    let common = CommonSettings::default();
    let pool = full_pool();

    let offsets = |instance: &mut Instance| -> Vec<u32> {
        instance
            .compute_dispatches(&common, &pool)
            .unwrap()
            .iter()
            .map(|d| d.constant_buffer_offset)
            .collect()
    };
    let frame0 = offsets(&mut instance);
    let frame1 = offsets(&mut instance);
    let frame2 = offsets(&mut instance);

    assert_ne!(frame0, frame1);
    assert_eq!(frame0, frame2);
}

#[test]
fn constant_blobs_match_declared_sizes() {
    let methods: Vec<(Identifier, Method)> = Method::ALL
        .iter()
        .enumerate()
        .map(|(i, &m)| (Identifier(i as u32 + 10), m))
        .collect();
    let mut instance = instance_with(&methods, 1280, 720, 3);
    let max_size = instance.desc().constant_buffer_max_data_size;
    let frame = instance
        .compute_dispatches(&with_mode(0, AccumulationMode::ClearAndRestart), &full_pool())
        .unwrap();

    // Every method except SPECULAR_REFLECTION_MV adds a clear dispatch.
    assert_eq!(frame.len(), 7 * 3 + 10 * 3 + 3 * 2 + 2 + 1 + 9);
    for dispatch in frame.iter() {
        assert!(dispatch.constant_buffer_offset.is_multiple_of(256), "{}", dispatch.name);
        assert_eq!(
            frame.constants(dispatch).len(),
            dispatch.constant_buffer_size as usize,
            "{}",
            dispatch.name
        );
        assert!(dispatch.constant_buffer_size <= max_size);
    }
}

#[test]
fn header_tracks_previous_camera() {
    let mut instance = single(Method::SpecularReflectionMv);
    let pool = full_pool();
    let first_view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
    let second_view = Mat4::from_translation(Vec3::new(-2.0, 0.0, -5.0));

    let common = CommonSettings {
        world_to_view: first_view,
        ..Default::default()
    };
    instance.compute_dispatches(&common, &pool).unwrap();

    let common = CommonSettings {
        world_to_view: second_view,
        frame_index: 1,
        ..common
    };
    let frame = instance.compute_dispatches(&common, &pool).unwrap();
    let shared = header(&frame, &frame.dispatches[0]);

    assert_eq!(shared.world_to_view, second_view);
    assert_eq!(shared.world_to_view_prev, first_view);
    assert!((shared.camera_delta.x - 2.0).abs() < 1e-5);
    assert_eq!(shared.flags & SharedConstants::FLAG_HISTORY_RESET, 0);
}

#[test]
fn kernel_rotation_follows_completed_frames() {
    let mut instance = single(Method::SigmaShadow);
    let header_size = std::mem::size_of::<SharedConstants>();
    let rotator = |frame: &[(DispatchDesc, Vec<u8>)]| -> glam::Vec4 {
        bytemuck::pod_read_unaligned(&frame[0].1[header_size..header_size + 16])
    };

    let first = snapshot(&mut instance, &at(0));
    assert_eq!(first[0].0.name, "SIGMA::PreBlur");
    assert_eq!(rotator(&first), kernel_rotator(0));

    let second = snapshot(&mut instance, &at(1));
    assert_eq!(rotator(&second), kernel_rotator(1));
}

// ============================================================================
// Checkerboard
// ============================================================================

#[test]
fn checkerboard_alternates_with_frame_parity() {
    let settings = MethodSettings::Reblur(ReblurSettings {
        checkerboard_mode: CheckerboardMode::Black,
        ..Default::default()
    });
    let pool = full_pool();

    let mut frames = Vec::new();
    for frame_index in [0, 1] {
        let mut instance = single(Method::ReblurDiffuse);
        instance.set_method_settings(ID, settings).unwrap();
        let common = CommonSettings {
            frame_index,
            ..Default::default()
        };
        let frame = instance.compute_dispatches(&common, &pool).unwrap();
        let modes: Vec<u32> = frame.iter().map(|d| header(&frame, d).checkerboard).collect();
        frames.push((modes, frame.dispatches.to_vec()));
    }

    let (even_modes, even) = &frames[0];
    let (odd_modes, odd) = &frames[1];
    assert!(even_modes.iter().all(|&m| m == CheckerboardMode::Black as u32));
    assert!(odd_modes.iter().all(|&m| m == CheckerboardMode::White as u32));

    for (a, b) in even.iter().zip(odd) {
        assert_eq!(a.resources, b.resources, "{}", a.name);
        assert_eq!(a.pipeline_index, b.pipeline_index);
        assert_eq!((a.grid_width, a.grid_height), (b.grid_width, b.grid_height));
    }
}

#[test]
fn checkerboard_off_never_flips() {
    let mut instance = single(Method::RelaxDiffuse);
    let common = CommonSettings {
        frame_index: 3,
        ..Default::default()
    };
    let frame = instance.compute_dispatches(&common, &full_pool()).unwrap();
    assert!(frame
        .iter()
        .all(|d| header(&frame, d).checkerboard == CheckerboardMode::Off as u32));
}

// ============================================================================
// Accumulation modes
// ============================================================================

#[test]
fn clear_and_restart_inserts_clear_for_one_frame() {
    let mut instance = single(Method::ReblurDiffuse);
    let pool = full_pool();

    let frame = instance
        .compute_dispatches(&with_mode(0, AccumulationMode::Continue), &pool)
        .unwrap();
    assert_eq!(frame.len(), 7);
    assert!(!names(&frame).contains(&"CLEAR"));

    let frame = instance
        .compute_dispatches(&with_mode(1, AccumulationMode::Continue), &pool)
        .unwrap();
    assert_eq!(frame.len(), 7);
    assert_eq!(instance.history_length(ID), Some(1));

    let frame = instance
        .compute_dispatches(&with_mode(2, AccumulationMode::ClearAndRestart), &pool)
        .unwrap();
    assert_eq!(frame.len(), 8);
    assert_eq!(frame.dispatches[0].name, "CLEAR");
    assert_eq!(frame.dispatches[0].identifier, ID);
    assert_eq!(frame.dispatches[0].constant_buffer_size, 0);
    assert_eq!(frame.dispatches[1].name, "REBLUR::PrePass");
    assert_eq!(instance.history_length(ID), Some(0));

    let frame = instance
        .compute_dispatches(&with_mode(3, AccumulationMode::Continue), &pool)
        .unwrap();
    assert_eq!(frame.len(), 7);
    assert_eq!(instance.history_length(ID), Some(1));
}

#[test]
fn clear_pass_writes_every_permanent_slot() {
    let mut instance = single(Method::ReblurDiffuseSpecular);
    let permanent = instance.desc().permanent_pool.len();
    let frame = instance
        .compute_dispatches(&with_mode(0, AccumulationMode::ClearAndRestart), &full_pool())
        .unwrap();

    let clear = &frame.dispatches[0];
    let mut slots: Vec<u16> = clear
        .resources
        .iter()
        .filter_map(|r| match r.binding {
            ResourceBinding::Permanent(slot) => Some(slot),
            _ => None,
        })
        .collect();
    slots.sort_unstable();
    assert_eq!(slots, (0..permanent as u16).collect::<Vec<_>>());
}

#[test]
fn restart_resets_history_without_clearing() {
    let mut instance = single(Method::RelaxDiffuse);
    let pool = full_pool();
    for frame_index in 0..3 {
        instance.compute_dispatches(&at(frame_index), &pool).unwrap();
    }
    assert_eq!(instance.history_length(ID), Some(2));

    let frame = instance
        .compute_dispatches(&with_mode(3, AccumulationMode::Restart), &pool)
        .unwrap();
    assert_eq!(frame.len(), 10);
    let shared = header(&frame, &frame.dispatches[0]);
    assert_eq!(shared.history_length, 0);
    assert_ne!(shared.flags & SharedConstants::FLAG_HISTORY_RESET, 0);
    assert_eq!(instance.history_length(ID), Some(0));
}

#[test]
fn reset_history_applies_to_the_next_frame_only() {
    let mut instance = single(Method::SigmaShadow);
    let pool = full_pool();
    instance.compute_dispatches(&at(0), &pool).unwrap();

    instance
        .reset_history(ID, AccumulationMode::ClearAndRestart)
        .unwrap();
    assert_eq!(instance.compute_dispatches(&at(1), &pool).unwrap().len(), 4);
    // Repeating the frame keeps the reset it consumed.
    assert_eq!(instance.compute_dispatches(&at(1), &pool).unwrap().len(), 4);
    assert_eq!(instance.compute_dispatches(&at(2), &pool).unwrap().len(), 3);

    let err = instance
        .reset_history(Identifier(99), AccumulationMode::Restart)
        .unwrap_err();
    assert_eq!(err.code(), ResultCode::InvalidArgument);
}

#[test]
fn packed_history_is_capped_by_settings() {
    let mut instance = single(Method::ReblurDiffuse);
    instance
        .set_method_settings(
            ID,
            MethodSettings::Reblur(ReblurSettings {
                max_accumulated_frame_num: 4,
                max_fast_accumulated_frame_num: 2,
                ..Default::default()
            }),
        )
        .unwrap();

    let pool = full_pool();
    for frame_index in 0..10 {
        instance.compute_dispatches(&at(frame_index), &pool).unwrap();
    }
    assert_eq!(instance.history_length(ID), Some(4));
}

// ============================================================================
// Ping-pong history
// ============================================================================

#[test]
fn history_pair_swaps_every_frame() {
    let mut instance = single(Method::Reference);
    let pool = full_pool();

    let bindings = |frame: &FrameDispatches<'_>| -> Vec<ResourceBinding> {
        frame.dispatches[0].resources.iter().map(|r| r.binding).collect()
    };

    let frame = instance.compute_dispatches(&at(0), &pool).unwrap();
    let even = bindings(&frame);
    assert_eq!(&even[1..], [ResourceBinding::Permanent(1), ResourceBinding::Permanent(0)]);
    assert_eq!(frame.dispatches[1].resources[0].binding, ResourceBinding::Permanent(0));

    let frame = instance.compute_dispatches(&at(1), &pool).unwrap();
    let odd = bindings(&frame);
    assert_eq!(&odd[1..], [ResourceBinding::Permanent(0), ResourceBinding::Permanent(1)]);
    assert_eq!(frame.dispatches[1].resources[0].binding, ResourceBinding::Permanent(1));
}

// ============================================================================
// Per-frame validation
// ============================================================================

#[test]
fn missing_external_resource_leaves_state_untouched() {
    let mut instance = single(Method::SigmaShadowTranslucency);
    let mut pool = full_pool();
    pool.clear();
    for ty in ResourceType::USER_ROLES {
        if ty != ResourceType::InViewZ {
            pool.set(ty, texture(ty));
        }
    }

    let err = instance
        .compute_dispatches(&CommonSettings::default(), &pool)
        .unwrap_err();
    assert_eq!(
        err,
        DenoiseError::MissingResource {
            identifier: ID,
            resource: ResourceType::InViewZ
        }
    );
    assert_eq!(err.code(), ResultCode::Failure);

    let frame = instance
        .compute_dispatches(&CommonSettings::default(), &full_pool())
        .unwrap();
    assert_eq!(frame.dispatches[0].constant_buffer_offset, 0);
    assert_ne!(
        header(&frame, &frame.dispatches[0]).flags & SharedConstants::FLAG_HISTORY_RESET,
        0
    );
}

#[test]
fn unused_roles_need_not_be_bound() {
    let mut instance = single(Method::Reference);
    let pool = UserPool::new()
        .with(ResourceType::InRadiance, ExternalTexture(1))
        .with(ResourceType::OutRadiance, ExternalTexture(2));
    assert_eq!(
        instance
            .compute_dispatches(&CommonSettings::default(), &pool)
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn invalid_common_settings_are_rejected() {
    let mut instance = single(Method::SigmaShadow);
    let pool = full_pool();

    for common in [
        CommonSettings {
            resolution_scale: Vec2::new(0.0, 1.0),
            ..Default::default()
        },
        CommonSettings {
            resolution_scale: Vec2::new(1.0, 1.5),
            ..Default::default()
        },
        CommonSettings {
            world_to_view: Mat4::from_cols_array(&[f32::NAN; 16]),
            ..Default::default()
        },
    ] {
        let err = instance.compute_dispatches(&common, &pool).unwrap_err();
        assert_eq!(err.code(), ResultCode::InvalidArgument);
    }
}

#[test]
fn resolution_scale_shrinks_grid_but_not_clear() {
    let mut instance = single(Method::SigmaShadow);
    let common = CommonSettings {
        resolution_scale: Vec2::splat(0.5),
        accumulation_mode: AccumulationMode::ClearAndRestart,
        ..Default::default()
    };
    let frame = instance.compute_dispatches(&common, &full_pool()).unwrap();

    assert_eq!(frame.dispatches[0].name, "CLEAR");
    assert_eq!((frame.dispatches[0].grid_width, frame.dispatches[0].grid_height), (120, 68));
    for dispatch in &frame.dispatches[1..] {
        assert_eq!((dispatch.grid_width, dispatch.grid_height), (60, 34));
    }
    let shared = header(&frame, &frame.dispatches[1]);
    assert!((shared.rect_size.x - 960.0).abs() < f32::EPSILON);
    assert!((shared.rect_size.y - 540.0).abs() < f32::EPSILON);
}

// ============================================================================
// Subset dispatch
// ============================================================================

#[test]
fn subset_dispatch_follows_registration_order() {
    let sigma = Identifier(1);
    let reference = Identifier(2);
    let mut instance = instance_with(
        &[(sigma, Method::SigmaShadow), (reference, Method::Reference)],
        256,
        256,
        3,
    );
    let pool = full_pool();

    let frame = instance
        .compute_dispatches_for(&at(0), &pool, &[reference])
        .unwrap();
    assert_eq!(frame.len(), 2);
    assert!(frame.iter().all(|d| d.identifier == reference));

    let frame = instance
        .compute_dispatches_for(&at(1), &pool, &[reference, sigma, reference])
        .unwrap();
    let ids: Vec<Identifier> = frame.iter().map(|d| d.identifier).collect();
    assert_eq!(ids, [sigma, sigma, sigma, reference, reference]);

    assert_eq!(instance.history_length(reference), Some(1));
    assert_eq!(instance.history_length(sigma), Some(0));

    let err = instance
        .compute_dispatches_for(&at(2), &pool, &[Identifier(7)])
        .unwrap_err();
    assert_eq!(err.code(), ResultCode::InvalidArgument);
}
