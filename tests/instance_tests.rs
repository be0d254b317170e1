//! Instance Creation & Registry Tests
//!
//! Tests for:
//! - Creation validation (identifiers, resolutions, buffering)
//! - Pool sizes versus per-method declarations
//! - Settings replacement rules
//! - Serde configuration
//! - Shader library attachment and library description

use std::sync::Arc;

use myth_denoise::graph::compile;
use myth_denoise::pipeline::PipelineBuilder;
use myth_denoise::{
    DenoiseError, Identifier, Instance, InstanceCreationDesc, Method, MethodDesc, MethodSettings,
    ReblurSettings, ResultCode, ShaderBackend, ShaderDesc, ShaderLibrary, SigmaSettings, library_desc,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn creation(methods: &[(u32, Method)]) -> InstanceCreationDesc {
    InstanceCreationDesc {
        methods: methods
            .iter()
            .map(|&(id, method)| MethodDesc::new(Identifier(id), method, 1280, 720))
            .collect(),
        ..Default::default()
    }
}

// ============================================================================
// Creation validation
// ============================================================================

#[test]
fn duplicate_identifier_is_rejected() {
    init_logger();
    let desc = creation(&[(1, Method::SigmaShadow), (2, Method::ReblurDiffuse), (1, Method::RelaxDiffuse)]);

    let err = Instance::new(&desc).err().unwrap();
    assert_eq!(err, DenoiseError::NonUniqueIdentifier(Identifier(1)));
    assert_eq!(err.code(), ResultCode::NonUniqueIdentifier);
}

#[test]
fn empty_request_is_rejected() {
    let err = Instance::new(&InstanceCreationDesc::default()).err().unwrap();
    assert_eq!(err.code(), ResultCode::InvalidArgument);
}

#[test]
fn zero_buffered_frames_is_rejected() {
    let desc = InstanceCreationDesc {
        buffered_frame_max_num: 0,
        ..creation(&[(1, Method::SigmaShadow)])
    };
    assert_eq!(Instance::new(&desc).err().unwrap().code(), ResultCode::InvalidArgument);
}

#[test]
fn invalid_resolution_fails_whole_creation() {
    let mut desc = creation(&[(1, Method::SigmaShadow), (2, Method::ReblurDiffuse)]);
    desc.methods[1].width = 0;
    assert_eq!(Instance::new(&desc).err().unwrap().code(), ResultCode::InvalidArgument);
}

#[test]
fn raw_method_values_outside_the_catalogue_are_unsupported() {
    assert_eq!(Method::try_from(7).unwrap(), Method::SigmaShadowTranslucency);
    let err = Method::try_from(42).unwrap_err();
    assert_eq!(err.code(), ResultCode::Unsupported);
}

// ============================================================================
// Pool layout
// ============================================================================

#[test]
fn pool_sizes_equal_sum_of_declarations() {
    init_logger();
    let methods = [
        (1, Method::ReblurDiffuseSpecular),
        (2, Method::RelaxSpecular),
        (3, Method::SigmaShadowTranslucency),
        (4, Method::Reference),
    ];
    let instance = Instance::new(&creation(&methods)).unwrap();

    let (mut permanent, mut transient) = (0, 0);
    for &(_, method) in &methods {
        let compiled = compile(method, 1280, 720, &mut PipelineBuilder::default()).unwrap();
        permanent += compiled.permanent.len();
        transient += compiled.transient.len();
    }

    assert_eq!(instance.desc().permanent_pool.len(), permanent);
    assert_eq!(instance.desc().transient_pool.len(), transient);
}

#[test]
fn identifiers_keep_registration_order() {
    let instance = Instance::new(&creation(&[
        (30, Method::SigmaShadow),
        (10, Method::Reference),
        (20, Method::SpecularReflectionMv),
    ]))
    .unwrap();

    let ids: Vec<u32> = instance.identifiers().map(|id| id.0).collect();
    assert_eq!(ids, [30, 10, 20]);
}

#[test]
fn constant_ring_covers_every_buffered_frame() {
    let desc = InstanceCreationDesc {
        buffered_frame_max_num: 2,
        ..creation(&[(1, Method::ReblurDiffuse)])
    };
    let instance = Instance::new(&desc).unwrap();
    let layout = instance.desc();

    assert!(layout.constant_buffer_max_data_size > 0);
    assert!(layout.constant_buffer_size.is_multiple_of(256));
    // 7 passes + clear, 2 frames.
    assert_eq!(layout.descriptor_pool.sets_max_num, 16);
    assert_eq!(layout.descriptor_pool.constant_buffers_max_num, 14);
}

// ============================================================================
// Settings
// ============================================================================

#[test]
fn settings_default_to_the_method_family() {
    let instance = Instance::new(&creation(&[(1, Method::ReblurSpecular)])).unwrap();
    assert_eq!(
        instance.method_settings(Identifier(1)),
        Some(&MethodSettings::Reblur(ReblurSettings::default()))
    );
    assert_eq!(instance.method_settings(Identifier(2)), None);
}

#[test]
fn settings_are_replaced_wholesale() {
    let mut instance = Instance::new(&creation(&[(1, Method::SigmaShadow)])).unwrap();
    let custom = SigmaSettings {
        blur_radius_scale: 4.0,
        ..Default::default()
    };

    instance
        .set_method_settings(Identifier(1), MethodSettings::Sigma(custom))
        .unwrap();
    assert_eq!(
        instance.method_settings(Identifier(1)),
        Some(&MethodSettings::Sigma(custom))
    );
}

#[test]
fn settings_of_another_family_are_rejected() {
    let mut instance = Instance::new(&creation(&[(1, Method::SigmaShadow)])).unwrap();
    let err = instance
        .set_method_settings(Identifier(1), MethodSettings::Reblur(ReblurSettings::default()))
        .unwrap_err();
    assert_eq!(err.code(), ResultCode::InvalidArgument);
    assert_eq!(
        instance.method_settings(Identifier(1)),
        Some(&MethodSettings::Sigma(SigmaSettings::default()))
    );
}

#[test]
fn unknown_identifier_and_out_of_range_settings_are_rejected() {
    let mut instance = Instance::new(&creation(&[(1, Method::ReblurDiffuse)])).unwrap();

    let err = instance
        .set_method_settings(Identifier(9), MethodSettings::Reblur(ReblurSettings::default()))
        .unwrap_err();
    assert_eq!(err.code(), ResultCode::InvalidArgument);

    let too_long = ReblurSettings {
        max_accumulated_frame_num: 100,
        ..Default::default()
    };
    let err = instance
        .set_method_settings(Identifier(1), MethodSettings::Reblur(too_long))
        .unwrap_err();
    assert_eq!(err.code(), ResultCode::InvalidArgument);
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn creation_desc_from_json_uses_defaults() {
    let json = r#"{
        "methods": [
            { "identifier": 1, "method": "SIGMA_SHADOW_TRANSLUCENCY", "width": 1920, "height": 1080 },
            { "identifier": 2, "method": "RELAX_DIFFUSE", "width": 1920, "height": 1080 }
        ]
    }"#;
    let desc: InstanceCreationDesc = serde_json::from_str(json).unwrap();

    assert_eq!(desc.buffered_frame_max_num, 3);
    assert!(desc.coalesce_pipelines);
    assert_eq!(desc.methods[0].method, Method::SigmaShadowTranslucency);
    assert!(Instance::new(&desc).is_ok());
}

#[test]
fn partial_method_settings_from_json() {
    let settings: MethodSettings =
        serde_json::from_str(r#"{ "Sigma": { "blur_radius_scale": 1.5 } }"#).unwrap();

    let MethodSettings::Sigma(sigma) = settings else {
        panic!("expected SIGMA settings, got {settings:?}");
    };
    assert!((sigma.blur_radius_scale - 1.5).abs() < f32::EPSILON);
    assert!((sigma.stabilization_strength - SigmaSettings::default().stabilization_strength).abs() < f32::EPSILON);
}

// ============================================================================
// Shader library & library description
// ============================================================================

struct SpirvOnly;

impl ShaderLibrary for SpirvOnly {
    fn bytecode(&self, shader: &ShaderDesc, backend: ShaderBackend) -> Option<Arc<[u8]>> {
        (backend == ShaderBackend::Spirv).then(|| Arc::from(shader.file_name.as_bytes()))
    }
}

#[test]
fn shader_library_fills_bytecode() {
    let desc = creation(&[(1, Method::SigmaShadow)]);

    let bare = Instance::new(&desc).unwrap();
    assert!(bare.desc().pipelines.iter().all(|p| p.bytecode.is_empty()));

    let loaded = Instance::with_shader_library(&desc, &SpirvOnly).unwrap();
    for pipeline in &loaded.desc().pipelines {
        assert_eq!(
            pipeline.bytecode.get(ShaderBackend::Spirv),
            Some(pipeline.shader.file_name.as_bytes())
        );
        assert_eq!(pipeline.bytecode.get(ShaderBackend::Dxil), None);
    }
}

#[test]
fn library_desc_lists_every_method() {
    let lib = library_desc();
    assert_eq!(lib.supported_methods, Method::ALL);
    assert_eq!(lib.version_major, 0);
    assert_eq!(lib.version_minor, 2);
}
