//! Integration tests for derive macros.
//!
//! These tests use the `#[derive(WgslStruct)]` and `#[derive(GpuEnum)]`
//! output the way the grid kernel does: upload the `Gpu` struct, read the
//! generated WGSL, switch on the generated constants.

use glam::{Vec2, Vec3, Vec4};
use morphdust::{GpuEnum, PhaseMode, WgslStruct};

// ============================================================================
// GpuEnum Derive Tests
// ============================================================================

#[derive(GpuEnum, Clone, Copy, PartialEq, Debug)]
enum BlendKind {
    Linear,
    EaseInOut,
    SnapBack,
}

#[test]
fn test_gpu_enum_into_u32() {
    assert_eq!(u32::from(BlendKind::Linear), 0);
    assert_eq!(u32::from(BlendKind::EaseInOut), 1);
    assert_eq!(u32::from(BlendKind::SnapBack), 2);
}

#[test]
fn test_gpu_enum_from_u32() {
    assert_eq!(BlendKind::from(1u32), BlendKind::EaseInOut);
    assert_eq!(BlendKind::from(2u32), BlendKind::SnapBack);
}

#[test]
fn test_gpu_enum_invalid_code_defaults_to_first() {
    assert_eq!(BlendKind::from(99u32), BlendKind::Linear);
}

#[test]
fn test_gpu_enum_count() {
    assert_eq!(BlendKind::count(), 3);
    assert_eq!(PhaseMode::count(), 3);
}

#[test]
fn test_gpu_enum_constants() {
    let wgsl = BlendKind::WGSL_CONSTANTS;
    assert!(wgsl.contains("const BLEND_KIND_LINEAR: u32 = 0u;"));
    assert!(wgsl.contains("const BLEND_KIND_EASE_IN_OUT: u32 = 1u;"));
    assert!(wgsl.contains("const BLEND_KIND_SNAP_BACK: u32 = 2u;"));
}

#[test]
fn test_phase_mode_constants_match_codes() {
    let wgsl = PhaseMode::WGSL_CONSTANTS;
    for (name, mode) in [
        ("PHASE_MODE_NONE", PhaseMode::None),
        ("PHASE_MODE_EDGE_THEN_FILL", PhaseMode::EdgeThenFill),
        ("PHASE_MODE_SDF_FRONT", PhaseMode::SdfFront),
    ] {
        let line = format!("const {}: u32 = {}u;", name, u32::from(mode));
        assert!(wgsl.contains(&line), "missing `{}`", line);
    }
}

// ============================================================================
// WgslStruct Derive Tests
// ============================================================================

#[derive(WgslStruct, Clone, Copy)]
struct Scalars {
    time: f32,
    count: u32,
    offset: i32,
}

#[derive(WgslStruct, Clone, Copy)]
struct Mixed {
    dt: f32,
    center: Vec3,
    strength: f32,
    window: Vec2,
    color: Vec4,
}

#[test]
fn test_scalars_padded_to_16() {
    assert_eq!(std::mem::size_of::<ScalarsGpu>(), 16);
    let wgsl = Scalars::WGSL_STRUCT;
    assert!(wgsl.starts_with("struct Scalars {"));
    assert!(wgsl.contains("time: f32,"));
    assert!(wgsl.contains("count: u32,"));
    assert!(wgsl.contains("offset: i32,"));
    assert!(wgsl.contains("_pad0: f32,"));
    assert_eq!(Scalars::WGSL_NAME, "Scalars");
}

#[test]
fn test_scalars_to_gpu() {
    let gpu = Scalars {
        time: 1.5,
        count: 7,
        offset: -3,
    }
    .to_gpu();
    assert_eq!(gpu.time, 1.5);
    assert_eq!(gpu.count, 7);
    assert_eq!(gpu.offset, -3);
}

#[test]
fn test_vec3_aligned_to_16() {
    // dt (4) + pad (12) + center (12) + strength (4) + window (8) + pad (8) + color (16)
    assert_eq!(std::mem::size_of::<MixedGpu>(), 64);
    let wgsl = Mixed::WGSL_STRUCT;
    let dt = wgsl.find("dt: f32").unwrap();
    let pad = wgsl.find("_pad0: f32").unwrap();
    let center = wgsl.find("center: vec3<f32>").unwrap();
    assert!(dt < pad && pad < center);
    assert!(wgsl.contains("window: vec2<f32>,"));
    assert!(wgsl.contains("color: vec4<f32>,"));
}

#[test]
fn test_mixed_to_gpu() {
    let gpu = Mixed {
        dt: 0.016,
        center: Vec3::new(1.0, 2.0, 3.0),
        strength: 0.5,
        window: Vec2::new(0.1, 0.9),
        color: Vec4::ONE,
    }
    .to_gpu();
    assert_eq!(gpu.center, [1.0, 2.0, 3.0]);
    assert_eq!(gpu.window, [0.1, 0.9]);
    assert_eq!(gpu.color, [1.0; 4]);

    let bytes = bytemuck::bytes_of(&gpu);
    assert_eq!(bytes.len(), 64);
    // `center` starts at byte 16.
    let x: f32 = bytemuck::pod_read_unaligned(&bytes[16..20]);
    assert_eq!(x, 1.0);
}

#[test]
fn test_gpu_struct_is_zeroable() {
    let zero: MixedGpu = bytemuck::Zeroable::zeroed();
    assert_eq!(zero.dt, 0.0);
    assert_eq!(zero.color, [0.0; 4]);
}

// ============================================================================
// WGSL Validation Tests
// ============================================================================

/// Wrap a generated struct in a uniform binding and validate with naga.
fn validate_uniform_struct(wgsl_struct: &str, name: &str) -> Result<(), String> {
    let shader = format!(
        r#"
{wgsl_struct}

@group(0) @binding(0)
var<uniform> params: {name};

@group(0) @binding(1)
var<storage, read_write> out: array<f32>;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) global_id: vec3<u32>) {{
    let p = params;
    out[global_id.x] = f32(global_id.x);
}}
"#
    );

    let module = naga::front::wgsl::parse_str(&shader).map_err(|e| format!("WGSL parse error: {:?}", e))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|e| format!("WGSL validation error: {:?}", e))?;

    Ok(())
}

#[test]
fn test_scalars_wgsl_validates() {
    validate_uniform_struct(Scalars::WGSL_STRUCT, Scalars::WGSL_NAME).expect("Scalars WGSL should be valid");
}

#[test]
fn test_mixed_wgsl_validates() {
    validate_uniform_struct(Mixed::WGSL_STRUCT, Mixed::WGSL_NAME).expect("Mixed WGSL should be valid");
}

#[test]
fn test_grid_uniforms_wgsl_validates() {
    use morphdust::grid::GridUniforms;
    validate_uniform_struct(GridUniforms::WGSL_STRUCT, GridUniforms::WGSL_NAME)
        .expect("GridUniforms WGSL should be valid");
    assert_eq!(std::mem::size_of::<<GridUniforms as WgslStruct>::Gpu>() % 16, 0);
}
