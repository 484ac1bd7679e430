//! Error types for morphdust.
//!
//! Nothing on the per-frame path returns an error: malformed clouds are
//! padded, failed analyses fall back to curve-only staging. Errors surface
//! only where a caller can act on them (GPU setup, shape loading, settings I/O).

use thiserror::Error;

/// Errors that can occur while setting up or driving the GPU grid executor.
#[derive(Debug, Error)]
pub enum GpuError {
    /// No compatible GPU adapter found.
    #[error("No compatible GPU adapter found. Ensure your system has a GPU with WebGPU/Vulkan/Metal/DX12 support.")]
    NoAdapter,
    /// Failed to create GPU device.
    #[error("Failed to create GPU device: {0}")]
    DeviceCreation(#[from] wgpu::RequestDeviceError),
    /// The adapter cannot write `rgba32float` storage textures.
    #[error("Adapter does not support rgba32float storage textures")]
    UnsupportedFormat,
    /// Failed to map buffer for reading.
    #[error("Failed to map GPU buffer: {0}")]
    BufferMapping(String),
    /// The grid resources were released and must be re-created first.
    #[error("GPU grid resources have been released")]
    Released,
    /// The uploaded data does not match the grid capacity.
    #[error("Grid data length {got} does not match capacity {expected}")]
    SizeMismatch { expected: usize, got: usize },
}

/// Errors that can occur while analyzing a target shape.
#[derive(Debug, Error)]
pub enum ShapeError {
    /// The requested analysis raster is too small to hold a mask.
    #[error("Raster size {0} is too small (minimum 8)")]
    InvalidRasterSize(u32),
    /// The outline has no contour with at least three points.
    #[error("Outline has no contour with three or more points")]
    DegenerateOutline,
    /// Rasterization produced no filled pixels.
    #[error("Shape rasterized to an empty mask")]
    EmptyMask,
    /// Failed to load or decode the source image.
    #[error("Failed to load image: {0}")]
    Image(#[from] image::ImageError),
}

/// Errors that can occur when loading or saving settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read or write the settings file.
    #[error("Failed to access settings file: {0}")]
    Io(#[from] std::io::Error),
    /// The settings file is not valid JSON.
    #[error("Failed to parse settings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced by the [`Engine`](crate::Engine).
#[derive(Debug, Error)]
pub enum EngineError {
    /// GPU grid executor failure.
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
    /// An operation needed target clouds but none were loaded.
    #[error("No target clouds loaded. Use Engine::load_targets first.")]
    NoTargets,
    /// A target index was out of range.
    #[error("Target index {index} out of range ({len} targets)")]
    TargetOutOfRange { index: usize, len: usize },
}
