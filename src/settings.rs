//! Denoiser Settings & Instance Configuration
//!
//! This module defines every piece of configuration the compiler consumes:
//!
//! - [`InstanceCreationDesc`] / [`MethodDesc`]: the creation-time request
//!   (which methods, at which resolution, under which identifiers).
//! - [`MethodSettings`]: per-method tuning, replaced wholesale by
//!   [`Instance::set_method_settings`](crate::Instance::set_method_settings).
//! - [`CommonSettings`]: per-frame camera and accumulation state.
//!
//! Creation and method settings are plain data with `serde` support so hosts
//! can keep denoiser configuration next to the rest of their renderer
//! settings.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use myth_denoise::{InstanceCreationDesc, MethodDesc, Method, Identifier};
//!
//! let desc = InstanceCreationDesc {
//!     methods: vec![MethodDesc::new(Identifier(1), Method::SigmaShadow, 1920, 1080)],
//!     ..Default::default()
//! };
//! ```

use glam::{Mat4, Vec2};
use serde::{Deserialize, Serialize};

use crate::core::{Identifier, Method};
use crate::errors::{DenoiseError, Result};

/// Maximum history length any temporal method can accumulate.
pub const MAX_HISTORY_FRAME_NUM: u32 = 63;

// ---------------------------------------------------------------------------
// Creation request
// ---------------------------------------------------------------------------

/// One method requested at instance creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDesc {
    pub identifier: Identifier,
    pub method: Method,
    /// Full render resolution the method is compiled for.
    pub width: u32,
    pub height: u32,
}

impl MethodDesc {
    #[must_use]
    pub const fn new(identifier: Identifier, method: Method, width: u32, height: u32) -> Self {
        Self {
            identifier,
            method,
            width,
            height,
        }
    }
}

/// Creation-time request for an [`Instance`](crate::Instance).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceCreationDesc {
    /// Methods in registration order. Dispatches are emitted in this order.
    pub methods: Vec<MethodDesc>,
    /// Number of frames whose constant data may be in flight simultaneously.
    pub buffered_frame_max_num: u32,
    /// Coalesce byte-identical pipelines into one `pipelines[]` entry.
    pub coalesce_pipelines: bool,
}

impl Default for InstanceCreationDesc {
    fn default() -> Self {
        Self {
            methods: Vec::new(),
            buffered_frame_max_num: 3,
            coalesce_pipelines: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-frame state
// ---------------------------------------------------------------------------

/// Controls how temporal history is treated on the current frame.
///
/// Variants are ordered by severity; when several sources request a mode the
/// most severe one wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccumulationMode {
    /// Keep accumulating.
    #[default]
    Continue,
    /// Discard history: history length restarts from zero.
    Restart,
    /// Discard history and clear the history textures with a dedicated dispatch.
    ClearAndRestart,
}

impl AccumulationMode {
    #[inline]
    #[must_use]
    pub fn resets_history(self) -> bool {
        self != Self::Continue
    }
}

/// Which half of a checkerboard pattern holds valid samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum CheckerboardMode {
    #[default]
    Off = 0,
    Black = 1,
    White = 2,
}

impl CheckerboardMode {
    /// The opposite half. `Off` has no complement.
    #[inline]
    #[must_use]
    pub const fn complement(self) -> Self {
        match self {
            Self::Off => Self::Off,
            Self::Black => Self::White,
            Self::White => Self::Black,
        }
    }

    /// Orientation used on `frame_index`: even frames keep the configured
    /// half, odd frames use its complement.
    #[inline]
    #[must_use]
    pub const fn resolve(self, frame_index: u32) -> Self {
        if frame_index & 1 == 0 {
            self
        } else {
            self.complement()
        }
    }
}

/// Camera and frame state shared by every method on one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommonSettings {
    /// View → clip projection of the current frame (jitter excluded).
    pub view_to_clip: Mat4,
    /// World → view transform of the current frame.
    pub world_to_view: Mat4,
    /// Sub-pixel jitter in pixels.
    pub camera_jitter: Vec2,
    /// Scale applied to the host motion vectors.
    pub motion_vector_scale: Vec2,
    /// Fraction of the full resolution actually rendered, in `(0, 1]`.
    pub resolution_scale: Vec2,
    /// Pixels further than this view distance are not denoised.
    pub denoising_range: f32,
    /// Host frame counter; drives checkerboard orientation.
    pub frame_index: u32,
    pub accumulation_mode: AccumulationMode,
    pub is_motion_vector_in_world_space: bool,
}

impl Default for CommonSettings {
    fn default() -> Self {
        Self {
            view_to_clip: Mat4::IDENTITY,
            world_to_view: Mat4::IDENTITY,
            camera_jitter: Vec2::ZERO,
            motion_vector_scale: Vec2::ONE,
            resolution_scale: Vec2::ONE,
            denoising_range: 500_000.0,
            frame_index: 0,
            accumulation_mode: AccumulationMode::Continue,
            is_motion_vector_in_world_space: false,
        }
    }
}

impl CommonSettings {
    pub(crate) fn validate(&self) -> Result<()> {
        let scale_ok = |s: f32| s.is_finite() && s > 0.0 && s <= 1.0;
        if !scale_ok(self.resolution_scale.x) || !scale_ok(self.resolution_scale.y) {
            return Err(DenoiseError::InvalidArgument(format!(
                "resolution_scale {:?} must lie in (0, 1]",
                self.resolution_scale
            )));
        }
        if !self.view_to_clip.is_finite() || !self.world_to_view.is_finite() {
            return Err(DenoiseError::InvalidArgument(
                "camera matrices must be finite".to_owned(),
            ));
        }
        if !(self.denoising_range.is_finite() && self.denoising_range > 0.0) {
            return Err(DenoiseError::InvalidArgument(format!(
                "denoising_range {} must be positive",
                self.denoising_range
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Per-method settings
// ---------------------------------------------------------------------------

/// REBLUR tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReblurSettings {
    pub max_accumulated_frame_num: u32,
    pub max_fast_accumulated_frame_num: u32,
    pub history_fix_frame_num: u32,
    pub diffuse_prepass_blur_radius: f32,
    pub specular_prepass_blur_radius: f32,
    pub blur_radius: f32,
    pub plane_distance_sensitivity: f32,
    pub lobe_angle_fraction: f32,
    pub roughness_fraction: f32,
    pub stabilization_strength: f32,
    pub checkerboard_mode: CheckerboardMode,
    pub enable_anti_firefly: bool,
}

impl Default for ReblurSettings {
    fn default() -> Self {
        Self {
            max_accumulated_frame_num: 30,
            max_fast_accumulated_frame_num: 6,
            history_fix_frame_num: 3,
            diffuse_prepass_blur_radius: 30.0,
            specular_prepass_blur_radius: 50.0,
            blur_radius: 15.0,
            plane_distance_sensitivity: 0.005,
            lobe_angle_fraction: 0.15,
            roughness_fraction: 0.15,
            stabilization_strength: 1.0,
            checkerboard_mode: CheckerboardMode::Off,
            enable_anti_firefly: false,
        }
    }
}

/// RELAX tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaxSettings {
    pub diffuse_max_accumulated_frame_num: u32,
    pub specular_max_accumulated_frame_num: u32,
    pub diffuse_max_fast_accumulated_frame_num: u32,
    pub specular_max_fast_accumulated_frame_num: u32,
    pub history_fix_frame_num: u32,
    pub diffuse_prepass_blur_radius: f32,
    pub specular_prepass_blur_radius: f32,
    pub diffuse_phi_luminance: f32,
    pub specular_phi_luminance: f32,
    pub depth_threshold: f32,
    pub roughness_fraction: f32,
    pub history_clamping_color_box_sigma_scale: f32,
    pub checkerboard_mode: CheckerboardMode,
}

impl Default for RelaxSettings {
    fn default() -> Self {
        Self {
            diffuse_max_accumulated_frame_num: 30,
            specular_max_accumulated_frame_num: 30,
            diffuse_max_fast_accumulated_frame_num: 6,
            specular_max_fast_accumulated_frame_num: 6,
            history_fix_frame_num: 3,
            diffuse_prepass_blur_radius: 0.0,
            specular_prepass_blur_radius: 50.0,
            diffuse_phi_luminance: 2.0,
            specular_phi_luminance: 1.0,
            depth_threshold: 0.003,
            roughness_fraction: 0.15,
            history_clamping_color_box_sigma_scale: 2.0,
            checkerboard_mode: CheckerboardMode::Off,
        }
    }
}

/// SIGMA tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigmaSettings {
    /// Direction towards the light in world space.
    pub light_direction: [f32; 3],
    pub plane_distance_sensitivity: f32,
    pub blur_radius_scale: f32,
    pub stabilization_strength: f32,
}

impl Default for SigmaSettings {
    fn default() -> Self {
        Self {
            light_direction: [0.0, 0.0, 0.0],
            plane_distance_sensitivity: 0.005,
            blur_radius_scale: 2.0,
            stabilization_strength: 1.0,
        }
    }
}

/// REFERENCE accumulation tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceSettings {
    pub max_accumulated_frame_num: u32,
}

impl Default for ReferenceSettings {
    fn default() -> Self {
        Self {
            max_accumulated_frame_num: 1024,
        }
    }
}

/// Settings slot of one registered method.
///
/// The variant must match the method family the identifier was created with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MethodSettings {
    Reblur(ReblurSettings),
    Relax(RelaxSettings),
    Sigma(SigmaSettings),
    Reference(ReferenceSettings),
    /// Reflection motion vectors have no tunables.
    SpecularReflectionMv,
}

impl MethodSettings {
    /// Default settings for `method`.
    #[must_use]
    pub fn default_for(method: Method) -> Self {
        match method {
            Method::ReblurDiffuse | Method::ReblurSpecular | Method::ReblurDiffuseSpecular => {
                Self::Reblur(ReblurSettings::default())
            }
            Method::RelaxDiffuse | Method::RelaxSpecular | Method::RelaxDiffuseSpecular => {
                Self::Relax(RelaxSettings::default())
            }
            Method::SigmaShadow | Method::SigmaShadowTranslucency => {
                Self::Sigma(SigmaSettings::default())
            }
            Method::Reference => Self::Reference(ReferenceSettings::default()),
            Method::SpecularReflectionMv => Self::SpecularReflectionMv,
        }
    }

    /// Whether this settings variant belongs to `method`.
    #[must_use]
    pub fn matches(&self, method: Method) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(&Self::default_for(method))
    }

    /// History length cap applied to the packed history counter.
    #[must_use]
    pub fn max_history_length(&self) -> u32 {
        match self {
            Self::Reblur(s) => s.max_accumulated_frame_num,
            Self::Relax(s) => s
                .diffuse_max_accumulated_frame_num
                .max(s.specular_max_accumulated_frame_num),
            Self::Sigma(_) | Self::SpecularReflectionMv => MAX_HISTORY_FRAME_NUM,
            Self::Reference(s) => s.max_accumulated_frame_num,
        }
    }

    /// Plane-distance sensitivity shared by every pass of the method.
    #[must_use]
    pub fn plane_distance_sensitivity(&self) -> f32 {
        match self {
            Self::Reblur(s) => s.plane_distance_sensitivity,
            Self::Relax(s) => s.depth_threshold,
            Self::Sigma(s) => s.plane_distance_sensitivity,
            Self::Reference(_) | Self::SpecularReflectionMv => 0.0,
        }
    }

    /// Configured checkerboard half, before per-frame resolution.
    #[must_use]
    pub fn checkerboard_mode(&self) -> CheckerboardMode {
        match self {
            Self::Reblur(s) => s.checkerboard_mode,
            Self::Relax(s) => s.checkerboard_mode,
            _ => CheckerboardMode::Off,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let within = |name: &str, value: u32, max: u32| {
            if value > max {
                Err(DenoiseError::InvalidArgument(format!(
                    "{name} = {value} exceeds {max}"
                )))
            } else {
                Ok(())
            }
        };
        let non_negative = |name: &str, value: f32| {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(DenoiseError::InvalidArgument(format!(
                    "{name} = {value} must be finite and non-negative"
                )))
            }
        };

        match self {
            Self::Reblur(s) => {
                within("max_accumulated_frame_num", s.max_accumulated_frame_num, MAX_HISTORY_FRAME_NUM)?;
                within(
                    "max_fast_accumulated_frame_num",
                    s.max_fast_accumulated_frame_num,
                    s.max_accumulated_frame_num,
                )?;
                within("history_fix_frame_num", s.history_fix_frame_num, MAX_HISTORY_FRAME_NUM)?;
                non_negative("diffuse_prepass_blur_radius", s.diffuse_prepass_blur_radius)?;
                non_negative("specular_prepass_blur_radius", s.specular_prepass_blur_radius)?;
                non_negative("blur_radius", s.blur_radius)?;
                non_negative("plane_distance_sensitivity", s.plane_distance_sensitivity)?;
                non_negative("stabilization_strength", s.stabilization_strength)
            }
            Self::Relax(s) => {
                within(
                    "diffuse_max_accumulated_frame_num",
                    s.diffuse_max_accumulated_frame_num,
                    MAX_HISTORY_FRAME_NUM,
                )?;
                within(
                    "specular_max_accumulated_frame_num",
                    s.specular_max_accumulated_frame_num,
                    MAX_HISTORY_FRAME_NUM,
                )?;
                within("history_fix_frame_num", s.history_fix_frame_num, MAX_HISTORY_FRAME_NUM)?;
                non_negative("diffuse_phi_luminance", s.diffuse_phi_luminance)?;
                non_negative("specular_phi_luminance", s.specular_phi_luminance)?;
                non_negative("depth_threshold", s.depth_threshold)
            }
            Self::Sigma(s) => {
                non_negative("plane_distance_sensitivity", s.plane_distance_sensitivity)?;
                non_negative("blur_radius_scale", s.blur_radius_scale)?;
                non_negative("stabilization_strength", s.stabilization_strength)
            }
            Self::Reference(s) => {
                if s.max_accumulated_frame_num == 0 {
                    Err(DenoiseError::InvalidArgument(
                        "max_accumulated_frame_num must be at least 1".to_owned(),
                    ))
                } else {
                    Ok(())
                }
            }
            Self::SpecularReflectionMv => Ok(()),
        }
    }
}
