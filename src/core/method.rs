//! Method catalogue and library description.

use serde::{Deserialize, Serialize};

use crate::errors::DenoiseError;

/// Caller-chosen key naming one method instance inside an [`Instance`].
///
/// [`Instance`]: crate::Instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(pub u32);

/// Denoiser algorithm families with a fixed input/output contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum Method {
    /// Diffuse radiance + hit distance.
    ReblurDiffuse = 0,
    /// Specular radiance + hit distance.
    ReblurSpecular = 1,
    /// Both signals in one pass graph.
    ReblurDiffuseSpecular = 2,
    RelaxDiffuse = 3,
    RelaxSpecular = 4,
    RelaxDiffuseSpecular = 5,
    /// Shadow penumbra → shadow visibility.
    SigmaShadow = 6,
    /// Shadow penumbra + translucency → shadow visibility with color.
    SigmaShadowTranslucency = 7,
    /// Plain temporal accumulation, used to produce ground truth images.
    Reference = 8,
    /// Motion vectors for reflected (virtual) geometry.
    SpecularReflectionMv = 9,
}

impl Method {
    /// Every method compiled into this library.
    pub const ALL: [Self; 10] = [
        Self::ReblurDiffuse,
        Self::ReblurSpecular,
        Self::ReblurDiffuseSpecular,
        Self::RelaxDiffuse,
        Self::RelaxSpecular,
        Self::RelaxDiffuseSpecular,
        Self::SigmaShadow,
        Self::SigmaShadowTranslucency,
        Self::Reference,
        Self::SpecularReflectionMv,
    ];

    /// Human-readable method name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ReblurDiffuse => "REBLUR_DIFFUSE",
            Self::ReblurSpecular => "REBLUR_SPECULAR",
            Self::ReblurDiffuseSpecular => "REBLUR_DIFFUSE_SPECULAR",
            Self::RelaxDiffuse => "RELAX_DIFFUSE",
            Self::RelaxSpecular => "RELAX_SPECULAR",
            Self::RelaxDiffuseSpecular => "RELAX_DIFFUSE_SPECULAR",
            Self::SigmaShadow => "SIGMA_SHADOW",
            Self::SigmaShadowTranslucency => "SIGMA_SHADOW_TRANSLUCENCY",
            Self::Reference => "REFERENCE",
            Self::SpecularReflectionMv => "SPECULAR_REFLECTION_MV",
        }
    }
}

impl TryFrom<u32> for Method {
    type Error = DenoiseError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|m| *m as u32 == value)
            .ok_or(DenoiseError::Unsupported(value))
    }
}

/// Register offsets a SPIR-V host must apply per descriptor class, since
/// SPIR-V has a single binding namespace per set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpirvBindingOffsets {
    pub sampler_offset: u32,
    pub texture_offset: u32,
    pub constant_buffer_offset: u32,
    pub storage_texture_offset: u32,
}

/// Static description of the library build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryDesc {
    pub version_major: u16,
    pub version_minor: u16,
    pub version_patch: u16,
    pub supported_methods: &'static [Method],
    pub spirv_binding_offsets: SpirvBindingOffsets,
}

/// Returns the library description.
#[must_use]
pub fn library_desc() -> LibraryDesc {
    LibraryDesc {
        version_major: parse_version(env!("CARGO_PKG_VERSION_MAJOR")),
        version_minor: parse_version(env!("CARGO_PKG_VERSION_MINOR")),
        version_patch: parse_version(env!("CARGO_PKG_VERSION_PATCH")),
        supported_methods: &Method::ALL,
        spirv_binding_offsets: SpirvBindingOffsets {
            sampler_offset: 100,
            texture_offset: 200,
            constant_buffer_offset: 300,
            storage_texture_offset: 400,
        },
    }
}

fn parse_version(component: &str) -> u16 {
    component.parse().unwrap_or(0)
}
