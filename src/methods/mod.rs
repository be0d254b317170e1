//! Denoiser Methods
//!
//! Each method family describes its fixed filter pipeline through the
//! [`MethodCompiler`] trait:
//!
//! - [`compile`](MethodCompiler::compile) declares textures and passes into
//!   a [`MethodBuilder`] once, at instance creation.
//! - [`pack_constants`](MethodCompiler::pack_constants) serializes the
//!   per-pass constant blob every frame, in the same field order the pass
//!   declared with its [`ConstantLayout`](crate::graph::ConstantLayout).
//!
//! | Family | Module | Passes |
//! |--------|--------|--------|
//! | REBLUR | [`reblur`] | 7 |
//! | RELAX | [`relax`] | 10 |
//! | SIGMA | [`sigma`] | 3 |
//! | REFERENCE | [`reference`] | 2 |
//! | SPECULAR_REFLECTION_MV | [`reflection_mv`] | 1 |
//!
//! The pass structure never depends on runtime settings; only the numeric
//! constants do.

pub mod reblur;
pub mod reference;
pub mod reflection_mv;
pub mod relax;
pub mod sigma;

use bitflags::bitflags;

use crate::core::Method;
use crate::errors::Result;
use crate::graph::{ConstantWriter, MethodBuilder, SharedConstants};
use crate::settings::{CommonSettings, MethodSettings};

bitflags! {
    /// Radiance signals a REBLUR / RELAX variant denoises.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Signals: u8 {
        const DIFFUSE  = 1 << 0;
        const SPECULAR = 1 << 1;
    }
}

impl Signals {
    /// Signals handled by `method`. Empty for non-radiance methods.
    #[must_use]
    pub fn of(method: Method) -> Self {
        match method {
            Method::ReblurDiffuse | Method::RelaxDiffuse => Self::DIFFUSE,
            Method::ReblurSpecular | Method::RelaxSpecular => Self::SPECULAR,
            Method::ReblurDiffuseSpecular | Method::RelaxDiffuseSpecular => {
                Self::DIFFUSE | Self::SPECULAR
            }
            _ => Self::empty(),
        }
    }
}

/// Per-dispatch inputs of a constant packer.
pub struct PackContext<'a> {
    pub settings: &'a MethodSettings,
    pub common: &'a CommonSettings,
    /// Header already resolved for this method and frame.
    pub shared: &'a SharedConstants,
    /// Frames the method completed before this one; 0 on its first frame.
    pub frame_num: u32,
}

/// Static description of one method family.
pub trait MethodCompiler: Sync {
    /// Declares the method's textures and passes.
    fn compile(&self, ctx: &mut MethodBuilder<'_>) -> Result<()>;

    /// Writes the constant blob of the pass with the given `stage`.
    fn pack_constants(&self, stage: u16, ctx: &PackContext<'_>, writer: &mut ConstantWriter<'_>);
}

/// Compiler of `method`'s family.
#[must_use]
pub fn compiler_for(method: Method) -> &'static dyn MethodCompiler {
    match method {
        Method::ReblurDiffuse | Method::ReblurSpecular | Method::ReblurDiffuseSpecular => {
            &reblur::Reblur
        }
        Method::RelaxDiffuse | Method::RelaxSpecular | Method::RelaxDiffuseSpecular => &relax::Relax,
        Method::SigmaShadow | Method::SigmaShadowTranslucency => &sigma::Sigma,
        Method::Reference => &reference::Reference,
        Method::SpecularReflectionMv => &reflection_mv::SpecularReflectionMv,
    }
}
