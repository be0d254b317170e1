//! # myth-denoise
//!
//! Compiles image-space denoiser methods (REBLUR, RELAX, SIGMA, REFERENCE,
//! SPECULAR_REFLECTION_MV) into
//!
//! 1. a static GPU layout, created once: compute pipelines, a permanent and
//!    a transient texture pool, descriptor-pool sizing ([`InstanceDesc`]);
//! 2. a per-frame ordered list of compute dispatches with resolved bindings
//!    and packed constant data ([`DispatchDesc`]).
//!
//! The crate never touches a GPU. Hosts translate the layout and the
//! dispatch list into their own graphics API.
//!
//! ```rust,ignore
//! use myth_denoise::*;
//!
//! let mut instance = Instance::new(&InstanceCreationDesc {
//!     methods: vec![MethodDesc::new(Identifier(1), Method::SigmaShadow, 1920, 1080)],
//!     ..Default::default()
//! })?;
//!
//! let frame = instance.compute_dispatches(&CommonSettings::default(), &user_pool)?;
//! for dispatch in frame.iter() {
//!     let constants = frame.constants(dispatch);
//!     // bind, upload, dispatch(grid_width, grid_height, 1)
//! }
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]

pub mod core;
pub mod errors;
pub mod graph;
pub mod instance;
pub mod methods;
pub mod pipeline;
pub mod settings;

pub use crate::core::{
    DescriptorType, ExternalTexture, Format, Identifier, LibraryDesc, Method, ResourceRef, ResourceType,
    SpirvBindingOffsets, TextureDesc, UserPool, library_desc,
};
pub use errors::{DenoiseError, Result, ResultCode};
pub use instance::{
    DescriptorPoolDesc, DispatchDesc, FrameDispatches, Instance, InstanceDesc, ResolvedResource,
    ResourceBinding,
};
pub use pipeline::{NumThreads, PipelineDesc, Sampler, ShaderBackend, ShaderBytecode, ShaderDesc, ShaderLibrary};
pub use settings::{
    AccumulationMode, CheckerboardMode, CommonSettings, InstanceCreationDesc, MAX_HISTORY_FRAME_NUM, MethodDesc,
    MethodSettings, ReblurSettings, ReferenceSettings, RelaxSettings, SigmaSettings,
};
