//! Method Graph Compilation
//!
//! Compile-time half of the denoiser: everything that runs once, when an
//! [`Instance`](crate::Instance) is created.
//!
//! - [`builder`]: per-method compile context ([`MethodBuilder`]) and [`compile`]
//! - [`pass`]: immutable [`Pass`] descriptions and the [`PassBuilder`]
//! - [`pool`]: instance-wide texture pools ([`PoolAllocator`])
//! - [`constants`]: constant layouts, the shared header and the staging ring

pub mod builder;
pub mod constants;
pub mod pass;
pub mod pool;

pub use builder::{CLEAR_STAGE, CompiledMethod, MethodBuilder, compile, validate_dimension};
pub use constants::{
    CONSTANT_BUFFER_OFFSET_ALIGNMENT, ConstantLayout, ConstantRing, ConstantWriter, SharedConstants,
    kernel_rotator,
};
pub use pass::{Pass, PassBuilder, PermanentTexture, PingPong, TransientTexture};
pub use pool::{PoolAllocator, PoolRange};
