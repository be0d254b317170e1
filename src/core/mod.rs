//! Foundational types shared by the compiler and the frame assembler.

pub mod format;
pub mod method;
pub mod resource;

pub use format::{Format, TextureDesc, clamp_mip_num};
pub use method::{Identifier, LibraryDesc, Method, SpirvBindingOffsets, library_desc};
pub use resource::{DescriptorType, ExternalTexture, ResourceRef, ResourceType, UserPool};
