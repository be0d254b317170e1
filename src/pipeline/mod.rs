//! Compute pipeline descriptions.
//!
//! - [`PipelineBuilder`]: flat, optionally coalesced pipeline table
//! - [`PipelineKey`]: canonical identity used for coalescing
//! - [`ShaderDesc`] / [`ShaderLibrary`]: shader identity and host bytecode

pub mod cache;
pub mod pipeline_key;
pub mod shader;

use smallvec::SmallVec;

use crate::core::DescriptorType;

pub use cache::PipelineBuilder;
pub use pipeline_key::PipelineKey;
pub use shader::{NumThreads, ShaderBackend, ShaderBytecode, ShaderDesc, ShaderLibrary};

/// A contiguous run of descriptors of one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorRange {
    pub descriptor_type: DescriptorType,
    pub base_register: u32,
    pub count: u32,
}

/// Static samplers every pipeline may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sampler {
    NearestClamp,
    LinearClamp,
}

/// Samplers in register order.
pub const SAMPLERS: [Sampler; 2] = [Sampler::NearestClamp, Sampler::LinearClamp];

/// One compute pipeline of the instance layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDesc {
    pub shader: ShaderDesc,
    /// Empty unless the instance was created with a [`ShaderLibrary`].
    pub bytecode: ShaderBytecode,
    /// Sampled textures first, storage textures second.
    pub descriptor_ranges: SmallVec<[DescriptorRange; 2]>,
    pub has_constant_data: bool,
    pub num_threads: NumThreads,
}

impl PipelineDesc {
    /// Total descriptors of `ty` across all ranges.
    #[must_use]
    pub fn descriptor_count(&self, ty: DescriptorType) -> u32 {
        self.descriptor_ranges
            .iter()
            .filter(|r| r.descriptor_type == ty)
            .map(|r| r.count)
            .sum()
    }
}
