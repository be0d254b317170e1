//! Strongly-typed pipeline cache keys.
//!
//! A compute pipeline is fully identified by its shader, its descriptor
//! layout, whether it reads constant data and its thread-group size. The key
//! mirrors exactly those fields so that [`PipelineBuilder`] can coalesce
//! byte-identical pipelines requested by independent methods.
//!
//! Hashing feeds the precomputed xxh3-128 shader hash instead of the shader
//! strings; equality still compares the shader itself, so two keys only
//! match when every field matches.
//!
//! [`PipelineBuilder`]: super::cache::PipelineBuilder

use std::hash::{Hash, Hasher};

use smallvec::SmallVec;

use super::{DescriptorRange, NumThreads, PipelineDesc, ShaderDesc};

/// Canonical cache key for a compute pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineKey {
    pub shader: ShaderDesc,
    /// xxh3-128 hash of the shader file name and entry point.
    pub shader_hash: u128,
    pub descriptor_ranges: SmallVec<[DescriptorRange; 2]>,
    pub has_constant_data: bool,
    pub num_threads: NumThreads,
}

impl Hash for PipelineKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.shader_hash.hash(state);
        self.descriptor_ranges.hash(state);
        self.has_constant_data.hash(state);
        self.num_threads.hash(state);
    }
}

impl From<&PipelineDesc> for PipelineKey {
    fn from(desc: &PipelineDesc) -> Self {
        Self {
            shader: desc.shader,
            shader_hash: desc.shader.identity_hash(),
            descriptor_ranges: desc.descriptor_ranges.clone(),
            has_constant_data: desc.has_constant_data,
            num_threads: desc.num_threads,
        }
    }
}
