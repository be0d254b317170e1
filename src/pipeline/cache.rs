//! Pipeline Builder
//!
//! Collects the compute pipelines referenced by every compiled pass into one
//! flat `pipelines[]` array. A pass refers to its pipeline purely by index
//! into this array; the index is returned by [`PipelineBuilder::register`]
//! and never changes afterwards.
//!
//! # Coalescing
//!
//! When enabled, a pipeline whose [`PipelineKey`] matches an already
//! registered one reuses that entry. This is a space optimisation only:
//! dispatch resolution is always by explicit index, never by content.

use rustc_hash::FxHashMap;

use super::pipeline_key::PipelineKey;
use super::shader::{ShaderBytecode, ShaderLibrary};
use super::PipelineDesc;
use crate::errors::{DenoiseError, Result};

/// Central pipeline storage and deduplication table.
pub struct PipelineBuilder {
    pipelines: Vec<PipelineDesc>,
    lookup: FxHashMap<PipelineKey, u16>,
    coalesce: bool,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new(true)
    }
}

impl PipelineBuilder {
    #[must_use]
    pub fn new(coalesce: bool) -> Self {
        Self {
            pipelines: Vec::with_capacity(32),
            lookup: FxHashMap::default(),
            coalesce,
        }
    }

    /// Appends `desc` (or finds its coalesced twin) and returns its index.
    pub fn register(&mut self, desc: PipelineDesc) -> Result<u16> {
        let key = PipelineKey::from(&desc);
        self.register_keyed(key, desc)
    }

    fn register_keyed(&mut self, key: PipelineKey, desc: PipelineDesc) -> Result<u16> {
        if self.coalesce
            && let Some(&index) = self.lookup.get(&key)
        {
            log::debug!(
                "Pipeline '{}' coalesced into index {index}",
                desc.shader.file_name
            );
            return Ok(index);
        }

        let index = u16::try_from(self.pipelines.len()).map_err(|_| {
            DenoiseError::Failure("pipeline table exceeds 65535 entries".to_owned())
        })?;
        self.pipelines.push(desc);
        self.lookup.entry(key).or_insert(index);
        Ok(index)
    }

    /// Retrieve a pipeline by index. **Panics** if the index is invalid.
    #[inline]
    #[must_use]
    pub fn get(&self, index: u16) -> &PipelineDesc {
        &self.pipelines[usize::from(index)]
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Attaches host bytecode to every registered pipeline.
    pub fn load_bytecode(&mut self, library: &dyn ShaderLibrary) {
        for pipeline in &mut self.pipelines {
            pipeline.bytecode = ShaderBytecode::load(&pipeline.shader, library);
            if pipeline.bytecode.is_empty() {
                log::warn!(
                    "Shader library has no bytecode for '{}'",
                    pipeline.shader.file_name
                );
            }
        }
    }

    /// Freezes the table.
    #[must_use]
    pub fn finish(self) -> Vec<PipelineDesc> {
        self.pipelines
    }
}

#[cfg(test)]
mod tests {
    use smallvec::smallvec;

    use super::*;
    use crate::core::DescriptorType;
    use crate::pipeline::{DescriptorRange, NumThreads, ShaderDesc};

    fn desc(file_name: &'static str) -> PipelineDesc {
        PipelineDesc {
            shader: ShaderDesc::new(file_name),
            bytecode: ShaderBytecode::default(),
            descriptor_ranges: smallvec![DescriptorRange {
                descriptor_type: DescriptorType::StorageTexture,
                base_register: 0,
                count: 1,
            }],
            has_constant_data: true,
            num_threads: NumThreads::TILE_16X16,
        }
    }

    #[test]
    fn identical_descriptions_coalesce() {
        let mut builder = PipelineBuilder::new(true);
        assert_eq!(builder.register(desc("A")).unwrap(), 0);
        assert_eq!(builder.register(desc("A")).unwrap(), 0);
        assert_eq!(builder.register(desc("B")).unwrap(), 1);
        assert_eq!(builder.len(), 2);
    }

    #[test]
    fn colliding_shader_hash_is_not_merged() {
        let mut builder = PipelineBuilder::new(true);
        let first = desc("A");
        builder.register(first.clone()).unwrap();

        let second = desc("B");
        let mut key = PipelineKey::from(&second);
        key.shader_hash = PipelineKey::from(&first).shader_hash;

        assert_eq!(builder.register_keyed(key, second).unwrap(), 1);
        assert_eq!(builder.get(1).shader.file_name, "B");
    }
}
