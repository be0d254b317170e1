//! Pool Allocator
//!
//! Assigns every texture declared by a compiled method a stable slot in the
//! instance-wide PERMANENT or TRANSIENT pool.
//!
//! # Design
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    PoolAllocator                      │
//! │                                                      │
//! │  permanent: [TextureDesc]  ← method A │ method B │ …  │
//! │  transient: [TextureDesc]  ← method A │ method B │ …  │
//! │                                                      │
//! │  allocate(&mut CompiledMethod) → PoolRange           │
//! │  finish() → (permanent, transient)                   │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Strategy
//!
//! - Sequential placement in registration order; slots never move.
//! - Slot numbers are disjoint across methods. Whether two transient slots
//!   may share physical memory is left to the host, which must derive it
//!   from usage intervals.
//! - Before placement, the method's pass list is checked for transient
//!   reads that precede every write, and for passes that read and write the
//!   same mips of one pooled texture.

use smallvec::SmallVec;

use super::builder::CompiledMethod;
use super::pass::Pass;
use crate::core::{ResourceRef, ResourceType, TextureDesc};
use crate::errors::{DenoiseError, Result};

/// Global slots assigned to one method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolRange {
    pub permanent_base: u16,
    pub permanent_num: u16,
    pub transient_base: u16,
    pub transient_num: u16,
}

/// Accumulates pool declarations across all methods of an instance.
#[derive(Debug, Default)]
pub struct PoolAllocator {
    permanent: Vec<TextureDesc>,
    transient: Vec<TextureDesc>,
}

impl PoolAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Places `method`'s textures and rebases its passes to global slots.
    pub fn allocate(&mut self, method: &mut CompiledMethod) -> Result<PoolRange> {
        validate_pass_order(method)?;

        let overflow = || DenoiseError::Failure("texture pool exceeds 65535 slots".to_owned());
        let range = PoolRange {
            permanent_base: u16::try_from(self.permanent.len()).map_err(|_| overflow())?,
            permanent_num: u16::try_from(method.permanent.len()).map_err(|_| overflow())?,
            transient_base: u16::try_from(self.transient.len()).map_err(|_| overflow())?,
            transient_num: u16::try_from(method.transient.len()).map_err(|_| overflow())?,
        };
        if usize::from(range.permanent_base) + usize::from(range.permanent_num) > usize::from(u16::MAX)
            || usize::from(range.transient_base) + usize::from(range.transient_num) > usize::from(u16::MAX)
        {
            return Err(overflow());
        }

        self.permanent.extend_from_slice(&method.permanent);
        self.transient.extend_from_slice(&method.transient);

        for pass in method.passes.iter_mut().chain(method.clear_pass.as_mut()) {
            pass.rebase(range.permanent_base, range.transient_base);
        }

        Ok(range)
    }

    #[must_use]
    pub fn permanent(&self) -> &[TextureDesc] {
        &self.permanent
    }

    #[must_use]
    pub fn transient(&self) -> &[TextureDesc] {
        &self.transient
    }

    /// Freezes the pools as `(permanent, transient)`.
    #[must_use]
    pub fn finish(self) -> (Vec<TextureDesc>, Vec<TextureDesc>) {
        (self.permanent, self.transient)
    }
}

fn mips_overlap(a: &ResourceRef, b: &ResourceRef) -> bool {
    a.mip_offset < b.mip_offset + b.mip_num && b.mip_offset < a.mip_offset + a.mip_num
}

fn same_slot(a: &ResourceRef, b: &ResourceRef) -> bool {
    a.ty == b.ty
        && (a.index_in_pool == b.index_in_pool || a.odd_frame_index_in_pool == b.odd_frame_index_in_pool)
}

/// Checks the intra-frame pass ordering rules of one method.
fn validate_pass_order(method: &CompiledMethod) -> Result<()> {
    let mut written: SmallVec<[bool; 32]> = SmallVec::from_elem(false, method.transient.len());

    for pass in &method.passes {
        check_read_write_overlap(pass)?;

        for input in pass.inputs() {
            if input.ty == ResourceType::TransientPool
                && !written
                    .get(usize::from(input.index_in_pool))
                    .copied()
                    .unwrap_or(false)
            {
                return Err(DenoiseError::Failure(format!(
                    "{}: pass '{}' reads transient texture {} before any pass wrote it",
                    method.method.name(),
                    pass.name,
                    input.index_in_pool
                )));
            }
        }

        for output in pass.outputs() {
            if output.ty == ResourceType::TransientPool {
                match written.get_mut(usize::from(output.index_in_pool)) {
                    Some(flag) => *flag = true,
                    None => {
                        return Err(DenoiseError::Failure(format!(
                            "{}: pass '{}' writes undeclared transient texture {}",
                            method.method.name(),
                            pass.name,
                            output.index_in_pool
                        )));
                    }
                }
            }
        }
    }

    if let Some(clear) = &method.clear_pass {
        check_read_write_overlap(clear)?;
    }
    Ok(())
}

fn check_read_write_overlap(pass: &Pass) -> Result<()> {
    for output in pass.outputs() {
        if !output.ty.is_pool() {
            continue;
        }
        if pass
            .inputs()
            .iter()
            .any(|input| same_slot(input, output) && mips_overlap(input, output))
        {
            return Err(DenoiseError::Failure(format!(
                "pass '{}' reads and writes the same mips of {:?} slot {}",
                pass.name, output.ty, output.index_in_pool
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Format, Method};
    use crate::errors::ResultCode;
    use crate::graph::pass::{PassBuilder, PermanentTexture, TransientTexture};
    use crate::pipeline::{NumThreads, PipelineBuilder, ShaderDesc};

    fn method(passes: Vec<Pass>, permanent: usize, transient: usize) -> CompiledMethod {
        let desc = TextureDesc::new(Format::R8Unorm, 8, 8, 1);
        CompiledMethod {
            method: Method::Reference,
            width: 8,
            height: 8,
            passes,
            clear_pass: None,
            permanent: vec![desc; permanent],
            transient: vec![desc; transient],
            constant_buffer_max_size: 0,
        }
    }

    fn builder(name: &'static str) -> PassBuilder {
        PassBuilder::new(name, 0, ShaderDesc::new(name), NumThreads::TILE_8X8)
    }

    #[test]
    fn transient_read_before_write_is_rejected() {
        let mut pipelines = PipelineBuilder::default();
        let reader = builder("reader")
            .input_transient(TransientTexture { index: 0, mip_num: 1 })
            .output_transient(TransientTexture { index: 1, mip_num: 1 })
            .end(&mut pipelines)
            .unwrap();

        let err = PoolAllocator::new()
            .allocate(&mut method(vec![reader], 0, 2))
            .unwrap_err();
        assert_eq!(err.code(), ResultCode::Failure);
    }

    #[test]
    fn in_place_permanent_update_is_rejected() {
        let mut pipelines = PipelineBuilder::default();
        let tex = PermanentTexture { index: 0 };
        let pass = builder("in_place")
            .input_permanent(tex)
            .output_permanent(tex)
            .end(&mut pipelines)
            .unwrap();

        assert!(PoolAllocator::new().allocate(&mut method(vec![pass], 1, 0)).is_err());
    }

    #[test]
    fn later_methods_are_rebased() {
        let mut pipelines = PipelineBuilder::default();
        let writer = || {
            builder("writer")
                .input_permanent(PermanentTexture { index: 0 })
                .output_transient(TransientTexture { index: 0, mip_num: 1 })
        };
        let mut first = method(vec![writer().end(&mut pipelines).unwrap()], 1, 1);
        let mut second = method(vec![writer().end(&mut pipelines).unwrap()], 1, 1);

        let mut pools = PoolAllocator::new();
        assert_eq!(pools.allocate(&mut first).unwrap().permanent_base, 0);
        let range = pools.allocate(&mut second).unwrap();

        assert_eq!((range.permanent_base, range.transient_base), (1, 1));
        let refs = &second.passes[0].resources;
        assert_eq!(refs[0].index_in_pool, 1);
        assert_eq!(refs[1].index_in_pool, 1);
        assert_eq!(pools.permanent().len(), 2);
        assert_eq!(pools.transient().len(), 2);
    }
}
