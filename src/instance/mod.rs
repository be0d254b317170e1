//! Denoiser Instance
//!
//! [`Instance`] is the long-lived object a host creates once per set of
//! denoisers. Creation compiles every requested method, assigns pool slots
//! and freezes the layout into an [`InstanceDesc`]; afterwards only
//! settings and temporal state change.
//!
//! # Lifecycle
//!
//! ```text
//! Instance::new(&InstanceCreationDesc)
//!   ├─ compile(method, w, h)        × N   (graph::builder + methods::*)
//!   ├─ PoolAllocator::allocate      × N
//!   ├─ PipelineBuilder::register    × passes
//!   └─ InstanceDesc (frozen)
//!
//! every frame:
//!   set_method_settings(id, ..)     (optional, wholesale replace)
//!   compute_dispatches(&common, &user_pool) → FrameDispatches
//! ```
//!
//! Creation is atomic: any error leaves no instance behind.

pub mod frame;
pub mod registry;

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::core::{DescriptorType, Identifier, TextureDesc, UserPool};
use crate::errors::{DenoiseError, Result};
use crate::graph::{self, CONSTANT_BUFFER_OFFSET_ALIGNMENT, ConstantRing, PoolAllocator};
use crate::pipeline::{PipelineBuilder, PipelineDesc, SAMPLERS, Sampler, ShaderLibrary};
use crate::settings::{AccumulationMode, CommonSettings, InstanceCreationDesc, MethodSettings};

pub use frame::{DispatchDesc, FrameCompiler, FrameDispatches, ResolvedResource, ResourceBinding};
pub use registry::{MethodEntry, Registry, TemporalState};

/// Upper bounds a host descriptor pool must cover.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DescriptorPoolDesc {
    pub sets_max_num: u32,
    pub constant_buffers_max_num: u32,
    pub samplers_max_num: u32,
    pub textures_max_num: u32,
    pub storage_textures_max_num: u32,
}

/// Frozen creation-time layout a host backend allocates real objects from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceDesc {
    pub pipelines: Vec<PipelineDesc>,
    pub permanent_pool: Vec<TextureDesc>,
    pub transient_pool: Vec<TextureDesc>,
    pub samplers: Vec<Sampler>,
    pub descriptor_pool: DescriptorPoolDesc,
    /// Largest constant blob of any single dispatch.
    pub constant_buffer_max_data_size: u32,
    /// Size of the whole constant staging ring.
    pub constant_buffer_size: u32,
    pub buffered_frame_max_num: u32,
}

/// Compiled denoisers plus their per-frame state.
pub struct Instance {
    desc: InstanceDesc,
    registry: Registry,
    frame: FrameCompiler,
}

impl Instance {
    /// Creates an instance without shader bytecode.
    pub fn new(desc: &InstanceCreationDesc) -> Result<Self> {
        Self::create(desc, None)
    }

    /// Creates an instance and attaches bytecode from `library` to every
    /// pipeline.
    pub fn with_shader_library(desc: &InstanceCreationDesc, library: &dyn ShaderLibrary) -> Result<Self> {
        Self::create(desc, Some(library))
    }

    fn create(desc: &InstanceCreationDesc, library: Option<&dyn ShaderLibrary>) -> Result<Self> {
        if desc.methods.is_empty() {
            return Err(DenoiseError::InvalidArgument(
                "at least one method is required".to_owned(),
            ));
        }
        if desc.buffered_frame_max_num == 0 {
            return Err(DenoiseError::InvalidArgument(
                "buffered_frame_max_num must be at least 1".to_owned(),
            ));
        }

        let mut seen = FxHashSet::default();
        for m in &desc.methods {
            if !seen.insert(m.identifier) {
                return Err(DenoiseError::NonUniqueIdentifier(m.identifier));
            }
        }

        let mut pipelines = PipelineBuilder::new(desc.coalesce_pipelines);
        let mut pools = PoolAllocator::new();
        let mut registry = Registry::with_capacity(desc.methods.len());

        let mut region_size: u64 = 0;
        let mut constant_max = 0u32;
        let mut dispatch_max = 0u32;
        let mut constant_dispatch_max = 0u32;
        let mut textures = 0u32;
        let mut storage_textures = 0u32;

        for m in &desc.methods {
            let mut compiled = graph::compile(m.method, m.width, m.height, &mut pipelines)?;
            let range = pools.allocate(&mut compiled)?;
            log::debug!(
                "{} ({:?}): permanent slots {}..{}, transient slots {}..{}",
                m.method.name(),
                m.identifier,
                range.permanent_base,
                range.permanent_base + range.permanent_num,
                range.transient_base,
                range.transient_base + range.transient_num
            );

            for pass in compiled.all_passes() {
                region_size += u64::from(pass.constant_size.next_multiple_of(CONSTANT_BUFFER_OFFSET_ALIGNMENT));
                dispatch_max += 1;
                if pass.constant_size > 0 {
                    constant_dispatch_max += 1;
                }
                for r in &pass.resources {
                    match r.descriptor_type {
                        DescriptorType::Texture => textures += 1,
                        DescriptorType::StorageTexture => storage_textures += 1,
                    }
                }
            }
            constant_max = constant_max.max(compiled.constant_buffer_max_size);

            registry.insert(MethodEntry::new(
                m.identifier,
                m.method,
                (compiled.width, compiled.height),
                compiled.passes,
                compiled.clear_pass,
            ))?;
        }

        if let Some(library) = library {
            pipelines.load_bytecode(library);
        }

        let region_size = u32::try_from(region_size)
            .ok()
            .filter(|size| size.checked_mul(desc.buffered_frame_max_num).is_some())
            .ok_or_else(|| DenoiseError::Failure("constant staging ring is too large".to_owned()))?;
        let ring = ConstantRing::new(region_size, desc.buffered_frame_max_num);

        let frames = desc.buffered_frame_max_num;
        let descriptor_pool = DescriptorPoolDesc {
            sets_max_num: dispatch_max * frames,
            constant_buffers_max_num: constant_dispatch_max * frames,
            samplers_max_num: dispatch_max * frames * SAMPLERS.len() as u32,
            textures_max_num: textures * frames,
            storage_textures_max_num: storage_textures * frames,
        };

        let (permanent_pool, transient_pool) = pools.finish();
        let pipelines = pipelines.finish();

        let pool_bytes: u64 = permanent_pool
            .iter()
            .chain(&transient_pool)
            .map(TextureDesc::size_in_bytes)
            .sum();
        log::info!(
            "Denoiser instance created: {} methods, {} pipelines, {} permanent / {} transient textures ({} MiB), {} KiB constants",
            registry.len(),
            pipelines.len(),
            permanent_pool.len(),
            transient_pool.len(),
            pool_bytes / (1024 * 1024),
            ring.data().len() / 1024
        );

        let desc = InstanceDesc {
            pipelines,
            permanent_pool,
            transient_pool,
            samplers: SAMPLERS.to_vec(),
            descriptor_pool,
            constant_buffer_max_data_size: constant_max,
            constant_buffer_size: ring.data().len() as u32,
            buffered_frame_max_num: frames,
        };

        Ok(Self {
            desc,
            registry,
            frame: FrameCompiler::new(dispatch_max as usize, ring),
        })
    }

    #[inline]
    #[must_use]
    pub fn desc(&self) -> &InstanceDesc {
        &self.desc
    }

    /// Identifiers in registration order.
    pub fn identifiers(&self) -> impl Iterator<Item = Identifier> + '_ {
        self.registry.entries().iter().map(|e| e.identifier)
    }

    /// Replaces the settings of `identifier` wholesale.
    ///
    /// Fails with `InvalidArgument` for unknown identifiers, for a settings
    /// variant of another method family, or for out-of-range values.
    pub fn set_method_settings(&mut self, identifier: Identifier, settings: MethodSettings) -> Result<()> {
        let entry = self.registry.expect_mut(identifier)?;
        if !settings.matches(entry.method) {
            return Err(DenoiseError::InvalidArgument(format!(
                "settings do not belong to {} ({identifier:?})",
                entry.method.name()
            )));
        }
        settings.validate()?;
        entry.settings = settings;
        Ok(())
    }

    #[must_use]
    pub fn method_settings(&self, identifier: Identifier) -> Option<&MethodSettings> {
        self.registry.get(identifier).map(|e| &e.settings)
    }

    /// Requests a history reset for the next frame of `identifier`.
    ///
    /// Combined with the frame's common accumulation mode; the stronger one
    /// wins.
    pub fn reset_history(&mut self, identifier: Identifier, mode: AccumulationMode) -> Result<()> {
        let entry = self.registry.expect_mut(identifier)?;
        entry.state.pending_reset = entry.state.pending_reset.max(mode);
        Ok(())
    }

    /// History length as it was packed on the last frame.
    #[must_use]
    pub fn history_length(&self, identifier: Identifier) -> Option<u32> {
        self.registry
            .get(identifier)
            .map(MethodEntry::packed_history_length)
    }

    /// Assembles the dispatches of every registered method.
    pub fn compute_dispatches(
        &mut self,
        common: &CommonSettings,
        user_pool: &UserPool,
    ) -> Result<FrameDispatches<'_>> {
        let selection: SmallVec<[usize; 8]> = (0..self.registry.len()).collect();
        self.frame
            .compile(&mut self.registry, &selection, common, user_pool)
    }

    /// Assembles the dispatches of `identifiers` only.
    ///
    /// Dispatches still follow registration order. Listing an identifier
    /// twice dispatches it once.
    pub fn compute_dispatches_for(
        &mut self,
        common: &CommonSettings,
        user_pool: &UserPool,
        identifiers: &[Identifier],
    ) -> Result<FrameDispatches<'_>> {
        let mut selection = SmallVec::<[usize; 8]>::with_capacity(identifiers.len());
        for &identifier in identifiers {
            let index = self.registry.index_of(identifier).ok_or_else(|| {
                DenoiseError::InvalidArgument(format!("unknown identifier {identifier:?}"))
            })?;
            if selection.contains(&index) {
                log::warn!("{identifier:?} requested twice in one frame; dispatching once");
                continue;
            }
            selection.push(index);
        }
        selection.sort_unstable();

        self.frame
            .compile(&mut self.registry, &selection, common, user_pool)
    }
}
