//! Passes and the pass builder.
//!
//! A [`Pass`] is one compute-shader stage of a method's filter pipeline with
//! statically declared resource roles and constant-data size. Passes are
//! described with an explicit [`PassBuilder`] value: roles are appended in
//! order, and [`PassBuilder::end`] registers the pipeline and yields the
//! immutable pass.
//!
//! ```ignore
//! let pass = ctx
//!     .begin_pass("SIGMA::Blur", BLUR, ShaderDesc::new("SIGMA_Shadow_Blur"), NumThreads::TILE_16X16)
//!     .input(ResourceType::InNormalRoughness)
//!     .input_transient(data)
//!     .output_transient(blurred)
//!     .constants(ConstantLayout::shared().vec4());
//! ctx.add_pass(pass)?;
//! ```

use smallvec::SmallVec;

use super::constants::ConstantLayout;
use crate::core::{DescriptorType, ResourceRef, ResourceType};
use crate::errors::{DenoiseError, Result};
use crate::pipeline::{DescriptorRange, NumThreads, PipelineBuilder, PipelineDesc, ShaderBytecode, ShaderDesc};

/// Inline capacity of per-pass resource lists.
pub const PASS_RESOURCE_INLINE: usize = 24;

pub type ResourceList = SmallVec<[ResourceRef; PASS_RESOURCE_INLINE]>;

// ─── Method-local Texture Handles ─────────────────────────────────────────────

/// Method-local handle of a transient texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransientTexture {
    pub(crate) index: u16,
    pub(crate) mip_num: u16,
}

/// Method-local handle of a permanent texture that is rewritten every frame
/// in place (previous guides, internal data).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermanentTexture {
    pub(crate) index: u16,
}

/// Two permanent textures alternating between "previous" and "current".
///
/// On even method frames `a` is current and `b` holds the previous frame;
/// odd frames swap the roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingPong {
    pub(crate) a: u16,
    pub(crate) b: u16,
}

// ─── Pass ─────────────────────────────────────────────────────────────────────

/// One compiled compute stage. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pass {
    pub name: &'static str,
    /// Method-specific stage id selecting the constant packer.
    pub stage: u16,
    pub pipeline_index: u16,
    /// Inputs first, outputs second.
    pub resources: ResourceList,
    pub input_num: u16,
    pub constant_size: u32,
    pub num_threads: NumThreads,
    /// Dispatch over the full texture size instead of the rendered rect.
    pub full_resolution: bool,
}

impl Pass {
    #[inline]
    #[must_use]
    pub fn inputs(&self) -> &[ResourceRef] {
        &self.resources[..usize::from(self.input_num)]
    }

    #[inline]
    #[must_use]
    pub fn outputs(&self) -> &[ResourceRef] {
        &self.resources[usize::from(self.input_num)..]
    }

    /// Shifts every pool reference from method-local to global slots.
    pub(crate) fn rebase(&mut self, permanent_base: u16, transient_base: u16) {
        for r in &mut self.resources {
            let base = match r.ty {
                ResourceType::PermanentPool => permanent_base,
                ResourceType::TransientPool => transient_base,
                _ => continue,
            };
            r.index_in_pool += base;
            r.odd_frame_index_in_pool += base;
        }
    }
}

// ─── Pass Builder ─────────────────────────────────────────────────────────────

/// Incremental description of one pass.
#[derive(Debug, Clone)]
#[must_use]
pub struct PassBuilder {
    name: &'static str,
    stage: u16,
    shader: ShaderDesc,
    num_threads: NumThreads,
    inputs: ResourceList,
    outputs: ResourceList,
    constants: ConstantLayout,
    full_resolution: bool,
}

impl PassBuilder {
    pub fn new(name: &'static str, stage: u16, shader: ShaderDesc, num_threads: NumThreads) -> Self {
        Self {
            name,
            stage,
            shader,
            num_threads,
            inputs: SmallVec::new(),
            outputs: SmallVec::new(),
            constants: ConstantLayout::EMPTY,
            full_resolution: false,
        }
    }

    fn user(ty: ResourceType, descriptor_type: DescriptorType) -> ResourceRef {
        debug_assert!(!ty.is_pool(), "pool markers need a pool index");
        ResourceRef {
            ty,
            index_in_pool: 0,
            odd_frame_index_in_pool: 0,
            mip_offset: 0,
            mip_num: 1,
            descriptor_type,
        }
    }

    fn pooled(
        ty: ResourceType,
        even: u16,
        odd: u16,
        mip_offset: u16,
        mip_num: u16,
        descriptor_type: DescriptorType,
    ) -> ResourceRef {
        ResourceRef {
            ty,
            index_in_pool: even,
            odd_frame_index_in_pool: odd,
            mip_offset,
            mip_num,
            descriptor_type,
        }
    }

    // ── Inputs ────────────────────────────────────────────────────────────

    /// Reads a host-supplied role.
    pub fn input(mut self, ty: ResourceType) -> Self {
        self.inputs.push(Self::user(ty, DescriptorType::Texture));
        self
    }

    /// Reads several host-supplied roles in order.
    pub fn inputs(mut self, roles: &[ResourceType]) -> Self {
        for &ty in roles {
            self = self.input(ty);
        }
        self
    }

    /// Reads every mip of a transient texture.
    pub fn input_transient(self, tex: TransientTexture) -> Self {
        self.input_transient_mips(tex, 0, tex.mip_num)
    }

    pub fn input_transient_mips(mut self, tex: TransientTexture, mip_offset: u16, mip_num: u16) -> Self {
        self.inputs.push(Self::pooled(
            ResourceType::TransientPool,
            tex.index,
            tex.index,
            mip_offset,
            mip_num,
            DescriptorType::Texture,
        ));
        self
    }

    pub fn input_permanent(mut self, tex: PermanentTexture) -> Self {
        self.inputs.push(Self::pooled(
            ResourceType::PermanentPool,
            tex.index,
            tex.index,
            0,
            1,
            DescriptorType::Texture,
        ));
        self
    }

    /// Reads the previous-frame half of a ping-pong pair.
    pub fn input_history(mut self, pair: PingPong) -> Self {
        self.inputs.push(Self::pooled(
            ResourceType::PermanentPool,
            pair.b,
            pair.a,
            0,
            1,
            DescriptorType::Texture,
        ));
        self
    }

    /// Reads the current-frame half of a ping-pong pair (written earlier
    /// this frame).
    pub fn input_current(mut self, pair: PingPong) -> Self {
        self.inputs.push(Self::pooled(
            ResourceType::PermanentPool,
            pair.a,
            pair.b,
            0,
            1,
            DescriptorType::Texture,
        ));
        self
    }

    // ── Outputs ───────────────────────────────────────────────────────────

    pub fn output(mut self, ty: ResourceType) -> Self {
        self.outputs.push(Self::user(ty, DescriptorType::StorageTexture));
        self
    }

    pub fn output_transient(self, tex: TransientTexture) -> Self {
        self.output_transient_mips(tex, 0, 1)
    }

    pub fn output_transient_mips(mut self, tex: TransientTexture, mip_offset: u16, mip_num: u16) -> Self {
        self.outputs.push(Self::pooled(
            ResourceType::TransientPool,
            tex.index,
            tex.index,
            mip_offset,
            mip_num,
            DescriptorType::StorageTexture,
        ));
        self
    }

    pub fn output_permanent(mut self, tex: PermanentTexture) -> Self {
        self.outputs.push(Self::pooled(
            ResourceType::PermanentPool,
            tex.index,
            tex.index,
            0,
            1,
            DescriptorType::StorageTexture,
        ));
        self
    }

    /// Writes the current-frame half of a ping-pong pair.
    pub fn output_current(mut self, pair: PingPong) -> Self {
        self.outputs.push(Self::pooled(
            ResourceType::PermanentPool,
            pair.a,
            pair.b,
            0,
            1,
            DescriptorType::StorageTexture,
        ));
        self
    }

    /// Writes an arbitrary pooled range; used by clear passes.
    pub(crate) fn output_pooled(mut self, ty: ResourceType, index: u16, mip_num: u16) -> Self {
        self.outputs.push(Self::pooled(
            ty,
            index,
            index,
            0,
            mip_num,
            DescriptorType::StorageTexture,
        ));
        self
    }

    // ── Misc ──────────────────────────────────────────────────────────────

    pub fn constants(mut self, layout: ConstantLayout) -> Self {
        self.constants = layout;
        self
    }

    pub fn full_resolution(mut self) -> Self {
        self.full_resolution = true;
        self
    }

    /// Registers the pipeline and produces the immutable pass.
    pub fn end(self, pipelines: &mut PipelineBuilder) -> Result<Pass> {
        if self.outputs.is_empty() {
            return Err(DenoiseError::Failure(format!(
                "pass '{}' declares no outputs",
                self.name
            )));
        }

        let to_u16 = |n: usize| {
            u16::try_from(n).map_err(|_| {
                DenoiseError::Failure(format!("pass '{}' binds too many resources", self.name))
            })
        };
        let input_num = to_u16(self.inputs.len())?;
        let output_num = to_u16(self.outputs.len())?;

        let mut descriptor_ranges = SmallVec::new();
        if input_num > 0 {
            descriptor_ranges.push(DescriptorRange {
                descriptor_type: DescriptorType::Texture,
                base_register: 0,
                count: u32::from(input_num),
            });
        }
        descriptor_ranges.push(DescriptorRange {
            descriptor_type: DescriptorType::StorageTexture,
            base_register: 0,
            count: u32::from(output_num),
        });

        let constant_size = self.constants.size();
        let pipeline_index = pipelines.register(PipelineDesc {
            shader: self.shader,
            bytecode: ShaderBytecode::default(),
            descriptor_ranges,
            has_constant_data: constant_size > 0,
            num_threads: self.num_threads,
        })?;

        let mut resources = self.inputs;
        resources.extend(self.outputs);

        Ok(Pass {
            name: self.name,
            stage: self.stage,
            pipeline_index,
            resources,
            input_num,
            constant_size,
            num_threads: self.num_threads,
            full_resolution: self.full_resolution,
        })
    }
}
