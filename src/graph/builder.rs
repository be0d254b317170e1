//! Method Compiler
//!
//! `compile(method, width, height)` turns one requested method into an
//! ordered pass list plus the texture declarations those passes rely on.
//! The per-method pass graphs live in [`crate::methods`]; this module
//! provides the [`MethodBuilder`] context they write into.
//!
//! Texture indices handed out here are private to the method. The
//! [`PoolAllocator`](super::pool::PoolAllocator) later remaps them into the
//! instance-wide pools.

use super::constants::ConstantLayout;
use super::pass::{Pass, PassBuilder, PermanentTexture, PingPong, TransientTexture};
use crate::core::{Format, Method, ResourceType, TextureDesc};
use crate::errors::{DenoiseError, Result};
use crate::methods;
use crate::pipeline::{NumThreads, PipelineBuilder, ShaderDesc};

/// Stage id reserved for clear passes.
pub const CLEAR_STAGE: u16 = u16::MAX;

/// Output of compiling one method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledMethod {
    pub method: Method,
    pub width: u16,
    pub height: u16,
    /// Normal passes in declaration order.
    pub passes: Vec<Pass>,
    /// History clear, dispatched only on `ClearAndRestart` frames.
    pub clear_pass: Option<Pass>,
    pub permanent: Vec<TextureDesc>,
    pub transient: Vec<TextureDesc>,
    /// Largest constant blob of any pass.
    pub constant_buffer_max_size: u32,
}

impl CompiledMethod {
    /// Every pass, the clear pass first when present.
    pub fn all_passes(&self) -> impl Iterator<Item = &Pass> {
        self.clear_pass.iter().chain(self.passes.iter())
    }
}

/// Compile context handed to a method's pass-graph description.
pub struct MethodBuilder<'a> {
    method: Method,
    width: u16,
    height: u16,
    pipelines: &'a mut PipelineBuilder,
    passes: Vec<Pass>,
    clear_pass: Option<Pass>,
    permanent: Vec<TextureDesc>,
    transient: Vec<TextureDesc>,
}

impl<'a> MethodBuilder<'a> {
    fn new(method: Method, width: u16, height: u16, pipelines: &'a mut PipelineBuilder) -> Self {
        Self {
            method,
            width,
            height,
            pipelines,
            passes: Vec::with_capacity(16),
            clear_pass: None,
            permanent: Vec::new(),
            transient: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    #[inline]
    #[must_use]
    pub fn resolution(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    fn next_index(len: usize) -> Result<u16> {
        u16::try_from(len)
            .map_err(|_| DenoiseError::Failure("method declares too many textures".to_owned()))
    }

    // ── Texture declarations ──────────────────────────────────────────────

    /// Declares a full-resolution transient texture.
    pub fn transient(&mut self, format: Format, mip_num: u16) -> Result<TransientTexture> {
        let index = Self::next_index(self.transient.len())?;
        self.transient
            .push(TextureDesc::new(format, self.width, self.height, mip_num));
        Ok(TransientTexture { index, mip_num })
    }

    /// Declares a full-resolution permanent texture.
    pub fn permanent(&mut self, format: Format) -> Result<PermanentTexture> {
        let index = Self::next_index(self.permanent.len())?;
        self.permanent
            .push(TextureDesc::new(format, self.width, self.height, 1));
        Ok(PermanentTexture { index })
    }

    /// Declares a ping-pong pair of permanent textures.
    pub fn ping_pong(&mut self, format: Format) -> Result<PingPong> {
        let a = self.permanent(format)?.index;
        let b = self.permanent(format)?.index;
        Ok(PingPong { a, b })
    }

    // ── Passes ────────────────────────────────────────────────────────────

    pub fn begin_pass(
        &self,
        name: &'static str,
        stage: u16,
        shader: ShaderDesc,
        num_threads: NumThreads,
    ) -> PassBuilder {
        PassBuilder::new(name, stage, shader, num_threads)
    }

    /// Ends `pass` and appends it to the method's pass list.
    pub fn add_pass(&mut self, pass: PassBuilder) -> Result<()> {
        let pass = pass.end(self.pipelines)?;
        self.passes.push(pass);
        Ok(())
    }

    /// Compiles the clear pass covering every permanent texture declared so
    /// far plus `history_outputs` (user outputs read back as history).
    ///
    /// Methods without any history get no clear pass.
    pub fn add_clear_pass(&mut self, history_outputs: &[ResourceType]) -> Result<()> {
        if self.permanent.is_empty() && history_outputs.is_empty() {
            return Ok(());
        }

        let mut pass = self
            .begin_pass(
                "CLEAR",
                CLEAR_STAGE,
                ShaderDesc::new("Clear"),
                NumThreads::TILE_16X16,
            )
            .constants(ConstantLayout::EMPTY)
            .full_resolution();

        for (i, desc) in self.permanent.iter().enumerate() {
            pass = pass.output_pooled(ResourceType::PermanentPool, Self::next_index(i)?, desc.mip_num);
        }
        for &ty in history_outputs {
            pass = pass.output(ty);
        }

        self.clear_pass = Some(pass.end(self.pipelines)?);
        Ok(())
    }

    fn finish(self) -> CompiledMethod {
        let constant_buffer_max_size = self
            .clear_pass
            .iter()
            .chain(&self.passes)
            .map(|p| p.constant_size)
            .max()
            .unwrap_or(0);

        CompiledMethod {
            method: self.method,
            width: self.width,
            height: self.height,
            passes: self.passes,
            clear_pass: self.clear_pass,
            permanent: self.permanent,
            transient: self.transient,
            constant_buffer_max_size,
        }
    }
}

/// Validates a requested render dimension.
pub fn validate_dimension(name: &str, value: u32) -> Result<u16> {
    match u16::try_from(value) {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(DenoiseError::InvalidArgument(format!(
            "{name} = {value} must lie in 1..={}",
            u16::MAX
        ))),
    }
}

/// Compiles `method` at `width × height`, registering its pipelines.
pub fn compile(
    method: Method,
    width: u32,
    height: u32,
    pipelines: &mut PipelineBuilder,
) -> Result<CompiledMethod> {
    let width = validate_dimension("width", width)?;
    let height = validate_dimension("height", height)?;

    let mut ctx = MethodBuilder::new(method, width, height, pipelines);
    methods::compiler_for(method).compile(&mut ctx)?;
    let compiled = ctx.finish();

    log::debug!(
        "Compiled {} at {width}x{height}: {} passes, {} permanent, {} transient",
        method.name(),
        compiled.passes.len(),
        compiled.permanent.len(),
        compiled.transient.len()
    );
    Ok(compiled)
}
