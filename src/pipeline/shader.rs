//! Shader identity and bytecode lookup.
//!
//! The compiler never embeds shader binaries. Every pass names its compute
//! shader by file name and entry point; hosts that want bytecode attached to
//! [`PipelineDesc`](super::PipelineDesc) provide a [`ShaderLibrary`].

use std::sync::Arc;

use xxhash_rust::xxh3::xxh3_128;

/// Compute shader identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderDesc {
    /// Shader file name without extension, e.g. `SIGMA_Shadow_Blur`.
    pub file_name: &'static str,
    pub entry_point: &'static str,
}

impl ShaderDesc {
    #[must_use]
    pub const fn new(file_name: &'static str) -> Self {
        Self {
            file_name,
            entry_point: "main",
        }
    }

    /// xxh3-128 hash of the shader identity, stable across runs.
    #[must_use]
    pub fn identity_hash(&self) -> u128 {
        let mut bytes = Vec::with_capacity(self.file_name.len() + self.entry_point.len() + 1);
        bytes.extend_from_slice(self.file_name.as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(self.entry_point.as_bytes());
        xxh3_128(&bytes)
    }
}

/// Compute thread-group size; one thread group covers one tile of pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NumThreads {
    pub width: u8,
    pub height: u8,
}

impl NumThreads {
    pub const TILE_8X8: Self = Self::new(8, 8);
    pub const TILE_16X16: Self = Self::new(16, 16);

    #[must_use]
    pub const fn new(width: u8, height: u8) -> Self {
        Self { width, height }
    }

    /// Thread-group grid covering `width × height` pixels.
    #[inline]
    #[must_use]
    pub fn grid(self, width: u16, height: u16) -> (u16, u16) {
        (
            width.div_ceil(u16::from(self.width)),
            height.div_ceil(u16::from(self.height)),
        )
    }
}

/// Bytecode flavours a backend can consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderBackend {
    Dxbc,
    Dxil,
    Spirv,
}

impl ShaderBackend {
    pub const ALL: [Self; 3] = [Self::Dxbc, Self::Dxil, Self::Spirv];
}

/// Compiled blobs of one shader, one slot per backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderBytecode {
    pub dxbc: Option<Arc<[u8]>>,
    pub dxil: Option<Arc<[u8]>>,
    pub spirv: Option<Arc<[u8]>>,
}

impl ShaderBytecode {
    #[must_use]
    pub fn get(&self, backend: ShaderBackend) -> Option<&[u8]> {
        match backend {
            ShaderBackend::Dxbc => self.dxbc.as_deref(),
            ShaderBackend::Dxil => self.dxil.as_deref(),
            ShaderBackend::Spirv => self.spirv.as_deref(),
        }
    }

    fn slot_mut(&mut self, backend: ShaderBackend) -> &mut Option<Arc<[u8]>> {
        match backend {
            ShaderBackend::Dxbc => &mut self.dxbc,
            ShaderBackend::Dxil => &mut self.dxil,
            ShaderBackend::Spirv => &mut self.spirv,
        }
    }

    /// Collects every blob `library` knows for `shader`.
    #[must_use]
    pub fn load(shader: &ShaderDesc, library: &dyn ShaderLibrary) -> Self {
        let mut bytecode = Self::default();
        for backend in ShaderBackend::ALL {
            *bytecode.slot_mut(backend) = library.bytecode(shader, backend);
        }
        bytecode
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dxbc.is_none() && self.dxil.is_none() && self.spirv.is_none()
    }
}

/// Host-provided source of compiled shader blobs.
pub trait ShaderLibrary {
    /// Returns the blob of `shader` for `backend`, if the host ships one.
    fn bytecode(&self, shader: &ShaderDesc, backend: ShaderBackend) -> Option<Arc<[u8]>>;
}
