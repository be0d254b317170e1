//! Constant Data Packing
//!
//! Every pass declares its constant-data size at compile time as the sum of
//! fixed per-field contributions ([`ConstantLayout`]). At dispatch time the
//! [`ConstantWriter`] serializes the shared header ([`SharedConstants`])
//! followed by the pass-specific fields, in exactly the declared order, into
//! a region of the per-instance [`ConstantRing`].
//!
//! # Layout Rules
//!
//! | Field | Contribution |
//! |-------|--------------|
//! | `mat4` | 16 floats |
//! | `vec4` | 4 floats |
//! | `vec2` | 2 floats |
//! | `float` / `uint` | 1 float |
//!
//! Fields are tightly packed; the total is padded to a 16-byte multiple.
//! Pass authors order fields so that no vector straddles a 16-byte row.
//!
//! # Ring Staging
//!
//! ```text
//! ┌──────────── region 0 ────────────┬──────────── region 1 ───────────┬ …
//! │ pass A │pad│ pass B │pad│ …      │ pass A │pad│ pass B │pad│ …     │
//! └──────────────────────────────────┴─────────────────────────────────┴ …
//!   one region per buffered frame, offsets aligned to 256 bytes
//! ```

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec4};

use crate::errors::{DenoiseError, Result};

/// Required alignment of constant-buffer view offsets.
pub const CONSTANT_BUFFER_OFFSET_ALIGNMENT: u32 = 256;

/// Header packed at the start of every non-clear pass.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SharedConstants {
    pub view_to_clip: Mat4,
    pub clip_to_view: Mat4,
    pub world_to_view: Mat4,
    pub world_to_view_prev: Mat4,
    pub view_to_clip_prev: Mat4,
    /// Camera translation since the previous frame (xyz).
    pub camera_delta: Vec4,
    /// Jitter (xy) and motion vector scale (zw).
    pub jitter_and_mv_scale: Vec4,
    /// Rect size (xy) and its reciprocal (zw).
    pub rect_size: Vec4,
    pub frame_index: u32,
    pub history_length: u32,
    pub checkerboard: u32,
    pub flags: u32,
    pub plane_distance_sensitivity: f32,
    pub denoising_range: f32,
    pub resolution_scale: Vec2,
}

impl SharedConstants {
    /// `flags` bit: motion vectors are world-space deltas.
    pub const FLAG_MV_IN_WORLD_SPACE: u32 = 1;
    /// `flags` bit: history was discarded this frame.
    pub const FLAG_HISTORY_RESET: u32 = 1 << 1;

    pub const FLOATS: u32 = (std::mem::size_of::<Self>() / 4) as u32;
}

/// Statically declared constant-data layout of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ConstantLayout {
    floats: u32,
}

impl ConstantLayout {
    /// No constant data at all (clear passes).
    pub const EMPTY: Self = Self { floats: 0 };

    /// Starts a layout with the shared header.
    #[must_use]
    pub const fn shared() -> Self {
        Self {
            floats: SharedConstants::FLOATS,
        }
    }

    #[must_use]
    pub const fn mat4(self) -> Self {
        Self {
            floats: self.floats + 16,
        }
    }

    #[must_use]
    pub const fn vec4(self) -> Self {
        Self {
            floats: self.floats + 4,
        }
    }

    #[must_use]
    pub const fn vec2(self) -> Self {
        Self {
            floats: self.floats + 2,
        }
    }

    #[must_use]
    pub const fn float(self) -> Self {
        Self {
            floats: self.floats + 1,
        }
    }

    #[must_use]
    pub const fn uint(self) -> Self {
        self.float()
    }

    /// Declared byte size, padded to 16 bytes.
    #[must_use]
    pub const fn size(self) -> u32 {
        (self.floats * 4).next_multiple_of(16)
    }
}

/// Sequential writer over the region reserved for one dispatch.
///
/// Writes past the end of the region are counted but dropped, so that a
/// layout mismatch is reported by [`finish`](Self::finish) instead of
/// panicking in the frame loop.
pub struct ConstantWriter<'a> {
    buf: &'a mut [u8],
    cursor: usize,
}

impl<'a> ConstantWriter<'a> {
    #[must_use]
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, cursor: 0 }
    }

    fn bytes(&mut self, bytes: &[u8]) -> &mut Self {
        let end = self.cursor + bytes.len();
        if end <= self.buf.len() {
            self.buf[self.cursor..end].copy_from_slice(bytes);
        }
        self.cursor = end;
        self
    }

    pub fn shared(&mut self, shared: &SharedConstants) -> &mut Self {
        self.bytes(bytemuck::bytes_of(shared))
    }

    pub fn mat4(&mut self, value: Mat4) -> &mut Self {
        self.bytes(bytemuck::bytes_of(&value))
    }

    pub fn vec4(&mut self, value: Vec4) -> &mut Self {
        self.bytes(bytemuck::bytes_of(&value))
    }

    pub fn vec2(&mut self, value: Vec2) -> &mut Self {
        self.bytes(bytemuck::bytes_of(&value))
    }

    pub fn float(&mut self, value: f32) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    pub fn uint(&mut self, value: u32) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    /// Zero-pads to 16 bytes and checks the result against the declared size.
    pub fn finish(mut self, pass: &'static str, expected: u32) -> Result<u32> {
        let padded = self.cursor.next_multiple_of(16);
        if padded <= self.buf.len() {
            self.buf[self.cursor..padded].fill(0);
        }
        self.cursor = padded;

        let actual = u32::try_from(self.cursor).unwrap_or(u32::MAX);
        if actual == expected {
            Ok(actual)
        } else {
            Err(DenoiseError::ConstantSizeMismatch {
                pass,
                expected,
                actual,
            })
        }
    }
}

/// Per-dispatch rotation used to decorrelate blur kernels across frames.
///
/// Returns the 2×2 rotation matrix `(cos, sin, -sin, cos)`.
#[must_use]
pub fn kernel_rotator(seed: u32) -> Vec4 {
    // Golden angle keeps consecutive rotations far apart.
    const GOLDEN_ANGLE: f32 = 2.399_963;
    let angle = (seed % 4096) as f32 * GOLDEN_ANGLE;
    let (sin, cos) = angle.sin_cos();
    Vec4::new(cos, sin, -sin, cos)
}

/// Constant staging for `region_num` frames in flight.
pub struct ConstantRing {
    data: Vec<u8>,
    region_size: u32,
    region_num: u32,
    region: u32,
    cursor: u32,
    frame_num: u64,
}

impl ConstantRing {
    /// `region_size` must already be the sum of the aligned sizes of every
    /// dispatch one frame can produce.
    #[must_use]
    pub fn new(region_size: u32, region_num: u32) -> Self {
        let region_size = region_size.next_multiple_of(CONSTANT_BUFFER_OFFSET_ALIGNMENT);
        Self {
            data: vec![0; (region_size as usize) * (region_num as usize)],
            region_size,
            region_num: region_num.max(1),
            region: 0,
            cursor: 0,
            frame_num: 0,
        }
    }

    /// Selects the region for the next frame.
    pub fn begin_frame(&mut self) {
        self.region = (self.frame_num % u64::from(self.region_num)) as u32;
        self.cursor = 0;
        self.frame_num += 1;
    }

    /// Reserves `size` bytes in the current region.
    ///
    /// Returns the absolute byte offset and the writable slice.
    pub fn allocate(&mut self, size: u32) -> Result<(u32, &mut [u8])> {
        let aligned = self.cursor.next_multiple_of(CONSTANT_BUFFER_OFFSET_ALIGNMENT);
        if aligned + size > self.region_size {
            return Err(DenoiseError::Failure(format!(
                "constant ring region overflow: {} + {size} > {}",
                aligned, self.region_size
            )));
        }
        self.cursor = aligned + size;

        let offset = self.region * self.region_size + aligned;
        let start = offset as usize;
        Ok((offset, &mut self.data[start..start + size as usize]))
    }

    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_header_is_row_aligned() {
        assert!(std::mem::size_of::<SharedConstants>().is_multiple_of(16));
        assert_eq!(ConstantLayout::shared().size(), 400);
    }

    #[test]
    fn writer_reports_short_blob() {
        let mut buf = [0u8; 32];
        let mut writer = ConstantWriter::new(&mut buf);
        writer.float(1.0);
        let err = writer.finish("test", 32).unwrap_err();
        assert_eq!(
            err,
            DenoiseError::ConstantSizeMismatch {
                pass: "test",
                expected: 32,
                actual: 16
            }
        );
    }

    #[test]
    fn writer_survives_overflow() {
        let mut buf = [0u8; 16];
        let mut writer = ConstantWriter::new(&mut buf);
        writer.vec4(Vec4::ONE).vec4(Vec4::ONE);
        assert!(writer.finish("overflow", 16).is_err());
    }

    #[test]
    fn ring_regions_rotate() {
        let mut ring = ConstantRing::new(512, 2);
        ring.begin_frame();
        let (first, _) = ring.allocate(64).unwrap();
        let (second, _) = ring.allocate(64).unwrap();
        assert_eq!(first, 0);
        assert_eq!(second, 256);

        ring.begin_frame();
        let (next, _) = ring.allocate(64).unwrap();
        assert_eq!(next, 512);

        ring.begin_frame();
        let (wrapped, _) = ring.allocate(64).unwrap();
        assert_eq!(wrapped, 0);
    }
}
