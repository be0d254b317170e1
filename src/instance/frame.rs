//! Frame Compiler
//!
//! The per-frame hot path. Walks the compiled passes of the selected
//! methods in registration order, resolves every resource role to a
//! concrete binding, packs constants into the staging ring and emits one
//! [`DispatchDesc`] per pass.
//!
//! # Per-frame flow
//!
//! ```text
//! validate CommonSettings ─► validate external roles ─► ring.begin_frame()
//!   for each method:
//!     TemporalState::begin_frame ─► [CLEAR] ─► passes… ─► TemporalState::end_frame
//! ```
//!
//! Validation runs before any state is touched, so a rejected call leaves
//! the instance exactly as it was. Temporal state is committed only once
//! every dispatch of the frame has been assembled.
//!
//! Repeating a `frame_index` rebuilds that frame: bindings, grids and
//! constant contents match the earlier call and only the ring region moves.
//!
//! The output buffer and the ring are reused across frames; steady-state
//! frames do not allocate.

use glam::{Vec2, Vec4};
use smallvec::SmallVec;

use super::registry::{MethodEntry, Registry, TemporalState};
use crate::core::{DescriptorType, ExternalTexture, Identifier, ResourceType, UserPool};
use crate::errors::{DenoiseError, Result};
use crate::graph::pass::PASS_RESOURCE_INLINE;
use crate::graph::{ConstantRing, ConstantWriter, Pass, SharedConstants};
use crate::methods::{self, MethodCompiler, PackContext};
use crate::settings::{AccumulationMode, CommonSettings};

// ─── Output Types ─────────────────────────────────────────────────────────────

/// Concrete texture a pass role resolves to on this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceBinding {
    /// Slot in `InstanceDesc::permanent_pool`.
    Permanent(u16),
    /// Slot in `InstanceDesc::transient_pool`.
    Transient(u16),
    /// Host texture supplied through the [`UserPool`].
    External {
        ty: ResourceType,
        texture: ExternalTexture,
    },
}

/// One bound resource of a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedResource {
    pub binding: ResourceBinding,
    pub descriptor_type: DescriptorType,
    pub mip_offset: u16,
    pub mip_num: u16,
}

/// A submission-ready compute dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchDesc {
    pub name: &'static str,
    pub identifier: Identifier,
    pub pipeline_index: u16,
    /// Sampled textures first, storage textures second, matching the
    /// pipeline's descriptor ranges.
    pub resources: SmallVec<[ResolvedResource; PASS_RESOURCE_INLINE]>,
    /// Byte offset into [`FrameDispatches::constant_data`].
    pub constant_buffer_offset: u32,
    /// Zero when the pipeline has no constant data.
    pub constant_buffer_size: u32,
    pub grid_width: u16,
    pub grid_height: u16,
}

/// Dispatches of one frame, borrowed from the instance until the next call.
#[derive(Debug, Clone, Copy)]
pub struct FrameDispatches<'a> {
    pub dispatches: &'a [DispatchDesc],
    /// The whole constant staging ring (every buffered frame).
    pub constant_data: &'a [u8],
}

impl<'a> FrameDispatches<'a> {
    /// Constant bytes of `dispatch`.
    #[must_use]
    pub fn constants(&self, dispatch: &DispatchDesc) -> &'a [u8] {
        let start = dispatch.constant_buffer_offset as usize;
        let end = start + dispatch.constant_buffer_size as usize;
        self.constant_data.get(start..end).unwrap_or(&[])
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.dispatches.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dispatches.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'a, DispatchDesc> {
        self.dispatches.iter()
    }
}

impl<'a> IntoIterator for FrameDispatches<'a> {
    type Item = &'a DispatchDesc;
    type IntoIter = std::slice::Iter<'a, DispatchDesc>;

    fn into_iter(self) -> Self::IntoIter {
        self.dispatches.iter()
    }
}

impl<'a> IntoIterator for &FrameDispatches<'a> {
    type Item = &'a DispatchDesc;
    type IntoIter = std::slice::Iter<'a, DispatchDesc>;

    fn into_iter(self) -> Self::IntoIter {
        self.dispatches.iter()
    }
}

// ─── Frame Compiler ───────────────────────────────────────────────────────────

/// Reusable per-instance dispatch assembler.
pub struct FrameCompiler {
    dispatches: Vec<DispatchDesc>,
    ring: ConstantRing,
}

impl FrameCompiler {
    #[must_use]
    pub fn new(dispatch_capacity: usize, ring: ConstantRing) -> Self {
        Self {
            dispatches: Vec::with_capacity(dispatch_capacity),
            ring,
        }
    }

    /// Assembles the dispatches of the methods at `selection` (registry
    /// indices in registration order).
    pub fn compile(
        &mut self,
        registry: &mut Registry,
        selection: &[usize],
        common: &CommonSettings,
        user_pool: &UserPool,
    ) -> Result<FrameDispatches<'_>> {
        common.validate()?;

        let entries = registry.entries_mut();
        for &index in selection {
            let entry = &entries[index];
            if let Some(&missing) = entry.required.iter().find(|ty| user_pool.get(**ty).is_none()) {
                return Err(DenoiseError::MissingResource {
                    identifier: entry.identifier,
                    resource: missing,
                });
            }
        }

        self.dispatches.clear();
        self.ring.begin_frame();

        let mut committed = SmallVec::<[(usize, TemporalState, TemporalState); 8]>::new();
        for &index in selection {
            let entry = &entries[index];
            let start = entry.frame_state(common.frame_index);
            let mut state = start;
            let mode = state.begin_frame(common);

            let rect = rect_size(entry, common);
            let shared = shared_constants(entry, &state, mode, common, rect);
            let ctx = PackContext {
                settings: &entry.settings,
                common,
                shared: &shared,
                frame_num: state.frame_num,
            };
            let compiler = methods::compiler_for(entry.method);
            let mut emitter = Emitter {
                ring: &mut self.ring,
                dispatches: &mut self.dispatches,
                entry,
                user_pool,
                odd: state.odd(),
                rect,
            };

            if mode == AccumulationMode::ClearAndRestart
                && let Some(clear) = &entry.clear_pass
            {
                emitter.emit(clear, compiler, &ctx)?;
            }
            for pass in &entry.passes {
                emitter.emit(pass, compiler, &ctx)?;
            }

            state.end_frame(common);
            committed.push((index, start, state));
        }

        for (index, start, state) in committed {
            entries[index].commit_frame(common.frame_index, start, state);
        }

        log::trace!(
            "Assembled {} dispatches for {} methods",
            self.dispatches.len(),
            selection.len()
        );

        Ok(FrameDispatches {
            dispatches: &self.dispatches,
            constant_data: self.ring.data(),
        })
    }
}

/// Rendered sub-rectangle: `max(1, round(size * resolution_scale))`.
fn rect_size(entry: &MethodEntry, common: &CommonSettings) -> (u16, u16) {
    let scale = |size: u16, s: f32| ((f32::from(size) * s).round() as u16).clamp(1, size);
    (
        scale(entry.width, common.resolution_scale.x),
        scale(entry.height, common.resolution_scale.y),
    )
}

fn shared_constants(
    entry: &MethodEntry,
    state: &TemporalState,
    mode: AccumulationMode,
    common: &CommonSettings,
    (rect_w, rect_h): (u16, u16),
) -> SharedConstants {
    let camera_pos = common.world_to_view.inverse().w_axis;
    let prev_camera_pos = state.prev_world_to_view.inverse().w_axis;
    let camera_delta = (camera_pos - prev_camera_pos).truncate().extend(0.0);

    let mut flags = 0;
    if common.is_motion_vector_in_world_space {
        flags |= SharedConstants::FLAG_MV_IN_WORLD_SPACE;
    }
    if state.history_length == 0 || mode.resets_history() {
        flags |= SharedConstants::FLAG_HISTORY_RESET;
    }

    let rect = Vec2::new(f32::from(rect_w), f32::from(rect_h));

    SharedConstants {
        view_to_clip: common.view_to_clip,
        clip_to_view: common.view_to_clip.inverse(),
        world_to_view: common.world_to_view,
        world_to_view_prev: state.prev_world_to_view,
        view_to_clip_prev: state.prev_view_to_clip,
        camera_delta,
        jitter_and_mv_scale: Vec4::new(
            common.camera_jitter.x,
            common.camera_jitter.y,
            common.motion_vector_scale.x,
            common.motion_vector_scale.y,
        ),
        rect_size: Vec4::new(rect.x, rect.y, rect.x.recip(), rect.y.recip()),
        frame_index: common.frame_index,
        history_length: state
            .history_length
            .min(entry.settings.max_history_length()),
        checkerboard: entry.settings.checkerboard_mode().resolve(common.frame_index) as u32,
        flags,
        plane_distance_sensitivity: entry.settings.plane_distance_sensitivity(),
        denoising_range: common.denoising_range,
        resolution_scale: common.resolution_scale,
    }
}

/// Per-method dispatch emission context.
struct Emitter<'f, 'e> {
    ring: &'f mut ConstantRing,
    dispatches: &'f mut Vec<DispatchDesc>,
    entry: &'e MethodEntry,
    user_pool: &'e UserPool,
    odd: bool,
    rect: (u16, u16),
}

impl Emitter<'_, '_> {
    fn resolve(&self, pass: &Pass) -> Result<SmallVec<[ResolvedResource; PASS_RESOURCE_INLINE]>> {
        pass.resources
            .iter()
            .map(|r| -> Result<ResolvedResource> {
                let binding = match r.ty {
                    ResourceType::PermanentPool => ResourceBinding::Permanent(r.pool_index(self.odd)),
                    ResourceType::TransientPool => ResourceBinding::Transient(r.pool_index(self.odd)),
                    ty => ResourceBinding::External {
                        ty,
                        texture: self.user_pool.get(ty).ok_or(DenoiseError::MissingResource {
                            identifier: self.entry.identifier,
                            resource: ty,
                        })?,
                    },
                };
                Ok(ResolvedResource {
                    binding,
                    descriptor_type: r.descriptor_type,
                    mip_offset: r.mip_offset,
                    mip_num: r.mip_num,
                })
            })
            .collect()
    }

    fn emit(
        &mut self,
        pass: &Pass,
        compiler: &dyn MethodCompiler,
        ctx: &PackContext<'_>,
    ) -> Result<()> {
        let resources = self.resolve(pass)?;

        let (constant_buffer_offset, constant_buffer_size) = if pass.constant_size > 0 {
            let (offset, region) = self.ring.allocate(pass.constant_size)?;
            let mut writer = ConstantWriter::new(region);
            compiler.pack_constants(pass.stage, ctx, &mut writer);
            (offset, writer.finish(pass.name, pass.constant_size)?)
        } else {
            (0, 0)
        };

        let (width, height) = if pass.full_resolution {
            (self.entry.width, self.entry.height)
        } else {
            self.rect
        };
        let (grid_width, grid_height) = pass.num_threads.grid(width, height);

        self.dispatches.push(DispatchDesc {
            name: pass.name,
            identifier: self.entry.identifier,
            pipeline_index: pass.pipeline_index,
            resources,
            constant_buffer_offset,
            constant_buffer_size,
            grid_width,
            grid_height,
        });
        Ok(())
    }
}
