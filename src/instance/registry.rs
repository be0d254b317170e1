//! Instance Registry
//!
//! Owns the compiled state of every registered method, keyed by
//! [`Identifier`] and kept in registration order.
//!
//! # Temporal state machine
//!
//! Each entry carries a [`TemporalState`]. Every frame that dispatches the
//! method runs [`TemporalState::begin_frame`] → passes → [`TemporalState::end_frame`]:
//!
//! | Event | `history_length` | previous matrices |
//! |-------|------------------|-------------------|
//! | first frame | 0 | = current |
//! | `Restart` / `ClearAndRestart` | 0 | = current |
//! | `Continue` | +1 (saturating) | last frame's |
//!
//! A reset requested through [`Instance::reset_history`](crate::Instance::reset_history)
//! is held in `pending_reset` and consumed by the next frame.
//!
//! A frame is keyed by `CommonSettings::frame_index`. Dispatching the same
//! index again replays that frame from the state it started with, so
//! parity, counters and previous matrices do not advance twice.

use glam::Mat4;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::core::{Identifier, Method, ResourceType};
use crate::errors::{DenoiseError, Result};
use crate::graph::Pass;
use crate::settings::{AccumulationMode, CommonSettings, MethodSettings};

/// Cross-frame state of one method.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemporalState {
    /// Frames dispatched so far.
    pub frame_num: u32,
    /// Frames accumulated since the last reset, uncapped.
    pub history_length: u32,
    pub prev_world_to_view: Mat4,
    pub prev_view_to_clip: Mat4,
    /// Reset requested for the next frame.
    pub pending_reset: AccumulationMode,
}

impl Default for TemporalState {
    fn default() -> Self {
        Self {
            frame_num: 0,
            history_length: 0,
            prev_world_to_view: Mat4::IDENTITY,
            prev_view_to_clip: Mat4::IDENTITY,
            pending_reset: AccumulationMode::Continue,
        }
    }
}

impl TemporalState {
    /// Whether the current frame binds the odd half of ping-pong pairs.
    #[inline]
    #[must_use]
    pub fn odd(&self) -> bool {
        self.frame_num & 1 == 1
    }

    /// Resolves the accumulation mode of the frame about to be dispatched
    /// and updates the history counter.
    pub fn begin_frame(&mut self, common: &CommonSettings) -> AccumulationMode {
        let mode = common
            .accumulation_mode
            .max(std::mem::take(&mut self.pending_reset));

        if self.frame_num == 0 || mode.resets_history() {
            self.history_length = 0;
            self.prev_world_to_view = common.world_to_view;
            self.prev_view_to_clip = common.view_to_clip;
        } else {
            self.history_length = self.history_length.saturating_add(1);
        }
        mode
    }

    /// Commits the frame: advances the parity and stores this frame's
    /// matrices as "previous".
    pub fn end_frame(&mut self, common: &CommonSettings) {
        self.frame_num = self.frame_num.wrapping_add(1);
        self.prev_world_to_view = common.world_to_view;
        self.prev_view_to_clip = common.view_to_clip;
    }
}

/// Compiled state of one registered method.
#[derive(Debug, Clone)]
pub struct MethodEntry {
    pub identifier: Identifier,
    pub method: Method,
    pub width: u16,
    pub height: u16,
    /// Passes with global pool slots.
    pub passes: Vec<Pass>,
    pub clear_pass: Option<Pass>,
    /// External roles referenced by any pass, sorted and unique.
    pub required: SmallVec<[ResourceType; 8]>,
    pub settings: MethodSettings,
    pub state: TemporalState,
    /// `frame_index` of the last dispatched frame and the state it began from.
    pub last_frame: Option<(u32, TemporalState)>,
}

impl MethodEntry {
    pub(crate) fn new(
        identifier: Identifier,
        method: Method,
        (width, height): (u16, u16),
        passes: Vec<Pass>,
        clear_pass: Option<Pass>,
    ) -> Self {
        let mut required: SmallVec<[ResourceType; 8]> = passes
            .iter()
            .chain(&clear_pass)
            .flat_map(|p| p.resources.iter().map(|r| r.ty))
            .filter(|ty| !ty.is_pool())
            .collect();
        required.sort_unstable();
        required.dedup();

        Self {
            identifier,
            method,
            width,
            height,
            passes,
            clear_pass,
            required,
            settings: MethodSettings::default_for(method),
            state: TemporalState::default(),
            last_frame: None,
        }
    }

    /// State the frame `frame_index` starts from.
    ///
    /// Repeating the last dispatched index yields the state that frame began
    /// with; resets requested since then still apply.
    #[must_use]
    pub fn frame_state(&self, frame_index: u32) -> TemporalState {
        match self.last_frame {
            Some((index, start)) if index == frame_index => TemporalState {
                pending_reset: start.pending_reset.max(self.state.pending_reset),
                ..start
            },
            _ => self.state,
        }
    }

    /// Stores the outcome of frame `frame_index` that began from `start`.
    pub fn commit_frame(&mut self, frame_index: u32, start: TemporalState, state: TemporalState) {
        self.last_frame = Some((frame_index, start));
        self.state = state;
    }

    /// History length as packed into constants: capped by the settings.
    #[must_use]
    pub fn packed_history_length(&self) -> u32 {
        self.state
            .history_length
            .min(self.settings.max_history_length())
    }
}

/// Registered methods in registration order with O(1) lookup.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<MethodEntry>,
    lookup: FxHashMap<Identifier, usize>,
}

impl Registry {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            lookup: FxHashMap::default(),
        }
    }

    pub fn insert(&mut self, entry: MethodEntry) -> Result<()> {
        if self.lookup.contains_key(&entry.identifier) {
            return Err(DenoiseError::NonUniqueIdentifier(entry.identifier));
        }
        self.lookup.insert(entry.identifier, self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn index_of(&self, identifier: Identifier) -> Option<usize> {
        self.lookup.get(&identifier).copied()
    }

    #[must_use]
    pub fn get(&self, identifier: Identifier) -> Option<&MethodEntry> {
        self.index_of(identifier).map(|i| &self.entries[i])
    }

    pub fn get_mut(&mut self, identifier: Identifier) -> Option<&mut MethodEntry> {
        self.index_of(identifier).map(|i| &mut self.entries[i])
    }

    /// Like [`get_mut`](Self::get_mut) but reports unknown identifiers.
    pub fn expect_mut(&mut self, identifier: Identifier) -> Result<&mut MethodEntry> {
        self.get_mut(identifier).ok_or_else(|| {
            DenoiseError::InvalidArgument(format!("unknown identifier {identifier:?}"))
        })
    }

    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[MethodEntry] {
        &self.entries
    }

    #[inline]
    pub fn entries_mut(&mut self) -> &mut [MethodEntry] {
        &mut self.entries
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
