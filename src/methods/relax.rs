//! RELAX: reprojection plus à-trous filtering for diffuse and/or specular
//! radiance.
//!
//! ```text
//! PREPASS → TEMPORAL_ACCUMULATION → HISTORY_FIX → HISTORY_CLAMPING
//!         → ATROUS_SMEM → ATROUS × 4 → COPY_GUIDES
//! ```
//!
//! The four à-trous iterations ping-pong between the two transient textures
//! of each signal; the last iteration writes the user output.

use glam::{Vec2, Vec4};
use smallvec::SmallVec;

use super::{MethodCompiler, PackContext, Signals};
use crate::core::{Format, Method, ResourceType};
use crate::errors::Result;
use crate::graph::{
    ConstantLayout, ConstantWriter, MethodBuilder, PingPong, TransientTexture, kernel_rotator,
};
use crate::pipeline::{NumThreads, ShaderDesc};
use crate::settings::{MethodSettings, RelaxSettings};

pub const PREPASS: u16 = 0;
pub const TEMPORAL_ACCUMULATION: u16 = 1;
pub const HISTORY_FIX: u16 = 2;
pub const HISTORY_CLAMPING: u16 = 3;
pub const ATROUS_SMEM: u16 = 4;
/// First of the regular à-trous stages; iteration `i` uses `ATROUS + i`.
pub const ATROUS: u16 = 5;
pub const COPY_GUIDES: u16 = 9;

pub const ATROUS_ITERATION_NUM: u16 = 4;

const ATROUS_NAMES: [&str; ATROUS_ITERATION_NUM as usize] = [
    "RELAX::Atrous(1)",
    "RELAX::Atrous(2)",
    "RELAX::Atrous(3)",
    "RELAX::Atrous(4)",
];

const PREPASS_CONSTANTS: ConstantLayout = ConstantLayout::shared().vec4().float().float();
const TEMPORAL_ACCUMULATION_CONSTANTS: ConstantLayout = ConstantLayout::shared().vec4().float();
const HISTORY_FIX_CONSTANTS: ConstantLayout = ConstantLayout::shared().float();
const HISTORY_CLAMPING_CONSTANTS: ConstantLayout = ConstantLayout::shared().float();
const ATROUS_CONSTANTS: ConstantLayout = ConstantLayout::shared().vec2().float().uint();
const COPY_GUIDES_CONSTANTS: ConstantLayout = ConstantLayout::shared();

struct Shaders {
    prepass: &'static str,
    temporal_accumulation: &'static str,
    history_fix: &'static str,
    history_clamping: &'static str,
    atrous_smem: &'static str,
    atrous: &'static str,
}

const DIFFUSE: Shaders = Shaders {
    prepass: "RELAX_Diffuse_PrePass",
    temporal_accumulation: "RELAX_Diffuse_TemporalAccumulation",
    history_fix: "RELAX_Diffuse_HistoryFix",
    history_clamping: "RELAX_Diffuse_HistoryClamping",
    atrous_smem: "RELAX_Diffuse_AtrousSmem",
    atrous: "RELAX_Diffuse_Atrous",
};

const SPECULAR: Shaders = Shaders {
    prepass: "RELAX_Specular_PrePass",
    temporal_accumulation: "RELAX_Specular_TemporalAccumulation",
    history_fix: "RELAX_Specular_HistoryFix",
    history_clamping: "RELAX_Specular_HistoryClamping",
    atrous_smem: "RELAX_Specular_AtrousSmem",
    atrous: "RELAX_Specular_Atrous",
};

const DIFFUSE_SPECULAR: Shaders = Shaders {
    prepass: "RELAX_DiffuseSpecular_PrePass",
    temporal_accumulation: "RELAX_DiffuseSpecular_TemporalAccumulation",
    history_fix: "RELAX_DiffuseSpecular_HistoryFix",
    history_clamping: "RELAX_DiffuseSpecular_HistoryClamping",
    atrous_smem: "RELAX_DiffuseSpecular_AtrousSmem",
    atrous: "RELAX_DiffuseSpecular_Atrous",
};

const COPY_GUIDES_SHADER: &str = "RELAX_CopyGuides";

const GUIDES: [ResourceType; 2] = [ResourceType::InNormalRoughness, ResourceType::InViewZ];

#[derive(Clone, Copy)]
struct Signal {
    input: ResourceType,
    output: ResourceType,
    history: PingPong,
    responsive: PingPong,
    tmp1: TransientTexture,
    tmp2: TransientTexture,
}

pub struct Relax;

impl Relax {
    fn shaders(method: Method) -> &'static Shaders {
        match method {
            Method::RelaxSpecular => &SPECULAR,
            Method::RelaxDiffuseSpecular => &DIFFUSE_SPECULAR,
            _ => &DIFFUSE,
        }
    }
}

impl MethodCompiler for Relax {
    fn compile(&self, ctx: &mut MethodBuilder<'_>) -> Result<()> {
        let method = ctx.method();
        let shaders = Self::shaders(method);
        let signal_set = Signals::of(method);

        // ── Permanent ─────────────────────────────────────────────────────
        let mut pairs = SmallVec::<[(ResourceType, ResourceType, PingPong, PingPong); 2]>::new();
        for (flag, input, output) in [
            (
                Signals::DIFFUSE,
                ResourceType::InDiffRadianceHitDist,
                ResourceType::OutDiffRadianceHitDist,
            ),
            (
                Signals::SPECULAR,
                ResourceType::InSpecRadianceHitDist,
                ResourceType::OutSpecRadianceHitDist,
            ),
        ] {
            if signal_set.contains(flag) {
                let history = ctx.ping_pong(Format::Rgba16Sfloat)?;
                let responsive = ctx.ping_pong(Format::Rgba16Sfloat)?;
                pairs.push((input, output, history, responsive));
            }
        }
        let history_length = ctx.ping_pong(Format::R8Unorm)?;
        let prev_normal_roughness = ctx.permanent(Format::Rgba8Unorm)?;
        let prev_view_z = ctx.permanent(Format::R32Sfloat)?;

        // ── Transient ─────────────────────────────────────────────────────
        let mut signals = SmallVec::<[Signal; 2]>::new();
        for (input, output, history, responsive) in pairs {
            signals.push(Signal {
                input,
                output,
                history,
                responsive,
                tmp1: ctx.transient(Format::Rgba16Sfloat, 1)?,
                tmp2: ctx.transient(Format::Rgba16Sfloat, 1)?,
            });
        }

        // ── Passes ────────────────────────────────────────────────────────
        let mut pass = ctx
            .begin_pass(
                "RELAX::PrePass",
                PREPASS,
                ShaderDesc::new(shaders.prepass),
                NumThreads::TILE_8X8,
            )
            .inputs(&GUIDES)
            .constants(PREPASS_CONSTANTS);
        for s in &signals {
            pass = pass.input(s.input);
        }
        for s in &signals {
            pass = pass.output_transient(s.tmp1);
        }
        ctx.add_pass(pass)?;

        let mut pass = ctx
            .begin_pass(
                "RELAX::TemporalAccumulation",
                TEMPORAL_ACCUMULATION,
                ShaderDesc::new(shaders.temporal_accumulation),
                NumThreads::TILE_8X8,
            )
            .inputs(&GUIDES)
            .input(ResourceType::InMv)
            .input_permanent(prev_normal_roughness)
            .input_permanent(prev_view_z)
            .input_history(history_length)
            .constants(TEMPORAL_ACCUMULATION_CONSTANTS);
        for s in &signals {
            pass = pass
                .input_transient(s.tmp1)
                .input_history(s.history)
                .input_history(s.responsive);
        }
        for s in &signals {
            pass = pass.output_current(s.history).output_current(s.responsive);
        }
        ctx.add_pass(pass.output_current(history_length))?;

        let mut pass = ctx
            .begin_pass(
                "RELAX::HistoryFix",
                HISTORY_FIX,
                ShaderDesc::new(shaders.history_fix),
                NumThreads::TILE_8X8,
            )
            .inputs(&GUIDES)
            .input_current(history_length)
            .constants(HISTORY_FIX_CONSTANTS);
        for s in &signals {
            pass = pass.input_current(s.history);
        }
        for s in &signals {
            pass = pass.output_transient(s.tmp2);
        }
        ctx.add_pass(pass)?;

        let mut pass = ctx
            .begin_pass(
                "RELAX::HistoryClamping",
                HISTORY_CLAMPING,
                ShaderDesc::new(shaders.history_clamping),
                NumThreads::TILE_16X16,
            )
            .input_current(history_length)
            .constants(HISTORY_CLAMPING_CONSTANTS);
        for s in &signals {
            pass = pass.input_transient(s.tmp2).input_current(s.responsive);
        }
        for s in &signals {
            pass = pass.output_current(s.history);
        }
        ctx.add_pass(pass)?;

        let mut pass = ctx
            .begin_pass(
                "RELAX::AtrousSmem",
                ATROUS_SMEM,
                ShaderDesc::new(shaders.atrous_smem),
                NumThreads::TILE_8X8,
            )
            .inputs(&GUIDES)
            .input_current(history_length)
            .constants(ATROUS_CONSTANTS);
        for s in &signals {
            pass = pass.input_current(s.history);
        }
        for s in &signals {
            pass = pass.output_transient(s.tmp1);
        }
        ctx.add_pass(pass)?;

        for (i, name) in (0..ATROUS_ITERATION_NUM).zip(ATROUS_NAMES) {
            let last = i + 1 == ATROUS_ITERATION_NUM;
            let mut pass = ctx
                .begin_pass(
                    name,
                    ATROUS + i,
                    ShaderDesc::new(shaders.atrous),
                    NumThreads::TILE_8X8,
                )
                .inputs(&GUIDES)
                .input_current(history_length)
                .constants(ATROUS_CONSTANTS);
            for s in &signals {
                let (src, _) = atrous_pair(s, i);
                pass = pass.input_transient(src);
            }
            for s in &signals {
                pass = if last {
                    pass.output(s.output)
                } else {
                    pass.output_transient(atrous_pair(s, i).1)
                };
            }
            ctx.add_pass(pass)?;
        }

        let pass = ctx
            .begin_pass(
                "RELAX::CopyGuides",
                COPY_GUIDES,
                ShaderDesc::new(COPY_GUIDES_SHADER),
                NumThreads::TILE_16X16,
            )
            .inputs(&GUIDES)
            .output_permanent(prev_normal_roughness)
            .output_permanent(prev_view_z)
            .constants(COPY_GUIDES_CONSTANTS);
        ctx.add_pass(pass)?;

        ctx.add_clear_pass(&[])
    }

    fn pack_constants(&self, stage: u16, ctx: &PackContext<'_>, writer: &mut ConstantWriter<'_>) {
        let settings = match ctx.settings {
            MethodSettings::Relax(s) => *s,
            _ => RelaxSettings::default(),
        };

        writer.shared(ctx.shared);
        match stage {
            PREPASS => {
                writer
                    .vec4(kernel_rotator(ctx.frame_num))
                    .float(settings.diffuse_prepass_blur_radius)
                    .float(settings.specular_prepass_blur_radius);
            }
            TEMPORAL_ACCUMULATION => {
                writer
                    .vec4(Vec4::new(
                        settings.diffuse_max_accumulated_frame_num as f32,
                        settings.specular_max_accumulated_frame_num as f32,
                        settings.diffuse_max_fast_accumulated_frame_num as f32,
                        settings.specular_max_fast_accumulated_frame_num as f32,
                    ))
                    .float(settings.roughness_fraction);
            }
            HISTORY_FIX => {
                writer.float(settings.history_fix_frame_num as f32);
            }
            HISTORY_CLAMPING => {
                writer.float(settings.history_clamping_color_box_sigma_scale);
            }
            ATROUS_SMEM..COPY_GUIDES => {
                // Step size doubles every iteration, starting at 1 for the
                // shared-memory pass.
                let step = 1u32 << (stage - ATROUS_SMEM);
                writer
                    .vec2(Vec2::new(
                        settings.diffuse_phi_luminance,
                        settings.specular_phi_luminance,
                    ))
                    .float(settings.depth_threshold)
                    .uint(step);
            }
            _ => {}
        }
    }
}

/// `(source, destination)` of à-trous iteration `i`.
fn atrous_pair(s: &Signal, i: u16) -> (TransientTexture, TransientTexture) {
    if i.is_multiple_of(2) {
        (s.tmp1, s.tmp2)
    } else {
        (s.tmp2, s.tmp1)
    }
}
