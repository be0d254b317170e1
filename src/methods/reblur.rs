//! REBLUR: recurrent blur for diffuse and/or specular radiance.
//!
//! | Stage | Reads | Writes |
//! |-------|-------|--------|
//! | `PREPASS` | guides, noisy input | `tmp1` |
//! | `TEMPORAL_ACCUMULATION` | guides, previous guides, `tmp1`, history | `tmp2[0]`, `data1` |
//! | `MIP_GENERATION` | `tmp2[0]` | `tmp2[1..]` |
//! | `HISTORY_FIX` | guides, `data1`, `tmp2` | `tmp1` |
//! | `BLUR` | guides, `data1`, `tmp1` | `tmp2[0]` |
//! | `POST_BLUR` | guides, `data1`, `tmp2[0]` | history, output |
//! | `COPY_GUIDES` | guides, `data1` | previous guides |
//!
//! History is a ping-pong pair per signal; previous guides are rewritten in
//! place by the last pass of every frame.

use glam::{Vec2, Vec4};
use smallvec::SmallVec;

use super::{MethodCompiler, PackContext, Signals};
use crate::core::{Format, Method, ResourceType, clamp_mip_num};
use crate::errors::{DenoiseError, Result};
use crate::graph::{
    ConstantLayout, ConstantWriter, MethodBuilder, PingPong, TransientTexture, kernel_rotator,
};
use crate::pipeline::{NumThreads, ShaderDesc};
use crate::settings::{MethodSettings, ReblurSettings};

pub const PREPASS: u16 = 0;
pub const TEMPORAL_ACCUMULATION: u16 = 1;
pub const MIP_GENERATION: u16 = 2;
pub const HISTORY_FIX: u16 = 3;
pub const BLUR: u16 = 4;
pub const POST_BLUR: u16 = 5;
pub const COPY_GUIDES: u16 = 6;

/// Upper bound of the history mip chain.
pub const HISTORY_MIP_MAX: u16 = 5;

const PREPASS_CONSTANTS: ConstantLayout = ConstantLayout::shared().vec4().float().float();
const TEMPORAL_ACCUMULATION_CONSTANTS: ConstantLayout = ConstantLayout::shared().vec4().vec2();
const MIP_GENERATION_CONSTANTS: ConstantLayout = ConstantLayout::shared();
const HISTORY_FIX_CONSTANTS: ConstantLayout = ConstantLayout::shared().float();
const BLUR_CONSTANTS: ConstantLayout = ConstantLayout::shared().vec4().float();
const POST_BLUR_CONSTANTS: ConstantLayout = ConstantLayout::shared().vec4().float().float().uint();
const COPY_GUIDES_CONSTANTS: ConstantLayout = ConstantLayout::shared();

struct Shaders {
    prepass: &'static str,
    temporal_accumulation: &'static str,
    mip_generation: &'static str,
    history_fix: &'static str,
    blur: &'static str,
    post_blur: &'static str,
}

const DIFFUSE: Shaders = Shaders {
    prepass: "REBLUR_Diffuse_PrePass",
    temporal_accumulation: "REBLUR_Diffuse_TemporalAccumulation",
    mip_generation: "REBLUR_Diffuse_MipGen",
    history_fix: "REBLUR_Diffuse_HistoryFix",
    blur: "REBLUR_Diffuse_Blur",
    post_blur: "REBLUR_Diffuse_PostBlur",
};

const SPECULAR: Shaders = Shaders {
    prepass: "REBLUR_Specular_PrePass",
    temporal_accumulation: "REBLUR_Specular_TemporalAccumulation",
    mip_generation: "REBLUR_Specular_MipGen",
    history_fix: "REBLUR_Specular_HistoryFix",
    blur: "REBLUR_Specular_Blur",
    post_blur: "REBLUR_Specular_PostBlur",
};

const DIFFUSE_SPECULAR: Shaders = Shaders {
    prepass: "REBLUR_DiffuseSpecular_PrePass",
    temporal_accumulation: "REBLUR_DiffuseSpecular_TemporalAccumulation",
    mip_generation: "REBLUR_DiffuseSpecular_MipGen",
    history_fix: "REBLUR_DiffuseSpecular_HistoryFix",
    blur: "REBLUR_DiffuseSpecular_Blur",
    post_blur: "REBLUR_DiffuseSpecular_PostBlur",
};

const COPY_GUIDES_SHADER: &str = "REBLUR_CopyGuides";

const GUIDES: [ResourceType; 2] = [ResourceType::InNormalRoughness, ResourceType::InViewZ];

/// Textures owned by one radiance signal.
#[derive(Clone, Copy)]
struct Signal {
    input: ResourceType,
    output: ResourceType,
    history: PingPong,
    tmp1: TransientTexture,
    tmp2: TransientTexture,
}

pub struct Reblur;

impl Reblur {
    fn shaders(method: Method) -> &'static Shaders {
        match method {
            Method::ReblurSpecular => &SPECULAR,
            Method::ReblurDiffuseSpecular => &DIFFUSE_SPECULAR,
            _ => &DIFFUSE,
        }
    }
}

impl MethodCompiler for Reblur {
    fn compile(&self, ctx: &mut MethodBuilder<'_>) -> Result<()> {
        let method = ctx.method();
        let (width, height) = ctx.resolution();
        let shaders = Self::shaders(method);

        let mip_num = clamp_mip_num(width, height, HISTORY_MIP_MAX);
        if mip_num < 2 {
            return Err(DenoiseError::InvalidArgument(format!(
                "{} needs at least a 2x2 resolution, got {width}x{height}",
                method.name()
            )));
        }

        // ── Permanent ─────────────────────────────────────────────────────
        let mut histories = SmallVec::<[(ResourceType, ResourceType, PingPong); 2]>::new();
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
            if Signals::of(method).contains(flag) {
                histories.push((input, output, ctx.ping_pong(Format::Rgba16Sfloat)?));
            }
        }
        let prev_view_z = ctx.permanent(Format::R32Sfloat)?;
        let prev_normal_roughness = ctx.permanent(Format::Rgba8Unorm)?;
        let prev_internal = ctx.permanent(Format::R16Uint)?;

        // ── Transient ─────────────────────────────────────────────────────
        let data1 = ctx.transient(Format::R8Unorm, 1)?;
        let mut signals = SmallVec::<[Signal; 2]>::new();
        for (input, output, history) in histories {
            signals.push(Signal {
                input,
                output,
                history,
                tmp1: ctx.transient(Format::Rgba16Sfloat, 1)?,
                tmp2: ctx.transient(Format::Rgba16Sfloat, mip_num)?,
            });
        }

        // ── Passes ────────────────────────────────────────────────────────
        let mut pass = ctx
            .begin_pass(
                "REBLUR::PrePass",
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
                "REBLUR::TemporalAccumulation",
                TEMPORAL_ACCUMULATION,
                ShaderDesc::new(shaders.temporal_accumulation),
                NumThreads::TILE_8X8,
            )
            .inputs(&GUIDES)
            .input(ResourceType::InMv)
            .input_permanent(prev_view_z)
            .input_permanent(prev_normal_roughness)
            .input_permanent(prev_internal)
            .constants(TEMPORAL_ACCUMULATION_CONSTANTS);
        for s in &signals {
            pass = pass.input_transient(s.tmp1).input_history(s.history);
        }
        for s in &signals {
            pass = pass.output_transient_mips(s.tmp2, 0, 1);
        }
        ctx.add_pass(pass.output_transient(data1))?;

        let mut pass = ctx
            .begin_pass(
                "REBLUR::MipGeneration",
                MIP_GENERATION,
                ShaderDesc::new(shaders.mip_generation),
                NumThreads::TILE_16X16,
            )
            .constants(MIP_GENERATION_CONSTANTS);
        for s in &signals {
            pass = pass.input_transient_mips(s.tmp2, 0, 1);
        }
        for s in &signals {
            pass = pass.output_transient_mips(s.tmp2, 1, mip_num - 1);
        }
        ctx.add_pass(pass)?;

        let mut pass = ctx
            .begin_pass(
                "REBLUR::HistoryFix",
                HISTORY_FIX,
                ShaderDesc::new(shaders.history_fix),
                NumThreads::TILE_8X8,
            )
            .inputs(&GUIDES)
            .input_transient(data1)
            .constants(HISTORY_FIX_CONSTANTS);
        for s in &signals {
            pass = pass.input_transient(s.tmp2);
        }
        for s in &signals {
            pass = pass.output_transient(s.tmp1);
        }
        ctx.add_pass(pass)?;

        let mut pass = ctx
            .begin_pass(
                "REBLUR::Blur",
                BLUR,
                ShaderDesc::new(shaders.blur),
                NumThreads::TILE_8X8,
            )
            .inputs(&GUIDES)
            .input_transient(data1)
            .constants(BLUR_CONSTANTS);
        for s in &signals {
            pass = pass.input_transient(s.tmp1);
        }
        for s in &signals {
            pass = pass.output_transient_mips(s.tmp2, 0, 1);
        }
        ctx.add_pass(pass)?;

        let mut pass = ctx
            .begin_pass(
                "REBLUR::PostBlur",
                POST_BLUR,
                ShaderDesc::new(shaders.post_blur),
                NumThreads::TILE_8X8,
            )
            .inputs(&GUIDES)
            .input_transient(data1)
            .constants(POST_BLUR_CONSTANTS);
        for s in &signals {
            pass = pass.input_transient_mips(s.tmp2, 0, 1);
        }
        for s in &signals {
            pass = pass.output_current(s.history).output(s.output);
        }
        ctx.add_pass(pass)?;

        let pass = ctx
            .begin_pass(
                "REBLUR::CopyGuides",
                COPY_GUIDES,
                ShaderDesc::new(COPY_GUIDES_SHADER),
                NumThreads::TILE_16X16,
            )
            .inputs(&GUIDES)
            .input_transient(data1)
            .output_permanent(prev_view_z)
            .output_permanent(prev_normal_roughness)
            .output_permanent(prev_internal)
            .constants(COPY_GUIDES_CONSTANTS);
        ctx.add_pass(pass)?;

        ctx.add_clear_pass(&[])
    }

    fn pack_constants(&self, stage: u16, ctx: &PackContext<'_>, writer: &mut ConstantWriter<'_>) {
        let settings = match ctx.settings {
            MethodSettings::Reblur(s) => *s,
            _ => ReblurSettings::default(),
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
                        settings.max_accumulated_frame_num as f32,
                        settings.max_fast_accumulated_frame_num as f32,
                        settings.history_fix_frame_num as f32,
                        ctx.common.denoising_range,
                    ))
                    .vec2(Vec2::new(
                        settings.lobe_angle_fraction,
                        settings.roughness_fraction,
                    ));
            }
            HISTORY_FIX => {
                writer.float(settings.history_fix_frame_num as f32);
            }
            BLUR => {
                writer
                    .vec4(kernel_rotator(ctx.frame_num.wrapping_add(1)))
                    .float(settings.blur_radius);
            }
            POST_BLUR => {
                writer
                    .vec4(kernel_rotator(ctx.frame_num.wrapping_add(2)))
                    .float(settings.blur_radius * 2.0)
                    .float(settings.stabilization_strength)
                    .uint(u32::from(settings.enable_anti_firefly));
            }
            // MIP_GENERATION, COPY_GUIDES: shared header only.
            _ => {}
        }
    }
}
