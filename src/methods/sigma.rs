//! SIGMA: shadow and shadow-translucency denoising.
//!
//! ```text
//! PRE_BLUR ──► data, temp1, history ──► BLUR ──► temp2 ──► TEMPORAL_STABILIZATION ──► OUT
//!    ▲                                                                               │
//!    └──────────────────────── previous OUT (history) ◄──────────────────────────────┘
//! ```
//!
//! No permanent textures: the user output itself is read back as history.

use glam::Vec4;

use super::{MethodCompiler, PackContext};
use crate::core::{Format, Method, ResourceType};
use crate::errors::Result;
use crate::graph::{ConstantLayout, ConstantWriter, MethodBuilder, kernel_rotator};
use crate::pipeline::{NumThreads, ShaderDesc};
use crate::settings::{MethodSettings, SigmaSettings};

pub const PRE_BLUR: u16 = 0;
pub const BLUR: u16 = 1;
pub const TEMPORAL_STABILIZATION: u16 = 2;

const PRE_BLUR_CONSTANTS: ConstantLayout = ConstantLayout::shared().vec4().float();
const BLUR_CONSTANTS: ConstantLayout = ConstantLayout::shared().vec4().vec4().float();
const STABILIZATION_CONSTANTS: ConstantLayout = ConstantLayout::shared().float();

struct Shaders {
    pre_blur: &'static str,
    blur: &'static str,
    stabilization: &'static str,
}

const SHADOW: Shaders = Shaders {
    pre_blur: "SIGMA_Shadow_PreBlur",
    blur: "SIGMA_Shadow_Blur",
    stabilization: "SIGMA_Shadow_TemporalStabilization",
};

const SHADOW_TRANSLUCENCY: Shaders = Shaders {
    pre_blur: "SIGMA_ShadowTranslucency_PreBlur",
    blur: "SIGMA_ShadowTranslucency_Blur",
    stabilization: "SIGMA_ShadowTranslucency_TemporalStabilization",
};

pub struct Sigma;

impl MethodCompiler for Sigma {
    fn compile(&self, ctx: &mut MethodBuilder<'_>) -> Result<()> {
        let translucency = ctx.method() == Method::SigmaShadowTranslucency;
        let (shaders, payload) = if translucency {
            (&SHADOW_TRANSLUCENCY, Format::Rgba8Unorm)
        } else {
            (&SHADOW, Format::R8Unorm)
        };

        let data = ctx.transient(Format::Rg16Sfloat, 1)?;
        let temp1 = ctx.transient(payload, 1)?;
        let temp2 = ctx.transient(payload, 1)?;
        let history = ctx.transient(payload, 1)?;

        let mut pre_blur = ctx
            .begin_pass(
                "SIGMA::PreBlur",
                PRE_BLUR,
                ShaderDesc::new(shaders.pre_blur),
                NumThreads::TILE_16X16,
            )
            .inputs(&[
                ResourceType::InNormalRoughness,
                ResourceType::InViewZ,
                ResourceType::InShadowData,
            ]);
        if translucency {
            pre_blur = pre_blur.input(ResourceType::InShadowTranslucency);
        }
        let pre_blur = pre_blur
            .input(ResourceType::OutShadowTranslucency)
            .output_transient(data)
            .output_transient(temp1)
            .output_transient(history)
            .constants(PRE_BLUR_CONSTANTS);
        ctx.add_pass(pre_blur)?;

        let blur = ctx
            .begin_pass(
                "SIGMA::Blur",
                BLUR,
                ShaderDesc::new(shaders.blur),
                NumThreads::TILE_16X16,
            )
            .input(ResourceType::InNormalRoughness)
            .input_transient(data)
            .input_transient(temp1)
            .output_transient(temp2)
            .constants(BLUR_CONSTANTS);
        ctx.add_pass(blur)?;

        let stabilization = ctx
            .begin_pass(
                "SIGMA::TemporalStabilization",
                TEMPORAL_STABILIZATION,
                ShaderDesc::new(shaders.stabilization),
                NumThreads::TILE_16X16,
            )
            .inputs(&[ResourceType::InNormalRoughness, ResourceType::InMv])
            .input_transient(temp2)
            .input_transient(history)
            .output(ResourceType::OutShadowTranslucency)
            .constants(STABILIZATION_CONSTANTS);
        ctx.add_pass(stabilization)?;

        ctx.add_clear_pass(&[ResourceType::OutShadowTranslucency])
    }

    fn pack_constants(&self, stage: u16, ctx: &PackContext<'_>, writer: &mut ConstantWriter<'_>) {
        let settings = match ctx.settings {
            MethodSettings::Sigma(s) => *s,
            _ => SigmaSettings::default(),
        };

        writer.shared(ctx.shared);
        match stage {
            PRE_BLUR => {
                writer
                    .vec4(kernel_rotator(ctx.frame_num))
                    .float(settings.blur_radius_scale);
            }
            BLUR => {
                let [x, y, z] = settings.light_direction;
                writer
                    .vec4(kernel_rotator(ctx.frame_num.wrapping_add(1)))
                    .vec4(Vec4::new(x, y, z, 0.0))
                    .float(settings.blur_radius_scale);
            }
            TEMPORAL_STABILIZATION => {
                writer.float(settings.stabilization_strength);
            }
            _ => {}
        }
    }
}
