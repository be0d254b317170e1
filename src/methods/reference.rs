//! REFERENCE: plain temporal accumulation of a noisy radiance signal, used
//! as ground truth when tuning the real denoisers.

use super::{MethodCompiler, PackContext};
use crate::core::{Format, ResourceType};
use crate::errors::Result;
use crate::graph::{ConstantLayout, ConstantWriter, MethodBuilder};
use crate::pipeline::{NumThreads, ShaderDesc};
use crate::settings::{MethodSettings, ReferenceSettings};

pub const ACCUMULATE: u16 = 0;
pub const RESOLVE: u16 = 1;

const ACCUMULATE_CONSTANTS: ConstantLayout = ConstantLayout::shared().float();
const RESOLVE_CONSTANTS: ConstantLayout = ConstantLayout::shared();

pub struct Reference;

impl MethodCompiler for Reference {
    fn compile(&self, ctx: &mut MethodBuilder<'_>) -> Result<()> {
        let accumulated = ctx.ping_pong(Format::Rgba32Sfloat)?;

        let accumulate = ctx
            .begin_pass(
                "REFERENCE::Accumulate",
                ACCUMULATE,
                ShaderDesc::new("REFERENCE_Accumulate"),
                NumThreads::TILE_16X16,
            )
            .input(ResourceType::InRadiance)
            .input_history(accumulated)
            .output_current(accumulated)
            .constants(ACCUMULATE_CONSTANTS);
        ctx.add_pass(accumulate)?;

        let resolve = ctx
            .begin_pass(
                "REFERENCE::Resolve",
                RESOLVE,
                ShaderDesc::new("REFERENCE_Resolve"),
                NumThreads::TILE_16X16,
            )
            .input_current(accumulated)
            .output(ResourceType::OutRadiance)
            .constants(RESOLVE_CONSTANTS);
        ctx.add_pass(resolve)?;

        ctx.add_clear_pass(&[])
    }

    fn pack_constants(&self, stage: u16, ctx: &PackContext<'_>, writer: &mut ConstantWriter<'_>) {
        writer.shared(ctx.shared);
        if stage == ACCUMULATE {
            let settings = match ctx.settings {
                MethodSettings::Reference(s) => *s,
                _ => ReferenceSettings::default(),
            };
            writer.float(settings.max_accumulated_frame_num as f32);
        }
    }
}
