//! SPECULAR_REFLECTION_MV: motion vectors for specular reflections.
//!
//! Stateless apart from the previous camera matrices carried in the shared
//! header, so no pooled textures and no clear pass.

use super::{MethodCompiler, PackContext};
use crate::core::ResourceType;
use crate::errors::Result;
use crate::graph::{ConstantLayout, ConstantWriter, MethodBuilder};
use crate::pipeline::{NumThreads, ShaderDesc};

pub const COMPUTE: u16 = 0;

pub struct SpecularReflectionMv;

impl MethodCompiler for SpecularReflectionMv {
    fn compile(&self, ctx: &mut MethodBuilder<'_>) -> Result<()> {
        let pass = ctx
            .begin_pass(
                "SPECULAR_REFLECTION_MV::Compute",
                COMPUTE,
                ShaderDesc::new("SpecularReflectionMv_Compute"),
                NumThreads::TILE_16X16,
            )
            .inputs(&[
                ResourceType::InNormalRoughness,
                ResourceType::InViewZ,
                ResourceType::InSpecRadianceHitDist,
            ])
            .output(ResourceType::OutReflectionMv)
            .constants(ConstantLayout::shared());
        ctx.add_pass(pass)
    }

    fn pack_constants(&self, _stage: u16, ctx: &PackContext<'_>, writer: &mut ConstantWriter<'_>) {
        writer.shared(ctx.shared);
    }
}
