use std::path::Path;

use crate::config::PipelineConfig;
use crate::coords::Mat4;
use crate::error::{Error, Result};
use crate::feed::{Feed, FeedFormat, FrameInfo};
use crate::gl::TextureId;
use crate::mesh::{LensModel, Mesh, MeshVertex};
use crate::render::shader::{CAMPIPE_RGB_FS, CAMPIPE_VS, CAMPIPE_YUV_FS};
use crate::render::{DrawCall, Fbo, FboTarget, Program, RenderCtx, ShaderLibrary};

use super::{Output, OutputId};

/// Picks the correction mesh a pipeline config asks for: a displacement
/// file wins over a lens model, and with neither the mesh is the flat quad.
pub fn mesh_for_config(config: &PipelineConfig) -> Result<Mesh> {
    if let Some(path) = &config.ldc_file {
        return Mesh::from_file(path);
    }
    match &config.lens {
        Some(lens) => {
            let model = LensModel::from_config(lens, config.camera.width, config.camera.height);
            let distort = model.distortion();
            Mesh::generate(lens.mesh_points, lens.mesh_points, Some(&distort))
        }
        None => Ok(Mesh::identity()),
    }
}

/// A feed rendered through one shared correction mesh into any number of
/// outputs.
///
/// Every output is its own FBO, so a [`crate::compositor::Compositor`] can
/// use it as an ordinary texture.
pub struct Campipe {
    feed: Box<dyn Feed>,
    mesh: Mesh,
    program: Program,
    outputs: Vec<Output>,
    next_id: u32,
}

impl Campipe {
    /// Uses the mesh in `ldc_file`, or no correction without one.
    pub fn init(
        ctx: &RenderCtx<'_>,
        shaders: &ShaderLibrary,
        mut feed: Box<dyn Feed>,
        ldc_file: Option<&Path>,
    ) -> Result<Self> {
        let mesh = match ldc_file.map(Mesh::from_file).transpose() {
            Ok(mesh) => mesh.unwrap_or_else(Mesh::identity),
            Err(e) => {
                feed.terminate(ctx);
                return Err(e);
            }
        };
        Self::with_mesh(ctx, shaders, feed, mesh)
    }

    /// Takes ownership of `feed`; it is terminated if setup fails.
    pub fn with_mesh(ctx: &RenderCtx<'_>, shaders: &ShaderLibrary, mut feed: Box<dyn Feed>, mesh: Mesh) -> Result<Self> {
        let fs = match feed.format() {
            FeedFormat::Yuv420 => CAMPIPE_YUV_FS,
            FeedFormat::Rgb => CAMPIPE_RGB_FS,
        };
        let program = match shaders.program(ctx, CAMPIPE_VS, fs) {
            Ok(p) => p,
            Err(e) => {
                log::error!("couldn't build campipe shaders: {e}");
                feed.terminate(ctx);
                return Err(e);
            }
        };

        log::info!(
            "campipe: {}x{} mesh, {} vertices, {} indices",
            mesh.xpoints(),
            mesh.ypoints(),
            mesh.vertex_count(),
            mesh.index_count()
        );
        mesh.dump();

        Ok(Self { feed, mesh, program, outputs: Vec::new(), next_id: 0 })
    }

    // ── feed pass-through ─────────────────────────────────────────────────

    pub fn enable(&mut self, ctx: &RenderCtx<'_>) -> Result<()> {
        self.feed.enable(ctx)
    }

    pub fn disable(&mut self, ctx: &RenderCtx<'_>) {
        self.feed.disable(ctx);
    }

    /// Takes the next frame and renders it into every output.
    ///
    /// The feed's plane textures are bound afresh for each output draw, so
    /// outputs always sample the image imported for this frame.
    pub fn dequeue(&mut self, ctx: &RenderCtx<'_>) -> Result<FrameInfo> {
        let info = self.feed.dequeue(ctx)?;
        let planes = self.feed.planes();
        for op in &self.outputs {
            op.draw.draw(ctx, Some(planes));
        }
        Ok(info)
    }

    /// Hands the current frame back to the feed.
    pub fn queue(&mut self) -> Result<()> {
        self.feed.queue()
    }

    // ── outputs ───────────────────────────────────────────────────────────

    /// Adds a `width x height` output. With `apply_ldc` the mesh's corrected
    /// texture coordinates are sampled; without it the grid positions are.
    pub fn output_create(&mut self, ctx: &RenderCtx<'_>, width: u32, height: u32, apply_ldc: bool) -> Result<OutputId> {
        let id = OutputId(self.next_id);
        let fbo = Fbo::create(ctx, width, height)?;
        let mut draw = match DrawCall::create(ctx, &self.program) {
            Ok(d) => d,
            Err(e) => {
                fbo.destroy(ctx);
                return Err(e);
            }
        };
        if let Err(e) = self.configure(ctx, &mut draw, id, fbo.target(), apply_ldc) {
            log::error!("{id}: {e}");
            draw.destroy(ctx);
            fbo.destroy(ctx);
            return Err(e);
        }

        self.next_id += 1;
        self.outputs.push(Output { id, draw, fbo, apply_ldc });
        log::debug!("created {id} {width}x{height} (ldc {apply_ldc})");
        Ok(id)
    }

    fn configure(
        &self,
        ctx: &RenderCtx<'_>,
        draw: &mut DrawCall,
        id: OutputId,
        target: FboTarget,
        apply_ldc: bool,
    ) -> Result<()> {
        draw.set_label(id.to_string());
        draw.set_vertex_data(ctx, self.mesh.vertices());
        draw.set_indices(ctx, self.mesh.indices());
        draw.set_attribute(ctx, "position", 2, MeshVertex::STRIDE, MeshVertex::POSITION_OFFSET)?;
        draw.set_attribute(ctx, "tc", 2, MeshVertex::STRIDE, tc_offset(apply_ldc))?;
        draw.set_mvp(ctx, &Mat4::unit_to_clip())?;
        draw.set_fbo(Some(target));

        let samplers: Vec<&str> = self.feed.planes().iter().map(|p| p.sampler).collect();
        draw.set_feed_planes(ctx, &samplers)
    }

    /// Switches an output between corrected and uncorrected sampling.
    pub fn set_output_ldc(&mut self, ctx: &RenderCtx<'_>, id: OutputId, apply_ldc: bool) -> Result<()> {
        let op = self.output_mut(id)?;
        op.draw.set_attribute(ctx, "tc", 2, MeshVertex::STRIDE, tc_offset(apply_ldc))?;
        op.apply_ldc = apply_ldc;
        Ok(())
    }

    /// Colour texture of an output, for use as a layer texture.
    pub fn output_texture(&self, id: OutputId) -> Result<TextureId> {
        Ok(self.output_ref(id)?.fbo.texture())
    }

    pub fn output_fbo(&self, id: OutputId) -> Result<FboTarget> {
        Ok(self.output_ref(id)?.fbo.target())
    }

    /// Removes an output, releasing its draw call and FBO.
    pub fn output_destroy(&mut self, ctx: &RenderCtx<'_>, id: OutputId) -> Result<()> {
        let pos = self.position(id)?;
        let op = self.outputs.remove(pos);
        op.draw.destroy(ctx);
        op.fbo.destroy(ctx);
        Ok(())
    }

    pub fn output(&self, id: OutputId) -> Option<&Output> {
        self.outputs.iter().find(|o| o.id == id)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Output> {
        self.outputs.iter()
    }

    fn position(&self, id: OutputId) -> Result<usize> {
        self.outputs.iter().position(|o| o.id == id).ok_or(Error::UnknownOutput(id.0))
    }

    fn output_ref(&self, id: OutputId) -> Result<&Output> {
        self.position(id).map(|pos| &self.outputs[pos])
    }

    fn output_mut(&mut self, id: OutputId) -> Result<&mut Output> {
        let pos = self.position(id)?;
        Ok(&mut self.outputs[pos])
    }

    // ── accessors ─────────────────────────────────────────────────────────

    pub fn feed(&self) -> &dyn Feed {
        self.feed.as_ref()
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Releases outputs, the program and the feed.
    pub fn terminate(mut self, ctx: &RenderCtx<'_>) {
        for op in self.outputs.drain(..) {
            op.draw.destroy(ctx);
            op.fbo.destroy(ctx);
        }
        self.program.destroy(ctx);
        self.feed.terminate(ctx);
    }
}

impl std::fmt::Debug for Campipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Campipe")
            .field("feed", &self.feed.state())
            .field("mesh", &(self.mesh.xpoints(), self.mesh.ypoints()))
            .field("program", &self.program)
            .field("outputs", &self.outputs.len())
            .finish()
    }
}

fn tc_offset(apply_ldc: bool) -> i32 {
    if apply_ldc { MeshVertex::TC_OFFSET } else { MeshVertex::POSITION_OFFSET }
}
