//! Shader sources and program linking.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::gl::{ProgramId, ShaderId, ShaderStage, UniformLocation};

use super::RenderCtx;

/// Vertex stage for campipe outputs (mesh positions in `[0, 1]`).
pub const CAMPIPE_VS: &str = "vertex_shader.glsl";
/// Y/U/V external-image sampling with BT.601 conversion.
pub const CAMPIPE_YUV_FS: &str = "campipe_yuv_fs.glsl";
/// Single RGB texture, for static feeds.
pub const CAMPIPE_RGB_FS: &str = "campipe_rgb_fs.glsl";
pub const COMPOSITOR_VS: &str = "compositor_vs.glsl";
pub const QUAD_FS: &str = "quad_fs.glsl";

const BUILTIN: &[(&str, &str)] = &[
    (CAMPIPE_VS, include_str!("../../shaders/vertex_shader.glsl")),
    (CAMPIPE_YUV_FS, include_str!("../../shaders/campipe_yuv_fs.glsl")),
    (CAMPIPE_RGB_FS, include_str!("../../shaders/campipe_rgb_fs.glsl")),
    (COMPOSITOR_VS, include_str!("../../shaders/compositor_vs.glsl")),
    (QUAD_FS, include_str!("../../shaders/quad_fs.glsl")),
];

/// Where shader sources come from: the copies compiled into the crate, or a
/// directory holding files of the same names.
#[derive(Debug, Clone, Default)]
pub struct ShaderLibrary {
    dir: Option<PathBuf>,
}

impl ShaderLibrary {
    pub fn builtin() -> Self {
        Self { dir: None }
    }

    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: Some(dir.into()) }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn source(&self, name: &str) -> Result<Cow<'static, str>> {
        match &self.dir {
            Some(dir) => {
                let path = dir.join(name);
                std::fs::read_to_string(&path)
                    .map(Cow::Owned)
                    .map_err(|source| Error::ShaderIo { path, source })
            }
            None => BUILTIN
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, src)| Cow::Borrowed(*src))
                .ok_or_else(|| Error::ShaderNotFound(name.to_string())),
        }
    }

    /// Loads, compiles and links `vs` + `fs`.
    pub fn program(&self, ctx: &RenderCtx<'_>, vs: &str, fs: &str) -> Result<Program> {
        let vs_src = self.source(vs)?;
        let fs_src = self.source(fs)?;
        Program::build(ctx, &format!("{vs}+{fs}"), &vs_src, &fs_src)
    }
}

/// A linked program. Draw calls reference it by id and never own it;
/// destroy it after every draw call using it is gone.
#[derive(Debug)]
pub struct Program {
    id: ProgramId,
    name: String,
}

impl Program {
    pub fn build(ctx: &RenderCtx<'_>, name: &str, vs: &str, fs: &str) -> Result<Self> {
        let gl = ctx.gl;

        let vs = compile(ctx, name, ShaderStage::Vertex, vs)?;
        let fs = match compile(ctx, name, ShaderStage::Fragment, fs) {
            Ok(fs) => fs,
            Err(e) => {
                gl.delete_shader(vs);
                return Err(e);
            }
        };

        let id = match gl.create_program() {
            Ok(id) => id,
            Err(msg) => {
                gl.delete_shader(vs);
                gl.delete_shader(fs);
                log::error!("{name}: failed to create program: {msg}");
                return Err(Error::creation("program", msg));
            }
        };

        gl.attach_shader(id, vs);
        gl.attach_shader(id, fs);
        gl.link_program(id);

        // Linked programs keep their code; the shader objects can go.
        gl.delete_shader(vs);
        gl.delete_shader(fs);

        if !gl.program_link_status(id) {
            let log = gl.program_info_log(id);
            log::error!("{name}: link failed:\n{log}");
            gl.delete_program(id);
            return Err(Error::ShaderLink { name: name.to_string(), log });
        }

        log::debug!("linked program {name} ({})", id.get());
        Ok(Self { id, name: name.to_string() })
    }

    #[inline]
    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uniform(&self, ctx: &RenderCtx<'_>, name: &str) -> Result<UniformLocation> {
        ctx.gl
            .uniform_location(self.id, name)
            .ok_or_else(|| Error::MissingUniform(name.to_string()))
    }

    pub fn destroy(self, ctx: &RenderCtx<'_>) {
        ctx.gl.delete_program(self.id);
    }
}

fn compile(ctx: &RenderCtx<'_>, name: &str, stage: ShaderStage, source: &str) -> Result<ShaderId> {
    let gl = ctx.gl;
    let shader = gl.create_shader(stage).map_err(|msg| {
        log::error!("{name}: failed to create {} shader: {msg}", stage.name());
        Error::creation("shader", msg)
    })?;

    gl.shader_source(shader, source);
    gl.compile_shader(shader);

    if !gl.shader_compile_status(shader) {
        let log = gl.shader_info_log(shader);
        log::error!("{name}: {} shader failed to compile:\n{log}", stage.name());
        gl.delete_shader(shader);
        return Err(Error::ShaderCompile { name: name.to_string(), stage: stage.name(), log });
    }
    Ok(shader)
}
