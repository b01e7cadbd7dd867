use std::num::{NonZeroU32, NonZeroU64};

macro_rules! gl_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
        pub struct $name(pub NonZeroU32);

        impl $name {
            /// Raw GL object name.
            #[inline]
            pub fn get(self) -> u32 {
                self.0.get()
            }

            /// Wraps a raw GL object name; `0` (the "no object" name) yields `None`.
            #[inline]
            pub fn from_raw(raw: u32) -> Option<Self> {
                NonZeroU32::new(raw).map(Self)
            }
        }
    };
}

gl_handle!(
    /// Linked shader program.
    ProgramId
);
gl_handle!(
    /// Shader object (one stage, before linking).
    ShaderId
);
gl_handle!(BufferId);
gl_handle!(TextureId);
gl_handle!(FramebufferId);

/// Vertex attribute index resolved from a linked program.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct AttribLocation(pub u32);

/// Uniform location resolved from a linked program.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct UniformLocation(pub u32);

/// Platform image wrapping a producer buffer (an `EGLImageKHR` on device).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ExternalImage(pub NonZeroU64);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum BufferTarget {
    Array,
    ElementArray,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum TextureTarget {
    Texture2D,
    /// `GL_TEXTURE_EXTERNAL_OES`, backed by an imported image.
    External,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

/// Topology passed to `glDrawElements`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Primitive {
    TriangleStrip,
    Triangles,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PixelFormat {
    Luminance,
    Rgb,
    Rgba,
}

impl PixelFormat {
    pub fn components(self) -> usize {
        match self {
            PixelFormat::Luminance => 1,
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum Filter {
    Nearest,
    #[default]
    Linear,
}

/// Global binding state of a context, as `glGet*` would report it.
///
/// Texture bindings list only non-zero bindings, sorted by unit then target.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct BindingSnapshot {
    pub program: Option<ProgramId>,
    /// Zero-based texture unit (`GL_ACTIVE_TEXTURE - GL_TEXTURE0`).
    pub active_unit: u32,
    pub array_buffer: Option<BufferId>,
    pub element_buffer: Option<BufferId>,
    pub framebuffer: Option<FramebufferId>,
    pub textures: Vec<(u32, TextureTarget, TextureId)>,
    pub enabled_attribs: Vec<AttribLocation>,
}
