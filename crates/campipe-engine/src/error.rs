//! Engine error type and its failure taxonomy.

use std::fmt;
use std::path::PathBuf;

/// Result alias used across the engine.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A malformed input file (mesh displacement map, font atlas, config).
#[derive(Debug, Clone, PartialEq)]
pub struct FormatError {
    pub path: PathBuf,
    /// 1-based line number, when the format is line oriented.
    pub line: Option<usize>,
    pub message: String,
}

impl FormatError {
    pub(crate) fn new(path: impl Into<PathBuf>, line: Option<usize>, msg: impl Into<String>) -> Self {
        Self { path: path.into(), line, message: msg.into() }
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}: {}", self.path.display(), line, self.message),
            None => write!(f, "{}: {}", self.path.display(), self.message),
        }
    }
}

impl std::error::Error for FormatError {}

/// Which binding table of a draw call overflowed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BindingKind {
    Buffer,
    Texture,
    Attribute,
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BindingKind::Buffer => "buffer",
            BindingKind::Texture => "texture",
            BindingKind::Attribute => "attribute",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // ── setup ─────────────────────────────────────────────────────────────
    #[error("failed to read shader {path}: {source}")]
    ShaderIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no shader source named {0:?}")]
    ShaderNotFound(String),

    #[error("{stage} shader {name:?} failed to compile:\n{log}")]
    ShaderCompile {
        name: String,
        stage: &'static str,
        log: String,
    },

    #[error("program {name:?} failed to link:\n{log}")]
    ShaderLink { name: String, log: String },

    #[error("shader program has no attribute {0:?}")]
    MissingAttribute(String),

    #[error("shader program has no uniform {0:?}")]
    MissingUniform(String),

    #[error("framebuffer {width}x{height} is incomplete")]
    FramebufferIncomplete { width: u32, height: u32 },

    #[error("invalid {what} size {width}x{height}")]
    InvalidSize {
        what: &'static str,
        width: u32,
        height: u32,
    },

    #[error("failed to load texture {path}: {message}")]
    TextureLoad { path: PathBuf, message: String },

    #[error("GL failed to create {what}: {message}")]
    ResourceCreation { what: &'static str, message: String },

    #[error("frame producer failed to start: {0}")]
    ProducerInit(String),

    #[error("failed to import camera buffer as an external image: {0}")]
    ImageImport(String),

    #[error("failed to present frame: {0}")]
    Present(String),

    #[error("failed to read config {path}: {message}")]
    Config { path: PathBuf, message: String },

    // ── per frame ─────────────────────────────────────────────────────────
    #[error("no camera frame became ready within {timeout_ms} ms")]
    DequeueTimeout { timeout_ms: u64 },

    #[error("frame export failed: {0}")]
    Export(String),

    // ── input formats ─────────────────────────────────────────────────────
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    // ── API contract ──────────────────────────────────────────────────────
    #[error("{kind} binding table is full ({capacity} entries)")]
    BindingTableFull { kind: BindingKind, capacity: usize },

    #[error("feed is {actual}, expected {expected}")]
    FeedState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("a frame is already checked out; queue it before dequeueing again")]
    AlreadyCheckedOut,

    #[error("no frame is checked out")]
    NothingCheckedOut,

    #[error("{count} vertices exceed the {max} a u16 index buffer can address")]
    TooManyVertices { count: usize, max: usize },

    #[error("no layer with id {0}")]
    UnknownLayer(u32),

    #[error("no campipe output with id {0}")]
    UnknownOutput(u32),
}

/// Failure classes, ordered by how the render loop must react.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorClass {
    /// Environment or configuration problem found while building the pipeline.
    SetupFatal,
    /// The current frame's step failed; the next frame may succeed.
    FrameTransient,
    /// A side output failed after the frame was composed; the frame itself
    /// is still good to present.
    Degraded,
    /// Malformed input file; there is no degraded rendering mode.
    Format,
    /// Caller broke the API contract.
    Contract,
}

/// Render-loop response to an error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameAction {
    /// Log and present the frame as usual.
    Continue,
    /// Skip the rest of the current frame and carry on.
    SkipFrame,
    /// Tear down and exit non-zero.
    Fatal,
}

impl ErrorClass {
    pub fn action(self) -> FrameAction {
        match self {
            ErrorClass::Degraded => FrameAction::Continue,
            ErrorClass::FrameTransient => FrameAction::SkipFrame,
            ErrorClass::SetupFatal | ErrorClass::Format | ErrorClass::Contract => FrameAction::Fatal,
        }
    }
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::DequeueTimeout { .. } => ErrorClass::FrameTransient,
            Error::Export(_) => ErrorClass::Degraded,
            Error::Format(_) => ErrorClass::Format,
            Error::BindingTableFull { .. }
            | Error::FeedState { .. }
            | Error::AlreadyCheckedOut
            | Error::NothingCheckedOut
            | Error::TooManyVertices { .. }
            | Error::UnknownLayer(_)
            | Error::UnknownOutput(_) => ErrorClass::Contract,
            _ => ErrorClass::SetupFatal,
        }
    }

    /// Shorthand for `self.class().action()`.
    pub fn action(&self) -> FrameAction {
        self.class().action()
    }

    pub(crate) fn creation(what: &'static str, message: impl Into<String>) -> Self {
        Error::ResourceCreation { what, message: message.into() }
    }
}
