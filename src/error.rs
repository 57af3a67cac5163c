//! Error type shared by every fallible operation in the crate.

pub type PassResult<T> = Result<T, PassError>;

/// Everything that can go wrong while building or driving passes.
///
/// Configuration errors (unknown names, wrong uniform types) indicate a wiring
/// mistake in the integrating application and are never retried.
#[derive(thiserror::Error, Debug)]
pub enum PassError {
    #[error("the uniform '{name}' was not declared when creating the program '{program}'")]
    UnknownUniform { name: String, program: String },

    #[error("uniform '{name}' expects {expected}, got {actual}")]
    UniformTypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("uniform '{0}' is not a texture uniform and cannot be linked to a pass output")]
    NotATextureUniform(String),

    #[error("the pass '{0}' doesn't exist in this controller, maybe you forgot to add it")]
    PassNotFound(String),

    #[error("transition '{0}' doesn't exist in this controller, maybe you forgot to add it")]
    TransitionNotFound(String),

    #[error("the terminal pass cannot be removed from a chain; set another terminal first")]
    TerminalRemoval,

    #[error("shader compilation failed for '{label}': {message}")]
    ShaderCompilation { label: String, message: String },

    #[error("gpu error: {0}")]
    Gpu(String),

    #[error("failed to acquire surface texture: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("no presentation surface is available on this backend")]
    NoSurface,

    #[error("unknown {kind} handle {id}")]
    UnknownResource { kind: &'static str, id: u32 },

    #[error("no program is bound")]
    NoProgramBound,

    #[error("transition output sampled while no transition is running")]
    TransitionIdle,

    #[error("'{0}' has been disposed")]
    Disposed(String),

    #[error("frame buffers have been released")]
    BuffersReleased,

    #[error("producer is already borrowed; a pass cannot render or sample itself re-entrantly")]
    ProducerBusy,

    #[error("the producer linked to uniform '{0}' has been dropped")]
    LinkSourceDropped(String),

    #[error("no producer is current")]
    NoCurrentProducer,

    #[error("event loop error: {0}")]
    EventLoop(String),
}

impl PassError {
    pub fn unknown_uniform(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self::UnknownUniform {
            name: name.into(),
            program: program.into(),
        }
    }

    pub fn shader_compilation(label: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ShaderCompilation {
            label: label.into(),
            message: message.into(),
        }
    }

    pub fn gpu(msg: impl Into<String>) -> Self {
        Self::Gpu(msg.into())
    }

    /// Returns `true` for errors caused by wiring mistakes rather than runtime state.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownUniform { .. }
                | Self::UniformTypeMismatch { .. }
                | Self::NotATextureUniform(_)
                | Self::PassNotFound(_)
                | Self::TransitionNotFound(_)
                | Self::TerminalRemoval
        )
    }
}
