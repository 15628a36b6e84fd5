use crate::emitter::EmitterId;
use crate::pool::ReleasedEmitter;

/// Result alias that carries the crate-wide [`SoundError`] type.
pub type Result<T> = std::result::Result<T, SoundError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum SoundError {
    /// Every emitter the pool may own is checked out and the configured
    /// exhaustion policy could not free one.
    #[error("emitter pool exhausted ({max} emitters in use)")]
    PoolExhausted { max: usize },
    /// An emitter was released while it was not checked out of the pool.
    /// Only reported when collection checks are enabled.
    #[error("emitter {0} is not active in the pool")]
    NotActive(EmitterId),
    /// The music transition failed to start its next clip. `released` holds
    /// the one-shots that finished earlier in the same tick.
    #[error("background music fade interrupted: {source}")]
    FadeInterrupted {
        #[source]
        source: Box<SoundError>,
        released: Vec<ReleasedEmitter>,
    },
    /// A clip name could not be resolved against the clip library.
    #[error("unknown audio clip `{0}`")]
    ClipNotFound(String),
    /// The host mixer refused a parameter write.
    #[error("mixer rejected parameter `{name}`: {reason}")]
    Mixer { name: String, reason: String },
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration or cue script could not be parsed.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl SoundError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for SoundError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for SoundError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
