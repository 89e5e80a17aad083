//! Error taxonomy shared by the synthesis, playback and scheduling engines.
//! Each concern owns its own error enum; `ErrorKind` maps them onto the
//! caller-facing categories.

/// Caller-facing error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad sample rate, duration, time range or malformed config value.
    InputValidation,
    /// Unknown sound key.
    NotFound,
    /// Configuration that cannot yield a usable wake-window schedule.
    InvalidConfig,
    /// Filesystem failure while loading configuration.
    Io,
    /// Audio output device failure.
    Output,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InputValidation => write!(f, "input validation"),
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::InvalidConfig => write!(f, "invalid config"),
            ErrorKind::Io => write!(f, "io"),
            ErrorKind::Output => write!(f, "output"),
        }
    }
}
