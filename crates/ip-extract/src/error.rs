/// Error types for the ip-extract library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// One of the address patterns failed to parse.
    #[error("invalid address pattern: {0}")]
    Syntax(#[from] Box<regex_syntax::Error>),

    /// The parsed patterns could not be compiled into a matcher.
    #[error("regex error: {0}")]
    Regex(#[from] regex_automata::meta::BuildError),
}

/// Convenience type alias for Results using the library error.
pub type Result<T> = std::result::Result<T, Error>;
