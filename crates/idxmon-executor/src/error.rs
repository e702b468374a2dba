/// Errors raised while configuring an executor. Rewinds themselves never
/// fail with an error; see [`crate::RewindResult`].
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("Executor: invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Executor: unknown mode '{0}' (expected 'graphman' or 'mock')")]
    UnknownMode(String),
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
