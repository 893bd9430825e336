use thiserror::Error;

/// Errors returned by broker operations.
///
/// A message that could not be delivered to a slow subscriber is not an
/// error; it is dropped for that subscriber only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// The control loop has exited; the command was not accepted.
    #[error("broker is stopped")]
    Stopped,
}
