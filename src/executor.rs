//! Seam to the remote service that durably applies commands
use crate::command::ValidatedCommand;
use crate::error::ExecutorError;
use crate::installment::TimeStamp;
use chrono::Utc;

/// What the executor hands back once a command is durably applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReceipt {
    pub reference: String, // server side reference for the applied change
    pub confirmed_at: TimeStamp<Utc>,
}

/// Applies a validated command remotely.
///
/// One call is one request. Implementations own transport, timeouts and
/// authentication; the core neither retries nor cancels, and treats any
/// `Err` as "nothing changed".
pub trait CommandExecutor {
    fn execute(
        &self,
        request_id: &str,
        command: &ValidatedCommand,
    ) -> Result<ExecutionReceipt, ExecutorError>;
}

impl<E: CommandExecutor + ?Sized> CommandExecutor for &E {
    fn execute(
        &self,
        request_id: &str,
        command: &ValidatedCommand,
    ) -> Result<ExecutionReceipt, ExecutorError> {
        (**self).execute(request_id, command)
    }
}

impl<E: CommandExecutor + ?Sized> CommandExecutor for Box<E> {
    fn execute(
        &self,
        request_id: &str,
        command: &ValidatedCommand,
    ) -> Result<ExecutionReceipt, ExecutorError> {
        (**self).execute(request_id, command)
    }
}
