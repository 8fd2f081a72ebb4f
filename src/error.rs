use crate::installment::{ApplyError, FieldName, Status};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("transition not permitted: {from} -> {to}")]
    UnknownTransition { from: Status, to: Status },
    #[error("required field '{0}' is missing")]
    MissingField(FieldName),
    #[error("field '{field}' must be a non-negative number, got {value:?}")]
    InvalidNumber { field: FieldName, value: String },
    #[error("field '{field}' allows at most two decimal places, got {value:?}")]
    InvalidPrecision { field: FieldName, value: String },
    #[error("field '{field}' is not a recognised date, got {value:?}")]
    InvalidDate { field: FieldName, value: String },
    #[error("unknown payment method {0:?}")]
    InvalidPaymentMethod(String),
    #[error("unknown field {0:?}")]
    UnknownField(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("installment at position {position} has no id")]
    MissingId { position: usize },
    #[error("installment {id} appears twice in the held collection (position {position})")]
    DuplicateId { id: String, position: usize },
}

/// Failures reported by the remote service that applies commands. These
/// are handed back to callers exactly as the executor produced them.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("executor rejected the command ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("executor unavailable: {0}")]
    Unavailable(String),
}

#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error("installment {0} not found")]
    NotFound(String),
    #[error("confirmed command could not be applied locally: {0}")]
    StaleRecord(#[from] ApplyError),
    #[error("store error: {0}")]
    Store(#[from] sled::Error),
    #[error("decode error: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ValidationError {
    /// The input a form layer should highlight, when there is one.
    pub fn field(&self) -> Option<FieldName> {
        match self {
            ValidationError::MissingField(field)
            | ValidationError::InvalidNumber { field, .. }
            | ValidationError::InvalidPrecision { field, .. }
            | ValidationError::InvalidDate { field, .. } => Some(*field),
            ValidationError::InvalidPaymentMethod(_) => Some(FieldName::PaymentMethod),
            ValidationError::UnknownTransition { .. } | ValidationError::UnknownField(_) => None,
        }
    }
}
