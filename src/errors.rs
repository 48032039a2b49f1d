//! Error taxonomy and raw-outcome mapping
//!
//! Every outcome the network can report maps to exactly one variant of
//! [`Error`] (or to no error). Unrecognized codes surface as
//! [`Error::Unexpected`] rather than being dropped.

use thiserror::Error as ThisError;

/// Reason a server or webhook rejected an individual invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceErrorReason {
    AlreadyPaid,
    WrongDestination,
    SkuNotFound,
    Unknown,
}

impl std::fmt::Display for InvoiceErrorReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InvoiceErrorReason::AlreadyPaid => "already paid",
            InvoiceErrorReason::WrongDestination => "wrong destination",
            InvoiceErrorReason::SkuNotFound => "sku not found",
            InvoiceErrorReason::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Per-invoice failure, positioned by operation index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceError {
    pub op_index: usize,
    pub reason: InvoiceErrorReason,
}

/// Closed error taxonomy for all client operations.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum Error {
    #[error("account does not exist")]
    AccountDoesNotExist,

    #[error("account already exists")]
    AccountExists,

    #[error("transaction rejected by the service")]
    TransactionRejected,

    /// Sequence number or blockhash mismatch. Recovered internally by the
    /// submission retry loop; surfaces only when retries are exhausted.
    #[error("bad nonce")]
    BadNonce,

    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("a payer (subsidizer) is required but was not provided")]
    PayerRequired,

    #[error("no subsidizer available for the transaction")]
    NoSubsidizer,

    /// Idempotent duplicate detected via the dedupe identifier. Terminal to
    /// the caller, not a success.
    #[error("transaction was already submitted")]
    AlreadySubmitted,

    #[error("invoice error at operation {op_index}: {reason}")]
    Invoice {
        op_index: usize,
        reason: InvoiceErrorReason,
    },

    #[error("transaction not found")]
    TransactionNotFound,

    /// The server signalled the legacy ledger has been migrated away.
    /// Consumed by the version router, which upgrades and re-enters the
    /// token path; never surfaced to callers.
    #[error("ledger migrated")]
    LedgerMigrated,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("memo construction failed: {0}")]
    Memo(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("internal inconsistency: {0}")]
    Internal(String),

    #[error("unexpected result: {0}")]
    Unexpected(String),
}

impl Error {
    /// Whether the outer transient-RPC retry layer may retry this error.
    ///
    /// The nonce retry loop has its own, narrower rule and never consults
    /// this.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

impl From<InvoiceError> for Error {
    fn from(e: InvoiceError) -> Self {
        Error::Invoice {
            op_index: e.op_index,
            reason: e.reason,
        }
    }
}

/// Raw top-level outcome code of a submission, as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawSubmitOutcome {
    Ok,
    AlreadySubmitted,
    Failed,
    Rejected,
    InvoiceError,
    PayerRequired,
    /// Forward-compatibility escape hatch; always maps to `Unexpected`.
    Other(i32),
}

/// Raw per-transaction / per-operation error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawTransactionError {
    None,
    Unknown,
    Unauthorized,
    BadNonce,
    InsufficientBalance,
    InvalidAccount,
    Other(i32),
}

/// Maps one raw transaction error code into the taxonomy. Total: every
/// defined code maps to exactly one variant or to no error.
pub fn map_transaction_error(code: RawTransactionError) -> Option<Error> {
    match code {
        RawTransactionError::None => None,
        RawTransactionError::Unknown => Some(Error::Unexpected(
            "unknown transaction failure".to_string(),
        )),
        RawTransactionError::Unauthorized => Some(Error::InvalidSignature),
        RawTransactionError::BadNonce => Some(Error::BadNonce),
        RawTransactionError::InsufficientBalance => Some(Error::InsufficientBalance),
        RawTransactionError::InvalidAccount => Some(Error::AccountDoesNotExist),
        RawTransactionError::Other(code) => Some(Error::Unexpected(format!(
            "unrecognized transaction error code: {code}"
        ))),
    }
}

/// Structured errors attached to a submission outcome.
#[derive(Debug, Clone, Default)]
pub struct TransactionErrors {
    /// Top-level transaction error.
    pub tx_error: Option<Error>,
    /// One slot per operation; `None` where the operation had no error.
    pub payment_errors: Vec<Option<Error>>,
}

impl TransactionErrors {
    pub fn from_raw(tx: RawTransactionError, ops: &[RawTransactionError]) -> Self {
        Self {
            tx_error: map_transaction_error(tx),
            payment_errors: ops.iter().map(|&c| map_transaction_error(c)).collect(),
        }
    }

    pub fn has_errors(&self) -> bool {
        self.tx_error.is_some() || self.payment_errors.iter().any(|e| e.is_some())
    }
}

/// Fully mapped result of one submission attempt.
#[derive(Debug, Clone, Default)]
pub struct SubmitTransactionResult {
    /// 32-byte legacy hash or 64-byte token-ledger signature.
    pub id: Vec<u8>,
    pub errors: TransactionErrors,
    pub invoice_errors: Vec<InvoiceError>,
}

impl SubmitTransactionResult {
    /// Maps a raw submission response into the taxonomy. Total over the
    /// defined outcome codes; anything else is an `Unexpected` error.
    pub fn from_raw(raw: crate::rpc::RawSubmitResponse) -> Result<Self, Error> {
        let mut result = Self {
            id: raw.id,
            errors: TransactionErrors::from_raw(raw.tx_error, &raw.op_errors),
            invoice_errors: Vec::new(),
        };

        match raw.outcome {
            RawSubmitOutcome::Ok | RawSubmitOutcome::Failed => {}
            RawSubmitOutcome::AlreadySubmitted => {
                result.errors.tx_error = Some(Error::AlreadySubmitted);
            }
            RawSubmitOutcome::Rejected => {
                result.errors.tx_error = Some(Error::TransactionRejected);
            }
            RawSubmitOutcome::PayerRequired => {
                result.errors.tx_error = Some(Error::PayerRequired);
            }
            RawSubmitOutcome::InvoiceError => {
                result.invoice_errors = raw.invoice_errors;
            }
            RawSubmitOutcome::Other(code) => {
                return Err(Error::Unexpected(format!(
                    "unrecognized submit outcome code: {code}"
                )));
            }
        }

        Ok(result)
    }
}
