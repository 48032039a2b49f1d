//! RPC boundary
//!
//! The engine talks to the network through [`LedgerRpc`]. Transport setup,
//! credentials, and wire encoding live behind implementations of this
//! trait; the engine only sees raw outcome codes, which it maps into the
//! error taxonomy itself.

pub mod backoff;

use async_trait::async_trait;
use thiserror::Error as ThisError;
use tokio::sync::mpsc;

use crate::errors::{Error, InvoiceError, RawSubmitOutcome, RawTransactionError};
use crate::keys::{PrivateKey, PublicKey};
use crate::ledger::legacy::SignedEnvelope;
use crate::ledger::token::TokenTransaction;
use crate::types::{AccountEvent, Commitment, InvoiceList, TransactionData};

/// Transport-level failure of a single RPC call.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum RpcError {
    /// The server refuses the call because the targeted ledger has been
    /// migrated away. Triggers the client's version upgrade.
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    /// Sequence/blockhash mismatch reported for calls that submit a
    /// transaction on the caller's behalf (account creation).
    #[error("bad nonce")]
    BadNonce,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("internal server error: {0}")]
    Internal(String),
}

impl RpcError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RpcError::Transport(_) | RpcError::Internal(_))
    }

    /// Maps this error for an account-oriented call.
    pub fn into_account_error(self) -> Error {
        match self {
            RpcError::NotFound => Error::AccountDoesNotExist,
            RpcError::AlreadyExists => Error::AccountExists,
            other => other.into_generic_error(),
        }
    }

    /// Maps this error for a transaction-oriented call.
    pub fn into_transaction_error(self) -> Error {
        match self {
            RpcError::NotFound => Error::TransactionNotFound,
            other => other.into_generic_error(),
        }
    }

    fn into_generic_error(self) -> Error {
        match self {
            RpcError::Transport(msg) => Error::Transport(msg),
            RpcError::DeadlineExceeded => Error::DeadlineExceeded,
            RpcError::Internal(msg) => Error::Transport(msg),
            RpcError::FailedPrecondition(_) => Error::LedgerMigrated,
            RpcError::BadNonce => Error::BadNonce,
            RpcError::NotFound => Error::AccountDoesNotExist,
            RpcError::AlreadyExists => Error::AccountExists,
        }
    }
}

/// Balance and, on the legacy ledger, the current sequence number.
#[derive(Debug, Clone)]
pub struct AccountInfo {
    pub account: PublicKey,
    /// Balance in quarks.
    pub balance: i64,
    /// Legacy ledger only; zero on the token ledger.
    pub sequence_number: i64,
}

/// Service-wide token-ledger parameters. Cacheable indefinitely per
/// process; implementations are expected to cache it themselves.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Account funding fees/rent on behalf of signers, when the service
    /// provides one.
    pub subsidizer: Option<PublicKey>,
    pub token_program: PublicKey,
    pub token: PublicKey,
}

/// Unmapped submission response, exactly as the service reported it.
#[derive(Debug, Clone)]
pub struct RawSubmitResponse {
    /// 32-byte legacy hash or 64-byte token-ledger signature.
    pub id: Vec<u8>,
    pub outcome: RawSubmitOutcome,
    pub tx_error: RawTransactionError,
    /// One code per operation; empty when the service omitted them.
    pub op_errors: Vec<RawTransactionError>,
    pub invoice_errors: Vec<InvoiceError>,
}

impl RawSubmitResponse {
    pub fn ok(id: Vec<u8>) -> Self {
        Self {
            id,
            outcome: RawSubmitOutcome::Ok,
            tx_error: RawTransactionError::None,
            op_errors: Vec::new(),
            invoice_errors: Vec::new(),
        }
    }
}

/// The full set of network operations the engine consumes.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    // Legacy (sequence-number) ledger

    async fn create_legacy_account(&self, account: &PrivateKey) -> Result<(), RpcError>;

    async fn get_legacy_account_info(&self, account: &PublicKey)
        -> Result<AccountInfo, RpcError>;

    async fn submit_legacy_transaction(
        &self,
        envelope: &SignedEnvelope,
        invoice_list: Option<&InvoiceList>,
    ) -> Result<RawSubmitResponse, RpcError>;

    async fn get_legacy_transaction(&self, tx_id: &[u8]) -> Result<TransactionData, RpcError>;

    // Token ledger

    async fn create_token_account(
        &self,
        account: &PrivateKey,
        commitment: Commitment,
        subsidizer: Option<&PrivateKey>,
    ) -> Result<(), RpcError>;

    async fn get_token_account_info(
        &self,
        account: &PublicKey,
        commitment: Commitment,
    ) -> Result<AccountInfo, RpcError>;

    async fn resolve_token_accounts(&self, owner: &PublicKey)
        -> Result<Vec<PublicKey>, RpcError>;

    async fn submit_token_transaction(
        &self,
        tx: &TokenTransaction,
        invoice_list: Option<&InvoiceList>,
        commitment: Commitment,
        dedupe_id: Option<&[u8]>,
    ) -> Result<RawSubmitResponse, RpcError>;

    async fn get_token_transaction(
        &self,
        tx_id: &[u8],
        commitment: Commitment,
    ) -> Result<TransactionData, RpcError>;

    async fn get_service_config(&self) -> Result<ServiceConfig, RpcError>;

    async fn get_recent_blockhash(&self) -> Result<[u8; 32], RpcError>;

    async fn get_minimum_balance_for_rent_exemption(&self, size: u64) -> Result<u64, RpcError>;

    async fn request_airdrop(
        &self,
        account: &PublicKey,
        quarks: u64,
        commitment: Commitment,
    ) -> Result<Vec<u8>, RpcError>;

    /// Opens a push channel of account events; the channel closes when the
    /// stream terminates or the account is unknown.
    async fn get_events(
        &self,
        account: &PublicKey,
    ) -> Result<mpsc::Receiver<AccountEvent>, RpcError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_error_mapping() {
        assert_eq!(
            RpcError::NotFound.into_account_error(),
            Error::AccountDoesNotExist
        );
        assert_eq!(
            RpcError::AlreadyExists.into_account_error(),
            Error::AccountExists
        );
        assert_eq!(
            RpcError::DeadlineExceeded.into_account_error(),
            Error::DeadlineExceeded
        );
        assert_eq!(
            RpcError::FailedPrecondition("migrated".to_string()).into_account_error(),
            Error::LedgerMigrated
        );
    }

    #[test]
    fn test_transaction_error_mapping() {
        assert_eq!(
            RpcError::NotFound.into_transaction_error(),
            Error::TransactionNotFound
        );
        assert!(matches!(
            RpcError::Transport("reset".to_string()).into_transaction_error(),
            Error::Transport(_)
        ));
    }

    #[test]
    fn test_transient_classification() {
        assert!(RpcError::Transport("x".to_string()).is_transient());
        assert!(RpcError::Internal("x".to_string()).is_transient());
        assert!(!RpcError::NotFound.is_transient());
        assert!(!RpcError::FailedPrecondition("x".to_string()).is_transient());
    }
}
