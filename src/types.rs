//! Common types used throughout the client engine

use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::keys::{PrivateKey, PublicKey};

/// Maximum number of earns a single batch may carry; this is roughly the
/// number of transfers that fit inside one token-ledger transaction.
pub const MAX_EARN_BATCH_SIZE: usize = 15;

/// Ledger generation the client is currently operating against.
///
/// The value only ever moves upward: the legacy generations upgrade to the
/// token ledger when the server signals the legacy chain is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LedgerVersion {
    /// Legacy sequence-number ledger, pre-rebase asset (100x finer base unit).
    Legacy2,
    /// Legacy sequence-number ledger, native quark denomination.
    Legacy3,
    /// Token-account ledger.
    Token4,
}

impl LedgerVersion {
    pub fn value(&self) -> u8 {
        match self {
            LedgerVersion::Legacy2 => 2,
            LedgerVersion::Legacy3 => 3,
            LedgerVersion::Token4 => 4,
        }
    }

    pub fn from_value(value: u8) -> Result<Self, Error> {
        match value {
            2 => Ok(LedgerVersion::Legacy2),
            3 => Ok(LedgerVersion::Legacy3),
            4 => Ok(LedgerVersion::Token4),
            other => Err(Error::Config(format!("unsupported ledger version: {other}"))),
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, LedgerVersion::Legacy2 | LedgerVersion::Legacy3)
    }
}

/// Target environment; selects default endpoints and the Legacy2 issuer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Test,
    Prod,
}

/// Durability level requested for token-ledger reads and submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Recent,
    Single,
    Semi,
    Max,
}

impl Default for Commitment {
    fn default() -> Self {
        Commitment::Single
    }
}

/// Controls whether a missing sender/destination account may be replaced
/// with a resolved token account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountResolution {
    /// Use the provided account as-is; no fallback resolution.
    Exact,
    /// On an absent account, resolve token accounts and resubmit once.
    Preferred,
}

/// High-level kind of a payment, encoded into the structured memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    Unknown,
    None,
    Earn,
    Spend,
    P2p,
}

impl TransactionType {
    pub fn value(&self) -> i16 {
        match self {
            TransactionType::Unknown => -1,
            TransactionType::None => 0,
            TransactionType::Earn => 1,
            TransactionType::Spend => 2,
            TransactionType::P2p => 3,
        }
    }

    pub fn from_value(value: i16) -> Self {
        match value {
            0 => TransactionType::None,
            1 => TransactionType::Earn,
            2 => TransactionType::Spend,
            3 => TransactionType::P2p,
            _ => TransactionType::Unknown,
        }
    }
}

/// A single line item within an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Amount in quarks.
    pub amount: i64,
    /// Opaque app-defined SKU bytes.
    #[serde(default)]
    pub sku: Vec<u8>,
}

/// Off-chain description of what a payment is for, bound on-chain via the
/// invoice-list hash embedded in the transaction memo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub items: Vec<LineItem>,
}

/// Ordered set of invoices covered by one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceList {
    pub invoices: Vec<Invoice>,
}

/// A single payment to submit.
#[derive(Debug, Clone)]
pub struct Payment {
    pub sender: PrivateKey,
    pub destination: PublicKey,
    pub tx_type: TransactionType,
    /// Amount in quarks.
    pub quarks: i64,

    /// Legacy-ledger only: alternate sequence-number source that also pays
    /// the transaction fee.
    pub channel: Option<PrivateKey>,

    /// Plain text memo; mutually exclusive with `invoice`.
    pub memo: Option<String>,
    pub invoice: Option<Invoice>,

    /// Opaque caller-supplied identifier letting the server collapse
    /// duplicate submissions of the same logical payment.
    pub dedupe_id: Option<Vec<u8>>,
}

impl Payment {
    pub fn new(
        sender: PrivateKey,
        destination: PublicKey,
        tx_type: TransactionType,
        quarks: i64,
    ) -> Self {
        Self {
            sender,
            destination,
            tx_type,
            quarks,
            channel: None,
            memo: None,
            invoice: None,
            dedupe_id: None,
        }
    }
}

/// A single earn within a batch.
#[derive(Debug, Clone)]
pub struct Earn {
    pub destination: PublicKey,
    pub quarks: i64,
    pub invoice: Option<Invoice>,
}

/// A batch of earns sharing one transaction envelope.
#[derive(Debug, Clone)]
pub struct EarnBatch {
    pub sender: PrivateKey,
    pub channel: Option<PrivateKey>,
    /// Shared text memo; mutually exclusive with per-earn invoices.
    pub memo: Option<String>,
    pub earns: Vec<Earn>,
    pub dedupe_id: Option<Vec<u8>>,
}

/// Per-earn failure within a batch submission.
#[derive(Debug, Clone)]
pub struct EarnError {
    pub earn_index: usize,
    pub error: Error,
}

/// Outcome of an earn batch submission.
#[derive(Debug, Clone, Default)]
pub struct EarnBatchResult {
    /// Identifier of the submitted transaction, when one was produced.
    pub tx_id: Vec<u8>,
    /// Batch-level error, if the transaction failed or was rejected.
    pub tx_error: Option<Error>,
    pub earn_errors: Vec<EarnError>,
}

/// Ledger-reported state of a queried transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionState {
    Unknown,
    Success,
    Failed,
}

/// Read-only view of one payment reconstructed from a raw ledger record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOnlyPayment {
    pub sender: PublicKey,
    pub destination: PublicKey,
    pub tx_type: TransactionType,
    pub quarks: i64,
    pub memo: Option<String>,
    pub invoice: Option<Invoice>,
}

/// A queried transaction and its reconstructed payments.
#[derive(Debug, Clone)]
pub struct TransactionData {
    /// 32-byte legacy hash or 64-byte token-ledger signature.
    pub tx_id: Vec<u8>,
    pub state: TransactionState,
    pub payments: Vec<ReadOnlyPayment>,
}

/// Event pushed over an account event stream.
#[derive(Debug, Clone)]
pub enum AccountEvent {
    BalanceUpdate { account: PublicKey, quarks: i64 },
    Transaction { tx_id: Vec<u8>, state: TransactionState },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_version_bounds() {
        assert!(LedgerVersion::from_value(1).is_err());
        assert!(LedgerVersion::from_value(5).is_err());
        assert_eq!(LedgerVersion::from_value(2).unwrap(), LedgerVersion::Legacy2);
        assert_eq!(LedgerVersion::from_value(4).unwrap(), LedgerVersion::Token4);
        assert!(LedgerVersion::Legacy3.is_legacy());
        assert!(!LedgerVersion::Token4.is_legacy());
    }

    #[test]
    fn test_transaction_type_round_trip() {
        for t in [
            TransactionType::None,
            TransactionType::Earn,
            TransactionType::Spend,
            TransactionType::P2p,
        ] {
            assert_eq!(TransactionType::from_value(t.value()), t);
        }
        assert_eq!(TransactionType::from_value(-1), TransactionType::Unknown);
        assert_eq!(TransactionType::from_value(17), TransactionType::Unknown);
    }
}
