//! Client engine for the quarknet dual-ledger payment network
//!
//! The network is mid-migration from a legacy sequence-number ledger to a
//! token-account ledger. [`client::Client`] dispatches transparently
//! between the two, upgrades its notion of the current ledger version when
//! the server signals the legacy chain is gone, binds invoices to
//! transactions through hashed memos, and retries failed submissions under
//! narrow nonce-only rules.

pub mod client;
pub mod config;
pub mod errors;
pub mod keys;
pub mod ledger;
pub mod memo;
pub mod resolver;
pub mod rpc;
pub mod types;
pub mod webhook;

// Re-export the types most callers need.
pub use client::{CallOpts, Client};
pub use config::ClientConfig;
pub use errors::{Error, InvoiceError, InvoiceErrorReason, SubmitTransactionResult};
pub use keys::{PrivateKey, PublicKey};
pub use types::{
    AccountResolution, Commitment, Earn, EarnBatch, EarnBatchResult, Environment, Invoice,
    InvoiceList, LedgerVersion, LineItem, Payment, TransactionData, TransactionType,
};
