//! Ledger strategies
//!
//! The two incompatible ledger implementations live behind the same
//! capability set (assemble, sign-and-submit, get-transaction). The
//! version router selects exactly one of [`legacy::LegacyLedger`] or
//! [`token::TokenLedger`] per call; no ad hoc version flags leak past
//! this boundary.

pub mod legacy;
pub mod token;

use crate::errors::Error;
use crate::memo::{invoice_list_hash, Memo, INVOICE_HASH_LEN};
use crate::types::{InvoiceList, TransactionType};

/// Structured-memo format version emitted by this client.
pub(crate) const MEMO_FORMAT_VERSION: u8 = 1;

/// Memo selected for a transaction, independent of ledger encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MemoSpec {
    None,
    Text(String),
    Structured(Memo),
}

/// Applies the shared memo selection policy: a plain text memo wins, an
/// app index produces a structured memo binding the invoice-list hash
/// (all-zero when there are no invoices), and otherwise no memo at all.
///
/// Returns the memo together with the invoice list to attach to the
/// submission, which is only present when the structured memo binds one.
pub(crate) fn select_memo(
    text_memo: Option<&str>,
    invoices: Option<InvoiceList>,
    app_index: u16,
    tx_type: TransactionType,
) -> Result<(MemoSpec, Option<InvoiceList>), Error> {
    if let Some(text) = text_memo {
        return Ok((MemoSpec::Text(text.to_string()), None));
    }

    if app_index > 0 {
        let fk = match &invoices {
            Some(list) => invoice_list_hash(list)?,
            None => [0u8; INVOICE_HASH_LEN],
        };
        let memo = Memo::new(MEMO_FORMAT_VERSION, tx_type, app_index, &fk)?;
        return Ok((MemoSpec::Structured(memo), invoices));
    }

    Ok((MemoSpec::None, None))
}
