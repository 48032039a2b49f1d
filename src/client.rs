//! Top-level client and ledger version routing
//!
//! One shared [`Client`] serves arbitrarily many concurrent callers. The
//! only mutable shared state is the ledger version (an atomic, upgraded at
//! most once) and the token-account cache inside the resolver. Everything
//! else flows through per-call values.

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{legacy2_issuer, network_passphrase, ClientConfig};
use crate::errors::{Error, SubmitTransactionResult};
use crate::keys::{PrivateKey, PublicKey};
use crate::ledger::legacy::LegacyLedger;
use crate::ledger::token::TokenLedger;
use crate::resolver::AccountResolver;
use crate::rpc::backoff::{retry, retry_transient, RetryPolicy};
use crate::rpc::{LedgerRpc, RpcError, ServiceConfig};
use crate::types::{
    AccountEvent, AccountResolution, Commitment, EarnBatch, EarnBatchResult, EarnError,
    LedgerVersion, Payment, TransactionData, MAX_EARN_BATCH_SIZE,
};

/// Per-call options for reads and submissions.
#[derive(Debug, Clone)]
pub struct CallOpts {
    /// Commitment for token-ledger requests; defaults to the configured
    /// client default.
    pub commitment: Option<Commitment>,
    /// Resolution applied to the sender on an absent-account outcome.
    pub sender_resolution: AccountResolution,
    /// Resolution applied to destinations on an absent-account outcome.
    pub dest_resolution: AccountResolution,
    /// Caller-supplied subsidizer; signs first and pays fees/rent.
    pub subsidizer: Option<PrivateKey>,
}

impl Default for CallOpts {
    fn default() -> Self {
        Self {
            commitment: None,
            sender_resolution: AccountResolution::Preferred,
            dest_resolution: AccountResolution::Preferred,
            subsidizer: None,
        }
    }
}

/// Client engine for the dual-ledger payment network.
pub struct Client {
    rpc: Arc<dyn LedgerRpc>,
    config: ClientConfig,
    /// Current ledger version value (2-4). Transitions only upward.
    version: AtomicU8,
    resolver: AccountResolver,
    token: TokenLedger,
    transient_policy: RetryPolicy,
}

impl Client {
    pub fn new(rpc: Arc<dyn LedgerRpc>, config: ClientConfig) -> Result<Self, Error> {
        // Reject out-of-range versions before any call can be made.
        let version = LedgerVersion::from_value(config.ledger_version)?;

        let transient_policy = RetryPolicy::new(
            config.max_retries.max(1),
            config.min_delay_ms,
            config.max_delay_ms,
        );

        Ok(Self {
            rpc,
            version: AtomicU8::new(version.value()),
            resolver: AccountResolver::new(config.max_retries),
            token: TokenLedger::new(config.max_nonce_retries),
            transient_policy,
            config,
        })
    }

    /// The ledger version this client currently operates against.
    pub fn ledger_version(&self) -> LedgerVersion {
        match self.version.load(Ordering::Acquire) {
            2 => LedgerVersion::Legacy2,
            3 => LedgerVersion::Legacy3,
            _ => LedgerVersion::Token4,
        }
    }

    fn current_version(&self) -> Result<LedgerVersion, Error> {
        LedgerVersion::from_value(self.version.load(Ordering::Acquire))
    }

    /// The single allowed transition. Idempotent under concurrent callers;
    /// a second transition is a no-op.
    fn upgrade_to_token(&self) {
        let prior = self
            .version
            .fetch_max(LedgerVersion::Token4.value(), Ordering::AcqRel);
        if prior != LedgerVersion::Token4.value() {
            info!(
                from = prior,
                "legacy ledger migrated away; upgraded to token ledger"
            );
        }
    }

    fn commitment(&self, opts: &CallOpts) -> Commitment {
        opts.commitment.unwrap_or(self.config.default_commitment)
    }

    fn legacy_ledger(&self, version: LedgerVersion) -> Result<LegacyLedger, Error> {
        let issuer = (version == LedgerVersion::Legacy2)
            .then(|| legacy2_issuer(self.config.environment));
        LegacyLedger::new(
            version,
            network_passphrase(self.config.environment, version).to_string(),
            issuer,
            self.config.whitelist_key.clone(),
            self.config.max_nonce_retries,
        )
    }

    /// Applies the configured per-call deadline, surfacing expiry as a
    /// cancellation-kind error. Dropping the future stops any in-flight
    /// retry loop at its next await point.
    async fn with_deadline<T, F>(&self, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        match self.config.request_timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), fut)
                .await
                .map_err(|_| Error::DeadlineExceeded)?,
            None => fut.await,
        }
    }

    /// Creates an account on the active ledger.
    ///
    /// On the legacy ledger, a "ledger migrated" precondition upgrades the
    /// client exactly once and re-enters the token path.
    pub async fn create_account(&self, key: &PrivateKey, opts: &CallOpts) -> Result<(), Error> {
        self.with_deadline(self.create_account_inner(key, opts)).await
    }

    async fn create_account_inner(&self, key: &PrivateKey, opts: &CallOpts) -> Result<(), Error> {
        let version = self.current_version()?;
        if version.is_legacy() {
            match self.rpc.create_legacy_account(key).await {
                Ok(()) => return Ok(()),
                Err(RpcError::FailedPrecondition(_)) => self.upgrade_to_token(),
                Err(e) => return Err(e.into_account_error()),
            }
        }

        let commitment = self.commitment(opts);
        retry(
            &RetryPolicy::no_backoff(self.config.max_nonce_retries),
            "create_token_account",
            |e| *e == Error::BadNonce,
            || async {
                self.rpc
                    .create_token_account(key, commitment, opts.subsidizer.as_ref())
                    .await
                    .map_err(|e| e.into_account_error())
            },
        )
        .await
    }

    /// Returns the balance of `account` in quarks.
    pub async fn get_balance(&self, account: &PublicKey, opts: &CallOpts) -> Result<i64, Error> {
        self.with_deadline(self.get_balance_inner(account, opts)).await
    }

    async fn get_balance_inner(&self, account: &PublicKey, opts: &CallOpts) -> Result<i64, Error> {
        let version = self.current_version()?;
        if version.is_legacy() {
            match self.rpc.get_legacy_account_info(account).await {
                Ok(info) => return Ok(info.balance),
                Err(RpcError::FailedPrecondition(_)) => self.upgrade_to_token(),
                Err(e) => return Err(e.into_account_error()),
            }
        }

        let commitment = self.commitment(opts);
        match self.rpc.get_token_account_info(account, commitment).await {
            Ok(info) => Ok(info.balance),
            Err(RpcError::NotFound)
                if opts.sender_resolution == AccountResolution::Preferred =>
            {
                let accounts = self.resolver.resolve(self.rpc.as_ref(), account).await?;
                match accounts.first() {
                    None => Err(Error::AccountDoesNotExist),
                    Some(resolved) => {
                        let info = self
                            .rpc
                            .get_token_account_info(resolved, commitment)
                            .await
                            .map_err(|e| e.into_account_error())?;
                        Ok(info.balance)
                    }
                }
            }
            Err(e) => Err(e.into_account_error()),
        }
    }

    /// Resolves the token accounts owned by `account`. Token ledger only.
    pub async fn resolve_token_accounts(
        &self,
        account: &PublicKey,
    ) -> Result<Vec<PublicKey>, Error> {
        if self.current_version()? != LedgerVersion::Token4 {
            return Err(Error::Config(
                "token account resolution is only available on the token ledger".to_string(),
            ));
        }
        self.with_deadline(self.resolver.resolve(self.rpc.as_ref(), account))
            .await
    }

    /// Returns the transaction data for `tx_id`.
    pub async fn get_transaction(
        &self,
        tx_id: &[u8],
        opts: &CallOpts,
    ) -> Result<TransactionData, Error> {
        self.with_deadline(self.get_transaction_inner(tx_id, opts)).await
    }

    async fn get_transaction_inner(
        &self,
        tx_id: &[u8],
        opts: &CallOpts,
    ) -> Result<TransactionData, Error> {
        let version = self.current_version()?;
        retry_transient(&self.transient_policy, "get_transaction", || async {
            if version.is_legacy() {
                self.rpc
                    .get_legacy_transaction(tx_id)
                    .await
                    .map_err(|e| e.into_transaction_error())
            } else {
                self.rpc
                    .get_token_transaction(tx_id, self.commitment(opts))
                    .await
                    .map_err(|e| e.into_transaction_error())
            }
        })
        .await
    }

    /// Submits a single payment; returns the transaction id.
    pub async fn submit_payment(
        &self,
        payment: &Payment,
        opts: &CallOpts,
    ) -> Result<Vec<u8>, Error> {
        self.with_deadline(self.submit_payment_inner(payment, opts)).await
    }

    async fn submit_payment_inner(
        &self,
        payment: &Payment,
        opts: &CallOpts,
    ) -> Result<Vec<u8>, Error> {
        let version = self.current_version()?;

        // Fail fast, before any network call.
        if payment.invoice.is_some() && self.config.app_index == 0 {
            return Err(Error::Validation(
                "cannot submit a payment with an invoice without an app index".to_string(),
            ));
        }
        if payment.invoice.is_some() && payment.memo.is_some() {
            return Err(Error::Validation(
                "cannot have an invoice set when a text memo is set".to_string(),
            ));
        }

        let result = if version.is_legacy() {
            match self.submit_legacy_payment(payment, version).await {
                Err(Error::LedgerMigrated) => {
                    self.upgrade_to_token();
                    self.submit_token_payment_with_resolution(payment, opts).await?
                }
                other => other?,
            }
        } else {
            self.submit_token_payment_with_resolution(payment, opts).await?
        };

        surface_payment_result(result)
    }

    async fn submit_legacy_payment(
        &self,
        payment: &Payment,
        version: LedgerVersion,
    ) -> Result<SubmitTransactionResult, Error> {
        let ledger = self.legacy_ledger(version)?;
        let (envelope, signers, invoice_list) =
            ledger.assemble_payment(payment, self.config.app_index)?;
        ledger
            .sign_and_submit(self.rpc.as_ref(), &signers, envelope, invoice_list.as_ref())
            .await
    }

    /// Token submission with the one-shot resolve-then-resubmit fallback.
    /// Recursion depth is capped at one by construction: the fallback calls
    /// the plain submission path, never itself.
    async fn submit_token_payment_with_resolution(
        &self,
        payment: &Payment,
        opts: &CallOpts,
    ) -> Result<SubmitTransactionResult, Error> {
        let service_config = self
            .rpc
            .get_service_config()
            .await
            .map_err(|e| e.into_account_error())?;
        if service_config.subsidizer.is_none() && opts.subsidizer.is_none() {
            return Err(Error::NoSubsidizer);
        }

        let result = self
            .submit_token_payment(payment, &service_config, None, opts)
            .await?;
        if result.errors.tx_error != Some(Error::AccountDoesNotExist) {
            return Ok(result);
        }

        let mut transfer_sender = None;
        // The caller's payment is never mutated; resolution substitutes
        // fields on a copy.
        let mut resolved = payment.clone();
        let mut resubmit = false;

        if opts.sender_resolution == AccountResolution::Preferred {
            let accounts = self
                .resolver
                .resolve(self.rpc.as_ref(), &payment.sender.public_key())
                .await?;
            if let Some(first) = accounts.first() {
                transfer_sender = Some(*first);
                resubmit = true;
            }
        }
        if opts.dest_resolution == AccountResolution::Preferred {
            let accounts = self
                .resolver
                .resolve(self.rpc.as_ref(), &payment.destination)
                .await?;
            if let Some(first) = accounts.first() {
                resolved.destination = *first;
                resubmit = true;
            }
        }

        if !resubmit {
            return Ok(result);
        }
        debug!("resubmitting payment with resolved accounts");
        self.submit_token_payment(&resolved, &service_config, transfer_sender, opts)
            .await
    }

    async fn submit_token_payment(
        &self,
        payment: &Payment,
        service_config: &ServiceConfig,
        transfer_sender: Option<PublicKey>,
        opts: &CallOpts,
    ) -> Result<SubmitTransactionResult, Error> {
        let (tx, signers, invoice_list) = self.token.assemble_payment(
            payment,
            service_config,
            transfer_sender,
            opts.subsidizer.as_ref(),
            self.config.app_index,
        )?;
        self.token
            .sign_and_submit(
                self.rpc.as_ref(),
                &signers,
                tx,
                self.commitment(opts),
                invoice_list.as_ref(),
                payment.dedupe_id.as_deref(),
            )
            .await
    }

    /// Submits a batch of earns in a single transaction.
    pub async fn submit_earn_batch(
        &self,
        batch: &EarnBatch,
        opts: &CallOpts,
    ) -> Result<EarnBatchResult, Error> {
        self.with_deadline(self.submit_earn_batch_inner(batch, opts)).await
    }

    async fn submit_earn_batch_inner(
        &self,
        batch: &EarnBatch,
        opts: &CallOpts,
    ) -> Result<EarnBatchResult, Error> {
        let version = self.current_version()?;
        validate_earn_batch(batch, self.config.app_index)?;

        let submit_result = if version.is_legacy() {
            match self.submit_legacy_earn_batch(batch, version).await {
                Err(Error::LedgerMigrated) => {
                    self.upgrade_to_token();
                    self.submit_token_earn_batch_with_resolution(batch, opts).await?
                }
                other => other?,
            }
        } else {
            self.submit_token_earn_batch_with_resolution(batch, opts).await?
        };

        let mut result = EarnBatchResult {
            tx_id: submit_result.id.clone(),
            tx_error: None,
            earn_errors: Vec::new(),
        };

        if let Some(tx_error) = submit_result.errors.tx_error {
            result.tx_error = Some(tx_error);
            result.earn_errors = submit_result
                .errors
                .payment_errors
                .iter()
                .enumerate()
                .filter_map(|(i, e)| {
                    e.clone().map(|error| EarnError {
                        earn_index: i,
                        error,
                    })
                })
                .collect();
        } else if !submit_result.invoice_errors.is_empty() {
            result.tx_error = Some(Error::TransactionRejected);
            result.earn_errors = submit_result
                .invoice_errors
                .iter()
                .map(|e| EarnError {
                    earn_index: e.op_index,
                    error: e.clone().into(),
                })
                .collect();
        }

        Ok(result)
    }

    async fn submit_legacy_earn_batch(
        &self,
        batch: &EarnBatch,
        version: LedgerVersion,
    ) -> Result<SubmitTransactionResult, Error> {
        let ledger = self.legacy_ledger(version)?;
        let (envelope, signers, invoice_list) =
            ledger.assemble_earn_batch(batch, self.config.app_index)?;
        let result = ledger
            .sign_and_submit(self.rpc.as_ref(), &signers, envelope, invoice_list.as_ref())
            .await?;

        // Invoice errors on an earn submission indicate a protocol mismatch
        // with the service, not a per-earn failure.
        if !result.invoice_errors.is_empty() {
            warn!("service reported invoice errors on an earn batch");
            return Err(Error::Internal(
                "unexpected invoice errors present".to_string(),
            ));
        }
        Ok(result)
    }

    async fn submit_token_earn_batch_with_resolution(
        &self,
        batch: &EarnBatch,
        opts: &CallOpts,
    ) -> Result<SubmitTransactionResult, Error> {
        let service_config = self
            .rpc
            .get_service_config()
            .await
            .map_err(|e| e.into_account_error())?;
        if service_config.subsidizer.is_none() && opts.subsidizer.is_none() {
            return Err(Error::NoSubsidizer);
        }

        let result = self
            .submit_token_earn_batch(batch, &service_config, None, opts)
            .await?;
        if result.errors.tx_error != Some(Error::AccountDoesNotExist) {
            return Ok(result);
        }

        let mut transfer_sender = None;
        let mut resolved = batch.clone();
        let mut resubmit = false;

        if opts.sender_resolution == AccountResolution::Preferred {
            let accounts = self
                .resolver
                .resolve(self.rpc.as_ref(), &batch.sender.public_key())
                .await?;
            if let Some(first) = accounts.first() {
                transfer_sender = Some(*first);
                resubmit = true;
            }
        }
        if opts.dest_resolution == AccountResolution::Preferred {
            for earn in resolved.earns.iter_mut() {
                let accounts = self
                    .resolver
                    .resolve(self.rpc.as_ref(), &earn.destination)
                    .await?;
                if let Some(first) = accounts.first() {
                    earn.destination = *first;
                    resubmit = true;
                }
            }
        }

        if !resubmit {
            return Ok(result);
        }
        debug!("resubmitting earn batch with resolved accounts");
        self.submit_token_earn_batch(&resolved, &service_config, transfer_sender, opts)
            .await
    }

    async fn submit_token_earn_batch(
        &self,
        batch: &EarnBatch,
        service_config: &ServiceConfig,
        transfer_sender: Option<PublicKey>,
        opts: &CallOpts,
    ) -> Result<SubmitTransactionResult, Error> {
        let (tx, signers, invoice_list) = self.token.assemble_earn_batch(
            batch,
            service_config,
            transfer_sender,
            opts.subsidizer.as_ref(),
            self.config.app_index,
        )?;
        self.token
            .sign_and_submit(
                self.rpc.as_ref(),
                &signers,
                tx,
                self.commitment(opts),
                invoice_list.as_ref(),
                batch.dedupe_id.as_deref(),
            )
            .await
    }

    /// Requests an airdrop of `quarks` to `account`. Token ledger only;
    /// the service enforces a per-call cap.
    pub async fn request_airdrop(
        &self,
        account: &PublicKey,
        quarks: u64,
        opts: &CallOpts,
    ) -> Result<Vec<u8>, Error> {
        if self.current_version()? != LedgerVersion::Token4 {
            return Err(Error::Config(
                "airdrops are only available on the token ledger".to_string(),
            ));
        }
        let commitment = self.commitment(opts);
        self.with_deadline(retry_transient(
            &self.transient_policy,
            "request_airdrop",
            || async {
                self.rpc
                    .request_airdrop(account, quarks, commitment)
                    .await
                    .map_err(|e| e.into_account_error())
            },
        ))
        .await
    }

    /// Minimum balance exempting an account of `size` bytes from rent.
    /// Token ledger only.
    pub async fn get_minimum_balance_for_rent_exemption(&self, size: u64) -> Result<u64, Error> {
        if self.current_version()? != LedgerVersion::Token4 {
            return Err(Error::Config(
                "rent exemption is only available on the token ledger".to_string(),
            ));
        }
        self.with_deadline(retry_transient(
            &self.transient_policy,
            "get_minimum_balance_for_rent_exemption",
            || async {
                self.rpc
                    .get_minimum_balance_for_rent_exemption(size)
                    .await
                    .map_err(|e| e.into_account_error())
            },
        ))
        .await
    }

    /// Opens the account event stream. Token ledger only. The caller
    /// drains the channel; it closes when the stream terminates.
    pub async fn get_events(
        &self,
        account: &PublicKey,
    ) -> Result<mpsc::Receiver<AccountEvent>, Error> {
        if self.current_version()? != LedgerVersion::Token4 {
            return Err(Error::Config(
                "event streams are only available on the token ledger".to_string(),
            ));
        }
        self.rpc
            .get_events(account)
            .await
            .map_err(|e| e.into_account_error())
    }
}

/// Applies the error precedence for a single payment: per-operation error,
/// then top-level transaction error, then invoice errors. Exactly one
/// category is surfaced.
fn surface_payment_result(result: SubmitTransactionResult) -> Result<Vec<u8>, Error> {
    let op_errors: Vec<&Error> = result
        .errors
        .payment_errors
        .iter()
        .flatten()
        .collect();
    if !op_errors.is_empty() {
        if op_errors.len() != 1 {
            return Err(Error::Unexpected(format!(
                "invalid number of payment errors: expected 0 or 1, got {}",
                op_errors.len()
            )));
        }
        return Err(op_errors[0].clone());
    }

    if let Some(tx_error) = result.errors.tx_error {
        return Err(tx_error);
    }

    if !result.invoice_errors.is_empty() {
        if result.invoice_errors.len() != 1 {
            return Err(Error::Unexpected(format!(
                "invalid number of invoice errors: expected 0 or 1, got {}",
                result.invoice_errors.len()
            )));
        }
        return Err(result.invoice_errors[0].clone().into());
    }

    Ok(result.id)
}

/// Shape validation for earn batches; runs before any network call.
fn validate_earn_batch(batch: &EarnBatch, app_index: u16) -> Result<(), Error> {
    if batch.earns.is_empty() {
        return Err(Error::Validation(
            "an earn batch must contain at least 1 earn".to_string(),
        ));
    }
    if batch.earns.len() > MAX_EARN_BATCH_SIZE {
        return Err(Error::Validation(format!(
            "an earn batch must not contain more than {MAX_EARN_BATCH_SIZE} earns"
        )));
    }

    if batch.memo.is_some() {
        if batch.earns.iter().any(|e| e.invoice.is_some()) {
            return Err(Error::Validation(
                "cannot have an invoice set when a text memo is set".to_string(),
            ));
        }
        return Ok(());
    }

    if batch.earns[0].invoice.is_some() && app_index == 0 {
        return Err(Error::Validation(
            "cannot submit an earn batch with invoices without an app index".to_string(),
        ));
    }
    let with_invoice = batch.earns.iter().filter(|e| e.invoice.is_some()).count();
    if with_invoice != 0 && with_invoice != batch.earns.len() {
        return Err(Error::Validation(
            "either all or none of the earns should have an invoice set".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Earn;

    fn earn(with_invoice: bool) -> Earn {
        Earn {
            destination: PrivateKey::generate().public_key(),
            quarks: 1,
            invoice: with_invoice.then(|| crate::types::Invoice { items: vec![] }),
        }
    }

    fn batch(earns: Vec<Earn>) -> EarnBatch {
        EarnBatch {
            sender: PrivateKey::generate(),
            channel: None,
            memo: None,
            earns,
            dedupe_id: None,
        }
    }

    #[test]
    fn test_batch_size_bounds() {
        assert!(validate_earn_batch(&batch(vec![]), 1).is_err());
        assert!(validate_earn_batch(&batch((0..16).map(|_| earn(false)).collect()), 1).is_err());
        assert!(validate_earn_batch(&batch((0..15).map(|_| earn(false)).collect()), 1).is_ok());
    }

    #[test]
    fn test_mixed_invoices_rejected() {
        let mixed = batch(vec![earn(true), earn(false)]);
        assert!(validate_earn_batch(&mixed, 1).is_err());

        let all = batch(vec![earn(true), earn(true)]);
        assert!(validate_earn_batch(&all, 1).is_ok());

        let none = batch(vec![earn(false), earn(false)]);
        assert!(validate_earn_batch(&none, 1).is_ok());
    }

    #[test]
    fn test_invoices_require_app_index() {
        let all = batch(vec![earn(true), earn(true)]);
        assert!(validate_earn_batch(&all, 0).is_err());
    }

    #[test]
    fn test_memo_excludes_invoices() {
        let mut b = batch(vec![earn(true)]);
        b.memo = Some("memo".to_string());
        assert!(validate_earn_batch(&b, 1).is_err());

        let mut b = batch(vec![earn(false)]);
        b.memo = Some("memo".to_string());
        assert!(validate_earn_batch(&b, 1).is_ok());
    }

    #[test]
    fn test_payment_precedence_prefers_op_error() {
        let result = SubmitTransactionResult {
            id: vec![1],
            errors: crate::errors::TransactionErrors {
                tx_error: Some(Error::TransactionRejected),
                payment_errors: vec![Some(Error::InsufficientBalance)],
            },
            invoice_errors: vec![],
        };
        assert_eq!(
            surface_payment_result(result).unwrap_err(),
            Error::InsufficientBalance
        );
    }

    #[test]
    fn test_payment_precedence_tx_error_then_invoice() {
        let result = SubmitTransactionResult {
            id: vec![1],
            errors: crate::errors::TransactionErrors {
                tx_error: Some(Error::TransactionRejected),
                payment_errors: vec![None],
            },
            invoice_errors: vec![crate::errors::InvoiceError {
                op_index: 0,
                reason: crate::errors::InvoiceErrorReason::AlreadyPaid,
            }],
        };
        assert_eq!(
            surface_payment_result(result).unwrap_err(),
            Error::TransactionRejected
        );

        let result = SubmitTransactionResult {
            id: vec![1],
            errors: Default::default(),
            invoice_errors: vec![crate::errors::InvoiceError {
                op_index: 0,
                reason: crate::errors::InvoiceErrorReason::SkuNotFound,
            }],
        };
        assert_eq!(
            surface_payment_result(result).unwrap_err(),
            Error::Invoice {
                op_index: 0,
                reason: crate::errors::InvoiceErrorReason::SkuNotFound,
            }
        );
    }

    #[test]
    fn test_payment_success_returns_id() {
        let result = SubmitTransactionResult {
            id: vec![9, 9],
            errors: Default::default(),
            invoice_errors: vec![],
        };
        assert_eq!(surface_payment_result(result).unwrap(), vec![9, 9]);
    }
}
