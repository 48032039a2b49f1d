//! Legacy (sequence-number) ledger strategy
//!
//! One payment operation per earn/payment, all sharing a single envelope.
//! The fee scales linearly with the operation count, and the sequence
//! number embedded in the signed payload forces a full re-sign on every
//! submission attempt.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::LEGACY2_ASSET_CODE;
use crate::errors::{Error, SubmitTransactionResult};
use crate::keys::{PrivateKey, PublicKey, SIGNATURE_LEN};
use crate::ledger::{select_memo, MemoSpec};
use crate::memo::Memo;
use crate::rpc::LedgerRpc;
use crate::types::{
    EarnBatch, InvoiceList, LedgerVersion, Payment, ReadOnlyPayment, TransactionType,
};

/// Fee charged per operation, in the ledger's base unit.
pub const BASE_FEE: u32 = 100;

/// Asset transferred by a payment operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Asset {
    Native,
    Alphanum4 { code: [u8; 4], issuer: PublicKey },
}

/// A single payment operation inside an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOp {
    /// Defaults to the envelope source when absent.
    pub source: Option<PublicKey>,
    pub destination: PublicKey,
    /// Amount in the ledger's base unit (not necessarily quarks).
    pub amount: i64,
    pub asset: Asset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvelopeMemo {
    None,
    Text(String),
    Hash([u8; 32]),
}

/// Unsigned legacy transaction envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub source: PublicKey,
    pub fee: u32,
    pub sequence: i64,
    pub memo: EnvelopeMemo,
    pub operations: Vec<PaymentOp>,
}

impl Envelope {
    /// Digest that is both the signing payload and the transaction id:
    /// SHA-256 over the network id hash and the canonical envelope bytes.
    pub fn tx_hash(&self, network_id: &str) -> Result<[u8; 32], Error> {
        let body = bincode::serialize(self)
            .map_err(|e| Error::Internal(format!("failed to serialize envelope: {e}")))?;
        let mut hasher = Sha256::new();
        hasher.update(Sha256::digest(network_id.as_bytes()));
        hasher.update(&body);
        Ok(hasher.finalize().into())
    }
}

/// An envelope plus the signatures collected over its hash.
#[derive(Debug, Clone)]
pub struct SignedEnvelope {
    pub envelope: Envelope,
    pub signatures: Vec<[u8; SIGNATURE_LEN]>,
}

/// Strategy for the two legacy protocol generations.
#[derive(Debug, Clone)]
pub struct LegacyLedger {
    version: LedgerVersion,
    network_id: String,
    /// Fixed asset issuer; required on Legacy2 only.
    issuer: Option<PublicKey>,
    whitelist_key: Option<PrivateKey>,
    max_nonce_retries: u32,
}

impl LegacyLedger {
    pub fn new(
        version: LedgerVersion,
        network_id: String,
        issuer: Option<PublicKey>,
        whitelist_key: Option<PrivateKey>,
        max_nonce_retries: u32,
    ) -> Result<Self, Error> {
        if !version.is_legacy() {
            return Err(Error::Config(format!(
                "not a legacy ledger version: {}",
                version.value()
            )));
        }
        if version == LedgerVersion::Legacy2 && issuer.is_none() {
            return Err(Error::Config(
                "legacy v2 requires an asset issuer".to_string(),
            ));
        }
        Ok(Self {
            version,
            network_id,
            issuer,
            whitelist_key,
            max_nonce_retries,
        })
    }

    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    /// Legacy2 settles in a base unit 100x finer than the quark.
    fn base_amount(&self, quarks: i64) -> i64 {
        match self.version {
            LedgerVersion::Legacy2 => quarks * 100,
            _ => quarks,
        }
    }

    fn asset(&self) -> Asset {
        match (self.version, self.issuer) {
            (LedgerVersion::Legacy2, Some(issuer)) => Asset::Alphanum4 {
                code: LEGACY2_ASSET_CODE,
                issuer,
            },
            _ => Asset::Native,
        }
    }

    /// Channel key, when present and distinct from the sender, becomes the
    /// envelope source and first signer (it pays the fee and provides the
    /// sequence number).
    fn signers(sender: &PrivateKey, channel: Option<&PrivateKey>) -> Vec<PrivateKey> {
        match channel {
            Some(ch) if ch != sender => vec![ch.clone(), sender.clone()],
            _ => vec![sender.clone()],
        }
    }

    pub fn assemble_payment(
        &self,
        payment: &Payment,
        app_index: u16,
    ) -> Result<(Envelope, Vec<PrivateKey>, Option<InvoiceList>), Error> {
        let signers = Self::signers(&payment.sender, payment.channel.as_ref());
        let sender = payment.sender.public_key();

        let invoices = payment.invoice.clone().map(|inv| InvoiceList {
            invoices: vec![inv],
        });
        let (memo, invoice_list) =
            select_memo(payment.memo.as_deref(), invoices, app_index, payment.tx_type)?;

        let envelope = Envelope {
            source: signers[0].public_key(),
            fee: BASE_FEE,
            sequence: 0,
            memo: envelope_memo(memo),
            operations: vec![PaymentOp {
                source: Some(sender),
                destination: payment.destination,
                amount: self.base_amount(payment.quarks),
                asset: self.asset(),
            }],
        };

        Ok((envelope, signers, invoice_list))
    }

    pub fn assemble_earn_batch(
        &self,
        batch: &EarnBatch,
        app_index: u16,
    ) -> Result<(Envelope, Vec<PrivateKey>, Option<InvoiceList>), Error> {
        let signers = Self::signers(&batch.sender, batch.channel.as_ref());
        let sender = batch.sender.public_key();

        let invoices = if batch.earns.iter().any(|e| e.invoice.is_some()) {
            Some(InvoiceList {
                invoices: batch
                    .earns
                    .iter()
                    .filter_map(|e| e.invoice.clone())
                    .collect(),
            })
        } else {
            None
        };
        let (memo, invoice_list) = select_memo(
            batch.memo.as_deref(),
            invoices,
            app_index,
            TransactionType::Earn,
        )?;

        let operations = batch
            .earns
            .iter()
            .map(|earn| PaymentOp {
                source: Some(sender),
                destination: earn.destination,
                amount: self.base_amount(earn.quarks),
                asset: self.asset(),
            })
            .collect::<Vec<_>>();

        let envelope = Envelope {
            source: signers[0].public_key(),
            fee: BASE_FEE * operations.len() as u32,
            sequence: 0,
            memo: envelope_memo(memo),
            operations,
        };

        Ok((envelope, signers, invoice_list))
    }

    /// Signs with every provided signer, then co-signs with the whitelist
    /// key when none of the raw signers already is that key. The check is
    /// exact key equality on the provided list only.
    pub fn sign_envelope(
        &self,
        envelope: &Envelope,
        signers: &[PrivateKey],
    ) -> Result<SignedEnvelope, Error> {
        let payload = envelope.tx_hash(&self.network_id)?;
        let mut signatures: Vec<[u8; SIGNATURE_LEN]> =
            signers.iter().map(|s| s.sign(&payload)).collect();

        if let Some(whitelist) = &self.whitelist_key {
            let already_signed = signers.iter().any(|s| s == whitelist);
            if !already_signed {
                signatures.push(whitelist.sign(&payload));
            }
        }

        Ok(SignedEnvelope {
            envelope: envelope.clone(),
            signatures,
        })
    }

    /// Fetches the source sequence number once, then submits with
    /// `sequence + offset`, bumping the offset and re-signing on each
    /// bad-sequence outcome, up to the configured attempt bound.
    pub async fn sign_and_submit(
        &self,
        rpc: &dyn LedgerRpc,
        signers: &[PrivateKey],
        mut envelope: Envelope,
        invoice_list: Option<&InvoiceList>,
    ) -> Result<SubmitTransactionResult, Error> {
        let source = signers[0].public_key();
        let info = rpc
            .get_legacy_account_info(&source)
            .await
            .map_err(|e| e.into_account_error())?;

        let mut offset: i64 = 1;
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            envelope.sequence = info.sequence_number + offset;

            let signed = self.sign_envelope(&envelope, signers)?;
            let raw = rpc
                .submit_legacy_transaction(&signed, invoice_list)
                .await
                .map_err(|e| e.into_transaction_error())?;
            let result = SubmitTransactionResult::from_raw(raw)?;

            if result.errors.tx_error == Some(Error::BadNonce) && attempt < self.max_nonce_retries
            {
                debug!(
                    attempt,
                    max_attempts = self.max_nonce_retries,
                    "bad sequence number, retrying with next offset"
                );
                offset += 1;
                continue;
            }
            return Ok(result);
        }
    }
}

fn envelope_memo(memo: MemoSpec) -> EnvelopeMemo {
    match memo {
        MemoSpec::None => EnvelopeMemo::None,
        MemoSpec::Text(text) => EnvelopeMemo::Text(text),
        MemoSpec::Structured(m) => EnvelopeMemo::Hash(*m.as_bytes()),
    }
}

/// Reconstructs read-only payment views from an envelope, attaching
/// invoices by operation index when the bound list covers every
/// operation.
pub fn parse_payments_from_envelope(
    envelope: &Envelope,
    invoice_list: Option<&InvoiceList>,
    version: LedgerVersion,
) -> Result<Vec<ReadOnlyPayment>, Error> {
    if let Some(il) = invoice_list {
        if il.invoices.len() != envelope.operations.len() {
            return Err(Error::Validation(format!(
                "invoice count ({}) does not match operation count ({})",
                il.invoices.len(),
                envelope.operations.len()
            )));
        }
    }

    let (text_memo, tx_type) = match &envelope.memo {
        EnvelopeMemo::None => (None, TransactionType::Unknown),
        EnvelopeMemo::Text(text) => (Some(text.clone()), TransactionType::Unknown),
        EnvelopeMemo::Hash(bytes) => {
            let memo = Memo::from_bytes(*bytes);
            let t = if memo.is_valid() {
                memo.transaction_type()
            } else {
                TransactionType::Unknown
            };
            (None, t)
        }
    };

    let payments = envelope
        .operations
        .iter()
        .enumerate()
        .map(|(i, op)| ReadOnlyPayment {
            sender: op.source.unwrap_or(envelope.source),
            destination: op.destination,
            tx_type,
            quarks: match version {
                LedgerVersion::Legacy2 => op.amount / 100,
                _ => op.amount,
            },
            memo: text_memo.clone(),
            invoice: invoice_list.map(|il| il.invoices[i].clone()),
        })
        .collect();

    Ok(payments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memo::invoice_list_hash;
    use crate::types::{Earn, Invoice, LineItem};

    fn test_ledger(version: LedgerVersion) -> LegacyLedger {
        let issuer = (version == LedgerVersion::Legacy2)
            .then(|| PrivateKey::generate().public_key());
        LegacyLedger::new(version, "test network".to_string(), issuer, None, 3).unwrap()
    }

    fn payment(quarks: i64) -> Payment {
        Payment::new(
            PrivateKey::generate(),
            PrivateKey::generate().public_key(),
            TransactionType::Spend,
            quarks,
        )
    }

    #[test]
    fn test_v2_requires_issuer() {
        assert!(
            LegacyLedger::new(LedgerVersion::Legacy2, "net".to_string(), None, None, 3).is_err()
        );
    }

    #[test]
    fn test_v2_scales_amounts_and_uses_issued_asset() {
        let ledger = test_ledger(LedgerVersion::Legacy2);
        let (envelope, _, _) = ledger.assemble_payment(&payment(100_000), 0).unwrap();

        assert_eq!(envelope.operations[0].amount, 10_000_000);
        assert!(matches!(
            envelope.operations[0].asset,
            Asset::Alphanum4 { code, .. } if code == LEGACY2_ASSET_CODE
        ));
    }

    #[test]
    fn test_v3_uses_native_asset_and_quarks() {
        let ledger = test_ledger(LedgerVersion::Legacy3);
        let (envelope, _, _) = ledger.assemble_payment(&payment(100_000), 0).unwrap();

        assert_eq!(envelope.operations[0].amount, 100_000);
        assert_eq!(envelope.operations[0].asset, Asset::Native);
    }

    #[test]
    fn test_text_memo_payment() {
        let ledger = test_ledger(LedgerVersion::Legacy3);
        let mut p = payment(100_000);
        p.memo = Some("1-test".to_string());

        let (envelope, _, invoice_list) = ledger.assemble_payment(&p, 1).unwrap();
        assert_eq!(envelope.memo, EnvelopeMemo::Text("1-test".to_string()));
        assert!(invoice_list.is_none());
    }

    #[test]
    fn test_invoice_payment_embeds_hash_memo() {
        let ledger = test_ledger(LedgerVersion::Legacy3);
        let mut p = payment(100_000);
        p.invoice = Some(Invoice {
            items: vec![LineItem {
                title: "TestPayment".to_string(),
                description: String::new(),
                amount: 100_000,
                sku: b"some opaque sku".to_vec(),
            }],
        });

        let (envelope, _, invoice_list) = ledger.assemble_payment(&p, 1).unwrap();
        let il = invoice_list.expect("invoice list should be bound");
        let expected = invoice_list_hash(&il).unwrap();

        let EnvelopeMemo::Hash(bytes) = envelope.memo else {
            panic!("expected hash memo");
        };
        let memo = Memo::from_bytes(bytes);
        assert!(memo.is_valid());
        assert_eq!(&memo.foreign_key()[..28], &expected[..]);
    }

    #[test]
    fn test_batch_fee_scales_with_operations() {
        let ledger = test_ledger(LedgerVersion::Legacy3);
        let dest = PrivateKey::generate().public_key();
        let batch = EarnBatch {
            sender: PrivateKey::generate(),
            channel: None,
            memo: None,
            earns: (0..5)
                .map(|_| Earn {
                    destination: dest,
                    quarks: 1,
                    invoice: None,
                })
                .collect(),
            dedupe_id: None,
        };

        let (envelope, _, _) = ledger.assemble_earn_batch(&batch, 0).unwrap();
        assert_eq!(envelope.operations.len(), 5);
        assert_eq!(envelope.fee, 500);
    }

    #[test]
    fn test_channel_is_source_and_first_signer() {
        let ledger = test_ledger(LedgerVersion::Legacy3);
        let mut p = payment(10);
        let channel = PrivateKey::generate();
        p.channel = Some(channel.clone());

        let (envelope, signers, _) = ledger.assemble_payment(&p, 0).unwrap();
        assert_eq!(signers.len(), 2);
        assert_eq!(signers[0], channel);
        assert_eq!(envelope.source, channel.public_key());
        assert_eq!(
            envelope.operations[0].source,
            Some(p.sender.public_key())
        );
    }

    #[test]
    fn test_channel_equal_to_sender_collapses() {
        let ledger = test_ledger(LedgerVersion::Legacy3);
        let mut p = payment(10);
        p.channel = Some(p.sender.clone());

        let (_, signers, _) = ledger.assemble_payment(&p, 0).unwrap();
        assert_eq!(signers.len(), 1);
    }

    #[test]
    fn test_whitelist_co_signs_only_when_absent() {
        let whitelist = PrivateKey::generate();
        let ledger = LegacyLedger::new(
            LedgerVersion::Legacy3,
            "test network".to_string(),
            None,
            Some(whitelist.clone()),
            3,
        )
        .unwrap();

        let p = payment(10);
        let (envelope, signers, _) = ledger.assemble_payment(&p, 0).unwrap();
        let signed = ledger.sign_envelope(&envelope, &signers).unwrap();
        assert_eq!(signed.signatures.len(), 2);

        // Whitelist key already among the signers: no extra signature.
        let signed = ledger
            .sign_envelope(&envelope, &[whitelist.clone()])
            .unwrap();
        assert_eq!(signed.signatures.len(), 1);
    }

    #[test]
    fn test_signatures_verify_against_tx_hash() {
        let ledger = test_ledger(LedgerVersion::Legacy3);
        let p = payment(10);
        let (envelope, signers, _) = ledger.assemble_payment(&p, 0).unwrap();
        let signed = ledger.sign_envelope(&envelope, &signers).unwrap();

        let hash = envelope.tx_hash(ledger.network_id()).unwrap();
        assert!(signers[0]
            .public_key()
            .verify(&hash, &signed.signatures[0]));
    }

    #[test]
    fn test_parse_payments_round_trip() {
        let ledger = test_ledger(LedgerVersion::Legacy2);
        let p = payment(100_000);
        let (envelope, _, _) = ledger.assemble_payment(&p, 0).unwrap();

        let payments =
            parse_payments_from_envelope(&envelope, None, LedgerVersion::Legacy2).unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].quarks, 100_000);
        assert_eq!(payments[0].sender, p.sender.public_key());
        assert_eq!(payments[0].destination, p.destination);
    }

    #[test]
    fn test_parse_rejects_mismatched_invoice_count() {
        let ledger = test_ledger(LedgerVersion::Legacy3);
        let p = payment(10);
        let (envelope, _, _) = ledger.assemble_payment(&p, 0).unwrap();

        let il = InvoiceList {
            invoices: vec![
                Invoice { items: vec![] },
                Invoice { items: vec![] },
            ],
        };
        assert!(
            parse_payments_from_envelope(&envelope, Some(&il), LedgerVersion::Legacy3).is_err()
        );
    }
}
