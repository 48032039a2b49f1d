//! Token-account ledger strategy
//!
//! One transfer instruction per payment/earn, optionally preceded by a
//! single memo instruction. Blockhashes expire, so every submission
//! attempt fetches a fresh one and re-signs.

use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{Error, SubmitTransactionResult};
use crate::keys::{PrivateKey, PublicKey, SIGNATURE_LEN};
use crate::ledger::{select_memo, MemoSpec};
use crate::memo::{Memo, MEMO_LEN};
use crate::rpc::{LedgerRpc, ServiceConfig};
use crate::types::{
    Commitment, EarnBatch, InvoiceList, Payment, ReadOnlyPayment, TransactionType,
};

/// Well-known program recording plain-text memos on the token ledger.
pub const MEMO_PROGRAM_ID: PublicKey = PublicKey::new([
    0x4d, 0x65, 0x6d, 0x6f, 0x50, 0x72, 0x6f, 0x67, 0x72, 0x61, 0x6d, 0x31, 0x31, 0x31, 0x31,
    0x31, 0x31, 0x31, 0x31, 0x31, 0x31, 0x31, 0x31, 0x31, 0x31, 0x31, 0x31, 0x31, 0x31, 0x31,
    0x31, 0x31,
]);

/// Token-program opcode for a transfer between token accounts.
const TRANSFER_OPCODE: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMeta {
    pub key: PublicKey,
    pub is_signer: bool,
    pub is_writable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub program: PublicKey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

/// Emits `text` verbatim via the memo program.
pub fn memo_instruction(text: &str) -> Instruction {
    Instruction {
        program: MEMO_PROGRAM_ID,
        accounts: Vec::new(),
        data: text.as_bytes().to_vec(),
    }
}

/// Transfer of `amount` quarks between token accounts, authorized by the
/// owner of the source account.
pub fn transfer(
    token_program: PublicKey,
    source: PublicKey,
    destination: PublicKey,
    owner: PublicKey,
    amount: u64,
) -> Instruction {
    let mut data = Vec::with_capacity(9);
    data.push(TRANSFER_OPCODE);
    data.extend_from_slice(&amount.to_le_bytes());

    Instruction {
        program: token_program,
        accounts: vec![
            AccountMeta {
                key: source,
                is_signer: false,
                is_writable: true,
            },
            AccountMeta {
                key: destination,
                is_signer: false,
                is_writable: true,
            },
            AccountMeta {
                key: owner,
                is_signer: true,
                is_writable: false,
            },
        ],
        data,
    }
}

/// Token-ledger transaction. The payer funds fees/rent and is distinct
/// from the transfer owner whenever a subsidizer is configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenTransaction {
    pub payer: PublicKey,
    pub blockhash: [u8; 32],
    pub instructions: Vec<Instruction>,
    #[serde(skip)]
    pub signatures: Vec<[u8; SIGNATURE_LEN]>,
}

impl TokenTransaction {
    pub fn new(payer: PublicKey, instructions: Vec<Instruction>) -> Self {
        Self {
            payer,
            blockhash: [0u8; 32],
            instructions,
            signatures: Vec::new(),
        }
    }

    pub fn set_blockhash(&mut self, blockhash: [u8; 32]) {
        self.blockhash = blockhash;
    }

    /// Canonical bytes covered by every signature.
    pub fn message_bytes(&self) -> Result<Vec<u8>, Error> {
        bincode::serialize(self)
            .map_err(|e| Error::Internal(format!("failed to serialize transaction: {e}")))
    }

    /// Replaces any prior signatures; must be re-run after the blockhash
    /// changes.
    pub fn sign(&mut self, signers: &[PrivateKey]) -> Result<(), Error> {
        let message = self.message_bytes()?;
        self.signatures = signers.iter().map(|s| s.sign(&message)).collect();
        Ok(())
    }

    /// The transaction id: the first signature.
    pub fn signature(&self) -> Option<&[u8; SIGNATURE_LEN]> {
        self.signatures.first()
    }
}

/// Strategy for the token-account ledger.
#[derive(Debug, Clone)]
pub struct TokenLedger {
    max_nonce_retries: u32,
}

impl TokenLedger {
    pub fn new(max_nonce_retries: u32) -> Self {
        Self { max_nonce_retries }
    }

    fn payer_and_signers(
        sender: &PrivateKey,
        config: &ServiceConfig,
        subsidizer: Option<&PrivateKey>,
    ) -> Result<(PublicKey, Vec<PrivateKey>), Error> {
        match subsidizer {
            Some(sub) => Ok((sub.public_key(), vec![sub.clone(), sender.clone()])),
            None => {
                let payer = config.subsidizer.ok_or(Error::NoSubsidizer)?;
                Ok((payer, vec![sender.clone()]))
            }
        }
    }

    fn memo_spec_instruction(memo: MemoSpec) -> Option<Instruction> {
        match memo {
            MemoSpec::None => None,
            MemoSpec::Text(text) => Some(memo_instruction(&text)),
            MemoSpec::Structured(m) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(m.as_bytes());
                Some(memo_instruction(&encoded))
            }
        }
    }

    /// Builds the unsigned transaction for a single payment.
    ///
    /// `transfer_sender` overrides the source token account after
    /// resolution fallback; the owner authorizing the transfer is always
    /// the original sender key.
    pub fn assemble_payment(
        &self,
        payment: &Payment,
        config: &ServiceConfig,
        transfer_sender: Option<PublicKey>,
        subsidizer: Option<&PrivateKey>,
        app_index: u16,
    ) -> Result<(TokenTransaction, Vec<PrivateKey>, Option<InvoiceList>), Error> {
        let (payer, signers) = Self::payer_and_signers(&payment.sender, config, subsidizer)?;

        let invoices = payment.invoice.clone().map(|inv| InvoiceList {
            invoices: vec![inv],
        });
        let (memo, invoice_list) =
            select_memo(payment.memo.as_deref(), invoices, app_index, payment.tx_type)?;

        let mut instructions = Vec::new();
        if let Some(ix) = Self::memo_spec_instruction(memo) {
            instructions.push(ix);
        }

        let source = transfer_sender.unwrap_or_else(|| payment.sender.public_key());
        instructions.push(transfer(
            config.token_program,
            source,
            payment.destination,
            payment.sender.public_key(),
            payment.quarks as u64,
        ));

        Ok((TokenTransaction::new(payer, instructions), signers, invoice_list))
    }

    pub fn assemble_earn_batch(
        &self,
        batch: &EarnBatch,
        config: &ServiceConfig,
        transfer_sender: Option<PublicKey>,
        subsidizer: Option<&PrivateKey>,
        app_index: u16,
    ) -> Result<(TokenTransaction, Vec<PrivateKey>, Option<InvoiceList>), Error> {
        let (payer, signers) = Self::payer_and_signers(&batch.sender, config, subsidizer)?;

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

        let mut instructions = Vec::new();
        if let Some(ix) = Self::memo_spec_instruction(memo) {
            instructions.push(ix);
        }

        let owner = batch.sender.public_key();
        let source = transfer_sender.unwrap_or(owner);
        for earn in &batch.earns {
            instructions.push(transfer(
                config.token_program,
                source,
                earn.destination,
                owner,
                earn.quarks as u64,
            ));
        }

        Ok((TokenTransaction::new(payer, instructions), signers, invoice_list))
    }

    /// Fetches a fresh blockhash, re-signs, and submits; retries only on a
    /// bad-nonce outcome, up to the configured attempt bound. The dedupe
    /// identifier is forwarded unchanged on every attempt.
    pub async fn sign_and_submit(
        &self,
        rpc: &dyn LedgerRpc,
        signers: &[PrivateKey],
        mut tx: TokenTransaction,
        commitment: Commitment,
        invoice_list: Option<&InvoiceList>,
        dedupe_id: Option<&[u8]>,
    ) -> Result<SubmitTransactionResult, Error> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            let blockhash = rpc
                .get_recent_blockhash()
                .await
                .map_err(|e| e.into_transaction_error())?;
            tx.set_blockhash(blockhash);
            tx.sign(signers)?;

            let raw = rpc
                .submit_token_transaction(&tx, invoice_list, commitment, dedupe_id)
                .await
                .map_err(|e| e.into_transaction_error())?;
            let result = SubmitTransactionResult::from_raw(raw)?;

            if result.errors.tx_error == Some(Error::BadNonce) && attempt < self.max_nonce_retries
            {
                debug!(
                    attempt,
                    max_attempts = self.max_nonce_retries,
                    "stale blockhash, re-signing with a fresh one"
                );
                continue;
            }
            return Ok(result);
        }
    }
}

/// Reconstructs read-only payment views from a token transaction,
/// attaching invoices by transfer index when the bound list covers every
/// transfer.
pub fn parse_payments_from_transaction(
    tx: &TokenTransaction,
    invoice_list: Option<&InvoiceList>,
) -> Result<Vec<ReadOnlyPayment>, Error> {
    let mut text_memo = None;
    let mut tx_type = TransactionType::Unknown;
    let mut transfers = Vec::new();

    for ix in &tx.instructions {
        if ix.program == MEMO_PROGRAM_ID {
            let text = String::from_utf8_lossy(&ix.data).to_string();
            match decode_structured_memo(&text) {
                Some(memo) => tx_type = memo.transaction_type(),
                None => text_memo = Some(text),
            }
            continue;
        }

        if ix.data.first() == Some(&TRANSFER_OPCODE) {
            if ix.accounts.len() < 3 || ix.data.len() < 9 {
                return Err(Error::Validation(
                    "malformed transfer instruction".to_string(),
                ));
            }
            let mut amount_bytes = [0u8; 8];
            amount_bytes.copy_from_slice(&ix.data[1..9]);
            transfers.push((
                ix.accounts[0].key,
                ix.accounts[1].key,
                u64::from_le_bytes(amount_bytes),
            ));
        }
    }

    if let Some(il) = invoice_list {
        if il.invoices.len() != transfers.len() {
            return Err(Error::Validation(format!(
                "invoice count ({}) does not match transfer count ({})",
                il.invoices.len(),
                transfers.len()
            )));
        }
    }

    Ok(transfers
        .into_iter()
        .enumerate()
        .map(|(i, (source, destination, amount))| ReadOnlyPayment {
            sender: source,
            destination,
            tx_type,
            quarks: amount as i64,
            memo: text_memo.clone(),
            invoice: invoice_list.map(|il| il.invoices[i].clone()),
        })
        .collect())
}

fn decode_structured_memo(text: &str) -> Option<Memo> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(text)
        .ok()?;
    if bytes.len() != MEMO_LEN {
        return None;
    }
    let memo = Memo::try_from_slice(&bytes).ok()?;
    memo.is_valid().then_some(memo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Earn, Invoice, LineItem};

    fn service_config(with_subsidizer: bool) -> ServiceConfig {
        ServiceConfig {
            subsidizer: with_subsidizer.then(|| PrivateKey::generate().public_key()),
            token_program: PrivateKey::generate().public_key(),
            token: PrivateKey::generate().public_key(),
        }
    }

    fn payment(quarks: i64) -> Payment {
        Payment::new(
            PrivateKey::generate(),
            PrivateKey::generate().public_key(),
            TransactionType::P2p,
            quarks,
        )
    }

    #[test]
    fn test_transfer_instruction_layout() {
        let config = service_config(true);
        let source = PrivateKey::generate().public_key();
        let dest = PrivateKey::generate().public_key();
        let owner = PrivateKey::generate().public_key();

        let ix = transfer(config.token_program, source, dest, owner, 42);
        assert_eq!(ix.program, config.token_program);
        assert_eq!(ix.data[0], TRANSFER_OPCODE);
        assert_eq!(&ix.data[1..9], &42u64.to_le_bytes());
        assert_eq!(ix.accounts[0].key, source);
        assert_eq!(ix.accounts[1].key, dest);
        assert_eq!(ix.accounts[2].key, owner);
        assert!(ix.accounts[2].is_signer);
    }

    #[test]
    fn test_service_subsidizer_is_payer() {
        let ledger = TokenLedger::new(3);
        let config = service_config(true);
        let p = payment(10);

        let (tx, signers, _) = ledger
            .assemble_payment(&p, &config, None, None, 0)
            .unwrap();
        assert_eq!(tx.payer, config.subsidizer.unwrap());
        assert_eq!(signers.len(), 1);
        assert_eq!(signers[0], p.sender);
    }

    #[test]
    fn test_caller_subsidizer_signs_first() {
        let ledger = TokenLedger::new(3);
        let config = service_config(true);
        let p = payment(10);
        let subsidizer = PrivateKey::generate();

        let (tx, signers, _) = ledger
            .assemble_payment(&p, &config, None, Some(&subsidizer), 0)
            .unwrap();
        assert_eq!(tx.payer, subsidizer.public_key());
        assert_eq!(signers.len(), 2);
        assert_eq!(signers[0], subsidizer);
    }

    #[test]
    fn test_no_subsidizer_anywhere_fails() {
        let ledger = TokenLedger::new(3);
        let config = service_config(false);
        let p = payment(10);

        let err = ledger
            .assemble_payment(&p, &config, None, None, 0)
            .unwrap_err();
        assert_eq!(err, Error::NoSubsidizer);
    }

    #[test]
    fn test_structured_memo_precedes_transfer() {
        let ledger = TokenLedger::new(3);
        let config = service_config(true);
        let p = payment(10);

        let (tx, _, _) = ledger.assemble_payment(&p, &config, None, None, 1).unwrap();
        assert_eq!(tx.instructions.len(), 2);
        assert_eq!(tx.instructions[0].program, MEMO_PROGRAM_ID);

        let text = String::from_utf8(tx.instructions[0].data.clone()).unwrap();
        let memo = decode_structured_memo(&text).expect("memo should decode");
        assert_eq!(memo.app_index(), 1);
        assert_eq!(memo.transaction_type(), TransactionType::P2p);
    }

    #[test]
    fn test_resolved_source_overrides_transfer_only() {
        let ledger = TokenLedger::new(3);
        let config = service_config(true);
        let p = payment(10);
        let resolved = PrivateKey::generate().public_key();

        let (tx, _, _) = ledger
            .assemble_payment(&p, &config, Some(resolved), None, 0)
            .unwrap();
        let ix = &tx.instructions[0];
        assert_eq!(ix.accounts[0].key, resolved);
        // Owner stays the original sender.
        assert_eq!(ix.accounts[2].key, p.sender.public_key());
    }

    #[test]
    fn test_earn_batch_one_transfer_per_earn() {
        let ledger = TokenLedger::new(3);
        let config = service_config(true);
        let batch = EarnBatch {
            sender: PrivateKey::generate(),
            channel: None,
            memo: Some("batch memo".to_string()),
            earns: (0..4)
                .map(|i| Earn {
                    destination: PrivateKey::generate().public_key(),
                    quarks: i + 1,
                    invoice: None,
                })
                .collect(),
            dedupe_id: None,
        };

        let (tx, _, _) = ledger
            .assemble_earn_batch(&batch, &config, None, None, 0)
            .unwrap();
        // One memo instruction plus one transfer per earn.
        assert_eq!(tx.instructions.len(), 5);
        assert_eq!(tx.instructions[0].program, MEMO_PROGRAM_ID);
    }

    #[test]
    fn test_signing_covers_blockhash() {
        let ledger = TokenLedger::new(3);
        let config = service_config(true);
        let p = payment(10);

        let (mut tx, signers, _) =
            ledger.assemble_payment(&p, &config, None, None, 0).unwrap();
        tx.set_blockhash([7u8; 32]);
        tx.sign(&signers).unwrap();
        let first = tx.signatures[0];

        tx.set_blockhash([8u8; 32]);
        tx.sign(&signers).unwrap();
        assert_ne!(first, tx.signatures[0]);

        let message = tx.message_bytes().unwrap();
        assert!(signers[0].public_key().verify(&message, &tx.signatures[0]));
    }

    #[test]
    fn test_parse_payments_round_trip_with_invoices() {
        let ledger = TokenLedger::new(3);
        let config = service_config(true);
        let mut p = payment(25);
        p.invoice = Some(Invoice {
            items: vec![LineItem {
                title: "TestPayment".to_string(),
                description: String::new(),
                amount: 25,
                sku: vec![9],
            }],
        });

        let (tx, _, invoice_list) =
            ledger.assemble_payment(&p, &config, None, None, 1).unwrap();
        let payments =
            parse_payments_from_transaction(&tx, invoice_list.as_ref()).unwrap();

        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].quarks, 25);
        assert_eq!(payments[0].tx_type, TransactionType::P2p);
        assert_eq!(payments[0].invoice, p.invoice);
    }
}
