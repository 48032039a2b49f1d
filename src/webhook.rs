//! Webhook boundary
//!
//! Handlers for the two inbound callbacks the service delivers to an app:
//! sign-transaction requests and event notifications. Handlers are pure
//! functions from (headers, body) to a structured reply so they can be
//! mounted on any HTTP server. Invariants enforced here:
//!
//! - a request is rejected with 401 unless its HMAC-SHA256 signature over
//!   the raw body, keyed by the shared secret, matches exactly
//!   (constant-time compare); an empty secret disables verification
//! - an unsupported ledger-version tag is rejected with 400
//! - rejections carry a structured list of per-payment invoice errors

use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::keys::{PrivateKey, SIGNATURE_LEN};
use crate::ledger::legacy::{parse_payments_from_envelope, Envelope};
use crate::ledger::token::{parse_payments_from_transaction, TokenTransaction};
use crate::types::{InvoiceList, LedgerVersion, ReadOnlyPayment};

/// Header carrying the base64 HMAC-SHA256 signature of the request body.
pub const HMAC_HEADER: &str = "X-Quark-HMAC-SHA256";

/// Optional app-supplied user identity headers.
pub const APP_USER_ID_HEADER: &str = "X-App-User-ID";
pub const APP_USER_PASSKEY_HEADER: &str = "X-App-User-Passkey";

type HmacSha256 = Hmac<Sha256>;

/// The subset of request headers the handlers consume.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebhookHeaders<'a> {
    /// Value of [`HMAC_HEADER`].
    pub hmac_signature: Option<&'a str>,
    /// Value of [`APP_USER_ID_HEADER`].
    pub app_user_id: Option<&'a str>,
    /// Value of [`APP_USER_PASSKEY_HEADER`].
    pub app_user_passkey: Option<&'a str>,
}

/// Transport-agnostic reply: an HTTP status and a JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookReply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl WebhookReply {
    fn empty(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
        }
    }

    fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self { status, body },
            Err(_) => Self::empty(500),
        }
    }
}

/// Verifies the base64 HMAC-SHA256 signature over `body`. The comparison
/// is constant-time.
pub fn verify_hmac_signature(secret: &[u8], body: &[u8], signature_b64: &str) -> bool {
    let Ok(signature) = base64::engine::general_purpose::STANDARD.decode(signature_b64) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}

fn authorize(secret: &str, headers: &WebhookHeaders<'_>, body: &[u8]) -> bool {
    if secret.is_empty() {
        return true;
    }
    match headers.hmac_signature {
        Some(sig) => verify_hmac_signature(secret.as_bytes(), body, sig),
        None => false,
    }
}

/// Wire shape of a sign-transaction request body. Binary payloads are
/// base64-encoded canonical bytes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignTransactionRequestBody {
    /// Ledger version tag; zero (absent) defaults to legacy v3.
    #[serde(default)]
    pub ledger_version: u8,
    /// Legacy envelope, when the tag is a legacy version.
    #[serde(default)]
    pub envelope: Option<String>,
    /// Token transaction, when the tag is the token version.
    #[serde(default)]
    pub transaction: Option<String>,
    /// Signatures already collected over the payload.
    #[serde(default)]
    pub signatures: Vec<String>,
    /// Invoice list bound to the transaction.
    #[serde(default)]
    pub invoice_list: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    AlreadyPaid,
    WrongDestination,
    SkuNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedInvoice {
    pub operation_index: usize,
    pub reason: RejectionReason,
}

#[derive(Debug, Serialize, Deserialize)]
struct ForbiddenResponse {
    message: String,
    invoice_errors: Vec<RejectedInvoice>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SuccessResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    envelope: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    signatures: Vec<String>,
}

/// Decoded sign-transaction request handed to the app callback.
#[derive(Debug)]
pub struct SignTransactionRequest {
    pub user_id: Option<String>,
    pub user_passkey: Option<String>,
    /// Payments reconstructed from the raw transaction payload.
    pub payments: Vec<ReadOnlyPayment>,
    /// Raw legacy envelope, for further validation by the app. Legacy only.
    pub envelope: Option<Envelope>,
    /// Raw token transaction, for further validation by the app. Token only.
    pub transaction: Option<TokenTransaction>,
    network_id: String,
}

impl SignTransactionRequest {
    /// The id of the transaction being signed: a 32-byte envelope hash or
    /// the transaction's first 64-byte signature.
    pub fn tx_id(&self) -> Option<Vec<u8>> {
        if let Some(tx) = &self.transaction {
            return tx.signature().map(|s| s.to_vec());
        }
        if let Some(envelope) = &self.envelope {
            return envelope.tx_hash(&self.network_id).ok().map(|h| h.to_vec());
        }
        None
    }
}

/// Response under construction by the app callback.
#[derive(Debug)]
pub struct SignTransactionResponse {
    network_id: String,
    envelope: Option<Envelope>,
    signatures: Vec<[u8; SIGNATURE_LEN]>,
    rejected: bool,
    errors: Vec<RejectedInvoice>,
}

impl SignTransactionResponse {
    /// Co-signs a legacy envelope; a no-op for token transactions, whose
    /// signing happens server-side.
    pub fn sign(&mut self, key: &PrivateKey) -> Result<(), crate::errors::Error> {
        if let Some(envelope) = &self.envelope {
            let hash = envelope.tx_hash(&self.network_id)?;
            self.signatures.push(key.sign(&hash));
        }
        Ok(())
    }

    /// Rejects the transaction without reason.
    pub fn reject(&mut self) {
        self.rejected = true;
    }

    pub fn is_rejected(&self) -> bool {
        self.rejected
    }

    /// Marks the payment at `idx` as already paid for. Rejects the whole
    /// transaction.
    pub fn mark_already_paid(&mut self, idx: usize) {
        self.rejected = true;
        self.errors.push(RejectedInvoice {
            operation_index: idx,
            reason: RejectionReason::AlreadyPaid,
        });
    }

    /// Marks the payment at `idx` as bound to the wrong destination.
    /// Rejects the whole transaction.
    pub fn mark_wrong_destination(&mut self, idx: usize) {
        self.rejected = true;
        self.errors.push(RejectedInvoice {
            operation_index: idx,
            reason: RejectionReason::WrongDestination,
        });
    }

    /// Marks the payment at `idx` as carrying an unknown SKU. Rejects the
    /// whole transaction.
    pub fn mark_sku_not_found(&mut self, idx: usize) {
        self.rejected = true;
        self.errors.push(RejectedInvoice {
            operation_index: idx,
            reason: RejectionReason::SkuNotFound,
        });
    }
}

fn decode_b64(value: &str) -> Result<Vec<u8>, ()> {
    base64::engine::general_purpose::STANDARD
        .decode(value)
        .map_err(|_| ())
}

/// Handles a sign-transaction callback.
///
/// The app callback may sign, reject outright, or reject with per-payment
/// invoice errors; an error return produces a 500 and the service retries.
pub fn handle_sign_transaction<F>(
    environment: crate::types::Environment,
    secret: &str,
    headers: &WebhookHeaders<'_>,
    body: &[u8],
    callback: F,
) -> WebhookReply
where
    F: FnOnce(&SignTransactionRequest, &mut SignTransactionResponse) -> anyhow::Result<()>,
{
    if !authorize(secret, headers, body) {
        return WebhookReply::empty(401);
    }

    let Ok(mut wire) = serde_json::from_slice::<SignTransactionRequestBody>(body) else {
        return WebhookReply::empty(400);
    };
    if wire.ledger_version == 0 {
        wire.ledger_version = LedgerVersion::Legacy3.value();
    }
    let Ok(version) = LedgerVersion::from_value(wire.ledger_version) else {
        return WebhookReply::empty(400);
    };

    let invoice_list = match &wire.invoice_list {
        None => None,
        Some(encoded) => {
            let Ok(bytes) = decode_b64(encoded) else {
                return WebhookReply::empty(400);
            };
            match bincode::deserialize::<InvoiceList>(&bytes) {
                Ok(list) => Some(list),
                Err(_) => return WebhookReply::empty(400),
            }
        }
    };

    let network_id =
        crate::config::network_passphrase(environment, version).to_string();
    let mut request = SignTransactionRequest {
        user_id: headers.app_user_id.map(str::to_string),
        user_passkey: headers.app_user_passkey.map(str::to_string),
        payments: Vec::new(),
        envelope: None,
        transaction: None,
        network_id: network_id.clone(),
    };
    let mut response = SignTransactionResponse {
        network_id,
        envelope: None,
        signatures: Vec::new(),
        rejected: false,
        errors: Vec::new(),
    };

    if version == LedgerVersion::Token4 {
        let Some(encoded) = &wire.transaction else {
            return WebhookReply::empty(400);
        };
        let Ok(bytes) = decode_b64(encoded) else {
            return WebhookReply::empty(400);
        };
        let Ok(mut tx) = bincode::deserialize::<TokenTransaction>(&bytes) else {
            return WebhookReply::empty(400);
        };
        if let Ok(signatures) = decode_signatures(&wire.signatures) {
            tx.signatures = signatures;
        }
        match parse_payments_from_transaction(&tx, invoice_list.as_ref()) {
            Ok(payments) => request.payments = payments,
            Err(_) => return WebhookReply::empty(400),
        }
        request.transaction = Some(tx);
    } else {
        let Some(encoded) = &wire.envelope else {
            return WebhookReply::empty(400);
        };
        let Ok(bytes) = decode_b64(encoded) else {
            return WebhookReply::empty(400);
        };
        let Ok(envelope) = bincode::deserialize::<Envelope>(&bytes) else {
            return WebhookReply::empty(400);
        };
        match parse_payments_from_envelope(&envelope, invoice_list.as_ref(), version) {
            Ok(payments) => request.payments = payments,
            Err(_) => return WebhookReply::empty(400),
        }
        if let Ok(signatures) = decode_signatures(&wire.signatures) {
            response.signatures = signatures;
        }
        request.envelope = Some(envelope.clone());
        response.envelope = Some(envelope);
    }

    if callback(&request, &mut response).is_err() {
        return WebhookReply::empty(500);
    }

    if response.is_rejected() {
        return WebhookReply::json(
            403,
            &ForbiddenResponse {
                message: "rejected".to_string(),
                invoice_errors: response.errors,
            },
        );
    }

    let mut success = SuccessResponse::default();
    if let Some(envelope) = &response.envelope {
        let Ok(bytes) = bincode::serialize(envelope) else {
            return WebhookReply::empty(500);
        };
        success.envelope = Some(base64::engine::general_purpose::STANDARD.encode(bytes));
        success.signatures = response
            .signatures
            .iter()
            .map(|s| base64::engine::general_purpose::STANDARD.encode(s))
            .collect();
    }
    WebhookReply::json(200, &success)
}

fn decode_signatures(encoded: &[String]) -> Result<Vec<[u8; SIGNATURE_LEN]>, ()> {
    encoded
        .iter()
        .map(|s| {
            let bytes = decode_b64(s)?;
            let arr: [u8; SIGNATURE_LEN] = bytes.try_into().map_err(|_| ())?;
            Ok(arr)
        })
        .collect()
}

/// A single event notification delivered to the events webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Base58 account the event concerns.
    #[serde(default)]
    pub account: Option<String>,
    /// Base64 transaction id, for transaction events.
    #[serde(default)]
    pub tx_id: Option<String>,
    /// Balance in quarks, for balance-update events.
    #[serde(default)]
    pub quarks: Option<i64>,
}

/// Handles an events callback: a JSON array of events forwarded to the
/// app callback. A callback error produces a 500 and the service retries.
pub fn handle_events<F>(
    secret: &str,
    headers: &WebhookHeaders<'_>,
    body: &[u8],
    callback: F,
) -> WebhookReply
where
    F: FnOnce(Vec<WebhookEvent>) -> anyhow::Result<()>,
{
    if !authorize(secret, headers, body) {
        return WebhookReply::empty(401);
    }

    let Ok(events) = serde_json::from_slice::<Vec<WebhookEvent>>(body) else {
        return WebhookReply::empty(400);
    };

    if callback(events).is_err() {
        return WebhookReply::empty(500);
    }
    WebhookReply::empty(200)
}
