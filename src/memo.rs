//! Structured transaction memos
//!
//! A structured memo is a fixed 32-byte payload binding off-chain invoice
//! data to an on-chain transaction. Layout, most significant use first:
//!
//! ```text
//! byte 0: magic (2 bits) | format version (3 bits) | type, low 3 bits
//! byte 1: type, high 2 bits | app index, low 6 bits
//! byte 2: app index, middle 8 bits
//! byte 3: app index, high 2 bits | foreign key bits...
//! bytes 3..32: 230 bits of foreign key
//! ```
//!
//! The foreign key is the SHA-224 digest of the canonical serialization of
//! the transaction's invoice list, or all zeroes when there are none. Only
//! the first 230 bits fit; the last two bits of a 29-byte key are dropped.

use sha2::{Digest, Sha224};

use crate::errors::Error;
use crate::types::{InvoiceList, TransactionType};

/// Total size of an encoded memo.
pub const MEMO_LEN: usize = 32;

/// Size of an invoice-list digest.
pub const INVOICE_HASH_LEN: usize = 28;

/// Maximum number of foreign-key bytes that fit in a memo.
pub const MAX_FOREIGN_KEY_LEN: usize = 29;

const MAGIC_BYTE: u8 = 0x1;

/// A parsed or freshly built 32-byte structured memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Memo([u8; MEMO_LEN]);

impl Memo {
    /// Builds a memo from its parts. Deterministic; no side effects.
    ///
    /// `foreign_key` is typically an invoice-list hash and may be empty or
    /// up to 29 bytes; longer keys and format versions above 7 are
    /// rejected, as is the `Unknown` transaction type.
    pub fn new(
        version: u8,
        tx_type: TransactionType,
        app_index: u16,
        foreign_key: &[u8],
    ) -> Result<Self, Error> {
        if version > 7 {
            return Err(Error::Memo(format!("invalid memo version: {version}")));
        }
        if tx_type == TransactionType::Unknown {
            return Err(Error::Memo("transaction type is not encodable".to_string()));
        }
        if foreign_key.len() > MAX_FOREIGN_KEY_LEN {
            return Err(Error::Memo(format!(
                "invalid foreign key length: {}",
                foreign_key.len()
            )));
        }

        let v = version & 0x7;
        let t = (tx_type.value() as u8) & 0x1f;

        let mut m = [0u8; MEMO_LEN];
        m[0] = MAGIC_BYTE;
        m[0] |= v << 2;
        m[0] |= (t & 0x7) << 5;

        m[1] = (t & 0x18) >> 3;
        m[1] |= ((app_index & 0x3f) as u8) << 2;
        m[2] = ((app_index >> 6) & 0xff) as u8;
        m[3] = ((app_index >> 14) & 0x3) as u8;

        if !foreign_key.is_empty() {
            m[3] |= (foreign_key[0] & 0x3f) << 2;
            // Each output byte straddles two foreign-key bytes.
            for i in 4..(3 + foreign_key.len()) {
                m[i] = (foreign_key[i - 4] >> 6) & 0x3;
                m[i] |= (foreign_key[i - 3] & 0x3f) << 2;
            }
            if foreign_key.len() < MAX_FOREIGN_KEY_LEN {
                m[foreign_key.len() + 3] = (foreign_key[foreign_key.len() - 1] >> 6) & 0x3;
            }
        }

        Ok(Self(m))
    }

    pub fn from_bytes(bytes: [u8; MEMO_LEN]) -> Self {
        Self(bytes)
    }

    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != MEMO_LEN {
            return Err(Error::Memo(format!("invalid memo length: {}", bytes.len())));
        }
        let mut buf = [0u8; MEMO_LEN];
        buf.copy_from_slice(bytes);
        Ok(Self(buf))
    }

    pub fn as_bytes(&self) -> &[u8; MEMO_LEN] {
        &self.0
    }

    /// Whether the magic value marks this as a structured memo.
    pub fn is_valid(&self) -> bool {
        self.0[0] & 0x3 == MAGIC_BYTE
    }

    pub fn version(&self) -> u8 {
        (self.0[0] >> 2) & 0x7
    }

    pub fn transaction_type(&self) -> TransactionType {
        let raw = (self.0[0] >> 5) | ((self.0[1] & 0x3) << 3);
        TransactionType::from_value(raw as i16)
    }

    pub fn app_index(&self) -> u16 {
        ((self.0[1] >> 2) as u16)
            | ((self.0[2] as u16) << 6)
            | (((self.0[3] & 0x3) as u16) << 14)
    }

    /// Recovers the embedded foreign key. The final byte carries only six
    /// meaningful bits.
    pub fn foreign_key(&self) -> [u8; MAX_FOREIGN_KEY_LEN] {
        let mut fk = [0u8; MAX_FOREIGN_KEY_LEN];
        for i in 0..(MAX_FOREIGN_KEY_LEN - 1) {
            fk[i] = (self.0[i + 3] >> 2) | ((self.0[i + 4] & 0x3) << 6);
        }
        fk[MAX_FOREIGN_KEY_LEN - 1] = self.0[MEMO_LEN - 1] >> 2;
        fk
    }
}

/// Hashes the canonical serialization of an invoice list down to the
/// 28-byte fingerprint embedded in memos.
pub fn invoice_list_hash(list: &InvoiceList) -> Result<[u8; INVOICE_HASH_LEN], Error> {
    let bytes = bincode::serialize(list)
        .map_err(|e| Error::Memo(format!("failed to serialize invoice list: {e}")))?;
    let digest = Sha224::digest(&bytes);
    let mut out = [0u8; INVOICE_HASH_LEN];
    out.copy_from_slice(&digest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Invoice, LineItem};
    use proptest::prelude::*;

    fn invoice(title: &str, amount: i64) -> Invoice {
        Invoice {
            items: vec![LineItem {
                title: title.to_string(),
                description: String::new(),
                amount,
                sku: vec![1, 2, 3],
            }],
        }
    }

    #[test]
    fn test_memo_field_round_trip() {
        let fk = [0xABu8; INVOICE_HASH_LEN];
        let memo = Memo::new(1, TransactionType::P2p, 1, &fk).unwrap();

        assert!(memo.is_valid());
        assert_eq!(memo.version(), 1);
        assert_eq!(memo.transaction_type(), TransactionType::P2p);
        assert_eq!(memo.app_index(), 1);
        assert_eq!(&memo.foreign_key()[..INVOICE_HASH_LEN], &fk[..]);
    }

    #[test]
    fn test_memo_max_app_index() {
        let memo = Memo::new(7, TransactionType::Earn, u16::MAX, &[]).unwrap();
        assert_eq!(memo.app_index(), u16::MAX);
        assert_eq!(memo.version(), 7);
        assert_eq!(memo.transaction_type(), TransactionType::Earn);
        assert_eq!(memo.foreign_key(), [0u8; MAX_FOREIGN_KEY_LEN]);
    }

    #[test]
    fn test_memo_rejects_out_of_range() {
        assert!(Memo::new(8, TransactionType::Earn, 1, &[]).is_err());
        assert!(Memo::new(1, TransactionType::Unknown, 1, &[]).is_err());
        assert!(Memo::new(1, TransactionType::Earn, 1, &[0u8; 30]).is_err());
    }

    #[test]
    fn test_invoice_hash_deterministic_and_sized() {
        let list = InvoiceList {
            invoices: vec![invoice("TestPayment", 100_000)],
        };
        let a = invoice_list_hash(&list).unwrap();
        let b = invoice_list_hash(&list).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), INVOICE_HASH_LEN);
    }

    #[test]
    fn test_empty_list_hash_is_fixed_and_distinct() {
        let empty_a = invoice_list_hash(&InvoiceList::default()).unwrap();
        let empty_b = invoice_list_hash(&InvoiceList { invoices: vec![] }).unwrap();
        assert_eq!(empty_a, empty_b);

        let nonempty = invoice_list_hash(&InvoiceList {
            invoices: vec![invoice("x", 1)],
        })
        .unwrap();
        assert_ne!(empty_a, nonempty);
    }

    #[test]
    fn test_different_invoices_hash_differently() {
        let a = invoice_list_hash(&InvoiceList {
            invoices: vec![invoice("a", 1)],
        })
        .unwrap();
        let b = invoice_list_hash(&InvoiceList {
            invoices: vec![invoice("b", 1)],
        })
        .unwrap();
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn prop_memo_round_trip(
            version in 0u8..=7,
            tx_type in 0i16..=3,
            app_index in any::<u16>(),
            fk in proptest::collection::vec(any::<u8>(), 0..=INVOICE_HASH_LEN),
        ) {
            let t = TransactionType::from_value(tx_type);
            let memo = Memo::new(version, t, app_index, &fk).unwrap();

            prop_assert!(memo.is_valid());
            prop_assert_eq!(memo.version(), version);
            prop_assert_eq!(memo.transaction_type(), t);
            prop_assert_eq!(memo.app_index(), app_index);
            prop_assert_eq!(&memo.foreign_key()[..fk.len()], &fk[..]);
        }
    }
}
