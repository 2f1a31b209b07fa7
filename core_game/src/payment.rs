use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ahash::{AHashMap, AHashSet};
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("failed to read payment ledger {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse payment ledger: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to record redeemed payment in {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Confirms that a payment for a premium item really happened.
pub trait PaymentVerifier: Send + Sync {
    /// `Ok(true)` only for a confirmed transaction of at least `expected_nano`.
    fn verify_payment(&self, tx_ref: &str, expected_nano: u64) -> Result<bool, PaymentError>;
}

/// Default verifier: no payment path is configured, so nothing verifies.
#[derive(Debug, Default, Clone, Copy)]
pub struct RejectAllPayments;

impl PaymentVerifier for RejectAllPayments {
    fn verify_payment(&self, tx_ref: &str, expected_nano: u64) -> Result<bool, PaymentError> {
        tracing::warn!(
            target: "tide_pet::payment",
            tx_ref,
            expected_nano,
            "payment.rejected=no_verifier"
        );
        Ok(false)
    }
}

enum LedgerSource {
    File { path: PathBuf, redeemed_path: PathBuf },
    Memory(AHashMap<String, u64>),
}

/// Verifies against a ledger of confirmed transactions (`{"tx_ref": nano}`)
/// maintained by the payment operator. Every transaction redeems once.
pub struct LedgerPaymentVerifier {
    source: LedgerSource,
    redeemed: Mutex<AHashSet<String>>,
}

impl LedgerPaymentVerifier {
    pub fn open(path: &Path) -> Result<Self, PaymentError> {
        let redeemed_path = path.with_extension("redeemed.json");
        let redeemed = match fs::read_to_string(&redeemed_path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => AHashSet::new(),
            Err(source) => {
                return Err(PaymentError::Read {
                    path: redeemed_path,
                    source,
                })
            }
        };
        Ok(Self {
            source: LedgerSource::File {
                path: path.to_path_buf(),
                redeemed_path,
            },
            redeemed: Mutex::new(redeemed),
        })
    }

    pub fn in_memory(entries: impl IntoIterator<Item = (String, u64)>) -> Self {
        Self {
            source: LedgerSource::Memory(entries.into_iter().collect()),
            redeemed: Mutex::new(AHashSet::new()),
        }
    }

    fn confirmed_amount(&self, tx_ref: &str) -> Result<Option<u64>, PaymentError> {
        match &self.source {
            LedgerSource::Memory(entries) => Ok(entries.get(tx_ref).copied()),
            LedgerSource::File { path, .. } => {
                // Re-read on every check so newly confirmed payments show up.
                let contents = fs::read_to_string(path).map_err(|source| PaymentError::Read {
                    path: path.clone(),
                    source,
                })?;
                let entries: AHashMap<String, u64> = serde_json::from_str(&contents)?;
                Ok(entries.get(tx_ref).copied())
            }
        }
    }
}

impl PaymentVerifier for LedgerPaymentVerifier {
    fn verify_payment(&self, tx_ref: &str, expected_nano: u64) -> Result<bool, PaymentError> {
        let mut redeemed = self.redeemed.lock();
        if redeemed.contains(tx_ref) {
            return Ok(false);
        }
        let Some(amount) = self.confirmed_amount(tx_ref)? else {
            return Ok(false);
        };
        if amount < expected_nano {
            tracing::warn!(
                target: "tide_pet::payment",
                tx_ref,
                amount,
                expected_nano,
                "payment.rejected=underpaid"
            );
            return Ok(false);
        }

        redeemed.insert(tx_ref.to_string());
        if let LedgerSource::File { redeemed_path, .. } = &self.source {
            let mut ids: Vec<&String> = redeemed.iter().collect();
            ids.sort();
            let encoded = serde_json::to_vec_pretty(&ids)?;
            if let Err(source) = fs::write(redeemed_path, encoded) {
                redeemed.remove(tx_ref);
                return Err(PaymentError::Write {
                    path: redeemed_path.clone(),
                    source,
                });
            }
        }
        Ok(true)
    }
}
