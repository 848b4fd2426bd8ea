use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Canonical ledger key for a wallet: trimmed and lower-cased.
///
/// Returns `None` when nothing is left after trimming.
pub fn normalize_wallet(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_lowercase())
}

/// Additive contribution of one page to a single wallet's ledger totals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletDelta {
    pub wallet: String,
    pub volume_delta: Decimal,
    pub tx_delta: i64,
}

impl WalletDelta {
    pub fn new(wallet: impl Into<String>) -> Self {
        Self {
            wallet: wallet.into(),
            volume_delta: Decimal::ZERO,
            tx_delta: 0,
        }
    }

    /// Folds one successful request of `volume` USD into the delta.
    pub fn record(&mut self, volume: Decimal) {
        self.volume_delta += volume;
        self.tx_delta += 1;
    }
}
