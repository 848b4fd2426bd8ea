use std::collections::BTreeMap;

use common::{normalize_wallet, WalletDelta};
use connector::{volume_usd, RelayRequest};

/// Folds one page of requests into per-wallet deltas, sorted by wallet.
///
/// Only `success` requests with a non-blank user count. Each one adds its USD
/// volume and one transaction to its wallet's delta.
pub fn aggregate_page(requests: &[RelayRequest]) -> Vec<WalletDelta> {
    let mut by_wallet: BTreeMap<String, WalletDelta> = BTreeMap::new();
    for request in requests.iter().filter(|req| req.status.is_success()) {
        let Some(wallet) = request.user.as_deref().and_then(normalize_wallet) else {
            continue;
        };
        by_wallet
            .entry(wallet.clone())
            .or_insert_with(|| WalletDelta::new(wallet))
            .record(volume_usd(request));
    }
    by_wallet.into_values().collect()
}
