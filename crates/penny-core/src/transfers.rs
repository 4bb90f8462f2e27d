//! Transfer pair detection
//!
//! A transfer between two tracked accounts shows up as two transactions. Pairs
//! are approved together and never sent to the model for categorization.
//!
//! Ties are broken by input order: each transfer claims the first later
//! transfer that matches it, so with three mutually matching transfers the
//! third is left unmatched.

use crate::models::{Transaction, TransferPair};

/// Split transactions into matched transfer pairs and everything else.
///
/// The second list holds non-transfers in input order, followed by unmatched
/// transfers in input order.
pub fn detect_transfer_pairs(transactions: &[Transaction]) -> (Vec<TransferPair>, Vec<Transaction>) {
    let (transfers, mut non_transfers): (Vec<&Transaction>, Vec<&Transaction>) =
        transactions.iter().partition(|t| t.is_transfer());

    let mut claimed = vec![false; transfers.len()];
    let mut pairs = Vec::new();

    for i in 0..transfers.len() {
        if claimed[i] {
            continue;
        }
        let first = transfers[i];

        let partner = (i + 1..transfers.len()).find(|&j| !claimed[j] && is_pair(first, transfers[j]));

        if let Some(j) = partner {
            claimed[i] = true;
            claimed[j] = true;
            pairs.push(TransferPair {
                first: first.clone(),
                second: transfers[j].clone(),
            });
        }
    }

    non_transfers.extend(
        transfers
            .iter()
            .zip(&claimed)
            .filter(|(_, was_claimed)| !**was_claimed)
            .map(|(t, _)| *t),
    );

    (pairs, non_transfers.into_iter().cloned().collect())
}

/// Same date, exactly negated amounts, reciprocal account ids
fn is_pair(a: &Transaction, b: &Transaction) -> bool {
    a.date == b.date
        && a.amount.checked_neg() == Some(b.amount)
        && b.transfer_account_id.as_deref() == Some(a.account_id.as_str())
        && a.transfer_account_id.as_deref() == Some(b.account_id.as_str())
}
