//! Candidate filtering and ranking.

use std::cmp::Ordering;

use gempool_types::models::{Account, AccountStatus};

/// Least-troubled, least-recently-used first: spread load and let
/// recently-failed accounts cool passively.
pub(crate) fn compare_by_load(a: &Account, b: &Account) -> Ordering {
    a.consecutive_failures
        .cmp(&b.consecutive_failures)
        .then_with(|| a.last_used.cmp(&b.last_used))
}

/// Filter a snapshot down to dispatchable candidates, ranked.
///
/// Eligible = status Active and below the per-account admission cap at the
/// time of the snapshot. The cap is re-checked atomically at acquisition;
/// this filter just avoids pointless attempts.
pub(crate) fn rank_candidates(
    snapshot: Vec<Account>,
    per_account_cap: u32,
    active_for: impl Fn(&str) -> u32,
) -> Vec<Account> {
    let mut candidates: Vec<Account> = snapshot
        .into_iter()
        .filter(|account| account.status == AccountStatus::Active)
        .filter(|account| active_for(&account.id) < per_account_cap)
        .collect();
    candidates.sort_by(compare_by_load);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use gempool_types::models::Credential;

    fn make_account(id: &str, status: AccountStatus, failures: u32, last_used: i64) -> Account {
        let mut account = Account::new(id.to_string(), Credential::new(format!("cred-{id}")));
        account.status = status;
        account.consecutive_failures = failures;
        account.last_used = last_used;
        account
    }

    #[test]
    fn test_only_active_accounts_are_candidates() {
        let snapshot = vec![
            make_account("active", AccountStatus::Active, 0, 0),
            make_account("pending", AccountStatus::Pending, 0, 0),
            make_account("cooldown", AccountStatus::Cooldown, 0, 0),
            make_account("refresh", AccountStatus::RefreshRequired, 0, 0),
            make_account("disabled", AccountStatus::Disabled, 0, 0),
        ];

        let ranked = rank_candidates(snapshot, 2, |_| 0);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id, "active");
    }

    #[test]
    fn test_saturated_accounts_are_excluded() {
        let snapshot = vec![
            make_account("busy", AccountStatus::Active, 0, 0),
            make_account("idle", AccountStatus::Active, 0, 0),
        ];

        let ranked = rank_candidates(snapshot, 1, |id| if id == "busy" { 1 } else { 0 });
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id, "idle");
    }

    #[test]
    fn test_ranking_prefers_fewer_failures_then_lru() {
        let snapshot = vec![
            make_account("troubled", AccountStatus::Active, 3, 10),
            make_account("fresh-recent", AccountStatus::Active, 0, 200),
            make_account("fresh-stale", AccountStatus::Active, 0, 100),
        ];

        let ranked = rank_candidates(snapshot, 4, |_| 0);
        let order: Vec<&str> = ranked.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(order, ["fresh-stale", "fresh-recent", "troubled"]);
    }
}
