//! Loyalty ledger: point earning and spending, tier recomputation, reward
//! redemption and per-user transaction history, mirrored to a `LedgerStore`
//! after every mutation.

use crate::catalog::seeded_rewards;
use chrono::{Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use storefront_core::config::LoyaltyConfig;
use storefront_core::error::{StorefrontError, StorefrontResult};
use storefront_core::loyalty::*;
use storefront_core::storage::{LedgerSnapshot, LedgerStore, SNAPSHOT_VERSION};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Borrowed form of `LedgerSnapshot`, so persisting does not clone state.
#[derive(Serialize)]
struct SnapshotView<'a> {
    version: u32,
    users: &'a BTreeMap<String, UserLoyalty>,
    transactions: &'a [LoyaltyTransaction],
}

/// Signed log amount. Callers keep `points` within `MAX_POINTS`.
fn signed(points: u64) -> i64 {
    debug_assert!(points <= MAX_POINTS);
    i64::try_from(points).unwrap_or(i64::MAX)
}

/// In-memory loyalty ledger for all users, owned by the caller's scope.
pub struct LoyaltyLedger {
    config: LoyaltyConfig,
    store: Arc<dyn LedgerStore>,
    rewards: Vec<LoyaltyReward>,
    users: BTreeMap<String, UserLoyalty>,
    transactions: Vec<LoyaltyTransaction>,
}

impl LoyaltyLedger {
    /// Restore the ledger from `store`, or start empty when nothing is stored.
    pub fn open(config: &LoyaltyConfig, store: Arc<dyn LedgerStore>) -> StorefrontResult<Self> {
        let snapshot = match store.load(&config.storage_key)? {
            Some(blob) => LedgerSnapshot::from_blob(&blob)?,
            None => LedgerSnapshot::default(),
        };

        if snapshot.version > SNAPSHOT_VERSION {
            return Err(StorefrontError::Storage(format!(
                "snapshot version {} is newer than supported version {}",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }

        info!(
            key = %config.storage_key,
            users = snapshot.users.len(),
            transactions = snapshot.transactions.len(),
            "Loyalty ledger opened"
        );

        Ok(Self {
            config: config.clone(),
            store,
            rewards: seeded_rewards(),
            users: snapshot.users,
            transactions: snapshot.transactions,
        })
    }

    /// Replace the seeded reward catalog.
    pub fn with_rewards(mut self, rewards: Vec<LoyaltyReward>) -> Self {
        self.rewards = rewards;
        self
    }

    /// Get the user's record, creating a zero-balance one on first access.
    pub fn get_user_loyalty(&mut self, user_id: &str) -> &UserLoyalty {
        if !self.users.contains_key(user_id) {
            self.users
                .insert(user_id.to_string(), UserLoyalty::new(user_id));
            debug!(user_id = user_id, "Loyalty record created");
            self.persist();
        }
        &self.users[user_id]
    }

    /// Look up a user's record without creating it.
    pub fn user(&self, user_id: &str) -> Option<&UserLoyalty> {
        self.users.get(user_id)
    }

    /// Credit earned points. Total, available and lifetime balances all grow
    /// by `points`, then the tier is recomputed. Balances are capped at
    /// `MAX_POINTS`; the logged transaction records the amount actually
    /// credited, so the log always sums to the lifetime balance.
    pub fn add_points(
        &mut self,
        user_id: &str,
        points: u64,
        description: &str,
        order_id: Option<&str>,
    ) {
        let now = Utc::now();
        let expiry = now + Duration::days(i64::from(self.config.point_expiry_days));

        let user = self
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| UserLoyalty::new(user_id));

        let credited = points.min(MAX_POINTS.saturating_sub(user.lifetime_points));
        if credited < points {
            metrics::counter!("loyalty.points_capped").increment(1);
            warn!(
                user_id = user_id,
                requested = points,
                credited = credited,
                "Earned points capped at balance ceiling"
            );
        }

        let transaction = LoyaltyTransaction {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            transaction_type: TransactionType::Earned,
            points: signed(credited),
            description: description.to_string(),
            order_id: order_id.map(str::to_string),
            reward_id: None,
            date: now,
            expiry_date: Some(expiry),
        };

        user.total_points += credited;
        user.available_points += credited;
        user.lifetime_points += credited;
        user.transactions.push(transaction.clone());
        self.transactions.push(transaction);

        metrics::counter!("loyalty.points_earned").increment(credited);

        debug!(
            user_id = user_id,
            points = credited,
            available = user.available_points,
            lifetime = user.lifetime_points,
            "Points earned"
        );

        self.apply_tier(user_id);
        self.persist();
    }

    /// Spend available points. Returns false, changing nothing, when the
    /// user is unknown or the balance is short. Total and lifetime points are
    /// never reduced, so tier does not regress on spending.
    pub fn spend_points(
        &mut self,
        user_id: &str,
        points: u64,
        description: &str,
        reward_id: Option<&str>,
    ) -> bool {
        let Some(user) = self.users.get_mut(user_id) else {
            metrics::counter!("loyalty.spend_rejected").increment(1);
            debug!(user_id = user_id, "Spend rejected: no loyalty record");
            return false;
        };

        if user.available_points < points {
            metrics::counter!("loyalty.spend_rejected").increment(1);
            debug!(
                user_id = user_id,
                points = points,
                available = user.available_points,
                "Spend rejected: insufficient points"
            );
            return false;
        }

        let transaction = LoyaltyTransaction {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            transaction_type: TransactionType::Spent,
            points: -signed(points),
            description: description.to_string(),
            order_id: None,
            reward_id: reward_id.map(str::to_string),
            date: Utc::now(),
            expiry_date: None,
        };

        user.available_points -= points;
        if let Some(reward_id) = reward_id {
            user.redeemed_rewards.push(reward_id.to_string());
        }
        user.transactions.push(transaction.clone());
        self.transactions.push(transaction);

        metrics::counter!("loyalty.points_spent").increment(points);

        debug!(
            user_id = user_id,
            points = points,
            available = user.available_points,
            "Points spent"
        );

        self.persist();
        true
    }

    /// Recompute tier, progress and next threshold from lifetime points.
    pub fn update_tier(&mut self, user_id: &str) {
        if self.apply_tier(user_id) {
            self.persist();
        }
    }

    /// Active, unexpired rewards the user can currently afford, in catalog
    /// order. Unknown users are treated as having no points.
    pub fn get_available_rewards(&self, user_id: &str) -> Vec<LoyaltyReward> {
        let balance = self
            .users
            .get(user_id)
            .map(|u| u.available_points)
            .unwrap_or(0);
        let now = Utc::now();

        self.rewards
            .iter()
            .filter(|r| r.is_offered_at(now) && r.points_cost <= balance)
            .cloned()
            .collect()
    }

    /// Redeem a catalog reward. Returns false when the reward or user is
    /// unknown or the balance is short. Repeat redemptions are allowed.
    pub fn redeem_reward(&mut self, user_id: &str, reward_id: &str) -> bool {
        let Some(reward) = self.rewards.iter().find(|r| r.id == reward_id).cloned() else {
            debug!(
                user_id = user_id,
                reward_id = reward_id,
                "Redeem rejected: unknown reward"
            );
            return false;
        };
        let Some(user) = self.users.get(user_id) else {
            debug!(
                user_id = user_id,
                reward_id = reward_id,
                "Redeem rejected: no loyalty record"
            );
            return false;
        };
        if user.available_points < reward.points_cost {
            debug!(
                user_id = user_id,
                reward_id = reward_id,
                cost = reward.points_cost,
                available = user.available_points,
                "Redeem rejected: insufficient points"
            );
            return false;
        }

        let description = format!("Redeemed: {}", reward.title);
        let redeemed =
            self.spend_points(user_id, reward.points_cost, &description, Some(&reward.id));

        if redeemed {
            metrics::counter!("loyalty.redemptions").increment(1);
            info!(
                user_id = user_id,
                reward_id = %reward.id,
                cost = reward.points_cost,
                "Reward redeemed"
            );
        }
        redeemed
    }

    /// The user's transactions, newest first.
    pub fn get_user_transactions(&self, user_id: &str) -> Vec<LoyaltyTransaction> {
        let Some(user) = self.users.get(user_id) else {
            return Vec::new();
        };
        // Reversed before the stable sort so equal timestamps list the later entry first.
        let mut transactions: Vec<LoyaltyTransaction> =
            user.transactions.iter().rev().cloned().collect();
        transactions.sort_by(|a, b| b.date.cmp(&a.date));
        transactions
    }

    /// Full reward catalog, active or not.
    pub fn rewards(&self) -> &[LoyaltyReward] {
        &self.rewards
    }

    /// Global transaction log across all users, oldest first.
    pub fn all_transactions(&self) -> &[LoyaltyTransaction] {
        &self.transactions
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Reachability of the backing store.
    pub fn store_healthy(&self) -> bool {
        self.store.ping().is_ok()
    }

    /// Returns true if the user's tier fields changed.
    fn apply_tier(&mut self, user_id: &str) -> bool {
        let Some(user) = self.users.get_mut(user_id) else {
            return false;
        };
        let before = (user.tier, user.tier_progress, user.next_tier_threshold);
        let previous_tier = user.refresh_tier();

        if let Some(old) = previous_tier {
            metrics::counter!("loyalty.tier_upgrades").increment(1);
            info!(
                user_id = user_id,
                old = ?old,
                new = ?user.tier,
                lifetime = user.lifetime_points,
                "Tier upgrade"
            );
        }

        before != (user.tier, user.tier_progress, user.next_tier_threshold)
    }

    /// Mirror the full ledger to the store. Failures are logged, not raised:
    /// in-memory state stays authoritative.
    fn persist(&self) {
        let view = SnapshotView {
            version: SNAPSHOT_VERSION,
            users: &self.users,
            transactions: &self.transactions,
        };
        let result = serde_json::to_string(&view)
            .map_err(StorefrontError::from)
            .and_then(|blob| self.store.save(&self.config.storage_key, &blob));

        if let Err(e) = result {
            metrics::counter!("loyalty.persist_failures").increment(1);
            warn!(
                error = %e,
                key = %self.config.storage_key,
                "Failed to persist loyalty ledger"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_cache::LocalStore;

    struct BrokenStore;

    impl LedgerStore for BrokenStore {
        fn load(&self, _key: &str) -> StorefrontResult<Option<String>> {
            Ok(None)
        }

        fn save(&self, _key: &str, _blob: &str) -> StorefrontResult<()> {
            Err(StorefrontError::Storage("disk full".to_string()))
        }

        fn ping(&self) -> StorefrontResult<()> {
            Err(StorefrontError::Storage("unreachable".to_string()))
        }
    }

    fn test_ledger() -> LoyaltyLedger {
        LoyaltyLedger::open(&LoyaltyConfig::default(), Arc::new(LocalStore::new())).unwrap()
    }

    #[test]
    fn test_get_user_loyalty_creates_once() {
        let mut ledger = test_ledger();
        assert!(ledger.user("u-1").is_none());

        let user = ledger.get_user_loyalty("u-1").clone();
        assert_eq!(user.available_points, 0);
        assert_eq!(user.tier, LoyaltyTier::Bronze);

        ledger.add_points("u-1", 10, "Signup", None);
        assert_eq!(ledger.get_user_loyalty("u-1").available_points, 10);
        assert_eq!(ledger.user_count(), 1);
    }

    #[test]
    fn test_welcome_points() {
        let mut ledger = test_ledger();
        ledger.add_points("u-1", 100, "Welcome", None);

        let user = ledger.user("u-1").unwrap();
        assert_eq!(user.available_points, 100);
        assert_eq!(user.total_points, 100);
        assert_eq!(user.lifetime_points, 100);
        assert_eq!(user.tier, LoyaltyTier::Bronze);
        assert!((user.tier_progress - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_earned_transaction_carries_expiry() {
        let mut ledger = test_ledger();
        ledger.add_points("u-1", 250, "Order #1001", Some("order-1001"));

        let tx = &ledger.user("u-1").unwrap().transactions[0];
        assert_eq!(tx.transaction_type, TransactionType::Earned);
        assert_eq!(tx.points, 250);
        assert_eq!(tx.order_id.as_deref(), Some("order-1001"));
        let expiry = tx.expiry_date.unwrap();
        assert_eq!((expiry - tx.date).num_days(), 365);
        assert_eq!(ledger.all_transactions().len(), 1);
    }

    #[test]
    fn test_tier_reaches_gold() {
        let mut ledger = test_ledger();
        ledger.add_points("u-1", 1_000, "order", None);
        assert_eq!(ledger.user("u-1").unwrap().tier, LoyaltyTier::Silver);

        ledger.add_points("u-1", 4_000, "order2", None);
        let user = ledger.user("u-1").unwrap();
        assert_eq!(user.lifetime_points, 5_000);
        assert_eq!(user.tier, LoyaltyTier::Gold);
        assert_eq!(user.next_tier_threshold, 15_000);
    }

    #[test]
    fn test_earn_capped_at_ceiling_keeps_log_consistent() {
        let mut ledger = test_ledger();
        ledger.add_points("u-1", u64::MAX, "huge", None);
        ledger.add_points("u-1", 10, "more", None);

        let user = ledger.user("u-1").unwrap();
        assert_eq!(user.lifetime_points, MAX_POINTS);
        assert_eq!(user.available_points, MAX_POINTS);
        assert_eq!(user.total_points, MAX_POINTS);
        assert_eq!(user.tier, LoyaltyTier::Platinum);

        let log_net: i128 = user.transactions.iter().map(|t| i128::from(t.points)).sum();
        assert_eq!(log_net, i128::from(user.lifetime_points));
        assert_eq!(user.transactions[1].points, 0);

        assert!(ledger.spend_points("u-1", MAX_POINTS, "all of it", None));
        let user = ledger.user("u-1").unwrap();
        assert_eq!(user.available_points, 0);
        assert_eq!(user.transactions.last().unwrap().points, -i64::MAX);
    }

    #[test]
    fn test_spend_insufficient_leaves_state() {
        let mut ledger = test_ledger();
        ledger.add_points("u-1", 100, "Welcome", None);
        let before = ledger.user("u-1").unwrap().clone();

        assert!(!ledger.spend_points("u-1", 500, "Too much", None));
        assert_eq!(ledger.user("u-1").unwrap(), &before);
        assert_eq!(ledger.all_transactions().len(), 1);
    }

    #[test]
    fn test_spend_only_reduces_available() {
        let mut ledger = test_ledger();
        ledger.add_points("u-1", 1_200, "order", None);

        assert!(ledger.spend_points("u-1", 700, "Gift card", None));
        let user = ledger.user("u-1").unwrap();
        assert_eq!(user.available_points, 500);
        assert_eq!(user.total_points, 1_200);
        assert_eq!(user.lifetime_points, 1_200);
        assert_eq!(user.tier, LoyaltyTier::Silver);
        assert!(user.redeemed_rewards.is_empty());

        let spent = user.transactions.last().unwrap();
        assert_eq!(spent.transaction_type, TransactionType::Spent);
        assert_eq!(spent.points, -700);
        assert!(spent.expiry_date.is_none());
    }

    #[test]
    fn test_spend_unknown_user() {
        let mut ledger = test_ledger();
        assert!(!ledger.spend_points("ghost", 0, "Nothing", None));
        assert!(ledger.user("ghost").is_none());
    }

    #[test]
    fn test_redeem_reward_exact_balance() {
        let mut ledger = test_ledger();
        ledger.add_points("u-1", 500, "order", None);

        assert!(ledger.redeem_reward("u-1", "reward_1"));
        let user = ledger.user("u-1").unwrap();
        assert_eq!(user.available_points, 0);
        assert_eq!(user.redeemed_rewards, vec!["reward_1".to_string()]);

        let spent = user.transactions.last().unwrap();
        assert_eq!(spent.description, "Redeemed: $5 Off Your Order");
        assert_eq!(spent.reward_id.as_deref(), Some("reward_1"));
    }

    #[test]
    fn test_redeem_rejections() {
        let mut ledger = test_ledger();
        assert!(!ledger.redeem_reward("u-1", "reward_1"));

        ledger.add_points("u-1", 100, "order", None);
        assert!(!ledger.redeem_reward("u-1", "reward_1"));
        assert!(!ledger.redeem_reward("u-1", "no_such_reward"));
        assert_eq!(ledger.user("u-1").unwrap().available_points, 100);
    }

    #[test]
    fn test_redeem_same_reward_twice() {
        let mut ledger = test_ledger();
        ledger.add_points("u-1", 600, "order", None);

        assert!(ledger.redeem_reward("u-1", "reward_2"));
        assert!(ledger.redeem_reward("u-1", "reward_2"));
        assert!(!ledger.redeem_reward("u-1", "reward_2"));

        let user = ledger.user("u-1").unwrap();
        assert_eq!(user.available_points, 100);
        assert_eq!(user.redeemed_rewards.len(), 2);
    }

    #[test]
    fn test_available_rewards_filtering() {
        let mut ledger = test_ledger();
        ledger.add_points("u-1", 900, "order", None);

        let ids: Vec<String> = ledger
            .get_available_rewards("u-1")
            .into_iter()
            .map(|r| r.id)
            .collect();
        // reward_6 costs 800 but is inactive
        assert_eq!(ids, vec!["reward_1".to_string(), "reward_2".to_string()]);
        assert!(ledger.get_available_rewards("ghost").is_empty());
    }

    #[test]
    fn test_available_rewards_skips_expired() {
        let now = Utc::now();
        let mut rewards = seeded_rewards();
        rewards[0].expiry_date = Some(now - Duration::days(1));
        rewards[1].expiry_date = Some(now + Duration::days(30));

        let mut ledger = test_ledger().with_rewards(rewards);
        ledger.add_points("u-1", 600, "order", None);

        let ids: Vec<String> = ledger
            .get_available_rewards("u-1")
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["reward_2".to_string()]);
    }

    #[test]
    fn test_transactions_newest_first() {
        let mut ledger = test_ledger();
        ledger.add_points("u-1", 100, "first", None);
        ledger.add_points("u-1", 200, "second", None);
        assert!(ledger.spend_points("u-1", 50, "third", None));

        let descriptions: Vec<String> = ledger
            .get_user_transactions("u-1")
            .into_iter()
            .map(|t| t.description)
            .collect();
        assert_eq!(descriptions, vec!["third", "second", "first"]);
        assert!(ledger.get_user_transactions("ghost").is_empty());
    }

    #[test]
    fn test_update_tier_unknown_user_is_noop() {
        let mut ledger = test_ledger();
        ledger.update_tier("ghost");
        assert!(ledger.user("ghost").is_none());
    }

    #[test]
    fn test_reopen_restores_state() {
        let store = Arc::new(LocalStore::new());
        let config = LoyaltyConfig::default();

        let mut ledger = LoyaltyLedger::open(&config, store.clone()).unwrap();
        ledger.add_points("u-1", 1_500, "order", None);
        assert!(ledger.redeem_reward("u-1", "reward_1"));

        let reopened = LoyaltyLedger::open(&config, store).unwrap();
        assert_eq!(reopened.user("u-1"), ledger.user("u-1"));
        assert_eq!(reopened.all_transactions().len(), 2);
    }

    #[test]
    fn test_newer_snapshot_version_rejected() {
        let store = Arc::new(LocalStore::new());
        let config = LoyaltyConfig::default();
        store
            .save(&config.storage_key, r#"{"version": 99}"#)
            .unwrap();

        assert!(LoyaltyLedger::open(&config, store).is_err());
    }

    #[test]
    fn test_persist_failure_does_not_fail_mutation() {
        let mut ledger =
            LoyaltyLedger::open(&LoyaltyConfig::default(), Arc::new(BrokenStore)).unwrap();
        ledger.add_points("u-1", 300, "order", None);
        assert!(ledger.spend_points("u-1", 100, "spend", None));
        assert_eq!(ledger.user("u-1").unwrap().available_points, 200);
        assert!(!ledger.store_healthy());
    }
}
