//! Loyalty ledger domain types: tiers, per-user balances, the transaction
//! log and the reward catalog entries.
//!
//! - Four tiers (Bronze → Silver → Gold → Platinum) keyed on lifetime points
//! - Separate gross (`total_points`), spendable (`available_points`) and
//!   tier-qualifying (`lifetime_points`) counters
//! - Append-only transaction history per user

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// ─── Tier System ────────────────────────────────────────────────────────────

/// Loyalty tier, derived solely from lifetime points.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum LoyaltyTier {
    Bronze,
    /// 1,000 lifetime points.
    Silver,
    /// 5,000 lifetime points.
    Gold,
    /// 15,000 lifetime points. Top tier.
    Platinum,
}

impl LoyaltyTier {
    /// Every tier, lowest first.
    pub const ALL: [LoyaltyTier; 4] = [
        LoyaltyTier::Bronze,
        LoyaltyTier::Silver,
        LoyaltyTier::Gold,
        LoyaltyTier::Platinum,
    ];

    /// Lifetime points required to reach this tier.
    pub fn threshold(&self) -> u64 {
        match self {
            LoyaltyTier::Bronze => 0,
            LoyaltyTier::Silver => 1_000,
            LoyaltyTier::Gold => 5_000,
            LoyaltyTier::Platinum => 15_000,
        }
    }

    pub fn next(&self) -> Option<LoyaltyTier> {
        match self {
            LoyaltyTier::Bronze => Some(LoyaltyTier::Silver),
            LoyaltyTier::Silver => Some(LoyaltyTier::Gold),
            LoyaltyTier::Gold => Some(LoyaltyTier::Platinum),
            LoyaltyTier::Platinum => None,
        }
    }

    /// Highest tier whose threshold `lifetime_points` meets.
    pub fn for_lifetime_points(lifetime_points: u64) -> Self {
        Self::ALL
            .iter()
            .rev()
            .copied()
            .find(|tier| lifetime_points >= tier.threshold())
            .unwrap_or(LoyaltyTier::Bronze)
    }
}

impl Default for LoyaltyTier {
    fn default() -> Self {
        LoyaltyTier::Bronze
    }
}

/// Tier classification for a lifetime point total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierStanding {
    pub tier: LoyaltyTier,
    /// Percent progress toward `next_threshold`, in [0, 100].
    pub progress: f64,
    /// Lifetime points of the next tier boundary. Platinum reports its own
    /// threshold since there is nothing above it.
    pub next_threshold: u64,
}

impl TierStanding {
    pub fn for_lifetime_points(lifetime_points: u64) -> Self {
        let tier = LoyaltyTier::for_lifetime_points(lifetime_points);
        let Some(next) = tier.next() else {
            return Self {
                tier,
                progress: 100.0,
                next_threshold: tier.threshold(),
            };
        };

        let floor = tier.threshold();
        let span = (next.threshold() - floor) as f64;
        let earned = lifetime_points.saturating_sub(floor) as f64;
        let progress = (earned / span * 100.0).clamp(0.0, 100.0);

        Self {
            tier,
            progress,
            next_threshold: next.threshold(),
        }
    }
}

// ─── User Loyalty ───────────────────────────────────────────────────────────

/// Ceiling for any balance and for a single transaction amount, so every
/// amount fits the signed transaction log.
pub const MAX_POINTS: u64 = i64::MAX as u64;

/// Loyalty record for one user, created lazily on first lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct UserLoyalty {
    pub user_id: String,
    /// Gross points ever credited. Not reduced by spending.
    pub total_points: u64,
    /// Spendable balance.
    pub available_points: u64,
    /// Tier-qualifying counter; never decreases.
    pub lifetime_points: u64,
    pub tier: LoyaltyTier,
    pub tier_progress: f64,
    pub next_tier_threshold: u64,
    pub transactions: Vec<LoyaltyTransaction>,
    pub redeemed_rewards: Vec<String>,
}

impl UserLoyalty {
    pub fn new(user_id: impl Into<String>) -> Self {
        let standing = TierStanding::for_lifetime_points(0);
        Self {
            user_id: user_id.into(),
            total_points: 0,
            available_points: 0,
            lifetime_points: 0,
            tier: standing.tier,
            tier_progress: standing.progress,
            next_tier_threshold: standing.next_threshold,
            transactions: Vec::new(),
            redeemed_rewards: Vec::new(),
        }
    }

    /// Recompute tier fields from `lifetime_points`. Returns the previous
    /// tier when it changed.
    pub fn refresh_tier(&mut self) -> Option<LoyaltyTier> {
        let standing = TierStanding::for_lifetime_points(self.lifetime_points);
        let previous = self.tier;
        self.tier = standing.tier;
        self.tier_progress = standing.progress;
        self.next_tier_threshold = standing.next_threshold;
        (previous != standing.tier).then_some(previous)
    }
}

// ─── Transactions ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Earned,
    Spent,
    Expired,
    Bonus,
}

/// One point-changing event. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct LoyaltyTransaction {
    pub id: Uuid,
    pub user_id: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// Positive when earned, negative when spent.
    pub points: i64,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward_id: Option<String>,
    pub date: DateTime<Utc>,
    /// Recorded on earned points only; nothing sweeps it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<DateTime<Utc>>,
}

// ─── Rewards ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RewardType {
    Discount,
    FreeShipping,
    Product,
    Experience,
}

/// Static catalog entry redeemable for available points.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct LoyaltyReward {
    pub id: String,
    pub title: String,
    pub description: String,
    pub points_cost: u64,
    #[serde(rename = "type")]
    pub reward_type: RewardType,
    /// Monetary value in the store currency.
    pub value: f64,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_order_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<DateTime<Utc>>,
}

impl LoyaltyReward {
    /// Active and not past its expiry date at `now`.
    pub fn is_offered_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expiry_date.map(|e| e > now).unwrap_or(true)
    }
}
