//! Seeded reward catalog shown to every shopper.

use storefront_core::loyalty::{LoyaltyReward, RewardType};

fn reward(
    id: &str,
    title: &str,
    description: &str,
    points_cost: u64,
    reward_type: RewardType,
    value: f64,
) -> LoyaltyReward {
    LoyaltyReward {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        points_cost,
        reward_type,
        value,
        is_active: true,
        min_order_value: None,
        expiry_date: None,
    }
}

/// Default catalog, in display order.
pub fn seeded_rewards() -> Vec<LoyaltyReward> {
    vec![
        reward(
            "reward_1",
            "$5 Off Your Order",
            "Take $5 off any order",
            500,
            RewardType::Discount,
            5.0,
        ),
        reward(
            "reward_2",
            "Free Shipping",
            "Free standard shipping on your next order",
            250,
            RewardType::FreeShipping,
            9.99,
        ),
        LoyaltyReward {
            min_order_value: Some(50.0),
            ..reward(
                "reward_3",
                "$15 Off Orders Over $50",
                "Take $15 off orders of $50 or more",
                1_500,
                RewardType::Discount,
                15.0,
            )
        },
        reward(
            "reward_4",
            "Exclusive Member Tote",
            "Limited-edition tote bag for loyalty members",
            3_000,
            RewardType::Product,
            35.0,
        ),
        reward(
            "reward_5",
            "VIP Personal Shopping Session",
            "One-hour session with a personal stylist",
            10_000,
            RewardType::Experience,
            150.0,
        ),
        LoyaltyReward {
            is_active: false,
            ..reward(
                "reward_6",
                "Holiday $10 Off",
                "Seasonal discount, returns next holiday season",
                800,
                RewardType::Discount,
                10.0,
            )
        },
    ]
}
