//! Theft and fencing mechanics.
//!
//! A stolen item carries a provenance record whose heat decays over
//! simulated days. Heat drives three things: how risky it is to carry the
//! item, how likely an NPC is to recognize it, and how deeply a fence
//! discounts it.
//!
//! ## Numeric commitments
//!
//! The heat-to-percent mapping is prose in the source material; the values
//! below preserve the required monotonic ordering and are the ones this
//! engine commits to:
//!
//! | heat    | value | fence discount |
//! |---------|-------|----------------|
//! | burning | 80    | 0.50           |
//! | hot     | 60    | 0.60           |
//! | warm    | 40    | 0.75           |
//! | cool    | 20    | 0.90           |
//! | cold    | 5     | 1.00           |
//!
//! Recognition threshold is `min(100, heat + bounty/10)` against a
//! `1..=100` percent roll; a roll equal to the threshold is a miss (ties
//! favor non-recognition).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use loreforge_types::{
    CharacterId, DetectionRisk, Fence, HeatLevel, ItemId, RecognitionReaction, TheftRecord,
};

use crate::error::{FenceRefusal, RulesError};

// ---------------------------------------------------------------------------
// Heat
// ---------------------------------------------------------------------------

/// The numeric heat value used by recognition and fence capacity.
pub const fn heat_value(heat: HeatLevel) -> i64 {
    match heat {
        HeatLevel::Burning => 80,
        HeatLevel::Hot => 60,
        HeatLevel::Warm => 40,
        HeatLevel::Cool => 20,
        HeatLevel::Cold => 5,
    }
}

/// The fraction of the fence's normal rate paid at a given heat.
/// Cooler items fetch closer to the full rate.
pub fn heat_discount(heat: HeatLevel) -> Decimal {
    match heat {
        HeatLevel::Burning => Decimal::new(50, 2),
        HeatLevel::Hot => Decimal::new(60, 2),
        HeatLevel::Warm => Decimal::new(75, 2),
        HeatLevel::Cool => Decimal::new(90, 2),
        HeatLevel::Cold => Decimal::ONE,
    }
}

/// One decay step toward cold.
pub const fn next_cooler(heat: HeatLevel) -> HeatLevel {
    match heat {
        HeatLevel::Burning => HeatLevel::Hot,
        HeatLevel::Hot => HeatLevel::Warm,
        HeatLevel::Warm => HeatLevel::Cool,
        HeatLevel::Cool | HeatLevel::Cold => HeatLevel::Cold,
    }
}

/// Apply `steps` decay steps (one per elapsed day).
pub const fn decay_heat(heat: HeatLevel, steps: i64) -> HeatLevel {
    let mut current = heat;
    let mut remaining = steps;
    while remaining > 0 {
        current = next_cooler(current);
        remaining -= 1;
        if matches!(current, HeatLevel::Cold) {
            break;
        }
    }
    current
}

/// The detection-risk band implied by the hottest held item.
pub const fn detection_risk(hottest: Option<HeatLevel>) -> DetectionRisk {
    match hottest {
        None | Some(HeatLevel::Cold) => DetectionRisk::None,
        Some(HeatLevel::Cool) => DetectionRisk::Low,
        Some(HeatLevel::Warm) => DetectionRisk::Moderate,
        Some(HeatLevel::Hot) => DetectionRisk::High,
        Some(HeatLevel::Burning) => DetectionRisk::VeryHigh,
    }
}

// ---------------------------------------------------------------------------
// Stealing
// ---------------------------------------------------------------------------

/// Validate a theft: a character cannot steal from themself. Inventory
/// movement is the inventory layer's concern and is enforced separately.
pub fn validate_steal(thief: &CharacterId, victim: &CharacterId) -> Result<(), RulesError> {
    if thief == victim {
        return Err(RulesError::SelfTheft {
            character: thief.clone(),
        });
    }
    Ok(())
}

/// Build a fresh theft record. New records always start burning.
pub fn new_record(
    item_id: ItemId,
    stolen_by: CharacterId,
    stolen_from: CharacterId,
    stolen_location: Option<String>,
    witnesses: Vec<CharacterId>,
    now: DateTime<Utc>,
) -> TheftRecord {
    TheftRecord {
        item_id,
        stolen_from,
        stolen_by,
        stolen_location,
        witnesses,
        heat_level: HeatLevel::Burning,
        reported_to_guards: false,
        bounty: 0,
        fenced: false,
        fenced_at_day: None,
        created_at: now,
    }
}

// ---------------------------------------------------------------------------
// Recognition
// ---------------------------------------------------------------------------

/// The outcome of a recognition check.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionResult {
    /// Whether the NPC connected the item to the theft.
    pub recognized: bool,
    /// How the NPC reacts.
    pub reaction: RecognitionReaction,
    /// The percent threshold the roll was made against, when a roll
    /// happened at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<i64>,
    /// The percent roll, when one happened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll: Option<i64>,
}

/// The percent threshold for a stranger to recognize a stolen item.
pub fn recognition_threshold(record: &TheftRecord) -> i64 {
    heat_value(record.heat_level)
        .saturating_add(record.bounty.div_euclid(10))
        .min(100)
}

/// Resolve a recognition check for one NPC.
///
/// The victim always recognizes their own property (hostile); witnesses
/// always recognize it (suspicious). Anyone else rolls percent against
/// [`recognition_threshold`]; a tie favors non-recognition.
pub fn resolve_recognition(
    record: &TheftRecord,
    npc_id: &CharacterId,
    percent_roll: i64,
) -> RecognitionResult {
    if npc_id == &record.stolen_from {
        return RecognitionResult {
            recognized: true,
            reaction: RecognitionReaction::Hostile,
            threshold: None,
            roll: None,
        };
    }
    if record.witnesses.contains(npc_id) {
        return RecognitionResult {
            recognized: true,
            reaction: RecognitionReaction::Suspicious,
            threshold: None,
            roll: None,
        };
    }

    let threshold = recognition_threshold(record);
    let recognized = percent_roll < threshold;
    RecognitionResult {
        recognized,
        reaction: if recognized {
            RecognitionReaction::Suspicious
        } else {
            RecognitionReaction::Unaware
        },
        threshold: Some(threshold),
        roll: Some(percent_roll),
    }
}

// ---------------------------------------------------------------------------
// Fencing
// ---------------------------------------------------------------------------

/// Check whether a fence will take an item. Returns the heat value the
/// sale will consume from the fence's daily capacity.
pub fn check_fence_acceptance(
    fence: &Fence,
    record: &TheftRecord,
    current_day: i64,
) -> Result<i64, RulesError> {
    if record.heat_level > fence.max_heat_level {
        return Err(RulesError::FenceRefused {
            npc: fence.npc_id.clone(),
            reason: FenceRefusal::HeatTooHigh,
        });
    }

    let cost = heat_value(record.heat_level);
    let remaining = fence
        .daily_heat_capacity
        .saturating_sub(fence.daily_heat_used);
    if remaining < cost {
        return Err(RulesError::FenceRefused {
            npc: fence.npc_id.clone(),
            reason: FenceRefusal::CapacityExhausted,
        });
    }

    if record.fenced {
        let until_day = record
            .fenced_at_day
            .unwrap_or(current_day)
            .saturating_add(fence.cooldown_days);
        if current_day < until_day {
            return Err(RulesError::FenceRefused {
                npc: fence.npc_id.clone(),
                reason: FenceRefusal::CooldownActive { until_day },
            });
        }
    }

    Ok(cost)
}

/// The price a fence pays: `base value x buy rate x heat discount`,
/// rounded down to whole gold.
pub fn sale_price(base_value: i64, fence: &Fence, heat: HeatLevel) -> Decimal {
    let base = Decimal::from(base_value.max(0));
    (base * fence.buy_rate * heat_discount(heat)).floor()
}

/// Validate a fence registration: an NPC that is the victim of any open
/// (un-fenced) theft record cannot be a fence.
pub fn validate_fence_registration(
    npc_id: &CharacterId,
    open_victim_items: &[ItemId],
) -> Result<(), RulesError> {
    if let Some(item) = open_victim_items.first() {
        return Err(RulesError::VictimCannotFence {
            npc: npc_id.clone(),
            item: item.clone(),
        });
    }
    Ok(())
}
