//! The consolidated `theft_manage` tool.
//!
//! Ten actions behind one `action` discriminator: recording thefts,
//! provenance checks, carried-loot searches, NPC recognition rolls,
//! fence sales, fence registration, guard reports, and heat decay.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use schemars::JsonSchema;
use serde::Deserialize;
use validator::Validate;

use loreforge_core::dice::SeededDice;
use loreforge_rules::theft::{
    check_fence_acceptance, detection_risk, new_record, recognition_threshold,
    resolve_recognition, sale_price, validate_fence_registration, validate_steal,
};
use loreforge_types::{CharacterId, EventType, Fence, HeatLevel, ItemId, ItemType};

use crate::envelope::ToolResponse;
use crate::error::ToolError;
use crate::registry::{ToolContext, ToolRegistry};
use crate::router::{ActionSpec, consolidated_tool};

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// `steal`: record a theft.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StealArgs {
    /// The thief.
    #[validate(length(min = 1))]
    pub thief_id: String,
    /// The victim.
    #[validate(length(min = 1))]
    pub victim_id: String,
    /// The stolen item.
    #[validate(length(min = 1))]
    pub item_id: String,
    /// Where it happened.
    #[serde(default)]
    pub location: Option<String>,
    /// Characters who saw it.
    #[serde(default)]
    pub witnesses: Option<Vec<String>>,
}

/// `check`: pure provenance lookup.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckArgs {
    /// The item to look up.
    #[validate(length(min = 1))]
    pub item_id: String,
}

/// `search`: enumerate stolen goods a character carries.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchArgs {
    /// The character to search.
    #[validate(length(min = 1))]
    pub character_id: String,
}

/// `recognize`: does an NPC connect an item to its theft?
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecognizeArgs {
    /// The observing NPC.
    #[validate(length(min = 1))]
    pub npc_id: String,
    /// The item in view.
    #[validate(length(min = 1))]
    pub item_id: String,
    /// Explicit dice seed for deterministic tests.
    #[serde(default)]
    pub seed: Option<String>,
}

/// `sell`: offer a stolen item to a fence.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SellArgs {
    /// The seller.
    #[validate(length(min = 1))]
    pub seller_id: String,
    /// The fence.
    #[validate(length(min = 1))]
    pub fence_id: String,
    /// The item.
    #[validate(length(min = 1))]
    pub item_id: String,
    /// Base value override; the item's stored value when omitted.
    #[serde(default)]
    #[validate(range(min = 0))]
    pub item_value: Option<i64>,
}

/// `register_fence`: authorize an NPC to buy stolen goods.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterFenceArgs {
    /// The NPC becoming a fence.
    #[validate(length(min = 1))]
    pub npc_id: String,
    /// Faction affiliation.
    #[serde(default)]
    pub faction_id: Option<String>,
    /// Fraction of base value paid, in [0.1, 1.0].
    #[validate(range(min = 0.1, max = 1.0))]
    pub buy_rate: f64,
    /// Hottest heat accepted (default warm).
    #[serde(default)]
    pub max_heat_level: Option<HeatLevel>,
    /// Daily heat capacity (default 100).
    #[serde(default)]
    #[validate(range(min = 0))]
    pub daily_heat_capacity: Option<i64>,
    /// Preferred item types.
    #[serde(default)]
    pub specializations: Option<Vec<ItemType>>,
    /// Days before the same item can be re-fenced (default 3).
    #[serde(default)]
    #[validate(range(min = 0))]
    pub cooldown_days: Option<i64>,
}

/// `report`: tell the guards.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportArgs {
    /// The stolen item being reported.
    #[validate(length(min = 1))]
    pub item_id: String,
    /// Bounty added for recovery.
    #[serde(default)]
    #[validate(range(min = 0))]
    pub bounty_offered: Option<i64>,
}

/// `decay`: advance simulated days.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DecayArgs {
    /// Days to advance (heat steps once per day).
    #[validate(range(min = 1, max = 3650))]
    pub days_advanced: i64,
}

/// `get_fence` / `list_fences`.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FenceRefArgs {
    /// The fence NPC.
    #[validate(length(min = 1))]
    pub npc_id: String,
}

/// An empty argument set.
#[derive(Debug, Clone, Default, Deserialize, Validate, JsonSchema)]
pub struct NoArgs {}

/// The consolidated `theft_manage` union, tagged by `action`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TheftAction {
    /// Record a theft.
    Steal(StealArgs),
    /// Look up an item's provenance.
    Check(CheckArgs),
    /// Search a character for stolen goods.
    Search(SearchArgs),
    /// Roll NPC recognition against a stolen item.
    Recognize(RecognizeArgs),
    /// Sell a stolen item to a fence.
    Sell(SellArgs),
    /// Register an NPC as a fence.
    RegisterFence(RegisterFenceArgs),
    /// Report a theft to the guards.
    Report(ReportArgs),
    /// Advance days and cool every record.
    Decay(DecayArgs),
    /// Fetch one fence.
    GetFence(FenceRefArgs),
    /// List every fence.
    ListFences(NoArgs),
}

impl Validate for TheftAction {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        match self {
            Self::Steal(args) => args.validate(),
            Self::Check(args) => args.validate(),
            Self::Search(args) => args.validate(),
            Self::Recognize(args) => args.validate(),
            Self::Sell(args) => args.validate(),
            Self::RegisterFence(args) => args.validate(),
            Self::Report(args) => args.validate(),
            Self::Decay(args) => args.validate(),
            Self::GetFence(args) => args.validate(),
            Self::ListFences(args) => args.validate(),
        }
    }
}

/// Actions of `theft_manage`.
const THEFT_ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        name: "steal",
        aliases: &["take", "pickpocket", "rob"],
        description: "Record a theft",
    },
    ActionSpec {
        name: "check",
        aliases: &["lookup", "provenance"],
        description: "Look up an item's provenance",
    },
    ActionSpec {
        name: "search",
        aliases: &["frisk", "inspect"],
        description: "Search a character for stolen goods",
    },
    ActionSpec {
        name: "recognize",
        aliases: &["recognise", "identify"],
        description: "Roll NPC recognition",
    },
    ActionSpec {
        name: "sell",
        aliases: &["fence", "launder"],
        description: "Sell to a fence",
    },
    ActionSpec {
        name: "register_fence",
        aliases: &["add_fence"],
        description: "Register a fence",
    },
    ActionSpec {
        name: "report",
        aliases: &["report_theft"],
        description: "Report a theft to the guards",
    },
    ActionSpec {
        name: "decay",
        aliases: &["advance_days", "cool"],
        description: "Advance days and cool heat",
    },
    ActionSpec {
        name: "get_fence",
        aliases: &[],
        description: "Fetch one fence",
    },
    ActionSpec {
        name: "list_fences",
        aliases: &["fences"],
        description: "List every fence",
    },
];

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn steal(ctx: &ToolContext, args: StealArgs) -> Result<ToolResponse, ToolError> {
    let thief = CharacterId::new(args.thief_id);
    let victim = CharacterId::new(args.victim_id);
    validate_steal(&thief, &victim)?;

    let record = new_record(
        ItemId::new(args.item_id),
        thief.clone(),
        victim.clone(),
        args.location,
        args.witnesses
            .unwrap_or_default()
            .into_iter()
            .map(CharacterId::new)
            .collect(),
        Utc::now(),
    );
    ctx.state.thefts().upsert_record(&record).await?;
    ctx.state
        .audit(
            "theft_steal",
            Some(thief.as_str()),
            Some(victim.as_str()),
            serde_json::to_value(&record)?,
        )
        .await?;
    ctx.state
        .publish(
            EventType::TheftRecorded,
            serde_json::json!({"itemId": record.item_id, "thiefId": thief, "victimId": victim}),
        )
        .await?;

    ToolResponse::narrated(
        &format!(
            "{thief} lifts {} from {victim}; the item is burning hot.",
            record.item_id
        ),
        &serde_json::json!({"record": record}),
    )
}

async fn check(ctx: &ToolContext, args: CheckArgs) -> Result<ToolResponse, ToolError> {
    let item = ItemId::new(args.item_id);
    let record = ctx.state.thefts().try_get_record(&item).await?;
    match record {
        Some(record) => ToolResponse::narrated(
            &format!("{item} is stolen property ({:?} heat).", record.heat_level),
            &serde_json::json!({"stolen": true, "record": record}),
        ),
        None => ToolResponse::narrated(
            &format!("{item} has a clean history."),
            &serde_json::json!({"stolen": false}),
        ),
    }
}

async fn search(ctx: &ToolContext, args: SearchArgs) -> Result<ToolResponse, ToolError> {
    let character = CharacterId::new(args.character_id);
    let inventory = ctx.state.items().inventory_for(&character).await?;
    let item_ids: Vec<ItemId> = inventory.iter().map(|entry| entry.item_id.clone()).collect();
    let records = ctx.state.thefts().records_for_items(&item_ids).await?;

    let hottest = records.iter().map(|record| record.heat_level).max();
    let risk = detection_risk(hottest);

    ToolResponse::narrated(
        &format!(
            "{character} carries {} stolen item(s); detection risk is {risk:?}.",
            records.len()
        ),
        &serde_json::json!({
            "characterId": character,
            "stolenItems": records,
            "detectionRisk": risk,
        }),
    )
}

async fn recognize(ctx: &ToolContext, args: RecognizeArgs) -> Result<ToolResponse, ToolError> {
    let npc = CharacterId::new(args.npc_id);
    let item = ItemId::new(args.item_id);
    let record = ctx
        .state
        .thefts()
        .try_get_record(&item)
        .await?
        .ok_or_else(|| ToolError::not_found("theft record", item.as_str()))?;

    let seed = args.seed.unwrap_or_else(|| {
        format!("recognize-{npc}-{item}-{}", Utc::now().timestamp_millis())
    });
    let mut dice = SeededDice::new(&seed);
    let roll = dice.d100();
    let result = resolve_recognition(&record, &npc, roll);

    ctx.state
        .audit(
            "theft_recognize",
            Some(npc.as_str()),
            Some(item.as_str()),
            serde_json::json!({
                "recognized": result.recognized,
                "threshold": recognition_threshold(&record),
                "roll": roll,
            }),
        )
        .await?;

    let text = if result.recognized {
        format!("{npc} recognizes {item} -- reaction: {:?}.", result.reaction)
    } else {
        format!("{npc} pays {item} no mind.")
    };
    ToolResponse::narrated(&text, &serde_json::json!({"recognition": result}))
}

async fn sell(ctx: &ToolContext, args: SellArgs) -> Result<ToolResponse, ToolError> {
    let seller = CharacterId::new(args.seller_id);
    let fence_id = CharacterId::new(args.fence_id);
    let item = ItemId::new(args.item_id);

    let record = ctx
        .state
        .thefts()
        .try_get_record(&item)
        .await?
        .ok_or_else(|| ToolError::not_found("theft record", item.as_str()))?;
    let fence = ctx.state.thefts().get_fence(&fence_id).await?;
    let current_day = ctx.state.turns().current_day().await?;

    let heat_cost = check_fence_acceptance(&fence, &record, current_day)?;

    let base_value = match args.item_value {
        Some(value) => value,
        None => ctx
            .state
            .items()
            .try_get_item(&item)
            .await?
            .map_or(0, |stored| stored.value),
    };
    let price = sale_price(base_value, &fence, record.heat_level);
    let price_gold = price.to_i64().unwrap_or(0);

    ctx.state
        .thefts()
        .record_sale(&item, &fence_id, heat_cost, current_day)
        .await?;
    ctx.state
        .audit(
            "theft_sell",
            Some(seller.as_str()),
            Some(fence_id.as_str()),
            serde_json::json!({"itemId": item, "price": price_gold, "heatCost": heat_cost}),
        )
        .await?;
    ctx.state
        .publish(
            EventType::FenceSale,
            serde_json::json!({"itemId": item, "fenceId": fence_id, "price": price_gold}),
        )
        .await?;

    ToolResponse::narrated(
        &format!("{fence_id} takes {item} off {seller}'s hands for {price_gold} gold."),
        &serde_json::json!({
            "sold": true,
            "price": price_gold,
            "buyRate": fence.buy_rate,
            "heatLevel": record.heat_level,
            "heatCost": heat_cost,
        }),
    )
}

async fn register_fence(
    ctx: &ToolContext,
    args: RegisterFenceArgs,
) -> Result<ToolResponse, ToolError> {
    let npc = CharacterId::new(args.npc_id);
    let open_items = ctx.state.thefts().open_victim_items(&npc).await?;
    validate_fence_registration(&npc, &open_items)?;

    let buy_rate = Decimal::try_from(args.buy_rate).map_err(|e| {
        ToolError::validation(format!("buy rate is not a representable decimal: {e}"))
    })?;
    let fence = Fence {
        npc_id: npc.clone(),
        faction_id: args.faction_id,
        buy_rate,
        max_heat_level: args.max_heat_level.unwrap_or(HeatLevel::Warm),
        daily_heat_capacity: args.daily_heat_capacity.unwrap_or(100),
        daily_heat_used: 0,
        specializations: args.specializations.unwrap_or_default(),
        cooldown_days: args.cooldown_days.unwrap_or(3),
    };
    ctx.state.thefts().upsert_fence(&fence).await?;
    ctx.state
        .audit(
            "theft_register_fence",
            None,
            Some(npc.as_str()),
            serde_json::to_value(&fence)?,
        )
        .await?;

    ToolResponse::narrated(
        &format!("{npc} quietly opens for business."),
        &serde_json::json!({"fence": fence}),
    )
}

async fn report(ctx: &ToolContext, args: ReportArgs) -> Result<ToolResponse, ToolError> {
    let item = ItemId::new(args.item_id);
    let mut record = ctx
        .state
        .thefts()
        .try_get_record(&item)
        .await?
        .ok_or_else(|| ToolError::not_found("theft record", item.as_str()))?;

    record.reported_to_guards = true;
    record.bounty = record
        .bounty
        .saturating_add(args.bounty_offered.unwrap_or(0));
    ctx.state.thefts().upsert_record(&record).await?;
    ctx.state
        .audit(
            "theft_report",
            Some(record.stolen_from.as_str()),
            Some(item.as_str()),
            serde_json::json!({"bounty": record.bounty}),
        )
        .await?;
    ctx.state
        .publish(
            EventType::TheftReported,
            serde_json::json!({"itemId": item, "bounty": record.bounty}),
        )
        .await?;

    ToolResponse::narrated(
        &format!(
            "The guards are told about {item}; the bounty stands at {} gold.",
            record.bounty
        ),
        &serde_json::json!({"record": record}),
    )
}

async fn decay(ctx: &ToolContext, args: DecayArgs) -> Result<ToolResponse, ToolError> {
    let summary = ctx.state.thefts().apply_decay(args.days_advanced).await?;
    ctx.state
        .audit("theft_decay", None, None, serde_json::to_value(&summary)?)
        .await?;
    ctx.state
        .publish(EventType::HeatDecayed, serde_json::to_value(&summary)?)
        .await?;

    ToolResponse::narrated(
        &format!(
            "{} day(s) pass; {} record(s) cool and every fence reopens fresh.",
            summary.days_advanced, summary.records_cooled
        ),
        &serde_json::json!({"decay": summary}),
    )
}

async fn get_fence(ctx: &ToolContext, args: FenceRefArgs) -> Result<ToolResponse, ToolError> {
    let npc = CharacterId::new(args.npc_id);
    let fence = ctx.state.thefts().get_fence(&npc).await?;
    ToolResponse::narrated(
        &format!(
            "{npc} buys at {} of value, up to {:?} heat.",
            fence.buy_rate, fence.max_heat_level
        ),
        &serde_json::json!({"fence": fence}),
    )
}

async fn list_fences(ctx: &ToolContext) -> Result<ToolResponse, ToolError> {
    let fences = ctx.state.thefts().list_fences().await?;
    ToolResponse::narrated(
        &format!("{} fence(s) operating.", fences.len()),
        &serde_json::json!({"fences": fences}),
    )
}

async fn theft_manage(ctx: ToolContext, input: TheftAction) -> Result<ToolResponse, ToolError> {
    match input {
        TheftAction::Steal(args) => steal(&ctx, args).await,
        TheftAction::Check(args) => check(&ctx, args).await,
        TheftAction::Search(args) => search(&ctx, args).await,
        TheftAction::Recognize(args) => recognize(&ctx, args).await,
        TheftAction::Sell(args) => sell(&ctx, args).await,
        TheftAction::RegisterFence(args) => register_fence(&ctx, args).await,
        TheftAction::Report(args) => report(&ctx, args).await,
        TheftAction::Decay(args) => decay(&ctx, args).await,
        TheftAction::GetFence(args) => get_fence(&ctx, args).await,
        TheftAction::ListFences(_) => list_fences(&ctx).await,
    }
}

/// Register the consolidated theft tool.
pub fn register(registry: &mut ToolRegistry) -> Result<(), ToolError> {
    registry.register(consolidated_tool(
        "theft_manage",
        "Stolen-item provenance, recognition, fencing, and heat decay.",
        THEFT_ACTIONS,
        theft_manage,
    ))
}
