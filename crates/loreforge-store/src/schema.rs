//! The relational schema, declared up front.
//!
//! Every table -- including the `tile_cache` column and the
//! `custom_effects` table -- is part of the initial DDL; there are no
//! runtime migrations. JSON-encoded TEXT columns carry arrays and
//! embedded records (tokens, objectives, mechanics, stats). Foreign keys
//! cascade on delete, so removing a world removes its regions, tiles,
//! structures, rivers, quests, and patches in one statement.

/// The complete schema, executed idempotently at pool initialization.
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS worlds (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    seed        INTEGER NOT NULL,
    width       INTEGER NOT NULL,
    height      INTEGER NOT NULL,
    tile_cache  BLOB,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS regions (
    id        TEXT PRIMARY KEY,
    world_id  TEXT NOT NULL REFERENCES worlds(id) ON DELETE CASCADE,
    name      TEXT NOT NULL,
    biome     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tiles (
    world_id   TEXT NOT NULL REFERENCES worlds(id) ON DELETE CASCADE,
    x          INTEGER NOT NULL,
    y          INTEGER NOT NULL,
    terrain    TEXT NOT NULL,
    region_id  TEXT,
    PRIMARY KEY (world_id, x, y)
);

CREATE TABLE IF NOT EXISTS structures (
    id        TEXT PRIMARY KEY,
    world_id  TEXT NOT NULL REFERENCES worlds(id) ON DELETE CASCADE,
    name      TEXT NOT NULL,
    kind      TEXT NOT NULL,
    x         INTEGER NOT NULL,
    y         INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS rivers (
    id        TEXT PRIMARY KEY,
    world_id  TEXT NOT NULL REFERENCES worlds(id) ON DELETE CASCADE,
    path      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS patches (
    id          TEXT PRIMARY KEY,
    world_id    TEXT NOT NULL REFERENCES worlds(id) ON DELETE CASCADE,
    operations  TEXT NOT NULL,
    note        TEXT,
    applied_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS characters (
    id                  TEXT PRIMARY KEY,
    name                TEXT NOT NULL,
    stats               TEXT NOT NULL,
    hp                  INTEGER NOT NULL,
    max_hp              INTEGER NOT NULL,
    ac                  INTEGER NOT NULL,
    level               INTEGER NOT NULL,
    hit_die             INTEGER NOT NULL DEFAULT 8,
    hit_dice_remaining  INTEGER NOT NULL DEFAULT 0,
    faction_id          TEXT,
    behavior            TEXT,
    character_type      TEXT NOT NULL,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS items (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    item_type   TEXT NOT NULL,
    weight      REAL NOT NULL DEFAULT 0,
    value       INTEGER NOT NULL DEFAULT 0,
    properties  TEXT
);

CREATE TABLE IF NOT EXISTS inventory_items (
    character_id  TEXT NOT NULL REFERENCES characters(id) ON DELETE CASCADE,
    item_id       TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    quantity      INTEGER NOT NULL,
    equipped      INTEGER NOT NULL DEFAULT 0,
    slot          TEXT,
    PRIMARY KEY (character_id, item_id)
);

CREATE TABLE IF NOT EXISTS encounters (
    id               TEXT PRIMARY KEY,
    status           TEXT NOT NULL,
    round            INTEGER NOT NULL,
    turn_index       INTEGER NOT NULL,
    active_token_id  TEXT,
    seed             TEXT NOT NULL,
    tokens           TEXT NOT NULL,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS battlefield (
    encounter_id  TEXT PRIMARY KEY REFERENCES encounters(id) ON DELETE CASCADE,
    obstacles     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS quests (
    id             TEXT PRIMARY KEY,
    world_id       TEXT NOT NULL REFERENCES worlds(id) ON DELETE CASCADE,
    name           TEXT NOT NULL,
    description    TEXT NOT NULL,
    status         TEXT NOT NULL,
    objectives     TEXT NOT NULL,
    rewards        TEXT NOT NULL,
    prerequisites  TEXT NOT NULL,
    giver          TEXT,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS quest_logs (
    character_id      TEXT PRIMARY KEY REFERENCES characters(id) ON DELETE CASCADE,
    active_quests     TEXT NOT NULL,
    completed_quests  TEXT NOT NULL,
    failed_quests     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS theft_records (
    item_id             TEXT PRIMARY KEY,
    stolen_from         TEXT NOT NULL,
    stolen_by           TEXT NOT NULL,
    stolen_location     TEXT,
    witnesses           TEXT NOT NULL,
    heat_level          TEXT NOT NULL,
    reported_to_guards  INTEGER NOT NULL DEFAULT 0,
    bounty              INTEGER NOT NULL DEFAULT 0,
    fenced              INTEGER NOT NULL DEFAULT 0,
    fenced_at_day       INTEGER,
    created_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS fences (
    npc_id               TEXT PRIMARY KEY,
    faction_id           TEXT,
    buy_rate             TEXT NOT NULL,
    max_heat_level       TEXT NOT NULL,
    daily_heat_capacity  INTEGER NOT NULL,
    daily_heat_used      INTEGER NOT NULL DEFAULT 0,
    specializations      TEXT NOT NULL,
    cooldown_days        INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS custom_effects (
    id              TEXT PRIMARY KEY,
    target_id       TEXT NOT NULL,
    target_type     TEXT NOT NULL,
    name            TEXT NOT NULL,
    category        TEXT NOT NULL,
    power_level     INTEGER NOT NULL,
    mechanics       TEXT NOT NULL,
    duration_type   TEXT NOT NULL,
    duration_value  INTEGER,
    triggers        TEXT NOT NULL,
    is_active       INTEGER NOT NULL DEFAULT 1,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS synthesized_spells (
    id            TEXT PRIMARY KEY,
    character_id  TEXT NOT NULL REFERENCES characters(id) ON DELETE CASCADE,
    name          TEXT NOT NULL,
    level         INTEGER NOT NULL,
    school        TEXT NOT NULL,
    effect_type   TEXT NOT NULL,
    effect_dice   TEXT,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS audit_logs (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    action     TEXT NOT NULL,
    actor_id   TEXT,
    target_id  TEXT,
    details    TEXT NOT NULL,
    timestamp  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS event_logs (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    event_type  TEXT NOT NULL,
    payload     TEXT NOT NULL,
    timestamp   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS calculations (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    seed        TEXT NOT NULL,
    expression  TEXT NOT NULL,
    rolls       TEXT NOT NULL,
    total       INTEGER NOT NULL,
    context     TEXT NOT NULL,
    timestamp   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS turn_state (
    id          INTEGER PRIMARY KEY CHECK (id = 1),
    day         INTEGER NOT NULL DEFAULT 0,
    updated_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tiles_world ON tiles(world_id);
CREATE INDEX IF NOT EXISTS idx_inventory_item ON inventory_items(item_id);
CREATE INDEX IF NOT EXISTS idx_effects_target ON custom_effects(target_id);
CREATE INDEX IF NOT EXISTS idx_quests_world ON quests(world_id);
CREATE INDEX IF NOT EXISTS idx_spells_character ON synthesized_spells(character_id);
";
