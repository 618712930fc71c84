//! The improvisation engine: stunts, custom effects, and arcane synthesis.
//!
//! Three sub-systems joined by one consolidated tool at the boundary:
//!
//! - [`stunt`] -- "rule of cool" skill checks with damage and saves
//! - [`effects`] -- custom effects with triggers and tick-down durations
//! - [`synthesis`] -- improvised spellcasting with a wild-surge table

pub mod effects;
pub mod stunt;
pub mod synthesis;
