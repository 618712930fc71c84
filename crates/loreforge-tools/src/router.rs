//! The action router for consolidated tools.
//!
//! A consolidated tool exposes many logical operations behind one
//! `action` field. The router normalizes the discriminator *before*
//! serde parsing: exact canonical match, then exact alias, then fuzzy
//! match across actions and aliases at similarity >= 0.6. Below the
//! threshold it never silently picks -- the caller gets a guiding error
//! with ranked suggestions. The normalized input then parses as a
//! discriminated union tagged by `action`.

use std::future::Future;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use validator::Validate;

use loreforge_core::fuzzy::{self, Resolution};

use crate::envelope::ToolResponse;
use crate::error::ToolError;
use crate::registry::{HandlerFuture, ToolContext, ToolDef};

/// One action of a consolidated tool.
#[derive(Debug, Clone, Copy)]
pub struct ActionSpec {
    /// The canonical action name (the serde tag of its variant).
    pub name: &'static str,
    /// Accepted aliases, resolved before fuzzy matching.
    pub aliases: &'static [&'static str],
    /// Human description, folded into the tool description.
    pub description: &'static str,
}

/// Resolve a raw `action` value to its canonical name.
pub fn resolve_action(
    tool: &str,
    provided: &str,
    actions: &[ActionSpec],
) -> Result<String, ToolError> {
    // Exact canonical match (case-insensitive) wins outright.
    let needle = provided.trim().to_lowercase();
    for spec in actions {
        if spec.name.to_lowercase() == needle {
            return Ok(spec.name.to_owned());
        }
    }

    // Exact alias match.
    for spec in actions {
        if spec
            .aliases
            .iter()
            .any(|alias| alias.to_lowercase() == needle)
        {
            return Ok(spec.name.to_owned());
        }
    }

    // Fuzzy match across actions and aliases; a hit maps back to its
    // canonical action.
    let mut candidates: Vec<&str> = Vec::new();
    for spec in actions {
        candidates.push(spec.name);
        candidates.extend(spec.aliases.iter().copied());
    }
    let canonical_of = |candidate: &str| -> Option<String> {
        actions
            .iter()
            .find(|spec| {
                spec.name == candidate || spec.aliases.contains(&candidate)
            })
            .map(|spec| spec.name.to_owned())
    };

    match fuzzy::resolve(provided, &candidates) {
        Resolution::Exact(value) | Resolution::Fuzzy { value, .. } => canonical_of(&value)
            .ok_or_else(|| ToolError::Internal {
                message: format!("fuzzy match {value:?} lost its canonical action"),
            }),
        Resolution::None(_) => {
            // Rank suggestions over canonical names only, so the guiding
            // error speaks the tool's official vocabulary.
            let canonical: Vec<&str> = actions.iter().map(|spec| spec.name).collect();
            let suggestions = match fuzzy::resolve(provided, &canonical) {
                Resolution::None(ranked) => ranked,
                Resolution::Exact(_) | Resolution::Fuzzy { .. } => Vec::new(),
            };
            Err(ToolError::UnknownAction {
                tool: tool.to_owned(),
                provided: provided.to_owned(),
                available: canonical.iter().map(|&name| name.to_owned()).collect(),
                suggestions,
            })
        }
    }
}

/// Build a consolidated [`ToolDef`]: alias resolution, then parsing into
/// the `action`-tagged union `I`, then the shared handler.
pub fn consolidated_tool<I, F, Fut>(
    name: &'static str,
    description: &str,
    actions: &'static [ActionSpec],
    handler: F,
) -> ToolDef
where
    I: DeserializeOwned + Validate + JsonSchema + Send + 'static,
    F: Fn(ToolContext, I) -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = Result<ToolResponse, ToolError>> + Send + 'static,
{
    let mut full_description = String::from(description);
    full_description.push_str(" Actions: ");
    let action_list: Vec<&str> = actions.iter().map(|spec| spec.name).collect();
    full_description.push_str(&action_list.join(", "));
    full_description.push('.');

    let schema = serde_json::to_value(schemars::schema_for!(I))
        .unwrap_or_else(|_| serde_json::json!({"type": "object"}));

    ToolDef {
        name: name.to_owned(),
        description: full_description,
        schema,
        handler: Box::new(move |ctx: ToolContext, args: serde_json::Value| -> HandlerFuture {
            let handler = handler.clone();
            Box::pin(async move {
                let provided = args
                    .get("action")
                    .and_then(serde_json::Value::as_str)
                    .ok_or_else(|| {
                        ToolError::validation("missing required string field \"action\"")
                    })?;
                let canonical = resolve_action(name, provided, actions)?;

                let mut routed = args.clone();
                if let Some(object) = routed.as_object_mut() {
                    object.insert(
                        String::from("action"),
                        serde_json::Value::String(canonical),
                    );
                }

                let input: I = serde_json::from_value(routed)
                    .map_err(|e| ToolError::validation(e.to_string()))?;
                input.validate()?;
                handler(ctx, input).await
            })
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACTIONS: &[ActionSpec] = &[
        ActionSpec {
            name: "steal",
            aliases: &["take", "pickpocket"],
            description: "Record a theft",
        },
        ActionSpec {
            name: "sell",
            aliases: &["fence"],
            description: "Sell to a fence",
        },
        ActionSpec {
            name: "check",
            aliases: &[],
            description: "Look up provenance",
        },
    ];

    #[test]
    fn canonical_and_alias_match_exactly() {
        assert_eq!(resolve_action("theft_manage", "steal", ACTIONS).ok(), Some(String::from("steal")));
        assert_eq!(resolve_action("theft_manage", "FENCE", ACTIONS).ok(), Some(String::from("sell")));
    }

    #[test]
    fn close_typo_resolves_fuzzily() {
        assert_eq!(
            resolve_action("theft_manage", "sel", ACTIONS).ok(),
            Some(String::from("sell"))
        );
        assert_eq!(
            resolve_action("theft_manage", "stael", ACTIONS).ok(),
            Some(String::from("steal"))
        );
    }

    #[test]
    fn garbage_yields_a_guiding_error() {
        let error = resolve_action("theft_manage", "xyz", ACTIONS).err();
        match error {
            Some(ToolError::UnknownAction {
                tool,
                provided,
                available,
                suggestions,
            }) => {
                assert_eq!(tool, "theft_manage");
                assert_eq!(provided, "xyz");
                assert_eq!(available, vec!["steal", "sell", "check"]);
                assert!(suggestions.len() <= 3);
            }
            other => panic!("expected a guiding error, got {other:?}"),
        }
    }
}
