//! The tool registry: registration, discovery, and invocation.
//!
//! Each tool is `{name, description, input schema, handler}`. Invocation
//! parses the raw arguments through the tool's typed input (serde +
//! `validator` bounds) before the handler runs; a mismatch is a
//! `ValidationError` and the store is never touched. Errors are rendered
//! into the response envelope by [`ToolRegistry::invoke`] so the caller
//! always receives a well-formed envelope.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::envelope::ToolResponse;
use crate::error::ToolError;
use crate::state::EngineState;

/// Session context carried by every invocation. Runtime caches are keyed
/// by `session_id` to isolate concurrent conversations.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// The conversation this call belongs to.
    pub session_id: String,
}

impl SessionContext {
    /// A context for the given session.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new("default")
    }
}

/// Everything a handler receives besides its typed input.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// The calling session.
    pub session: SessionContext,
    /// The shared collaborator bundle.
    pub state: Arc<EngineState>,
}

/// The boxed future a handler returns.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<ToolResponse, ToolError>> + Send>>;

/// A type-erased tool handler.
pub trait ToolHandler: Send + Sync {
    /// Handle one invocation with raw (already routed) arguments.
    fn call(&self, ctx: ToolContext, args: serde_json::Value) -> HandlerFuture;
}

impl<F> ToolHandler for F
where
    F: Fn(ToolContext, serde_json::Value) -> HandlerFuture + Send + Sync,
{
    fn call(&self, ctx: ToolContext, args: serde_json::Value) -> HandlerFuture {
        self(ctx, args)
    }
}

/// A registered tool.
pub struct ToolDef {
    /// The tool name advertised to the caller.
    pub name: String,
    /// Human description.
    pub description: String,
    /// The JSON-schema input contract.
    pub schema: serde_json::Value,
    /// The handler.
    pub handler: Box<dyn ToolHandler>,
}

/// A tool as listed to the caller.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// The tool name.
    pub name: String,
    /// Human description.
    pub description: String,
    /// The JSON-schema input contract.
    pub input_schema: serde_json::Value,
}

/// The registry mapping tool names to handlers.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDef>,
}

impl ToolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Re-registering a name fails with `DuplicateTool`.
    pub fn register(&mut self, def: ToolDef) -> Result<(), ToolError> {
        if self.tools.contains_key(&def.name) {
            return Err(ToolError::DuplicateTool { name: def.name });
        }
        tracing::debug!(tool = %def.name, "tool registered");
        self.tools.insert(def.name.clone(), def);
        Ok(())
    }

    /// List every registered tool with its contract, sorted by name.
    pub fn list(&self) -> Vec<ToolDescriptor> {
        self.tools
            .values()
            .map(|def| ToolDescriptor {
                name: def.name.clone(),
                description: def.description.clone(),
                input_schema: def.schema.clone(),
            })
            .collect()
    }

    /// Invoke a tool and propagate errors to the caller as errors.
    pub async fn try_invoke(
        &self,
        name: &str,
        args: serde_json::Value,
        session: SessionContext,
        state: Arc<EngineState>,
    ) -> Result<ToolResponse, ToolError> {
        let def = self.tools.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_owned(),
        })?;
        tracing::debug!(tool = name, session_id = %session.session_id, "invoking tool");
        def.handler.call(ToolContext { session, state }, args).await
    }

    /// Invoke a tool, rendering any failure into the error envelope.
    /// This is the transport-facing entry point: it always returns a
    /// well-formed envelope.
    pub async fn invoke(
        &self,
        name: &str,
        args: serde_json::Value,
        session: SessionContext,
        state: Arc<EngineState>,
    ) -> ToolResponse {
        match self.try_invoke(name, args, session, state).await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(tool = name, kind = error.kind(), %error, "tool call failed");
                ToolResponse::from_error(&error)
            }
        }
    }
}

impl core::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Build a [`ToolDef`] from a typed async handler function.
///
/// The wrapper parses the raw arguments into `I`, runs its `validator`
/// bounds, and only then calls the handler -- the schema-validation stage
/// of the dispatch pipeline lives here.
pub fn typed_tool<I, F, Fut>(
    name: &str,
    description: &str,
    handler: F,
) -> ToolDef
where
    I: DeserializeOwned + Validate + JsonSchema + Send + 'static,
    F: Fn(ToolContext, I) -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = Result<ToolResponse, ToolError>> + Send + 'static,
{
    let schema = serde_json::to_value(schemars::schema_for!(I))
        .unwrap_or_else(|_| serde_json::json!({"type": "object"}));
    ToolDef {
        name: name.to_owned(),
        description: description.to_owned(),
        schema,
        handler: Box::new(move |ctx: ToolContext, args: serde_json::Value| -> HandlerFuture {
            let handler = handler.clone();
            Box::pin(async move {
                let input: I = serde_json::from_value(args)
                    .map_err(|e| ToolError::validation(e.to_string()))?;
                input.validate()?;
                handler(ctx, input).await
            })
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use loreforge_core::EventBus;
    use loreforge_rules::SeededWorldGenerator;
    use loreforge_store::StorePool;

    use super::*;

    #[derive(Debug, serde::Deserialize, validator::Validate, schemars::JsonSchema)]
    #[serde(rename_all = "camelCase", deny_unknown_fields)]
    struct EchoInput {
        #[validate(length(min = 1))]
        message: String,
    }

    async fn state() -> Arc<EngineState> {
        let pool = StorePool::in_memory().await.unwrap();
        EngineState::new(pool, EventBus::new(), Box::new(SeededWorldGenerator::new()))
    }

    fn echo_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register(typed_tool(
                "echo",
                "Echo a message back",
                |_ctx, input: EchoInput| async move {
                    ToolResponse::narrated(&input.message, &serde_json::json!({"ok": true}))
                },
            ))
            .unwrap();
        registry
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = echo_registry();
        let result = registry.register(typed_tool(
            "echo",
            "Echo again",
            |_ctx, _input: EchoInput| async move { Ok(ToolResponse::text("nope")) },
        ));
        assert!(matches!(result, Err(ToolError::DuplicateTool { .. })));
    }

    #[test]
    fn listing_advertises_schema() {
        let registry = echo_registry();
        let listed = registry.list();
        assert_eq!(listed.len(), 1);
        let descriptor = listed.first().unwrap();
        assert_eq!(descriptor.name, "echo");
        assert!(descriptor.input_schema.get("properties").is_some());
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected() {
        let registry = echo_registry();
        let result = registry
            .try_invoke(
                "missing",
                serde_json::json!({}),
                SessionContext::default(),
                state().await,
            )
            .await;
        assert!(matches!(result, Err(ToolError::UnknownTool { .. })));
    }

    #[tokio::test]
    async fn invalid_input_is_a_validation_error() {
        let registry = echo_registry();
        let result = registry
            .try_invoke(
                "echo",
                serde_json::json!({"message": ""}),
                SessionContext::default(),
                state().await,
            )
            .await;
        assert!(matches!(result, Err(ToolError::Validation { .. })));
    }

    #[tokio::test]
    async fn valid_input_reaches_the_handler() {
        let registry = echo_registry();
        let response = registry
            .invoke(
                "echo",
                serde_json::json!({"message": "hello"}),
                SessionContext::default(),
                state().await,
            )
            .await;
        assert!(response.full_text().contains("hello"));
        assert_eq!(
            response.extract_state(),
            Some(serde_json::json!({"ok": true}))
        );
    }

    #[tokio::test]
    async fn errors_render_into_the_envelope() {
        let registry = echo_registry();
        let response = registry
            .invoke(
                "echo",
                serde_json::json!({"bogus": 1}),
                SessionContext::default(),
                state().await,
            )
            .await;
        let envelope = response.extract_state().unwrap();
        assert_eq!(
            envelope.get("kind").and_then(|k| k.as_str()),
            Some("validation_error")
        );
    }
}
