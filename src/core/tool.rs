//! Tool definitions, handlers and the registry

use crate::core::{context::SharedContext, error::ToolError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

/// Declared shape of a single input property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    /// JSON type name: string, number, integer, boolean, object, array
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
}

impl PropertySchema {
    pub fn new(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            description: description.into(),
            allowed: None,
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self.kind.as_str() {
            "string" => value.is_string(),
            "number" => value.is_number(),
            "integer" => value.is_i64() || value.is_u64(),
            "boolean" => value.is_boolean(),
            "object" => value.is_object(),
            "array" => value.is_array(),
            // Unknown type names are not checked
            _ => true,
        }
    }
}

/// Property map plus required-property list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySchema>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl InputSchema {
    pub fn with_property(mut self, name: impl Into<String>, schema: PropertySchema) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    pub fn with_required(mut self, name: impl Into<String>) -> Self {
        self.required.push(name.into());
        self
    }

    /// Check resolved inputs against the schema.
    ///
    /// Null counts as missing for required properties. Properties not in
    /// the schema are accepted.
    pub fn check(&self, inputs: &Map<String, Value>) -> Result<(), String> {
        for name in &self.required {
            if inputs.get(name).map_or(true, Value::is_null) {
                return Err(format!("missing required input '{}'", name));
            }
        }

        for (name, value) in inputs {
            let Some(schema) = self.properties.get(name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            if !schema.accepts(value) {
                return Err(format!("input '{}' should be of type {}", name, schema.kind));
            }
            if let Some(allowed) = &schema.allowed {
                if !allowed.contains(value) {
                    return Err(format!("input '{}' is not one of the allowed values", name));
                }
            }
        }

        Ok(())
    }
}

/// Documentation and lookup data for a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub input_schema: InputSchema,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: InputSchema::default(),
        }
    }

    pub fn with_schema(mut self, schema: InputSchema) -> Self {
        self.input_schema = schema;
        self
    }
}

/// What a handler sees of the running pipeline
///
/// Holds a snapshot of the shared context taken when the attempt started.
/// State written through [`ToolContext::set_state`] is merged back into the
/// run only if the attempt succeeds.
#[derive(Debug, Clone)]
pub struct ToolContext {
    step_id: String,
    attempt: u32,
    snapshot: Arc<SharedContext>,
    state_writes: Arc<Mutex<Map<String, Value>>>,
}

impl ToolContext {
    pub fn new(step_id: impl Into<String>, attempt: u32, snapshot: Arc<SharedContext>) -> Self {
        Self {
            step_id: step_id.into(),
            attempt,
            snapshot,
            state_writes: Arc::new(Mutex::new(Map::new())),
        }
    }

    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    /// 1-based attempt number
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn context(&self) -> &SharedContext {
        &self.snapshot
    }

    pub fn input(&self, key: &str) -> Option<&Value> {
        self.snapshot.inputs.get(key)
    }

    pub fn result(&self, step_id: &str) -> Option<&Value> {
        self.snapshot.results.get(step_id)
    }

    /// Read state, preferring this attempt's own writes
    pub fn state(&self, key: &str) -> Option<Value> {
        if let Ok(writes) = self.state_writes.lock() {
            if let Some(value) = writes.get(key) {
                return Some(value.clone());
            }
        }
        self.snapshot.state.get(key).cloned()
    }

    pub fn set_state(&self, key: impl Into<String>, value: Value) {
        if let Ok(mut writes) = self.state_writes.lock() {
            writes.insert(key.into(), value);
        }
    }

    /// Drain the state written during this attempt
    pub fn take_state_writes(&self) -> Map<String, Value> {
        match self.state_writes.lock() {
            Ok(mut writes) => std::mem::take(&mut *writes),
            Err(_) => Map::new(),
        }
    }
}

/// An externally supplied operation the engine invokes for a step
///
/// `Err` signals failure; any `Ok` value, including `Value::Null`, is success.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, inputs: Map<String, Value>, ctx: ToolContext) -> Result<Value, ToolError>;
}

/// Adapter turning an async closure into a [`ToolHandler`]
pub struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(Map<String, Value>, ToolContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ToolError>> + Send,
{
    async fn call(&self, inputs: Map<String, Value>, ctx: ToolContext) -> Result<Value, ToolError> {
        (self.f)(inputs, ctx).await
    }
}

/// Wrap an async closure as a shareable handler
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn ToolHandler>
where
    F: Fn(Map<String, Value>, ToolContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
{
    Arc::new(FnHandler { f })
}

/// A registered tool
#[derive(Clone)]
pub struct RegisteredTool {
    pub definition: ToolDefinition,
    pub handler: Arc<dyn ToolHandler>,
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

/// Name -> (definition, handler)
///
/// Populated once at startup; runs only read it.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any previous registration under the same name
    pub fn register(&mut self, definition: ToolDefinition, handler: Arc<dyn ToolHandler>) {
        let name = definition.name.clone();
        if self
            .tools
            .insert(name.clone(), RegisteredTool { definition, handler })
            .is_some()
        {
            tracing::debug!("Tool '{}' re-registered", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All registered definitions, sorted by name
    pub fn list(&self) -> Vec<&ToolDefinition> {
        self.tools.values().map(|t| &t.definition).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
