//! Vendor-neutral conversation types
//!
//! Each model client renders these into its own wire dialect.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role of a turn in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message
    User,
    /// Model response, text or function call
    Assistant,
    /// Tool/function result
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A tool call the model asked for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRequest {
    /// Call id; echoed back on the result turn
    pub id: String,
    /// Tool name
    pub name: String,
    /// Arguments keyed by parameter name
    pub arguments: Map<String, Value>,
}

impl ToolInvocationRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        ToolInvocationRequest {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Arguments as a JSON object value
    pub fn arguments_value(&self) -> Value {
        Value::Object(self.arguments.clone())
    }
}

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Turn {
    /// User text
    User { text: String },
    /// Model text
    Assistant { text: String },
    /// Model's request to invoke a tool
    FunctionCall { call: ToolInvocationRequest },
    /// Tool output for a previous call
    FunctionResult {
        call_id: String,
        name: String,
        content: String,
    },
}

impl Turn {
    /// Role of this turn
    pub fn role(&self) -> Role {
        match self {
            Turn::User { .. } => Role::User,
            Turn::Assistant { .. } | Turn::FunctionCall { .. } => Role::Assistant,
            Turn::FunctionResult { .. } => Role::Tool,
        }
    }
}

/// An append-only sequence of turns for one chat invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Standing instructions, sent outside the turn list
    pub system: Option<String>,
    turns: Vec<Turn>,
}

impl Conversation {
    /// Create an empty conversation
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the system prompt
    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system = prompt;
        self
    }

    /// Add a user turn
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::User { text: text.into() });
    }

    /// Add a model text turn
    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::Assistant { text: text.into() });
    }

    /// Add the model's function-call turn
    pub fn push_function_call(&mut self, call: ToolInvocationRequest) {
        self.turns.push(Turn::FunctionCall { call });
    }

    /// Add a tool-result turn answering `call`
    pub fn push_function_result(&mut self, call: &ToolInvocationRequest, content: impl Into<String>) {
        self.turns.push(Turn::FunctionResult {
            call_id: call.id.clone(),
            name: call.name.clone(),
            content: content.into(),
        });
    }

    /// Turns in order
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Sampling options for a completion
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    /// Sampling temperature (0.0 - 2.0)
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
}

impl GenerationOptions {
    /// Create options for repeatable output
    pub fn deterministic() -> Self {
        GenerationOptions {
            temperature: 0.0,
            max_tokens: None,
        }
    }
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self::deterministic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_turn_order_and_roles() {
        let call = ToolInvocationRequest::new("call_1", "send_email", Map::new());
        let mut conversation = Conversation::new();
        conversation.push_user("hello");
        conversation.push_function_call(call.clone());
        conversation.push_function_result(&call, "sent");

        let roles: Vec<Role> = conversation.turns().iter().map(Turn::role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool]);
        assert_eq!(
            conversation.turns()[2],
            Turn::FunctionResult {
                call_id: "call_1".into(),
                name: "send_email".into(),
                content: "sent".into(),
            }
        );
    }

    #[test]
    fn test_generation_options_default_is_deterministic() {
        assert_eq!(GenerationOptions::default().temperature, 0.0);
    }
}
