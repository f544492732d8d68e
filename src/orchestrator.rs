//! Single-tool-call chat orchestration
//!
//! One utterance in, one answer out, with at most one tool invocation in
//! between:
//!
//! 1. open a fresh tool session and enumerate its tools
//! 2. ask the model, offering the tools in its function-calling dialect
//! 3. without a tool request, the first answer is final
//! 4. otherwise run the tool once, append the call and its result, and ask
//!    the model a second and last time
//!
//! The session is disconnected on every exit path before the answer or the
//! error is returned. Nothing is retried.

use jsonschema::JSONSchema;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::mcp::{SessionFactory, ToolDescriptor, ToolEndpoint, ToolSession};
use crate::model::{Conversation, GenerationOptions, ModelClient, ModelResponse, ToolInvocationRequest};
use crate::schema::to_function_schemas;

/// Default bound on a single model call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// What happened during one [`ChatOrchestrator::handle_with_trace`] call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnTrace {
    /// Tool invoked on behalf of the model, if any
    pub tool_called: Option<String>,
    /// Completion requests sent (1 or 2)
    pub model_calls: u8,
}

/// Drives the two-call exchange between a model and a tool server
pub struct ChatOrchestrator {
    model: Arc<dyn ModelClient>,
    sessions: Arc<dyn SessionFactory>,
    endpoint: ToolEndpoint,
    system_prompt: Option<String>,
    options: GenerationOptions,
    call_timeout: Duration,
}

impl ChatOrchestrator {
    /// Create an orchestrator with deterministic sampling and no system prompt
    pub fn new(
        model: Arc<dyn ModelClient>,
        sessions: Arc<dyn SessionFactory>,
        endpoint: ToolEndpoint,
    ) -> Self {
        ChatOrchestrator {
            model,
            sessions,
            endpoint,
            system_prompt: None,
            options: GenerationOptions::deterministic(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Standing instructions sent with both model calls
    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Bound each model call
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Tool endpoint sessions are opened against
    pub fn endpoint(&self) -> &ToolEndpoint {
        &self.endpoint
    }

    /// Answer one utterance
    pub async fn handle(&self, utterance: &str) -> Result<String> {
        self.handle_with_trace(utterance).await.map(|(reply, _)| reply)
    }

    /// Answer one utterance and report which tool, if any, was used
    pub async fn handle_with_trace(&self, utterance: &str) -> Result<(String, TurnTrace)> {
        let mut session = self.sessions.create();
        let mut trace = TurnTrace::default();

        let outcome = self.run(session.as_mut(), utterance, &mut trace).await;
        release(session.as_mut()).await;

        outcome.map(|reply| (reply, trace))
    }

    /// Connect, enumerate the server's tools and disconnect
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let mut session = self.sessions.create();

        let outcome = async {
            session.connect(&self.endpoint).await?;
            session.list_tools().await
        }
        .await;
        release(session.as_mut()).await;

        outcome
    }

    async fn run(
        &self,
        session: &mut dyn ToolSession,
        utterance: &str,
        trace: &mut TurnTrace,
    ) -> Result<String> {
        session.connect(&self.endpoint).await?;
        let tools = session.list_tools().await?;
        let schemas = to_function_schemas(&tools, self.model.dialect());

        let mut conversation = Conversation::new().with_system_prompt(self.system_prompt.clone());
        conversation.push_user(utterance);

        let first = self.complete(&conversation, &schemas, trace).await?;
        let Some(call) = first.requested_tool_call()? else {
            return final_text(first.as_ref());
        };

        let descriptor = tools
            .iter()
            .find(|t| t.name == call.name)
            .ok_or_else(|| Error::ToolNotFound(call.name.clone()))?;
        validate_arguments(descriptor, &call)?;

        info!(tool = %call.name, "Model requested tool");
        debug!(tool = %call.name, arguments = %call.arguments_value(), "Tool arguments");
        trace.tool_called = Some(call.name.clone());

        let result = session.call_tool(&call.name, call.arguments_value()).await?;
        let content = result.text();
        if content.is_empty() {
            debug!(tool = %call.name, "Tool returned no text content");
        }

        conversation.push_function_call(call.clone());
        conversation.push_function_result(&call, content);

        let second = self.complete(&conversation, &schemas, trace).await?;
        if second.tool_call_count() > 0 {
            warn!(
                "Model requested another tool after '{}'; chained calls are not followed",
                call.name
            );
        }
        final_text(second.as_ref())
    }

    async fn complete(
        &self,
        conversation: &Conversation,
        schemas: &[serde_json::Value],
        trace: &mut TurnTrace,
    ) -> Result<Box<dyn ModelResponse>> {
        trace.model_calls += 1;
        debug!(
            model = %self.model.model(),
            call = trace.model_calls,
            turns = conversation.len(),
            "Requesting completion"
        );

        tokio::time::timeout(
            self.call_timeout,
            self.model.complete(conversation, schemas, &self.options),
        )
        .await
        .map_err(|_| {
            Error::Timeout(format!(
                "model call {} exceeded {:?}",
                trace.model_calls, self.call_timeout
            ))
        })?
    }
}

/// Disconnect, logging rather than surfacing a failure
async fn release(session: &mut dyn ToolSession) {
    if let Err(e) = session.disconnect().await {
        warn!("Failed to disconnect tool session: {}", e);
    }
}

fn final_text(response: &dyn ModelResponse) -> Result<String> {
    response
        .text()
        .ok_or_else(|| Error::ModelEndpoint("model returned no text content".to_string()))
}

/// Check the model's arguments against the tool's declared input schema
fn validate_arguments(tool: &ToolDescriptor, call: &ToolInvocationRequest) -> Result<()> {
    let compiled = match JSONSchema::compile(&tool.input_schema) {
        Ok(compiled) => compiled,
        Err(e) => {
            // The server owns the schema; an unusable one should not block the call
            warn!(tool = %tool.name, "Skipping argument validation, schema does not compile: {}", e);
            return Ok(());
        }
    };

    let arguments = call.arguments_value();
    if let Err(errors) = compiled.validate(&arguments) {
        let details: Vec<String> = errors.map(|e| e.to_string()).collect();
        return Err(Error::ToolArgument(format!(
            "arguments for '{}' do not match its input schema: {}",
            tool.name,
            details.join("; ")
        )));
    }

    Ok(())
}
