//! Model gateway — one call contract over two backend dialects.
//!
//! The gateway owns the dialect ([`ApiType`]), the model id and the sampling
//! settings. Callers hand it the session transcript and, optionally, the
//! tool definitions; it returns a [`GatewayStream`] of content chunks and
//! tool-call requests.
//!
//! Dialect quirks are data: hosted backends get a preamble reiterating the
//! exact tool names, small local models get a strict JSON formatting hint.
//! Both are spliced into the outgoing request only, never into the
//! transcript the caller owns.

use crate::openai_compat::{
    HOSTED_BASE_URL, LOCAL_BASE_URL, LOCAL_PLACEHOLDER_KEY, OpenAiCompatProvider,
};
use ferrule_core::error::ProviderError;
use ferrule_core::message::{Message, Role, ToolCallRequest};
use ferrule_core::provider::{
    ApiType, Provider, ProviderRequest, StreamChunk, ToolDefinition, Usage,
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Model-id fragments that mark a model as too small to format calls reliably.
const SMALL_MODEL_MARKERS: &[&str] = &["mini", "phi", "mistral"];

/// Raw inputs for [`ModelGateway::configure`], usually taken from config.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub api_type: String,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub request_timeout: Duration,
}

impl GatewaySettings {
    pub fn new(api_type: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_type: api_type.into(),
            model: model.into(),
            api_key: None,
            base_url: None,
            temperature: 0.7,
            max_tokens: None,
            request_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
}

/// A configured handle onto one backend.
pub struct ModelGateway {
    provider: Arc<dyn Provider>,
    api_type: ApiType,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl ModelGateway {
    /// Build a gateway from settings, failing fast on an unknown dialect or
    /// a hosted dialect without credentials.
    pub fn configure(settings: GatewaySettings) -> Result<Self, ProviderError> {
        let api_type: ApiType = settings.api_type.parse()?;

        let api_key = settings
            .api_key
            .filter(|k| !k.trim().is_empty());

        let provider = match api_type {
            ApiType::Hosted => {
                let key = api_key.ok_or_else(|| {
                    ProviderError::MissingCredentials(
                        "the hosted API type requires an API key \
                         (set FERRULE_API_KEY or OPENAI_API_KEY)"
                            .into(),
                    )
                })?;
                OpenAiCompatProvider::with_timeout(
                    "openai",
                    settings.base_url.as_deref().unwrap_or(HOSTED_BASE_URL),
                    key,
                    settings.request_timeout,
                )
            }
            ApiType::LocalCompatible => OpenAiCompatProvider::with_timeout(
                "local",
                settings.base_url.as_deref().unwrap_or(LOCAL_BASE_URL),
                api_key.unwrap_or_else(|| LOCAL_PLACEHOLDER_KEY.to_string()),
                settings.request_timeout,
            ),
        };

        info!(
            api_type = %api_type,
            model = %settings.model,
            base_url = %provider.base_url(),
            "Model gateway configured"
        );

        Ok(Self {
            provider: Arc::new(provider),
            api_type,
            model: settings.model,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }

    /// Wrap an existing provider (used by tests and embedders).
    pub fn with_provider(
        provider: Arc<dyn Provider>,
        api_type: ApiType,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            api_type,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
        }
    }

    pub fn api_type(&self) -> ApiType {
        self.api_type
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Whether the configured model is small enough to need formatting help.
    pub fn is_small_model(&self) -> bool {
        let model = self.model.to_ascii_lowercase();
        SMALL_MODEL_MARKERS.iter().any(|m| model.contains(m))
    }

    /// Start a completion.
    ///
    /// With `tools = None` this is a plain streaming chat completion and the
    /// stream never yields [`GatewayEvent::ToolCall`].
    pub async fn complete(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<GatewayStream, ProviderError> {
        let tools = tools.unwrap_or_default();
        let outgoing = self.outgoing_messages(messages, tools);

        let mut request = ProviderRequest::new(&self.model, outgoing, tools.to_vec());
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;
        request.stream = true;

        debug!(
            provider = %self.provider.name(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Gateway request"
        );

        let rx = self.provider.stream(request).await?;
        Ok(GatewayStream::new(rx, !tools.is_empty()))
    }

    /// The transcript as sent on the wire, with dialect preambles inserted
    /// after the leading system message.
    fn outgoing_messages(&self, messages: &[Message], tools: &[ToolDefinition]) -> Vec<Message> {
        let mut preambles = Vec::new();
        if !tools.is_empty() {
            if self.api_type == ApiType::Hosted {
                preambles.push(Message::system(tool_name_preamble(tools)));
            }
            if self.api_type == ApiType::LocalCompatible && self.is_small_model() {
                preambles.push(Message::system(JSON_FORMAT_PREAMBLE));
            }
        }

        if preambles.is_empty() {
            return messages.to_vec();
        }

        let split = match messages.first() {
            Some(m) if m.role == Role::System => 1,
            _ => 0,
        };
        let mut out = Vec::with_capacity(messages.len() + preambles.len());
        out.extend_from_slice(&messages[..split]);
        out.extend(preambles);
        out.extend_from_slice(&messages[split..]);
        out
    }
}

fn tool_name_preamble(tools: &[ToolDefinition]) -> String {
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    format!(
        "IMPORTANT: When using tools, you must use ONLY the exact tool names as defined ({}). \
         Never add operations or methods to the tool name with dots.",
        names.join(", ")
    )
}

const JSON_FORMAT_PREAMBLE: &str = "CRITICAL: When calling a tool, the arguments must be a single valid JSON object \
with double-quoted keys and no surrounding prose. Examples: \
{ \"operation\": \"read\", \"filePath\": \"/path/to/file\" } or { \"command\": \"ls -la\" }.";

/// One normalized event from a gateway response.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// A text chunk to forward to the output as it arrives
    Content(String),
    /// A complete tool-call request; calls arrive in request order
    ToolCall(ToolCallRequest),
    /// The response is complete
    Done(Option<Usage>),
}

/// Lazy sequence of [`GatewayEvent`]s for one response.
pub struct GatewayStream {
    rx: mpsc::Receiver<Result<StreamChunk, ProviderError>>,
    pending: VecDeque<GatewayEvent>,
    tools_enabled: bool,
    finished: bool,
}

impl GatewayStream {
    fn new(rx: mpsc::Receiver<Result<StreamChunk, ProviderError>>, tools_enabled: bool) -> Self {
        Self {
            rx,
            pending: VecDeque::new(),
            tools_enabled,
            finished: false,
        }
    }

    /// Next event, or `None` once [`GatewayEvent::Done`] has been yielded.
    pub async fn next_event(&mut self) -> Option<Result<GatewayEvent, ProviderError>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            if self.finished {
                return None;
            }

            match self.rx.recv().await {
                Some(Ok(chunk)) => self.absorb(chunk),
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                None => {
                    // Sender went away without a final chunk
                    self.finished = true;
                    self.pending.push_back(GatewayEvent::Done(None));
                }
            }
        }
    }

    fn absorb(&mut self, chunk: StreamChunk) {
        if let Some(text) = chunk.content.filter(|t| !t.is_empty()) {
            self.pending.push_back(GatewayEvent::Content(text));
        }
        if self.tools_enabled {
            self.pending
                .extend(chunk.tool_calls.into_iter().map(GatewayEvent::ToolCall));
        }
        if chunk.done {
            self.finished = true;
            self.pending.push_back(GatewayEvent::Done(chunk.usage));
        }
    }

    /// Drain the stream into its full content and calls.
    pub async fn collect(mut self) -> Result<GatewayResponse, ProviderError> {
        let mut response = GatewayResponse::default();
        while let Some(event) = self.next_event().await {
            match event? {
                GatewayEvent::Content(text) => response.content.push_str(&text),
                GatewayEvent::ToolCall(call) => response.tool_calls.push(call),
                GatewayEvent::Done(usage) => response.usage = usage,
            }
        }
        Ok(response)
    }
}

/// A fully drained gateway response.
#[derive(Debug, Clone, Default)]
pub struct GatewayResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub usage: Option<Usage>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ferrule_core::provider::ProviderResponse;
    use std::sync::Mutex;

    /// Records the last request and answers with a fixed message.
    struct RecordingProvider {
        reply: Message,
        seen: Mutex<Option<ProviderRequest>>,
    }

    impl RecordingProvider {
        fn new(reply: Message) -> Arc<Self> {
            Arc::new(Self {
                reply,
                seen: Mutex::new(None),
            })
        }

        fn seen(&self) -> ProviderRequest {
            self.seen.lock().unwrap().clone().expect("no request seen")
        }
    }

    #[async_trait]
    impl Provider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            *self.seen.lock().unwrap() = Some(request.clone());
            Ok(ProviderResponse {
                message: self.reply.clone(),
                usage: None,
                model: request.model,
            })
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl Provider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        async fn complete(&self, _: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::Network("connection refused".into()))
        }
    }

    fn tools() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: "fileSystemTool".into(),
                description: "files".into(),
                parameters: serde_json::json!({"type": "object"}),
            },
            ToolDefinition {
                name: "bashExecutorTool".into(),
                description: "shell".into(),
                parameters: serde_json::json!({"type": "object"}),
            },
        ]
    }

    fn transcript() -> Vec<Message> {
        vec![Message::system("You are helpful"), Message::user("hi")]
    }

    #[test]
    fn configure_rejects_unknown_dialect() {
        let err = ModelGateway::configure(GatewaySettings::new("azure", "gpt-4o")).err();
        assert!(matches!(err, Some(ProviderError::UnsupportedApiType(_))));
    }

    #[test]
    fn configure_requires_key_for_hosted() {
        let err = ModelGateway::configure(GatewaySettings::new("hosted", "gpt-4o")).err();
        assert!(matches!(err, Some(ProviderError::MissingCredentials(_))));

        let blank = GatewaySettings::new("hosted", "gpt-4o").with_api_key("   ");
        assert!(matches!(
            ModelGateway::configure(blank).err(),
            Some(ProviderError::MissingCredentials(_))
        ));
    }

    #[tokio::test]
    async fn configure_builds_both_dialects() {
        let hosted =
            ModelGateway::configure(GatewaySettings::new("openai", "gpt-4o").with_api_key("sk-x"))
                .unwrap();
        assert_eq!(hosted.api_type(), ApiType::Hosted);

        let local = ModelGateway::configure(
            GatewaySettings::new("local-compatible", "llama3.2")
                .with_base_url("http://127.0.0.1:8080/v1"),
        )
        .unwrap();
        assert_eq!(local.api_type(), ApiType::LocalCompatible);
        assert_eq!(local.model(), "llama3.2");
    }

    #[test]
    fn small_model_detection() {
        let provider = RecordingProvider::new(Message::assistant(""));
        for (model, small) in [
            ("gpt-4o-mini", true),
            ("phi3", true),
            ("Mistral-7B", true),
            ("llama3.2", false),
            ("gpt-4o", false),
        ] {
            let gw = ModelGateway::with_provider(provider.clone(), ApiType::LocalCompatible, model);
            assert_eq!(gw.is_small_model(), small, "{model}");
        }
    }

    #[tokio::test]
    async fn hosted_preamble_follows_system_message() {
        let provider = RecordingProvider::new(Message::assistant("ok"));
        let gw = ModelGateway::with_provider(provider.clone(), ApiType::Hosted, "gpt-4o");
        let tools = tools();

        gw.complete(&transcript(), Some(&tools)).await.unwrap();

        let sent = provider.seen();
        assert_eq!(sent.messages.len(), 3);
        assert_eq!(sent.messages[0].content, "You are helpful");
        assert_eq!(sent.messages[1].role, Role::System);
        assert!(sent.messages[1].content.contains("fileSystemTool, bashExecutorTool"));
        assert!(sent.messages[1].content.contains("with dots"));
        assert_eq!(sent.messages[2].role, Role::User);
        assert_eq!(sent.tools.len(), 2);
    }

    #[tokio::test]
    async fn small_local_model_gets_json_hint() {
        let provider = RecordingProvider::new(Message::assistant("ok"));
        let gw = ModelGateway::with_provider(provider.clone(), ApiType::LocalCompatible, "phi3");
        let tools = tools();

        gw.complete(&transcript(), Some(&tools)).await.unwrap();

        let sent = provider.seen();
        assert_eq!(sent.messages.len(), 3);
        assert!(sent.messages[1].content.starts_with("CRITICAL"));
    }

    #[tokio::test]
    async fn plain_chat_has_no_preamble_or_tools() {
        let provider = RecordingProvider::new(Message::assistant("hello"));
        let gw = ModelGateway::with_provider(provider.clone(), ApiType::Hosted, "gpt-4o-mini");

        let response = gw.complete(&transcript(), None).await.unwrap().collect().await.unwrap();

        let sent = provider.seen();
        assert_eq!(sent.messages.len(), 2);
        assert!(sent.tools.is_empty());
        assert_eq!(response.content, "hello");
    }

    #[tokio::test]
    async fn caller_transcript_is_untouched() {
        let provider = RecordingProvider::new(Message::assistant("ok"));
        let gw = ModelGateway::with_provider(provider, ApiType::Hosted, "gpt-4o");
        let messages = transcript();
        let tools = tools();

        gw.complete(&messages, Some(&tools)).await.unwrap();
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn stream_yields_content_then_calls_then_done() {
        let reply = Message::assistant_with_calls(
            "Looking",
            vec![
                ToolCallRequest::new("a", "fileSearchTool", "{}"),
                ToolCallRequest::new("b", "fileSearchTool", "{}"),
            ],
        );
        let provider = RecordingProvider::new(reply);
        let gw = ModelGateway::with_provider(provider, ApiType::LocalCompatible, "llama3.2");
        let tools = tools();

        let mut stream = gw.complete(&transcript(), Some(&tools)).await.unwrap();
        let mut kinds = Vec::new();
        while let Some(event) = stream.next_event().await {
            kinds.push(match event.unwrap() {
                GatewayEvent::Content(t) => format!("content:{t}"),
                GatewayEvent::ToolCall(c) => format!("call:{}", c.id),
                GatewayEvent::Done(_) => "done".to_string(),
            });
        }
        assert_eq!(kinds, vec!["content:Looking", "call:a", "call:b", "done"]);
    }

    #[tokio::test]
    async fn closed_channel_ends_with_done() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(Ok(StreamChunk {
            content: Some("partial".into()),
            ..StreamChunk::default()
        }))
        .await
        .unwrap();
        drop(tx);

        let response = GatewayStream::new(rx, true).collect().await.unwrap();
        assert_eq!(response.content, "partial");
        assert!(response.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn provider_failure_surfaces_from_complete() {
        let gw = ModelGateway::with_provider(Arc::new(FailingProvider), ApiType::Hosted, "gpt-4o");
        let err = gw.complete(&transcript(), None).await.err();
        assert!(matches!(err, Some(ProviderError::Network(_))));
    }
}
