//! モデル呼び出しの境界
//!
//! パイプラインは `ChatTransport` トレイト越しにモデルを呼び出す。
//! 本番実装の `PerplexityClient` は OpenAI 互換エンドポイントへ
//! `async-openai` でリクエストを送り、レスポンスをそのまま `RawResponse` として返す。

use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
    },
    Client,
};
use tracing::{debug, info};

use super::extract::RawResponse;
use crate::storage::history::Role;

/// モデルへ送る 1 メッセージ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// 生成パラメータ
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// モデル呼び出しの抽象。テストでは固定レスポンスを返す実装に差し替える。
pub trait ChatTransport {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        params: &GenerateParams,
    ) -> Result<RawResponse>;
}

/// Perplexity (OpenAI 互換 API) クライアント
pub struct PerplexityClient {
    client: Client<OpenAIConfig>,
}

impl PerplexityClient {
    /// 解決済みの API キーとベース URL からクライアントを作る。
    pub fn new(api_key: &str, api_base: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);
        debug!(api_base = %api_base, "Perplexity client configured");
        Self {
            client: Client::with_config(config),
        }
    }

    /// `max_tokens` は OpenAI 側では非推奨だが、Perplexity はこちらを参照する。
    #[allow(deprecated)]
    fn build_request(messages: &[ChatMessage], params: &GenerateParams) -> CreateChatCompletionRequest {
        CreateChatCompletionRequest {
            model: params.model.clone(),
            messages: messages.iter().map(to_request_message).collect(),
            temperature: Some(params.temperature),
            max_tokens: Some(params.max_tokens),
            ..Default::default()
        }
    }
}

impl ChatTransport for PerplexityClient {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        params: &GenerateParams,
    ) -> Result<RawResponse> {
        let request = Self::build_request(messages, params);

        debug!(
            model = %params.model,
            message_count = messages.len(),
            temperature = params.temperature,
            max_tokens = params.max_tokens,
            "Sending chat completion request"
        );

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| anyhow::anyhow!(e).context("chat completion request failed"))?;

        info!(
            model = %response.model,
            choices = response.choices.len(),
            "Chat completion received"
        );

        Ok(RawResponse::Completion(Box::new(response)))
    }
}

fn to_request_message(msg: &ChatMessage) -> ChatCompletionRequestMessage {
    match msg.role {
        Role::System => ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
            content: ChatCompletionRequestSystemMessageContent::Text(msg.content.clone()),
            name: None,
        }),
        Role::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
            name: None,
        }),
        Role::Assistant => {
            ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                    msg.content.clone(),
                )),
                ..Default::default()
            })
        }
    }
}
