//! AI 闲聊助手
//!
//! 只生成自由文本回复，不能读写购物车或订单。任何失败都降级为 `None`，
//! 由会话层使用固定文案兜底。

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::order::ChatStep;

/// 回复长度上限 (tokens)
pub const MAX_REPLY_TOKENS: u32 = 150;

/// 发送给助手的上下文
#[derive(Debug, Clone, Default)]
pub struct AssistantPrompt {
    /// 顾客原话
    pub utterance: String,
    /// 当前步骤
    pub step: Option<ChatStep>,
    /// 最近几条聊天记录
    pub context: Option<String>,
    /// 可售菜品名称
    pub menu_names: Vec<String>,
}

#[async_trait]
pub trait ChatAssistant: Send + Sync {
    async fn reply(&self, prompt: &AssistantPrompt) -> Option<String>;
}

#[derive(Debug, Serialize)]
struct CompletionMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionContent,
}

#[derive(Debug, Deserialize)]
struct CompletionContent {
    content: Option<String>,
}

fn system_prompt(prompt: &AssistantPrompt) -> String {
    let mut text = String::from(
        "You are a friendly waiter chatting with a restaurant guest at their table. \
         Reply in one or two short sentences. You cannot place, change or pay for orders; \
         point the guest to the buttons in the chat for that.",
    );
    if let Some(step) = prompt.step {
        text.push_str(&format!(" The guest is currently at the '{step}' step."));
    }
    if !prompt.menu_names.is_empty() {
        text.push_str(&format!(" Today's menu: {}.", prompt.menu_names.join(", ")));
    }
    if let Some(context) = prompt.context.as_deref().filter(|c| !c.is_empty()) {
        text.push_str(&format!(" Recent conversation:\n{context}"));
    }
    text
}

/// OpenAI 兼容的 chat-completions 接口
#[derive(Debug, Clone)]
pub struct OpenAiAssistant {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl OpenAiAssistant {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn build_request(&self, prompt: &AssistantPrompt) -> CompletionRequest<'_> {
        CompletionRequest {
            model: &self.model,
            messages: vec![
                CompletionMessage {
                    role: "system",
                    content: system_prompt(prompt),
                },
                CompletionMessage {
                    role: "user",
                    content: prompt.utterance.clone(),
                },
            ],
            max_tokens: MAX_REPLY_TOKENS,
            temperature: 0.7,
        }
    }

    fn parse_reply(body: Value) -> Option<String> {
        let response: CompletionResponse = serde_json::from_value(body).ok()?;
        response
            .choices
            .into_iter()
            .next()?
            .message
            .content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
    }
}

#[async_trait]
impl ChatAssistant for OpenAiAssistant {
    async fn reply(&self, prompt: &AssistantPrompt) -> Option<String> {
        let result = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&self.build_request(prompt))
            .send()
            .await;

        let response = match result {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::warn!(status = %r.status(), "assistant request rejected");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "assistant request failed");
                return None;
            }
        };

        match response.json::<Value>().await {
            Ok(body) => {
                let reply = Self::parse_reply(body);
                if reply.is_none() {
                    tracing::warn!("assistant response had no content");
                }
                reply
            }
            Err(e) => {
                tracing::warn!(error = %e, "assistant response unreadable");
                None
            }
        }
    }
}
