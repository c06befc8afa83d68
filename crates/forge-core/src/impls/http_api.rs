//! HttpTaskApi - reqwest による TaskApi 実装
//!
//! | Action | Method | Path |
//! |---|---|---|
//! | create_task | POST | `/api/tasks` |
//! | update_task | PATCH | `/api/tasks/{id}` |
//! | complete_task | POST | `/api/tasks/{id}/complete` |
//!
//! 成功判定は全エンドポイント共通で「2xx かどうか」。
//! レスポンス本文は成功時には読まない（失敗時はエラーメッセージ用に読む）。

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;
use std::time::Duration;

use crate::domain::ReplayError;
use crate::ports::TaskApi;

/// エラー本文はログ用なので長すぎる場合は切り詰める
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone)]
pub struct HttpTaskApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpTaskApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// タイムアウト付きのクライアントで作成
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ReplayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReplayError::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            token: None,
        }
    }

    /// Bearer token を付与
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, method: Method, path: String, body: &Value) -> Result<(), ReplayError> {
        tracing::debug!(%method, %path, "replaying against remote");

        let response = self
            .request(method, &path)
            .json(body)
            .send()
            .await
            .map_err(|e| ReplayError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Err(ReplayError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

/// パスに埋め込む task id を最低限エスケープ
fn path_segment(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for b in id.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn create_task(&self, body: &Value) -> Result<(), ReplayError> {
        self.send(Method::POST, "/api/tasks".to_string(), body).await
    }

    async fn update_task(&self, task_id: &str, body: &Value) -> Result<(), ReplayError> {
        let path = format!("/api/tasks/{}", path_segment(task_id));
        self.send(Method::PATCH, path, body).await
    }

    async fn complete_task(&self, task_id: &str, body: &Value) -> Result<(), ReplayError> {
        let path = format!("/api/tasks/{}/complete", path_segment(task_id));
        self.send(Method::POST, path, body).await
    }
}
