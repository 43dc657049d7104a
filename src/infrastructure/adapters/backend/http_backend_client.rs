//! HTTP Backend Client - 调用教材流水线后端 HTTP 服务
//!
//! 同时实现 PipelineApiPort 与 ExplainApiPort
//!
//! 后端 API:
//! GET  /api/textbooks/{id}/status
//! POST /api/textbooks/{id}/verify-chapters     {"selected_chapter_ids": [...]}
//! POST /api/textbooks/{id}/extract-deferred    {"chapter_ids": [...]}
//! GET  /api/textbooks/{id}/extraction-progress
//! POST /api/explain                            SSE: data: <text>\n\n ... data: [DONE]\n\n
//! POST /api/conversations/followup             同上

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::dto::{
    error_detail, ChapterRefDto, ExplainRequestDto, ExtractDeferredRequest,
    ExtractDeferredResponse, FollowupRequestDto, PipelineStatusDto, VerifyChaptersRequest,
    VerifyChaptersResponse,
};
use crate::application::error::ClientError;
use crate::application::ports::{
    ByteStream, ConfirmAck, ExplainApiPort, ExplainRequest, ExtractAck, FollowupRequest,
    PipelineApiPort,
};
use crate::domain::pipeline::{ChapterId, PipelineSnapshot, SelectedChapters, TextbookId};

/// HTTP 后端客户端配置
#[derive(Debug, Clone)]
pub struct HttpBackendClientConfig {
    /// 后端基础 URL
    pub base_url: String,
    /// 连接超时（秒）；流式响应没有整体超时
    pub connect_timeout_secs: u64,
}

impl Default for HttpBackendClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            connect_timeout_secs: 10,
        }
    }
}

impl HttpBackendClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }
}

/// HTTP 后端客户端
pub struct HttpBackendClient {
    client: Client,
    base_url: String,
}

impl HttpBackendClient {
    pub fn new(config: HttpBackendClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| ClientError::transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn textbook_url(&self, textbook_id: &TextbookId, action: &str) -> String {
        format!("{}/api/textbooks/{}/{}", self.base_url, textbook_id, action)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ClientError> {
        tracing::debug!(url = %url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(transport_error)?;
        read_json(check_status(response).await?).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        tracing::debug!(url = %url, "POST");
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        read_json(check_status(response).await?).await
    }

    async fn open_stream<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<ByteStream, ClientError> {
        tracing::debug!(url = %url, "Opening stream");
        let response = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;

        if response.content_length() == Some(0) {
            return Err(ClientError::protocol("stream response has no body"));
        }

        Ok(Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(transport_error)),
        ))
    }
}

fn transport_error(e: reqwest::Error) -> ClientError {
    if e.is_connect() {
        ClientError::transport(format!("Cannot connect to backend: {}", e))
    } else if e.is_timeout() {
        ClientError::transport(format!("Request timed out: {}", e))
    } else if e.is_decode() {
        ClientError::protocol(e.to_string())
    } else {
        ClientError::transport(e.to_string())
    }
}

/// 非 2xx 响应转换为 Server 错误
async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.bytes().await.unwrap_or_default();
    let err = ClientError::server(status.as_u16(), error_detail(&body));
    tracing::debug!(status = status.as_u16(), error = %err, "Backend returned error status");
    Err(err)
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let body = response.bytes().await.map_err(transport_error)?;
    serde_json::from_slice(&body)
        .map_err(|e| ClientError::protocol(format!("Invalid response body: {}", e)))
}

#[async_trait]
impl PipelineApiPort for HttpBackendClient {
    async fn fetch_status(&self, textbook_id: &TextbookId) -> Result<PipelineSnapshot, ClientError> {
        let dto: PipelineStatusDto = self
            .get_json(&self.textbook_url(textbook_id, "status"))
            .await?;
        dto.into_snapshot(textbook_id)
    }

    async fn confirm_selection(
        &self,
        textbook_id: &TextbookId,
        selection: &SelectedChapters,
    ) -> Result<ConfirmAck, ClientError> {
        let body = VerifyChaptersRequest {
            selected_chapter_ids: selection.ids().iter().map(ChapterId::to_string).collect(),
        };
        let response: VerifyChaptersResponse = self
            .post_json(&self.textbook_url(textbook_id, "verify-chapters"), &body)
            .await?;
        Ok(response.into())
    }

    async fn extract_deferred(
        &self,
        textbook_id: &TextbookId,
        chapter_ids: &[ChapterId],
    ) -> Result<ExtractAck, ClientError> {
        let body = ExtractDeferredRequest {
            chapter_ids: chapter_ids.iter().map(ChapterId::to_string).collect(),
        };
        let response: ExtractDeferredResponse = self
            .post_json(&self.textbook_url(textbook_id, "extract-deferred"), &body)
            .await?;
        Ok(response.into())
    }

    async fn extraction_progress(
        &self,
        textbook_id: &TextbookId,
    ) -> Result<PipelineSnapshot, ClientError> {
        let dto: PipelineStatusDto = self
            .get_json(&self.textbook_url(textbook_id, "extraction-progress"))
            .await?;
        dto.into_snapshot(textbook_id)
    }
}

#[async_trait]
impl ExplainApiPort for HttpBackendClient {
    async fn open_explanation(&self, request: &ExplainRequest) -> Result<ByteStream, ClientError> {
        let body = ExplainRequestDto {
            chapters: request.chapters.iter().map(ChapterRefDto::from).collect(),
            query: request.query.clone(),
        };
        self.open_stream(&self.url("/api/explain"), &body).await
    }

    async fn open_followup(&self, request: &FollowupRequest) -> Result<ByteStream, ClientError> {
        let body = FollowupRequestDto {
            conversation_id: request.conversation_id,
            message: request.message.clone(),
        };
        self.open_stream(&self.url("/api/conversations/followup"), &body)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::{Arc, Mutex};

    use axum::body::Body;
    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response as AxumResponse};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use bytes::Bytes;
    use serde_json::{json, Value};

    use crate::application::ports::ChapterRef;
    use crate::domain::pipeline::{ChapterSelection, ExtractionStatus, PipelineStatus};
    use crate::domain::{FrameDecoder, StreamFrame};

    #[derive(Clone, Default)]
    struct StubState {
        bodies: Arc<Mutex<Vec<(String, Value)>>>,
    }

    impl StubState {
        fn record(&self, route: &str, body: Value) {
            self.bodies.lock().unwrap().push((route.to_string(), body));
        }

        fn bodies(&self) -> Vec<(String, Value)> {
            self.bodies.lock().unwrap().clone()
        }
    }

    fn status_body() -> Value {
        json!({
            "pipeline_status": "partially_extracted",
            "chapters": [
                {"id": "ch-1", "title": "Signals", "chapter_number": 1, "page_start": 1,
                 "page_end": 30, "extraction_status": "extracted", "relevance_score": 0.91,
                 "matched_topics": ["sampling"]},
                {"id": "ch-2", "title": "Z-Transform", "chapter_number": 2, "page_start": 31,
                 "page_end": 70, "extraction_status": "deferred", "relevance_score": 0.42},
                {"id": "ch-3", "title": "Filters", "chapter_number": 3, "page_start": 71,
                 "page_end": 120, "extraction_status": "deferred"}
            ]
        })
    }

    async fn status(Path(id): Path<String>) -> AxumResponse {
        match id.as_str() {
            "tb-123" => Json(status_body()).into_response(),
            "tb-broken" => (StatusCode::OK, "not json").into_response(),
            "tb-unknown-status" => {
                Json(json!({"pipeline_status": "paused", "chapters": []})).into_response()
            }
            "tb-validation" => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({"detail": [{"msg": "field required"}]})),
            )
                .into_response(),
            "tb-html" => (StatusCode::BAD_GATEWAY, "<html>oops</html>").into_response(),
            _ => (
                StatusCode::NOT_FOUND,
                Json(json!({"detail": "Textbook not found"})),
            )
                .into_response(),
        }
    }

    async fn verify(
        State(state): State<StubState>,
        Path(_id): Path<String>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        let count = body["selected_chapter_ids"].as_array().map_or(0, Vec::len);
        state.record("verify-chapters", body);
        Json(json!({"status": "extracting", "selected_count": count}))
    }

    async fn extract(
        State(state): State<StubState>,
        Path(_id): Path<String>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        state.record("extract-deferred", body);
        Json(json!({"status": "extracting"}))
    }

    fn sse(frames: &'static [&'static str]) -> AxumResponse {
        let chunks = frames
            .iter()
            .map(|f| Ok::<_, Infallible>(Bytes::from_static(f.as_bytes())));
        AxumResponse::builder()
            .header("content-type", "text/event-stream")
            .body(Body::from_stream(futures_util::stream::iter(chunks)))
            .unwrap()
    }

    async fn explain(State(state): State<StubState>, Json(body): Json<Value>) -> AxumResponse {
        let query = body["query"].as_str().unwrap_or_default().to_string();
        state.record("explain", body);
        if query == "missing chapter" {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"detail": "Chapter 9 not found"})),
            )
                .into_response();
        }
        sse(&["data: The Z-trans", "form \n\ndata: is defined as...\n\n", "data: [DONE]\n\n"])
    }

    async fn followup(State(state): State<StubState>, Json(body): Json<Value>) -> AxumResponse {
        state.record("followup", body);
        sse(&["data: For example\n\n", "data: [DONE]\n\n"])
    }

    async fn serve() -> (HttpBackendClient, StubState) {
        let state = StubState::default();
        let app = Router::new()
            .route("/api/textbooks/:id/status", get(status))
            .route("/api/textbooks/:id/extraction-progress", get(status))
            .route("/api/textbooks/:id/verify-chapters", post(verify))
            .route("/api/textbooks/:id/extract-deferred", post(extract))
            .route("/api/explain", post(explain))
            .route("/api/conversations/followup", post(followup))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client =
            HttpBackendClient::new(HttpBackendClientConfig::new(format!("http://{}/", addr)))
                .unwrap();
        (client, state)
    }

    async fn collect_text(mut body: ByteStream) -> (String, bool) {
        let mut decoder = FrameDecoder::new();
        let mut text = String::new();
        let mut done = false;
        while let Some(chunk) = body.next().await {
            decoder.feed(&chunk.unwrap());
            while let Some(frame) = decoder.next_frame() {
                match frame.unwrap() {
                    StreamFrame::Delta(delta) => text.push_str(&delta),
                    StreamFrame::Done => done = true,
                }
            }
        }
        (text, done)
    }

    #[test]
    fn test_config_default() {
        let config = HttpBackendClientConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.connect_timeout_secs, 10);

        let config = HttpBackendClientConfig::new("http://backend:9000").with_connect_timeout(3);
        assert_eq!(config.base_url, "http://backend:9000");
        assert_eq!(config.connect_timeout_secs, 3);
    }

    #[tokio::test]
    async fn test_fetch_status() {
        let (client, _) = serve().await;
        let snapshot = client.fetch_status(&TextbookId::from("tb-123")).await.unwrap();

        assert_eq!(snapshot.status(), PipelineStatus::PartiallyExtracted);
        assert_eq!(snapshot.chapters().len(), 3);
        assert_eq!(snapshot.chapters()[0].status(), ExtractionStatus::Extracted);
        assert_eq!(
            snapshot.deferred_ids(),
            vec![ChapterId::from("ch-2"), ChapterId::from("ch-3")]
        );

        let progress = client
            .extraction_progress(&TextbookId::from("tb-123"))
            .await
            .unwrap();
        assert_eq!(progress, snapshot);
    }

    #[tokio::test]
    async fn test_error_detail_is_surfaced() {
        let (client, _) = serve().await;

        let err = client.fetch_status(&TextbookId::from("tb-missing")).await.unwrap_err();
        assert!(matches!(err, ClientError::Server { status: 404, .. }));
        assert_eq!(err.to_string(), "Textbook not found");

        let err = client.fetch_status(&TextbookId::from("tb-html")).await.unwrap_err();
        assert_eq!(err.to_string(), "Server error 502");

        let err = client
            .fetch_status(&TextbookId::from("tb-validation"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), r#"[{"msg":"field required"}]"#);
    }

    #[tokio::test]
    async fn test_malformed_bodies_are_protocol_errors() {
        let (client, _) = serve().await;

        let err = client.fetch_status(&TextbookId::from("tb-broken")).await.unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));

        let err = client
            .fetch_status(&TextbookId::from("tb-unknown-status"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_confirm_and_extract_bodies() {
        let (client, state) = serve().await;
        let tb = TextbookId::from("tb-123");
        let snapshot = client.fetch_status(&tb).await.unwrap();

        let mut selection = ChapterSelection::new();
        selection.select(ChapterId::from("ch-3"));
        selection.select(ChapterId::from("ch-2"));
        let selected = selection.confirm(&snapshot).unwrap();
        let ack = client.confirm_selection(&tb, &selected).await.unwrap();
        assert_eq!(ack.selected_count, 2);
        assert_eq!(ack.status, "extracting");

        let ack = client
            .extract_deferred(&tb, &snapshot.deferred_ids())
            .await
            .unwrap();
        assert_eq!(ack.status, "extracting");

        let bodies = state.bodies();
        assert_eq!(
            bodies[0],
            (
                "verify-chapters".to_string(),
                json!({"selected_chapter_ids": ["ch-2", "ch-3"]})
            )
        );
        assert_eq!(
            bodies[1],
            (
                "extract-deferred".to_string(),
                json!({"chapter_ids": ["ch-2", "ch-3"]})
            )
        );
    }

    #[tokio::test]
    async fn test_explanation_stream() {
        let (client, state) = serve().await;
        let request = ExplainRequest::new(
            vec![ChapterRef::new(TextbookId::from("tb-123"), 2).with_textbook_title("DSP")],
            "What is the Z-transform?",
        );

        let body = client.open_explanation(&request).await.unwrap();
        let (text, done) = collect_text(body).await;
        assert_eq!(text, "The Z-transform is defined as...");
        assert!(done);

        let bodies = state.bodies();
        assert_eq!(
            bodies[0].1,
            json!({
                "chapters": [{
                    "textbook_id": "tb-123",
                    "chapter_num": "2",
                    "classification": "EXPLAINS",
                    "textbook_title": "DSP"
                }],
                "query": "What is the Z-transform?"
            })
        );
    }

    #[tokio::test]
    async fn test_explanation_error_status() {
        let (client, _) = serve().await;
        let request = ExplainRequest::new(
            vec![ChapterRef::new(TextbookId::from("tb-123"), 9)],
            "missing chapter",
        );
        let err = client.open_explanation(&request).await.err().unwrap();
        assert_eq!(err.to_string(), "Chapter 9 not found");
    }

    #[tokio::test]
    async fn test_followup_stream() {
        let (client, state) = serve().await;
        let conversation_id = uuid::Uuid::new_v4();
        let body = client
            .open_followup(&FollowupRequest::new(conversation_id, "Give an example"))
            .await
            .unwrap();
        let (text, done) = collect_text(body).await;
        assert_eq!(text, "For example");
        assert!(done);
        assert_eq!(
            state.bodies()[0].1,
            json!({"conversation_id": conversation_id.to_string(), "message": "Give an example"})
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            HttpBackendClient::new(HttpBackendClientConfig::new(format!("http://{}", addr)))
                .unwrap();
        let err = client.fetch_status(&TextbookId::from("tb-123")).await.unwrap_err();
        assert!(err.is_transient());
    }
}
