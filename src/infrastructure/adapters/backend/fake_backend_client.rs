//! Fake Backend Client - 用于测试的后端客户端
//!
//! 返回预先设定的流水线快照与讲解帧，并记录收到的请求，不访问网络

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, StreamExt};

use crate::application::error::ClientError;
use crate::application::ports::{
    ByteStream, ConfirmAck, ExplainApiPort, ExplainRequest, ExtractAck, FollowupRequest,
    PipelineApiPort,
};
use crate::domain::pipeline::{
    Chapter, ChapterId, ExtractionStatus, PageRange, PipelineSnapshot, PipelineStatus,
    SelectedChapters, TextbookId,
};

/// 预设的讲解响应体
#[derive(Debug, Clone)]
pub struct ScriptedStream {
    chunks: Vec<Result<Bytes, ClientError>>,
    chunk_delay: Option<Duration>,
    hold_open: bool,
    drop_flag: Option<Arc<AtomicBool>>,
}

impl ScriptedStream {
    pub fn new<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_results(
            chunks
                .into_iter()
                .map(|c| Ok(Bytes::copy_from_slice(c.as_ref().as_bytes())))
                .collect(),
        )
    }

    pub fn from_results(chunks: Vec<Result<Bytes, ClientError>>) -> Self {
        Self {
            chunks,
            chunk_delay: None,
            hold_open: false,
            drop_flag: None,
        }
    }

    /// 每个 chunk 之前等待
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// 发送完所有 chunk 后保持连接不关闭
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// 响应体被释放（连接关闭）时置位
    pub fn with_drop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.drop_flag = Some(flag);
        self
    }

    fn into_byte_stream(self) -> ByteStream {
        let delay = self.chunk_delay;
        let chunks = stream::iter(self.chunks).then(move |chunk| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            chunk
        });
        let body: ByteStream = if self.hold_open {
            Box::pin(chunks.chain(stream::pending()))
        } else {
            Box::pin(chunks)
        };
        match self.drop_flag {
            Some(flag) => {
                let guard = DropFlag(flag);
                Box::pin(body.map(move |chunk| {
                    let _ = &guard;
                    chunk
                }))
            }
            None => body,
        }
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct FakeState {
    status: Option<PipelineSnapshot>,
    status_error: Option<ClientError>,
    progress: VecDeque<Result<PipelineSnapshot, ClientError>>,
    action_error: Option<ClientError>,
    confirm_requests: Vec<(TextbookId, Vec<ChapterId>)>,
    extract_requests: Vec<(TextbookId, Vec<ChapterId>)>,
    streams: VecDeque<Result<ScriptedStream, ClientError>>,
    explain_requests: Vec<ExplainRequest>,
    followup_requests: Vec<FollowupRequest>,
}

/// Fake Backend Client
///
/// 进度队列耗尽后返回当前状态快照
#[derive(Default)]
pub struct FakeBackendClient {
    state: Mutex<FakeState>,
    progress_latency: Mutex<Option<Duration>>,
    progress_calls: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

/// 统计并发中的进度请求，请求被取消时同样释放
struct InFlight {
    counter: Arc<AtomicUsize>,
}

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>, max: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        Self {
            counter: Arc::clone(counter),
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeBackendClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_status(&self, snapshot: PipelineSnapshot) {
        let mut state = self.lock();
        state.status = Some(snapshot);
        state.status_error = None;
    }

    /// 之后的状态读取返回该错误，直到再次 set_status
    pub fn fail_status(&self, err: ClientError) {
        self.lock().status_error = Some(err);
    }

    pub fn push_progress(&self, result: Result<PipelineSnapshot, ClientError>) {
        self.lock().progress.push_back(result);
    }

    pub fn set_progress_latency(&self, latency: Duration) {
        *self
            .progress_latency
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(latency);
    }

    /// confirm / extract-deferred 返回该错误
    pub fn fail_actions(&self, err: ClientError) {
        self.lock().action_error = Some(err);
    }

    pub fn push_stream(&self, stream: Result<ScriptedStream, ClientError>) {
        self.lock().streams.push_back(stream);
    }

    pub fn progress_calls(&self) -> usize {
        self.progress_calls.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_progress_calls(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn confirm_requests(&self) -> Vec<(TextbookId, Vec<ChapterId>)> {
        self.lock().confirm_requests.clone()
    }

    pub fn extract_requests(&self) -> Vec<(TextbookId, Vec<ChapterId>)> {
        self.lock().extract_requests.clone()
    }

    pub fn explain_requests(&self) -> Vec<ExplainRequest> {
        self.lock().explain_requests.clone()
    }

    pub fn followup_requests(&self) -> Vec<FollowupRequest> {
        self.lock().followup_requests.clone()
    }

    fn current_status(&self, textbook_id: &TextbookId) -> Result<PipelineSnapshot, ClientError> {
        let state = self.lock();
        if let Some(err) = &state.status_error {
            return Err(err.clone());
        }
        state
            .status
            .clone()
            .filter(|s| s.textbook_id() == textbook_id)
            .ok_or_else(|| ClientError::server(404, Some("Textbook not found".to_string())))
    }

    /// 接受新的提取任务后，后端状态变为 extracting
    fn accept_action(&self, state: &mut FakeState) -> Result<(), ClientError> {
        if let Some(err) = &state.action_error {
            return Err(err.clone());
        }
        if let Some(snapshot) = state.status.as_mut() {
            snapshot.mark_extracting();
        }
        Ok(())
    }

    fn next_stream(&self) -> Result<ByteStream, ClientError> {
        self.lock()
            .streams
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::transport("no scripted stream")))
            .map(ScriptedStream::into_byte_stream)
    }
}

#[async_trait]
impl PipelineApiPort for FakeBackendClient {
    async fn fetch_status(&self, textbook_id: &TextbookId) -> Result<PipelineSnapshot, ClientError> {
        self.current_status(textbook_id)
    }

    async fn confirm_selection(
        &self,
        textbook_id: &TextbookId,
        selection: &SelectedChapters,
    ) -> Result<ConfirmAck, ClientError> {
        let mut state = self.lock();
        self.accept_action(&mut state)?;
        state
            .confirm_requests
            .push((textbook_id.clone(), selection.ids().to_vec()));
        Ok(ConfirmAck {
            status: PipelineStatus::Extracting.as_str().to_string(),
            selected_count: selection.len(),
        })
    }

    async fn extract_deferred(
        &self,
        textbook_id: &TextbookId,
        chapter_ids: &[ChapterId],
    ) -> Result<ExtractAck, ClientError> {
        let mut state = self.lock();
        self.accept_action(&mut state)?;
        state
            .extract_requests
            .push((textbook_id.clone(), chapter_ids.to_vec()));
        Ok(ExtractAck {
            status: PipelineStatus::Extracting.as_str().to_string(),
        })
    }

    async fn extraction_progress(
        &self,
        textbook_id: &TextbookId,
    ) -> Result<PipelineSnapshot, ClientError> {
        self.progress_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight::enter(&self.in_flight, &self.max_in_flight);

        let latency = *self
            .progress_latency
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let scripted = self.lock().progress.pop_front();
        match scripted {
            Some(result) => result,
            None => self.current_status(textbook_id),
        }
    }
}

#[async_trait]
impl ExplainApiPort for FakeBackendClient {
    async fn open_explanation(&self, request: &ExplainRequest) -> Result<ByteStream, ClientError> {
        self.lock().explain_requests.push(request.clone());
        self.next_stream()
    }

    async fn open_followup(&self, request: &FollowupRequest) -> Result<ByteStream, ClientError> {
        self.lock().followup_requests.push(request.clone());
        self.next_stream()
    }
}

/// 测试用教材快照
///
/// ch-1 已提取，ch-2 / ch-3 暂缓，ch-4 / ch-5 待定；
/// 预选集合为 ch-1、ch-2
pub fn snapshot_fixture(textbook_id: &str, status: PipelineStatus) -> PipelineSnapshot {
    let rows: [(&str, &str, u32, u32, ExtractionStatus, Option<f64>, &[&str]); 5] = [
        ("ch-1", "Discrete-Time Signals", 1, 28, ExtractionStatus::Extracted, Some(0.92), &["sampling", "aliasing"]),
        ("ch-2", "The Z-Transform", 29, 64, ExtractionStatus::Deferred, Some(0.64), &["z-transform"]),
        ("ch-3", "Fourier Analysis", 65, 110, ExtractionStatus::Deferred, Some(0.31), &[]),
        ("ch-4", "Filter Design", 111, 150, ExtractionStatus::Pending, Some(0.45), &["fir"]),
        ("ch-5", "Appendix", 151, 160, ExtractionStatus::Pending, None, &[]),
    ];

    let chapters = rows
        .into_iter()
        .enumerate()
        .filter_map(|(i, (id, title, start, end, status, score, topics))| {
            let pages = PageRange::new(start, end).ok()?;
            let chapter = Chapter::new(ChapterId::from(id), title, i as u32 + 1, pages, status);
            Some(match score {
                Some(score) => {
                    chapter.with_relevance(score, topics.iter().map(|t| t.to_string()).collect())
                }
                None => chapter,
            })
        })
        .collect();

    PipelineSnapshot::new(TextbookId::from(textbook_id), status, chapters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_shape() {
        let snapshot = snapshot_fixture("tb-123", PipelineStatus::AwaitingVerification);
        assert_eq!(snapshot.chapters().len(), 5);
        assert_eq!(snapshot.extracted_count(), 1);
        assert_eq!(
            snapshot.deferred_ids(),
            vec![ChapterId::from("ch-2"), ChapterId::from("ch-3")]
        );
        assert_eq!(
            snapshot.preselected_ids(),
            vec![ChapterId::from("ch-1"), ChapterId::from("ch-2")]
        );
    }

    #[tokio::test]
    async fn test_progress_queue_falls_back_to_status() {
        let fake = FakeBackendClient::new();
        let tb = TextbookId::from("tb-123");
        fake.set_status(snapshot_fixture("tb-123", PipelineStatus::Extracting));
        fake.push_progress(Err(ClientError::transport("reset")));

        assert!(fake.extraction_progress(&tb).await.is_err());
        let snapshot = fake.extraction_progress(&tb).await.unwrap();
        assert_eq!(snapshot.status(), PipelineStatus::Extracting);
        assert_eq!(fake.progress_calls(), 2);
        assert_eq!(fake.max_concurrent_progress_calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_textbook_is_not_found() {
        let fake = FakeBackendClient::new();
        fake.set_status(snapshot_fixture("tb-123", PipelineStatus::Extracting));
        let err = fake.fetch_status(&TextbookId::from("tb-999")).await.unwrap_err();
        assert_eq!(err.to_string(), "Textbook not found");
    }

    #[tokio::test]
    async fn test_missing_script_is_transport_error() {
        let fake = FakeBackendClient::new();
        let err = fake
            .open_followup(&FollowupRequest::new(uuid::Uuid::new_v4(), "more"))
            .await
            .err()
            .unwrap();
        assert!(err.is_transient());
        assert_eq!(fake.followup_requests().len(), 1);
    }
}
