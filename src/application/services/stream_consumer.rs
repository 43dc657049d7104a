//! Stream Consumer - AI 讲解流式消费
//!
//! 状态机: Idle → Loading → Streaming → Complete | Error
//!
//! - 同一时间只有一个活动流，新请求会先取消旧流
//! - 每个流有自己的 generation，旧流的迟到写入被丢弃
//! - 取消不会进入 Error 状态

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::application::error::ClientError;
use crate::application::ports::{ByteStream, ExplainApiPort, ExplainRequest, FollowupRequest};
use crate::domain::{FrameDecoder, FrameError, StreamFrame};

/// 流状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Loading,
    Streaming,
    Complete,
    Error,
}

impl StreamState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamState::Idle => "idle",
            StreamState::Loading => "loading",
            StreamState::Streaming => "streaming",
            StreamState::Complete => "complete",
            StreamState::Error => "error",
        }
    }

    /// 请求已发出且尚未结束
    pub fn is_active(&self) -> bool {
        matches!(self, StreamState::Loading | StreamState::Streaming)
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 对外可见的流快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSnapshot {
    /// 产生该快照的请求编号
    pub generation: u64,
    pub state: StreamState,
    /// 已收到的全部文本（按到达顺序拼接）
    pub text: String,
    pub error: Option<String>,
}

impl StreamSnapshot {
    fn idle(generation: u64) -> Self {
        Self {
            generation,
            state: StreamState::Idle,
            text: String::new(),
            error: None,
        }
    }

    fn loading(generation: u64) -> Self {
        Self {
            state: StreamState::Loading,
            ..Self::idle(generation)
        }
    }
}

/// 流来源
#[derive(Debug, Clone)]
enum StreamSource {
    Explanation(ExplainRequest),
    Followup(FollowupRequest),
}

impl StreamSource {
    fn kind(&self) -> &'static str {
        match self {
            StreamSource::Explanation(_) => "explanation",
            StreamSource::Followup(_) => "followup",
        }
    }

    async fn open(&self, api: &dyn ExplainApiPort) -> Result<ByteStream, ClientError> {
        match self {
            StreamSource::Explanation(request) => api.open_explanation(request).await,
            StreamSource::Followup(request) => api.open_followup(request).await,
        }
    }
}

/// 流式讲解消费者
pub struct StreamConsumer {
    api: Arc<dyn ExplainApiPort>,
    state: Arc<watch::Sender<StreamSnapshot>>,
    generation: u64,
    /// 当前活动流；drop 即取消
    active: Option<DropGuard>,
}

impl StreamConsumer {
    pub fn new(api: Arc<dyn ExplainApiPort>) -> Self {
        let (state, _) = watch::channel(StreamSnapshot::idle(0));
        Self {
            api,
            state: Arc::new(state),
            generation: 0,
            active: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<StreamSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> StreamSnapshot {
        self.state.borrow().clone()
    }

    /// 开始讲解；章节或问题为空时回到 Idle，不发起请求
    pub fn explain(&mut self, request: ExplainRequest) {
        if request.is_empty() {
            self.reset();
            return;
        }
        self.start(StreamSource::Explanation(request));
    }

    /// 在已有对话上追问
    pub fn followup(&mut self, request: FollowupRequest) {
        if request.is_empty() {
            self.reset();
            return;
        }
        self.start(StreamSource::Followup(request));
    }

    /// 取消当前流，保留已收到的文本
    ///
    /// 取消在 watch 写锁内完成，返回后该流不会再写入任何状态。
    pub fn cancel(&mut self) {
        if let Some(guard) = self.active.take() {
            self.state.send_if_modified(|_| {
                drop(guard);
                false
            });
            tracing::debug!(generation = self.generation, "Stream cancelled");
        }
    }

    /// 等待当前流结束或被取消，返回最终快照
    pub async fn finished(&self) -> StreamSnapshot {
        let mut rx = self.state.subscribe();
        loop {
            let snapshot = rx.borrow_and_update().clone();
            if !snapshot.state.is_active() || self.active.is_none() {
                return snapshot;
            }
            if rx.changed().await.is_err() {
                return self.snapshot();
            }
        }
    }

    fn reset(&mut self) {
        self.cancel();
        self.generation += 1;
        self.state.send_replace(StreamSnapshot::idle(self.generation));
    }

    fn start(&mut self, source: StreamSource) {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        self.state.send_replace(StreamSnapshot::loading(generation));

        tracing::info!(generation, kind = source.kind(), "Opening explanation stream");

        let cancel = CancellationToken::new();
        let writer = StreamWriter {
            state: Arc::clone(&self.state),
            generation,
            cancel: cancel.clone(),
        };
        tokio::spawn(read_stream(Arc::clone(&self.api), source, writer));
        self.active = Some(cancel.drop_guard());
    }
}

/// 单个流的状态写入端
///
/// 流被取消或被新请求取代后，所有写入都被丢弃。
struct StreamWriter {
    state: Arc<watch::Sender<StreamSnapshot>>,
    generation: u64,
    cancel: CancellationToken,
}

impl StreamWriter {
    fn publish(&self, update: impl FnOnce(&mut StreamSnapshot) -> bool) -> bool {
        self.state.send_if_modified(|snapshot| {
            !self.cancel.is_cancelled() && snapshot.generation == self.generation && update(snapshot)
        })
    }

    fn fail(&self, err: &ClientError) {
        let published = self.publish(|snapshot| {
            snapshot.state = StreamState::Error;
            snapshot.error = Some(err.to_string());
            true
        });
        if published {
            tracing::warn!(generation = self.generation, error = %err, "Explanation stream failed");
        } else {
            tracing::debug!(generation = self.generation, error = %err, "Stale stream error discarded");
        }
    }

    /// 应用一帧，返回是否继续读取
    fn apply_frame(&self, frame: Result<StreamFrame, FrameError>) -> bool {
        match frame {
            Ok(StreamFrame::Delta(text)) => {
                self.publish(|snapshot| {
                    snapshot.state = StreamState::Streaming;
                    snapshot.text.push_str(&text);
                    true
                });
                true
            }
            Ok(StreamFrame::Done) => {
                if self.publish(|snapshot| {
                    snapshot.state = StreamState::Complete;
                    true
                }) {
                    tracing::info!(generation = self.generation, "Explanation stream complete");
                }
                false
            }
            Err(e) => {
                self.fail(&ClientError::from(e));
                false
            }
        }
    }
}

async fn read_stream(api: Arc<dyn ExplainApiPort>, source: StreamSource, writer: StreamWriter) {
    let cancel = writer.cancel.clone();
    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        opened = source.open(api.as_ref()) => opened,
    };

    let mut body = match opened {
        Ok(body) => body,
        Err(e) => {
            writer.fail(&e);
            return;
        }
    };

    let mut decoder = FrameDecoder::new();
    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            chunk = body.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                if bytes.is_empty() {
                    continue;
                }
                decoder.feed(&bytes);
                writer.publish(|snapshot| {
                    if snapshot.state == StreamState::Loading {
                        snapshot.state = StreamState::Streaming;
                        true
                    } else {
                        false
                    }
                });
                while let Some(frame) = decoder.next_frame() {
                    if !writer.apply_frame(frame) {
                        return;
                    }
                }
            }
            Some(Err(e)) => {
                writer.fail(&e);
                return;
            }
            None => {
                tracing::debug!(
                    generation = writer.generation,
                    pending_bytes = decoder.pending_bytes(),
                    "Response body ended"
                );
                if let Some(frame) = decoder.finish() {
                    if !writer.apply_frame(frame) {
                        return;
                    }
                }
                writer.fail(&ClientError::protocol("stream ended without completion marker"));
                return;
            }
        }
    }
}
