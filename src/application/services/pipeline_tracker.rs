//! Pipeline Tracker - 教材提取流水线状态跟踪
//!
//! 一个 tracker 只对应一本教材，独占该教材的章节列表与流水线状态：
//! - 后端快照整体替换本地状态，不做局部合并
//! - 只有状态为 `extracting` 时才按固定间隔轮询
//! - 轮询失败静默忽略，等待下一次 tick
//! - tracker 被 drop 时轮询任务随之取消

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::application::error::ClientError;
use crate::application::ports::{ConfirmAck, ExtractAck, PipelineApiPort};
use crate::domain::pipeline::{
    Chapter, ChapterId, ChapterSelection, PipelineSnapshot, PipelineStatus, TextbookId,
};

/// 默认轮询间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Tracker 配置
#[derive(Debug, Clone)]
pub struct PipelineTrackerConfig {
    /// 轮询间隔
    pub poll_interval: Duration,
}

impl Default for PipelineTrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// 正在运行的轮询任务
struct Poller {
    id: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct PollerSlot {
    current: Option<Poller>,
    next_id: u64,
}

/// tracker 与轮询任务共享的状态
///
/// 快照写入与轮询启停决策都在 `poller` 锁内完成。
struct Shared {
    textbook_id: TextbookId,
    api: Arc<dyn PipelineApiPort>,
    poll_interval: Duration,
    /// 最近一次权威快照；首次读取前为 None
    state: watch::Sender<Option<PipelineSnapshot>>,
    poller: Mutex<PollerSlot>,
    lifetime: CancellationToken,
}

impl Shared {
    fn lock_poller(&self) -> MutexGuard<'_, PollerSlot> {
        self.poller.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(self: &Arc<Self>, snapshot: PipelineSnapshot) {
        let new_status = snapshot.status();
        let previous = {
            let mut slot = self.lock_poller();
            let previous = self.state.send_replace(Some(snapshot));
            self.sync_polling(&mut slot);
            previous
        };
        if let Some(old_status) = previous.map(|s| s.status()).filter(|s| *s != new_status) {
            tracing::debug!(
                textbook_id = %self.textbook_id,
                old_status = %old_status,
                new_status = %new_status,
                "Pipeline status changed"
            );
        }
    }

    fn mark_extracting(self: &Arc<Self>) {
        let mut slot = self.lock_poller();
        self.state.send_modify(|state| {
            if let Some(snapshot) = state.as_mut() {
                snapshot.mark_extracting();
            }
        });
        self.sync_polling(&mut slot);
    }

    /// 按当前状态启动或停止轮询；调用方持有 `poller` 锁
    fn sync_polling(self: &Arc<Self>, slot: &mut PollerSlot) {
        let active = self
            .state
            .borrow()
            .as_ref()
            .map_or(false, |s| s.status().is_active());
        let running = slot
            .current
            .as_ref()
            .map_or(false, |p| !p.cancel.is_cancelled());

        if active && !running {
            slot.next_id += 1;
            let id = slot.next_id;
            let cancel = self.lifetime.child_token();
            tokio::spawn(poll_loop(Arc::clone(self), id, cancel.clone()));
            slot.current = Some(Poller { id, cancel });
        } else if !active {
            if let Some(poller) = slot.current.take() {
                poller.cancel.cancel();
            }
        }
    }

    /// 写入一次轮询结果
    ///
    /// 任务已被取消时丢弃结果并返回 None。流水线离开 extracting 时，
    /// 在同一把锁内把该任务从 slot 中移除，之后的 `sync_polling` 会启动新任务。
    fn record_poll(
        &self,
        id: u64,
        cancel: &CancellationToken,
        snapshot: PipelineSnapshot,
    ) -> Option<PipelineStatus> {
        let mut slot = self.lock_poller();
        if cancel.is_cancelled() {
            return None;
        }
        let status = snapshot.status();
        self.state.send_replace(Some(snapshot));
        if !status.is_active() && slot.current.as_ref().map_or(false, |p| p.id == id) {
            slot.current = None;
        }
        Some(status)
    }
}

/// 流水线状态跟踪器
pub struct PipelineTracker {
    shared: Arc<Shared>,
    _lifetime_guard: DropGuard,
}

impl PipelineTracker {
    pub fn new(
        textbook_id: TextbookId,
        api: Arc<dyn PipelineApiPort>,
        config: PipelineTrackerConfig,
    ) -> Self {
        let (state, _) = watch::channel(None);
        let lifetime = CancellationToken::new();
        Self {
            _lifetime_guard: lifetime.clone().drop_guard(),
            shared: Arc::new(Shared {
                textbook_id,
                api,
                poll_interval: config.poll_interval,
                state,
                poller: Mutex::new(PollerSlot::default()),
                lifetime,
            }),
        }
    }

    pub fn textbook_id(&self) -> &TextbookId {
        &self.shared.textbook_id
    }

    /// 订阅快照变化（显示层只读）
    pub fn subscribe(&self) -> watch::Receiver<Option<PipelineSnapshot>> {
        self.shared.state.subscribe()
    }

    pub fn snapshot(&self) -> Option<PipelineSnapshot> {
        self.shared.state.borrow().clone()
    }

    pub fn status(&self) -> Option<PipelineStatus> {
        self.shared.state.borrow().as_ref().map(|s| s.status())
    }

    /// 等待提取的章节，每次从权威列表重新计算
    pub fn awaiting_extraction(&self) -> Vec<Chapter> {
        self.shared
            .state
            .borrow()
            .as_ref()
            .map(|s| s.awaiting_extraction().into_iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn extracted_count(&self) -> usize {
        self.shared
            .state
            .borrow()
            .as_ref()
            .map_or(0, |s| s.extracted_count())
    }

    pub fn is_polling(&self) -> bool {
        self.shared
            .lock_poller()
            .current
            .as_ref()
            .map_or(false, |p| !p.cancel.is_cancelled())
    }

    /// 读取流水线状态；失败时保留上一次的快照
    pub async fn fetch_status(&self) -> Result<PipelineSnapshot, ClientError> {
        let textbook_id = &self.shared.textbook_id;
        let snapshot = self
            .shared
            .api
            .fetch_status(textbook_id)
            .await
            .map_err(|e| {
                tracing::warn!(
                    textbook_id = %textbook_id,
                    transient = e.is_transient(),
                    error = %e,
                    "Status fetch failed"
                );
                e
            })?;
        self.shared.apply(snapshot.clone());
        Ok(snapshot)
    }

    /// 提交用户确认的章节；成功后开始轮询
    pub async fn confirm_selection(
        &self,
        selection: &ChapterSelection,
    ) -> Result<ConfirmAck, ClientError> {
        let selected = {
            let state = self.shared.state.borrow();
            let snapshot = state
                .as_ref()
                .ok_or_else(|| ClientError::validation("pipeline status has not been loaded"))?;
            selection.confirm(snapshot)?
        };

        let ack = self
            .shared
            .api
            .confirm_selection(&self.shared.textbook_id, &selected)
            .await?;

        tracing::info!(
            textbook_id = %self.shared.textbook_id,
            requested = selected.len(),
            selected_count = ack.selected_count,
            status = %ack.status,
            "Chapter selection confirmed"
        );
        self.shared.mark_extracting();
        Ok(ack)
    }

    /// 请求提取暂缓章节；成功后状态标记为 extracting 并开始轮询
    pub async fn extract_deferred(&self, chapter_ids: &[ChapterId]) -> Result<ExtractAck, ClientError> {
        let targets = {
            let state = self.shared.state.borrow();
            let snapshot = state
                .as_ref()
                .ok_or_else(|| ClientError::validation("pipeline status has not been loaded"))?;
            snapshot.validate_extraction_targets(chapter_ids)?
        };

        let ack = self
            .shared
            .api
            .extract_deferred(&self.shared.textbook_id, &targets)
            .await?;

        tracing::info!(
            textbook_id = %self.shared.textbook_id,
            count = targets.len(),
            status = %ack.status,
            "Deferred extraction requested"
        );
        self.shared.mark_extracting();
        Ok(ack)
    }

    /// 提取全部 deferred 章节
    pub async fn extract_all_deferred(&self) -> Result<ExtractAck, ClientError> {
        let ids = self
            .shared
            .state
            .borrow()
            .as_ref()
            .map(|s| s.deferred_ids())
            .unwrap_or_default();
        self.extract_deferred(&ids).await
    }

    /// 等待流水线离开 extracting；依赖轮询推进
    pub async fn settled(&self) -> Option<PipelineSnapshot> {
        let mut rx = self.shared.state.subscribe();
        loop {
            let current = rx.borrow_and_update().clone();
            match current {
                Some(snapshot) if !snapshot.status().is_active() => return Some(snapshot),
                None => return None,
                Some(_) => {}
            }
            if rx.changed().await.is_err() {
                return self.snapshot();
            }
        }
    }
}

/// 轮询循环
///
/// 每次 tick 等待上一次请求完成后才会继续，错过的 tick 直接跳过，
/// 因此不会出现并发的轮询请求。
async fn poll_loop(shared: Arc<Shared>, id: u64, cancel: CancellationToken) {
    let textbook_id = shared.textbook_id.clone();
    let interval = shared.poll_interval;
    tracing::info!(
        textbook_id = %textbook_id,
        interval_ms = interval.as_millis() as u64,
        "Extraction polling started"
    );

    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = shared.api.extraction_progress(&textbook_id) => result,
        };

        match result {
            Ok(snapshot) => match shared.record_poll(id, &cancel, snapshot) {
                None => break,
                Some(status) if !status.is_active() => {
                    tracing::debug!(textbook_id = %textbook_id, status = %status, "Pipeline settled");
                    break;
                }
                Some(_) => {}
            },
            Err(e) => {
                tracing::debug!(
                    textbook_id = %textbook_id,
                    error = %e,
                    "Progress poll failed, retrying on next tick"
                );
            }
        }
    }

    tracing::info!(textbook_id = %textbook_id, "Extraction polling stopped");
}
