//! SSE 帧解码器
//!
//! 传输层可以任意切分字节，解码器只在完整记录（以 `\n\n` 结尾）上工作：
//! - 尾部不完整的记录保留到下一个 chunk，不丢弃也不重复处理
//! - 记录按字节切分，UTF-8 多字节字符被切开也没关系
//! - 负载恰好等于 `[DONE]` 时流结束，之后的字节全部忽略
//! - 其它 `data:` 负载原样作为文本增量（不 trim）
//! - 记录中的 `event:` / `id:` 等字段忽略，多个 `data:` 行以换行连接

use thiserror::Error;

/// 流结束标记
pub const DONE_SENTINEL: &str = "[DONE]";

const RECORD_DELIMITER: &[u8] = b"\n\n";
const DATA_FIELD: &str = "data:";

/// 解码错误
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Invalid UTF-8 in stream record: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// 传输帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// 追加到结果末尾的文本片段
    Delta(String),
    /// 结束标记
    Done,
}

/// 拉取式帧解码器
///
/// 用法: `feed` 写入一个 chunk，然后反复调用 `next_frame` 直到返回 `None`；
/// 传输结束时调用一次 `finish` 处理残留记录。
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// 已确认不含分隔符的前缀长度
    scanned: usize,
    done: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 是否已收到结束标记
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// 尚未组成完整记录的字节数
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        if self.done {
            return;
        }
        self.buffer.extend_from_slice(chunk);
    }

    /// 取出下一个完整帧；缓冲区中没有完整记录时返回 `None`
    pub fn next_frame(&mut self) -> Option<Result<StreamFrame, FrameError>> {
        while !self.done {
            let start = self.scanned.saturating_sub(RECORD_DELIMITER.len() - 1);
            let Some(offset) = find_delimiter(&self.buffer[start..]) else {
                self.scanned = self.buffer.len();
                return None;
            };
            let end = start + offset;
            let record: Vec<u8> = self.buffer.drain(..end + RECORD_DELIMITER.len()).collect();
            self.scanned = 0;

            match decode_record(&record[..end]) {
                Ok(Some(frame)) => return Some(Ok(self.observe(frame))),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }

    /// 传输结束：把残留字节当作最后一条记录处理
    pub fn finish(&mut self) -> Option<Result<StreamFrame, FrameError>> {
        if self.done || self.buffer.is_empty() {
            return None;
        }
        let mut record = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        while record.last() == Some(&b'\n') {
            record.pop();
        }

        match decode_record(&record) {
            Ok(Some(frame)) => Some(Ok(self.observe(frame))),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }

    fn observe(&mut self, frame: StreamFrame) -> StreamFrame {
        if frame == StreamFrame::Done {
            self.done = true;
            self.buffer.clear();
            self.scanned = 0;
        }
        frame
    }
}

fn find_delimiter(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(RECORD_DELIMITER.len())
        .position(|w| w == RECORD_DELIMITER)
}

/// 解析单条记录
///
/// 记录内逐行查找 `data:` 字段，其它字段（`event:`、`id:`、`retry:`）与注释行忽略；
/// 多个 `data:` 行按 `\n` 连接。没有 `data:` 行的记录返回 `None`。
fn decode_record(record: &[u8]) -> Result<Option<StreamFrame>, FrameError> {
    let text = std::str::from_utf8(record)?;
    let mut payload: Option<String> = None;
    for line in text.split('\n') {
        let Some(data) = line.strip_prefix(DATA_FIELD) else {
            continue;
        };
        let data = data.strip_prefix(' ').unwrap_or(data);
        match payload.as_mut() {
            Some(payload) => {
                payload.push('\n');
                payload.push_str(data);
            }
            None => payload = Some(data.to_string()),
        }
    }

    Ok(payload.map(|payload| {
        if payload == DONE_SENTINEL {
            StreamFrame::Done
        } else {
            StreamFrame::Delta(payload)
        }
    }))
}
