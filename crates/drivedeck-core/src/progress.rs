//! 上传进度
//!
//! - [`UploadCallback`]: 每个上传任务的进度/完成/失败通知
//! - [`with_progress`]: 包装请求体流，统计已发送字节数

use crate::error::ClientError;
use futures_util::{Stream, StreamExt};
use std::collections::HashMap;
use std::io;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// 上传事件回调
///
/// `index` 是任务在上传对话框中的序号。
pub trait UploadCallback: Send + Sync {
    /// 进度更新（仅在总大小已知时触发），`fraction` 在 [0, 1] 之间
    fn on_progress(&self, index: usize, fraction: f64);

    /// 单个任务上传成功
    fn on_complete(&self, index: usize);

    /// 单个任务上传失败（取消不会触发）
    fn on_error(&self, index: usize, error: &ClientError);
}

/// 不关心上传事件时使用
pub struct NoopUploadCallback;

impl UploadCallback for NoopUploadCallback {
    fn on_progress(&self, _index: usize, _fraction: f64) {}
    fn on_complete(&self, _index: usize) {}
    fn on_error(&self, _index: usize, _error: &ClientError) {}
}

/// 简化的上传回调实现
///
/// 进度事件按整数百分比去重，完成和失败事件总会送达。
pub struct SimpleUploadCallback {
    tx: mpsc::UnboundedSender<UploadEvent>,
    last_percent: Mutex<HashMap<usize, u32>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    Progress { index: usize, fraction: f64 },
    Complete { index: usize },
    Error { index: usize, message: String },
}

impl SimpleUploadCallback {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UploadEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback = Self {
            tx,
            last_percent: Mutex::new(HashMap::new()),
        };
        (callback, rx)
    }
}

impl UploadCallback for SimpleUploadCallback {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn on_progress(&self, index: usize, fraction: f64) {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0).floor() as u32;
        if let Ok(mut last) = self.last_percent.lock() {
            if last.get(&index) == Some(&percent) {
                return;
            }
            last.insert(index, percent);
        }
        let _ = self.tx.send(UploadEvent::Progress { index, fraction });
    }

    fn on_complete(&self, index: usize) {
        let _ = self.tx.send(UploadEvent::Complete { index });
    }

    fn on_error(&self, index: usize, error: &ClientError) {
        let _ = self.tx.send(UploadEvent::Error {
            index,
            message: error.user_message(),
        });
    }
}

/// 计算进度比例，总大小未知（为 0）时返回 `None`
#[allow(clippy::cast_precision_loss)]
pub fn fraction(sent: u64, total: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some((sent as f64 / total as f64).min(1.0))
}

/// 包装字节流，每发送一个块就报告一次进度
pub fn with_progress<S, B, F>(
    inner: S,
    total: u64,
    mut on_progress: F,
) -> impl Stream<Item = io::Result<B>>
where
    S: Stream<Item = io::Result<B>>,
    B: AsRef<[u8]>,
    F: FnMut(f64),
{
    let mut sent: u64 = 0;
    inner.map(move |chunk| {
        if let Ok(bytes) = &chunk {
            sent += bytes.as_ref().len() as u64;
            if let Some(f) = fraction(sent, total) {
                on_progress(f);
            }
        }
        chunk
    })
}
