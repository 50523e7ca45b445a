//! 视图接口
//!
//! 客户端逻辑不直接操作界面，而是通过这些 trait 通知嵌入方:
//! 成功的修改操作之后整体刷新，错误在对应控件旁显示，分享链接写入剪贴板。

use crate::error::{ClientError, Result};
use tokio::sync::mpsc;

/// 页面视图
pub trait View: Send + Sync {
    /// 整体刷新当前目录（服务端是唯一数据源）
    fn reload(&self);

    /// 显示错误消息
    fn show_error(&self, message: &str);

    /// 显示普通消息（例如删除返回 200 时服务端附带的说明）
    fn show_message(&self, message: &str);
}

/// 剪贴板
pub trait Clipboard: Send + Sync {
    fn write_text(&self, text: &str) -> Result<()>;
}

/// 视图事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    Reload,
    Error(String),
    Message(String),
    Clipboard(String),
}

/// 基于通道的视图实现，把所有调用转成 [`ViewEvent`]
#[derive(Clone)]
pub struct SimpleView {
    tx: mpsc::Sender<ViewEvent>,
}

impl SimpleView {
    pub fn new() -> (Self, mpsc::Receiver<ViewEvent>) {
        let (tx, rx) = mpsc::channel(32);
        (Self { tx }, rx)
    }
}

impl View for SimpleView {
    fn reload(&self) {
        let _ = self.tx.try_send(ViewEvent::Reload);
    }

    fn show_error(&self, message: &str) {
        let _ = self.tx.try_send(ViewEvent::Error(message.to_string()));
    }

    fn show_message(&self, message: &str) {
        let _ = self.tx.try_send(ViewEvent::Message(message.to_string()));
    }
}

impl Clipboard for SimpleView {
    fn write_text(&self, text: &str) -> Result<()> {
        self.tx
            .try_send(ViewEvent::Clipboard(text.to_string()))
            .map_err(|e| ClientError::Io(format!("clipboard unavailable: {e}")))
    }
}
