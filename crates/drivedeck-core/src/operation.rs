//! 可取消的异步操作
//!
//! 每个网络操作在独立的 tokio 任务中运行，并与一个 [`CancellationToken`] 竞争。
//! 取消时请求 future 被丢弃，底层 HTTP 请求随之中止。
//! 结果通过 watch 通道发布，调用方可以随时查询三态结果或等待其完成。

use crate::error::{ClientError, Result};
use std::future::Future;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// 操作的三态结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationState<T> {
    Pending,
    Succeeded(T),
    Failed(ClientError),
}

impl<T> OperationState<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, OperationState::Pending)
    }

    /// 是否因用户取消而结束
    pub fn is_cancelled(&self) -> bool {
        matches!(self, OperationState::Failed(ClientError::Cancelled))
    }

    pub fn into_result(self) -> Option<Result<T>> {
        match self {
            OperationState::Pending => None,
            OperationState::Succeeded(v) => Some(Ok(v)),
            OperationState::Failed(e) => Some(Err(e)),
        }
    }
}

impl<T> From<Result<T>> for OperationState<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(v) => OperationState::Succeeded(v),
            Err(e) => OperationState::Failed(e),
        }
    }
}

/// 正在进行的异步操作句柄
pub struct Operation<T> {
    token: CancellationToken,
    state: watch::Receiver<OperationState<T>>,
}

impl<T> Operation<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// 启动操作
    ///
    /// `token` 被取消时 future 会被丢弃，结果为 `Failed(ClientError::Cancelled)`。
    pub fn spawn<F>(token: CancellationToken, fut: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let (tx, rx) = watch::channel(OperationState::Pending);
        let task_token = token.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                () = task_token.cancelled() => Err(ClientError::Cancelled),
                r = fut => r,
            };
            let _ = tx.send(OperationState::from(result));
        });

        Self { token, state: rx }
    }

    /// 当前状态（不阻塞）
    pub fn state(&self) -> OperationState<T> {
        self.state.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        !self.state.borrow().is_pending()
    }

    /// 取消操作
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// 等待操作结束，返回值不会是 `Pending`
    pub async fn wait(mut self) -> OperationState<T> {
        match self.state.wait_for(|s| !s.is_pending()).await {
            Ok(state) => state.clone(),
            Err(_) => OperationState::Failed(ClientError::Transport(
                "operation task ended without a result".to_string(),
            )),
        }
    }
}
