//! 对话框状态机
//!
//! 上传/编辑/移动/分享对话框共用的状态流转:
//!
//! ```text
//! Closed → Open → Submitting → Closed        (成功，随后刷新页面)
//!                            → Failed(msg)   (打开状态并显示错误)
//! ```
//!
//! 关闭对话框时先取消所有在途请求，再丢弃本地状态，
//! 因此关闭之后不会再有完成回调作用到对话框上。

use crate::error::{ClientError, Result};
use crate::operation::OperationState;
use log::debug;
use tokio_util::sync::CancellationToken;

/// 对话框类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogKind {
    Upload,
    Edit,
    Move,
    Share,
}

/// 对话框状态
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DialogState {
    #[default]
    Closed,
    Open,
    Submitting,
    /// 打开状态，附带错误消息
    Failed(String),
}

/// 一次提交的凭据
///
/// `finish` 只接受当前提交的凭据，旧提交的结果会被忽略。
#[derive(Debug, Clone)]
pub struct Submission {
    pub token: CancellationToken,
    id: u64,
}

impl Submission {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// 对话框实例
#[derive(Debug)]
pub struct Dialog {
    kind: DialogKind,
    state: DialogState,
    inflight: Vec<CancellationToken>,
    submissions: u64,
}

impl Dialog {
    pub fn new(kind: DialogKind) -> Self {
        Self {
            kind,
            state: DialogState::Closed,
            inflight: Vec::new(),
            submissions: 0,
        }
    }

    pub fn kind(&self) -> DialogKind {
        self.kind
    }

    pub fn state(&self) -> &DialogState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.state, DialogState::Closed)
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.state, DialogState::Submitting)
    }

    /// 当前显示的错误消息
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            DialogState::Failed(msg) => Some(msg.as_str()),
            _ => None,
        }
    }

    pub fn inflight_count(&self) -> usize {
        self.inflight.len()
    }

    /// 打开对话框（清除之前的错误）
    pub fn open(&mut self) {
        if self.is_submitting() {
            return;
        }
        debug!("Opening {:?} dialog", self.kind);
        self.state = DialogState::Open;
    }

    /// 开始提交，返回本次提交的取消令牌
    pub fn begin_submit(&mut self) -> Result<Submission> {
        match self.state {
            DialogState::Open | DialogState::Failed(_) => {}
            DialogState::Closed => {
                return Err(ClientError::InvalidInput(format!(
                    "{:?} dialog is not open",
                    self.kind
                )));
            }
            DialogState::Submitting => {
                return Err(ClientError::InvalidInput(format!(
                    "{:?} dialog is already submitting",
                    self.kind
                )));
            }
        }
        self.submissions += 1;
        let token = CancellationToken::new();
        self.inflight.push(token.clone());
        self.state = DialogState::Submitting;
        Ok(Submission {
            token,
            id: self.submissions,
        })
    }

    /// 应用提交结果
    ///
    /// 成功时关闭对话框；失败时保持打开并显示错误；取消则静默关闭。
    /// 对话框已关闭或凭据过期时忽略，返回 `false`。
    pub fn finish<T>(&mut self, submission: &Submission, outcome: &OperationState<T>) -> bool {
        if !self.is_submitting() || submission.id != self.submissions {
            debug!(
                "Ignoring stale result for {:?} dialog (submission {})",
                self.kind, submission.id
            );
            return false;
        }
        match outcome {
            OperationState::Pending => return false,
            OperationState::Succeeded(_) => {
                self.inflight.clear();
                self.state = DialogState::Closed;
            }
            OperationState::Failed(ClientError::Cancelled) => {
                self.inflight.clear();
                self.state = DialogState::Closed;
            }
            OperationState::Failed(e) => {
                self.inflight.clear();
                self.state = DialogState::Failed(e.user_message());
            }
        }
        true
    }

    /// 关闭对话框，先中止所有在途请求
    pub fn close(&mut self) {
        if !self.inflight.is_empty() {
            debug!(
                "Closing {:?} dialog, aborting {} request(s)",
                self.kind,
                self.inflight.len()
            );
        }
        for token in self.inflight.drain(..) {
            token.cancel();
        }
        self.state = DialogState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut dialog = Dialog::new(DialogKind::Move);
        assert_eq!(dialog.state(), &DialogState::Closed);

        dialog.open();
        let submission = dialog.begin_submit().unwrap();
        assert!(dialog.is_submitting());
        assert_eq!(dialog.inflight_count(), 1);

        assert!(dialog.finish(&submission, &OperationState::Succeeded(())));
        assert_eq!(dialog.state(), &DialogState::Closed);
        assert_eq!(dialog.inflight_count(), 0);
    }

    #[test]
    fn test_error_keeps_dialog_open() {
        let mut dialog = Dialog::new(DialogKind::Edit);
        dialog.open();
        let submission = dialog.begin_submit().unwrap();
        let failed: OperationState<()> = OperationState::Failed(ClientError::Http {
            status: 403,
            message: "permission denied".into(),
        });
        assert!(dialog.finish(&submission, &failed));
        assert_eq!(dialog.error(), Some("permission denied"));
        assert!(dialog.is_open());

        // 失败后可以再次提交
        let retry = dialog.begin_submit().unwrap();
        assert_eq!(retry.id(), 2);
        assert!(dialog.error().is_none());
    }

    #[test]
    fn test_close_cancels_inflight_and_ignores_late_result() {
        let mut dialog = Dialog::new(DialogKind::Upload);
        dialog.open();
        let submission = dialog.begin_submit().unwrap();
        let token = submission.token.clone();

        dialog.close();
        assert!(token.is_cancelled());
        assert_eq!(dialog.state(), &DialogState::Closed);

        assert!(!dialog.finish(&submission, &OperationState::Succeeded(())));
        assert_eq!(dialog.state(), &DialogState::Closed);
    }

    #[test]
    fn test_stale_submission_ignored() {
        let mut dialog = Dialog::new(DialogKind::Share);
        dialog.open();
        let first = dialog.begin_submit().unwrap();
        dialog.close();
        dialog.open();
        let second = dialog.begin_submit().unwrap();

        assert!(!dialog.finish(&first, &OperationState::Succeeded(())));
        assert!(dialog.is_submitting());
        assert!(dialog.finish(&second, &OperationState::Succeeded(())));
    }

    #[test]
    fn test_invalid_transitions() {
        let mut dialog = Dialog::new(DialogKind::Move);
        assert!(dialog.begin_submit().is_err());
        dialog.open();
        let _submission = dialog.begin_submit().unwrap();
        assert!(dialog.begin_submit().is_err());
        // 提交中无法重新打开
        dialog.open();
        assert!(dialog.is_submitting());
    }
}
