//! 文件管理组件
//!
//! [`FileManager`] 是一个目录视图的状态对象: 持有客户端、当前目录、多选状态、
//! 各对话框以及视图句柄。所有流程都在这里串联:
//!
//! - 提交类方法 (`submit_*`, `delete_*`) 启动后台请求并返回 [`Pending`] 句柄
//! - 调用方等待句柄得到 [`Settled`]，再交给对应的 `finish_*` 更新对话框
//! - `close_*` 在等待期间随时可以调用，会先中止请求再清理本地状态
//!
//! 成功的修改操作之后由请求任务调用 `View::reload()`，不做增量更新。

use crate::client::{DeleteOutcome, DriveClient, ShareRequest};
use crate::dialog::{Dialog, DialogKind, DialogState, Submission};
use crate::edit::{EditRequest, edit_file};
use crate::error::{ClientError, Result};
use crate::model::{FileEntry, Permissions};
use crate::multipart::UploadSource;
use crate::operation::{Operation, OperationState};
use crate::progress::{NoopUploadCallback, UploadCallback};
use crate::selection::SelectionTracker;
use crate::upload::{BatchReport, UploadJob, upload_batch};
use crate::view::{Clipboard, View};
use log::{debug, info};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// 已提交、尚未结束的操作
pub struct Pending<T> {
    submission: Option<Submission>,
    operation: Operation<T>,
}

impl<T> Pending<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn state(&self) -> OperationState<T> {
        self.operation.state()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.operation.cancellation_token()
    }

    pub async fn wait(self) -> Settled<T> {
        Settled {
            submission: self.submission,
            state: self.operation.wait().await,
        }
    }
}

/// 已结束的操作
#[derive(Debug, Clone)]
pub struct Settled<T> {
    submission: Option<Submission>,
    pub state: OperationState<T>,
}

/// 一个目录视图
pub struct FileManager {
    client: DriveClient,
    dir: String,
    entries: Vec<FileEntry>,
    selection: SelectionTracker,
    view: Arc<dyn View>,
    clipboard: Arc<dyn Clipboard>,
    upload_callback: Arc<dyn UploadCallback>,

    upload_dialog: Dialog,
    upload_jobs: Vec<UploadJob>,

    edit_dialog: Dialog,
    edit_request: Option<EditRequest>,

    move_dialog: Dialog,
    move_destination: String,
    move_names: Vec<String>,

    share_dialog: Dialog,
    share_path: String,
    share_permissions: Permissions,
    share_link: Option<Url>,
}

impl FileManager {
    pub fn new(
        client: DriveClient,
        dir: impl Into<String>,
        view: Arc<dyn View>,
        clipboard: Arc<dyn Clipboard>,
    ) -> Self {
        Self {
            client,
            dir: dir.into(),
            entries: Vec::new(),
            selection: SelectionTracker::default(),
            view,
            clipboard,
            upload_callback: Arc::new(NoopUploadCallback),
            upload_dialog: Dialog::new(DialogKind::Upload),
            upload_jobs: Vec::new(),
            edit_dialog: Dialog::new(DialogKind::Edit),
            edit_request: None,
            move_dialog: Dialog::new(DialogKind::Move),
            move_destination: String::new(),
            move_names: Vec::new(),
            share_dialog: Dialog::new(DialogKind::Share),
            share_path: String::new(),
            share_permissions: Permissions::READ,
            share_link: None,
        }
    }

    /// 设置上传事件回调（每个文件的进度和错误）
    #[must_use]
    pub fn with_upload_callback(mut self, callback: Arc<dyn UploadCallback>) -> Self {
        self.upload_callback = callback;
        self
    }

    pub fn client(&self) -> &DriveClient {
        &self.client
    }

    pub fn current_dir(&self) -> &str {
        &self.dir
    }

    /// 切换到新的目录列表，关闭所有对话框并重置选择
    pub fn set_listing(&mut self, dir: impl Into<String>, entries: Vec<FileEntry>) {
        self.close_all();
        self.dir = dir.into();
        self.selection.set_rows(entries.iter().map(|e| e.name.clone()));
        self.entries = entries;
        debug!("Listing {} ({} entries)", self.dir, self.entries.len());
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&FileEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn selection(&self) -> &SelectionTracker {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionTracker {
        &mut self.selection
    }

    /// 关闭所有对话框
    pub fn close_all(&mut self) {
        self.close_upload();
        self.close_edit();
        self.close_move();
        self.close_share();
    }

    fn spawn<T, F>(submission: Option<Submission>, fut: F) -> Pending<T>
    where
        T: Clone + Send + Sync + 'static,
        F: std::future::Future<Output = Result<T>> + Send + 'static,
    {
        let token = submission
            .as_ref()
            .map_or_else(CancellationToken::new, |s| s.token.clone());
        Pending {
            submission,
            operation: Operation::spawn(token, fut),
        }
    }

    // ---- 上传 ----

    pub fn upload_dialog(&self) -> &Dialog {
        &self.upload_dialog
    }

    /// 选择（或拖放）文件后打开上传对话框
    pub fn open_upload(&mut self, sources: Vec<UploadSource>) -> Result<()> {
        if sources.is_empty() {
            return Err(ClientError::InvalidInput("no files selected".to_string()));
        }
        if self.upload_dialog.is_submitting() {
            return Err(ClientError::InvalidInput(
                "an upload is already in progress".to_string(),
            ));
        }
        self.upload_jobs = sources.into_iter().map(UploadJob::new).collect();
        self.upload_dialog.open();
        Ok(())
    }

    pub fn upload_jobs(&self) -> &[UploadJob] {
        &self.upload_jobs
    }

    pub fn upload_job_mut(&mut self, index: usize) -> Option<&mut UploadJob> {
        if self.upload_dialog.is_submitting() {
            return None;
        }
        self.upload_jobs.get_mut(index)
    }

    /// 提交前移除一个文件
    pub fn remove_upload_job(&mut self, index: usize) -> Option<UploadJob> {
        if self.upload_dialog.is_submitting() || index >= self.upload_jobs.len() {
            return None;
        }
        Some(self.upload_jobs.remove(index))
    }

    /// 上传对话框中的所有文件
    pub fn submit_upload(&mut self) -> Result<Pending<BatchReport>> {
        if self.upload_jobs.is_empty() {
            return Err(ClientError::InvalidInput("no files to upload".to_string()));
        }
        let submission = self.upload_dialog.begin_submit()?;
        let fut = upload_batch(
            self.client.clone(),
            self.dir.clone(),
            self.upload_jobs.clone(),
            Arc::clone(&self.upload_callback),
            Arc::clone(&self.view),
        );
        Ok(Self::spawn(Some(submission), fut))
    }

    /// 应用上传结果
    ///
    /// 全部成功时关闭对话框；有文件失败时保持打开，只留下失败的文件，
    /// 错误显示在对应文件上，再次提交时不会重复上传已成功的文件。
    pub fn finish_upload(&mut self, settled: Settled<BatchReport>) -> OperationState<BatchReport> {
        let Some(submission) = &settled.submission else {
            return settled.state;
        };
        let dialog_state = match &settled.state {
            OperationState::Succeeded(report) if report.failed > 0 => {
                OperationState::Failed(ClientError::PartialUpload {
                    failed: report.failed,
                    total: report.total(),
                })
            }
            OperationState::Succeeded(_) => OperationState::Succeeded(()),
            OperationState::Failed(e) => OperationState::Failed(e.clone()),
            OperationState::Pending => OperationState::Pending,
        };
        if !self.upload_dialog.finish(submission, &dialog_state) {
            return settled.state;
        }
        if *self.upload_dialog.state() == DialogState::Closed {
            self.upload_jobs.clear();
        } else if matches!(&settled.state, OperationState::Succeeded(r) if r.succeeded > 0) {
            let before = self.upload_jobs.len();
            self.upload_jobs.retain(|job| {
                let status = job.status();
                !(status.settled && status.error.is_none())
            });
            debug!(
                "Dropped {} uploaded file(s) from the dialog",
                before - self.upload_jobs.len()
            );
        }
        settled.state
    }

    /// 关闭上传对话框，中止所有在途请求
    pub fn close_upload(&mut self) {
        self.upload_dialog.close();
        self.upload_jobs.clear();
    }

    // ---- 编辑 ----

    pub fn edit_dialog(&self) -> &Dialog {
        &self.edit_dialog
    }

    /// 打开编辑对话框，目标目录默认为当前目录
    pub fn open_edit(&mut self, entry: &FileEntry) {
        if self.edit_dialog.is_submitting() {
            return;
        }
        let mut request = EditRequest::from_entry(entry);
        request.new_dir = self.dir.clone();
        self.edit_request = Some(request);
        self.edit_dialog.open();
    }

    /// 按名称在当前列表中查找并打开编辑对话框
    pub fn open_edit_by_name(&mut self, name: &str) -> Result<()> {
        let entry = self
            .entry(name)
            .cloned()
            .ok_or_else(|| ClientError::InvalidInput(format!("no such file: {name}")))?;
        self.open_edit(&entry);
        Ok(())
    }

    pub fn edit_request(&self) -> Option<&EditRequest> {
        self.edit_request.as_ref()
    }

    pub fn edit_request_mut(&mut self) -> Option<&mut EditRequest> {
        if self.edit_dialog.is_submitting() {
            return None;
        }
        self.edit_request.as_mut()
    }

    pub fn submit_edit(&mut self) -> Result<Pending<()>> {
        let request = self
            .edit_request
            .clone()
            .ok_or_else(|| ClientError::InvalidInput("edit dialog is not open".to_string()))?;
        let submission = self.edit_dialog.begin_submit()?;
        let client = self.client.clone();
        let view = Arc::clone(&self.view);
        let callback = Arc::clone(&self.upload_callback);
        Ok(Self::spawn(Some(submission), async move {
            edit_file(&client, request, callback).await?;
            view.reload();
            Ok(())
        }))
    }

    pub fn finish_edit(&mut self, settled: Settled<()>) -> OperationState<()> {
        if let Some(submission) = &settled.submission
            && self.edit_dialog.finish(submission, &settled.state)
            && !self.edit_dialog.is_open()
        {
            self.edit_request = None;
        }
        settled.state
    }

    pub fn close_edit(&mut self) {
        self.edit_dialog.close();
        self.edit_request = None;
    }

    // ---- 删除 ----

    /// 删除单个文件
    pub fn delete_file(&mut self, name: &str) -> Pending<DeleteOutcome> {
        let client = self.client.clone();
        let view = Arc::clone(&self.view);
        let dir = self.dir.clone();
        let name = name.to_string();
        Self::spawn(None, async move {
            let result = client.delete_file(&dir, &name).await;
            Self::after_delete(view.as_ref(), result)
        })
    }

    /// 删除所有选中的文件（清空选择）
    pub fn delete_selected(&mut self) -> Result<Pending<DeleteOutcome>> {
        let names = self.selection.drain();
        if names.is_empty() {
            return Err(ClientError::InvalidInput("no files selected".to_string()));
        }
        info!("Deleting selection: {:?}", names);
        let client = self.client.clone();
        let view = Arc::clone(&self.view);
        let dir = self.dir.clone();
        Ok(Self::spawn(None, async move {
            let result = client.delete_files(&dir, &names).await;
            Self::after_delete(view.as_ref(), result)
        }))
    }

    fn after_delete(view: &dyn View, result: Result<DeleteOutcome>) -> Result<DeleteOutcome> {
        match &result {
            Ok(DeleteOutcome::Deleted) => view.reload(),
            Ok(DeleteOutcome::Message(message)) => {
                view.show_message(message);
                view.reload();
            }
            Err(e) => view.show_error(&e.user_message()),
        }
        result
    }

    // ---- 移动 ----

    pub fn move_dialog(&self) -> &Dialog {
        &self.move_dialog
    }

    /// 打开移动对话框，目标目录默认为当前目录
    pub fn open_move(&mut self) {
        if self.move_dialog.is_submitting() {
            return;
        }
        self.move_destination = self.dir.clone();
        self.move_dialog.open();
    }

    pub fn move_destination(&self) -> &str {
        &self.move_destination
    }

    pub fn set_move_destination(&mut self, destination: impl Into<String>) {
        if !self.move_dialog.is_submitting() {
            self.move_destination = destination.into();
        }
    }

    /// 把选中的文件移动到对话框中的目标目录（清空选择）
    pub fn submit_move(&mut self) -> Result<Pending<()>> {
        if self.selection.is_empty() {
            return Err(ClientError::InvalidInput("no files selected".to_string()));
        }
        let submission = self.move_dialog.begin_submit()?;
        let names = self.selection.drain();
        let destination = self.move_destination.clone();
        self.move_names.clone_from(&names);

        let client = self.client.clone();
        let view = Arc::clone(&self.view);
        let dir = self.dir.clone();
        Ok(Self::spawn(Some(submission), async move {
            client.move_files(&dir, &names, &destination).await?;
            view.reload();
            Ok(())
        }))
    }

    /// 应用移动结果；失败时恢复选择以便重试
    pub fn finish_move(&mut self, settled: Settled<()>) -> OperationState<()> {
        if let Some(submission) = &settled.submission
            && self.move_dialog.finish(submission, &settled.state)
        {
            let names = std::mem::take(&mut self.move_names);
            if self.move_dialog.error().is_some() {
                for name in &names {
                    self.selection.toggle(name, true);
                }
            }
        }
        settled.state
    }

    pub fn close_move(&mut self) {
        self.move_dialog.close();
        self.move_names.clear();
        self.selection.toggle_all(false);
    }

    // ---- 分享 ----

    pub fn share_dialog(&self) -> &Dialog {
        &self.share_dialog
    }

    /// 打开分享对话框，`path` 为空时分享当前目录
    pub fn open_share(&mut self, path: Option<&str>) {
        if self.share_dialog.is_submitting() {
            return;
        }
        self.share_path = path.map_or_else(|| self.dir.clone(), str::to_string);
        self.share_permissions = Permissions::READ;
        self.share_link = None;
        self.share_dialog.open();
    }

    pub fn share_path(&self) -> &str {
        &self.share_path
    }

    pub fn set_share_permissions(&mut self, permissions: Permissions) {
        if !self.share_dialog.is_submitting() {
            self.share_permissions = permissions;
        }
    }

    /// 最近一次生成的分享链接
    pub fn share_link(&self) -> Option<&Url> {
        self.share_link.as_ref()
    }

    /// 创建分享令牌，并把链接写入剪贴板
    pub fn submit_share(&mut self) -> Result<Pending<Url>> {
        let request = ShareRequest::new(self.share_path.clone(), self.share_permissions);
        let submission = self.share_dialog.begin_submit()?;
        let client = self.client.clone();
        let clipboard = Arc::clone(&self.clipboard);
        let dir = self.dir.clone();
        Ok(Self::spawn(Some(submission), async move {
            let token = client.create_share(&request).await?;
            let link = client.share_link(&dir, &token)?;
            clipboard.write_text(link.as_str())?;
            Ok(link)
        }))
    }

    pub fn finish_share(&mut self, settled: Settled<Url>) -> OperationState<Url> {
        if let Some(submission) = &settled.submission
            && self.share_dialog.finish(submission, &settled.state)
            && let OperationState::Succeeded(link) = &settled.state
        {
            self.share_link = Some(link.clone());
        }
        settled.state
    }

    pub fn close_share(&mut self) {
        self.share_dialog.close();
    }

    // ---- 下载 ----

    pub fn download_url(&self, name: &str) -> Result<Url> {
        self.client.download_url(&self.dir, name)
    }

    /// 选中文件的下载链接（不清空选择）
    pub fn download_selected_url(&self) -> Result<Url> {
        self.client
            .download_selection_url(&self.dir, &self.selection.selected())
    }
}
