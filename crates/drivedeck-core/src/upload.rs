//! 文件上传
//!
//! 所有上传（新建、编辑替换）都经过同一个 [`upload`] 函数，
//! 差异由 [`UploadRequest`] 描述: 请求方法、目标 URL、`json` 元数据和文件字段。
//!
//! 批量上传时每个文件是一个独立的并发请求（无节流、无排队），
//! 全部请求结束后才视为批次完成，整个批次只刷新一次页面。
//! 单个文件失败只记录在该文件上，不会取消其它文件。

use crate::client::DriveClient;
use crate::error::{ClientError, Result};
use crate::model::Permission;
use crate::multipart::{CreateFileMeta, FileContent, FilePart, UploadSource, build_form};
use crate::progress::UploadCallback;
use crate::view::View;
use futures_util::future::join_all;
use log::{debug, info, warn};
use reqwest::Method;
use std::sync::Arc;
use tokio::sync::watch;
use url::Url;

/// 一次上传请求的完整描述
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// `POST`（新建）或 `PATCH`（编辑）
    pub method: Method,
    pub url: Url,
    /// `json` 字段内容
    pub json: serde_json::Value,
    pub file: FilePart,
}

impl UploadRequest {
    /// 新建文件: `POST <dir>`，`json` 为单元素数组，文件字段为 `file-0`
    pub async fn create(client: &DriveClient, dir: &str, job: &UploadJob) -> Result<Self> {
        let size = job.source.size().await?;
        let meta = CreateFileMeta {
            name: job.target_name(),
            description: job.description.clone(),
            overwrite: job.overwrite,
            size,
            private: job.private,
            permissions: job.permissions.clone(),
        };
        Ok(Self {
            method: Method::POST,
            url: client.url_for(dir)?,
            json: serde_json::to_value(vec![meta])?,
            file: FilePart {
                field: "file-0".to_string(),
                file_name: job.target_name(),
                content: FileContent::Source(job.source.clone()),
            },
        })
    }
}

/// 执行一次上传
///
/// 进度仅在文件大小已知时报告；2xx 视为成功，否则错误消息取自服务端 `message` 字段。
pub async fn upload(
    client: &DriveClient,
    request: UploadRequest,
    index: usize,
    callback: Arc<dyn UploadCallback>,
) -> Result<()> {
    let result = send_upload(client, request, index, Arc::clone(&callback)).await;
    match &result {
        Ok(()) => callback.on_complete(index),
        Err(e) => {
            warn!("Upload #{} failed: {}", index, e);
            callback.on_error(index, e);
        }
    }
    result
}

async fn send_upload(
    client: &DriveClient,
    request: UploadRequest,
    index: usize,
    callback: Arc<dyn UploadCallback>,
) -> Result<()> {
    debug!(
        "{} {} (field {}, file {})",
        request.method, request.url, request.file.field, request.file.file_name
    );
    let form = build_form(&request.json, request.file, move |fraction| {
        callback.on_progress(index, fraction);
    })
    .await?;
    let response = client
        .request(request.method, request.url)
        .multipart(form)
        .send()
        .await?;
    DriveClient::check(response).await?;
    Ok(())
}

/// 上传任务状态
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobStatus {
    /// 进度 [0, 1]
    pub progress: f64,
    /// 最近一次错误
    pub error: Option<String>,
    /// 请求已结束（成功或失败）
    pub settled: bool,
}

/// 上传对话框中的一个文件
#[derive(Debug, Clone)]
pub struct UploadJob {
    pub source: UploadSource,
    /// 目标文件名，为空时使用原文件名
    pub name: String,
    pub description: String,
    pub private: bool,
    pub overwrite: bool,
    pub permissions: Vec<Permission>,
    status: Arc<watch::Sender<JobStatus>>,
}

impl UploadJob {
    pub fn new(source: UploadSource) -> Self {
        let (tx, _rx) = watch::channel(JobStatus::default());
        Self {
            name: source.file_name(),
            source,
            description: String::new(),
            private: false,
            overwrite: false,
            permissions: Vec::new(),
            status: Arc::new(tx),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    #[must_use]
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    #[must_use]
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }

    pub fn target_name(&self) -> String {
        if self.name.trim().is_empty() {
            self.source.file_name()
        } else {
            self.name.clone()
        }
    }

    /// 当前状态快照
    pub fn status(&self) -> JobStatus {
        self.status.borrow().clone()
    }

    /// 订阅状态变化
    pub fn subscribe(&self) -> watch::Receiver<JobStatus> {
        self.status.subscribe()
    }

    fn reset_status(&self) {
        self.status.send_replace(JobStatus::default());
    }
}

/// 批次结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// 把事件同时写入任务状态并转发给调用方回调
struct StatusCallback {
    statuses: Vec<Arc<watch::Sender<JobStatus>>>,
    inner: Arc<dyn UploadCallback>,
}

impl StatusCallback {
    fn update(&self, index: usize, f: impl FnOnce(&mut JobStatus)) {
        if let Some(status) = self.statuses.get(index) {
            status.send_modify(f);
        }
    }
}

impl UploadCallback for StatusCallback {
    fn on_progress(&self, index: usize, fraction: f64) {
        self.update(index, |s| s.progress = fraction);
        self.inner.on_progress(index, fraction);
    }

    fn on_complete(&self, index: usize) {
        self.update(index, |s| {
            s.progress = 1.0;
            s.settled = true;
        });
        self.inner.on_complete(index);
    }

    fn on_error(&self, index: usize, error: &ClientError) {
        self.update(index, |s| {
            s.error = Some(error.user_message());
            s.settled = true;
        });
        self.inner.on_error(index, error);
    }
}

/// 批量上传
///
/// 所有请求并发发出，全部结束后若至少一个成功则调用一次 `view.reload()`。
pub async fn upload_batch(
    client: DriveClient,
    dir: String,
    jobs: Vec<UploadJob>,
    callback: Arc<dyn UploadCallback>,
    view: Arc<dyn View>,
) -> Result<BatchReport> {
    if jobs.is_empty() {
        return Err(ClientError::InvalidInput("no files to upload".to_string()));
    }
    info!("Uploading {} file(s) to {}", jobs.len(), dir);

    for job in &jobs {
        job.reset_status();
    }
    let callback: Arc<dyn UploadCallback> = Arc::new(StatusCallback {
        statuses: jobs.iter().map(|j| Arc::clone(&j.status)).collect(),
        inner: callback,
    });

    let requests = jobs.iter().enumerate().map(|(index, job)| {
        let client = &client;
        let dir = &dir;
        let callback = Arc::clone(&callback);
        async move {
            match UploadRequest::create(client, dir, job).await {
                Ok(request) => upload(client, request, index, callback).await,
                Err(e) => {
                    callback.on_error(index, &e);
                    Err(e)
                }
            }
        }
    });
    let results = join_all(requests).await;

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let report = BatchReport {
        succeeded,
        failed: results.len() - succeeded,
    };
    info!(
        "Upload batch settled: {} succeeded, {} failed",
        report.succeeded, report.failed
    );
    if report.succeeded > 0 {
        view.reload();
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ObjectType, Permissions};

    fn client() -> DriveClient {
        DriveClient::new(Url::parse("http://localhost:3000").unwrap()).unwrap()
    }

    #[test]
    fn test_job_defaults_to_source_name() {
        let job = UploadJob::new(UploadSource::from_bytes("photo.jpg", vec![1, 2, 3]));
        assert_eq!(job.name, "photo.jpg");
        assert_eq!(job.with_name("  ").target_name(), "photo.jpg");
    }

    #[tokio::test]
    async fn test_create_request_shape() {
        let job = UploadJob::new(UploadSource::from_bytes("a.txt", b"hello".to_vec()))
            .with_name("b.txt")
            .with_description("greeting")
            .private(true)
            .with_permission(Permission::new(ObjectType::Group, "team").allow(Permissions::READ));

        let req = UploadRequest::create(&client(), "/docs", &job).await.unwrap();
        assert_eq!(req.method, Method::POST);
        assert_eq!(req.url.as_str(), "http://localhost:3000/docs");
        assert_eq!(req.file.field, "file-0");
        assert_eq!(req.file.file_name, "b.txt");
        assert!(!req.file.is_empty_placeholder());
        assert_eq!(
            req.json,
            serde_json::json!([{
                "name": "b.txt",
                "description": "greeting",
                "overwrite": false,
                "size": 5,
                "private": true,
                "permissions": [{"object_type": 1, "object": "team", "permissions": {"read": 1}}]
            }])
        );
    }

    #[tokio::test]
    async fn test_status_callback_updates_job() {
        let job = UploadJob::new(UploadSource::from_bytes("a.txt", vec![0; 4]));
        let cb = StatusCallback {
            statuses: vec![Arc::clone(&job.status)],
            inner: Arc::new(crate::progress::NoopUploadCallback),
        };

        cb.on_progress(0, 0.5);
        assert_eq!(job.status().progress, 0.5);
        assert!(!job.status().settled);

        cb.on_error(0, &ClientError::Http {
            status: 409,
            message: "exists".into(),
        });
        let status = job.status();
        assert_eq!(status.error.as_deref(), Some("exists"));
        assert!(status.settled);

        // 越界序号被忽略
        cb.on_complete(5);
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        let (view, _rx) = crate::view::SimpleView::new();
        let result = upload_batch(
            client(),
            "/".into(),
            Vec::new(),
            Arc::new(crate::progress::NoopUploadCallback),
            Arc::new(view),
        )
        .await;
        assert!(matches!(result, Err(ClientError::InvalidInput(_))));
    }
}
