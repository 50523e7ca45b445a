//! Drivedeck Core Library
//!
//! 网页文件管理器的客户端交互层: 上传、编辑、移动、删除、多选和分享链接。
//! 服务端（存储、权限、认证）只通过其 HTTP 接口出现在这里。
//!
//! # 模块
//!
//! - **selection**: 目录列表的多选状态
//! - **upload** / **edit**: 多部分上传（新建、批量、编辑替换）
//! - **client**: HTTP 接口（删除、移动、分享、下载链接）
//! - **operation**: 可取消的异步操作与三态结果
//! - **dialog**: 对话框状态机
//! - **manager**: 把以上组件串联起来的目录视图
//!
//! # 使用示例
//!
//! ```ignore
//! use drivedeck_core::{DriveClient, FileManager, SimpleView, UploadSource};
//!
//! let client = DriveClient::from_settings(&ClientSettings::load())?;
//! let (view, events) = SimpleView::new();
//! let view = Arc::new(view);
//! let mut manager = FileManager::new(client, "/photos", view.clone(), view);
//!
//! // 1. 选择文件并打开上传对话框
//! manager.open_upload(vec![UploadSource::from_path("cat.png")])?;
//!
//! // 2. 提交，等待所有请求结束
//! let pending = manager.submit_upload()?;
//! let settled = pending.wait().await;
//!
//! // 3. 更新对话框状态（成功时视图已刷新一次）
//! manager.finish_upload(settled);
//! ```

pub mod client;
pub mod config;
pub mod dialog;
pub mod edit;
pub mod error;
pub mod manager;
pub mod model;
pub mod multipart;
pub mod operation;
pub mod progress;
pub mod selection;
pub mod upload;
pub mod view;

pub use client::{DeleteOutcome, DriveClient, ShareRequest};
pub use config::ClientSettings;
pub use dialog::{Dialog, DialogKind, DialogState};
pub use edit::EditRequest;
pub use error::{ClientError, Result};
pub use manager::{FileManager, Pending, Settled};
pub use model::{FileEntry, ObjectType, Permission, PermissionKind, Permissions, ToggleState};
pub use multipart::UploadSource;
pub use operation::{Operation, OperationState};
pub use progress::{SimpleUploadCallback, UploadCallback, UploadEvent};
pub use selection::SelectionTracker;
pub use upload::{BatchReport, JobStatus, UploadJob};
pub use view::{Clipboard, SimpleView, View, ViewEvent};
