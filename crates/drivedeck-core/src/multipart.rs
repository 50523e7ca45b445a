//! 多部分请求体
//!
//! 请求体格式（与服务端解析顺序一致）:
//! 1. `json` 字段: 文件元数据（新建时为数组，编辑时为单个对象）
//! 2. 文件字段: 新建时为 `file-<i>`，编辑时为 `file`
//!
//! 编辑时即使没有替换文件也会发送一个空的 `file` 字段，
//! 服务端据此区分 "仅更新元数据" 和 "缺少文件字段"。

use crate::error::Result;
use crate::model::Permission;
use crate::progress::with_progress;
use futures_util::stream;
use reqwest::Body;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use tokio_util::io::ReaderStream;

/// 内存数据按块发送，便于报告进度
const CHUNK_SIZE: usize = 64 * 1024;

/// 新建文件的元数据（`json` 数组中的一项）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateFileMeta {
    pub name: String,
    pub description: String,
    pub overwrite: bool,
    pub size: u64,
    pub private: bool,
    pub permissions: Vec<Permission>,
}

/// 编辑文件的元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateFileMeta {
    /// 目标目录（可能是新目录）
    pub dir: String,
    /// 新文件名
    pub name: String,
    pub description: String,
    /// 仅在提供替换文件时设置
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub private: bool,
    pub permissions: Vec<Permission>,
}

/// 上传数据来源
#[derive(Debug, Clone)]
pub enum UploadSource {
    /// 本地文件
    Path(PathBuf),
    /// 内存数据
    Memory { file_name: String, data: Vec<u8> },
}

impl UploadSource {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        UploadSource::Path(path.into())
    }

    pub fn from_bytes(file_name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        UploadSource::Memory {
            file_name: file_name.into(),
            data: data.into(),
        }
    }

    /// 原始文件名，作为目标文件名的默认值
    pub fn file_name(&self) -> String {
        match self {
            UploadSource::Path(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            UploadSource::Memory { file_name, .. } => file_name.clone(),
        }
    }

    /// 数据大小（字节）
    pub async fn size(&self) -> Result<u64> {
        match self {
            UploadSource::Path(path) => Ok(tokio::fs::metadata(path).await?.len()),
            UploadSource::Memory { data, .. } => Ok(data.len() as u64),
        }
    }

    /// 转换为带进度统计的文件字段
    pub async fn into_part<F>(self, file_name: &str, on_progress: F) -> Result<Part>
    where
        F: FnMut(f64) + Send + Sync + 'static,
    {
        let mime = guess_mime(file_name);
        let part = match self {
            UploadSource::Path(path) => {
                let file = tokio::fs::File::open(&path).await?;
                let len = file.metadata().await?.len();
                let body = Body::wrap_stream(with_progress(ReaderStream::new(file), len, on_progress));
                Part::stream_with_length(body, len)
            }
            UploadSource::Memory { data, .. } => {
                let len = data.len() as u64;
                let chunks: Vec<io::Result<Vec<u8>>> =
                    data.chunks(CHUNK_SIZE).map(|c| Ok(c.to_vec())).collect();
                let body = Body::wrap_stream(with_progress(stream::iter(chunks), len, on_progress));
                Part::stream_with_length(body, len)
            }
        };
        Ok(part.file_name(file_name.to_string()).mime_str(&mime)?)
    }
}

/// 文件字段内容
#[derive(Debug, Clone)]
pub enum FileContent {
    Source(UploadSource),
    /// 空占位字段
    Empty,
}

/// 一个文件字段
#[derive(Debug, Clone)]
pub struct FilePart {
    /// 表单字段名（`file-<i>` 或 `file`）
    pub field: String,
    /// 上传后的文件名
    pub file_name: String,
    pub content: FileContent,
}

impl FilePart {
    pub fn is_empty_placeholder(&self) -> bool {
        matches!(self.content, FileContent::Empty)
    }
}

/// 构造请求体: 先 `json` 字段，后文件字段
pub async fn build_form<F>(json: &serde_json::Value, file: FilePart, on_progress: F) -> Result<Form>
where
    F: FnMut(f64) + Send + Sync + 'static,
{
    let form = Form::new().text("json", serde_json::to_string(json)?);
    let part = match file.content {
        FileContent::Source(source) => source.into_part(&file.file_name, on_progress).await?,
        FileContent::Empty => Part::bytes(Vec::new())
            .file_name(file.file_name.clone())
            .mime_str("application/octet-stream")?,
    };
    Ok(form.part(file.field, part))
}

fn guess_mime(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first()
        .map(|m| m.to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ObjectType, Permissions};

    #[test]
    fn test_create_meta_json() {
        let meta = CreateFileMeta {
            name: "report.pdf".into(),
            description: "Q3".into(),
            overwrite: false,
            size: 1024,
            private: true,
            permissions: vec![Permission::new(ObjectType::User, "bob").allow(Permissions::READ)],
        };
        let json = serde_json::to_value(vec![meta]).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{
                "name": "report.pdf",
                "description": "Q3",
                "overwrite": false,
                "size": 1024,
                "private": true,
                "permissions": [{"object_type": 0, "object": "bob", "permissions": {"read": 1}}]
            }])
        );
    }

    #[test]
    fn test_update_meta_omits_size_without_file() {
        let meta = UpdateFileMeta {
            dir: "/docs".into(),
            name: "renamed.txt".into(),
            description: String::new(),
            size: None,
            private: false,
            permissions: Vec::new(),
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert!(json.get("size").is_none());
        assert_eq!(json["dir"], "/docs");
        assert_eq!(json["name"], "renamed.txt");
    }

    #[test]
    fn test_source_file_name() {
        assert_eq!(UploadSource::from_path("/tmp/photos/cat.png").file_name(), "cat.png");
        assert_eq!(UploadSource::from_bytes("notes.md", b"hi".to_vec()).file_name(), "notes.md");
    }

    #[tokio::test]
    async fn test_source_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        tokio::fs::write(&path, vec![7u8; 300]).await.unwrap();

        assert_eq!(UploadSource::from_path(&path).size().await.unwrap(), 300);
        assert_eq!(UploadSource::from_bytes("x", vec![1, 2, 3]).size().await.unwrap(), 3);
        assert!(UploadSource::from_path(dir.path().join("missing")).size().await.is_err());
    }

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime("a.txt"), "text/plain");
        assert_eq!(guess_mime("no_extension"), "application/octet-stream");
    }
}
