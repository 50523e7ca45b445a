//! 文件编辑（重命名 / 移动 / 替换内容 / 修改描述）
//!
//! `PATCH <dir>/<原文件名>`，请求体与上传相同:
//! `json` 为单个对象 `{dir, name, description, size, private, permissions}`，
//! 文件字段固定为 `file`。没有替换文件时发送一个以新文件名命名的空字段。

use crate::client::DriveClient;
use crate::error::{ClientError, Result};
use crate::model::{FileEntry, Permission, join_path};
use crate::multipart::{FileContent, FilePart, UpdateFileMeta, UploadSource};
use crate::progress::UploadCallback;
use crate::upload::{UploadRequest, upload};
use reqwest::Method;
use std::sync::Arc;

/// 编辑对话框中的字段
#[derive(Debug, Clone)]
pub struct EditRequest {
    /// 文件当前所在目录
    pub dir: String,
    /// 原文件名
    pub original_name: String,
    /// 目标目录（默认为当前目录）
    pub new_dir: String,
    /// 新文件名（默认为原文件名）
    pub new_name: String,
    pub description: String,
    pub private: bool,
    pub permissions: Vec<Permission>,
    /// 替换文件（可选）
    pub replacement: Option<UploadSource>,
}

impl EditRequest {
    /// 用文件条目预填对话框
    pub fn from_entry(entry: &FileEntry) -> Self {
        Self {
            dir: entry.dir.clone(),
            original_name: entry.name.clone(),
            new_dir: entry.dir.clone(),
            new_name: entry.name.clone(),
            description: entry.description.clone(),
            private: entry.private,
            permissions: entry.permissions.clone(),
            replacement: None,
        }
    }

    /// 选择替换文件，新文件名随之变为替换文件的文件名
    #[must_use]
    pub fn with_replacement(mut self, source: UploadSource) -> Self {
        self.new_name = source.file_name();
        self.replacement = Some(source);
        self
    }

    /// 最终使用的文件名
    pub fn target_name(&self) -> String {
        if !self.new_name.trim().is_empty() {
            return self.new_name.clone();
        }
        match &self.replacement {
            Some(source) => source.file_name(),
            None => self.original_name.clone(),
        }
    }

    /// 转换为上传请求
    pub async fn into_upload_request(self, client: &DriveClient) -> Result<UploadRequest> {
        if self.original_name.is_empty() {
            return Err(ClientError::InvalidInput("file name is required".to_string()));
        }
        let name = self.target_name();
        let size = match &self.replacement {
            Some(source) => Some(source.size().await?),
            None => None,
        };
        let new_dir = if self.new_dir.trim().is_empty() {
            self.dir.clone()
        } else {
            self.new_dir.clone()
        };
        let meta = UpdateFileMeta {
            dir: new_dir,
            name: name.clone(),
            description: self.description,
            size,
            private: self.private,
            permissions: self.permissions,
        };
        let content = match self.replacement {
            Some(source) => FileContent::Source(source),
            None => FileContent::Empty,
        };
        Ok(UploadRequest {
            method: Method::PATCH,
            url: client.url_for(&join_path(&self.dir, &self.original_name))?,
            json: serde_json::to_value(&meta)?,
            file: FilePart {
                field: "file".to_string(),
                file_name: name,
                content,
            },
        })
    }
}

/// 提交编辑
pub async fn edit_file(
    client: &DriveClient,
    request: EditRequest,
    callback: Arc<dyn UploadCallback>,
) -> Result<()> {
    let request = request.into_upload_request(client).await?;
    upload(client, request, 0, callback).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn client() -> DriveClient {
        DriveClient::new(Url::parse("http://localhost:3000").unwrap()).unwrap()
    }

    fn entry() -> FileEntry {
        FileEntry {
            description: "old".into(),
            private: true,
            ..FileEntry::new("/docs", "a.txt")
        }
    }

    #[test]
    fn test_prefilled_from_entry() {
        let req = EditRequest::from_entry(&entry());
        assert_eq!(req.new_dir, "/docs");
        assert_eq!(req.new_name, "a.txt");
        assert_eq!(req.description, "old");
        assert!(req.private);
        assert!(req.replacement.is_none());
    }

    #[tokio::test]
    async fn test_metadata_only_edit_sends_empty_file_part() {
        let mut req = EditRequest::from_entry(&entry());
        req.new_name = "b.txt".into();
        req.new_dir = "/archive".into();

        let upload = req.into_upload_request(&client()).await.unwrap();
        assert_eq!(upload.method, Method::PATCH);
        assert_eq!(upload.url.as_str(), "http://localhost:3000/docs/a.txt");
        assert_eq!(upload.file.field, "file");
        assert_eq!(upload.file.file_name, "b.txt");
        assert!(upload.file.is_empty_placeholder());
        assert_eq!(
            upload.json,
            serde_json::json!({
                "dir": "/archive",
                "name": "b.txt",
                "description": "old",
                "private": true,
                "permissions": []
            })
        );
    }

    #[tokio::test]
    async fn test_replacement_sets_name_and_size() {
        let req = EditRequest::from_entry(&entry())
            .with_replacement(UploadSource::from_bytes("new.txt", vec![0u8; 12]));
        let upload = req.into_upload_request(&client()).await.unwrap();
        assert_eq!(upload.file.file_name, "new.txt");
        assert!(!upload.file.is_empty_placeholder());
        assert_eq!(upload.json["size"], 12);
        assert_eq!(upload.json["name"], "new.txt");
    }

    #[test]
    fn test_blank_name_falls_back() {
        let mut req = EditRequest::from_entry(&entry());
        req.new_name = String::new();
        assert_eq!(req.target_name(), "a.txt");
    }
}
