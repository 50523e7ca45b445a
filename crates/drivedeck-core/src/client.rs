//! 文件服务器 HTTP 客户端
//!
//! 封装客户端依赖的服务端接口:
//!
//! | 方法     | 路径              | 用途                                   |
//! |----------|-------------------|----------------------------------------|
//! | `POST`   | `<dir>`           | 上传新文件（multipart）                |
//! | `PATCH`  | `<dir>/<name>`    | 编辑/重命名/替换文件（multipart）      |
//! | `DELETE` | `<dir>/<name>`    | 删除单个文件                           |
//! | `DELETE` | `<dir>`           | 批量删除，JSON 文件名数组              |
//! | `PUT`    | `<dir>`           | 批量移动，`Destination` 头 + 文件名数组 |
//! | `POST`   | `/api/share`      | 创建分享令牌                           |
//!
//! 错误响应体为 `{"message": ...}`，缺失时使用状态文本。

use crate::config::ClientSettings;
use crate::error::{ClientError, Result};
use crate::model::{Permissions, join_path};
use log::{debug, info};
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

/// 移动目标目录的请求头
pub const DESTINATION_HEADER: &str = "Destination";

/// 分享接口路径
pub const SHARE_ENDPOINT: &str = "/api/share";

const USER_AGENT: &str = concat!("drivedeck/", env!("CARGO_PKG_VERSION"));

/// 服务端错误响应
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// 分享请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRequest {
    pub path: String,
    pub permissions: Vec<String>,
}

impl ShareRequest {
    pub fn new(path: impl Into<String>, permissions: Permissions) -> Self {
        Self {
            path: path.into(),
            permissions: permissions
                .names()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ShareResponse {
    token: String,
}

/// 删除结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// 204 No Content
    Deleted,
    /// 200，附带服务端消息（例如部分文件无权删除）
    Message(String),
}

/// 文件服务器客户端
#[derive(Debug, Clone)]
pub struct DriveClient {
    http: reqwest::Client,
    base: Url,
    access_token: Option<String>,
}

impl DriveClient {
    pub fn new(base: Url) -> Result<Self> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            base,
            access_token: None,
        })
    }

    /// 根据设置创建客户端（超时仅在设置中指定时启用）
    pub fn from_settings(settings: &ClientSettings) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = settings.timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            base: settings.server_url()?,
            access_token: settings.access_token.clone().filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// 服务器上某个路径的完整 URL，逐段进行百分号编码
    pub fn url_for(&self, path: &str) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                ClientError::InvalidUrl(format!("{} cannot be used as a base URL", self.base))
            })?;
            segments.pop_if_empty();
            for segment in path.split('/').filter(|s| !s.is_empty()) {
                segments.push(segment);
            }
            if path.ends_with('/') && path.len() > 1 {
                segments.push("");
            }
        }
        url.set_query(None);
        url.set_fragment(None);
        Ok(url)
    }

    /// 构造请求，附带 `Accept: application/json` 和会话 Cookie
    pub(crate) fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut builder = self
            .http
            .request(method, url)
            .header(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = &self.access_token {
            builder = builder.header(COOKIE, format!("access_token={token}"));
        }
        builder
    }

    /// 2xx 原样返回，否则转换为 [`ClientError::Http`]
    pub(crate) async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(Self::error_from(status, response).await)
    }

    async fn error_from(status: StatusCode, response: Response) -> ClientError {
        let message = response
            .text()
            .await
            .ok()
            .and_then(|body| serde_json::from_str::<ErrorBody>(&body).ok())
            .map(|body| body.message);
        debug!("Request failed with {}: {:?}", status, message);
        ClientError::http(status, message)
    }

    /// 删除单个文件: `DELETE <dir>/<name>`，无请求体
    pub async fn delete_file(&self, dir: &str, name: &str) -> Result<DeleteOutcome> {
        let url = self.url_for(&join_path(dir, name))?;
        info!("Deleting {}", url);
        let response = self.request(Method::DELETE, url).send().await?;
        Self::delete_outcome(response).await
    }

    /// 批量删除: `DELETE <dir>`，JSON 文件名数组
    pub async fn delete_files(&self, dir: &str, names: &[String]) -> Result<DeleteOutcome> {
        if names.is_empty() {
            return Err(ClientError::InvalidInput("no files selected".to_string()));
        }
        let url = self.url_for(dir)?;
        info!("Deleting {} file(s) in {}", names.len(), url);
        let response = self
            .request(Method::DELETE, url)
            .header(CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(names)?)
            .send()
            .await?;
        Self::delete_outcome(response).await
    }

    async fn delete_outcome(response: Response) -> Result<DeleteOutcome> {
        let status = response.status();
        match status {
            StatusCode::NO_CONTENT => Ok(DeleteOutcome::Deleted),
            StatusCode::OK => {
                let message = response
                    .json::<ErrorBody>()
                    .await
                    .ok()
                    .map(|b| b.message)
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "OK".to_string());
                Ok(DeleteOutcome::Message(message))
            }
            _ => Err(Self::error_from(status, response).await),
        }
    }

    /// 批量移动: `PUT <dir>`，`Destination: <new dir>`，JSON 文件名数组
    pub async fn move_files(&self, dir: &str, names: &[String], destination: &str) -> Result<()> {
        if names.is_empty() {
            return Err(ClientError::InvalidInput("no files selected".to_string()));
        }
        if destination.trim().is_empty() {
            return Err(ClientError::InvalidInput(
                "destination directory is required".to_string(),
            ));
        }
        let url = self.url_for(dir)?;
        info!("Moving {} file(s) from {} to {}", names.len(), url, destination);
        let response = self
            .request(Method::PUT, url)
            .header(CONTENT_TYPE, "application/json")
            .header(DESTINATION_HEADER, destination)
            .body(serde_json::to_vec(names)?)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// 创建分享令牌
    pub async fn create_share(&self, request: &ShareRequest) -> Result<String> {
        if request.permissions.is_empty() {
            return Err(ClientError::InvalidInput(
                "at least one permission is required".to_string(),
            ));
        }
        let url = self.url_for(SHARE_ENDPOINT)?;
        info!("Creating share for {} ({:?})", request.path, request.permissions);
        let response = self.request(Method::POST, url).json(request).send().await?;
        let response = Self::check(response).await?;
        let body: ShareResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Transport(format!("invalid share response: {e}")))?;
        Ok(body.token)
    }

    /// 分享链接: 当前目录 URL 附加 `token` 查询参数
    pub fn share_link(&self, dir: &str, token: &str) -> Result<Url> {
        let mut url = self.url_for(dir)?;
        url.query_pairs_mut().append_pair("token", token);
        Ok(url)
    }

    /// 单个文件的下载链接: `<dir>/<name>?dl=1`
    pub fn download_url(&self, dir: &str, name: &str) -> Result<Url> {
        let mut url = self.url_for(&join_path(dir, name))?;
        url.query_pairs_mut().append_pair("dl", "1");
        Ok(url)
    }

    /// 多个文件的下载链接: `<dir>?dl=1&files=a,b,c`
    pub fn download_selection_url(&self, dir: &str, names: &[String]) -> Result<Url> {
        let mut url = self.url_for(dir)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("dl", "1");
            if !names.is_empty() {
                query.append_pair("files", &names.join(","));
            }
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> DriveClient {
        DriveClient::new(Url::parse(base).unwrap()).unwrap()
    }

    #[test]
    fn test_url_for() {
        let c = client("http://localhost:8080");
        assert_eq!(c.url_for("/docs/a.txt").unwrap().as_str(), "http://localhost:8080/docs/a.txt");
        assert_eq!(c.url_for("/").unwrap().as_str(), "http://localhost:8080/");
        assert_eq!(c.url_for("/docs/").unwrap().as_str(), "http://localhost:8080/docs/");
    }

    #[test]
    fn test_url_for_encodes_segments() {
        let c = client("http://localhost:8080");
        assert_eq!(
            c.url_for("/my docs/a#1?.txt").unwrap().as_str(),
            "http://localhost:8080/my%20docs/a%231%3F.txt"
        );
    }

    #[test]
    fn test_url_for_keeps_base_prefix() {
        let c = client("https://example.com/drive/");
        assert_eq!(c.url_for("/x/y").unwrap().as_str(), "https://example.com/drive/x/y");
    }

    #[test]
    fn test_download_urls() {
        let c = client("http://localhost");
        assert_eq!(
            c.download_url("/docs", "a.txt").unwrap().as_str(),
            "http://localhost/docs/a.txt?dl=1"
        );
        assert_eq!(
            c.download_selection_url("/docs", &["a.txt".into(), "b.txt".into()])
                .unwrap()
                .as_str(),
            "http://localhost/docs?dl=1&files=a.txt%2Cb.txt"
        );
        assert_eq!(
            c.download_selection_url("/docs", &[]).unwrap().as_str(),
            "http://localhost/docs?dl=1"
        );
    }

    #[test]
    fn test_share_link() {
        let c = client("http://localhost");
        assert_eq!(
            c.share_link("/photos", "abc123").unwrap().as_str(),
            "http://localhost/photos?token=abc123"
        );
    }

    #[test]
    fn test_share_request_from_permissions() {
        let req = ShareRequest::new("/photos", Permissions::READ.add(Permissions::CREATE));
        assert_eq!(req.permissions, vec!["read", "create"]);
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({"path": "/photos", "permissions": ["read", "create"]})
        );
    }

    #[tokio::test]
    async fn test_empty_selection_rejected_before_sending() {
        let c = client("http://127.0.0.1:9");
        assert!(matches!(
            c.delete_files("/docs", &[]).await,
            Err(ClientError::InvalidInput(_))
        ));
        assert!(matches!(
            c.move_files("/docs", &[], "/other").await,
            Err(ClientError::InvalidInput(_))
        ));
        assert!(matches!(
            c.create_share(&ShareRequest::new("/docs", Permissions::NONE)).await,
            Err(ClientError::InvalidInput(_))
        ));
    }
}
