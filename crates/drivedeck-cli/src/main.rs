//! Drivedeck CLI
//!
//! 文件服务器命令行客户端: 上传、编辑、删除、移动、分享和下载链接。
//! Ctrl-C 会中止正在进行的请求。

mod terminal;

use anyhow::{Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use drivedeck_core::{
    ClientSettings, DriveClient, EditRequest, FileEntry, FileManager, OperationState, Pending,
    Permission, Permissions, Settled, UploadJob, UploadSource,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use terminal::TerminalView;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "drivedeck", version, about = "网页文件管理器 - 命令行客户端")]
struct Cli {
    /// 服务器地址（覆盖配置文件）
    #[arg(short, long, global = true)]
    server: Option<String>,
    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// 输出详细日志
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    File(FileCommand),
    /// 查看或修改配置
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// 需要连接服务器的命令
#[derive(Subcommand)]
enum FileCommand {
    /// 上传文件
    Upload {
        /// 要上传的文件
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// 目标目录 (默认: 配置中的起始目录)
        #[arg(short, long)]
        dir: Option<String>,
        /// 目标文件名（仅上传单个文件时可用）
        #[arg(short, long)]
        name: Option<String>,
        /// 文件描述
        #[arg(long)]
        description: Option<String>,
        /// 设为私有
        #[arg(short, long)]
        private: bool,
        /// 覆盖同名文件
        #[arg(short, long)]
        overwrite: bool,
        /// 访问权限，格式 `user:alice:read,update`，可重复
        #[arg(long = "grant")]
        permission: Vec<Permission>,
    },
    /// 编辑文件
    Edit {
        /// 文件名
        name: String,
        /// 文件所在目录
        #[arg(short, long)]
        dir: Option<String>,
        /// 新文件名
        #[arg(long)]
        new_name: Option<String>,
        /// 新目录
        #[arg(long)]
        new_dir: Option<String>,
        /// 替换内容的本地文件
        #[arg(short, long)]
        file: Option<PathBuf>,
        #[command(flatten)]
        metadata: EditMetadata,
    },
    /// 删除文件
    Delete {
        #[arg(required = true)]
        names: Vec<String>,
        #[arg(short, long)]
        dir: Option<String>,
    },
    /// 移动文件到另一个目录
    Move {
        #[arg(required = true)]
        names: Vec<String>,
        /// 目标目录
        #[arg(short, long)]
        to: String,
        #[arg(short, long)]
        dir: Option<String>,
    },
    /// 创建分享链接
    Share {
        /// 分享的路径 (默认: 当前目录)
        path: Option<String>,
        /// 授予的权限（read, create, update, delete, update_permissions, share），可重复
        #[arg(long = "perm", default_value = "read", value_parser = parse_permissions)]
        permissions: Vec<Permissions>,
        #[arg(short, long)]
        dir: Option<String>,
    },
    /// 打印下载链接
    DownloadUrl {
        #[arg(required = true)]
        names: Vec<String>,
        #[arg(short, long)]
        dir: Option<String>,
    },
}

/// 编辑时提交的元数据
///
/// 服务端会用提交的值覆盖描述和私有标志，
/// 所以两者必须明确给出，或者用 `--reset-metadata` 确认重置。
#[derive(Args)]
struct EditMetadata {
    /// 文件描述
    #[arg(long)]
    description: Option<String>,
    /// 设为私有
    #[arg(short, long, conflicts_with = "public")]
    private: bool,
    /// 设为公开
    #[arg(long)]
    public: bool,
    /// 访问权限，格式 `user:alice:read,update`，可重复
    #[arg(long = "grant")]
    permission: Vec<Permission>,
    /// 未给出的描述和私有标志使用默认值（空描述、公开）
    #[arg(long)]
    reset_metadata: bool,
}

impl EditMetadata {
    fn privacy(&self) -> Option<bool> {
        match (self.private, self.public) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    /// 用命令行给出的元数据构造文件条目
    fn into_entry(self, dir: &str, name: &str) -> Result<FileEntry> {
        let privacy = self.privacy();
        if !self.reset_metadata {
            let mut missing = Vec::new();
            if self.description.is_none() {
                missing.push("--description");
            }
            if privacy.is_none() {
                missing.push("--private/--public");
            }
            if !missing.is_empty() {
                bail!(
                    "edit overwrites the description and privacy flag; pass {} or --reset-metadata",
                    missing.join(" and ")
                );
            }
        }
        Ok(FileEntry {
            description: self.description.unwrap_or_default(),
            private: privacy.unwrap_or(false),
            permissions: self.permission,
            ..FileEntry::new(dir, name)
        })
    }
}

/// 把 `--file`、`--new-name`、`--new-dir` 应用到编辑请求
fn apply_edit_flags(
    request: &mut EditRequest,
    file: Option<PathBuf>,
    new_name: Option<String>,
    new_dir: Option<String>,
) {
    if let Some(path) = file {
        *request = request.clone().with_replacement(UploadSource::from_path(path));
    }
    if let Some(new_name) = new_name {
        request.new_name = new_name;
    }
    if let Some(new_dir) = new_dir {
        request.new_dir = new_dir;
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// 显示当前配置
    Show,
    /// 设置服务器地址
    SetServer { url: String },
    /// 设置会话令牌
    SetToken { token: String },
}

fn parse_permissions(s: &str) -> std::result::Result<Permissions, String> {
    Permissions::from_names(s.split(',').filter(|p| !p.trim().is_empty()))
}

fn init_logging(verbose: bool) {
    // 桥接 log crate（drivedeck-core 使用）到 tracing
    let _ = tracing_log::LogTracer::init();

    let default = if verbose {
        "info,drivedeck_core=debug"
    } else {
        "warn"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(ClientSettings::config_path);
    let mut settings = ClientSettings::load_from(&config_path);
    init_logging(cli.verbose || settings.verbose);

    match cli.command {
        Commands::Config { action } => run_config(action, settings, &config_path),
        Commands::File(command) => {
            if let Some(server) = cli.server {
                settings.server_url = server;
            }
            run_file_command(command, &settings).await
        }
    }
}

async fn run_file_command(command: FileCommand, settings: &ClientSettings) -> Result<()> {
    let client = DriveClient::from_settings(settings)?;
    tracing::debug!("Using server {}", client.base_url());
    let view = Arc::new(TerminalView::new());
    let mut manager = FileManager::new(
        client,
        settings.start_dir.clone(),
        view.clone(),
        view.clone(),
    )
    .with_upload_callback(view.clone());
    let dir_or_default = |dir: Option<String>| dir.unwrap_or_else(|| settings.start_dir.clone());

    match command {
        FileCommand::Upload {
            files,
            dir,
            name,
            description,
            private,
            overwrite,
            permission,
        } => {
            let dir = dir_or_default(dir);
            if name.is_some() && files.len() > 1 {
                bail!("--name can only be used with a single file");
            }
            manager.set_listing(&dir, Vec::new());

            let sources: Vec<UploadSource> =
                files.into_iter().map(UploadSource::from_path).collect();
            manager.open_upload(sources)?;
            for index in 0..manager.upload_jobs().len() {
                if let Some(job) = manager.upload_job_mut(index) {
                    job.description = description.clone().unwrap_or_default();
                    job.private = private;
                    job.overwrite = overwrite;
                    job.permissions.clone_from(&permission);
                    if let Some(name) = &name {
                        job.name.clone_from(name);
                    }
                }
            }
            view.set_upload_names(
                manager
                    .upload_jobs()
                    .iter()
                    .map(UploadJob::target_name)
                    .collect(),
            );

            println!(
                "📤 上传 {} 个文件到 {}",
                manager.upload_jobs().len(),
                dir
            );
            let settled = settle(manager.submit_upload()?).await;
            if let Some(report) = outcome(manager.finish_upload(settled))? {
                if report.failed > 0 {
                    bail!("{} of {} uploads failed", report.failed, report.total());
                }
                println!("✅ 已上传 {} 个文件", report.succeeded);
            }
        }
        FileCommand::Edit {
            name,
            dir,
            new_name,
            new_dir,
            file,
            metadata,
        } => {
            let dir = dir_or_default(dir);
            let entry = metadata.into_entry(&dir, &name)?;
            manager.set_listing(&dir, vec![entry]);
            manager.open_edit_by_name(&name)?;
            if let Some(request) = manager.edit_request_mut() {
                apply_edit_flags(request, file, new_name, new_dir);
                view.set_upload_names(vec![request.target_name()]);
            }

            println!("✏️  编辑 {}", FileEntry::new(&dir, &name).path());
            let settled = settle(manager.submit_edit()?).await;
            if outcome(manager.finish_edit(settled))?.is_some() {
                println!("✅ 已保存");
            }
        }
        FileCommand::Delete { names, dir } => {
            let dir = dir_or_default(dir);
            list_names(&mut manager, &dir, &names);
            let pending = if let [name] = names.as_slice() {
                manager.delete_file(name)
            } else {
                manager.selection_mut().toggle_all(true);
                manager.delete_selected()?
            };

            println!("🗑️  删除 {} 个文件", names.len());
            let settled = settle(pending).await;
            if outcome(settled.state)?.is_some() {
                println!("✅ 已删除");
            }
        }
        FileCommand::Move { names, to, dir } => {
            let dir = dir_or_default(dir);
            list_names(&mut manager, &dir, &names);
            manager.selection_mut().toggle_all(true);
            manager.open_move();
            manager.set_move_destination(to.clone());

            println!("📦 移动 {} 个文件到 {}", names.len(), to);
            let settled = settle(manager.submit_move()?).await;
            if outcome(manager.finish_move(settled))?.is_some() {
                println!("✅ 已移动");
            }
        }
        FileCommand::Share {
            path,
            permissions,
            dir,
        } => {
            let dir = dir_or_default(dir);
            manager.set_listing(&dir, Vec::new());
            let permissions = permissions
                .into_iter()
                .fold(Permissions::NONE, Permissions::add);
            manager.open_share(path.as_deref());
            manager.set_share_permissions(permissions);

            println!("🔗 分享 {} ({})", manager.share_path(), permissions);
            let settled = settle(manager.submit_share()?).await;
            if outcome(manager.finish_share(settled))?.is_some() {
                println!("✅ 分享链接已生成");
            }
        }
        FileCommand::DownloadUrl { names, dir } => {
            let dir = dir_or_default(dir);
            list_names(&mut manager, &dir, &names);
            let url = if let [name] = names.as_slice() {
                manager.download_url(name)?
            } else {
                manager.selection_mut().toggle_all(true);
                manager.download_selected_url()?
            };
            println!("{url}");
        }
    }

    Ok(())
}

/// 用命令行给出的文件名构造目录列表
fn list_names(manager: &mut FileManager, dir: &str, names: &[String]) {
    manager.set_listing(
        dir,
        names.iter().map(|name| FileEntry::new(dir, name)).collect(),
    );
}

/// 等待操作结束，期间按 Ctrl-C 中止请求
async fn settle<T>(pending: Pending<T>) -> Settled<T>
where
    T: Clone + Send + Sync + 'static,
{
    let token = pending.cancellation_token();
    let wait = pending.wait();
    tokio::pin!(wait);

    tokio::select! {
        settled = &mut wait => settled,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, aborting request");
            token.cancel();
            wait.await
        }
    }
}

/// 把操作结果转换为命令结果；取消不算错误
fn outcome<T>(state: OperationState<T>) -> Result<Option<T>> {
    match state {
        OperationState::Succeeded(value) => Ok(Some(value)),
        OperationState::Failed(e) if e.is_cancelled() => {
            println!("⏹️  已取消");
            Ok(None)
        }
        OperationState::Failed(e) => Err(anyhow!(e.user_message())),
        OperationState::Pending => Ok(None),
    }
}

fn run_config(action: ConfigAction, mut settings: ClientSettings, path: &Path) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("⚙️  配置文件: {}", path.display());
            println!("   服务器: {}", settings.server_url);
            println!("   起始目录: {}", settings.start_dir);
            match settings.timeout() {
                Some(timeout) => println!("   超时: {}s", timeout.as_secs()),
                None => println!("   超时: 无"),
            }
            let token = if settings.access_token.is_some() {
                "已设置"
            } else {
                "未设置"
            };
            println!("   会话令牌: {token}");
            println!("   详细日志: {}", settings.verbose);
        }
        ConfigAction::SetServer { url } => {
            settings.server_url = url;
            settings.server_url()?;
            settings.save_to(path)?;
            println!("✅ 服务器地址已设置为 {}", settings.server_url);
        }
        ConfigAction::SetToken { token } => {
            settings.access_token = Some(token).filter(|t| !t.is_empty());
            settings.save_to(path)?;
            println!("✅ 会话令牌已保存");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_edit(args: &[&str]) -> (String, Option<String>, Option<String>, EditMetadata) {
        let argv = ["drivedeck", "edit"].iter().chain(args).copied();
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::File(FileCommand::Edit {
                name,
                new_name,
                new_dir,
                metadata,
                ..
            }) => (name, new_name, new_dir, metadata),
            _ => panic!("expected edit command"),
        }
    }

    fn client() -> DriveClient {
        let settings = ClientSettings {
            server_url: "http://localhost:3000".into(),
            ..Default::default()
        };
        DriveClient::from_settings(&settings).unwrap()
    }

    #[test]
    fn test_rename_without_metadata_is_refused() {
        let (name, _, _, metadata) = parse_edit(&["a.txt", "--new-name", "b.txt"]);
        let err = metadata.into_entry("/docs", &name).unwrap_err().to_string();
        assert!(err.contains("--description"));
        assert!(err.contains("--private/--public"));
        assert!(err.contains("--reset-metadata"));
    }

    #[test]
    fn test_missing_privacy_is_refused() {
        let (name, _, _, metadata) = parse_edit(&["a.txt", "--description", "notes"]);
        let err = metadata.into_entry("/docs", &name).unwrap_err().to_string();
        assert!(!err.contains("--description"));
        assert!(err.contains("--private/--public"));
    }

    #[test]
    fn test_private_and_public_conflict() {
        let argv = ["drivedeck", "edit", "a.txt", "--private", "--public"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_reset_metadata_uses_defaults() {
        let (name, _, _, metadata) = parse_edit(&["a.txt", "--reset-metadata"]);
        let entry = metadata.into_entry("/docs", &name).unwrap();
        assert_eq!(entry.description, "");
        assert!(!entry.private);
        assert_eq!(entry.path(), "/docs/a.txt");
    }

    #[tokio::test]
    async fn test_edit_flags_map_to_request() {
        let (name, new_name, new_dir, metadata) = parse_edit(&[
            "a.txt",
            "--new-name",
            "b.txt",
            "--new-dir",
            "/archive",
            "--description",
            "notes",
            "--private",
        ]);
        let entry = metadata.into_entry("/docs", &name).unwrap();
        let mut request = EditRequest::from_entry(&entry);
        apply_edit_flags(&mut request, None, new_name, new_dir);

        let upload = request.into_upload_request(&client()).await.unwrap();
        assert_eq!(upload.url.as_str(), "http://localhost:3000/docs/a.txt");
        assert_eq!(
            upload.json,
            serde_json::json!({
                "dir": "/archive",
                "name": "b.txt",
                "description": "notes",
                "private": true,
                "permissions": []
            })
        );
        assert!(upload.file.is_empty_placeholder());
    }
}
