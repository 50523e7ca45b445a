//! 终端视图 - 把核心库的视图、剪贴板和上传事件打印到终端

use drivedeck_core::{Clipboard, ClientError, Result, UploadCallback, View};
use std::collections::HashMap;
use std::sync::Mutex;

pub struct TerminalView {
    /// 上传文件名（按序号）
    names: Mutex<Vec<String>>,
    /// 每个文件最近一次打印的进度（十分位）
    printed: Mutex<HashMap<usize, u32>>,
}

impl TerminalView {
    pub fn new() -> Self {
        Self {
            names: Mutex::new(Vec::new()),
            printed: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_upload_names(&self, names: Vec<String>) {
        if let Ok(mut guard) = self.names.lock() {
            *guard = names;
        }
        if let Ok(mut guard) = self.printed.lock() {
            guard.clear();
        }
    }

    fn name(&self, index: usize) -> String {
        self.names
            .lock()
            .ok()
            .and_then(|names| names.get(index).cloned())
            .unwrap_or_else(|| format!("#{index}"))
    }
}

impl View for TerminalView {
    fn reload(&self) {
        println!("🔄 目录已更新");
    }

    fn show_error(&self, message: &str) {
        eprintln!("❌ {message}");
    }

    fn show_message(&self, message: &str) {
        println!("ℹ️  {message}");
    }
}

impl Clipboard for TerminalView {
    fn write_text(&self, text: &str) -> Result<()> {
        println!("📋 {text}");
        Ok(())
    }
}

impl UploadCallback for TerminalView {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn on_progress(&self, index: usize, fraction: f64) {
        let decile = (fraction.clamp(0.0, 1.0) * 10.0).floor() as u32;
        let Ok(mut printed) = self.printed.lock() else {
            return;
        };
        if printed.get(&index).is_some_and(|last| *last >= decile) {
            return;
        }
        printed.insert(index, decile);
        drop(printed);
        println!("   {} {:>3}%", self.name(index), decile * 10);
    }

    fn on_complete(&self, index: usize) {
        println!("✅ {}", self.name(index));
    }

    fn on_error(&self, index: usize, error: &ClientError) {
        eprintln!("❌ {}: {}", self.name(index), error.user_message());
    }
}
