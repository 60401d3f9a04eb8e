//! 診断メッセージの出力先
//!
//! コンパイラの各コンポーネントは、警告や進捗などのメッセージをグローバルなロガーへ
//! 直接書き出すのではなく、構築時または呼び出し時に渡された[`DiagnosticSink`]へ報告します。

use std::sync::Mutex;

pub use log::Level;

/// レベル付きの診断メッセージを受け取るシンク
pub trait DiagnosticSink: Send + Sync {
    /// メッセージを報告します。
    fn report(&self, level: Level, message: &str);

    /// 警告を報告します。
    fn warn(&self, message: &str) {
        self.report(Level::Warn, message);
    }

    /// 情報メッセージを報告します。
    fn info(&self, message: &str) {
        self.report(Level::Info, message);
    }

    /// エラーを報告します。
    fn error(&self, message: &str) {
        self.report(Level::Error, message);
    }

    /// デバッグメッセージを報告します。
    fn debug(&self, message: &str) {
        self.report(Level::Debug, message);
    }
}

/// [`log`]クレートのファサードへ転送するシンク
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, level: Level, message: &str) {
        log::log!(target: "mazin", level, "{message}");
    }
}

/// メッセージをメモリ上に蓄積するシンク
///
/// テストや、ライブラリを組み込むアプリケーションで使用します。
#[derive(Debug, Default)]
pub struct MemorySink {
    messages: Mutex<Vec<(Level, String)>>,
}

impl MemorySink {
    /// 空のシンクを作成します。
    pub fn new() -> Self {
        Self::default()
    }

    /// これまでに報告されたメッセージを返します。
    pub fn messages(&self) -> Vec<(Level, String)> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// 指定したレベルで`needle`を含むメッセージが報告されたかどうか。
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.messages()
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, level: Level, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((level, message.to_string()));
        }
    }
}
