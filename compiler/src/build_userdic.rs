//! ユーザー辞書のビルドモジュール
//!
//! 辞書ソースからユーザー辞書を構築します。コストが空の見出し語には、
//! 重みモデルから計算したコストを割り当てます。

use std::io;
use std::path::{Path, PathBuf};

use clap::Parser;

use mazin::config::Options;
use mazin::diagnostics::LogSink;
use mazin::dictionary::{DictionaryCompiler, DictionaryKind};
use mazin::errors::MazinError;

use crate::build_sysdic::{self, BuildSysdicError};

/// ユーザー辞書ビルドコマンドの引数
#[derive(Parser, Debug)]
#[clap(name = "build-userdic", about = "A program to build a user dictionary.")]
pub struct Args {
    /// Directory of the system dictionary (left-id.def, right-id.def, rewrite.def, char.bin, dicrc, ...).
    #[clap(short = 'd', long, default_value = ".")]
    pub dicdir: PathBuf,

    /// File to which the user dictionary is output.
    #[clap(short = 'u', long)]
    pub userdic: PathBuf,

    /// Weight model used to assign missing word costs.
    #[clap(short = 'm', long)]
    pub model: Option<PathBuf>,

    /// Factor to scale a sum of weights into an integer cost.
    #[clap(short = 'F', long)]
    pub cost_factor: Option<i64>,

    /// Store empty features to build a dictionary only for word segmentation.
    #[clap(short = 'w', long)]
    pub wakati: bool,

    /// Dictionary sources (*.csv).
    #[clap(required = true)]
    pub sources: Vec<PathBuf>,
}

/// ユーザー辞書のビルド中に発生する可能性のあるエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildUserdicError {
    /// 辞書ソースが指定されていない
    #[error("no dictionaries are specified")]
    NoDictionaries,

    /// 設定の読み込みエラー
    #[error(transparent)]
    Config(#[from] BuildSysdicError),

    /// 入出力エラー
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// 辞書構築エラー
    #[error("Dictionary building failed: {0}")]
    Mazin(#[from] MazinError),
}

/// ユーザー辞書ビルドコマンドを実行する
///
/// # エラー
///
/// `dicrc`がない場合や辞書の構築に失敗した場合に`BuildUserdicError`を返します。
pub fn run(args: Args) -> Result<(), BuildUserdicError> {
    let mut options = Options::new();
    options.set("dicdir", args.dicdir.display());
    if let Some(model) = &args.model {
        options.set("model", model.display());
    }
    if let Some(cost_factor) = args.cost_factor {
        options.set("cost-factor", cost_factor);
    }
    if args.wakati {
        options.set("wakati", "1");
    }
    build_sysdic::load_dicrc(&mut options, &args.dicdir)?;
    log::debug!("options:\n{}", options.dump());
    build(&options, &args.sources, &args.userdic)
}

/// 辞書ソースからユーザー辞書を構築する
///
/// CLIに依存しないコアのビルドロジックです。
pub fn build(
    options: &Options,
    sources: &[PathBuf],
    userdic: &Path,
) -> Result<(), BuildUserdicError> {
    if sources.is_empty() {
        return Err(BuildUserdicError::NoDictionaries);
    }
    let sink = LogSink;
    println!("Compiling the user dictionary...");
    let mut compiler = DictionaryCompiler::new(options, DictionaryKind::User, &sink);
    for source in sources {
        let count = compiler.add_file(source)?;
        println!("reading {} ... {count}", source.display());
    }
    compiler.compile_to(userdic)?;
    println!("Successfully built the user dictionary to {}", userdic.display());
    Ok(())
}
