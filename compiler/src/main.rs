//! Mazin 辞書コンパイラのメインエントリーポイント
//!
//! このモジュールは、形態素解析用のバイナリ辞書をビルドするためのサブコマンドを提供します。
//! 定義ファイルと辞書ソースからシステム辞書一式を構築するコマンドと、
//! ユーザー辞書を構築するコマンドを統合したCLIツールです。

mod build_sysdic;
mod build_userdic;

use clap::Parser;
use thiserror::Error;

use crate::{build_sysdic::BuildSysdicError, build_userdic::BuildUserdicError};

/// コマンドライン引数の構造体
///
/// `clap`を使用してコマンドライン引数をパースします。
#[derive(Parser, Debug)]
#[clap(name = "compile", version)]
struct Cli {
    /// 実行するサブコマンド
    #[clap(subcommand)]
    command: Command,
}

/// 利用可能なサブコマンド
#[derive(Parser, Debug)]
enum Command {
    /// 定義ファイルと辞書ソースからシステム辞書を構築します
    ///
    /// 文字カテゴリー表、未知語辞書、重みモデル、システム辞書、連接コスト表を順に生成します。
    /// ステップを指定しない場合はすべてのステップを実行します。
    BuildSysdic(build_sysdic::Args),

    /// 辞書ソースからユーザー辞書を構築します
    ///
    /// コストが空の見出し語には、重みモデルから計算したコストを割り当てます。
    BuildUserdic(build_userdic::Args),
}

/// コンパイラの実行中に発生する可能性のあるエラー
///
/// 各サブコマンドで発生したエラーをラップします。
#[derive(Debug, Error)]
pub enum CompileError {
    /// システム辞書ビルド中のエラー
    #[error(transparent)]
    BuildSysdic(#[from] BuildSysdicError),
    /// ユーザー辞書ビルド中のエラー
    #[error(transparent)]
    BuildUserdic(#[from] BuildUserdicError),
}

/// メイン関数
///
/// ロガーを初期化し、コマンドライン引数をパースして指定されたサブコマンドを実行します。
///
/// # エラー
///
/// 各サブコマンドの実行中にエラーが発生した場合、そのエラーが返されます。
fn main() -> Result<(), CompileError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match cli.command {
        Command::BuildSysdic(args) => Ok(build_sysdic::run(args)?),
        Command::BuildUserdic(args) => Ok(build_userdic::run(args)?),
    }
}
