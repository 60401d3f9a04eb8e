//! # Mazin
//!
//! Mazinは、ラティスに基づく形態素解析器のための辞書コンパイラです。
//!
//! ## 概要
//!
//! このライブラリは、MeCab形式の辞書ソースと定義ファイルから、解析器が読み込む
//! バイナリ成果物を生成します。すべてのバイナリはrkyvでシリアライズされ、
//! 一時ファイルに書き出してから置き換えることで、失敗時に不完全なファイルを残しません。
//!
//! ## 主な機能
//!
//! - **文字カテゴリー表**: `char.def`と`unk.def`から65536文字分の属性表を構築
//! - **文脈ID表**: 左右の文脈キーへのIDの割り当てと`left-id.def`/`right-id.def`の読み書き
//! - **素性の書き換え**: `rewrite.def`の規則による素性文字列の書き換え
//! - **素性テンプレート**: `feature.def`のテンプレート展開と素性IDの割り当て
//! - **重みモデル**: フィンガープリントで整列した重みの表と、テキスト形式との相互変換
//! - **ラティスのスコア計算**: 前向き・後ろ向きアルゴリズムと素性の期待値
//! - **辞書の構築**: コストの補完、同形語のまとめ、トライの構築とシリアライズ
//!
//! ## 使用例
//!
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use mazin::config::Options;
//! use mazin::diagnostics::MemorySink;
//! use mazin::dictionary::{DictionaryCompiler, DictionaryKind};
//!
//! let source = "東京,1,1,100,名詞,固有名詞,地名
//! 東京,2,2,300,名詞,一般
//! 京都,1,1,200,名詞,固有名詞,地名";
//!
//! let options = Options::new();
//! let sink = MemorySink::new();
//! let mut compiler =
//!     DictionaryCompiler::new(&options, DictionaryKind::System, &sink).with_id_range(3, 3);
//! compiler.add_reader(source.as_bytes(), "lex.csv")?;
//! let dict = compiler.compile()?;
//!
//! let tokens = dict.exact_match("東京");
//! assert_eq!(tokens.len(), 2);
//! assert_eq!(tokens[0].cost, 100);
//! assert_eq!(dict.feature(&tokens[1]), "名詞,一般");
//!
//! let input: Vec<char> = "京都府".chars().collect();
//! let (end_char, tokens) = dict.common_prefix_search(&input).next().unwrap();
//! assert_eq!(end_char, 2);
//! assert_eq!(tokens[0].cost, 200);
//! # Ok(())
//! # }
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(not(any(target_pointer_width = "32", target_pointer_width = "64")))]
compile_error!("`target_pointer_width` must be 32 or 64");

/// バイナリ成果物の入出力
pub mod archive;

/// 文字カテゴリー表
pub mod character;

/// 共通の定数
pub mod common;

/// 設定値
pub mod config;

/// 連接コスト表
pub mod connector;

/// 文脈ID表
pub mod context_id;

/// 診断メッセージの出力先
pub mod diagnostics;

/// 辞書の構築と検索
pub mod dictionary;

/// エラー型の定義
pub mod errors;

/// 素性テンプレートと素性インデックス
pub mod feature;

/// スコア計算用のラティス
pub mod lattice;

/// 重みモデル
pub mod model;

/// 素性の書き換え規則
pub mod rewriter;

/// 内部ユーティリティ関数
pub mod utils;


// Re-exports
pub use character::CategoryTable;
pub use config::Options;
pub use context_id::ContextIdTable;
pub use diagnostics::{DiagnosticSink, LogSink};
pub use dictionary::{Dictionary, DictionaryCompiler, DictionaryKind};
pub use errors::{MazinError, Result};
pub use feature::FeatureIndex;
pub use lattice::Lattice;
pub use model::WeightModel;

/// このライブラリのバージョン番号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
