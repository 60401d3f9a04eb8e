//! エラー型の定義
//!
//! このモジュールは、Mazinライブラリで使用されるすべてのエラー型を定義します。
//! 定義ファイルの検証エラーは、問題のあったファイル名と行番号（またはフィールド）を保持します。

use std::error::Error;
use std::fmt;

/// Mazin専用のResult型
///
/// エラー型としてデフォルトで[`MazinError`]を使用します。
pub type Result<T, E = MazinError> = std::result::Result<T, E>;

/// Mazinのエラー型
///
/// このライブラリで発生する可能性のあるすべてのエラーを表現します。
/// 検証エラーはいずれも致命的で、現在のコンパイル処理を中断します。
#[derive(Debug, thiserror::Error)]
pub enum MazinError {
    /// 無効な引数エラー
    ///
    /// [`InvalidArgumentError`]のエラーバリアント。
    #[error(transparent)]
    InvalidArgument(InvalidArgumentError),

    /// 無効なフォーマットエラー
    ///
    /// 行やフィールドの数が不正な場合に発生します。
    #[error(transparent)]
    InvalidFormat(InvalidFormatError),

    /// 無効な状態エラー
    ///
    /// [`InvalidStateError`]のエラーバリアント。
    #[error(transparent)]
    InvalidState(InvalidStateError),

    /// 未定義の文字カテゴリーを参照した
    #[error("UndefinedCategoryError: {file}: category [{name}] is undefined")]
    UndefinedCategory {
        /// 参照元のファイル名
        file: String,
        /// カテゴリー名
        name: String,
    },

    /// 必須の文字カテゴリー（DEFAULT, SPACE）が定義されていない
    #[error("MissingRequiredCategoryError: {file}: category [{name}] is required")]
    MissingRequiredCategory {
        /// 文字カテゴリー定義ファイル名
        file: String,
        /// 欠けているカテゴリー名
        name: &'static str,
    },

    /// 文字コード範囲の指定が不正
    #[error("RangeError: {file}:{line}: invalid code point range low={low:#06x} high={high:#06x}")]
    Range {
        /// ファイル名
        file: String,
        /// 行番号（1始まり）
        line: usize,
        /// 範囲の下限
        low: u32,
        /// 範囲の上限
        high: u32,
    },

    /// 同じ名前の定義が重複している
    #[error("DuplicateDefinitionError: {file}:{line}: {name} is already defined")]
    DuplicateDefinition {
        /// ファイル名
        file: String,
        /// 行番号（1始まり）
        line: usize,
        /// 重複した名前
        name: String,
    },

    /// 文脈IDが接続表の範囲外
    #[error(
        "ContextIdOutOfRangeError: {file}:{line}: invalid ids are found left_id={left_id}, right_id={right_id} (sizes: {left_size}x{right_size})"
    )]
    ContextIdOutOfRange {
        /// 辞書ソースのファイル名
        file: String,
        /// 行番号（1始まり）
        line: usize,
        /// 左文脈ID
        left_id: i32,
        /// 右文脈ID
        right_id: i32,
        /// 左文脈IDの数
        left_size: usize,
        /// 右文脈IDの数
        right_size: usize,
    },

    /// システム辞書・未知語辞書でコストが設定されていない
    #[error("MissingCostError: {file}:{line}: cost field should not be empty in system/unknown dictionaries")]
    MissingCost {
        /// 辞書ソースのファイル名
        file: String,
        /// 行番号（1始まり）
        line: usize,
    },

    /// トライの構築エラー
    #[error(transparent)]
    TrieBuild(#[from] TrieBuildError),

    /// 同じ表層形の見出しが多すぎる
    #[error("TooManyHomographsError: {count} entries share the surface {surface:?} (max {max})")]
    TooManyHomographs {
        /// 表層形
        surface: String,
        /// 見出しの数
        count: usize,
        /// 上限
        max: usize,
    },

    /// 重みモデルの読み込みエラー
    #[error("ModelLoadError: {path}: {cause}")]
    ModelLoad {
        /// モデルファイルのパス
        path: String,
        /// 原因
        cause: String,
    },

    /// 整数変換エラー
    ///
    /// [`TryFromIntError`](std::num::TryFromIntError)のエラーバリアント。
    #[error(transparent)]
    TryFromInt(std::num::TryFromIntError),

    /// 浮動小数点数パースエラー
    ///
    /// [`ParseFloatError`](std::num::ParseFloatError)のエラーバリアント。
    #[error(transparent)]
    ParseFloat(std::num::ParseFloatError),

    /// 整数パースエラー
    ///
    /// [`ParseIntError`](std::num::ParseIntError)のエラーバリアント。
    #[error(transparent)]
    ParseInt(std::num::ParseIntError),

    /// UTF-8エンコーディングエラー
    ///
    /// [`std::str::Utf8Error`]のエラーバリアント。
    #[error(transparent)]
    Utf8(std::str::Utf8Error),

    /// I/Oエラー
    ///
    /// [`std::io::Error`](std::io::Error)のエラーバリアント。
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// rkyvシリアライゼーションエラー
    ///
    /// [`rkyv::rancor::Error`](rkyv::rancor::Error)のエラーバリアント。
    #[error(transparent)]
    Rkyv(#[from] rkyv::rancor::Error),

    /// 一時ファイルの永続化エラー
    ///
    /// [`tempfile::PersistError`](tempfile::PersistError)のエラーバリアント。
    #[error(transparent)]
    PathPersist(#[from] tempfile::PersistError),
}

/// トライ構築時のエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrieBuildError {
    /// キーが一つもない
    #[error("TrieBuildError: no entries found")]
    NoEntries,

    /// キーが昇順に並んでいない
    #[error("TrieBuildError: Disordered entry at index {index}")]
    NotSorted {
        /// 順序が崩れていたキーの位置
        index: usize,
    },

    /// キーが重複している
    #[error("TrieBuildError: Duplicated entry at index {index}")]
    DuplicateEntry {
        /// 重複していたキーの位置
        index: usize,
    },
}

impl MazinError {
    /// 無効な引数エラーを生成します
    ///
    /// # 引数
    ///
    /// * `arg` - 引数の名前
    /// * `msg` - エラーメッセージ
    pub(crate) fn invalid_argument<S>(arg: &'static str, msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::InvalidArgument(InvalidArgumentError {
            arg,
            msg: msg.into(),
        })
    }

    /// 無効なフォーマットエラーを生成します
    ///
    /// # 引数
    ///
    /// * `arg` - フォーマット名（通常はファイル名と行番号）
    /// * `msg` - エラーメッセージ
    pub(crate) fn invalid_format<A, S>(arg: A, msg: S) -> Self
    where
        A: Into<String>,
        S: Into<String>,
    {
        Self::InvalidFormat(InvalidFormatError {
            arg: arg.into(),
            msg: msg.into(),
        })
    }

    /// 無効な状態エラーを生成します
    ///
    /// # 引数
    ///
    /// * `msg` - エラーメッセージ
    /// * `cause` - エラーの原因
    pub(crate) fn invalid_state<S, M>(msg: S, cause: M) -> Self
    where
        S: Into<String>,
        M: Into<String>,
    {
        Self::InvalidState(InvalidStateError {
            msg: msg.into(),
            cause: cause.into(),
        })
    }
}

/// 引数が無効な場合に使用されるエラー
#[derive(Debug)]
pub struct InvalidArgumentError {
    /// 引数の名前
    pub(crate) arg: &'static str,

    /// エラーメッセージ
    pub(crate) msg: String,
}

impl fmt::Display for InvalidArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "InvalidArgumentError: {}: {}", self.arg, self.msg)
    }
}

impl Error for InvalidArgumentError {}

/// 入力フォーマットが無効な場合に使用されるエラー
#[derive(Debug)]
pub struct InvalidFormatError {
    /// フォーマットの名前
    pub(crate) arg: String,

    /// エラーメッセージ
    pub(crate) msg: String,
}

impl fmt::Display for InvalidFormatError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "InvalidFormatError: {}: {}", self.arg, self.msg)
    }
}

impl Error for InvalidFormatError {}

/// 状態が無効な場合に使用されるエラー
#[derive(Debug)]
pub struct InvalidStateError {
    /// エラーメッセージ
    pub(crate) msg: String,

    /// エラーの根本原因
    pub(crate) cause: String,
}

impl fmt::Display for InvalidStateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "InvalidStateError: {}: {}", self.msg, self.cause)
    }
}

impl Error for InvalidStateError {}

impl From<std::num::TryFromIntError> for MazinError {
    fn from(error: std::num::TryFromIntError) -> Self {
        Self::TryFromInt(error)
    }
}

impl From<std::num::ParseFloatError> for MazinError {
    fn from(error: std::num::ParseFloatError) -> Self {
        Self::ParseFloat(error)
    }
}

impl From<std::num::ParseIntError> for MazinError {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::ParseInt(error)
    }
}

impl From<std::str::Utf8Error> for MazinError {
    fn from(error: std::str::Utf8Error) -> Self {
        Self::Utf8(error)
    }
}
