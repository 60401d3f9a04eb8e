//! 共通の定数定義
//!
//! 辞書ディレクトリ内のファイル名や、各種定義ファイルが存在しない場合に使用される
//! 最小構成の既定値をまとめています。

/// 辞書フォーマットのバージョン
pub const DIC_VERSION: u32 = 102;

/// BOS/EOSを表す文脈キー
///
/// 文脈IDの割り当てでは、このキーに常にID 0が割り当てられます。
pub const BOS_KEY: &str = "BOS/EOS";

/// 既定のコスト係数
pub const DEFAULT_COST_FACTOR: i64 = 800;

/// 既定の文字コード名
pub const DEFAULT_CHARSET: &str = "utf-8";

/// システム辞書のバイナリファイル名
pub const SYS_DIC_FILE: &str = "sys.dic";
/// 未知語定義ファイル名
pub const UNK_DEF_FILE: &str = "unk.def";
/// 未知語辞書のバイナリファイル名
pub const UNK_DIC_FILE: &str = "unk.dic";
/// 連接コスト定義ファイル名
pub const MATRIX_DEF_FILE: &str = "matrix.def";
/// 文末ペナルティ定義ファイル名
pub const MATRIX_EOS_PENALTY_FILE: &str = "matrix-eos-penalty.def";
/// 連接コスト表のバイナリファイル名
pub const MATRIX_FILE: &str = "matrix.bin";
/// 文字カテゴリー定義ファイル名
pub const CHAR_PROPERTY_DEF_FILE: &str = "char.def";
/// 文字カテゴリー表のバイナリファイル名
pub const CHAR_PROPERTY_FILE: &str = "char.bin";
/// 素性テンプレート定義ファイル名
pub const FEATURE_FILE: &str = "feature.def";
/// 素性書き換え規則ファイル名
pub const REWRITE_FILE: &str = "rewrite.def";
/// 左文脈ID定義ファイル名
pub const LEFT_ID_FILE: &str = "left-id.def";
/// 右文脈ID定義ファイル名
pub const RIGHT_ID_FILE: &str = "right-id.def";
/// テキスト形式の重みモデルファイル名
pub const MODEL_DEF_FILE: &str = "model.def";
/// バイナリ形式の重みモデルファイル名
pub const MODEL_FILE: &str = "model.bin";
/// 辞書の設定ファイル名
pub const DICRC: &str = "dicrc";

/// `char.def`が存在しない場合の最小構成
pub const CHAR_PROPERTY_DEF_DEFAULT: &str = "DEFAULT 1 0 0\nSPACE   0 1 0\n0x0020 SPACE\n";

/// `unk.def`が存在しない場合の最小構成
pub const UNK_DEF_DEFAULT: &str = "DEFAULT,0,0,0,*\nSPACE,0,0,0,*\n";

/// `matrix.def`が存在しない場合の最小構成
pub const MATRIX_DEF_DEFAULT: &str = "1 1\n0 0 0\n";
