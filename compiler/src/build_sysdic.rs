//! システム辞書のビルドモジュール
//!
//! 辞書ディレクトリの定義ファイルと辞書ソース(*.csv)から、文字カテゴリー表、
//! 未知語辞書、重みモデル、システム辞書、連接コスト表を構築します。
//!
//! 辞書ディレクトリに`left-id.def`と`right-id.def`がなく`rewrite.def`がある場合は、
//! 辞書ソースの素性から文脈IDを割り当て、出力先に書き出してから辞書を構築します。

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use clap::Parser;

use mazin::character::CategoryTable;
use mazin::archive::persist_atomically;
use mazin::common::{
    CHAR_PROPERTY_DEF_FILE, CHAR_PROPERTY_FILE, DICRC, LEFT_ID_FILE, MATRIX_DEF_FILE,
    MATRIX_EOS_PENALTY_FILE, MATRIX_FILE, MODEL_DEF_FILE, MODEL_FILE, REWRITE_FILE, RIGHT_ID_FILE,
    SYS_DIC_FILE, UNK_DEF_DEFAULT, UNK_DEF_FILE, UNK_DIC_FILE,
};
use mazin::config::Options;
use mazin::connector::MatrixConnector;
use mazin::context_id::ContextIdTable;
use mazin::diagnostics::{DiagnosticSink, LogSink};
use mazin::dictionary::{DictionaryCompiler, DictionaryKind};
use mazin::errors::MazinError;
use mazin::model::WeightModel;
use mazin::rewriter::DictionaryRewriter;
use mazin::utils;

/// システム辞書ビルドコマンドの引数
///
/// ステップを1つも指定しない場合は、すべてのステップを実行します。
#[derive(Parser, Debug)]
#[clap(
    name = "build-sysdic",
    about = "A program to build the system dictionary and its resources."
)]
pub struct Args {
    /// Directory containing the dictionary sources (*.csv, char.def, unk.def, matrix.def, dicrc, ...).
    #[clap(short = 'd', long, default_value = ".")]
    pub dicdir: PathBuf,

    /// Directory to which the binaries are output. Defaults to the dictionary directory.
    #[clap(short = 'o', long)]
    pub outdir: Option<PathBuf>,

    /// Weight model used to assign missing word costs.
    #[clap(short = 'm', long)]
    pub model: Option<PathBuf>,

    /// Factor to scale a sum of weights into an integer cost.
    #[clap(short = 'F', long)]
    pub cost_factor: Option<i64>,

    /// Store empty features to build a dictionary only for word segmentation.
    #[clap(short = 'w', long)]
    pub wakati: bool,

    /// Build the character category table (char.bin).
    #[clap(long)]
    pub build_charcategory: bool,

    /// Build the unknown word dictionary (unk.dic). The character category table is also built.
    #[clap(long)]
    pub build_unknown: bool,

    /// Convert the text model (model.def) into the binary model (model.bin).
    #[clap(long)]
    pub build_model: bool,

    /// Build the system dictionary (sys.dic).
    #[clap(long)]
    pub build_sysdic: bool,

    /// Build the connection matrix (matrix.bin).
    #[clap(long)]
    pub build_matrix: bool,
}

/// システム辞書のビルド中に発生する可能性のあるエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildSysdicError {
    /// `dicrc`が見つからない
    #[error("no such file or directory: {0}")]
    MissingDicrc(PathBuf),

    /// 辞書ソースが見つからない
    #[error("no dictionaries are specified: no *.csv in {0}")]
    NoDictionaries(PathBuf),

    /// 入出力エラー
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// 辞書構築エラー
    #[error("Dictionary building failed: {0}")]
    Mazin(#[from] MazinError),
}

/// 実行するビルドステップ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Steps {
    /// 文字カテゴリー表
    pub charcategory: bool,
    /// 未知語辞書
    pub unknown: bool,
    /// 重みモデル
    pub model: bool,
    /// システム辞書
    pub sysdic: bool,
    /// 連接コスト表
    pub matrix: bool,
}

impl Steps {
    fn from_options(options: &Options) -> Self {
        let steps = Self {
            charcategory: options.get_bool("build-charcategory"),
            unknown: options.get_bool("build-unknown"),
            model: options.get_bool("build-model"),
            sysdic: options.get_bool("build-sysdic"),
            matrix: options.get_bool("build-matrix"),
        };
        if steps == Self::none() {
            Self::all()
        } else {
            steps
        }
    }

    fn none() -> Self {
        Self {
            charcategory: false,
            unknown: false,
            model: false,
            sysdic: false,
            matrix: false,
        }
    }

    fn all() -> Self {
        Self {
            charcategory: true,
            unknown: true,
            model: true,
            sysdic: true,
            matrix: true,
        }
    }
}

/// 辞書ディレクトリの`dicrc`を読み込みます。
///
/// コマンドライン引数で指定された値は上書きされません。
pub(crate) fn load_dicrc(options: &mut Options, dicdir: &Path) -> Result<(), BuildSysdicError> {
    let path = dicdir.join(DICRC);
    let file = File::open(&path).map_err(|_| BuildSysdicError::MissingDicrc(path))?;
    options.load_dicrc(file)?;
    Ok(())
}

/// 辞書ディレクトリにある辞書ソース(*.csv)をファイル名の順に列挙します。
fn enum_csv_dictionaries(dicdir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut dics = vec![];
    for entry in fs::read_dir(dicdir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "csv") {
            dics.push(path);
        }
    }
    dics.sort();
    Ok(dics)
}

/// 文脈IDの定義がない場合に、辞書ソースから文脈IDを割り当てて出力先に書き出します。
///
/// `left-id.def`と`right-id.def`がともにある場合や、`rewrite.def`がない場合は
/// 何もせずに`None`を返します。
fn gen_context_ids(
    dicdir: &Path,
    outdir: &Path,
    sink: &dyn DiagnosticSink,
) -> Result<Option<ContextIdTable>, BuildSysdicError> {
    let has_ids = dicdir.join(LEFT_ID_FILE).exists() && dicdir.join(RIGHT_ID_FILE).exists();
    if has_ids || !dicdir.join(REWRITE_FILE).exists() {
        return Ok(None);
    }
    println!("Generating the context id tables...");
    let mut rewriter = DictionaryRewriter::from_path(dicdir.join(REWRITE_FILE))?;
    let mut table = ContextIdTable::new();

    let unk_def = dicdir.join(UNK_DEF_FILE);
    let lines = utils::read_lines_or_default(&unk_def, UNK_DEF_DEFAULT, sink)?;
    table.add_source(&lines, &unk_def.display().to_string(), &mut rewriter)?;
    for dic in enum_csv_dictionaries(dicdir)? {
        let lines = utils::read_lines(File::open(&dic)?)?;
        table.add_source(&lines, &dic.display().to_string(), &mut rewriter)?;
    }
    table.build()?;

    persist_atomically(outdir.join(LEFT_ID_FILE), |wtr| table.left().save(wtr))?;
    persist_atomically(outdir.join(RIGHT_ID_FILE), |wtr| table.right().save(wtr))?;
    println!("{}x{}", table.left_size(), table.right_size());
    Ok(Some(table))
}

/// コマンドライン引数を設定値に変換します。
fn options_from_args(args: &Args) -> Options {
    let mut options = Options::new();
    options.set("dicdir", args.dicdir.display());
    if let Some(outdir) = &args.outdir {
        options.set("outdir", outdir.display());
    }
    if let Some(model) = &args.model {
        options.set("model", model.display());
    }
    if let Some(cost_factor) = args.cost_factor {
        options.set("cost-factor", cost_factor);
    }
    for (key, on) in [
        ("wakati", args.wakati),
        ("build-charcategory", args.build_charcategory),
        ("build-unknown", args.build_unknown),
        ("build-model", args.build_model),
        ("build-sysdic", args.build_sysdic),
        ("build-matrix", args.build_matrix),
    ] {
        if on {
            options.set(key, "1");
        }
    }
    options
}

/// システム辞書ビルドコマンドを実行する
///
/// # エラー
///
/// `dicrc`がない場合、辞書ソースがない場合、各ステップの構築に失敗した場合に
/// `BuildSysdicError`を返します。
pub fn run(args: Args) -> Result<(), BuildSysdicError> {
    let mut options = options_from_args(&args);
    load_dicrc(&mut options, &args.dicdir)?;
    log::debug!("options:\n{}", options.dump());
    build(&options)
}

/// 設定値に従ってシステム辞書とその資源を構築する
///
/// CLIに依存しないコアのビルドロジックです。
pub fn build(options: &Options) -> Result<(), BuildSysdicError> {
    let sink = LogSink;
    let dicdir = options.dicdir();
    let outdir = options.outdir();
    fs::create_dir_all(&outdir)?;
    let steps = Steps::from_options(options);

    let context_ids = if steps.unknown || steps.sysdic {
        gen_context_ids(&dicdir, &outdir, &sink)?
    } else {
        None
    };
    let new_compiler = |kind| {
        let compiler = DictionaryCompiler::new(options, kind, &sink);
        match &context_ids {
            Some(table) => compiler.with_context_ids(table.clone()),
            None => compiler,
        }
    };

    if steps.charcategory || steps.unknown {
        println!("Compiling the character category table...");
        CategoryTable::compile(
            dicdir.join(CHAR_PROPERTY_DEF_FILE),
            dicdir.join(UNK_DEF_FILE),
            outdir.join(CHAR_PROPERTY_FILE),
            &sink,
        )?;
    }

    if steps.unknown {
        println!("Compiling the unknown word dictionary...");
        let mut compiler = new_compiler(DictionaryKind::Unknown);
        let count = compiler.add_file(dicdir.join(UNK_DEF_FILE))?;
        println!("reading {} ... {count}", dicdir.join(UNK_DEF_FILE).display());
        compiler.compile_to(outdir.join(UNK_DIC_FILE))?;
    }

    if steps.model {
        let model_def = dicdir.join(MODEL_DEF_FILE);
        if model_def.exists() {
            println!("Compiling the weight model...");
            let model = WeightModel::compile(&model_def, outdir.join(MODEL_FILE))?;
            println!("{} features", model.len());
        } else {
            println!("{} is not found. skipped.", model_def.display());
        }
    }

    if steps.sysdic {
        let dics = enum_csv_dictionaries(&dicdir)?;
        if dics.is_empty() {
            return Err(BuildSysdicError::NoDictionaries(dicdir));
        }
        println!("Compiling the system dictionary...");
        let mut compiler = new_compiler(DictionaryKind::System);
        for dic in &dics {
            let count = compiler.add_file(dic)?;
            println!("reading {} ... {count}", dic.display());
        }
        compiler.compile_to(outdir.join(SYS_DIC_FILE))?;
    }

    if steps.matrix {
        println!("Compiling the connection matrix...");
        let matrix = MatrixConnector::compile(
            dicdir.join(MATRIX_DEF_FILE),
            dicdir.join(MATRIX_EOS_PENALTY_FILE),
            outdir.join(MATRIX_FILE),
            &sink,
        )?;
        println!("{}x{}", matrix.num_left(), matrix.num_right());
    }

    println!("Successfully built the dictionary to {}", outdir.display());
    Ok(())
}
