//! 辞書ソースのコンパイラ
//!
//! `表層形,左文脈ID,右文脈ID,コスト,素性`形式のCSVを読み込み、文脈IDとコストを
//! 解決したうえで[`Dictionary`]を構築します。

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use hashbrown::HashMap;

use crate::archive::persist_atomically;
use crate::common::{
    DIC_VERSION, LEFT_ID_FILE, MATRIX_DEF_FILE, MATRIX_FILE, REWRITE_FILE, RIGHT_ID_FILE,
    UNK_DEF_DEFAULT,
};
use crate::config::Options;
use crate::connector::MatrixConnector;
use crate::context_id::ContextIdTable;
use crate::diagnostics::DiagnosticSink;
use crate::dictionary::cost::CostCalculator;
use crate::dictionary::trie::{self, TrieIndex};
use crate::dictionary::{Dictionary, DictionaryInfo, DictionaryKind, Token};
use crate::errors::{MazinError, Result};
use crate::rewriter::DictionaryRewriter;
use crate::utils::{self, location};

/// 辞書ソースの1行のフィールド数
const NUM_FIELDS: usize = 5;

/// 辞書ソースを読み込んで[`Dictionary`]を構築するコンパイラ
///
/// 文脈IDの表、書き換え規則、コスト計算器は、必要になったときに辞書ディレクトリから
/// 一度だけ読み込まれます。
pub struct DictionaryCompiler<'a> {
    options: &'a Options,
    kind: DictionaryKind,
    wakati: bool,
    id_range: (usize, usize),
    context_ids: Option<ContextIdTable>,
    rewriter: Option<DictionaryRewriter>,
    cost_calculator: Option<CostCalculator>,
    sink: &'a dyn DiagnosticSink,
    entries: Vec<(String, Token)>,
    features: String,
    feature_refs: HashMap<String, (u32, u32)>,
    sources: Vec<String>,
}

impl<'a> DictionaryCompiler<'a> {
    /// 新しいコンパイラを作成します。
    ///
    /// 左右の文脈IDの数は、辞書ディレクトリの`matrix.def`の先頭行、`matrix.bin`の順に
    /// 探し、どちらもなければ`1x1`とします。
    pub fn new(options: &'a Options, kind: DictionaryKind, sink: &'a dyn DiagnosticSink) -> Self {
        let id_range = read_id_range(&options.dicdir());
        Self {
            options,
            kind,
            wakati: options.get_bool("wakati"),
            id_range,
            context_ids: None,
            rewriter: None,
            cost_calculator: None,
            sink,
            entries: vec![],
            features: String::new(),
            feature_refs: HashMap::new(),
            sources: vec![],
        }
    }

    /// 左右の文脈IDの数を設定します。
    pub fn with_id_range(mut self, left_size: usize, right_size: usize) -> Self {
        self.id_range = (left_size, right_size);
        self
    }

    /// 文脈IDの表を設定します。
    pub fn with_context_ids(mut self, table: ContextIdTable) -> Self {
        self.context_ids = Some(table);
        self
    }

    /// 書き換え規則を設定します。
    pub fn with_rewriter(mut self, rewriter: DictionaryRewriter) -> Self {
        self.rewriter = Some(rewriter);
        self
    }

    /// コスト計算器を設定します。
    pub fn with_cost_calculator(mut self, calculator: CostCalculator) -> Self {
        self.cost_calculator = Some(calculator);
        self
    }

    /// 左右の文脈IDの数
    pub fn id_range(&self) -> (usize, usize) {
        self.id_range
    }

    /// これまでに読み込んだ見出し語の数
    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    /// 辞書ソースのリーダーからすべての行を追加します。
    ///
    /// 空行と`#`で始まる行は読み飛ばします。追加した見出し語の数を返します。
    pub fn add_reader<R>(&mut self, rdr: R, name: &str) -> Result<usize>
    where
        R: Read,
    {
        let lines = utils::read_lines(rdr)?;
        self.add_lines(&lines, name)
    }

    /// 辞書ソースファイルを追加します。
    ///
    /// 未知語辞書のソースが存在しない場合は警告を報告し、最小構成を使います。
    /// それ以外の辞書でファイルが存在しない場合はエラーです。
    pub fn add_file<P>(&mut self, path: P) -> Result<usize>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let name = path.display().to_string();
        let lines = if self.kind == DictionaryKind::Unknown {
            utils::read_lines_or_default(path, UNK_DEF_DEFAULT, self.sink)?
        } else {
            utils::read_lines(File::open(path).map_err(|e| {
                MazinError::invalid_argument("path", format!("{name}: {e}"))
            })?)?
        };
        self.sink.info(&format!("reading {name} ... "));
        let count = self.add_lines(&lines, &name)?;
        self.sink.info(&format!("{name}: {count} entries"));
        Ok(count)
    }

    fn add_lines<S>(&mut self, lines: &[S], name: &str) -> Result<usize>
    where
        S: AsRef<str>,
    {
        if !self.sources.iter().any(|s| s == name) {
            self.sources.push(name.to_string());
        }
        let mut count = 0;
        for (i, line) in lines.iter().enumerate() {
            let line = line.as_ref().trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if self.add_line(line, name, i)? {
                count += 1;
            }
        }
        Ok(count)
    }

    /// 辞書ソースの1行を追加します。
    ///
    /// 表層形が空の行は警告を報告して読み飛ばし、`false`を返します。
    ///
    /// # エラー
    ///
    /// フィールド数が5でない場合、文脈IDが範囲外の場合、システム辞書・未知語辞書で
    /// コストが空の場合にエラーを返します。
    pub fn add_line(&mut self, line: &str, name: &str, line_idx: usize) -> Result<bool> {
        let items = utils::split_csv_row(line, NUM_FIELDS);
        if items.len() != NUM_FIELDS {
            return Err(MazinError::invalid_format(
                location(name, line_idx),
                format!("format error: {line}"),
            ));
        }
        let surface = &items[0];
        let feature = &items[4];
        if surface.is_empty() {
            self.sink
                .warn(&format!("empty word is found, discard this line: {line}"));
            return Ok(false);
        }

        let lid = parse_id(&items[1]);
        let rid = parse_id(&items[2]);
        let (left_id, right_id) = if (0..i16::MAX).contains(&lid) && (0..i16::MAX).contains(&rid) {
            (i32::from(lid), i32::from(rid))
        } else {
            self.lookup_ids(feature)?
        };
        let (left_size, right_size) = self.id_range;
        let in_range = |id: i32, size: usize| usize::try_from(id).is_ok_and(|id| id < size);
        if !in_range(left_id, left_size) || !in_range(right_id, right_size) {
            return Err(MazinError::ContextIdOutOfRange {
                file: name.to_string(),
                line: line_idx + 1,
                left_id,
                right_id,
                left_size,
                right_size,
            });
        }

        let cost = match parse_cost(&items[3]) {
            Some(cost) => cost,
            None if self.kind == DictionaryKind::User => {
                self.cost_calculator()?.calc(surface, feature)?
            }
            None => {
                return Err(MazinError::MissingCost {
                    file: name.to_string(),
                    line: line_idx + 1,
                });
            }
        };

        let (feature_offset, feature_len) = if self.wakati {
            (0, 0)
        } else {
            self.intern_feature(feature)?
        };
        self.entries.push((
            surface.clone(),
            Token {
                left_id: i16::try_from(left_id)?,
                right_id: i16::try_from(right_id)?,
                cost,
                feature_offset,
                feature_len,
            },
        ));
        Ok(true)
    }

    fn lookup_ids(&mut self, feature: &str) -> Result<(i32, i32)> {
        let rewritten = self.rewriter()?.rewrite_cached(feature)?.ok_or_else(|| {
            MazinError::invalid_argument("feature", format!("rewrite failed: {feature}"))
        })?;
        let table = self.context_ids()?;
        let lid = table.lid(&rewritten.lfeature)?;
        let rid = table.rid(&rewritten.rfeature)?;
        Ok((i32::try_from(lid)?, i32::try_from(rid)?))
    }

    fn rewriter(&mut self) -> Result<&mut DictionaryRewriter> {
        if self.rewriter.is_none() {
            let path = self.options.dicdir().join(REWRITE_FILE);
            self.rewriter = Some(DictionaryRewriter::from_path(path)?);
        }
        self.rewriter
            .as_mut()
            .ok_or_else(|| MazinError::invalid_state("rewriter is not loaded", REWRITE_FILE))
    }

    fn context_ids(&mut self) -> Result<&ContextIdTable> {
        if self.context_ids.is_none() {
            let dicdir = self.options.dicdir();
            let table = ContextIdTable::open(
                File::open(dicdir.join(LEFT_ID_FILE))?,
                File::open(dicdir.join(RIGHT_ID_FILE))?,
            )?;
            self.context_ids = Some(table);
        }
        self.context_ids
            .as_ref()
            .ok_or_else(|| MazinError::invalid_state("context ids are not loaded", LEFT_ID_FILE))
    }

    fn cost_calculator(&mut self) -> Result<&mut CostCalculator> {
        if self.cost_calculator.is_none() {
            self.cost_calculator = Some(CostCalculator::open(self.options, self.sink)?);
        }
        self.cost_calculator
            .as_mut()
            .ok_or_else(|| MazinError::invalid_state("cost calculator is not loaded", "model"))
    }

    /// 素性文字列をバッファに追加し、開始位置と長さを返します。
    ///
    /// 同じ素性文字列は1回だけ格納されます。
    fn intern_feature(&mut self, feature: &str) -> Result<(u32, u32)> {
        if let Some(&r) = self.feature_refs.get(feature) {
            return Ok(r);
        }
        let r = (
            u32::try_from(self.features.len())?,
            u32::try_from(feature.len())?,
        );
        self.features.push_str(feature);
        self.feature_refs.insert(feature.to_string(), r);
        Ok(r)
    }

    /// 読み込んだ見出し語を表層形の順に並べ、辞書を構築します。
    ///
    /// 同じ表層形の見出し語は読み込み順を保ったまま連続して並びます。
    ///
    /// # エラー
    ///
    /// 見出し語が一つもない場合や、同じ表層形の見出し語が多すぎる場合にエラーを返します。
    pub fn compile(mut self) -> Result<Dictionary> {
        self.entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        let keys: Vec<&str> = self.entries.iter().map(|(s, _)| s.as_str()).collect();

        self.sink.info("building double array ... ");
        let records = trie::group_homographs(&keys)?;
        let index = TrieIndex::from_records(&records)?;
        self.sink.info(&format!(
            "{} keys, {} tokens",
            records.len(),
            self.entries.len()
        ));

        let (lsize, rsize) = self.id_range;
        let info = DictionaryInfo {
            filename: self.sources.first().cloned().unwrap_or_default(),
            size: u32::try_from(self.entries.len())?,
            kind: self.kind,
            lsize: u32::try_from(lsize)?,
            rsize: u32::try_from(rsize)?,
            version: DIC_VERSION,
        };
        let tokens = self.entries.into_iter().map(|(_, t)| t).collect();
        Ok(Dictionary::new(info, index, tokens, self.features))
    }

    /// 辞書を構築して`output`に書き出します。
    ///
    /// 書き出しに失敗した場合、`output`には何も作られません。
    pub fn compile_to<P>(self, output: P) -> Result<Dictionary>
    where
        P: AsRef<Path>,
    {
        let sink = self.sink;
        let output = output.as_ref();
        let dict = self.compile()?;
        sink.info(&format!("serializing dict: {} ... ", output.display()));
        persist_atomically(output, |wtr| dict.write(wtr))?;
        sink.info("done");
        Ok(dict)
    }
}

/// 文脈IDの数を、`matrix.def`、`matrix.bin`の順に探します。
fn read_id_range(dicdir: &Path) -> (usize, usize) {
    if let Some(size) = MatrixConnector::read_size(dicdir.join(MATRIX_DEF_FILE)) {
        return size;
    }
    let matrix_bin: PathBuf = dicdir.join(MATRIX_FILE);
    File::open(matrix_bin)
        .ok()
        .and_then(|file| MatrixConnector::read(file).ok())
        .map_or((1, 1), |m| (m.num_left(), m.num_right()))
}

/// 文脈IDのフィールドを読みます。数値でない場合は`i16::MIN`です。
fn parse_id(field: &str) -> i16 {
    field.trim().parse().unwrap_or(i16::MIN)
}

/// コストのフィールドを読みます。数値でない場合は未設定です。
fn parse_cost(field: &str) -> Option<i32> {
    field.trim().parse().ok()
}
