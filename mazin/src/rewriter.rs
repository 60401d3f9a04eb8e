//! 素性書き換えモジュール。
//!
//! このモジュールは、`rewrite.def`の規則に従って、辞書の素性文字列（カンマ区切りの属性）を
//! 3種類の派生文字列に書き換える機能を提供します。
//!
//! - 単語素性 (`[unigram rewrite]`)
//! - 左文脈キー (`[left rewrite]`)
//! - 右文脈キー (`[right rewrite]`)
//!
//! 各規則は`パターン 書き換え先`の形式で、最初の空白で2つに分けた後、どちらもCSVとして
//! 分割されます。書き換え先に空白が含まれていてもかまいません。
//! パターンのフィールドには次のものが使えます。
//!
//! - `*`で始まるもの: 空でない任意のフィールドにマッチ
//! - `(A|B|C)`: いずれかの選択肢に一致するフィールドにマッチ
//! - その他: 完全一致
//!
//! 書き換え先のフィールド内の`$N`は、入力のN番目（1始まり）のフィールドに置き換えられます。
//! 規則はファイルに書かれた順に試され、最初にマッチしたものが適用されます。

use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use hashbrown::{HashMap, HashSet};
use regex::Regex;

use crate::common::REWRITE_FILE;
use crate::errors::{MazinError, Result};
use crate::utils::{self, location, parse_csv_row, quote_csv_cell};

static REF_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$([0-9]+)").unwrap());
static RULE_DELIMITER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());

#[derive(Debug, Eq, PartialEq)]
enum Pattern {
    Any,
    Exact(String),
    Multiple(HashSet<String>),
}

impl Pattern {
    fn parse(p: &str) -> Self {
        if p.starts_with('*') {
            Self::Any
        } else if p.len() >= 3 && p.starts_with('(') && p.ends_with(')') {
            Self::Multiple(p[1..p.len() - 1].split('|').map(str::to_string).collect())
        } else {
            Self::Exact(p.to_string())
        }
    }

    fn is_match(&self, field: &str) -> bool {
        if field.is_empty() {
            return false;
        }
        match self {
            Self::Any => true,
            Self::Multiple(s) => s.contains(field),
            Self::Exact(s) => field == s,
        }
    }
}

#[derive(Debug)]
enum Segment {
    Reference(usize),
    Text(String),
}

/// 書き換え規則
#[derive(Debug)]
struct RewriteRule {
    patterns: Vec<Pattern>,
    templates: Vec<Vec<Segment>>,
}

impl RewriteRule {
    fn new(pattern: &str, rewrite: &str, at: &str) -> Result<Self> {
        let patterns = parse_csv_row(pattern)
            .iter()
            .map(|p| Pattern::parse(p))
            .collect();
        let mut templates = vec![];
        for field in parse_csv_row(rewrite) {
            templates.push(Self::parse_template(&field, at)?);
        }
        Ok(Self {
            patterns,
            templates,
        })
    }

    fn parse_template(field: &str, at: &str) -> Result<Vec<Segment>> {
        let mut segments = vec![];
        let mut last = 0;
        for cap in REF_PATTERN.captures_iter(field) {
            let (Some(whole), Some(num)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            let idx = num.as_str().parse::<usize>().map_err(|e| {
                MazinError::invalid_format(at, format!("invalid back reference in {field}: {e}"))
            })?;
            if idx == 0 {
                return Err(MazinError::invalid_format(
                    at,
                    format!("back reference must start from $1: {field}"),
                ));
            }
            if whole.start() > last {
                segments.push(Segment::Text(field[last..whole.start()].to_string()));
            }
            segments.push(Segment::Reference(idx - 1));
            last = whole.end();
        }
        if last < field.len() || segments.is_empty() {
            segments.push(Segment::Text(field[last..].to_string()));
        }
        Ok(segments)
    }

    fn is_match<S>(&self, features: &[S]) -> bool
    where
        S: AsRef<str>,
    {
        self.patterns.len() <= features.len()
            && self
                .patterns
                .iter()
                .zip(features)
                .all(|(p, f)| p.is_match(f.as_ref()))
    }

    fn apply<S>(&self, features: &[S]) -> Result<String>
    where
        S: AsRef<str>,
    {
        let mut fields = Vec::with_capacity(self.templates.len());
        for template in &self.templates {
            let mut field = String::new();
            for segment in template {
                match segment {
                    Segment::Reference(idx) => {
                        let f = features.get(*idx).ok_or_else(|| {
                            MazinError::invalid_argument(
                                "features",
                                format!(
                                    "invalid back reference ${} for {} fields",
                                    idx + 1,
                                    features.len()
                                ),
                            )
                        })?;
                        field.push_str(f.as_ref());
                    }
                    Segment::Text(s) => field.push_str(s),
                }
            }
            fields.push(quote_csv_cell(&field));
        }
        Ok(fields.join(","))
    }
}

/// 順序付きの書き換え規則の集合
#[derive(Debug, Default)]
pub struct FeatureRewriter {
    rules: Vec<RewriteRule>,
}

impl FeatureRewriter {
    /// 空の規則集合を作成します。
    pub fn new() -> Self {
        Self::default()
    }

    /// 規則を末尾に追加します。
    ///
    /// # 引数
    ///
    /// * `pattern` - カンマ区切りのマッチングパターン
    /// * `rewrite` - カンマ区切りの書き換え先
    pub fn add_rule(&mut self, pattern: &str, rewrite: &str) -> Result<()> {
        self.add_rule_at(pattern, rewrite, REWRITE_FILE)
    }

    /// `at`をエラーの位置として規則を追加します。
    fn add_rule_at(&mut self, pattern: &str, rewrite: &str, at: &str) -> Result<()> {
        self.rules.push(RewriteRule::new(pattern, rewrite, at)?);
        Ok(())
    }

    /// 規則の数
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// 規則が空かどうか。
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 最初にマッチした規則で書き換えた文字列を返します。
    ///
    /// # 戻り値
    ///
    /// マッチした場合は書き換えられた文字列、マッチしなかった場合は `None`
    ///
    /// # エラー
    ///
    /// 書き換え先が入力のフィールド数を超える`$N`を参照した場合にエラーを返します。
    pub fn rewrite<S>(&self, features: &[S]) -> Result<Option<String>>
    where
        S: AsRef<str>,
    {
        for rule in &self.rules {
            if rule.is_match(features) {
                return rule.apply(features).map(Some);
            }
        }
        Ok(None)
    }
}

/// 書き換え結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenFeatures {
    /// 単語素性
    pub ufeature: String,
    /// 左文脈キー
    pub lfeature: String,
    /// 右文脈キー
    pub rfeature: String,
}

/// 行を`パターン 書き換え先`の組に分割します。
fn parse_rewrite_rule<'a>(line: &'a str, name: &str, line_idx: usize) -> Result<(&'a str, &'a str)> {
    let items: Vec<&str> = RULE_DELIMITER.splitn(line, 2).collect();
    if let [pattern, rewrite] = items.as_slice() {
        Ok((*pattern, *rewrite))
    } else {
        Err(MazinError::invalid_format(
            location(name, line_idx),
            format!("format error: {line}"),
        ))
    }
}

/// 辞書の素性文字列を単語素性と左右の文脈キーに書き換える書き換え器。
///
/// 同じ素性文字列に対する書き換え結果はキャッシュされます。
#[derive(Debug, Default)]
pub struct DictionaryRewriter {
    unigram_rewriter: FeatureRewriter,
    left_rewriter: FeatureRewriter,
    right_rewriter: FeatureRewriter,
    cache: HashMap<String, RewrittenFeatures>,
}

impl DictionaryRewriter {
    /// `rewrite.def`を読み込みます。
    ///
    /// # エラー
    ///
    /// セクション見出しより前に規則がある場合や、規則の形式が不正な場合に
    /// エラーを返します。
    pub fn from_reader<R>(rdr: R) -> Result<Self>
    where
        R: Read,
    {
        Self::from_lines(&utils::read_lines(rdr)?, REWRITE_FILE)
    }

    /// `rewrite.def`ファイルを読み込みます。
    pub fn from_path<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let lines = utils::read_lines(std::fs::File::open(path)?)?;
        Self::from_lines(&lines, &path.display().to_string())
    }

    fn from_lines<S>(lines: &[S], name: &str) -> Result<Self>
    where
        S: AsRef<str>,
    {
        let mut unigram_rewriter = FeatureRewriter::new();
        let mut left_rewriter = FeatureRewriter::new();
        let mut right_rewriter = FeatureRewriter::new();

        let mut rewriter = None;
        for (i, line) in lines.iter().enumerate() {
            let line = line.as_ref().trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match line {
                "[unigram rewrite]" => rewriter = Some(&mut unigram_rewriter),
                "[left rewrite]" => rewriter = Some(&mut left_rewriter),
                "[right rewrite]" => rewriter = Some(&mut right_rewriter),
                line => {
                    if let Some(rewriter) = rewriter.as_mut() {
                        let (pattern, rewrite) = parse_rewrite_rule(line, name, i)?;
                        rewriter.add_rule_at(pattern, rewrite, &location(name, i))?;
                    } else {
                        return Err(MazinError::invalid_format(
                            location(name, i),
                            "no sections found",
                        ));
                    }
                }
            }
        }

        Ok(Self {
            unigram_rewriter,
            left_rewriter,
            right_rewriter,
            cache: HashMap::new(),
        })
    }

    /// 素性文字列を書き換えます。
    ///
    /// 3つの規則集合すべてがマッチした場合にのみ結果を返します。
    pub fn rewrite(&self, feature: &str) -> Result<Option<RewrittenFeatures>> {
        let features = parse_csv_row(feature);
        let Some(ufeature) = self.unigram_rewriter.rewrite(&features)? else {
            return Ok(None);
        };
        let Some(lfeature) = self.left_rewriter.rewrite(&features)? else {
            return Ok(None);
        };
        let Some(rfeature) = self.right_rewriter.rewrite(&features)? else {
            return Ok(None);
        };
        Ok(Some(RewrittenFeatures {
            ufeature,
            lfeature,
            rfeature,
        }))
    }

    /// [`rewrite`](Self::rewrite)と同じですが、成功した結果を素性文字列をキーにキャッシュします。
    pub fn rewrite_cached(&mut self, feature: &str) -> Result<Option<RewrittenFeatures>> {
        if let Some(cached) = self.cache.get(feature) {
            return Ok(Some(cached.clone()));
        }
        let result = self.rewrite(feature)?;
        if let Some(rewritten) = &result {
            self.cache.insert(feature.to_string(), rewritten.clone());
        }
        Ok(result)
    }

    /// キャッシュされている結果の数
    pub fn num_cached(&self) -> usize {
        self.cache.len()
    }
}
