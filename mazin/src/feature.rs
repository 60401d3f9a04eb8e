//! 素性テンプレートの展開と素性IDの管理
//!
//! `feature.def`の各行は`UNIGRAM テンプレート`または`BIGRAM テンプレート`です。
//! テンプレートは左から順に展開され、次のプレースホルダーが置き換えられます。
//!
//! | 記法 | 種類 | 内容 |
//! |------|------|------|
//! | `%F[n]` | 単語 | 単語素性のn番目（0始まり）のフィールド |
//! | `%t` | 単語 | 先頭文字の文字種 |
//! | `%u` | 単語 | 書き換え後の単語素性 |
//! | `%w` | 単語 | 表層形（既知語のみ） |
//! | `%L[n]` | 連接 | 左ノードの右文脈キーのn番目のフィールド |
//! | `%R[n]` | 連接 | 右ノードの左文脈キーのn番目のフィールド |
//! | `%l` | 連接 | 右ノードの左文脈キー |
//! | `%r` | 連接 | 左ノードの右文脈キー |
//!
//! `%F?[n]`のように`?`を付けると、フィールドが空または`*`の場合にテンプレート全体を
//! 読み飛ばします。`\`は次の1文字をエスケープします。
//!
//! 展開された素性文字列は[`FeatureIndex`]によって素性IDに変換されます。学習時
//! ([`FeatureIndex::encoder`]) は出現順に新しいIDを割り当て、辞書の構築時
//! ([`FeatureIndex::decoder`]) は重みモデル内の位置をIDとして使います。

use std::fs::File;
use std::io::Read;
use std::path::Path;

use hashbrown::HashMap;

use crate::common::{FEATURE_FILE, REWRITE_FILE};
use crate::diagnostics::DiagnosticSink;
use crate::errors::{MazinError, Result};
use crate::lattice::{Lattice, NodeId, NodeKind, PathId};
use crate::model::{TextModel, WeightModel};
use crate::rewriter::DictionaryRewriter;
use crate::utils::{self, location, parse_csv_row};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Unigram,
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Text(String),
    Field {
        source: Source,
        index: usize,
        optional: bool,
    },
    CharType,
    Unigram,
    Surface,
    LeftContext,
    RightContext,
}

/// 解析済みの素性テンプレート
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    raw: String,
    parts: Vec<Part>,
}

fn escaped_char(c: char) -> char {
    match c {
        '0' => '\0',
        'a' => '\x07',
        'b' => '\x08',
        't' => '\t',
        'n' => '\n',
        'v' => '\x0b',
        'f' => '\x0c',
        'r' => '\r',
        's' => ' ',
        c => c,
    }
}

impl Template {
    fn parse(raw: &str, bigram: bool) -> Result<Self> {
        let mut parts = vec![];
        let mut text = String::new();
        let mut chars = raw.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    if let Some(c) = chars.next() {
                        text.push(escaped_char(c));
                    }
                }
                '%' => {
                    let mut optional = chars.next_if_eq(&'?').is_some();
                    let meta = chars.next().ok_or_else(|| {
                        MazinError::invalid_format(FEATURE_FILE, format!("unexpected end: {raw}"))
                    })?;
                    let part = match (meta, bigram) {
                        ('F', false) | ('L', true) | ('R', true) => {
                            optional |= chars.next_if_eq(&'?').is_some();
                            let source = match meta {
                                'F' => Source::Unigram,
                                'L' => Source::Left,
                                _ => Source::Right,
                            };
                            let index = Self::parse_index(&mut chars, raw)?;
                            Part::Field {
                                source,
                                index,
                                optional,
                            }
                        }
                        ('t', false) => Part::CharType,
                        ('u', false) => Part::Unigram,
                        ('w', false) => Part::Surface,
                        ('l', true) => Part::LeftContext,
                        ('r', true) => Part::RightContext,
                        _ => {
                            return Err(MazinError::invalid_format(
                                FEATURE_FILE,
                                format!("unknown meta char: {meta} in {raw}"),
                            ));
                        }
                    };
                    if !text.is_empty() {
                        parts.push(Part::Text(std::mem::take(&mut text)));
                    }
                    parts.push(part);
                }
                c => text.push(c),
            }
        }
        if !text.is_empty() {
            parts.push(Part::Text(text));
        }
        Ok(Self {
            raw: raw.to_string(),
            parts,
        })
    }

    fn parse_index<I>(chars: &mut std::iter::Peekable<I>, raw: &str) -> Result<usize>
    where
        I: Iterator<Item = char>,
    {
        let err = || MazinError::invalid_format(FEATURE_FILE, format!("unmatched '[': {raw}"));
        if chars.next() != Some('[') {
            return Err(err());
        }
        let mut digits = String::new();
        loop {
            match chars.next() {
                Some(']') if !digits.is_empty() => break,
                Some(c) if c.is_ascii_digit() => digits.push(c),
                _ => return Err(err()),
            }
        }
        Ok(digits.parse()?)
    }

    /// テンプレートの文字列
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// テンプレートを展開します。
    ///
    /// 省略可能なフィールドが空または`*`の場合は`None`を返します。
    ///
    /// # エラー
    ///
    /// 参照するフィールドの番号が範囲外の場合にエラーを返します。
    fn expand(&self, ctx: &Context) -> Result<Option<String>> {
        let mut os = String::new();
        for part in &self.parts {
            match part {
                Part::Text(s) => os.push_str(s),
                Part::Field {
                    source,
                    index,
                    optional,
                } => {
                    let fields = match source {
                        Source::Unigram => ctx.unigram_fields,
                        Source::Left => ctx.left_fields,
                        Source::Right => ctx.right_fields,
                    };
                    let field = fields.get(*index).ok_or_else(|| {
                        MazinError::invalid_format(
                            FEATURE_FILE,
                            format!("invalid feature template: {} (index {index} of {} fields)", self.raw, fields.len()),
                        )
                    })?;
                    if *optional && (field.is_empty() || field == "*") {
                        return Ok(None);
                    }
                    os.push_str(field);
                }
                Part::CharType => os.push_str(&ctx.char_type.to_string()),
                Part::Unigram => os.push_str(ctx.ufeature),
                Part::Surface => {
                    if ctx.kind == NodeKind::Normal {
                        os.push_str(ctx.surface);
                    }
                }
                Part::LeftContext => os.push_str(ctx.lfeature),
                Part::RightContext => os.push_str(ctx.rfeature),
            }
        }
        Ok(Some(os))
    }
}

struct Context<'a> {
    unigram_fields: &'a [String],
    left_fields: &'a [String],
    right_fields: &'a [String],
    ufeature: &'a str,
    lfeature: &'a str,
    rfeature: &'a str,
    surface: &'a str,
    char_type: u32,
    kind: NodeKind,
}

impl Default for Context<'_> {
    fn default() -> Self {
        Self {
            unigram_fields: &[],
            left_fields: &[],
            right_fields: &[],
            ufeature: "",
            lfeature: "",
            rfeature: "",
            surface: "",
            char_type: 0,
            kind: NodeKind::Normal,
        }
    }
}

/// `feature.def`の単語素性テンプレートと連接素性テンプレート
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FeatureTemplates {
    unigram: Vec<Template>,
    bigram: Vec<Template>,
}

impl FeatureTemplates {
    /// `feature.def`を読み込みます。
    ///
    /// 空行と`#`または空白で始まる行は無視されます。
    ///
    /// # エラー
    ///
    /// `UNIGRAM`、`BIGRAM`以外で始まる行がある場合や、テンプレートが不正な場合に
    /// エラーを返します。
    pub fn from_reader<R>(rdr: R) -> Result<Self>
    where
        R: Read,
    {
        let mut templates = Self::default();
        for (i, line) in utils::read_lines(rdr)?.iter().enumerate() {
            if line.is_empty() || line.starts_with('#') || line.starts_with(' ') {
                continue;
            }
            let line = line.trim_end();
            if let Some(templ) = line.strip_prefix("UNIGRAM ") {
                templates.unigram.push(Template::parse(templ.trim_start(), false)?);
            } else if let Some(templ) = line.strip_prefix("BIGRAM ") {
                templates.bigram.push(Template::parse(templ.trim_start(), true)?);
            } else {
                return Err(MazinError::invalid_format(
                    location(FEATURE_FILE, i),
                    format!("format error: {line}"),
                ));
            }
        }
        Ok(templates)
    }

    /// 単語素性テンプレート
    pub fn unigram(&self) -> &[Template] {
        &self.unigram
    }

    /// 連接素性テンプレート
    pub fn bigram(&self) -> &[Template] {
        &self.bigram
    }
}

/// 素性IDの割り当て方
#[derive(Debug, Clone)]
pub enum FeatureIds {
    /// 学習用。素性文字列に出現順のIDを割り当て、重みはIDで引く。
    Encoder {
        /// 素性文字列からIDへの表
        ids: HashMap<String, usize>,
        /// IDごとの重み
        weights: Vec<f64>,
    },
    /// 辞書構築用。重みモデル内の位置をIDとし、モデルにない素性は読み飛ばす。
    Decoder(WeightModel),
}

/// 素性テンプレートを展開して素性ベクトルとコストを計算するインデックス
#[derive(Debug)]
pub struct FeatureIndex {
    templates: FeatureTemplates,
    rewriter: DictionaryRewriter,
    ids: FeatureIds,
    cache: HashMap<String, Vec<usize>>,
}

impl FeatureIndex {
    /// 学習用のインデックスを作成します。
    pub fn encoder(templates: FeatureTemplates, rewriter: DictionaryRewriter) -> Self {
        Self {
            templates,
            rewriter,
            ids: FeatureIds::Encoder {
                ids: HashMap::new(),
                weights: vec![],
            },
            cache: HashMap::new(),
        }
    }

    /// 辞書構築用のインデックスを作成します。
    pub fn decoder(
        templates: FeatureTemplates,
        rewriter: DictionaryRewriter,
        model: WeightModel,
    ) -> Self {
        Self {
            templates,
            rewriter,
            ids: FeatureIds::Decoder(model),
            cache: HashMap::new(),
        }
    }

    /// 辞書ディレクトリの`feature.def`と`rewrite.def`、および重みモデルを読み込み、
    /// 辞書構築用のインデックスを作成します。
    ///
    /// `model`が`None`の場合は空のモデルを使います。
    pub fn open_decoder<P>(
        dicdir: P,
        model: Option<&Path>,
        sink: &dyn DiagnosticSink,
    ) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let dicdir = dicdir.as_ref();
        let model = match model {
            Some(path) => WeightModel::open(path, sink)?,
            None => WeightModel::default(),
        };
        let templates = FeatureTemplates::from_reader(File::open(dicdir.join(FEATURE_FILE))?)?;
        let rewriter = DictionaryRewriter::from_path(dicdir.join(REWRITE_FILE))?;
        Ok(Self::decoder(templates, rewriter, model))
    }

    /// テキスト形式のモデルを読み込み、学習用のインデックスを作成します。
    ///
    /// 素性にはファイルでの出現順にIDが割り当てられ、重みが設定されます。
    pub fn encoder_from_text<R>(
        templates: FeatureTemplates,
        rewriter: DictionaryRewriter,
        rdr: R,
    ) -> Result<Self>
    where
        R: Read,
    {
        let text = TextModel::parse(rdr, "model")?;
        let mut index = Self::encoder(templates, rewriter);
        if let FeatureIds::Encoder { ids, weights } = &mut index.ids {
            for (feature, weight) in text.entries {
                if !ids.contains_key(&feature) {
                    ids.insert(feature, weights.len());
                    weights.push(weight);
                }
            }
        }
        Ok(index)
    }

    /// 素性文字列のIDを返します。
    ///
    /// 学習用では未知の素性に新しいIDを割り当てます。辞書構築用ではモデルにない素性に
    /// `None`を返します。
    pub fn id(&mut self, feature: &str) -> Option<usize> {
        match &mut self.ids {
            FeatureIds::Encoder { ids, .. } => {
                let next = ids.len();
                Some(*ids.entry_ref(feature).or_insert(next))
            }
            FeatureIds::Decoder(model) => model.find_feature(feature),
        }
    }

    /// IDの重みを返します。
    #[inline]
    pub fn weight(&self, id: usize) -> f64 {
        match &self.ids {
            FeatureIds::Encoder { weights, .. } => weights.get(id).copied().unwrap_or(0.0),
            FeatureIds::Decoder(model) => model.weight(id),
        }
    }

    /// 素性の数
    pub fn num_features(&self) -> usize {
        match &self.ids {
            FeatureIds::Encoder { ids, .. } => ids.len(),
            FeatureIds::Decoder(model) => model.len(),
        }
    }

    /// 学習用の重みを設定します。
    ///
    /// # エラー
    ///
    /// 辞書構築用のインデックスで呼び出した場合にエラーを返します。
    pub fn set_weights(&mut self, new_weights: Vec<f64>) -> Result<()> {
        match &mut self.ids {
            FeatureIds::Encoder { weights, .. } => {
                *weights = new_weights;
                Ok(())
            }
            FeatureIds::Decoder(_) => Err(MazinError::invalid_state(
                "weights of a decoder index are read-only",
                "set_weights",
            )),
        }
    }

    /// テンプレート
    pub fn templates(&self) -> &FeatureTemplates {
        &self.templates
    }

    /// 書き換え器
    pub fn rewriter_mut(&mut self) -> &mut DictionaryRewriter {
        &mut self.rewriter
    }

    fn collect_ids(&mut self, features: Vec<String>) -> Vec<usize> {
        features.iter().filter_map(|f| self.id(f)).collect()
    }

    /// 単語素性を展開して素性IDの列を返します。
    pub fn build_unigram_feature(
        &mut self,
        ufeature: &str,
        surface: &str,
        char_type: u32,
        kind: NodeKind,
    ) -> Result<Vec<usize>> {
        let fields = parse_csv_row(ufeature);
        let ctx = Context {
            unigram_fields: &fields,
            ufeature,
            surface,
            char_type,
            kind,
            ..Context::default()
        };
        let mut features = vec![];
        for templ in &self.templates.unigram {
            if let Some(f) = templ.expand(&ctx)? {
                features.push(f);
            }
        }
        Ok(self.collect_ids(features))
    }

    /// 左ノードの右文脈キーと右ノードの左文脈キーから連接素性を展開し、素性IDの列を
    /// 返します。
    pub fn build_bigram_feature(&mut self, rfeature: &str, lfeature: &str) -> Result<Vec<usize>> {
        let left_fields = parse_csv_row(rfeature);
        let right_fields = parse_csv_row(lfeature);
        let ctx = Context {
            left_fields: &left_fields,
            right_fields: &right_fields,
            lfeature,
            rfeature,
            ..Context::default()
        };
        let mut features = vec![];
        for templ in &self.templates.bigram {
            if let Some(f) = templ.expand(&ctx)? {
                features.push(f);
            }
        }
        Ok(self.collect_ids(features))
    }

    fn rewrite(&mut self, feature: &str) -> Result<crate::rewriter::RewrittenFeatures> {
        self.rewriter.rewrite_cached(feature)?.ok_or_else(|| {
            MazinError::invalid_argument("feature", format!("cannot rewrite pattern: {feature}"))
        })
    }

    /// パスの右ノードの単語素性と、パスの連接素性を構築します。
    ///
    /// 学習用では、単語素性を`単語素性 文字種`、連接素性を`右文脈キー 左文脈キー`を
    /// キーとしてキャッシュします。
    ///
    /// # エラー
    ///
    /// 素性文字列を書き換えられない場合や、学習用で素性ベクトルが空になった場合に
    /// エラーを返します。
    pub fn build_feature(&mut self, lattice: &mut Lattice, path: PathId) -> Result<()> {
        let (lnode, rnode) = {
            let p = lattice.path(path);
            (p.lnode, p.rnode)
        };
        let left = self.rewrite(&lattice.node(lnode).feature)?;
        let right = self.rewrite(&lattice.node(rnode).feature)?;
        let encoder = matches!(self.ids, FeatureIds::Encoder { .. });

        let node = lattice.node(rnode);
        let (surface, char_type, kind) = (node.surface.clone(), node.char_type, node.kind);
        let unigram_key = format!("{} {}", right.ufeature, char_type);
        let fvector = if encoder {
            self.cached(unigram_key, |index| {
                index.build_unigram_feature(&right.ufeature, &surface, char_type, kind)
            })?
        } else {
            self.build_unigram_feature(&right.ufeature, &surface, char_type, kind)?
        };
        lattice.node_mut(rnode).fvector = fvector;

        let bigram_key = format!("{} {}", left.rfeature, right.lfeature);
        let fvector = if encoder {
            self.cached(bigram_key, |index| {
                index.build_bigram_feature(&left.rfeature, &right.lfeature)
            })?
        } else {
            self.build_bigram_feature(&left.rfeature, &right.lfeature)?
        };
        lattice.path_mut(path).fvector = fvector;

        if encoder
            && (lattice.path(path).fvector.is_empty() || lattice.node(rnode).fvector.is_empty())
        {
            return Err(MazinError::invalid_state(
                "fvector is empty",
                lattice.node(rnode).feature.clone(),
            ));
        }
        Ok(())
    }

    fn cached<F>(&mut self, key: String, build: F) -> Result<Vec<usize>>
    where
        F: FnOnce(&mut Self) -> Result<Vec<usize>>,
    {
        if let Some(fvector) = self.cache.get(&key) {
            return Ok(fvector.clone());
        }
        let fvector = build(self)?;
        self.cache.insert(key, fvector.clone());
        Ok(fvector)
    }

    /// ノードの単語コストを計算します。文末ノードのコストは0です。
    pub fn calc_node_cost(&self, lattice: &mut Lattice, id: NodeId) {
        let node = lattice.node(id);
        let cost = if node.is_eos() {
            0.0
        } else {
            node.fvector.iter().map(|&f| self.weight(f)).sum()
        };
        lattice.node_mut(id).wdcost = cost;
    }

    /// パスのコストを計算します。右ノードの単語コストを含みます。
    ///
    /// 文頭から文末までの各経路では、どのノードもちょうど1本の左パスを通って入るため、
    /// 単語コストを右ノード側で数えても左ノード側で数えても経路のスコアと Z は変わりません。
    /// 文頭ノードは右ノードにならないため素性を持たず、文末ノードの単語コストは0です。
    ///
    /// 両端が正しく接続されていないパスのコストは更新しません。
    pub fn calc_path_cost(&self, lattice: &mut Lattice, id: PathId) {
        if lattice.is_empty_path(id) {
            return;
        }
        let path = lattice.path(id);
        let cost = lattice.node(path.rnode).wdcost
            + path.fvector.iter().map(|&f| self.weight(f)).sum::<f64>();
        lattice.path_mut(id).cost = cost;
    }

    /// ラティスのすべてのパスの素性を構築し、ノードとパスのコストを計算します。
    pub fn build_lattice(&mut self, lattice: &mut Lattice) -> Result<()> {
        for p in 0..lattice.num_paths() {
            self.build_feature(lattice, p)?;
        }
        for n in 0..lattice.num_nodes() {
            self.calc_node_cost(lattice, n);
        }
        for p in 0..lattice.num_paths() {
            self.calc_path_cost(lattice, p);
        }
        Ok(())
    }
}
