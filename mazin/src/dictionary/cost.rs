//! 辞書ソースにコストがない見出し語の単語コスト計算

use std::path::PathBuf;

use crate::character::CategoryTable;
use crate::common::{BOS_KEY, CHAR_PROPERTY_FILE, DEFAULT_COST_FACTOR};
use crate::config::Options;
use crate::diagnostics::DiagnosticSink;
use crate::errors::{MazinError, Result};
use crate::feature::FeatureIndex;
use crate::lattice::{self, Lattice, Node, NodeKind};

/// 重みモデルから単語コストを計算します。
///
/// 見出し語1つだけのラティスを作り、単語素性の重みの和を整数のコストに変換します。
pub struct CostCalculator {
    index: FeatureIndex,
    categories: CategoryTable,
    factor: i32,
}

impl CostCalculator {
    /// 新しい計算器を作成します。
    ///
    /// # エラー
    ///
    /// `factor`が正でない場合にエラーを返します。
    pub fn new(index: FeatureIndex, categories: CategoryTable, factor: i32) -> Result<Self> {
        if factor <= 0 {
            return Err(MazinError::invalid_argument(
                "cost-factor",
                "cost factor needs to be positive value",
            ));
        }
        Ok(Self {
            index,
            categories,
            factor,
        })
    }

    /// オプションに従って素性テンプレート、重みモデル、文字カテゴリー表を読み込みます。
    ///
    /// 文字カテゴリー表は`dicdir`の`char.bin`、重みモデルは`model`オプションのパスから
    /// 読み込みます。`model`が未指定の場合はすべての重みを0とします。
    pub fn open(options: &Options, sink: &dyn DiagnosticSink) -> Result<Self> {
        let factor = i32::try_from(options.get_int_or("cost-factor", DEFAULT_COST_FACTOR)?)?;
        let dicdir = options.dicdir();
        let model = options.get_str("model").map(PathBuf::from);
        let index = FeatureIndex::open_decoder(&dicdir, model.as_deref(), sink)?;
        let categories = CategoryTable::from_path(dicdir.join(CHAR_PROPERTY_FILE))?;
        Self::new(index, categories, factor)
    }

    /// コスト係数
    pub fn factor(&self) -> i32 {
        self.factor
    }

    /// 見出し語の単語コストを計算します。
    ///
    /// 文字種には表層形の先頭文字の主カテゴリーを使います。
    ///
    /// # エラー
    ///
    /// 素性文字列を書き換えられない場合や、テンプレートの展開に失敗した場合に
    /// エラーを返します。
    pub fn calc(&mut self, surface: &str, feature: &str) -> Result<i32> {
        let first = surface.chars().next().unwrap_or('\0');
        let char_type = self.categories.char_info(first).primary();
        let rewritten = self
            .index
            .rewriter_mut()
            .rewrite_cached(feature)?
            .ok_or_else(|| {
                MazinError::invalid_argument("feature", format!("cannot rewrite pattern: {feature}"))
            })?;

        let len_char = surface.chars().count().max(1);
        let mut lattice = Lattice::new(len_char, BOS_KEY);
        let node = Node::new(NodeKind::Normal, surface, feature).with_char_type(char_type);
        let id = lattice.add_node(0, len_char, node)?;
        lattice.node_mut(id).fvector = self.index.build_unigram_feature(
            &rewritten.ufeature,
            surface,
            char_type,
            NodeKind::Normal,
        )?;
        self.index.calc_node_cost(&mut lattice, id);
        Ok(lattice::to_cost(lattice.node(id).wdcost, self.factor))
    }
}
