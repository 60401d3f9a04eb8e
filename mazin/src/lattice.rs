//! 学習・コスト計算用のラティス（格子）構造。
//!
//! ラティスはノードとパスのアリーナとして表現され、互いを整数のハンドル
//! ([`NodeId`], [`PathId`]) で参照します。各ノードは、左から入るパスと右へ出るパスの
//! 一覧を保持します。
//!
//! スコアの計算は次の順に行う必要があります。
//!
//! 1. 前向き (alpha) を左から右へ
//! 2. 後ろ向き (beta) を右から左へ
//! 3. 分配関数 Z と、alpha・beta を使った期待値の計算

use crate::errors::{MazinError, Result};

/// ノードのハンドル
pub type NodeId = usize;

/// パスのハンドル
pub type PathId = usize;

/// ノードの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// 辞書に登録された単語
    Normal,
    /// 未知語
    Unknown,
    /// 文頭
    Bos,
    /// 文末
    Eos,
}

/// 既知語ノードの比較で使う素性の数の既定値
pub const DEFAULT_NORMAL_CMP_SIZE: usize = 4;

/// 未知語ノードの比較で使う素性の数の既定値
pub const DEFAULT_UNKNOWN_CMP_SIZE: usize = 2;

/// ラティス内のノード
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// 表層形
    pub surface: String,
    /// 生の素性文字列
    pub feature: String,
    /// 先頭文字の文字種（主カテゴリーのID）
    pub char_type: u32,
    /// ノードの種類
    pub kind: NodeKind,
    /// 単語素性のID列
    pub fvector: Vec<usize>,
    /// 単語コスト
    pub wdcost: f64,
    /// 前向きの累積値
    pub alpha: f64,
    /// 後ろ向きの累積値
    pub beta: f64,
    /// 周辺確率
    pub prob: f64,
    begin: usize,
    end: usize,
    lpaths: Vec<PathId>,
    rpaths: Vec<PathId>,
}

impl Node {
    /// ノードを作成します。
    pub fn new<S, F>(kind: NodeKind, surface: S, feature: F) -> Self
    where
        S: Into<String>,
        F: Into<String>,
    {
        Self {
            surface: surface.into(),
            feature: feature.into(),
            char_type: 0,
            kind,
            fvector: vec![],
            wdcost: 0.0,
            alpha: 0.0,
            beta: 0.0,
            prob: 0.0,
            begin: 0,
            end: 0,
            lpaths: vec![],
            rpaths: vec![],
        }
    }

    /// 文字種を設定します。
    pub fn with_char_type(mut self, char_type: u32) -> Self {
        self.char_type = char_type;
        self
    }

    /// 開始位置（文字単位）
    #[inline(always)]
    pub fn begin(&self) -> usize {
        self.begin
    }

    /// 終了位置（文字単位）
    #[inline(always)]
    pub fn end(&self) -> usize {
        self.end
    }

    /// 左から入るパス
    #[inline(always)]
    pub fn lpaths(&self) -> &[PathId] {
        &self.lpaths
    }

    /// 右へ出るパス
    #[inline(always)]
    pub fn rpaths(&self) -> &[PathId] {
        &self.rpaths
    }

    /// 文頭ノードかどうか。
    #[inline(always)]
    pub fn is_bos(&self) -> bool {
        self.kind == NodeKind::Bos
    }

    /// 文末ノードかどうか。
    #[inline(always)]
    pub fn is_eos(&self) -> bool {
        self.kind == NodeKind::Eos
    }

    /// 未知語ノードかどうか。
    #[inline(always)]
    pub fn is_unknown(&self) -> bool {
        self.kind == NodeKind::Unknown
    }

    /// `other`が同じ単語候補を表すかどうかを判定します。
    ///
    /// 表層形が一致し、かつ素性文字列の先頭の数フィールドが一致する場合に真を返します。
    /// 比較するフィールド数は、`other`が未知語の場合は`unknown_size`、それ以外は
    /// `normal_size`です。`self`は既知語であることを想定しています。
    pub fn is_same_candidate(&self, other: &Self, normal_size: usize, unknown_size: usize) -> bool {
        if self.surface != other.surface {
            return false;
        }
        let n = if other.is_unknown() {
            unknown_size
        } else {
            normal_size
        };
        compare_leading_fields(&self.feature, &other.feature, n)
    }
}

/// カンマ区切りの素性文字列の先頭`n`個のフィールドが一致するかどうか。
///
/// `feat1`のフィールドが`n`個に満たない場合は、`feat1`全体が`feat2`の先頭の
/// フィールド列と一致すれば真を返します。
fn compare_leading_fields(feat1: &str, feat2: &str, n: usize) -> bool {
    let (b1, b2) = (feat1.as_bytes(), feat2.as_bytes());
    let mut commas = 0;
    let mut i = 0;
    while i < b1.len() && i < b2.len() && b1[i] == b2[i] {
        if b1[i] == b',' {
            commas += 1;
            if commas >= n {
                return true;
            }
        }
        i += 1;
    }
    i == b1.len() && (i == b2.len() || b2[i] == b',')
}

/// 2つのノードの間の遷移
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    /// 左側のノード
    pub lnode: NodeId,
    /// 右側のノード
    pub rnode: NodeId,
    /// 連接素性のID列
    pub fvector: Vec<usize>,
    /// 遷移のコスト（右ノードの単語コストを含む）
    pub cost: f64,
}

/// 対数領域での足し算 `ln(exp(x) + exp(y))`
///
/// `init`が真の場合は`y`をそのまま返します。
#[inline]
pub fn logsumexp(x: f64, y: f64, init: bool) -> f64 {
    const MINUS_LOG_EPSILON: f64 = 50.0;
    if init {
        return y;
    }
    let (vmin, vmax) = if x < y { (x, y) } else { (y, x) };
    if vmax > vmin + MINUS_LOG_EPSILON {
        vmax
    } else {
        vmax + ((vmin - vmax).exp() + 1.0).ln()
    }
}

/// 重みの和を整数のコストに変換します。
///
/// `-factor * weight`を`[-32767, 32767]`に丸めます。
#[inline]
pub fn to_cost(weight: f64, factor: i32) -> i32 {
    const MAX_COST: f64 = 32767.0;
    (-(factor as f64) * weight).clamp(-MAX_COST, MAX_COST) as i32
}

/// ノードとパスのアリーナ
#[derive(Debug, Clone)]
pub struct Lattice {
    nodes: Vec<Node>,
    paths: Vec<Path>,
    ends: Vec<Vec<NodeId>>,
    bos: NodeId,
    eos: NodeId,
    len_char: usize,
}

impl Lattice {
    /// 長さ`len_char`文字の文のためのラティスを作成します。
    ///
    /// 文頭ノードと文末ノードが作成されます。
    pub fn new(len_char: usize, bos_feature: &str) -> Self {
        let mut bos = Node::new(NodeKind::Bos, "", bos_feature);
        bos.begin = 0;
        bos.end = 0;
        let mut eos = Node::new(NodeKind::Eos, "", bos_feature);
        eos.begin = len_char;
        eos.end = len_char;

        let mut ends = vec![vec![]; len_char + 1];
        ends[0].push(0);
        Self {
            nodes: vec![bos, eos],
            paths: vec![],
            ends,
            bos: 0,
            eos: 1,
            len_char,
        }
    }

    /// 文の長さ（文字単位）
    pub fn len_char(&self) -> usize {
        self.len_char
    }

    /// 文頭ノード
    pub fn bos(&self) -> NodeId {
        self.bos
    }

    /// 文末ノード
    pub fn eos(&self) -> NodeId {
        self.eos
    }

    /// `[begin, end)`の範囲にノードを追加します。
    ///
    /// # エラー
    ///
    /// `begin >= end`の場合や、`end`が文の長さを超える場合にエラーを返します。
    pub fn add_node(&mut self, begin: usize, end: usize, mut node: Node) -> Result<NodeId> {
        if begin >= end || end > self.len_char {
            return Err(MazinError::invalid_argument(
                "end",
                format!(
                    "invalid node span [{begin}, {end}) for a lattice of {} chars",
                    self.len_char
                ),
            ));
        }
        node.begin = begin;
        node.end = end;
        let id = self.nodes.len();
        self.nodes.push(node);
        self.ends[end].push(id);
        Ok(id)
    }

    /// 隣接する2つのノードをパスで接続します。
    ///
    /// # エラー
    ///
    /// ノードが存在しない場合や、`lnode`の終了位置と`rnode`の開始位置が一致しない場合に
    /// エラーを返します。
    pub fn connect(&mut self, lnode: NodeId, rnode: NodeId) -> Result<PathId> {
        let (Some(l), Some(r)) = (self.nodes.get(lnode), self.nodes.get(rnode)) else {
            return Err(MazinError::invalid_argument(
                "node",
                format!("undefined node: {lnode} -> {rnode}"),
            ));
        };
        if l.end != r.begin {
            return Err(MazinError::invalid_argument(
                "node",
                format!("nodes are not adjacent: [.., {}) -> [{}, ..)", l.end, r.begin),
            ));
        }
        Ok(self.push_path(lnode, rnode))
    }

    fn push_path(&mut self, lnode: NodeId, rnode: NodeId) -> PathId {
        let id = self.paths.len();
        self.paths.push(Path {
            lnode,
            rnode,
            fvector: vec![],
            cost: 0.0,
        });
        self.nodes[lnode].rpaths.push(id);
        self.nodes[rnode].lpaths.push(id);
        id
    }

    /// 隣接するすべてのノードの組をパスで接続します。
    pub fn connect_all(&mut self) {
        for end in 0..=self.len_char {
            let lnodes = self.ends[end].clone();
            let rnodes: Vec<NodeId> = (0..self.nodes.len())
                .filter(|&i| i != self.bos && self.nodes[i].begin == end)
                .filter(|&i| i != self.eos || end == self.len_char)
                .collect();
            for &l in &lnodes {
                for &r in &rnodes {
                    self.push_path(l, r);
                }
            }
        }
    }

    /// ノード
    #[inline(always)]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// ノード
    #[inline(always)]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    /// パス
    #[inline(always)]
    pub fn path(&self, id: PathId) -> &Path {
        &self.paths[id]
    }

    /// パス
    #[inline(always)]
    pub fn path_mut(&mut self, id: PathId) -> &mut Path {
        &mut self.paths[id]
    }

    /// ノードの数
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// パスの数
    pub fn num_paths(&self) -> usize {
        self.paths.len()
    }

    /// パスの両端が正しく接続されていないかどうか。
    ///
    /// 右ノードが文末以外で右へ出るパスを持たない場合や、左ノードが文頭以外で
    /// 左から入るパスを持たない場合に真を返します。
    pub fn is_empty_path(&self, id: PathId) -> bool {
        let path = &self.paths[id];
        let (lnode, rnode) = (&self.nodes[path.lnode], &self.nodes[path.rnode]);
        (rnode.rpaths.is_empty() && !rnode.is_eos()) || (lnode.lpaths.is_empty() && !lnode.is_bos())
    }

    /// 前向きの累積値を計算します。左側のノードの値は計算済みである必要があります。
    pub fn calc_alpha(&mut self, id: NodeId) {
        let mut alpha = 0.0;
        for (i, &p) in self.nodes[id].lpaths.iter().enumerate() {
            let path = &self.paths[p];
            alpha = logsumexp(alpha, path.cost + self.nodes[path.lnode].alpha, i == 0);
        }
        self.nodes[id].alpha = alpha;
    }

    /// 後ろ向きの累積値を計算します。右側のノードの値は計算済みである必要があります。
    pub fn calc_beta(&mut self, id: NodeId) {
        let mut beta = 0.0;
        for (i, &p) in self.nodes[id].rpaths.iter().enumerate() {
            let path = &self.paths[p];
            beta = logsumexp(beta, path.cost + self.nodes[path.rnode].beta, i == 0);
        }
        self.nodes[id].beta = beta;
    }

    /// 前向き・後ろ向きの累積値をすべて計算し、分配関数の対数 Z を返します。
    ///
    /// 各ノードの周辺確率も更新されます。
    pub fn forward_backward(&mut self) -> f64 {
        for end in 0..=self.len_char {
            for i in 0..self.ends[end].len() {
                let id = self.ends[end][i];
                self.calc_alpha(id);
            }
        }
        self.calc_alpha(self.eos);

        self.calc_beta(self.eos);
        for end in (0..=self.len_char).rev() {
            for i in (0..self.ends[end].len()).rev() {
                let id = self.ends[end][i];
                self.calc_beta(id);
            }
        }

        let z = self.nodes[self.eos].alpha;
        for node in &mut self.nodes {
            node.prob = (node.alpha + node.beta - z).exp();
        }
        z
    }

    /// ノードに入るパスについて、素性の期待値を`expected`に加算します。
    ///
    /// 各パスの事後確率 `exp(alpha_l + cost + beta_r - Z)` を、パスの連接素性と
    /// 右ノードの単語素性（右ノードが文末でない場合）に加算します。
    /// `expected`の範囲外のIDは無視されます。
    pub fn calc_expectation(&self, id: NodeId, expected: &mut [f64], z: f64) {
        for &p in &self.nodes[id].lpaths {
            if self.is_empty_path(p) {
                continue;
            }
            let path = &self.paths[p];
            let (lnode, rnode) = (&self.nodes[path.lnode], &self.nodes[path.rnode]);
            let c = (lnode.alpha + path.cost + rnode.beta - z).exp();

            for &f in &path.fvector {
                if let Some(e) = expected.get_mut(f) {
                    *e += c;
                }
            }
            if !rnode.is_eos() {
                for &f in &rnode.fvector {
                    if let Some(e) = expected.get_mut(f) {
                        *e += c;
                    }
                }
            }
        }
    }

    /// すべてのノードについて期待値を計算します。
    ///
    /// [`forward_backward`](Self::forward_backward)の後に呼び出す必要があります。
    pub fn expectation(&self, expected: &mut [f64], z: f64) {
        for id in 0..self.nodes.len() {
            self.calc_expectation(id, expected, z);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_logsumexp() {
        assert_eq!(3.0, logsumexp(100.0, 3.0, true));
        let v = logsumexp(1.0f64.ln(), 2.0f64.ln(), false);
        assert!((v - 3.0f64.ln()).abs() < EPS);
        assert_eq!(100.0, logsumexp(100.0, 0.0, false));
    }

    #[test]
    fn test_to_cost() {
        assert_eq!(-400, to_cost(0.5, 800));
        assert_eq!(32767, to_cost(-100.0, 800));
        assert_eq!(-32767, to_cost(100.0, 800));
    }

    /// BOS -> a -> EOS
    fn linear_lattice() -> (Lattice, NodeId, PathId, PathId) {
        let mut lattice = Lattice::new(1, "BOS/EOS");
        let a = lattice.add_node(0, 1, Node::new(NodeKind::Normal, "a", "名詞")).unwrap();
        let p1 = lattice.connect(lattice.bos(), a).unwrap();
        let p2 = lattice.connect(a, lattice.eos()).unwrap();
        lattice.path_mut(p1).cost = 0.7;
        lattice.path_mut(p2).cost = -0.2;
        lattice.path_mut(p1).fvector = vec![0];
        lattice.path_mut(p2).fvector = vec![1];
        lattice.node_mut(a).fvector = vec![2];
        (lattice, a, p1, p2)
    }

    #[test]
    fn test_linear_lattice_consistency() {
        let (mut lattice, a, p1, p2) = linear_lattice();
        let z = lattice.forward_backward();

        let bos_beta = lattice.node(lattice.bos()).beta;
        assert!((z - bos_beta).abs() < EPS);
        assert!((z - 0.5).abs() < EPS);
        assert!((lattice.node(a).prob - 1.0).abs() < EPS);

        let mut expected = vec![0.0; 3];
        lattice.expectation(&mut expected, z);

        for (p, f) in [(p1, 0), (p2, 1)] {
            let path = lattice.path(p);
            let posterior = (lattice.node(path.lnode).alpha + path.cost
                + lattice.node(path.rnode).beta
                - z)
                .exp();
            assert!((expected[f] - posterior).abs() < EPS);
        }
        // counted once for the single path entering `a`
        assert!((expected[2] - 1.0).abs() < EPS);
    }

    #[test]
    fn test_branching_lattice() {
        // BOS -> {x, y} -> EOS
        let mut lattice = Lattice::new(1, "BOS/EOS");
        let x = lattice.add_node(0, 1, Node::new(NodeKind::Normal, "x", "名詞")).unwrap();
        let y = lattice.add_node(0, 1, Node::new(NodeKind::Unknown, "x", "名詞")).unwrap();
        lattice.connect_all();
        assert_eq!(4, lattice.num_paths());

        let costs = [(x, 1.0), (y, 2.0)];
        for p in 0..lattice.num_paths() {
            let rnode = lattice.path(p).rnode;
            if let Some(&(_, c)) = costs.iter().find(|&&(n, _)| n == rnode) {
                lattice.path_mut(p).cost = c;
            }
            lattice.path_mut(p).fvector = vec![p];
        }

        let z = lattice.forward_backward();
        let expected_z = (1.0f64.exp() + 2.0f64.exp()).ln();
        assert!((z - expected_z).abs() < EPS);
        assert!((lattice.node(lattice.bos()).beta - z).abs() < EPS);
        assert!((lattice.node(x).prob + lattice.node(y).prob - 1.0).abs() < EPS);

        let mut expected = vec![0.0; 4];
        lattice.expectation(&mut expected, z);
        let total: f64 = expected.iter().sum();
        assert!((total - 2.0).abs() < EPS);
    }

    #[test]
    fn test_empty_path() {
        let mut lattice = Lattice::new(2, "BOS/EOS");
        let a = lattice.add_node(0, 1, Node::new(NodeKind::Normal, "a", "名詞")).unwrap();
        let p = lattice.connect(lattice.bos(), a).unwrap();
        // `a` has no outgoing path
        assert!(lattice.is_empty_path(p));

        let b = lattice.add_node(1, 2, Node::new(NodeKind::Normal, "b", "名詞")).unwrap();
        lattice.connect(a, b).unwrap();
        lattice.connect(b, lattice.eos()).unwrap();
        assert!(!lattice.is_empty_path(p));
    }

    #[test]
    fn test_invalid_node_span() {
        let mut lattice = Lattice::new(2, "BOS/EOS");
        for (begin, end) in [(0, 3), (1, 1), (2, 1)] {
            assert!(matches!(
                lattice.add_node(begin, end, Node::new(NodeKind::Normal, "a", "名詞")),
                Err(MazinError::InvalidArgument(_))
            ));
        }
        assert_eq!(2, lattice.num_nodes());
    }

    #[test]
    fn test_connect_not_adjacent() {
        let mut lattice = Lattice::new(2, "BOS/EOS");
        let a = lattice.add_node(0, 1, Node::new(NodeKind::Normal, "a", "名詞")).unwrap();
        assert!(lattice.connect(a, lattice.eos()).is_err());
        assert!(lattice.connect(a, 100).is_err());
        assert_eq!(0, lattice.num_paths());
    }

    #[test]
    fn test_same_candidate() {
        let known = Node::new(NodeKind::Normal, "東京", "名詞,固有名詞,地域,一般,*,*,東京");
        let same = Node::new(NodeKind::Normal, "東京", "名詞,固有名詞,地域,一般,X,Y");
        let diff = Node::new(NodeKind::Normal, "東京", "名詞,固有名詞,人名,一般");
        let unknown = Node::new(NodeKind::Unknown, "東京", "名詞,固有名詞,組織");
        let other_surface = Node::new(NodeKind::Normal, "大阪", "名詞,固有名詞,地域,一般");

        assert!(known.is_same_candidate(&same, 4, 2));
        assert!(!known.is_same_candidate(&diff, 4, 2));
        assert!(known.is_same_candidate(&unknown, 4, 2));
        assert!(!known.is_same_candidate(&other_surface, 4, 2));
    }

    #[test]
    fn test_compare_leading_fields_short() {
        assert!(compare_leading_fields("名詞,一般", "名詞,一般,*", 4));
        assert!(compare_leading_fields("名詞,一般", "名詞,一般", 4));
        assert!(!compare_leading_fields("名詞,一般", "名詞,一般的", 4));
    }
}
