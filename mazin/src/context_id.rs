//! 文脈IDの割り当て
//!
//! 左文脈・右文脈を表す文字列（文脈キー）に、連接コスト表の添字となる小さな整数IDを
//! 割り当てます。左右の表は互いに独立しています。
//!
//! IDは次の手順で確定します。
//!
//! 1. 辞書を走査しながら、現れた文脈キーを[`ContextIds::add`]で集める
//! 2. [`ContextIds::build`]で、すべてのキーに辞書順に1から番号を振り直す
//! 3. BOS/EOSのキーのIDを0で上書きする

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read, Write};

use crate::common::BOS_KEY;
use crate::errors::{MazinError, Result};
use crate::rewriter::DictionaryRewriter;
use crate::utils::{location, split_csv_row};

/// 辞書ソースの1行のフィールド数（表層形, 左文脈ID, 右文脈ID, コスト, 素性）
const NUM_SOURCE_FIELDS: usize = 5;

/// 片側の文脈IDの表
#[derive(Debug, Default, Clone)]
pub struct ContextIds {
    ids: BTreeMap<String, usize>,
    frozen: bool,
}

impl ContextIds {
    /// 空の表を作成します。
    pub fn new() -> Self {
        Self::default()
    }

    /// 文脈キーを追加します。
    ///
    /// 既に追加されているキーには新しいIDを割り当てません。
    ///
    /// # エラー
    ///
    /// [`build`](Self::build)の後に呼び出した場合にエラーを返します。
    pub fn add<S>(&mut self, key: S) -> Result<()>
    where
        S: AsRef<str>,
    {
        if self.frozen {
            return Err(MazinError::invalid_state(
                "cannot add a context to a frozen table",
                key.as_ref(),
            ));
        }
        let key = key.as_ref();
        if !self.ids.contains_key(key) {
            let id = self.ids.len();
            self.ids.insert(key.to_string(), id);
        }
        Ok(())
    }

    /// IDを確定します。
    ///
    /// すべてのキーに辞書順に1から番号を振った後、`bos_key`のIDを0で上書きします。
    /// `bos_key`も番号を1つ消費するため、それより後ろのキーのIDは1つずれます。
    /// `bos_key`が追加されていない場合でも、表に加えられます。
    ///
    /// # エラー
    ///
    /// 二度目以降の呼び出しではエラーを返します。
    pub fn build(&mut self, bos_key: &str) -> Result<()> {
        if self.frozen {
            return Err(MazinError::invalid_state(
                "context ids are already built",
                bos_key,
            ));
        }
        for (id, value) in self.ids.values_mut().enumerate() {
            *value = id + 1;
        }
        self.ids.insert(bos_key.to_string(), 0);
        self.frozen = true;
        Ok(())
    }

    /// IDが確定しているかどうか。
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// 文脈キーに対応するIDを返します。
    pub fn get(&self, key: &str) -> Option<usize> {
        self.ids.get(key).copied()
    }

    /// IDに対応する文脈キーを返します。
    pub fn key(&self, id: usize) -> Option<&str> {
        self.ids
            .iter()
            .find(|&(_, &v)| v == id)
            .map(|(k, _)| k.as_str())
    }

    /// IDの範囲の大きさ（最大のID + 1）
    ///
    /// BOS/EOSのキーが番号を消費した場合、キーの数より大きくなります。
    pub fn size(&self) -> usize {
        self.ids.values().max().map_or(0, |&id| id + 1)
    }

    /// 登録されているキーの数
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// 表が空かどうか。
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// ID順に`ID キー`の行を書き出します。
    pub fn save<W>(&self, mut wtr: W) -> Result<()>
    where
        W: Write,
    {
        let mut pairs: Vec<_> = self.ids.iter().map(|(k, &v)| (v, k)).collect();
        pairs.sort();
        for (id, key) in pairs {
            writeln!(wtr, "{id} {key}")?;
        }
        Ok(())
    }

    /// `ID キー`の行からなる表を読み込みます。
    ///
    /// 読み込んだ表のIDは確定済みとして扱われます。
    ///
    /// # エラー
    ///
    /// 2つのトークンからならない行や、IDが整数でない行がある場合にエラーを返します。
    pub fn open<R>(rdr: R, name: &str) -> Result<Self>
    where
        R: Read,
    {
        let mut ids = BTreeMap::new();
        for (i, line) in BufReader::new(rdr).lines().enumerate() {
            let line = line?;
            let items: Vec<&str> = line.split_whitespace().collect();
            if items.len() != 2 {
                return Err(MazinError::invalid_format(
                    location(name, i),
                    format!("format error: {line}"),
                ));
            }
            let id = items[0].parse::<usize>().map_err(|_| {
                MazinError::invalid_format(
                    location(name, i),
                    format!("id must be a non-negative integer: {}", items[0]),
                )
            })?;
            ids.insert(items[1].to_string(), id);
        }
        Ok(Self { ids, frozen: true })
    }
}

/// 左右の文脈IDの表
#[derive(Debug, Default, Clone)]
pub struct ContextIdTable {
    left: ContextIds,
    right: ContextIds,
}

impl ContextIdTable {
    /// 空の表を作成します。
    pub fn new() -> Self {
        Self::default()
    }

    /// 左右の文脈キーを追加します。
    pub fn add<L, R>(&mut self, lfeature: L, rfeature: R) -> Result<()>
    where
        L: AsRef<str>,
        R: AsRef<str>,
    {
        self.left.add(lfeature)?;
        self.right.add(rfeature)
    }

    /// 辞書ソースの各行の素性を`rewriter`で書き換え、左右の文脈キーを追加します。
    ///
    /// 空行と`#`で始まる行は読み飛ばします。キーを追加した行の数を返します。
    ///
    /// # エラー
    ///
    /// フィールド数が5に満たない行や、素性を書き換えられない行がある場合にエラーを返します。
    pub fn add_source<S>(
        &mut self,
        lines: &[S],
        name: &str,
        rewriter: &mut DictionaryRewriter,
    ) -> Result<usize>
    where
        S: AsRef<str>,
    {
        let mut count = 0;
        for (i, line) in lines.iter().enumerate() {
            let line = line.as_ref().trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let items = split_csv_row(line, NUM_SOURCE_FIELDS);
            let Some(feature) = items.get(NUM_SOURCE_FIELDS - 1) else {
                return Err(MazinError::invalid_format(
                    location(name, i),
                    format!("format error: {line}"),
                ));
            };
            let rewritten = rewriter.rewrite_cached(feature)?.ok_or_else(|| {
                MazinError::invalid_format(
                    location(name, i),
                    format!("cannot rewrite pattern: {feature}"),
                )
            })?;
            self.add(&rewritten.lfeature, &rewritten.rfeature)?;
            count += 1;
        }
        Ok(count)
    }

    /// 左右のIDを確定します。BOS/EOSのキーにはID 0が割り当てられます。
    pub fn build(&mut self) -> Result<()> {
        self.left.build(BOS_KEY)?;
        self.right.build(BOS_KEY)
    }

    /// `left-id.def`と`right-id.def`を読み込みます。
    pub fn open<L, R>(left_rdr: L, right_rdr: R) -> Result<Self>
    where
        L: Read,
        R: Read,
    {
        Ok(Self {
            left: ContextIds::open(left_rdr, crate::common::LEFT_ID_FILE)?,
            right: ContextIds::open(right_rdr, crate::common::RIGHT_ID_FILE)?,
        })
    }

    /// `left-id.def`と`right-id.def`の形式で書き出します。
    pub fn save<L, R>(&self, left_wtr: L, right_wtr: R) -> Result<()>
    where
        L: Write,
        R: Write,
    {
        self.left.save(left_wtr)?;
        self.right.save(right_wtr)
    }

    /// 左文脈キーのIDを返します。
    ///
    /// # エラー
    ///
    /// キーが未定義の場合にエラーを返します。
    pub fn lid(&self, key: &str) -> Result<usize> {
        self.left.get(key).ok_or_else(|| {
            MazinError::invalid_argument("key", format!("cannot find LEFT-ID for {key}"))
        })
    }

    /// 右文脈キーのIDを返します。
    ///
    /// # エラー
    ///
    /// キーが未定義の場合にエラーを返します。
    pub fn rid(&self, key: &str) -> Result<usize> {
        self.right.get(key).ok_or_else(|| {
            MazinError::invalid_argument("key", format!("cannot find RIGHT-ID for {key}"))
        })
    }

    /// 左文脈IDの数
    pub fn left_size(&self) -> usize {
        self.left.size()
    }

    /// 右文脈IDの数
    pub fn right_size(&self) -> usize {
        self.right.size()
    }

    /// 左右のIDが表の範囲内にあるかどうか。
    pub fn is_valid(&self, lid: usize, rid: usize) -> bool {
        lid < self.left_size() && rid < self.right_size()
    }

    /// 左側の表
    pub fn left(&self) -> &ContextIds {
        &self.left
    }

    /// 右側の表
    pub fn right(&self) -> &ContextIds {
        &self.right
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_lexicographic() {
        let mut ids = ContextIds::new();
        for key in ["x", "b", "a", "b"] {
            ids.add(key).unwrap();
        }
        ids.build("BOS").unwrap();

        assert_eq!(Some(0), ids.get("BOS"));
        assert_eq!(Some(1), ids.get("a"));
        assert_eq!(Some(2), ids.get("b"));
        assert_eq!(Some(3), ids.get("x"));
        assert_eq!(4, ids.len());
        assert_eq!(4, ids.size());
    }

    #[test]
    fn test_build_bos_in_middle() {
        let mut table = ContextIdTable::new();
        for (l, r) in [("A,記号", "A,記号"), ("BOS/EOS", "BOS/EOS"), ("名詞,一般", "名詞,一般")] {
            table.add(l, r).unwrap();
        }
        table.build().unwrap();

        assert_eq!(1, table.lid("A,記号").unwrap());
        assert_eq!(0, table.lid("BOS/EOS").unwrap());
        assert_eq!(3, table.rid("名詞,一般").unwrap());
        assert_eq!(4, table.left_size());
        assert!(table.is_valid(3, 3));

        let mut left = vec![];
        let mut right = vec![];
        table.save(&mut left, &mut right).unwrap();
        assert_eq!(
            "0 BOS/EOS\n1 A,記号\n3 名詞,一般\n",
            String::from_utf8(right).unwrap()
        );
    }

    #[test]
    fn test_build_with_bos_present() {
        let mut ids = ContextIds::new();
        for key in ["名詞,一般", "BOS/EOS", "助詞,格助詞"] {
            ids.add(key).unwrap();
        }
        ids.build(BOS_KEY).unwrap();

        assert_eq!(Some(0), ids.get("BOS/EOS"));
        assert_eq!(Some(2), ids.get("助詞,格助詞"));
        assert_eq!(Some(3), ids.get("名詞,一般"));
        assert_eq!(None, ids.key(1));
        assert_eq!(Some("名詞,一般"), ids.key(3));
        assert_eq!(3, ids.len());
        assert_eq!(4, ids.size());
    }

    #[test]
    fn test_build_twice() {
        let mut ids = ContextIds::new();
        ids.add("a").unwrap();
        ids.build(BOS_KEY).unwrap();
        assert!(ids.build(BOS_KEY).is_err());
        assert!(ids.add("b").is_err());
    }

    #[test]
    fn test_save_open() {
        let mut table = ContextIdTable::new();
        table.add("名詞,一般,*", "名詞,一般,*").unwrap();
        table.add("助詞,格助詞,一般", "助詞,係助詞,*").unwrap();
        table.build().unwrap();

        let mut left = vec![];
        let mut right = vec![];
        table.save(&mut left, &mut right).unwrap();
        assert_eq!(
            "0 BOS/EOS\n1 助詞,格助詞,一般\n2 名詞,一般,*\n",
            String::from_utf8(left.clone()).unwrap()
        );

        let opened = ContextIdTable::open(left.as_slice(), right.as_slice()).unwrap();
        assert_eq!(2, opened.lid("名詞,一般,*").unwrap());
        assert_eq!(1, opened.rid("助詞,係助詞,*").unwrap());
        assert!(opened.is_valid(2, 2));
        assert!(!opened.is_valid(3, 0));
    }

    #[test]
    fn test_find_undefined() {
        let table = ContextIdTable::open("0 BOS/EOS\n".as_bytes(), "0 BOS/EOS\n".as_bytes()).unwrap();
        assert!(table.lid("名詞,一般,*").is_err());
        assert!(table.rid("名詞,一般,*").is_err());
    }

    #[test]
    fn test_open_invalid_line() {
        let result = ContextIds::open("0 BOS/EOS\n1\n".as_bytes(), "left-id.def");
        assert!(matches!(result, Err(MazinError::InvalidFormat(_))));
    }

    #[test]
    fn test_add_source() {
        let def = "[unigram rewrite]\n*  $1\n[left rewrite]\n*,*  $1,$2\n[right rewrite]\n*  $1\n";
        let mut rewriter = DictionaryRewriter::from_reader(def.as_bytes()).unwrap();
        let source = "# comment\n東京,-1,-1,100,名詞,固有名詞\n\nが,-1,-1,50,助詞,格助詞\n";
        let lines: Vec<&str> = source.lines().collect();

        let mut table = ContextIdTable::new();
        assert_eq!(2, table.add_source(&lines, "lex.csv", &mut rewriter).unwrap());
        table.build().unwrap();

        assert_eq!(1, table.lid("助詞,格助詞").unwrap());
        assert_eq!(2, table.lid("名詞,固有名詞").unwrap());
        assert_eq!(1, table.rid("助詞").unwrap());
        assert_eq!(2, table.rid("名詞").unwrap());
    }

    #[test]
    fn test_add_source_errors() {
        let def = "[unigram rewrite]\n*  $1\n[left rewrite]\n*  $1\n[right rewrite]\n名詞  $1\n";
        let mut rewriter = DictionaryRewriter::from_reader(def.as_bytes()).unwrap();
        let mut table = ContextIdTable::new();

        let err = table
            .add_source(&["東京,1,1"], "lex.csv", &mut rewriter)
            .unwrap_err();
        assert!(err.to_string().contains("lex.csv:1"), "{err}");

        let err = table
            .add_source(&["東京,1,1,100,名詞", "が,1,1,50,助詞"], "lex.csv", &mut rewriter)
            .unwrap_err();
        assert!(err.to_string().contains("lex.csv:2"), "{err}");
    }
}
