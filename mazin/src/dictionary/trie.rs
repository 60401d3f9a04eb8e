//! 見出し語のトライ
//!
//! ソート済みの見出し語から同じ表層形の連続区間をまとめ、ダブル配列トライで
//! 索引付けします。

use std::ops::Range;

use crate::errors::{MazinError, Result, TrieBuildError};

/// 1つの見出し語にまとめられるトークン数の上限
pub const MAX_HOMOGRAPHS: usize = 0xff;

/// トライの値に格納できる先頭位置の上限
const MAX_START: usize = 1 << 23;

/// 同じ表層形を持つトークンの連続区間
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HomographRun {
    /// 先頭のトークン番号
    pub start: usize,
    /// トークンの数
    pub len: usize,
}

impl HomographRun {
    /// トライの値に変換します。
    #[inline(always)]
    pub fn to_value(self) -> u32 {
        ((self.start << 8) | (self.len & MAX_HOMOGRAPHS)) as u32
    }

    /// トライの値から区間を復元します。
    #[inline(always)]
    pub fn from_value(value: u32) -> Self {
        let value = value as usize;
        Self {
            start: value >> 8,
            len: value & MAX_HOMOGRAPHS,
        }
    }

    /// トークン配列の範囲
    #[inline(always)]
    pub fn range(self) -> Range<usize> {
        self.start..self.start + self.len
    }
}

/// トライマッチング結果
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct TrieMatch {
    /// 格納されている値
    pub value: u32,
    /// 一致した接頭辞の終了位置（文字単位）
    pub end_char: usize,
}

impl TrieMatch {
    /// 新しいマッチング結果を作成します。
    #[inline(always)]
    pub const fn new(value: u32, end_char: usize) -> Self {
        Self { value, end_char }
    }
}

/// ソート済みの見出し語を、重複をまとめたレコードに変換します。
///
/// # エラー
///
/// - 見出し語が空の場合は[`TrieBuildError::NoEntries`]
/// - 見出し語が昇順でない場合は[`TrieBuildError::NotSorted`]
/// - 同じ表層形のトークンが[`MAX_HOMOGRAPHS`]を超える場合は
///   [`MazinError::TooManyHomographs`]
pub(crate) fn group_homographs<S>(keys: &[S]) -> Result<Vec<(&str, u32)>>
where
    S: AsRef<str>,
{
    if keys.is_empty() {
        return Err(TrieBuildError::NoEntries.into());
    }
    let mut records = vec![];
    let mut start = 0;
    for i in 1..=keys.len() {
        if i < keys.len() {
            let (prev, next) = (keys[i - 1].as_ref(), keys[i].as_ref());
            if prev > next {
                return Err(TrieBuildError::NotSorted { index: i }.into());
            }
            if prev == next {
                continue;
            }
        }
        let len = i - start;
        if len > MAX_HOMOGRAPHS {
            return Err(MazinError::TooManyHomographs {
                surface: keys[start].as_ref().to_string(),
                count: len,
                max: MAX_HOMOGRAPHS,
            });
        }
        if start >= MAX_START {
            return Err(MazinError::invalid_argument(
                "keys",
                format!("too many tokens: the token index {start} exceeds {MAX_START}"),
            ));
        }
        records.push((keys[start].as_ref(), HomographRun { start, len }.to_value()));
        start = i;
    }
    Ok(records)
}

/// 見出し語のダブル配列トライ
pub(crate) struct TrieIndex {
    da: crawdad::Trie,
}

impl TrieIndex {
    /// レコードからトライを構築します。
    ///
    /// # エラー
    ///
    /// レコードが空、昇順でない、またはキーが重複している場合に、それぞれ対応する
    /// [`TrieBuildError`]を返します。
    pub fn from_records(records: &[(&str, u32)]) -> Result<Self> {
        if records.is_empty() {
            return Err(TrieBuildError::NoEntries.into());
        }
        for (i, w) in records.windows(2).enumerate() {
            if w[0].0 > w[1].0 {
                return Err(TrieBuildError::NotSorted { index: i + 1 }.into());
            }
            if w[0].0 == w[1].0 {
                return Err(TrieBuildError::DuplicateEntry { index: i + 1 }.into());
            }
        }
        let da = crawdad::Trie::from_records(records.iter().copied())
            .map_err(|e| MazinError::invalid_argument("records", e.to_string()))?;
        Ok(Self { da })
    }

    pub fn serialize_to_vec(&self) -> Vec<u8> {
        self.da.serialize_to_vec()
    }

    pub fn deserialize_from_slice(bytes: &[u8]) -> Result<Self> {
        let (da, rest) = crawdad::Trie::deserialize_from_slice(bytes);
        if !rest.is_empty() {
            return Err(MazinError::invalid_format(
                "dictionary",
                "trailing bytes after the trie",
            ));
        }
        Ok(Self { da })
    }

    #[inline(always)]
    pub fn exact_match(&self, key: &str) -> Option<u32> {
        self.da.exact_match(key.chars())
    }

    #[inline(always)]
    pub fn common_prefix_search<'a>(
        &'a self,
        input: &'a [char],
    ) -> impl Iterator<Item = TrieMatch> + 'a {
        self.da
            .common_prefix_search(input.iter().copied())
            .map(move |(value, end_char)| TrieMatch::new(value, end_char))
    }
}
