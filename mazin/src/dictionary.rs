//! 辞書のバイナリ形式と検索
//!
//! コンパイル済みの辞書は、ヘッダー、見出し語のトライ、トークンの配列、素性文字列の
//! バッファから構成されます。トライの値は、同じ表層形を持つトークンの連続区間を
//! `(先頭のトークン番号 << 8) | トークン数`として表します。
mod compiler;
mod cost;
mod trie;

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use rkyv::{Archive, Deserialize, Serialize};

use crate::archive;
use crate::errors::{MazinError, Result};

pub use crate::dictionary::compiler::DictionaryCompiler;
pub use crate::dictionary::cost::CostCalculator;
pub use crate::dictionary::trie::{HomographRun, TrieMatch, MAX_HOMOGRAPHS};

use crate::dictionary::trie::TrieIndex;

/// バイナリ形式の辞書のマジックバイト
pub const DICTIONARY_MAGIC: &[u8] = b"MazinDictionary 0.3\n";

/// 辞書の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
#[repr(u8)]
pub enum DictionaryKind {
    /// システム辞書
    System = 1,
    /// ユーザー辞書
    User = 2,
    /// 未知語辞書
    Unknown = 3,
}

impl DictionaryKind {
    /// 数値から辞書の種類を返します。
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::System),
            2 => Some(Self::User),
            3 => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// 辞書のヘッダー
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct DictionaryInfo {
    /// 辞書ソースの名前
    pub filename: String,
    /// トークンの数
    pub size: u32,
    /// 辞書の種類
    pub kind: DictionaryKind,
    /// 左文脈IDの数
    pub lsize: u32,
    /// 右文脈IDの数
    pub rsize: u32,
    /// フォーマットのバージョン
    pub version: u32,
}

/// 辞書のトークン
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct Token {
    /// 左文脈ID
    pub left_id: i16,
    /// 右文脈ID
    pub right_id: i16,
    /// 単語コスト
    pub cost: i32,
    /// 素性バッファ内の開始位置（バイト）
    pub feature_offset: u32,
    /// 素性の長さ（バイト）
    pub feature_len: u32,
}

#[derive(Archive, Serialize, Deserialize)]
struct DictionaryData {
    info: DictionaryInfo,
    trie: Vec<u8>,
    tokens: Vec<Token>,
    features: String,
}

/// コンパイル済みの辞書
pub struct Dictionary {
    info: DictionaryInfo,
    trie: TrieIndex,
    tokens: Vec<Token>,
    features: String,
}

impl Dictionary {
    pub(crate) fn new(
        info: DictionaryInfo,
        trie: TrieIndex,
        tokens: Vec<Token>,
        features: String,
    ) -> Self {
        Self {
            info,
            trie,
            tokens,
            features,
        }
    }

    /// バイナリ形式で書き出します。
    pub fn write<W>(&self, wtr: W) -> Result<()>
    where
        W: Write,
    {
        let data = DictionaryData {
            info: self.info.clone(),
            trie: self.trie.serialize_to_vec(),
            tokens: self.tokens.clone(),
            features: self.features.clone(),
        };
        archive::write_archive(DICTIONARY_MAGIC, &data, wtr)
    }

    /// バイナリ形式の辞書を読み込みます。
    ///
    /// # エラー
    ///
    /// マジックバイトが一致しない場合や、トークンが素性バッファの範囲外を
    /// 参照している場合にエラーを返します。
    pub fn read<R>(rdr: R) -> Result<Self>
    where
        R: Read,
    {
        let data: DictionaryData = archive::read_archive(DICTIONARY_MAGIC, "dictionary", rdr)?;
        let trie = TrieIndex::deserialize_from_slice(&data.trie)?;
        if data.tokens.len() != usize::try_from(data.info.size)? {
            return Err(MazinError::invalid_format(
                "dictionary",
                "the number of tokens mismatches the header",
            ));
        }
        for token in &data.tokens {
            let end = u64::from(token.feature_offset) + u64::from(token.feature_len);
            if end > data.features.len() as u64 {
                return Err(MazinError::invalid_format(
                    "dictionary",
                    "a token refers out of the feature buffer",
                ));
            }
        }
        Ok(Self::new(data.info, trie, data.tokens, data.features))
    }

    /// バイナリファイルから読み込みます。
    pub fn from_path<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        Self::read(File::open(path)?)
    }

    /// ヘッダー
    pub fn info(&self) -> &DictionaryInfo {
        &self.info
    }

    /// 表層形順に並んだすべてのトークン
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    fn run(&self, value: u32) -> &[Token] {
        let run = HomographRun::from_value(value);
        self.tokens.get(run.range()).unwrap_or(&[])
    }

    /// 表層形が完全に一致するトークンを返します。
    pub fn exact_match(&self, surface: &str) -> &[Token] {
        self.trie
            .exact_match(surface)
            .map(|value| self.run(value))
            .unwrap_or_default()
    }

    /// `input`の接頭辞に一致する見出し語を短い順に列挙します。
    ///
    /// 各要素は、一致した見出し語の終了位置（文字単位）とトークンの組です。
    pub fn common_prefix_search<'a>(
        &'a self,
        input: &'a [char],
    ) -> impl Iterator<Item = (usize, &'a [Token])> + 'a {
        self.trie
            .common_prefix_search(input)
            .map(move |m| (m.end_char, self.run(m.value)))
    }

    /// トークンの素性文字列を返します。
    #[inline(always)]
    pub fn feature(&self, token: &Token) -> &str {
        let start = token.feature_offset as usize;
        let end = start + token.feature_len as usize;
        self.features.get(start..end).unwrap_or("")
    }
}
