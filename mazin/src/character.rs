//! 文字カテゴリー定義
//!
//! このモジュールは、`char.def`で定義される文字カテゴリーを、UTF-16の各コード単位に
//! 対応する32ビットの属性値の表へコンパイルします。
//!
//! # `char.def`の書式
//!
//! ```text
//! # カテゴリーの定義: NAME INVOKE GROUP LENGTH
//! DEFAULT 0 1 0
//! SPACE   0 1 0
//! KANJI   0 0 2
//!
//! # コード範囲へのカテゴリーの割り当て: 0xLOW[..0xHIGH] NAME [NAME...]
//! 0x0020 SPACE
//! 0x4E00..0x9FA5 KANJI
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::LazyLock;

use hashbrown::HashSet;
use regex::Regex;
use rkyv::{Archive, Deserialize, Serialize};

use crate::archive::{self, persist_atomically};
use crate::common::{CHAR_PROPERTY_DEF_DEFAULT, CHAR_PROPERTY_DEF_FILE, UNK_DEF_DEFAULT, UNK_DEF_FILE};
use crate::diagnostics::DiagnosticSink;
use crate::errors::{MazinError, Result};
use crate::utils::{self, location};

const CATEGORY_SHIFT: u32 = 14;
const CATEGORY_BITS: u32 = 18;
const CATEGORY_MASK: u32 = (1 << CATEGORY_BITS) - 1;
const CATEGORY_PMASK: u32 = CATEGORY_MASK << CATEGORY_SHIFT;
const PRIMARY_SHIFT: u32 = 6;
const PRIMARY_MASK: u32 = 0xff;
const LENGTH_SHIFT: u32 = 2;
const LENGTH_MASK: u32 = 0xf;
const GROUP_BIT: u32 = 1 << 1;
const INVOKE_BIT: u32 = 1;

/// 定義できるカテゴリー数の上限（この値未満）
pub const MAX_CATEGORIES: usize = 18;

/// 文字表の大きさ（0x0000から0xFFFFまでと番兵）
pub const TABLE_SIZE: usize = 0x10001;

const GUARD_INDEX: usize = TABLE_SIZE - 1;

/// 文字カテゴリー表のバイナリを識別するマジックバイト
pub const CHAR_MAGIC: &[u8] = b"MazinCharCategory 0.3\n";

static HEX_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x([0-9A-Fa-f]+)(?:\.\.0x([0-9A-Fa-f]+))?$").unwrap());

/// 文字の属性を32ビットにパックした値
///
/// # メモリレイアウト
///
/// ```text
/// bits 14-31: カテゴリー集合（カテゴリーIDごとに1ビット、18ビット）
/// bits  6-13: 主カテゴリーID（8ビット）
/// bits  2- 5: 未知語の最大長（4ビット）
/// bit      1: 同じ種類の文字をまとめるかどうか
/// bit      0: 未知語処理を常に起動するかどうか
/// ```
///
/// 主カテゴリーのビットは、常にカテゴリー集合に含まれます。
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
pub struct CharInfo(u32);

impl fmt::Debug for CharInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CharInfo")
            .field("category_set", &format_args!("{:#x}", self.category_set()))
            .field("primary", &self.primary())
            .field("length", &self.length())
            .field("group", &self.group())
            .field("invoke", &self.invoke())
            .finish()
    }
}

impl CharInfo {
    /// 各フィールドから新しい値を作成します。
    ///
    /// # エラー
    ///
    /// いずれかのフィールドが割り当てられたビット幅に収まらない場合にエラーを返します。
    pub fn new(
        category_set: u32,
        invoke: bool,
        group: bool,
        length: u32,
        primary: u32,
    ) -> Result<Self> {
        if category_set > CATEGORY_MASK {
            return Err(MazinError::invalid_argument(
                "category_set",
                "must be represented in 18 bits",
            ));
        }
        if primary > PRIMARY_MASK {
            return Err(MazinError::invalid_argument(
                "primary",
                "must be represented in 8 bits",
            ));
        }
        if length > LENGTH_MASK {
            return Err(MazinError::invalid_argument(
                "length",
                "must be represented in 4 bits",
            ));
        }
        Ok(Self::pack(category_set, invoke, group, length, primary))
    }

    const fn pack(category_set: u32, invoke: bool, group: bool, length: u32, primary: u32) -> Self {
        let mut v = ((category_set << CATEGORY_SHIFT) & CATEGORY_PMASK)
            | ((primary & PRIMARY_MASK) << PRIMARY_SHIFT)
            | ((length & LENGTH_MASK) << LENGTH_SHIFT);
        if group {
            v |= GROUP_BIT;
        }
        if invoke {
            v |= INVOKE_BIT;
        }
        Self(v)
    }

    /// パック済みの生の値から作成します。
    #[inline(always)]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// パック済みの生の値を返します。
    #[inline(always)]
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// カテゴリーIDに対応するカテゴリー集合のビットを返します。
    #[inline(always)]
    pub const fn category_bit(id: u32) -> u32 {
        match 1u32.checked_shl(id) {
            Some(bit) => bit & CATEGORY_MASK,
            None => 0,
        }
    }

    /// カテゴリー集合を取得します。
    #[inline(always)]
    pub const fn category_set(&self) -> u32 {
        (self.0 & CATEGORY_PMASK) >> CATEGORY_SHIFT
    }

    /// 主カテゴリーIDを取得します。
    #[inline(always)]
    pub const fn primary(&self) -> u32 {
        (self.0 >> PRIMARY_SHIFT) & PRIMARY_MASK
    }

    /// 主カテゴリーのビットを取得します。
    #[inline(always)]
    pub const fn primary_bit(&self) -> u32 {
        Self::category_bit(self.primary())
    }

    /// 未知語の最大長を取得します。
    #[inline(always)]
    pub const fn length(&self) -> u32 {
        (self.0 >> LENGTH_SHIFT) & LENGTH_MASK
    }

    /// 同じ種類の文字をまとめるかどうか。
    #[inline(always)]
    pub const fn group(&self) -> bool {
        self.0 & GROUP_BIT != 0
    }

    /// 未知語処理を常に起動するかどうか。
    #[inline(always)]
    pub const fn invoke(&self) -> bool {
        self.0 & INVOKE_BIT != 0
    }

    /// カテゴリー集合に`set`を加えた値を返します。
    #[inline(always)]
    pub const fn add_categories(self, set: u32) -> Self {
        Self(self.0 | ((set << CATEGORY_SHIFT) & CATEGORY_PMASK))
    }

    /// カテゴリー集合を`set`で置き換えた値を返します。
    #[inline(always)]
    pub const fn with_categories(self, set: u32) -> Self {
        Self((self.0 & !CATEGORY_PMASK) | ((set << CATEGORY_SHIFT) & CATEGORY_PMASK))
    }

    /// カテゴリー集合を主カテゴリーだけにした値を返します。
    #[inline(always)]
    pub const fn primarized(self) -> Self {
        self.with_categories(self.primary_bit())
    }

    /// 2つの値が共通のカテゴリーを持つかどうか。
    #[inline(always)]
    pub const fn is_same_kind(self, other: Self) -> bool {
        self.0 & other.0 & CATEGORY_PMASK != 0
    }
}

struct CharRange {
    low: usize,
    high: usize,
    categories: Vec<String>,
}

/// 文字カテゴリー表
///
/// カテゴリー名から属性値へのマップ、主カテゴリーIDで引くカテゴリー名の配列、
/// 各コード単位の属性値の表から構成されます。
#[derive(Debug, Archive, Serialize, Deserialize)]
pub struct CategoryTable {
    category_map: BTreeMap<String, CharInfo>,
    names: Vec<String>,
    table: Vec<CharInfo>,
}

impl CategoryTable {
    /// `char.def`と`unk.def`のリーダーから文字カテゴリー表を作成します。
    ///
    /// # エラー
    ///
    /// 定義の検証に失敗した場合にエラーを返します。
    pub fn from_readers<C, U>(char_def_rdr: C, unk_def_rdr: U) -> Result<Self>
    where
        C: Read,
        U: Read,
    {
        let char_def = utils::read_lines(char_def_rdr)?;
        let unk_def = utils::read_lines(unk_def_rdr)?;
        Self::from_lines(&char_def, CHAR_PROPERTY_DEF_FILE, &unk_def, UNK_DEF_FILE)
    }

    /// 読み込み済みの行から文字カテゴリー表を作成します。
    ///
    /// # 引数
    ///
    /// * `char_def` - `char.def`の各行
    /// * `char_def_name` - エラーメッセージに使う`char.def`の名前
    /// * `unk_def` - `unk.def`の各行
    /// * `unk_def_name` - エラーメッセージに使う`unk.def`の名前
    pub fn from_lines<S, T>(
        char_def: &[S],
        char_def_name: &str,
        unk_def: &[T],
        unk_def_name: &str,
    ) -> Result<Self>
    where
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let mut category_map = BTreeMap::new();
        let mut names = vec![];
        let mut ranges = vec![];

        for (i, line) in char_def.iter().enumerate() {
            let line = line.as_ref();
            let line = line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            let items: Vec<&str> = line.split_whitespace().collect();
            if items.len() < 2 {
                return Err(MazinError::invalid_format(
                    location(char_def_name, i),
                    format!("format error: {line}"),
                ));
            }

            if items[0].starts_with("0x") {
                let (low, high) = parse_hex_range(items[0], char_def_name, i)?;
                let mut categories = vec![];
                for &name in &items[1..] {
                    if !category_map.contains_key(name) {
                        return Err(MazinError::UndefinedCategory {
                            file: location(char_def_name, i),
                            name: name.to_string(),
                        });
                    }
                    categories.push(name.to_string());
                }
                ranges.push(CharRange {
                    low,
                    high,
                    categories,
                });
            } else {
                if items.len() < 4 {
                    return Err(MazinError::invalid_format(
                        location(char_def_name, i),
                        format!("format error: {line}"),
                    ));
                }
                let name = items[0];
                if category_map.contains_key(name) {
                    return Err(MazinError::DuplicateDefinition {
                        file: char_def_name.to_string(),
                        line: i + 1,
                        name: name.to_string(),
                    });
                }
                if names.len() >= MAX_CATEGORIES {
                    return Err(MazinError::invalid_format(
                        location(char_def_name, i),
                        format!("too many categories (>= {MAX_CATEGORIES})"),
                    ));
                }
                let invoke = parse_flag(items[1], char_def_name, i)?;
                let group = parse_flag(items[2], char_def_name, i)?;
                let length: u32 = items[3].parse().map_err(|_| {
                    MazinError::invalid_format(
                        location(char_def_name, i),
                        format!("length must be an integer: {}", items[3]),
                    )
                })?;
                if length > LENGTH_MASK {
                    return Err(MazinError::invalid_format(
                        location(char_def_name, i),
                        format!("length must be in 0..=15: {length}"),
                    ));
                }
                let id = u32::try_from(names.len())?;
                let info = CharInfo::new(CharInfo::category_bit(id), invoke, group, length, id)?;
                category_map.insert(name.to_string(), info);
                names.push(name.to_string());
            }
        }

        for name in ["DEFAULT", "SPACE"] {
            if !category_map.contains_key(name) {
                return Err(MazinError::MissingRequiredCategory {
                    file: char_def_name.to_string(),
                    name,
                });
            }
        }

        check_unknown_def(&category_map, unk_def, unk_def_name)?;

        let default = category_map["DEFAULT"];
        let mut table = vec![default; TABLE_SIZE];
        for range in &ranges {
            let mut info = category_map[&range.categories[0]];
            for name in &range.categories[1..] {
                info = info.add_categories(category_map[name].primary_bit());
            }
            table[range.low..=range.high].fill(info);
        }

        Ok(Self {
            category_map,
            names,
            table,
        })
    }

    /// 定義ファイルをコンパイルし、バイナリを`output`に書き出します。
    ///
    /// 定義ファイルが存在しない場合は警告を報告し、最小構成の既定値を使用します。
    pub fn compile<P, Q, O>(
        char_def_path: P,
        unk_def_path: Q,
        output: O,
        sink: &dyn DiagnosticSink,
    ) -> Result<Self>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        O: AsRef<Path>,
    {
        let char_def_path = char_def_path.as_ref();
        let unk_def_path = unk_def_path.as_ref();
        let char_def =
            utils::read_lines_or_default(char_def_path, CHAR_PROPERTY_DEF_DEFAULT, sink)?;
        let unk_def = utils::read_lines_or_default(unk_def_path, UNK_DEF_DEFAULT, sink)?;

        let table = Self::from_lines(
            &char_def,
            &char_def_path.display().to_string(),
            &unk_def,
            &unk_def_path.display().to_string(),
        )?;

        persist_atomically(output.as_ref(), |wtr| table.write(wtr))?;
        sink.info(&format!(
            "{} categories are compiled into {}",
            table.num_categories(),
            output.as_ref().display()
        ));
        Ok(table)
    }

    /// バイナリ形式で書き出します。
    pub fn write<W>(&self, wtr: W) -> Result<()>
    where
        W: Write,
    {
        archive::write_archive(CHAR_MAGIC, self, wtr)
    }

    /// バイナリ形式から読み込みます。
    pub fn read<R>(rdr: R) -> Result<Self>
    where
        R: Read,
    {
        let table: Self = archive::read_archive(CHAR_MAGIC, "char category table", rdr)?;
        if table.table.len() != TABLE_SIZE {
            return Err(MazinError::invalid_format(
                "char category table",
                format!("table must have {TABLE_SIZE} entries"),
            ));
        }
        Ok(table)
    }

    /// バイナリファイルから読み込みます。
    pub fn from_path<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        Self::read(File::open(path)?)
    }

    /// 文字の属性値を返します。
    ///
    /// U+FFFFを超える文字には番兵（`DEFAULT`）の値を返します。
    #[inline(always)]
    pub fn char_info(&self, c: char) -> CharInfo {
        let code = usize::try_from(u32::from(c)).unwrap_or(GUARD_INDEX);
        self.table[code.min(GUARD_INDEX)]
    }

    /// UTF-16のコード単位の属性値を返します。
    #[inline(always)]
    pub fn char_info_u16(&self, code: u16) -> CharInfo {
        self.table[usize::from(code)]
    }

    /// カテゴリー名から属性値を引きます。
    pub fn category(&self, name: &str) -> Option<CharInfo> {
        self.category_map.get(name).copied()
    }

    /// 主カテゴリーIDからカテゴリー名を引きます。
    pub fn category_name(&self, id: u32) -> Option<&str> {
        self.names.get(usize::try_from(id).ok()?).map(String::as_str)
    }

    /// 定義されたカテゴリー名（ID順）
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// 定義されたカテゴリーの数
    pub fn num_categories(&self) -> usize {
        self.names.len()
    }
}

fn parse_flag(s: &str, name: &str, line_idx: usize) -> Result<bool> {
    match s {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(MazinError::invalid_format(
            location(name, line_idx),
            format!("flag must be 0 or 1: {s}"),
        )),
    }
}

fn parse_hex_range(s: &str, name: &str, line_idx: usize) -> Result<(usize, usize)> {
    let Some(cap) = HEX_RANGE_RE.captures(s) else {
        return Err(MazinError::invalid_format(
            location(name, line_idx),
            format!("invalid code point range: {s}"),
        ));
    };
    let low = u32::from_str_radix(&cap[1], 16).unwrap_or(u32::MAX);
    let high = cap
        .get(2)
        .map_or(Ok(low), |m| u32::from_str_radix(m.as_str(), 16))
        .unwrap_or(u32::MAX);

    if low > high || high >= 0x10000 {
        return Err(MazinError::Range {
            file: name.to_string(),
            line: line_idx + 1,
            low,
            high,
        });
    }
    Ok((usize::try_from(low)?, usize::try_from(high)?))
}

/// `unk.def`の各行の先頭フィールドがすべて定義済みのカテゴリーであり、
/// かつ定義済みのカテゴリーがすべて`unk.def`に現れることを確認します。
fn check_unknown_def<T>(
    category_map: &BTreeMap<String, CharInfo>,
    unk_def: &[T],
    unk_def_name: &str,
) -> Result<()>
where
    T: AsRef<str>,
{
    let mut used = HashSet::new();
    for line in unk_def {
        let line = line.as_ref().trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let name = line.split(',').next().unwrap_or_default();
        if !category_map.contains_key(name) {
            return Err(MazinError::UndefinedCategory {
                file: unk_def_name.to_string(),
                name: name.to_string(),
            });
        }
        used.insert(name);
    }
    for name in category_map.keys() {
        if !used.contains(name.as_str()) {
            return Err(MazinError::UndefinedCategory {
                file: unk_def_name.to_string(),
                name: name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::diagnostics::{Level, MemorySink};

    const CHAR_DEF: &str = "\
DEFAULT 0 1 0  # DEFAULT is always needed
SPACE   0 1 0
KANJI   0 0 2
NUMERIC 1 1 0

0x0020 SPACE
0x0030..0x0039 NUMERIC
0x4E00..0x9FA5 KANJI
0x3007 KANJI NUMERIC # 〇
";

    const UNK_DEF: &str = "\
DEFAULT,5,5,4769,記号,一般,*,*,*,*,*
SPACE,9,9,8903,記号,空白,*,*,*,*,*
KANJI,6,6,14000,名詞,一般,*,*,*,*,*
NUMERIC,7,7,2000,名詞,数,*,*,*,*,*
";

    #[test]
    fn test_pack_unpack() {
        for primary in [0, 1, 5, 17] {
            for length in [0, 3, 15] {
                for (invoke, group) in [(false, false), (true, false), (false, true), (true, true)] {
                    let set = CharInfo::category_bit(primary) | 0b10;
                    let info = CharInfo::new(set, invoke, group, length, primary).unwrap();
                    assert_eq!(set, info.category_set());
                    assert_eq!(primary, info.primary());
                    assert_eq!(length, info.length());
                    assert_eq!(invoke, info.invoke());
                    assert_eq!(group, info.group());
                }
            }
        }
    }

    #[test]
    fn test_bit_layout() {
        let info = CharInfo::new(0b101, true, false, 3, 2).unwrap();
        assert_eq!((0b101 << 14) | (2 << 6) | (3 << 2) | 1, info.raw());
    }

    #[test]
    fn test_new_out_of_range() {
        assert!(CharInfo::new(1 << 18, false, false, 0, 0).is_err());
        assert!(CharInfo::new(1, false, false, 16, 0).is_err());
        assert!(CharInfo::new(1, false, false, 0, 256).is_err());
    }

    #[test]
    fn test_primarized_and_same_kind() {
        let kanji = CharInfo::new(0b100, false, false, 2, 2).unwrap();
        let both = kanji.add_categories(0b1000);
        assert_eq!(0b1100, both.category_set());
        assert_eq!(0b100, both.primarized().category_set());
        assert_eq!(2, both.primarized().primary());

        let numeric = CharInfo::new(0b1000, true, true, 0, 3).unwrap();
        assert!(both.is_same_kind(numeric));
        assert!(!kanji.is_same_kind(numeric));
    }

    #[test]
    fn test_compile_table() {
        let table = CategoryTable::from_readers(CHAR_DEF.as_bytes(), UNK_DEF.as_bytes()).unwrap();

        assert_eq!(4, table.num_categories());
        assert_eq!(Some("KANJI"), table.category_name(2));
        assert_eq!(None, table.category_name(4));

        let a = table.char_info('a');
        assert_eq!(0, a.primary());
        assert_eq!(0b1, a.category_set());
        assert!(a.group());

        let space = table.char_info(' ');
        assert_eq!(1, space.primary());

        let kanji = table.char_info('漢');
        assert_eq!(2, kanji.primary());
        assert_eq!(2, kanji.length());
        assert!(!kanji.invoke());

        let zero = table.char_info('〇');
        assert_eq!(2, zero.primary());
        assert_eq!(0b1100, zero.category_set());

        let digit = table.char_info('7');
        assert_eq!(3, digit.primary());
        assert!(digit.invoke());

        assert_eq!(table.category("DEFAULT"), Some(table.char_info('😀')));
    }

    #[test]
    fn test_duplicate_definition() {
        let char_def = "DEFAULT 0 1 0\nSPACE 0 1 0\nDEFAULT 1 1 0\n";
        let result = CategoryTable::from_readers(char_def.as_bytes(), UNK_DEF.as_bytes());
        assert!(matches!(
            result,
            Err(MazinError::DuplicateDefinition { line: 3, .. })
        ));
    }

    #[test]
    fn test_undefined_category_in_range() {
        let char_def = "DEFAULT 0 1 0\nSPACE 0 1 0\n0x0020 SPACE ALPHA\n";
        let unk_def = "DEFAULT,0,0,0,*\nSPACE,0,0,0,*\n";
        let result = CategoryTable::from_readers(char_def.as_bytes(), unk_def.as_bytes());
        assert!(matches!(
            result,
            Err(MazinError::UndefinedCategory { ref name, .. }) if name == "ALPHA"
        ));
    }

    #[test]
    fn test_missing_default() {
        let char_def = "SPACE 0 1 0\n";
        let unk_def = "SPACE,0,0,0,*\n";
        let result = CategoryTable::from_readers(char_def.as_bytes(), unk_def.as_bytes());
        assert!(matches!(
            result,
            Err(MazinError::MissingRequiredCategory { name: "DEFAULT", .. })
        ));
    }

    #[test]
    fn test_range_error() {
        let char_def = "DEFAULT 0 1 0\nSPACE 0 1 0\n0x0030..0x0020 SPACE\n";
        let unk_def = "DEFAULT,0,0,0,*\nSPACE,0,0,0,*\n";
        let result = CategoryTable::from_readers(char_def.as_bytes(), unk_def.as_bytes());
        assert!(matches!(
            result,
            Err(MazinError::Range {
                line: 3,
                low: 0x30,
                high: 0x20,
                ..
            })
        ));

        let char_def = "DEFAULT 0 1 0\nSPACE 0 1 0\n0x10000 SPACE\n";
        let result = CategoryTable::from_readers(char_def.as_bytes(), unk_def.as_bytes());
        assert!(matches!(result, Err(MazinError::Range { .. })));
    }

    #[test]
    fn test_too_few_items() {
        let char_def = "DEFAULT 0 1\nSPACE 0 1 0\n";
        let unk_def = "DEFAULT,0,0,0,*\nSPACE,0,0,0,*\n";
        let result = CategoryTable::from_readers(char_def.as_bytes(), unk_def.as_bytes());
        assert!(matches!(result, Err(MazinError::InvalidFormat(_))));
    }

    #[test]
    fn test_unknown_def_references_undefined() {
        let char_def = "DEFAULT 0 1 0\nSPACE 0 1 0\n";
        let unk_def = "DEFAULT,0,0,0,*\nSPACE,0,0,0,*\nALPHA,0,0,0,*\n";
        let result = CategoryTable::from_readers(char_def.as_bytes(), unk_def.as_bytes());
        assert!(matches!(
            result,
            Err(MazinError::UndefinedCategory { ref name, .. }) if name == "ALPHA"
        ));
    }

    #[test]
    fn test_unknown_def_misses_category() {
        let char_def = "DEFAULT 0 1 0\nSPACE 0 1 0\nALPHA 1 1 0\n";
        let unk_def = "DEFAULT,0,0,0,*\n# comment\nSPACE,0,0,0,*\n";
        let result = CategoryTable::from_readers(char_def.as_bytes(), unk_def.as_bytes());
        assert!(matches!(
            result,
            Err(MazinError::UndefinedCategory { ref name, .. }) if name == "ALPHA"
        ));
    }

    #[test]
    fn test_compile_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("char.bin");
        let sink = MemorySink::new();

        let table = CategoryTable::compile(
            dir.path().join("char.def"),
            dir.path().join("unk.def"),
            &output,
            &sink,
        )
        .unwrap();
        assert_eq!(2, table.num_categories());
        assert!(sink.contains(Level::Warn, "char.def is not found"));
        assert!(sink.contains(Level::Warn, "unk.def is not found"));

        let restored = CategoryTable::from_path(&output).unwrap();
        assert_eq!(table.names(), restored.names());
        assert_eq!(1, restored.char_info(' ').primary());
        assert_eq!(table.char_info('a'), restored.char_info('a'));
    }
}
