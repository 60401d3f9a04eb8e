//! 連接コスト表
//!
//! `matrix.def`を読み込み、左文脈IDと右文脈IDの組から連接コストを引く行列を作成します。
//!
//! `matrix.def`の先頭行は`左文脈IDの数 右文脈IDの数`で、以降の各行は
//! `左文脈ID 右文脈ID コスト`です。任意の`matrix-eos-penalty.def`には、1行目にペナルティ、
//! 2行目以降に左文脈IDを1つずつ記述します。列挙された左文脈IDから文末（右文脈ID 0）への
//! コストにペナルティが加算されます。

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::sync::LazyLock;

use hashbrown::HashSet;
use regex::Regex;
use rkyv::{Archive, Deserialize, Serialize};

use crate::archive::{self, persist_atomically};
use crate::common::{MATRIX_DEF_DEFAULT, MATRIX_DEF_FILE, MATRIX_EOS_PENALTY_FILE};
use crate::diagnostics::DiagnosticSink;
use crate::errors::{MazinError, Result};
use crate::utils::{self, location};

/// バイナリ形式の連接コスト表のマジックバイト
pub const MATRIX_MAGIC: &[u8] = b"MazinMatrix 0.3\n";

static DELIMITER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\t ]+").unwrap());

/// 文末への連接に加えるペナルティ
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EosPenalty {
    penalty: i32,
    left_ids: HashSet<usize>,
}

impl EosPenalty {
    /// `matrix-eos-penalty.def`を読み込みます。
    pub fn from_reader<R>(rdr: R) -> Result<Self>
    where
        R: Read,
    {
        let mut result = Self::default();
        let mut lines = BufReader::new(rdr)
            .lines()
            .enumerate()
            .filter(|(_, l)| l.as_ref().map_or(true, |l| !l.trim().is_empty()));

        let Some((i, first)) = lines.next() else {
            return Ok(result);
        };
        let first = first?;
        result.penalty = first.trim().parse().map_err(|_| {
            MazinError::invalid_format(
                location(MATRIX_EOS_PENALTY_FILE, i),
                format!("penalty must be an integer: {}", first.trim()),
            )
        })?;
        for (i, line) in lines {
            let line = line?;
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let id = line.parse().map_err(|_| {
                MazinError::invalid_format(
                    location(MATRIX_EOS_PENALTY_FILE, i),
                    format!("left id must be a non-negative integer: {line}"),
                )
            })?;
            result.left_ids.insert(id);
        }
        Ok(result)
    }

    /// ペナルティの値
    pub fn penalty(&self) -> i32 {
        self.penalty
    }

    /// `left_id`から文末への連接に加えるペナルティ
    #[inline]
    fn penalty_for(&self, left_id: usize, right_id: usize) -> i32 {
        if right_id == 0 && self.left_ids.contains(&left_id) {
            self.penalty
        } else {
            0
        }
    }
}

/// 連接コストの行列
///
/// コストは`left_id + num_left * right_id`の位置に格納されます。
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct MatrixConnector {
    data: Vec<i16>,
    num_left: usize,
    num_right: usize,
}

impl MatrixConnector {
    /// `matrix.def`を読み込みます。
    ///
    /// # エラー
    ///
    /// 先頭行が2つの正の整数でない場合、行の列数が3でない場合、IDが範囲外の場合に
    /// エラーを返します。
    pub fn from_reader<R>(rdr: R, eos_penalty: Option<&EosPenalty>) -> Result<Self>
    where
        R: Read,
    {
        Self::from_lines(&utils::read_lines(rdr)?, MATRIX_DEF_FILE, eos_penalty)
    }

    fn from_lines<S>(lines: &[S], name: &str, eos_penalty: Option<&EosPenalty>) -> Result<Self>
    where
        S: AsRef<str>,
    {
        let mut lines = lines.iter().enumerate();
        let Some((i, header)) = lines.next() else {
            return Err(MazinError::invalid_format(name, "no line in file"));
        };
        let (num_left, num_right) = Self::parse_header(header.as_ref())
            .ok_or_else(|| {
                MazinError::invalid_format(
                    location(name, i),
                    format!("format error: {}", header.as_ref()),
                )
            })?;

        let len = num_left.checked_mul(num_right).ok_or_else(|| {
            MazinError::invalid_format(
                location(name, i),
                format!("matrix is too large: {num_left}x{num_right}"),
            )
        })?;
        let mut data = vec![0; len];
        for (i, line) in lines {
            let line = line.as_ref().trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let cols: Vec<&str> = DELIMITER.split(line).collect();
            let [left, right, cost] = cols.as_slice() else {
                return Err(MazinError::invalid_format(
                    location(name, i),
                    format!("format error: {line}"),
                ));
            };
            let parse_err = || {
                MazinError::invalid_format(location(name, i), format!("format error: {line}"))
            };
            let left: usize = left.parse().map_err(|_| parse_err())?;
            let right: usize = right.parse().map_err(|_| parse_err())?;
            let mut cost: i32 = cost.parse().map_err(|_| parse_err())?;
            if left >= num_left || right >= num_right {
                return Err(MazinError::invalid_format(
                    location(name, i),
                    format!("index values are out of range: left={left}, right={right}"),
                ));
            }
            if let Some(p) = eos_penalty {
                cost += p.penalty_for(left, right);
            }
            data[left + num_left * right] =
                cost.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        }

        Ok(Self {
            data,
            num_left,
            num_right,
        })
    }

    fn parse_header(line: &str) -> Option<(usize, usize)> {
        let cols: Vec<&str> = DELIMITER.split(line.trim()).collect();
        let [num_left, num_right] = cols.as_slice() else {
            return None;
        };
        let num_left = num_left.parse().ok()?;
        let num_right = num_right.parse().ok()?;
        (num_left != 0 && num_right != 0).then_some((num_left, num_right))
    }

    /// `matrix.def`の先頭行から左右の文脈IDの数を読み込みます。
    ///
    /// ファイルが存在しない場合や先頭行が不正な場合は`None`を返します。
    pub fn read_size<P>(path: P) -> Option<(usize, usize)>
    where
        P: AsRef<Path>,
    {
        let file = File::open(path).ok()?;
        let mut header = String::new();
        BufReader::new(file).read_line(&mut header).ok()?;
        Self::parse_header(&header)
    }

    /// `matrix.def`と`matrix-eos-penalty.def`をコンパイルして書き出します。
    ///
    /// `matrix.def`が存在しない場合は警告を報告し、最小構成を使います。
    pub fn compile<P, Q, O>(
        matrix_path: P,
        penalty_path: Q,
        output: O,
        sink: &dyn DiagnosticSink,
    ) -> Result<Self>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        O: AsRef<Path>,
    {
        let matrix_path = matrix_path.as_ref();
        let eos_penalty = match File::open(penalty_path) {
            Ok(file) => Some(EosPenalty::from_reader(file)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        let lines = utils::read_lines_or_default(matrix_path, MATRIX_DEF_DEFAULT, sink)?;
        let connector = Self::from_lines(
            &lines,
            &matrix_path.display().to_string(),
            eos_penalty.as_ref(),
        )?;
        sink.info(&format!(
            "reading {} ... {}x{}",
            matrix_path.display(),
            connector.num_left,
            connector.num_right
        ));
        persist_atomically(output, |wtr| connector.write(wtr))?;
        Ok(connector)
    }

    /// バイナリ形式で書き出します。
    pub fn write<W>(&self, wtr: W) -> Result<()>
    where
        W: Write,
    {
        archive::write_archive(MATRIX_MAGIC, self, wtr)
    }

    /// バイナリ形式の連接コスト表を読み込みます。
    pub fn read<R>(rdr: R) -> Result<Self>
    where
        R: Read,
    {
        let connector: Self = archive::read_archive(MATRIX_MAGIC, "matrix", rdr)?;
        if connector.data.len() != connector.num_left * connector.num_right {
            return Err(MazinError::invalid_format("matrix", "matrix size is invalid"));
        }
        Ok(connector)
    }

    /// 連接コストを返します。
    #[inline(always)]
    pub fn cost(&self, left_id: usize, right_id: usize) -> i32 {
        i32::from(self.data[left_id + self.num_left * right_id])
    }

    /// 左文脈IDの数
    #[inline(always)]
    pub fn num_left(&self) -> usize {
        self.num_left
    }

    /// 右文脈IDの数
    #[inline(always)]
    pub fn num_right(&self) -> usize {
        self.num_right
    }
}
