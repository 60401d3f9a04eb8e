//! ユーティリティ関数を提供するモジュール
//!
//! このモジュールには、CSV処理と定義ファイルの行読み込みのヘルパー関数が含まれています。
//! 主に以下の機能を提供します：
//!
//! - CSV行の解析と引用符処理
//! - 定義ファイルの読み込み（存在しない場合の既定値へのフォールバック）

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use csv_core::ReadFieldResult;

use crate::diagnostics::DiagnosticSink;
use crate::errors::{MazinError, Result};

/// CSVセルのデータを必要に応じて引用符で囲んだ文字列を返す
///
/// 区切り文字や引用符を含むセルはダブルクォートで囲まれ、内部の引用符は二重化されます。
/// 空のセルは空文字列のままです。
pub fn quote_csv_cell(cell: &str) -> String {
    if cell.is_empty() {
        return String::new();
    }
    let mut data = cell.as_bytes();
    let mut quoted = Vec::with_capacity(data.len() + 2);
    let mut output = [0; 4096];
    let mut writer = csv_core::Writer::new();
    loop {
        let (result, nin, nout) = writer.field(data, &mut output);
        quoted.extend_from_slice(&output[..nout]);
        if result == csv_core::WriteResult::InputEmpty {
            break;
        }
        data = &data[nin..];
    }
    let (_, nout) = writer.finish(&mut output);
    quoted.extend_from_slice(&output[..nout]);
    // Only ASCII quotes are inserted, so the result stays valid UTF-8.
    String::from_utf8(quoted).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// CSV形式の行を解析してフィールドのベクターに分割する
///
/// この関数は、CSV形式の文字列を解析し、各フィールドを個別の文字列として抽出します。
/// ダブルクォートで囲まれたフィールドや、フィールド内のカンマも正しく処理します。
///
/// # 例
///
/// ```
/// # use mazin::utils::parse_csv_row;
/// let fields = parse_csv_row("名詞,トスカーナ");
/// assert_eq!(fields, vec!["名詞", "トスカーナ"]);
///
/// let fields_with_quote = parse_csv_row("名詞,\"1,2-ジクロロエタン\"");
/// assert_eq!(fields_with_quote, vec!["名詞", "1,2-ジクロロエタン"]);
/// ```
pub fn parse_csv_row(row: &str) -> Vec<String> {
    split_csv_row(row, 0)
}

/// CSV形式の行を最大`max_fields`個のフィールドに分割する
///
/// 最後のフィールドには、残りの文字列が引用符処理をせずにそのまま入ります。
/// `max_fields`が0の場合は上限なしで分割します。
///
/// ```
/// # use mazin::utils::split_csv_row;
/// let fields = split_csv_row("東京,-1,-1,,名詞,固有名詞", 5);
/// assert_eq!(fields, vec!["東京", "-1", "-1", "", "名詞,固有名詞"]);
/// ```
pub fn split_csv_row(row: &str, max_fields: usize) -> Vec<String> {
    let mut fields = vec![];
    let mut rdr = csv_core::Reader::new();
    let mut bytes = row.as_bytes();
    let mut output = vec![0; row.len() + 1];
    loop {
        if max_fields != 0 && fields.len() + 1 == max_fields {
            fields.push(row[row.len() - bytes.len()..].to_string());
            break;
        }
        let (result, nin, nout) = rdr.read_field(bytes, &mut output);
        let end = match result {
            ReadFieldResult::Field { record_end } => record_end,
            ReadFieldResult::InputEmpty | ReadFieldResult::End => true,
            // The output buffer is longer than the whole row.
            ReadFieldResult::OutputFull => true,
        };
        fields.push(String::from_utf8_lossy(&output[..nout]).into_owned());
        if end {
            break;
        }
        bytes = &bytes[nin..];
    }
    fields
}

/// リーダーからすべての行を読み込みます。
pub fn read_lines<R>(rdr: R) -> Result<Vec<String>>
where
    R: Read,
{
    let reader = BufReader::new(rdr);
    let mut lines = vec![];
    for line in reader.lines() {
        lines.push(line?);
    }
    Ok(lines)
}

/// ファイルからすべての行を読み込みます。
///
/// ファイルが存在しない場合は警告を報告し、`default`の各行を返します。
pub fn read_lines_or_default<P>(path: P, default: &str, sink: &dyn DiagnosticSink) -> Result<Vec<String>>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    match File::open(path) {
        Ok(file) => read_lines(file),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            sink.warn(&format!(
                "{} is not found. minimum setting is used",
                path.display()
            ));
            Ok(default.lines().map(str::to_string).collect())
        }
        Err(e) => Err(MazinError::from(e)),
    }
}

/// エラーメッセージ用に`ファイル名:行番号`の文字列を作ります。
pub(crate) fn location(name: &str, line_idx: usize) -> String {
    format!("{name}:{}", line_idx + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::diagnostics::{Level, MemorySink};

    #[test]
    fn test_parse_csv_row() {
        assert_eq!(
            &["名詞", "トスカーナ"],
            parse_csv_row("名詞,トスカーナ").as_slice()
        );
    }

    #[test]
    fn test_parse_csv_row_with_quote() {
        assert_eq!(
            &["名詞", "1,2-ジクロロエタン"],
            parse_csv_row("名詞,\"1,2-ジクロロエタン\"").as_slice()
        );
    }

    #[test]
    fn test_parse_csv_row_trailing_empty() {
        assert_eq!(&["a", "b", ""], parse_csv_row("a,b,").as_slice());
    }

    #[test]
    fn test_split_csv_row_rest() {
        assert_eq!(&["\"a,b\",1"], split_csv_row("\"a,b\",1", 1).as_slice());
        assert_eq!(
            &["a,b", "1", "2", "3", "x,\"y\",z"],
            split_csv_row("\"a,b\",1,2,3,x,\"y\",z", 5).as_slice()
        );
    }

    #[test]
    fn test_split_csv_row_short() {
        assert_eq!(&["a", "1"], split_csv_row("a,1", 5).as_slice());
    }

    #[test]
    fn test_quote_csv_cell() {
        assert_eq!("X-Y", quote_csv_cell("X-Y"));
        assert_eq!("\"a,b\"", quote_csv_cell("a,b"));
        assert_eq!("\"a\"\"b\"", quote_csv_cell("a\"b"));
        assert_eq!("", quote_csv_cell(""));
    }

    #[test]
    fn test_read_lines_or_default() {
        let sink = MemorySink::new();
        let lines = read_lines_or_default("/nonexistent/char.def", "A\nB\n", &sink).unwrap();
        assert_eq!(vec!["A", "B"], lines);
        assert!(sink.contains(Level::Warn, "char.def is not found"));
    }
}
