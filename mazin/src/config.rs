//! オプションの参照テーブル
//!
//! コマンドライン引数と辞書ディレクトリの`dicrc`から得られる設定値を、
//! キーと値の組として保持します。

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;

use hashbrown::HashMap;

use crate::common::{DEFAULT_CHARSET, DICRC};
use crate::errors::{MazinError, Result};

/// 文字列キーで設定値を引くためのテーブル
#[derive(Debug, Default, Clone)]
pub struct Options {
    values: HashMap<String, String>,
}

impl Options {
    /// 空のテーブルを作成します。
    pub fn new() -> Self {
        Self::default()
    }

    /// 値を設定します。既存の値は上書きされます。
    pub fn set<K, V>(&mut self, key: K, value: V) -> &mut Self
    where
        K: Into<String>,
        V: ToString,
    {
        self.values.insert(key.into(), value.to_string());
        self
    }

    /// キーが定義されているかどうか。
    pub fn is_defined(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// 文字列値を取得します。
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// 文字列値を取得します。未定義の場合は`default`を返します。
    pub fn get_str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get_str(key).unwrap_or(default)
    }

    /// 整数値を取得します。
    ///
    /// # エラー
    ///
    /// 値が整数として解釈できない場合にエラーを返します。
    pub fn get_int(&self, key: &str) -> Result<Option<i64>> {
        self.get_str(key)
            .map(|v| {
                v.trim().parse::<i64>().map_err(|_| {
                    MazinError::invalid_format(
                        format!("option {key}"),
                        format!("integer value is expected: {v}"),
                    )
                })
            })
            .transpose()
    }

    /// 整数値を取得します。未定義の場合は`default`を返します。
    pub fn get_int_or(&self, key: &str, default: i64) -> Result<i64> {
        Ok(self.get_int(key)?.unwrap_or(default))
    }

    /// 真偽値を取得します。
    ///
    /// 値のないキー（フラグ）は真として扱います。
    pub fn get_bool(&self, key: &str) -> bool {
        match self.get_str(key) {
            None => false,
            Some(v) => matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "" | "1" | "true" | "yes" | "on"
            ),
        }
    }

    /// 辞書ディレクトリ。未指定の場合はカレントディレクトリ。
    pub fn dicdir(&self) -> PathBuf {
        PathBuf::from(self.get_str_or("dicdir", "."))
    }

    /// 出力ディレクトリ。未指定の場合は辞書ディレクトリ。
    pub fn outdir(&self) -> PathBuf {
        self.get_str("outdir")
            .map_or_else(|| self.dicdir(), PathBuf::from)
    }

    /// 文字コード名。
    pub fn charset(&self) -> &str {
        self.get_str_or("charset", DEFAULT_CHARSET)
    }

    /// `dicrc`形式の設定を読み込みます。
    ///
    /// 各行は`key = value`の形式で、`;`または`#`で始まる行と空行は無視されます。
    /// すでに定義されているキーは上書きしません（コマンドライン引数が優先されます）。
    ///
    /// # エラー
    ///
    /// `=`を含まない行がある場合にエラーを返します。
    pub fn load_dicrc<R>(&mut self, rdr: R) -> Result<()>
    where
        R: Read,
    {
        let reader = BufReader::new(rdr);
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(MazinError::invalid_format(
                    format!("{DICRC}:{}", i + 1),
                    format!("format error: {line}"),
                ));
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(MazinError::invalid_format(
                    format!("{DICRC}:{}", i + 1),
                    format!("empty key: {line}"),
                ));
            }
            if !self.is_defined(key) {
                self.set(key, value.trim());
            }
        }
        Ok(())
    }

    /// 設定内容をキー順に整形して返します。
    pub fn dump(&self) -> String {
        let mut pairs: Vec<_> = self.values.iter().collect();
        pairs.sort();
        pairs
            .into_iter()
            .map(|(k, v)| format!("{k}: {v}\n"))
            .collect()
    }
}
