//! 重みモデル
//!
//! 素性文字列の64ビットのフィンガープリントと重みの組を、フィンガープリントの昇順に
//! 並べた配列として保持します。検索は完全一致のみで、見つからない素性に近似の重みを
//! 返すことはありません。
//!
//! テキスト形式は、空行で終わる`キー: 値`のヘッダーと、それに続く`重み<TAB>素性`の行からなります。

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

use rkyv::{Archive, Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::archive::{self, persist_atomically};
use crate::common::DEFAULT_CHARSET;
use crate::diagnostics::DiagnosticSink;
use crate::errors::{MazinError, Result};
use crate::utils::location;

/// バイナリ形式の重みモデルのマジックバイト
pub const MODEL_MAGIC: &[u8] = b"MazinWeightModel 0.3\n";

/// 素性文字列のUTF-8表現からフィンガープリントを計算します。
///
/// SHA-256のダイジェストの先頭8バイトをリトルエンディアンで読んだ値です。
pub fn fingerprint(feature: &str) -> u64 {
    let digest = Sha256::digest(feature.as_bytes());
    let mut bytes = [0; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// フィンガープリントで整列された重みモデル
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct WeightModel {
    fingerprints: Vec<u64>,
    weights: Vec<f64>,
    charset: String,
}

impl Default for WeightModel {
    fn default() -> Self {
        Self {
            fingerprints: vec![],
            weights: vec![],
            charset: DEFAULT_CHARSET.to_string(),
        }
    }
}

impl WeightModel {
    /// `(フィンガープリント, 重み)`の組からモデルを作成します。
    ///
    /// 組はフィンガープリントの昇順に安定ソートされます。
    pub fn new<S>(mut entries: Vec<(u64, f64)>, charset: S) -> Self
    where
        S: Into<String>,
    {
        entries.sort_by_key(|&(fp, _)| fp);
        let (fingerprints, weights) = entries.into_iter().unzip();
        Self {
            fingerprints,
            weights,
            charset: charset.into(),
        }
    }

    /// `(素性, 重み)`の組からモデルを作成します。
    pub fn from_features<I, S>(features: I, charset: &str) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let entries = features
            .into_iter()
            .map(|(f, w)| (fingerprint(f.as_ref()), w))
            .collect();
        Self::new(entries, charset)
    }

    /// テキスト形式のモデルを読み込みます。
    ///
    /// # エラー
    ///
    /// ヘッダー行が`キー: 値`の形式でない場合や、本体の行が`重み<TAB>素性`の形式でない
    /// 場合にエラーを返します。
    pub fn from_text<R>(rdr: R, name: &str) -> Result<Self>
    where
        R: Read,
    {
        let text = TextModel::parse(rdr, name)?;
        let charset = text
            .header
            .get("charset")
            .cloned()
            .unwrap_or_else(|| DEFAULT_CHARSET.to_string());
        Ok(Self::from_features(text.entries, &charset))
    }

    /// バイナリ形式で書き出します。
    pub fn write<W>(&self, wtr: W) -> Result<()>
    where
        W: Write,
    {
        archive::write_archive(MODEL_MAGIC, self, wtr)
    }

    /// バイナリ形式のモデルを読み込みます。
    pub fn read<R>(rdr: R) -> Result<Self>
    where
        R: Read,
    {
        let model: Self = archive::read_archive(MODEL_MAGIC, "model", rdr)?;
        if model.fingerprints.len() != model.weights.len() {
            return Err(MazinError::invalid_format(
                "model",
                "the numbers of fingerprints and weights mismatch",
            ));
        }
        Ok(model)
    }

    /// テキスト形式のモデルファイルをバイナリ形式に変換します。
    pub fn compile<P, Q>(text_path: P, binary_path: Q) -> Result<Self>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let text_path = text_path.as_ref();
        let model = Self::from_text(File::open(text_path)?, &text_path.display().to_string())?;
        persist_atomically(binary_path, |wtr| model.write(wtr))?;
        Ok(model)
    }

    /// モデルファイルを開きます。
    ///
    /// まずバイナリ形式として読み込み、失敗した場合はエラーを報告した上で、
    /// 同じファイルをテキスト形式として読み込み直します。
    ///
    /// # エラー
    ///
    /// どちらの形式でも読み込めなかった場合に[`MazinError::ModelLoad`]を返します。
    pub fn open<P>(path: P, sink: &dyn DiagnosticSink) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let name = path.display().to_string();
        let model_load = |cause: String| MazinError::ModelLoad {
            path: name.clone(),
            cause,
        };

        let file = File::open(path).map_err(|e| model_load(e.to_string()))?;
        match Self::read(file) {
            Ok(model) => Ok(model),
            Err(e) => {
                sink.error(&format!(
                    "{name} is not a binary model. reopen it as text mode... ({e})"
                ));
                let file = File::open(path).map_err(|e| model_load(e.to_string()))?;
                Self::from_text(file, &name).map_err(|e| model_load(e.to_string()))
            }
        }
    }

    /// `fp`以上の最初のフィンガープリントの位置を返します。
    pub fn lower_bound(&self, fp: u64) -> usize {
        self.fingerprints.partition_point(|&x| x < fp)
    }

    /// フィンガープリントが一致する要素の位置を返します。
    pub fn find(&self, fp: u64) -> Option<usize> {
        let pos = self.lower_bound(fp);
        (self.fingerprints.get(pos) == Some(&fp)).then_some(pos)
    }

    /// 素性文字列の位置を返します。
    #[inline]
    pub fn find_feature(&self, feature: &str) -> Option<usize> {
        self.find(fingerprint(feature))
    }

    /// 位置`idx`の重みを返します。範囲外の場合は0を返します。
    #[inline(always)]
    pub fn weight(&self, idx: usize) -> f64 {
        self.weights.get(idx).copied().unwrap_or(0.0)
    }

    /// 素性文字列の重みを返します。
    pub fn feature_weight(&self, feature: &str) -> Option<f64> {
        self.find_feature(feature).map(|i| self.weights[i])
    }

    /// 要素の数
    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    /// モデルが空かどうか。
    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    /// 文字コード名
    pub fn charset(&self) -> &str {
        &self.charset
    }
}

/// テキスト形式のモデル
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TextModel {
    /// ヘッダー
    pub header: BTreeMap<String, String>,
    /// `(素性, 重み)`の組
    pub entries: Vec<(String, f64)>,
}

impl TextModel {
    /// テキスト形式のモデルを読み込みます。
    pub fn parse<R>(rdr: R, name: &str) -> Result<Self>
    where
        R: Read,
    {
        let mut model = Self::default();
        let mut in_header = true;
        for (i, line) in BufReader::new(rdr).lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if in_header {
                if line.is_empty() {
                    in_header = false;
                    continue;
                }
                let Some((key, value)) = line.split_once(':') else {
                    return Err(MazinError::invalid_format(
                        location(name, i),
                        format!("format error: {line}"),
                    ));
                };
                model
                    .header
                    .insert(key.trim().to_string(), value.trim().to_string());
            } else {
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                let Some((weight, feature)) = line.split_once('\t') else {
                    return Err(MazinError::invalid_format(
                        location(name, i),
                        format!("format error: {line}"),
                    ));
                };
                let weight = weight.trim().parse::<f64>().map_err(|e| {
                    MazinError::invalid_format(
                        location(name, i),
                        format!("invalid weight {weight}: {e}"),
                    )
                })?;
                model.entries.push((feature.to_string(), weight));
            }
        }
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::diagnostics::{Level, MemorySink};

    const MODEL_DEF: &str = "version: 102
charset: utf-8
cost-factor: 800

0.5000000000000000\tU00:名詞
-1.2500000000000000\tB00:名詞/助詞
# comment line

2.0\tU01:東京
";

    #[test]
    fn test_from_text() {
        let model = WeightModel::from_text(MODEL_DEF.as_bytes(), "model.def").unwrap();
        assert_eq!(3, model.len());
        assert_eq!("utf-8", model.charset());
        assert_eq!(Some(0.5), model.feature_weight("U00:名詞"));
        assert_eq!(Some(-1.25), model.feature_weight("B00:名詞/助詞"));
        assert_eq!(Some(2.0), model.feature_weight("U01:東京"));
        assert_eq!(None, model.feature_weight("U01:大阪"));
    }

    #[test]
    fn test_sorted_by_fingerprint() {
        let model = WeightModel::from_text(MODEL_DEF.as_bytes(), "model.def").unwrap();
        assert!(model.fingerprints.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_find_inserted_and_missing() {
        let entries = vec![(30, 3.0), (10, 1.0), (20, 2.0), (40, 4.0)];
        let model = WeightModel::new(entries.clone(), "utf-8");
        for (fp, w) in entries {
            let idx = model.find(fp).unwrap();
            assert_eq!(w, model.weight(idx));
        }
        for fp in [0, 15, 25, 35, 41, u64::MAX] {
            assert_eq!(None, model.find(fp));
        }
        assert_eq!(0, model.lower_bound(0));
        assert_eq!(1, model.lower_bound(11));
        assert_eq!(4, model.lower_bound(u64::MAX));
    }

    #[test]
    fn test_find_single_and_empty() {
        let model = WeightModel::new(vec![(7, 0.25)], "utf-8");
        assert_eq!(Some(0), model.find(7));
        assert_eq!(None, model.find(6));
        assert_eq!(None, model.find(8));

        let model = WeightModel::default();
        assert_eq!(None, model.find(7));
        assert_eq!(0.0, model.weight(0));
    }

    #[test]
    fn test_invalid_text() {
        assert!(WeightModel::from_text("version 102\n".as_bytes(), "model.def").is_err());
        assert!(WeightModel::from_text("version: 102\n\n0.5 U00\n".as_bytes(), "model.def").is_err());
        assert!(WeightModel::from_text("version: 102\n\nabc\tU00\n".as_bytes(), "model.def").is_err());
    }

    #[test]
    fn test_default_charset() {
        let model = WeightModel::from_text("version: 102\n\n1.0\tU00\n".as_bytes(), "model.def").unwrap();
        assert_eq!("utf-8", model.charset());
    }

    #[test]
    fn test_read_write() {
        let model = WeightModel::from_text(MODEL_DEF.as_bytes(), "model.def").unwrap();
        let mut buf = vec![];
        model.write(&mut buf).unwrap();
        let other = WeightModel::read(buf.as_slice()).unwrap();
        assert_eq!(model, other);
    }

    #[test]
    fn test_open_text_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.def");
        std::fs::write(&path, MODEL_DEF).unwrap();

        let sink = MemorySink::new();
        let model = WeightModel::open(&path, &sink).unwrap();
        assert_eq!(3, model.len());
        assert!(sink.contains(Level::Error, "is not a binary model"));
    }

    #[test]
    fn test_open_binary() {
        let dir = tempfile::tempdir().unwrap();
        let text_path = dir.path().join("model.def");
        let bin_path = dir.path().join("model.bin");
        std::fs::write(&text_path, MODEL_DEF).unwrap();
        WeightModel::compile(&text_path, &bin_path).unwrap();

        let sink = MemorySink::new();
        let model = WeightModel::open(&bin_path, &sink).unwrap();
        assert_eq!(Some(2.0), model.feature_weight("U01:東京"));
        assert!(sink.messages().is_empty());
    }

    #[test]
    fn test_open_broken() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        std::fs::write(&path, "not a model\n").unwrap();

        let sink = MemorySink::new();
        assert!(matches!(
            WeightModel::open(&path, &sink),
            Err(MazinError::ModelLoad { .. })
        ));
    }

    #[test]
    fn test_invalid_weight_location() {
        let err = TextModel::parse("version: 102\n\n0.5\tU00\nabc\tU01\n".as_bytes(), "model.def")
            .unwrap_err();
        assert!(matches!(err, MazinError::InvalidFormat(_)));
        assert!(err.to_string().contains("model.def:4"), "{err}");
    }
}
