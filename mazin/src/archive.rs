//! バイナリ成果物の入出力
//!
//! 文字カテゴリー表、重みモデル、連接コスト表、辞書はいずれも、マジックバイトと
//! 16バイト境界までのパディングに続けてrkyvのアーカイブを置いた形式で保存されます。
//! 出力は同じディレクトリの一時ファイルに書き出し、すべて成功した場合にのみ
//! リネームで公開します。

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use rkyv::api::high::{HighDeserializer, HighSerializer, HighValidator};
use rkyv::bytecheck::CheckBytes;
use rkyv::rancor::Error;
use rkyv::ser::allocator::ArenaHandle;
use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize};

use crate::errors::{MazinError, Result};

const RKYV_ALIGNMENT: usize = 16;

const fn padding_len(magic_len: usize) -> usize {
    (RKYV_ALIGNMENT - (magic_len % RKYV_ALIGNMENT)) % RKYV_ALIGNMENT
}

/// マジックバイトとパディングに続けて`value`をrkyv形式で書き出します。
pub(crate) fn write_archive<T, W>(magic: &[u8], value: &T, mut wtr: W) -> Result<()>
where
    T: for<'a> Serialize<HighSerializer<AlignedVec, ArenaHandle<'a>, Error>>,
    W: Write,
{
    let bytes = rkyv::to_bytes::<Error>(value).map_err(|e| {
        MazinError::invalid_state("rkyv serialization failed".to_string(), e.to_string())
    })?;

    wtr.write_all(magic)?;
    let padding_bytes = vec![0xFF; padding_len(magic.len())];
    wtr.write_all(&padding_bytes)?;
    wtr.write_all(&bytes)?;

    Ok(())
}

/// [`write_archive`]で書き出したデータを読み込みます。
///
/// マジックバイトを確認した後、アーカイブを検証してからデシリアライズします。
pub(crate) fn read_archive<T, R>(magic: &[u8], name: &str, mut rdr: R) -> Result<T>
where
    T: Archive,
    T::Archived: for<'a> CheckBytes<HighValidator<'a, Error>> + Deserialize<T, HighDeserializer<Error>>,
    R: Read,
{
    let mut buffer = Vec::new();
    rdr.read_to_end(&mut buffer)?;

    if !buffer.starts_with(magic) {
        return Err(MazinError::invalid_format(
            name,
            "The magic number of the input mismatches.",
        ));
    }

    let Some(data) = buffer.get(magic.len() + padding_len(magic.len())..) else {
        return Err(MazinError::invalid_format(name, "File too small or corrupted."));
    };

    let mut aligned_bytes: AlignedVec = AlignedVec::with_capacity(data.len());
    aligned_bytes.extend_from_slice(data);

    rkyv::from_bytes::<T, Error>(&aligned_bytes).map_err(|e| {
        MazinError::invalid_state(
            format!("rkyv validation failed. {name} may be corrupted or incompatible."),
            e.to_string(),
        )
    })
}

/// `path`へ原子的に書き出します。
///
/// `write`には出力先ディレクトリに作成した一時ファイルへのライターが渡されます。
/// `write`が成功した場合にのみ一時ファイルを`path`へリネームし、失敗した場合は
/// 一時ファイルを削除して、`path`には何も残しません。
pub fn persist_atomically<P, F>(path: P, write: F) -> Result<()>
where
    P: AsRef<Path>,
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<()>,
{
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut temp_file = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut wtr = BufWriter::new(temp_file.as_file_mut());
        write(&mut wtr)?;
        wtr.flush()?;
    }
    temp_file.as_file().sync_all()?;
    temp_file.persist(path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Archive, Serialize, Deserialize)]
    struct Sample {
        name: String,
        values: Vec<u64>,
    }

    const MAGIC: &[u8] = b"MazinTest 1\n";

    #[test]
    fn test_padding_len() {
        assert_eq!(padding_len(0), 0);
        assert_eq!(padding_len(12), 4);
        assert_eq!(padding_len(16), 0);
        assert_eq!(padding_len(17), 15);
    }

    #[test]
    fn test_read_write_archive() {
        let sample = Sample {
            name: "utf-8".to_string(),
            values: vec![3, 1, 4],
        };
        let mut buf = vec![];
        write_archive(MAGIC, &sample, &mut buf).unwrap();
        assert!(buf.starts_with(MAGIC));

        let restored: Sample = read_archive(MAGIC, "sample", buf.as_slice()).unwrap();
        assert_eq!(sample, restored);
    }

    #[test]
    fn test_read_archive_magic_mismatch() {
        let sample = Sample {
            name: String::new(),
            values: vec![],
        };
        let mut buf = vec![];
        write_archive(b"Other 1\n", &sample, &mut buf).unwrap();
        assert!(read_archive::<Sample, _>(MAGIC, "sample", buf.as_slice()).is_err());
    }

    #[test]
    fn test_persist_atomically_failure_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let result = persist_atomically(&path, |wtr| {
            wtr.write_all(b"partial")?;
            Err(MazinError::invalid_argument("test", "failure"))
        });
        assert!(result.is_err());
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_persist_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        persist_atomically(&path, |wtr| {
            wtr.write_all(b"data")?;
            Ok(())
        })
        .unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"data");
    }
}
