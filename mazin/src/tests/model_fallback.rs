use std::fs;

use tempfile::tempdir;

use crate::common::{CHAR_PROPERTY_DEF_FILE, CHAR_PROPERTY_FILE, MODEL_DEF_FILE, UNK_DEF_FILE};
use crate::character::CategoryTable;
use crate::config::Options;
use crate::diagnostics::{Level, MemorySink};
use crate::dictionary::CostCalculator;
use crate::errors::MazinError;
use crate::model::WeightModel;
use crate::tests::resources::write_dicdir;

#[test]
fn test_text_model_is_accepted_as_model_option() {
    let dir = tempdir().unwrap();
    let dicdir = dir.path();
    write_dicdir(dicdir);
    let sink = MemorySink::new();
    CategoryTable::compile(
        dicdir.join(CHAR_PROPERTY_DEF_FILE),
        dicdir.join(UNK_DEF_FILE),
        dicdir.join(CHAR_PROPERTY_FILE),
        &sink,
    )
    .unwrap();

    let mut options = Options::new();
    options
        .set("dicdir", dicdir.display())
        .set("model", dicdir.join(MODEL_DEF_FILE).display());
    let mut calc = CostCalculator::open(&options, &sink).unwrap();
    assert!(sink.contains(Level::Error, "is not a binary model"));
    assert_eq!(800, calc.factor());
    assert_eq!(-600, calc.calc("大阪", "名詞,一般,大阪").unwrap());
    assert_eq!(800, calc.calc("の", "助詞,格助詞,の").unwrap());
}

#[test]
fn test_broken_model() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.bin");
    fs::write(&path, b"MazinWeightModel 0.3\n\x00\x01\x02").unwrap();
    let sink = MemorySink::new();
    let result = WeightModel::open(&path, &sink);
    assert!(matches!(result, Err(MazinError::ModelLoad { .. })));
    assert!(sink.contains(Level::Error, "is not a binary model"));
}

#[test]
fn test_missing_model() {
    let dir = tempdir().unwrap();
    let sink = MemorySink::new();
    let result = WeightModel::open(dir.path().join("missing.bin"), &sink);
    assert!(matches!(result, Err(MazinError::ModelLoad { .. })));
}

#[test]
fn test_non_positive_cost_factor() {
    let dir = tempdir().unwrap();
    let dicdir = dir.path();
    write_dicdir(dicdir);
    let sink = MemorySink::new();
    CategoryTable::compile(
        dicdir.join(CHAR_PROPERTY_DEF_FILE),
        dicdir.join(UNK_DEF_FILE),
        dicdir.join(CHAR_PROPERTY_FILE),
        &sink,
    )
    .unwrap();

    let mut options = Options::new();
    options.set("dicdir", dicdir.display()).set("cost-factor", 0);
    assert!(CostCalculator::open(&options, &sink).is_err());
}
