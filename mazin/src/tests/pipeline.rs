use tempfile::tempdir;

use crate::character::CategoryTable;
use crate::common::{
    CHAR_PROPERTY_DEF_FILE, CHAR_PROPERTY_FILE, MATRIX_DEF_FILE, MATRIX_EOS_PENALTY_FILE,
    MATRIX_FILE, MODEL_DEF_FILE, MODEL_FILE, SYS_DIC_FILE, UNK_DEF_FILE, UNK_DIC_FILE,
};
use crate::config::Options;
use crate::connector::MatrixConnector;
use crate::diagnostics::MemorySink;
use crate::dictionary::{Dictionary, DictionaryCompiler, DictionaryKind};
use crate::model::WeightModel;
use crate::tests::resources::write_dicdir;

#[test]
fn test_build_all() {
    let dir = tempdir().unwrap();
    let dicdir = dir.path();
    write_dicdir(dicdir);
    let sink = MemorySink::new();

    let table = CategoryTable::compile(
        dicdir.join(CHAR_PROPERTY_DEF_FILE),
        dicdir.join(UNK_DEF_FILE),
        dicdir.join(CHAR_PROPERTY_FILE),
        &sink,
    )
    .unwrap();
    let loaded = CategoryTable::from_path(dicdir.join(CHAR_PROPERTY_FILE)).unwrap();
    assert_eq!(table.names(), loaded.names());
    assert_eq!(Some("KANJI"), loaded.category_name(loaded.char_info('東').primary()));
    assert_eq!(Some("HIRAGANA"), loaded.category_name(loaded.char_info('の').primary()));

    let model = WeightModel::compile(dicdir.join(MODEL_DEF_FILE), dicdir.join(MODEL_FILE)).unwrap();
    assert_eq!(3, model.len());
    assert_eq!(Some(-1.0), model.feature_weight("W0:助詞"));

    MatrixConnector::compile(
        dicdir.join(MATRIX_DEF_FILE),
        dicdir.join(MATRIX_EOS_PENALTY_FILE),
        dicdir.join(MATRIX_FILE),
        &sink,
    )
    .unwrap();
    let matrix = MatrixConnector::read(std::fs::File::open(dicdir.join(MATRIX_FILE)).unwrap())
        .unwrap();
    assert_eq!((3, 3), (matrix.num_left(), matrix.num_right()));
    assert_eq!(80, matrix.cost(1, 0));
    assert_eq!(-50, matrix.cost(2, 0));
    assert_eq!(60, matrix.cost(2, 1));

    let mut options = Options::new();
    options.set("dicdir", dicdir.display());

    let mut unk = DictionaryCompiler::new(&options, DictionaryKind::Unknown, &sink);
    assert_eq!(4, unk.add_file(dicdir.join(UNK_DEF_FILE)).unwrap());
    unk.compile_to(dicdir.join(UNK_DIC_FILE)).unwrap();

    let mut sys = DictionaryCompiler::new(&options, DictionaryKind::System, &sink);
    assert_eq!((3, 3), sys.id_range());
    assert_eq!(4, sys.add_file(dicdir.join("lex.csv")).unwrap());
    sys.compile_to(dicdir.join(SYS_DIC_FILE)).unwrap();

    let unk = Dictionary::from_path(dicdir.join(UNK_DIC_FILE)).unwrap();
    assert_eq!(DictionaryKind::Unknown, unk.info().kind);
    let kanji = unk.exact_match("KANJI");
    assert_eq!(1, kanji.len());
    assert_eq!((1, 1, 2000), (kanji[0].left_id, kanji[0].right_id, kanji[0].cost));
    assert_eq!("名詞,一般", unk.feature(&kanji[0]));

    let sys = Dictionary::from_path(dicdir.join(SYS_DIC_FILE)).unwrap();
    let info = sys.info();
    assert_eq!(DictionaryKind::System, info.kind);
    assert_eq!(4, info.size);
    assert_eq!((3, 3), (info.lsize, info.rsize));
    assert!(info.filename.ends_with("lex.csv"));

    let tokyo = sys.exact_match("東京");
    assert_eq!(2, tokyo.len());
    assert_eq!(100, tokyo[0].cost);
    assert_eq!(300, tokyo[1].cost);
    assert_eq!("助詞,格助詞,東京", sys.feature(&tokyo[1]));

    let kyoto = sys.exact_match("京都");
    assert_eq!((1, 1, 200), (kyoto[0].left_id, kyoto[0].right_id, kyoto[0].cost));

    let input: Vec<char> = "東京の".chars().collect();
    let matches: Vec<(usize, usize)> = sys
        .common_prefix_search(&input)
        .map(|(end, tokens)| (end, tokens.len()))
        .collect();
    assert_eq!(vec![(2, 2)], matches);
    let input: Vec<char> = "の東京".chars().collect();
    let matches: Vec<usize> = sys.common_prefix_search(&input).map(|(end, _)| end).collect();
    assert_eq!(vec![1], matches);
}

#[test]
fn test_build_user_dictionary() {
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
    WeightModel::compile(dicdir.join(MODEL_DEF_FILE), dicdir.join(MODEL_FILE)).unwrap();

    let mut options = Options::new();
    options
        .set("dicdir", dicdir.display())
        .set("model", dicdir.join(MODEL_FILE).display())
        .set("cost-factor", 800);

    let output = dir.path().join("user.dic");
    let mut user = DictionaryCompiler::new(&options, DictionaryKind::User, &sink);
    user.add_file(dicdir.join("user.csv")).unwrap();
    user.compile_to(&output).unwrap();

    let dict = Dictionary::from_path(&output).unwrap();
    assert_eq!(DictionaryKind::User, dict.info().kind);
    let osaka = dict.exact_match("大阪");
    // W0:名詞 (0.5) + W1:名詞/一般 (0.25)
    assert_eq!((1, 1, -600), (osaka[0].left_id, osaka[0].right_id, osaka[0].cost));
    let kobe = dict.exact_match("神戸");
    assert_eq!(-5, kobe[0].cost);
}

#[test]
fn test_build_user_dictionary_without_model() {
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
    options.set("dicdir", dicdir.display());

    let mut user = DictionaryCompiler::new(&options, DictionaryKind::User, &sink);
    user.add_file(dicdir.join("user.csv")).unwrap();
    let dict = user.compile().unwrap();
    assert_eq!(0, dict.exact_match("大阪")[0].cost);
}

#[test]
fn test_missing_definitions_use_defaults() {
    let dir = tempdir().unwrap();
    let dicdir = dir.path();
    let sink = MemorySink::new();

    let table = CategoryTable::compile(
        dicdir.join(CHAR_PROPERTY_DEF_FILE),
        dicdir.join(UNK_DEF_FILE),
        dicdir.join(CHAR_PROPERTY_FILE),
        &sink,
    )
    .unwrap();
    assert_eq!(2, table.num_categories());

    let matrix = MatrixConnector::compile(
        dicdir.join(MATRIX_DEF_FILE),
        dicdir.join(MATRIX_EOS_PENALTY_FILE),
        dicdir.join(MATRIX_FILE),
        &sink,
    )
    .unwrap();
    assert_eq!((1, 1), (matrix.num_left(), matrix.num_right()));

    let mut options = Options::new();
    options.set("dicdir", dicdir.display());
    let mut unk = DictionaryCompiler::new(&options, DictionaryKind::Unknown, &sink);
    assert_eq!(2, unk.add_file(dicdir.join(UNK_DEF_FILE)).unwrap());
    let dict = unk.compile().unwrap();
    assert_eq!(1, dict.exact_match("SPACE").len());

    let warnings = sink
        .messages()
        .into_iter()
        .filter(|(level, msg)| {
            *level == crate::diagnostics::Level::Warn && msg.contains("minimum setting is used")
        })
        .count();
    assert_eq!(4, warnings);
}
