//! ラティスのスコア計算と辞書検索のベンチマーク
//!
//! 各位置に長さ1と2の候補を持つ合成ラティスで前向き・後ろ向きアルゴリズムと期待値計算を、
//! 合成辞書で共通接頭辞検索を計測します。

use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mazin::config::Options;
use mazin::diagnostics::MemorySink;
use mazin::dictionary::{DictionaryCompiler, DictionaryKind};
use mazin::lattice::{Lattice, Node, NodeKind};

const NUM_FEATURES: usize = 64;

fn build_lattice(len_char: usize) -> Lattice {
    let mut lattice = Lattice::new(len_char, "BOS/EOS");
    for begin in 0..len_char {
        for len in 1..=2 {
            if begin + len > len_char {
                continue;
            }
            let mut node = Node::new(NodeKind::Normal, "x", "名詞,一般");
            node.fvector = vec![(begin * 7 + len) % NUM_FEATURES];
            lattice
                .add_node(begin, begin + len, node)
                .unwrap();
        }
    }
    lattice.connect_all();
    for p in 0..lattice.num_paths() {
        let path = lattice.path_mut(p);
        path.fvector = vec![(p * 13) % NUM_FEATURES];
        path.cost = ((p * 31) % 17) as f64 / 17.0 - 0.5;
    }
    lattice
}

fn bench_forward_backward(c: &mut Criterion) {
    let mut group = c.benchmark_group("Lattice");
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(5));

    for len_char in [16, 64, 256] {
        let lattice = build_lattice(len_char);
        group.throughput(Throughput::Elements(len_char as u64));
        group.bench_with_input(
            BenchmarkId::new("forward_backward+expectation", len_char),
            &lattice,
            |b, lattice| {
                b.iter_with_setup(
                    || (lattice.clone(), vec![0.0; NUM_FEATURES]),
                    |(mut lattice, mut expected)| {
                        let z = lattice.forward_backward();
                        lattice.expectation(&mut expected, z);
                        expected
                    },
                );
            },
        );
    }
    group.finish();
}

fn bench_common_prefix_search(c: &mut Criterion) {
    let mut source = String::new();
    for a in 'あ'..='ん' {
        for b in 'あ'..='お' {
            source.push_str(&format!("{a}{b},0,0,100,名詞,一般\n{a},0,0,50,助詞,格助詞\n"));
        }
    }
    let options = Options::new();
    let sink = MemorySink::new();
    let mut compiler =
        DictionaryCompiler::new(&options, DictionaryKind::System, &sink).with_id_range(1, 1);
    compiler.add_reader(source.as_bytes(), "bench.csv").unwrap();
    let dict = compiler.compile().unwrap();

    let input: Vec<char> = "あいうえおかきくけこさしすせそ".chars().collect();
    c.bench_function("Dictionary/common_prefix_search", |b| {
        b.iter(|| {
            let mut n = 0;
            for start in 0..input.len() {
                n += dict
                    .common_prefix_search(&input[start..])
                    .map(|(_, tokens)| tokens.len())
                    .sum::<usize>();
            }
            n
        });
    });
}

criterion_group!(benches, bench_forward_backward, bench_common_prefix_search);
criterion_main!(benches);
