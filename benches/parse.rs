use divan::{Bencher, black_box};
use depparse::{
    HeadAssignment, OracleLabeler, Projectivizer, TransitionParser, TreeMerger, TreeStore,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() {
    divan::main();
}

/// Every head points left, so the tree is acyclic but full of crossing arcs
fn synthetic_heads(tokens: usize, seed: usize) -> HeadAssignment {
    let mut heads = HeadAssignment::new(tokens + 1);
    for id in 1..=tokens {
        let head = (id.wrapping_mul(2654435761).wrapping_add(seed) >> 7) % id;
        heads.set(id, head, if head == 0 { "root" } else { "dep" });
    }
    heads
}

fn blank_tree(tokens: usize) -> TreeStore {
    TreeStore::from_tokens((0..tokens).map(|_| ("w", "w", "X")))
}

#[divan::bench(args = [10, 40, 160])]
fn oracle_parse(bencher: Bencher, tokens: usize) {
    let parser = TransitionParser::default();
    let gold = synthetic_heads(tokens, 0);
    bencher.bench_local(|| {
        let mut tree = blank_tree(tokens);
        let mut oracle = OracleLabeler::new(gold.clone()).unwrap();
        black_box(parser.parse(&mut tree, &mut oracle).unwrap());
    });
}

#[divan::bench(args = [10, 40, 160])]
fn projectivize(bencher: Bencher, tokens: usize) {
    let projectivizer = Projectivizer::new("nonproj");
    let gold = synthetic_heads(tokens, 0);
    bencher.bench_local(|| {
        let mut tree = blank_tree(tokens);
        tree.reset_heads(&gold);
        black_box(projectivizer.projectivize(&mut tree));
    });
}

#[divan::bench(args = [10, 40, 160])]
fn merge(bencher: Bencher, tokens: usize) {
    let candidates: Vec<HeadAssignment> =
        (0..5).map(|seed| synthetic_heads(tokens, seed * 977)).collect();
    let merger = TreeMerger::new();
    bencher.bench_local(|| black_box(merger.merge(black_box(&candidates)).unwrap()));
}
