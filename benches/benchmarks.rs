use std::hint::black_box;

use button_machines::{part1, part2};

// Load inputs at compile time to avoid I/O noise in the benchmark
const INPUT1: &str = include_str!("../input1.txt");
const INPUT2: &str = include_str!("../input2.txt");

fn main() {
    divan::main();
}

#[divan::bench]
fn bench_part1() {
    black_box(part1::process(black_box(INPUT1)).unwrap());
}

#[divan::bench]
fn bench_part2() {
    black_box(part2::process(black_box(INPUT2)).unwrap());
}
