pub mod fraction;
pub mod matrix;
pub mod part1;
pub mod part2;
pub mod search;
