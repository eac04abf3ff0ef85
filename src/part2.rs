use chumsky::prelude::*;
use miette::{miette, Result};
use rayon::prelude::*;

use crate::matrix::RationalMatrix;
use crate::search::{minimum_total_presses, SearchProblem};

/// A machine's joltage counters: the target value per counter and, per
/// button, the list of counters it increments by one each press.
#[derive(Debug)]
struct Machine {
    targets: Vec<i64>,
    buttons: Vec<Vec<usize>>,
}

fn parser<'a>() -> impl Parser<'a, &'a str, Vec<Machine>, extra::Err<Rich<'a, char>>> {
    let hspace = one_of(" \t").repeated();

    // [.##.] is the part-one light diagram; ignored here
    let diagram = none_of("]")
        .repeated()
        .delimited_by(just('['), just(']'))
        .ignored();

    // (0,2,3)
    let indices = text::int(10)
        .from_str::<usize>()
        .unwrapped()
        .separated_by(just(','))
        .collect::<Vec<usize>>()
        .delimited_by(just('('), just(')'));

    let buttons = indices.padded_by(hspace).repeated().collect::<Vec<_>>();

    // {3,5,4}
    let targets = text::int(10)
        .from_str::<i64>()
        .unwrapped()
        .separated_by(just(','))
        .collect::<Vec<i64>>()
        .delimited_by(just('{'), just('}'));

    let machine = diagram
        .then_ignore(hspace)
        .ignore_then(buttons)
        .then(targets)
        .map(|(buttons, targets)| Machine { targets, buttons });

    machine
        .separated_by(text::newline())
        .allow_trailing()
        .collect()
}

/// Minimum total presses for one machine, or `None` when the target is
/// unreachable.
///
/// Reduces the button-incidence system to RREF; an inconsistent system is
/// unreachable outright, otherwise the free variables are searched for the
/// cheapest non-negative integer solution.
fn solve(machine: &Machine) -> Result<Option<u64>> {
    let mut matrix = RationalMatrix::from_buttons(&machine.targets, &machine.buttons)?;
    if !matrix.reduce()? {
        return Ok(None);
    }
    minimum_total_presses(&SearchProblem::from_matrix(&matrix))
}

#[tracing::instrument]
pub fn process(input: &str) -> Result<String> {
    let machines = parser()
        .parse(input)
        .into_result()
        .map_err(|e| miette!("Parse failed: {:?}", e))?;

    // Machines are independent; solve them in parallel and treat an
    // unreachable target as contributing nothing.
    let totals = machines
        .par_iter()
        .map(solve)
        .collect::<Result<Vec<_>>>()?;

    let total: u64 = totals.into_iter().map(|t| t.unwrap_or(0)).sum();
    Ok(total.to_string())
}
