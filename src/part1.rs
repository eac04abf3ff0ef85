use std::collections::HashMap;

use chumsky::prelude::*;
use miette::{bail, miette, Result};

/// A machine's indicator lights: the target bit pattern and the mask of
/// lights each button toggles.
#[derive(Debug)]
struct Machine {
    target: u64,
    buttons: Vec<u64>,
}

/// Raw machine line before validation: the light diagram and one index
/// list per button.
type RawMachine = (Vec<bool>, Vec<Vec<usize>>);

fn parser<'a>() -> impl Parser<'a, &'a str, Vec<RawMachine>, extra::Err<Rich<'a, char>>> {
    let hspace = one_of(" \t").repeated();

    let light = choice((just('.').to(false), just('#').to(true)));

    // [.##.]
    let diagram = light
        .repeated()
        .collect::<Vec<bool>>()
        .delimited_by(just('['), just(']'));

    // (0,2,3)
    let indices = text::int(10)
        .from_str::<usize>()
        .unwrapped()
        .separated_by(just(','))
        .collect::<Vec<usize>>()
        .delimited_by(just('('), just(')'));

    let buttons = indices.padded_by(hspace).repeated().collect::<Vec<_>>();

    // {3,5,4} is the part-two joltage block; ignored here
    let joltage = none_of("}")
        .repeated()
        .delimited_by(just('{'), just('}'))
        .ignored();

    let machine = diagram
        .then_ignore(hspace)
        .then(buttons)
        .then_ignore(joltage.or_not().padded_by(hspace));

    machine
        .separated_by(text::newline())
        .allow_trailing()
        .collect()
}

fn build_machine((lights, raw_buttons): RawMachine) -> Result<Machine> {
    let len = lights.len();
    if len > 64 {
        bail!("malformed machine: {len} lights exceed the 64-bit mask");
    }

    let target = lights
        .iter()
        .enumerate()
        .fold(0_u64, |mask, (i, &on)| mask | ((on as u64) << i));

    let mut buttons = Vec::with_capacity(raw_buttons.len());
    for indices in raw_buttons {
        let mut mask = 0_u64;
        for i in indices {
            if i >= len {
                bail!("malformed machine: button toggles light {i} but the machine only has {len}");
            }
            mask |= 1 << i;
        }
        buttons.push(mask);
    }

    if buttons.is_empty() && target != 0 {
        bail!("malformed machine: no buttons but a non-zero target");
    }

    Ok(Machine { target, buttons })
}

/// Minimum press count for every XOR value reachable from one half of the
/// buttons.
///
/// The half is enumerated by a plain binary counter whose running XOR is
/// updated incrementally: step `index` flips exactly the button at
/// `index.trailing_zeros()`, so the accumulated value belongs to the subset
/// `index ^ (index >> 1)` (the Gray code of the counter) and its press
/// count is that subset's popcount.
fn half_xor_table(buttons: &[u64]) -> HashMap<u64, u32> {
    let mut table = HashMap::with_capacity(1 << buttons.len());
    table.insert(0_u64, 0_u32);

    let mut accumulated = 0_u64;
    for index in 1_u64..(1_u64 << buttons.len()) {
        accumulated ^= buttons[index.trailing_zeros() as usize];
        let presses = (index ^ (index >> 1)).count_ones();
        table
            .entry(accumulated)
            .and_modify(|min| *min = (*min).min(presses))
            .or_insert(presses);
    }
    table
}

/// Minimum number of button presses whose combined toggles equal the
/// target, or `None` when no subset reaches it.
///
/// Pressing a button twice cancels out, so each button is pressed at most
/// once and the answer is the smallest subset XOR-ing to the target. Meet
/// in the middle brings the cost to O(2^(n/2)) time and space.
fn min_presses(machine: &Machine) -> Option<u32> {
    if machine.target == 0 {
        return Some(0);
    }

    let mid = machine.buttons.len() / 2;
    let left = half_xor_table(&machine.buttons[..mid]);
    let right = half_xor_table(&machine.buttons[mid..]);

    let mut best: Option<u32> = None;
    for (xor, presses) in right {
        if let Some(&left_presses) = left.get(&(machine.target ^ xor)) {
            let total = presses + left_presses;
            best = Some(best.map_or(total, |b| b.min(total)));
        }
    }
    best
}

#[tracing::instrument]
pub fn process(input: &str) -> Result<String> {
    let records = parser()
        .parse(input)
        .into_result()
        .map_err(|e| miette!("Parse failed: {:?}", e))?;

    let machines = records
        .into_iter()
        .map(build_machine)
        .collect::<Result<Vec<_>>>()?;

    let total: u64 = machines
        .iter()
        .map(|machine| min_presses(machine).map_or(0, u64::from))
        .sum();

    Ok(total.to_string())
}
