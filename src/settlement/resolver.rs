use std::cmp::Ordering;

use crate::types::{FinalScore, Outcome, Wager, WagerResult, WagerSettlement};

/// Match outcome from the final score.
pub fn outcome(score: FinalScore) -> Outcome {
    match score.home.cmp(&score.away) {
        Ordering::Greater => Outcome::Home,
        Ordering::Less => Outcome::Away,
        Ordering::Equal => Outcome::Draw,
    }
}

/// Decide every unsettled wager against `score`. Already-settled wagers produce
/// no decision.
pub fn resolve(score: FinalScore, wagers: &[Wager]) -> Vec<WagerSettlement> {
    let result = outcome(score);
    wagers
        .iter()
        .filter(|w| !w.settled)
        .map(|w| {
            let won = w.prediction == result;
            WagerSettlement {
                wager_id: w.id,
                won,
                result: if won { WagerResult::Won } else { WagerResult::Lost },
            }
        })
        .collect()
}
