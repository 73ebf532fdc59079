pub(crate) mod detector;
pub(crate) mod planner;
pub(crate) mod scorer;
pub(crate) mod stats;
mod types;
pub(crate) mod working;

pub(crate) use detector::{evaluate, ImbalanceReading};
#[cfg(test)]
pub(crate) use detector::needs_rebalancing;
pub(crate) use planner::{plan, plan_with};
pub(crate) use scorer::Algorithm;
pub(crate) use types::*;
