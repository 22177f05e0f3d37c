#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Temperature schedule for simulated annealing
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "with-serde", derive(Deserialize, Serialize))]
pub enum Annealing {
    /// Constant temperature of 1
    #[default]
    Flat,
    /// Geometric decrease from `start` to `stop` over the first `iters` iterations
    ///
    /// The annealed iterations are split in `ANNEAL_STAGES` equal stages, each with a constant
    /// temperature. Iterations past `iters` run at temperature 1.
    Stepped { iters: usize, start: f64, stop: f64 },
}

impl Annealing {
    pub fn stepped(iters: usize, start: f64, stop: f64) -> Result<Self> {
        let schedule = Annealing::Stepped { iters, start, stop };
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            Annealing::Flat => Ok(()),
            Annealing::Stepped { start, stop, .. } => {
                for (name, temp) in [("start", start), ("stop", stop)] {
                    if !(temp.is_finite() && temp > 0.0) {
                        return Err(Error::config(format!(
                            "annealing {} temperature must be positive, got {}",
                            name, temp
                        )));
                    }
                }
                Ok(())
            }
        }
    }

    /// Temperature to use at the given (0-based) iteration
    pub fn temperature_at(&self, iteration: usize) -> f64 {
        let (iters, start, stop) = match *self {
            Annealing::Flat => return 1.0,
            Annealing::Stepped { iters, start, stop } => (iters, start, stop),
        };

        if iteration >= iters {
            return 1.0;
        }

        let stage_len = (iters as f64 / ANNEAL_STAGES as f64).max(1.0);
        let stage = ((iteration as f64 / stage_len) as usize).min(ANNEAL_STAGES - 1);
        let frac = stage as f64 / (ANNEAL_STAGES - 1) as f64;
        start * (stop / start).powf(frac)
    }
}

const ANNEAL_STAGES: usize = 10;
