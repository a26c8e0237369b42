use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Mutex;
use uuid::Uuid;

/// Draws `n` distinct ids from `pool`. Returning fewer than `n` is allowed
/// when the pool is smaller; callers decide whether that is acceptable.
#[cfg_attr(test, mockall::automock)]
pub trait Sampler: Send + Sync {
    fn sample(&self, pool: &[Uuid], n: usize) -> Vec<Uuid>;
}

/// Uniform sampling without replacement, in random draw order.
pub struct RandomSampler {
    rng: Mutex<StdRng>,
}

impl RandomSampler {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for RandomSampler {
    fn sample(&self, pool: &[Uuid], n: usize) -> Vec<Uuid> {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let mut picked: Vec<Uuid> = pool.choose_multiple(&mut *rng, n).copied().collect();
        picked.shuffle(&mut *rng);
        picked
    }
}

/// What to do when a tier asks for more questions than its pool holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// Take everything available and carry on.
    #[default]
    BestEffort,
    /// Abort generation.
    FailFast,
}

impl FromStr for FillPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best_effort" | "partial" => Ok(Self::BestEffort),
            "fail_fast" | "strict" => Ok(Self::FailFast),
            other => Err(format!("unknown fill policy '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn pool(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn draws_distinct_members_of_the_pool() {
        let sampler = RandomSampler::seeded(7);
        let pool = pool(10);
        let picked = sampler.sample(&pool, 4);
        assert_eq!(picked.len(), 4);
        let unique: HashSet<_> = picked.iter().collect();
        assert_eq!(unique.len(), 4);
        assert!(picked.iter().all(|id| pool.contains(id)));
    }

    #[test]
    fn short_pool_yields_everything_it_has() {
        let sampler = RandomSampler::seeded(1);
        let pool = pool(3);
        let picked: HashSet<_> = sampler.sample(&pool, 5).into_iter().collect();
        assert_eq!(picked, pool.into_iter().collect());
    }

    #[test]
    fn zero_requested_or_empty_pool_is_empty() {
        let sampler = RandomSampler::seeded(3);
        assert!(sampler.sample(&pool(4), 0).is_empty());
        assert!(sampler.sample(&[], 3).is_empty());
    }

    #[test]
    fn every_member_is_eventually_drawn() {
        let sampler = RandomSampler::seeded(42);
        let pool = pool(6);
        let mut seen = HashSet::new();
        for _ in 0..200 {
            seen.extend(sampler.sample(&pool, 1));
        }
        assert_eq!(seen.len(), pool.len());
    }

    #[test]
    fn parses_fill_policy() {
        assert_eq!("best_effort".parse::<FillPolicy>(), Ok(FillPolicy::BestEffort));
        assert_eq!("FAIL_FAST".parse::<FillPolicy>(), Ok(FillPolicy::FailFast));
        assert!("sometimes".parse::<FillPolicy>().is_err());
    }
}
