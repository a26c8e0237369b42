use serde::Serialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::test::Test;
use crate::store::{StoreTx, TestLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Tier {
    pub count: i32,
    pub points: i32,
}

impl Tier {
    /// `None` when count × points does not fit in an `i32`.
    pub fn max_points(&self) -> Option<i32> {
        self.count.checked_mul(self.points)
    }
}

/// Sums point values, failing instead of wrapping.
pub fn checked_points_total<I>(points: I) -> Result<i32>
where
    I: IntoIterator<Item = i32>,
{
    points
        .into_iter()
        .try_fold(0i32, |total, p| total.checked_add(p))
        .ok_or_else(|| Error::BadRequest("point total exceeds the supported range".to_string()))
}

/// Everything generation needs about a test, read in one transaction.
#[derive(Debug, Clone, Serialize)]
pub struct TestConfiguration {
    pub test: Test,
    pub tiers: Vec<Tier>,
    pub collection_ids: Vec<Uuid>,
    pub ignored_question_ids: HashSet<Uuid>,
    pub point_overrides: HashMap<Uuid, i32>,
}

impl TestConfiguration {
    /// Σ(count × points) over the configured tiers.
    pub fn configured_max_points(&self) -> Result<i32> {
        let per_tier = self
            .tiers
            .iter()
            .map(|t| {
                t.max_points().ok_or_else(|| {
                    Error::BadRequest(format!(
                        "tier of {} questions worth {} points exceeds the supported range",
                        t.count, t.points
                    ))
                })
            })
            .collect::<Result<Vec<i32>>>()?;
        checked_points_total(per_tier)
    }

    pub fn resolved_points(&self, question_id: Uuid, tier: &Tier) -> i32 {
        self.point_overrides
            .get(&question_id)
            .copied()
            .unwrap_or(tier.points)
    }
}

/// Reads tiers, collections, ignores and overrides for `test_id` through `tx`.
/// Never caches: callers must pass the transaction that will also write.
pub async fn resolve_configuration(
    tx: &mut dyn StoreTx,
    test_id: Uuid,
) -> Result<TestConfiguration> {
    let test = tx
        .find_test_locked(test_id, TestLock::Shared)
        .await?
        .ok_or_else(|| Error::NotFound("test not found".to_string()))?;

    let tiers = tx
        .question_count_requirements(test_id)
        .await?
        .into_iter()
        .map(|r| Tier {
            count: r.number_of_questions,
            points: r.points_per_question,
        })
        .collect();
    let collection_ids = tx.collection_ids(test_id).await?;
    let ignored_question_ids = tx.ignored_question_ids(test_id).await?.into_iter().collect();
    let point_overrides = tx
        .point_overrides(test_id)
        .await?
        .into_iter()
        .map(|o| (o.question_id, o.points))
        .collect();

    Ok(TestConfiguration {
        test,
        tiers,
        collection_ids,
        ignored_question_ids,
        point_overrides,
    })
}
