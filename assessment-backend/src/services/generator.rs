use std::collections::HashSet;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::session_answer::SessionAnswer;
use crate::models::test_session::TestSession;
use crate::services::config_resolver::TestConfiguration;
use crate::services::sampler::{FillPolicy, Sampler};
use crate::store::StoreTx;

pub struct SessionGenerator<'a> {
    sampler: &'a dyn Sampler,
    fill_policy: FillPolicy,
}

impl<'a> SessionGenerator<'a> {
    pub fn new(sampler: &'a dyn Sampler, fill_policy: FillPolicy) -> Self {
        Self {
            sampler,
            fill_policy,
        }
    }

    /// Draws questions tier by tier and bulk-inserts one placeholder answer
    /// per question. Must run in the transaction that moves `session` to
    /// InProgress.
    pub async fn generate(
        &self,
        tx: &mut dyn StoreTx,
        session: &TestSession,
        config: &TestConfiguration,
    ) -> Result<Vec<SessionAnswer>> {
        if config.tiers.is_empty() {
            return Err(Error::BadRequest(
                "empty tier list: test has no question count requirements".to_string(),
            ));
        }

        // Ignored questions plus everything drawn so far, so a question that
        // matches two tiers lands in the session once.
        let mut excluded: HashSet<Uuid> = config.ignored_question_ids.clone();
        let mut answers: Vec<SessionAnswer> = Vec::new();

        for tier in &config.tiers {
            let requested = tier.count.max(0) as usize;
            if requested == 0 {
                continue;
            }

            let pool = tx
                .questions_by_collections_and_points(&config.collection_ids, tier.points, &excluded)
                .await?;
            let pool_set: HashSet<Uuid> = pool.iter().copied().collect();

            let mut drawn = Vec::with_capacity(requested);
            for id in self.sampler.sample(&pool, requested) {
                if drawn.len() == requested {
                    break;
                }
                if pool_set.contains(&id) && excluded.insert(id) {
                    drawn.push(id);
                }
            }

            tracing::debug!(
                session_id = %session.id,
                points = tier.points,
                requested,
                available = pool.len(),
                drawn = drawn.len(),
                "drew tier"
            );

            if drawn.len() < requested {
                match self.fill_policy {
                    FillPolicy::FailFast => {
                        return Err(Error::BadRequest(format!(
                            "insufficient questions for tier worth {} points: requested {}, available {}",
                            tier.points,
                            requested,
                            drawn.len()
                        )));
                    }
                    FillPolicy::BestEffort => {
                        tracing::warn!(
                            session_id = %session.id,
                            points = tier.points,
                            requested,
                            drawn = drawn.len(),
                            "tier under-filled"
                        );
                    }
                }
            }

            for question_id in drawn {
                let order_index = answers.len() as i32;
                answers.push(SessionAnswer::placeholder(
                    session.id,
                    question_id,
                    order_index,
                    config.resolved_points(question_id, tier),
                ));
            }
        }

        tx.insert_answers(&answers).await?;
        Ok(answers)
    }
}
