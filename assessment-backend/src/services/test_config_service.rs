use uuid::Uuid;

use crate::dto::config_dto::{
    ReplaceIgnoredQuestionsRequest, ReplacePointOverridesRequest, ReplaceTiersRequest,
};
use crate::error::{Error, Result};
use crate::models::test::{QuestionCountRequirement, QuestionPointOverride, Test};
use crate::services::config_resolver::{resolve_configuration, TestConfiguration};
use crate::store::{SharedStore, StoreTx, TestLock};
use crate::utils::validation::{ensure_unique_ids, validate};

/// Owner-only batch edits of a test's generation settings. Each call deletes
/// the previous set and inserts the new one in a single transaction.
#[derive(Clone)]
pub struct TestConfigService {
    store: SharedStore,
}

impl TestConfigService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn get_configuration(&self, user_id: Uuid, test_id: Uuid) -> Result<TestConfiguration> {
        let mut tx = self.store.begin().await?;
        let config = resolve_configuration(tx.as_mut(), test_id).await?;
        ensure_owner(&config.test, user_id)?;
        Ok(config)
    }

    pub async fn replace_tiers(
        &self,
        user_id: Uuid,
        test_id: Uuid,
        payload: ReplaceTiersRequest,
    ) -> Result<Vec<QuestionCountRequirement>> {
        if payload.tiers.is_empty() {
            return Err(Error::BadRequest("empty tier list".to_string()));
        }
        validate(&payload)?;

        let mut tx = self.store.begin().await?;
        owned_test(tx.as_mut(), user_id, test_id).await?;

        let tiers: Vec<QuestionCountRequirement> = payload
            .tiers
            .into_iter()
            .enumerate()
            .map(|(position, tier)| QuestionCountRequirement {
                id: Uuid::new_v4(),
                test_id,
                position: position as i32,
                number_of_questions: tier.number_of_questions,
                points_per_question: tier.points_per_question,
            })
            .collect();
        tx.replace_requirements(test_id, &tiers).await?;
        tx.commit().await?;

        tracing::info!(test_id = %test_id, tiers = tiers.len(), "question tiers replaced");
        Ok(tiers)
    }

    pub async fn replace_ignored_questions(
        &self,
        user_id: Uuid,
        test_id: Uuid,
        payload: ReplaceIgnoredQuestionsRequest,
    ) -> Result<Vec<Uuid>> {
        validate(&payload)?;
        ensure_unique_ids(payload.question_ids.iter().copied(), "question")?;

        let mut tx = self.store.begin().await?;
        owned_test(tx.as_mut(), user_id, test_id).await?;
        ensure_questions_belong(tx.as_mut(), test_id, &payload.question_ids).await?;

        tx.replace_ignored_questions(test_id, &payload.question_ids).await?;
        tx.commit().await?;

        tracing::info!(
            test_id = %test_id,
            ignored = payload.question_ids.len(),
            "ignored questions replaced"
        );
        Ok(payload.question_ids)
    }

    pub async fn replace_point_overrides(
        &self,
        user_id: Uuid,
        test_id: Uuid,
        payload: ReplacePointOverridesRequest,
    ) -> Result<Vec<QuestionPointOverride>> {
        validate(&payload)?;
        ensure_unique_ids(payload.overrides.iter().map(|o| o.question_id), "question")?;

        let mut tx = self.store.begin().await?;
        owned_test(tx.as_mut(), user_id, test_id).await?;
        let question_ids: Vec<Uuid> = payload.overrides.iter().map(|o| o.question_id).collect();
        ensure_questions_belong(tx.as_mut(), test_id, &question_ids).await?;

        let overrides: Vec<QuestionPointOverride> = payload
            .overrides
            .into_iter()
            .map(|o| QuestionPointOverride {
                test_id,
                question_id: o.question_id,
                points: o.points,
            })
            .collect();
        tx.replace_point_overrides(test_id, &overrides).await?;
        tx.commit().await?;

        tracing::info!(
            test_id = %test_id,
            overrides = overrides.len(),
            "point overrides replaced"
        );
        Ok(overrides)
    }
}

fn ensure_owner(test: &Test, user_id: Uuid) -> Result<()> {
    if test.is_owner(Some(user_id)) {
        Ok(())
    } else {
        tracing::warn!(test_id = %test.id, user_id = %user_id, "test configuration access denied");
        Err(Error::Unauthorized("only the test owner can do this".to_string()))
    }
}

async fn owned_test(tx: &mut dyn StoreTx, user_id: Uuid, test_id: Uuid) -> Result<Test> {
    let test = tx
        .find_test_locked(test_id, TestLock::Exclusive)
        .await?
        .ok_or_else(|| Error::NotFound("test not found".to_string()))?;
    ensure_owner(&test, user_id)?;
    Ok(test)
}

async fn ensure_questions_belong(
    tx: &mut dyn StoreTx,
    test_id: Uuid,
    question_ids: &[Uuid],
) -> Result<()> {
    if question_ids.is_empty() {
        return Ok(());
    }
    let collections = tx.collection_ids(test_id).await?;
    let known = tx.questions_in_collections(&collections, question_ids).await?;
    match question_ids.iter().find(|id| !known.contains(id)) {
        Some(missing) => Err(Error::NotFound(format!(
            "question {} not found in this test",
            missing
        ))),
        None => Ok(()),
    }
}
