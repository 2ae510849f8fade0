use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{Choice, ChoiceTally, Question, VoteOutcome};

#[async_trait]
pub trait PollStore: Send + Sync {
    /// Most recent questions with `pub_date <= now`, newest first.
    async fn latest_published(&self, now: OffsetDateTime, limit: i64)
        -> anyhow::Result<Vec<Question>>;
    async fn get_question(&self, id: i64) -> anyhow::Result<Option<Question>>;
    async fn choices(&self, question_id: i64) -> anyhow::Result<Vec<Choice>>;
    /// Looks a choice up only among the given question's choices.
    async fn find_choice(&self, question_id: i64, choice_id: i64)
        -> anyhow::Result<Option<Choice>>;
    async fn tally(&self, question_id: i64) -> anyhow::Result<Vec<ChoiceTally>>;
    /// Records `user_id`'s ballot on the choice's question, replacing any earlier one.
    async fn upsert_vote(&self, user_id: Uuid, choice: &Choice) -> anyhow::Result<VoteOutcome>;
    async fn user_choice(&self, user_id: Uuid, question_id: i64) -> anyhow::Result<Option<i64>>;
}

#[derive(Clone)]
pub struct PgPollStore {
    db: PgPool,
}

impl PgPollStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PollStore for PgPollStore {
    async fn latest_published(
        &self,
        now: OffsetDateTime,
        limit: i64,
    ) -> anyhow::Result<Vec<Question>> {
        let rows = sqlx::query_as::<_, Question>(
            r#"
            SELECT id, question_text, pub_date, end_date
              FROM questions
             WHERE pub_date <= $1
             ORDER BY pub_date DESC
             LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .context("list published questions")?;
        Ok(rows)
    }

    async fn get_question(&self, id: i64) -> anyhow::Result<Option<Question>> {
        let row = sqlx::query_as::<_, Question>(
            r#"
            SELECT id, question_text, pub_date, end_date
              FROM questions
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("get question")?;
        Ok(row)
    }

    async fn choices(&self, question_id: i64) -> anyhow::Result<Vec<Choice>> {
        let rows = sqlx::query_as::<_, Choice>(
            r#"
            SELECT id, question_id, choice_text
              FROM choices
             WHERE question_id = $1
             ORDER BY id ASC
            "#,
        )
        .bind(question_id)
        .fetch_all(&self.db)
        .await
        .context("list choices")?;
        Ok(rows)
    }

    async fn find_choice(
        &self,
        question_id: i64,
        choice_id: i64,
    ) -> anyhow::Result<Option<Choice>> {
        let row = sqlx::query_as::<_, Choice>(
            r#"
            SELECT id, question_id, choice_text
              FROM choices
             WHERE id = $1 AND question_id = $2
            "#,
        )
        .bind(choice_id)
        .bind(question_id)
        .fetch_optional(&self.db)
        .await
        .context("find choice")?;
        Ok(row)
    }

    async fn tally(&self, question_id: i64) -> anyhow::Result<Vec<ChoiceTally>> {
        let rows = sqlx::query_as::<_, ChoiceTally>(
            r#"
            SELECT c.id, c.choice_text, COUNT(v.id) AS votes
              FROM choices c
              LEFT JOIN votes v ON v.choice_id = c.id
             WHERE c.question_id = $1
             GROUP BY c.id, c.choice_text
             ORDER BY c.id ASC
            "#,
        )
        .bind(question_id)
        .fetch_all(&self.db)
        .await
        .context("tally votes")?;
        Ok(rows)
    }

    async fn upsert_vote(&self, user_id: Uuid, choice: &Choice) -> anyhow::Result<VoteOutcome> {
        // xmax is 0 only for a freshly inserted tuple
        let (inserted,): (bool,) = sqlx::query_as(
            r#"
            INSERT INTO votes (user_id, question_id, choice_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, question_id)
            DO UPDATE SET choice_id = EXCLUDED.choice_id, updated_at = now()
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(user_id)
        .bind(choice.question_id)
        .bind(choice.id)
        .fetch_one(&self.db)
        .await
        .context("upsert vote")?;

        Ok(if inserted {
            VoteOutcome::Created
        } else {
            VoteOutcome::Changed
        })
    }

    async fn user_choice(&self, user_id: Uuid, question_id: i64) -> anyhow::Result<Option<i64>> {
        let row = sqlx::query_as::<_, (i64,)>(
            r#"
            SELECT choice_id
              FROM votes
             WHERE user_id = $1 AND question_id = $2
            "#,
        )
        .bind(user_id)
        .bind(question_id)
        .fetch_optional(&self.db)
        .await
        .context("get user ballot")?;
        Ok(row.map(|(id,)| id))
    }
}
