use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::{
    repo::PollStore,
    repo_types::{Question, VoteOutcome},
};

pub const NO_CHOICE: &str = "You didn't select a choice.";

/// Result of a ballot submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ballot {
    /// Voting window is not open; nothing recorded.
    Closed,
    /// Missing, malformed or foreign choice id; nothing recorded.
    NoChoice,
    Recorded(VoteOutcome),
}

pub fn closed_message(question: &Question) -> String {
    format!(
        "Error: poll \"{}\" is no longer publish.",
        question.question_text
    )
}

/// Records `user_id`'s ballot for the submitted `choice` of `question`.
///
/// A user who already voted on the question has their ballot moved to the new
/// choice; the store does this in a single upsert.
pub async fn cast_vote(
    store: &dyn PollStore,
    user_id: Uuid,
    question: &Question,
    choice: Option<&str>,
    now: OffsetDateTime,
) -> anyhow::Result<Ballot> {
    if !question.can_vote(now) {
        return Ok(Ballot::Closed);
    }

    let Some(choice_id) = choice.and_then(|c| c.trim().parse::<i64>().ok()) else {
        return Ok(Ballot::NoChoice);
    };
    let Some(choice) = store.find_choice(question.id, choice_id).await? else {
        return Ok(Ballot::NoChoice);
    };

    let outcome = store.upsert_vote(user_id, &choice).await?;
    info!(%user_id, question_id = question.id, choice_id, %outcome, "vote recorded");
    Ok(Ballot::Recorded(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryPollStore;
    use time::Duration;

    fn setup(pub_offset: Duration, end_offset: Duration) -> (MemoryPollStore, Question, Vec<i64>) {
        let store = MemoryPollStore::default();
        let now = OffsetDateTime::now_utc();
        let q = store.add_question("Test question", now + pub_offset, now + end_offset);
        let choices = (0..3)
            .map(|i| store.add_choice(q.id, &format!("Choice {i}")))
            .collect();
        (store, q, choices)
    }

    #[tokio::test]
    async fn first_vote_is_created_then_changed() {
        let (store, q, choices) = setup(-Duration::days(1), Duration::days(5));
        let user = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        let first = cast_vote(&store, user, &q, Some(choices[0].to_string().as_str()), now)
            .await
            .unwrap();
        assert_eq!(first, Ballot::Recorded(VoteOutcome::Created));

        let second = cast_vote(&store, user, &q, Some(choices[2].to_string().as_str()), now)
            .await
            .unwrap();
        assert_eq!(second, Ballot::Recorded(VoteOutcome::Changed));

        assert_eq!(store.vote_count(q.id), 1);
        assert_eq!(store.votes_for(choices[0]), 0);
        assert_eq!(store.votes_for(choices[2]), 1);
    }

    #[tokio::test]
    async fn missing_or_bad_choice_records_nothing() {
        let (store, q, _) = setup(-Duration::days(1), Duration::days(5));
        let user = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        for choice in [None, Some(""), Some("abc"), Some("999999")] {
            let ballot = cast_vote(&store, user, &q, choice, now).await.unwrap();
            assert_eq!(ballot, Ballot::NoChoice, "choice {choice:?}");
        }
        assert_eq!(store.vote_count(q.id), 0);
    }

    #[tokio::test]
    async fn choice_of_another_question_is_rejected() {
        let (store, q, _) = setup(-Duration::days(1), Duration::days(5));
        let now = OffsetDateTime::now_utc();
        let other = store.add_question("Other", now - Duration::days(1), now + Duration::days(1));
        let foreign = store.add_choice(other.id, "elsewhere");

        let ballot = cast_vote(&store, Uuid::new_v4(), &q, Some(foreign.to_string().as_str()), now)
            .await
            .unwrap();
        assert_eq!(ballot, Ballot::NoChoice);
        assert_eq!(store.votes_for(foreign), 0);
    }

    #[tokio::test]
    async fn closed_questions_refuse_ballots() {
        let now = OffsetDateTime::now_utc();
        for (p, e) in [
            (Duration::days(1), Duration::days(10)),
            (-Duration::days(10), -Duration::days(1)),
        ] {
            let (store, q, choices) = setup(p, e);
            let ballot = cast_vote(&store, Uuid::new_v4(), &q, Some(choices[0].to_string().as_str()), now)
                .await
                .unwrap();
            assert_eq!(ballot, Ballot::Closed);
            assert_eq!(store.vote_count(q.id), 0);
        }
    }

    #[tokio::test]
    async fn ballots_from_different_users_are_separate() {
        let (store, q, choices) = setup(-Duration::days(1), Duration::days(5));
        let now = OffsetDateTime::now_utc();
        for _ in 0..3 {
            cast_vote(&store, Uuid::new_v4(), &q, Some(choices[1].to_string().as_str()), now)
                .await
                .unwrap();
        }
        assert_eq!(store.votes_for(choices[1]), 3);
    }

    #[test]
    fn closed_message_names_the_poll() {
        let now = OffsetDateTime::now_utc();
        let q = Question {
            id: 1,
            question_text: "Best editor?".into(),
            pub_date: now,
            end_date: now,
        };
        assert_eq!(closed_message(&q), "Error: poll \"Best editor?\" is no longer publish.");
    }
}
