use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Duration, OffsetDateTime};

/// A poll.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Question {
    pub id: i64,
    pub question_text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub pub_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_date: OffsetDateTime,
}

impl Question {
    pub fn is_published(&self, now: OffsetDateTime) -> bool {
        now >= self.pub_date
    }

    /// Voting is open on both bounds of `[pub_date, end_date]`.
    pub fn can_vote(&self, now: OffsetDateTime) -> bool {
        self.is_published(now) && now <= self.end_date
    }

    pub fn was_published_recently(&self, now: OffsetDateTime) -> bool {
        now - Duration::days(1) <= self.pub_date && self.pub_date <= now
    }
}

/// A selectable answer to a question.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Choice {
    pub id: i64,
    pub question_id: i64,
    pub choice_text: String,
}

/// A choice together with the number of ballots cast for it.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ChoiceTally {
    pub id: i64,
    pub choice_text: String,
    pub votes: i64,
}

/// What a recorded ballot did to the user's previous state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteOutcome {
    Created,
    Changed,
}

impl std::fmt::Display for VoteOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoteOutcome::Created => f.write_str("created"),
            VoteOutcome::Changed => f.write_str("changed"),
        }
    }
}
