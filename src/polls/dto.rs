use serde::{Deserialize, Serialize};

use super::repo_types::Question;

/// Body of `POST /polls/:id/vote/`.
#[derive(Debug, Default, Deserialize)]
pub struct VoteForm {
    pub choice: Option<String>,
}

/// One row of the index page.
#[derive(Debug, Serialize)]
pub struct QuestionListItem {
    pub id: i64,
    pub question_text: String,
    pub can_vote: bool,
    pub was_published_recently: bool,
}

impl QuestionListItem {
    pub fn new(q: Question, now: time::OffsetDateTime) -> Self {
        Self {
            can_vote: q.can_vote(now),
            was_published_recently: q.was_published_recently(now),
            id: q.id,
            question_text: q.question_text,
        }
    }
}
