//! In-memory stores and request helpers for router-level tests.

use std::{
    net::IpAddr,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request},
    response::Response,
    Router,
};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{
    auth::{
        events::AuthEvents,
        repo::UserStore,
        repo_types::User,
        services::hash_password,
    },
    config::AppConfig,
    polls::{
        repo::PollStore,
        repo_types::{Choice, ChoiceTally, Question, VoteOutcome},
    },
    state::AppState,
};

/// A row of the `votes` table.
struct StoredVote {
    user_id: Uuid,
    question_id: i64,
    choice_id: i64,
}

#[derive(Default)]
struct PollTables {
    questions: Vec<Question>,
    choices: Vec<Choice>,
    votes: Vec<StoredVote>,
}

#[derive(Default)]
pub struct MemoryPollStore {
    tables: Mutex<PollTables>,
}

impl MemoryPollStore {
    pub fn add_question(&self, text: &str, pub_date: OffsetDateTime, end_date: OffsetDateTime) -> Question {
        let mut t = self.tables.lock().unwrap();
        let q = Question {
            id: t.questions.len() as i64 + 1,
            question_text: text.into(),
            pub_date,
            end_date,
        };
        t.questions.push(q.clone());
        q
    }

    pub fn add_choice(&self, question_id: i64, text: &str) -> i64 {
        let mut t = self.tables.lock().unwrap();
        let id = t.choices.len() as i64 + 1;
        t.choices.push(Choice {
            id,
            question_id,
            choice_text: text.into(),
        });
        id
    }

    pub fn vote_count(&self, question_id: i64) -> usize {
        let t = self.tables.lock().unwrap();
        t.votes.iter().filter(|v| v.question_id == question_id).count()
    }

    pub fn votes_for(&self, choice_id: i64) -> usize {
        let t = self.tables.lock().unwrap();
        t.votes.iter().filter(|v| v.choice_id == choice_id).count()
    }
}

#[async_trait]
impl PollStore for MemoryPollStore {
    async fn latest_published(&self, now: OffsetDateTime, limit: i64) -> anyhow::Result<Vec<Question>> {
        let t = self.tables.lock().unwrap();
        let mut rows: Vec<Question> = t
            .questions
            .iter()
            .filter(|q| q.pub_date <= now)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn get_question(&self, id: i64) -> anyhow::Result<Option<Question>> {
        let t = self.tables.lock().unwrap();
        Ok(t.questions.iter().find(|q| q.id == id).cloned())
    }

    async fn choices(&self, question_id: i64) -> anyhow::Result<Vec<Choice>> {
        let t = self.tables.lock().unwrap();
        Ok(t.choices
            .iter()
            .filter(|c| c.question_id == question_id)
            .cloned()
            .collect())
    }

    async fn find_choice(&self, question_id: i64, choice_id: i64) -> anyhow::Result<Option<Choice>> {
        let t = self.tables.lock().unwrap();
        Ok(t.choices
            .iter()
            .find(|c| c.id == choice_id && c.question_id == question_id)
            .cloned())
    }

    async fn tally(&self, question_id: i64) -> anyhow::Result<Vec<ChoiceTally>> {
        let t = self.tables.lock().unwrap();
        Ok(t.choices
            .iter()
            .filter(|c| c.question_id == question_id)
            .map(|c| ChoiceTally {
                id: c.id,
                choice_text: c.choice_text.clone(),
                votes: t.votes.iter().filter(|v| v.choice_id == c.id).count() as i64,
            })
            .collect())
    }

    async fn upsert_vote(&self, user_id: Uuid, choice: &Choice) -> anyhow::Result<VoteOutcome> {
        let mut t = self.tables.lock().unwrap();
        if let Some(v) = t
            .votes
            .iter_mut()
            .find(|v| v.user_id == user_id && v.question_id == choice.question_id)
        {
            v.choice_id = choice.id;
            return Ok(VoteOutcome::Changed);
        }
        t.votes.push(StoredVote {
            user_id,
            question_id: choice.question_id,
            choice_id: choice.id,
        });
        Ok(VoteOutcome::Created)
    }

    async fn user_choice(&self, user_id: Uuid, question_id: i64) -> anyhow::Result<Option<i64>> {
        let t = self.tables.lock().unwrap();
        Ok(t.votes
            .iter()
            .find(|v| v.user_id == user_id && v.question_id == question_id)
            .map(|v| v.choice_id))
    }
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
}

impl MemoryUserStore {
    pub fn add(&self, username: &str, password: &str) -> User {
        let hash = hash_password(password).expect("hash");
        self.insert(username, &hash)
    }

    pub fn contains(&self, username: &str) -> bool {
        self.users.lock().unwrap().iter().any(|u| u.username == username)
    }

    fn insert(&self, username: &str, password_hash: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            username: username.into(),
            password_hash: password_hash.into(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.users.lock().unwrap().push(user.clone());
        user
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn create(&self, username: &str, password_hash: &str) -> anyhow::Result<Option<User>> {
        if self.contains(username) {
            return Ok(None);
        }
        Ok(Some(self.insert(username, password_hash)))
    }
}

/// Remembers auth events as `in:<user>`, `out:<user>` and `failed:<user>`.
#[derive(Default)]
pub struct RecordingAuthEvents {
    seen: Mutex<Vec<String>>,
}

impl RecordingAuthEvents {
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.seen.lock().unwrap())
    }

    fn push(&self, kind: &str, username: &str) {
        self.seen.lock().unwrap().push(format!("{kind}:{username}"));
    }
}

impl AuthEvents for RecordingAuthEvents {
    fn logged_in(&self, username: &str, _client_ip: Option<IpAddr>) {
        self.push("in", username);
    }

    fn logged_out(&self, username: &str, _client_ip: Option<IpAddr>) {
        self.push("out", username);
    }

    fn login_failed(&self, username: &str, _client_ip: Option<IpAddr>) {
        self.push("failed", username);
    }
}

pub struct TestApp {
    pub polls: Arc<MemoryPollStore>,
    pub users: Arc<MemoryUserStore>,
    pub events: Arc<RecordingAuthEvents>,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        let polls = Arc::new(MemoryPollStore::default());
        let users = Arc::new(MemoryUserStore::default());
        let events = Arc::new(RecordingAuthEvents::default());
        let state = AppState::from_parts(
            AppConfig::for_tests(),
            polls.clone(),
            users.clone(),
            events.clone(),
        )
        .expect("test state");
        Self {
            polls,
            users,
            events,
            state,
        }
    }

    pub fn router(&self) -> Router {
        crate::app::build_app(self.state.clone())
    }

    /// A question open for voting with `n` choices named `Choice 0..n`.
    pub fn open_question(&self, n: usize) -> (Question, Vec<i64>) {
        let now = OffsetDateTime::now_utc();
        let q = self
            .polls
            .add_question("Test question", now - Duration::minutes(1), now + Duration::days(5));
        let choices = (0..n)
            .map(|i| self.polls.add_choice(q.id, &format!("Choice {i}")))
            .collect();
        (q, choices)
    }

    /// `Cookie` header value for a freshly created user's session.
    pub fn login_cookie(&self, username: &str) -> String {
        let user = self.users.insert(username, "unused");
        let token = self.state.keys.sign(user.id, &user.username).expect("sign");
        format!("{}={}", self.state.keys.cookie_name, token)
    }
}

pub fn form_post(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut req = Request::post(uri).header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(c) = cookie {
        req = req.header(header::COOKIE, c);
    }
    req.body(Body::from(body.to_owned())).unwrap()
}

pub async fn body_string(res: Response) -> String {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// `name=value` of a non-empty session cookie set by `res`.
pub fn session_cookie_from(res: &Response) -> Option<String> {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .find(|pair| pair.starts_with("pollsite_session=") && pair.len() > "pollsite_session=".len())
        .map(str::to_owned)
}
