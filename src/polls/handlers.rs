use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Router,
};
use time::OffsetDateTime;
use tracing::{instrument, warn};

use crate::{
    auth::{AuthUser, MaybeUser},
    error::{AppError, AppResult},
    flash::{self, Flash, Level},
    state::AppState,
    templates::{page_context, render},
    web,
};

use super::{
    dto::{QuestionListItem, VoteForm},
    repo_types::Question,
    services::{cast_vote, closed_message, Ballot, NO_CHOICE},
};

const INDEX_PATH: &str = "/polls/";

pub fn poll_routes() -> Router<AppState> {
    Router::new()
        .route(INDEX_PATH, get(index))
        .route("/polls/:id/", get(detail))
        .route("/polls/:id/vote/", post(vote))
        .route("/polls/:id/results/", get(results))
}

async fn load_question(state: &AppState, id: i64) -> AppResult<Question> {
    state.polls.get_question(id).await?.ok_or(AppError::NotFound)
}

async fn detail_page(
    state: &AppState,
    user: Option<&AuthUser>,
    flash: &Flash,
    question: &Question,
    error_message: Option<&str>,
) -> AppResult<Response> {
    let choices = state.polls.choices(question.id).await?;
    let selected = match user {
        Some(u) => state.polls.user_choice(u.id, question.id).await?,
        None => None,
    };

    let mut ctx = page_context(user, flash);
    ctx.insert("question", question);
    ctx.insert("choices", &choices);
    ctx.insert("selected_choice", &selected);
    ctx.insert("error_message", &error_message);
    let html = render(&state.templates, "polls/detail.html", &ctx)?;
    Ok((web::set_cookies(flash.consumed()), html).into_response())
}

/// The latest published questions.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    flash: Flash,
) -> AppResult<Response> {
    let now = OffsetDateTime::now_utc();
    let questions = state
        .polls
        .latest_published(now, state.config.index_limit)
        .await?;
    let items: Vec<QuestionListItem> = questions
        .into_iter()
        .map(|q| QuestionListItem::new(q, now))
        .collect();

    let mut ctx = page_context(user.as_ref(), &flash);
    ctx.insert("latest_question_list", &items);
    let html = render(&state.templates, "polls/index.html", &ctx)?;
    Ok((web::set_cookies(flash.consumed()), html).into_response())
}

/// Voting form; questions outside their voting window bounce back to the index.
#[instrument(skip(state, user, flash))]
pub async fn detail(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    flash: Flash,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let question = load_question(&state, id).await?;
    if !question.can_vote(OffsetDateTime::now_utc()) {
        warn!(question_id = id, "detail requested outside voting window");
        return Ok(flash::redirect_with(
            &state.config.session,
            INDEX_PATH,
            Level::Error,
            closed_message(&question),
        ));
    }
    detail_page(&state, user.as_ref(), &flash, &question, None).await
}

#[instrument(skip(state, user, form), fields(user = %user.username))]
pub async fn vote(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    form: Option<Form<VoteForm>>,
) -> AppResult<Response> {
    let question = load_question(&state, id).await?;
    let choice = form.as_ref().and_then(|Form(f)| f.choice.as_deref());

    let ballot = cast_vote(
        state.polls.as_ref(),
        user.id,
        &question,
        choice,
        OffsetDateTime::now_utc(),
    )
    .await?;

    match ballot {
        Ballot::Closed => {
            warn!(question_id = id, "vote outside voting window");
            Ok(flash::redirect_with(
                &state.config.session,
                INDEX_PATH,
                Level::Error,
                closed_message(&question),
            ))
        }
        Ballot::NoChoice => {
            detail_page(&state, Some(&user), &Flash::default(), &question, Some(NO_CHOICE)).await
        }
        Ballot::Recorded(_) => Ok(web::found(&format!("/polls/{}/results/", question.id))),
    }
}

#[instrument(skip(state, user, flash))]
pub async fn results(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    flash: Flash,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let now = OffsetDateTime::now_utc();
    let question = load_question(&state, id).await?;
    if !question.is_published(now) {
        return Err(AppError::NotFound);
    }

    let tally = state.polls.tally(question.id).await?;
    let total: i64 = tally.iter().map(|c| c.votes).sum();

    let mut ctx = page_context(user.as_ref(), &flash);
    ctx.insert("question", &question);
    ctx.insert("choices", &tally);
    ctx.insert("total_votes", &total);
    ctx.insert("can_vote", &question.can_vote(now));
    let html = render(&state.templates, "polls/results.html", &ctx)?;
    Ok((web::set_cookies(flash.consumed()), html).into_response())
}
