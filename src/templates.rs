use anyhow::Context as _;
use axum::response::Html;
use serde::Serialize;
use tera::{Context, Tera};

use crate::{auth::AuthUser, error::AppResult, flash::Flash};

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("polls/index.html", include_str!("../templates/polls/index.html")),
    ("polls/detail.html", include_str!("../templates/polls/detail.html")),
    ("polls/results.html", include_str!("../templates/polls/results.html")),
    ("accounts/login.html", include_str!("../templates/accounts/login.html")),
    ("accounts/signup.html", include_str!("../templates/accounts/signup.html")),
];

/// Builds the engine from the templates compiled into the binary.
pub fn engine() -> anyhow::Result<Tera> {
    let mut tera = Tera::default();
    tera.add_raw_templates(TEMPLATES.iter().copied())
        .context("parse templates")?;
    Ok(tera)
}

#[derive(Debug, Serialize)]
struct UserContext<'a> {
    username: &'a str,
    is_authenticated: bool,
}

/// Context every page extends: the current user and pending flash messages.
pub fn page_context(user: Option<&AuthUser>, flash: &Flash) -> Context {
    let mut ctx = Context::new();
    ctx.insert(
        "user",
        &user.map(|u| UserContext {
            username: &u.username,
            is_authenticated: true,
        }),
    );
    ctx.insert("messages", &flash.0);
    ctx
}

pub fn render(tera: &Tera, name: &str, ctx: &Context) -> AppResult<Html<String>> {
    Ok(Html(tera.render(name, ctx)?))
}
