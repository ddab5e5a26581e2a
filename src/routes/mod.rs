//! API routes
//!
//! The HTTP face of the tutor: any front end can render a session, offer the
//! quick-question grid, and disable input while `state` is `pending`.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::config::QuickQuestion;
use crate::conversation::{ProfileChange, TurnError};
use crate::core::moon::{self, MoonReport};
use crate::core::{IgnoreReason, SessionView, SubmitOutcome, TutorSession};
use crate::AppState;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("No quick question at index {0}")]
    QuickQuestionNotFound(usize),

    #[error("Unknown class label: {0}")]
    UnknownClass(String),

    #[error("Invalid turn: {0}")]
    InvalidTurn(#[from] TurnError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::SessionNotFound(_) | ApiError::QuickQuestionNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ApiError::UnknownClass(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidTurn(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    active_sessions: usize,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<IgnoreReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    pub session: SessionView,
}

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    #[serde(default)]
    pub name: String,
    /// Keeps the current class when absent
    #[serde(default)]
    pub class_label: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub change: ProfileChange,
    pub session: SessionView,
}

#[derive(Debug, Serialize)]
struct QuickQuestionEntry<'a> {
    index: usize,
    #[serde(flatten)]
    question: &'a QuickQuestion,
}

#[derive(Debug, Deserialize)]
pub struct MoonQuery {
    pub date: Option<NaiveDate>,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        active_sessions: state.sessions.len().await,
    })
}

async fn classes(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.config.classes.labels().to_vec())
}

async fn quick_questions(State(state): State<AppState>) -> Response {
    let entries: Vec<QuickQuestionEntry<'_>> = state
        .persona
        .quick_questions()
        .iter()
        .enumerate()
        .map(|(index, question)| QuickQuestionEntry { index, question })
        .collect();
    Json(entries).into_response()
}

async fn moon_today(Query(query): Query<MoonQuery>) -> Json<MoonReport> {
    let date = query.date.unwrap_or_else(|| Local::now().date_naive());
    Json(moon::report_for(date))
}

async fn find_session(
    state: &AppState,
    id: Uuid,
) -> Result<std::sync::Arc<TutorSession>, ApiError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or(ApiError::SessionNotFound(id))
}

async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionView>) {
    let session = state.sessions.insert(state.open_session()).await;
    (StatusCode::CREATED, Json(session.view().await))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let session = find_session(&state, id).await?;
    Ok(Json(session.view().await))
}

async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.sessions.remove(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::SessionNotFound(id))
    }
}

async fn submit_text(
    session: &TutorSession,
    text: &str,
) -> Result<Json<SubmitResponse>, ApiError> {
    let outcome = session.submit(text).await?;

    let kind = outcome.kind();
    let (reason, reply) = match outcome {
        SubmitOutcome::Ignored(reason) => (Some(reason), None),
        SubmitOutcome::Answered { reply } => (None, Some(reply)),
        SubmitOutcome::Recovered { notice, .. } => (None, Some(notice)),
        SubmitOutcome::Discarded => (None, None),
    };

    Ok(Json(SubmitResponse {
        outcome: kind,
        reason,
        reply,
        session: session.view().await,
    }))
}

async fn post_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let session = find_session(&state, id).await?;
    submit_text(&session, &request.text).await
}

async fn post_quick_question(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let session = find_session(&state, id).await?;
    let question = state
        .persona
        .quick_question(index)
        .ok_or(ApiError::QuickQuestionNotFound(index))?;
    submit_text(&session, &question.question).await
}

async fn put_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ProfileRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let session = find_session(&state, id).await?;

    let class_label = match request.class_label {
        Some(raw) => state
            .config
            .classes
            .label(&raw)
            .ok_or(ApiError::UnknownClass(raw))?,
        None => session.view().await.profile.class_label,
    };

    let change = session.set_profile(&request.name, class_label).await;
    Ok(Json(ProfileResponse {
        change,
        session: session.view().await,
    }))
}

async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let session = find_session(&state, id).await?;
    session.reset().await;
    Ok(Json(session.view().await))
}

async fn export_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let session = find_session(&state, id).await?;
    let export = session.export(Local::now().date_naive()).await;

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&export.filename),
            ),
        ],
        export.body,
    )
        .into_response())
}

/// `attachment` with an ASCII fallback plus the RFC 5987 UTF-8 name.
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| if c.is_ascii_graphic() && c != '"' && c != '\\' { c } else { '_' })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/v1/classes", get(classes))
        .route("/v1/quick-questions", get(quick_questions))
        .route("/v1/moon", get(moon_today))
        .route("/v1/sessions", post(create_session))
        .route("/v1/sessions/:id", get(get_session).delete(end_session))
        .route("/v1/sessions/:id/messages", post(post_message))
        .route("/v1/sessions/:id/quick/:index", post(post_quick_question))
        .route("/v1/sessions/:id/profile", put(put_profile))
        .route("/v1/sessions/:id/reset", post(reset_session))
        .route("/v1/sessions/:id/export", get(export_session))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::{Config, Persona};
    use crate::providers::testing::ScriptedProvider;

    fn app(provider: ScriptedProvider) -> Router {
        let state = AppState::new(Config::for_tests(), Persona::builtin(), Arc::new(provider));
        router().with_state(state)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn create(app: &Router) -> String {
        let (status, body) = send(app, "POST", "/v1/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(ScriptedProvider::new());
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["active_sessions"], 0);

        create(&app).await;
        let (_, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(body["active_sessions"], 1);
    }

    #[tokio::test]
    async fn test_new_session_shows_greeting_only() {
        let app = app(ScriptedProvider::new());
        let id = create(&app).await;

        let (status, body) = send(&app, "GET", &format!("/v1/sessions/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "idle");
        assert_eq!(body["turns"].as_array().unwrap().len(), 1);
        assert_eq!(body["turns"][0]["role"], "assistant");
        assert_eq!(body["profile"]["class_label"], "1");
    }

    #[tokio::test]
    async fn test_submit_message() {
        let app = app(ScriptedProvider::new().reply("It's a waxing moon!"));
        let id = create(&app).await;

        let (status, body) = send(
            &app,
            "POST",
            &format!("/v1/sessions/{}/messages", id),
            Some(json!({ "text": "What shape is the moon today?" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "answered");
        assert_eq!(body["reply"], "It's a waxing moon!");
        let turns = body["session"]["turns"].as_array().unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1]["role"], "user");
    }

    #[tokio::test]
    async fn test_blank_message_is_ignored() {
        let app = app(ScriptedProvider::new());
        let id = create(&app).await;

        let (status, body) = send(
            &app,
            "POST",
            &format!("/v1/sessions/{}/messages", id),
            Some(json!({ "text": "   " })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "ignored");
        assert_eq!(body["reason"], "blank");
        assert_eq!(body["session"]["turns"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_quick_question() {
        let app = app(ScriptedProvider::new().reply("Because of sunlight!"));
        let id = create(&app).await;

        let (status, body) = send(&app, "POST", &format!("/v1/sessions/{}/quick/4", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["session"]["turns"][1]["content"],
            "Explain why the moon's shape changes"
        );

        let (status, _) = send(&app, "POST", &format!("/v1/sessions/{}/quick/99", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_profile_and_export() {
        let app = app(ScriptedProvider::new().reply("Hi Mina, it's a full moon!"));
        let id = create(&app).await;

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/v1/sessions/{}/profile", id),
            Some(json!({ "name": "Mina", "class_label": "2" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["change"], "prompt_regenerated");
        assert_eq!(body["session"]["profile"]["name"], "Mina");

        send(
            &app,
            "POST",
            &format!("/v1/sessions/{}/messages", id),
            Some(json!({ "text": "What moon is it?" })),
        )
        .await;

        let request = Request::builder()
            .uri(format!("/v1/sessions/{}/export", id))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.starts_with("attachment; filename=\"moon_exploration_Mina_"));

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("Mina: What moon is it?"));
        assert!(text.contains("Dr. Luna: Hi Mina, it's a full moon!"));
        assert!(!text.contains("[Rules]"));
    }

    #[tokio::test]
    async fn test_unknown_class_is_rejected() {
        let app = app(ScriptedProvider::new());
        let id = create(&app).await;

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/v1/sessions/{}/profile", id),
            Some(json!({ "name": "Mina", "class_label": "9" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("9"));
    }

    #[tokio::test]
    async fn test_reset_and_end_session() {
        let app = app(ScriptedProvider::new().reply("answer"));
        let id = create(&app).await;
        send(
            &app,
            "POST",
            &format!("/v1/sessions/{}/messages", id),
            Some(json!({ "text": "question" })),
        )
        .await;

        let (status, body) = send(&app, "POST", &format!("/v1/sessions/{}/reset", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["turns"].as_array().unwrap().len(), 1);

        let (status, _) = send(&app, "DELETE", &format!("/v1/sessions/{}", id), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, "GET", &format!("/v1/sessions/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_catalog_endpoints() {
        let app = app(ScriptedProvider::new());

        let (_, classes) = send(&app, "GET", "/v1/classes", None).await;
        assert_eq!(classes, json!(["1", "2", "3", "4"]));

        let (_, questions) = send(&app, "GET", "/v1/quick-questions", None).await;
        assert_eq!(questions.as_array().unwrap().len(), 13);
        assert_eq!(questions[0]["index"], 0);
        assert_eq!(questions[0]["label"], "🌙 Today's moon");

        let (status, moon) = send(&app, "GET", "/v1/moon?date=2025-09-07", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(moon["phase"], "full_moon");
        assert_eq!(moon["date"], "2025-09-07");
    }

    #[test]
    fn test_content_disposition_encodes_unicode() {
        let value = content_disposition("달탐구_민아_2025-09-03.txt");
        assert!(value.starts_with("attachment; filename=\"_"));
        assert!(value.contains("filename*=UTF-8''%EB%8B%AC"));
        assert!(value.is_ascii());
    }

    #[test]
    fn test_content_disposition_escapes_spaces_and_quotes() {
        let value = content_disposition("Mina's moon notes.txt");
        assert!(value.starts_with("attachment; filename=\"Mina's_moon_notes.txt\""));
        assert!(value.ends_with("filename*=UTF-8''Mina%27s%20moon%20notes.txt"));
    }
}
