//! HTTP route handlers: health and the form page.

use std::sync::Arc;

use axum::extract::rejection::FormRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::{Form, Json};
use fillform_core::submission::{
    self, DisplayOutcome, SubmitDecision, MSG_PREVIOUSLY_RECORDED, MSG_PREVIOUSLY_SUBMITTED,
    MSG_THANK_YOU,
};
use fillform_core::{
    DispatchStatus, FormError, MarkupRenderer, RecordSnapshot, SubmittedValues, TemplateRenderer,
    Widget,
};
use fillform_storage::StorageError;

use super::state::{AppState, FormEntry};
use super::{
    Category, MSG_AMBIGUOUS, MSG_BAD_REQUEST, MSG_INTERNAL_ERROR, MSG_NOTIFY_FAILED,
    MSG_NOT_FOUND,
};

/// Render `base.html` with a single message.
pub(crate) fn message_page(
    state: &AppState,
    status: StatusCode,
    category: Category,
    message: &str,
) -> Response {
    let context = serde_json::json!({
        "messages": [[category.bootstrap_class(), message]],
    });
    match state.pages.render_page("base.html", context) {
        Ok(body) => (status, Html(body)).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "message page failed to render");
            (StatusCode::INTERNAL_SERVER_ERROR, MSG_INTERNAL_ERROR).into_response()
        }
    }
}

fn internal_error(state: &AppState, form: &str, err: &dyn std::fmt::Display) -> Response {
    tracing::error!(form = %form, error = %err, "request failed");
    message_page(
        state,
        StatusCode::INTERNAL_SERVER_ERROR,
        Category::Error,
        MSG_INTERNAL_ERROR,
    )
}

/// Render the form page with the record-specific header.
fn form_page(
    state: &AppState,
    entry: &FormEntry,
    record: &RecordSnapshot,
    status: StatusCode,
    widgets: Vec<Widget>,
    was_validated: bool,
) -> Result<Response, FormError> {
    let header_source = &entry.config.definition.header_template;
    let header = state
        .markdown
        .to_html(&entry.html.render(header_source, &record.fields)?);
    let context = serde_json::json!({
        "messages": [],
        "was_validated": was_validated,
        "header": header,
        "widgets": widgets,
    });
    let body = entry.html.render_page("index.html", context)?;
    Ok((status, Html(body)).into_response())
}

/// Resolve the link key to exactly one record, or the response to send.
async fn lookup(state: &AppState, entry: &FormEntry, key: &str) -> Result<RecordSnapshot, Response> {
    let config = &entry.config;
    match entry
        .store
        .fetch_by_key(&config.table, &config.key_column, key)
        .await
    {
        Ok(record) => Ok(record),
        Err(StorageError::NotFound { .. }) => {
            tracing::debug!(form = %config.name, key, "no record for key");
            Err(message_page(
                state,
                StatusCode::NOT_FOUND,
                Category::Error,
                MSG_NOT_FOUND,
            ))
        }
        Err(StorageError::Ambiguous { count, .. }) => {
            tracing::warn!(form = %config.name, key, count, "key matches more than one record");
            Err(message_page(
                state,
                StatusCode::INTERNAL_SERVER_ERROR,
                Category::Error,
                MSG_AMBIGUOUS,
            ))
        }
        Err(err) => Err(internal_error(state, &config.name, &err)),
    }
}

fn unknown_form(state: &AppState, name: &str) -> Response {
    tracing::debug!(form = %name, "unknown form");
    message_page(state, StatusCode::NOT_FOUND, Category::Error, MSG_NOT_FOUND)
}

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found(State(state): State<Arc<AppState>>) -> Response {
    message_page(&state, StatusCode::NOT_FOUND, Category::Error, MSG_NOT_FOUND)
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// GET /form/{name}/{key}
pub(crate) async fn handle_form_get(
    State(state): State<Arc<AppState>>,
    Path((name, key)): Path<(String, String)>,
) -> Response {
    let Some(entry) = state.forms.get(&name) else {
        return unknown_form(&state, &name);
    };
    let record = match lookup(&state, entry, &key).await {
        Ok(record) => record,
        Err(response) => return response,
    };

    let page = submission::display(&entry.config.definition, &record).and_then(|outcome| {
        match outcome {
            DisplayOutcome::AlreadyAnswered => Ok(message_page(
                &state,
                StatusCode::OK,
                Category::Error,
                MSG_PREVIOUSLY_RECORDED,
            )),
            DisplayOutcome::Form {
                widgets,
                was_validated,
            } => form_page(&state, entry, &record, StatusCode::OK, widgets, was_validated),
        }
    });
    page.unwrap_or_else(|err| internal_error(&state, &name, &err))
}

/// POST /form/{name}/{key}
pub(crate) async fn handle_form_post(
    State(state): State<Arc<AppState>>,
    Path((name, key)): Path<(String, String)>,
    body: Result<Form<SubmittedValues>, FormRejection>,
) -> Response {
    let Some(entry) = state.forms.get(&name) else {
        return unknown_form(&state, &name);
    };
    let values = match body {
        Ok(Form(values)) => values,
        Err(rejection) => {
            tracing::warn!(form = %name, key = %key, error = %rejection, "malformed form body");
            return message_page(
                &state,
                StatusCode::BAD_REQUEST,
                Category::Error,
                MSG_BAD_REQUEST,
            );
        }
    };
    let record = match lookup(&state, entry, &key).await {
        Ok(record) => record,
        Err(response) => return response,
    };
    let definition = &entry.config.definition;

    let decision = match submission::submit(definition, &record, &values, state.clock.as_ref()) {
        Ok(decision) => decision,
        Err(err) => return internal_error(&state, &name, &err),
    };

    let accepted = match decision {
        SubmitDecision::AlreadyAnswered => {
            return message_page(
                &state,
                StatusCode::OK,
                Category::Error,
                MSG_PREVIOUSLY_SUBMITTED,
            );
        }
        SubmitDecision::Rejected {
            widgets,
            was_validated,
        } => {
            return form_page(
                &state,
                entry,
                &record,
                StatusCode::BAD_REQUEST,
                widgets,
                was_validated,
            )
            .unwrap_or_else(|err| internal_error(&state, &name, &err));
        }
        SubmitDecision::Accepted(accepted) => accepted,
    };

    let applied = entry
        .store
        .apply_column_updates(
            &entry.config.table,
            accepted.record_id,
            &definition.response_time_column,
            accepted.column_updates.clone(),
        )
        .await;
    match applied {
        Ok(()) => {
            tracing::info!(form = %name, record = %accepted.record_id, "response recorded");
        }
        Err(StorageError::AlreadyAnswered { .. }) => {
            tracing::warn!(
                form = %name,
                record = %accepted.record_id,
                "record was answered concurrently, discarding this response"
            );
            return message_page(
                &state,
                StatusCode::OK,
                Category::Error,
                MSG_PREVIOUSLY_SUBMITTED,
            );
        }
        Err(err) => return internal_error(&state, &name, &err),
    }

    let config = Arc::clone(&entry.config);
    let renderer = Arc::clone(&entry.plain);
    let mailer = Arc::clone(&state.mailer);
    let notified = tokio::task::spawn_blocking(move || {
        submission::complete(
            &config.definition,
            &accepted,
            renderer.as_ref(),
            mailer.as_ref(),
        )
    })
    .await;

    match notified {
        Ok(Ok(DispatchStatus::Sent | DispatchStatus::Skipped)) => {
            message_page(&state, StatusCode::OK, Category::Message, MSG_THANK_YOU)
        }
        Ok(Err(err)) => notify_failed(&state, &name, &err),
        Err(err) => notify_failed(&state, &name, &err),
    }
}

fn notify_failed(state: &AppState, form: &str, err: &dyn std::fmt::Display) -> Response {
    tracing::error!(form = %form, error = %err, "response recorded but notification failed");
    message_page(
        state,
        StatusCode::INTERNAL_SERVER_ERROR,
        Category::Error,
        MSG_NOTIFY_FAILED,
    )
}
