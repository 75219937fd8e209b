//! `/v1/answer` — question answering over a fetched page, with SSE
//! streaming.
//!
//! The stream is a thin channel over the synchronous core: `chunk`
//! events carrying slices of the answer text, then one `done` event with
//! confidence and citations. Client disconnects drop the stream, which
//! cancels the underlying work.

use super::{with_budget, BUDGET_DEFAULT};
use crate::auth::ApiKeyIdentity;
use crate::errors::ApiError;
use crate::middleware::RequestId;
use crate::quota_headers::{apply_quota_headers, charge};
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use webpeel_quota::UsageClass;
use webpeel_types::{PeelError, PeelOptions};

/// Characters per streamed chunk.
const CHUNK_CHARS: usize = 160;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerBody {
    question: String,
    url: String,
    #[serde(default)]
    stream: bool,
}

#[derive(Debug, Deserialize)]
pub struct QuickQuery {
    q: String,
    url: String,
}

/// POST `/v1/answer`. With `stream: true` the response is SSE.
pub async fn answer(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Extension(identity): Extension<ApiKeyIdentity>,
    Json(body): Json<AnswerBody>,
) -> Result<Response, ApiError> {
    if body.question.trim().is_empty() {
        return Err(ApiError::new(
            PeelError::invalid_request("`question` is required"),
            request_id,
        ));
    }
    let decision = charge(&state, &identity.key_id, UsageClass::Basic, &request_id).await?;

    if body.stream {
        let stream = answer_stream(state, body.question, body.url);
        let mut response = Sse::new(stream).keep_alive(KeepAlive::default()).into_response();
        apply_quota_headers(response.headers_mut(), &decision, None);
        return Ok(response);
    }

    let (answer, page) = with_budget(BUDGET_DEFAULT, "answer", &request_id, async {
        state
            .peel
            .quick_answer(&body.question, &body.url, &PeelOptions::default())
            .await
            .map_err(|e| ApiError::new(e, request_id.clone()))
    })
    .await?;

    let mut response = Json(json!({
        "answer": answer.best(),
        "confidence": answer.confidence,
        "passages": answer.passages,
        "citations": [{ "url": page.url, "title": page.title }],
    }))
    .into_response();
    apply_quota_headers(response.headers_mut(), &decision, None);
    Ok(response)
}

fn answer_stream(
    state: AppState,
    question: String,
    url: String,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        match state
            .peel
            .quick_answer(&question, &url, &PeelOptions::default())
            .await
        {
            Ok((answer, page)) => {
                let text = answer.best().unwrap_or("").to_string();
                let chars: Vec<char> = text.chars().collect();
                for chunk in chars.chunks(CHUNK_CHARS) {
                    let payload = json!({
                        "type": "chunk",
                        "text": chunk.iter().collect::<String>(),
                    });
                    yield Ok(Event::default().data(payload.to_string()));
                }
                let done = json!({
                    "type": "done",
                    "confidence": answer.confidence,
                    "citations": [{ "url": page.url, "title": page.title }],
                });
                yield Ok(Event::default().data(done.to_string()));
            }
            Err(e) => {
                let payload = json!({ "type": "error", "message": e.to_string() });
                yield Ok(Event::default().data(payload.to_string()));
            }
        }
    }
}

/// GET `/v1/answer/quick` — the non-streaming shortcut.
pub async fn quick(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Extension(identity): Extension<ApiKeyIdentity>,
    Query(query): Query<QuickQuery>,
) -> Result<Response, ApiError> {
    let decision = charge(&state, &identity.key_id, UsageClass::Basic, &request_id).await?;
    let (answer, page) = with_budget(BUDGET_DEFAULT, "answer", &request_id, async {
        state
            .peel
            .quick_answer(&query.q, &query.url, &PeelOptions::default())
            .await
            .map_err(|e| ApiError::new(e, request_id.clone()))
    })
    .await?;

    let mut response = Json(json!({
        "answer": answer.best(),
        "confidence": answer.confidence,
    }))
    .into_response();
    apply_quota_headers(response.headers_mut(), &decision, None);
    Ok(response)
}
