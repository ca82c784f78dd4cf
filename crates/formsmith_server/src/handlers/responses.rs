//! Response handlers — listing, stats, and the SSE feed.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{Extension, Json};
use futures::stream::Stream;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use formsmith_core::principal::Principal;
use formsmith_core::proto::*;
use formsmith_core::service::FormService;

use crate::error::AppError;

pub async fn list(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn FormService>>,
    Path(form_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponsesResponse>, AppError> {
    let (limit, offset) = page.clamped();
    let (responses, total) = service
        .list_responses(&principal, form_id, limit, offset)
        .await?;
    Ok(Json(ListResponsesResponse {
        responses: responses.iter().map(ResponseRecord::from).collect(),
        total,
    }))
}

pub async fn get(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn FormService>>,
    Path((form_id, response_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ResponseRecord>, AppError> {
    let response = service.get_response(&principal, form_id, response_id).await?;
    Ok(Json(ResponseRecord::from(&response)))
}

pub async fn delete(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn FormService>>,
    Path((form_id, response_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<AckResponse>, AppError> {
    service
        .delete_response(&principal, form_id, response_id)
        .await?;
    Ok(Json(AckResponse::ok()))
}

pub async fn stats(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn FormService>>,
    Path(form_id): Path<Uuid>,
) -> Result<Json<FormStatsResponse>, AppError> {
    Ok(Json(service.form_stats(&principal, form_id).await?))
}

/// GET /forms/:id/events — SSE stream of new-response events.
pub async fn events(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn FormService>>,
    Path(form_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let rx = service.subscribe_responses(&principal, form_id).await?;

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let json = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().event("response").data(json)))
        }
        Err(_) => None, // Lagged — skip missed messages
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(15))
            .text("ping"),
    ))
}
