//! Ranking views: public query, live-update channel, spreadsheet export
//!
//! The query and the live channel stay public so the TV dashboards work
//! without a login; the export is gated like the rest of the admin surface.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    http::header,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::get,
};
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;

use crate::error::ApiError;
use crate::middleware::session::AuthSession;
use crate::ranking::{RankingRow, fetch_ranking};
use crate::routes::RankingParams;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_ranking))
        .route("/live", get(live))
        .route("/export", get(export_ranking))
}

#[tracing::instrument(name = "GET /ranking", skip(state))]
pub async fn get_ranking(
    State(state): State<AppState>,
    Query(params): Query<RankingParams>,
) -> Result<Json<Vec<RankingRow>>, ApiError> {
    let rows = fetch_ranking(&state.db, params.period()).await?;
    Ok(Json(rows))
}

/// Live-update channel: one no-payload `update` event per committed mutation.
///
/// Subscribers are expected to re-fetch the ranking on every event; the
/// first event fires immediately so a client joining after a change still
/// starts from current state.
#[tracing::instrument(name = "GET /ranking/live", skip(state))]
pub async fn live(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.updates.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("update"));

        loop {
            match rx.recv().await {
                Ok(()) => yield Ok(Event::default().event("update")),
                Err(RecvError::Lagged(skipped)) => {
                    // Missed signals collapse into a single refresh.
                    tracing::debug!(skipped, "Live subscriber lagged");
                    yield Ok(Event::default().event("update"));
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .text("keep-alive")
            .interval(Duration::from_secs(15)),
    )
}

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[tracing::instrument(name = "GET /ranking/export", skip(state, session))]
pub async fn export_ranking(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Query(params): Query<RankingParams>,
) -> Result<Response, ApiError> {
    session.require()?;

    let period = params.period();
    let rows = fetch_ranking(&state.db, period).await?;

    let mut book = umya_spreadsheet::new_file();
    let sheet = book
        .get_sheet_by_name_mut("Sheet1")
        .ok_or_else(|| ApiError::internal("Workbook is missing its default sheet"))?;

    for (col, title) in ["Rank", "Seller", "Total"].iter().enumerate() {
        sheet.get_cell_mut((col as u32 + 1, 1)).set_value(*title);
    }
    for (idx, row) in rows.iter().enumerate() {
        let line = idx as u32 + 2;
        sheet
            .get_cell_mut((1, line))
            .set_value_number((idx + 1) as f64);
        sheet.get_cell_mut((2, line)).set_value(row.name.clone());
        sheet
            .get_cell_mut((3, line))
            .set_value_number(row.total_sales as f64 / 100.0);
    }

    let mut out: Vec<u8> = Vec::new();
    umya_spreadsheet::writer::xlsx::write_writer(&book, &mut out)
        .map_err(|err| ApiError::internal(format!("Failed to serialize workbook: {}", err)))?;

    let disposition = format!(
        "attachment; filename=\"ranking_{}.xlsx\"",
        period.as_str()
    );
    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        out,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::Period;
    use crate::test_util::{admin_session, insert_sale, insert_seller, test_state};
    use chrono::Utc;

    #[tokio::test]
    async fn ranking_is_public_and_ordered() {
        let state = test_state().await;
        let ana = insert_seller(&state.db, "Ana").await;
        let beto = insert_seller(&state.db, "Beto").await;
        let now = Utc::now().naive_utc();
        insert_sale(&state.db, ana.id, 20_000, now).await;
        insert_sale(&state.db, beto.id, 5_000, now).await;

        let Json(rows) = get_ranking(
            State(state),
            Query(RankingParams {
                period: Some(Period::All),
            }),
        )
        .await
        .unwrap();
        assert_eq!(rows[0].name, "Ana");
        assert_eq!(rows[1].name, "Beto");
    }

    #[tokio::test]
    async fn missing_period_defaults_to_unbounded() {
        let params = RankingParams { period: None };
        assert_eq!(params.period(), Period::All);
    }

    #[tokio::test]
    async fn export_requires_a_session() {
        let state = test_state().await;
        let err = export_ranking(
            State(state),
            Extension(AuthSession::Guest),
            Query(RankingParams::default()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn export_produces_an_xlsx_attachment() {
        let state = test_state().await;
        let ana = insert_seller(&state.db, "Ana").await;
        insert_sale(&state.db, ana.id, 12_345, Utc::now().naive_utc()).await;

        let response = export_ranking(
            State(state),
            Extension(admin_session()),
            Query(RankingParams {
                period: Some(Period::All),
            }),
        )
        .await
        .unwrap();

        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            XLSX_CONTENT_TYPE
        );
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(disposition.contains("ranking_all.xlsx"));
    }
}
