//! Exchange-rate reads.

use actix_web::{HttpResponse, web};

use postrate_shared::ApiResponse;
use postrate_shared::dto::{LatestRateQuery, RateHistoryParams};

use crate::middleware::error::AppResult;
use crate::state::AppState;

/// GET /api/exchange-rates/latest?from&to
pub async fn latest(
    state: web::Data<AppState>,
    query: web::Query<LatestRateQuery>,
) -> AppResult<HttpResponse> {
    let rate = state.services.rates.latest(&query.from, &query.to).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(rate)))
}

/// GET /api/exchange-rates/base
pub async fn base(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let snapshot = state.services.rates.base_rates().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(snapshot)))
}

/// GET /api/exchange-rates?from&to&start&end
///
/// Rows are stored as `USD -> code` only, so a pair filter must start at USD.
pub async fn history(
    state: web::Data<AppState>,
    query: web::Query<RateHistoryParams>,
) -> AppResult<HttpResponse> {
    let q = query.into_inner();
    let rows = state
        .services
        .rates
        .history(
            q.from.as_deref(),
            q.to.as_deref(),
            q.start.as_deref(),
            q.end.as_deref(),
        )
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(rows)))
}
