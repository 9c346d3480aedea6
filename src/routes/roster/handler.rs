use axum::{
    Extension,
    extract::{Json, State},
    response::IntoResponse,
};

use crate::{
    AppState,
    common::MessageResponse,
    error::AppResult,
    routes::{current_member, require_admin, require_group},
    schedule::Weekday,
    utils::{Claims, success_to_api_response},
};

use super::model::{Roster, RosterTodayResponse, RosterWeekResponse, UpdateRosterRequest};

#[axum::debug_handler]
pub async fn get_week(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<impl IntoResponse> {
    let member = current_member(&state.pool, &claims).await?;
    let group_id = require_group(&member)?;

    let roster = Roster::load_week(
        &state.pool,
        &state.redis,
        group_id,
        state.config.roster_cache_secs,
    )
    .await?;

    Ok(success_to_api_response(RosterWeekResponse {
        roster,
        role: member.role,
    }))
}

#[axum::debug_handler]
pub async fn get_today(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<impl IntoResponse> {
    let member = current_member(&state.pool, &claims).await?;
    let group_id = require_group(&member)?;

    let today = Weekday::today();
    let day = Roster::load_day(&state.pool, group_id, today.index() as u8).await?;

    Ok(success_to_api_response(RosterTodayResponse { day }))
}

#[axum::debug_handler]
pub async fn update_day(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateRosterRequest>,
) -> AppResult<impl IntoResponse> {
    let member = current_member(&state.pool, &claims).await?;
    let group_id = require_group(&member)?;
    require_admin(&member, "edit roster")?;

    let day = req.into_day_plan()?;
    Roster::save_day(&state.pool, &state.redis, group_id, &day).await?;

    tracing::info!("Roster day {} of group {} edited by {}", day.day_index, group_id, member.id);
    Ok(success_to_api_response(MessageResponse::new("Roster updated")))
}
