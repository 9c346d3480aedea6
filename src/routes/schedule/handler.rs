use axum::{
    Extension,
    extract::{Json, State},
    response::IntoResponse,
};

use crate::{
    AppState,
    common::MessageResponse,
    error::AppResult,
    models::member::Member,
    routes::{current_member, require_admin, require_group, roster::Roster},
    schedule,
    utils::{Claims, success_to_api_response},
};

use super::model::{GeneratePlanResponse, MemberSchedule, SaveScheduleRequest, ScheduleResponse};

#[axum::debug_handler]
pub async fn save_schedule(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SaveScheduleRequest>,
) -> AppResult<impl IntoResponse> {
    let schedule = req.into_availability()?;
    MemberSchedule::save(&state.pool, &claims.sub, &schedule).await?;

    Ok(success_to_api_response(MessageResponse::new(
        "Schedule saved successfully",
    )))
}

#[axum::debug_handler]
pub async fn get_schedule(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<impl IntoResponse> {
    let schedule = MemberSchedule::find(&state.pool, &claims.sub).await?;
    Ok(success_to_api_response(ScheduleResponse { schedule }))
}

/// 管理员为整个群组生成一周排班并覆盖写入 roster
#[axum::debug_handler]
pub async fn generate_plan(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<impl IntoResponse> {
    let member = current_member(&state.pool, &claims).await?;
    let group_id = require_group(&member)?;
    require_admin(&member, "generate the plan")?;

    let members = Member::list_by_group(&state.pool, group_id).await?;
    let member_ids = members.iter().map(|m| m.id.clone()).collect::<Vec<_>>();
    let availability = MemberSchedule::find_for_members(&state.pool, &member_ids).await?;

    let plan = schedule::generate_plan(&members, &availability)?;
    Roster::save_week(&state.pool, &state.redis, group_id, &plan).await?;

    tracing::info!(
        "Generated roster for group {} ({} members) by {}",
        group_id,
        members.len(),
        member.id
    );

    Ok(success_to_api_response(GeneratePlanResponse {
        message: "Plan generated successfully".to_string(),
        plan,
    }))
}
