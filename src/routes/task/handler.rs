use axum::{Extension, extract::State, response::IntoResponse};
use chrono::Utc;

use crate::{
    AppState,
    error::AppResult,
    models::member::Member,
    routes::{current_member, require_group},
    utils::{Claims, success_to_api_response},
};

use super::model::{
    AssignTasksResponse, DailyTasks, TodayTasksResponse, already_assigned, assign_chores,
};

#[axum::debug_handler]
pub async fn get_today_tasks(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<impl IntoResponse> {
    let member = current_member(&state.pool, &claims).await?;
    let group_id = require_group(&member)?;

    let today = Utc::now().date_naive();
    let tasks = DailyTasks::find(&state.pool, group_id, today)
        .await?
        .unwrap_or_default();

    Ok(success_to_api_response(TodayTasksResponse { tasks }))
}

/// 任何成员都可以触发当天的分配，一天只有一次
#[axum::debug_handler]
pub async fn assign_tasks(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<impl IntoResponse> {
    let member = current_member(&state.pool, &claims).await?;
    let group_id = require_group(&member)?;

    let today = Utc::now().date_naive();
    if DailyTasks::find(&state.pool, group_id, today).await?.is_some() {
        return Err(already_assigned());
    }

    let members = Member::list_by_group(&state.pool, group_id).await?;
    let tasks = assign_chores(&members, &mut rand::rng())?;
    DailyTasks::insert(&state.pool, group_id, today, &tasks).await?;

    tracing::info!(
        "Assigned {} chores for group {} on {} by {}",
        tasks.len(),
        group_id,
        today,
        member.id
    );

    Ok(success_to_api_response(AssignTasksResponse {
        message: "Tasks assigned".to_string(),
        date: today,
        tasks,
    }))
}
