use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::AppError;
use crate::schedule::{DayPlan, WeekAvailability};

#[derive(Debug, Deserialize)]
pub struct SaveScheduleRequest {
    pub schedule: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub schedule: Option<WeekAvailability>,
}

#[derive(Debug, Serialize)]
pub struct GeneratePlanResponse {
    pub message: String,
    pub plan: Vec<DayPlan>,
}

impl SaveScheduleRequest {
    /// 校验并解析一周的可用时间，不要求一次填完 7 天
    pub fn into_availability(self) -> Result<WeekAvailability, AppError> {
        let raw = self
            .schedule
            .ok_or_else(|| AppError::Validation("Schedule data required".to_string()))?;
        serde_json::from_value(raw)
            .map_err(|e| AppError::Validation(format!("Invalid schedule: {}", e)))
    }
}

pub struct MemberSchedule;

impl MemberSchedule {
    pub async fn save(
        pool: &PgPool,
        member_id: &str,
        schedule: &WeekAvailability,
    ) -> Result<(), AppError> {
        let schedule_json = serde_json::to_string(schedule)?;

        sqlx::query(
            r#"
            INSERT INTO user_schedules (user_id, schedule_json)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET schedule_json = EXCLUDED.schedule_json
            "#,
        )
        .bind(member_id)
        .bind(schedule_json)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn find(pool: &PgPool, member_id: &str) -> Result<Option<WeekAvailability>, AppError> {
        let json: Option<String> = sqlx::query_scalar(
            r#"
            SELECT schedule_json FROM user_schedules WHERE user_id = $1
            "#,
        )
        .bind(member_id)
        .fetch_optional(pool)
        .await?;

        json.map(|j| serde_json::from_str(&j)).transpose().map_err(AppError::from)
    }

    /// 批量读取成员的可用时间
    ///
    /// 无法解析的记录直接跳过，生成排班时会按“未填写”处理。
    pub async fn find_for_members(
        pool: &PgPool,
        member_ids: &[String],
    ) -> Result<HashMap<String, WeekAvailability>, AppError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT user_id, schedule_json FROM user_schedules WHERE user_id = ANY($1)
            "#,
        )
        .bind(member_ids)
        .fetch_all(pool)
        .await?;

        let mut schedules = HashMap::with_capacity(rows.len());
        for (member_id, json) in rows {
            match serde_json::from_str::<WeekAvailability>(&json) {
                Ok(schedule) => {
                    schedules.insert(member_id, schedule);
                }
                Err(e) => tracing::warn!("Skipping unreadable schedule of {}: {}", member_id, e),
            }
        }
        Ok(schedules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Weekday;

    #[test]
    fn save_request_requires_a_schedule() {
        let req: SaveScheduleRequest = serde_json::from_str("{}").unwrap();
        assert!(matches!(req.into_availability(), Err(AppError::Validation(_))));
    }

    #[test]
    fn save_request_rejects_overnight_classes() {
        let req: SaveScheduleRequest = serde_json::from_str(
            r#"{"schedule": {"Monday": {"off": false, "start": "22:00", "end": "02:00"}}}"#,
        )
        .unwrap();
        assert!(matches!(req.into_availability(), Err(AppError::Validation(_))));
    }

    #[test]
    fn save_request_accepts_partial_week() {
        let req: SaveScheduleRequest = serde_json::from_str(
            r#"{"schedule": {"Monday": {"off": true}, "Tuesday": {"off": false, "start": "12:00", "end": "18:00"}}}"#,
        )
        .unwrap();
        let week = req.into_availability().unwrap();
        assert!(week.day(Weekday::Tuesday).is_some());
        assert_eq!(week.missing_days().len(), 5);
    }
}
