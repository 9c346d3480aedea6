use std::sync::Arc;

use redis::{AsyncCommands, Client as RedisClient};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::member::Role;
use crate::schedule::{DayPlan, RosterRow, WorkerSlot};

// 缓存相关常量
const ROSTER_CACHE_PREFIX: &str = "roster:week:"; // 周排班缓存前缀

fn week_cache_key(group_id: &str) -> String {
    format!("{}{}", ROSTER_CACHE_PREFIX, group_id)
}

#[derive(Debug, Serialize)]
pub struct RosterWeekResponse {
    pub roster: Vec<DayPlan>,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct RosterTodayResponse {
    pub day: Option<DayPlan>,
}

/// 管理员手动修改某一天，不经过公平性计算
#[derive(Debug, Deserialize)]
pub struct UpdateRosterRequest {
    pub day_index: u8,
    #[serde(default)]
    pub morning: Vec<WorkerSlot>,
    #[serde(default)]
    pub night: Vec<WorkerSlot>,
    pub passenger_m: Option<String>,
    pub passenger_n: Option<String>,
}

impl UpdateRosterRequest {
    pub fn into_day_plan(self) -> Result<DayPlan, AppError> {
        if self.day_index > 6 {
            return Err(AppError::Validation(format!(
                "day_index must be 0-6, got {}",
                self.day_index
            )));
        }
        let plan = DayPlan {
            day_index: self.day_index,
            morning: self.morning,
            night: self.night,
            morning_passenger: self.passenger_m.filter(|p| !p.trim().is_empty()),
            night_passenger: self.passenger_n.filter(|p| !p.trim().is_empty()),
        };
        if let Some(name) = plan.find_conflict() {
            return Err(AppError::Conflict(format!(
                "{} is already on duty that day",
                name
            )));
        }
        Ok(plan)
    }
}

pub struct Roster;

impl Roster {
    /// 读取一周排班，没有时初始化 7 天空排班
    pub async fn load_week(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        group_id: &str,
        cache_secs: u64,
    ) -> Result<Vec<DayPlan>, AppError> {
        let cache_key = week_cache_key(group_id);

        // 尝试从缓存读取
        if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
            let cached: redis::RedisResult<String> = conn.get(&cache_key).await;
            if let Ok(json_str) = cached {
                if let Ok(week) = serde_json::from_str::<Vec<DayPlan>>(&json_str) {
                    tracing::debug!("Get roster from cache: {}", cache_key);
                    return Ok(week);
                }
            }
        }

        let rows = sqlx::query_as::<_, RosterRow>(
            r#"
            SELECT day_index, morning, night, passenger_m, passenger_n
            FROM roster
            WHERE group_id = $1
            ORDER BY day_index ASC
            "#,
        )
        .bind(group_id)
        .fetch_all(pool)
        .await?;

        let week = if rows.is_empty() {
            Self::init_week(pool, group_id).await?
        } else {
            rows.into_iter()
                .map(DayPlan::try_from)
                .collect::<Result<Vec<_>, _>>()?
        };

        // 缓存结果
        if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
            if let Ok(json_str) = serde_json::to_string(&week) {
                let _: Result<(), redis::RedisError> =
                    conn.set_ex(&cache_key, json_str, cache_secs).await;
                tracing::debug!("Set roster to cache: {}", cache_key);
            }
        }

        Ok(week)
    }

    pub async fn load_day(
        pool: &PgPool,
        group_id: &str,
        day_index: u8,
    ) -> Result<Option<DayPlan>, AppError> {
        let row = sqlx::query_as::<_, RosterRow>(
            r#"
            SELECT day_index, morning, night, passenger_m, passenger_n
            FROM roster
            WHERE group_id = $1 AND day_index = $2
            "#,
        )
        .bind(group_id)
        .bind(day_index as i32)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(DayPlan::try_from).transpose()?)
    }

    async fn init_week(pool: &PgPool, group_id: &str) -> Result<Vec<DayPlan>, AppError> {
        let week = (0..7).map(DayPlan::empty).collect::<Vec<_>>();
        let mut tx = pool.begin().await?;
        for day in &week {
            sqlx::query(
                r#"
                INSERT INTO roster (group_id, day_index, morning, night)
                VALUES ($1, $2, '[]', '[]')
                ON CONFLICT (group_id, day_index) DO NOTHING
                "#,
            )
            .bind(group_id)
            .bind(day.day_index as i32)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(week)
    }

    /// 整周覆盖写入，在一个事务里完成，不会留下半份排班
    pub async fn save_week(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        group_id: &str,
        week: &[DayPlan],
    ) -> Result<(), AppError> {
        let mut tx = pool.begin().await?;
        for day in week {
            Self::upsert(&mut tx, group_id, day).await?;
        }
        tx.commit().await?;

        Self::invalidate(redis, group_id).await;
        Ok(())
    }

    pub async fn save_day(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        group_id: &str,
        day: &DayPlan,
    ) -> Result<(), AppError> {
        let mut tx = pool.begin().await?;
        Self::upsert(&mut tx, group_id, day).await?;
        tx.commit().await?;

        Self::invalidate(redis, group_id).await;
        Ok(())
    }

    async fn upsert(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        group_id: &str,
        day: &DayPlan,
    ) -> Result<(), AppError> {
        let row = RosterRow::try_from(day)?;
        sqlx::query(
            r#"
            INSERT INTO roster (group_id, day_index, morning, night, passenger_m, passenger_n)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (group_id, day_index) DO UPDATE SET
                morning = EXCLUDED.morning,
                night = EXCLUDED.night,
                passenger_m = EXCLUDED.passenger_m,
                passenger_n = EXCLUDED.passenger_n
            "#,
        )
        .bind(group_id)
        .bind(row.day_index)
        .bind(row.morning)
        .bind(row.night)
        .bind(row.passenger_m)
        .bind(row.passenger_n)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn invalidate(redis: &Arc<RedisClient>, group_id: &str) {
        if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
            let _: Result<(), redis::RedisError> = conn.del(week_cache_key(group_id)).await;
            tracing::debug!("Invalidated roster cache for group {}", group_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> UpdateRosterRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn manual_edit_accepts_consistent_day() {
        let plan = request(
            r#"{"day_index": 3, "morning": [{"n": "Asha", "t": "Day Off"}],
                "night": [{"n": "Ben", "t": "After class"}], "passenger_m": "Chen", "passenger_n": ""}"#,
        )
        .into_day_plan()
        .unwrap();
        assert_eq!(plan.day_index, 3);
        assert_eq!(plan.morning_passenger.as_deref(), Some("Chen"));
        assert_eq!(plan.night_passenger, None);
    }

    #[test]
    fn manual_edit_rejects_worker_passengers_and_bad_day() {
        let err = request(
            r#"{"day_index": 0, "morning": [{"n": "Asha", "t": "Day Off"}],
                "night": [{"n": "Ben", "t": "Free"}], "passenger_n": "Asha"}"#,
        )
        .into_day_plan()
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let plan = request(
            r#"{"day_index": 1, "morning": [{"n": "Asha", "t": "Day Off"}],
                "night": [{"n": "Asha", "t": "Free"}]}"#,
        )
        .into_day_plan()
        .unwrap();
        assert!(plan.works_morning("Asha") && plan.works_night("Asha"));

        let err = request(r#"{"day_index": 7}"#).into_day_plan().unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
