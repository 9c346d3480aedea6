// 每日家务
// 每天每个群组只分配一次，结果存下来，大家看到的是同一份

use chrono::NaiveDate;
use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::member::Member;
use crate::schedule::MIN_MEMBERS;

pub const CHORES: [&str; 4] = ["Brooming", "Water", "Trash", "Market"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoreAssignment {
    pub task_name: String,
    pub assigned_to_name: String,
}

#[derive(Debug, Serialize)]
pub struct TodayTasksResponse {
    pub tasks: Vec<ChoreAssignment>,
}

#[derive(Debug, Serialize)]
pub struct AssignTasksResponse {
    pub message: String,
    pub date: NaiveDate,
    pub tasks: Vec<ChoreAssignment>,
}

/// 打乱成员顺序后轮流分配，人比家务少时有人会分到不止一项
pub fn assign_chores<R: Rng + ?Sized>(
    members: &[Member],
    rng: &mut R,
) -> Result<Vec<ChoreAssignment>, AppError> {
    if members.len() < MIN_MEMBERS {
        return Err(AppError::InsufficientMembers {
            found: members.len(),
        });
    }

    let mut names = members.iter().map(|m| m.name.as_str()).collect::<Vec<_>>();
    names.shuffle(rng);

    Ok(CHORES
        .iter()
        .zip(names.iter().cycle())
        .map(|(task, name)| ChoreAssignment {
            task_name: task.to_string(),
            assigned_to_name: name.to_string(),
        })
        .collect())
}

pub struct DailyTasks;

impl DailyTasks {
    pub async fn find(
        pool: &PgPool,
        group_id: &str,
        date: NaiveDate,
    ) -> Result<Option<Vec<ChoreAssignment>>, AppError> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT task_json
            FROM tasks
            WHERE group_id = $1 AND date = $2
            "#,
        )
        .bind(group_id)
        .bind(date)
        .fetch_optional(pool)
        .await?;

        match row {
            Some((json,)) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// 同一天重复分配返回 `Conflict`，并发请求也只有一个能写入
    pub async fn insert(
        pool: &PgPool,
        group_id: &str,
        date: NaiveDate,
        tasks: &[ChoreAssignment],
    ) -> Result<(), AppError> {
        let task_json = serde_json::to_string(tasks)?;
        let result = sqlx::query(
            r#"
            INSERT INTO tasks (group_id, date, task_json)
            VALUES ($1, $2, $3)
            ON CONFLICT (group_id, date) DO NOTHING
            "#,
        )
        .bind(group_id)
        .bind(date)
        .bind(&task_json)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(already_assigned());
        }
        Ok(())
    }
}

pub(super) fn already_assigned() -> AppError {
    AppError::Conflict("Tasks already assigned for today".to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn members(names: &[&str]) -> Vec<Member> {
        names
            .iter()
            .map(|name| Member::new(name.to_lowercase(), *name))
            .collect()
    }

    fn assignees(tasks: &[ChoreAssignment]) -> Vec<&str> {
        tasks.iter().map(|t| t.assigned_to_name.as_str()).collect()
    }

    #[test]
    fn every_chore_is_assigned_in_order() {
        let tasks = assign_chores(&members(&["Asha", "Ben"]), &mut StdRng::seed_from_u64(7)).unwrap();

        let names = tasks.iter().map(|t| t.task_name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, CHORES);

        // 两个人各分到两项，轮流交替
        let who = assignees(&tasks);
        assert_eq!(who[0], who[2]);
        assert_eq!(who[1], who[3]);
        assert_ne!(who[0], who[1]);
    }

    #[test]
    fn round_robin_wraps_for_three_members() {
        let tasks = assign_chores(
            &members(&["Asha", "Ben", "Chen"]),
            &mut StdRng::seed_from_u64(1),
        )
        .unwrap();

        let who = assignees(&tasks);
        assert_eq!(who[0], who[3]);
        assert_eq!(who[..3].iter().collect::<HashSet<_>>().len(), 3);
    }

    #[test]
    fn larger_groups_leave_some_members_free() {
        let group = members(&["A", "B", "C", "D", "E", "F"]);
        let tasks = assign_chores(&group, &mut StdRng::seed_from_u64(3)).unwrap();

        let who = assignees(&tasks);
        assert_eq!(who.iter().collect::<HashSet<_>>().len(), CHORES.len());
        assert!(who.iter().all(|name| group.iter().any(|m| m.name == *name)));
    }

    #[test]
    fn order_depends_on_the_shuffle() {
        let group = members(&["Asha", "Ben", "Chen", "Dana"]);
        let firsts = (0..32)
            .map(|seed| {
                assign_chores(&group, &mut StdRng::seed_from_u64(seed)).unwrap()[0]
                    .assigned_to_name
                    .clone()
            })
            .collect::<HashSet<_>>();
        assert!(firsts.len() > 1);
    }

    #[test]
    fn needs_at_least_two_members() {
        let err = assign_chores(&members(&["Solo"]), &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, AppError::InsufficientMembers { found: 1 }));
        assert!(assign_chores(&[], &mut StdRng::seed_from_u64(0)).is_err());
    }

    #[test]
    fn repeat_assignment_is_a_conflict() {
        let err = already_assigned();
        assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "Tasks already assigned for today");
    }
}
