pub mod roster;
pub mod schedule;
pub mod task;
pub mod transaction;

use sqlx::PgPool;

use crate::error::AppError;
use crate::models::member::Member;
use crate::utils::Claims;

/// 根据令牌找到当前成员
pub(crate) async fn current_member(pool: &PgPool, claims: &Claims) -> Result<Member, AppError> {
    Member::find_by_id(pool, &claims.sub)
        .await?
        .ok_or(AppError::Unauthorized)
}

pub(crate) fn require_group(member: &Member) -> Result<&str, AppError> {
    member
        .group_id
        .as_deref()
        .ok_or_else(|| AppError::Validation("User not in a group".to_string()))
}

pub(crate) fn require_admin(member: &Member, action: &str) -> Result<(), AppError> {
    if member.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("Only admins can {}", action)))
    }
}
