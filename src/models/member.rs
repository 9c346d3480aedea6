use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

/// 成员角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::Member
        }
    }
}

/// 家庭成员，注册时创建，通过加群/审批流程修改所属群组
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub group_id: Option<String>,
}

#[derive(Debug, FromRow)]
struct MemberRow {
    id: String,
    name: String,
    role: String,
    group_id: Option<String>,
}

impl From<MemberRow> for Member {
    fn from(row: MemberRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            role: Role::parse(&row.role),
            group_id: row.group_id,
        }
    }
}

impl Member {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: Role::Member,
            group_id: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub async fn find_by_id(pool: &PgPool, member_id: &str) -> Result<Option<Self>, sqlx::Error> {
        let row = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT id, name, role, group_id
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(member_id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(Member::from))
    }

    /// 按加入顺序列出群组成员，排班时的“输入顺序”即此顺序
    pub async fn list_by_group(pool: &PgPool, group_id: &str) -> Result<Vec<Self>, sqlx::Error> {
        let rows = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT id, name, role, group_id
            FROM users
            WHERE group_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(group_id)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(Member::from).collect())
    }
}
