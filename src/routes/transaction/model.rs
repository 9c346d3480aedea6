use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::AppError;
use crate::ledger::{Cents, Expense, Ledger, from_cents, to_cents};
use crate::models::member::Member;

const RECENT_LIMIT: i64 = 20;

#[derive(Debug, Deserialize)]
pub struct AddTransactionRequest {
    pub amount: Option<f64>,
    pub description: Option<String>,
    pub split_between: Option<Vec<String>>,
}

/// 校验后的新支出
#[derive(Debug, PartialEq)]
pub struct NewTransaction {
    pub amount: Cents,
    pub description: String,
    pub split_between: Vec<String>,
}

impl AddTransactionRequest {
    /// 不指定分摊成员时默认全组平摊
    pub fn validate(self, members: &[Member]) -> Result<NewTransaction, AppError> {
        let (Some(amount), Some(description)) = (self.amount, self.description) else {
            return Err(AppError::Validation("Missing fields".to_string()));
        };
        let description = description.trim().to_string();
        if description.is_empty() {
            return Err(AppError::Validation("Missing fields".to_string()));
        }
        let amount = match to_cents(amount) {
            Some(cents) if cents > 0 => cents,
            _ => return Err(AppError::Validation("Invalid amount".to_string())),
        };

        let split_between = match self.split_between {
            Some(ids) if !ids.is_empty() => {
                if let Some(stranger) = ids.iter().find(|id| !members.iter().any(|m| &m.id == *id)) {
                    return Err(AppError::Validation(format!(
                        "{} is not a member of this group",
                        stranger
                    )));
                }
                ids
            }
            _ => members.iter().map(|m| m.id.clone()).collect(),
        };

        Ok(NewTransaction {
            amount,
            description,
            split_between,
        })
    }
}

#[derive(Debug, Serialize, FromRow)]
pub struct TransactionInfo {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    #[serde(skip_serializing)]
    pub amount_cents: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct TransactionView {
    #[serde(flatten)]
    pub info: TransactionInfo,
    pub amount: f64,
}

#[derive(Debug, Serialize)]
pub struct BalanceView {
    pub other_user_id: String,
    pub other_user_name: String,
    pub balance: f64,
}

#[derive(Debug, Serialize)]
pub struct TransactionListResponse {
    pub transactions: Vec<TransactionView>,
    pub balances: Vec<BalanceView>,
    pub my_balance: f64,
}

pub struct Transaction;

impl Transaction {
    pub async fn create(
        pool: &PgPool,
        group_id: &str,
        payer_id: &str,
        new: &NewTransaction,
    ) -> Result<String, AppError> {
        let transaction_id = Uuid::new_v4().to_string();
        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO transactions (id, group_id, user_id, amount_cents, description, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            "#,
        )
        .bind(&transaction_id)
        .bind(group_id)
        .bind(payer_id)
        .bind(new.amount)
        .bind(&new.description)
        .execute(&mut *tx)
        .await?;

        for member_id in &new.split_between {
            sqlx::query(
                r#"
                INSERT INTO transaction_splits (transaction_id, user_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(&transaction_id)
            .bind(member_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(transaction_id)
    }

    pub async fn recent(pool: &PgPool, group_id: &str) -> Result<Vec<TransactionInfo>, AppError> {
        let rows = sqlx::query_as::<_, TransactionInfo>(
            r#"
            SELECT t.id, t.user_id, u.name AS user_name, t.amount_cents, t.description, t.created_at
            FROM transactions t
            JOIN users u ON t.user_id = u.id
            WHERE t.group_id = $1
            ORDER BY t.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(group_id)
        .bind(RECENT_LIMIT)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    /// 用整个群组的全部支出重建账本
    pub async fn ledger(pool: &PgPool, group_id: &str) -> Result<Ledger, AppError> {
        let payments: Vec<(String, String, i64)> = sqlx::query_as(
            r#"
            SELECT id, user_id, amount_cents
            FROM transactions
            WHERE group_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(group_id)
        .fetch_all(pool)
        .await?;

        let splits: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT s.transaction_id, s.user_id
            FROM transaction_splits s
            JOIN transactions t ON s.transaction_id = t.id
            WHERE t.group_id = $1
            ORDER BY s.user_id ASC
            "#,
        )
        .bind(group_id)
        .fetch_all(pool)
        .await?;

        let mut split_map: HashMap<String, Vec<String>> = HashMap::new();
        for (transaction_id, member_id) in splits {
            split_map.entry(transaction_id).or_default().push(member_id);
        }

        let expenses = payments
            .into_iter()
            .map(|(id, payer_id, amount)| Expense {
                payer_id,
                amount,
                split_between: split_map.remove(&id).unwrap_or_default(),
            })
            .collect::<Vec<_>>();

        Ledger::from_expenses(&expenses)
            .map_err(|e| AppError::Persistence(format!("ledger for group {}: {}", group_id, e)))
    }
}

impl From<TransactionInfo> for TransactionView {
    fn from(info: TransactionInfo) -> Self {
        let amount = from_cents(info.amount_cents);
        Self { info, amount }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members() -> Vec<Member> {
        vec![Member::new("a", "Asha"), Member::new("b", "Ben"), Member::new("c", "Chen")]
    }

    fn request(json: &str) -> AddTransactionRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn split_defaults_to_whole_group() {
        let new = request(r#"{"amount": 12.5, "description": "Groceries"}"#)
            .validate(&members())
            .unwrap();
        assert_eq!(new.amount, 1250);
        assert_eq!(new.split_between, vec!["a", "b", "c"]);
    }

    #[test]
    fn rejects_missing_fields_bad_amounts_and_strangers() {
        let m = members();
        assert!(request(r#"{"amount": 5}"#).validate(&m).is_err());
        assert!(request(r#"{"amount": 0, "description": "Gas"}"#).validate(&m).is_err());
        assert!(request(r#"{"amount": -3, "description": "Gas"}"#).validate(&m).is_err());
        let err = request(r#"{"amount": 1e17, "description": "Yacht"}"#)
            .validate(&m)
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid amount");
        let err = request(r#"{"amount": 3, "description": "Gas", "split_between": ["a", "z"]}"#)
            .validate(&m)
            .unwrap_err();
        assert!(err.to_string().contains('z'));
    }
}
