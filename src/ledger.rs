// 记账
// 每笔支出由付款人垫付，在参与者之间平摊。
// 除了每个人的净余额，还按成员两两记录谁欠谁，多人群组里也是准确的。

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

/// 金额以分为单位
pub type Cents = i64;

/// 单笔金额上限（分），一百亿元
pub const MAX_AMOUNT_CENTS: Cents = 1_000_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("amount {0} is out of range")]
    AmountOutOfRange(Cents),

    #[error("balance overflow for {0}")]
    Overflow(String),
}

/// 换算成分；非有限数或绝对值超过上限时返回 `None`
pub fn to_cents(amount: f64) -> Option<Cents> {
    let cents = (amount * 100.0).round();
    if !cents.is_finite() || cents.abs() > MAX_AMOUNT_CENTS as f64 {
        return None;
    }
    Some(cents as Cents)
}

fn add_to(slot: &mut Cents, delta: Cents, who: &str) -> Result<(), LedgerError> {
    *slot = slot
        .checked_add(delta)
        .ok_or_else(|| LedgerError::Overflow(who.to_string()))?;
    Ok(())
}

pub fn from_cents(cents: Cents) -> f64 {
    cents as f64 / 100.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expense {
    pub payer_id: String,
    pub amount: Cents,
    pub split_between: Vec<String>,
}

/// 从某个成员视角看与另一个成员的往来，正数表示对方欠我
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairBalance {
    pub other_user_id: String,
    pub balance: f64,
}

#[derive(Debug, Default, Clone)]
pub struct Ledger {
    balances: BTreeMap<String, Cents>,
    // (欠款人, 收款人) -> 金额
    owed: BTreeMap<(String, String), Cents>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_expenses<'a>(
        expenses: impl IntoIterator<Item = &'a Expense>,
    ) -> Result<Self, LedgerError> {
        let mut ledger = Self::new();
        for expense in expenses {
            ledger.record(expense)?;
        }
        Ok(ledger)
    }

    /// 记一笔支出。除不尽的零头从前往后每人多摊一分，总额保持不变
    ///
    /// 出错时账本保持记账前的状态。
    pub fn record(&mut self, expense: &Expense) -> Result<(), LedgerError> {
        let mut participants: Vec<&String> = Vec::new();
        for member in &expense.split_between {
            if !participants.contains(&member) {
                participants.push(member);
            }
        }
        if participants.is_empty() || expense.amount <= 0 {
            return Ok(());
        }
        if expense.amount > MAX_AMOUNT_CENTS {
            return Err(LedgerError::AmountOutOfRange(expense.amount));
        }

        let count = participants.len() as Cents;
        let base = expense.amount / count;
        let remainder = expense.amount % count;

        // 先在副本上算，全部成功再替换
        let mut balances = self.balances.clone();
        let mut owed = self.owed.clone();

        add_to(
            balances.entry(expense.payer_id.clone()).or_insert(0),
            expense.amount,
            &expense.payer_id,
        )?;
        for (i, member) in participants.iter().enumerate() {
            let share = base + if (i as Cents) < remainder { 1 } else { 0 };
            add_to(balances.entry((*member).clone()).or_insert(0), -share, member)?;
            if **member != expense.payer_id {
                add_to(
                    owed.entry(((*member).clone(), expense.payer_id.clone()))
                        .or_insert(0),
                    share,
                    member,
                )?;
            }
        }

        self.balances = balances;
        self.owed = owed;
        Ok(())
    }

    /// 净余额：正数表示别人欠他，负数表示他欠别人
    pub fn net_balance(&self, member_id: &str) -> Cents {
        self.balances.get(member_id).copied().unwrap_or(0)
    }

    /// `other` 欠 `member` 的净额
    pub fn owed_to(&self, member_id: &str, other_id: &str) -> Cents {
        let theirs = self
            .owed
            .get(&(other_id.to_string(), member_id.to_string()))
            .copied()
            .unwrap_or(0);
        let mine = self
            .owed
            .get(&(member_id.to_string(), other_id.to_string()))
            .copied()
            .unwrap_or(0);
        theirs.saturating_sub(mine)
    }

    pub fn pairwise_for(&self, member_id: &str, others: &[String]) -> Vec<PairBalance> {
        others
            .iter()
            .filter(|other| other.as_str() != member_id)
            .map(|other| PairBalance {
                other_user_id: other.clone(),
                balance: from_cents(self.owed_to(member_id, other)),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expense(payer: &str, amount: Cents, split: &[&str]) -> Expense {
        Expense {
            payer_id: payer.to_string(),
            amount,
            split_between: split.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn three_way_split_tracks_each_pair() {
        let expenses = vec![
            expense("a", 3000, &["a", "b", "c"]),
            expense("b", 600, &["a", "b"]),
        ];
        let ledger = Ledger::from_expenses(&expenses).unwrap();

        assert_eq!(ledger.net_balance("a"), 3000 - 1000 - 300);
        assert_eq!(ledger.net_balance("b"), 600 - 1000 - 300);
        assert_eq!(ledger.net_balance("c"), -1000);

        assert_eq!(ledger.owed_to("a", "b"), 1000 - 300);
        assert_eq!(ledger.owed_to("a", "c"), 1000);
        assert_eq!(ledger.owed_to("b", "c"), 0);
        assert_eq!(ledger.owed_to("c", "a"), -1000);
    }

    #[test]
    fn odd_amounts_keep_the_total() {
        let ledger = Ledger::from_expenses(&[expense("a", 1000, &["a", "b", "c"])]).unwrap();
        let total: Cents = ["a", "b", "c"].iter().map(|m| ledger.net_balance(m)).sum();
        assert_eq!(total, 0);
        assert_eq!(ledger.net_balance("a"), 1000 - 334);
    }

    #[test]
    fn payer_outside_the_split_is_owed_everything() {
        let ledger = Ledger::from_expenses(&[expense("a", 900, &["b", "c"])]).unwrap();
        assert_eq!(ledger.net_balance("a"), 900);
        let pairs = ledger.pairwise_for("a", &["a".into(), "b".into(), "c".into()]);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].balance, 4.5);
    }

    #[test]
    fn converts_amounts_to_cents() {
        assert_eq!(to_cents(12.34), Some(1234));
        assert_eq!(to_cents(0.5), Some(50));
        assert_eq!(to_cents(10_000_000_000.0), Some(MAX_AMOUNT_CENTS));
        assert_eq!(to_cents(1e17), None);
        assert_eq!(to_cents(f64::INFINITY), None);
        assert_eq!(to_cents(f64::NAN), None);
        assert_eq!(from_cents(-250), -2.5);
    }

    #[test]
    fn oversized_expenses_are_refused_not_wrapped() {
        let mut ledger = Ledger::new();
        ledger.record(&expense("a", 500, &["a", "b"])).unwrap();

        let err = ledger
            .record(&expense("a", Cents::MAX, &["a", "b"]))
            .unwrap_err();
        assert_eq!(err, LedgerError::AmountOutOfRange(Cents::MAX));
        assert_eq!(ledger.net_balance("a"), 250);
        assert_eq!(ledger.owed_to("a", "b"), 250);
    }

    #[test]
    fn balance_overflow_leaves_the_ledger_untouched() {
        let mut ledger = Ledger::new();
        ledger.balances.insert("a".to_string(), Cents::MAX - 100);

        assert_eq!(
            ledger.record(&expense("a", 500, &["b"])),
            Err(LedgerError::Overflow("a".to_string()))
        );
        assert_eq!(ledger.net_balance("a"), Cents::MAX - 100);
        assert_eq!(ledger.net_balance("b"), 0);
        assert_eq!(ledger.owed_to("a", "b"), 0);
    }
}
