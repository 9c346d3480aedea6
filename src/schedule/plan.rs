// 排班结果
// 序列化格式与 roster 表一致：morning/night 为 [{"n": 名字, "t": 说明}] 的 JSON，
// passenger_m/passenger_n 为可空的名字

use serde::{Deserialize, Serialize};

/// 某个班次上的一名值班人员
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSlot {
    #[serde(rename = "n")]
    pub name: String,
    #[serde(rename = "t")]
    pub note: String,
}

impl WorkerSlot {
    pub fn new(name: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            note: note.into(),
        }
    }
}

/// 一天的排班
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayPlan {
    pub day_index: u8,
    pub morning: Vec<WorkerSlot>,
    pub night: Vec<WorkerSlot>,
    #[serde(rename = "passenger_m")]
    pub morning_passenger: Option<String>,
    #[serde(rename = "passenger_n")]
    pub night_passenger: Option<String>,
}

impl DayPlan {
    /// 空白的一天，初始化 roster 时使用
    pub fn empty(day_index: u8) -> Self {
        Self {
            day_index,
            morning: Vec::new(),
            night: Vec::new(),
            morning_passenger: None,
            night_passenger: None,
        }
    }

    pub fn works_morning(&self, name: &str) -> bool {
        self.morning.iter().any(|w| w.name == name)
    }

    pub fn works_night(&self, name: &str) -> bool {
        self.night.iter().any(|w| w.name == name)
    }

    pub fn is_passenger(&self, name: &str) -> bool {
        self.morning_passenger.as_deref() == Some(name)
            || self.night_passenger.as_deref() == Some(name)
    }

    /// 检查当天的排班是否自洽，返回第一个冲突的成员
    ///
    /// 人手不够时同一成员可以早晚班都上，但不能在同一个班次里出现两次，
    /// 也不能既值班又是乘客。
    pub fn find_conflict(&self) -> Option<&str> {
        for shift in [&self.morning, &self.night] {
            for (i, worker) in shift.iter().enumerate() {
                if self.is_passenger(&worker.name) {
                    return Some(&worker.name);
                }
                if shift[..i].iter().any(|w| w.name == worker.name) {
                    return Some(&worker.name);
                }
            }
        }
        match (&self.morning_passenger, &self.night_passenger) {
            (Some(m), Some(n)) if m == n => Some(m),
            _ => None,
        }
    }
}

/// roster 表中的一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RosterRow {
    pub day_index: i32,
    pub morning: String,
    pub night: String,
    pub passenger_m: Option<String>,
    pub passenger_n: Option<String>,
}

impl TryFrom<&DayPlan> for RosterRow {
    type Error = serde_json::Error;

    fn try_from(plan: &DayPlan) -> Result<Self, Self::Error> {
        Ok(Self {
            day_index: plan.day_index as i32,
            morning: serde_json::to_string(&plan.morning)?,
            night: serde_json::to_string(&plan.night)?,
            passenger_m: plan.morning_passenger.clone(),
            passenger_n: plan.night_passenger.clone(),
        })
    }
}

impl TryFrom<RosterRow> for DayPlan {
    type Error = serde_json::Error;

    fn try_from(row: RosterRow) -> Result<Self, Self::Error> {
        Ok(Self {
            day_index: row.day_index.clamp(0, 6) as u8,
            morning: serde_json::from_str(&row.morning)?,
            night: serde_json::from_str(&row.night)?,
            morning_passenger: row.passenger_m,
            night_passenger: row.passenger_n,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_row_uses_short_worker_keys() {
        let plan = DayPlan {
            day_index: 2,
            morning: vec![WorkerSlot::new("Asha", "Day Off")],
            night: vec![WorkerSlot::new("Ben", "After class")],
            morning_passenger: Some("Chen".into()),
            night_passenger: None,
        };

        let row = RosterRow::try_from(&plan).unwrap();
        assert_eq!(row.day_index, 2);
        assert_eq!(row.morning, r#"[{"n":"Asha","t":"Day Off"}]"#);
        assert_eq!(row.passenger_m.as_deref(), Some("Chen"));
        assert_eq!(DayPlan::try_from(row).unwrap(), plan);
    }

    #[test]
    fn detects_member_on_two_duties() {
        let mut plan = DayPlan::empty(0);
        plan.morning.push(WorkerSlot::new("Asha", "Day Off"));
        plan.night.push(WorkerSlot::new("Ben", "Free"));
        assert_eq!(plan.find_conflict(), None);

        // 两人的组早晚班都要上
        plan.night.push(WorkerSlot::new("Asha", "Free"));
        assert_eq!(plan.find_conflict(), None);

        plan.night_passenger = Some("Ben".into());
        assert_eq!(plan.find_conflict(), Some("Ben"));

        plan.night_passenger = None;
        plan.morning.push(WorkerSlot::new("Asha", "Day Off"));
        assert_eq!(plan.find_conflict(), Some("Asha"));

        let mut plan = DayPlan::empty(1);
        plan.morning_passenger = Some("Chen".into());
        plan.night_passenger = Some("Chen".into());
        assert_eq!(plan.find_conflict(), Some("Chen"));
    }
}
