// 可用时间模型
// 每个成员按星期几登记上课时间，或者标记当天没课

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 星期，顺序固定，Monday = 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// 当前是星期几（UTC）
    pub fn today() -> Self {
        let offset = Utc::now().weekday().num_days_from_monday() as usize;
        Self::ALL[offset % 7]
    }

    pub fn name(self) -> &'static str {
        match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
            Weekday::Sunday => "Sunday",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum AvailabilityError {
    #[error("class time must be HH:MM, got '{0}'")]
    InvalidTime(String),
    #[error("start and end are required when the day is not off")]
    MissingTimes,
    #[error("class must start before it ends ({start} >= {end})")]
    StartNotBeforeEnd { start: String, end: String },
}

/// 某一天的安排：没课，或者一段上课时间
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDay", into = "RawDay")]
pub enum DayAvailability {
    Off,
    Class { start: NaiveTime, end: NaiveTime },
}

impl DayAvailability {
    /// 构造上课时间段，不接受跨夜课程
    pub fn class(start: &str, end: &str) -> Result<Self, AvailabilityError> {
        let start_time = parse_clock(start)?;
        let end_time = parse_clock(end)?;
        if start_time >= end_time {
            return Err(AvailabilityError::StartNotBeforeEnd {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(DayAvailability::Class {
            start: start_time,
            end: end_time,
        })
    }

    pub fn is_off(&self) -> bool {
        matches!(self, DayAvailability::Off)
    }

    /// 上课开始时间，十进制小时
    pub fn start_hours(&self) -> Option<f64> {
        match self {
            DayAvailability::Off => None,
            DayAvailability::Class { start, .. } => {
                Some(start.hour() as f64 + start.minute() as f64 / 60.0)
            }
        }
    }

    /// 上课时长（小时），没课为 0
    pub fn class_hours(&self) -> f64 {
        match self {
            DayAvailability::Off => 0.0,
            DayAvailability::Class { start, end } => (*end - *start).num_minutes() as f64 / 60.0,
        }
    }
}

fn parse_clock(value: &str) -> Result<NaiveTime, AvailabilityError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| AvailabilityError::InvalidTime(value.to_string()))
}

// 线上格式: {"off": true} 或 {"off": false, "start": "09:00", "end": "17:00"}
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawDay {
    off: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end: Option<String>,
}

impl TryFrom<RawDay> for DayAvailability {
    type Error = AvailabilityError;

    fn try_from(raw: RawDay) -> Result<Self, Self::Error> {
        if raw.off {
            return Ok(DayAvailability::Off);
        }
        match (raw.start, raw.end) {
            (Some(start), Some(end)) => DayAvailability::class(&start, &end),
            _ => Err(AvailabilityError::MissingTimes),
        }
    }
}

impl From<DayAvailability> for RawDay {
    fn from(day: DayAvailability) -> Self {
        match day {
            DayAvailability::Off => RawDay {
                off: true,
                start: None,
                end: None,
            },
            DayAvailability::Class { start, end } => RawDay {
                off: false,
                start: Some(start.format("%H:%M").to_string()),
                end: Some(end.format("%H:%M").to_string()),
            },
        }
    }
}

/// 一个成员一周的可用时间
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeekAvailability(BTreeMap<Weekday, DayAvailability>);

impl WeekAvailability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, day: Weekday, availability: DayAvailability) {
        self.0.insert(day, availability);
    }

    pub fn with(mut self, day: Weekday, availability: DayAvailability) -> Self {
        self.set(day, availability);
        self
    }

    pub fn day(&self, day: Weekday) -> Option<&DayAvailability> {
        self.0.get(&day)
    }

    pub fn missing_days(&self) -> Vec<Weekday> {
        Weekday::ALL
            .into_iter()
            .filter(|day| !self.0.contains_key(day))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_days().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_off_and_class_days() {
        let off: DayAvailability = serde_json::from_str(r#"{"off": true}"#).unwrap();
        assert_eq!(off, DayAvailability::Off);

        let class: DayAvailability =
            serde_json::from_str(r#"{"off": false, "start": "09:30", "end": "17:00"}"#).unwrap();
        assert_eq!(class.start_hours(), Some(9.5));
        assert_eq!(class.class_hours(), 7.5);
    }

    #[test]
    fn rejects_inverted_or_partial_class() {
        assert!(serde_json::from_str::<DayAvailability>(
            r#"{"off": false, "start": "18:00", "end": "12:00"}"#
        )
        .is_err());
        assert!(serde_json::from_str::<DayAvailability>(r#"{"off": false, "start": "09:00"}"#).is_err());
        assert_eq!(
            DayAvailability::class("9am", "10:00"),
            Err(AvailabilityError::InvalidTime("9am".into()))
        );
    }

    #[test]
    fn week_reports_missing_days() {
        let week = WeekAvailability::new()
            .with(Weekday::Monday, DayAvailability::Off)
            .with(Weekday::Sunday, DayAvailability::Off);
        assert!(!week.is_complete());
        assert_eq!(week.missing_days().len(), 5);
        assert_eq!(week.missing_days()[0], Weekday::Tuesday);
    }

    #[test]
    fn week_serializes_with_day_names() {
        let week = WeekAvailability::new().with(
            Weekday::Friday,
            DayAvailability::class("12:00", "18:00").unwrap(),
        );
        let json = serde_json::to_value(&week).unwrap();
        assert_eq!(json["Friday"]["start"], "12:00");
        assert_eq!(json["Friday"]["off"], false);
    }
}
