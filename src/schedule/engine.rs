// 排班引擎
// 输入所有成员和一周的可用时间，输出 7 天的早晚班排班。
// 纯函数，不做任何 I/O，可以随时重算。

use std::collections::HashMap;

use thiserror::Error;

use super::availability::{DayAvailability, WeekAvailability, Weekday};
use super::plan::{DayPlan, WorkerSlot};
use crate::models::member::Member;

/// 至少需要的成员数
pub const MIN_MEMBERS: usize = 2;
/// 每个班次最多的值班人数
pub const MAX_WORKERS_PER_SHIFT: usize = 2;
/// 上课时间不早于 11:00 才来得及做早饭
const MORNING_CUTOFF_HOURS: f64 = 11.0;

const NOTE_DAY_OFF: &str = "Day Off";
const NOTE_COOK_BEFORE_CLASS: &str = "Cook before leaving";
const NOTE_FREE: &str = "Free";
const NOTE_AFTER_CLASS: &str = "After class";

#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("need at least 2 members to generate a plan, found {found}")]
    InsufficientMembers { found: usize },
    #[error("member '{member}' has not completed their schedule")]
    IncompleteSchedule { member: String },
}

/// 本次生成过程中每个成员累计的班次数，只用于公平性排序，生成结束即丢弃
#[derive(Debug, Default, Clone)]
pub struct ShiftCounter {
    counts: HashMap<String, u32>,
}

impl ShiftCounter {
    pub fn get(&self, member_id: &str) -> u32 {
        self.counts.get(member_id).copied().unwrap_or(0)
    }

    fn record(&mut self, member_id: &str) {
        *self.counts.entry(member_id.to_string()).or_insert(0) += 1;
    }
}

/// 成员在某一天的状态
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum DayStatus {
    Off,
    /// 上课开始时间不早于 11:00
    CanCook { class_hours: f64 },
    CannotCook { class_hours: f64 },
}

impl DayStatus {
    fn classify(availability: &DayAvailability) -> Self {
        match availability.start_hours() {
            None => DayStatus::Off,
            Some(start) if start >= MORNING_CUTOFF_HOURS => DayStatus::CanCook {
                class_hours: availability.class_hours(),
            },
            Some(_) => DayStatus::CannotCook {
                class_hours: availability.class_hours(),
            },
        }
    }

    fn class_hours(self) -> f64 {
        match self {
            DayStatus::Off => 0.0,
            DayStatus::CanCook { class_hours } | DayStatus::CannotCook { class_hours } => {
                class_hours
            }
        }
    }

    fn morning_note(self) -> Option<&'static str> {
        match self {
            DayStatus::Off => Some(NOTE_DAY_OFF),
            DayStatus::CanCook { .. } => Some(NOTE_COOK_BEFORE_CLASS),
            DayStatus::CannotCook { .. } => None,
        }
    }

    fn night_note(self) -> &'static str {
        match self {
            DayStatus::Off => NOTE_FREE,
            _ => NOTE_AFTER_CLASS,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DayPerson<'a> {
    pub member: &'a Member,
    pub status: DayStatus,
}

/// 生成一周的排班
///
/// 所有成员必须都有完整的 7 天可用时间，否则不产出任何结果。
/// 班次计数在 7 天之间累加，因此公平性是按整周计算的。
pub fn generate_plan(
    members: &[Member],
    availability: &HashMap<String, WeekAvailability>,
) -> Result<Vec<DayPlan>, PlanError> {
    if members.len() < MIN_MEMBERS {
        return Err(PlanError::InsufficientMembers {
            found: members.len(),
        });
    }

    let mut weeks = Vec::with_capacity(members.len());
    for member in members {
        match availability.get(&member.id) {
            Some(week) if week.is_complete() => weeks.push((member, week)),
            _ => {
                return Err(PlanError::IncompleteSchedule {
                    member: member.name.clone(),
                });
            }
        }
    }

    let mut counter = ShiftCounter::default();
    let plan = Weekday::ALL
        .into_iter()
        .map(|day| plan_day(day, &weeks, &mut counter))
        .collect::<Vec<_>>();

    tracing::debug!(
        "Generated plan for {} members: {:?}",
        members.len(),
        members
            .iter()
            .map(|m| (m.name.as_str(), counter.get(&m.id)))
            .collect::<Vec<_>>()
    );

    Ok(plan)
}

/// 单日排班：分类 → 早班 → 晚班 → 乘客
pub(crate) fn plan_day(
    day: Weekday,
    weeks: &[(&Member, &WeekAvailability)],
    counter: &mut ShiftCounter,
) -> DayPlan {
    let people = classify_day(day, weeks);

    let morning = select_morning(&people, counter);
    for &i in &morning {
        counter.record(&people[i].member.id);
    }

    let night = select_night(&people, &morning, counter);
    for &i in &night {
        counter.record(&people[i].member.id);
    }

    let (morning_passenger, night_passenger) = assign_passengers(&people, &morning, &night);

    DayPlan {
        day_index: day.index() as u8,
        morning: morning
            .iter()
            .filter_map(|&i| {
                let person = &people[i];
                person
                    .status
                    .morning_note()
                    .map(|note| WorkerSlot::new(&person.member.name, note))
            })
            .collect(),
        night: night
            .iter()
            .map(|&i| WorkerSlot::new(&people[i].member.name, people[i].status.night_note()))
            .collect(),
        morning_passenger: morning_passenger.map(|i| people[i].member.name.clone()),
        night_passenger: night_passenger.map(|i| people[i].member.name.clone()),
    }
}

pub(crate) fn classify_day<'a>(
    day: Weekday,
    weeks: &[(&'a Member, &WeekAvailability)],
) -> Vec<DayPerson<'a>> {
    weeks
        .iter()
        .map(|&(member, week)| DayPerson {
            member,
            // 已经校验过完整性，缺失只可能来自调用方直接传入
            status: week
                .day(day)
                .map(DayStatus::classify)
                .unwrap_or(DayStatus::Off),
        })
        .collect()
}

/// 早班：没课或者 11 点以后才上课的人里，选班次最少的两个（同数保持输入顺序）
pub(crate) fn select_morning(people: &[DayPerson<'_>], counter: &ShiftCounter) -> Vec<usize> {
    let mut candidates = people
        .iter()
        .enumerate()
        .filter(|(_, p)| p.status.morning_note().is_some())
        .map(|(i, p)| (i, counter.get(&p.member.id)))
        .collect::<Vec<_>>();

    candidates.sort_by_key(|&(_, shifts)| shifts);
    candidates
        .into_iter()
        .take(MAX_WORKERS_PER_SHIFT)
        .map(|(i, _)| i)
        .collect()
}

/// 晚班的排序依据：当天课越少越优先，班次数只用于打平
fn night_priority(person: &DayPerson<'_>, counter: &ShiftCounter) -> f64 {
    person.status.class_hours() * 10.0 + counter.get(&person.member.id) as f64
}

fn rank_for_night(
    people: &[DayPerson<'_>],
    candidates: impl Iterator<Item = usize>,
    counter: &ShiftCounter,
) -> Vec<usize> {
    let mut ranked = candidates
        .map(|i| (i, night_priority(&people[i], counter)))
        .collect::<Vec<_>>();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
    ranked.into_iter().map(|(i, _)| i).collect()
}

/// 晚班第一步：没排到早班的人必须上晚班，超过名额时按优先级取前两名
pub(crate) fn forced_night(
    people: &[DayPerson<'_>],
    morning: &[usize],
    counter: &ShiftCounter,
) -> Vec<usize> {
    let mut forced = rank_for_night(
        people,
        (0..people.len()).filter(|i| !morning.contains(i)),
        counter,
    );
    forced.truncate(MAX_WORKERS_PER_SHIFT);
    forced
}

/// 晚班第二步：不足两人时从其余所有人（包括早班的人）里补足
///
/// 早班的人此时已经多记了一个班次，同等课时下会排在后面。
pub(crate) fn fill_night(
    people: &[DayPerson<'_>],
    mut night: Vec<usize>,
    counter: &ShiftCounter,
) -> Vec<usize> {
    if night.len() >= MAX_WORKERS_PER_SHIFT {
        return night;
    }
    let extra = rank_for_night(
        people,
        (0..people.len()).filter(|i| !night.contains(i)),
        counter,
    );
    let missing = MAX_WORKERS_PER_SHIFT - night.len();
    night.extend(extra.into_iter().take(missing));
    night
}

/// 晚班 = 强制名单 + 补位
pub(crate) fn select_night(
    people: &[DayPerson<'_>],
    morning: &[usize],
    counter: &ShiftCounter,
) -> Vec<usize> {
    fill_night(people, forced_night(people, morning, counter), counter)
}

/// 没有值班的人按输入顺序，第一个是早班乘客，第二个是晚班乘客，其余不标记
pub(crate) fn assign_passengers(
    people: &[DayPerson<'_>],
    morning: &[usize],
    night: &[usize],
) -> (Option<usize>, Option<usize>) {
    let mut idle = (0..people.len()).filter(|i| !morning.contains(i) && !night.contains(i));
    (idle.next(), idle.next())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(start: &str, end: &str) -> DayAvailability {
        DayAvailability::class(start, end).unwrap()
    }

    fn person<'a>(member: &'a Member, day: DayAvailability) -> DayPerson<'a> {
        DayPerson {
            member,
            status: DayStatus::classify(&day),
        }
    }

    #[test]
    fn classifies_by_eleven_oclock_cutoff() {
        assert_eq!(DayStatus::classify(&DayAvailability::Off), DayStatus::Off);
        assert_eq!(
            DayStatus::classify(&class("11:00", "13:00")),
            DayStatus::CanCook { class_hours: 2.0 }
        );
        assert_eq!(
            DayStatus::classify(&class("10:59", "12:59")),
            DayStatus::CannotCook { class_hours: 2.0 }
        );
    }

    #[test]
    fn morning_prefers_fewer_shifts_and_keeps_input_order_on_ties() {
        let a = Member::new("a", "A");
        let b = Member::new("b", "B");
        let c = Member::new("c", "C");
        let people = vec![
            person(&a, DayAvailability::Off),
            person(&b, DayAvailability::Off),
            person(&c, DayAvailability::Off),
        ];

        let counter = ShiftCounter::default();
        assert_eq!(select_morning(&people, &counter), vec![0, 1]);

        let mut counter = ShiftCounter::default();
        counter.record("a");
        assert_eq!(select_morning(&people, &counter), vec![1, 2]);
    }

    #[test]
    fn morning_skips_early_classes() {
        let a = Member::new("a", "A");
        let b = Member::new("b", "B");
        let people = vec![
            person(&a, class("08:00", "12:00")),
            person(&b, class("13:00", "15:00")),
        ];
        assert_eq!(select_morning(&people, &ShiftCounter::default()), vec![1]);
    }

    #[test]
    fn night_takes_the_morning_complement_ranked_by_class_hours() {
        let members = ["a", "b", "c", "d", "e"].map(|id| Member::new(id, id.to_uppercase()));
        let people = vec![
            person(&members[0], DayAvailability::Off),
            person(&members[1], DayAvailability::Off),
            person(&members[2], class("09:00", "17:00")),
            person(&members[3], class("08:00", "10:00")),
            person(&members[4], class("09:00", "12:00")),
        ];

        let night = select_night(&people, &[0, 1], &ShiftCounter::default());
        assert_eq!(night, vec![3, 4]);

        let (m, n) = assign_passengers(&people, &[0, 1], &night);
        assert_eq!((m, n), (Some(2), None));
    }

    #[test]
    fn night_fills_from_morning_workers_when_short() {
        let a = Member::new("a", "A");
        let b = Member::new("b", "B");
        let c = Member::new("c", "C");
        let people = vec![
            person(&a, DayAvailability::Off),
            person(&b, class("09:00", "17:00")),
            person(&c, class("12:00", "18:00")),
        ];
        let mut counter = ShiftCounter::default();
        counter.record("a");
        counter.record("c");

        assert_eq!(forced_night(&people, &[0, 2], &counter), vec![1]);
        // A 没课，优先于课多的 C
        assert_eq!(select_night(&people, &[0, 2], &counter), vec![1, 0]);
    }

    #[test]
    fn night_is_staffed_even_when_morning_takes_everyone() {
        let a = Member::new("a", "A");
        let b = Member::new("b", "B");
        let people = vec![
            person(&a, DayAvailability::Off),
            person(&b, DayAvailability::Off),
        ];
        let mut counter = ShiftCounter::default();
        counter.record("a");
        counter.record("b");

        assert!(forced_night(&people, &[0, 1], &counter).is_empty());
        assert_eq!(select_night(&people, &[0, 1], &counter), vec![0, 1]);
        assert_eq!(assign_passengers(&people, &[0, 1], &[0, 1]), (None, None));
    }

    #[test]
    fn night_uses_shift_count_as_tie_break() {
        let a = Member::new("a", "A");
        let b = Member::new("b", "B");
        let c = Member::new("c", "C");
        let people = vec![
            person(&a, DayAvailability::Off),
            person(&b, class("08:00", "10:00")),
            person(&c, class("08:00", "10:00")),
        ];
        let mut counter = ShiftCounter::default();
        counter.record("b");

        // A 上早班，B、C 课时相同，C 班次更少
        let night = select_night(&people[..], &[0], &counter);
        assert_eq!(night, vec![2, 1]);
        let night = select_night(&people[1..], &[], &counter);
        assert_eq!(night, vec![1, 0]);
    }

    #[test]
    fn generation_rejects_small_or_incomplete_groups() {
        let a = Member::new("a", "A");
        let b = Member::new("b", "B");
        let mut availability = HashMap::new();
        let full = Weekday::ALL
            .into_iter()
            .fold(WeekAvailability::new(), |w, d| w.with(d, DayAvailability::Off));
        availability.insert("a".to_string(), full.clone());

        assert_eq!(
            generate_plan(std::slice::from_ref(&a), &availability),
            Err(PlanError::InsufficientMembers { found: 1 })
        );
        assert_eq!(
            generate_plan(&[a.clone(), b.clone()], &availability),
            Err(PlanError::IncompleteSchedule {
                member: "B".into()
            })
        );

        let partial = WeekAvailability::new().with(Weekday::Monday, DayAvailability::Off);
        availability.insert("b".to_string(), partial);
        assert!(generate_plan(&[a, b], &availability).is_err());
    }
}
