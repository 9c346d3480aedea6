// 排班模块
// 成员的可用时间、排班引擎以及 roster 存储格式

pub mod availability;
pub mod engine;
pub mod plan;

pub use availability::{AvailabilityError, DayAvailability, WeekAvailability, Weekday};
pub use engine::{MAX_WORKERS_PER_SHIFT, MIN_MEMBERS, PlanError, ShiftCounter, generate_plan};
pub use plan::{DayPlan, RosterRow, WorkerSlot};
