mod handler;
mod model;

pub use handler::{generate_plan, get_schedule, save_schedule};
pub use model::{GeneratePlanResponse, MemberSchedule, SaveScheduleRequest, ScheduleResponse};
