mod handler;
mod model;

pub use handler::{assign_tasks, get_today_tasks};
pub use model::{
    AssignTasksResponse, CHORES, ChoreAssignment, DailyTasks, TodayTasksResponse, assign_chores,
};
