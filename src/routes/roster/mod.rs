mod handler;
mod model;

pub use handler::{get_today, get_week, update_day};
pub use model::{Roster, RosterTodayResponse, RosterWeekResponse, UpdateRosterRequest};
