mod task;

pub use task::{
    CheckIn, CheckInFeedback, SubTask, TaskStatus, now_rfc3339, parse_timestamp, sort_by_deadline,
};
