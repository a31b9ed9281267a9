pub mod attendance;
pub mod calibration;
pub mod early_leave;
pub mod employee;
pub mod feedback;
pub mod leave_balance;
pub mod leave_request;
pub mod notification;
pub mod performance;
pub mod schedule;
