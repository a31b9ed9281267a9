pub mod attendance;
pub mod department;
pub mod early_leave;
pub mod employee;
pub mod feedback;
pub mod leave_balance;
pub mod leave_request;
pub mod leave_type;
pub mod notification;
pub mod performance;
pub mod role;
