//! Database access and the transactional write paths of each workflow.

pub mod attendance;
pub mod early_leave;
pub mod employee;
pub mod feedback;
pub mod leave;
pub mod notification;
pub mod performance;
pub mod schedule;

#[cfg(test)]
pub mod fixtures;
