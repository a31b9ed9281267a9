//! Business rules with no I/O. Storage code locks rows, hands them to these
//! functions, and writes back whatever they return.

pub mod attendance;
pub mod early_leave;
pub mod feedback;
pub mod leave;
pub mod ledger;
pub mod performance;
pub mod summary;
