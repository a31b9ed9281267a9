//! Leave request state machine.

use chrono::NaiveDate;

use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::leave_request::LeaveStatus;
use crate::workflow::ledger::LedgerEffect;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LeaveAction {
    Submit,
    Approve,
    Reject,
    Cancel,
}

impl LeaveAction {
    pub fn verb(self) -> &'static str {
        match self {
            LeaveAction::Submit => "submit",
            LeaveAction::Approve => "approve",
            LeaveAction::Reject => "reject",
            LeaveAction::Cancel => "cancel",
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Transition {
    pub to: LeaveStatus,
    pub effect: LedgerEffect,
}

/// The only legal moves; everything else is refused here rather than in the
/// handlers.
pub fn transition(from: LeaveStatus, action: LeaveAction) -> Result<Transition, AppError> {
    use LeaveAction::*;
    use LeaveStatus::*;

    let (to, effect) = match (from, action) {
        (Draft, Submit) => (Pending, LedgerEffect::Reserve),
        (Pending, Approve) => (Approved, LedgerEffect::Consume),
        (Pending, Reject) => (Rejected, LedgerEffect::Release),
        (Draft, Cancel) => (Cancelled, LedgerEffect::Nothing),
        (Pending, Cancel) => (Cancelled, LedgerEffect::Release),
        _ => {
            return Err(AppError::InvalidTransition {
                action: action.verb(),
                from: from.to_string(),
            });
        }
    };

    Ok(Transition { to, effect })
}

/// Who may take `action` on a request owned by `owner`: owners submit and
/// cancel their own requests, the HR desk decides on other people's.
pub fn authorize(action: LeaveAction, actor: &AuthUser, owner: u64) -> Result<(), AppError> {
    let is_owner = actor.employee_id == Some(owner);
    match action {
        LeaveAction::Submit if is_owner => Ok(()),
        LeaveAction::Submit => Err(AppError::Forbidden("Only the requester can submit")),
        LeaveAction::Cancel if is_owner || actor.is_hr_desk() => Ok(()),
        LeaveAction::Cancel => Err(AppError::Forbidden("Not your request")),
        LeaveAction::Approve | LeaveAction::Reject if !actor.is_hr_desk() => {
            Err(AppError::Forbidden("HR/Admin only"))
        }
        LeaveAction::Approve | LeaveAction::Reject if is_owner => {
            Err(AppError::Forbidden("You cannot decide your own request"))
        }
        LeaveAction::Approve | LeaveAction::Reject => Ok(()),
    }
}

/// Requests may only be edited before a decision is made.
pub fn ensure_editable(status: LeaveStatus) -> Result<(), AppError> {
    match status {
        LeaveStatus::Draft | LeaveStatus::Pending => Ok(()),
        other => Err(AppError::InvalidTransition {
            action: "edit",
            from: other.to_string(),
        }),
    }
}

/// Inclusive calendar day count, or half a day.
pub fn total_days(start: NaiveDate, end: NaiveDate, is_half_day: bool) -> Result<f64, AppError> {
    if start > end {
        return Err(AppError::validation("start_date cannot be after end_date"));
    }
    if is_half_day {
        if start != end {
            return Err(AppError::validation(
                "A half-day request must start and end on the same date",
            ));
        }
        return Ok(0.5);
    }
    Ok(((end - start).num_days() + 1) as f64)
}

/// True when the two inclusive ranges share at least one day.
pub fn overlaps(a_start: NaiveDate, a_end: NaiveDate, b_start: NaiveDate, b_end: NaiveDate) -> bool {
    a_start <= b_end && b_start <= a_end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;

    fn actor(role: Role, employee_id: u64) -> AuthUser {
        AuthUser {
            user_id: employee_id + 1000,
            username: format!("user{employee_id}"),
            role,
            employee_id: Some(employee_id),
        }
    }

    #[test]
    fn owners_submit_and_cancel_hr_decides() {
        let owner = actor(Role::Employee, 1);
        let hr = actor(Role::Hr, 2);
        let colleague = actor(Role::Employee, 3);

        assert!(authorize(LeaveAction::Submit, &owner, 1).is_ok());
        assert!(authorize(LeaveAction::Submit, &hr, 1).is_err());
        assert!(authorize(LeaveAction::Cancel, &owner, 1).is_ok());
        assert!(authorize(LeaveAction::Cancel, &hr, 1).is_ok());
        assert!(authorize(LeaveAction::Cancel, &colleague, 1).is_err());
        assert!(authorize(LeaveAction::Approve, &hr, 1).is_ok());
        assert!(authorize(LeaveAction::Reject, &colleague, 1).is_err());
    }

    #[test]
    fn hr_cannot_approve_their_own_leave() {
        let hr = actor(Role::Hr, 2);
        let err = authorize(LeaveAction::Approve, &hr, 2).unwrap_err();
        assert_eq!(err.to_string(), "You cannot decide your own request");
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn happy_path_reserves_then_consumes() {
        let t = transition(LeaveStatus::Draft, LeaveAction::Submit).unwrap();
        assert_eq!(t.to, LeaveStatus::Pending);
        assert_eq!(t.effect, LedgerEffect::Reserve);

        let t = transition(LeaveStatus::Pending, LeaveAction::Approve).unwrap();
        assert_eq!(t.to, LeaveStatus::Approved);
        assert_eq!(t.effect, LedgerEffect::Consume);
    }

    #[test]
    fn rejection_and_pending_cancellation_release_the_reservation() {
        let t = transition(LeaveStatus::Pending, LeaveAction::Reject).unwrap();
        assert_eq!((t.to, t.effect), (LeaveStatus::Rejected, LedgerEffect::Release));

        let t = transition(LeaveStatus::Pending, LeaveAction::Cancel).unwrap();
        assert_eq!((t.to, t.effect), (LeaveStatus::Cancelled, LedgerEffect::Release));

        let t = transition(LeaveStatus::Draft, LeaveAction::Cancel).unwrap();
        assert_eq!((t.to, t.effect), (LeaveStatus::Cancelled, LedgerEffect::Nothing));
    }

    #[test]
    fn terminal_states_accept_no_action() {
        for from in LeaveStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            for action in [
                LeaveAction::Submit,
                LeaveAction::Approve,
                LeaveAction::Reject,
                LeaveAction::Cancel,
            ] {
                assert!(
                    transition(from, action).is_err(),
                    "{from} should not accept {action:?}"
                );
            }
        }
    }

    #[test]
    fn drafts_cannot_be_decided_and_pending_cannot_be_resubmitted() {
        assert!(transition(LeaveStatus::Draft, LeaveAction::Approve).is_err());
        assert!(transition(LeaveStatus::Draft, LeaveAction::Reject).is_err());
        let err = transition(LeaveStatus::Pending, LeaveAction::Submit).unwrap_err();
        assert_eq!(err.to_string(), "Cannot submit a request that is pending");
    }

    #[test]
    fn only_open_requests_are_editable() {
        assert!(ensure_editable(LeaveStatus::Draft).is_ok());
        assert!(ensure_editable(LeaveStatus::Pending).is_ok());
        assert!(ensure_editable(LeaveStatus::Approved).is_err());
        assert!(ensure_editable(LeaveStatus::Cancelled).is_err());
    }

    #[test]
    fn total_days_is_inclusive() {
        assert_eq!(total_days(d(2026, 3, 2), d(2026, 3, 2), false).unwrap(), 1.0);
        assert_eq!(total_days(d(2026, 3, 2), d(2026, 3, 6), false).unwrap(), 5.0);
        assert_eq!(total_days(d(2026, 2, 27), d(2026, 3, 2), false).unwrap(), 4.0);
    }

    #[test]
    fn half_day_counts_as_half() {
        assert_eq!(total_days(d(2026, 3, 2), d(2026, 3, 2), true).unwrap(), 0.5);
        assert!(total_days(d(2026, 3, 2), d(2026, 3, 3), true).is_err());
    }

    #[test]
    fn reversed_range_is_rejected() {
        let err = total_days(d(2026, 3, 5), d(2026, 3, 2), false).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn overlap_detects_any_shared_day() {
        let (s, e) = (d(2026, 3, 10), d(2026, 3, 12));
        assert!(overlaps(s, e, d(2026, 3, 12), d(2026, 3, 15)));
        assert!(overlaps(s, e, d(2026, 3, 1), d(2026, 3, 10)));
        assert!(overlaps(s, e, d(2026, 3, 11), d(2026, 3, 11)));
        assert!(overlaps(s, e, d(2026, 3, 1), d(2026, 3, 31)));
        assert!(!overlaps(s, e, d(2026, 3, 13), d(2026, 3, 14)));
        assert!(!overlaps(s, e, d(2026, 3, 1), d(2026, 3, 9)));
    }

    #[test]
    fn only_live_requests_block_dates() {
        assert!(LeaveStatus::Pending.blocks_overlap());
        assert!(LeaveStatus::Approved.blocks_overlap());
        assert!(LeaveStatus::Draft.blocks_overlap());
        assert!(!LeaveStatus::Rejected.blocks_overlap());
        assert!(!LeaveStatus::Cancelled.blocks_overlap());
    }
}
