//! Two-gate early-leave approval: HR review, then director signature.

use crate::error::AppError;
use crate::model::early_leave::EarlyLeaveStatus;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum EarlyLeaveAction {
    HrApprove,
    HrReject,
    DirectorSign,
    DirectorReject,
    /// HR hands a letter awaiting signature to another director
    ReassignDirector,
}

impl EarlyLeaveAction {
    pub fn verb(self) -> &'static str {
        match self {
            EarlyLeaveAction::HrApprove => "approve",
            EarlyLeaveAction::HrReject | EarlyLeaveAction::DirectorReject => "reject",
            EarlyLeaveAction::DirectorSign => "sign",
            EarlyLeaveAction::ReassignDirector => "reassign",
        }
    }
}

pub fn transition(
    from: EarlyLeaveStatus,
    action: EarlyLeaveAction,
) -> Result<EarlyLeaveStatus, AppError> {
    use EarlyLeaveAction::*;
    use EarlyLeaveStatus::*;

    match (from, action) {
        (PendingHr, HrApprove) => Ok(PendingDirectorSign),
        (PendingHr, HrReject) => Ok(Rejected),
        (PendingDirectorSign, DirectorSign) => Ok(Approved),
        (PendingDirectorSign, DirectorReject) => Ok(Rejected),
        (PendingDirectorSign, ReassignDirector) => Ok(PendingDirectorSign),
        _ => Err(AppError::InvalidTransition {
            action: action.verb(),
            from: from.to_string(),
        }),
    }
}

/// `{no}/PLC/{unit}/{year}` with the sequence zero-padded to three digits.
pub fn letter_number(sequence: u32, unit_code: &str, year: i32) -> String {
    format!("{:03}/PLC/{}/{}", sequence, unit_code, year)
}

/// `LIKE` pattern matching every letter issued for a unit in a year. `%`
/// and `_` in the unit code match only themselves.
pub fn letter_pattern(unit_code: &str, year: i32) -> String {
    let mut escaped = String::with_capacity(unit_code.len());
    for c in unit_code.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    format!("%/PLC/{}/{}", escaped, year)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_goes_through_both_gates() {
        let s = transition(EarlyLeaveStatus::PendingHr, EarlyLeaveAction::HrApprove).unwrap();
        assert_eq!(s, EarlyLeaveStatus::PendingDirectorSign);
        let s = transition(s, EarlyLeaveAction::DirectorSign).unwrap();
        assert_eq!(s, EarlyLeaveStatus::Approved);
    }

    #[test]
    fn either_gate_can_reject() {
        assert_eq!(
            transition(EarlyLeaveStatus::PendingHr, EarlyLeaveAction::HrReject).unwrap(),
            EarlyLeaveStatus::Rejected
        );
        assert_eq!(
            transition(
                EarlyLeaveStatus::PendingDirectorSign,
                EarlyLeaveAction::DirectorReject
            )
            .unwrap(),
            EarlyLeaveStatus::Rejected
        );
    }

    #[test]
    fn director_cannot_sign_before_hr_review() {
        let err =
            transition(EarlyLeaveStatus::PendingHr, EarlyLeaveAction::DirectorSign).unwrap_err();
        assert_eq!(err.to_string(), "Cannot sign a request that is pending_hr");
    }

    #[test]
    fn hr_cannot_act_twice() {
        assert!(
            transition(
                EarlyLeaveStatus::PendingDirectorSign,
                EarlyLeaveAction::HrApprove
            )
            .is_err()
        );
        assert!(transition(EarlyLeaveStatus::Approved, EarlyLeaveAction::HrReject).is_err());
        assert!(transition(EarlyLeaveStatus::Rejected, EarlyLeaveAction::DirectorSign).is_err());
    }

    #[test]
    fn letter_number_is_zero_padded() {
        assert_eq!(letter_number(1, "HRD", 2026), "001/PLC/HRD/2026");
        assert_eq!(letter_number(42, "FIN", 2026), "042/PLC/FIN/2026");
        assert_eq!(letter_number(1234, "FIN", 2027), "1234/PLC/FIN/2027");
    }

    #[test]
    fn pattern_matches_issued_letters() {
        let pattern = letter_pattern("HRD", 2026);
        assert_eq!(pattern, "%/PLC/HRD/2026");
        assert!(letter_number(7, "HRD", 2026).ends_with(&pattern[1..]));
    }

    #[test]
    fn pattern_escapes_like_wildcards_in_unit_codes() {
        assert_eq!(letter_pattern("R_D", 2026), r"%/PLC/R\_D/2026");
        assert_eq!(letter_pattern("OPS%", 2026), r"%/PLC/OPS\%/2026");
    }

    #[test]
    fn reassignment_keeps_the_letter_waiting_for_a_signature() {
        assert_eq!(
            transition(
                EarlyLeaveStatus::PendingDirectorSign,
                EarlyLeaveAction::ReassignDirector
            )
            .unwrap(),
            EarlyLeaveStatus::PendingDirectorSign
        );
        assert!(transition(EarlyLeaveStatus::PendingHr, EarlyLeaveAction::ReassignDirector).is_err());
        assert!(transition(EarlyLeaveStatus::Approved, EarlyLeaveAction::ReassignDirector).is_err());
    }
}
