//! Derives a day's attendance status from clock times and the scheduled shift.

use chrono::NaiveTime;

use crate::model::attendance::{AttendanceStatus, ScheduleDay, Shift};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScheduledShift {
    pub clock_in: NaiveTime,
    pub clock_out: NaiveTime,
    pub late_tolerance_minutes: i32,
    pub early_leave_tolerance_minutes: i32,
}

impl From<&Shift> for ScheduledShift {
    fn from(s: &Shift) -> Self {
        ScheduledShift {
            clock_in: s.clock_in,
            clock_out: s.clock_out,
            late_tolerance_minutes: s.late_tolerance_minutes,
            early_leave_tolerance_minutes: s.early_leave_tolerance_minutes,
        }
    }
}

impl From<&ScheduleDay> for ScheduledShift {
    fn from(s: &ScheduleDay) -> Self {
        ScheduledShift {
            clock_in: s.clock_in,
            clock_out: s.clock_out,
            late_tolerance_minutes: s.late_tolerance_minutes,
            early_leave_tolerance_minutes: s.early_leave_tolerance_minutes,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DayOutcome {
    pub status: AttendanceStatus,
    pub late_minutes: i32,
    pub early_leave_minutes: i32,
    pub work_duration_minutes: Option<i32>,
}

fn minutes_between(from: NaiveTime, to: NaiveTime) -> i32 {
    (to - from).num_minutes() as i32
}

pub fn evaluate(
    clock_in: Option<NaiveTime>,
    clock_out: Option<NaiveTime>,
    shift: Option<&ScheduledShift>,
) -> DayOutcome {
    let Some(clock_in) = clock_in else {
        let status = if shift.is_some() {
            AttendanceStatus::Absent
        } else {
            AttendanceStatus::Off
        };
        return DayOutcome {
            status,
            late_minutes: 0,
            early_leave_minutes: 0,
            work_duration_minutes: None,
        };
    };

    let work_duration_minutes = clock_out.map(|out| minutes_between(clock_in, out).max(0));

    let (late_minutes, early_leave_minutes, is_late, is_early) = match shift {
        Some(shift) => {
            let late = minutes_between(shift.clock_in, clock_in).max(0);
            let early = clock_out
                .map(|out| minutes_between(out, shift.clock_out).max(0))
                .unwrap_or(0);
            (
                late,
                early,
                late > shift.late_tolerance_minutes.max(0),
                early > shift.early_leave_tolerance_minutes.max(0),
            )
        }
        None => (0, 0, false, false),
    };

    let status = match (is_late, is_early) {
        (true, true) => AttendanceStatus::LateEarlyLeave,
        (true, false) => AttendanceStatus::Late,
        (false, true) => AttendanceStatus::EarlyLeave,
        (false, false) => AttendanceStatus::Present,
    };

    DayOutcome {
        status,
        late_minutes,
        early_leave_minutes,
        work_duration_minutes,
    }
}

/// Manual statuses keep their status and carry no minute counts.
pub fn manual(status: AttendanceStatus) -> DayOutcome {
    DayOutcome {
        status,
        late_minutes: 0,
        early_leave_minutes: 0,
        work_duration_minutes: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn office() -> ScheduledShift {
        ScheduledShift {
            clock_in: t(8, 0),
            clock_out: t(17, 0),
            late_tolerance_minutes: 0,
            early_leave_tolerance_minutes: 0,
        }
    }

    #[test]
    fn fifteen_minutes_late_is_late() {
        let out = evaluate(Some(t(8, 15)), Some(t(17, 0)), Some(&office()));
        assert_eq!(out.status, AttendanceStatus::Late);
        assert_eq!(out.late_minutes, 15);
        assert_eq!(out.early_leave_minutes, 0);
        assert_eq!(out.work_duration_minutes, Some(525));
    }

    #[test]
    fn on_time_is_present() {
        let out = evaluate(Some(t(7, 55)), Some(t(17, 5)), Some(&office()));
        assert_eq!(out.status, AttendanceStatus::Present);
        assert_eq!(out.late_minutes, 0);
        assert_eq!(out.early_leave_minutes, 0);
    }

    #[test]
    fn leaving_early_is_early_leave() {
        let out = evaluate(Some(t(8, 0)), Some(t(16, 30)), Some(&office()));
        assert_eq!(out.status, AttendanceStatus::EarlyLeave);
        assert_eq!(out.early_leave_minutes, 30);
    }

    #[test]
    fn late_and_early_combine() {
        let out = evaluate(Some(t(8, 10)), Some(t(16, 50)), Some(&office()));
        assert_eq!(out.status, AttendanceStatus::LateEarlyLeave);
        assert_eq!((out.late_minutes, out.early_leave_minutes), (10, 10));
    }

    #[test]
    fn no_clock_in_on_a_scheduled_day_is_absent() {
        let out = evaluate(None, None, Some(&office()));
        assert_eq!(out.status, AttendanceStatus::Absent);
        assert_eq!(out.work_duration_minutes, None);
    }

    #[test]
    fn no_clock_in_without_schedule_is_off() {
        assert_eq!(evaluate(None, None, None).status, AttendanceStatus::Off);
    }

    #[test]
    fn unscheduled_work_counts_as_present_with_duration() {
        let out = evaluate(Some(t(10, 0)), Some(t(12, 30)), None);
        assert_eq!(out.status, AttendanceStatus::Present);
        assert_eq!(out.work_duration_minutes, Some(150));
    }

    #[test]
    fn open_day_has_no_early_leave_yet() {
        let out = evaluate(Some(t(8, 5)), None, Some(&office()));
        assert_eq!(out.status, AttendanceStatus::Late);
        assert_eq!(out.early_leave_minutes, 0);
        assert_eq!(out.work_duration_minutes, None);
    }

    #[test]
    fn tolerance_decides_status_but_minutes_stay_raw() {
        let shift = ScheduledShift {
            late_tolerance_minutes: 10,
            ..office()
        };
        let out = evaluate(Some(t(8, 5)), Some(t(17, 0)), Some(&shift));
        assert_eq!(out.status, AttendanceStatus::Present);
        assert_eq!(out.late_minutes, 5);
    }

    #[test]
    fn manual_entries_bypass_calculation() {
        let out = manual(AttendanceStatus::Sick);
        assert_eq!(out.status, AttendanceStatus::Sick);
        assert_eq!(out.late_minutes, 0);
        assert!(AttendanceStatus::Sick.is_manual());
        assert!(!AttendanceStatus::Late.is_manual());
    }
}
