//! Leave balance arithmetic.
//!
//! A balance row is read under a row lock, mutated here, then written back in
//! the same transaction. `available` is always derived and never stored.

use crate::error::AppError;
use crate::model::leave_balance::LeaveBalance;

const EPSILON: f64 = 1e-9;

/// What a leave transition does to the ledger.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LedgerEffect {
    Nothing,
    /// Hold days against the balance while a request awaits a decision
    Reserve,
    /// Give back a reservation
    Release,
    /// Turn a reservation into used days
    Consume,
}

impl LeaveBalance {
    pub fn available(&self) -> f64 {
        self.initial_balance + self.carry_over + self.adjustment - self.used - self.pending
    }

    /// Reserves `days`; refused when `enforce` is set and the balance cannot
    /// cover them.
    pub fn add_pending(&mut self, days: f64, enforce: bool) -> Result<(), AppError> {
        if days < 0.0 {
            return Err(AppError::validation("Leave days cannot be negative"));
        }
        let available = self.available();
        if enforce && available + EPSILON < days {
            return Err(AppError::InsufficientBalance {
                available,
                requested: days,
            });
        }
        self.pending += days;
        Ok(())
    }

    pub fn remove_pending(&mut self, days: f64) {
        self.pending = (self.pending - days).max(0.0);
    }

    pub fn use_days(&mut self, days: f64) {
        self.remove_pending(days);
        self.used += days;
    }

    pub fn apply(&mut self, effect: LedgerEffect, days: f64, enforce: bool) -> Result<(), AppError> {
        match effect {
            LedgerEffect::Nothing => Ok(()),
            LedgerEffect::Reserve => self.add_pending(days, enforce),
            LedgerEffect::Release => {
                self.remove_pending(days);
                Ok(())
            }
            LedgerEffect::Consume => {
                self.use_days(days);
                Ok(())
            }
        }
    }

    /// Swaps a pending reservation of `old_days` for one of `new_days`,
    /// leaving the balance untouched when the new amount does not fit.
    pub fn replace_pending(
        &mut self,
        old_days: f64,
        new_days: f64,
        enforce: bool,
    ) -> Result<(), AppError> {
        let before = self.clone();
        self.remove_pending(old_days);
        if let Err(e) = self.add_pending(new_days, enforce) {
            *self = before;
            return Err(e);
        }
        Ok(())
    }

    /// HR edits of carry-over and manual adjustment.
    pub fn set_allowances(
        &mut self,
        carry_over: Option<f64>,
        adjustment: Option<f64>,
    ) -> Result<(), AppError> {
        let mut next = self.clone();
        if let Some(v) = carry_over {
            if v < 0.0 {
                return Err(AppError::validation("carry_over cannot be negative"));
            }
            next.carry_over = v;
        }
        if let Some(v) = adjustment {
            next.adjustment = v;
        }
        if next.available() < -EPSILON {
            return Err(AppError::validation(format!(
                "Change would leave {} day(s) available",
                next.available()
            )));
        }
        *self = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance(initial: f64) -> LeaveBalance {
        LeaveBalance {
            id: 1,
            employee_id: 10,
            leave_type_id: 2,
            year: 2026,
            initial_balance: initial,
            carry_over: 0.0,
            adjustment: 0.0,
            used: 0.0,
            pending: 0.0,
        }
    }

    #[test]
    fn available_accounts_for_every_counter() {
        let mut b = balance(12.0);
        b.carry_over = 3.0;
        b.adjustment = -1.0;
        b.used = 4.0;
        b.pending = 2.5;
        assert_eq!(b.available(), 7.5);
    }

    #[test]
    fn reservation_is_refused_when_balance_is_short() {
        let mut b = balance(2.0);
        let err = b.add_pending(3.0, true).unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientBalance { available, requested }
                if available == 2.0 && requested == 3.0
        ));
        assert_eq!(b.pending, 0.0);
    }

    #[test]
    fn unenforced_types_may_go_negative() {
        let mut b = balance(0.0);
        b.add_pending(5.0, false).unwrap();
        assert_eq!(b.available(), -5.0);
    }

    #[test]
    fn exact_fit_is_accepted() {
        let mut b = balance(1.5);
        b.add_pending(1.0, true).unwrap();
        b.add_pending(0.5, true).unwrap();
        assert_eq!(b.available(), 0.0);
    }

    #[test]
    fn second_reservation_cannot_overdraw() {
        let mut b = balance(5.0);
        b.add_pending(3.0, true).unwrap();
        assert!(b.add_pending(3.0, true).is_err());
        assert_eq!(b.pending, 3.0);
    }

    #[test]
    fn approval_moves_pending_into_used_without_double_counting() {
        let mut b = balance(10.0);
        let before = b.available();
        b.apply(LedgerEffect::Reserve, 3.0, true).unwrap();
        b.apply(LedgerEffect::Consume, 3.0, true).unwrap();
        assert_eq!(b.pending, 0.0);
        assert_eq!(b.used, 3.0);
        assert_eq!(b.available(), before - 3.0);
    }

    #[test]
    fn release_restores_availability_and_never_goes_below_zero() {
        let mut b = balance(10.0);
        b.apply(LedgerEffect::Reserve, 2.0, true).unwrap();
        b.apply(LedgerEffect::Release, 2.0, true).unwrap();
        assert_eq!(b.available(), 10.0);
        b.remove_pending(1.0);
        assert_eq!(b.pending, 0.0);
    }

    #[test]
    fn replacing_a_reservation_rolls_back_when_it_does_not_fit() {
        let mut b = balance(4.0);
        b.add_pending(2.0, true).unwrap();
        b.replace_pending(2.0, 3.0, true).unwrap();
        assert_eq!(b.pending, 3.0);

        let err = b.replace_pending(3.0, 6.0, true).unwrap_err();
        assert!(matches!(err, AppError::InsufficientBalance { .. }));
        assert_eq!(b.pending, 3.0);
    }

    #[test]
    fn allowance_change_cannot_make_available_negative() {
        let mut b = balance(5.0);
        b.used = 4.0;
        assert!(b.set_allowances(None, Some(-2.0)).is_err());
        assert_eq!(b.adjustment, 0.0);

        b.set_allowances(Some(2.0), Some(-1.0)).unwrap();
        assert_eq!(b.available(), 2.0);
        assert!(b.set_allowances(Some(-1.0), None).is_err());
    }
}
