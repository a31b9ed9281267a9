//! Outbound notification queue.
//!
//! Workflows enqueue events after their transaction commits and move on; a
//! background dispatcher persists them as in-app notifications. A full or
//! closed queue drops the event with a warning, so delivery never blocks or
//! undoes the transition that produced it.

use sqlx::MySqlPool;
use strum_macros::{AsRefStr, Display};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::store;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Audience {
    Employee,
    Hr,
    Director,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEvent {
    /// `None` broadcasts to everyone in `audience`
    pub recipient_employee_id: Option<u64>,
    pub audience: Audience,
    pub kind: &'static str,
    pub title: String,
    pub body: String,
    pub reference_type: &'static str,
    pub reference_id: u64,
}

impl NotificationEvent {
    pub fn to_employee(employee_id: u64, kind: &'static str, title: impl Into<String>) -> Self {
        Self {
            recipient_employee_id: Some(employee_id),
            audience: Audience::Employee,
            kind,
            title: title.into(),
            body: String::new(),
            reference_type: "",
            reference_id: 0,
        }
    }

    pub fn to_director(director_id: u64, kind: &'static str, title: impl Into<String>) -> Self {
        Self {
            audience: Audience::Director,
            ..Self::to_employee(director_id, kind, title)
        }
    }

    pub fn to_hr(kind: &'static str, title: impl Into<String>) -> Self {
        Self {
            recipient_employee_id: None,
            audience: Audience::Hr,
            ..Self::to_employee(0, kind, title)
        }
    }

    pub fn about(mut self, reference_type: &'static str, reference_id: u64) -> Self {
        self.reference_type = reference_type;
        self.reference_id = reference_id;
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<NotificationEvent>,
}

impl Notifier {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<NotificationEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn notify(&self, event: NotificationEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => warn!(
                kind = event.kind,
                reference_id = event.reference_id,
                "Notification queue full, dropping event"
            ),
            Err(TrySendError::Closed(event)) => warn!(
                kind = event.kind,
                reference_id = event.reference_id,
                "Notification dispatcher stopped, dropping event"
            ),
        }
    }
}

/// Drains the queue until every `Notifier` is dropped.
pub async fn run_dispatcher(pool: MySqlPool, mut rx: mpsc::Receiver<NotificationEvent>) {
    info!("Notification dispatcher started");

    while let Some(event) = rx.recv().await {
        match store::notification::insert(&pool, &event).await {
            Ok(id) => debug!(notification_id = id, kind = event.kind, "Notification stored"),
            Err(e) => warn!(
                error = %e,
                kind = event.kind,
                reference_id = event.reference_id,
                "Failed to store notification"
            ),
        }
    }

    info!("Notification dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_fill_audience_and_reference() {
        let ev = NotificationEvent::to_director(9, "early_leave_awaiting_signature", "Sign")
            .about("early_leave_request", 3)
            .body("Please sign");
        assert_eq!(ev.audience, Audience::Director);
        assert_eq!(ev.recipient_employee_id, Some(9));
        assert_eq!((ev.reference_type, ev.reference_id), ("early_leave_request", 3));
        assert_eq!(ev.body, "Please sign");

        let hr = NotificationEvent::to_hr("leave_submitted", "New request");
        assert_eq!(hr.recipient_employee_id, None);
        assert_eq!(hr.audience.as_ref(), "hr");
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let (notifier, mut rx) = Notifier::channel(1);
        notifier.notify(NotificationEvent::to_employee(1, "a", "first"));
        notifier.notify(NotificationEvent::to_employee(1, "b", "second"));

        assert_eq!(rx.try_recv().unwrap().kind, "a");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_queue_is_not_an_error_for_the_caller() {
        let (notifier, rx) = Notifier::channel(4);
        drop(rx);
        notifier.notify(NotificationEvent::to_employee(1, "a", "ignored"));
    }
}
