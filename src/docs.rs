use crate::api::attendance::{AttendanceFilter, ManualAttendance, SummaryQuery};
use crate::api::calibration::{CalibrateEntry, CreateSession, SessionDetail};
use crate::api::early_leave::{CreateEarlyLeave, EarlyLeaveFilter, HrApproval, Rejection};
use crate::api::employee::{
    CreateDepartment, CreateEmployee, EmployeeListResponse, EmployeeQuery, UpdateEmployee,
};
use crate::api::feedback::{
    AnswerInput, CreateFeedback, FeedbackDetail, ReviewerInput, SubmitFeedback,
};
use crate::api::leave_balance::{AdjustBalance, BalanceQuery, BalanceView, CreateLeaveType};
use crate::api::leave_request::{CreateLeave, EditLeave, LeaveFilter, LeaveListResponse, RejectLeave};
use crate::api::notification::NotificationFilter;
use crate::api::performance::{
    CreateReview, ItemScore, ReviewDetail, ReviewFilter, ReviewItemInput, ScoreSubmission,
};
use crate::api::schedule::{AssignShift, ShiftPayload};
use crate::model::attendance::{Attendance, AttendanceStatus, ScheduleDay, Shift};
use crate::model::department::Department;
use crate::model::early_leave::{EarlyLeaveRequest, EarlyLeaveStatus};
use crate::model::employee::Employee;
use crate::model::feedback::{FeedbackRequest, FeedbackReviewer, FeedbackStatus, Relationship};
use crate::model::leave_balance::LeaveBalance;
use crate::model::leave_request::{LeaveRequest, LeaveStatus};
use crate::model::leave_type::LeaveType;
use crate::model::notification::Notification;
use crate::model::performance::{
    CalibrationReview, CalibrationSession, CalibrationStatus, PerformanceReview,
    PerformanceReviewItem, ReviewStatus,
};
use crate::workflow::feedback::{CompetencySummary, FeedbackSummary};
use crate::workflow::summary::MonthlySummary;
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM Workflow API",
        version = "1.0.0",
        description = r#"
## HR workflow service

Leave, attendance and performance workflows for an HR back office.

### Features
- **Leave**: per-year balance ledger, request lifecycle with balance
  reservation, leave types
- **Early leave**: two-stage HR and director approval with numbered
  response letters
- **Attendance**: check-in/out against weekly shift schedules, manual
  entries, monthly summaries
- **Performance**: weighted review scores, grade table, calibration
  sessions, 360 feedback
- **Notifications**: in-app notices for every workflow transition

### Security
All endpoints require a **JWT Bearer** token issued by the identity
provider. HR and Admin run the approval desks; directors sign early-leave
letters.

### Errors
Failures return `{"message": "..."}` with 400, 403, 404, 409, 422 or 500.
"#,
    ),
    paths(
        crate::api::employee::create_employee,
        crate::api::employee::list_employees,
        crate::api::employee::get_employee,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,
        crate::api::employee::list_departments,
        crate::api::employee::create_department,

        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::edit_leave,
        crate::api::leave_request::submit_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::cancel_leave,

        crate::api::leave_balance::list_balances,
        crate::api::leave_balance::adjust_balance,
        crate::api::leave_balance::list_leave_types,
        crate::api::leave_balance::create_leave_type,

        crate::api::early_leave::create_early_leave,
        crate::api::early_leave::list_early_leave,
        crate::api::early_leave::get_early_leave,
        crate::api::early_leave::hr_approve,
        crate::api::early_leave::hr_reject,
        crate::api::early_leave::reassign_director,
        crate::api::early_leave::sign,
        crate::api::early_leave::director_reject,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::manual_entry,
        crate::api::attendance::approve_entry,
        crate::api::attendance::list_attendance,
        crate::api::attendance::monthly_summary,

        crate::api::schedule::list_shifts,
        crate::api::schedule::create_shift,
        crate::api::schedule::update_shift,
        crate::api::schedule::get_schedule,
        crate::api::schedule::assign_day,
        crate::api::schedule::clear_day,

        crate::api::performance::create_review,
        crate::api::performance::list_reviews,
        crate::api::performance::get_review,
        crate::api::performance::open_review,
        crate::api::performance::self_assessment,
        crate::api::performance::manager_review,
        crate::api::performance::finalize_review,

        crate::api::calibration::create_session,
        crate::api::calibration::get_session,
        crate::api::calibration::calibrate_entry,
        crate::api::calibration::complete_session,
        crate::api::calibration::cancel_session,

        crate::api::feedback::create_feedback,
        crate::api::feedback::get_feedback,
        crate::api::feedback::submit_feedback,
        crate::api::feedback::close_feedback,
        crate::api::feedback::feedback_summary,

        crate::api::notification::list_notifications,
        crate::api::notification::mark_read
    ),
    components(
        schemas(
            Employee,
            Department,
            CreateEmployee,
            UpdateEmployee,
            EmployeeQuery,
            EmployeeListResponse,
            CreateDepartment,
            LeaveRequest,
            LeaveStatus,
            LeaveFilter,
            LeaveListResponse,
            CreateLeave,
            EditLeave,
            RejectLeave,
            LeaveType,
            LeaveBalance,
            BalanceQuery,
            BalanceView,
            AdjustBalance,
            CreateLeaveType,
            EarlyLeaveRequest,
            EarlyLeaveStatus,
            CreateEarlyLeave,
            HrApproval,
            Rejection,
            EarlyLeaveFilter,
            Attendance,
            AttendanceStatus,
            ManualAttendance,
            AttendanceFilter,
            SummaryQuery,
            MonthlySummary,
            Shift,
            ScheduleDay,
            ShiftPayload,
            AssignShift,
            PerformanceReview,
            PerformanceReviewItem,
            ReviewStatus,
            CreateReview,
            ReviewItemInput,
            ItemScore,
            ScoreSubmission,
            ReviewFilter,
            ReviewDetail,
            CalibrationSession,
            CalibrationReview,
            CalibrationStatus,
            CreateSession,
            CalibrateEntry,
            SessionDetail,
            FeedbackRequest,
            FeedbackReviewer,
            FeedbackStatus,
            Relationship,
            CreateFeedback,
            ReviewerInput,
            AnswerInput,
            SubmitFeedback,
            FeedbackDetail,
            FeedbackSummary,
            CompetencySummary,
            Notification,
            NotificationFilter
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Employee", description = "Employee and department records"),
        (name = "Leave", description = "Leave requests, balances and leave types"),
        (name = "Early Leave", description = "Early-leave approvals and response letters"),
        (name = "Attendance", description = "Check-in/out, manual entries and monthly summaries"),
        (name = "Schedule", description = "Shifts and weekly schedules"),
        (name = "Performance", description = "Performance reviews"),
        (name = "Calibration", description = "Calibration sessions"),
        (name = "Feedback", description = "360-degree feedback"),
        (name = "Notification", description = "In-app notifications"),
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
