use crate::{
    api::{
        attendance, calibration, early_leave, employee, feedback, leave_balance, leave_request,
        notification, performance, schedule,
    },
    auth::middleware::auth_middleware,
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use tracing::warn;

/// Per-peer limiter allowing `requests_per_min` with an equal burst.
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);

    let cfg = GovernorConfigBuilder::default()
        .milliseconds_per_request(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_else(|| {
            warn!(requests_per_min, "Invalid rate limit, using the governor defaults");
            GovernorConfig::default()
        });
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config) {
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(build_limiter(config.rate_protected_per_min))
            .service(
                web::scope("/employees")
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(employee::update_employee))
                            .route(web::get().to(employee::get_employee))
                            .route(web::delete().to(employee::delete_employee)),
                    )
                    .service(
                        web::resource("/{id}/schedule").route(web::get().to(schedule::get_schedule)),
                    )
                    .service(
                        web::resource("/{id}/schedule/{day}")
                            .route(web::put().to(schedule::assign_day))
                            .route(web::delete().to(schedule::clear_day)),
                    ),
            )
            .service(
                web::resource("/departments")
                    .route(web::get().to(employee::list_departments))
                    .route(web::post().to(employee::create_department)),
            )
            .service(
                web::scope("/shifts")
                    .service(
                        web::resource("")
                            .route(web::get().to(schedule::list_shifts))
                            .route(web::post().to(schedule::create_shift)),
                    )
                    .service(web::resource("/{id}").route(web::put().to(schedule::update_shift))),
            )
            .service(
                web::resource("/leave-types")
                    .route(web::get().to(leave_balance::list_leave_types))
                    .route(web::post().to(leave_balance::create_leave_type)),
            )
            .service(
                web::scope("/leave-balances")
                    .service(web::resource("").route(web::get().to(leave_balance::list_balances)))
                    .service(
                        web::resource("/{id}").route(web::put().to(leave_balance::adjust_balance)),
                    ),
            )
            .service(
                web::scope("/leave")
                    // /leave
                    .service(
                        web::resource("")
                            .route(web::get().to(leave_request::leave_list))
                            .route(web::post().to(leave_request::create_leave)),
                    )
                    // /leave/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(leave_request::get_leave))
                            .route(web::put().to(leave_request::edit_leave)),
                    )
                    .service(
                        web::resource("/{id}/submit")
                            .route(web::put().to(leave_request::submit_leave)),
                    )
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(leave_request::approve_leave)),
                    )
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::put().to(leave_request::reject_leave)),
                    )
                    .service(
                        web::resource("/{id}/cancel")
                            .route(web::put().to(leave_request::cancel_leave)),
                    ),
            )
            .service(
                web::scope("/early-leave")
                    .service(
                        web::resource("")
                            .route(web::get().to(early_leave::list_early_leave))
                            .route(web::post().to(early_leave::create_early_leave)),
                    )
                    .service(web::resource("/{id}").route(web::get().to(early_leave::get_early_leave)))
                    .service(
                        web::resource("/{id}/hr-approve").route(web::put().to(early_leave::hr_approve)),
                    )
                    .service(
                        web::resource("/{id}/hr-reject").route(web::put().to(early_leave::hr_reject)),
                    )
                    .service(
                        web::resource("/{id}/director")
                            .route(web::put().to(early_leave::reassign_director)),
                    )
                    .service(web::resource("/{id}/sign").route(web::put().to(early_leave::sign)))
                    .service(
                        web::resource("/{id}/director-reject")
                            .route(web::put().to(early_leave::director_reject)),
                    ),
            )
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(
                        web::resource("")
                            .route(web::put().to(attendance::check_out))
                            .route(web::post().to(attendance::check_in))
                            .route(web::get().to(attendance::list_attendance)),
                    )
                    // literal segments before /{id}
                    .service(
                        web::resource("/summary").route(web::get().to(attendance::monthly_summary)),
                    )
                    .service(web::resource("/manual").route(web::post().to(attendance::manual_entry)))
                    .service(
                        web::resource("/{id}/approve").route(web::put().to(attendance::approve_entry)),
                    ),
            )
            .service(
                web::scope("/performance-reviews")
                    .service(
                        web::resource("")
                            .route(web::get().to(performance::list_reviews))
                            .route(web::post().to(performance::create_review)),
                    )
                    .service(web::resource("/{id}").route(web::get().to(performance::get_review)))
                    .service(web::resource("/{id}/open").route(web::put().to(performance::open_review)))
                    .service(
                        web::resource("/{id}/self-assessment")
                            .route(web::put().to(performance::self_assessment)),
                    )
                    .service(
                        web::resource("/{id}/manager-review")
                            .route(web::put().to(performance::manager_review)),
                    )
                    .service(
                        web::resource("/{id}/finalize").route(web::put().to(performance::finalize_review)),
                    ),
            )
            .service(
                web::scope("/calibration")
                    .service(web::resource("").route(web::post().to(calibration::create_session)))
                    .service(web::resource("/{id}").route(web::get().to(calibration::get_session)))
                    .service(
                        web::resource("/{id}/entries/{entry_id}")
                            .route(web::put().to(calibration::calibrate_entry)),
                    )
                    .service(
                        web::resource("/{id}/complete")
                            .route(web::put().to(calibration::complete_session)),
                    )
                    .service(
                        web::resource("/{id}/cancel").route(web::put().to(calibration::cancel_session)),
                    ),
            )
            .service(
                web::scope("/feedback")
                    .service(web::resource("").route(web::post().to(feedback::create_feedback)))
                    .service(web::resource("/{id}").route(web::get().to(feedback::get_feedback)))
                    .service(
                        web::resource("/{id}/submit").route(web::put().to(feedback::submit_feedback)),
                    )
                    .service(
                        web::resource("/{id}/close").route(web::put().to(feedback::close_feedback)),
                    )
                    .service(
                        web::resource("/{id}/summary").route(web::get().to(feedback::feedback_summary)),
                    ),
            )
            .service(
                web::scope("/notifications")
                    .service(
                        web::resource("").route(web::get().to(notification::list_notifications)),
                    )
                    .service(
                        web::resource("/{id}/read").route(web::put().to(notification::mark_read)),
                    ),
            ),
    );
}
