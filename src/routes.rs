use crate::{
    api::{ai, attendance, message, task, user},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::{json_error_handler, path_error_handler, query_error_handler},
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{HttpResponse, Responder, middleware::from_fn, web};
use serde_json::json;

type LimiterConfig = GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware>;

// Limiters built from the same config share one bucket per peer IP
fn limiter_config(requests_per_min: u32) -> LimiterConfig {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);

    GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default()
}

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "success": true,
        "status": "ok"
    }))
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = limiter_config(config.rate_login_per_min);
    let signup_limiter = limiter_config(config.rate_signup_per_min);
    let refresh_limiter = limiter_config(config.rate_refresh_per_min);
    let protected_limiter = limiter_config(config.rate_protected_per_min);

    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(query_error_handler))
        .app_data(web::PathConfig::default().error_handler(path_error_handler))
        .route("/health", web::get().to(health));

    // Public routes; registered before the protected scope that shares the prefix
    cfg.service(
        web::scope(&format!("{}/auth", config.api_prefix))
            .service(
                web::resource("/login")
                    .wrap(Governor::new(&login_limiter))
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/signup")
                    .wrap(Governor::new(&signup_limiter))
                    .route(web::post().to(handlers::signup)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(Governor::new(&refresh_limiter))
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(Governor::new(&login_limiter))
                    .route(web::post().to(handlers::logout)),
            )
            .service(web::resource("/me").route(web::get().to(handlers::me))),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(Governor::new(&protected_limiter)) // rate limiting
            .service(
                web::scope("/users")
                    // /users
                    .service(web::resource("").route(web::get().to(user::list_users)))
                    // /users/{id}/role
                    .service(
                        web::resource("/{user_id}/role")
                            .route(web::patch().to(user::update_user_role)),
                    )
                    // /users/{id}/tokens
                    .service(
                        web::resource("/{user_id}/tokens")
                            .route(web::patch().to(user::update_user_tokens)),
                    )
                    // /users/{email}
                    .service(
                        web::resource("/{email}").route(web::get().to(user::get_user_by_email)),
                    ),
            )
            .service(
                web::scope("/tasks")
                    // /tasks
                    .service(
                        web::resource("")
                            .route(web::post().to(task::create_task))
                            .route(web::get().to(task::list_tasks)),
                    )
                    // /tasks/user/{user_id}
                    .service(
                        web::resource("/user/{user_id}").route(web::get().to(task::get_user_tasks)),
                    )
                    // /tasks/{id}/status
                    .service(
                        web::resource("/{task_id}/status")
                            .route(web::patch().to(task::update_task_status)),
                    )
                    // /tasks/{id}
                    .service(
                        web::resource("/{task_id}")
                            .route(web::get().to(task::get_task))
                            .route(web::patch().to(task::update_task))
                            .route(web::delete().to(task::delete_task)),
                    ),
            )
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(web::resource("").route(web::get().to(attendance::list_attendance)))
                    .service(
                        web::resource("/clock-in").route(web::post().to(attendance::clock_in)),
                    )
                    .service(
                        web::resource("/clock-out").route(web::post().to(attendance::clock_out)),
                    )
                    .service(
                        web::resource("/status")
                            .route(web::put().to(attendance::update_attendance)),
                    )
                    // /attendance/user/{user_id}
                    .service(
                        web::resource("/user/{user_id}")
                            .route(web::get().to(attendance::get_user_attendance)),
                    ),
            )
            .service(
                web::scope("/messages")
                    // /messages
                    .service(web::resource("").route(web::post().to(message::send_message)))
                    .service(
                        web::resource("/conversation")
                            .route(web::get().to(message::get_conversation)),
                    )
                    .service(web::resource("/inbox").route(web::get().to(message::inbox)))
                    .service(
                        web::resource("/user/{user_id}")
                            .route(web::get().to(message::get_all_conversations)),
                    )
                    // /messages/{id}/read
                    .service(
                        web::resource("/{message_id}/read")
                            .route(web::patch().to(message::mark_read)),
                    ),
            )
            .service(
                web::scope("/ai")
                    .service(web::resource("/request").route(web::post().to(ai::send_ai_request)))
                    .service(web::resource("/balance").route(web::get().to(ai::get_balance))),
            ),
    );
}

// LOGIN / SIGNUP
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days, stored, single use)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /api/auth/refresh with Bearer refresh_token
//       └─ returns a new session, old refresh token revoked
