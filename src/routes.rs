// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, patch, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{attempts, cheating, progress},
    state::AppState,
    utils::jwt::{auth_middleware, instructor_middleware},
};

/// Builds the CORS layer from the configured origins. Unparseable entries are skipped.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Assembles the main application router.
///
/// * Every route requires a bearer token.
/// * Grading and report listing additionally require the instructor role.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    let test_routes = Router::new()
        .route("/start", post(attempts::start_test))
        .route("/submit", post(attempts::submit_test))
        .route("/my-submissions", get(attempts::my_submissions))
        .route("/{test_id}/definition", get(attempts::test_definition))
        .route(
            "/{test_id}/student/{student_id}",
            get(attempts::student_submission),
        );

    let progress_routes = Router::new()
        .route("/{course_id}", get(progress::get_progress))
        .route("/{course_id}/complete", post(progress::mark_course_completed))
        .route(
            "/{course_id}/incomplete",
            post(progress::mark_course_incomplete),
        )
        .route(
            "/{course_id}/lecture/{lecture_id}/view",
            post(progress::mark_lecture_viewed),
        )
        .route(
            "/{course_id}/lecture/{lecture_id}/complete",
            post(progress::mark_lecture_completed),
        )
        .route(
            "/{course_id}/lecture/{lecture_id}/incomplete",
            post(progress::mark_lecture_incomplete),
        );

    let instructor_routes = Router::new()
        .route("/tests/{test_id}/submissions", get(attempts::test_submissions))
        .route(
            "/tests/submissions/{submission_id}/grade",
            patch(attempts::grade_submission),
        )
        .route("/cheating-attempts", get(cheating::list_reports))
        .layer(middleware::from_fn(instructor_middleware));

    let api_routes = Router::new()
        .nest("/tests", test_routes)
        .nest("/progress", progress_routes)
        .route("/cheating-attempt", post(cheating::report_cheating))
        .merge(instructor_routes)
        // Auth runs first for every route, instructor routes included
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api", api_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
