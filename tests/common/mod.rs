// tests/common/mod.rs
#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use serde_json::Value;
use testflow::{
    config::Config,
    models::{
        question::{AnswerType, Question, TestDefinition},
        user::{CurrentUser, Role},
    },
    repository::{InMemoryRepository, Repositories},
    routes,
    services::AppServices,
    state::AppState,
    utils::{
        clock::{Clock, fixed_clock},
        jwt::sign_jwt,
    },
};
use tower::ServiceExt;

pub const SECRET: &str = "test_secret_for_integration_tests";
pub const COURSE_ID: i64 = 1;
pub const TEST_ID: i64 = 10;
pub const LECTURES: [i64; 2] = [11, 12];

pub struct TestApp {
    pub router: Router,
    pub repo: InMemoryRepository,
    pub services: AppServices,
    pub clock: Clock,
}

pub fn student() -> CurrentUser {
    CurrentUser {
        id: 7,
        email: "student@example.com".to_string(),
        role: Role::Student,
    }
}

pub fn other_student() -> CurrentUser {
    CurrentUser {
        id: 8,
        email: "other@example.com".to_string(),
        role: Role::Student,
    }
}

/// Owns course 1.
pub fn instructor() -> CurrentUser {
    CurrentUser {
        id: 50,
        email: "teacher@example.com".to_string(),
        role: Role::Instructor,
    }
}

pub fn other_instructor() -> CurrentUser {
    CurrentUser {
        id: 51,
        email: "someone@example.com".to_string(),
        role: Role::Instructor,
    }
}

/// Two single-choice questions (keys "4" and "Paris") and one text question.
pub fn quiz() -> TestDefinition {
    TestDefinition {
        id: TEST_ID,
        course_id: COURSE_ID,
        title: "Week 1 quiz".to_string(),
        duration_minutes: 1,
        instructions: Some("No notes.".to_string()),
        questions: vec![
            Question {
                id: 100,
                text: "2 + 2 = ?".to_string(),
                answer_type: AnswerType::SingleChoice,
                options: vec!["3".to_string(), "4".to_string()],
                correct_answer: Some("4".to_string()),
            },
            Question {
                id: 101,
                text: "Capital of France?".to_string(),
                answer_type: AnswerType::SingleChoice,
                options: vec!["Paris".to_string(), "Rome".to_string()],
                correct_answer: Some("Paris".to_string()),
            },
            Question {
                id: 102,
                text: "Explain ownership.".to_string(),
                answer_type: AnswerType::Text,
                options: Vec::new(),
                correct_answer: None,
            },
        ],
    }
}

/// Course 1 with two lectures and the quiz, backed by memory and a fixed clock.
pub fn spawn_app() -> TestApp {
    let repo = InMemoryRepository::new();
    repo.add_course(COURSE_ID, instructor().id, &LECTURES);
    repo.add_test(quiz());

    let clock = fixed_clock();
    let services = AppServices::new(Repositories::in_memory(repo.clone()), clock.clone());
    let state = AppState {
        services: services.clone(),
        config: Config::for_tests(SECRET),
    };

    TestApp {
        router: routes::create_router(state),
        repo,
        services,
        clock,
    }
}

pub fn token_for(user: &CurrentUser) -> String {
    sign_jwt(user, SECRET, 600).expect("Failed to sign token")
}

impl TestApp {
    /// Sends one request through the router and returns status plus JSON body.
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        user: Option<&CurrentUser>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token_for(user)));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}
