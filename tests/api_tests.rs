// tests/api_tests.rs

mod common;

use axum::http::{Method, StatusCode};
use chrono::Duration;
use serde_json::{Value, json};

use common::{
    COURSE_ID, LECTURES, TEST_ID, instructor, other_instructor, other_student, spawn_app, student,
};

fn start_body() -> Value {
    json!({ "courseId": COURSE_ID, "testId": TEST_ID })
}

/// Q100 right, Q101 wrong, Q102 free text with markup.
fn submit_body() -> Value {
    json!({
        "testId": TEST_ID,
        "courseId": COURSE_ID,
        "answers": [
            { "questionId": 100, "answer": "4" },
            { "questionId": 101, "answer": "Rome" },
            { "questionId": 102, "answer": "<b>moves</b><script>alert(1)</script>" }
        ]
    })
}

fn answer_id(attempt: &Value, question_id: i64) -> String {
    attempt["answers"]
        .as_array()
        .expect("answers should be an array")
        .iter()
        .find(|a| a["questionId"] == question_id)
        .and_then(|a| a["id"].as_str())
        .expect("answer not found")
        .to_string()
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let app = spawn_app();

    // Act
    let (status, _) = app
        .call(Method::GET, "/random_path_that_does_not_exist", None, None)
        .await;

    // Assert
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_token_is_rejected_with_envelope() {
    let app = spawn_app();

    let (status, body) = app
        .call(Method::POST, "/api/tests/start", None, Some(start_body()))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn students_cannot_reach_instructor_routes() {
    let app = spawn_app();

    let (status, body) = app
        .call(
            Method::GET,
            &format!("/api/tests/{}/submissions", TEST_ID),
            Some(&student()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let (status, _) = app
        .call(Method::GET, "/api/cheating-attempts", Some(&student()), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn start_is_idempotent() {
    // Arrange
    let app = spawn_app();

    // Act
    let (status, first) = app
        .call(Method::POST, "/api/tests/start", Some(&student()), Some(start_body()))
        .await;
    app.clock.advance(Duration::seconds(30));
    let (_, second) = app
        .call(Method::POST, "/api/tests/start", Some(&student()), Some(start_body()))
        .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["success"], true);
    assert_eq!(first["data"]["status"], "started");
    assert_eq!(first["data"]["id"], second["data"]["id"]);
    assert_eq!(first["data"]["startTime"], second["data"]["startTime"]);
}

#[tokio::test]
async fn start_rejects_unknown_test_and_bad_ids() {
    let app = spawn_app();

    let (status, body) = app
        .call(
            Method::POST,
            "/api/tests/start",
            Some(&student()),
            Some(json!({ "courseId": COURSE_ID, "testId": 999 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, _) = app
        .call(
            Method::POST,
            "/api/tests/start",
            Some(&student()),
            Some(json!({ "courseId": 0, "testId": TEST_ID })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/tests/start",
            Some(&student()),
            Some(json!({ "testId": TEST_ID })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn definition_hides_answer_keys() {
    let app = spawn_app();

    let (status, body) = app
        .call(
            Method::GET,
            &format!("/api/tests/{}/definition", TEST_ID),
            Some(&student()),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let questions = body["data"]["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 3);
    assert!(questions.iter().all(|q| q.get("correctAnswer").is_none()));
    assert_eq!(body["data"]["durationMinutes"], 1);
}

#[tokio::test]
async fn submit_scores_single_choice_and_marks_test_viewed() {
    // Arrange
    let app = spawn_app();
    app.call(Method::POST, "/api/tests/start", Some(&student()), Some(start_body()))
        .await;

    // Act
    let (status, body) = app
        .call(Method::POST, "/api/tests/submit", Some(&student()), Some(submit_body()))
        .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    let attempt = &body["data"];
    assert_eq!(attempt["status"], "submitted");
    assert_eq!(attempt["totalScore"], 1.0);
    assert!(attempt["submitTime"].is_string());

    let answers = attempt["answers"].as_array().unwrap();
    let text = answers.iter().find(|a| a["questionId"] == 102).unwrap();
    assert_eq!(text["answer"]["type"], "text");
    assert_eq!(text["answer"]["value"], "<b>moves</b>");
    assert_eq!(text["score"], 0.0);

    let (_, progress) = app
        .call(
            Method::GET,
            &format!("/api/progress/{}", COURSE_ID),
            Some(&student()),
            None,
        )
        .await;
    assert_eq!(progress["data"]["totalUnits"], 3);
    assert_eq!(progress["data"]["completed"], false);
    assert_eq!(
        progress["data"]["progress"],
        json!([{ "lectureId": TEST_ID, "viewed": true }])
    );
}

#[tokio::test]
async fn submit_without_start_creates_attempt() {
    let app = spawn_app();

    let (status, body) = app
        .call(Method::POST, "/api/tests/submit", Some(&student()), Some(submit_body()))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "submitted");
    assert_eq!(body["data"]["startTime"], body["data"]["submitTime"]);
}

#[tokio::test]
async fn resubmission_is_a_conflict_and_keeps_first_score() {
    let app = spawn_app();
    app.call(Method::POST, "/api/tests/submit", Some(&student()), Some(submit_body()))
        .await;

    let all_right = json!({
        "testId": TEST_ID,
        "courseId": COURSE_ID,
        "answers": [
            { "questionId": 100, "answer": "4" },
            { "questionId": 101, "answer": "Paris" }
        ]
    });
    let (status, body) = app
        .call(Method::POST, "/api/tests/submit", Some(&student()), Some(all_right))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (_, mine) = app
        .call(
            Method::GET,
            &format!("/api/tests/{}/student/{}", TEST_ID, student().id),
            Some(&student()),
            None,
        )
        .await;
    assert_eq!(mine["data"]["totalScore"], 1.0);
}

#[tokio::test]
async fn submit_rejects_foreign_or_mismatched_answers() {
    let app = spawn_app();
    app.call(Method::POST, "/api/tests/start", Some(&student()), Some(start_body()))
        .await;

    let unknown_question = json!({
        "testId": TEST_ID,
        "courseId": COURSE_ID,
        "answers": [{ "questionId": 555, "answer": "4" }]
    });
    let (status, _) = app
        .call(Method::POST, "/api/tests/submit", Some(&student()), Some(unknown_question))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let not_an_option = json!({
        "testId": TEST_ID,
        "courseId": COURSE_ID,
        "answers": [{ "questionId": 100, "answer": "5" }]
    });
    let (status, _) = app
        .call(Method::POST, "/api/tests/submit", Some(&student()), Some(not_an_option))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nothing was stored: the attempt is still open.
    let (_, mine) = app
        .call(
            Method::GET,
            &format!("/api/tests/{}/student/{}", TEST_ID, student().id),
            Some(&student()),
            None,
        )
        .await;
    assert_eq!(mine["data"]["status"], "started");
}

#[tokio::test]
async fn course_completes_once_every_unit_is_viewed() {
    let app = spawn_app();
    for lecture in LECTURES {
        let (status, body) = app
            .call(
                Method::POST,
                &format!("/api/progress/{}/lecture/{}/view", COURSE_ID, lecture),
                Some(&student()),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["completed"], false);
    }

    app.call(Method::POST, "/api/tests/submit", Some(&student()), Some(submit_body()))
        .await;

    let (_, progress) = app
        .call(
            Method::GET,
            &format!("/api/progress/{}", COURSE_ID),
            Some(&student()),
            None,
        )
        .await;
    assert_eq!(progress["data"]["completed"], true);

    // A unit disappearing from the course does not break completion.
    app.repo.remove_unit(COURSE_ID, LECTURES[0]);
    let (_, progress) = app
        .call(
            Method::GET,
            &format!("/api/progress/{}", COURSE_ID),
            Some(&student()),
            None,
        )
        .await;
    assert_eq!(progress["data"]["totalUnits"], 2);
    assert_eq!(progress["data"]["completed"], true);
}

#[tokio::test]
async fn manual_progress_overrides() {
    let app = spawn_app();
    let course = format!("/api/progress/{}", COURSE_ID);

    // Inverse operations need an existing record.
    let (status, _) = app
        .call(Method::POST, &format!("{}/incomplete", course), Some(&student()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .call(Method::POST, &format!("{}/complete", course), Some(&student()), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["completed"], true);

    let (_, body) = app
        .call(
            Method::POST,
            &format!("{}/lecture/{}/incomplete", course, LECTURES[1]),
            Some(&student()),
            None,
        )
        .await;
    assert_eq!(body["data"]["completed"], false);

    let (_, body) = app
        .call(
            Method::POST,
            &format!("{}/lecture/{}/complete", course, LECTURES[1]),
            Some(&student()),
            None,
        )
        .await;
    assert_eq!(body["data"]["completed"], true);

    let (_, body) = app
        .call(Method::POST, &format!("{}/incomplete", course), Some(&student()), None)
        .await;
    assert_eq!(body["data"]["completed"], false);
    assert!(
        body["data"]["lectureProgress"]
            .as_array()
            .unwrap()
            .iter()
            .all(|p| p["viewed"] == false)
    );

    let (status, _) = app
        .call(
            Method::POST,
            &format!("{}/lecture/{}/view", course, 999),
            Some(&student()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn progress_for_unknown_course_is_not_found() {
    let app = spawn_app();

    let (status, body) = app
        .call(Method::GET, "/api/progress/42", Some(&student()), None)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn submission_lookup_respects_ownership() {
    let app = spawn_app();
    app.call(Method::POST, "/api/tests/submit", Some(&student()), Some(submit_body()))
        .await;
    let path = format!("/api/tests/{}/student/{}", TEST_ID, student().id);

    let (status, _) = app.call(Method::GET, &path, Some(&other_student()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.call(Method::GET, &path, Some(&instructor()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["studentId"], student().id);

    let (status, _) = app
        .call(
            Method::GET,
            &format!("/api/tests/{}/student/{}", TEST_ID, other_student().id),
            Some(&other_student()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, mine) = app
        .call(Method::GET, "/api/tests/my-submissions", Some(&student()), None)
        .await;
    assert_eq!(mine["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn instructor_grading_flow() {
    // Arrange
    let app = spawn_app();
    let (_, submitted) = app
        .call(Method::POST, "/api/tests/submit", Some(&student()), Some(submit_body()))
        .await;
    let attempt = &submitted["data"];
    let grade_path = format!("/api/tests/submissions/{}/grade", attempt["id"]);
    let text_answer = answer_id(attempt, 102);

    // Only the course owner sees and grades submissions.
    let (status, _) = app
        .call(
            Method::GET,
            &format!("/api/tests/{}/submissions", TEST_ID),
            Some(&other_instructor()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(
            Method::PATCH,
            &grade_path,
            Some(&other_instructor()),
            Some(json!({ "scores": [{ "answerId": text_answer, "score": 2.0 }] })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, list) = app
        .call(
            Method::GET,
            &format!("/api/tests/{}/submissions", TEST_ID),
            Some(&instructor()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["data"].as_array().unwrap().len(), 1);

    // Act
    let (status, graded) = app
        .call(
            Method::PATCH,
            &grade_path,
            Some(&instructor()),
            Some(json!({ "scores": [{ "answerId": text_answer, "score": 2.0 }] })),
        )
        .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(graded["data"]["status"], "graded");
    assert_eq!(graded["data"]["totalScore"], 3.0);

    // Re-grade is allowed; the total follows.
    let (_, regraded) = app
        .call(
            Method::PATCH,
            &grade_path,
            Some(&instructor()),
            Some(json!({ "scores": [{ "answerId": answer_id(attempt, 100), "score": 0.0 }] })),
        )
        .await;
    assert_eq!(regraded["data"]["totalScore"], 2.0);
}

#[tokio::test]
async fn grading_errors() {
    let app = spawn_app();
    let (_, submitted) = app
        .call(Method::POST, "/api/tests/submit", Some(&student()), Some(submit_body()))
        .await;
    let attempt = &submitted["data"];
    let grade_path = format!("/api/tests/submissions/{}/grade", attempt["id"]);

    // One unknown id fails the whole request before anything changes.
    let (status, _) = app
        .call(
            Method::PATCH,
            &grade_path,
            Some(&instructor()),
            Some(json!({ "scores": [
                { "answerId": answer_id(attempt, 102), "score": 5.0 },
                { "answerId": "00000000-0000-0000-0000-000000000000", "score": 1.0 }
            ] })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call(
            Method::PATCH,
            "/api/tests/submissions/999/grade",
            Some(&instructor()),
            Some(json!({ "scores": [{ "answerId": answer_id(attempt, 102), "score": 1.0 }] })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call(
            Method::PATCH,
            &grade_path,
            Some(&instructor()),
            Some(json!({ "scores": [{ "answerId": answer_id(attempt, 102), "score": -1.0 }] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, still) = app
        .call(
            Method::GET,
            &format!("/api/tests/{}/student/{}", TEST_ID, student().id),
            Some(&instructor()),
            None,
        )
        .await;
    assert_eq!(still["data"]["status"], "submitted");
    assert_eq!(still["data"]["totalScore"], 1.0);

    // Grading an attempt still in progress is a conflict.
    let (_, started) = app
        .call(Method::POST, "/api/tests/start", Some(&other_student()), Some(start_body()))
        .await;
    let (status, _) = app
        .call(
            Method::PATCH,
            &format!("/api/tests/submissions/{}/grade", started["data"]["id"]),
            Some(&instructor()),
            Some(json!({ "scores": [{ "answerId": answer_id(attempt, 102), "score": 1.0 }] })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn cheating_reports_are_recorded_and_listed() {
    let app = spawn_app();

    let (status, body) = app
        .call(
            Method::POST,
            "/api/cheating-attempt",
            Some(&student()),
            Some(json!({ "studentEmail": student().email, "testId": TEST_ID })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["warnings"], 3);

    let (status, _) = app
        .call(
            Method::POST,
            "/api/cheating-attempt",
            Some(&student()),
            Some(json!({ "studentEmail": "not-an-email", "testId": TEST_ID })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, list) = app
        .call(Method::GET, "/api/cheating-attempts", Some(&instructor()), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let reports = list["data"].as_array().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["studentEmail"], "student@example.com");
}

#[tokio::test]
async fn cheating_report_for_another_student_is_forbidden() {
    // Arrange
    let app = spawn_app();

    // Act
    let (status, body) = app
        .call(
            Method::POST,
            "/api/cheating-attempt",
            Some(&other_student()),
            Some(json!({ "studentEmail": student().email, "testId": TEST_ID })),
        )
        .await;

    // Assert
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
    assert!(app.services.reports.list().await.unwrap().is_empty());
}
