use axum::http::{Method, StatusCode};

use crate::db::models::NewAttempt;
use crate::repositories::store::AttemptRecorder;
use crate::schemas::quiz::{Choice, OptionLabel};
use crate::test_support::{
    self, admin_token, sample_question_set, send, student_token, TestContext,
};

async fn record(
    ctx: &TestContext,
    student: &str,
    unit: &str,
    show_feedback: bool,
    answers: Vec<Choice>,
) -> String {
    record_as(ctx, &format!("id-{student}"), student, unit, show_feedback, answers).await
}

async fn record_as(
    ctx: &TestContext,
    student_id: &str,
    student: &str,
    unit: &str,
    show_feedback: bool,
    answers: Vec<Choice>,
) -> String {
    let questions = sample_question_set(answers.len()).questions().to_vec();
    let score = answers
        .iter()
        .zip(&questions)
        .filter(|(choice, question)| choice.is_correct_for(question))
        .count() as i32;
    let total = answers.len() as i32;
    let attempt = NewAttempt {
        student_id: student_id.to_string(),
        student_name: student.to_string(),
        config_id: format!("cfg-{unit}"),
        subject: "Química".to_string(),
        unit: unit.to_string(),
        show_feedback,
        score,
        total_questions: total,
        grade: f64::from(score) / f64::from(total) * 19.0,
        questions,
        answers,
    };
    ctx.store.record_attempt(&attempt).await.expect("attempt").id
}

const RIGHT: Choice = Choice::Selected(OptionLabel::C);
const WRONG: Choice = Choice::Selected(OptionLabel::A);

#[tokio::test]
async fn ranking_is_paginated_newest_first() {
    let ctx = test_support::setup_test_context().await;
    record(&ctx, "Ana", "U1", false, vec![RIGHT, WRONG]).await;
    record(&ctx, "Luis", "U1", true, vec![RIGHT, RIGHT]).await;
    record(&ctx, "Eva", "U2", false, vec![WRONG, Choice::NoAnswer]).await;
    let token = student_token("s-1", "Ana", ctx.state.settings());

    let (status, page) = send(
        &ctx.app,
        Method::GET,
        "/api/v1/results/subjects/Qu%C3%ADmica?skip=1&limit=1",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {page}");
    assert_eq!(page["total_count"], 3);
    assert_eq!(page["skip"], 1);
    assert_eq!(page["limit"], 1);
    let items = page["items"].as_array().expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["student_name"], "Luis");
    assert_eq!(items[0]["score"], 2);

    let uri = "/api/v1/results/subjects/F%C3%ADsica";
    let (status, empty) = send(&ctx.app, Method::GET, uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(empty["total_count"], 0);
    assert_eq!(empty["limit"], 100);
}

#[tokio::test]
async fn admin_reviews_one_attempt() {
    let ctx = test_support::setup_test_context().await;
    let attempt_id = record(&ctx, "Ana", "U1", false, vec![RIGHT, Choice::NoAnswer]).await;
    let token = admin_token(ctx.state.settings());

    let (status, review) = send(
        &ctx.app,
        Method::GET,
        &format!("/api/v1/results/{attempt_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {review}");
    assert_eq!(review["student_name"], "Ana");
    assert_eq!(review["score"], 1);
    assert_eq!(review["items"][0]["correct"], true);
    assert_eq!(review["items"][0]["selected"], "C");
    assert_eq!(review["items"][1]["correct"], false);
    assert!(review["items"][1]["selected"].is_null());
    assert_eq!(review["items"][1]["correct_label"], "C");

    let (status, _) =
        send(&ctx.app, Method::GET, "/api/v1/results/missing", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let student = student_token("s-1", "Ana", ctx.state.settings());
    let (status, _) = send(
        &ctx.app,
        Method::GET,
        &format!("/api/v1/results/{attempt_id}"),
        Some(&student),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn gradebook_counts_only_evaluative_units() {
    let ctx = test_support::setup_test_context().await;
    record(&ctx, "Ana", "U1", false, vec![RIGHT, WRONG]).await;
    record(&ctx, "Ana", "U1", false, vec![RIGHT, RIGHT]).await;
    record(&ctx, "Ana", "U1", false, vec![WRONG, WRONG]).await;
    record(&ctx, "Ana", "Práctica", true, vec![RIGHT, RIGHT]).await;
    record(&ctx, "Luis", "U2", false, vec![RIGHT, WRONG]).await;
    let token = admin_token(ctx.state.settings());

    let (status, book) = send(
        &ctx.app,
        Method::GET,
        "/api/v1/results/subjects/Qu%C3%ADmica/gradebook",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {book}");
    assert_eq!(book["policy"], "highest");
    assert_eq!(book["units"], serde_json::json!(["U1", "U2"]));
    assert_eq!(book["students"][0]["student_id"], "id-Ana");
    assert_eq!(book["students"][0]["student_name"], "Ana");
    assert_eq!(book["students"][0]["grades"]["U1"], 19.0);
    assert!(book["students"][0]["grades"]["Práctica"].is_null());
    assert_eq!(book["students"][1]["student_name"], "Luis");
    assert_eq!(book["students"][1]["grades"]["U2"], 9.5);

    let (status, average) = send(
        &ctx.app,
        Method::GET,
        "/api/v1/results/subjects/Qu%C3%ADmica/gradebook?policy=average",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(average["students"][0]["grades"]["U1"], 9.5);

    let (status, _) = send(
        &ctx.app,
        Method::GET,
        "/api/v1/results/subjects/Qu%C3%ADmica/gradebook?policy=best",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn gradebook_separates_students_with_the_same_name() {
    let ctx = test_support::setup_test_context().await;
    record_as(&ctx, "s-1", "Ana", "U1", false, vec![WRONG, WRONG]).await;
    record_as(&ctx, "s-2", "Ana", "U1", false, vec![RIGHT, RIGHT]).await;
    let token = admin_token(ctx.state.settings());

    let (status, book) = send(
        &ctx.app,
        Method::GET,
        "/api/v1/results/subjects/Qu%C3%ADmica/gradebook?policy=average",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {book}");
    let rows = book["students"].as_array().expect("rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["student_id"], "s-1");
    assert_eq!(rows[0]["grades"]["U1"], 0.0);
    assert_eq!(rows[1]["student_id"], "s-2");
    assert_eq!(rows[1]["grades"]["U1"], 19.0);
}
