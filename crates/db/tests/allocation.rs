//! Integration tests for the task-allocation engine.
//!
//! Exercises claim, submit, return, skip, and expiry against a real
//! database:
//! - Redundancy 1 and redundancy N availability rules
//! - Double-claim prevention for the same worker
//! - Task and batch completion on submit
//! - Skip-aware selection and exhaustion fallback
//! - Abandoned-assignment expiry sweep

use piecework_core::session::SkipState;
use piecework_core::template::{process_template, DEFAULT_TEMPLATE_SIZE_LIMIT};
use piecework_core::worker::Worker;
use piecework_core::error::CoreError;
use piecework_db::allocation;
use piecework_db::error::DbError;
use piecework_db::models::batch::{Batch, CreateBatch};
use piecework_db::models::project::{CreateProject, Project};
use piecework_db::models::user::{CreateUser, User};
use piecework_db::repositories::{BatchRepo, ProjectRepo, TaskRepo, UserRepo};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const TEMPLATE: &str =
    r#"<p>${question}</p><input name="answer"><button type="submit">Go</button>"#;

async fn seed_user(pool: &PgPool, username: &str) -> User {
    UserRepo::create(
        pool,
        &CreateUser {
            username: username.to_string(),
            full_name: String::new(),
            is_admin: false,
        },
    )
    .await
    .unwrap()
}

async fn seed_project(pool: &PgPool, name: &str, login_required: bool) -> Project {
    let info = process_template(TEMPLATE, DEFAULT_TEMPLATE_SIZE_LIMIT).unwrap();
    ProjectRepo::create(
        pool,
        None,
        &CreateProject {
            name: name.to_string(),
            html_template: TEMPLATE.to_string(),
            filename: "quiz.html".to_string(),
            assignments_per_task: None,
            allotted_assignment_time: None,
            login_required: Some(login_required),
            custom_permissions: None,
            active: None,
        },
        &info,
    )
    .await
    .unwrap()
}

async fn seed_batch(
    pool: &PgPool,
    project: &Project,
    questions: &[&str],
    redundancy: i32,
    login_required: bool,
) -> Batch {
    let mut csv = String::from("question\n");
    for q in questions {
        csv.push_str(q);
        csv.push('\n');
    }
    let parsed =
        piecework_core::csv_input::parse_batch_csv(csv.as_bytes(), &project.fieldname_set())
            .unwrap();
    let (batch, created) = BatchRepo::create_with_tasks(
        pool,
        project,
        None,
        &CreateBatch {
            name: "batch".to_string(),
            filename: "batch.csv".to_string(),
            assignments_per_task: Some(redundancy),
            login_required: Some(login_required),
            ..CreateBatch::default()
        },
        &parsed,
    )
    .await
    .unwrap();
    assert_eq!(created, questions.len());
    batch
}

fn answers(text: &str) -> serde_json::Map<String, serde_json::Value> {
    let mut map = serde_json::Map::new();
    map.insert("answer".to_string(), serde_json::json!(text));
    map
}

// ---------------------------------------------------------------------------
// Test: accept_next claims the lowest-id task with an expiry
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_accept_next_claims_first_task(pool: PgPool) {
    let alice = seed_user(&pool, "alice").await;
    let project = seed_project(&pool, "Quiz", true).await;
    let batch = seed_batch(&pool, &project, &["one", "two"], 1, true).await;

    let mut skip = SkipState::default();
    let accepted = allocation::accept_next(&pool, batch.id, Worker::Authenticated(alice.id), &mut skip)
        .await
        .unwrap()
        .expect("a task should be available");

    let tasks = TaskRepo::list_for_batch(&pool, batch.id).await.unwrap();
    assert_eq!(accepted.assignment.task_id, tasks[0].id);
    assert_eq!(accepted.assignment.assigned_to, Some(alice.id));
    assert!(!accepted.assignment.completed);
    assert!(accepted.assignment.expires_at.is_some());
    assert!(!accepted.only_skipped_remain);
}

// ---------------------------------------------------------------------------
// Test: redundancy 1 excludes any assigned task from other workers
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_redundancy_one_single_claimant(pool: PgPool) {
    let alice = seed_user(&pool, "alice").await;
    let bob = seed_user(&pool, "bob").await;
    let project = seed_project(&pool, "Quiz", true).await;
    let batch = seed_batch(&pool, &project, &["only"], 1, true).await;

    let mut skip = SkipState::default();
    allocation::accept_next(&pool, batch.id, Worker::Authenticated(alice.id), &mut skip)
        .await
        .unwrap()
        .expect("alice claims the task");

    // With alice mid-claim, bob must see nothing even though the
    // assignment is not completed.
    let got = allocation::accept_next(&pool, batch.id, Worker::Authenticated(bob.id), &mut skip)
        .await
        .unwrap();
    assert!(got.is_none());
}

// ---------------------------------------------------------------------------
// Test: redundancy N allows distinct workers up to the factor
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_redundancy_two_distinct_workers(pool: PgPool) {
    let alice = seed_user(&pool, "alice").await;
    let bob = seed_user(&pool, "bob").await;
    let carol = seed_user(&pool, "carol").await;
    let project = seed_project(&pool, "Quiz", true).await;
    let batch = seed_batch(&pool, &project, &["only"], 2, true).await;

    let mut skip = SkipState::default();
    let a = allocation::accept_next(&pool, batch.id, Worker::Authenticated(alice.id), &mut skip)
        .await
        .unwrap()
        .expect("first claimant");
    let b = allocation::accept_next(&pool, batch.id, Worker::Authenticated(bob.id), &mut skip)
        .await
        .unwrap()
        .expect("second claimant");
    assert_eq!(a.assignment.task_id, b.assignment.task_id);

    // The redundancy factor is reached; a third worker gets nothing.
    let c = allocation::accept_next(&pool, batch.id, Worker::Authenticated(carol.id), &mut skip)
        .await
        .unwrap();
    assert!(c.is_none());
}

// ---------------------------------------------------------------------------
// Test: a worker never holds two assignments of the same task
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_worker_cannot_claim_same_task_twice(pool: PgPool) {
    let alice = seed_user(&pool, "alice").await;
    let project = seed_project(&pool, "Quiz", true).await;
    let batch = seed_batch(&pool, &project, &["only"], 3, true).await;

    let mut skip = SkipState::default();
    allocation::accept_next(&pool, batch.id, Worker::Authenticated(alice.id), &mut skip)
        .await
        .unwrap()
        .expect("first claim");
    let again = allocation::accept_next(&pool, batch.id, Worker::Authenticated(alice.id), &mut skip)
        .await
        .unwrap();
    assert!(again.is_none(), "second claim on the same task must fail");
}

// ---------------------------------------------------------------------------
// Test: submit completes the assignment, the task, and the batch
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_submit_completes_task_and_batch(pool: PgPool) {
    let alice = seed_user(&pool, "alice").await;
    let project = seed_project(&pool, "Quiz", true).await;
    let batch = seed_batch(&pool, &project, &["only"], 1, true).await;

    let mut skip = SkipState::default();
    let accepted = allocation::accept_next(&pool, batch.id, Worker::Authenticated(alice.id), &mut skip)
        .await
        .unwrap()
        .unwrap();

    let submitted = allocation::submit(
        &pool,
        accepted.assignment.task_id,
        accepted.assignment.id,
        Worker::Authenticated(alice.id),
        answers("42"),
    )
    .await
    .unwrap();
    assert!(submitted.completed);
    assert_eq!(submitted.answer_map().get("answer").map(String::as_str), Some("42"));

    let task = TaskRepo::find_by_id(&pool, accepted.assignment.task_id)
        .await
        .unwrap()
        .unwrap();
    assert!(task.completed);

    let batch = BatchRepo::find_by_id(&pool, batch.id).await.unwrap().unwrap();
    assert!(batch.completed, "last task completion must complete the batch");
}

// ---------------------------------------------------------------------------
// Test: redundancy 2 task completes only at the second submission
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_task_completes_at_redundancy(pool: PgPool) {
    let alice = seed_user(&pool, "alice").await;
    let bob = seed_user(&pool, "bob").await;
    let project = seed_project(&pool, "Quiz", true).await;
    let batch = seed_batch(&pool, &project, &["only"], 2, true).await;

    let mut skip = SkipState::default();
    let a = allocation::accept_next(&pool, batch.id, Worker::Authenticated(alice.id), &mut skip)
        .await
        .unwrap()
        .unwrap();
    let b = allocation::accept_next(&pool, batch.id, Worker::Authenticated(bob.id), &mut skip)
        .await
        .unwrap()
        .unwrap();

    allocation::submit(
        &pool,
        a.assignment.task_id,
        a.assignment.id,
        Worker::Authenticated(alice.id),
        answers("first"),
    )
    .await
    .unwrap();
    let task = TaskRepo::find_by_id(&pool, a.assignment.task_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!task.completed, "one of two submissions must not complete");

    allocation::submit(
        &pool,
        b.assignment.task_id,
        b.assignment.id,
        Worker::Authenticated(bob.id),
        answers("second"),
    )
    .await
    .unwrap();
    let task = TaskRepo::find_by_id(&pool, b.assignment.task_id)
        .await
        .unwrap()
        .unwrap();
    assert!(task.completed);
}

// ---------------------------------------------------------------------------
// Test: submit guards
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_submit_rejects_empty_and_double(pool: PgPool) {
    let alice = seed_user(&pool, "alice").await;
    let project = seed_project(&pool, "Quiz", true).await;
    let batch = seed_batch(&pool, &project, &["only"], 1, true).await;

    let mut skip = SkipState::default();
    let accepted = allocation::accept_next(&pool, batch.id, Worker::Authenticated(alice.id), &mut skip)
        .await
        .unwrap()
        .unwrap();

    // A body holding only the CSRF token counts as empty.
    let mut empty = serde_json::Map::new();
    empty.insert("csrfmiddlewaretoken".to_string(), serde_json::json!("tok"));
    let err = allocation::submit(
        &pool,
        accepted.assignment.task_id,
        accepted.assignment.id,
        Worker::Authenticated(alice.id),
        empty,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DbError::Core(CoreError::Validation(_))));

    allocation::submit(
        &pool,
        accepted.assignment.task_id,
        accepted.assignment.id,
        Worker::Authenticated(alice.id),
        answers("42"),
    )
    .await
    .unwrap();

    // Submitting the same assignment again is a conflict.
    let err = allocation::submit(
        &pool,
        accepted.assignment.task_id,
        accepted.assignment.id,
        Worker::Authenticated(alice.id),
        answers("43"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DbError::Core(CoreError::Conflict(_))));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_submit_by_non_owner_forbidden(pool: PgPool) {
    let alice = seed_user(&pool, "alice").await;
    let bob = seed_user(&pool, "bob").await;
    let project = seed_project(&pool, "Quiz", true).await;
    let batch = seed_batch(&pool, &project, &["only"], 1, true).await;

    let mut skip = SkipState::default();
    let accepted = allocation::accept_next(&pool, batch.id, Worker::Authenticated(alice.id), &mut skip)
        .await
        .unwrap()
        .unwrap();

    let err = allocation::submit(
        &pool,
        accepted.assignment.task_id,
        accepted.assignment.id,
        Worker::Authenticated(bob.id),
        answers("hijack"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DbError::Core(CoreError::Forbidden(_))));
}

// ---------------------------------------------------------------------------
// Test: accept_task races lose cleanly
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_accept_task_conflict_when_taken(pool: PgPool) {
    let alice = seed_user(&pool, "alice").await;
    let bob = seed_user(&pool, "bob").await;
    let project = seed_project(&pool, "Quiz", true).await;
    let batch = seed_batch(&pool, &project, &["only"], 1, true).await;
    let task = &TaskRepo::list_for_batch(&pool, batch.id).await.unwrap()[0];

    allocation::accept_task(&pool, batch.id, task.id, Worker::Authenticated(alice.id))
        .await
        .unwrap();

    let err = allocation::accept_task(&pool, batch.id, task.id, Worker::Authenticated(bob.id))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Core(CoreError::Conflict(_))));
}

// ---------------------------------------------------------------------------
// Test: skip-aware selection and exhaustion fallback
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_skip_selects_next_then_falls_back(pool: PgPool) {
    let alice = seed_user(&pool, "alice").await;
    let project = seed_project(&pool, "Quiz", true).await;
    let batch = seed_batch(&pool, &project, &["one", "two"], 1, true).await;
    let tasks = TaskRepo::list_for_batch(&pool, batch.id).await.unwrap();

    let mut skip = SkipState::default();
    skip.skip(batch.id, tasks[0].id);

    let accepted = allocation::accept_next(&pool, batch.id, Worker::Authenticated(alice.id), &mut skip)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(accepted.assignment.task_id, tasks[1].id);
    assert!(!accepted.only_skipped_remain);

    // Return it and skip it too. Now only skipped tasks remain, so the
    // engine hands back the first skipped task and clears the list.
    allocation::return_assignment(
        &pool,
        accepted.assignment.task_id,
        accepted.assignment.id,
        Worker::Authenticated(alice.id),
    )
    .await
    .unwrap();
    skip.skip(batch.id, tasks[1].id);

    let fallback = allocation::accept_next(&pool, batch.id, Worker::Authenticated(alice.id), &mut skip)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fallback.assignment.task_id, tasks[0].id);
    assert!(fallback.only_skipped_remain);
    assert!(skip.skipped(batch.id).is_empty());
}

// ---------------------------------------------------------------------------
// Test: return deletes unfinished, rejects completed
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_return_assignment(pool: PgPool) {
    let alice = seed_user(&pool, "alice").await;
    let project = seed_project(&pool, "Quiz", true).await;
    let batch = seed_batch(&pool, &project, &["only"], 1, true).await;

    let mut skip = SkipState::default();
    let accepted = allocation::accept_next(&pool, batch.id, Worker::Authenticated(alice.id), &mut skip)
        .await
        .unwrap()
        .unwrap();

    allocation::return_assignment(
        &pool,
        accepted.assignment.task_id,
        accepted.assignment.id,
        Worker::Authenticated(alice.id),
    )
    .await
    .unwrap();

    // The task is claimable again.
    let again = allocation::accept_next(&pool, batch.id, Worker::Authenticated(alice.id), &mut skip)
        .await
        .unwrap()
        .unwrap();
    allocation::submit(
        &pool,
        again.assignment.task_id,
        again.assignment.id,
        Worker::Authenticated(alice.id),
        answers("done"),
    )
    .await
    .unwrap();

    let err = allocation::return_assignment(
        &pool,
        again.assignment.task_id,
        again.assignment.id,
        Worker::Authenticated(alice.id),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DbError::Core(CoreError::Conflict(_))));
}

// ---------------------------------------------------------------------------
// Test: anonymous workers and login_required
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_anonymous_worker_gating(pool: PgPool) {
    let open_project = seed_project(&pool, "Open", false).await;
    let open_batch = seed_batch(&pool, &open_project, &["only"], 1, false).await;

    let closed_project = seed_project(&pool, "Closed", true).await;
    let closed_batch = seed_batch(&pool, &closed_project, &["only"], 1, true).await;

    let mut skip = SkipState::default();
    let got = allocation::accept_next(&pool, closed_batch.id, Worker::Anonymous, &mut skip)
        .await
        .unwrap();
    assert!(got.is_none(), "login-required batch must refuse anonymous");

    let accepted = allocation::accept_next(&pool, open_batch.id, Worker::Anonymous, &mut skip)
        .await
        .unwrap()
        .expect("open batch serves anonymous workers");
    assert_eq!(accepted.assignment.assigned_to, None);

    allocation::submit(
        &pool,
        accepted.assignment.task_id,
        accepted.assignment.id,
        Worker::Anonymous,
        answers("anon"),
    )
    .await
    .unwrap();
}

// ---------------------------------------------------------------------------
// Test: expiry sweep removes only abandoned assignments
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_expire_abandoned(pool: PgPool) {
    let alice = seed_user(&pool, "alice").await;
    let bob = seed_user(&pool, "bob").await;
    let project = seed_project(&pool, "Quiz", true).await;
    let batch = seed_batch(&pool, &project, &["one", "two"], 1, true).await;

    let mut skip = SkipState::default();
    let abandoned = allocation::accept_next(&pool, batch.id, Worker::Authenticated(alice.id), &mut skip)
        .await
        .unwrap()
        .unwrap();
    let finished = allocation::accept_next(&pool, batch.id, Worker::Authenticated(bob.id), &mut skip)
        .await
        .unwrap()
        .unwrap();
    allocation::submit(
        &pool,
        finished.assignment.task_id,
        finished.assignment.id,
        Worker::Authenticated(bob.id),
        answers("kept"),
    )
    .await
    .unwrap();

    // Nothing is overdue yet.
    assert_eq!(allocation::expire_abandoned(&pool).await.unwrap(), 0);

    sqlx::query("UPDATE assignments SET expires_at = NOW() - INTERVAL '1 hour' WHERE id = $1")
        .bind(abandoned.assignment.id)
        .execute(&pool)
        .await
        .unwrap();

    assert_eq!(allocation::expire_abandoned(&pool).await.unwrap(), 1);

    // The abandoned task is claimable again; the completed one is not.
    let reclaimed = allocation::accept_next(&pool, batch.id, Worker::Authenticated(bob.id), &mut skip)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reclaimed.assignment.task_id, abandoned.assignment.task_id);
}
