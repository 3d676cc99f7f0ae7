#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Unit-of-work behavior of `RepositoryManager`.

mod common;

use std::sync::Arc;

use common::{ctx, document, manager, new_document, new_tag, raw_document_count, schema, setup_db, tag};
use modkit_repo::{RepoError, RepositoryManager, WriteOptions};
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

#[tokio::test]
async fn commit_without_begin_is_rejected() {
    let db = setup_db().await;
    let mgr = manager(&db, ctx("u1", None));

    let err = mgr.commit().await.unwrap_err();
    assert!(matches!(err, RepoError::NoActiveTransaction), "got {err:?}");
    assert!(!mgr.has_transaction().await);
}

#[tokio::test]
async fn rollback_without_begin_is_rejected() {
    let db = setup_db().await;
    let mgr = manager(&db, ctx("u1", None));

    let err = mgr.rollback().await.unwrap_err();
    assert!(matches!(err, RepoError::NoActiveTransaction), "got {err:?}");
    assert!(!mgr.has_transaction().await);
}

#[tokio::test]
async fn second_begin_fails_while_open() {
    let db = setup_db().await;
    let mgr = manager(&db, ctx("u1", None));
    let docs = mgr.repository::<document::Entity>().unwrap();

    mgr.begin_transaction().await.unwrap();
    docs.add_one(new_document("e1", None), WriteOptions::new()).await;

    let err = mgr.begin_transaction().await.unwrap_err();
    assert!(matches!(err, RepoError::TransactionAlreadyOpen), "got {err:?}");
    assert!(mgr.has_transaction().await);

    mgr.rollback().await.unwrap();
    assert!(!mgr.has_transaction().await);
    assert_eq!(raw_document_count(&db).await, 0);
}

#[tokio::test]
async fn commit_spans_repositories() {
    let db = setup_db().await;
    let mgr = manager(&db, ctx("u1", None));
    let docs = mgr.repository::<document::Entity>().unwrap();
    let tags = mgr.repository::<tag::Entity>().unwrap();

    mgr.begin_transaction().await.unwrap();
    docs.add_one(new_document("a", None), WriteOptions::new().deferred())
        .await;
    tags.add_one(new_tag("t"), WriteOptions::new().deferred()).await;
    assert_eq!(mgr.pending_changes().await, 2);

    assert_eq!(mgr.commit().await.unwrap(), 2);
    assert!(!mgr.has_transaction().await);
    assert_eq!(mgr.pending_changes().await, 0);

    assert_eq!(raw_document_count(&db).await, 1);
    assert_eq!(tags.as_queryable().count().await.unwrap(), 1);
}

#[tokio::test]
async fn reads_inside_transaction_see_uncommitted_rows() {
    let db = setup_db().await;
    let mgr = manager(&db, ctx("u1", None));
    let docs = mgr.repository::<document::Entity>().unwrap();

    mgr.begin_transaction().await.unwrap();
    let saved = docs.add_one(new_document("a", None), WriteOptions::new()).await;
    assert!(saved.id > 0);
    assert_eq!(docs.as_queryable().count().await.unwrap(), 1);
    mgr.rollback().await.unwrap();

    assert_eq!(docs.as_queryable().count().await.unwrap(), 0);
}

#[tokio::test]
async fn rollback_discards_staged_changes() {
    let db = setup_db().await;
    let mgr = manager(&db, ctx("u1", None));
    let docs = mgr.repository::<document::Entity>().unwrap();

    mgr.begin_transaction().await.unwrap();
    docs.add_one(new_document("a", None), WriteOptions::new().deferred())
        .await;
    mgr.rollback().await.unwrap();

    assert_eq!(mgr.pending_changes().await, 0);
    assert_eq!(mgr.save_changes().await.unwrap(), 0);
    assert_eq!(raw_document_count(&db).await, 0);
}

#[tokio::test]
#[traced_test]
async fn absorbed_failure_keeps_transaction_usable() {
    let db = setup_db().await;
    let mgr = manager(&db, ctx("u1", None));
    let docs = mgr.repository::<document::Entity>().unwrap();

    mgr.begin_transaction().await.unwrap();
    docs.add_one(new_document("dup", None), WriteOptions::new()).await;
    docs.add_one(new_document("dup", None), WriteOptions::new()).await;
    assert!(logs_contain("failed to persist entities"));

    docs.add_one(new_document("other", None), WriteOptions::new()).await;
    assert_eq!(mgr.commit().await.unwrap(), 0);

    assert_eq!(raw_document_count(&db).await, 2);
}

#[tokio::test]
async fn repository_is_cached_per_scope() {
    let db = setup_db().await;
    let mgr = manager(&db, ctx("u1", None));

    let first = mgr.repository::<document::Entity>().unwrap();
    let second = mgr.repository::<document::Entity>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.table(), "documents");

    let other_scope = manager(&db, ctx("u1", None));
    let third = other_scope.repository::<document::Entity>().unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
}

#[tokio::test]
async fn dropping_manager_rolls_back_open_transaction() {
    let db = setup_db().await;
    {
        let mgr = manager(&db, ctx("u1", None));
        let docs = mgr.repository::<document::Entity>().unwrap();
        mgr.begin_transaction().await.unwrap();
        docs.add_one(new_document("lost", None), WriteOptions::new()).await;
    }
    assert_eq!(raw_document_count(&db).await, 0);
}

#[tokio::test]
async fn cancelled_scope_fails_fast_and_keeps_staged_changes() {
    let db = setup_db().await;
    let token = CancellationToken::new();
    let mgr = RepositoryManager::builder(db.clone(), schema(), ctx("u1", None))
        .cancellation(token.clone())
        .build();
    let docs = mgr.repository::<document::Entity>().unwrap();

    docs.add_one(new_document("a", None), WriteOptions::new().deferred())
        .await;
    token.cancel();

    let err = mgr.save_changes().await.unwrap_err();
    assert!(matches!(err, RepoError::Cancelled), "got {err:?}");
    assert_eq!(mgr.pending_changes().await, 1);

    let err = docs.as_queryable().count().await.unwrap_err();
    assert!(matches!(err, RepoError::Cancelled));
    assert_eq!(raw_document_count(&db).await, 0);
}

#[tokio::test]
async fn failed_commit_releases_handle_and_keeps_staged_changes() {
    let db = setup_db().await;
    let mgr = manager(&db, ctx("u1", None));
    let docs = mgr.repository::<document::Entity>().unwrap();

    docs.add_one(new_document("taken", None), WriteOptions::new()).await;

    mgr.begin_transaction().await.unwrap();
    docs.add_one(new_document("taken", None), WriteOptions::new().deferred())
        .await;

    let err = mgr.commit().await.unwrap_err();
    assert!(matches!(err, RepoError::Db(_)), "got {err:?}");
    assert!(!mgr.has_transaction().await);
    assert_eq!(mgr.pending_changes().await, 1);
    assert_eq!(raw_document_count(&db).await, 1);

    mgr.begin_transaction().await.unwrap();
    assert_eq!(mgr.discard_changes().await, 1);
    assert_eq!(mgr.commit().await.unwrap(), 0);
}

#[tokio::test]
async fn cancelled_commit_writes_nothing_and_releases_handle() {
    let db = setup_db().await;
    let token = CancellationToken::new();
    let mgr = RepositoryManager::builder(db.clone(), schema(), ctx("u1", None))
        .cancellation(token.clone())
        .build();
    let docs = mgr.repository::<document::Entity>().unwrap();

    mgr.begin_transaction().await.unwrap();
    docs.add(
        vec![new_document("a", None), new_document("b", None)],
        WriteOptions::new().deferred(),
    )
    .await;
    token.cancel();

    let err = mgr.commit().await.unwrap_err();
    assert!(matches!(err, RepoError::Cancelled), "got {err:?}");
    assert!(!mgr.has_transaction().await);
    assert_eq!(mgr.pending_changes().await, 2);
    assert_eq!(raw_document_count(&db).await, 0);
}
