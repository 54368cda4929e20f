use anyhow::Result;
use grocery_api::{CategoryResponse, ClientError, ItemResponse, Session, StoreEvent};
use grocery_client::fake::{FakeGroceryServer, InjectedFailure};
use grocery_client::{
    CredentialStore, Endpoints, GroceryStore, HttpClient, InMemoryCredentialStore,
    ReconcilePolicy,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn store_for(server: &Arc<FakeGroceryServer>, session: Option<Session>) -> GroceryStore {
    init_tracing();
    let credentials: Arc<dyn CredentialStore> = Arc::new(match session {
        Some(session) => InMemoryCredentialStore::with_session(session),
        None => InMemoryCredentialStore::new(),
    });
    let client = HttpClient::with_transport(server.clone(), credentials, true);
    GroceryStore::with_client(Arc::new(client), Endpoints::new(server.base_url().clone()))
}

/// Signed-in store whose local list holds categories with the given titles.
async fn store_with_categories(
    titles: &[&str],
) -> Result<(Arc<FakeGroceryServer>, GroceryStore, Vec<CategoryResponse>)> {
    let server = Arc::new(FakeGroceryServer::new());
    let session = server.seed_user("sam", "secret");
    let categories: Vec<CategoryResponse> = titles
        .iter()
        .map(|title| server.seed_category(session.user_id, title, "#FF000000"))
        .collect();
    let store = store_for(&server, Some(session));
    store.get_categories().await?;
    Ok((server, store, categories))
}

#[tokio::test]
async fn test_delete_at_indices_keeps_the_rest_in_order() -> Result<()> {
    let (server, store, categories) = store_with_categories(&["A", "B", "C", "D"]).await?;
    let mut events = store.subscribe();

    let report = store.delete_categories_at([3, 1]).await?;

    assert_eq!(
        store.categories().await,
        vec![categories[0].clone(), categories[2].clone()]
    );
    assert_eq!(report.removed, vec![categories[1].id, categories[3].id]);
    assert!(report.failed.is_empty());
    assert_eq!(server.category_count(), 2);
    assert_eq!(
        events.recv().await?,
        StoreEvent::CategoriesRemoved {
            ids: vec![categories[1].id, categories[3].id]
        }
    );
    Ok(())
}

#[tokio::test]
async fn test_one_failure_leaves_local_list_untouched() -> Result<()> {
    let (server, store, categories) = store_with_categories(&["A", "B", "C"]).await?;
    server.fail_delete_of(categories[2].id, InjectedFailure::Transport);

    let err = store.delete_categories_at([0, 1, 2]).await.unwrap_err();

    match err {
        ClientError::Batch(failure) => {
            assert_eq!(
                failure.succeeded,
                vec![(0, categories[0].id), (1, categories[1].id)]
            );
            assert_eq!(failure.failed.len(), 1);
            assert_eq!(failure.failed[0].0, 2);
            assert!(matches!(failure.failed[0].1, ClientError::Transport { .. }));
        }
        other => panic!("expected batch failure, got {:?}", other),
    }
    assert_eq!(store.categories().await, categories);
    // The server already dropped the two that succeeded
    assert_eq!(server.category_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_apply_succeeded_removes_only_confirmed_deletes() -> Result<()> {
    let (server, store, categories) = store_with_categories(&["A", "B", "C"]).await?;
    server.fail_delete_of(categories[1].id, InjectedFailure::Status(500));

    let report = store
        .delete_categories_at_with_policy([0, 1, 2], ReconcilePolicy::ApplySucceeded)
        .await?;

    assert_eq!(report.removed, vec![categories[0].id, categories[2].id]);
    assert_eq!(report.failed.len(), 1);
    assert!(matches!(
        report.failed[0],
        (1, ClientError::Server { status: 500, .. })
    ));
    assert_eq!(store.categories().await, vec![categories[1].clone()]);
    Ok(())
}

#[tokio::test]
async fn test_stale_index_sends_nothing() -> Result<()> {
    let (server, store, categories) = store_with_categories(&["A", "B"]).await?;
    let before = server.request_count();

    let err = store.delete_categories_at([0, 5]).await.unwrap_err();

    assert_eq!(err, ClientError::IndexOutOfRange { index: 5, len: 2 });
    assert_eq!(server.request_count(), before);
    assert_eq!(store.categories().await, categories);
    Ok(())
}

#[tokio::test]
async fn test_empty_selection_is_a_no_op() -> Result<()> {
    let (server, store, categories) = store_with_categories(&["A"]).await?;
    let before = server.request_count();

    let report = store.delete_categories_at(std::iter::empty::<usize>()).await?;

    assert!(report.removed.is_empty());
    assert_eq!(server.request_count(), before);
    assert_eq!(store.categories().await, categories);
    Ok(())
}

#[tokio::test]
async fn test_signed_out_batch_makes_no_requests() -> Result<()> {
    let server = Arc::new(FakeGroceryServer::new());
    let store = store_for(&server, None);

    let report = store.delete_categories_at([0, 1]).await?;

    assert!(report.removed.is_empty());
    assert_eq!(server.request_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_cancelled_batch_changes_nothing_locally() -> Result<()> {
    let (server, store, categories) = store_with_categories(&["A", "B", "C"]).await?;
    server.set_delay(Some(Duration::from_millis(500)));

    let result = tokio::time::timeout(
        Duration::from_millis(20),
        store.delete_categories_at([0, 1, 2]),
    )
    .await;

    assert!(result.is_err(), "batch should still be awaiting the server");
    assert_eq!(store.categories().await, categories);
    assert_eq!(server.category_count(), 3);
    Ok(())
}

#[tokio::test]
async fn test_delete_items_at_indices() -> Result<()> {
    let server = Arc::new(FakeGroceryServer::new());
    let session = server.seed_user("sam", "secret");
    let dairy = server.seed_category(session.user_id, "Dairy", "#FFFFFFFF");
    let items: Vec<ItemResponse> = ["Milk", "Butter", "Cheese"]
        .iter()
        .map(|title| server.seed_item(dairy.id, title, 2.0, 1))
        .collect();
    let store = store_for(&server, Some(session));
    store.select_category(Some(dairy.clone())).await;
    store.get_items(dairy.id).await?;

    let report = store.delete_items_at(dairy.id, [0, 2]).await?;

    assert_eq!(report.removed, vec![items[0].id, items[2].id]);
    assert_eq!(report.deleted, report.removed);
    assert_eq!(store.items().await, vec![items[1].clone()]);
    assert_eq!(server.item_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_delete_items_of_unloaded_category_is_rejected() -> Result<()> {
    let server = Arc::new(FakeGroceryServer::new());
    let session = server.seed_user("sam", "secret");
    let dairy = server.seed_category(session.user_id, "Dairy", "#FFFFFFFF");
    server.seed_item(dairy.id, "Milk", 2.0, 1);
    let store = store_for(&server, Some(session));

    let err = store.delete_items_at(dairy.id, [0]).await.unwrap_err();

    assert!(matches!(err, ClientError::InvalidRequest { .. }));
    assert_eq!(server.request_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_items_moved_away_mid_batch_are_not_reported_removed() -> Result<()> {
    let server = Arc::new(FakeGroceryServer::new());
    let session = server.seed_user("sam", "secret");
    let dairy = server.seed_category(session.user_id, "Dairy", "#FFFFFFFF");
    let bakery = server.seed_category(session.user_id, "Bakery", "#FFAA8800");
    let milk = server.seed_item(dairy.id, "Milk", 2.0, 1);
    let bread = server.seed_item(bakery.id, "Bread", 3.0, 1);
    let store = store_for(&server, Some(session));
    store.select_category(Some(dairy.clone())).await;
    store.get_items(dairy.id).await?;
    server.set_delay(Some(Duration::from_millis(50)));

    let (report, ()) = tokio::join!(store.delete_items_at(dairy.id, [0]), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        store.select_category(Some(bakery.clone())).await;
    });
    let report = report?;

    assert_eq!(report.deleted, vec![milk.id]);
    assert!(report.removed.is_empty());

    server.set_delay(None);
    store.get_items(bakery.id).await?;
    assert_eq!(store.items().await, vec![bread]);
    assert_eq!(server.item_count(), 1);
    Ok(())
}
