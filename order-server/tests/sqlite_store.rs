use std::time::Duration;

use order_server::db::{OrderFilter, RepoError, SqliteStore, Store};
use order_server::message::{ChangeFeed, ChangeKind, EventMask, StoreTable};
use rust_decimal::Decimal;
use shared::models::{
    MenuItemCreate, MenuItemUpdate, OrderDraft, OrderItem, OrderStatus, PaymentStatus,
    PaymentType, TableStatus,
};
use tempfile::TempDir;

async fn open() -> (TempDir, SqliteStore, ChangeFeed) {
    let dir = tempfile::tempdir().unwrap();
    let feed = ChangeFeed::new();
    let store = SqliteStore::open(dir.path().join("orders.db"), feed.clone())
        .await
        .unwrap();
    (dir, store, feed)
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn draft(receipt_id: &str, table_number: i32, created_at: i64) -> OrderDraft {
    OrderDraft {
        receipt_id: receipt_id.to_string(),
        table_number,
        items: vec![OrderItem {
            id: 1,
            name: "Mojito".into(),
            price: dec("9.50"),
            category: "Drinks".into(),
            quantity: 2,
        }],
        subtotal: dec("19.00"),
        tip_amount: Decimal::ZERO,
        total: dec("19.00"),
        status: OrderStatus::Pending,
        payment_method: None,
        payment_status: PaymentStatus::Unpaid,
        payment_type: Some(PaymentType::DirectCash),
        transaction_id: None,
        created_at,
        updated_at: created_at,
    }
}

#[tokio::test]
async fn test_menu_items_round_trip_decimal_prices() {
    let (_dir, store, _feed) = open().await;
    let item = store
        .insert_menu_item(MenuItemCreate {
            name: "Mojito".into(),
            price: dec("9.50"),
            category: "Drinks".into(),
            available: None,
        })
        .await
        .unwrap();
    assert!(item.available);

    let updated = store
        .update_menu_item(
            item.id,
            MenuItemUpdate {
                price: Some(dec("10.25")),
                available: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.price, dec("10.25"));
    assert!(!updated.available);

    let found = store.find_menu_item(item.id).await.unwrap().unwrap();
    assert_eq!(found, updated);

    assert!(store.delete_menu_item(item.id).await.unwrap());
    assert!(!store.delete_menu_item(item.id).await.unwrap());
    assert!(matches!(
        store.update_menu_item(item.id, MenuItemUpdate::default()).await,
        Err(RepoError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_table_numbers_unique_and_ordered() {
    let (_dir, store, _feed) = open().await;
    store.insert_table(4).await.unwrap();
    store.insert_table(1).await.unwrap();
    assert!(matches!(store.insert_table(4).await, Err(RepoError::Duplicate(_))));

    let numbers: Vec<i32> = store
        .list_tables()
        .await
        .unwrap()
        .iter()
        .map(|t| t.table_number)
        .collect();
    assert_eq!(numbers, vec![1, 4]);

    let mut table = store.find_table_by_number(4).await.unwrap().unwrap();
    table.book_for("NX-ABC234");
    let saved = store.update_table(&table).await.unwrap();
    assert_eq!(saved.status, TableStatus::Booked);
    assert_eq!(saved.current_order_id.as_deref(), Some("NX-ABC234"));
}

#[tokio::test]
async fn test_orders_filtered_newest_first() {
    let (_dir, store, _feed) = open().await;
    let first = store.insert_order(draft("NX-AAAAAA", 1, 1_000)).await.unwrap();
    let second = store.insert_order(draft("NX-BBBBBB", 2, 2_000)).await.unwrap();
    assert!(matches!(
        store.insert_order(draft("NX-AAAAAA", 3, 3_000)).await,
        Err(RepoError::Duplicate(_))
    ));

    let all = store.list_orders(OrderFilter::default()).await.unwrap();
    assert_eq!(all.iter().map(|o| o.id).collect::<Vec<_>>(), vec![second.id, first.id]);
    assert_eq!(all[1].items[0].quantity, 2);
    assert_eq!(all[1].total, dec("19.00"));

    let mut confirmed = first.clone();
    confirmed.status = OrderStatus::Confirmed;
    store.update_order(&confirmed).await.unwrap();

    let pending = store
        .list_orders(OrderFilter::with_status(OrderStatus::Pending))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].receipt_id, "NX-BBBBBB");

    let by_receipt = store.find_order_by_receipt("NX-AAAAAA").await.unwrap().unwrap();
    assert_eq!(by_receipt.status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn test_writes_publish_changes() {
    let (_dir, store, feed) = open().await;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let _sub = feed.subscribe(StoreTable::RestaurantTables, EventMask::INSERT, move |event| {
        let tx = tx.clone();
        Box::pin(async move {
            let _ = tx.send(event);
        })
    });

    let table = store.insert_table(7).await.unwrap();
    let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.kind, ChangeKind::Insert);
    assert_eq!(event.id, table.id);
}

#[tokio::test]
async fn test_reopen_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orders.db");
    {
        let store = SqliteStore::open(&path, ChangeFeed::new()).await.unwrap();
        store.insert_table(3).await.unwrap();
        store.pool().close().await;
    }
    let store = SqliteStore::open(&path, ChangeFeed::new()).await.unwrap();
    assert!(store.find_table_by_number(3).await.unwrap().is_some());
    store.ping().await.unwrap();
}
