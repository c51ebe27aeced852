use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{TimeZone, Timelike, Utc};
use domain::{Delivery, Item, Order, Payment};
use order_model::{CachedOrderModel, OrderModel, OrderModelError};
use order_store::memory::{InMemoryOrderStore, Table};
use order_store::{OrderStore, OwnedItem};

fn test_order(uid: &str, item_count: usize) -> Order {
    Order {
        uid: uid.to_string(),
        track_number: "WBILMTESTTRACK".to_string(),
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: "Test Testov".to_string(),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: "test@gmail.com".to_string(),
        },
        payment: Payment {
            transaction: uid.to_string(),
            request_id: String::new(),
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: 1817,
            payment_dt: 1637907727,
            bank: "alpha".to_string(),
            delivery_cost: 1500,
            goods_total: 317,
            custom_fee: 0,
        },
        items: (0..item_count)
            .map(|i| Item {
                chrt_id: 9934930 + i as i64,
                track_number: "WBILMTESTTRACK".to_string(),
                price: 453,
                rid: format!("ab4219087a764ae0btest{i}"),
                name: "Mascaras".to_string(),
                sale: 30,
                size: "0".to_string(),
                total_price: 317,
                nm_id: 2389212,
                brand: "Vivienne Sabo".to_string(),
                status: 202,
            })
            .collect(),
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: "test".to_string(),
        delivery_service: "meest".to_string(),
        shardkey: "9".to_string(),
        sm_id: 99,
        date_created: Utc.with_ymd_and_hms(2021, 11, 26, 6, 22, 19).unwrap(),
        oof_shard: "1".to_string(),
    }
}

/// Move the rows of a closed-down model into a fresh store, as a restart would see them
async fn restart(store: &InMemoryOrderStore) -> CachedOrderModel<InMemoryOrderStore> {
    let fresh = InMemoryOrderStore::new();
    let snapshot = store.restore_all().await.unwrap();
    for shell in &snapshot.orders {
        fresh.seed(shell);
    }
    for item in snapshot.items {
        fresh.seed_item(item);
    }
    CachedOrderModel::with_store(fresh).await.unwrap()
}

#[tokio::test]
async fn test_insert_then_get_example() {
    let model = CachedOrderModel::with_store(InMemoryOrderStore::new())
        .await
        .unwrap();
    let order = test_order("abc123", 1);

    model.insert(order.clone()).await.unwrap();

    let found = model.get_by_uid("abc123").await.unwrap();
    assert_eq!(found.items.len(), 1);
    assert_eq!(*found, order);
    assert_eq!(model.list_of_uids().await, vec!["abc123"]);
}

#[tokio::test]
async fn test_inserted_orders_survive_restart() {
    let model = CachedOrderModel::with_store(InMemoryOrderStore::new())
        .await
        .unwrap();
    let orders: Vec<Order> = (0..4).map(|n| test_order(&format!("uid-{n}"), n)).collect();
    for order in &orders {
        model.insert(order.clone()).await.unwrap();
    }

    let restarted = restart(model.store()).await;

    assert_eq!(restarted.cached_count().await, orders.len());
    for order in &orders {
        let found = restarted.get_by_uid(&order.uid).await.unwrap();
        assert_eq!(*found, *order);
    }
    // Everything came from the restore; no lazy loads were needed.
    assert_eq!(restarted.store().reads(), 1);
}

#[tokio::test]
async fn test_duplicate_insert_leaves_store_rows_unchanged() {
    let model = CachedOrderModel::with_store(InMemoryOrderStore::new())
        .await
        .unwrap();
    model.insert(test_order("dup", 2)).await.unwrap();
    let writes_before = model.store().writes();

    let result = model.insert(test_order("dup", 5)).await;

    assert!(matches!(result, Err(OrderModelError::DuplicateKey(uid)) if uid == "dup"));
    assert_eq!(model.store().writes(), writes_before);
    assert_eq!(model.store().row_count(Table::Items, "dup"), 2);
    assert_eq!(model.get_by_uid("dup").await.unwrap().items.len(), 2);
}

#[tokio::test]
async fn test_list_of_uids_is_sorted_union_of_inserted_and_fetched() {
    let store = InMemoryOrderStore::new();
    let model = CachedOrderModel::with_store(store).await.unwrap();

    for uid in ["delta", "alpha", "charlie"] {
        model.insert(test_order(uid, 1)).await.unwrap();
    }
    // Rows written behind the model's back are only known once fetched.
    model.store().seed(&test_order("bravo", 1));
    model.store().seed(&test_order("echo", 1));
    assert_eq!(
        model.list_of_uids().await,
        vec!["alpha", "charlie", "delta"]
    );

    model.get_by_uid("bravo").await.unwrap();

    assert_eq!(
        model.list_of_uids().await,
        vec!["alpha", "bravo", "charlie", "delta"]
    );
}

#[tokio::test]
async fn test_unknown_uid_is_not_found_and_cache_unchanged() {
    let model = CachedOrderModel::with_store(InMemoryOrderStore::new())
        .await
        .unwrap();

    let result = model.get_by_uid("nope").await;

    assert!(matches!(result, Err(OrderModelError::NotFound(uid)) if uid == "nope"));
    assert_eq!(model.cached_count().await, 0);
    assert!(model.list_of_uids().await.is_empty());
}

#[tokio::test]
async fn test_failed_items_insert_leaves_no_trace() {
    let model = CachedOrderModel::with_store(InMemoryOrderStore::new())
        .await
        .unwrap();
    model.store().fail_on(Table::Items);

    let result = model.insert(test_order("broken", 3)).await;

    assert!(matches!(result, Err(OrderModelError::Database(_))));
    for table in [Table::Orders, Table::Deliveries, Table::Payments, Table::Items] {
        assert_eq!(model.store().row_count(table, "broken"), 0, "{table}");
    }
    assert!(!model.list_of_uids().await.contains(&"broken".to_string()));

    // The failed attempt did not poison the uid.
    model.store().clear_failure();
    model.insert(test_order("broken", 3)).await.unwrap();
    assert_eq!(model.store().row_count(Table::Items, "broken"), 3);
}

#[tokio::test]
async fn test_restore_yields_n_entries_and_m_items() {
    let store = InMemoryOrderStore::new();
    let mut expected_items = 0;
    for n in 0..7 {
        let order = test_order(&format!("restored-{n}"), n % 4);
        expected_items += order.items.len();
        store.seed(&order);
    }

    let model = CachedOrderModel::with_store(store).await.unwrap();

    let uids = model.list_of_uids().await;
    assert_eq!(uids.len(), 7);
    let mut restored_items = 0;
    for uid in &uids {
        restored_items += model.get_by_uid(uid).await.unwrap().items.len();
    }
    assert_eq!(restored_items, expected_items);
}

#[tokio::test]
async fn test_orphan_item_aborts_construction() {
    let store = InMemoryOrderStore::new();
    store.seed(&test_order("parent", 1));
    store.seed_item(OwnedItem {
        order_uid: "orphan".to_string(),
        item: test_order("orphan", 1).items.remove(0),
    });

    let result = CachedOrderModel::with_store(store).await;

    assert!(matches!(result, Err(OrderModelError::Integrity(msg)) if msg.contains("orphan")));
}

#[tokio::test]
async fn test_zero_item_order_round_trips() {
    let model = CachedOrderModel::with_store(InMemoryOrderStore::new())
        .await
        .unwrap();

    model.insert(test_order("empty", 0)).await.unwrap();

    let restarted = restart(model.store()).await;
    assert!(restarted.get_by_uid("empty").await.unwrap().items.is_empty());
}

#[tokio::test]
async fn test_sub_microsecond_timestamp_survives_restart_unchanged() {
    let model = CachedOrderModel::with_store(InMemoryOrderStore::new())
        .await
        .unwrap();
    let mut order = test_order("precise", 1);
    order.date_created = Utc
        .with_ymd_and_hms(2021, 11, 26, 6, 22, 19)
        .unwrap()
        .with_nanosecond(123_456_789)
        .unwrap();

    model.insert(order).await.unwrap();

    let before = model.get_by_uid("precise").await.unwrap();
    assert_eq!(before.date_created.timestamp_subsec_nanos(), 123_456_000);
    let restarted = restart(model.store()).await;
    assert_eq!(*restarted.get_by_uid("precise").await.unwrap(), *before);
}

#[tokio::test]
async fn test_close_is_idempotent_and_cache_still_serves() {
    let model = CachedOrderModel::with_store(InMemoryOrderStore::new())
        .await
        .unwrap();
    model.insert(test_order("kept", 1)).await.unwrap();

    model.close().await;
    model.close().await;

    assert!(model.store().is_closed());
    assert!(model.get_by_uid("kept").await.is_ok());
    assert!(matches!(
        model.get_by_uid("missing").await,
        Err(OrderModelError::Connection(_))
    ));
    assert!(matches!(
        model.insert(test_order("late", 1)).await,
        Err(OrderModelError::Connection(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ingestion_and_queries() {
    let model = Arc::new(
        CachedOrderModel::with_store(InMemoryOrderStore::new())
            .await
            .unwrap(),
    );

    let mut handles = Vec::new();
    for n in 0..32 {
        let model = Arc::clone(&model);
        handles.push(tokio::spawn(async move {
            let uid = format!("concurrent-{n:02}");
            model.insert(test_order(&uid, 2)).await.unwrap();
            let found = model.get_by_uid(&uid).await.unwrap();
            assert_eq!(found.uid, uid);
            model.list_of_uids().await.len()
        }));
    }
    for handle in handles {
        let seen = handle.await.unwrap();
        assert!(seen >= 1);
    }

    let uids = model.list_of_uids().await;
    let expected: BTreeSet<String> = (0..32).map(|n| format!("concurrent-{n:02}")).collect();
    assert_eq!(uids, expected.into_iter().collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_duplicate_inserts_persist_once() {
    let model = Arc::new(
        CachedOrderModel::with_store(InMemoryOrderStore::new())
            .await
            .unwrap(),
    );

    let mut handles = Vec::new();
    for _ in 0..8 {
        let model = Arc::clone(&model);
        handles.push(tokio::spawn(async move {
            model.insert(test_order("contended", 1)).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => successes += 1,
            Err(OrderModelError::DuplicateKey(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(model.store().row_count(Table::Items, "contended"), 1);
    assert_eq!(model.list_of_uids().await, vec!["contended"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_lazy_loads_share_one_entry() {
    let store = InMemoryOrderStore::new();
    let model = Arc::new(CachedOrderModel::with_store(store).await.unwrap());
    model.store().seed(&test_order("lazy", 1));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let model = Arc::clone(&model);
        handles.push(tokio::spawn(async move { model.get_by_uid("lazy").await }));
    }

    let mut loaded = Vec::new();
    for handle in handles {
        loaded.push(handle.await.unwrap().unwrap());
    }

    let resident = model.get_by_uid("lazy").await.unwrap();
    assert!(loaded.iter().all(|o| Arc::ptr_eq(o, &resident)));
    assert_eq!(model.cached_count().await, 1);
}
