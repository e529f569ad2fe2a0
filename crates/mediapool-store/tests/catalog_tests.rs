//! Catalog integration tests against a real store root

mod common;

use std::sync::Arc;

use common::fixtures::{item_form, tag_form, temp_store, FlakyDriver, RecordingDriver};
use mediapool_core::{
    CatalogError, EntityKind, FileId, FilterGroup, FilterRule, ItemForm, ItemId, ItemPatch,
    ListQuery, Original, RuleKind, SortKey, StorageOp, TagPatch, TagQuery,
};
use mediapool_store::{Catalog, StoreConfig, StoreError};

fn item_id(n: u64) -> ItemId {
    ItemId::new(n).unwrap()
}

// === Persistence ===

#[tokio::test]
async fn test_reopen_restores_pools() {
    let (dir, config) = temp_store();
    let catalog = Catalog::open(config.clone()).await.unwrap();

    let live = catalog.create_tag(tag_form("Live")).unwrap();
    let a = catalog
        .create_item(ItemForm {
            tags: vec![live.id],
            ..item_form("Concert")
        })
        .unwrap();
    let b = catalog.create_item(item_form("Studio")).unwrap();
    let parent = catalog
        .create_item(ItemForm {
            original: Some(Original::Children(vec![b.id])),
            ..item_form("Box set")
        })
        .unwrap();
    catalog
        .update_item(
            a.id,
            ItemPatch {
                title: Some("Concert (remaster)".into()),
                ..Default::default()
            },
        )
        .unwrap();
    catalog.close().await.unwrap();

    assert!(dir.path().join("version.json").exists());
    assert!(dir.path().join("item-pool/0/1.json").exists());
    assert!(dir.path().join("tag-pool/0/1.json").exists());

    let reopened = Catalog::open(config).await.unwrap();
    let a2 = reopened.get_item(a.id).unwrap();
    assert_eq!(a2.title, "Concert (remaster)");
    assert_eq!(a2.tags, vec![live.id]);
    assert_eq!(reopened.get_item(b.id).unwrap().parent, Some(parent.id));
    assert_eq!(reopened.find_tag("LIVE").unwrap().id, live.id);

    let stats = reopened.stats();
    assert_eq!((stats.items, stats.tags), (3, 1));
    assert_eq!(stats.latest_item_id, 3);
    assert!(reopened.items().index_is_consistent());

    // IDs continue after the highest stored one.
    let next = reopened.create_item(item_form("Next")).unwrap();
    assert_eq!(next.id, item_id(4));
}

#[tokio::test]
async fn test_delete_removes_record_file() {
    let (dir, config) = temp_store();
    let catalog = Catalog::open(config).await.unwrap();
    let item = catalog.create_item(item_form("gone")).unwrap();
    catalog.flush().await;
    assert!(dir.path().join("item-pool/0/1.json").exists());

    catalog.delete_item(item.id).unwrap();
    catalog.flush().await;
    assert!(!dir.path().join("item-pool/0/1.json").exists());
    assert!(catalog.failure().is_none());
}

#[tokio::test]
async fn test_version_mismatch_is_fatal() {
    let (dir, config) = temp_store();
    std::fs::write(dir.path().join("version.json"), "7").unwrap();
    let err = Catalog::open(config).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::VersionMismatch {
            found: 7,
            required: 1,
            ..
        }
    ));
}

#[tokio::test]
async fn test_malformed_date_is_corrupt() {
    let (dir, config) = temp_store();
    std::fs::write(dir.path().join("version.json"), "1").unwrap();
    std::fs::create_dir_all(dir.path().join("item-pool/0")).unwrap();
    std::fs::write(
        dir.path().join("item-pool/0/1.json"),
        r#"{"id": 1, "title": "x", "cover": null, "original": null, "parent": null,
            "release_date": null, "create_date": "yesterday", "update_date": "2024-01-01T00:00:00Z"}"#,
    )
    .unwrap();
    let err = Catalog::open(config).await.unwrap_err();
    assert!(matches!(err, StoreError::Corrupt { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let (_dir, config) = temp_store();
    let config = StoreConfig {
        bucket_interval: 0,
        ..config
    };
    assert!(matches!(
        Catalog::open(config).await,
        Err(StoreError::Config(_))
    ));
}

// === Tags ===

#[tokio::test]
async fn test_unknown_tag_is_validation_error() {
    let (_dir, config) = temp_store();
    let catalog = Catalog::open(config).await.unwrap();
    let ghost = mediapool_core::TagId::new(42).unwrap();
    let err = catalog
        .create_item(ItemForm {
            tags: vec![ghost],
            ..item_form("x")
        })
        .unwrap_err();
    match err.as_catalog() {
        Some(CatalogError::Validation { field, .. }) => assert_eq!(field, "tags"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(catalog.items().is_empty());
}

#[tokio::test]
async fn test_delete_tag_strips_items() {
    let (_dir, config) = temp_store();
    let catalog = Catalog::open(config.clone()).await.unwrap();
    let keep = catalog.create_tag(tag_form("keep")).unwrap();
    let drop = catalog.create_tag(tag_form("drop")).unwrap();
    let item = catalog
        .create_item(ItemForm {
            tags: vec![keep.id, drop.id],
            ..item_form("tagged")
        })
        .unwrap();

    assert_eq!(catalog.delete_tag(drop.id).unwrap(), 1);
    assert_eq!(catalog.get_item(item.id).unwrap().tags, vec![keep.id]);
    catalog.close().await.unwrap();

    let reopened = Catalog::open(config).await.unwrap();
    assert_eq!(reopened.get_item(item.id).unwrap().tags, vec![keep.id]);
    assert!(reopened.get_tag(drop.id).is_err());
}

#[tokio::test]
async fn test_tag_rename_and_listing() {
    let (_dir, config) = temp_store();
    let catalog = Catalog::open(config).await.unwrap();
    for name in ["delta", "alpha", "charlie"] {
        catalog.create_tag(tag_form(name)).unwrap();
    }
    let alpha = catalog.find_tag("Alpha").unwrap();
    catalog
        .update_tag(
            alpha.id,
            TagPatch {
                name: Some("echo".into()),
                ..Default::default()
            },
        )
        .unwrap();

    let names: Vec<String> = catalog
        .list_tags(&TagQuery::default())
        .unwrap()
        .iter()
        .map(|t| t.name.clone())
        .collect();
    assert_eq!(names, vec!["charlie", "delta", "echo"]);

    let dup = catalog.create_tag(tag_form("DELTA")).unwrap_err();
    assert!(matches!(
        dup.as_catalog(),
        Some(CatalogError::DuplicateName(_))
    ));
}

// === Listing ===

#[tokio::test]
async fn test_list_items_with_filter_and_cursor() {
    let (_dir, config) = temp_store();
    let catalog = Catalog::open(config).await.unwrap();
    for title in ["live one", "studio", "live two", "live three"] {
        catalog.create_item(item_form(title)).unwrap();
    }
    let filter = vec![FilterGroup::new(vec![FilterRule::new(RuleKind::TitleContains(
        "LIVE".into(),
    ))])];

    let first = catalog
        .list_items(&ListQuery {
            sort: SortKey::Id,
            limit: 2,
            filter: filter.clone(),
            ..Default::default()
        })
        .unwrap();
    let ids: Vec<ItemId> = first.iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![item_id(1), item_id(3)]);

    let rest = catalog
        .list_items(&ListQuery {
            after: Some(item_id(3)),
            filter,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].id, item_id(4));

    let missing = catalog
        .list_items(&ListQuery {
            after: Some(item_id(99)),
            ..Default::default()
        })
        .unwrap_err();
    assert_eq!(missing.as_catalog(), Some(&CatalogError::CursorNotFound(99)));
}

// === Failure latch ===

#[tokio::test]
async fn test_driver_failure_latches_and_blocks_mutations() {
    let (_dir, config) = temp_store();
    let driver = Arc::new(FlakyDriver::default());
    let catalog = Catalog::open_with_driver(config, driver.clone()).await.unwrap();

    let item = catalog.create_item(item_form("first")).unwrap();
    catalog.flush().await;
    driver.break_now();

    catalog
        .update_item(
            item.id,
            ItemPatch {
                title: Some("second".into()),
                ..Default::default()
            },
        )
        .unwrap();
    catalog.flush().await;

    let expected = |err: &CatalogError| {
        matches!(
            err,
            CatalogError::StorageDriver {
                kind: EntityKind::Item,
                id: 1,
                op: StorageOp::Update,
                ..
            }
        )
    };
    assert!(catalog.failure().as_ref().is_some_and(expected));

    let blocked = catalog.create_tag(tag_form("late")).unwrap_err();
    assert!(blocked.as_catalog().is_some_and(expected));
    let blocked = catalog.delete_item(item.id).unwrap_err();
    assert!(blocked.as_catalog().is_some_and(expected));

    // Reads still work.
    assert_eq!(catalog.get_item(item.id).unwrap().title, "second");
    assert!(catalog.close().await.is_err());
}

#[tokio::test]
async fn test_delete_tag_refused_after_failure() {
    let (_dir, config) = temp_store();
    let driver = Arc::new(FlakyDriver::default());
    let catalog = Catalog::open_with_driver(config, driver.clone()).await.unwrap();
    let doomed = catalog.create_tag(tag_form("doomed")).unwrap();
    let item = catalog
        .create_item(ItemForm {
            tags: vec![doomed.id],
            ..item_form("tagged")
        })
        .unwrap();
    catalog.flush().await;

    driver.break_now();
    catalog
        .update_item(
            item.id,
            ItemPatch {
                title: Some("retitled".into()),
                ..Default::default()
            },
        )
        .unwrap();
    catalog.flush().await;
    assert!(catalog.failure().is_some());

    assert!(catalog.delete_tag(doomed.id).is_err());
    // Neither pool moved.
    assert!(catalog.get_tag(doomed.id).is_ok());
    assert_eq!(catalog.get_item(item.id).unwrap().tags, vec![doomed.id]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_update_racing_delete_reports_every_written_update() {
    let (_dir, config) = temp_store();
    let driver = Arc::new(RecordingDriver::default());
    let catalog = Arc::new(Catalog::open_with_driver(config, driver.clone()).await.unwrap());
    let ids: Vec<ItemId> = (0..64)
        .map(|n| catalog.create_item(item_form(&format!("item {}", n))).unwrap().id)
        .collect();
    catalog.flush().await;
    driver.clear();

    let updater = {
        let catalog = Arc::clone(&catalog);
        let ids = ids.clone();
        tokio::task::spawn_blocking(move || {
            ids.iter()
                .map(|id| {
                    let patch = ItemPatch {
                        title: Some("renamed".into()),
                        ..Default::default()
                    };
                    (*id, catalog.update_item(*id, patch))
                })
                .collect::<Vec<_>>()
        })
    };
    let deleter = {
        let catalog = Arc::clone(&catalog);
        let ids = ids.clone();
        tokio::task::spawn_blocking(move || {
            for id in ids.iter().rev() {
                catalog.delete_item(*id).unwrap();
            }
        })
    };
    let outcomes = updater.await.unwrap();
    deleter.await.unwrap();
    catalog.flush().await;

    let written = driver.seen(StorageOp::Update, EntityKind::Item);
    for (id, outcome) in outcomes {
        if written.contains(&id.get()) {
            let item = outcome.unwrap_or_else(|e| panic!("update of {} was persisted but failed: {}", id, e));
            assert_eq!(item.title, "renamed");
        } else {
            assert!(outcome.is_err());
        }
    }
    assert!(catalog.list_items(&ListQuery::default()).unwrap().is_empty());
}

// === Files ===

#[tokio::test]
async fn test_concurrent_file_numbers_are_gap_free() {
    let (_dir, config) = temp_store();
    let catalog = Arc::new(Catalog::open(config).await.unwrap());
    let n = 32;
    let handles: Vec<_> = (0..n)
        .map(|_| {
            let catalog = Arc::clone(&catalog);
            tokio::spawn(async move { catalog.request_file_number().await.unwrap() })
        })
        .collect();
    let mut numbers = Vec::new();
    for handle in handles {
        numbers.push(handle.await.unwrap());
    }
    numbers.sort_unstable();
    assert_eq!(numbers, (0..n).collect::<Vec<u64>>());
    assert_eq!(catalog.request_file_number().await.unwrap(), n);
}

#[tokio::test]
async fn test_unreferenced_files_are_cleaned() {
    let (dir, config) = temp_store();
    let catalog = Catalog::open(config).await.unwrap();
    for _ in 0..3 {
        let n = catalog.request_file_number().await.unwrap();
        catalog.save_file(&FileId::new(n), b"blob").await.unwrap();
    }
    catalog
        .create_item(ItemForm {
            cover: Some(FileId::new(1)),
            ..item_form("covered")
        })
        .unwrap();

    assert_eq!(
        catalog.collect_unreferenced_files().await.unwrap(),
        vec![FileId::new(0), FileId::new(2)]
    );
    catalog.clean_unreferenced_files().await.unwrap();

    assert!(!catalog.file_exists(&FileId::new(0)).await.unwrap());
    assert!(catalog.file_exists(&FileId::new(1)).await.unwrap());
    assert!(!catalog.file_exists(&FileId::new(2)).await.unwrap());
    assert!(dir.path().join("files/latest.json").exists());
    assert_eq!(catalog.load_file(&FileId::new(1)).await.unwrap(), b"blob");
}

#[tokio::test]
async fn test_clean_keeps_cover_set_while_cleaning() {
    let (_dir, config) = temp_store();
    let catalog = Catalog::open(config).await.unwrap();
    for n in 0..2 {
        catalog.save_file(&FileId::new(n), b"blob").await.unwrap();
    }

    let (cleaned, created) = tokio::join!(catalog.clean_unreferenced_files(), async {
        tokio::task::yield_now().await;
        catalog.create_item(ItemForm {
            cover: Some(FileId::new(0)),
            ..item_form("late cover")
        })
    });
    created.unwrap();

    assert_eq!(cleaned.unwrap(), vec![FileId::new(1)]);
    assert!(catalog.file_exists(&FileId::new(0)).await.unwrap());
    assert!(catalog.collect_unreferenced_files().await.unwrap().is_empty());
}
