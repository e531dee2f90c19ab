//! Integration tests for the message list: filters, the pending-edit
//! overlay and the hook-mediated write-through pipelines.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;

use gleaner::config::MessagesConfig;
use gleaner::messages::MessageListModel;
use gleaner::service::{HandleKind, ItemHandle, MessageFilter, ServiceHooks, StandardService};
use gleaner::storage::{Database, Importance, Message};

async fn seeded_db() -> (Database, i64) {
    let db = Database::open(":memory:").await.unwrap();
    let feed = db
        .insert_feed("Blog", "https://blog.example/feed", 1, -1, 0, 15)
        .await
        .unwrap();
    db.insert_message(feed, "Oldest", "", "alice", 100, "")
        .await
        .unwrap();
    db.insert_message(feed, "Middle", "", "", 200, "").await.unwrap();
    db.insert_message(feed, "Newest", "", "bob", 300, "")
        .await
        .unwrap();
    (db, feed)
}

fn list(db: &Database, service: Arc<dyn ServiceHooks>) -> MessageListModel {
    MessageListModel::new(db.clone(), service, &MessagesConfig::default())
}

fn feed_handle(feed_id: i64) -> ItemHandle {
    ItemHandle {
        kind: HandleKind::Feed,
        title: "Blog".into(),
        feed_ids: vec![feed_id],
    }
}

fn bin_handle() -> ItemHandle {
    ItemHandle {
        kind: HandleKind::Bin,
        title: "Recycle bin".into(),
        feed_ids: vec![],
    }
}

fn stored(db: &Database) -> impl std::future::Future<Output = Vec<Message>> + '_ {
    async move { db.fetch_messages("1 = 1").await.unwrap() }
}

// ============================================================================
// Loading & Filters
// ============================================================================

#[tokio::test]
async fn loads_feed_messages_newest_first() {
    let (db, feed) = seeded_db().await;
    let mut model = list(&db, Arc::new(StandardService));

    model.load_messages(Some(feed_handle(feed))).await.unwrap();

    assert_eq!(model.len(), 3);
    assert_eq!(model.message_at(0).unwrap().title, "Newest");
    assert_eq!(model.message_at(2).unwrap().title, "Oldest");
}

#[tokio::test]
async fn no_item_means_default_filter() {
    let (db, _) = seeded_db().await;
    let mut model = list(&db, Arc::new(StandardService));

    model.load_messages(None).await.unwrap();
    assert_eq!(model.len(), 3);
}

#[tokio::test]
async fn service_refusal_shows_nothing() {
    struct Refusing;
    impl ServiceHooks for Refusing {
        fn load_messages_for_item(&self, _item: &ItemHandle) -> Option<MessageFilter> {
            None
        }
    }

    let (db, feed) = seeded_db().await;
    let mut model = list(&db, Arc::new(Refusing));

    model.load_messages(Some(feed_handle(feed))).await.unwrap();
    assert!(model.is_empty());
    assert_eq!(
        model.failure_notice(),
        Some("Loading of messages from item 'Blog' failed.")
    );

    // A later successful load clears the notice
    let mut model = list(&db, Arc::new(StandardService));
    model.load_messages(Some(feed_handle(feed))).await.unwrap();
    assert_eq!(model.failure_notice(), None);
}

// ============================================================================
// Read State
// ============================================================================

#[tokio::test]
async fn read_flag_writes_through_overlay_and_store() {
    let (db, feed) = seeded_db().await;
    let mut model = list(&db, Arc::new(StandardService));
    model.load_messages(Some(feed_handle(feed))).await.unwrap();

    assert!(model.set_message_read(0, true).await.unwrap());

    // Overlay reflects the flip without a repopulation
    assert!(model.message_at(0).unwrap().is_read);
    assert!(!model.message_at(1).unwrap().is_read);
    assert!(model.row_style(1).bold);
    assert!(!model.row_style(0).bold);

    // And the store agrees
    let persisted = stored(&db).await;
    assert!(persisted.iter().find(|m| m.title == "Newest").unwrap().is_read);
}

#[tokio::test]
async fn unchanged_read_state_short_circuits_hooks() {
    struct Counting(AtomicUsize);
    impl ServiceHooks for Counting {
        fn load_messages_for_item(&self, item: &ItemHandle) -> Option<MessageFilter> {
            StandardService.load_messages_for_item(item)
        }
        fn on_before_set_messages_read(
            &self,
            _item: &ItemHandle,
            _messages: &[Message],
            _read: bool,
        ) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    let (db, feed) = seeded_db().await;
    let service = Arc::new(Counting(AtomicUsize::new(0)));
    let mut model = list(&db, service.clone());
    model.load_messages(Some(feed_handle(feed))).await.unwrap();

    assert!(model.set_message_read(0, false).await.unwrap());
    assert_eq!(service.0.load(Ordering::SeqCst), 0);

    assert!(model.set_message_read(0, true).await.unwrap());
    assert_eq!(service.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn veto_blocks_persistence() {
    struct Vetoing;
    impl ServiceHooks for Vetoing {
        fn load_messages_for_item(&self, item: &ItemHandle) -> Option<MessageFilter> {
            StandardService.load_messages_for_item(item)
        }
        fn on_before_set_messages_read(
            &self,
            _item: &ItemHandle,
            _messages: &[Message],
            _read: bool,
        ) -> bool {
            false
        }
    }

    let (db, feed) = seeded_db().await;
    let mut model = list(&db, Arc::new(Vetoing));
    model.load_messages(Some(feed_handle(feed))).await.unwrap();

    assert!(!model.set_message_read(0, true).await.unwrap());

    // Neither the overlay nor the store changed
    assert!(!model.message_at(0).unwrap().is_read);
    assert!(stored(&db).await.iter().all(|m| !m.is_read));
}

#[tokio::test]
async fn rejecting_after_hook_reports_failure_but_keeps_persisted_state() {
    struct RejectingAfter;
    impl ServiceHooks for RejectingAfter {
        fn load_messages_for_item(&self, item: &ItemHandle) -> Option<MessageFilter> {
            StandardService.load_messages_for_item(item)
        }
        fn on_after_set_messages_read(
            &self,
            _item: &ItemHandle,
            _messages: &[Message],
            _read: bool,
        ) -> bool {
            false
        }
    }

    let (db, feed) = seeded_db().await;
    let mut model = list(&db, Arc::new(RejectingAfter));
    model.load_messages(Some(feed_handle(feed))).await.unwrap();

    assert!(!model.set_message_read(0, true).await.unwrap());

    // Persistence happened before the after-hook ran
    assert!(model.message_at(0).unwrap().is_read);
    let persisted = stored(&db).await;
    assert!(persisted.iter().find(|m| m.title == "Newest").unwrap().is_read);
}

#[tokio::test]
async fn storage_failure_is_an_error_and_leaves_list_untouched() {
    let (db, feed) = seeded_db().await;
    let mut model = list(&db, Arc::new(StandardService));
    model.load_messages(Some(feed_handle(feed))).await.unwrap();

    db.close().await;

    assert!(model.set_message_read(0, true).await.is_err());
    assert!(!model.message_at(0).unwrap().is_read);
}

#[tokio::test]
async fn batch_read_and_id_entry_points() {
    let (db, feed) = seeded_db().await;
    let mut model = list(&db, Arc::new(StandardService));
    model.load_messages(Some(feed_handle(feed))).await.unwrap();

    assert!(model.set_batch_messages_read(&[0, 2], true).await.unwrap());
    assert!(model.message_at(0).unwrap().is_read);
    assert!(!model.message_at(1).unwrap().is_read);
    assert!(model.message_at(2).unwrap().is_read);

    let middle_id = model.message_at(1).unwrap().id;
    assert!(model.set_message_read_by_id(middle_id, true).await.unwrap());
    assert!(model.message_at(1).unwrap().is_read);

    // Unknown id is reported as not applied
    assert!(!model.set_message_read_by_id(9999, true).await.unwrap());
}

// ============================================================================
// Importance
// ============================================================================

#[tokio::test]
async fn batch_importance_toggle_flips_mixed_states_individually() {
    let (db, feed) = seeded_db().await;
    let mut model = list(&db, Arc::new(StandardService));
    model.load_messages(Some(feed_handle(feed))).await.unwrap();

    assert!(model.switch_message_importance(0).await.unwrap());
    assert_eq!(model.message_at(0).unwrap().importance, Importance::Important);

    assert!(model
        .switch_batch_message_importance(&[0, 1])
        .await
        .unwrap());
    assert_eq!(
        model.message_at(0).unwrap().importance,
        Importance::NotImportant
    );
    assert_eq!(model.message_at(1).unwrap().importance, Importance::Important);

    let persisted = stored(&db).await;
    assert!(!bool::from(
        persisted.iter().find(|m| m.title == "Newest").unwrap().importance
    ));
    assert!(bool::from(
        persisted.iter().find(|m| m.title == "Middle").unwrap().importance
    ));
}

#[tokio::test]
async fn importance_by_id_is_idempotent() {
    let (db, feed) = seeded_db().await;
    let mut model = list(&db, Arc::new(StandardService));
    model.load_messages(Some(feed_handle(feed))).await.unwrap();

    let id = model.message_at(0).unwrap().id;
    assert!(model.set_message_important_by_id(id, true).await.unwrap());
    assert_eq!(model.message_at(0).unwrap().importance, Importance::Important);

    // Already important: nothing to do, still a success
    assert!(model.set_message_important_by_id(id, true).await.unwrap());
    assert_eq!(model.message_at(0).unwrap().importance, Importance::Important);
}

// ============================================================================
// Delete / Restore
// ============================================================================

#[tokio::test]
async fn delete_moves_to_bin_and_purges_from_bin_view() {
    let (db, feed) = seeded_db().await;
    let mut model = list(&db, Arc::new(StandardService));

    // Regular view: deletion soft-deletes
    model.load_messages(Some(feed_handle(feed))).await.unwrap();
    assert!(model.set_batch_messages_deleted(&[0]).await.unwrap());
    assert!(model.message_at(0).unwrap().is_deleted);

    model.repopulate().await.unwrap();
    assert_eq!(model.len(), 2);

    // Bin view shows the deleted message; everything here is soft-deleted
    // already, so nothing strikes out yet
    model.load_messages(Some(bin_handle())).await.unwrap();
    assert_eq!(model.len(), 1);
    assert_eq!(model.message_at(0).unwrap().title, "Newest");
    assert!(!model.row_style(0).struck);

    // Bin view: deletion purges beyond recovery
    assert!(model.set_batch_messages_deleted(&[0]).await.unwrap());
    assert!(model.message_at(0).unwrap().is_pdeleted);
    assert!(model.row_style(0).struck);

    model.repopulate().await.unwrap();
    assert!(model.is_empty());

    // Purged rows keep both flags so the bin invariant holds
    let purged = stored(&db)
        .await
        .into_iter()
        .find(|m| m.title == "Newest")
        .unwrap();
    assert!(purged.is_deleted && purged.is_pdeleted);
}

#[tokio::test]
async fn restore_clears_both_flags_and_returns_message_to_feed() {
    let (db, feed) = seeded_db().await;
    let mut model = list(&db, Arc::new(StandardService));

    model.load_messages(Some(feed_handle(feed))).await.unwrap();
    model.set_batch_messages_deleted(&[0, 1]).await.unwrap();

    model.load_messages(Some(bin_handle())).await.unwrap();
    assert_eq!(model.len(), 2);
    assert!(model.set_batch_messages_restored(&[0]).await.unwrap());
    let restored = model.message_at(0).unwrap();
    assert!(!restored.is_deleted && !restored.is_pdeleted);

    model.load_messages(Some(feed_handle(feed))).await.unwrap();
    assert_eq!(model.len(), 2);
}

#[tokio::test]
async fn restore_outside_bin_view_is_rejected() {
    let (db, feed) = seeded_db().await;
    let mut model = list(&db, Arc::new(StandardService));
    model.load_messages(Some(feed_handle(feed))).await.unwrap();

    assert!(!model.set_batch_messages_restored(&[0]).await.unwrap());
}

// ============================================================================
// Rendering
// ============================================================================

#[tokio::test]
async fn display_text_renders_author_dash_and_flag_columns_empty() {
    use gleaner::messages::Column;

    let (db, feed) = seeded_db().await;
    let mut model = list(&db, Arc::new(StandardService));
    model.load_messages(Some(feed_handle(feed))).await.unwrap();

    // "Middle" has no author
    assert_eq!(model.display_text(1, Column::Author), "-");
    assert_eq!(model.display_text(0, Column::Author), "bob");
    assert_eq!(model.display_text(0, Column::Title), "Newest");
    assert_eq!(model.display_text(0, Column::Read), "");
    assert_eq!(model.display_text(0, Column::Important), "");
}
