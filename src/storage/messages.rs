use std::collections::HashMap;

use anyhow::Result;
use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::{Message, MessageCounts, MessageDbRow};

/// Columns selected for every message query.
const MESSAGE_COLUMNS: &str = "id, feed_id, title, url, author, date_created, contents, \
     is_read, is_deleted, is_pdeleted, is_important, attachments, \
     account_id, custom_id, custom_hash";

impl Database {
    // ========================================================================
    // Message Ingestion
    // ========================================================================

    /// Insert a single message row, returning its ID. The fetch/parse
    /// pipeline producing these rows is an external collaborator; this entry
    /// point exists for it (and for tests).
    pub async fn insert_message(
        &self,
        feed_id: i64,
        title: &str,
        url: &str,
        author: &str,
        created: i64,
        contents: &str,
    ) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO messages (feed_id, title, url, author, date_created, contents)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
        "#,
        )
        .bind(feed_id)
        .bind(title)
        .bind(url)
        .bind(author)
        .bind(created)
        .bind(contents)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    // ========================================================================
    // Message Queries
    // ========================================================================

    /// Fetch all messages matching a filter clause, newest first.
    ///
    /// The clause comes from [`crate::service::MessageFilter`], which builds
    /// it exclusively from constants and numeric ids — never from user text.
    pub async fn fetch_messages(&self, filter_clause: &str) -> Result<Vec<Message>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE {filter_clause} ORDER BY date_created DESC, id DESC",
        );
        let rows = sqlx::query_as::<_, MessageDbRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(MessageDbRow::into_message).collect())
    }

    /// Collect all non-deleted messages belonging to the given feeds,
    /// in feed order (the export path of the tree model).
    pub async fn messages_for_feeds(&self, feed_ids: &[i64]) -> Result<Vec<Message>> {
        let mut messages = Vec::new();

        for feed_id in feed_ids {
            let rows = sqlx::query_as::<_, MessageDbRow>(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages \
                 WHERE is_deleted = 0 AND feed_id = ? ORDER BY date_created DESC, id DESC",
            ))
            .bind(feed_id)
            .fetch_all(&self.pool)
            .await?;

            messages.extend(rows.into_iter().map(MessageDbRow::into_message));
        }

        Ok(messages)
    }

    // ========================================================================
    // Per-Message Flag Updates
    // ========================================================================

    /// Set the read flag on a batch of messages.
    pub async fn mark_messages_read(&self, message_ids: &[i64], read: bool) -> Result<()> {
        if message_ids.is_empty() {
            return Ok(());
        }

        let mut q: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("UPDATE messages SET is_read = ");
        q.push_bind(read);
        q.push(" WHERE id IN (");
        let mut separated = q.separated(", ");
        for id in message_ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");
        q.build().execute(&self.pool).await?;

        Ok(())
    }

    /// Set the importance flag on a single message.
    pub async fn mark_message_important(&self, message_id: i64, important: bool) -> Result<()> {
        sqlx::query("UPDATE messages SET is_important = ? WHERE id = ?")
            .bind(important)
            .bind(message_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Toggle the importance flag on a batch of messages. Done in SQL so
    /// messages with mixed current states each flip individually.
    pub async fn switch_messages_importance(&self, message_ids: &[i64]) -> Result<()> {
        if message_ids.is_empty() {
            return Ok(());
        }

        let mut q: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("UPDATE messages SET is_important = NOT is_important WHERE id IN (");
        let mut separated = q.separated(", ");
        for id in message_ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");
        q.build().execute(&self.pool).await?;

        Ok(())
    }

    /// Move messages to the recycle bin (`deleted = true`) or restore them
    /// from it (`deleted = false`). Restoring also clears the
    /// permanently-deleted flag so both flags end up false.
    pub async fn delete_or_restore_messages(
        &self,
        message_ids: &[i64],
        deleted: bool,
    ) -> Result<()> {
        if message_ids.is_empty() {
            return Ok(());
        }

        let sql = if deleted {
            "UPDATE messages SET is_deleted = 1 WHERE id IN ("
        } else {
            "UPDATE messages SET is_deleted = 0, is_pdeleted = 0 WHERE id IN ("
        };

        let mut q: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(sql);
        let mut separated = q.separated(", ");
        for id in message_ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");
        q.build().execute(&self.pool).await?;

        Ok(())
    }

    /// Purge messages beyond recovery. The row is kept with the
    /// permanently-deleted flag set (store policy), which preserves the
    /// `is_pdeleted implies is_deleted` invariant for messages reached via
    /// the recycle bin.
    pub async fn permanently_delete_messages(&self, message_ids: &[i64]) -> Result<()> {
        if message_ids.is_empty() {
            return Ok(());
        }

        let mut q: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("UPDATE messages SET is_pdeleted = 1 WHERE id IN (");
        let mut separated = q.separated(", ");
        for id in message_ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");
        q.build().execute(&self.pool).await?;

        Ok(())
    }

    // ========================================================================
    // Per-Feed Bulk Updates
    // ========================================================================

    /// Set the read flag on every non-deleted message of the given feeds.
    /// One transaction; any failure rolls the whole update back.
    pub async fn mark_feeds_read(&self, feed_ids: &[i64], read: bool) -> Result<()> {
        if feed_ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        let mut q: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("UPDATE messages SET is_read = ");
        q.push_bind(read);
        q.push(" WHERE is_deleted = 0 AND feed_id IN (");
        let mut separated = q.separated(", ");
        for id in feed_ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");
        q.build().execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Soft-delete (or un-delete) every non-deleted message of the given
    /// feeds. With `read_only`, only already-read messages are touched.
    /// One transaction; any failure rolls the whole update back.
    pub async fn mark_feeds_deleted(
        &self,
        feed_ids: &[i64],
        deleted: bool,
        read_only: bool,
    ) -> Result<()> {
        if feed_ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        let mut q: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("UPDATE messages SET is_deleted = ");
        q.push_bind(deleted);
        q.push(" WHERE is_deleted = 0");
        if read_only {
            q.push(" AND is_read = 1");
        }
        q.push(" AND feed_id IN (");
        let mut separated = q.separated(", ");
        for id in feed_ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");
        q.build().execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(())
    }

    // ========================================================================
    // Recycle Bin
    // ========================================================================

    /// Permanently purge every message currently in the recycle bin,
    /// independent of feed. Returns the number of messages purged.
    pub async fn empty_bin(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE messages SET is_pdeleted = 1 WHERE is_deleted = 1 AND is_pdeleted = 0",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Restore every message currently in the recycle bin back to its feed.
    /// Returns the number of messages restored.
    pub async fn restore_bin(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE messages SET is_deleted = 0 WHERE is_deleted = 1 AND is_pdeleted = 0",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // ========================================================================
    // Counts
    // ========================================================================

    /// Unread/total counts for every feed in one grouped query.
    /// Soft-deleted and purged messages do not count.
    pub async fn feed_counts(&self) -> Result<HashMap<i64, MessageCounts>> {
        let rows: Vec<(i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT feed_id,
                   COUNT(CASE WHEN is_read = 0 THEN 1 END),
                   COUNT(*)
            FROM messages
            WHERE is_deleted = 0 AND is_pdeleted = 0
            GROUP BY feed_id
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(feed_id, unread, total)| (feed_id, MessageCounts { unread, total }))
            .collect())
    }

    /// Unread/total counts of the recycle bin (soft-deleted, not purged).
    pub async fn bin_counts(&self) -> Result<MessageCounts> {
        let row: (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(CASE WHEN is_read = 0 THEN 1 END), COUNT(*)
            FROM messages
            WHERE is_deleted = 1 AND is_pdeleted = 0
        "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(MessageCounts {
            unread: row.0,
            total: row.1,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::Database;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    async fn seed_feed(db: &Database, url: &str) -> i64 {
        db.insert_feed("Feed", url, 3, -1, 0, 15).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_fetch_default_filter() {
        let db = test_db().await;
        let feed = seed_feed(&db, "https://a.example/feed").await;

        db.insert_message(feed, "First", "https://a.example/1", "alice", 100, "body")
            .await
            .unwrap();
        db.insert_message(feed, "Second", "https://a.example/2", "", 200, "body")
            .await
            .unwrap();

        let messages = db
            .fetch_messages("is_deleted = 0 AND is_pdeleted = 0")
            .await
            .unwrap();
        assert_eq!(messages.len(), 2);
        // Newest first
        assert_eq!(messages[0].title, "Second");
        assert!(!messages[0].is_read);
    }

    #[tokio::test]
    async fn test_mark_feeds_read_skips_deleted() {
        let db = test_db().await;
        let feed = seed_feed(&db, "https://a.example/feed").await;

        let kept = db
            .insert_message(feed, "Kept", "", "", 100, "")
            .await
            .unwrap();
        let binned = db
            .insert_message(feed, "Binned", "", "", 200, "")
            .await
            .unwrap();
        db.delete_or_restore_messages(&[binned], true).await.unwrap();

        db.mark_feeds_read(&[feed], true).await.unwrap();

        let all = db.fetch_messages("1 = 1").await.unwrap();
        let kept_msg = all.iter().find(|m| m.id == kept).unwrap();
        let binned_msg = all.iter().find(|m| m.id == binned).unwrap();
        assert!(kept_msg.is_read);
        assert!(!binned_msg.is_read, "deleted messages are not touched");
    }

    #[tokio::test]
    async fn test_mark_feeds_deleted_read_only() {
        let db = test_db().await;
        let feed = seed_feed(&db, "https://a.example/feed").await;

        let read = db
            .insert_message(feed, "Read", "", "", 100, "")
            .await
            .unwrap();
        let unread = db
            .insert_message(feed, "Unread", "", "", 200, "")
            .await
            .unwrap();
        db.mark_messages_read(&[read], true).await.unwrap();

        db.mark_feeds_deleted(&[feed], true, true).await.unwrap();

        let all = db.fetch_messages("1 = 1").await.unwrap();
        assert!(all.iter().find(|m| m.id == read).unwrap().is_deleted);
        assert!(!all.iter().find(|m| m.id == unread).unwrap().is_deleted);
    }

    #[tokio::test]
    async fn test_bin_empty_and_restore() {
        let db = test_db().await;
        let feed = seed_feed(&db, "https://a.example/feed").await;

        let a = db.insert_message(feed, "A", "", "", 100, "").await.unwrap();
        let b = db.insert_message(feed, "B", "", "", 200, "").await.unwrap();
        db.delete_or_restore_messages(&[a, b], true).await.unwrap();

        assert_eq!(db.bin_counts().await.unwrap().total, 2);

        let restored = db.restore_bin().await.unwrap();
        assert_eq!(restored, 2);
        assert_eq!(db.bin_counts().await.unwrap().total, 0);

        // Back to bin, then purge
        db.delete_or_restore_messages(&[a, b], true).await.unwrap();
        let purged = db.empty_bin().await.unwrap();
        assert_eq!(purged, 2);

        // Purged rows keep both flags set
        let all = db.fetch_messages("1 = 1").await.unwrap();
        for m in &all {
            assert!(m.is_deleted && m.is_pdeleted);
        }
        assert_eq!(db.bin_counts().await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_feed_counts_grouped() {
        let db = test_db().await;
        let feed_a = seed_feed(&db, "https://a.example/feed").await;
        let feed_b = seed_feed(&db, "https://b.example/feed").await;

        let m1 = db
            .insert_message(feed_a, "1", "", "", 100, "")
            .await
            .unwrap();
        db.insert_message(feed_a, "2", "", "", 200, "").await.unwrap();
        db.insert_message(feed_b, "3", "", "", 300, "").await.unwrap();
        db.mark_messages_read(&[m1], true).await.unwrap();

        let counts = db.feed_counts().await.unwrap();
        assert_eq!(counts[&feed_a].total, 2);
        assert_eq!(counts[&feed_a].unread, 1);
        assert_eq!(counts[&feed_b].total, 1);
        assert_eq!(counts[&feed_b].unread, 1);
    }

    #[tokio::test]
    async fn test_switch_importance_mixed_states() {
        let db = test_db().await;
        let feed = seed_feed(&db, "https://a.example/feed").await;

        let a = db.insert_message(feed, "A", "", "", 100, "").await.unwrap();
        let b = db.insert_message(feed, "B", "", "", 200, "").await.unwrap();
        db.mark_message_important(a, true).await.unwrap();

        db.switch_messages_importance(&[a, b]).await.unwrap();

        let all = db.fetch_messages("1 = 1").await.unwrap();
        assert!(!bool::from(all.iter().find(|m| m.id == a).unwrap().importance));
        assert!(bool::from(all.iter().find(|m| m.id == b).unwrap().importance));
    }
}
