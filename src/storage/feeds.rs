use anyhow::Result;
use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::FeedRow;

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Load every feed row, recognized formats or not — discriminant
    /// filtering happens during tree assembly so an unknown `kind` is
    /// skipped (not an error). A query failure here is fatal to the load.
    pub async fn load_all_feeds(&self) -> Result<Vec<FeedRow>> {
        let rows = sqlx::query_as::<_, FeedRow>(
            r#"
            SELECT id, category_id, title, url, kind, update_mode, update_interval
            FROM feeds
            ORDER BY id
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Insert a new feed under `category_id`, returning its ID.
    /// Fails on a duplicate source URL (UNIQUE constraint).
    pub async fn insert_feed(
        &self,
        title: &str,
        url: &str,
        kind: i64,
        category_id: i64,
        update_mode: i64,
        update_interval: i64,
    ) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO feeds (category_id, title, url, kind, update_mode, update_interval)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
        "#,
        )
        .bind(category_id)
        .bind(title)
        .bind(url)
        .bind(kind)
        .bind(update_mode)
        .bind(update_interval)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Move a feed into a category (or to the root with the no-parent sentinel).
    pub async fn set_feed_parent(&self, feed_id: i64, category_id: i64) -> Result<()> {
        sqlx::query("UPDATE feeds SET category_id = ? WHERE id = ?")
            .bind(category_id)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Persist a feed's auto-update policy.
    pub async fn set_feed_update_policy(
        &self,
        feed_id: i64,
        update_mode: i64,
        update_interval: i64,
    ) -> Result<()> {
        sqlx::query("UPDATE feeds SET update_mode = ?, update_interval = ? WHERE id = ?")
            .bind(update_mode)
            .bind(update_interval)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Cascade-delete a subtree in a single transaction: messages of the
    /// affected feeds, then the feeds, then the categories. Any failure rolls
    /// the whole deletion back so the caller can leave the in-memory tree
    /// untouched.
    pub async fn delete_subtree(&self, category_ids: &[i64], feed_ids: &[i64]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        if !feed_ids.is_empty() {
            let mut q: QueryBuilder<sqlx::Sqlite> =
                QueryBuilder::new("DELETE FROM messages WHERE feed_id IN (");
            let mut separated = q.separated(", ");
            for id in feed_ids {
                separated.push_bind(id);
            }
            separated.push_unseparated(")");
            q.build().execute(&mut *tx).await?;

            let mut q: QueryBuilder<sqlx::Sqlite> =
                QueryBuilder::new("DELETE FROM feeds WHERE id IN (");
            let mut separated = q.separated(", ");
            for id in feed_ids {
                separated.push_bind(id);
            }
            separated.push_unseparated(")");
            q.build().execute(&mut *tx).await?;
        }

        if !category_ids.is_empty() {
            let mut q: QueryBuilder<sqlx::Sqlite> =
                QueryBuilder::new("DELETE FROM categories WHERE id IN (");
            let mut separated = q.separated(", ");
            for id in category_ids {
                separated.push_bind(id);
            }
            separated.push_unseparated(")");
            q.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::Database;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_load_feed() {
        let db = test_db().await;

        let id = db
            .insert_feed("Blog", "https://example.com/feed.xml", 3, -1, 0, 15)
            .await
            .unwrap();
        assert!(id > 0);

        let feeds = db.load_all_feeds().await.unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].title, "Blog");
        assert_eq!(feeds[0].category_id, -1);
        assert_eq!(feeds[0].kind, 3);
    }

    #[tokio::test]
    async fn test_duplicate_url_rejected() {
        let db = test_db().await;

        db.insert_feed("A", "https://example.com/feed.xml", 3, -1, 0, 15)
            .await
            .unwrap();
        let result = db
            .insert_feed("B", "https://example.com/feed.xml", 3, -1, 0, 15)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_delete_subtree_cascades_messages() {
        let db = test_db().await;

        let cat = db.insert_category("Tech", -1).await.unwrap();
        let feed = db
            .insert_feed("Blog", "https://example.com/feed.xml", 3, cat, 0, 15)
            .await
            .unwrap();
        db.insert_message(feed, "Post", "", "", 1_700_000_000, "")
            .await
            .unwrap();

        db.delete_subtree(&[cat], &[feed]).await.unwrap();

        assert!(db.load_all_categories().await.unwrap().is_empty());
        assert!(db.load_all_feeds().await.unwrap().is_empty());
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }

    #[tokio::test]
    async fn test_delete_subtree_empty_sets_is_noop() {
        let db = test_db().await;
        db.delete_subtree(&[], &[]).await.unwrap();
    }
}
