use anyhow::Result;

use super::schema::Database;
use super::types::CategoryRow;

impl Database {
    // ========================================================================
    // Category Operations
    // ========================================================================

    /// Load every category row. Hierarchy assembly from `parent_id` links is
    /// the tree model's job; a failure here is fatal to the load.
    pub async fn load_all_categories(&self) -> Result<Vec<CategoryRow>> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, parent_id, title FROM categories ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Insert a new category under `parent_id`, returning its ID.
    ///
    /// Fails when a sibling category with the same title already exists
    /// (UNIQUE constraint) — the merge path relies on that.
    pub async fn insert_category(&self, title: &str, parent_id: i64) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            "INSERT INTO categories (parent_id, title) VALUES (?, ?) RETURNING id",
        )
        .bind(parent_id)
        .bind(title)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Re-assign a category to a new parent.
    pub async fn set_category_parent(&self, id: i64, parent_id: i64) -> Result<()> {
        sqlx::query("UPDATE categories SET parent_id = ? WHERE id = ?")
            .bind(parent_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Rename an existing category.
    pub async fn rename_category(&self, id: i64, new_title: &str) -> Result<()> {
        sqlx::query("UPDATE categories SET title = ? WHERE id = ?")
            .bind(new_title)
            .bind(id)
            .execute(&self.pool)
            .await?;
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
    async fn test_insert_category() {
        let db = test_db().await;

        let id = db.insert_category("Tech", -1).await.unwrap();
        assert!(id > 0);

        let categories = db.load_all_categories().await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].title, "Tech");
        assert_eq!(categories[0].parent_id, -1);
    }

    #[tokio::test]
    async fn test_duplicate_sibling_title_rejected() {
        let db = test_db().await;

        db.insert_category("News", -1).await.unwrap();
        let result = db.insert_category("News", -1).await;
        assert!(result.is_err());

        // Same title under a different parent is fine
        let other = db.insert_category("Other", -1).await.unwrap();
        db.insert_category("News", other).await.unwrap();
    }

    #[tokio::test]
    async fn test_set_category_parent() {
        let db = test_db().await;

        let parent = db.insert_category("Parent", -1).await.unwrap();
        let child = db.insert_category("Child", -1).await.unwrap();

        db.set_category_parent(child, parent).await.unwrap();

        let categories = db.load_all_categories().await.unwrap();
        let moved = categories.iter().find(|c| c.id == child).unwrap();
        assert_eq!(moved.parent_id, parent);
    }

    #[tokio::test]
    async fn test_rename_category() {
        let db = test_db().await;

        let id = db.insert_category("Old", -1).await.unwrap();
        db.rename_category(id, "New").await.unwrap();

        let categories = db.load_all_categories().await.unwrap();
        assert_eq!(categories[0].title, "New");
    }
}
