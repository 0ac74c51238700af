use sea_orm_migration::prelude::*;

/// One review per author per title. The API pre-checks before inserting, but
/// only this index actually prevents concurrent duplicate submissions.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();

        conn.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_reviews_title_author_unique ON reviews(title_id, author_id)",
        )
        .await?;

        conn.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_reviews_pub_date ON reviews(pub_date)",
        )
        .await?;

        conn.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_comments_pub_date ON comments(pub_date)",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();

        conn.execute_unprepared("DROP INDEX IF EXISTS idx_comments_pub_date")
            .await?;

        conn.execute_unprepared("DROP INDEX IF EXISTS idx_reviews_pub_date")
            .await?;

        conn.execute_unprepared("DROP INDEX IF EXISTS idx_reviews_title_author_unique")
            .await?;

        Ok(())
    }
}
