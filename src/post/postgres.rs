//! PostgreSQL post store.
//!
//! Uses runtime-checked queries so the crate builds without a live
//! database. The schema lives in `migrations/` and is applied on connect.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use crate::error::StoreError;

use super::model::{NewPost, PageWindow, Post, PostFilter, PostPage, PostUpdate};
use super::store::PostStore;

const POST_COLUMNS: &str =
    "id, time_stamp, content, image_path, creator, creator_username, post_avatar";

const PREVIOUS_COLUMNS: &str = "previous.id, previous.time_stamp, previous.content, \
     previous.image_path, previous.creator, previous.creator_username, previous.post_avatar";

#[derive(FromRow)]
struct PostRow {
    id: Uuid,
    time_stamp: i64,
    content: String,
    image_path: String,
    creator: String,
    creator_username: String,
    post_avatar: String,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Post {
            id: row.id,
            timestamp: row.time_stamp,
            content: row.content,
            image_path: row.image_path,
            creator: row.creator,
            creator_username: row.creator_username,
            post_avatar: row.post_avatar,
        }
    }
}

/// Post store backed by a PostgreSQL connection pool.
#[derive(Clone)]
pub struct PgPostStore {
    pool: PgPool,
}

impl PgPostStore {
    /// Wrap an existing pool. The schema must already be migrated.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` and apply pending migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self::new(pool))
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Convert an unsigned window bound into a Postgres BIGINT, clamping huge values.
fn to_bigint(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl PostStore for PgPostStore {
    async fn create(&self, post: NewPost) -> Result<Post, StoreError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            r#"
            INSERT INTO posts (id, time_stamp, content, image_path, creator, creator_username, post_avatar)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(Uuid::now_v7())
        .bind(post.timestamp)
        .bind(&post.content)
        .bind(&post.image_path)
        .bind(&post.creator)
        .bind(&post.creator_username)
        .bind(&post.post_avatar)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn find_by_filter(
        &self,
        filter: &PostFilter,
        window: Option<PageWindow>,
    ) -> Result<PostPage, StoreError> {
        // LIMIT NULL means no limit in Postgres
        let limit: Option<i64> = window.map(|w| to_bigint(w.limit()));
        let offset: i64 = window.map(|w| to_bigint(w.skip())).unwrap_or(0);

        let (rows, total) = match filter {
            PostFilter::All => {
                let rows = sqlx::query_as::<_, PostRow>(&format!(
                    r#"
                    SELECT {POST_COLUMNS}
                    FROM posts
                    ORDER BY time_stamp DESC, id DESC
                    LIMIT $1 OFFSET $2
                    "#
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;

                let total = sqlx::query("SELECT COUNT(*) AS count FROM posts")
                    .fetch_one(&self.pool)
                    .await?
                    .get::<i64, _>("count");

                (rows, total)
            }
            PostFilter::CreatorUsername(username) => {
                let rows = sqlx::query_as::<_, PostRow>(&format!(
                    r#"
                    SELECT {POST_COLUMNS}
                    FROM posts
                    WHERE creator_username = $1
                    ORDER BY time_stamp DESC, id DESC
                    LIMIT $2 OFFSET $3
                    "#
                ))
                .bind(username)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;

                let total =
                    sqlx::query("SELECT COUNT(*) AS count FROM posts WHERE creator_username = $1")
                        .bind(username)
                        .fetch_one(&self.pool)
                        .await?
                        .get::<i64, _>("count");

                (rows, total)
            }
        };

        Ok(PostPage {
            posts: rows.into_iter().map(Post::from).collect(),
            total: u64::try_from(total).unwrap_or(0),
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, StoreError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Post::from))
    }

    async fn update_if_owned(
        &self,
        id: Uuid,
        creator: &str,
        update: PostUpdate,
    ) -> Result<Option<Post>, StoreError> {
        // The row lock taken by `previous` keeps the returned snapshot exact.
        // Rows whose fields would not change are left alone.
        let row = sqlx::query_as::<_, PostRow>(&format!(
            r#"
            WITH previous AS (
                SELECT {POST_COLUMNS}
                FROM posts
                WHERE id = $1 AND creator = $2
                FOR UPDATE
            )
            UPDATE posts AS p
            SET content = $3,
                image_path = $4,
                creator_username = $5,
                post_avatar = COALESCE($6, p.post_avatar)
            FROM previous
            WHERE p.id = previous.id
              AND (p.content, p.image_path, p.creator_username, p.post_avatar)
                  IS DISTINCT FROM ($3, $4, $5, COALESCE($6, p.post_avatar))
            RETURNING {PREVIOUS_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(creator)
        .bind(&update.content)
        .bind(&update.image_path)
        .bind(&update.creator_username)
        .bind(update.post_avatar.as_deref())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Post::from))
    }

    async fn delete_if_owned(&self, id: Uuid, creator: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1 AND creator = $2")
            .bind(id)
            .bind(creator)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let total = sqlx::query("SELECT COUNT(*) AS count FROM posts")
            .fetch_one(&self.pool)
            .await?
            .get::<i64, _>("count");

        Ok(u64::try_from(total).unwrap_or(0))
    }

    async fn image_in_use(&self, image_path: &str) -> Result<bool, StoreError> {
        let in_use = sqlx::query("SELECT EXISTS (SELECT 1 FROM posts WHERE image_path = $1) AS in_use")
            .bind(image_path)
            .fetch_one(&self.pool)
            .await?
            .get::<bool, _>("in_use");

        Ok(in_use)
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
