use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::{debug, info};

use crate::errors::AppError;
use crate::models::{
    Blogmark, Content, ContentMeta, Draft, Entry, Kind, Payload, Quotation, Tag,
};
use crate::store::{ContentStore, PageCursor, Permalink, SearchHit, SearchQuery, TimelineFilter};

/// Postgres-backed content store. Schema lives in `schema.sql`.
#[derive(Clone)]
pub struct PgContentStore {
    pool: PgPool,
}

impl PgContentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn table(kind: Kind) -> &'static str {
    match kind {
        Kind::Entry => "entries",
        Kind::Blogmark => "blogmarks",
        Kind::Quotation => "quotations",
    }
}

fn tag_table(kind: Kind) -> &'static str {
    match kind {
        Kind::Entry => "entry_tags",
        Kind::Blogmark => "blogmark_tags",
        Kind::Quotation => "quotation_tags",
    }
}

/// Kind-specific columns, padded with typed NULLs so every kind decodes
/// into the same [`ContentRow`].
fn payload_columns(kind: Kind) -> &'static str {
    match kind {
        Kind::Entry => {
            "c.title, c.body, \
             NULL::text AS link_url, NULL::text AS link_title, NULL::text AS commentary, \
             NULL::text AS via_url, NULL::text AS via_title, \
             NULL::text AS quotation, NULL::text AS source, NULL::text AS source_url"
        }
        Kind::Blogmark => {
            "NULL::text AS title, NULL::text AS body, \
             c.link_url, c.link_title, c.commentary, c.via_url, c.via_title, \
             NULL::text AS quotation, NULL::text AS source, NULL::text AS source_url"
        }
        Kind::Quotation => {
            "NULL::text AS title, NULL::text AS body, \
             NULL::text AS link_url, NULL::text AS link_title, NULL::text AS commentary, \
             NULL::text AS via_url, NULL::text AS via_title, \
             c.quotation, c.source, c.source_url"
        }
    }
}

fn select_content(kind: Kind) -> String {
    format!(
        r#"
        SELECT c.id, c.created, c.slug, c.metadata, c.import_ref, {columns},
               COALESCE(
                   (SELECT array_agg(t.tag ORDER BY t.tag)
                    FROM {tags} ct JOIN tags t ON t.id = ct.tag_id
                    WHERE ct.content_id = c.id),
                   '{{}}'::text[]
               ) AS tags
        FROM {table} c
        "#,
        columns = payload_columns(kind),
        tags = tag_table(kind),
        table = table(kind),
    )
}

#[derive(Debug, FromRow)]
struct ContentRow {
    id: i64,
    created: DateTime<Utc>,
    slug: String,
    metadata: Value,
    import_ref: Option<String>,
    tags: Vec<String>,
    title: Option<String>,
    body: Option<String>,
    link_url: Option<String>,
    link_title: Option<String>,
    commentary: Option<String>,
    via_url: Option<String>,
    via_title: Option<String>,
    quotation: Option<String>,
    source: Option<String>,
    source_url: Option<String>,
}

impl ContentRow {
    fn into_content(self, kind: Kind) -> Result<Content, AppError> {
        let tags = self
            .tags
            .iter()
            .map(|t| Tag::parse(t))
            .collect::<Result<Vec<_>, _>>()?;
        let payload = match kind {
            Kind::Entry => Payload::Entry(Entry {
                title: self.title.unwrap_or_default(),
                body: self.body.unwrap_or_default(),
            }),
            Kind::Blogmark => Payload::Blogmark(Blogmark {
                link_url: self.link_url.unwrap_or_default(),
                link_title: self.link_title.unwrap_or_default(),
                commentary: self.commentary.unwrap_or_default(),
                via_url: self.via_url,
                via_title: self.via_title,
            }),
            Kind::Quotation => Payload::Quotation(Quotation {
                quotation: self.quotation.unwrap_or_default(),
                source: self.source.unwrap_or_default(),
                source_url: self.source_url,
            }),
        };
        Ok(Content {
            meta: ContentMeta {
                id: self.id,
                created: self.created,
                slug: self.slug,
                tags,
                metadata: self.metadata,
                import_ref: self.import_ref,
            },
            payload,
        })
    }
}

fn into_contents(kind: Kind, rows: Vec<ContentRow>) -> Result<Vec<Content>, AppError> {
    rows.into_iter().map(|row| row.into_content(kind)).collect()
}

/// Unique violations (slug-per-day, `import_ref`) become conflicts; anything
/// else is a storage failure.
fn map_insert_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(db.message().to_string())
        }
        _ => AppError::Database(err),
    }
}

async fn insert_payload(
    tx: &mut Transaction<'_, Postgres>,
    draft: &Draft,
) -> Result<i64, sqlx::Error> {
    match &draft.payload {
        Payload::Entry(entry) => {
            sqlx::query_scalar(
                r#"
                INSERT INTO entries (created, slug, metadata, import_ref, title, body)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id
                "#,
            )
            .bind(draft.created)
            .bind(&draft.slug)
            .bind(&draft.metadata)
            .bind(&draft.import_ref)
            .bind(&entry.title)
            .bind(&entry.body)
            .fetch_one(&mut **tx)
            .await
        }
        Payload::Blogmark(blogmark) => {
            sqlx::query_scalar(
                r#"
                INSERT INTO blogmarks
                    (created, slug, metadata, import_ref,
                     link_url, link_title, commentary, via_url, via_title)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING id
                "#,
            )
            .bind(draft.created)
            .bind(&draft.slug)
            .bind(&draft.metadata)
            .bind(&draft.import_ref)
            .bind(&blogmark.link_url)
            .bind(&blogmark.link_title)
            .bind(&blogmark.commentary)
            .bind(&blogmark.via_url)
            .bind(&blogmark.via_title)
            .fetch_one(&mut **tx)
            .await
        }
        Payload::Quotation(quotation) => {
            sqlx::query_scalar(
                r#"
                INSERT INTO quotations
                    (created, slug, metadata, import_ref, quotation, source, source_url)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id
                "#,
            )
            .bind(draft.created)
            .bind(&draft.slug)
            .bind(&draft.metadata)
            .bind(&draft.import_ref)
            .bind(&quotation.quotation)
            .bind(&quotation.source)
            .bind(&quotation.source_url)
            .fetch_one(&mut **tx)
            .await
        }
    }
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn page(
        &self,
        kind: Kind,
        filter: &TimelineFilter,
        after: Option<PageCursor>,
        limit: usize,
    ) -> Result<Vec<Content>, AppError> {
        let sql = format!(
            r#"
            {select}
            WHERE ($1::text IS NULL OR EXISTS (
                      SELECT 1 FROM {tags} ct JOIN tags t ON t.id = ct.tag_id
                      WHERE ct.content_id = c.id AND t.tag = $1))
              AND ($2::timestamptz IS NULL OR c.created >= $2)
              AND ($3::timestamptz IS NULL OR c.created < $3)
              AND ($4::timestamptz IS NULL OR (c.created, c.id) < ($4, $5::bigint))
            ORDER BY c.created DESC, c.id DESC
            LIMIT $6
            "#,
            select = select_content(kind),
            tags = tag_table(kind),
        );
        let rows = sqlx::query_as::<_, ContentRow>(&sql)
            .bind(filter.tag.as_ref().map(Tag::as_str))
            .bind(filter.since)
            .bind(filter.until)
            .bind(after.map(|c| c.created))
            .bind(after.map(|c| c.id))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        into_contents(kind, rows)
    }

    async fn fetch_by_ids(&self, kind: Kind, ids: &[i64]) -> Result<Vec<Content>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("{} WHERE c.id = ANY($1)", select_content(kind));
        let rows = sqlx::query_as::<_, ContentRow>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        into_contents(kind, rows)
    }

    async fn count_tagged(&self, kind: Kind, tag: &Tag) -> Result<u64, AppError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} ct JOIN tags t ON t.id = ct.tag_id WHERE t.tag = $1",
            tag_table(kind)
        );
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(tag.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn tag_sets(&self, kind: Kind, tag: &Tag) -> Result<Vec<Vec<Tag>>, AppError> {
        let sql = format!(
            r#"
            SELECT array_agg(t2.tag ORDER BY t2.tag)
            FROM {table} c
            JOIN {tags} ct ON ct.content_id = c.id
            JOIN tags t ON t.id = ct.tag_id AND t.tag = $1
            JOIN {tags} ct2 ON ct2.content_id = c.id
            JOIN tags t2 ON t2.id = ct2.tag_id
            GROUP BY c.id, c.created
            ORDER BY c.created DESC, c.id DESC
            "#,
            table = table(kind),
            tags = tag_table(kind),
        );
        let sets: Vec<Vec<String>> = sqlx::query_scalar(&sql)
            .bind(tag.as_str())
            .fetch_all(&self.pool)
            .await?;
        sets.into_iter()
            .map(|set| set.iter().map(|t| Tag::parse(t)).collect::<Result<Vec<_>, _>>())
            .collect()
    }

    async fn permalinks(&self, kind: Kind) -> Result<Vec<Permalink>, AppError> {
        let sql = format!(
            "SELECT created, slug FROM {} ORDER BY created DESC, id DESC",
            table(kind)
        );
        let rows: Vec<(DateTime<Utc>, String)> =
            sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|(created, slug)| Permalink { created, slug })
            .collect())
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, AppError> {
        let branches: Vec<String> = Kind::ALL
            .iter()
            .map(|&kind| {
                format!(
                    r#"
                    SELECT '{kind}'::text AS kind, c.id, c.created,
                           (CASE WHEN $1::text IS NULL THEN 0
                                 ELSE ts_rank(c.search_document, websearch_to_tsquery('english', $1))
                            END)::real AS rank
                    FROM {table} c
                    WHERE ($1::text IS NULL
                           OR c.search_document @@ websearch_to_tsquery('english', $1))
                      AND cardinality($2::text[]) = (
                          SELECT COUNT(DISTINCT t.tag)
                          FROM {tags} ct JOIN tags t ON t.id = ct.tag_id
                          WHERE ct.content_id = c.id AND t.tag = ANY($2))
                    "#,
                    kind = kind.as_str(),
                    table = table(kind),
                    tags = tag_table(kind),
                )
            })
            .collect();
        let sql = format!(
            "SELECT kind, id, created, rank FROM ({}) hits ORDER BY rank DESC, created DESC LIMIT $3",
            branches.join(" UNION ALL ")
        );
        let tags: Vec<&str> = query.tags.iter().map(Tag::as_str).collect();
        let rows: Vec<(String, i64, DateTime<Utc>, f32)> = sqlx::query_as(&sql)
            .bind(query.text.as_deref())
            .bind(&tags)
            .bind(query.limit as i64)
            .fetch_all(&self.pool)
            .await?;
        debug!("Search returned {} hits", rows.len());

        rows.into_iter()
            .map(|(kind, id, created, rank)| -> Result<SearchHit, AppError> {
                Ok(SearchHit {
                    kind: kind.parse()?,
                    id,
                    rank,
                    created,
                })
            })
            .collect()
    }

    async fn insert(&self, draft: Draft) -> Result<Content, AppError> {
        let kind = draft.payload.kind();
        let mut tx = self.pool.begin().await?;

        let id = insert_payload(&mut tx, &draft)
            .await
            .map_err(map_insert_error)?;

        for tag in &draft.tags {
            let tag_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO tags (tag) VALUES ($1)
                ON CONFLICT (tag) DO UPDATE SET tag = EXCLUDED.tag
                RETURNING id
                "#,
            )
            .bind(tag.as_str())
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(&format!(
                "INSERT INTO {} (content_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
                tag_table(kind)
            ))
            .bind(id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;
        }

        let content = draft.into_content(id);
        let components = content.index_components();
        sqlx::query(&format!(
            r#"
            UPDATE {} SET search_document =
                setweight(to_tsvector('english', $1), 'A') ||
                setweight(to_tsvector('english', $2), 'B') ||
                setweight(to_tsvector('english', $3), 'C')
            WHERE id = $4
            "#,
            table(kind)
        ))
        .bind(&components.a)
        .bind(&components.b)
        .bind(&components.c)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!("Inserted {kind} {id} ({})", content.meta.slug);
        Ok(content)
    }
}
