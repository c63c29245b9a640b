//! Postgres-backed [`BibStore`] implementation.
//!
//! Expected schema (abridged): a `records` table with `text[]` columns for
//! the composite fields and a GIN index on `identifiers`; canonical
//! `identifiers (authority, value unique)` and `links (url unique)` tables;
//! a `works` table holding the serialized aggregate as `jsonb` alongside the
//! columns the merge query needs; and a `work_identifiers` join table.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::error::{ErrorKind, FrbrError, FrbrResult};
use crate::frbr_error;
use crate::store::{BibStore, MatchedRecord};
use crate::types::{
    FrbrStatus, Identifier, IdentifierId, Link, LinkId, Record, RecordId, RecordState, StaleWork,
    Work, WorkId,
};

/// Production store backed by a Postgres connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wraps an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a store with a lazily-connecting pool.
    ///
    /// Connections are established on first use, so an unreachable database
    /// surfaces as a query error rather than a construction error.
    pub fn connect_lazy(url: &str, max_connections: u32) -> FrbrResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(url)
            .map_err(|err| {
                frbr_error!(
                    ErrorKind::ConfigError,
                    "Invalid Postgres connection url",
                    source: err
                )
            })?;

        Ok(Self { pool })
    }
}

fn query_failed(err: sqlx::Error) -> FrbrError {
    frbr_error!(
        ErrorKind::StoreQueryFailed,
        "Postgres query failed",
        source: err
    )
}

fn transaction_failed(err: sqlx::Error) -> FrbrError {
    frbr_error!(
        ErrorKind::StoreTransactionFailed,
        "Postgres transaction failed",
        source: err
    )
}

fn frbr_status_from_str(raw: &str) -> FrbrResult<FrbrStatus> {
    match raw {
        "to_do" => Ok(FrbrStatus::ToDo),
        "in_progress" => Ok(FrbrStatus::InProgress),
        "complete" => Ok(FrbrStatus::Complete),
        other => Err(frbr_error!(
            ErrorKind::InvalidData,
            "Unknown frbr status value",
            other
        )),
    }
}

fn record_state_from_str(raw: &str) -> FrbrResult<RecordState> {
    match raw {
        "ingested" => Ok(RecordState::Ingested),
        "files_saved" => Ok(RecordState::FilesSaved),
        "embellished" => Ok(RecordState::Embellished),
        "clustered" => Ok(RecordState::Clustered),
        "complete" => Ok(RecordState::Complete),
        other => Err(frbr_error!(
            ErrorKind::InvalidData,
            "Unknown record state value",
            other
        )),
    }
}

fn record_from_row(row: &PgRow) -> FrbrResult<Record> {
    let frbr_status: String = row.try_get("frbr_status").map_err(query_failed)?;
    let state: String = row.try_get("state").map_err(query_failed)?;

    let get = |column: &str| -> FrbrResult<Vec<String>> {
        row.try_get::<Vec<String>, _>(column).map_err(query_failed)
    };

    Ok(Record {
        id: Some(row.try_get::<RecordId, _>("id").map_err(query_failed)?),
        uuid: row.try_get("uuid").map_err(query_failed)?,
        source: row.try_get("source").map_err(query_failed)?,
        source_id: row.try_get("source_id").map_err(query_failed)?,
        title: row.try_get("title").map_err(query_failed)?,
        alternative: get("alternative")?,
        medium: row.try_get("medium").map_err(query_failed)?,
        is_part_of: get("is_part_of")?,
        has_version: get("has_version")?,
        identifiers: get("identifiers")?,
        authors: get("authors")?,
        contributors: get("contributors")?,
        publisher: get("publisher")?,
        spatial: row.try_get("spatial").map_err(query_failed)?,
        subjects: get("subjects")?,
        dates: get("dates")?,
        languages: get("languages")?,
        abstract_text: row.try_get("abstract").map_err(query_failed)?,
        table_of_contents: row.try_get("table_of_contents").map_err(query_failed)?,
        extent: row.try_get("extent").map_err(query_failed)?,
        requires: get("requires")?,
        has_part: get("has_part")?,
        coverage: get("coverage")?,
        publisher_project_source: row
            .try_get("publisher_project_source")
            .map_err(query_failed)?,
        cluster_status: row.try_get("cluster_status").map_err(query_failed)?,
        frbr_status: frbr_status_from_str(&frbr_status)?,
        state: record_state_from_str(&state)?,
        date_created: row.try_get("date_created").map_err(query_failed)?,
        date_modified: row.try_get("date_modified").map_err(query_failed)?,
    })
}

/// Collects every identifier in the work into flat `(authority, value)`
/// columns for a single `unnest` upsert.
fn identifier_columns(work: &Work) -> (Vec<String>, Vec<String>) {
    let mut authorities = Vec::new();
    let mut values = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    let mut push = |identifier: &Identifier| {
        if seen.insert(identifier.key()) {
            authorities.push(identifier.authority.clone());
            values.push(identifier.value.clone());
        }
    };

    for identifier in &work.identifiers {
        push(identifier);
    }
    for edition in &work.editions {
        for identifier in &edition.identifiers {
            push(identifier);
        }
        for item in &edition.items {
            for identifier in &item.identifiers {
                push(identifier);
            }
        }
    }

    (authorities, values)
}

fn link_columns(work: &Work) -> (Vec<String>, Vec<String>, Vec<serde_json::Value>) {
    let mut urls = Vec::new();
    let mut media_types = Vec::new();
    let mut flags = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    let mut push = |link: &Link| {
        if seen.insert(link.url.clone()) {
            urls.push(link.url.clone());
            media_types.push(link.media_type.clone());
            flags.push(link.flags.clone());
        }
    };

    for edition in &work.editions {
        for link in &edition.links {
            push(link);
        }
        for item in &edition.items {
            for link in &item.links {
                push(link);
            }
        }
    }

    (urls, media_types, flags)
}

fn assign_identifier_ids(work: &mut Work, ids: &HashMap<(String, String), IdentifierId>) {
    let assign = |identifiers: &mut Vec<Identifier>| {
        let mut seen: HashSet<(String, String)> = HashSet::new();
        identifiers.retain(|identifier| seen.insert(identifier.key()));
        for identifier in identifiers {
            identifier.id = ids.get(&identifier.key()).copied();
        }
    };

    assign(&mut work.identifiers);
    for edition in &mut work.editions {
        assign(&mut edition.identifiers);
        for item in &mut edition.items {
            assign(&mut item.identifiers);
        }
    }
}

fn assign_link_ids(work: &mut Work, ids: &HashMap<String, LinkId>) {
    for edition in &mut work.editions {
        for link in &mut edition.links {
            link.id = ids.get(&link.url).copied();
        }
        for item in &mut edition.items {
            for link in &mut item.links {
                link.id = ids.get(&link.url).copied();
            }
        }
    }
}

/// Identifier ids participating in the merge query: work-level and
/// edition-level rows, not item-level ones.
fn merge_identifier_ids(work: &Work) -> Vec<IdentifierId> {
    let ids: HashSet<IdentifierId> = work
        .identifiers
        .iter()
        .chain(work.editions.iter().flat_map(|e| e.identifiers.iter()))
        .filter_map(|identifier| identifier.id)
        .collect();

    ids.into_iter().collect()
}

impl BibStore for PgStore {
    async fn get_records(&self, ids: &[RecordId]) -> FrbrResult<Vec<Record>> {
        let rows = sqlx::query(
            r#"
            select id, uuid, source, source_id, title, alternative, medium,
                   is_part_of, has_version, identifiers, authors, contributors,
                   publisher, spatial, subjects, dates, languages, abstract,
                   table_of_contents, extent, requires, has_part, coverage,
                   publisher_project_source, cluster_status, frbr_status,
                   state, date_created, date_modified
            from records
            where id = any($1::bigint[])
            order by id
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        rows.iter().map(record_from_row).collect()
    }

    async fn match_identifiers(
        &self,
        identifiers: &[String],
        exclude: &[RecordId],
    ) -> FrbrResult<Vec<MatchedRecord>> {
        let rows = sqlx::query(
            r#"
            select id, title, identifiers
            from records
            where identifiers && $1::text[]
              and not (id = any($2::bigint[]))
              and title is not null
            "#,
        )
        .bind(identifiers)
        .bind(exclude)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        rows.iter()
            .map(|row| {
                Ok(MatchedRecord {
                    id: row.try_get("id").map_err(query_failed)?,
                    title: row.try_get("title").map_err(query_failed)?,
                    identifiers: row.try_get("identifiers").map_err(query_failed)?,
                })
            })
            .collect()
    }

    async fn save_clustered_work(
        &self,
        work: &mut Work,
        record_ids: &[RecordId],
    ) -> FrbrResult<Vec<StaleWork>> {
        let mut tx = self.pool.begin().await.map_err(transaction_failed)?;

        // Identifier upsert. The no-op update makes conflicting rows appear
        // in `returning`, which a plain `do nothing` would not.
        let (authorities, values) = identifier_columns(work);
        let identifier_rows = sqlx::query(
            r#"
            insert into identifiers (authority, value)
            select authority, value
            from unnest($1::text[], $2::text[]) as t(authority, value)
            on conflict (authority, value)
            do update set authority = excluded.authority
            returning id, authority, value
            "#,
        )
        .bind(&authorities)
        .bind(&values)
        .fetch_all(&mut *tx)
        .await
        .map_err(query_failed)?;

        let mut identifier_ids: HashMap<(String, String), IdentifierId> = HashMap::new();
        for row in &identifier_rows {
            let authority: String = row.try_get("authority").map_err(query_failed)?;
            let value: String = row.try_get("value").map_err(query_failed)?;
            let id: IdentifierId = row.try_get("id").map_err(query_failed)?;
            identifier_ids.insert((authority, value), id);
        }
        assign_identifier_ids(work, &identifier_ids);

        // Link upsert, deduplicated by exact url.
        let (urls, media_types, flags) = link_columns(work);
        let link_rows = sqlx::query(
            r#"
            insert into links (url, media_type, flags)
            select url, media_type, flags
            from unnest($1::text[], $2::text[], $3::jsonb[]) as t(url, media_type, flags)
            on conflict (url)
            do update set media_type = excluded.media_type, flags = excluded.flags
            returning id, url
            "#,
        )
        .bind(&urls)
        .bind(&media_types)
        .bind(&flags)
        .fetch_all(&mut *tx)
        .await
        .map_err(query_failed)?;

        let mut link_ids: HashMap<String, LinkId> = HashMap::new();
        for row in &link_rows {
            let url: String = row.try_get("url").map_err(query_failed)?;
            let id: LinkId = row.try_get("id").map_err(query_failed)?;
            link_ids.insert(url, id);
        }
        assign_link_ids(work, &link_ids);

        // Works sharing an identifier compete for survivor; the oldest
        // creation timestamp wins and its identity is adopted.
        let merge_ids = merge_identifier_ids(work);
        let matches = sqlx::query(
            r#"
            select distinct w.id, w.uuid, w.date_created
            from works w
            join work_identifiers wi on wi.work_id = w.id
            where wi.identifier_id = any($1::bigint[])
            "#,
        )
        .bind(&merge_ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(query_failed)?;

        let mut matched: Vec<(WorkId, Uuid, DateTime<Utc>)> = matches
            .iter()
            .map(|row| {
                Ok((
                    row.try_get("id").map_err(query_failed)?,
                    row.try_get("uuid").map_err(query_failed)?,
                    row.try_get("date_created").map_err(query_failed)?,
                ))
            })
            .collect::<FrbrResult<_>>()?;
        matched.sort_by_key(|(id, _, created)| (*created, *id));

        let stale: Vec<StaleWork> = if let Some((id, uuid, created)) = matched.first().copied() {
            work.id = Some(id);
            work.uuid = uuid;
            work.date_created = created;

            matched[1..]
                .iter()
                .map(|(id, uuid, _)| StaleWork {
                    id: *id,
                    uuid: *uuid,
                })
                .collect()
        } else {
            Vec::new()
        };

        let payload = serde_json::to_value(&*work).map_err(|err| {
            frbr_error!(
                ErrorKind::ConversionError,
                "Failed to serialize work payload",
                source: err
            )
        })?;

        let work_id = match work.id {
            Some(id) => {
                sqlx::query(
                    r#"
                    update works
                    set title = $1, sort_title = $2, payload = $3, date_modified = now()
                    where id = $4
                    "#,
                )
                .bind(&work.title)
                .bind(&work.sort_title)
                .bind(&payload)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(query_failed)?;

                id
            }
            None => {
                let id: WorkId = sqlx::query_scalar(
                    r#"
                    insert into works (uuid, date_created, title, sort_title, payload)
                    values ($1, $2, $3, $4, $5)
                    returning id
                    "#,
                )
                .bind(work.uuid)
                .bind(work.date_created)
                .bind(&work.title)
                .bind(&work.sort_title)
                .bind(&payload)
                .fetch_one(&mut *tx)
                .await
                .map_err(query_failed)?;

                work.id = Some(id);
                id
            }
        };

        sqlx::query("delete from work_identifiers where work_id = $1")
            .bind(work_id)
            .execute(&mut *tx)
            .await
            .map_err(query_failed)?;

        sqlx::query(
            r#"
            insert into work_identifiers (work_id, identifier_id)
            select $1, identifier_id
            from unnest($2::bigint[]) as t(identifier_id)
            "#,
        )
        .bind(work_id)
        .bind(&merge_ids)
        .execute(&mut *tx)
        .await
        .map_err(query_failed)?;

        sqlx::query(
            r#"
            update records
            set cluster_status = true,
                frbr_status = 'complete',
                state = 'clustered',
                date_modified = now()
            where id = any($1::bigint[])
            "#,
        )
        .bind(record_ids)
        .execute(&mut *tx)
        .await
        .map_err(query_failed)?;

        tx.commit().await.map_err(transaction_failed)?;

        Ok(stale)
    }

    async fn delete_works(&self, ids: &[WorkId]) -> FrbrResult<()> {
        let mut tx = self.pool.begin().await.map_err(transaction_failed)?;

        sqlx::query("delete from work_identifiers where work_id = any($1::bigint[])")
            .bind(ids)
            .execute(&mut *tx)
            .await
            .map_err(query_failed)?;

        sqlx::query("delete from works where id = any($1::bigint[])")
            .bind(ids)
            .execute(&mut *tx)
            .await
            .map_err(query_failed)?;

        tx.commit().await.map_err(transaction_failed)?;

        Ok(())
    }
}
