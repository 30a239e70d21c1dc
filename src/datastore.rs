use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use indoc::indoc;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, debug_span};

use crate::record::QueryRecord;

/// How many quotes the log keeps; older ones are dropped as new ones are recorded.
pub const MAX_QUOTES: usize = 5;

// -------------------------------------------------------------------------------------------------
// QuoteEntry
// -------------------------------------------------------------------------------------------------
/// What came of a quote request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteOutcome {
    /// A predicted price, rounded to a whole currency unit
    Price(u64),

    /// The message shown to the user when prediction failed
    Error(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteEntry {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub query: QueryRecord,
    pub outcome: QuoteOutcome,
}

// -------------------------------------------------------------------------------------------------
// Datastore
// -------------------------------------------------------------------------------------------------
/// The local quote log: a directory holding a SQLite database of recent quotes.
pub struct Datastore {
    /// The root directory of everything contained in this `Datastore`.
    root_dir: PathBuf,

    /// A connection to the database backing this `Datastore`.
    conn: Connection,
}

impl Datastore {
    /// Create a new datastore at `root_dir` if one does not exist,
    /// or open an existing one if present.
    pub fn create_or_open(root_dir: &Path) -> Result<Self> {
        Self::create(root_dir)
            .or_else(|_e| Self::open(root_dir))
            .with_context(|| format!("Failed to open datastore at {}", root_dir.display()))
    }

    /// Open the existing datastore at `root_dir`.
    pub fn open(root_dir: &Path) -> Result<Self> {
        let db_path = root_dir.join("datastore.db");
        if !db_path.is_file() {
            anyhow::bail!("No datastore database at {}", db_path.display());
        }
        Self::open_db(root_dir, &db_path)
    }

    /// Create a new datastore at `root_dir` and open it.
    pub fn create(root_dir: &Path) -> Result<Self> {
        std::fs::create_dir(root_dir).with_context(|| {
            format!("Failed to create datastore root directory at {}", root_dir.display())
        })?;

        std::fs::write(root_dir.join(".gitignore"), "*\n").with_context(|| {
            format!("Failed to write .gitignore to datastore at {}", root_dir.display())
        })?;

        Self::open_db(root_dir, &root_dir.join("datastore.db"))
    }

    fn open_db(root_dir: &Path, db_path: &Path) -> Result<Self> {
        let conn = Self::new_connection(db_path)
            .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
        let root_dir = root_dir.canonicalize().with_context(|| {
            format!("Failed to canonicalize datastore path at {}", root_dir.display())
        })?;
        let mut ds = Self { root_dir, conn };
        ds.migrate()
            .with_context(|| format!("Failed to migrate database at {}", db_path.display()))?;
        Ok(ds)
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn new_connection(path: &Path) -> Result<Connection> {
        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "wal")?; // https://www.sqlite.org/wal.html
        conn.pragma_update(None, "synchronous", "normal")?; // https://sqlite.org/pragma.html#pragma_synchronous

        Ok(conn)
    }

    fn migrate(&mut self) -> Result<u64> {
        let _span = debug_span!("Datastore::migrate", "{}", self.root_dir.display()).entered();
        let tx = self.conn.transaction()?;

        let user_version: u64 = tx.pragma_query_value(None, "user_version", |r| r.get(0))?;
        if user_version == 0 {
            let new_user_version = user_version + 1;
            debug!(
                "Migrating database schema from version {} to {}",
                user_version, new_user_version
            );
            tx.execute_batch(indoc! {r#"
                create table quotes
                -- One row per quote request. Exactly one of `price` and `error` is non-null.
                (
                    id integer primary key autoincrement,

                    -- RFC 3339, UTC
                    created_at text not null,

                    -- The submitted query record, as JSON
                    query text not null,

                    price integer,
                    error text,

                    check ((price is null) != (error is null))
                );
            "#})?;
            tx.pragma_update(None, "user_version", new_user_version)?;
        }
        tx.commit()?;
        Ok(user_version)
    }

    /// Record a quote, then drop all but the newest `MAX_QUOTES` entries.
    pub fn record_quote(&mut self, query: &QueryRecord, outcome: &QuoteOutcome) -> Result<QuoteEntry> {
        let _span = debug_span!("Datastore::record_quote", "{}", self.root_dir.display()).entered();

        let created_at = Utc::now();
        let query_json = serde_json::to_string(query)?;
        let (price, error) = match outcome {
            QuoteOutcome::Price(p) => (Some(i64::try_from(*p)?), None),
            QuoteOutcome::Error(e) => (None, Some(e.as_str())),
        };

        let tx = self.conn.transaction()?;
        tx.execute(
            "insert into quotes(created_at, query, price, error) values (?, ?, ?, ?)",
            params![created_at.to_rfc3339(), query_json, price, error],
        )?;
        let id = tx.last_insert_rowid();
        let dropped = tx.execute(
            indoc! {r#"
                delete from quotes
                where id not in (select id from quotes order by id desc limit ?)
            "#},
            [MAX_QUOTES as i64],
        )?;
        tx.commit()?;
        debug!("Recorded quote {id}; dropped {dropped} old quotes");

        Ok(QuoteEntry {
            id,
            created_at,
            query: query.clone(),
            outcome: outcome.clone(),
        })
    }

    /// All logged quotes, newest first.
    pub fn quotes(&self) -> Result<Vec<QuoteEntry>> {
        let _span = debug_span!("Datastore::quotes", "{}", self.root_dir.display()).entered();

        let mut stmt = self.conn.prepare_cached(indoc! {r#"
            select id, created_at, query, price, error
            from quotes
            order by id desc
        "#})?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<i64>>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, created_at, query, price, error) = row?;
            let created_at = DateTime::parse_from_rfc3339(&created_at)
                .with_context(|| format!("Bad timestamp on quote {id}"))?
                .with_timezone(&Utc);
            let query = serde_json::from_str(&query)
                .with_context(|| format!("Bad query record on quote {id}"))?;
            let outcome = match (price, error) {
                (Some(p), _) => QuoteOutcome::Price(u64::try_from(p)?),
                (None, e) => QuoteOutcome::Error(e.unwrap_or_default()),
            };
            entries.push(QuoteEntry {
                id,
                created_at,
                query,
                outcome,
            });
        }
        Ok(entries)
    }

    /// Remove a quote from the log, returning whether it was present.
    pub fn remove_quote(&mut self, id: i64) -> Result<bool> {
        let n = self.conn.execute("delete from quotes where id = ?", [id])?;
        Ok(n > 0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;

    fn query(length: f64) -> QueryRecord {
        QueryRecord {
            length: Some(length.into()),
            ..Default::default()
        }
    }

    #[test]
    fn create_then_reopen() -> Result<()> {
        let tmp = TempDir::new()?;
        let dir = tmp.path().join("fanquote.db.d");
        {
            let mut ds = Datastore::create_or_open(&dir)?;
            ds.record_quote(&query(2500.0), &QuoteOutcome::Price(380_000))?;
        }
        assert!(dir.join(".gitignore").is_file());

        let ds = Datastore::create_or_open(&dir)?;
        let quotes = ds.quotes()?;
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].query, query(2500.0));
        assert_eq!(quotes[0].outcome, QuoteOutcome::Price(380_000));
        Ok(())
    }

    #[test]
    fn open_missing_fails() -> Result<()> {
        let tmp = TempDir::new()?;
        assert!(Datastore::open(&tmp.path().join("nope")).is_err());
        Ok(())
    }

    #[test]
    fn keeps_newest_five() -> Result<()> {
        let tmp = TempDir::new()?;
        let mut ds = Datastore::create(&tmp.path().join("ds"))?;
        for i in 1..=7 {
            ds.record_quote(&query(i as f64 * 100.0), &QuoteOutcome::Price(i))?;
        }
        ds.record_quote(&query(800.0), &QuoteOutcome::Error("prediction server unreachable".into()))?;

        let quotes = ds.quotes()?;
        let outcomes: Vec<_> = quotes.iter().map(|q| q.outcome.clone()).collect();
        assert_eq!(
            outcomes,
            vec![
                QuoteOutcome::Error("prediction server unreachable".into()),
                QuoteOutcome::Price(7),
                QuoteOutcome::Price(6),
                QuoteOutcome::Price(5),
                QuoteOutcome::Price(4),
            ]
        );
        Ok(())
    }

    #[test]
    fn remove() -> Result<()> {
        let tmp = TempDir::new()?;
        let mut ds = Datastore::create(&tmp.path().join("ds"))?;
        let a = ds.record_quote(&query(100.0), &QuoteOutcome::Price(1))?;
        let b = ds.record_quote(&query(200.0), &QuoteOutcome::Price(2))?;
        assert!(ds.remove_quote(a.id)?);
        assert!(!ds.remove_quote(a.id)?);
        let ids: Vec<i64> = ds.quotes()?.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![b.id]);
        Ok(())
    }
}
