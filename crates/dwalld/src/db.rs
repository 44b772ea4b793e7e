use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use std::time::Duration;

use crate::rules::{Mode, WallpaperRule};

/// SQLite-backed, priority-ordered rule list. One connection per process;
/// WAL plus the busy timeout serialize concurrent access from the CLI and
/// the daemon.
pub struct RuleStore {
    conn: Connection,
}

impl RuleStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create SQLite directory: {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database: {}", path.display()))?;
        Self::init(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory().context("failed to open in-memory database")?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))
            .context("failed to set busy timeout")?;

        conn.execute_batch(
            "\
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            CREATE TABLE IF NOT EXISTS rules (
              position INTEGER PRIMARY KEY,
              name TEXT NOT NULL,
              mode TEXT NOT NULL,
              selector TEXT NOT NULL,
              image TEXT NOT NULL
            );",
        )
        .context("failed to initialize schema")?;

        Ok(Self { conn })
    }

    /// Upserts by position.
    pub fn insert_or_replace(&self, rule: &WallpaperRule) -> Result<()> {
        self.conn
            .execute(
                "\
                INSERT OR REPLACE INTO rules (position, name, mode, selector, image)
                VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    rule.position,
                    rule.name,
                    rule.mode.as_str(),
                    rule.selector,
                    rule.image,
                ],
            )
            .context("failed to upsert rule")?;
        Ok(())
    }

    /// Clears and rewrites the whole list in one transaction, so a failed
    /// rewrite rolls back to the prior state instead of leaving the store
    /// half-empty. Used after reorder and delete to keep positions dense.
    pub fn replace_all(&mut self, rules: &[WallpaperRule]) -> Result<()> {
        let tx = self
            .conn
            .transaction()
            .context("failed to start replace_all transaction")?;

        tx.execute("DELETE FROM rules", [])
            .context("failed to clear rules")?;

        for rule in rules {
            tx.execute(
                "\
                INSERT INTO rules (position, name, mode, selector, image)
                VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    rule.position,
                    rule.name,
                    rule.mode.as_str(),
                    rule.selector,
                    rule.image,
                ],
            )
            .with_context(|| format!("failed to insert rule at position {}", rule.position))?;
        }

        tx.commit().context("failed to commit replace_all")?;
        Ok(())
    }

    /// Rules in ascending position order.
    pub fn list_all(&self) -> Result<Vec<WallpaperRule>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT position, name, mode, selector, image FROM rules ORDER BY position ASC",
            )
            .context("failed to prepare rule query")?;

        let rows = stmt
            .query_map([], |row| {
                Ok(WallpaperRule {
                    position: row.get(0)?,
                    name: row.get(1)?,
                    mode: Mode::from_db(&row.get::<_, String>(2)?),
                    selector: row.get(3)?,
                    image: row.get(4)?,
                })
            })
            .context("failed to query rules")?;

        let mut rules = Vec::new();
        for row in rows {
            rules.push(row.context("failed to read rule row")?);
        }
        Ok(rules)
    }

    /// Deletes one entry. The caller renumbers the survivors and calls
    /// `replace_all` so positions stay dense.
    pub fn remove(&self, rule: &WallpaperRule) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM rules WHERE position = ?1",
                params![rule.position],
            )
            .context("failed to delete rule")?;
        Ok(())
    }
}
