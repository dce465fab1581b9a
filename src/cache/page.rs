//! Paginated reads shared by the HAS_DEGREE table and its mirror.

use rusqlite::{params, Connection};

use crate::cache::{CachePage, CacheReadOptions, CacheSource, CachedConnection};
use crate::error::Result;

/// Column layout of a table holding cache rows.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CacheTable {
    pub name: &'static str,
    pub owner: &'static str,
    pub peer: &'static str,
}

/// Graph-side cache edges.
pub(crate) const HAS_DEGREE: CacheTable = CacheTable {
    name: "has_degree",
    owner: "source_id",
    peer: "target_id",
};

/// Content-store mirror.
pub(crate) const MIRROR: CacheTable = CacheTable {
    name: "user_connections",
    owner: "user_id",
    peer: "connection_id",
};

/// Result of one combined count+fetch.
pub(crate) struct RawPage {
    pub rows: Vec<CachedConnection>,
    /// Rows matching the filter.
    pub total: usize,
    /// Rows stored for the user regardless of filter.
    pub stored: usize,
}

impl RawPage {
    pub(crate) fn into_page(self, opts: &CacheReadOptions, source: CacheSource) -> CachePage {
        let has_more = opts.offset.saturating_add(self.rows.len()) < self.total;
        CachePage {
            connections: self.rows,
            total: self.total,
            has_more,
            source,
        }
    }
}

/// Fetch one page plus its filtered total in a single statement.
///
/// The count subquery is LEFT JOINed to the page so a row carrying the total
/// comes back even when the offset is past the end.
pub(crate) fn read_page(
    conn: &Connection,
    table: CacheTable,
    user_id: &str,
    opts: &CacheReadOptions,
) -> Result<RawPage> {
    let sort = opts.sort_by.column();
    let dir = opts.order.keyword();
    let sql = format!(
        "WITH filtered AS (
            SELECT {peer} AS connection_id, degree, mutuals, is_chat, updated_at
            FROM {table}
            WHERE {owner} = ?1
              AND (?2 IS NULL OR degree = ?2)
              AND (?3 = 0 OR is_chat = 1)
         )
         SELECT t.total, t.stored,
                p.connection_id, p.degree, p.mutuals, p.is_chat, p.updated_at
         FROM (
            SELECT (SELECT COUNT(*) FROM filtered) AS total,
                   (SELECT COUNT(*) FROM {table} WHERE {owner} = ?1) AS stored
         ) t
         LEFT JOIN (
            SELECT * FROM filtered
            ORDER BY {sort} {dir}, connection_id ASC
            LIMIT ?4 OFFSET ?5
         ) p ON 1 = 1
         ORDER BY p.{sort} {dir}, p.connection_id ASC",
        peer = table.peer,
        table = table.name,
        owner = table.owner,
        sort = sort,
        dir = dir,
    );

    let limit = i64::try_from(opts.limit).unwrap_or(i64::MAX);
    let offset = i64::try_from(opts.offset).unwrap_or(i64::MAX);

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![user_id, opts.degree, opts.only_chats, limit, offset])?;

    let mut page = RawPage {
        rows: Vec::new(),
        total: 0,
        stored: 0,
    };
    while let Some(row) = rows.next()? {
        page.total = row.get::<_, usize>(0)?;
        page.stored = row.get::<_, usize>(1)?;
        let Some(connection_id) = row.get::<_, Option<String>>(2)? else {
            continue;
        };
        page.rows.push(CachedConnection {
            connection_id,
            degree: row.get::<_, u32>(3)?,
            mutuals: row.get::<_, u32>(4)?,
            is_chat: row.get::<_, bool>(5)?,
            updated_at: row.get(6)?,
        });
    }
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{SortBy, SortOrder};

    fn mirror_with_rows() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE user_connections (
                user_id TEXT, connection_id TEXT, degree INTEGER, mutuals INTEGER,
                is_chat INTEGER, updated_at TEXT);
             INSERT INTO user_connections VALUES
                ('u', 'a', 1, 4, 1, '2026-01-01T00:00:00Z'),
                ('u', 'b', 2, 1, 0, '2026-01-02T00:00:00Z'),
                ('u', 'c', 2, 7, 0, '2026-01-03T00:00:00Z'),
                ('u', 'd', 3, 0, 0, '2026-01-04T00:00:00Z'),
                ('other', 'z', 1, 0, 1, '2026-01-01T00:00:00Z');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_total_reflects_filter() {
        let conn = mirror_with_rows();
        let opts = CacheReadOptions {
            degree: Some(2),
            limit: 1,
            ..CacheReadOptions::default()
        };
        let page = read_page(&conn, MIRROR, "u", &opts).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.stored, 4);
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0].connection_id, "b");
    }

    #[test]
    fn test_sort_by_mutuals_desc() {
        let conn = mirror_with_rows();
        let opts = CacheReadOptions {
            sort_by: SortBy::Mutuals,
            order: SortOrder::Descending,
            ..CacheReadOptions::default()
        };
        let page = read_page(&conn, MIRROR, "u", &opts).unwrap();
        let ids: Vec<_> = page.rows.iter().map(|r| r.connection_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn test_only_chats() {
        let conn = mirror_with_rows();
        let opts = CacheReadOptions {
            only_chats: true,
            ..CacheReadOptions::default()
        };
        let page = read_page(&conn, MIRROR, "u", &opts).unwrap();
        assert_eq!(page.total, 1);
        assert!(page.rows[0].is_chat);
    }

    #[test]
    fn test_offset_past_end_keeps_total() {
        let conn = mirror_with_rows();
        let opts = CacheReadOptions {
            offset: 10,
            ..CacheReadOptions::default()
        };
        let page = read_page(&conn, MIRROR, "u", &opts).unwrap();
        assert!(page.rows.is_empty());
        assert_eq!(page.total, 4);
    }

    #[test]
    fn test_unknown_user_is_empty() {
        let conn = mirror_with_rows();
        let page = read_page(&conn, MIRROR, "nobody", &CacheReadOptions::all()).unwrap();
        assert!(page.rows.is_empty());
        assert_eq!(page.total, 0);
        assert_eq!(page.stored, 0);
    }
}
