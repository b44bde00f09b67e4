//! SQLite reference backend
//!
//! Implements the order backend and catalog search over a single SQLite
//! file, so the editor can run end-to-end without a live server. The
//! chapter-grouped blob served by `reload` is assembled the same way the
//! production service computes it: chapters and sections in sequence
//! order, line subtotals rederived from quantity × unit price.

use super::traits::{
    CatalogSearch, Category, LineUpdate, OrderBackend, OrderId, Product, ProductQuery,
    RemoteError, RemoteResult,
};
use crate::normalize;
use crate::order::{Chapter, ChapterTree, Line, LineId, Section, SectionKey};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// Search results are capped when the query does not say otherwise.
const DEFAULT_SEARCH_LIMIT: usize = 100;

/// SQLite-backed order store and product catalog.
///
/// Thread-safe via an internal mutex on the connection.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open or create a backend database at the given path.
    pub fn open(path: impl AsRef<Path>) -> RemoteResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory backend (useful for testing).
    pub fn open_in_memory() -> RemoteResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> RemoteResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                parent_id INTEGER REFERENCES categories(id)
            );

            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                code TEXT,
                list_price REAL NOT NULL DEFAULT 0,
                category_id INTEGER REFERENCES categories(id),
                saleable INTEGER NOT NULL DEFAULT 1
            );

            CREATE INDEX IF NOT EXISTS idx_products_category
                ON products(category_id);

            CREATE TABLE IF NOT EXISTS orders (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chapters (
                id INTEGER PRIMARY KEY,
                order_id INTEGER NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                sequence INTEGER NOT NULL DEFAULT 0,
                UNIQUE (order_id, name)
            );

            CREATE TABLE IF NOT EXISTS sections (
                id INTEGER PRIMARY KEY,
                chapter_id INTEGER NOT NULL REFERENCES chapters(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                sequence INTEGER NOT NULL DEFAULT 0,
                category_id INTEGER REFERENCES categories(id),
                conditions TEXT,
                locked INTEGER NOT NULL DEFAULT 0,
                UNIQUE (chapter_id, name)
            );

            CREATE TABLE IF NOT EXISTS lines (
                id INTEGER PRIMARY KEY,
                section_id INTEGER NOT NULL REFERENCES sections(id) ON DELETE CASCADE,
                product_id INTEGER REFERENCES products(id),
                name TEXT NOT NULL,
                quantity REAL NOT NULL DEFAULT 0,
                price_unit REAL NOT NULL DEFAULT 0,
                sequence INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chapters_order
                ON chapters(order_id, sequence);
            CREATE INDEX IF NOT EXISTS idx_sections_chapter
                ON sections(chapter_id, sequence);
            CREATE INDEX IF NOT EXISTS idx_lines_section
                ON lines(section_id, sequence);

            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    // === Catalog administration ===

    pub fn insert_category(&self, name: &str, parent: Option<i64>) -> RemoteResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO categories (name, parent_id) VALUES (?1, ?2)",
            params![name, parent],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_product(
        &self,
        name: &str,
        code: Option<&str>,
        list_price: f64,
        category: Option<i64>,
    ) -> RemoteResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO products (name, code, list_price, category_id) VALUES (?1, ?2, ?3, ?4)",
            params![name, code, list_price, category],
        )?;
        Ok(conn.last_insert_rowid())
    }

    // === Order administration ===

    pub fn create_order(&self, name: &str) -> RemoteResult<OrderId> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO orders (name, created_at) VALUES (?1, ?2)",
            params![name, Utc::now().to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn create_chapter(&self, order: OrderId, name: &str) -> RemoteResult<i64> {
        let conn = self.conn.lock().unwrap();
        Self::ensure_order(&conn, order)?;
        let sequence: i64 = conn.query_row(
            "SELECT COALESCE(MAX(sequence), 0) + 1 FROM chapters WHERE order_id = ?1",
            params![order],
            |row| row.get(0),
        )?;
        conn.execute(
            "INSERT INTO chapters (order_id, name, sequence) VALUES (?1, ?2, ?3)",
            params![order, name, sequence],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn create_section(
        &self,
        order: OrderId,
        key: &SectionKey,
        category: Option<i64>,
        locked: bool,
    ) -> RemoteResult<i64> {
        let conn = self.conn.lock().unwrap();
        let chapter: i64 = conn
            .query_row(
                "SELECT id FROM chapters WHERE order_id = ?1 AND name = ?2",
                params![order, key.chapter],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| {
                RemoteError::Rejected(format!("chapter '{}' does not exist", key.chapter))
            })?;
        let sequence: i64 = conn.query_row(
            "SELECT COALESCE(MAX(sequence), 0) + 1 FROM sections WHERE chapter_id = ?1",
            params![chapter],
            |row| row.get(0),
        )?;
        conn.execute(
            "INSERT INTO sections (chapter_id, name, sequence, category_id, locked)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![chapter, key.section, sequence, category, locked],
        )?;
        Ok(conn.last_insert_rowid())
    }

    // === Internal lookups ===

    fn ensure_order(conn: &Connection, order: OrderId) -> RemoteResult<()> {
        let exists: Option<i64> = conn
            .query_row(
                "SELECT id FROM orders WHERE id = ?1",
                params![order],
                |row| row.get(0),
            )
            .optional()?;
        match exists {
            Some(_) => Ok(()),
            None => Err(RemoteError::OrderNotFound(order)),
        }
    }

    /// Resolve a compound key to `(section_id, locked)`.
    fn section_row(
        conn: &Connection,
        order: OrderId,
        key: &SectionKey,
    ) -> RemoteResult<(i64, bool)> {
        conn.query_row(
            "SELECT s.id, s.locked FROM sections s
             JOIN chapters c ON s.chapter_id = c.id
             WHERE c.order_id = ?1 AND c.name = ?2 AND s.name = ?3",
            params![order, key.chapter, key.section],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
        .ok_or_else(|| RemoteError::SectionNotFound(key.to_string()))
    }

    /// The section enclosing a line, as `(locked,)` — used to enforce the
    /// locked rule on the server side as well.
    fn line_section_locked(conn: &Connection, line: LineId) -> RemoteResult<bool> {
        conn.query_row(
            "SELECT s.locked FROM lines l JOIN sections s ON l.section_id = s.id
             WHERE l.id = ?1",
            params![line.raw()],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(RemoteError::LineNotFound(line))
    }

    /// Assemble the chapter-grouped tree for an order straight from the
    /// tables, in sequence order.
    fn grouped_tree(conn: &Connection, order: OrderId) -> RemoteResult<ChapterTree> {
        let mut tree = ChapterTree::new();

        let mut chapters_stmt = conn.prepare(
            "SELECT id, name FROM chapters WHERE order_id = ?1 ORDER BY sequence, id",
        )?;
        let chapter_rows: Vec<(i64, String)> = chapters_stmt
            .query_map(params![order], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<_, _>>()?;

        let mut sections_stmt = conn.prepare(
            "SELECT id, name, category_id, conditions, locked FROM sections
             WHERE chapter_id = ?1 ORDER BY sequence, id",
        )?;
        let mut lines_stmt = conn.prepare(
            "SELECT id, name, quantity, price_unit FROM lines
             WHERE section_id = ?1 ORDER BY sequence, id",
        )?;

        for (chapter_id, chapter_name) in chapter_rows {
            let mut chapter = Chapter::new(chapter_name);

            let section_rows: Vec<(i64, String, Option<i64>, Option<String>, bool)> =
                sections_stmt
                    .query_map(params![chapter_id], |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                        ))
                    })?
                    .collect::<Result<_, _>>()?;

            for (section_id, name, category_id, conditions, locked) in section_rows {
                let mut section = Section::new(name);
                section.category_id = category_id;
                section.conditions = conditions;
                section.locked = locked;

                let line_rows: Vec<(i64, String, f64, f64)> = lines_stmt
                    .query_map(params![section_id], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                    })?
                    .collect::<Result<_, _>>()?;
                for (id, name, quantity, price_unit) in line_rows {
                    section
                        .lines
                        .push(Line::new(LineId::new(id), name, quantity, price_unit));
                }

                chapter.sections.push(section);
            }

            chapter.total = chapter.computed_total();
            tree.chapters.push(chapter);
        }

        Ok(tree)
    }
}

#[async_trait]
impl OrderBackend for SqliteBackend {
    async fn add_line(
        &self,
        order: OrderId,
        key: &SectionKey,
        product: i64,
        quantity: f64,
    ) -> RemoteResult<LineId> {
        let conn = self.conn.lock().unwrap();
        Self::ensure_order(&conn, order)?;
        let (section_id, locked) = Self::section_row(&conn, order, key)?;
        if locked {
            return Err(RemoteError::Rejected(format!("section {} is locked", key)));
        }
        if quantity < 0.0 {
            return Err(RemoteError::Rejected(
                "quantity must be zero or greater".into(),
            ));
        }

        let (name, code, list_price): (String, Option<String>, f64) = conn
            .query_row(
                "SELECT name, code, list_price FROM products WHERE id = ?1 AND saleable = 1",
                params![product],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?
            .ok_or(RemoteError::ProductNotFound(product))?;

        let display_name = match code {
            Some(code) => format!("[{}] {}", code, name),
            None => name,
        };
        let sequence: i64 = conn.query_row(
            "SELECT COALESCE(MAX(sequence), 0) + 1 FROM lines WHERE section_id = ?1",
            params![section_id],
            |row| row.get(0),
        )?;
        conn.execute(
            "INSERT INTO lines (section_id, product_id, name, quantity, price_unit, sequence, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                section_id,
                product,
                display_name,
                quantity,
                list_price,
                sequence,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(LineId::new(conn.last_insert_rowid()))
    }

    async fn update_line(&self, line: LineId, update: &LineUpdate) -> RemoteResult<()> {
        if update.quantity < 0.0 || update.unit_price < 0.0 {
            return Err(RemoteError::Rejected(
                "quantity and unit price must be zero or greater".into(),
            ));
        }
        let conn = self.conn.lock().unwrap();
        if Self::line_section_locked(&conn, line)? {
            return Err(RemoteError::Rejected("line belongs to a locked section".into()));
        }
        let affected = conn.execute(
            "UPDATE lines SET name = ?1, quantity = ?2, price_unit = ?3 WHERE id = ?4",
            params![update.name, update.quantity, update.unit_price, line.raw()],
        )?;
        if affected == 0 {
            return Err(RemoteError::LineNotFound(line));
        }
        Ok(())
    }

    async fn delete_line(&self, line: LineId) -> RemoteResult<()> {
        let conn = self.conn.lock().unwrap();
        if Self::line_section_locked(&conn, line)? {
            return Err(RemoteError::Rejected("line belongs to a locked section".into()));
        }
        let affected = conn.execute("DELETE FROM lines WHERE id = ?1", params![line.raw()])?;
        if affected == 0 {
            return Err(RemoteError::LineNotFound(line));
        }
        Ok(())
    }

    async fn update_section_text(
        &self,
        order: OrderId,
        key: &SectionKey,
        text: &str,
    ) -> RemoteResult<()> {
        let conn = self.conn.lock().unwrap();
        Self::ensure_order(&conn, order)?;
        let (section_id, _locked) = Self::section_row(&conn, order, key)?;
        conn.execute(
            "UPDATE sections SET conditions = ?1 WHERE id = ?2",
            params![text, section_id],
        )?;
        Ok(())
    }

    async fn reload(&self, order: OrderId) -> RemoteResult<String> {
        let conn = self.conn.lock().unwrap();
        Self::ensure_order(&conn, order)?;
        let tree = Self::grouped_tree(&conn, order)?;
        Ok(normalize::to_raw(&tree))
    }
}

#[async_trait]
impl CatalogSearch for SqliteBackend {
    async fn search_products(&self, query: &ProductQuery) -> RemoteResult<Vec<Product>> {
        let conn = self.conn.lock().unwrap();

        let mut sql = String::from(
            "SELECT id, name, code, list_price, category_id FROM products WHERE saleable = 1",
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref name) = query.name {
            sql.push_str(" AND name LIKE ?");
            params_vec.push(Box::new(format!("%{}%", name)));
        }
        if let Some(category) = query.category {
            sql.push_str(" AND category_id = ?");
            params_vec.push(Box::new(category));
        }
        sql.push_str(" ORDER BY name");
        sql.push_str(&format!(
            " LIMIT {}",
            query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT)
        ));

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|b| b.as_ref()).collect();

        let rows = stmt.query_map(params_refs.as_slice(), |row| {
            Ok(Product {
                id: row.get(0)?,
                name: row.get(1)?,
                code: row.get(2)?,
                list_price: row.get(3)?,
                category_id: row.get(4)?,
            })
        })?;

        let mut products = Vec::new();
        for row in rows {
            products.push(row?);
        }
        Ok(products)
    }

    async fn search_categories(&self, query: Option<&str>) -> RemoteResult<Vec<Category>> {
        let conn = self.conn.lock().unwrap();

        let mut sql = String::from(
            "SELECT c.id, c.name, c.parent_id,
                    (SELECT COUNT(*) FROM products p WHERE p.category_id = c.id)
             FROM categories c",
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(name) = query {
            sql.push_str(" WHERE c.name LIKE ?");
            params_vec.push(Box::new(format!("%{}%", name)));
        }
        sql.push_str(" ORDER BY c.name");

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|b| b.as_ref()).collect();

        let rows = stmt.query_map(params_refs.as_slice(), |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
                parent_id: row.get(2)?,
                product_count: row.get::<_, i64>(3)? as usize,
            })
        })?;

        let mut categories = Vec::new();
        for row in rows {
            categories.push(row?);
        }
        Ok(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_backend() -> (SqliteBackend, OrderId) {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let cat = backend.insert_category("Electrical", None).unwrap();
        backend
            .insert_product("Cable 2.5mm", Some("CAB-25"), 1.2, Some(cat))
            .unwrap();
        backend
            .insert_product("Switchboard", None, 450.0, Some(cat))
            .unwrap();

        let order = backend.create_order("S00042").unwrap();
        backend.create_chapter(order, "Obra Civil").unwrap();
        backend
            .create_section(
                order,
                &SectionKey::new("Obra Civil", "Instalación"),
                Some(cat),
                false,
            )
            .unwrap();
        (backend, order)
    }

    #[tokio::test]
    async fn reload_of_empty_order_is_parseable() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let order = backend.create_order("S00001").unwrap();
        let raw = backend.reload(order).await.unwrap();
        assert!(normalize::parse(Some(&raw)).is_empty());
    }

    #[tokio::test]
    async fn reload_of_unknown_order_fails() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let err = backend.reload(999).await.unwrap_err();
        assert!(matches!(err, RemoteError::OrderNotFound(999)));
    }

    #[tokio::test]
    async fn add_line_snapshots_list_price_and_code() {
        let (backend, order) = seeded_backend();
        let key = SectionKey::new("Obra Civil", "Instalación");

        let line = backend.add_line(order, &key, 1, 3.0).await.unwrap();
        let raw = backend.reload(order).await.unwrap();
        let tree = normalize::parse(Some(&raw));

        let found = tree.find_line(line).unwrap();
        assert_eq!(found.line.name, "[CAB-25] Cable 2.5mm");
        assert_eq!(found.line.quantity, 3.0);
        assert_eq!(found.line.unit_price, 1.2);
        assert_eq!(found.line.subtotal, 3.6);
        assert_eq!(tree.chapter("Obra Civil").unwrap().total, 3.6);
    }

    #[tokio::test]
    async fn add_line_rejects_unknown_targets() {
        let (backend, order) = seeded_backend();

        let err = backend
            .add_line(order, &SectionKey::new("Obra Civil", "Nope"), 1, 1.0)
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::SectionNotFound(_)));

        let err = backend
            .add_line(order, &SectionKey::new("Obra Civil", "Instalación"), 777, 1.0)
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::ProductNotFound(777)));
    }

    #[tokio::test]
    async fn update_and_delete_round_trip() {
        let (backend, order) = seeded_backend();
        let key = SectionKey::new("Obra Civil", "Instalación");
        let line = backend.add_line(order, &key, 2, 1.0).await.unwrap();

        backend
            .update_line(
                line,
                &LineUpdate {
                    name: "Custom switchboard".into(),
                    quantity: 2.0,
                    unit_price: 400.0,
                },
            )
            .await
            .unwrap();

        let tree = normalize::parse(Some(&backend.reload(order).await.unwrap()));
        let found = tree.find_line(line).unwrap();
        assert_eq!(found.line.name, "Custom switchboard");
        assert_eq!(found.line.subtotal, 800.0);

        backend.delete_line(line).await.unwrap();
        let tree = normalize::parse(Some(&backend.reload(order).await.unwrap()));
        assert!(tree.find_line(line).is_none());

        let err = backend.delete_line(line).await.unwrap_err();
        assert!(matches!(err, RemoteError::LineNotFound(_)));
    }

    #[tokio::test]
    async fn locked_section_is_enforced_server_side() {
        let (backend, order) = seeded_backend();
        let locked_key = SectionKey::new("Obra Civil", "Condiciones");
        backend
            .create_section(order, &locked_key, None, true)
            .unwrap();

        let err = backend.add_line(order, &locked_key, 1, 1.0).await.unwrap_err();
        assert!(matches!(err, RemoteError::Rejected(_)));
    }

    #[tokio::test]
    async fn section_text_appears_in_blob() {
        let (backend, order) = seeded_backend();
        let key = SectionKey::new("Obra Civil", "Instalación");

        backend
            .update_section_text(order, &key, "pago a 30 días")
            .await
            .unwrap();

        let tree = normalize::parse(Some(&backend.reload(order).await.unwrap()));
        assert_eq!(
            tree.section(&key).unwrap().conditions.as_deref(),
            Some("pago a 30 días")
        );
    }

    #[tokio::test]
    async fn product_search_filters_by_name_and_category() {
        let (backend, _order) = seeded_backend();
        let other = backend.insert_category("Plumbing", None).unwrap();
        backend
            .insert_product("Cable tie", None, 0.1, Some(other))
            .unwrap();

        let hits = backend
            .search_products(&ProductQuery::new().with_name("cable"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);

        let scoped = backend
            .search_products(&ProductQuery::new().with_name("cable").with_category(other))
            .await
            .unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].name, "Cable tie");
    }

    #[tokio::test]
    async fn category_search_counts_products() {
        let (backend, _order) = seeded_backend();
        let categories = backend.search_categories(Some("elec")).await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].name, "Electrical");
        assert_eq!(categories[0].product_count, 2);
    }
}
