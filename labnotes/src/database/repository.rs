//! Repository layer for database operations
//!
//! Every statement goes through here. Multi-statement changes run in a
//! transaction so a failure part way leaves nothing behind.

use super::models::*;
use crate::conditions::{ConditionSet, TemplateFormBatch};
use crate::config::{
    DEFAULT_TEMPLATE_NAME, EXCERPT_RADIUS, HASH_ID_ALPHABET, HASH_ID_LENGTH,
    MAX_HASH_ID_ATTEMPTS, SUGGESTION_LIMIT, TIMELINE_LENGTH,
};
use crate::error::{AppError, Result};
use crate::search::{contains_pattern, FilterQuery, SqlParam};
use rand::Rng;
use sqlx::query::QueryAs;
use sqlx::sqlite::{Sqlite, SqliteArguments};
use sqlx::{SqliteConnection, SqlitePool};

type SqliteQueryAs<'q, O> = QueryAs<'q, Sqlite, O, SqliteArguments<'q>>;

/// Bind dynamic parameters in placeholder order.
fn bind_all<'q, O>(mut query: SqliteQueryAs<'q, O>, params: &'q [SqlParam]) -> SqliteQueryAs<'q, O> {
    for param in params {
        query = match param {
            SqlParam::Text(value) => query.bind(value.as_str()),
            SqlParam::Integer(value) => query.bind(*value),
        };
    }
    query
}

/// Random uppercase alphanumeric hash id
pub fn generate_hash_id() -> String {
    let mut rng = rand::thread_rng();
    (0..HASH_ID_LENGTH)
        .map(|_| HASH_ID_ALPHABET[rng.gen_range(0..HASH_ID_ALPHABET.len())] as char)
        .collect()
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Last comma-separated fragment of an autocomplete input
fn last_fragment(input: &str) -> Option<&str> {
    non_blank(input.rsplit(',').next())
}

/// Up to `radius` characters either side of the first occurrence of `needle`.
pub fn excerpt_around(text: &str, needle: &str, radius: usize) -> Option<String> {
    let byte_idx = text.find(needle)?;
    let char_idx = text[..byte_idx].chars().count();
    let start = char_idx.saturating_sub(radius);
    Some(text.chars().skip(start).take(char_idx + radius - start).collect())
}

fn validate_entry_fields(date: &str, entry_name: &str) -> Result<()> {
    if date.trim().is_empty() {
        return Err(AppError::Validation("An entry needs a date".to_string()));
    }
    if entry_name.trim().is_empty() {
        return Err(AppError::Validation("An entry needs a name".to_string()));
    }
    Ok(())
}

async fn ensure_parent_exists(conn: &mut SqliteConnection, parent: Option<&str>) -> Result<()> {
    let Some(parent) = parent else {
        return Ok(());
    };

    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM entries WHERE id_hash = ?")
        .bind(parent)
        .fetch_optional(&mut *conn)
        .await?;

    found
        .map(|_| ())
        .ok_or_else(|| AppError::ParentNotFound(parent.to_string()))
}

/// Record author, tags and condition tokens in the lookup tables.
async fn register_lookups(
    conn: &mut SqliteConnection,
    author: Option<&str>,
    tags: &[String],
    conditions: &ConditionSet,
) -> Result<()> {
    if let Some(author) = author {
        sqlx::query("INSERT OR IGNORE INTO authors (author) VALUES (?)")
            .bind(author)
            .execute(&mut *conn)
            .await?;
    }

    for tag in tags {
        sqlx::query("INSERT OR IGNORE INTO tags (tag) VALUES (?)")
            .bind(tag)
            .execute(&mut *conn)
            .await?;
    }

    for token in conditions.tokens() {
        sqlx::query("INSERT OR IGNORE INTO conditions (condition) VALUES (?)")
            .bind(token.legacy())
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
    hash_id_source: fn() -> String,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            hash_id_source: generate_hash_id,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ===== Entries =====

    /// Create an entry, allocating its hash id.
    ///
    /// A hash id that is already taken is detected by the unique index and
    /// a fresh one is drawn, up to [`MAX_HASH_ID_ATTEMPTS`] times.
    pub async fn create_entry(&self, req: CreateEntryRequest) -> Result<Entry> {
        if req.author.trim().is_empty() {
            return Err(AppError::Validation("An entry needs an author".to_string()));
        }
        validate_entry_fields(&req.date, &req.entry_name)?;

        let tags = split_tags(&req.tags);
        let parent = non_blank(req.entry_parent.as_deref());
        let conditions = req.conditions.encode();

        let mut tx = self.pool.begin().await?;

        ensure_parent_exists(&mut tx, parent).await?;
        register_lookups(&mut tx, Some(&req.author), &tags, &req.conditions).await?;

        let mut created = None;
        for attempt in 1..=MAX_HASH_ID_ATTEMPTS {
            let hash_id = (self.hash_id_source)();
            let result = sqlx::query_as::<_, Entry>(
                r#"
                INSERT INTO entries
                    (id_hash, tags, extra_txt, file_path, date, author, conditions, entry_name, entry_parent)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                RETURNING *
                "#,
            )
            .bind(&hash_id)
            .bind(&req.tags)
            .bind(&req.extra_txt)
            .bind(&req.file_path)
            .bind(&req.date)
            .bind(&req.author)
            .bind(&conditions)
            .bind(&req.entry_name)
            .bind(parent)
            .fetch_one(&mut *tx)
            .await;

            match result {
                Ok(entry) => {
                    created = Some(entry);
                    break;
                }
                Err(e) if is_unique_violation(&e) => {
                    tracing::debug!("Hash id {} already taken (attempt {})", hash_id, attempt);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let entry = created.ok_or(AppError::HashIdExhausted(MAX_HASH_ID_ATTEMPTS))?;
        tx.commit().await?;

        tracing::debug!("Created entry: {} ({})", entry.id, entry.id_hash);
        Ok(entry)
    }

    pub async fn get_entry(&self, id: i64) -> Result<Entry> {
        sqlx::query_as::<_, Entry>("SELECT * FROM entries WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::EntryNotFound(id.to_string()))
    }

    pub async fn get_entry_by_hash(&self, hash_id: &str) -> Result<Entry> {
        sqlx::query_as::<_, Entry>("SELECT * FROM entries WHERE id_hash = ?")
            .bind(hash_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::EntryNotFound(hash_id.to_string()))
    }

    pub async fn update_entry(&self, req: UpdateEntryRequest) -> Result<Entry> {
        validate_entry_fields(&req.date, &req.entry_name)?;

        let tags = split_tags(&req.tags);
        let parent = non_blank(req.entry_parent.as_deref());

        let mut tx = self.pool.begin().await?;

        let own_hash: Option<String> = sqlx::query_scalar("SELECT id_hash FROM entries WHERE id = ?")
            .bind(req.id)
            .fetch_optional(&mut *tx)
            .await?;
        let own_hash = own_hash.ok_or_else(|| AppError::EntryNotFound(req.id.to_string()))?;

        if parent == Some(own_hash.as_str()) {
            return Err(AppError::Validation("An entry cannot be its own parent".to_string()));
        }
        ensure_parent_exists(&mut tx, parent).await?;
        register_lookups(&mut tx, None, &tags, &req.conditions).await?;

        let entry = sqlx::query_as::<_, Entry>(
            r#"
            UPDATE entries
            SET tags = ?, extra_txt = ?, file_path = ?, date = ?, conditions = ?,
                entry_name = ?, entry_parent = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&req.tags)
        .bind(&req.extra_txt)
        .bind(&req.file_path)
        .bind(&req.date)
        .bind(req.conditions.encode())
        .bind(&req.entry_name)
        .bind(parent)
        .bind(req.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!("Updated entry: {}", entry.id);
        Ok(entry)
    }

    /// Delete an entry and detach its children.
    pub async fn delete_entry(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(String, String)> =
            sqlx::query_as("SELECT id_hash, author FROM entries WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let (hash_id, author) = row.ok_or_else(|| AppError::EntryNotFound(id.to_string()))?;

        sqlx::query("DELETE FROM entries WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let detached = sqlx::query("UPDATE entries SET entry_parent = NULL WHERE entry_parent = ?")
            .bind(&hash_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query(
            "DELETE FROM authors WHERE author = ? AND NOT EXISTS (SELECT 1 FROM entries WHERE author = ?)",
        )
        .bind(&author)
        .bind(&author)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!("Deleted entry: {} ({} children detached)", id, detached);
        Ok(())
    }

    /// Point several entries at one parent. Returns the number changed.
    pub async fn set_parent(&self, ids: &[i64], parent_hash: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        ensure_parent_exists(&mut tx, Some(parent_hash)).await?;

        let mut changed = 0;
        for id in ids {
            changed += sqlx::query("UPDATE entries SET entry_parent = ? WHERE id = ? AND id_hash != ?")
                .bind(parent_hash)
                .bind(id)
                .bind(parent_hash)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        tx.commit().await?;

        tracing::debug!("Set parent {} on {} entries", parent_hash, changed);
        Ok(changed)
    }

    pub async fn family_tree(&self, hash_id: &str) -> Result<FamilyTree> {
        let entry = self.get_entry_by_hash(hash_id).await?;

        let parent = match non_blank(entry.entry_parent.as_deref()) {
            Some(parent) => {
                sqlx::query_as::<_, EntryLink>("SELECT entry_name, id FROM entries WHERE id_hash = ?")
                    .bind(parent)
                    .fetch_optional(&self.pool)
                    .await?
            }
            None => None,
        };

        let children = sqlx::query_as::<_, EntryLink>(
            "SELECT entry_name, id FROM entries WHERE entry_parent = ? ORDER BY date DESC, id DESC",
        )
        .bind(hash_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(FamilyTree {
            this: EntryLink {
                entry_name: entry.entry_name,
                id: entry.id,
            },
            parent,
            children,
        })
    }

    /// An author's most recent entries
    pub async fn timeline(&self, author: &str) -> Result<Vec<Entry>> {
        let entries = sqlx::query_as::<_, Entry>(
            "SELECT * FROM entries WHERE author = ? ORDER BY date DESC, id DESC LIMIT ?",
        )
        .bind(author)
        .bind(TIMELINE_LENGTH)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    // ===== Search =====

    pub async fn fetch_matching(&self, query: &FilterQuery) -> Result<Vec<Entry>> {
        let sql = query.select_sql();
        tracing::debug!("Search SQL: {} {:?}", sql, query.params);

        let entries = bind_all(sqlx::query_as::<_, Entry>(&sql), &query.params)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    pub async fn fetch_page(&self, query: &FilterQuery, limit: i64, offset: i64) -> Result<Vec<Entry>> {
        let sql = query.page_sql();
        let params = query.page_params(limit, offset);
        tracing::debug!("Page SQL: {} {:?}", sql, params);

        let entries = bind_all(sqlx::query_as::<_, Entry>(&sql), &params)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    pub async fn count_matching(&self, query: &FilterQuery) -> Result<i64> {
        let sql = query.count_sql();
        tracing::debug!("Count SQL: {} {:?}", sql, query.params);

        let (count,) = bind_all(sqlx::query_as::<_, (i64,)>(&sql), &query.params)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // ===== Autocomplete =====

    /// Known authors matching the last comma-separated fragment
    pub async fn suggest_authors(&self, input: &str) -> Result<Vec<String>> {
        let Some(fragment) = last_fragment(input) else {
            return Ok(Vec::new());
        };

        let authors = sqlx::query_scalar("SELECT author FROM authors WHERE author LIKE ? ORDER BY author LIMIT ?")
            .bind(format!("%{fragment}%"))
            .bind(SUGGESTION_LIMIT)
            .fetch_all(&self.pool)
            .await?;

        Ok(authors)
    }

    /// Known tags matching the last comma-separated fragment
    pub async fn suggest_tags(&self, input: &str) -> Result<Vec<String>> {
        let Some(fragment) = last_fragment(input) else {
            return Ok(Vec::new());
        };

        let tags = sqlx::query_scalar("SELECT tag FROM tags WHERE tag LIKE ? ORDER BY tag LIMIT ?")
            .bind(format!("%{fragment}%"))
            .bind(SUGGESTION_LIMIT)
            .fetch_all(&self.pool)
            .await?;

        Ok(tags)
    }

    /// Distinct entry names containing `fragment`
    pub async fn suggest_titles(&self, fragment: &str) -> Result<Vec<String>> {
        let titles = sqlx::query_scalar(
            "SELECT DISTINCT entry_name FROM entries WHERE entry_name LIKE ? ORDER BY entry_name LIMIT ?",
        )
        .bind(format!("%{fragment}%"))
        .bind(SUGGESTION_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(titles)
    }

    /// Distinct entry names whose name, tags, conditions or text contain `fragment`
    pub async fn suggest_keywords(&self, fragment: &str) -> Result<Vec<String>> {
        let params = vec![contains_pattern(fragment); 4];
        let titles = bind_all(
            sqlx::query_as::<_, (String,)>(
                r#"
                SELECT DISTINCT entry_name FROM entries
                WHERE entry_name LIKE ? OR tags LIKE ? OR conditions LIKE ? OR extra_txt LIKE ?
                ORDER BY entry_name
                LIMIT ?
                "#,
            ),
            &params,
        )
        .bind(SUGGESTION_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(titles.into_iter().map(|(name,)| name).collect())
    }

    /// Context around the first exact occurrence of `keyword` in entry text
    pub async fn text_excerpts(&self, keyword: &str) -> Result<Vec<TextExcerpt>> {
        if keyword.trim().is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<(i64, String)> =
            sqlx::query_as("SELECT id, extra_txt FROM entries WHERE extra_txt LIKE ? ORDER BY date DESC, id DESC")
                .bind(format!("%{keyword}%"))
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, text)| {
                excerpt_around(&text, keyword, EXCERPT_RADIUS).map(|excerpt| TextExcerpt { excerpt, id })
            })
            .collect())
    }

    // ===== Condition templates =====

    /// Create the empty default template for a newly provisioned user.
    pub async fn ensure_default_template(&self, author: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO conditions_templates (author, template_name, conditions) VALUES (?, ?, '')",
        )
        .bind(author)
        .bind(DEFAULT_TEMPLATE_NAME)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_templates(&self, author: &str) -> Result<Vec<ConditionTemplate>> {
        let templates = sqlx::query_as::<_, ConditionTemplate>(
            "SELECT * FROM conditions_templates WHERE author = ? ORDER BY template_name",
        )
        .bind(author)
        .fetch_all(&self.pool)
        .await?;

        Ok(templates)
    }

    pub async fn get_template(&self, author: &str, template_name: &str) -> Result<ConditionTemplate> {
        sqlx::query_as::<_, ConditionTemplate>(
            "SELECT * FROM conditions_templates WHERE author = ? AND template_name = ?",
        )
        .bind(author)
        .bind(template_name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::TemplateNotFound {
            author: author.to_string(),
            template: template_name.to_string(),
        })
    }

    /// Insert, overwrite and delete templates as one unit.
    ///
    /// Conditions posted under `default` become a new template named by the
    /// batch; every other group overwrites the template of that name.
    /// Templates that do not exist are reported, not treated as failures.
    pub async fn apply_template_batch(
        &self,
        author: &str,
        batch: &TemplateFormBatch,
    ) -> Result<TemplateBatchOutcome> {
        let mut outcome = TemplateBatchOutcome::default();
        let mut tx = self.pool.begin().await?;

        if let Some(conditions) = batch.default_group() {
            let name = batch.new_template_name.as_deref().ok_or_else(|| {
                AppError::Validation("A new template needs a name".to_string())
            })?;

            let result = sqlx::query(
                "INSERT INTO conditions_templates (author, template_name, conditions) VALUES (?, ?, ?)",
            )
            .bind(author)
            .bind(name)
            .bind(conditions.encode())
            .execute(&mut *tx)
            .await;

            match result {
                Ok(_) => outcome.created = Some(name.to_string()),
                Err(e) if is_unique_violation(&e) => {
                    return Err(AppError::TemplateExists {
                        author: author.to_string(),
                        template: name.to_string(),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        for (name, conditions) in batch.updates() {
            let rows = sqlx::query(
                "UPDATE conditions_templates SET conditions = ? WHERE author = ? AND template_name = ?",
            )
            .bind(conditions.encode())
            .bind(author)
            .bind(name)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if rows == 0 {
                outcome.not_found.push(name.to_string());
            } else {
                outcome.updated.push(name.to_string());
            }
        }

        for name in &batch.deletions {
            let rows = sqlx::query("DELETE FROM conditions_templates WHERE author = ? AND template_name = ?")
                .bind(author)
                .bind(name)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            if rows == 0 {
                outcome.not_found.push(name.clone());
            } else {
                outcome.deleted.push(name.clone());
            }
        }

        tx.commit().await?;

        if !outcome.not_found.is_empty() {
            tracing::warn!("Template batch for {} named unknown templates: {:?}", author, outcome.not_found);
        }
        tracing::debug!("Template batch for {}: {:?}", author, outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::ConditionToken;
    use crate::database::schema::initialize_database;
    use crate::search::FilterCriteria;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_repo() -> Repository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();

        Repository::new(pool)
    }

    fn request(author: &str, date: &str, name: &str, tags: &str) -> CreateEntryRequest {
        CreateEntryRequest {
            author: author.to_string(),
            date: date.to_string(),
            tags: tags.to_string(),
            entry_name: name.to_string(),
            ..CreateEntryRequest::default()
        }
    }

    fn fixed_hash_id() -> String {
        "FIXEDHASH0".to_string()
    }

    #[test]
    fn test_generated_hash_id_shape() {
        let hash_id = generate_hash_id();
        assert_eq!(hash_id.len(), HASH_ID_LENGTH);
        assert!(hash_id.bytes().all(|b| HASH_ID_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_excerpt_around() {
        let text = "The quick brown fox jumps over the lazy dog near the riverbank";
        assert_eq!(
            excerpt_around(text, "lazy", 10).as_deref(),
            Some(" over the lazy dog n")
        );
        assert_eq!(excerpt_around("lazy", "lazy", 20).as_deref(), Some("lazy"));
        assert_eq!(excerpt_around(text, "cat", 20), None);
    }

    #[tokio::test]
    async fn test_create_and_get_entry() {
        let repo = create_test_repo().await;

        let mut req = request("alice", "2024-05-01", "Gel run", "pcr, gel");
        req.conditions = ConditionSet::new(vec![ConditionToken::boolean("Buffer", "pH", "acidic")]);

        let entry = repo.create_entry(req).await.unwrap();
        assert_eq!(entry.id_hash.len(), HASH_ID_LENGTH);
        assert_eq!(entry.conditions, "v1:b&Buffer&pH&acidic");
        assert_eq!(entry.entry_parent, None);

        let fetched = repo.get_entry_by_hash(&entry.id_hash).await.unwrap();
        assert_eq!(fetched, entry);

        let tags = repo.suggest_tags("x, g").await.unwrap();
        assert_eq!(tags, vec!["gel"]);
        let conditions: Vec<String> = sqlx::query_scalar("SELECT condition FROM conditions")
            .fetch_all(repo.pool())
            .await
            .unwrap();
        assert_eq!(conditions, vec!["Buffer&pH&acidic"]);
    }

    #[tokio::test]
    async fn test_create_rejects_missing_fields_and_parent() {
        let repo = create_test_repo().await;

        let result = repo.create_entry(request("", "2024-05-01", "x", "")).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let mut req = request("alice", "2024-05-01", "child", "");
        req.entry_parent = Some("NOPARENT00".to_string());
        let result = repo.create_entry(req).await;
        assert!(matches!(result, Err(AppError::ParentNotFound(_))));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries")
            .fetch_one(repo.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_hash_id_collision_is_retried_then_exhausted() {
        let mut repo = create_test_repo().await;
        repo.hash_id_source = fixed_hash_id;

        let first = repo
            .create_entry(request("alice", "2024-05-01", "one", ""))
            .await
            .unwrap();
        assert_eq!(first.id_hash, "FIXEDHASH0");

        let second = repo.create_entry(request("alice", "2024-05-02", "two", "")).await;
        assert!(matches!(second, Err(AppError::HashIdExhausted(_))));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries")
            .fetch_one(repo.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_update_entry() {
        let repo = create_test_repo().await;
        let parent = repo
            .create_entry(request("alice", "2024-05-01", "parent", ""))
            .await
            .unwrap();
        let child = repo
            .create_entry(request("alice", "2024-05-02", "child", ""))
            .await
            .unwrap();

        let updated = repo
            .update_entry(UpdateEntryRequest {
                id: child.id,
                date: "2024-05-03".to_string(),
                tags: "elisa".to_string(),
                entry_name: "child v2".to_string(),
                entry_parent: Some(parent.id_hash.clone()),
                ..UpdateEntryRequest::default()
            })
            .await
            .unwrap();

        assert_eq!(updated.entry_name, "child v2");
        assert_eq!(updated.author, "alice");
        assert_eq!(updated.entry_parent.as_deref(), Some(parent.id_hash.as_str()));

        let own = repo
            .update_entry(UpdateEntryRequest {
                id: child.id,
                date: "2024-05-03".to_string(),
                entry_name: "loop".to_string(),
                entry_parent: Some(child.id_hash.clone()),
                ..UpdateEntryRequest::default()
            })
            .await;
        assert!(matches!(own, Err(AppError::Validation(_))));

        let missing = repo
            .update_entry(UpdateEntryRequest {
                id: 999,
                date: "2024-05-03".to_string(),
                entry_name: "ghost".to_string(),
                ..UpdateEntryRequest::default()
            })
            .await;
        assert!(matches!(missing, Err(AppError::EntryNotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_detaches_children() {
        let repo = create_test_repo().await;
        let parent = repo
            .create_entry(request("alice", "2024-05-01", "parent", ""))
            .await
            .unwrap();
        let mut req = request("bob", "2024-05-02", "child", "");
        req.entry_parent = Some(parent.id_hash.clone());
        let child = repo.create_entry(req).await.unwrap();

        repo.delete_entry(parent.id).await.unwrap();

        let child = repo.get_entry(child.id).await.unwrap();
        assert_eq!(child.entry_parent, None);
        assert!(repo.get_entry(parent.id).await.is_err());
        assert!(repo.suggest_authors("ali").await.unwrap().is_empty());
        assert_eq!(repo.suggest_authors("bo").await.unwrap(), vec!["bob"]);

        let again = repo.delete_entry(parent.id).await;
        assert!(matches!(again, Err(AppError::EntryNotFound(_))));
    }

    #[tokio::test]
    async fn test_set_parent_and_family_tree() {
        let repo = create_test_repo().await;
        let root = repo.create_entry(request("alice", "2024-05-01", "root", "")).await.unwrap();
        let a = repo.create_entry(request("alice", "2024-05-02", "a", "")).await.unwrap();
        let b = repo.create_entry(request("alice", "2024-05-03", "b", "")).await.unwrap();

        let changed = repo.set_parent(&[a.id, b.id, root.id], &root.id_hash).await.unwrap();
        assert_eq!(changed, 2);

        let tree = repo.family_tree(&a.id_hash).await.unwrap();
        assert_eq!(tree.this.entry_name, "a");
        assert_eq!(tree.parent.map(|p| p.id), Some(root.id));
        assert!(tree.children.is_empty());

        let tree = repo.family_tree(&root.id_hash).await.unwrap();
        let children: Vec<&str> = tree.children.iter().map(|c| c.entry_name.as_str()).collect();
        assert_eq!(children, vec!["b", "a"]);

        let unknown = repo.set_parent(&[a.id], "UNKNOWN000").await;
        assert!(matches!(unknown, Err(AppError::ParentNotFound(_))));
    }

    #[tokio::test]
    async fn test_filter_page_and_count_agree() {
        let repo = create_test_repo().await;
        for day in 1..=7 {
            repo.create_entry(request("alice", &format!("2024-05-0{day}"), &format!("run {day}"), "pcr"))
                .await
                .unwrap();
        }
        repo.create_entry(request("bob", "2024-05-08", "other", "elisa"))
            .await
            .unwrap();

        let query = FilterCriteria {
            tags: Some("pcr".to_string()),
            ..FilterCriteria::default()
        }
        .build();

        let all = repo.fetch_matching(&query).await.unwrap();
        let total = repo.count_matching(&query).await.unwrap();
        assert_eq!(all.len() as i64, total);
        assert_eq!(total, 7);

        let mut paged = Vec::new();
        let mut offset = 0;
        loop {
            let page = repo.fetch_page(&query, 3, offset).await.unwrap();
            if page.is_empty() {
                break;
            }
            offset += page.len() as i64;
            paged.extend(page);
        }
        assert_eq!(paged, all);
        assert_eq!(paged[0].entry_name, "run 7");
    }

    #[tokio::test]
    async fn test_suggestions_and_excerpts() {
        let repo = create_test_repo().await;
        let mut req = request("alice", "2024-05-01", "Western blot", "wb");
        req.extra_txt = "Transferred for ninety minutes at 100 V in cold buffer".to_string();
        let entry = repo.create_entry(req).await.unwrap();
        repo.create_entry(request("alice", "2024-05-02", "Western blot", "wb"))
            .await
            .unwrap();

        assert_eq!(repo.suggest_titles("west").await.unwrap(), vec!["Western blot"]);
        assert_eq!(repo.suggest_keywords("wb").await.unwrap(), vec!["Western blot"]);
        assert!(repo.suggest_authors(" ").await.unwrap().is_empty());

        let excerpts = repo.text_excerpts("100 V").await.unwrap();
        assert_eq!(excerpts.len(), 1);
        assert_eq!(excerpts[0].id, entry.id);
        assert_eq!(excerpts[0].excerpt, "r ninety minutes at 100 V in cold buffer");

        let timeline = repo.timeline("alice").await.unwrap();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].date, "2024-05-02");
    }

    #[tokio::test]
    async fn test_template_batch() {
        let repo = create_test_repo().await;
        repo.ensure_default_template("alice").await.unwrap();
        repo.ensure_default_template("alice").await.unwrap();

        let fields: Vec<(String, String)> = [
            ("condition&default&Buffer&pH&acidic", "on"),
            ("new_template_name", "staining"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let outcome = repo
            .apply_template_batch("alice", &TemplateFormBatch::from_fields(&fields))
            .await
            .unwrap();
        assert_eq!(outcome.created.as_deref(), Some("staining"));

        let fields: Vec<(String, String)> = [
            ("condition&staining&Buffer&pH&neutral", "on"),
            ("condition&ghost&Buffer&pH&neutral", "on"),
            ("delete&default", "on"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let outcome = repo
            .apply_template_batch("alice", &TemplateFormBatch::from_fields(&fields))
            .await
            .unwrap();
        assert_eq!(outcome.updated, vec!["staining"]);
        assert_eq!(outcome.deleted, vec!["default"]);
        assert_eq!(outcome.not_found, vec!["ghost"]);

        let staining = repo.get_template("alice", "staining").await.unwrap();
        assert_eq!(staining.condition_set().legacy_string(), "Buffer&pH&neutral");

        let templates = repo.list_templates("alice").await.unwrap();
        assert_eq!(templates.len(), 1);

        let missing = repo.get_template("alice", "default").await;
        assert!(matches!(missing, Err(AppError::TemplateNotFound { .. })));
    }

    #[tokio::test]
    async fn test_template_batch_is_atomic() {
        let repo = create_test_repo().await;
        repo.ensure_default_template("alice").await.unwrap();

        // the insert conflicts with the existing default template
        let fields: Vec<(String, String)> = [
            ("delete&default", "on"),
            ("condition&default&Buffer&pH&acidic", "on"),
            ("new_template_name", "default"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let result = repo
            .apply_template_batch("alice", &TemplateFormBatch::from_fields(&fields))
            .await;
        assert!(matches!(result, Err(AppError::TemplateExists { .. })));

        let unnamed: Vec<(String, String)> = vec![(
            "condition&default&Buffer&pH&acidic".to_string(),
            "on".to_string(),
        )];
        let result = repo
            .apply_template_batch("alice", &TemplateFormBatch::from_fields(&unnamed))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        assert!(repo.get_template("alice", "default").await.is_ok());
    }
}
