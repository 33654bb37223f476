//! SQLite-backed container store.
//!
//! # Responsibility
//! - Persist containers in the `containers` table.
//! - Filter fetched rows by version scope after the SQL lookup.
//!
//! # Invariants
//! - `(data_type, path, version)` is unique; concurrent writers to one
//!   address are resolved by that constraint.
//! - Read paths reject malformed persisted rows instead of masking them.

use super::{ContainerStore, PersistOptions, RepoError, RepoResult};
use crate::db::migrations::latest_version;
use crate::db::schema_version;
use crate::model::address::Address;
use crate::model::container::Container;
use crate::model::item_id::{ItemId, RawId};
use crate::model::version::ItemVersion;
use crate::model::TypeName;
use rusqlite::{params, Connection, Row};
use serde_json::{Map, Value};
use uuid::Uuid;

const CONTAINER_SELECT_SQL: &str = "SELECT
    row_id,
    identity,
    data_type,
    path,
    version,
    title,
    content,
    extension
FROM containers";

/// SQLite container repository over a migrated connection.
pub struct SqliteContainerRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteContainerRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let expected_version = latest_version();
        let actual_version = schema_version(conn)?;
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }

    /// Number of stored containers, mostly for diagnostics.
    pub fn count(&self) -> RepoResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM containers;", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn query(&self, sql: &str, bind: &[&dyn rusqlite::ToSql]) -> RepoResult<Vec<Container>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(bind)?;
        let mut containers = Vec::new();
        while let Some(row) = rows.next()? {
            containers.push(parse_container_row(row)?);
        }
        Ok(containers)
    }

    fn insert(&self, container: &mut Container) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO containers (
                identity,
                data_type,
                path,
                version,
                title,
                content,
                extension
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                container.identity.to_string(),
                container.data_type.as_str(),
                container.path.as_str(),
                container.version.to_string(),
                container.title.as_deref(),
                container.content.to_string(),
                Value::Object(container.extension.clone()).to_string(),
            ],
        )?;
        container.row_id = Some(self.conn.last_insert_rowid());
        Ok(())
    }

    fn update(&self, row_id: i64, container: &Container) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE containers
             SET
                identity = ?1,
                data_type = ?2,
                path = ?3,
                version = ?4,
                title = ?5,
                content = ?6,
                extension = ?7,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE row_id = ?8;",
            params![
                container.identity.to_string(),
                container.data_type.as_str(),
                container.path.as_str(),
                container.version.to_string(),
                container.title.as_deref(),
                container.content.to_string(),
                Value::Object(container.extension.clone()).to_string(),
                row_id,
            ],
        )?;
        Ok(changed > 0)
    }
}

impl ContainerStore for SqliteContainerRepository<'_> {
    fn new_container(&self, data_type: &TypeName) -> Container {
        Container::new(data_type.clone())
    }

    fn fetch_by_addresses(
        &self,
        addresses: &[Address],
        scope: &ItemVersion,
    ) -> RepoResult<Vec<Container>> {
        let mut containers = Vec::new();
        for address in addresses {
            let path = address.path();
            containers.extend(self.fetch_by_path(address.content_type(), &path, scope)?);
        }
        Ok(containers)
    }

    fn fetch_by_ids(&self, ids: &[ItemId], scope: &ItemVersion) -> RepoResult<Vec<Container>> {
        let mut containers = Vec::new();
        for id in ids {
            let sql_by_identity =
                format!("{CONTAINER_SELECT_SQL} WHERE data_type = ?1 AND identity = ?2 ORDER BY row_id ASC;");
            let found = match id.id() {
                RawId::Int(row_id) => self.query(
                    &format!("{CONTAINER_SELECT_SQL} WHERE data_type = ?1 AND row_id = ?2;"),
                    &[&id.content_type().as_str(), row_id],
                )?,
                RawId::Uuid(identity) => self.query(
                    &sql_by_identity,
                    &[&id.content_type().as_str(), &identity.to_string()],
                )?,
                RawId::Str(identity) => self.query(
                    &sql_by_identity,
                    &[&id.content_type().as_str(), identity],
                )?,
            };
            containers.extend(found.into_iter().filter(|c| scope.admits(&c.version)));
        }
        Ok(containers)
    }

    fn fetch_by_path(
        &self,
        data_type: &TypeName,
        path: &str,
        scope: &ItemVersion,
    ) -> RepoResult<Vec<Container>> {
        let found = self.query(
            &format!("{CONTAINER_SELECT_SQL} WHERE data_type = ?1 AND path = ?2 ORDER BY row_id ASC;"),
            &[&data_type.as_str(), &path],
        )?;
        Ok(found
            .into_iter()
            .filter(|container| scope.admits(&container.version))
            .collect())
    }

    fn fetch_all(&self, types: &[TypeName], scope: &ItemVersion) -> RepoResult<Vec<Container>> {
        let mut containers = Vec::new();
        for data_type in types {
            let found = self.query(
                &format!("{CONTAINER_SELECT_SQL} WHERE data_type = ?1 ORDER BY path ASC, row_id ASC;"),
                &[&data_type.as_str()],
            )?;
            containers.extend(found.into_iter().filter(|c| scope.admits(&c.version)));
        }
        Ok(containers)
    }

    fn persist(
        &self,
        containers: &mut [Container],
        options: PersistOptions,
    ) -> RepoResult<Vec<bool>> {
        let mut created = Vec::with_capacity(containers.len());
        for container in containers.iter_mut() {
            if !options.bypass_checks {
                validate_container(container)?;
            }
            match container.row_id {
                Some(row_id) if self.update(row_id, container)? => created.push(false),
                _ => {
                    self.insert(container)?;
                    created.push(true);
                }
            }
        }
        Ok(created)
    }

    fn delete(&self, container: &Container, bypass_checks: bool) -> RepoResult<()> {
        let changed = match container.row_id {
            Some(row_id) => self
                .conn
                .execute("DELETE FROM containers WHERE row_id = ?1;", [row_id])?,
            None => self.conn.execute(
                "DELETE FROM containers WHERE data_type = ?1 AND path = ?2 AND version = ?3;",
                params![
                    container.data_type.as_str(),
                    container.path.as_str(),
                    container.version.to_string(),
                ],
            )?,
        };
        if changed == 0 && !bypass_checks {
            return Err(RepoError::NotFound(format!(
                "{}:{}",
                container.data_type, container.path
            )));
        }
        Ok(())
    }
}

fn validate_container(container: &Container) -> RepoResult<()> {
    if !container.path.starts_with('/') {
        return Err(RepoError::InvalidData(format!(
            "container path `{}` must start with `/`",
            container.path
        )));
    }
    if !container.content.is_object() {
        return Err(RepoError::InvalidData(format!(
            "container content for {} at {} must be a JSON object",
            container.data_type, container.path
        )));
    }
    Ok(())
}

fn parse_container_row(row: &Row<'_>) -> RepoResult<Container> {
    let identity_text: String = row.get("identity")?;
    let identity = Uuid::parse_str(&identity_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid identity `{identity_text}` in containers.identity"
        ))
    })?;

    let type_text: String = row.get("data_type")?;
    let data_type = TypeName::new(type_text.as_str())
        .map_err(|_| RepoError::InvalidData("empty data type in containers.data_type".into()))?;

    let version_text: String = row.get("version")?;
    let version = version_text.parse::<ItemVersion>().map_err(|err| {
        RepoError::InvalidData(format!(
            "invalid version `{version_text}` in containers.version: {err}"
        ))
    })?;

    let content_text: String = row.get("content")?;
    let content: Value = serde_json::from_str(&content_text).map_err(|err| {
        RepoError::InvalidData(format!("invalid JSON in containers.content: {err}"))
    })?;

    let extension_text: String = row.get("extension")?;
    let extension = match serde_json::from_str::<Value>(&extension_text) {
        Ok(Value::Object(map)) => map,
        Ok(Value::Null) => Map::new(),
        Ok(other) => {
            return Err(RepoError::InvalidData(format!(
                "containers.extension must be an object, got `{other}`"
            )));
        }
        Err(err) => {
            return Err(RepoError::InvalidData(format!(
                "invalid JSON in containers.extension: {err}"
            )));
        }
    };

    Ok(Container {
        row_id: Some(row.get("row_id")?),
        identity,
        data_type,
        path: row.get("path")?,
        version,
        title: row.get("title")?,
        content,
        extension,
    })
}

#[cfg(test)]
mod tests {
    use super::validate_container;
    use crate::model::container::Container;
    use crate::model::TypeName;
    use crate::repo::RepoError;
    use serde_json::json;

    #[test]
    fn validate_rejects_relative_paths_and_scalar_content() {
        let mut container = Container::new(TypeName::from("Article"));
        container.path = "a/1".to_string();
        assert!(matches!(
            validate_container(&container),
            Err(RepoError::InvalidData(_))
        ));

        container.path = "/a/1".to_string();
        container.content = json!("text");
        assert!(matches!(
            validate_container(&container),
            Err(RepoError::InvalidData(_))
        ));
    }
}
