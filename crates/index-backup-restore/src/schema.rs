//! Index schema capture and recreation.

use std::path::Path;

use serde_json::{Map, Value};
use tracing::info;

use crate::error::{Error, Result};
use crate::service::SearchService;
use crate::staging;

/// Prefix of service-generated schema properties (`@odata.context`, `@odata.etag`).
const ODATA_PREFIX: &str = "@odata.";

/// A captured index schema.
///
/// Kept as the raw JSON the service returned plus its parsed form; only the
/// index name is ever changed.
#[derive(Debug, Clone)]
pub struct IndexSchema {
    raw: String,
    document: Map<String, Value>,
    key_field: String,
}

impl IndexSchema {
    /// Parses a schema document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationFailed`] if the document is not a JSON
    /// object with a `fields` array containing exactly one key field.
    pub fn from_json(raw: &str) -> Result<Self> {
        let document: Map<String, Value> = serde_json::from_str(raw)
            .map_err(|e| Error::ValidationFailed(format!("schema is not a JSON object: {}", e)))?;

        let fields = document
            .get("fields")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::ValidationFailed("schema has no 'fields' array".to_string()))?;

        let keys: Vec<&str> = fields
            .iter()
            .filter(|f| f.get("key").and_then(Value::as_bool).unwrap_or(false))
            .filter_map(|f| f.get("name").and_then(Value::as_str))
            .collect();

        let key_field = match keys.as_slice() {
            [key] => (*key).to_string(),
            [] => {
                return Err(Error::ValidationFailed(
                    "schema has no key field".to_string(),
                ))
            }
            many => {
                return Err(Error::ValidationFailed(format!(
                    "schema has {} key fields ({}), expected exactly one",
                    many.len(),
                    many.join(", ")
                )))
            }
        };

        Ok(Self {
            raw: raw.to_string(),
            document,
            key_field,
        })
    }

    /// Index name declared in the schema.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.document.get("name").and_then(Value::as_str)
    }

    /// Name of the key field.
    #[must_use]
    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    /// Names of the top-level fields, in schema order.
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        self.document
            .get("fields")
            .and_then(Value::as_array)
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(|f| f.get("name").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The schema exactly as captured.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Returns the parsed schema document.
    #[must_use]
    pub fn document(&self) -> &Map<String, Value> {
        &self.document
    }

    /// Returns a copy of this schema describing index `new_name`.
    ///
    /// Only the `name` property changes; service-generated `@odata.*`
    /// properties are dropped since the create endpoint rejects them.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be re-serialized.
    pub fn renamed(&self, new_name: &str) -> Result<Self> {
        let mut document = self.document.clone();
        document.retain(|key, _| !key.starts_with(ODATA_PREFIX));
        document.insert("name".to_string(), Value::String(new_name.to_string()));

        Ok(Self {
            raw: serde_json::to_string(&document)?,
            document,
            key_field: self.key_field.clone(),
        })
    }
}

/// Result of deleting the target index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The index existed and was deleted.
    Deleted,
    /// There was no index to delete.
    Absent,
}

/// Captures schemas into the staging directory and recreates indexes from them.
pub struct SchemaTransport<'a> {
    staging_dir: &'a Path,
}

impl<'a> SchemaTransport<'a> {
    /// Creates a transport writing to `staging_dir`.
    #[must_use]
    pub fn new(staging_dir: &'a Path) -> Self {
        Self { staging_dir }
    }

    /// Fetches the schema of `index` and saves it to `<index>.schema`.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be fetched, is invalid, or cannot
    /// be written. Also refuses to stage `index` for the first time while
    /// batch files named after it belong to a shorter index in the same
    /// directory (`hotels21.json` of `hotels` when staging `hotels2`).
    pub async fn fetch_schema(
        &self,
        service: &dyn SearchService,
        index: &str,
    ) -> Result<IndexSchema> {
        let raw = service.fetch_schema(index).await?;
        let schema = IndexSchema::from_json(&raw)?;

        let path = staging::schema_path(self.staging_dir, index);
        info!(
            "Backing up schema of '{}' ({} fields, key '{}') to {}",
            index,
            schema.field_names().len(),
            schema.key_field(),
            path.display()
        );
        staging::ensure_dir(self.staging_dir)?;
        if !path.exists() {
            if let Some(other) = staging::shorter_owner(self.staging_dir, index) {
                let taken = staging::list_batch_files(self.staging_dir, index)?;
                if let Some((_, file)) = taken.first() {
                    return Err(Error::staging(
                        file,
                        format!(
                            "{} staged file(s) of '{}' share names with batches of '{}'; use a separate staging directory",
                            taken.len(),
                            other,
                            index
                        ),
                    ));
                }
            }
        }
        staging::write_atomic(&path, raw.as_bytes())?;

        Ok(schema)
    }

    /// Loads a previously captured schema of `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or invalid.
    pub fn load_schema(&self, index: &str) -> Result<IndexSchema> {
        let path = staging::schema_path(self.staging_dir, index);
        let bytes = staging::read_file(&path)?;
        let raw = String::from_utf8(bytes).map_err(|e| Error::staging(&path, e))?;
        IndexSchema::from_json(&raw)
    }

    /// Deletes `index`; a missing index counts as success.
    ///
    /// # Errors
    ///
    /// Returns any failure other than "not found".
    pub async fn delete_index(
        &self,
        service: &dyn SearchService,
        index: &str,
    ) -> Result<DeleteOutcome> {
        info!(
            "Deleting index '{}' on service '{}' if it exists",
            index,
            service.service_name()
        );
        match service.delete_index(index).await {
            Ok(()) => Ok(DeleteOutcome::Deleted),
            Err(e) if e.is_not_found() => {
                info!("Index '{}' does not exist, nothing to delete", index);
                Ok(DeleteOutcome::Absent)
            }
            Err(e) => Err(e),
        }
    }

    /// Creates index `new_name` on `service` from `schema`.
    ///
    /// # Errors
    ///
    /// Returns an error if the service rejects the schema.
    pub async fn create_index(
        &self,
        service: &dyn SearchService,
        schema: &IndexSchema,
        new_name: &str,
    ) -> Result<()> {
        let target = schema.renamed(new_name)?;
        info!(
            "Creating index '{}' on service '{}' from schema of '{}'",
            new_name,
            service.service_name(),
            schema.name().unwrap_or("?")
        );
        service.create_index(target.raw()).await
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
