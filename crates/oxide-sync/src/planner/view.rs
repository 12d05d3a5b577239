//! View operations.
//!
//! Views are recorded in the metadata table next to being created, since
//! the catalog does not keep the defining query reliably.

use oxide_ddl::{BatchBuilder, ChangeBatch, Dialect, View};

use crate::error::{Result, SyncError};
use crate::runner::SchemaRunner;

impl<D: Dialect> SchemaRunner<D> {
    /// Creates a view and records its definition.
    pub async fn create_view(&mut self, view: View) -> Result<ChangeBatch> {
        let view = self.normalized_view(view).await?;
        self.ensure_metadata_table().await?;

        let metadata = self.metadata_table();
        let schema = match &view.schema {
            Some(schema) => schema.clone(),
            None => self.default_schema().await?,
        };

        let mut builder = BatchBuilder::new();
        builder.push(
            self.dialect.create_view_sql(&view),
            self.dialect.drop_view_sql(&view),
        );
        builder.push(
            self.dialect
                .insert_view_metadata_sql(&metadata, &schema, &view),
            self.dialect
                .delete_view_metadata_sql(&metadata, &schema, &view),
        );

        let description = format!("Create view {}", view.path());
        let batch = self.execute_batch(&description, builder.finish()).await?;
        self.views = self.views.insert(view);
        Ok(batch)
    }

    /// Drops a view and its recorded definition.
    pub async fn drop_view(&mut self, path: &str) -> Result<ChangeBatch> {
        let key = self.resolve_cache_key(path).await?;
        let view = match self.views.get(&key) {
            Some(view) => view.clone(),
            None => self
                .load_views(&[path.to_string()])
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| SyncError::ViewNotFound(path.to_string()))?,
        };

        let metadata = self.metadata_table();
        let schema = match &view.schema {
            Some(schema) => schema.clone(),
            None => self.default_schema().await?,
        };

        let mut builder = BatchBuilder::new();
        builder.push(
            self.dialect
                .delete_view_metadata_sql(&metadata, &schema, &view),
            self.dialect
                .insert_view_metadata_sql(&metadata, &schema, &view),
        );
        builder.push(
            self.dialect.drop_view_sql(&view),
            self.dialect.create_view_sql(&view),
        );

        let description = format!("Drop view {}", view.path());
        let batch = self.execute_batch(&description, builder.finish()).await?;
        self.views = self.views.remove(&view.path());
        Ok(batch)
    }
}
