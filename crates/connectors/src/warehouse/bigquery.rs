//! BigQuery destination adapter. Schema changes go through the structured
//! Tables API (`planner::bigquery_schema::SchemaField`); row writes go
//! through the streaming `insertAll` API, which is append-only at the
//! wire level — the Mutability policy (spec.md §6) is enforced by the
//! driver layer choosing which tracking columns to attach, not by this
//! adapter.

use gcp_bigquery_client::{
    Client,
    model::{
        clustering::Clustering, table::Table, table_data_insert_all_request::TableDataInsertAllRequest,
        time_partitioning::TimePartitioning,
    },
};
use model::core::value::Value;
use model::route::TableOptions;
use planner::bigquery_schema::SchemaField;
use serde_json::{Map, Value as Json};

use crate::error::{ConnectorError, DbError};

pub struct BigQueryAdapter {
    client: Client,
    project_id: String,
    dataset_id: String,
}

impl BigQueryAdapter {
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub async fn connect(
        service_account_key_path: &str,
        project_id: &str,
        dataset_id: &str,
    ) -> Result<Self, ConnectorError> {
        let client = Client::from_service_account_key_file(service_account_key_path)
            .await
            .map_err(|e| ConnectorError::Provider(e.to_string()))?;
        Ok(BigQueryAdapter {
            client,
            project_id: project_id.to_string(),
            dataset_id: dataset_id.to_string(),
        })
    }

    pub async fn table_exists(&self, table_id: &str) -> Result<bool, DbError> {
        Ok(self
            .client
            .table()
            .get(&self.project_id, &self.dataset_id, table_id, None)
            .await
            .is_ok())
    }

    pub async fn create_table(
        &self,
        table_id: &str,
        fields: Vec<SchemaField>,
    ) -> Result<(), DbError> {
        self.create_table_with_options(table_id, fields, None).await
    }

    /// Like [`create_table`](Self::create_table), but also applies
    /// `tableOptions` (spec.md §3/§4.2): a `partitionBy` column becomes
    /// day-granularity time partitioning, `clusterBy` columns become the
    /// table's clustering fields. Only consumed at create time — the
    /// Tables API has no way to add partitioning/clustering after the
    /// fact, so an `alter` sync never touches it on an existing table.
    pub async fn create_table_with_options(
        &self,
        table_id: &str,
        fields: Vec<SchemaField>,
        table_options: Option<&TableOptions>,
    ) -> Result<(), DbError> {
        let schema = gcp_bigquery_client::model::table_schema::TableSchema::new(
            fields
                .into_iter()
                .map(|f| {
                    gcp_bigquery_client::model::table_field_schema::TableFieldSchema::new(
                        &f.name, &f.field_type,
                    )
                })
                .collect(),
        );
        let mut table = Table::new(&self.project_id, &self.dataset_id, table_id, schema);

        if let Some(options) = table_options {
            if let Some(partition_column) = &options.partition_by {
                table.time_partitioning = Some(TimePartitioning::per_day().with_field(partition_column));
            }
            if !options.cluster_by.is_empty() {
                table.clustering = Some(Clustering { fields: Some(options.cluster_by.clone()) });
            }
        }

        self.client
            .table()
            .create(table)
            .await
            .map_err(|e| DbError::Provider(e.to_string()))?;
        Ok(())
    }

    /// Field names on the live table's schema, or `None` if the table does
    /// not exist (spec.md §4.3: introspection distinguishes "missing
    /// table" from "empty schema").
    pub async fn schema_field_names(&self, table_id: &str) -> Result<Option<Vec<String>>, DbError> {
        match self.client.table().get(&self.project_id, &self.dataset_id, table_id, None).await {
            Ok(table) => Ok(Some(
                table
                    .schema
                    .and_then(|s| s.fields)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|f| f.name)
                    .collect(),
            )),
            Err(_) => Ok(None),
        }
    }

    /// Adds fields absent from the live schema; never renames, retypes, or
    /// drops a field (spec.md §4.2 "BigQuery schema").
    pub async fn add_schema_fields(&self, table_id: &str, new_fields: Vec<SchemaField>) -> Result<(), DbError> {
        let mut table = self
            .client
            .table()
            .get(&self.project_id, &self.dataset_id, table_id, None)
            .await
            .map_err(|e| DbError::Provider(e.to_string()))?;

        let schema = table.schema.get_or_insert_with(|| {
            gcp_bigquery_client::model::table_schema::TableSchema::new(Vec::new())
        });
        let fields = schema.fields.get_or_insert_with(Vec::new);
        let existing: std::collections::HashSet<String> = fields.iter().map(|f| f.name.clone()).collect();

        for field in new_fields {
            if !existing.contains(&field.name) {
                fields.push(gcp_bigquery_client::model::table_field_schema::TableFieldSchema::new(
                    &field.name,
                    &field.field_type,
                ));
            }
        }

        self.client
            .table()
            .update(&self.project_id, &self.dataset_id, table_id, table)
            .await
            .map_err(|e| DbError::Provider(e.to_string()))?;
        Ok(())
    }

    /// Drops the table, used by the `drop-create` sync strategy (spec.md
    /// §4.3). The caller re-creates it via [`create_table`] immediately
    /// after; BigQuery has no `ALTER TABLE DROP COLUMN` equivalent so this
    /// is a whole-table operation.
    pub async fn delete_table(&self, table_id: &str) -> Result<(), DbError> {
        self.client
            .table()
            .delete(&self.project_id, &self.dataset_id, table_id)
            .await
            .map_err(|e| DbError::Provider(e.to_string()))?;
        Ok(())
    }

    /// Appends rows via `tabledata.insertAll`. `_is_deleted`/`_operation_*`
    /// tracking columns, if present, must already be baked into `rows` by
    /// the driver (BigQuery has no native UPDATE-on-stream-insert).
    pub async fn insert_rows(
        &self,
        table_id: &str,
        rows: Vec<std::collections::BTreeMap<String, Value>>,
    ) -> Result<(), DbError> {
        let mut request = TableDataInsertAllRequest::new();
        for row in rows {
            let mut obj = Map::new();
            for (k, v) in row {
                obj.insert(k, value_to_json(&v));
            }
            request
                .add_row(None, Json::Object(obj))
                .map_err(|e| DbError::Write(e.to_string()))?;
        }
        let response = self
            .client
            .tabledata()
            .insert_all(&self.project_id, &self.dataset_id, table_id, request)
            .await
            .map_err(|e| DbError::Provider(e.to_string()))?;
        if let Some(errors) = response.insert_errors
            && !errors.is_empty()
        {
            return Err(DbError::Write(format!(
                "{} of the batch's rows were rejected by BigQuery",
                errors.len()
            )));
        }
        Ok(())
    }

    /// Runs arbitrary DML (`UPDATE`/`DELETE`) via the `jobs.query` API.
    /// The `insertAll` streaming path has no UPDATE/DELETE equivalent, so
    /// mutable-mode writes go through this instead (spec.md §4.5).
    pub async fn run_query(&self, sql: &str) -> Result<(), DbError> {
        let request = gcp_bigquery_client::model::query_request::QueryRequest::new(sql);
        self.client
            .job()
            .query(&self.project_id, request)
            .await
            .map_err(|e| DbError::Provider(e.to_string()))?;
        Ok(())
    }
}

fn value_to_json(value: &Value) -> Json {
    value.to_json()
}
