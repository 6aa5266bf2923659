pub mod bigquery_schema;
pub mod ddl;
pub mod query;
