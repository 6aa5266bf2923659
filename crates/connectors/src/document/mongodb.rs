//! MongoDB destination adapter. Unlike the SQL destinations, the `_id`
//! key is never stripped from the payload (spec.md's internal-field
//! convention exempts it) so upserts can key off it directly.

use model::core::value::Value;
use mongodb::{
    Client, Collection,
    bson::{self, Document, doc},
    options::ReplaceOptions,
};

use crate::error::{ConnectorError, DbError};

pub struct MongoAdapter {
    client: Client,
    database: String,
}

impl MongoAdapter {
    pub async fn connect(conn_str: &str, database: &str) -> Result<Self, ConnectorError> {
        let client = Client::with_uri_str(conn_str)
            .await
            .map_err(|e| ConnectorError::Provider(e.to_string()))?;
        Ok(MongoAdapter {
            client,
            database: database.to_string(),
        })
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.client.database(&self.database).collection(name)
    }

    /// Upsert keyed by `_id`, matching the driver's documented "replicates
    /// updates by full-document replace" behaviour.
    pub async fn upsert(
        &self,
        collection: &str,
        id: &Value,
        document: std::collections::BTreeMap<String, Value>,
    ) -> Result<(), DbError> {
        let filter = doc! { "_id": to_bson(id) };
        let mut replacement = Document::new();
        for (k, v) in document {
            replacement.insert(k, to_bson(&v));
        }
        self.collection(collection)
            .replace_one(filter, replacement)
            .with_options(ReplaceOptions::builder().upsert(true).build())
            .await
            .map_err(|e| DbError::Write(e.to_string()))?;
        Ok(())
    }

    pub async fn delete(&self, collection: &str, id: &Value) -> Result<(), DbError> {
        self.collection(collection)
            .delete_one(doc! { "_id": to_bson(id) })
            .await
            .map_err(|e| DbError::Write(e.to_string()))?;
        Ok(())
    }

    pub async fn collection_exists(&self, collection: &str) -> Result<bool, DbError> {
        let names = self
            .client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(|e| DbError::Provider(e.to_string()))?;
        Ok(names.contains(&collection.to_string()))
    }
}

fn to_bson(value: &Value) -> bson::Bson {
    match value {
        Value::Null => bson::Bson::Null,
        Value::Boolean(b) => bson::Bson::Boolean(*b),
        Value::Int(i) => bson::Bson::Int64(*i),
        Value::Float(f) => bson::Bson::Double(*f),
        Value::Decimal(d) => bson::Bson::String(d.to_string()),
        Value::String(s) => bson::Bson::String(s.clone()),
        Value::Uuid(u) => bson::Bson::String(u.to_string()),
        Value::Date(d) => bson::Bson::String(d.to_string()),
        Value::Timestamp(t) => bson::Bson::DateTime(bson::DateTime::from_chrono(*t)),
        Value::Bytes(b) => bson::Bson::Binary(bson::Binary {
            subtype: bson::spec::BinarySubtype::Generic,
            bytes: b.clone(),
        }),
        Value::Array(items) => bson::Bson::Array(items.iter().map(to_bson).collect()),
        Value::Json(json) => bson::to_bson(json).unwrap_or(bson::Bson::Null),
    }
}
