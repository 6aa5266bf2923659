//! DynamoDB destination adapter: `PutItem`/`DeleteItem` on a single table
//! keyed by the resource's `primary_key` route option.

use std::collections::BTreeMap;

use aws_sdk_dynamodb::{Client, types::AttributeValue};
use model::core::value::Value;

use crate::error::{ConnectorError, DbError};

pub struct DynamoDbAdapter {
    client: Client,
}

impl DynamoDbAdapter {
    pub async fn connect(region: Option<&str>) -> Result<Self, ConnectorError> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region.to_string()));
        }
        let config = loader.load().await;
        Ok(DynamoDbAdapter {
            client: Client::new(&config),
        })
    }

    pub async fn put_item(
        &self,
        table: &str,
        item: BTreeMap<String, Value>,
    ) -> Result<(), DbError> {
        let item = item
            .into_iter()
            .map(|(k, v)| (k, to_attribute_value(&v)))
            .collect();
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| DbError::Provider(e.to_string()))?;
        Ok(())
    }

    pub async fn delete_item(
        &self,
        table: &str,
        key_name: &str,
        key_value: &Value,
    ) -> Result<(), DbError> {
        self.client
            .delete_item()
            .table_name(table)
            .key(key_name, to_attribute_value(key_value))
            .send()
            .await
            .map_err(|e| DbError::Provider(e.to_string()))?;
        Ok(())
    }

    pub async fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        Ok(self.client.describe_table().table_name(table).send().await.is_ok())
    }
}

fn to_attribute_value(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Boolean(b) => AttributeValue::Bool(*b),
        Value::Int(i) => AttributeValue::N(i.to_string()),
        Value::Float(f) => AttributeValue::N(f.to_string()),
        Value::Decimal(d) => AttributeValue::N(d.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Uuid(u) => AttributeValue::S(u.to_string()),
        Value::Date(d) => AttributeValue::S(d.to_string()),
        Value::Timestamp(t) => AttributeValue::S(t.to_rfc3339()),
        Value::Bytes(b) => AttributeValue::B(aws_sdk_dynamodb::primitives::Blob::new(b.clone())),
        Value::Array(items) => {
            AttributeValue::L(items.iter().map(to_attribute_value).collect())
        }
        Value::Json(_) => AttributeValue::S(value.to_json().to_string()),
    }
}
