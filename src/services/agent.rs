// Translation + execution collaborator.
//
// The orchestrator hands a question and a live backend handle to a QueryAgent
// and gets back columns + rows plus the generated query text. The production
// implementation asks an OpenAI-compatible LLM gateway for a query, executes
// it against the handle, and converts driver rows into JSON values.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mysql_async::prelude::*;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_postgres::types::Type as PgType;

use crate::api::middleware::AppError;
use crate::config::Config;
use crate::services::registry::RelationalHandle;

const DEFAULT_DOCUMENT_LIMIT: i64 = 50;

/// Output of one translate-and-execute round
#[derive(Debug, Clone, Default)]
pub struct AgentOutput {
    pub generated_sql: Option<String>,
    pub generated_filter: Option<Value>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// External collaborator that turns a natural-language question into a query
/// and runs it against the supplied backend handle
#[async_trait]
pub trait QueryAgent: Send + Sync {
    async fn run_sql(
        &self,
        handle: &RelationalHandle,
        question: &str,
        temperature: f32,
    ) -> Result<AgentOutput, AppError>;

    async fn run_document(
        &self,
        client: &mongodb::Client,
        database: &str,
        question: &str,
        temperature: f32,
    ) -> Result<AgentOutput, AppError>;
}

const SQL_SYSTEM_PROMPT: &str = r#"You are a SQL expert. Given a natural language question, generate a single valid SELECT query answering it.

Instructions:
1. Generate ONLY a valid SELECT query
2. Do not include any explanations or markdown formatting
3. Return ONLY the SQL query, nothing else"#;

const DOCUMENT_SYSTEM_PROMPT: &str = r#"You are a MongoDB expert. Given a natural language question, produce a JSON query plan of the form:
{"collection": "<name>", "filter": {<mongodb filter document>}, "limit": <max documents>}

Instructions:
1. Return ONLY the JSON object, nothing else
2. The filter must be a valid MongoDB query document
3. Omit "limit" to use the default"#;

/// Query agent backed by an OpenAI-compatible chat-completions gateway
pub struct LlmAgent {
    gateway_url: String,
    api_key: Option<String>,
    model: String,
    http_client: HttpClient,
}

#[derive(Debug, Deserialize)]
struct MongoPlan {
    collection: String,
    #[serde(default)]
    filter: Option<Value>,
    #[serde(default)]
    limit: Option<i64>,
}

impl LlmAgent {
    pub fn new(config: &Config) -> Self {
        Self {
            gateway_url: config.llm.gateway_url.trim_end_matches('/').to_string(),
            api_key: config.llm.api_key.clone(),
            model: config.llm.model.clone(),
            http_client: HttpClient::new(),
        }
    }

    /// One chat-completion round against the gateway
    async fn complete(&self, system: &str, user: &str, temperature: f32) -> Result<String, AppError> {
        let body = json!({
            "model": self.model,
            "temperature": temperature,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });

        let mut request = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.gateway_url))
            .json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::AgentExecution(format!("gateway request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::AgentExecution(format!(
                "gateway returned status {}",
                response.status()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| AppError::AgentExecution(format!("malformed gateway response: {}", e)))?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AppError::AgentExecution("gateway response missing content".to_string()))
    }
}

#[async_trait]
impl QueryAgent for LlmAgent {
    async fn run_sql(
        &self,
        handle: &RelationalHandle,
        question: &str,
        temperature: f32,
    ) -> Result<AgentOutput, AppError> {
        let raw = self.complete(SQL_SYSTEM_PROMPT, question, temperature).await?;
        let sql = strip_code_fences(&raw);
        tracing::info!("Agent generated SQL: {}", sql);

        let (columns, rows) = match handle {
            RelationalHandle::Postgres(pool) => execute_postgres(pool, &sql).await?,
            RelationalHandle::MySql(pool) => execute_mysql(pool, &sql).await?,
        };

        Ok(AgentOutput {
            generated_sql: Some(sql),
            generated_filter: None,
            columns,
            rows,
        })
    }

    async fn run_document(
        &self,
        client: &mongodb::Client,
        database: &str,
        question: &str,
        temperature: f32,
    ) -> Result<AgentOutput, AppError> {
        let raw = self.complete(DOCUMENT_SYSTEM_PROMPT, question, temperature).await?;
        let plan: MongoPlan = serde_json::from_str(extract_json_object(&raw))
            .map_err(|e| AppError::AgentExecution(format!("unparseable query plan: {}", e)))?;
        tracing::info!("Agent generated filter for collection {}", plan.collection);

        let filter_value = plan.filter.clone().unwrap_or_else(|| json!({}));
        let (columns, rows) = execute_mongo_find(client, database, &plan).await?;

        Ok(AgentOutput {
            generated_sql: None,
            generated_filter: Some(json!({
                "collection": plan.collection,
                "filter": filter_value,
            })),
            columns,
            rows,
        })
    }
}

async fn execute_postgres(
    pool: &deadpool_postgres::Pool,
    sql: &str,
) -> Result<(Vec<String>, Vec<Vec<Value>>), AppError> {
    let client = pool
        .get()
        .await
        .map_err(|e| AppError::AgentExecution(format!("failed to get connection from pool: {}", e)))?;

    let statement = client
        .prepare(sql)
        .await
        .map_err(|e| AppError::AgentExecution(format!("query preparation failed: {}", e)))?;

    let rows = client.query(&statement, &[]).await.map_err(|e| {
        let details = if let Some(db_error) = e.as_db_error() {
            format!("code: {}, message: {}", db_error.code().code(), db_error.message())
        } else {
            e.to_string()
        };
        AppError::AgentExecution(format!("query execution failed: {}", details))
    })?;

    let columns: Vec<String> = statement.columns().iter().map(|c| c.name().to_string()).collect();

    let mut result_rows = Vec::with_capacity(rows.len());
    for row in rows {
        let mut values = Vec::with_capacity(columns.len());
        for (idx, column) in row.columns().iter().enumerate() {
            values.push(pg_value_to_json(&row, idx, column.type_()));
        }
        result_rows.push(values);
    }

    Ok((columns, result_rows))
}

fn pg_value_to_json(row: &tokio_postgres::Row, idx: usize, ty: &PgType) -> Value {
    fn fetch<'a, T>(row: &'a tokio_postgres::Row, idx: usize) -> Value
    where
        T: tokio_postgres::types::FromSql<'a> + serde::Serialize,
    {
        match row.try_get::<_, Option<T>>(idx) {
            Ok(Some(v)) => json!(v),
            _ => Value::Null,
        }
    }

    if *ty == PgType::INT2 {
        fetch::<i16>(row, idx)
    } else if *ty == PgType::INT4 {
        fetch::<i32>(row, idx)
    } else if *ty == PgType::INT8 {
        fetch::<i64>(row, idx)
    } else if *ty == PgType::FLOAT4 {
        fetch::<f32>(row, idx)
    } else if *ty == PgType::FLOAT8 {
        fetch::<f64>(row, idx)
    } else if *ty == PgType::BOOL {
        fetch::<bool>(row, idx)
    } else {
        // TEXT, VARCHAR, TIMESTAMP, UUID, NUMERIC and friends go through
        // their string representation
        fetch::<String>(row, idx)
    }
}

async fn execute_mysql(
    pool: &mysql_async::Pool,
    sql: &str,
) -> Result<(Vec<String>, Vec<Vec<Value>>), AppError> {
    let mut conn = pool
        .get_conn()
        .await
        .map_err(|e| AppError::AgentExecution(format!("failed to get connection from pool: {}", e)))?;

    let rows: Vec<mysql_async::Row> = conn
        .query(sql)
        .await
        .map_err(|e| AppError::AgentExecution(format!("query execution failed: {}", e)))?;

    let columns: Vec<String> = rows
        .first()
        .map(|row| row.columns_ref().iter().map(|c| c.name_str().to_string()).collect())
        .unwrap_or_default();

    let mut result_rows = Vec::with_capacity(rows.len());
    for row in rows {
        let mut values = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            let value = match row.get_opt::<mysql_async::Value, usize>(idx) {
                Some(Ok(mysql_value)) => mysql_value_to_json(mysql_value),
                _ => Value::Null,
            };
            values.push(value);
        }
        result_rows.push(values);
    }

    Ok((columns, result_rows))
}

fn mysql_value_to_json(value: mysql_async::Value) -> Value {
    use mysql_async::Value as V;
    match value {
        V::NULL => Value::Null,
        V::Bytes(bytes) => json!(String::from_utf8_lossy(&bytes).to_string()),
        V::Int(i) => json!(i),
        V::UInt(u) => json!(u),
        V::Float(f) => json!(f),
        V::Double(d) => json!(d),
        V::Date(year, month, day, hour, minute, second, _micros) => {
            json!(format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            ))
        }
        V::Time(negative, days, hours, minutes, seconds, _micros) => {
            let sign = if negative { "-" } else { "" };
            json!(format!(
                "{}{:02}:{:02}:{:02}",
                sign,
                u32::from(hours) + days * 24,
                minutes,
                seconds
            ))
        }
    }
}

async fn execute_mongo_find(
    client: &mongodb::Client,
    database: &str,
    plan: &MongoPlan,
) -> Result<(Vec<String>, Vec<Vec<Value>>), AppError> {
    let filter: Document = match &plan.filter {
        Some(value) => mongodb::bson::to_document(value)
            .map_err(|e| AppError::AgentExecution(format!("invalid filter document: {}", e)))?,
        None => doc! {},
    };

    let collection = client.database(database).collection::<Document>(&plan.collection);
    let mut cursor = collection
        .find(filter)
        .limit(plan.limit.unwrap_or(DEFAULT_DOCUMENT_LIMIT))
        .await
        .map_err(|e| AppError::AgentExecution(format!("find failed: {}", e)))?;

    let mut documents: Vec<Document> = Vec::new();
    while let Some(document) = cursor
        .try_next()
        .await
        .map_err(|e| AppError::AgentExecution(format!("cursor read failed: {}", e)))?
    {
        documents.push(document);
    }

    // Columns are field names in order of first appearance across documents
    let mut columns: Vec<String> = Vec::new();
    for document in &documents {
        for key in document.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }

    let rows = documents
        .into_iter()
        .map(|document| {
            columns
                .iter()
                .map(|column| {
                    document
                        .get(column)
                        .cloned()
                        .map(bson_to_json)
                        .unwrap_or(Value::Null)
                })
                .collect()
        })
        .collect();

    Ok((columns, rows))
}

fn bson_to_json(value: Bson) -> Value {
    value.into_relaxed_extjson()
}

/// Strip markdown code fences the model sometimes wraps around its answer
fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```sql")
        .or_else(|| trimmed.strip_prefix("```json"))
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open.strip_suffix("```").unwrap_or(without_open).trim().to_string()
}

/// Slice out the first top-level JSON object in a possibly chatty reply
fn extract_json_object(raw: &str) -> &str {
    let stripped = raw.trim();
    match (stripped.find('{'), stripped.rfind('}')) {
        (Some(start), Some(end)) if end > start => &stripped[start..=end],
        _ => stripped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("SELECT 1"), "SELECT 1");
        assert_eq!(strip_code_fences("```sql\nSELECT 1\n```"), "SELECT 1");
        assert_eq!(strip_code_fences("```\nSELECT 1\n```"), "SELECT 1");
        assert_eq!(strip_code_fences("  SELECT 1  "), "SELECT 1");
    }

    #[test]
    fn test_extract_json_object() {
        let raw = "Here is the plan: {\"collection\": \"users\", \"filter\": {}} hope it helps";
        let plan: MongoPlan = serde_json::from_str(extract_json_object(raw)).unwrap();
        assert_eq!(plan.collection, "users");
        assert!(plan.limit.is_none());
    }

    #[test]
    fn test_mysql_value_conversion() {
        use mysql_async::Value as V;
        assert_eq!(mysql_value_to_json(V::NULL), Value::Null);
        assert_eq!(mysql_value_to_json(V::Int(-7)), json!(-7));
        assert_eq!(mysql_value_to_json(V::UInt(7)), json!(7));
        assert_eq!(mysql_value_to_json(V::Bytes(b"abc".to_vec())), json!("abc"));
        assert_eq!(
            mysql_value_to_json(V::Date(2024, 5, 1, 12, 30, 0, 0)),
            json!("2024-05-01 12:30:00")
        );
    }

    #[test]
    fn test_bson_scalar_conversion() {
        assert_eq!(bson_to_json(Bson::Int32(5)), json!(5));
        assert_eq!(bson_to_json(Bson::String("x".to_string())), json!("x"));
        assert_eq!(bson_to_json(Bson::Null), Value::Null);
    }
}
