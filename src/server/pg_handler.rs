use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::info;
use pgwire::{
    api::{
        query::SimpleQueryHandler,
        results::{DataRowEncoder, FieldFormat, FieldInfo, QueryResponse, Response, Tag},
        ClientInfo, Type,
    },
    error::{PgWireError, PgWireResult},
};

use crate::{
    sql::session::Session,
    storage::{self, Value},
};

pub struct PostgresHandler {
    pub session: Arc<Mutex<Session>>,
}

impl PostgresHandler {
    pub fn new(session: Arc<Mutex<Session>>) -> Self {
        Self { session }
    }
}

fn pg_type(col_type: storage::Type) -> Type {
    match col_type {
        storage::Type::Int32 => Type::INT4,
        storage::Type::BigInt64 => Type::INT8,
        storage::Type::Float32 => Type::FLOAT4,
        storage::Type::Char(_) => Type::VARCHAR,
        storage::Type::DateTime64 => Type::INT8,
    }
}

fn pg_err(msg: impl std::fmt::Display) -> PgWireError {
    PgWireError::ApiError(Box::new(std::io::Error::new(std::io::ErrorKind::Other, msg.to_string())))
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Int32(v) => Some(v.to_string()),
        Value::BigInt64(v) => Some(v.to_string()),
        Value::Float32(v) => Some(v.to_string()),
        Value::Char(s) => Some(s.clone()),
        Value::DateTime64(v) => Some(v.to_string()),
    }
}

#[async_trait]
impl SimpleQueryHandler for PostgresHandler {
    async fn do_query<'b, C>(&self, _client: &C, query: &'b str) -> PgWireResult<Vec<Response<'b>>>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        info!("query: {}", query);

        let result = {
            let mut session = self.session.lock().map_err(pg_err)?;
            session.execute(query)
        };

        let result = result.map_err(pg_err)?;

        if result.schema.is_empty() {
            return Ok(vec![Response::Execution(Tag::new_for_execution("OK", Some(result.rows.len())))]);
        }

        let fields: Vec<FieldInfo> = result
            .schema
            .columns
            .iter()
            .map(|c| FieldInfo::new(c.name.clone(), None, None, pg_type(c.col_type), FieldFormat::Text))
            .collect();
        let fields = Arc::new(fields);

        let rows = result.rows.into_iter().map(move |tuple| {
            let fields = fields.clone();
            let mut encoder = DataRowEncoder::new(fields);
            for value in tuple.values() {
                encoder.encode_field(&value_text(value))?;
            }
            encoder.finish()
        });

        let schema = Arc::new(
            result
                .schema
                .columns
                .iter()
                .map(|c| FieldInfo::new(c.name.clone(), None, None, pg_type(c.col_type), FieldFormat::Text))
                .collect::<Vec<_>>(),
        );

        let stream = Box::pin(futures::stream::iter(rows));
        Ok(vec![Response::Query(QueryResponse::new(schema, stream))])
    }
}
