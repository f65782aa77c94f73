use log::warn;

use crate::{storage::{Schema, Tuple}, transaction::Transaction, types::DbResult};

use super::sql_handler::handle_sql;

/// Column shape plus the rows produced by one statement. `CREATE TABLE`
/// and other DDL return an empty schema and no rows; DML returns the
/// single `affected_rows` summary row its executor produces; `SELECT`
/// returns whatever rows its operator tree yields.
pub struct QueryResult {
    pub schema: Schema,
    pub rows: Vec<Tuple>,
}

/// One client connection's unit of interaction with the engine. Each
/// statement runs in its own transaction: strict 2PL means nothing
/// needs to span statements unless a client explicitly starts one, and
/// this engine doesn't expose multi-statement transactions over the
/// wire protocol.
pub struct Session {}

impl Session {
    pub fn new() -> Self {
        Self {}
    }

    pub fn execute(&mut self, sql_text: &str) -> DbResult<QueryResult> {
        let tx = Transaction::new();
        match handle_sql(&tx, sql_text) {
            Ok(result) => {
                tx.commit()?;
                Ok(result)
            }
            Err(e) => {
                if let Err(abort_err) = tx.abort() {
                    warn!("abort after failed statement also failed: {}", abort_err);
                }
                Err(e)
            }
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
