//! Connection + table lifecycle: open/connection/initialize/table_exists/
//! stats, narrowed to the single `chunks` table this crate needs.

use lancedb::connection::Connection;
use lancedb::Table;

use crate::error::KbError;
use crate::schema::{chunk_schema, TABLE_CHUNKS};

pub struct Database {
    connection: Connection,
    embedding_dim: usize,
}

impl Database {
    pub async fn open(path: &str, embedding_dim: usize) -> Result<Self, KbError> {
        let connection = lancedb::connect(path).execute().await?;
        let db = Self { connection, embedding_dim };
        db.initialize().await?;
        Ok(db)
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    async fn table_exists(&self, name: &str) -> Result<bool, KbError> {
        Ok(self.connection.table_names().execute().await?.iter().any(|n| n == name))
    }

    async fn initialize(&self) -> Result<(), KbError> {
        if !self.table_exists(TABLE_CHUNKS).await? {
            self.connection
                .create_empty_table(TABLE_CHUNKS, chunk_schema(self.embedding_dim))
                .execute()
                .await?;
        }
        Ok(())
    }

    pub async fn chunks_table(&self) -> Result<Table, KbError> {
        Ok(self.connection.open_table(TABLE_CHUNKS).execute().await?)
    }

    pub async fn optimize(&self) -> Result<(), KbError> {
        let table = self.chunks_table().await?;
        table.optimize(lancedb::table::OptimizeAction::All).await?;
        Ok(())
    }
}
