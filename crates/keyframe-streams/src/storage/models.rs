//! Row types of the two stream stores.

/// A relay store stream joined with its ingest token, if it has one.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RelayStream {
    pub id: i64,
    pub mpd_url: String,
    pub token: Option<String>,
}

/// A stream row of the ingest store.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct IngestStream {
    pub id: i64,
    pub active: bool,
    pub notify_url: String,
    pub token: String,
}
