//! PostgreSQL sessions over a single `sqlx::PgConnection`.

use async_trait::async_trait;
use dbprobe_common::ConnectionParameters;
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgConnectOptions, PgConnection, PgTypeInfo};
use sqlx::query::Query;
use sqlx::{Connection, Encode, Postgres, Type};

use crate::connector::{BindValue, Connector, Row, Session};
use crate::error::DbError;
use crate::rows::decode_row;

/// Opens plain (non-pooled) PostgreSQL connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector;

#[async_trait]
impl Connector for PgConnector {
    async fn open(&self, params: &ConnectionParameters) -> Result<Box<dyn Session>, DbError> {
        let options = PgConnectOptions::new()
            .host(&params.host)
            .port(params.port)
            .username(&params.user)
            .password(&params.password)
            .database(&params.database)
            .application_name(&params.application_name);

        // sqlx never opens an implicit transaction, so every statement autocommits.
        let conn = tokio::time::timeout(
            params.connect_timeout(),
            PgConnection::connect_with(&options),
        )
        .await
        .map_err(|_| DbError::ConnectTimeout(params.connect_timeout_secs))??;

        Ok(Box::new(PgSession {
            conn: Some(conn),
            broken: false,
        }))
    }
}

/// One live PostgreSQL connection.
pub struct PgSession {
    conn: Option<PgConnection>,
    broken: bool,
}

impl PgSession {
    fn conn(&mut self) -> Result<&mut PgConnection, DbError> {
        self.conn.as_mut().ok_or(DbError::Closed)
    }

    /// Remember transport-level failures so later callers can skip the
    /// round-trip.
    fn note(&mut self, err: sqlx::Error) -> DbError {
        if matches!(
            err,
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::Protocol(_) | sqlx::Error::WorkerCrashed
        ) {
            self.broken = true;
        }
        DbError::Driver(err)
    }
}

/// A [`BindValue`] as sent to the server.
///
/// NULL goes out with OID 0 (unspecified) so PostgreSQL infers the parameter
/// type from the statement; every other variant declares its own type.
struct PgBind<'a>(&'a BindValue);

/// Parameter type declared for a bind value.
fn param_type(bind: &BindValue) -> PgTypeInfo {
    match bind {
        BindValue::Null => PgTypeInfo::with_oid(Oid(0)),
        BindValue::Bool(_) => <bool as Type<Postgres>>::type_info(),
        BindValue::Int(_) => <i64 as Type<Postgres>>::type_info(),
        BindValue::Float(_) => <f64 as Type<Postgres>>::type_info(),
        BindValue::Text(_) => <String as Type<Postgres>>::type_info(),
    }
}

impl Type<Postgres> for PgBind<'_> {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl Encode<'_, Postgres> for PgBind<'_> {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        match self.0 {
            BindValue::Null => Ok(IsNull::Yes),
            BindValue::Bool(v) => <bool as Encode<'_, Postgres>>::encode_by_ref(v, buf),
            BindValue::Int(v) => <i64 as Encode<'_, Postgres>>::encode_by_ref(v, buf),
            BindValue::Float(v) => <f64 as Encode<'_, Postgres>>::encode_by_ref(v, buf),
            BindValue::Text(v) => <String as Encode<'_, Postgres>>::encode_by_ref(v, buf),
        }
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(param_type(self.0))
    }
}

/// Bind values positionally. Statements are not cached on the connection:
/// the scratch table is dropped and recreated between runs.
fn bind_all<'q>(sql: &'q str, binds: &'q [BindValue]) -> Query<'q, Postgres, PgArguments> {
    binds
        .iter()
        .fold(sqlx::query(sql).persistent(false), |query, bind| {
            query.bind(PgBind(bind))
        })
}

#[async_trait]
impl Session for PgSession {
    async fn probe(&mut self) -> Result<i64, DbError> {
        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(self.conn()?)
            .await;
        match result {
            Ok(value) => Ok(value.into()),
            Err(e) => Err(self.note(e)),
        }
    }

    async fn execute(&mut self, sql: &str, binds: &[BindValue]) -> Result<u64, DbError> {
        let result = bind_all(sql, binds).execute(self.conn()?).await;
        match result {
            Ok(done) => Ok(done.rows_affected()),
            Err(e) => Err(self.note(e)),
        }
    }

    async fn fetch_all(&mut self, sql: &str, binds: &[BindValue]) -> Result<Vec<Row>, DbError> {
        let result = bind_all(sql, binds).fetch_all(self.conn()?).await;
        match result {
            Ok(rows) => Ok(rows.iter().map(decode_row).collect::<Result<_, _>>()?),
            Err(e) => Err(self.note(e)),
        }
    }

    fn is_closed(&self) -> bool {
        self.conn.is_none() || self.broken
    }

    async fn close(&mut self) -> Result<(), DbError> {
        if let Some(conn) = self.conn.take() {
            conn.close().await?;
        }
        Ok(())
    }
}
