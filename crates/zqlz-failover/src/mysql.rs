//! MySQL / MariaDB wire adapter over `mysql_async`
//!
//! Every link owns one `mysql_async::Conn`; there is no pooling underneath.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Timelike};
use mysql_async::consts::ColumnType;
use mysql_async::prelude::*;
use mysql_async::{Conn, DriverError, OptsBuilder, Params, Row as MySqlRow};
use tokio::sync::Mutex;
use zqlz_core::{HostAddress, QueryResult, Result, Value, ZqlzError};

use crate::link::{Credentials, LinkOptions, WireConnector, WireSession};

/// Access denied for user
const ER_ACCESS_DENIED_ERROR: u16 = 1045;

/// Server codes that mean the session is gone
const CONNECTION_LOST_CODES: &[u16] = &[
    1053, // ER_SERVER_SHUTDOWN
    1077, // ER_NORMAL_SHUTDOWN
    1078, // ER_GOT_SIGNAL
    1079, // ER_SHUTDOWN_COMPLETE
    1080, // ER_FORCING_CLOSE
    1152, // ER_ABORTING_CONNECTION
    1927, // ER_CONNECTION_KILLED
];

/// Link parameter holding a statement run right after connecting
pub const INIT_COMMAND_PARAM: &str = "init_command";

/// Opens plain `mysql_async` connections
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlConnector;

#[async_trait]
impl WireConnector for MySqlConnector {
    async fn open(
        &self,
        host: &HostAddress,
        credentials: &Credentials,
        options: &LinkOptions,
    ) -> Result<Box<dyn WireSession>> {
        tracing::debug!(host = %host, database = ?options.database, "connecting to MySQL host");

        let mut builder = OptsBuilder::default()
            .ip_or_hostname(host.host.clone())
            .tcp_port(host.port)
            .user(credentials.username.clone())
            .pass(credentials.password().map(str::to_string))
            .db_name(options.database.clone());
        if let Some(init) = options.params.get(INIT_COMMAND_PARAM) {
            builder = builder.init(vec![init.clone()]);
        }

        let conn = Conn::new(builder).await.map_err(map_error)?;
        Ok(Box::new(MySqlSession {
            conn: Mutex::new(Some(conn)),
            closed: AtomicBool::new(false),
        }))
    }
}

struct MySqlSession {
    conn: Mutex<Option<Conn>>,
    closed: AtomicBool,
}

#[async_trait]
impl WireSession for MySqlSession {
    async fn run_query(&self, text: &str, params: &[Value]) -> Result<QueryResult> {
        let mut guard = self.conn.lock().await;
        let Some(conn) = guard.as_mut() else {
            return Err(ZqlzError::Connection("MySQL session is closed".into()));
        };

        let started = std::time::Instant::now();
        let outcome = if params.is_empty() {
            conn.query::<MySqlRow, _>(text).await
        } else {
            let params = Params::Positional(params.iter().map(to_mysql_value).collect());
            conn.exec::<MySqlRow, _, _>(text, params).await
        };

        match outcome {
            Ok(rows) => {
                let mut result = convert_rows(rows);
                result.affected_rows = conn.affected_rows();
                result.execution_time_ms = started.elapsed().as_millis() as u64;
                Ok(result)
            }
            Err(e) => {
                let err = map_error(e);
                if err.is_connectivity() {
                    self.closed.store(true, Ordering::SeqCst);
                    guard.take();
                }
                Err(err)
            }
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        match self.conn.lock().await.take() {
            Some(conn) => conn.disconnect().await.map_err(map_error),
            None => Ok(()),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Classify a `mysql_async` error
pub fn map_error(err: mysql_async::Error) -> ZqlzError {
    match err {
        mysql_async::Error::Io(e) => ZqlzError::Connection(e.to_string()),
        mysql_async::Error::Driver(e) if is_transport_error(&e) => {
            ZqlzError::Connection(e.to_string())
        }
        mysql_async::Error::Driver(e) => ZqlzError::Query(e.to_string()),
        mysql_async::Error::Server(e) if e.code == ER_ACCESS_DENIED_ERROR => {
            ZqlzError::Authentication(e.message)
        }
        mysql_async::Error::Server(e) if CONNECTION_LOST_CODES.contains(&e.code) => {
            ZqlzError::Connection(format!("{} ({})", e.message, e.code))
        }
        mysql_async::Error::Server(e) => {
            ZqlzError::Query(format!("{} ({}, {})", e.message, e.code, e.state))
        }
        other => ZqlzError::Other(other.to_string()),
    }
}

/// Driver errors that leave the connection itself unusable; the rest are about
/// the statement being sent
fn is_transport_error(err: &DriverError) -> bool {
    matches!(
        err,
        DriverError::ConnectionClosed
            | DriverError::PacketOutOfOrder
            | DriverError::PacketTooLarge
            | DriverError::UnexpectedPacket { .. }
            | DriverError::PoolDisconnected
    )
}

fn convert_rows(rows: Vec<MySqlRow>) -> QueryResult {
    let (columns, types): (Vec<String>, Vec<ColumnType>) = rows
        .first()
        .map(|row| {
            row.columns_ref()
                .iter()
                .map(|col| (col.name_str().to_string(), col.column_type()))
                .unzip()
        })
        .unwrap_or_default();

    let values = rows
        .into_iter()
        .map(|row| {
            types
                .iter()
                .enumerate()
                .map(|(idx, col_type)| {
                    let value = row.as_ref(idx).cloned().unwrap_or(mysql_async::Value::NULL);
                    from_mysql_value(value, *col_type)
                })
                .collect()
        })
        .collect();

    QueryResult::from_rows(columns, values)
}

/// Convert a `mysql_async` value; text protocol bytes are parsed according
/// to the column type
fn from_mysql_value(value: mysql_async::Value, col_type: ColumnType) -> Value {
    match value {
        mysql_async::Value::NULL => Value::Null,
        mysql_async::Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(s) => match col_type {
                ColumnType::MYSQL_TYPE_TINY
                | ColumnType::MYSQL_TYPE_SHORT
                | ColumnType::MYSQL_TYPE_LONG
                | ColumnType::MYSQL_TYPE_LONGLONG
                | ColumnType::MYSQL_TYPE_INT24
                | ColumnType::MYSQL_TYPE_YEAR => s
                    .parse::<i64>()
                    .map(Value::Int64)
                    .or_else(|_| s.parse::<u64>().map(Value::UInt64))
                    .unwrap_or(Value::String(s)),
                ColumnType::MYSQL_TYPE_FLOAT
                | ColumnType::MYSQL_TYPE_DOUBLE
                | ColumnType::MYSQL_TYPE_DECIMAL
                | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
                    s.parse::<f64>().map(Value::Float64).unwrap_or(Value::String(s))
                }
                _ => Value::String(s),
            },
            Err(e) => Value::Bytes(e.into_bytes()),
        },
        mysql_async::Value::Int(i) => Value::Int64(i),
        mysql_async::Value::UInt(u) => Value::UInt64(u),
        mysql_async::Value::Float(f) => Value::Float64(f as f64),
        mysql_async::Value::Double(d) => Value::Float64(d),
        mysql_async::Value::Date(year, month, day, hour, min, sec, micro) => {
            NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
                .and_then(|d| d.and_hms_micro_opt(hour as u32, min as u32, sec as u32, micro))
                .map(Value::DateTime)
                .unwrap_or_else(|| {
                    Value::String(format!(
                        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                        year, month, day, hour, min, sec
                    ))
                })
        }
        mysql_async::Value::Time(negative, days, hours, mins, secs, micros) => {
            let total_hours = days * 24 + hours as u32;
            let sign = if negative { "-" } else { "" };
            Value::String(format!(
                "{}{:02}:{:02}:{:02}.{:06}",
                sign, total_hours, mins, secs, micros
            ))
        }
    }
}

fn to_mysql_value(value: &Value) -> mysql_async::Value {
    match value {
        Value::Null => mysql_async::Value::NULL,
        Value::Bool(b) => mysql_async::Value::Int(*b as i64),
        Value::Int64(i) => mysql_async::Value::Int(*i),
        Value::UInt64(u) => mysql_async::Value::UInt(*u),
        Value::Float64(f) => mysql_async::Value::Double(*f),
        Value::String(s) => mysql_async::Value::Bytes(s.clone().into_bytes()),
        Value::Bytes(b) => mysql_async::Value::Bytes(b.clone()),
        Value::DateTime(dt) => mysql_async::Value::Date(
            dt.year() as u16,
            dt.month() as u8,
            dt.day() as u8,
            dt.hour() as u8,
            dt.minute() as u8,
            dt.second() as u8,
            dt.and_utc().timestamp_subsec_micros(),
        ),
    }
}
