//! Generic SQL target connector (C4): table creation, snapshot load and
//! atomic batch apply for Oracle, PostgreSQL and MySQL targets, sharing one
//! `SqlDialect` for the per-database SQL text and one connector struct per
//! driver for connection handling and transaction control.

mod dialect;
mod factory;
mod mysql_target;
mod oracle_apply;
mod oracle_target;
mod postgres_target;

pub use dialect::{MySqlDialect, OracleDialect, PostgresDialect, SqlDialect, META_CREATE_COLUMN, META_UPDATE_COLUMN};
pub use factory::{MysqlTargetConnectorFactory, OracleTargetConnectorFactory, PostgresTargetConnectorFactory};
pub use mysql_target::MysqlTargetConnector;
pub use oracle_target::OracleTargetConnector;
pub use postgres_target::PostgresTargetConnector;
