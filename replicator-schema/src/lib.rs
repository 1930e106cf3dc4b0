//! Source-to-target table schema conversion (C2): maps a `SourceTableSchema`
//! in one database's type vocabulary into another's, through a shared
//! generic type in between.

mod converter;
mod generic;
mod render;

pub use converter::BasicSchemaConverter;
pub use generic::GenericType;
