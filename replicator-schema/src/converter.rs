use replicator_connector::SchemaConverter;
use replicator_types::{ColumnDef, EndpointKind, Result, SourceTableSchema};

use crate::generic::{self, GenericType};
use crate::render;

/// The default converter every task uses unless a future endpoint kind
/// needs bespoke handling. Unmapped source types fall back to a target
/// string/varchar column rather than failing the task, logging a warning
/// so the gap is visible without aborting the whole run.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicSchemaConverter;

impl SchemaConverter for BasicSchemaConverter {
    fn convert(
        &self,
        source: &SourceTableSchema,
        _source_kind: EndpointKind,
        target_kind: EndpointKind,
    ) -> Result<SourceTableSchema> {
        let columns = source
            .columns
            .iter()
            .map(|col| convert_column(col, target_kind))
            .collect();

        Ok(SourceTableSchema {
            schema: source.schema.clone(),
            table: source.table.clone(),
            columns,
            primary_key: source.primary_key.clone(),
        })
    }
}

fn convert_column(col: &ColumnDef, target_kind: EndpointKind) -> ColumnDef {
    let base = col.base_type.to_uppercase();
    let generic = generic::lookup(&base).or_else(|| generic::lookup_prefix(&base));

    let generic = match generic {
        Some(g) => g,
        None => {
            tracing::warn!(
                column = %col.name,
                base_type = %col.base_type,
                "unmapped source type, defaulting to target string/varchar"
            );
            GenericType::Varchar
        }
    };

    let target_type = render::render(generic, target_kind, col.length, col.precision, col.scale);

    ColumnDef {
        name: col.name.clone(),
        base_type: target_type,
        length: col.length,
        precision: col.precision,
        scale: col.scale,
        nullable: col.nullable,
        pk: col.pk,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, base_type: &str) -> ColumnDef {
        ColumnDef {
            name: name.into(),
            base_type: base_type.into(),
            length: Some(100),
            precision: None,
            scale: None,
            nullable: true,
            pk: false,
        }
    }

    fn oracle_employees() -> SourceTableSchema {
        SourceTableSchema {
            schema: "HR".into(),
            table: "EMPLOYEES".into(),
            columns: vec![col("NAME", "VARCHAR2"), col("HIRE_DATE", "DATE")],
            primary_key: vec!["ID".into()],
        }
    }

    #[test]
    fn maps_known_oracle_types_to_postgres() {
        let converter = BasicSchemaConverter;
        let target = converter
            .convert(&oracle_employees(), EndpointKind::Oracle, EndpointKind::Postgres)
            .unwrap();
        assert_eq!(target.columns[0].base_type, "VARCHAR(100)");
        assert_eq!(target.columns[1].base_type, "TIMESTAMP");
    }

    #[test]
    fn unmapped_type_falls_back_to_varchar() {
        let converter = BasicSchemaConverter;
        let source = SourceTableSchema {
            schema: "HR".into(),
            table: "T".into(),
            columns: vec![col("WEIRD", "SOME_EXOTIC_TYPE")],
            primary_key: vec![],
        };
        let target = converter
            .convert(&source, EndpointKind::Oracle, EndpointKind::Mysql)
            .unwrap();
        assert_eq!(target.columns[0].base_type, "VARCHAR(100)");
    }
}
