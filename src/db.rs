/// PostgreSQL access to the mangrove–marsh survey database.
///
/// Connection setup, schema verification, and the three report queries.
/// Every query is prepared first so its result columns can be validated
/// before any row is decoded: a missing column or a non-numeric measurement
/// column aborts the run with an input-validation error.
///
/// The expected tables are created by `sql/001_mangrove_marsh_schema.sql`.

use postgres::types::Type;
use postgres::{Client, NoTls, Row};

use crate::logging::{self, Component};
use crate::model::{
    EVENT_TYPE_MARKER_VISIT, MarkerDistance, ReportError, SideCover, StratumCover,
    ValidationError, VegetationCover,
};
use crate::source::SurveySource;

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// Connects and checks that `schema` exists.
pub fn connect_and_verify(url: &str, schema: &str) -> Result<Client, ReportError> {
    let mut client = Client::connect(url, NoTls)?;

    let row = client.query_one(
        "SELECT EXISTS (SELECT 1 FROM information_schema.schemata WHERE schema_name = $1)",
        &[&schema],
    )?;
    let exists: bool = row.get(0);
    if !exists {
        return Err(ReportError::Database(format!(
            "schema '{}' not found; apply sql/001_mangrove_marsh_schema.sql first",
            schema
        )));
    }

    logging::info(Component::Database, None, &format!("Connected to survey schema '{}'", schema));
    Ok(client)
}

// ---------------------------------------------------------------------------
// Column validation
// ---------------------------------------------------------------------------

/// Column types accepted where a measurement is required.
pub fn is_numeric_type(ty: &Type) -> bool {
    *ty == Type::FLOAT8
        || *ty == Type::FLOAT4
        || *ty == Type::INT2
        || *ty == Type::INT4
        || *ty == Type::INT8
}

/// Checks a result set's columns before decoding.
///
/// Every name in `required` must be present; every name in `numeric` must
/// also have a numeric type.
pub fn validate_columns(
    query: &str,
    columns: &[(&str, &Type)],
    required: &[&str],
    numeric: &[&str],
) -> Result<(), ValidationError> {
    for name in required.iter().chain(numeric) {
        let Some((_, ty)) = columns.iter().find(|(c, _)| c == name) else {
            return Err(ValidationError::MissingColumn {
                query: query.to_string(),
                column: name.to_string(),
            });
        };
        if numeric.contains(name) && !is_numeric_type(ty) {
            return Err(ValidationError::NonNumericColumn {
                query: query.to_string(),
                column: name.to_string(),
                found: ty.name().to_string(),
            });
        }
    }
    Ok(())
}

/// Reads a nullable numeric column as `f64` whatever its integer/float width.
fn numeric(row: &Row, column: &str) -> Result<Option<f64>, ReportError> {
    let ty = row
        .columns()
        .iter()
        .find(|c| c.name() == column)
        .map(|c| c.type_().clone())
        .ok_or_else(|| ReportError::Database(format!("column '{}' not in row", column)))?;

    let value = if ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(column)?
    } else if ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(column)?.map(f64::from)
    } else if ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(column)?.map(f64::from)
    } else if ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(column)?.map(f64::from)
    } else if ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(column)?.map(|v| v as f64)
    } else {
        return Err(ValidationError::NonNumericColumn {
            query: "row decode".to_string(),
            column: column.to_string(),
            found: ty.name().to_string(),
        }
        .into());
    };
    Ok(value)
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

const MARKER_QUERY: &str = "marker distances";
const VEGETATION_QUERY: &str = "vegetation cover";
const STRATUM_QUERY: &str = "stratum cover";

fn marker_distance_sql(schema: &str) -> String {
    format!(
        "SELECT eg.event_group_id, eg.event_group_name, eg.start_date,
                l.region, l.segment, l.location_name, m.distance, m.method
         FROM {s}.tbl_markerdata m
         JOIN {s}.tbl_events e ON e.event_id = m.event_id
         JOIN {s}.tbl_event_group eg ON eg.event_group_id = e.event_group_id
         JOIN {s}.tbl_locations l ON l.location_id = e.location_id
         WHERE e.event_type = $1
         ORDER BY l.segment, l.location_name",
        s = schema
    )
}

fn vegetation_cover_sql(schema: &str) -> String {
    format!(
        "SELECT v.community_type, v.vegetation_type, lu.scientific_name,
                l.segment, l.location_name, v.percent_cover
         FROM {s}.tbl_markerdata_vegetation v
         JOIN {s}.tbl_markerdata m ON m.point_id = v.point_id
         JOIN {s}.tbl_events e ON e.event_id = m.event_id
         JOIN {s}.tbl_locations l ON l.location_id = e.location_id
         LEFT JOIN {s}.tlu_vegetation lu ON lu.species_code = v.species_code
         WHERE e.event_type = $1 AND v.percent_cover IS NOT NULL",
        s = schema
    )
}

fn stratum_cover_sql(schema: &str) -> String {
    format!(
        "SELECT l.location_id, l.order_id, l.location_name, eg.start_date,
                m.mangroveside_cover_overall, m.mangroveside_cover_tree,
                m.mangroveside_cover_shrub, m.mangroveside_cover_herb,
                m.marshside_cover_overall, m.marshside_cover_tree,
                m.marshside_cover_shrub, m.marshside_cover_herb
         FROM {s}.tbl_markerdata m
         JOIN {s}.tbl_events e ON e.event_id = m.event_id
         JOIN {s}.tbl_event_group eg ON eg.event_group_id = e.event_group_id
         JOIN {s}.tbl_locations l ON l.location_id = e.location_id
         WHERE e.event_type = $1
         ORDER BY l.order_id, l.location_name, eg.start_date",
        s = schema
    )
}

const STRATUM_COVER_COLUMNS: [&str; 8] = [
    "mangroveside_cover_overall",
    "mangroveside_cover_tree",
    "mangroveside_cover_shrub",
    "mangroveside_cover_herb",
    "marshside_cover_overall",
    "marshside_cover_tree",
    "marshside_cover_shrub",
    "marshside_cover_herb",
];

// ---------------------------------------------------------------------------
// PostgreSQL source
// ---------------------------------------------------------------------------

pub struct PostgresSource {
    client: Client,
    schema: String,
}

impl PostgresSource {
    pub fn new(client: Client, schema: impl Into<String>) -> Self {
        PostgresSource {
            client,
            schema: schema.into(),
        }
    }

    /// Prepares `sql`, validates its columns, and runs it for Marker Visit events.
    fn fetch(
        &mut self,
        query: &str,
        sql: &str,
        required: &[&str],
        numeric: &[&str],
    ) -> Result<Vec<Row>, ReportError> {
        let statement = self.client.prepare(sql)?;
        let columns: Vec<(&str, &Type)> = statement
            .columns()
            .iter()
            .map(|c| (c.name(), c.type_()))
            .collect();
        validate_columns(query, &columns, required, numeric)?;

        let rows = self.client.query(&statement, &[&EVENT_TYPE_MARKER_VISIT])?;
        logging::info(
            Component::Database,
            None,
            &format!("Fetched {} {} records", rows.len(), query),
        );
        Ok(rows)
    }
}

impl SurveySource for PostgresSource {
    fn marker_distances(&mut self) -> Result<Vec<MarkerDistance>, ReportError> {
        let sql = marker_distance_sql(&self.schema);
        let rows = self.fetch(
            MARKER_QUERY,
            &sql,
            &["event_group_id", "event_group_name", "start_date", "region", "segment", "location_name", "method"],
            &["distance"],
        )?;

        rows.iter()
            .map(|row| -> Result<MarkerDistance, ReportError> {
                Ok(MarkerDistance {
                    event_group_id: row.try_get("event_group_id")?,
                    event_group_name: row
                        .try_get::<_, Option<String>>("event_group_name")?
                        .unwrap_or_default(),
                    start_date: row.try_get("start_date")?,
                    region: row.try_get("region")?,
                    segment: row.try_get("segment")?,
                    location_name: row.try_get("location_name")?,
                    distance: numeric(row, "distance")?,
                    method: row.try_get("method")?,
                })
            })
            .collect()
    }

    fn vegetation_cover(&mut self) -> Result<Vec<VegetationCover>, ReportError> {
        let sql = vegetation_cover_sql(&self.schema);
        let rows = self.fetch(
            VEGETATION_QUERY,
            &sql,
            &["community_type", "vegetation_type", "scientific_name", "segment", "location_name"],
            &["percent_cover"],
        )?;

        rows.iter()
            .map(|row| -> Result<VegetationCover, ReportError> {
                Ok(VegetationCover {
                    community_type: row.try_get("community_type")?,
                    vegetation_type: row.try_get("vegetation_type")?,
                    scientific_name: row.try_get("scientific_name")?,
                    segment: row.try_get("segment")?,
                    location_name: row.try_get("location_name")?,
                    percent_cover: numeric(row, "percent_cover")?,
                })
            })
            .collect()
    }

    fn stratum_cover(&mut self) -> Result<Vec<StratumCover>, ReportError> {
        let sql = stratum_cover_sql(&self.schema);
        let rows = self.fetch(
            STRATUM_QUERY,
            &sql,
            &["location_id", "order_id", "location_name", "start_date"],
            &STRATUM_COVER_COLUMNS,
        )?;

        rows.iter()
            .map(|row| -> Result<StratumCover, ReportError> {
                Ok(StratumCover {
                    location_id: row.try_get("location_id")?,
                    order_id: row.try_get("order_id")?,
                    location_name: row.try_get("location_name")?,
                    start_date: row.try_get("start_date")?,
                    mangrove_side: SideCover {
                        overall: numeric(row, "mangroveside_cover_overall")?,
                        tree: numeric(row, "mangroveside_cover_tree")?,
                        shrub: numeric(row, "mangroveside_cover_shrub")?,
                        herb: numeric(row, "mangroveside_cover_herb")?,
                    },
                    marsh_side: SideCover {
                        overall: numeric(row, "marshside_cover_overall")?,
                        tree: numeric(row, "marshside_cover_tree")?,
                        shrub: numeric(row, "marshside_cover_shrub")?,
                        herb: numeric(row, "marshside_cover_herb")?,
                    },
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker_columns() -> Vec<(&'static str, Type)> {
        vec![
            ("event_group_id", Type::TEXT),
            ("segment", Type::TEXT),
            ("distance", Type::FLOAT8),
        ]
    }

    fn as_refs<'a>(cols: &'a [(&'static str, Type)]) -> Vec<(&'static str, &'a Type)> {
        cols.iter().map(|(n, t)| (*n, t)).collect()
    }

    #[test]
    fn test_valid_columns_pass() {
        let cols = marker_columns();
        assert_eq!(
            validate_columns(MARKER_QUERY, &as_refs(&cols), &["event_group_id", "segment"], &["distance"]),
            Ok(())
        );
    }

    #[test]
    fn test_missing_required_column_is_reported() {
        let cols = marker_columns();
        let err = validate_columns(MARKER_QUERY, &as_refs(&cols), &["region"], &["distance"])
            .expect_err("region is missing");
        assert_eq!(
            err,
            ValidationError::MissingColumn {
                query: MARKER_QUERY.to_string(),
                column: "region".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_measurement_column_is_reported() {
        let cols = vec![("segment", Type::TEXT)];
        let err = validate_columns(MARKER_QUERY, &as_refs(&cols), &["segment"], &["distance"])
            .expect_err("distance is missing");
        assert!(matches!(err, ValidationError::MissingColumn { column, .. } if column == "distance"));
    }

    #[test]
    fn test_text_measurement_column_is_rejected() {
        let cols = vec![("segment", Type::TEXT), ("distance", Type::VARCHAR)];
        let err = validate_columns(MARKER_QUERY, &as_refs(&cols), &["segment"], &["distance"])
            .expect_err("varchar distance is not numeric");
        assert!(matches!(
            err,
            ValidationError::NonNumericColumn { ref column, ref found, .. }
                if column == "distance" && found == "varchar"
        ));
    }

    #[test]
    fn test_numeric_types() {
        for ty in [Type::FLOAT8, Type::FLOAT4, Type::INT2, Type::INT4, Type::INT8] {
            assert!(is_numeric_type(&ty), "{} should be numeric", ty.name());
        }
        for ty in [Type::TEXT, Type::NUMERIC, Type::DATE, Type::BOOL] {
            assert!(!is_numeric_type(&ty), "{} should not be accepted", ty.name());
        }
    }

    #[test]
    fn test_queries_are_scoped_to_schema() {
        for sql in [
            marker_distance_sql("ecotone"),
            vegetation_cover_sql("ecotone"),
            stratum_cover_sql("ecotone"),
        ] {
            assert!(sql.contains("ecotone.tbl_markerdata"));
            assert!(sql.contains("e.event_type = $1"));
        }
    }
}
