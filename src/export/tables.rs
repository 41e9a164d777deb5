//! SOP table export as CSV.
//!
//! Tables are rendered to memory first and then written with a temp-file
//! rename, so a failed run never leaves a half-written table behind.
//! Sentinel (`None`) values are written as empty cells.

use std::fs;
use std::path::Path;

use crate::analysis::confidence::ConfidenceLevel;
use crate::analysis::pivot::CoverPivot;
use crate::model::{GroupingScheme, ReportError, SummaryTable};

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Header row for SOP table 8-1. `DOF` and `t_crit` are intentionally absent.
pub fn summary_header(confidence: ConfidenceLevel, grouping: GroupingScheme) -> Vec<String> {
    let mut header = vec!["Event_Group_ID".to_string()];
    if grouping == GroupingScheme::EventRegionSegment {
        header.push("Region".to_string());
    }
    header.extend(
        [
            "Segment".to_string(),
            "AverageDist_M".to_string(),
            "StandardError".to_string(),
            "RecCount".to_string(),
            format!("LowerCI_{}", confidence.label()),
            format!("UpperCI_{}", confidence.label()),
            "MinDifference".to_string(),
            "MaxDifference".to_string(),
        ],
    );
    header
}

/// Renders SOP table 8-1 in display order.
pub fn summary_csv(
    table: &SummaryTable,
    confidence: ConfidenceLevel,
    grouping: GroupingScheme,
) -> Result<Vec<u8>, ReportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(summary_header(confidence, grouping))?;

    for row in &table.rows {
        let agg = &row.aggregate;
        let mut record = vec![agg.group_key.event_group_id.clone()];
        if grouping == GroupingScheme::EventRegionSegment {
            record.push(agg.group_key.region.clone().unwrap_or_default());
        }
        record.extend([
            agg.group_key.segment.clone(),
            agg.mean.to_string(),
            cell(agg.standard_error),
            agg.count.to_string(),
            cell(row.lower_bound),
            cell(row.upper_bound),
            agg.min_value.to_string(),
            agg.max_value.to_string(),
        ]);
        writer.write_record(&record)?;
    }

    writer
        .into_inner()
        .map_err(|e| ReportError::Render(e.to_string()))
}

/// Renders an SOP 8-2 cover pivot.
pub fn pivot_csv(pivot: &CoverPivot) -> Result<Vec<u8>, ReportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec![
        "CommunityType".to_string(),
        "VegetationType".to_string(),
        "ScientificName".to_string(),
    ];
    header.extend(pivot.columns.iter().cloned());
    writer.write_record(&header)?;

    for row in &pivot.rows {
        let mut record = vec![
            row.key.community_type.clone(),
            row.key.vegetation_type.clone(),
            row.key.scientific_name.clone().unwrap_or_default(),
        ];
        record.extend(row.cells.iter().map(|c| cell(*c)));
        writer.write_record(&record)?;
    }

    writer
        .into_inner()
        .map_err(|e| ReportError::Render(e.to_string()))
}

/// Writes `bytes` to `path` via a sibling temp file and rename.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), ReportError> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(|e| ReportError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| ReportError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::confidence::StudentTQuantile;
    use crate::analysis::pivot::cover_by_segment;
    use crate::analysis::summary::summarize;
    use crate::model::{GroupKey, Observation, VegetationCover};

    fn obs(region: &str, segment: &str, value: f64) -> Observation {
        Observation {
            group_key: GroupKey {
                event_group_id: "EG1".to_string(),
                region: Some(region.to_string()),
                segment: segment.to_string(),
            },
            value,
        }
    }

    fn lines(bytes: Vec<u8>) -> Vec<String> {
        String::from_utf8(bytes)
            .expect("csv is utf-8")
            .lines()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_summary_header_uses_confidence_suffix() {
        let header = summary_header(ConfidenceLevel::default(), GroupingScheme::EventSegment);
        assert_eq!(
            header.join(","),
            "Event_Group_ID,Segment,AverageDist_M,StandardError,RecCount,\
             LowerCI_0.95,UpperCI_0.95,MinDifference,MaxDifference"
        );
    }

    #[test]
    fn test_region_column_only_when_grouping_by_region() {
        let header = summary_header(ConfidenceLevel::default(), GroupingScheme::EventRegionSegment);
        assert_eq!(header[1], "Region");
    }

    #[test]
    fn test_degenerate_group_renders_empty_cells_not_zero() {
        let table = summarize(
            &[obs("North", "Segment_1", 5.0)],
            ConfidenceLevel::default(),
            &StudentTQuantile,
        )
        .unwrap();
        let out = lines(summary_csv(&table, ConfidenceLevel::default(), GroupingScheme::EventSegment).unwrap());
        assert_eq!(out.len(), 2);
        assert_eq!(out[1], "EG1,Segment_1,5,,1,,,5,5");
    }

    #[test]
    fn test_summary_rows_follow_table_order() {
        let table = summarize(
            &[
                obs("North", "Segment_10", 1.0),
                obs("North", "Segment_2", 1.0),
                obs("North", "Segment_2", 3.0),
            ],
            ConfidenceLevel::default(),
            &StudentTQuantile,
        )
        .unwrap();
        let out = lines(
            summary_csv(&table, ConfidenceLevel::default(), GroupingScheme::EventRegionSegment).unwrap(),
        );
        assert!(out[1].starts_with("EG1,North,Segment_2,2,"));
        assert!(out[2].starts_with("EG1,North,Segment_10,1,"));
    }

    #[test]
    fn test_pivot_csv_layout() {
        let records = vec![
            VegetationCover {
                community_type: "Marsh".to_string(),
                vegetation_type: "Herb".to_string(),
                scientific_name: Some("Cladium jamaicense".to_string()),
                segment: "Segment_3".to_string(),
                location_name: "S3_P1".to_string(),
                percent_cover: Some(25.0),
            },
            VegetationCover {
                community_type: "Mangrove".to_string(),
                vegetation_type: "Tree".to_string(),
                scientific_name: None,
                segment: "Segment_1".to_string(),
                location_name: "S1_P1".to_string(),
                percent_cover: Some(60.0),
            },
        ];
        let out = lines(pivot_csv(&cover_by_segment(&records)).unwrap());
        assert_eq!(out[0], "CommunityType,VegetationType,ScientificName,1,3");
        assert_eq!(out[1], "Mangrove,Tree,,60,");
        assert_eq!(out[2], "Marsh,Herb,Cladium jamaicense,,25");
    }

    #[test]
    fn test_write_atomically_leaves_no_temp_file() {
        let dir = std::env::temp_dir().join(format!("ecotone_tables_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("SOP8-1.csv");
        write_atomically(&path, b"a,b\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a,b\n");
        assert!(!path.with_extension("tmp").exists());
        let _ = fs::remove_dir_all(&dir);
    }
}
