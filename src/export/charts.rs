//! SOP figures rendered as SVG with `plotters`.
//!
//! - SOP 8-1: mean marker distance per summary row with confidence interval
//!   error bars where the interval is defined.
//! - SOP 8-3: stacked herb/shrub/tree cover per marker point, one figure per
//!   side of the ecotone.

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use plotters::prelude::*;

use crate::analysis::confidence::ConfidenceLevel;
use crate::model::{ReportError, SideCover, StratumCover, SummaryTable};

const FIGURE_SIZE: (u32, u32) = (1000, 750);

const HERB: RGBColor = RGBColor(64, 224, 208); // turquoise
const SHRUB: RGBColor = RED;
const TREE: RGBColor = RGBColor(255, 165, 0); // orange

/// Side of the ecotone a stratum figure describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcotoneSide {
    Marsh,
    Mangrove,
}

impl EcotoneSide {
    pub fn title(self) -> &'static str {
        match self {
            EcotoneSide::Marsh => "Marsh Side",
            EcotoneSide::Mangrove => "Mangrove Side",
        }
    }

    /// File name suffix, e.g. `SOP8-3_MarshSide`.
    pub fn file_suffix(self) -> &'static str {
        match self {
            EcotoneSide::Marsh => "SOP8-3_MarshSide",
            EcotoneSide::Mangrove => "SOP8-3_MangroveSide",
        }
    }

    fn cover(self, record: &StratumCover) -> &SideCover {
        match self {
            EcotoneSide::Marsh => &record.marsh_side,
            EcotoneSide::Mangrove => &record.mangrove_side,
        }
    }
}

fn render_error(path: &Path, err: Box<dyn Error>) -> ReportError {
    ReportError::Render(format!("{}: {}", path.display(), err))
}

fn temp_path(path: &Path) -> PathBuf {
    path.with_extension("svg.tmp")
}

/// Draws into a sibling temp file and renames it over `path` once complete.
fn draw_atomically(
    path: &Path,
    draw: impl FnOnce(&Path) -> Result<(), Box<dyn Error>>,
) -> Result<(), ReportError> {
    let tmp = temp_path(path);
    if let Err(e) = draw(&tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(render_error(path, e));
    }
    fs::rename(&tmp, path).map_err(|e| ReportError::io(path, e))
}

fn segment_label(labels: &[String], value: &SegmentValue<u32>) -> String {
    match value {
        SegmentValue::Exact(i) | SegmentValue::CenterOf(i) => {
            labels.get(*i as usize).cloned().unwrap_or_default()
        }
        SegmentValue::Last => String::new(),
    }
}

// ---------------------------------------------------------------------------
// SOP 8-1
// ---------------------------------------------------------------------------

/// Draws mean distance per summary row with CI error bars.
///
/// Returns `Ok(false)` without writing when the table is empty.
pub fn render_summary_chart(
    path: &Path,
    table: &SummaryTable,
    confidence: ConfidenceLevel,
) -> Result<bool, ReportError> {
    if table.rows.is_empty() {
        return Ok(false);
    }
    draw_atomically(path, |tmp| draw_summary(tmp, table, confidence))?;
    Ok(true)
}

fn draw_summary(
    path: &Path,
    table: &SummaryTable,
    confidence: ConfidenceLevel,
) -> Result<(), Box<dyn Error>> {
    let rows = &table.rows;
    let multi_event = rows
        .iter()
        .any(|r| r.aggregate.group_key.event_group_id != rows[0].aggregate.group_key.event_group_id);
    let labels: Vec<String> = rows
        .iter()
        .map(|r| {
            if multi_event {
                r.aggregate.group_key.to_string()
            } else {
                r.aggregate.group_key.segment.clone()
            }
        })
        .collect();

    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for row in rows {
        let lo = row.lower_bound.unwrap_or(row.aggregate.mean);
        let hi = row.upper_bound.unwrap_or(row.aggregate.mean);
        y_min = y_min.min(lo);
        y_max = y_max.max(hi);
    }
    let pad = ((y_max - y_min) * 0.1).max(0.5);

    let root = SVGBackend::new(path, FIGURE_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Average Distance by Segment (mean ± {:.0}% CI)", confidence.value() * 100.0),
            ("sans-serif", 24),
        )
        .margin(12)
        .x_label_area_size(60)
        .y_label_area_size(70)
        .build_cartesian_2d((0u32..rows.len() as u32).into_segmented(), (y_min - pad)..(y_max + pad))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(rows.len())
        .x_label_formatter(&|v| segment_label(&labels, v))
        .x_desc("Segment")
        .y_desc("Average Distance (m)")
        .draw()?;

    chart.draw_series(rows.iter().enumerate().filter_map(|(i, row)| {
        match (row.lower_bound, row.upper_bound) {
            (Some(lo), Some(hi)) => Some(ErrorBar::new_vertical(
                SegmentValue::CenterOf(i as u32),
                lo,
                row.aggregate.mean,
                hi,
                BLACK.stroke_width(2),
                12,
            )),
            _ => None,
        }
    }))?;

    chart.draw_series(rows.iter().enumerate().map(|(i, row)| {
        Circle::new(
            (SegmentValue::CenterOf(i as u32), row.aggregate.mean),
            5,
            BLUE.filled(),
        )
    }))?;

    root.present()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// SOP 8-3
// ---------------------------------------------------------------------------

/// Draws stacked herb/shrub/tree cover per marker point for one side.
///
/// Missing cover values stack as zero. Returns `Ok(false)` without writing
/// when there are no records.
pub fn render_stratum_chart(
    path: &Path,
    side: EcotoneSide,
    records: &[StratumCover],
) -> Result<bool, ReportError> {
    if records.is_empty() {
        return Ok(false);
    }
    draw_atomically(path, |tmp| draw_stratum(tmp, side, records))?;
    Ok(true)
}

fn draw_stratum(path: &Path, side: EcotoneSide, records: &[StratumCover]) -> Result<(), Box<dyn Error>> {
    let labels: Vec<String> = records.iter().map(|r| r.location_name.clone()).collect();
    let covers: Vec<&SideCover> = records.iter().map(|r| side.cover(r)).collect();

    let strata: [(&str, RGBColor, fn(&SideCover) -> Option<f64>); 3] = [
        ("Herb", HERB, |c| c.herb),
        ("Shrub", SHRUB, |c| c.shrub),
        ("Tree", TREE, |c| c.tree),
    ];

    let tallest = covers
        .iter()
        .map(|c| strata.iter().map(|(_, _, pick)| pick(c).unwrap_or(0.0).max(0.0)).sum::<f64>())
        .fold(0.0, f64::max);
    let y_top = tallest.max(100.0) * 1.05;

    let root = SVGBackend::new(path, FIGURE_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let n = records.len() as u32;
    let mut chart = ChartBuilder::on(&root)
        .caption(side.title(), ("sans-serif", 24))
        .margin(12)
        .x_label_area_size(60)
        .y_label_area_size(70)
        .build_cartesian_2d((0u32..n).into_segmented(), 0f64..y_top)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(records.len())
        .x_label_formatter(&|v| segment_label(&labels, v))
        .x_desc("Marker Points within Region")
        .y_desc("Absolute Percent Cover (%)")
        .draw()?;

    let mut base = vec![0.0f64; covers.len()];
    for (name, color, pick) in strata {
        let bars: Vec<_> = covers
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let height = pick(c).unwrap_or(0.0).max(0.0);
                let bottom = base[i];
                base[i] += height;
                let mut bar = Rectangle::new(
                    [
                        (SegmentValue::Exact(i as u32), bottom),
                        (SegmentValue::Exact(i as u32 + 1), bottom + height),
                    ],
                    color.filled(),
                );
                bar.set_margin(0, 0, 8, 8);
                bar
            })
            .collect();

        chart
            .draw_series(bars)?
            .label(name)
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::confidence::StudentTQuantile;
    use crate::analysis::summary::summarize;
    use crate::model::{GroupKey, Observation};

    fn test_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ecotone_charts_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    fn stratum(name: &str, herb: Option<f64>, tree: Option<f64>) -> StratumCover {
        StratumCover {
            location_id: name.to_string(),
            order_id: None,
            location_name: name.to_string(),
            start_date: None,
            mangrove_side: SideCover {
                overall: Some(80.0),
                tree,
                shrub: Some(10.0),
                herb,
            },
            marsh_side: SideCover {
                overall: Some(50.0),
                tree: None,
                shrub: None,
                herb: Some(50.0),
            },
        }
    }

    #[test]
    fn test_side_selects_matching_columns() {
        let record = stratum("P1", Some(5.0), Some(60.0));
        assert_eq!(EcotoneSide::Mangrove.cover(&record).tree, Some(60.0));
        assert_eq!(EcotoneSide::Marsh.cover(&record).herb, Some(50.0));
    }

    #[test]
    fn test_stratum_chart_writes_svg() {
        let path = test_path("stratum.svg");
        let records = vec![stratum("P1", Some(5.0), Some(60.0)), stratum("P2", None, Some(30.0))];
        let written = render_stratum_chart(&path, EcotoneSide::Mangrove, &records).unwrap();
        assert!(written);
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Mangrove Side"));
        assert!(!temp_path(&path).exists(), "temp file is renamed away");
    }

    #[test]
    fn test_failed_draw_leaves_no_file_behind() {
        let path = test_path("failed.svg");
        let result = draw_atomically(&path, |tmp| {
            fs::write(tmp, "<svg")?;
            Err("backend failure".into())
        });
        assert!(matches!(result, Err(ReportError::Render(_))));
        assert!(!path.exists());
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_empty_stratum_chart_is_skipped() {
        let path = test_path("empty.svg");
        assert!(!render_stratum_chart(&path, EcotoneSide::Marsh, &[]).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_summary_chart_handles_degenerate_rows() {
        let key = |segment: &str| GroupKey {
            event_group_id: "EG1".to_string(),
            region: None,
            segment: segment.to_string(),
        };
        let observations = vec![
            Observation { group_key: key("Segment_1"), value: 10.0 },
            Observation { group_key: key("Segment_1"), value: 14.0 },
            Observation { group_key: key("Segment_2"), value: 5.0 },
        ];
        let table = summarize(&observations, ConfidenceLevel::default(), &StudentTQuantile).unwrap();
        let path = test_path("summary.svg");
        assert!(render_summary_chart(&path, &table, ConfidenceLevel::default()).unwrap());
        assert!(std::fs::read_to_string(&path).unwrap().contains("<svg"));
    }
}
