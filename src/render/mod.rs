//! Drawing a laid-out tree map.
//!
//! Both backends color the nodes by feature columns: integer and text
//! columns are categorical (Set1 palette), float columns continuous
//! (rainbow palette). Missing values are drawn grey.

mod html;
pub use html::*;

mod svg;
pub use svg::*;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{ColumnData, CompoundTable, DataError, Layout, RenderMode, TreemapError};

/// Color of nodes with a missing value.
pub const MISSING_COLOR: &str = "#cccccc";

const SET1: [&str; 9] = [
    "#e41a1c", "#377eb8", "#4daf4a", "#984ea3", "#ff7f00", "#ffff33", "#a65628", "#f781bf", "#999999",
];

/// The `i`th color of the Set1 palette, cycling after nine categories.
pub fn set1(i: usize) -> &'static str {
    SET1[i % SET1.len()]
}

/// Sample the rainbow colormap at `t` in `[0, 1]`.
pub fn rainbow(t: f64) -> String {
    let t = t.clamp(0.0, 1.0);
    let r = (2.0 * t - 0.5).abs().min(1.0);
    let g = (std::f64::consts::PI * t).sin();
    let b = (std::f64::consts::FRAC_PI_2 * t).cos();
    let channel = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    format!("#{:02x}{:02x}{:02x}", channel(r), channel(g), channel(b))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub label: String,
    pub color: String,
}

/// One colored view of the nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub title: String,
    pub legend_title: String,
    pub categorical: bool,
    pub colormap: &'static str,
    /// One color per node.
    pub colors: Vec<String>,
    pub legend: Vec<LegendEntry>,
}

fn categorical_series<T: Ord + Clone + ToString>(values: &[Option<T>]) -> (Vec<String>, Vec<LegendEntry>) {
    let categories: Vec<T> = values
        .iter()
        .flatten()
        .cloned()
        .collect::<BTreeSet<T>>()
        .into_iter()
        .collect();
    let colors = values
        .iter()
        .map(|value| match value {
            Some(value) => categories
                .binary_search(value)
                .map(|i| set1(i).to_string())
                .unwrap_or_else(|_| MISSING_COLOR.to_string()),
            None => MISSING_COLOR.to_string(),
        })
        .collect();
    let legend = categories
        .iter()
        .enumerate()
        .map(|(i, category)| LegendEntry {
            label: category.to_string(),
            color: set1(i).to_string(),
        })
        .collect();
    (colors, legend)
}

fn continuous_series(values: &[Option<f64>]) -> (Vec<String>, Vec<LegendEntry>) {
    let present = values.iter().flatten().copied().filter(|v| v.is_finite());
    let (min, max) = present.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let span = if max > min { max - min } else { 1.0 };
    let colors = values
        .iter()
        .map(|value| match value {
            Some(v) if v.is_finite() => rainbow((v - min) / span),
            _ => MISSING_COLOR.to_string(),
        })
        .collect();
    let legend = if min.is_finite() {
        vec![
            LegendEntry {
                label: format!("{min}"),
                color: rainbow(0.0),
            },
            LegendEntry {
                label: format!("{max}"),
                color: rainbow(1.0),
            },
        ]
    } else {
        Vec::new()
    };
    (colors, legend)
}

/// Build one series per feature column of `table`.
///
/// Fails with [`DataError::NoFeatures`] when the table has no columns
/// besides `id` and `smiles`.
pub fn feature_series(table: &CompoundTable) -> Result<Vec<Series>, TreemapError> {
    if !table.has_features() {
        return Err(DataError::NoFeatures.into());
    }
    Ok(table
        .columns()
        .iter()
        .map(|column| {
            let (colors, legend) = match &column.data {
                ColumnData::Integer(values) => categorical_series(values),
                ColumnData::Text(values) => categorical_series(values),
                ColumnData::Float(values) => continuous_series(values),
            };
            let categorical = column.data.is_categorical();
            Series {
                title: column.name.clone(),
                legend_title: format!("feature_{}", column.name),
                categorical,
                colormap: if categorical { "Set1" } else { "rainbow" },
                colors,
                legend,
            }
        })
        .collect())
}

fn check_sizes(layout: &Layout, table: &CompoundTable) -> Result<(), TreemapError> {
    if layout.len() != table.len() || layout.y.len() != layout.x.len() || layout.s.len() != layout.t.len() {
        return Err(TreemapError::Index(format!(
            "layout has {} nodes for {} compounds",
            layout.len(),
            table.len()
        )));
    }
    Ok(())
}

/// Draw with the backend selected by `mode` into `output`, returning the
/// path of the written file.
pub fn draw(mode: RenderMode, layout: &Layout, table: &CompoundTable, output: &Path) -> Result<PathBuf, TreemapError> {
    match mode {
        RenderMode::Interactive => {
            let path = output.join("tmap.html");
            draw_faerun(layout, table, &path)?;
            Ok(path)
        }
        RenderMode::Static => {
            let path = output.join("tmap.svg");
            draw_static(layout, table, &path)?;
            Ok(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(super) fn table() -> CompoundTable {
        let mut table = CompoundTable::new(
            vec!["1".into(), "2".into(), "3".into()],
            vec!["CCO".into(), "CCN".into(), "c1ccccc1".into()],
        );
        table
            .add_column("rings", ColumnData::Integer(vec![Some(0), Some(0), Some(1)]))
            .unwrap();
        table
            .add_column("weight", ColumnData::Float(vec![Some(46.07), None, Some(78.11)]))
            .unwrap();
        table
    }

    pub(super) fn layout() -> Layout {
        Layout {
            x: vec![0.0, 0.5, -0.5],
            y: vec![0.0, 0.25, -0.25],
            s: vec![0, 0],
            t: vec![1, 2],
        }
    }

    #[test]
    fn test_palettes() {
        assert_eq!(set1(0), "#e41a1c");
        assert_eq!(set1(9), set1(0));
        assert_eq!(rainbow(0.0), "#8000ff");
        assert_eq!(rainbow(1.0), "#ff0000");
        assert_eq!(rainbow(2.0), rainbow(1.0));
    }

    #[test]
    fn test_series_kinds() {
        let series = feature_series(&table()).unwrap();
        assert_eq!(series.len(), 2);

        assert!(series[0].categorical);
        assert_eq!(series[0].colormap, "Set1");
        assert_eq!(series[0].legend_title, "feature_rings");
        assert_eq!(series[0].colors, vec![set1(0), set1(0), set1(1)]);
        assert_eq!(series[0].legend.len(), 2);

        assert!(!series[1].categorical);
        assert_eq!(series[1].colormap, "rainbow");
        assert_eq!(series[1].colors[0], rainbow(0.0));
        assert_eq!(series[1].colors[1], MISSING_COLOR);
        assert_eq!(series[1].colors[2], rainbow(1.0));
    }

    #[test]
    fn test_no_features_is_an_error() {
        let table = CompoundTable::new(vec!["1".into()], vec!["C".into()]);
        assert!(matches!(
            feature_series(&table),
            Err(TreemapError::Data(DataError::NoFeatures))
        ));
    }

    #[test]
    fn test_dispatch_by_mode() {
        let dir = tempfile::tempdir().unwrap();
        let html = draw(RenderMode::Interactive, &layout(), &table(), dir.path()).unwrap();
        assert_eq!(html, dir.path().join("tmap.html"));
        assert!(html.exists());

        let svg = draw(RenderMode::Static, &layout(), &table(), dir.path()).unwrap();
        assert_eq!(svg, dir.path().join("tmap.svg"));
        assert!(svg.exists());

        let mut short = layout();
        short.x.pop();
        assert!(matches!(
            draw(RenderMode::Static, &short, &table(), dir.path()),
            Err(TreemapError::Index(_))
        ));
    }
}
