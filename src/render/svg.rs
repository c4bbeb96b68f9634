use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;

use tracing::info;

use super::{check_sizes, feature_series, Series};
use crate::{CompoundTable, Layout, TreemapError};

const SIZE: f64 = 800.0;
const MARGIN: f64 = 40.0;
const POINT_RADIUS: f64 = 3.0;

/// A static scatter of the tree colored by one series.
struct SvgPlot<'a> {
    layout: &'a Layout,
    series: &'a Series,
}

impl SvgPlot<'_> {
    fn project(&self, node: usize) -> (f64, f64) {
        let span = SIZE - 2.0 * MARGIN;
        let x = SIZE / 2.0 + self.layout.x[node] as f64 * span;
        let y = SIZE / 2.0 - self.layout.y[node] as f64 * span;
        (x, y)
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

impl Display for SvgPlot<'_> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        writeln!(
            f,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{SIZE}" height="{SIZE}" viewBox="0 0 {SIZE} {SIZE}">"#
        )?;
        writeln!(f, r##"  <rect width="100%" height="100%" fill="#ffffff"/>"##)?;
        writeln!(
            f,
            r#"  <text x="{MARGIN}" y="{}" font-family="sans-serif" font-size="14">{}</text>"#,
            MARGIN / 2.0,
            escape(&self.series.legend_title)
        )?;

        writeln!(f, r##"  <g stroke="#bbbbbb" stroke-width="1">"##)?;
        for (&source, &target) in self.layout.s.iter().zip(&self.layout.t) {
            let (x1, y1) = self.project(source as usize);
            let (x2, y2) = self.project(target as usize);
            writeln!(f, r#"    <line x1="{x1:.2}" y1="{y1:.2}" x2="{x2:.2}" y2="{y2:.2}"/>"#)?;
        }
        writeln!(f, "  </g>")?;

        writeln!(f, "  <g>")?;
        for (node, color) in self.series.colors.iter().enumerate() {
            let (cx, cy) = self.project(node);
            writeln!(f, r#"    <circle cx="{cx:.2}" cy="{cy:.2}" r="{POINT_RADIUS}" fill="{color}"/>"#)?;
        }
        writeln!(f, "  </g>")?;

        writeln!(f, r#"  <g font-family="sans-serif" font-size="11">"#)?;
        for (row, entry) in self.series.legend.iter().enumerate() {
            let y = SIZE - MARGIN / 2.0 - 14.0 * (self.series.legend.len() - 1 - row) as f64;
            writeln!(
                f,
                r#"    <circle cx="{}" cy="{}" r="4" fill="{}"/>"#,
                SIZE - 120.0,
                y - 4.0,
                entry.color
            )?;
            writeln!(
                f,
                r#"    <text x="{}" y="{y}">{}</text>"#,
                SIZE - 110.0,
                escape(&entry.label)
            )?;
        }
        writeln!(f, "  </g>")?;
        writeln!(f, "</svg>")
    }
}

/// Write an SVG of the tree colored by the first feature column.
pub fn draw_static(layout: &Layout, table: &CompoundTable, path: &Path) -> Result<(), TreemapError> {
    check_sizes(layout, table)?;
    let series = feature_series(table)?;
    let Some(first) = series.first() else {
        return Err(crate::DataError::NoFeatures.into());
    };
    let plot = SvgPlot { layout, series: first };
    std::fs::write(path, plot.to_string()).map_err(TreemapError::io(path))?;
    info!("wrote static tree map to {}", path.display());
    Ok(())
}
