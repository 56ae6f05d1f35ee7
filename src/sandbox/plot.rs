//! Plot surface for the sandbox.
//!
//! Snippets build up a figure through the `plot` namespace; after a run
//! the executor renders the pending figure to SVG and clears it.

use super::SandboxError;
use plotters::prelude::*;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    Line,
    Scatter,
}

#[derive(Debug, Clone)]
pub struct Series {
    pub kind: SeriesKind,
    pub points: Vec<(f64, f64)>,
}

/// Pending figure state. Empty until a series is added.
#[derive(Debug, Clone, Default)]
pub struct Figure {
    title: Option<String>,
    series: Vec<Series>,
}

impl Figure {
    pub fn new() -> Self {
        Self::default()
    }

    /// A figure with no series renders nothing, even if titled.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    pub fn push_series(&mut self, kind: SeriesKind, points: Vec<(f64, f64)>) {
        self.series.push(Series { kind, points });
    }

    pub fn clear(&mut self) {
        self.title = None;
        self.series.clear();
    }

    /// Data bounds across all series, padded so degenerate ranges (single
    /// point, horizontal line) still produce a drawable chart.
    fn bounds(&self) -> ((f64, f64), (f64, f64)) {
        let mut x_min = f64::INFINITY;
        let mut x_max = f64::NEG_INFINITY;
        let mut y_min = f64::INFINITY;
        let mut y_max = f64::NEG_INFINITY;
        for series in &self.series {
            for &(x, y) in &series.points {
                x_min = x_min.min(x);
                x_max = x_max.max(x);
                y_min = y_min.min(y);
                y_max = y_max.max(y);
            }
        }
        (pad_range(x_min, x_max), pad_range(y_min, y_max))
    }
}

fn pad_range(min: f64, max: f64) -> (f64, f64) {
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    if (max - min).abs() < f64::EPSILON {
        return (min - 0.5, max + 0.5);
    }
    (min, max)
}

/// Render the figure as an SVG document.
pub fn render_svg(figure: &Figure) -> Result<String, SandboxError> {
    let ((x_min, x_max), (y_min, y_max)) = figure.bounds();
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;

        let title = figure.title.clone().unwrap_or_default();
        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 20))
            .margin(12)
            .x_label_area_size(32)
            .y_label_area_size(44)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)
            .map_err(render_err)?;

        chart.configure_mesh().draw().map_err(render_err)?;

        for (index, series) in figure.series.iter().enumerate() {
            let color = Palette99::pick(index).to_rgba();
            match series.kind {
                SeriesKind::Line => {
                    chart
                        .draw_series(LineSeries::new(series.points.iter().copied(), &color))
                        .map_err(render_err)?;
                }
                SeriesKind::Scatter => {
                    chart
                        .draw_series(
                            series
                                .points
                                .iter()
                                .map(|&(x, y)| Circle::new((x, y), 3, color.filled())),
                        )
                        .map_err(render_err)?;
                }
            }
        }

        root.present().map_err(render_err)?;
    }
    Ok(svg)
}

fn render_err(e: impl std::fmt::Display) -> SandboxError {
    SandboxError::Render(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_until_series_added() {
        let mut figure = Figure::new();
        assert!(figure.is_empty());
        figure.set_title("still empty");
        assert!(figure.is_empty());
        figure.push_series(SeriesKind::Line, vec![(0.0, 0.0), (1.0, 1.0)]);
        assert!(!figure.is_empty());
        figure.clear();
        assert!(figure.is_empty());
    }

    #[test]
    fn test_render_line_produces_svg() {
        let mut figure = Figure::new();
        figure.set_title("squares");
        figure.push_series(
            SeriesKind::Line,
            vec![(0.0, 0.0), (1.0, 1.0), (2.0, 4.0), (3.0, 9.0)],
        );
        let svg = render_svg(&figure).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("squares"));
    }

    #[test]
    fn test_render_single_point() {
        // A lone point must not collapse the axis ranges.
        let mut figure = Figure::new();
        figure.push_series(SeriesKind::Scatter, vec![(2.0, 2.0)]);
        let svg = render_svg(&figure).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn test_pad_range() {
        assert_eq!(pad_range(1.0, 1.0), (0.5, 1.5));
        assert_eq!(pad_range(0.0, 2.0), (0.0, 2.0));
        assert_eq!(pad_range(f64::INFINITY, f64::NEG_INFINITY), (0.0, 1.0));
    }
}
