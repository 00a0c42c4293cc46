//! PNG charts, one per series name.

use super::RunTelemetry;
use crate::error::RenderError;
use bench_core::EVENT_MARKER_Y;
use plotters::prelude::*;
use std::path::{Path, PathBuf};

/// Chart dimensions in pixels.
pub const CHART_SIZE: (u32, u32) = (2560, 1440);

/// File name of the chart for `series`.
///
/// `<series>-<suffix>`, with `.png` appended when the suffix carries no
/// extension (the bitmap backend picks the encoder from it).
pub fn chart_file_name(series: &str, suffix: &str) -> String {
    if suffix.ends_with(".png") {
        format!("{series}-{suffix}")
    } else {
        format!("{series}-{suffix}.png")
    }
}

/// Axis label for elapsed seconds, as `m:ss`.
pub fn format_elapsed(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

fn chart_err(e: impl std::fmt::Display) -> RenderError {
    RenderError::Chart(e.to_string())
}

pub(super) fn render_all(
    telemetry: &RunTelemetry,
    dir: &Path,
    suffix: &str,
) -> Result<Vec<PathBuf>, RenderError> {
    std::fs::create_dir_all(dir)?;

    let mut written = Vec::new();
    for name in telemetry.store.names() {
        let path = dir.join(chart_file_name(name, suffix));
        render_series(telemetry, name, &path)?;
        tracing::debug!(series = name, path = %path.display(), "chart written");
        written.push(path);
    }
    Ok(written)
}

fn render_series(telemetry: &RunTelemetry, name: &str, path: &Path) -> Result<(), RenderError> {
    let Some(group) = telemetry.store.group(name) else {
        return Ok(());
    };

    let last = telemetry
        .store
        .last_time()
        .unwrap_or(telemetry.stopped_at);
    let x_max = telemetry.elapsed_secs(last).max(1.0);
    let y_max = telemetry.store.y_upper_bound(name);

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(name, ("sans-serif", 40))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(100)
        .build_cartesian_2d(0f64..x_max, 0f64..y_max)
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .x_desc("Elapsed")
        .y_desc(name)
        .x_label_formatter(&|x: &f64| format_elapsed(*x))
        .y_label_formatter(&|y: &f64| format!("{:.2}", y))
        .draw()
        .map_err(chart_err)?;

    for (idx, (label, series)) in group.iter().enumerate() {
        let color = Palette99::pick(idx).mix(0.9);
        let points: Vec<(f64, f64)> = series
            .points()
            .map(|(time, value)| (telemetry.elapsed_secs(time), value))
            .collect();

        chart
            .draw_series(LineSeries::new(points, color.stroke_width(2)))
            .map_err(chart_err)?
            .label(label.clone())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
            });
    }

    chart
        .draw_series(telemetry.store.events().iter().map(|event| {
            EmptyElement::at((telemetry.elapsed_secs(event.time), EVENT_MARKER_Y))
                + Circle::new((0, 0), 6, RED.filled())
                + Text::new(event.name.clone(), (10, -10), ("sans-serif", 22).into_font())
        }))
        .map_err(chart_err)?;

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(chart_err)?;

    root.present().map_err(chart_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bench_core::SeriesStore;
    use std::time::SystemTime;

    #[test]
    fn file_names() {
        assert_eq!(chart_file_name("SELECT", "run1"), "SELECT-run1.png");
        assert_eq!(chart_file_name("threads", "run1.png"), "threads-run1.png");
    }

    #[test]
    fn elapsed_labels() {
        assert_eq!(format_elapsed(0.0), "0:00");
        assert_eq!(format_elapsed(59.6), "1:00");
        assert_eq!(format_elapsed(125.0), "2:05");
        assert_eq!(format_elapsed(-3.0), "0:00");
    }

    #[test]
    fn empty_store_writes_nothing() {
        let now = SystemTime::now();
        let telemetry = RunTelemetry {
            store: SeriesStore::new(),
            started_at: now,
            stopped_at: now,
        };
        let dir = tempfile::tempdir().unwrap();
        let written = telemetry.render(&dir.path().join("charts"), "run").unwrap();
        assert!(written.is_empty());
        assert!(dir.path().join("charts").is_dir());
    }
}
