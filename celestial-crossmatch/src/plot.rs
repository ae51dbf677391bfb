//! Diagnostic SVG plot of a cross-match result.
//!
//! Left panel: reference positions and each candidate's matched positions
//! on the sky. Right panel: separation histogram in arcseconds, one colour
//! per candidate.

use crate::assemble::{CrossMatchResult, DEC_COLUMN, RA_COLUMN};
use crate::error::{CrossmatchError, Result};
use crate::output::write_atomic;
use crate::sphere::ARCSEC_PER_DEG;
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use std::io::Write;
use std::path::Path;

const WIDTH: u32 = 1400;
const HEIGHT: u32 = 600;
const N_BINS: usize = 20;

type SkyChart<'a, 'b> = ChartContext<'a, SVGBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

fn plot_err<E: std::fmt::Display>(e: E) -> CrossmatchError {
    CrossmatchError::Plot(e.to_string())
}

struct Series {
    label: String,
    points: Vec<(f64, f64)>,
}

/// Render `result` as an SVG document.
pub fn render_svg(result: &CrossMatchResult) -> Result<String> {
    let sky = sky_series(result)?;
    let separations = result
        .candidates
        .iter()
        .map(|c| {
            let arcsec: Vec<f64> = result
                .separations(c)?
                .into_iter()
                .filter(|s| s.is_finite())
                .map(|s| s * ARCSEC_PER_DEG)
                .collect();
            Ok((c.clone(), arcsec))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(plot_err)?;
        let (left, right) = root.split_horizontally(WIDTH / 2);

        let all_points: Vec<(f64, f64)> = sky.iter().flat_map(|s| s.points.iter().copied()).collect();
        let (x_range, y_range) = padded_ranges(&all_points);
        let mut chart = ChartBuilder::on(&left)
            .caption("Matched positions", ("sans-serif", 22))
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range.0..x_range.1, y_range.0..y_range.1)
            .map_err(plot_err)?;
        chart
            .configure_mesh()
            .x_desc("RA (deg)")
            .y_desc("Dec (deg)")
            .draw()
            .map_err(plot_err)?;
        draw_sky(&mut chart, &sky)?;

        draw_histogram(&right, &separations)?;
        root.present().map_err(plot_err)?;
    }
    Ok(svg)
}

/// Render `result` and write it to `path`.
pub fn write_plot(result: &CrossMatchResult, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let svg = render_svg(result)?;
    write_atomic(path, |w| Ok(w.write_all(svg.as_bytes())?))?;
    tracing::info!(path = %path.display(), "wrote diagnostic plot");
    Ok(())
}

fn sky_series(result: &CrossMatchResult) -> Result<Vec<Series>> {
    std::iter::once(&result.reference)
        .chain(&result.candidates)
        .map(|catalogue| {
            let points = match (
                result.column_for(catalogue, RA_COLUMN),
                result.column_for(catalogue, DEC_COLUMN),
            ) {
                (Some(ra), Some(dec)) => {
                    let ra = result.table.numeric_values(&ra)?;
                    let dec = result.table.numeric_values(&dec)?;
                    ra.into_iter()
                        .zip(dec)
                        .filter(|(r, d)| r.is_finite() && d.is_finite())
                        .collect()
                }
                _ => Vec::new(),
            };
            Ok(Series {
                label: catalogue.clone(),
                points,
            })
        })
        .collect()
}

fn draw_sky<'a>(chart: &mut SkyChart<'a, 'a>, sky: &[Series]) -> Result<()> {
    for (i, series) in sky.iter().enumerate() {
        let color = Palette99::pick(i).mix(0.7);
        // Reference drawn larger so matches show on top of it
        let size = if i == 0 { 5 } else { 3 };
        chart
            .draw_series(
                series
                    .points
                    .iter()
                    .map(move |&(x, y)| Circle::new((x, y), size, color.filled())),
            )
            .map_err(plot_err)?
            .label(series.label.as_str())
            .legend(move |(x, y)| Circle::new((x, y), 4, color.filled()));
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)?;
    Ok(())
}

fn draw_histogram(
    area: &DrawingArea<SVGBackend<'_>, plotters::coord::Shift>,
    separations: &[(String, Vec<f64>)],
) -> Result<()> {
    let all = separations.iter().flat_map(|(_, v)| v.iter().copied());
    let (lo, hi) = extent(all);
    let (min_val, bin_width) = if lo.is_finite() {
        (lo.min(0.0), ((hi - lo.min(0.0)).max(1e-6)) / N_BINS as f64)
    } else {
        (0.0, 1.0 / N_BINS as f64)
    };

    let binned: Vec<(&str, Vec<u32>)> = separations
        .iter()
        .map(|(name, values)| (name.as_str(), bin_values(values, min_val, bin_width)))
        .collect();
    let max_count = binned
        .iter()
        .flat_map(|(_, b)| b.iter().copied())
        .max()
        .unwrap_or(0);

    let x_max = min_val + N_BINS as f64 * bin_width;
    let mut chart = ChartBuilder::on(area)
        .caption("Separations", ("sans-serif", 22))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(min_val..x_max, 0u32..(max_count + 1))
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .x_desc("Separation (arcsec)")
        .y_desc("Count")
        .draw()
        .map_err(plot_err)?;

    for (i, (name, bins)) in binned.iter().enumerate() {
        // Palette index 0 is the reference colour in the sky panel
        let color = Palette99::pick(i + 1).mix(0.5);
        chart
            .draw_series(bins.iter().enumerate().map(move |(b, &count)| {
                let x0 = min_val + b as f64 * bin_width;
                Rectangle::new([(x0, 0), (x0 + bin_width, count)], color.filled())
            }))
            .map_err(plot_err)?
            .label(*name)
            .legend(move |(x, y)| Rectangle::new([(x, y - 4), (x + 8, y + 4)], color.filled()));
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)?;
    Ok(())
}

fn padded_ranges(points: &[(f64, f64)]) -> ((f64, f64), (f64, f64)) {
    if points.is_empty() {
        return ((-1.0, 1.0), (-1.0, 1.0));
    }
    let (x_min, x_max) = extent(points.iter().map(|p| p.0));
    let (y_min, y_max) = extent(points.iter().map(|p| p.1));
    let x_pad = (x_max - x_min).abs() * 0.1 + 1e-3;
    let y_pad = (y_max - y_min).abs() * 0.1 + 1e-3;
    ((x_min - x_pad, x_max + x_pad), (y_min - y_pad, y_max + y_pad))
}

fn extent(iter: impl Iterator<Item = f64>) -> (f64, f64) {
    iter.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

fn bin_values(values: &[f64], min_val: f64, bin_width: f64) -> Vec<u32> {
    let mut bins = vec![0u32; N_BINS];
    for &v in values {
        let idx = ((v - min_val) / bin_width).floor().max(0.0) as usize;
        bins[idx.min(N_BINS - 1)] += 1;
    }
    bins
}
