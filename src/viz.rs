//! Console and chart rendering of ranked bundles using Plotters

use plotters::prelude::*;

use crate::engine::BundleRecommendation;
use crate::error::BundleError;

const MODEL_COLOR: RGBColor = RGBColor(31, 119, 180);
const HEURISTIC_COLOR: RGBColor = RGBColor(255, 127, 14);

fn plot_error(e: impl std::fmt::Display) -> BundleError {
    BundleError::Plot(e.to_string())
}

/// Horizontal bar chart of recommendation scores, best bundle on top
///
/// # Arguments
/// * `recommendations` - Ranked bundles, best first
/// * `output_path` - Path to save the PNG plot
pub fn create_bundle_score_chart(
    recommendations: &[BundleRecommendation],
    output_path: &str,
) -> crate::Result<()> {
    if recommendations.is_empty() {
        return Err(BundleError::Plot("no bundles to plot".to_string()));
    }

    let n = recommendations.len();
    let height = (120 + 28 * n).max(300) as u32;

    let root = BitMapBackend::new(output_path, (900, height)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Top Bundle Recommendations", ("sans-serif", 28))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(220)
        .build_cartesian_2d(0f64..100f64, 0f64..n as f64)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .x_desc("Recommendation score")
        .y_labels(n)
        .y_label_formatter(&|y| {
            let rank = n.saturating_sub(1 + y.floor() as usize);
            recommendations
                .get(rank)
                .map(|r| r.products.clone())
                .unwrap_or_default()
        })
        .axis_desc_style(("sans-serif", 15))
        .draw()
        .map_err(plot_error)?;

    chart
        .draw_series(recommendations.iter().enumerate().map(|(rank, rec)| {
            let row = (n - 1 - rank) as f64;
            let color = if rec.model_used { MODEL_COLOR } else { HEURISTIC_COLOR };
            Rectangle::new(
                [(0.0, row + 0.15), (rec.recommendation_score, row + 0.85)],
                color.filled(),
            )
        }))
        .map_err(plot_error)?;

    root.present().map_err(plot_error)?;
    tracing::info!(path = output_path, bundles = n, "bundle score chart saved");

    Ok(())
}

/// Print ranked bundles as a console table
pub fn print_bundle_table(recommendations: &[BundleRecommendation]) {
    if recommendations.is_empty() {
        println!("No bundles met the support and confidence thresholds.");
        return;
    }

    let model_used = recommendations.iter().any(|r| r.model_used);
    println!(
        "\n=== Top {} Bundles ({} scoring) ===",
        recommendations.len(),
        if model_used { "model" } else { "heuristic" }
    );
    println!(
        "  {:>4} | {:<32} | {:>6} | {:>7} | {:>6} | {:>6} | {:>6} | {:>5}",
        "Rank", "Bundle", "Score", "Support", "Conf→", "Conf←", "Lift", "Count"
    );
    println!("  {}", "-".repeat(92));
    for (rank, rec) in recommendations.iter().enumerate() {
        println!(
            "  {:>4} | {:<32} | {:>6.1} | {:>7.4} | {:>6.3} | {:>6.3} | {:>6.3} | {:>5}",
            rank + 1,
            rec.products,
            rec.recommendation_score,
            rec.support,
            rec.confidence_a_to_b,
            rec.confidence_b_to_a,
            rec.lift,
            rec.pair_count
        );
    }
}
