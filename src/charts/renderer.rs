//! Static Chart Renderer
//! Draws the five report charts as PNG files with plotters.
//!
//! Each chart owns its drawing area for the duration of one call and the
//! area is presented before the call returns.

use crate::charts::series::{
    self, GroupedBars, PieSlice, ScatterPoint, StateSeries, PALETTE,
};
use crate::config::ChartConfig;
use crate::data::Region;
use crate::stats::AnalysisResults;
use plotters::coord::Shift;
use plotters::element::Pie;
use plotters::prelude::*;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const ORDER_VOLUME_FILE: &str = "yearly_order_volume.png";
pub const STATE_TREND_FILE: &str = "state_sales_trend.png";
pub const TOP_SUBCATEGORIES_FILE: &str = "top_subcategories_by_region.png";
pub const PROFIT_VS_ORDERS_FILE: &str = "profit_vs_orders.png";
pub const PROFIT_DISTRIBUTION_FILE: &str = "regional_profit_distribution.png";

const FONT: &str = "sans-serif";

type Canvas<'a> = DrawingArea<BitMapBackend<'a>, Shift>;
type DrawResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("No data to plot for {0}")]
    NoData(&'static str),
    #[error("Failed to create chart directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to draw {chart}: {message}")]
    Drawing { chart: &'static str, message: String },
}

/// Files written and charts skipped by one `render_all` call.
#[derive(Debug, Default)]
pub struct RenderSummary {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<(&'static str, RenderError)>,
}

pub struct StaticChartRenderer {
    output_dir: PathBuf,
    width: u32,
    height: u32,
    states: Vec<String>,
}

impl StaticChartRenderer {
    pub fn new(config: &ChartConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            width: config.width,
            height: config.height,
            states: config.states.clone(),
        }
    }

    /// Render every chart. A failing chart is logged and skipped; only a
    /// missing output directory aborts the batch.
    pub fn render_all(&self, results: &AnalysisResults) -> Result<RenderSummary, RenderError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|source| RenderError::OutputDir {
            path: self.output_dir.clone(),
            source,
        })?;

        let outcomes = [
            ("order volume", self.order_volume(results)),
            ("state sales trend", self.state_trend(results)),
            ("top sub-categories", self.top_subcategories(results)),
            ("profit vs orders", self.profit_vs_orders(results)),
            ("profit distribution", self.profit_distribution(results)),
        ];

        let mut summary = RenderSummary::default();
        for (chart, outcome) in outcomes {
            match outcome {
                Ok(path) => {
                    debug!(chart, path = %path.display(), "Chart written");
                    summary.written.push(path);
                }
                Err(err) => {
                    warn!(chart, error = %err, "Chart skipped");
                    summary.skipped.push((chart, err));
                }
            }
        }

        info!(
            written = summary.written.len(),
            skipped = summary.skipped.len(),
            dir = %self.output_dir.display(),
            "Charts rendered"
        );
        Ok(summary)
    }

    pub fn order_volume(&self, results: &AnalysisResults) -> Result<PathBuf, RenderError> {
        let bars = series::order_volume_bars(&results.yearly_order_volume);
        if bars.is_empty() {
            return Err(RenderError::NoData("order volume"));
        }
        self.paint("order volume", ORDER_VOLUME_FILE, |root| {
            draw_order_volume(root, &bars)
        })
    }

    pub fn state_trend(&self, results: &AnalysisResults) -> Result<PathBuf, RenderError> {
        let trends = series::state_trends(&results.yearly_state_sales, &self.states);
        if trends.is_empty() {
            return Err(RenderError::NoData("state sales trend"));
        }
        self.paint("state sales trend", STATE_TREND_FILE, |root| {
            draw_state_trend(root, &trends)
        })
    }

    pub fn top_subcategories(&self, results: &AnalysisResults) -> Result<PathBuf, RenderError> {
        let bars = series::grouped_bars(&results.top_subcategories);
        if bars.is_empty() {
            return Err(RenderError::NoData("top sub-categories"));
        }
        self.paint("top sub-categories", TOP_SUBCATEGORIES_FILE, |root| {
            draw_grouped_bars(root, &bars)
        })
    }

    pub fn profit_vs_orders(&self, results: &AnalysisResults) -> Result<PathBuf, RenderError> {
        let points = series::scatter_points(&results.profit_by_subcategory);
        if points.is_empty() {
            return Err(RenderError::NoData("profit vs orders"));
        }
        self.paint("profit vs orders", PROFIT_VS_ORDERS_FILE, |root| {
            draw_scatter(root, &points)
        })
    }

    pub fn profit_distribution(&self, results: &AnalysisResults) -> Result<PathBuf, RenderError> {
        let slices = series::pie_slices(&results.regional_profit_share);
        if slices.is_empty() {
            return Err(RenderError::NoData("profit distribution"));
        }
        self.paint("profit distribution", PROFIT_DISTRIBUTION_FILE, |root| {
            draw_pie(root, &slices)
        })
    }

    fn paint<F>(&self, chart: &'static str, file: &str, draw: F) -> Result<PathBuf, RenderError>
    where
        F: FnOnce(&Canvas<'_>) -> DrawResult,
    {
        let path = self.output_dir.join(file);
        let outcome = {
            let root = BitMapBackend::new(&path, (self.width, self.height)).into_drawing_area();
            fill_draw_present(&root, draw)
        };
        outcome.map_err(|err| RenderError::Drawing {
            chart,
            message: err.to_string(),
        })?;
        Ok(path)
    }
}

fn fill_draw_present<F>(root: &Canvas<'_>, draw: F) -> DrawResult
where
    F: FnOnce(&Canvas<'_>) -> DrawResult,
{
    root.fill(&WHITE)?;
    draw(root)?;
    root.present()?;
    Ok(())
}

fn year_label(x: f64) -> String {
    let rounded = x.round();
    if (x - rounded).abs() < 1e-6 {
        format!("{}", rounded as i64)
    } else {
        String::new()
    }
}

fn category_label(categories: &[String], x: f64) -> String {
    let rounded = x.round();
    if (x - rounded).abs() > 1e-6 || rounded < 0.0 {
        return String::new();
    }
    categories
        .get(rounded as usize)
        .cloned()
        .unwrap_or_default()
}

fn year_bounds(years: impl Iterator<Item = i32>) -> (f64, f64) {
    let (lo, hi) = years.fold((i32::MAX, i32::MIN), |(lo, hi), y| (lo.min(y), hi.max(y)));
    (lo as f64 - 0.5, hi as f64 + 0.5)
}

fn draw_order_volume(root: &Canvas<'_>, bars: &[(i32, f64)]) -> DrawResult {
    let (x_min, x_max) = year_bounds(bars.iter().map(|(year, _)| *year));
    let (_, y_max) = series::value_range(bars.iter().map(|(_, count)| *count), true);

    let mut chart = ChartBuilder::on(root)
        .caption("Yearly Order Volume", (FONT, 32))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(x_min..x_max, 0.0..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(bars.len() + 1)
        .x_label_formatter(&|x| year_label(*x))
        .y_label_formatter(&|y| format!("{:.0}", y))
        .x_desc("Year")
        .y_desc("Order line items")
        .draw()?;

    let color = PALETTE[0];
    chart.draw_series(bars.iter().map(|(year, count)| {
        let x = *year as f64;
        Rectangle::new([(x - 0.35, 0.0), (x + 0.35, *count)], color.filled())
    }))?;

    chart.draw_series(bars.iter().map(|(year, count)| {
        EmptyElement::at((*year as f64, *count))
            + Text::new(format!("{:.0}", count), (-18, -22), (FONT, 16).into_font())
    }))?;

    Ok(())
}

fn draw_state_trend(root: &Canvas<'_>, trends: &[StateSeries]) -> DrawResult {
    let (x_min, x_max) = year_bounds(
        trends
            .iter()
            .flat_map(|s| s.points.iter().map(|(year, _)| *year)),
    );
    let (y_min, y_max) = series::value_range(
        trends.iter().flat_map(|s| s.points.iter().map(|(_, v)| *v)),
        false,
    );

    let mut chart = ChartBuilder::on(root)
        .caption("Total Sales by State and Year", (FONT, 32))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(100)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_labels(trends.iter().map(|s| s.points.len()).max().unwrap_or(1) + 1)
        .x_label_formatter(&|x| year_label(*x))
        .y_label_formatter(&|y| format!("{:.0}", y))
        .x_desc("Year")
        .y_desc("Total sales")
        .draw()?;

    for (index, trend) in trends.iter().enumerate() {
        let color = series::series_color(index);
        let points: Vec<(f64, f64)> = trend
            .points
            .iter()
            .map(|(year, total)| (*year as f64, *total))
            .collect();

        chart
            .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(3)))?
            .label(trend.state.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(3)));
        chart.draw_series(points.iter().map(|p| Circle::new(*p, 5, color.filled())))?;
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.85))
        .border_style(BLACK)
        .label_font((FONT, 16))
        .draw()?;

    Ok(())
}

fn draw_grouped_bars(root: &Canvas<'_>, bars: &GroupedBars) -> DrawResult {
    let n = bars.categories.len();
    let (y_min, y_max) = series::value_range(bars.all_values(), true);
    let bar_width = 0.8 / bars.regions.len().max(1) as f64;

    let mut chart = ChartBuilder::on(root)
        .caption("Top Sub-Categories by Profit per Region", (FONT, 32))
        .margin(20)
        .x_label_area_size(180)
        .y_label_area_size(100)
        .build_cartesian_2d(-0.5..(n as f64 - 0.5), y_min..y_max)?;

    let labeler = |x: &f64| category_label(&bars.categories, *x);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n + 1)
        .x_label_formatter(&labeler)
        .x_label_style((FONT, 14).into_font().transform(FontTransform::Rotate90))
        .y_label_formatter(&|y| format!("{:.0}", y))
        .y_desc("Total profit")
        .draw()?;

    for (r, region) in bars.regions.iter().enumerate() {
        let color = series::region_color(*region);
        let offset = -0.4 + r as f64 * bar_width;
        chart
            .draw_series(bars.values[r].iter().enumerate().filter_map(|(c, value)| {
                value.map(|v| {
                    let left = c as f64 + offset;
                    Rectangle::new([(left, 0.0), (left + bar_width, v)], color.filled())
                })
            }))?
            .label(region.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 6), (x + 14, y + 6)], color.filled()));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.85))
        .border_style(BLACK)
        .label_font((FONT, 16))
        .draw()?;

    Ok(())
}

fn draw_scatter(root: &Canvas<'_>, points: &[ScatterPoint]) -> DrawResult {
    let (x_min, x_max) = series::value_range(points.iter().map(|p| p.order_count), true);
    let (y_min, y_max) = series::value_range(points.iter().map(|p| p.total_profit), false);

    let mut chart = ChartBuilder::on(root)
        .caption("Profit vs Order Count by Sub-Category", (FONT, 32))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(100)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_label_formatter(&|x| format!("{:.0}", x))
        .y_label_formatter(&|y| format!("{:.0}", y))
        .x_desc("Order count")
        .y_desc("Total profit")
        .draw()?;

    if y_min < 0.0 && y_max > 0.0 {
        chart.draw_series(LineSeries::new(
            vec![(x_min, 0.0), (x_max, 0.0)],
            BLACK.mix(0.4),
        ))?;
    }

    for region in Region::ALL {
        let color = series::region_color(region);
        let members: Vec<&ScatterPoint> = points.iter().filter(|p| p.region == region).collect();
        if members.is_empty() {
            continue;
        }
        chart
            .draw_series(members.iter().map(|p| {
                Circle::new(
                    (p.order_count, p.total_profit),
                    p.radius,
                    color.mix(0.65).filled(),
                )
            }))?
            .label(region.as_str())
            .legend(move |(x, y)| Circle::new((x + 7, y), 6, color.filled()));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.85))
        .border_style(BLACK)
        .label_font((FONT, 16))
        .draw()?;

    Ok(())
}

fn draw_pie(root: &Canvas<'_>, slices: &[PieSlice]) -> DrawResult {
    let area = root.titled("Regional Profit Distribution", (FONT, 32))?;
    let (width, height) = area.dim_in_pixel();
    let center = ((width / 2) as i32, (height / 2) as i32);
    let radius = f64::from(width.min(height)) * 0.38;

    let sizes: Vec<f64> = slices.iter().map(|s| s.value).collect();
    let colors: Vec<RGBColor> = slices
        .iter()
        .map(|s| series::region_color(s.region))
        .collect();
    let labels: Vec<String> = slices.iter().map(|s| s.region.to_string()).collect();

    let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
    pie.label_style((FONT, 22).into_font());
    pie.percentages((FONT, 18).into_font().color(&WHITE));
    area.draw(&pie)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::YearRange;
    use crate::data::SalesRecord;
    use crate::stats::InMemoryQueries;
    use chrono::NaiveDate;

    fn record(
        date: (i32, u32, u32),
        state: &str,
        region: Region,
        sub: &str,
        sales: f64,
        profit: f64,
    ) -> SalesRecord {
        SalesRecord {
            order_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            product_name: format!("{sub} item"),
            state: state.to_string(),
            region,
            sub_category: sub.to_string(),
            sales_amount: sales,
            profit_amount: profit,
        }
    }

    fn populated_results() -> AnalysisResults {
        let records = vec![
            record((2012, 1, 5), "Texas", Region::Central, "Chairs", 100.0, 20.0),
            record((2013, 2, 9), "Texas", Region::Central, "Tables", 150.0, -5.0),
            record((2014, 3, 1), "California", Region::West, "Binders", 80.0, 12.5),
            record((2015, 6, 30), "California", Region::West, "Chairs", 220.0, 41.0),
            record((2013, 8, 14), "New York", Region::East, "Paper", 35.0, 7.0),
            record((2014, 11, 2), "Florida", Region::South, "Phones", 410.0, 60.0),
        ];
        AnalysisResults::compute(&InMemoryQueries::new(&records), YearRange::default(), 3)
            .unwrap()
    }

    fn empty_results() -> AnalysisResults {
        AnalysisResults {
            year_range: YearRange::default(),
            yearly_order_volume: Vec::new(),
            yearly_state_sales: Vec::new(),
            sales_growth: Vec::new(),
            profit_by_subcategory: Vec::new(),
            top_product_per_region: Vec::new(),
            top_subcategories: Vec::new(),
            regional_profit_share: Vec::new(),
        }
    }

    #[test]
    fn empty_results_skip_every_chart() {
        let dir = tempfile::tempdir().unwrap();
        let config = ChartConfig {
            output_dir: dir.path().join("charts"),
            ..ChartConfig::default()
        };
        let summary = StaticChartRenderer::new(&config)
            .render_all(&empty_results())
            .unwrap();

        assert!(summary.written.is_empty());
        assert_eq!(summary.skipped.len(), 5);
        assert!(summary
            .skipped
            .iter()
            .all(|(_, err)| matches!(err, RenderError::NoData(_))));
        assert!(config.output_dir.is_dir());
    }

    /// Drawing text needs a system font, so a chart may fail with
    /// `Drawing` on a bare host. Either way it must not be `NoData`, and a
    /// returned path must be a non-empty PNG.
    #[test]
    fn populated_results_write_each_chart_or_report_drawing_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = ChartConfig {
            output_dir: dir.path().join("charts"),
            width: 640,
            height: 480,
            ..ChartConfig::default()
        };
        let renderer = StaticChartRenderer::new(&config);
        let results = populated_results();
        std::fs::create_dir_all(&config.output_dir).unwrap();

        let outcomes = [
            (ORDER_VOLUME_FILE, renderer.order_volume(&results)),
            (STATE_TREND_FILE, renderer.state_trend(&results)),
            (TOP_SUBCATEGORIES_FILE, renderer.top_subcategories(&results)),
            (PROFIT_VS_ORDERS_FILE, renderer.profit_vs_orders(&results)),
            (PROFIT_DISTRIBUTION_FILE, renderer.profit_distribution(&results)),
        ];
        for (file, outcome) in outcomes {
            match outcome {
                Ok(path) => {
                    assert_eq!(path, config.output_dir.join(file));
                    let bytes = std::fs::read(&path).unwrap();
                    assert!(bytes.starts_with(b"\x89PNG"), "{file} is not a PNG");
                }
                Err(RenderError::Drawing { .. }) => {}
                Err(other) => panic!("{file}: unexpected error {other}"),
            }
        }

        let summary = renderer.render_all(&results).unwrap();
        assert_eq!(summary.written.len() + summary.skipped.len(), 5);
        assert!(summary
            .skipped
            .iter()
            .all(|(_, err)| matches!(err, RenderError::Drawing { .. })));
    }

    #[test]
    fn axis_labels_only_on_whole_positions() {
        assert_eq!(year_label(2013.0), "2013");
        assert_eq!(year_label(2013.5), "");

        let categories = vec!["Chairs".to_string(), "Paper".to_string()];
        assert_eq!(category_label(&categories, 1.0), "Paper");
        assert_eq!(category_label(&categories, 0.5), "");
        assert_eq!(category_label(&categories, -1.0), "");
        assert_eq!(category_label(&categories, 2.0), "");
    }

    #[test]
    fn year_bounds_pad_half_a_year() {
        assert_eq!(year_bounds([2014, 2012, 2013].into_iter()), (2011.5, 2014.5));
    }
}
