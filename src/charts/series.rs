//! Chart Series Module
//! Reshapes aggregates into plot-ready series. No drawing happens here.

use crate::data::Region;
use crate::stats::{
    RegionProfitShare, SubCategoryProfit, YearlyOrderVolume, YearlyStateSales,
};
use plotters::style::RGBColor;

/// Color palette for series
pub const PALETTE: [RGBColor; 10] = [
    RGBColor(52, 152, 219),  // Blue
    RGBColor(231, 76, 60),   // Red
    RGBColor(46, 204, 113),  // Green
    RGBColor(155, 89, 182),  // Purple
    RGBColor(243, 156, 18),  // Orange
    RGBColor(26, 188, 156),  // Teal
    RGBColor(233, 30, 99),   // Pink
    RGBColor(0, 188, 212),   // Cyan
    RGBColor(121, 85, 72),   // Brown
    RGBColor(96, 125, 139),  // Blue Grey
];

pub fn series_color(index: usize) -> RGBColor {
    PALETTE[index % PALETTE.len()]
}

/// Stable color per region so every chart agrees.
pub fn region_color(region: Region) -> RGBColor {
    let index = Region::ALL.iter().position(|r| *r == region).unwrap_or(0);
    series_color(index)
}

/// Padded axis range around `values`. `include_zero` anchors bar charts.
pub fn value_range(values: impl IntoIterator<Item = f64>, include_zero: bool) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values.into_iter().filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }
    if min.is_infinite() {
        return (0.0, 1.0);
    }
    if include_zero {
        min = min.min(0.0);
        max = max.max(0.0);
    }
    let span = max - min;
    let pad = if span > 0.0 { span * 0.15 } else { max.abs().max(1.0) * 0.15 };
    let lower = if include_zero && min >= 0.0 { 0.0 } else { min - pad };
    (lower, max + pad)
}

/// Order line items per year as (year, count) points.
pub fn order_volume_bars(volume: &[YearlyOrderVolume]) -> Vec<(i32, f64)> {
    volume
        .iter()
        .map(|v| (v.year, v.order_count as f64))
        .collect()
}

/// Yearly totals for one state.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSeries {
    pub state: String,
    pub points: Vec<(i32, f64)>,
}

/// One line per requested state, in request order. States without data are skipped.
pub fn state_trends(yearly: &[YearlyStateSales], states: &[String]) -> Vec<StateSeries> {
    states
        .iter()
        .filter_map(|state| {
            let mut points: Vec<(i32, f64)> = yearly
                .iter()
                .filter(|e| &e.state == state)
                .map(|e| (e.year, e.total_sales))
                .collect();
            if points.is_empty() {
                return None;
            }
            points.sort_by_key(|(year, _)| *year);
            Some(StateSeries {
                state: state.clone(),
                points,
            })
        })
        .collect()
}

/// Sub-category profit bars grouped by category, one bar per region.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedBars {
    pub categories: Vec<String>,
    pub regions: Vec<Region>,
    /// `values[r][c]` is the profit of `regions[r]` in `categories[c]`.
    pub values: Vec<Vec<Option<f64>>>,
}

impl GroupedBars {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn all_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().flatten().filter_map(|v| *v)
    }
}

/// Build grouped bars from a top-N selection. Categories keep first-seen order.
pub fn grouped_bars(top: &[SubCategoryProfit]) -> GroupedBars {
    let mut categories: Vec<String> = Vec::new();
    let mut regions: Vec<Region> = Vec::new();
    for entry in top {
        if !categories.contains(&entry.sub_category) {
            categories.push(entry.sub_category.clone());
        }
        if !regions.contains(&entry.region) {
            regions.push(entry.region);
        }
    }
    regions.sort();

    let mut values = vec![vec![None; categories.len()]; regions.len()];
    for entry in top {
        let r = regions.iter().position(|x| *x == entry.region);
        let c = categories.iter().position(|x| *x == entry.sub_category);
        if let (Some(r), Some(c)) = (r, c) {
            values[r][c] = Some(entry.total_profit);
        }
    }

    GroupedBars {
        categories,
        regions,
        values,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScatterPoint {
    pub region: Region,
    pub order_count: f64,
    pub total_profit: f64,
    pub radius: i32,
}

const MIN_RADIUS: f64 = 4.0;
const MAX_RADIUS: f64 = 18.0;

/// Profit vs order count, marker radius scaled linearly by profit.
pub fn scatter_points(profits: &[SubCategoryProfit]) -> Vec<ScatterPoint> {
    let (lo, hi) = profits.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
        (lo.min(p.total_profit), hi.max(p.total_profit))
    });
    let span = hi - lo;

    profits
        .iter()
        .map(|p| {
            let t = if span > 0.0 {
                (p.total_profit - lo) / span
            } else {
                0.5
            };
            ScatterPoint {
                region: p.region,
                order_count: p.order_count as f64,
                total_profit: p.total_profit,
                radius: (MIN_RADIUS + t * (MAX_RADIUS - MIN_RADIUS)).round() as i32,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PieSlice {
    pub region: Region,
    pub value: f64,
}

/// Pie slices for regions with positive profit. Loss-making regions cannot be
/// drawn as a slice and are left out.
pub fn pie_slices(shares: &[RegionProfitShare]) -> Vec<PieSlice> {
    shares
        .iter()
        .filter(|s| s.total_profit > 0.0)
        .map(|s| PieSlice {
            region: s.region,
            value: s.total_profit,
        })
        .collect()
}
