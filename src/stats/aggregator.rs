//! Sales Aggregator Module
//! Yearly totals, year-over-year growth and per-region profit rankings.
//!
//! Every function here is pure: it takes records (or a previous aggregate)
//! and returns a fresh, deterministically ordered result. Empty input gives
//! empty output.

use crate::config::YearRange;
use crate::data::{Region, SalesRecord};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Total sales for one state in one calendar year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyStateSales {
    pub state: String,
    pub year: i32,
    pub total_sales: f64,
}

/// Year-over-year growth for one state. `None` means "no prior data" (first
/// year, or a previous total of zero), never 0%.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthRecord {
    pub state: String,
    pub year: i32,
    pub total_sales: f64,
    pub previous_year_sales: Option<f64>,
    pub growth_rate_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubCategoryProfit {
    pub region: Region,
    pub sub_category: String,
    pub total_profit: f64,
    pub order_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopProductByRegion {
    pub region: Region,
    pub sub_category: String,
    pub total_profit: f64,
}

/// Order line items per calendar year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearlyOrderVolume {
    pub year: i32,
    pub order_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionProfitShare {
    pub region: Region,
    pub total_profit: f64,
    /// Percentage of the summed absolute regional profit.
    pub share_pct: Option<f64>,
}

/// Round to two decimal places, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Growth in percent, or `None` when there is no usable previous value.
pub fn growth_rate_pct(total: f64, previous: Option<f64>) -> Option<f64> {
    let previous = previous?;
    if previous == 0.0 {
        return None;
    }
    let rate = round2((total - previous) / previous * 100.0);
    rate.is_finite().then_some(rate)
}

/// Compensated (Kahan-Babuska-Neumaier) running sum, the same scheme SQLite
/// uses for `SUM()` over floating point values.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompensatedSum {
    sum: f64,
    err: f64,
}

impl CompensatedSum {
    pub fn add(&mut self, value: f64) {
        let t = self.sum + value;
        if self.sum.abs() > value.abs() {
            self.err += (self.sum - t) + value;
        } else {
            self.err += (value - t) + self.sum;
        }
        self.sum = t;
    }

    pub fn value(&self) -> f64 {
        self.sum + self.err
    }
}

/// Ranking order inside a region: profit descending, then name ascending.
fn by_profit_then_name(a: &SubCategoryProfit, b: &SubCategoryProfit) -> Ordering {
    b.total_profit
        .total_cmp(&a.total_profit)
        .then_with(|| a.sub_category.cmp(&b.sub_category))
}

/// Computes aggregates over the sales fact table.
pub struct SalesAggregator;

impl SalesAggregator {
    /// Order line items per year, over every year present.
    pub fn yearly_order_volume(records: &[SalesRecord]) -> Vec<YearlyOrderVolume> {
        let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
        for record in records {
            *counts.entry(record.year()).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .map(|(year, order_count)| YearlyOrderVolume { year, order_count })
            .collect()
    }

    /// Sum of sales per (state, year) within `range`, ordered by state then year.
    pub fn yearly_state_sales(records: &[SalesRecord], range: YearRange) -> Vec<YearlyStateSales> {
        let mut totals: BTreeMap<(&str, i32), CompensatedSum> = BTreeMap::new();
        for record in records.iter().filter(|r| range.contains(r.year())) {
            totals
                .entry((record.state.as_str(), record.year()))
                .or_default()
                .add(record.sales_amount);
        }
        totals
            .into_iter()
            .map(|((state, year), total)| YearlyStateSales {
                state: state.to_string(),
                year,
                total_sales: total.value(),
            })
            .collect()
    }

    /// Growth per state against the previous year present for that state.
    pub fn sales_growth(yearly: &[YearlyStateSales]) -> Vec<GrowthRecord> {
        let mut by_state: BTreeMap<&str, Vec<&YearlyStateSales>> = BTreeMap::new();
        for entry in yearly {
            by_state.entry(entry.state.as_str()).or_default().push(entry);
        }

        let mut growth = Vec::with_capacity(yearly.len());
        for (state, mut years) in by_state {
            years.sort_by_key(|e| e.year);
            let mut previous: Option<f64> = None;
            for entry in years {
                growth.push(GrowthRecord {
                    state: state.to_string(),
                    year: entry.year,
                    total_sales: entry.total_sales,
                    previous_year_sales: previous,
                    growth_rate_pct: growth_rate_pct(entry.total_sales, previous),
                });
                previous = Some(entry.total_sales);
            }
        }
        growth
    }

    /// Profit and order count per (region, sub-category) within `range`.
    ///
    /// Ordered by region, then profit descending, then sub-category name.
    pub fn profit_by_subcategory(
        records: &[SalesRecord],
        range: YearRange,
    ) -> Vec<SubCategoryProfit> {
        let mut totals: BTreeMap<(Region, &str), (CompensatedSum, usize)> = BTreeMap::new();
        for record in records.iter().filter(|r| range.contains(r.year())) {
            let entry = totals
                .entry((record.region, record.sub_category.as_str()))
                .or_default();
            entry.0.add(record.profit_amount);
            entry.1 += 1;
        }

        let mut profits: Vec<SubCategoryProfit> = totals
            .into_iter()
            .map(
                |((region, sub_category), (total, order_count))| SubCategoryProfit {
                    region,
                    sub_category: sub_category.to_string(),
                    total_profit: total.value(),
                    order_count,
                },
            )
            .collect();
        profits.sort_by(|a, b| a.region.cmp(&b.region).then_with(|| by_profit_then_name(a, b)));
        profits
    }

    /// The most profitable sub-category of each region with data.
    ///
    /// Ties go to the alphabetically first sub-category. Output is ordered by
    /// profit descending, then region.
    pub fn top_product_per_region(profits: &[SubCategoryProfit]) -> Vec<TopProductByRegion> {
        let mut best: BTreeMap<Region, &SubCategoryProfit> = BTreeMap::new();
        for entry in profits {
            best.entry(entry.region)
                .and_modify(|current| {
                    if by_profit_then_name(entry, current) == Ordering::Less {
                        *current = entry;
                    }
                })
                .or_insert(entry);
        }

        let mut top: Vec<TopProductByRegion> = best
            .into_values()
            .map(|entry| TopProductByRegion {
                region: entry.region,
                sub_category: entry.sub_category.clone(),
                total_profit: entry.total_profit,
            })
            .collect();
        top.sort_by(|a, b| {
            b.total_profit
                .total_cmp(&a.total_profit)
                .then_with(|| a.region.cmp(&b.region))
        });
        top
    }

    /// Up to `n` most profitable sub-categories per region, ordered by region.
    pub fn top_n_per_region(profits: &[SubCategoryProfit], n: usize) -> Vec<SubCategoryProfit> {
        let mut by_region: BTreeMap<Region, Vec<&SubCategoryProfit>> = BTreeMap::new();
        for entry in profits {
            by_region.entry(entry.region).or_default().push(entry);
        }

        by_region
            .into_values()
            .flat_map(|mut entries| {
                entries.sort_by(|a, b| by_profit_then_name(a, b));
                entries.into_iter().take(n).cloned()
            })
            .collect()
    }

    /// Profit per region and its share of the absolute total.
    pub fn regional_profit_share(profits: &[SubCategoryProfit]) -> Vec<RegionProfitShare> {
        let mut totals: BTreeMap<Region, f64> = BTreeMap::new();
        for entry in profits {
            *totals.entry(entry.region).or_insert(0.0) += entry.total_profit;
        }

        let absolute: f64 = totals.values().map(|v| v.abs()).sum();
        totals
            .into_iter()
            .map(|(region, total_profit)| RegionProfitShare {
                region,
                total_profit,
                share_pct: (absolute > 0.0).then(|| round2(total_profit / absolute * 100.0)),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(
        date: &str,
        state: &str,
        region: Region,
        sub_category: &str,
        sales: f64,
        profit: f64,
    ) -> SalesRecord {
        SalesRecord {
            order_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            product_name: "Item".to_string(),
            state: state.to_string(),
            region,
            sub_category: sub_category.to_string(),
            sales_amount: sales,
            profit_amount: profit,
        }
    }

    fn yearly(state: &str, year: i32, total_sales: f64) -> YearlyStateSales {
        YearlyStateSales {
            state: state.to_string(),
            year,
            total_sales,
        }
    }

    fn profit(region: Region, sub_category: &str, total_profit: f64) -> SubCategoryProfit {
        SubCategoryProfit {
            region,
            sub_category: sub_category.to_string(),
            total_profit,
            order_count: 1,
        }
    }

    fn sample_records() -> Vec<SalesRecord> {
        vec![
            record("2011-06-01", "Texas", Region::Central, "Chairs", 999.0, 1.0),
            record("2012-01-10", "Texas", Region::Central, "Chairs", 100.0, 10.0),
            record("2012-05-10", "Texas", Region::Central, "Binders", 25.5, -4.0),
            record("2013-03-03", "Texas", Region::Central, "Chairs", 150.0, 20.0),
            record("2012-02-02", "Ohio", Region::East, "Binders", 40.0, 8.0),
            record("2015-12-31", "Ohio", Region::East, "Binders", 60.0, 2.0),
            record("2016-01-01", "Ohio", Region::East, "Chairs", 500.0, 50.0),
        ]
    }

    #[test]
    fn yearly_state_sales_sums_within_range() {
        let result = SalesAggregator::yearly_state_sales(&sample_records(), YearRange::default());
        assert_eq!(
            result,
            vec![
                yearly("Ohio", 2012, 40.0),
                yearly("Ohio", 2015, 60.0),
                yearly("Texas", 2012, 125.5),
                yearly("Texas", 2013, 150.0),
            ]
        );
    }

    #[test]
    fn yearly_totals_match_subset_sums() {
        let records = sample_records();
        let range = YearRange::new(2011, 2016).unwrap();
        for entry in SalesAggregator::yearly_state_sales(&records, range) {
            let expected: f64 = records
                .iter()
                .filter(|r| r.state == entry.state && r.year() == entry.year)
                .map(|r| r.sales_amount)
                .sum();
            assert_eq!(entry.total_sales, expected);
        }
        let grand: f64 = SalesAggregator::yearly_state_sales(&records, range)
            .iter()
            .map(|e| e.total_sales)
            .sum();
        assert_eq!(grand, records.iter().map(|r| r.sales_amount).sum::<f64>());
    }

    #[test]
    fn growth_follows_previous_present_year() {
        let growth = SalesAggregator::sales_growth(&[
            yearly("Utah", 2014, 75.0),
            yearly("Utah", 2012, 100.0),
            yearly("Utah", 2013, 150.0),
        ]);
        assert_eq!(growth.len(), 3);
        assert_eq!(growth[0].year, 2012);
        assert_eq!(growth[0].previous_year_sales, None);
        assert_eq!(growth[0].growth_rate_pct, None);
        assert_eq!(growth[1].previous_year_sales, Some(100.0));
        assert_eq!(growth[1].growth_rate_pct, Some(50.0));
        assert_eq!(growth[2].previous_year_sales, Some(150.0));
        assert_eq!(growth[2].growth_rate_pct, Some(-50.0));
    }

    #[test]
    fn zero_previous_sales_gives_absent_growth() {
        let growth = SalesAggregator::sales_growth(&[
            yearly("Utah", 2012, 0.0),
            yearly("Utah", 2013, 80.0),
        ]);
        assert_eq!(growth[1].previous_year_sales, Some(0.0));
        assert_eq!(growth[1].growth_rate_pct, None);
    }

    #[test]
    fn compensated_sum_keeps_small_terms() {
        let mut naive = 0.0;
        let mut compensated = CompensatedSum::default();
        for value in [1e16, 1.0, -1e16] {
            naive += value;
            compensated.add(value);
        }
        assert_eq!(naive, 0.0);
        assert_eq!(compensated.value(), 1.0);
    }

    #[test]
    fn growth_is_rounded_to_two_places() {
        assert_eq!(growth_rate_pct(100.0, Some(30.0)), Some(233.33));
        assert_eq!(growth_rate_pct(2.0, Some(3.0)), Some(-33.33));
    }

    #[test]
    fn growth_is_partitioned_by_state() {
        let growth = SalesAggregator::sales_growth(&[
            yearly("Ohio", 2013, 10.0),
            yearly("Texas", 2012, 50.0),
            yearly("Ohio", 2012, 5.0),
        ]);
        let keys: Vec<(&str, i32)> = growth.iter().map(|g| (g.state.as_str(), g.year)).collect();
        assert_eq!(keys, vec![("Ohio", 2012), ("Ohio", 2013), ("Texas", 2012)]);
        assert_eq!(growth[1].growth_rate_pct, Some(100.0));
        assert_eq!(growth[2].previous_year_sales, None);
    }

    #[test]
    fn profit_by_subcategory_groups_and_counts() {
        let result =
            SalesAggregator::profit_by_subcategory(&sample_records(), YearRange::default());
        assert_eq!(
            result,
            vec![
                SubCategoryProfit {
                    region: Region::Central,
                    sub_category: "Chairs".into(),
                    total_profit: 30.0,
                    order_count: 2,
                },
                SubCategoryProfit {
                    region: Region::Central,
                    sub_category: "Binders".into(),
                    total_profit: -4.0,
                    order_count: 1,
                },
                SubCategoryProfit {
                    region: Region::East,
                    sub_category: "Binders".into(),
                    total_profit: 10.0,
                    order_count: 2,
                },
            ]
        );
    }

    #[test]
    fn top_product_tie_goes_to_alphabetically_first() {
        let top = SalesAggregator::top_product_per_region(&[
            profit(Region::East, "Chairs", 500.0),
            profit(Region::East, "Binders", 500.0),
        ]);
        assert_eq!(
            top,
            vec![TopProductByRegion {
                region: Region::East,
                sub_category: "Binders".into(),
                total_profit: 500.0,
            }]
        );
    }

    #[test]
    fn top_product_skips_regions_without_data() {
        let top = SalesAggregator::top_product_per_region(&[
            profit(Region::West, "Storage", -5.0),
            profit(Region::West, "Tables", -20.0),
            profit(Region::South, "Paper", 40.0),
            profit(Region::South, "Copiers", 90.0),
        ]);
        let picked: Vec<(Region, &str)> = top
            .iter()
            .map(|t| (t.region, t.sub_category.as_str()))
            .collect();
        assert_eq!(
            picked,
            vec![(Region::South, "Copiers"), (Region::West, "Storage")]
        );
    }

    #[test]
    fn top_n_slices_each_region() {
        let top = SalesAggregator::top_n_per_region(
            &[
                profit(Region::East, "A", 1.0),
                profit(Region::East, "B", 3.0),
                profit(Region::East, "C", 3.0),
                profit(Region::Central, "D", 7.0),
            ],
            2,
        );
        let picked: Vec<(Region, &str)> = top
            .iter()
            .map(|t| (t.region, t.sub_category.as_str()))
            .collect();
        assert_eq!(
            picked,
            vec![(Region::Central, "D"), (Region::East, "B"), (Region::East, "C")]
        );
    }

    #[test]
    fn regional_share_uses_absolute_total() {
        let shares = SalesAggregator::regional_profit_share(&[
            profit(Region::East, "A", 30.0),
            profit(Region::East, "B", 10.0),
            profit(Region::West, "C", -10.0),
            profit(Region::South, "D", 50.0),
        ]);
        let flat: Vec<(Region, f64, Option<f64>)> = shares
            .iter()
            .map(|s| (s.region, s.total_profit, s.share_pct))
            .collect();
        assert_eq!(
            flat,
            vec![
                (Region::East, 40.0, Some(40.0)),
                (Region::South, 50.0, Some(50.0)),
                (Region::West, -10.0, Some(-10.0)),
            ]
        );
    }

    #[test]
    fn yearly_order_volume_counts_every_year() {
        let volume = SalesAggregator::yearly_order_volume(&sample_records());
        assert_eq!(
            volume,
            vec![
                YearlyOrderVolume { year: 2011, order_count: 1 },
                YearlyOrderVolume { year: 2012, order_count: 3 },
                YearlyOrderVolume { year: 2013, order_count: 1 },
                YearlyOrderVolume { year: 2015, order_count: 1 },
                YearlyOrderVolume { year: 2016, order_count: 1 },
            ]
        );
    }

    #[test]
    fn empty_input_gives_empty_aggregates() {
        let range = YearRange::default();
        let yearly = SalesAggregator::yearly_state_sales(&[], range);
        let profits = SalesAggregator::profit_by_subcategory(&[], range);
        assert!(yearly.is_empty());
        assert!(SalesAggregator::sales_growth(&yearly).is_empty());
        assert!(profits.is_empty());
        assert!(SalesAggregator::top_product_per_region(&profits).is_empty());
        assert!(SalesAggregator::yearly_order_volume(&[]).is_empty());
        assert!(SalesAggregator::regional_profit_share(&profits).is_empty());
    }

    #[test]
    fn filtering_everything_out_is_not_an_error() {
        let range = YearRange::new(1990, 1991).unwrap();
        assert!(SalesAggregator::yearly_state_sales(&sample_records(), range).is_empty());
        assert!(SalesAggregator::profit_by_subcategory(&sample_records(), range).is_empty());
    }
}
