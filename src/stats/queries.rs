//! Query surface shared by the in-memory and SQL engines.

use crate::config::YearRange;
use crate::data::SalesRecord;
use crate::stats::{
    GrowthRecord, RegionProfitShare, SalesAggregator, SubCategoryProfit, TopProductByRegion,
    YearlyOrderVolume, YearlyStateSales,
};
use serde::Serialize;
use std::convert::Infallible;
use tracing::info;

/// The aggregate computations over the sales fact table.
///
/// Implementations must agree exactly for any year range.
pub trait SalesQueries {
    type Error: std::error::Error + Send + Sync + 'static;

    fn yearly_order_volume(&self) -> Result<Vec<YearlyOrderVolume>, Self::Error>;

    fn yearly_state_sales(&self, range: YearRange) -> Result<Vec<YearlyStateSales>, Self::Error>;

    fn sales_growth(&self, range: YearRange) -> Result<Vec<GrowthRecord>, Self::Error>;

    fn profit_by_subcategory(
        &self,
        range: YearRange,
    ) -> Result<Vec<SubCategoryProfit>, Self::Error>;

    fn top_product_per_region(
        &self,
        range: YearRange,
    ) -> Result<Vec<TopProductByRegion>, Self::Error>;
}

/// In-process engine over a borrowed record set.
pub struct InMemoryQueries<'a> {
    records: &'a [SalesRecord],
}

impl<'a> InMemoryQueries<'a> {
    pub fn new(records: &'a [SalesRecord]) -> Self {
        Self { records }
    }
}

impl SalesQueries for InMemoryQueries<'_> {
    type Error = Infallible;

    fn yearly_order_volume(&self) -> Result<Vec<YearlyOrderVolume>, Self::Error> {
        Ok(SalesAggregator::yearly_order_volume(self.records))
    }

    fn yearly_state_sales(&self, range: YearRange) -> Result<Vec<YearlyStateSales>, Self::Error> {
        Ok(SalesAggregator::yearly_state_sales(self.records, range))
    }

    fn sales_growth(&self, range: YearRange) -> Result<Vec<GrowthRecord>, Self::Error> {
        let yearly = SalesAggregator::yearly_state_sales(self.records, range);
        Ok(SalesAggregator::sales_growth(&yearly))
    }

    fn profit_by_subcategory(
        &self,
        range: YearRange,
    ) -> Result<Vec<SubCategoryProfit>, Self::Error> {
        Ok(SalesAggregator::profit_by_subcategory(self.records, range))
    }

    fn top_product_per_region(
        &self,
        range: YearRange,
    ) -> Result<Vec<TopProductByRegion>, Self::Error> {
        let profits = SalesAggregator::profit_by_subcategory(self.records, range);
        Ok(SalesAggregator::top_product_per_region(&profits))
    }
}

/// Everything the report and the charts need from one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResults {
    pub year_range: YearRange,
    pub yearly_order_volume: Vec<YearlyOrderVolume>,
    pub yearly_state_sales: Vec<YearlyStateSales>,
    pub sales_growth: Vec<GrowthRecord>,
    pub profit_by_subcategory: Vec<SubCategoryProfit>,
    pub top_product_per_region: Vec<TopProductByRegion>,
    pub top_subcategories: Vec<SubCategoryProfit>,
    pub regional_profit_share: Vec<RegionProfitShare>,
}

impl AnalysisResults {
    /// Run every query against `engine`.
    pub fn compute<Q: SalesQueries>(
        engine: &Q,
        range: YearRange,
        top_n: usize,
    ) -> Result<Self, Q::Error> {
        let yearly_order_volume = engine.yearly_order_volume()?;
        let yearly_state_sales = engine.yearly_state_sales(range)?;
        let sales_growth = engine.sales_growth(range)?;
        let profit_by_subcategory = engine.profit_by_subcategory(range)?;
        let top_product_per_region = engine.top_product_per_region(range)?;

        let top_subcategories = SalesAggregator::top_n_per_region(&profit_by_subcategory, top_n);
        let regional_profit_share = SalesAggregator::regional_profit_share(&profit_by_subcategory);

        info!(
            years = yearly_order_volume.len(),
            state_years = yearly_state_sales.len(),
            subcategories = profit_by_subcategory.len(),
            regions = top_product_per_region.len(),
            "Aggregates computed"
        );

        Ok(Self {
            year_range: range,
            yearly_order_volume,
            yearly_state_sales,
            sales_growth,
            profit_by_subcategory,
            top_product_per_region,
            top_subcategories,
            regional_profit_share,
        })
    }
}
