//! Stats module - sales aggregation

mod aggregator;
mod queries;

pub use aggregator::{
    GrowthRecord, RegionProfitShare, SalesAggregator, SubCategoryProfit, TopProductByRegion,
    YearlyOrderVolume, YearlyStateSales,
};
pub use queries::{AnalysisResults, InMemoryQueries, SalesQueries};
