//! Charts module - Chart data preparation and PNG rendering

mod renderer;
pub mod series;

pub use renderer::StaticChartRenderer;
