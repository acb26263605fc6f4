//! Data module - loading, cleaning and exporting the sales table

mod cleaner;
mod exporter;
mod loader;
mod model;

pub use cleaner::{CleaningReport, RecordCleaningError, SalesCleaner};
pub use exporter::SalesExporter;
pub use loader::SalesLoader;
pub use model::{Region, SalesRecord, SalesTable};
