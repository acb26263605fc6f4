//! SQLite staging store.
//!
//! Holds the cleaned fact table in `sales` and answers the aggregate queries
//! with GROUP BY and window functions (LAG, RANK).

use crate::config::YearRange;
use crate::data::{Region, SalesRecord};
use crate::stats::{
    GrowthRecord, SalesQueries, SubCategoryProfit, TopProductByRegion, YearlyOrderVolume,
    YearlyStateSales,
};
use rusqlite::{params, Connection};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Unknown region {0:?} in sales table")]
    UnknownRegion(String),
}

const CREATE_SALES_TABLE: &str = "
CREATE TABLE IF NOT EXISTS sales (
    order_date   TEXT NOT NULL,
    product_name TEXT NOT NULL,
    state        TEXT NOT NULL,
    region       TEXT NOT NULL,
    sub_category TEXT NOT NULL,
    sales        REAL NOT NULL,
    profit       REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sales_state ON sales (state);
CREATE INDEX IF NOT EXISTS idx_sales_region ON sales (region, sub_category);
";

const INSERT_SALE: &str = "
INSERT INTO sales (order_date, product_name, state, region, sub_category, sales, profit)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

const YEARLY_ORDER_VOLUME: &str = "
SELECT CAST(strftime('%Y', order_date) AS INTEGER) AS order_year,
       COUNT(*) AS order_line_items
FROM sales
GROUP BY order_year
ORDER BY order_year";

const YEARLY_STATE_SALES: &str = "
SELECT state,
       CAST(strftime('%Y', order_date) AS INTEGER) AS order_year,
       SUM(sales) AS total_sales
FROM sales
WHERE CAST(strftime('%Y', order_date) AS INTEGER) BETWEEN ?1 AND ?2
GROUP BY state, order_year
ORDER BY state, order_year";

const SALES_GROWTH: &str = "
WITH yearly AS (
    SELECT state,
           CAST(strftime('%Y', order_date) AS INTEGER) AS order_year,
           SUM(sales) AS total_sales
    FROM sales
    WHERE CAST(strftime('%Y', order_date) AS INTEGER) BETWEEN ?1 AND ?2
    GROUP BY state, order_year
),
lagged AS (
    SELECT state,
           order_year,
           total_sales,
           LAG(total_sales) OVER (PARTITION BY state ORDER BY order_year) AS previous_year_sales
    FROM yearly
)
SELECT state,
       order_year,
       total_sales,
       previous_year_sales,
       CASE
           WHEN previous_year_sales IS NULL OR previous_year_sales = 0 THEN NULL
           ELSE ROUND((total_sales - previous_year_sales) / previous_year_sales * 100, 2)
       END AS growth_rate_pct
FROM lagged
ORDER BY state, order_year";

const PROFIT_BY_SUBCATEGORY: &str = "
SELECT region,
       sub_category,
       SUM(profit) AS total_profit,
       COUNT(*) AS order_count
FROM sales
WHERE CAST(strftime('%Y', order_date) AS INTEGER) BETWEEN ?1 AND ?2
GROUP BY region, sub_category
ORDER BY region, total_profit DESC, sub_category";

const TOP_PRODUCT_PER_REGION: &str = "
WITH ranked AS (
    SELECT region,
           sub_category,
           SUM(profit) AS total_profit,
           RANK() OVER (
               PARTITION BY region
               ORDER BY SUM(profit) DESC, sub_category ASC
           ) AS rank_num
    FROM sales
    WHERE CAST(strftime('%Y', order_date) AS INTEGER) BETWEEN ?1 AND ?2
    GROUP BY region, sub_category
)
SELECT region, sub_category, total_profit
FROM ranked
WHERE rank_num = 1
ORDER BY total_profit DESC, region";

/// Column name and declared type, as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

/// Owns the SQLite connection; it is closed when the store is dropped.
pub struct SalesStore {
    conn: Connection,
}

impl SalesStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "Opened sales database");
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Create the `sales` table and its indexes if missing.
    pub fn create_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(CREATE_SALES_TABLE)?;
        Ok(())
    }

    /// Replace the table contents with `records` in a single transaction.
    pub fn replace_records(&mut self, records: &[SalesRecord]) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM sales", [])?;
        {
            let mut stmt = tx.prepare(INSERT_SALE)?;
            for record in records {
                stmt.execute(params![
                    record.order_date.format("%Y-%m-%d").to_string(),
                    record.product_name,
                    record.state,
                    record.region.as_str(),
                    record.sub_category,
                    record.sales_amount,
                    record.profit_amount,
                ])?;
            }
        }
        tx.commit()?;
        info!(rows = records.len(), "Staged sales records");
        Ok(records.len())
    }

    /// (Re)create the `yearly_state_sales` view for `range`.
    pub fn create_yearly_state_sales_view(&self, range: YearRange) -> Result<(), StoreError> {
        // Views cannot take bound parameters; the bounds are plain integers.
        let sql = format!(
            "DROP VIEW IF EXISTS yearly_state_sales;
             CREATE VIEW yearly_state_sales AS
             SELECT state AS State,
                    CAST(strftime('%Y', order_date) AS INTEGER) AS Order_Year,
                    SUM(sales) AS Total_Sales
             FROM sales
             WHERE CAST(strftime('%Y', order_date) AS INTEGER) BETWEEN {} AND {}
             GROUP BY State, Order_Year;",
            range.start, range.end
        );
        self.conn.execute_batch(&sql)?;
        debug!(start = range.start, end = range.end, "Created yearly_state_sales view");
        Ok(())
    }

    /// Rows of the `yearly_state_sales` view, ordered by state then year.
    pub fn read_yearly_state_sales_view(&self) -> Result<Vec<YearlyStateSales>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT State, Order_Year, Total_Sales FROM yearly_state_sales
             ORDER BY State, Order_Year",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(YearlyStateSales {
                    state: row.get(0)?,
                    year: row.get(1)?,
                    total_sales: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")?;
        let columns = stmt
            .query_map([table], |row| {
                Ok(ColumnInfo {
                    name: row.get(0)?,
                    data_type: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    pub fn record_count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sales", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn parse_region(raw: String) -> Result<Region, StoreError> {
    raw.parse::<Region>().map_err(StoreError::UnknownRegion)
}

impl SalesQueries for SalesStore {
    type Error = StoreError;

    fn yearly_order_volume(&self) -> Result<Vec<YearlyOrderVolume>, StoreError> {
        let mut stmt = self.conn.prepare(YEARLY_ORDER_VOLUME)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(YearlyOrderVolume {
                    year: row.get(0)?,
                    order_count: row.get::<_, i64>(1)? as usize,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn yearly_state_sales(&self, range: YearRange) -> Result<Vec<YearlyStateSales>, StoreError> {
        let mut stmt = self.conn.prepare(YEARLY_STATE_SALES)?;
        let rows = stmt
            .query_map(params![range.start, range.end], |row| {
                Ok(YearlyStateSales {
                    state: row.get(0)?,
                    year: row.get(1)?,
                    total_sales: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn sales_growth(&self, range: YearRange) -> Result<Vec<GrowthRecord>, StoreError> {
        let mut stmt = self.conn.prepare(SALES_GROWTH)?;
        let rows = stmt
            .query_map(params![range.start, range.end], |row| {
                Ok(GrowthRecord {
                    state: row.get(0)?,
                    year: row.get(1)?,
                    total_sales: row.get(2)?,
                    previous_year_sales: row.get(3)?,
                    growth_rate_pct: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn profit_by_subcategory(
        &self,
        range: YearRange,
    ) -> Result<Vec<SubCategoryProfit>, StoreError> {
        let mut stmt = self.conn.prepare(PROFIT_BY_SUBCATEGORY)?;
        let raw = stmt
            .query_map(params![range.start, range.end], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(region, sub_category, total_profit, order_count)| {
                Ok(SubCategoryProfit {
                    region: parse_region(region)?,
                    sub_category,
                    total_profit,
                    order_count: order_count as usize,
                })
            })
            .collect()
    }

    fn top_product_per_region(
        &self,
        range: YearRange,
    ) -> Result<Vec<TopProductByRegion>, StoreError> {
        let mut stmt = self.conn.prepare(TOP_PRODUCT_PER_REGION)?;
        let raw = stmt
            .query_map(params![range.start, range.end], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(region, sub_category, total_profit)| {
                Ok(TopProductByRegion {
                    region: parse_region(region)?,
                    sub_category,
                    total_profit,
                })
            })
            .collect()
    }
}
