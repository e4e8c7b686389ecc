use std::fs;
use std::path::Path;

use meter_core::PriceTable;
use tracing::info;

use crate::error::Result;

/// Builds the price table from `table_path`, or from the bundled asset when
/// no override is configured.
pub fn load_price_table(table_path: Option<&Path>) -> Result<PriceTable> {
    match table_path {
        Some(path) => {
            let data = fs::read_to_string(path)?;
            let table = PriceTable::from_json(&data)?;
            info!(path = %path.display(), "loaded price table");
            Ok(table)
        }
        None => Ok(PriceTable::bundled()?),
    }
}
