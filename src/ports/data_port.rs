//! Bar source port trait.

use crate::domain::bar::Bar;
use crate::domain::error::CrosstrendError;

pub trait DataPort {
    /// Bars for one symbol, ascending by timestamp without duplicates.
    fn fetch_bars(&self, symbol: &str) -> Result<Vec<Bar>, CrosstrendError>;

    fn list_symbols(&self) -> Result<Vec<String>, CrosstrendError>;
}
