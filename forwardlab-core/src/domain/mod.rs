//! Domain types: bars, instrument, position, trades and equity points.

pub mod bar;
pub mod instrument;
pub mod position;
pub mod trade;

pub use bar::{Bar, BarError, BarSeries};
pub use instrument::{Instrument, InstrumentError};
pub use position::Position;
pub use trade::{EquityPoint, ExitReason, Trade};
