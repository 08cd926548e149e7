//! Price-series indicators

pub mod trend;

pub use trend::*;
