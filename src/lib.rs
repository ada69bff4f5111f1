pub mod aggregator;
pub mod config;
pub mod fetch;
pub mod output;
pub mod parser;
pub mod reference;
pub mod stats;
pub mod style;
