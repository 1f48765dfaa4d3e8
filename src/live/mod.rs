pub mod aggregator;
pub mod cps;
pub mod feed;
pub mod rolling;
