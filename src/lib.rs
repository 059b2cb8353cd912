//! Load antimicrobial-resistance surveillance tables, slice them by
//! organism/region/antimicrobial group/year, and export charts.

pub mod chart;
pub mod cli;
pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod stats;
pub mod workflow;
