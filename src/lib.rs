//! Annual tables and figures for the mangrove-marsh ecotone monitoring
//! protocol (SOP 8-1 marker distances, SOP 8-2 cover pivots, SOP 8-3
//! stratum cover).

pub mod analysis;
pub mod config;
pub mod db;
pub mod export;
pub mod logging;
pub mod model;
pub mod report;
pub mod source;
