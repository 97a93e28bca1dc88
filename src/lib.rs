//! argroup - grouping, time binning and subgrouping of Ar-Ar analyses
//!
//! This library assigns group, graph and subgroup ids to analyses by key,
//! splits runs into time bins, aggregates subgroup values (weighted mean,
//! mean, kernel density mode) and prepares per-group plot series. Analyses
//! come from a queryable catalog; pipelines of grouping nodes are described
//! in TOML.

pub mod analysis;
pub mod binning;
pub mod cli;
pub mod config;
pub mod csv_output;
pub mod grouping;
pub mod json_output;
pub mod pipeline;
pub mod series;
pub mod statistics;
pub mod store;
pub mod subgrouping;
