pub mod batch;
pub mod cli;
pub mod config;
pub mod engine;
pub mod intake;
pub mod pipeline;
pub mod policy;
pub mod report;
pub mod roster;
pub mod signals;
pub mod util;
