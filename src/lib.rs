pub mod cli;
pub mod detect;
pub mod diff;
pub mod error;
pub mod exclude;
pub mod load;
pub mod merge;
pub mod model;
pub mod parsers;
pub mod paths;
pub mod reconcile;
