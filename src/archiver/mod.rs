pub mod config;
pub mod engine;
pub mod ledger;
pub mod paths;
pub mod profile;
pub mod single_file;
pub mod status;
pub mod tree;
pub mod util;
pub mod warn;
