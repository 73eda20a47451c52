pub mod config;
pub mod context;
pub mod db;
pub mod mcp;
pub mod slack;
pub mod translate;
