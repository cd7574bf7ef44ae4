pub mod migrate;
pub mod report;
pub mod tenant;
pub mod trash;
