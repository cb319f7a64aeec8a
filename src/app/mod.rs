pub mod catalog;
pub mod pipelines;
