pub mod domain;
pub mod error;
pub mod fetch;
pub mod flatten;
pub mod gbif;
pub mod image_ops;
pub mod media;
pub mod results;
pub mod search;
