pub mod dataset;
pub mod recommender;
