pub mod classifier;
pub mod providers;
