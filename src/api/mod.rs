pub mod features;
pub mod geo;

pub use features::{FeatureError, QueryFeatures};
