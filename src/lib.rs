pub mod config;
pub mod error;
pub mod inference;
pub mod json;
pub mod telemetry;

pub use crate::inference::classification_pipeline::{ClassificationPipeline, ClassificationResult};
pub use crate::inference::models::sentiment::SentimentModel;
pub use crate::inference::task::sentiment::{
    InvocationEvent, InvocationResponse, SentimentBody, SentimentHandler,
};
