use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::error::HandlerResult;
use crate::inference::classification_pipeline::{ClassificationPipeline, ClassificationResult};
use crate::inference::task::sentiment::{
    InvocationEvent, InvocationResponse, SentimentBody, SentimentHandler,
};

/// Sentiment classifier shared read-only between invocations.
#[derive(Clone)]
pub struct SentimentModel {
    pipeline: Arc<ClassificationPipeline>,
}

impl SentimentModel {
    #[tracing::instrument(level = "info")]
    pub fn load(model_dir: &Path, max_length: usize) -> HandlerResult<Self> {
        let pipeline = ClassificationPipeline::load(model_dir, max_length)?;
        Ok(Self {
            pipeline: Arc::new(pipeline),
        })
    }

    pub fn pipeline(&self) -> &ClassificationPipeline {
        &self.pipeline
    }

    pub fn classify(&self, text: &str) -> HandlerResult<ClassificationResult> {
        self.pipeline.classify(text)
    }
}

impl SentimentHandler for SentimentModel {
    #[tracing::instrument(level = "info", skip_all)]
    fn run_sentiment(&self, event: &InvocationEvent) -> HandlerResult<InvocationResponse> {
        let text = event.text()?;
        let result = self.classify(text)?;
        info!("input text: {}\nsentiment: {}", text, result.label);

        let body = SentimentBody {
            input_text: text.to_string(),
            sentiment: result.label,
        };
        Ok(InvocationResponse::ok(body.to_body()?))
    }
}
