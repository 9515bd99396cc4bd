use crate::application::ensemble::sentiment::HeadlineSource;
use crate::domain::errors::AiEnsembleError;
use async_trait::async_trait;

/// Returns a fixed headline set, or simulates an outage. Used in tests in
/// place of the live RSS feed.
pub struct MockHeadlineSource {
    headlines: Vec<String>,
    unavailable: bool,
}

impl MockHeadlineSource {
    pub fn with_headlines(headlines: Vec<String>) -> Self {
        Self {
            headlines,
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            headlines: Vec::new(),
            unavailable: true,
        }
    }
}

#[async_trait]
impl HeadlineSource for MockHeadlineSource {
    async fn fetch_headlines(&self, _symbol: &str) -> Result<Vec<String>, AiEnsembleError> {
        if self.unavailable {
            Err(AiEnsembleError::Transport("feed unreachable".to_string()))
        } else {
            Ok(self.headlines.clone())
        }
    }
}
