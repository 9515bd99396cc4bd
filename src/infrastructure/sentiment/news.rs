use crate::application::ensemble::sentiment::HeadlineSource;
use crate::domain::errors::AiEnsembleError;
use async_trait::async_trait;
use rss::Channel;

/// Fetches recent headlines from an RSS feed (spec §4.D #1's headline/
/// social text input). One feed URL per symbol, resolved by the caller.
pub struct RssHeadlineSource {
    client: reqwest::Client,
    feed_url_for: fn(&str) -> String,
    max_headlines: usize,
}

impl RssHeadlineSource {
    pub fn new(feed_url_for: fn(&str) -> String, max_headlines: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            feed_url_for,
            max_headlines,
        }
    }
}

#[async_trait]
impl HeadlineSource for RssHeadlineSource {
    async fn fetch_headlines(&self, symbol: &str) -> Result<Vec<String>, AiEnsembleError> {
        let url = (self.feed_url_for)(symbol);
        let bytes = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AiEnsembleError::Transport(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| AiEnsembleError::Transport(e.to_string()))?;

        let channel = Channel::read_from(&bytes[..]).map_err(|e| AiEnsembleError::Transport(e.to_string()))?;

        Ok(channel
            .items()
            .iter()
            .filter_map(|item| item.title().map(str::to_string))
            .take(self.max_headlines)
            .collect())
    }
}
