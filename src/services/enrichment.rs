//! Language model enrichment of articles: summaries, sentiment, topic and translations.

use std::sync::Arc;

use handlebars::Handlebars;
use once_cell::sync::Lazy;
use serde_json::json;

use crate::clients::llm::LanguageModel;
use crate::common::errors::ServiceError;
use crate::common::model::{
    Article, NewArticle, NewSummary, Sentiment, Summary, SummaryKind, Topic,
};
use crate::store::{SharedStore, Store};

/// Marker of truncated, paywalled content
const PAYWALL_MARKER: &str = "subscribe to read";

const TLDR_TEMPLATE: &str = "Write a TL;DR of the following news article in one or two sentences. \
Answer with the TL;DR only.\n\nTitle: {{title}}\n\n{{text}}";

const BULLETS_TEMPLATE: &str = "Summarize the following news article as three to five short bullet points, \
one per line, each line starting with \"- \".\n\nTitle: {{title}}\n\n{{text}}";

const ELI5_TEMPLATE: &str = "Explain like I'm five the following news article, in a short and simple \
paragraph.\n\nTitle: {{title}}\n\n{{text}}";

const SENTIMENT_TEMPLATE: &str = "Classify the overall tone of the following news article. \
Answer with exactly one word among: positive, neutral, negative.\n\nTitle: {{title}}\n\n{{text}}";

const CATEGORY_TEMPLATE: &str = "Pick the topic that fits the following news article best, among: \
{{topics}}. Answer with the topic only.\n\nTitle: {{title}}\n\n{{text}}";

const TRANSLATION_TEMPLATE: &str = "Translate the following news article into {{language}}. \
Answer with the translated title on the first line, then the translated text.\n\nTitle: {{title}}\n\n{{text}}";

static PROMPTS: Lazy<Handlebars<'static>> = Lazy::new(|| {
    let mut registry = Handlebars::new();
    registry.register_escape_fn(handlebars::no_escape);
    registry.set_strict_mode(true);

    for (name, template) in [
        ("tldr", TLDR_TEMPLATE),
        ("bullets", BULLETS_TEMPLATE),
        ("eli5", ELI5_TEMPLATE),
        ("sentiment", SENTIMENT_TEMPLATE),
        ("category", CATEGORY_TEMPLATE),
        ("translation", TRANSLATION_TEMPLATE),
    ] {
        registry
            .register_template_string(name, template)
            .expect("Prompt templates are valid");
    }

    registry
});

/// Whether the text is only the teaser of a paywalled article
pub fn is_paywalled(text: &str) -> bool {
    text.to_lowercase().contains(PAYWALL_MARKER)
}

fn render(template: &str, data: &serde_json::Value) -> anyhow::Result<String> {
    Ok(PROMPTS.render(template, data)?)
}

/// Runs the language model calls for articles and writes their results back
#[derive(Clone)]
pub struct Enricher {
    store: SharedStore,
    summarizer: Option<Arc<dyn LanguageModel>>,
    sentiment: Option<Arc<dyn LanguageModel>>,
    categorizer: Option<Arc<dyn LanguageModel>>,
}

impl Enricher {
    pub fn new(
        store: SharedStore,
        summarizer: Option<Arc<dyn LanguageModel>>,
        sentiment: Option<Arc<dyn LanguageModel>>,
        categorizer: Option<Arc<dyn LanguageModel>>,
    ) -> Self {
        Self {
            store,
            summarizer,
            sentiment,
            categorizer,
        }
    }

    pub fn can_summarize(&self) -> bool {
        self.summarizer.is_some()
    }

    /// Generate the summaries and the sentiment of an article, then mark it processed.
    ///
    /// Every model call is independent: a failed call only loses its own result.
    /// Paywalled articles are marked processed without any call.
    #[tracing::instrument(skip(self, article), fields(article_id = article.id))]
    pub async fn enrich(&self, article: &Article) -> Result<Vec<Summary>, ServiceError> {
        if is_paywalled(article.text()) {
            tracing::info!("Article {} is paywalled, skipping enrichment", article.id);
            self.store.mark_processed(article.id).await?;
            return Ok(vec![]);
        }

        let (tldr, bullets, eli5, sentiment) = tokio::join!(
            self.summarize(article, SummaryKind::Tldr),
            self.summarize(article, SummaryKind::Bullets),
            self.summarize(article, SummaryKind::Eli5),
            self.classify_sentiment(article),
        );

        if tldr.is_none() && sentiment.is_some() {
            tracing::debug!("No TL;DR for article {}, sentiment dropped", article.id);
        }

        let generated = [
            (SummaryKind::Tldr, tldr, sentiment),
            (SummaryKind::Bullets, bullets, None),
            (SummaryKind::Eli5, eli5, None),
        ];

        let mut summaries = Vec::with_capacity(generated.len());
        for (kind, content, sentiment) in generated {
            let Some(content) = content else { continue };
            let summary = NewSummary {
                kind,
                language: None,
                content,
                sentiment,
            };
            summaries.push(self.store.insert_summary(article.id, &summary).await?);
        }

        self.store.mark_processed(article.id).await?;

        Ok(summaries)
    }

    /// Ask the summarizer for one kind of summary. `None` on any failure.
    async fn summarize(&self, article: &Article, kind: SummaryKind) -> Option<String> {
        let model = self.summarizer.as_ref()?;
        let answer = self.ask(model.as_ref(), kind.as_str(), article).await?;

        if is_paywalled(&answer) {
            tracing::warn!(
                "{} summary of article {} mentions a paywall, discarded",
                kind.as_str(),
                article.id
            );
            return None;
        }
        Some(answer)
    }

    async fn classify_sentiment(&self, article: &Article) -> Option<Sentiment> {
        let model = self.sentiment.as_ref()?;
        let answer = self.ask(model.as_ref(), "sentiment", article).await?;

        let sentiment = Sentiment::from_answer(&answer);
        if sentiment.is_none() {
            tracing::warn!("Unreadable sentiment {:?} for article {}", answer, article.id);
        }
        sentiment
    }

    async fn ask(
        &self,
        model: &dyn LanguageModel,
        template: &str,
        article: &Article,
    ) -> Option<String> {
        let prompt = render(
            template,
            &json!({ "title": article.title, "text": article.text() }),
        );

        let prompt = match prompt {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::error!("Could not render {} prompt: {:?}", template, e);
                return None;
            }
        };

        match model.complete(&prompt).await {
            Ok(answer) => Some(answer),
            Err(e) => {
                tracing::error!(
                    "{} call to {} failed for article {}: {}",
                    template,
                    model.name(),
                    article.id,
                    e
                );
                None
            }
        }
    }

    /// Ask the categorizer which of the topics fits the article best.
    /// Any failure, or an answer outside the topics, keeps the current topic.
    #[tracing::instrument(skip_all, fields(external_id = %article.external_id))]
    pub async fn categorize(&self, article: &NewArticle, topics: &[Topic]) -> Topic {
        let Some(model) = self.categorizer.as_ref() else {
            return article.topic.clone();
        };

        let text = match article.content.as_deref() {
            Some(content) if !content.trim().is_empty() => content,
            _ => article.description.as_deref().unwrap_or_default(),
        };

        let prompt = match render(
            "category",
            &json!({ "title": article.title, "text": text, "topics": topics.join(", ") }),
        ) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::error!("Could not render category prompt: {:?}", e);
                return article.topic.clone();
            }
        };

        match model.complete(&prompt).await {
            Ok(answer) => {
                let answer = answer
                    .trim()
                    .trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase();
                match topics.iter().find(|topic| **topic == answer) {
                    Some(topic) => topic.clone(),
                    None => {
                        tracing::debug!("Topic {:?} is not a known one", answer);
                        article.topic.clone()
                    }
                }
            }
            Err(e) => {
                tracing::error!("Categorization call to {} failed: {}", model.name(), e);
                article.topic.clone()
            }
        }
    }

    /// Translate an article. Unlike the enrichment, a failure is reported to the caller.
    #[tracing::instrument(skip(self, article), fields(article_id = article.id))]
    pub async fn translate(&self, article: &Article, language: &str) -> Result<Summary, ServiceError> {
        let model = self
            .summarizer
            .as_ref()
            .ok_or(ServiceError::Unavailable("Summarizer"))?;

        let prompt = render(
            "translation",
            &json!({ "title": article.title, "text": article.text(), "language": language }),
        )?;
        let content = model.complete(&prompt).await?;

        let summary = NewSummary {
            kind: SummaryKind::Translation,
            language: Some(language.to_owned()),
            content,
            sentiment: None,
        };

        Ok(self.store.insert_summary(article.id, &summary).await?)
    }
}
