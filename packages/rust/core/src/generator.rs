//! Dialogue generation: prompt construction, model call, response parsing.

use tracing::{info, instrument};

use dialoguegen_llm::LlmClient;
use dialoguegen_shared::{DialogueGenError, DialogueRecord, Result};

use crate::{corpus, parser};

/// Parameters for the fixed tutoring prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    /// Language the tutor teaches, e.g. "Arabic".
    pub language: String,
    /// Register the dialogues are written in.
    pub variety: String,
    /// How many dialogues to ask for. The model may return fewer or more.
    pub dialogue_count: usize,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            language: "Arabic".into(),
            variety: "Modern Standard Arabic".into(),
            dialogue_count: 10,
        }
    }
}

impl PromptTemplate {
    /// Role instruction, output schema, separator, then the corpus verbatim.
    pub fn render(&self, corpus_text: &str) -> String {
        format!(
            "You are an {language} language tutor. Based on the following lesson content,\n\
             generate {count} short dialogues in {variety}.\n\
             Output as JSON:\n\
             [\n  {{\"topic\": \"Topic\", \"dialogue\": [{{\"A\": \"...\"}}, {{\"B\": \"...\"}}]}}\n]\n\
             ---\n\
             {corpus_text}\n",
            language = self.language,
            count = self.dialogue_count,
            variety = self.variety,
        )
    }
}

/// Turns a lesson corpus into dialogue records.
#[derive(Clone)]
pub struct DialogueGenerator {
    llm: LlmClient,
    template: PromptTemplate,
}

impl DialogueGenerator {
    pub fn new(llm: LlmClient) -> Self {
        Self {
            llm,
            template: PromptTemplate::default(),
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Build the prompt, call the model, and parse its answer.
    ///
    /// Client and parser errors pass through untouched.
    #[instrument(skip_all, fields(model_key = %model_key, corpus_len = corpus_text.len()))]
    pub async fn generate_dialogues(
        &self,
        corpus_text: &str,
        model_key: &str,
    ) -> Result<Vec<DialogueRecord>> {
        if corpus::is_blank(corpus_text) {
            return Err(DialogueGenError::EmptyInput);
        }

        let prompt = self.template.render(corpus_text);
        let raw = self.llm.generate(&prompt, model_key).await?;
        let records = parser::parse(&raw)?;

        if records.is_empty() {
            return Err(DialogueGenError::NoDialoguesGenerated);
        }

        info!(
            records = records.len(),
            target = self.template.dialogue_count,
            "dialogues generated"
        );
        Ok(records)
    }
}
