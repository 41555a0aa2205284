//! Prompt template, generation capability and answer synthesis.
//!
//! The [`AnswerSynthesizer`] renders a single instruction template with the
//! question and the retrieved context, then calls the injected
//! [`Generator`] with greedy decoding. The raw output is returned unchanged;
//! numeric parsing belongs to [`facts`](crate::facts).

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::ScoredChunk;

/// Instruction template for numeric extraction from urbanism regulations.
pub const DEFAULT_TEMPLATE: &str = "<s> [INST] Vous êtes un assistant chargé de l'analyse des documents d'urbanisme.
Votre tâche est d'extraire des chiffres à partir du contexte.
Donnez uniquement le chiffre, pas de texte.
[/INST] </s>
[INST] Question: {question}
Context: {context}
Answer: [/INST]";

const QUESTION: &str = "{question}";
const CONTEXT: &str = "{context}";

/// Prompt template with `{question}` and `{context}` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplate {
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] if either placeholder is missing.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for placeholder in [QUESTION, CONTEXT] {
            if !template.contains(placeholder) {
                return Err(Error::InvalidConfig(format!(
                    "prompt template is missing the {} placeholder",
                    placeholder
                )));
            }
        }
        Ok(Self { template })
    }

    /// Substitute placeholders in one pass, so text inside `question` or
    /// `context` that looks like a placeholder is left alone.
    pub fn render(&self, question: &str, context: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + question.len() + context.len());
        let mut rest = self.template.as_str();
        while let Some(pos) = rest.find('{') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if let Some(after) = tail.strip_prefix(QUESTION) {
                out.push_str(question);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(CONTEXT) {
                out.push_str(context);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }
}

/// Sampling parameters passed to the generation backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodingParams {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub seed: Option<u64>,
}

impl DecodingParams {
    /// Greedy decoding: the answer feeds structured persistence, so it must be reproducible.
    pub fn greedy() -> Self {
        Self {
            temperature: 0.0,
            top_k: 1,
            top_p: 1.0,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

/// Trait for text generation backends.
#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;
    /// Failures surface as [`Error::GenerationUnavailable`] or [`Error::Timeout`].
    async fn generate(&self, prompt: &str, params: &DecodingParams) -> Result<String>;
}

/// Join context chunk texts with a blank line. Empty when there is no context.
pub fn join_context(context: &[ScoredChunk]) -> String {
    context
        .iter()
        .map(|m| m.chunk.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub struct AnswerSynthesizer {
    generator: Arc<dyn Generator>,
    template: PromptTemplate,
    decoding: DecodingParams,
}

impl AnswerSynthesizer {
    pub fn new(generator: Arc<dyn Generator>, template: PromptTemplate, seed: Option<u64>) -> Self {
        Self {
            generator,
            template,
            decoding: DecodingParams::greedy().with_seed(seed),
        }
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Render the prompt and return the generator's raw output.
    ///
    /// Not retried on failure.
    pub async fn synthesize(&self, question: &str, context: &[ScoredChunk]) -> Result<String> {
        let prompt = self.template.render(question, &join_context(context));
        debug!(
            model = self.generator.model_name(),
            context_chunks = context.len(),
            prompt_chars = prompt.len(),
            "generating answer"
        );
        self.generator.generate(&prompt, &self.decoding).await
    }
}
