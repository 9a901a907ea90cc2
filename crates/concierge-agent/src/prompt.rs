//! Prompt composition.
//!
//! Every prompt is a single instruction block: role restriction and refusal
//! sentence, tone, the grounding context, then the customer's query.

use std::{borrow::Cow, sync::Arc};

use crate::knowledge::KnowledgeBase;

/// The sentence the model must use for off-topic queries
pub const REFUSAL_MESSAGE: &str =
    "Sorry, I can only assist with customer service-related queries.";

const ROLE_DIRECTIVE: &str = "You are a professional customer service assistant.\n\
Only answer questions related to customer service.\n\
If a query is unrelated, reply exactly: ";

const TONE_DIRECTIVE: &str = "Be polite, friendly and engaging so the customer enjoys the \
conversation and leaves satisfied.";

const CONTEXT_DIRECTIVE: &str = "Here is the knowledge base you can use. Look for questions \
similar to the query and answer accordingly. You may rephrase answers to make them clearer, \
but keep them accurate:";

/// Supplies the knowledge text placed into a prompt for a given query
pub trait Grounding: Send + Sync {
    fn context_for<'a>(&'a self, query: &str) -> Cow<'a, str>;
}

/// Grounding that injects the entire knowledge base into every prompt
#[derive(Debug, Clone)]
pub struct FullCorpus {
    knowledge: Arc<KnowledgeBase>,
}

impl FullCorpus {
    pub fn new(knowledge: Arc<KnowledgeBase>) -> Self {
        Self { knowledge }
    }
}

impl Grounding for FullCorpus {
    fn context_for<'a>(&'a self, _query: &str) -> Cow<'a, str> {
        Cow::Borrowed(self.knowledge.text())
    }
}

/// Builds the prompt text sent to the model
#[derive(Clone)]
pub struct PromptComposer {
    grounding: Arc<dyn Grounding>,
}

impl PromptComposer {
    pub fn new(grounding: Arc<dyn Grounding>) -> Self {
        Self { grounding }
    }

    /// Composer grounded on the whole knowledge base
    pub fn full_corpus(knowledge: Arc<KnowledgeBase>) -> Self {
        Self::new(Arc::new(FullCorpus::new(knowledge)))
    }

    /// Compose the prompt for a single query. Output depends only on the
    /// grounding context and the query.
    pub fn compose(&self, query: &str) -> String {
        let context = self.grounding.context_for(query);
        format!(
            "{ROLE_DIRECTIVE}\"{REFUSAL_MESSAGE}\"\n{TONE_DIRECTIVE}\n\n{CONTEXT_DIRECTIVE}\n{context}\n\nCustomer Query: {query}\n"
        )
    }
}
