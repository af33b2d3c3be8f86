// Prompt templates for the conversational retrieval chain

use std::fmt::Write as _;

const CONDENSE_QUESTION_TEMPLATE: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question, in its original language.\n\n\
Chat History:\n{chat_history}\nFollow Up Input: {question}\nStandalone question:";

const QA_SYSTEM_TEMPLATE: &str = "Use the following pieces of context to answer the user's question. \n\
If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\
----------------\n{context}";

/// Render prior turns as a Human/Assistant transcript
pub(crate) fn format_chat_history(history: &[(String, String)]) -> String {
    let mut buffer = String::new();
    for (human, assistant) in history {
        let _ = write!(buffer, "\nHuman: {}\nAssistant: {}", human, assistant);
    }
    buffer
}

pub(crate) fn condense_question_prompt(history: &[(String, String)], question: &str) -> String {
    CONDENSE_QUESTION_TEMPLATE
        .replace("{chat_history}", &format_chat_history(history))
        .replace("{question}", question)
}

/// System prompt with the retrieved chunks stuffed in, separated by blank lines
pub(crate) fn qa_system_prompt<'a>(context: impl IntoIterator<Item = &'a str>) -> String {
    let context = context.into_iter().collect::<Vec<_>>().join("\n\n");
    QA_SYSTEM_TEMPLATE.replace("{context}", &context)
}
