use agent_core::{Agent, Document, Model, Trace};

use super::{truncate, validate_response};
use crate::record::{CaseOutcome, RecordBuilder};

pub const NAME: &str = "FileAttachments";

const SAMPLE_TEXT: &str = "This is a test text file with some sample content for analysis. \
The content includes information about artificial intelligence and machine learning.";

const CONTENT_CHECKS: [&str; 3] = ["artificial intelligence", "machine learning", "sample content"];

pub async fn run(model: Model) -> CaseOutcome {
    let builder = RecordBuilder::start(NAME, &model);

    let agent = Agent::new("file_analyst")
        .with_model(model)
        .with_description("You are a helpful assistant that analyzes text files and provides insights.")
        .with_instructions(
            "When you see a file reference, analyze it and provide a summary. If you cannot access the file, explain why.",
        )
        .with_document(Document::in_memory("sample.txt", SAMPLE_TEXT))
        .with_trace(Trace::new());

    let prompt = "Please analyze the attached file and tell me what it contains. \
If you are able to analyse the file, start your response with 'SUCCESS:' followed by the analysis.";

    let response = match agent.execute(prompt).await {
        Ok(response) => response,
        Err(e) => return builder.error("", e),
    };

    if let Err(e) = validate_response(&response, "SUCCESS:") {
        return builder.error(&response, e);
    }

    if !CONTENT_CHECKS
        .iter()
        .any(|check| validate_response(&response, check).is_ok())
    {
        return CaseOutcome::ok(
            builder.fail(&response, "Response does not contain expected file content analysis"),
        );
    }

    let record = builder
        .ok(&response)
        .with_metadata("expected_prefix", "SUCCESS:")
        .with_metadata("content_checks", CONTENT_CHECKS)
        .with_metadata("response_preview", truncate(&response, 150));
    CaseOutcome::ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{ChatResponse, ScriptedBackend};

    #[tokio::test]
    async fn test_document_reaches_the_model() {
        let model = ScriptedBackend::new(|request| {
            let prompt = request.last_user_message().unwrap_or_default();
            if prompt.contains("<document name=\"sample.txt\"") && prompt.contains("machine learning") {
                ChatResponse::text("SUCCESS: The file covers machine learning.")
            } else {
                ChatResponse::text("I cannot see any file.")
            }
        })
        .into_model("m");

        let outcome = run(model).await;
        assert!(!outcome.is_failure(), "{:?}", outcome.record);
        assert_eq!(outcome.record.metadata()["expected_prefix"], "SUCCESS:");
    }

    #[tokio::test]
    async fn test_prefix_without_analysis_is_soft_failure() {
        let model = ScriptedBackend::reply("SUCCESS: it is a file.").into_model("m");
        let outcome = run(model).await;

        assert!(outcome.error.is_none());
        assert!(!outcome.record.is_success());
        assert_eq!(
            outcome.record.error_message(),
            "Response does not contain expected file content analysis"
        );
    }
}
