//! Ask command handler.
//!
//! Answers a question from the topic store and lists the cited topics.

use super::print_json;
use clap::Args;
use topica_core::{config::AppConfig, AppError, AppResult};
use topica_knowledge::{Answer, AskError};

/// Ask a question against the ingested topics
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Number of topics to retrieve (1-10, default from config)
    #[arg(short = 'k', long)]
    pub top_k: Option<u32>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let pipeline = topica_knowledge::build_pipeline(config)?;

        match pipeline.ask(&self.question, self.top_k).await {
            Ok(answer) => {
                if self.json {
                    print_json(&answer_json(&answer))
                } else {
                    println!("{}", render_answer(&answer));
                    Ok(())
                }
            }
            Err(err) => {
                if self.json {
                    print_json(&error_json(&err))?;
                } else {
                    eprintln!("{}", render_error(&err));
                }
                Err(AppError::Knowledge(err.to_string()))
            }
        }
    }
}

fn answer_json(answer: &Answer) -> serde_json::Value {
    let documents: Vec<serde_json::Value> = answer
        .documents
        .iter()
        .map(|doc| {
            serde_json::json!({
                "rank": doc.rank,
                "topicId": doc.topic_id,
                "title": doc.title,
                "url": doc.url,
                "excerpt": doc.excerpt,
                "similarity": doc.similarity,
            })
        })
        .collect();

    serde_json::json!({
        "answer": answer.answer,
        "documents": documents,
    })
}

fn error_json(err: &AskError) -> serde_json::Value {
    let kind = err.kind();
    serde_json::json!({
        "error": {
            "kind": kind.as_str(),
            "status": kind.http_status(),
            "retryable": err.is_retryable(),
            "message": err.to_string(),
        }
    })
}

/// Answer text followed by the numbered citation list.
fn render_answer(answer: &Answer) -> String {
    if answer.documents.is_empty() {
        return answer.answer.clone();
    }

    let mut out = format!("{}\n\nSources:", answer.answer);
    for doc in &answer.documents {
        let title = doc.title.as_deref().unwrap_or("Untitled");
        out.push_str(&format!(
            "\n  {} {} ({}) similarity {:.2}",
            doc.tag(),
            title,
            doc.url,
            doc.similarity
        ));
    }
    out
}

fn render_error(err: &AskError) -> String {
    let kind = err.kind();
    format!("error [{} {}]: {}", kind.as_str(), kind.http_status(), err)
}
