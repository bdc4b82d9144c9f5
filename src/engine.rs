//! Request pipeline.
//!
//! For each incoming message: resolve the channel identity, retrieve
//! relevant chunks, read the recent conversation window, assemble the
//! prompt, call the generator, and only after generation completes commit
//! the user and assistant turns to conversation memory. A failed or
//! abandoned generation commits nothing for that turn.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::core::errors::ApiError;
use crate::history::{HistoryStore, Role};
use crate::identity::{self, ChannelMutation, IdentityConfig};
use crate::index::{RetrievalResult, Retriever};
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};
use crate::prompt;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Retrieved chunks per query.
    pub top_k: usize,
    /// Conversation turns surfaced to the prompt.
    pub window: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { top_k: 2, window: 4 }
    }
}

/// Citation handed back to the chat surface. Pages are 1-indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRef {
    pub source_name: String,
    pub page_number: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub text: String,
    pub sources: Vec<SourceRef>,
}

pub struct CiEngine {
    identity: IdentityConfig,
    mutations: HashMap<String, ChannelMutation>,
    retriever: Retriever,
    history: HistoryStore,
    llm: Arc<dyn LlmProvider>,
    options: EngineOptions,
}

impl CiEngine {
    pub fn new(
        identity: IdentityConfig,
        mutations: HashMap<String, ChannelMutation>,
        retriever: Retriever,
        history: HistoryStore,
        llm: Arc<dyn LlmProvider>,
        options: EngineOptions,
    ) -> Self {
        Self {
            identity,
            mutations,
            retriever,
            history,
            llm,
            options,
        }
    }

    pub fn has_index(&self) -> bool {
        self.retriever.has_index()
    }

    /// Answer one message (blocking mode).
    pub async fn respond(
        &self,
        query: &str,
        session_id: &str,
        channel_id: &str,
    ) -> Result<Reply, ApiError> {
        let (request, model, retrieval) = self.prepare(query, session_id, channel_id).await?;

        let answer = self.llm.chat(request, &model).await?;

        self.commit_turns(session_id, query, &answer).await?;

        Ok(Reply {
            text: answer,
            sources: citations(&retrieval),
        })
    }

    /// Answer one message (streaming mode).
    ///
    /// Fragments are forwarded as they arrive. The concatenated reply is
    /// committed to conversation memory only once the stream ends cleanly;
    /// a dropped consumer or an upstream error discards the partial reply.
    pub async fn respond_stream(
        &self,
        query: &str,
        session_id: &str,
        channel_id: &str,
    ) -> Result<(mpsc::Receiver<Result<String, ApiError>>, Vec<SourceRef>), ApiError> {
        let (request, model, retrieval) = self.prepare(query, session_id, channel_id).await?;

        let mut inner = self.llm.stream_chat(request, &model).await?;
        let (tx, rx) = mpsc::channel(32);

        let history = self.history.clone();
        let session = session_id.to_string();
        let query = query.to_string();
        tokio::spawn(async move {
            let mut full_text = String::new();
            while let Some(item) = inner.recv().await {
                match item {
                    Ok(fragment) => {
                        full_text.push_str(&fragment);
                        if tx.send(Ok(fragment)).await.is_err() {
                            // Consumer went away mid-stream; discard.
                            return;
                        }
                    }
                    Err(err) => {
                        let _ = tx.send(Err(err)).await;
                        return;
                    }
                }
            }

            if let Err(err) = commit(&history, &session, &query, &full_text).await {
                tracing::error!(error = %err, "failed to commit streamed turns");
            }
        });

        Ok((rx, citations(&retrieval)))
    }

    /// Clear a session's conversation memory.
    pub async fn reset(&self, session_id: &str) -> Result<u64, ApiError> {
        self.history.reset(session_id).await
    }

    async fn prepare(
        &self,
        query: &str,
        session_id: &str,
        channel_id: &str,
    ) -> Result<(ChatRequest, String, RetrievalResult), ApiError> {
        let effective = identity::resolve(&self.identity, &self.mutations, channel_id);
        let retrieval = self.retriever.search(query, self.options.top_k).await;
        let recent = self
            .history
            .recent(session_id, self.options.window as i64)
            .await?;

        let directive = prompt::assemble(&effective, &retrieval, &recent, query);
        let request = ChatRequest::new(vec![ChatMessage::user(directive)])
            .with_temperature(effective.temperature);

        Ok((request, effective.model_name, retrieval))
    }

    async fn commit_turns(
        &self,
        session_id: &str,
        query: &str,
        answer: &str,
    ) -> Result<(), ApiError> {
        commit(&self.history, session_id, query, answer).await
    }
}

async fn commit(
    history: &HistoryStore,
    session_id: &str,
    query: &str,
    answer: &str,
) -> Result<(), ApiError> {
    history.append(session_id, Role::User, query).await?;
    history.append(session_id, Role::Assistant, answer).await?;
    Ok(())
}

/// Deduplicated citations in rank order, pages rendered 1-indexed.
fn citations(retrieval: &RetrievalResult) -> Vec<SourceRef> {
    let mut seen = HashSet::new();
    let mut refs = Vec::new();

    for scored in retrieval {
        let source_name = scored
            .chunk
            .source_path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&scored.chunk.source_path)
            .to_string();
        let page_number = scored.chunk.page_number + 1;

        if seen.insert((source_name.clone(), page_number)) {
            refs.push(SourceRef {
                source_name,
                page_number,
            });
        }
    }

    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ScoredChunk;
    use crate::ingest::chunker::DocumentChunk;

    fn scored(source_path: &str, page: usize, idx: usize) -> ScoredChunk {
        ScoredChunk {
            chunk: DocumentChunk {
                text: "text".to_string(),
                source_path: source_path.to_string(),
                page_number: page,
                chunk_index: idx,
            },
            score: 0.5,
        }
    }

    #[test]
    fn citations_are_deduplicated_and_one_indexed() {
        let retrieval = vec![
            scored("docs/policy.txt", 0, 0),
            scored("docs/policy.txt", 0, 1),
            scored("docs/policy.txt", 2, 7),
        ];

        let refs = citations(&retrieval);
        assert_eq!(
            refs,
            vec![
                SourceRef {
                    source_name: "policy.txt".to_string(),
                    page_number: 1,
                },
                SourceRef {
                    source_name: "policy.txt".to_string(),
                    page_number: 3,
                },
            ]
        );
    }

    #[test]
    fn citations_strip_directories() {
        let refs = citations(&vec![scored("a/b/c/manual.txt", 4, 0)]);
        assert_eq!(refs[0].source_name, "manual.txt");
        assert_eq!(refs[0].page_number, 5);
    }

    #[test]
    fn empty_retrieval_has_no_citations() {
        assert!(citations(&Vec::new()).is_empty());
    }
}
