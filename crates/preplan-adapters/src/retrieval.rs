//! Static retrieval adapter
//!
//! Keyword-matched knowledge base standing in for a real RAG service.
//! Queries match on any listed keyword; the first matching entry wins.
//! A miss is still a successful retrieval with an explicit no-answer
//! payload, mirroring how retrieval services report empty result sets.

use indexmap::IndexMap;
use preplan_engine::{OutcomeValues, RetrievalClient, RetrievalError, RetrievalOutcome};

struct KnowledgeEntry {
    keywords: &'static [&'static str],
    answer: &'static str,
    citation: &'static str,
}

/// Retrieval client answering from a fixed in-memory corpus.
pub struct StaticRetrievalClient {
    entries: Vec<KnowledgeEntry>,
}

impl Default for StaticRetrievalClient {
    fn default() -> Self {
        Self::with_grid_corpus()
    }
}

impl StaticRetrievalClient {
    /// Corpus covering the dc-limit operational guidance.
    #[must_use]
    pub fn with_grid_corpus() -> Self {
        Self {
            entries: vec![
                KnowledgeEntry {
                    keywords: &["send side", "sending end"],
                    answer: "per grid topology, the device sits on the sending end",
                    citation: "grid topology handbook",
                },
                KnowledgeEntry {
                    keywords: &["receive side", "receiving end"],
                    answer: "per grid topology, the device sits on the receiving end",
                    citation: "grid topology handbook",
                },
                KnowledgeEntry {
                    keywords: &["dc limit", "transfer limit"],
                    answer: "dc transfer limits must honor both sending and \
                             receiving end capability per dispatch regulations",
                    citation: "dispatch management regulations",
                },
                KnowledgeEntry {
                    keywords: &["outage", "fault"],
                    answer: "on equipment faults, assess the impact on dc \
                             transfer capability immediately",
                    citation: "fault handling principles",
                },
            ],
        }
    }

    /// Empty corpus; every query misses.
    #[must_use]
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }
}

#[async_trait::async_trait]
impl RetrievalClient for StaticRetrievalClient {
    async fn retrieve(
        &self,
        query: &str,
        _inputs: &IndexMap<String, serde_json::Value>,
    ) -> Result<RetrievalOutcome, RetrievalError> {
        let hit = self
            .entries
            .iter()
            .find(|entry| entry.keywords.iter().any(|kw| query.contains(kw)));
        match hit {
            Some(entry) => Ok(RetrievalOutcome {
                values: OutcomeValues::Single(serde_json::json!(entry.answer)),
                citation: entry.citation.to_string(),
            }),
            None => {
                tracing::debug!(query, "no knowledge base match");
                Ok(RetrievalOutcome {
                    values: OutcomeValues::Single(serde_json::json!(
                        "no matching guidance found"
                    )),
                    citation: "knowledge base (no match)".to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn keyword_match_returns_answer_with_citation() {
        let client = StaticRetrievalClient::with_grid_corpus();
        let outcome = client
            .retrieve("what is the dc limit policy for tianzhong_dc", &IndexMap::new())
            .await
            .unwrap();
        assert_eq!(outcome.citation, "dispatch management regulations");
        assert!(matches!(
            outcome.values,
            OutcomeValues::Single(serde_json::Value::String(s)) if s.contains("transfer limits")
        ));
    }

    #[tokio::test]
    async fn miss_is_a_successful_no_answer() {
        let client = StaticRetrievalClient::empty();
        let outcome = client
            .retrieve("anything at all", &IndexMap::new())
            .await
            .unwrap();
        assert_eq!(
            outcome.values,
            OutcomeValues::Single(json!("no matching guidance found"))
        );
    }
}
