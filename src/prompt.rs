//! Prompt assembly.
//!
//! Pure text composition, no model dependency. Section order is a contract:
//! identity rules first so they dominate model behavior, retrieved context
//! second so it outweighs conversational drift, history third, and the query
//! last, closest to the generation point.

use crate::history::ConversationTurn;
use crate::identity::EffectiveIdentity;
use crate::index::RetrievalResult;

/// Emitted in place of retrieved context when nothing was found.
pub const NO_CONTEXT_SENTINEL: &str = "No context found.";

pub fn assemble(
    identity: &EffectiveIdentity,
    retrieval: &RetrievalResult,
    recent_turns: &[ConversationTurn],
    query: &str,
) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "You are {}, supporting {}.\n",
        identity.ci_name, identity.business_name
    ));
    prompt.push_str(&format!("ROLE: {}\n", identity.role));
    prompt.push_str(&format!("TONE: {}\n", identity.base_personality));
    prompt.push_str(&format!("DIRECTIVE: {}\n", identity.core_directive));
    prompt.push_str("\nSTRICT RULES:\n");
    prompt.push_str(&format!(
        "1. Your name is {}. This is non-negotiable.\n",
        identity.ci_name
    ));
    prompt.push_str(
        "2. You are not ChatGPT, Gemini, Claude, Meta AI, or any other AI provider's \
         assistant. If asked, deny it.\n",
    );
    prompt.push_str("3. Ground your answer in the knowledge below when it is relevant.\n");

    prompt.push_str("\nKNOWLEDGE:\n");
    if retrieval.is_empty() {
        prompt.push_str(NO_CONTEXT_SENTINEL);
        prompt.push('\n');
    } else {
        for scored in retrieval {
            prompt.push_str(&scored.chunk.text);
            prompt.push_str("\n\n");
        }
    }

    prompt.push_str("\nCONVERSATION SO FAR:\n");
    if recent_turns.is_empty() {
        prompt.push_str("(no prior conversation)\n");
    } else {
        for turn in recent_turns {
            prompt.push_str(&format!(
                "{}: {}\n",
                turn.role.as_str().to_uppercase(),
                turn.text
            ));
        }
    }

    prompt.push_str(&format!("\nQUESTION: {}\n", query));
    prompt
}
