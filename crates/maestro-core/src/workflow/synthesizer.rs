//! Meta-spec synthesizer: recognizes step output that is itself a spec.
//!
//! Detection is a best-effort parse: text either yields at least one valid
//! `Agent`/`Workflow` document or it is plain output. It never errors.

use crate::spec::{self, SpecDocument, SpecKey, SpecRegistry};
use crate::workflow::context::ExecutionContext;

/// Parse `text` as spec documents, keeping only those that parse and validate.
///
/// Markdown code fences are stripped first, since model output usually wraps
/// YAML in ```` ```yaml ```` blocks.
pub fn detect(text: &str) -> Option<Vec<SpecDocument>> {
    let body = strip_fences(text);
    if !body.contains("apiVersion") || !body.contains("kind") {
        return None;
    }

    let docs: Vec<SpecDocument> = spec::parse_documents(&body)
        .into_iter()
        .filter_map(Result::ok)
        .collect();

    (!docs.is_empty()).then_some(docs)
}

/// Insert detected documents into the run's synthesized set.
///
/// Re-synthesizing a key overwrites the previous draft. Returns the keys staged.
pub fn stage(ctx: &mut ExecutionContext, docs: Vec<SpecDocument>, statics: &SpecRegistry) -> Vec<SpecKey> {
    let mut staged = Vec::with_capacity(docs.len());
    for doc in docs {
        let key = doc.key();
        if statics.contains(&key) {
            tracing::warn!(
                "[Synthesizer] {} shadows a statically loaded spec for this run",
                key
            );
        }
        if ctx.insert_synthesized(doc).is_some() {
            tracing::info!("[Synthesizer] Replaced draft {}", key);
        } else {
            tracing::info!("[Synthesizer] Synthesized {}", key);
        }
        staged.push(key);
    }
    staged
}

/// Concatenate the contents of fenced blocks, or return the text unchanged
/// when it has none.
fn strip_fences(text: &str) -> String {
    let mut blocks: Vec<Vec<&str>> = Vec::new();
    let mut current: Option<Vec<&str>> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        match current.as_mut() {
            None => {
                if let Some(lang) = trimmed.strip_prefix("```") {
                    if matches!(lang.trim(), "" | "yaml" | "yml") {
                        current = Some(Vec::new());
                    }
                }
            }
            Some(block) => {
                if trimmed == "```" {
                    if let Some(done) = current.take() {
                        blocks.push(done);
                    }
                } else {
                    block.push(line);
                }
            }
        }
    }
    // unterminated fence: keep what we have
    if let Some(open) = current {
        blocks.push(open);
    }

    if blocks.is_empty() {
        return text.to_string();
    }
    blocks
        .into_iter()
        .map(|lines| lines.join("\n"))
        .collect::<Vec<_>>()
        .join("\n---\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Kind;

    const WORKFLOW: &str = "apiVersion: maestro/v1alpha1
kind: Workflow
metadata:
  name: beach plan
spec:
  template:
    prompt: plan a beach day
    steps:
      - name: weather
        agent: weather agent
";

    const AGENT: &str = "apiVersion: maestro/v1alpha1
kind: Agent
metadata:
  name: weather agent
spec:
  model: llama3.1
  framework: beeai
  instructions: report the weather
";

    #[test]
    fn test_plain_text_is_not_a_spec() {
        assert!(detect("It will be sunny in New York.").is_none());
        assert!(detect("kind: of a sentence with apiVersion words").is_none());
        assert!(detect("").is_none());
    }

    #[test]
    fn test_detects_fenced_multi_document() {
        let text = format!(
            "Here is your workflow:\n\n```yaml\n{}---\n{}```\n\nEnjoy!",
            AGENT, WORKFLOW
        );
        let docs = detect(&text).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].kind(), Kind::Agent);
        assert_eq!(docs[1].name(), "beach plan");
    }

    #[test]
    fn test_detects_bare_yaml_and_separate_fences() {
        assert_eq!(detect(WORKFLOW).unwrap().len(), 1);

        let text = format!("```\n{}```\nand\n```yml\n{}```", AGENT, WORKFLOW);
        assert_eq!(detect(&text).unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_documents_are_dropped() {
        let broken = "apiVersion: maestro/v1alpha1\nkind: Workflow\nmetadata:\n  name: empty\nspec:\n  template:\n    steps: []\n";
        assert!(detect(broken).is_none());

        let mixed = format!("{}---\n{}", broken, AGENT);
        let docs = detect(&mixed).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].name(), "weather agent");
    }

    #[test]
    fn test_stage_overwrites() {
        let mut ctx = ExecutionContext::new("wf", 0);
        let statics = SpecRegistry::new();
        let first = stage(&mut ctx, detect(WORKFLOW).unwrap(), &statics);
        let again = stage(&mut ctx, detect(WORKFLOW).unwrap(), &statics);
        assert_eq!(first, again);
        assert_eq!(ctx.synthesized().count(), 1);
        assert!(ctx.synthesized_workflow("beach plan").is_some());
    }
}
