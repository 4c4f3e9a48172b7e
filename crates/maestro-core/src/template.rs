//! Template resolution for step inputs.
//!
//! Placeholders have the form `{NAME}` with `NAME` made of ASCII letters,
//! digits and underscores. `{CONNECTOR}` is reserved: it expands to the
//! literal `input.prompt` of the same step. Every other name is looked up in
//! the execution context (caller variables first, then prior step outputs).
//!
//! Substitution is single-pass. A substituted value that itself contains
//! `{...}` is copied verbatim and never expanded again.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::StepError;
use crate::workflow::context::ExecutionContext;

pub const CONNECTOR: &str = "CONNECTOR";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("placeholder pattern is valid"));

/// Names of all placeholders in `template`, in order of appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Substitute every placeholder in `template`.
///
/// `connector` is the step's literal prompt, bound to `{CONNECTOR}`.
pub fn resolve(
    template: &str,
    connector: Option<&str>,
    ctx: &ExecutionContext,
) -> Result<String, StepError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        let name = &caps[1];

        let value = if name == CONNECTOR {
            connector.map(str::to_string)
        } else {
            ctx.lookup(name)
        };
        let value = value.ok_or_else(|| StepError::UnresolvedPlaceholder(name.to_string()))?;

        out.push_str(&template[last..whole.start]);
        out.push_str(&value);
        last = whole.end;
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// Turn a step name into the placeholder form (`hot activities` -> `hot_activities`).
pub fn placeholder_name(step_name: &str) -> String {
    step_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::context::StepRecord;

    fn context() -> ExecutionContext {
        let mut ctx = ExecutionContext::new("wf", 0);
        ctx.set_variable("CITY", "New York");
        ctx.record(StepRecord::succeeded("temperature agent", "agent:temp", "81F"));
        ctx
    }

    #[test]
    fn test_no_placeholders_is_identity() {
        let ctx = context();
        for s in ["", "plain text", "json {\"a\": 1}", "{ spaced }", "{not-a-name}"] {
            assert_eq!(resolve(s, None, &ctx).unwrap(), s);
        }
    }

    #[test]
    fn test_connector_and_context_values() {
        let ctx = context();
        let out = resolve(
            "{CONNECTOR} in {CITY}: {temperature_agent}",
            Some("Suggest activities"),
            &ctx,
        )
        .unwrap();
        assert_eq!(out, "Suggest activities in New York: 81F");
    }

    #[test]
    fn test_unresolved_placeholder() {
        let ctx = context();
        assert_eq!(
            resolve("{missing} and {CITY}", None, &ctx),
            Err(StepError::UnresolvedPlaceholder("missing".into()))
        );
        assert_eq!(
            resolve("{CONNECTOR}", None, &ctx),
            Err(StepError::UnresolvedPlaceholder("CONNECTOR".into()))
        );
    }

    #[test]
    fn test_single_pass() {
        let mut ctx = context();
        ctx.set_variable("LOOP", "{LOOP}");
        ctx.set_variable("INNER", "{CITY}");
        assert_eq!(resolve("{LOOP}/{INNER}", None, &ctx).unwrap(), "{LOOP}/{CITY}");
    }

    #[test]
    fn test_placeholder_helpers() {
        assert_eq!(placeholders("{A} x {b_2} {CONNECTOR}"), vec!["A", "b_2", "CONNECTOR"]);
        assert_eq!(placeholder_name("hot activities-v2"), "hot_activities_v2");
    }
}
