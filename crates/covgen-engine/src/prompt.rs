//! Prompt construction.
//!
//! Pure formatting: the builder turns target facts into prompt text and is
//! swappable per target output format. The default builder states the goal
//! (exercise the uncovered units) and the output contract (one code block,
//! nothing else); it never hints at any particular grammar.

use covgen_core::{TargetId, UnitSet};

/// Target facts a prompt is rendered from.
#[derive(Debug, Clone)]
pub struct PromptContext<'a> {
    /// Target to exercise.
    pub target: &'a TargetId,
    /// Total measurable units in the target.
    pub total_units: u32,
    /// Units not yet covered at cycle start.
    pub uncovered: &'a UnitSet,
    /// 0-based attempt index.
    pub attempt: u32,
}

/// Swappable prompt formatting.
pub trait PromptBuilder: Send + Sync {
    /// System prompt framing the generation task.
    fn system(&self, ctx: &PromptContext<'_>) -> String;

    /// First prompt of a cycle.
    fn initial(&self, ctx: &PromptContext<'_>) -> String;

    /// Retry prompt carrying the rejected candidate and its diagnostic.
    fn feedback(&self, ctx: &PromptContext<'_>, previous_text: &str, diagnostic: &str) -> String;
}

/// Default text prompt builder.
///
/// `format_name` names the expected output format in the prompts (e.g.
/// "DEF", "SQL"); the engine itself never interprets it.
#[derive(Debug, Clone)]
pub struct TextPromptBuilder {
    format_name: String,
}

impl TextPromptBuilder {
    /// Builder for the given output format name.
    #[must_use]
    pub fn new(format_name: impl Into<String>) -> Self {
        Self {
            format_name: format_name.into(),
        }
    }

    fn uncovered_summary(ctx: &PromptContext<'_>) -> String {
        let units: Vec<String> = ctx.uncovered.iter().map(|u| u.to_string()).collect();
        format!(
            "{} of {} units are uncovered: [{}]",
            ctx.uncovered.len(),
            ctx.total_units,
            units.join(", ")
        )
    }
}

impl PromptBuilder for TextPromptBuilder {
    fn system(&self, ctx: &PromptContext<'_>) -> String {
        format!(
            r#"You are an expert author of {format} snippets.
Your task is to produce a {format} snippet that exercises as much of the target file `{target}` as possible.
The goal is diverse inputs that maximize execution coverage of the target.

CRITICAL REQUIREMENTS:
1. The snippet MUST be syntactically valid; it will be verified before acceptance.
2. Provide only the complete snippet in a single code block. No explanations, no markdown outside the block."#,
            format = self.format_name,
            target = ctx.target,
        )
    }

    fn initial(&self, ctx: &PromptContext<'_>) -> String {
        format!(
            r#"Write a {format} snippet that exercises the target file `{target}`.

Coverage status: {summary}.

Favor constructs that reach the uncovered units. Return ONLY the snippet in a single code block."#,
            format = self.format_name,
            target = ctx.target,
            summary = Self::uncovered_summary(ctx),
        )
    }

    fn feedback(&self, ctx: &PromptContext<'_>, previous_text: &str, diagnostic: &str) -> String {
        format!(
            r#"Your previous {format} snippet for `{target}` failed verification (attempt {attempt}).

## PREVIOUS SNIPPET

```
{previous}
```

## VERIFICATION DIAGNOSTIC

{diagnostic}

Coverage status: {summary}.

Fix the snippet so it passes verification while still reaching the uncovered units.
Return ONLY the corrected snippet in a single code block."#,
            format = self.format_name,
            target = ctx.target,
            attempt = ctx.attempt,
            previous = previous_text,
            diagnostic = diagnostic,
            summary = Self::uncovered_summary(ctx),
        )
    }
}

/// Strip a surrounding markdown code fence from a model response.
///
/// Removes one leading ```` ``` ```` line (with or without a language tag)
/// and one trailing ```` ``` ```` fence, then trims. Text without fences
/// passes through unchanged apart from trimming.
#[must_use]
pub fn strip_code_fences(raw: &str) -> String {
    let mut text = raw.trim();

    if text.starts_with("```") {
        text = match text.find('\n') {
            Some(newline) => &text[newline + 1..],
            None => "",
        };
    }

    if let Some(stripped) = text.trim_end().strip_suffix("```") {
        text = stripped;
    }

    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(target: &'a TargetId, uncovered: &'a UnitSet) -> PromptContext<'a> {
        PromptContext {
            target,
            total_units: 10,
            uncovered,
            attempt: 1,
        }
    }

    #[test]
    fn test_strip_tagged_fence() {
        let raw = "```def\nDESIGN top ;\nEND DESIGN\n```";
        assert_eq!(strip_code_fences(raw), "DESIGN top ;\nEND DESIGN");
    }

    #[test]
    fn test_strip_bare_fence() {
        let raw = "```\nselect 1;\n```\n";
        assert_eq!(strip_code_fences(raw), "select 1;");
    }

    #[test]
    fn test_unfenced_text_passes_through() {
        assert_eq!(strip_code_fences("  plain text  "), "plain text");
    }

    #[test]
    fn test_fence_only_response_is_empty() {
        assert_eq!(strip_code_fences("```"), "");
        assert_eq!(strip_code_fences("```def\n```"), "");
    }

    #[test]
    fn test_prompts_name_target_and_gap() {
        let target = TargetId::new("src/parser.c");
        let uncovered: UnitSet = [3, 4, 7].into_iter().collect();
        let builder = TextPromptBuilder::new("DEF");
        let ctx = ctx(&target, &uncovered);

        let initial = builder.initial(&ctx);
        assert!(initial.contains("src/parser.c"));
        assert!(initial.contains("[3, 4, 7]"));
        assert!(builder.system(&ctx).contains("DEF"));
    }

    #[test]
    fn test_feedback_embeds_diagnostic_and_previous() {
        let target = TargetId::new("src/parser.c");
        let uncovered: UnitSet = [1].into_iter().collect();
        let builder = TextPromptBuilder::new("DEF");

        let feedback = builder.feedback(&ctx(&target, &uncovered), "BAD SNIPPET", "syntax error near line 2");
        assert!(feedback.contains("BAD SNIPPET"));
        assert!(feedback.contains("syntax error near line 2"));
    }
}
