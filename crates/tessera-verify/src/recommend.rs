//! Verification recommendations.
//!
//! Baseline recommendations are derived from the probe tally. For agents that
//! land at `unverified` or `L1`, a text oracle may expand them into concrete
//! one-line fixes; that expansion is advisory and never affects the level.

use tessera_contracts::{
    agent::{Agent, VerificationLevel},
    verify::{ProbeResult, ProbeTally, PROBE_COUNT},
};

/// Average probe latency above which a speed recommendation is issued.
pub const SLOW_LATENCY_MS: f64 = 2000.0;

/// Maximum number of oracle-suggested fixes appended to a report.
pub const MAX_SUGGESTED_FIXES: usize = 5;

pub const SCHEMA_RECOMMENDATION: &str =
    "Conform responses to the declared output schema (field types and required fields).";
pub const STABILITY_RECOMMENDATION: &str =
    "Improve endpoint stability and error handling; one or more probe calls failed.";
pub const LATENCY_RECOMMENDATION: &str =
    "Reduce response time; average probe latency exceeded 2000ms.";

/// Recommendations implied by the tally, in fixed order.
pub fn baseline_recommendations(tally: &ProbeTally) -> Vec<String> {
    let mut recommendations = Vec::new();
    if tally.schema_matches < PROBE_COUNT {
        recommendations.push(SCHEMA_RECOMMENDATION.to_string());
    }
    if tally.successful_calls < PROBE_COUNT {
        recommendations.push(STABILITY_RECOMMENDATION.to_string());
    }
    if tally.avg_latency_ms() > SLOW_LATENCY_MS {
        recommendations.push(LATENCY_RECOMMENDATION.to_string());
    }
    recommendations
}

/// Whether the oracle should be asked for concrete fixes at this level.
pub fn wants_suggestions(level: VerificationLevel) -> bool {
    matches!(level, VerificationLevel::Unverified | VerificationLevel::L1)
}

/// Prompt asking the oracle for concrete fixes.
pub fn suggestion_prompt(
    agent: &Agent,
    level: VerificationLevel,
    probes: &[ProbeResult],
    recommendations: &[String],
) -> String {
    let mut prompt = format!(
        "An HTTP agent named '{}' was verified at trust level {}.\n\
         Its declared output schema is:\n{}\n\nIssues found:\n",
        agent.name, level, agent.output_schema
    );
    for recommendation in recommendations {
        prompt.push_str(&format!("- {recommendation}\n"));
    }
    for probe in probes {
        for error in &probe.errors {
            prompt.push_str(&format!("- probe {}: {error}\n", probe.index));
        }
    }
    prompt.push_str(&format!(
        "\nList up to {MAX_SUGGESTED_FIXES} concrete fixes the agent's developer should make, \
         one per line, with no extra commentary."
    ));
    prompt
}

/// Turn oracle output into at most `MAX_SUGGESTED_FIXES` clean lines,
/// stripping list markers such as `-`, `*`, `1.` or `2)`.
pub fn parse_suggestions(text: &str) -> Vec<String> {
    text.lines()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty())
        .take(MAX_SUGGESTED_FIXES)
        .map(str::to_string)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    let line = line.trim_start_matches(['-', '*', '•']).trim_start();
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(stripped) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return stripped.trim();
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use tessera_contracts::{agent::VerificationLevel, verify::ProbeTally};

    use super::*;

    #[test]
    fn perfect_tally_has_no_recommendations() {
        let tally = ProbeTally { successful_calls: 3, schema_matches: 3, total_latency_ms: 300 };
        assert!(baseline_recommendations(&tally).is_empty());
    }

    #[test]
    fn recommendations_follow_fixed_order() {
        let tally = ProbeTally { successful_calls: 2, schema_matches: 1, total_latency_ms: 6000 };
        assert_eq!(
            baseline_recommendations(&tally),
            vec![SCHEMA_RECOMMENDATION, STABILITY_RECOMMENDATION, LATENCY_RECOMMENDATION]
        );
    }

    #[test]
    fn latency_at_threshold_is_not_slow() {
        let tally = ProbeTally { successful_calls: 3, schema_matches: 3, total_latency_ms: 6000 };
        assert!(baseline_recommendations(&tally).is_empty());
    }

    #[test]
    fn only_low_levels_want_suggestions() {
        assert!(wants_suggestions(VerificationLevel::Unverified));
        assert!(wants_suggestions(VerificationLevel::L1));
        assert!(!wants_suggestions(VerificationLevel::L2));
        assert!(!wants_suggestions(VerificationLevel::L3));
    }

    #[test]
    fn suggestions_are_cleaned_and_capped() {
        let text = "1. Return a `result` string\n\n- Handle empty input\n* Add retries upstream\n\
                    2) Validate JSON before replying\n• Log failures\nSixth line is dropped";
        assert_eq!(
            parse_suggestions(text),
            vec![
                "Return a `result` string",
                "Handle empty input",
                "Add retries upstream",
                "Validate JSON before replying",
                "Log failures",
            ]
        );
    }

    #[test]
    fn numbers_without_markers_are_kept() {
        assert_eq!(parse_suggestions("200ms budget per call"), vec!["200ms budget per call"]);
    }
}
