// =============================================================================
// Message Rendering
// =============================================================================
//
// Renders a Recommendation into the stable UTF-8 text block described in
// spec §6: title line, message paragraph, optional Data block, numbered
// suggested-actions list, optional Action Required line, Priority line,
// Confidence line, short handle for reply commands.

use crate::recommendations::Recommendation;
use crate::types::ConfidenceBand;

/// Number of leading characters of the recommendation id exposed as a short
/// reply handle (`detail <handle>`, `dismiss <handle>`).
const HANDLE_LEN: usize = 8;

pub fn short_handle(recommendation: &Recommendation) -> String {
    recommendation.id.simple().to_string().chars().take(HANDLE_LEN).collect()
}

pub fn render(recommendation: &Recommendation) -> String {
    let mut lines = Vec::new();

    lines.push(format!("{} {}", recommendation.priority.glyph(), recommendation.payload.title));
    lines.push(String::new());
    lines.push(recommendation.payload.message.clone());

    let evidence = &recommendation.payload.evidence;
    lines.push(String::new());
    lines.push("Data:".to_string());
    lines.push(format!("  Current: {:.2}", evidence.current));
    lines.push(format!("  Baseline: {:.2}", evidence.baseline));
    lines.push(format!("  Variance: {:.1}%", evidence.variance_pct));
    lines.push(format!("  Threshold: {:.1}%", evidence.threshold_pct));

    if !recommendation.payload.suggested_actions.is_empty() {
        lines.push(String::new());
        lines.push("Recommendations:".to_string());
        for (i, action) in recommendation.payload.suggested_actions.iter().enumerate() {
            lines.push(format!("{}. {action}", i + 1));
        }
    }

    if let Some(action_required) = &recommendation.payload.action_required {
        lines.push(String::new());
        lines.push(format!("Action Required: {action_required}"));
    }

    lines.push(String::new());
    lines.push(format!("Priority: {}", recommendation.priority));
    let band = ConfidenceBand::from_score(recommendation.confidence);
    lines.push(format!("Confidence: {}% ({band})", recommendation.confidence));
    lines.push(format!("Handle: {}", short_handle(recommendation)));

    lines.join("\n")
}
