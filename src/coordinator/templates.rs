//! Combined-prompt templates and marker-based response parsing for the
//! batch path.

use super::types::{LlmBatchRequest, RequestType};

fn marker_prefix(request_type: RequestType, index: usize) -> String {
    match request_type {
        RequestType::Dialogue => format!("SCENARIO_{index}_RESPONSE:"),
        RequestType::Coordination => format!("SITUATION_{index}_ANALYSIS:"),
        RequestType::Generic => format!("REQUEST_{index}_RESPONSE:"),
    }
}

fn context_str(item: &LlmBatchRequest, key: &str, default: &str) -> String {
    item.context
        .get(key)
        .and_then(|v| v.as_str().map(str::to_string).or_else(|| Some(v.to_string())))
        .unwrap_or_else(|| default.to_string())
}

/// Build the single combined prompt for a type-homogeneous sub-batch.
/// `items` must all share `request_type`.
#[must_use]
pub fn build_combined_prompt(request_type: RequestType, items: &[LlmBatchRequest]) -> String {
    let mut out = String::new();
    match request_type {
        RequestType::Dialogue => {
            out.push_str("Generate character dialogues for the following scenarios:\n\n");
            for (i, item) in items.iter().enumerate() {
                let index = i + 1;
                let comm_type = context_str(item, "comm_type", "conversation");
                let participants = context_str(item, "participants", "the characters");
                let max_exchanges = context_str(item, "max_exchanges", "3");
                out.push_str(&format!("Scenario {index}: {comm_type} between {participants}\n"));
                out.push_str(&format!("Context: {}\n", item.prompt));
                out.push_str(&format!("Required exchanges: {max_exchanges}\n\n"));
            }
            out.push_str("Reply with each scenario's dialogue under its own marker line, exactly in the form:\n");
            for i in 1..=items.len() {
                out.push_str(&format!("{}\n", marker_prefix(request_type, i)));
            }
        }
        RequestType::Coordination => {
            out.push_str("Analyze the following multi-agent coordination situations:\n\n");
            for (i, item) in items.iter().enumerate() {
                let index = i + 1;
                let comm_type = context_str(item, "comm_type", "coordination");
                let participants = context_str(item, "participants", "the agents");
                let max_exchanges = context_str(item, "max_exchanges", "3");
                out.push_str(&format!("Situation {index}: {comm_type} between {participants}\n"));
                out.push_str(&format!("Context: {}\n", item.prompt));
                out.push_str(&format!("Required exchanges: {max_exchanges}\n\n"));
            }
            out.push_str("Reply with each situation's analysis under its own marker line, exactly in the form:\n");
            for i in 1..=items.len() {
                out.push_str(&format!("{}\n", marker_prefix(request_type, i)));
            }
        }
        RequestType::Generic => {
            out.push_str(&format!("Process the following {} requests:\n\n", items.len()));
            for (i, item) in items.iter().enumerate() {
                out.push_str(&format!("Request {}: {}\n\n", i + 1, item.prompt));
            }
            out.push_str("Reply with each request's response under its own marker line, exactly in the form:\n");
            for i in 1..=items.len() {
                out.push_str(&format!("{}\n", marker_prefix(request_type, i)));
            }
        }
    }
    out
}

/// Split a combined reply into one body per item, matched by strict
/// line-prefix markers (never substring search, to avoid misaligning on
/// a marker text that appears inside a response body).
///
/// Each returned slot is `Ok(body)` if its marker line was found, else
/// `Err(full_raw_body)`.
#[must_use]
pub fn parse_combined_response(request_type: RequestType, raw: &str, n: usize) -> Vec<Result<String, String>> {
    let lines: Vec<&str> = raw.lines().collect();
    let mut marker_lines: Vec<(usize, usize)> = Vec::new(); // (item index 1-based, line index)

    for (line_idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        for i in 1..=n {
            let prefix = marker_prefix(request_type, i);
            if trimmed.starts_with(&prefix) {
                marker_lines.push((i, line_idx));
                break;
            }
        }
    }
    marker_lines.sort_by_key(|(_, line_idx)| *line_idx);

    let mut results = vec![Err(raw.to_string()); n];
    for (pos, &(item_index, line_idx)) in marker_lines.iter().enumerate() {
        let prefix = marker_prefix(request_type, item_index);
        let inline_tail = lines[line_idx].trim_start()[prefix.len()..].trim_start();

        let end_line = marker_lines.get(pos + 1).map_or(lines.len(), |&(_, next_idx)| next_idx);
        let mut body_lines: Vec<&str> = Vec::new();
        if !inline_tail.is_empty() {
            body_lines.push(inline_tail);
        }
        for line in &lines[(line_idx + 1)..end_line] {
            body_lines.push(line);
        }
        let body = body_lines.join("\n").trim().to_string();
        if item_index >= 1 && item_index <= n {
            results[item_index - 1] = Ok(body);
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn item(prompt: &str) -> LlmBatchRequest {
        LlmBatchRequest {
            request_id: "r".to_string(),
            agent_id: "a".to_string(),
            prompt: prompt.to_string(),
            context: BTreeMap::new(),
            request_type: RequestType::Dialogue,
            priority: crate::core::Priority::Normal,
            created_at_ms: 0,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn dialogue_prompt_includes_scenario_markers() {
        let items = vec![item("a scene"), item("another scene")];
        let prompt = build_combined_prompt(RequestType::Dialogue, &items);
        assert!(prompt.contains("Scenario 1:"));
        assert!(prompt.contains("Scenario 2:"));
        assert!(prompt.contains("SCENARIO_1_RESPONSE:"));
        assert!(prompt.contains("SCENARIO_2_RESPONSE:"));
    }

    #[test]
    fn coordination_prompt_uses_situation_analysis_markers() {
        let items = vec![item("coordinate")];
        let prompt = build_combined_prompt(RequestType::Coordination, &items);
        assert!(prompt.contains("Situation 1:"));
        assert!(prompt.contains("SITUATION_1_ANALYSIS:"));
    }

    #[test]
    fn generic_prompt_uses_request_response_markers() {
        let items = vec![item("do a thing")];
        let prompt = build_combined_prompt(RequestType::Generic, &items);
        assert!(prompt.contains("Process the following 1 requests:"));
        assert!(prompt.contains("REQUEST_1_RESPONSE:"));
    }

    #[test]
    fn parse_splits_on_marker_lines_in_submission_order() {
        let raw = "preamble\nSCENARIO_1_RESPONSE:\nHello there\nSCENARIO_2_RESPONSE:\nGeneral Kenobi\n";
        let parsed = parse_combined_response(RequestType::Dialogue, raw, 2);
        assert_eq!(parsed[0], Ok("Hello there".to_string()));
        assert_eq!(parsed[1], Ok("General Kenobi".to_string()));
    }

    #[test]
    fn parse_supports_inline_body_on_the_marker_line() {
        let raw = "SCENARIO_1_RESPONSE: Hello there\n";
        let parsed = parse_combined_response(RequestType::Dialogue, raw, 1);
        assert_eq!(parsed[0], Ok("Hello there".to_string()));
    }

    #[test]
    fn missing_marker_yields_error_with_full_raw_body() {
        let raw = "SCENARIO_1_RESPONSE:\nonly one item here\n";
        let parsed = parse_combined_response(RequestType::Dialogue, raw, 2);
        assert!(parsed[0].is_ok());
        assert_eq!(parsed[1], Err(raw.to_string()));
    }

    #[test]
    fn marker_text_inside_a_body_does_not_get_mistaken_for_a_real_marker() {
        let raw = "SCENARIO_1_RESPONSE:\nthe npc said SCENARIO_2_RESPONSE: as a joke\nSCENARIO_2_RESPONSE:\nreal body\n";
        let parsed = parse_combined_response(RequestType::Dialogue, raw, 2);
        assert!(parsed[0].as_ref().unwrap().contains("the npc said"));
        assert_eq!(parsed[1], Ok("real body".to_string()));
    }
}
