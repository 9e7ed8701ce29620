//! Structured-response extraction from AI model output
//!
//! Models asked to return JSON routinely wrap it in commentary or code
//! fences, drop quotes, leave trailing commas, or truncate mid-object. This
//! module recovers a fully-typed [`BudgetAnalysis`] from whatever came back:
//! capture the first JSON span, run an ordered cascade of cleaning
//! strategies until one parses, and fall back to heuristic text-pattern
//! extraction when no JSON attempt succeeds.
//!
//! The contract is total: [`extract_analysis`] never fails and every field
//! of the result has the right type.

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::BudgetAnalysis;

/// Fixed analysis sentence used when the heuristic fallback finds nothing
const DEFAULT_ANALYSIS: &str =
    "根据当前预算情况，建议合理分配各项支出，优先安排必要的住宿和交通费用，同时预留一定的应急资金。";

/// Fixed suggestions used when the heuristic fallback finds none
const DEFAULT_SUGGESTIONS: [&str; 3] = [
    "优先安排必游景点和特色美食体验",
    "提前预订住宿和交通工具可节省费用",
    "预留10-15%预算作为应急资金",
];

/// Extract a budget analysis from raw model output
///
/// Tries JSON capture + the cleaning cascade first; if every strategy fails
/// to produce parseable JSON, falls back to text-pattern extraction. Always
/// returns a usable shape.
pub fn extract_analysis(raw: &str) -> BudgetAnalysis {
    match extract_json(raw) {
        Some(value) => coerce_analysis(value),
        None => {
            debug!("no JSON recovered from response, using heuristic text extraction");
            extract_from_text(raw)
        }
    }
}

/// Extract the first JSON object from raw model output as a loose value
///
/// Shared by budget analysis and plan generation. Returns `None` only when
/// every capture + cleaning combination fails to parse.
pub fn extract_json(raw: &str) -> Option<Value> {
    let span = capture_json_span(raw)?;

    for (i, strategy) in cleaning_strategies().iter().enumerate() {
        let cleaned = strategy(&span);
        match serde_json::from_str::<Value>(&cleaned) {
            Ok(value) => {
                debug!(strategy = i + 1, "cleaning strategy produced valid JSON");
                return Some(value);
            }
            Err(e) => {
                debug!(strategy = i + 1, error = %e, "cleaning strategy failed to parse");
            }
        }
    }

    warn!("all JSON cleaning strategies failed");
    None
}

/// Capture the first top-level `{...}` span, preferring fenced code blocks
///
/// Brace matching is quote-aware so braces inside string values do not end
/// the span early. A span with no matching close brace (truncated response)
/// runs to the end of the text; the brace-balancing strategy repairs it.
fn capture_json_span(raw: &str) -> Option<String> {
    let fenced_json = Regex::new(r"```json\s*(\{[\s\S]*?\})\s*```").expect("valid regex");
    let fenced = Regex::new(r"```\s*(\{[\s\S]*?\})\s*```").expect("valid regex");

    for re in [&fenced_json, &fenced] {
        if let Some(caps) = re.captures(raw) {
            return Some(caps[1].to_string());
        }
    }

    let start = raw.find('{')?;
    let tail = &raw[start..];

    let mut depth = 0i32;
    let mut in_string = false;
    let mut prev = '\0';
    for (i, c) in tail.char_indices() {
        if c == '"' && prev != '\\' {
            in_string = !in_string;
        } else if !in_string {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(tail[..i + c.len_utf8()].to_string());
                    }
                }
                _ => {}
            }
        }
        prev = c;
    }

    // No matching close brace; keep the rest and let repair balance it
    Some(tail.to_string())
}

/// Ordered cleaning strategies, each a pure `&str -> String`
///
/// Tried in order; the first whose output parses wins. Later strategies are
/// progressively more aggressive, ending in brace-balancing repair for
/// truncated responses.
fn cleaning_strategies() -> Vec<fn(&str) -> String> {
    vec![
        clean_basic,
        clean_quote_bare,
        clean_requote_values,
        clean_aggressive,
        clean_balance_braces,
    ]
}

/// Keep printable ASCII and CJK ideographs; drop or space out the rest
fn filter_charset(s: &str, replace_with_space: bool) -> String {
    s.chars()
        .filter_map(|c| {
            let keep = ('\u{20}'..='\u{7e}').contains(&c) || ('\u{4e00}'..='\u{9fa5}').contains(&c);
            if keep {
                Some(c)
            } else if replace_with_space {
                Some(' ')
            } else {
                None
            }
        })
        .collect()
}

/// Remove trailing commas before a closing brace or bracket
fn strip_trailing_commas(s: &str) -> String {
    let re = Regex::new(r",(\s*[}\]])").expect("valid regex");
    re.replace_all(s, "$1").into_owned()
}

/// Strategy 1: charset filter + trailing-comma removal
fn clean_basic(s: &str) -> String {
    strip_trailing_commas(&filter_charset(s, false))
        .trim()
        .to_string()
}

/// Strategy 2: as strategy 1, plus quote bare keys and bare scalar values
fn clean_quote_bare(s: &str) -> String {
    let s = clean_basic(s);

    let bare_key = Regex::new(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:").expect("valid regex");
    let s = bare_key.replace_all(&s, "${1}\"${2}\":").into_owned();

    let bare_value = Regex::new(r#":\s*([^",\{\[\]\}]+?)(\s*[,\}\]])"#).expect("valid regex");
    let s = bare_value.replace_all(&s, ":\"${1}\"${2}").into_owned();

    // Collapse doubled quoting artifacts left by the value pass
    let doubled = Regex::new(r#""\s*"([^"]*?)"\s*""#).expect("valid regex");
    doubled.replace_all(&s, "\"${1}\"").trim().to_string()
}

/// Strategy 3: as strategy 1, plus re-quote string values, escaping embedded
/// quotes and collapsing embedded whitespace
fn clean_requote_values(s: &str) -> String {
    let s = clean_basic(s);

    let string_value = Regex::new(r#"([{,]\s*"[^"]*":\s*")([^"]*?)""#).expect("valid regex");
    string_value
        .replace_all(&s, |caps: &regex::Captures<'_>| {
            let cleaned = caps[2]
                .replace(['\n', '\r', '\t'], " ")
                .replace('"', "\\\"")
                .trim()
                .to_string();
            format!("{}{}\"", &caps[1], cleaned)
        })
        .trim()
        .to_string()
}

/// Strategy 4: space out disallowed characters, collapse runs, and strip
/// anything but word chars, CJK, and common punctuation inside string values
fn clean_aggressive(s: &str) -> String {
    let ws = Regex::new(r"\s+").expect("valid regex");

    let s = filter_charset(s, true);
    let s = strip_trailing_commas(&s);
    let s = ws.replace_all(&s, " ").into_owned();

    let string_value = Regex::new(r#"([{,]\s*"[^"]*":\s*")([^"]*?)""#).expect("valid regex");
    let allowed = Regex::new(r"[^\w\s一-龥.,!?()（），。！？]").expect("valid regex");
    string_value
        .replace_all(&s, |caps: &regex::Captures<'_>| {
            let cleaned = allowed.replace_all(&caps[2], " ");
            let cleaned = ws.replace_all(&cleaned, " ");
            format!("{}{}\"", &caps[1], cleaned.trim())
        })
        .trim()
        .to_string()
}

/// Strategy 5: brace-balancing repair for truncated responses
///
/// Strips control characters and trailing commas, then counts open braces
/// while tracking quote state (braces inside string values must not affect
/// the count) and appends the missing closers.
fn clean_balance_braces(s: &str) -> String {
    let control = Regex::new(r"[\x00-\x1F\x7F-\x9F]").expect("valid regex");
    let s = control.replace_all(s, "");
    let mut cleaned = strip_trailing_commas(&s).trim().to_string();

    if let Some(stripped) = cleaned.strip_suffix(',') {
        cleaned = stripped.to_string();
    }

    let mut depth = 0i32;
    let mut in_string = false;
    let mut prev = '\0';
    for c in cleaned.chars() {
        if c == '"' && prev != '\\' {
            in_string = !in_string;
        } else if !in_string {
            match c {
                '{' => depth += 1,
                '}' => depth -= 1,
                _ => {}
            }
        }
        prev = c;
    }

    while depth > 0 {
        cleaned.push('}');
        depth -= 1;
    }

    cleaned
}

/// Coerce a parsed JSON value into the guaranteed analysis shape
///
/// `analysis` is normalized (objects are rendered through the breakdown
/// table), `suggestions` becomes an array (a parsed-but-empty array stays
/// empty), `remaining` becomes a number.
fn coerce_analysis(value: Value) -> BudgetAnalysis {
    let analysis = match value.get("analysis") {
        Some(Value::String(s)) => normalize_analysis_text(s),
        Some(Value::Object(map)) => render_structured_analysis(map),
        Some(Value::Null) | None => String::new(),
        Some(other) => normalize_analysis_text(&other.to_string()),
    };

    let suggestions = match value.get("suggestions") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    };

    let remaining = value
        .get("remaining")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    BudgetAnalysis {
        analysis,
        suggestions,
        remaining,
        category_breakdown: None,
    }
}

/// Normalize analysis prose: paragraph spacing, punctuation-driven breaks,
/// numbered-list markers, and colon spacing
pub fn normalize_analysis_text(text: &str) -> String {
    let blank_runs = Regex::new(r"\n\s*\n").expect("valid regex");
    let ws_runs = Regex::new(r"\s+").expect("valid regex");
    let sentence_end = Regex::new(r"([。！？])\s*(\S)").expect("valid regex");
    let list_marker = Regex::new(r"(\d+\.)\s*").expect("valid regex");
    let colon = Regex::new(r"([：:])\s*").expect("valid regex");
    let newline_runs = Regex::new(r"\n{3,}").expect("valid regex");

    let s = blank_runs.replace_all(text, "\n\n");
    let s = s.trim();
    let s = ws_runs.replace_all(s, " ");
    let s = sentence_end.replace_all(&s, "${1}\n\n${2}");
    let s = list_marker.replace_all(&s, "\n${1} ");
    let s = colon.replace_all(&s, "${1} ");
    let s = newline_runs.replace_all(&s, "\n\n");
    s.trim().to_string()
}

/// Render an object-valued `analysis` field as prose
///
/// Concatenates an `overview` field (when present) with per-key breakdown
/// sections mapped through a fixed category-name table.
fn render_structured_analysis(map: &serde_json::Map<String, Value>) -> String {
    let mut out = String::new();

    if let Some(Value::String(overview)) = map.get("overview") {
        out.push_str(overview.trim());
        out.push_str("\n\n");
    }

    if let Some(Value::Object(breakdown)) = map.get("breakdown") {
        for (key, value) in breakdown {
            if let Value::String(text) = value {
                let name = match key.as_str() {
                    "accommodation" => "住宿分析",
                    "food" => "餐饮分析",
                    "transportation" => "交通分析",
                    "activities" => "活动分析",
                    other => other,
                };
                out.push_str(name);
                out.push_str("：\n");
                out.push_str(text.trim());
                out.push_str("\n\n");
            }
        }
    }

    out.trim().to_string()
}

/// Heuristic text fallback when no JSON attempt succeeded
///
/// Pulls an analysis span and suggestion fragments out of labeled text
/// regions, substituting fixed defaults when nothing usable is found.
/// `remaining` is always 0 on this path; the caller recomputes it.
fn extract_from_text(content: &str) -> BudgetAnalysis {
    let analysis_patterns = [
        r"(?:预算|分析|使用情况)[：:]?([\s\S]*?)(?:建议|剩余|$)",
        r"(?:概览|总结|情况)[：:]?([\s\S]*?)(?:建议|详细|$)",
        r"([\s\S]*?)(?:建议|推荐|$)",
    ];

    let mut analysis = String::new();
    for pattern in analysis_patterns {
        let re = Regex::new(pattern).expect("valid regex");
        if let Some(caps) = re.captures(content) {
            let candidate = caps[1].trim();
            if candidate.chars().count() > 20 {
                analysis = candidate.to_string();
                break;
            }
        }
    }

    let suggestion_patterns = [
        r"建议[：:]?([\s\S]*?)(?:剩余|$)",
        r"推荐[：:]?([\s\S]*?)(?:剩余|$)",
        r"优化[：:]?([\s\S]*?)(?:剩余|$)",
    ];

    let mut suggestions: Vec<String> = Vec::new();
    for pattern in suggestion_patterns {
        let re = Regex::new(pattern).expect("valid regex");
        if let Some(caps) = re.captures(content) {
            let split: Vec<String> = caps[1]
                .split(['。', '；', ';'])
                .map(str::trim)
                .filter(|s| {
                    let n = s.chars().count();
                    n > 5 && n < 100
                })
                .take(3)
                .map(str::to_string)
                .collect();

            if !split.is_empty() {
                suggestions = split;
                break;
            }
        }
    }

    if analysis.chars().count() < 20 {
        analysis = DEFAULT_ANALYSIS.to_string();
    }
    if suggestions.is_empty() {
        suggestions = DEFAULT_SUGGESTIONS.iter().map(|s| s.to_string()).collect();
    }

    BudgetAnalysis {
        analysis: normalize_analysis_text(&analysis),
        suggestions,
        remaining: 0.0,
        category_breakdown: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_well_formed_json() {
        let raw = r#"{"analysis": "预算充足", "suggestions": ["早订酒店"], "remaining": 1500}"#;
        let result = extract_analysis(raw);
        assert_eq!(result.analysis, "预算充足");
        assert_eq!(result.suggestions, vec!["早订酒店"]);
        assert_eq!(result.remaining, 1500.0);
        assert!(result.category_breakdown.is_none());
    }

    #[test]
    fn test_extract_with_surrounding_text() {
        let raw = r#"好的，以下是分析结果：
{"analysis": "预算合理", "suggestions": ["减少打车"], "remaining": 800}
希望对您有帮助！"#;
        let result = extract_analysis(raw);
        assert_eq!(result.analysis, "预算合理");
        assert_eq!(result.suggestions, vec!["减少打车"]);
        assert_eq!(result.remaining, 800.0);
    }

    #[test]
    fn test_extract_fenced_code_block() {
        let raw = "```json\n{\"analysis\": \"支出偏高\", \"suggestions\": [], \"remaining\": 200}\n```";
        let result = extract_analysis(raw);
        assert_eq!(result.analysis, "支出偏高");
        assert_eq!(result.remaining, 200.0);
    }

    #[test]
    fn test_extract_fenced_without_language_tag() {
        let raw = "```\n{\"analysis\": \"正常\", \"suggestions\": [\"多走路\"], \"remaining\": 50}\n```";
        let result = extract_analysis(raw);
        assert_eq!(result.analysis, "正常");
        assert_eq!(result.suggestions, vec!["多走路"]);
    }

    #[test]
    fn test_first_json_span_wins() {
        let raw = r#"{"analysis": "第一段", "suggestions": [], "remaining": 1} and later {"analysis": "第二段", "remaining": 2}"#;
        let result = extract_analysis(raw);
        assert_eq!(result.analysis, "第一段");
        assert_eq!(result.remaining, 1.0);
    }

    #[test]
    fn test_trailing_comma_repaired() {
        let raw = r#"{"analysis": "预算紧张", "suggestions": ["少购物",], "remaining": 100,}"#;
        let result = extract_analysis(raw);
        assert_eq!(result.analysis, "预算紧张");
        assert_eq!(result.suggestions, vec!["少购物"]);
        assert_eq!(result.remaining, 100.0);
    }

    #[test]
    fn test_bare_keys_and_values_repaired() {
        let raw = r#"{analysis: 还行, suggestions: ["提前订票"], remaining: 300}"#;
        let result = extract_analysis(raw);
        assert_eq!(result.analysis, "还行");
        assert_eq!(result.suggestions, vec!["提前订票"]);
        // The bare-value pass quotes the number, so it coerces to the default
        assert_eq!(result.remaining, 0.0);
    }

    #[test]
    fn test_truncated_object_balanced() {
        // Missing two closing braces
        let raw = r#"{"analysis": "行程过半", "suggestions": ["控制餐饮"], "remaining": 400"#;
        let result = extract_analysis(raw);
        assert_eq!(result.analysis, "行程过半");
        assert_eq!(result.suggestions, vec!["控制餐饮"]);
        assert_eq!(result.remaining, 400.0);
    }

    #[test]
    fn test_truncated_nested_object_balanced() {
        let raw = r#"{"analysis": "整体可控", "suggestions": ["早起赶路"], "remaining": 250, "extra": {"a": {"b": 1"#;
        let result = extract_analysis(raw);
        assert_eq!(result.analysis, "整体可控");
        assert_eq!(result.remaining, 250.0);
    }

    #[test]
    fn test_braces_inside_strings_do_not_confuse_balancing() {
        let raw = r#"{"analysis": "tips {see below}", "suggestions": ["book {early}"], "remaining": 10}"#;
        let result = extract_analysis(raw);
        assert_eq!(result.analysis, "tips {see below}");
        assert_eq!(result.suggestions, vec!["book {early}"]);
        assert_eq!(result.remaining, 10.0);
    }

    #[test]
    fn test_parsed_empty_suggestions_stay_empty() {
        // Default-filling only applies to the heuristic path
        let raw = r#"{"analysis": "暂无更多可说", "suggestions": [], "remaining": 0}"#;
        let result = extract_analysis(raw);
        assert!(result.suggestions.is_empty());
    }

    #[test]
    fn test_malformed_suggestions_coerced_to_empty() {
        let raw = r#"{"analysis": "预算合理", "suggestions": "早点订票", "remaining": 500}"#;
        let result = extract_analysis(raw);
        assert!(result.suggestions.is_empty());
        assert_eq!(result.remaining, 500.0);
    }

    #[test]
    fn test_non_numeric_remaining_coerced_to_zero() {
        let raw = r#"{"analysis": "预算合理", "suggestions": [], "remaining": "很多"}"#;
        let result = extract_analysis(raw);
        assert_eq!(result.remaining, 0.0);
    }

    #[test]
    fn test_object_analysis_rendered_with_category_table() {
        let raw = r#"{"analysis": {"overview": "总体健康", "breakdown": {"accommodation": "酒店支出合理", "food": "餐饮偏高"}}, "suggestions": [], "remaining": 0}"#;
        let result = extract_analysis(raw);
        assert!(result.analysis.starts_with("总体健康"));
        assert!(result.analysis.contains("住宿分析"));
        assert!(result.analysis.contains("酒店支出合理"));
        assert!(result.analysis.contains("餐饮分析"));
        assert!(result.analysis.contains("餐饮偏高"));
    }

    #[test]
    fn test_heuristic_fallback_suggestions() {
        let raw = "这是分析文字，没有JSON。建议：提前预订机票。建议：控制餐饮支出。";
        let result = extract_analysis(raw);
        assert_eq!(result.suggestions.len(), 2);
        assert!(result.suggestions[0].contains("提前预订机票"));
        assert!(result.suggestions[1].contains("控制餐饮支出"));
        assert_eq!(result.remaining, 0.0);
    }

    #[test]
    fn test_heuristic_fallback_shape_without_braces() {
        let raw = "完全是自由文字，既没有结构也没有任何标记。";
        let result = extract_analysis(raw);
        assert!(result.analysis.chars().count() >= 20 || result.analysis == super::DEFAULT_ANALYSIS);
        assert!(result.suggestions.len() <= 3);
        for s in &result.suggestions {
            let n = s.chars().count();
            assert!((5..=100).contains(&n));
        }
        assert_eq!(result.remaining, 0.0);
    }

    #[test]
    fn test_heuristic_fallback_defaults_when_nothing_usable() {
        let result = extract_analysis("短。");
        assert_eq!(result.analysis, normalize_analysis_text(DEFAULT_ANALYSIS));
        assert_eq!(result.suggestions.len(), 3);
        assert_eq!(result.remaining, 0.0);
    }

    #[test]
    fn test_idempotent_reextraction() {
        let raw = r#"{"analysis": "预算充足", "suggestions": ["早订酒店", "避开周末出行"], "remaining": 1500}"#;
        let first = extract_analysis(raw);
        let serialized = serde_json::to_string(&first).unwrap();
        let second = extract_analysis(&serialized);
        assert_eq!(second.suggestions, first.suggestions);
        assert_eq!(second.remaining, first.remaining);
    }

    #[test]
    fn test_normalize_collapses_whitespace_runs() {
        assert_eq!(normalize_analysis_text("预算  使用   合理"), "预算 使用 合理");
    }

    #[test]
    fn test_normalize_breaks_after_terminal_punctuation() {
        let out = normalize_analysis_text("第一句。第二句");
        assert_eq!(out, "第一句。\n\n第二句");
    }

    #[test]
    fn test_normalize_numbered_list_markers() {
        let out = normalize_analysis_text("要点如下 1.先订房 2.再订票");
        assert!(out.contains("\n1. 先订房"));
        assert!(out.contains("\n2. 再订票"));
    }

    #[test]
    fn test_normalize_colon_spacing() {
        assert_eq!(normalize_analysis_text("住宿：  合理"), "住宿： 合理");
    }

    #[test]
    fn test_extract_json_returns_none_without_braces() {
        assert!(extract_json("没有任何大括号的文本").is_none());
    }
}
