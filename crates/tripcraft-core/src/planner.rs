//! Trip planning and budget analysis on top of the chat providers
//!
//! The planner builds Chinese-language prompts, sends them through a
//! [`ChatClient`], and recovers structured results with the extraction
//! cascade. Every operation is total: provider failures and unusable model
//! output degrade to deterministic local results instead of errors.

use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::Value;
use tracing::warn;

use crate::ai::extract::{extract_analysis, extract_json};
use crate::ai::{ChatBackend, ChatClient, ChatMessage, MockBackend, CHAT_SYSTEM_PROMPT};
use crate::models::{
    Activity, BudgetAnalysis, BudgetBreakdown, CategoryUsage, DayPlan, Expense, Meal, MealType,
    Recommendation, RecommendationCategory, TravelPlan, TravelPreferences,
};

const PLAN_SYSTEM_PROMPT: &str = "你是一个专业的旅行规划专家。请根据用户的偏好生成一份详细的、格式化的旅行计划。严格按照指定的JSON格式返回，不要包含任何额外的解释或Markdown标记。";

const BUDGET_SYSTEM_PROMPT: &str = "你是一个专业的旅行预算管理专家。请提供详细、实用的预算分析和优化建议。分析要具体、有针对性，建议要可操作。\n\n重要：必须严格按照JSON格式返回，不要添加任何额外的文字说明或格式化。只返回纯JSON对象。";

const BASELINE_SUGGESTIONS: [&str; 3] = [
    "优先安排必游景点和特色美食体验",
    "提前预订住宿和交通工具可节省15-30%费用",
    "预留10-15%预算作为应急资金和意外支出",
];

/// Map an expense-category alias onto a budget breakdown key
const CATEGORY_ALIASES: &[(&str, &str)] = &[
    ("accommodation", "accommodation"),
    ("住宿", "accommodation"),
    ("food", "food"),
    ("餐饮", "food"),
    ("美食", "food"),
    ("transportation", "transportation"),
    ("交通", "transportation"),
    ("activities", "activities"),
    ("活动", "activities"),
    ("shopping", "activities"),
    ("购物", "activities"),
];

/// Budget tier labels to a total amount in yuan
pub fn parse_budget_tier(budget: &str) -> f64 {
    match budget {
        "经济型" => 5000.0,
        "舒适型" => 10000.0,
        "豪华型" => 20000.0,
        _ => 10000.0,
    }
}

/// Default budget split for a tier: 40/30/20/8/2 percent
pub fn default_budget(budget_tier: &str) -> BudgetBreakdown {
    let total = parse_budget_tier(budget_tier);
    BudgetBreakdown {
        total,
        accommodation: (total * 0.4).round(),
        food: (total * 0.3).round(),
        transportation: (total * 0.2).round(),
        activities: (total * 0.08).round(),
        miscellaneous: (total * 0.02).round(),
    }
}

/// Travel planner over an optional chat client
///
/// Without a configured client (no provider key) every operation still
/// works, answering from deterministic local data.
pub struct Planner {
    client: Option<ChatClient>,
}

impl Planner {
    pub fn new(client: Option<ChatClient>) -> Self {
        Self { client }
    }

    /// Create a planner from environment configuration
    pub fn from_env() -> Self {
        Self::new(ChatClient::from_env())
    }

    /// Free-form planning chat with conversation history
    ///
    /// Provider failures fall back to canned local replies.
    pub async fn chat(&self, message: &str, history: &[ChatMessage]) -> String {
        let mut messages = vec![ChatMessage::system(CHAT_SYSTEM_PROMPT)];
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(message));

        if let Some(client) = &self.client {
            match client.chat(&messages).await {
                Ok(reply) => return reply,
                Err(e) => warn!(error = %e, "chat provider failed, using local reply"),
            }
        }

        MockBackend::new()
            .chat(&messages)
            .await
            .unwrap_or_default()
    }

    /// Generate a structured travel plan for the preferences
    ///
    /// Extraction or provider failure falls back to a deterministic plan.
    pub async fn generate_plan(&self, prefs: &TravelPreferences) -> TravelPlan {
        if let Some(client) = &self.client {
            let messages = [
                ChatMessage::system(PLAN_SYSTEM_PROMPT),
                ChatMessage::user(build_plan_prompt(prefs)),
            ];

            match client.chat_structured(&messages).await {
                Ok(content) => {
                    if let Some(value) = extract_json(&content) {
                        return format_plan(value, prefs);
                    }
                    warn!("travel plan extraction failed, using fallback plan");
                }
                Err(e) => warn!(error = %e, "plan provider failed, using fallback plan"),
            }
        }

        fallback_plan(prefs)
    }

    /// Analyze budget usage against recorded expenses
    ///
    /// `category_breakdown` is only populated when both `expenses` and
    /// `breakdown` are supplied. Always returns a usable analysis.
    pub async fn analyze_budget(
        &self,
        prefs: &TravelPreferences,
        current_spending: f64,
        expenses: &[Expense],
        breakdown: Option<&BudgetBreakdown>,
    ) -> BudgetAnalysis {
        let budget_total = parse_budget_tier(&prefs.budget);

        if let Some(client) = &self.client {
            let messages = [
                ChatMessage::system(BUDGET_SYSTEM_PROMPT),
                ChatMessage::user(build_budget_prompt(
                    prefs,
                    budget_total,
                    current_spending,
                    expenses,
                    breakdown,
                )),
            ];

            match client.chat_structured(&messages).await {
                Ok(content) => {
                    let mut analysis = extract_analysis(&content);
                    if analysis.remaining == 0.0 {
                        analysis.remaining = budget_total - current_spending;
                    }
                    analysis.category_breakdown = breakdown
                        .filter(|_| !expenses.is_empty())
                        .and_then(|b| category_breakdown(expenses, b));
                    return analysis;
                }
                Err(e) => warn!(error = %e, "budget provider failed, using baseline analysis"),
            }
        }

        baseline_analysis(budget_total, current_spending)
    }
}

/// Per-category spending against the budget split
///
/// Each expense counts exactly once, toward the budget key of the first
/// alias its category string contains (case-insensitive). Returns None when
/// nothing matches.
fn category_breakdown(
    expenses: &[Expense],
    budget: &BudgetBreakdown,
) -> Option<BTreeMap<String, CategoryUsage>> {
    let mut result: BTreeMap<String, CategoryUsage> = BTreeMap::new();

    for expense in expenses {
        let category = expense.category.to_lowercase();
        let Some((_, budget_key)) = CATEGORY_ALIASES
            .iter()
            .find(|(alias, _)| category.contains(&alias.to_lowercase()))
        else {
            continue;
        };

        let allocated = match *budget_key {
            "accommodation" => budget.accommodation,
            "food" => budget.food,
            "transportation" => budget.transportation,
            _ => budget.activities,
        };

        let entry = result.entry(budget_key.to_string()).or_insert(CategoryUsage {
            spent: 0.0,
            budget: allocated,
            percentage: 0,
        });
        entry.spent += expense.amount;
        entry.percentage = if allocated > 0.0 {
            ((entry.spent / allocated) * 100.0).round() as i64
        } else {
            0
        };
    }

    if result.is_empty() {
        None
    } else {
        Some(result)
    }
}

/// Deterministic analysis used when no provider is available
fn baseline_analysis(budget_total: f64, current_spending: f64) -> BudgetAnalysis {
    let usage = if budget_total > 0.0 {
        ((current_spending / budget_total) * 100.0).round()
    } else {
        0.0
    };
    let remaining = budget_total - current_spending;
    let verdict = if usage < 50.0 {
        "较为合理"
    } else if usage < 80.0 {
        "需要注意控制"
    } else {
        "已接近上限"
    };

    BudgetAnalysis {
        analysis: format!(
            "预算使用情况分析：\n\n总预算：¥{budget_total}\n已花费：¥{current_spending}（{usage}%）\n剩余预算：¥{remaining}\n\n根据当前的消费情况，您的预算使用{verdict}。建议合理分配剩余资金，优先安排必游景点和特色体验，同时预留一定的应急资金。"
        ),
        suggestions: BASELINE_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
        remaining,
        category_breakdown: None,
    }
}

fn build_plan_prompt(prefs: &TravelPreferences) -> String {
    let mut prompt = format!(
        "请为以下旅行需求生成详细的旅行计划：\n\n目的地：{}\n旅行天数：{}天\n预算：{}\n旅行风格：{}\n兴趣：{}\n",
        prefs.destination,
        prefs.duration,
        prefs.budget,
        prefs.travel_style,
        prefs.interests.join("、"),
    );
    if let Some(start_date) = &prefs.start_date {
        prompt.push_str(&format!("出发日期：{start_date}\n"));
    }
    if let Some(travelers) = prefs.travelers {
        prompt.push_str(&format!("旅行人数：{travelers}人\n"));
    }

    prompt.push_str(
        r#"
**重要要求：必须使用具体的地点名称，不能使用模糊描述！**

请生成包含以下内容的详细计划：
1. 每日详细行程：每个活动必须使用具体的景点名称、餐厅名称、地点名称
2. 推荐景点和活动：每个推荐必须包含具体名称、地址和评分
3. 餐厅推荐：必须提供具体的餐厅名称，不能只说"当地特色餐厅"
4. 住宿建议：提供具体的酒店名称或区域建议
5. 预算分解：详细的预算分配

请以JSON格式返回，格式如下：
{
  "itinerary": [
    {
      "day": 1,
      "activities": [
        {"time": "09:00", "name": "具体景点名称（如：故宫博物院）", "description": "详细描述", "location": "具体地址或地点名称", "duration": "时长", "cost": "费用"}
      ],
      "meals": [
        {"type": "breakfast", "name": "具体餐厅名称（如：酒店自助早餐）", "location": "具体地点", "cost": "费用"}
      ],
      "accommodation": "推荐入住XX酒店（具体酒店名称），位于XX区域，交通便利，价格约XX元/晚"
    }
  ],
  "recommendations": [
    {"category": "attraction", "title": "具体景点名称", "description": "详细描述", "location": "具体地址", "rating": 4.5},
    {"category": "restaurant", "title": "具体餐厅名称", "description": "详细描述", "location": "具体地址", "rating": 4.3}
  ],
  "budget": {"total": 0, "accommodation": 0, "food": 0, "transportation": 0, "activities": 0}
}

**再次强调：所有地点、景点、餐厅必须使用具体名称，不能使用"著名景点"、"当地餐厅"等模糊描述！**"#,
    );
    prompt
}

fn build_budget_prompt(
    prefs: &TravelPreferences,
    budget_total: f64,
    current_spending: f64,
    expenses: &[Expense],
    breakdown: Option<&BudgetBreakdown>,
) -> String {
    let expenses_text = if expenses.is_empty() {
        "暂无记录的开销".to_string()
    } else {
        expenses
            .iter()
            .map(|e| {
                format!(
                    "- {}: {}元 ({}) [{}]",
                    e.category, e.amount, e.description, e.date
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let budget_text = breakdown
        .map(|b| {
            format!(
                "预算分配：\n- 住宿：{}元\n- 餐饮：{}元\n- 交通：{}元\n- 活动：{}元\n",
                b.accommodation, b.food, b.transportation, b.activities
            )
        })
        .unwrap_or_default();

    format!(
        r#"请详细分析以下旅行预算情况：

目的地：{destination}
总预算：{budget_total}元（{budget}）
已花费：{current_spending}元
旅行天数：{duration}天
旅行人数：{travelers}人
{budget_text}
已记录的开销：
{expenses_text}

请提供：
1. 详细的预算使用情况分析（包括各分类的支出情况）
2. 预算使用率分析（已花费/总预算）
3. 针对性的优化建议（至少3条）
4. 剩余预算的合理分配建议
5. 如果超支，提供节省建议

请以JSON格式返回：
{{
  "analysis": "详细的分析内容（至少200字）",
  "suggestions": ["建议1", "建议2", "建议3"],
  "remaining": 剩余金额（数字）
}}"#,
        destination = prefs.destination,
        budget = prefs.budget,
        duration = prefs.duration,
        travelers = prefs.travelers.unwrap_or(1),
    )
}

/// Shape loosely-typed plan JSON into a full [`TravelPlan`], filling
/// defaults for anything the model left out
fn format_plan(value: Value, prefs: &TravelPreferences) -> TravelPlan {
    let itinerary: Vec<DayPlan> = value
        .get("itinerary")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();
    let recommendations: Vec<Recommendation> = value
        .get("recommendations")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();
    let budget: BudgetBreakdown = value
        .get("budget")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_else(|| default_budget(&prefs.budget));

    TravelPlan {
        id: Utc::now().timestamp_millis().to_string(),
        destination: prefs.destination.clone(),
        duration: prefs.duration,
        itinerary,
        recommendations,
        budget,
        created_at: Utc::now().to_rfc3339(),
    }
}

/// Deterministic plan used when no provider response is usable
fn fallback_plan(prefs: &TravelPreferences) -> TravelPlan {
    let itinerary = (1..=prefs.duration)
        .map(|day| DayPlan {
            day,
            date: None,
            activities: vec![
                Activity {
                    time: "09:00".into(),
                    name: "早餐".into(),
                    description: "在当地特色餐厅享用早餐".into(),
                    location: "酒店附近".into(),
                    duration: "1小时".into(),
                    cost: Some("50-100元".into()),
                },
                Activity {
                    time: "10:30".into(),
                    name: "参观主要景点".into(),
                    description: format!("探索{}的著名景点", prefs.destination),
                    location: "市中心".into(),
                    duration: "3小时".into(),
                    cost: Some("100-200元".into()),
                },
                Activity {
                    time: "14:00".into(),
                    name: "午餐".into(),
                    description: "品尝当地美食".into(),
                    location: "特色餐厅".into(),
                    duration: "1.5小时".into(),
                    cost: Some("80-150元".into()),
                },
                Activity {
                    time: "16:00".into(),
                    name: "自由活动".into(),
                    description: "根据个人兴趣自由安排".into(),
                    location: "市区".into(),
                    duration: "2小时".into(),
                    cost: None,
                },
            ],
            meals: vec![
                Meal {
                    meal_type: MealType::Breakfast,
                    name: "酒店早餐".into(),
                    location: "酒店".into(),
                    cost: Some("包含".into()),
                },
                Meal {
                    meal_type: MealType::Lunch,
                    name: "当地特色餐厅".into(),
                    location: "市中心".into(),
                    cost: Some("80-150元".into()),
                },
                Meal {
                    meal_type: MealType::Dinner,
                    name: "推荐餐厅".into(),
                    location: "美食街".into(),
                    cost: Some("100-200元".into()),
                },
            ],
            accommodation: None,
            notes: None,
        })
        .collect();

    TravelPlan {
        id: Utc::now().timestamp_millis().to_string(),
        destination: prefs.destination.clone(),
        duration: prefs.duration,
        itinerary,
        recommendations: vec![
            Recommendation {
                category: RecommendationCategory::Attraction,
                title: "必游景点".into(),
                description: format!("{}最值得参观的景点", prefs.destination),
                location: None,
                rating: Some(4.5),
            },
            Recommendation {
                category: RecommendationCategory::Restaurant,
                title: "特色餐厅".into(),
                description: "品尝当地美食的最佳选择".into(),
                location: None,
                rating: Some(4.3),
            },
            Recommendation {
                category: RecommendationCategory::Tip,
                title: "旅行小贴士".into(),
                description: "建议提前预订热门景点门票，避开旅游高峰期".into(),
                location: None,
                rating: None,
            },
        ],
        budget: default_budget(&prefs.budget),
        created_at: Utc::now().to_rfc3339(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockBackend;

    fn prefs() -> TravelPreferences {
        TravelPreferences {
            destination: "北京".into(),
            duration: 3,
            budget: "舒适型".into(),
            travel_style: "休闲".into(),
            interests: vec!["历史".into(), "美食".into()],
            start_date: None,
            travelers: Some(2),
        }
    }

    fn planner_with(mock: &MockBackend) -> Planner {
        Planner::new(Some(ChatClient::Mock(mock.clone())))
    }

    #[test]
    fn test_budget_tiers() {
        assert_eq!(parse_budget_tier("经济型"), 5000.0);
        assert_eq!(parse_budget_tier("舒适型"), 10000.0);
        assert_eq!(parse_budget_tier("豪华型"), 20000.0);
        assert_eq!(parse_budget_tier("未知档位"), 10000.0);
    }

    #[test]
    fn test_default_budget_split() {
        let b = default_budget("经济型");
        assert_eq!(b.total, 5000.0);
        assert_eq!(b.accommodation, 2000.0);
        assert_eq!(b.food, 1500.0);
        assert_eq!(b.transportation, 1000.0);
        assert_eq!(b.activities, 400.0);
        assert_eq!(b.miscellaneous, 100.0);
    }

    #[tokio::test]
    async fn test_generate_plan_from_model_json() {
        let mock = MockBackend::new();
        mock.push_reply(
            r#"{"itinerary": [{"day": 1, "activities": [{"time": "09:00", "name": "参观故宫博物院", "description": "游览明清皇宫", "location": "北京市东城区", "duration": "3小时", "cost": "60元"}], "meals": []}], "recommendations": [{"category": "attraction", "title": "故宫博物院", "description": "世界文化遗产", "rating": 4.8}], "budget": {"total": 10000, "accommodation": 4000, "food": 3000, "transportation": 2000, "activities": 1000}}"#,
        );
        let plan = planner_with(&mock).generate_plan(&prefs()).await;

        assert_eq!(plan.destination, "北京");
        assert_eq!(plan.itinerary.len(), 1);
        assert_eq!(plan.itinerary[0].activities[0].name, "参观故宫博物院");
        assert_eq!(plan.recommendations[0].title, "故宫博物院");
        assert_eq!(plan.budget.total, 10000.0);
    }

    #[tokio::test]
    async fn test_generate_plan_falls_back_without_json() {
        let mock = MockBackend::new();
        mock.push_reply("很抱歉，我无法生成计划。");
        let plan = planner_with(&mock).generate_plan(&prefs()).await;

        // Deterministic fallback: one day plan per requested day
        assert_eq!(plan.itinerary.len(), 3);
        assert_eq!(plan.budget.total, 10000.0);
        assert_eq!(plan.recommendations.len(), 3);
    }

    #[tokio::test]
    async fn test_generate_plan_without_client_uses_fallback() {
        let plan = Planner::new(None).generate_plan(&prefs()).await;
        assert_eq!(plan.itinerary.len(), 3);
    }

    #[tokio::test]
    async fn test_analyze_budget_recomputes_zero_remaining() {
        let mock = MockBackend::new();
        mock.push_reply(r#"{"analysis": "支出整体平稳，节奏良好。", "suggestions": ["保持当前节奏"], "remaining": 0}"#);
        let analysis = planner_with(&mock)
            .analyze_budget(&prefs(), 3000.0, &[], None)
            .await;

        // 舒适型 = 10000 total
        assert_eq!(analysis.remaining, 7000.0);
        assert!(analysis.category_breakdown.is_none());
    }

    #[tokio::test]
    async fn test_analyze_budget_keeps_model_remaining() {
        let mock = MockBackend::new();
        mock.push_reply(r#"{"analysis": "还有富余。", "suggestions": [], "remaining": 6500}"#);
        let analysis = planner_with(&mock)
            .analyze_budget(&prefs(), 3000.0, &[], None)
            .await;
        assert_eq!(analysis.remaining, 6500.0);
    }

    #[tokio::test]
    async fn test_analyze_budget_category_breakdown() {
        let mock = MockBackend::new();
        mock.push_reply(r#"{"analysis": "分类支出见明细。", "suggestions": [], "remaining": 5000}"#);

        let expenses = vec![
            Expense {
                date: "2024-05-01".into(),
                category: "住宿".into(),
                description: "酒店两晚".into(),
                amount: 1200.0,
            },
            Expense {
                date: "2024-05-02".into(),
                category: "food".into(),
                description: "晚餐".into(),
                amount: 300.0,
            },
            Expense {
                date: "2024-05-02".into(),
                category: "购物".into(),
                description: "纪念品".into(),
                amount: 200.0,
            },
        ];
        let budget = default_budget("舒适型");

        let analysis = planner_with(&mock)
            .analyze_budget(&prefs(), 1700.0, &expenses, Some(&budget))
            .await;

        let breakdown = analysis.category_breakdown.expect("breakdown populated");
        assert_eq!(breakdown["accommodation"].spent, 1200.0);
        assert_eq!(breakdown["accommodation"].budget, 4000.0);
        assert_eq!(breakdown["accommodation"].percentage, 30);
        assert_eq!(breakdown["food"].spent, 300.0);
        // 购物 maps onto the activities budget
        assert_eq!(breakdown["activities"].spent, 200.0);
        assert_eq!(breakdown["activities"].percentage, 25);
    }

    #[test]
    fn test_category_matching_two_aliases_counts_once() {
        // "餐饮美食" contains both the 餐饮 and 美食 aliases of the food key
        let expenses = vec![Expense {
            date: "2024-05-01".into(),
            category: "餐饮美食".into(),
            description: "午餐".into(),
            amount: 100.0,
        }];
        let budget = default_budget("舒适型");

        let breakdown = category_breakdown(&expenses, &budget).expect("breakdown populated");
        assert_eq!(breakdown["food"].spent, 100.0);
    }

    #[test]
    fn test_refunded_category_keeps_negative_percentage() {
        let expenses = vec![
            Expense {
                date: "2024-05-01".into(),
                category: "餐饮".into(),
                description: "晚餐".into(),
                amount: 300.0,
            },
            Expense {
                date: "2024-05-02".into(),
                category: "餐饮".into(),
                description: "团购退款".into(),
                amount: -500.0,
            },
        ];
        let budget = default_budget("舒适型");

        let breakdown = category_breakdown(&expenses, &budget).expect("breakdown populated");
        assert_eq!(breakdown["food"].spent, -200.0);
        // round(-200 / 3000 * 100)
        assert_eq!(breakdown["food"].percentage, -7);
    }

    #[tokio::test]
    async fn test_analyze_budget_without_client_is_baseline() {
        let analysis = Planner::new(None)
            .analyze_budget(&prefs(), 9000.0, &[], None)
            .await;
        assert!(analysis.analysis.contains("已接近上限"));
        assert_eq!(analysis.suggestions.len(), 3);
        assert_eq!(analysis.remaining, 1000.0);
    }

    #[tokio::test]
    async fn test_chat_without_client_answers_locally() {
        let reply = Planner::new(None).chat("你好", &[]).await;
        assert!(reply.contains("旅行规划助手"));
    }
}
