//! Command implementations

use anyhow::Result;
use tracing::debug;

use tripcraft_core::{
    BaiduProvider, ChatClient, PlaceResolver, Planner, ResolverConfig, TravelPreferences,
};

fn preferences(
    destination: &str,
    days: u32,
    budget: &str,
    style: &str,
    interests: &str,
    travelers: Option<u32>,
) -> TravelPreferences {
    TravelPreferences {
        destination: destination.to_string(),
        duration: days,
        budget: budget.to_string(),
        travel_style: style.to_string(),
        interests: interests
            .split([',', '，'])
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        start_date: None,
        travelers,
    }
}

pub async fn cmd_chat(message: &str) -> Result<()> {
    let planner = Planner::from_env();
    if ChatClient::from_env().is_none() {
        eprintln!("⚠️  No provider key configured, answering locally");
    }

    let reply = planner.chat(message, &[]).await;
    println!("{reply}");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn cmd_plan(
    destination: &str,
    days: u32,
    budget: &str,
    style: &str,
    interests: &str,
    travelers: Option<u32>,
    json: bool,
) -> Result<()> {
    let prefs = preferences(destination, days, budget, style, interests, travelers);
    debug!(destination, days, budget, "generating travel plan");
    let plan = Planner::from_env().generate_plan(&prefs).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!();
    println!("🧳 {} · {}天 · {}", plan.destination, plan.duration, budget);
    println!("   ─────────────────────────────────────────────");
    for day in &plan.itinerary {
        println!("   第{}天", day.day);
        for activity in &day.activities {
            println!("     {} {} ({})", activity.time, activity.name, activity.location);
        }
        if let Some(accommodation) = &day.accommodation {
            println!("     🏨 {accommodation}");
        }
    }
    if !plan.recommendations.is_empty() {
        println!();
        println!("   推荐：");
        for rec in &plan.recommendations {
            match rec.rating {
                Some(rating) => println!("     - {} （评分 {rating}）", rec.title),
                None => println!("     - {}", rec.title),
            }
        }
    }
    println!();
    println!(
        "   预算：共{}元（住宿{} / 餐饮{} / 交通{} / 活动{}）",
        plan.budget.total,
        plan.budget.accommodation,
        plan.budget.food,
        plan.budget.transportation,
        plan.budget.activities,
    );
    Ok(())
}

pub async fn cmd_budget(destination: &str, days: u32, budget: &str, spent: f64) -> Result<()> {
    let prefs = preferences(destination, days, budget, "休闲", "", None);
    debug!(destination, budget, spent, "analyzing budget usage");
    let analysis = Planner::from_env()
        .analyze_budget(&prefs, spent, &[], None)
        .await;

    println!();
    println!("{}", analysis.analysis);
    println!();
    for suggestion in &analysis.suggestions {
        println!("  💡 {suggestion}");
    }
    println!();
    println!("  剩余预算：{}元", analysis.remaining);
    Ok(())
}

pub async fn cmd_geocode(addresses: &[String]) -> Result<()> {
    let provider = BaiduProvider::from_env()?;
    let resolver = PlaceResolver::new(provider, ResolverConfig::default());
    debug!(count = addresses.len(), "resolving addresses");

    for address in addresses {
        match resolver.resolve(address).await {
            Some(point) => println!("{address}: {}, {}", point.lat, point.lng),
            None => println!("{address}: 未找到"),
        }
    }
    Ok(())
}
