/// Price Catalog Tool
///
/// `get_price` returns rental (RYS, PPR) and purchase prices for a costume,
/// optionally restricted to a tier.

use std::sync::Arc;

use serde::Deserialize;

use super::source::{Row, TableSource, contains_ci, field, non_blank};
use super::{LookupArgs, required, table_handler};
use crate::core::protocol::{MCPTool, ToolResult};
use crate::core::registry::ToolRegistry;

#[derive(Deserialize, Debug, Default)]
pub struct PriceArgs {
    #[serde(default)]
    pub cosplay: Option<String>,
    #[serde(default)]
    pub tier: Option<String>,
}

impl LookupArgs for PriceArgs {
    fn validate(self) -> Result<Self, String> {
        let cosplay = non_blank(self.cosplay).ok_or_else(|| required("cosplay"))?;
        Ok(PriceArgs {
            cosplay: Some(cosplay),
            tier: non_blank(self.tier),
        })
    }
}

pub fn register(registry: &mut ToolRegistry, source: Arc<dyn TableSource>) {
    let tool = MCPTool {
        name: "get_price".to_string(),
        description: "Get price catalog information: series, brand, tier, rental prices \
                      (RYS, PPR) and purchase price."
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "cosplay": {
                    "type": "string",
                    "description": "Name of the cosplay to search"
                },
                "tier": {
                    "type": "string",
                    "description": "Optional: filter by tier (e.g., 'Tier 1', 'Basic', 'Premium')"
                }
            },
            "required": ["cosplay"]
        }),
    };
    registry.register(tool, table_handler(source, lookup));
}

pub fn lookup(rows: &[Row], args: &PriceArgs) -> ToolResult {
    let query = args.cosplay.as_deref().unwrap_or_default();

    let found = rows.iter().find(|row| {
        contains_ci(&field(row, "Cosplay"), query)
            && args
                .tier
                .as_deref()
                .is_none_or(|tier| contains_ci(&field(row, "Tier"), tier))
    });

    let Some(row) = found else {
        let tier = args
            .tier
            .as_deref()
            .map(|t| format!(" tier {}", t))
            .unwrap_or_default();
        return ToolResult::text(format!(
            "Costume \"{}\"{} tidak ditemukan di price catalog",
            query, tier
        ));
    };

    ToolResult::text(format!(
        "**{}**\n\n🎭 Series: {}\n🏢 Brand: {}\n💰 Tier: {}\n📅 RYS: Rp {}\n🎫 PPR: Rp {}\n🛒 Purchase: Rp {}",
        field(row, "Cosplay"),
        field(row, "Series"),
        field(row, "Brand"),
        field(row, "Tier"),
        field(row, "RYS"),
        field(row, "PPR"),
        field(row, "Purchase"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::source::normalize;
    use serde_json::json;

    fn rows() -> Vec<Row> {
        normalize(json!([
            {"Cosplay": "Hu Tao", "Tier": "Tier 2", "Series": "Genshin Impact", "RYS": 150000, "PPR": 175000, "Purchase": 1200000},
            {"Cosplay": "Hu Tao", "Tier": "Premium", "Brand": "Uwowo"},
            {"Cosplay": "Frieren", "Tier": "Basic"}
        ]))
        .unwrap()
    }

    fn args(cosplay: &str, tier: Option<&str>) -> PriceArgs {
        PriceArgs {
            cosplay: Some(cosplay.to_string()),
            tier: tier.map(str::to_string),
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn first_match_without_tier() {
        let text = lookup(&rows(), &args("hu tao", None)).joined_text();
        assert!(text.starts_with("**Hu Tao**"));
        assert!(text.contains("💰 Tier: Tier 2"));
        assert!(text.contains("📅 RYS: Rp 150000"));
        assert!(text.contains("🏢 Brand: \n"));
    }

    #[test]
    fn tier_filter_accepts_either_vocabulary() {
        let text = lookup(&rows(), &args("hu", Some("premium"))).joined_text();
        assert!(text.contains("🏢 Brand: Uwowo"));

        let text = lookup(&rows(), &args("hu", Some("tier 2"))).joined_text();
        assert!(text.contains("🎭 Series: Genshin Impact"));
    }

    #[test]
    fn miss_mentions_tier() {
        let result = lookup(&rows(), &args("frieren", Some("Premium")));
        assert_eq!(result.is_error, None);
        assert_eq!(
            result.joined_text(),
            "Costume \"frieren\" tier Premium tidak ditemukan di price catalog"
        );
    }
}
