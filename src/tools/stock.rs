/// Stock Tool
///
/// `get_stock` looks up a costume in the stock table and reports tier, sizes
/// and, per size, whether it is rented out and until when.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::Deserialize;

use super::source::{Row, TableSource, contains_ci, equals_ci, field, first_field, non_blank};
use super::{LookupArgs, required, table_handler};
use crate::core::protocol::{MCPTool, ToolResult};
use crate::core::registry::ToolRegistry;

const SIZES: [&str; 4] = ["S", "M", "L", "XL"];

#[derive(Deserialize, Debug, Default)]
pub struct StockArgs {
    #[serde(default)]
    pub costume: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

impl LookupArgs for StockArgs {
    fn validate(self) -> Result<Self, String> {
        let costume = non_blank(self.costume).ok_or_else(|| required("costume"))?;
        Ok(StockArgs {
            costume: Some(costume),
            size: non_blank(self.size).map(|s| s.to_uppercase()),
        })
    }
}

pub fn register(registry: &mut ToolRegistry, source: Arc<dyn TableSource>) {
    let tool = MCPTool {
        name: "get_stock".to_string(),
        description: "Get costume stock availability. Returns stock info including tier, \
                      sizes, ETA per size and what the rental includes."
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "costume": {
                    "type": "string",
                    "description": "Name of the costume to search (e.g., 'Hu Tao', 'Gojo', 'Tanjiro')"
                },
                "size": {
                    "type": "string",
                    "description": "Optional: specific size to check (S, M, L, XL)"
                }
            },
            "required": ["costume"]
        }),
    };
    registry.register(tool, table_handler(source, lookup));
}

/// Find the first costume containing the query and describe its stock.
pub fn lookup(rows: &[Row], args: &StockArgs) -> ToolResult {
    let query = args.costume.as_deref().unwrap_or_default();

    let Some(row) = rows.iter().find(|row| contains_ci(&field(row, "Costume"), query)) else {
        return ToolResult::text(format!("Costume \"{}\" tidak ditemukan di stock", query));
    };

    let name = field(row, "Costume");
    let sizes_available = field(row, "SizeAvailable");

    if let Some(size) = args.size.as_deref() {
        if !size_list(&sizes_available).any(|s| equals_ci(s, size)) {
            return ToolResult::text(format!(
                "Costume \"{}\" tersedia, tapi size {} tidak ada.\n\nSize available: {}",
                name, size, sizes_available
            ));
        }
    }

    let mut text = format!("**{}**\n\n", name);
    let image = field(row, "ImageURL");
    if !image.is_empty() {
        let _ = write!(text, "📸 {}\n\n", image);
    }
    let tagline = first_field(row, &["Tagline", "Tagline/CosplayLevel"]);
    if !tagline.is_empty() {
        let _ = writeln!(text, "🏷️ {}", tagline);
    }
    let _ = writeln!(text, "💰 Tier: {}", field(row, "Tier"));
    let _ = writeln!(text, "💵 RYS: {}", field(row, "RYS"));
    let _ = write!(text, "📏 Size Available: {}\n\n", sizes_available);

    match args.size.as_deref() {
        Some(size) => {
            let _ = writeln!(text, "**Size {}:**", size);
            text.push_str(&rental_status(&eta(row, size)));
        }
        None => {
            text.push_str("**ETA per Size:**");
            for size in SIZES {
                let until = eta(row, size);
                let shown = if until.is_empty() { "Available" } else { until.as_str() };
                let _ = write!(text, "\n- {}: {}", size, shown);
            }
        }
    }

    let _ = write!(text, "\n\n📦 Includes: {}", field(row, "Includes"));
    ToolResult::text(text)
}

/// Sizes listed in a `SizeAvailable` cell such as "S,M" or "S / M / XL".
fn size_list(cell: &str) -> impl Iterator<Item = &str> {
    cell.split([',', '/', ';', ' '])
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn eta(row: &Row, size: &str) -> String {
    field(row, &format!("ETA {}", size)).trim().to_string()
}

fn rental_status(eta: &str) -> String {
    if eta.is_empty() || eta == "-" {
        "✅ Available sekarang".to_string()
    } else {
        format!("⏰ Disewa sampai {}", eta)
    }
}
