/// Reservation Tool
///
/// `get_reservation` lists who booked a costume, optionally narrowed to one
/// size and a (partial) date.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::Deserialize;

use super::source::{Row, TableSource, contains_ci, equals_ci, field, non_blank};
use super::{LookupArgs, required, table_handler};
use crate::core::protocol::{MCPTool, ToolResult};
use crate::core::registry::ToolRegistry;

#[derive(Deserialize, Debug, Default)]
pub struct ReservationArgs {
    #[serde(default)]
    pub cosplay: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub tanggal: Option<String>,
}

impl LookupArgs for ReservationArgs {
    fn validate(self) -> Result<Self, String> {
        let cosplay = non_blank(self.cosplay).ok_or_else(|| required("cosplay"))?;
        Ok(ReservationArgs {
            cosplay: Some(cosplay),
            size: non_blank(self.size),
            tanggal: non_blank(self.tanggal),
        })
    }
}

pub fn register(registry: &mut ToolRegistry, source: Arc<dyn TableSource>) {
    let tool = MCPTool {
        name: "get_reservation".to_string(),
        description: "Get reservation information. Shows who rented what costume and when."
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "cosplay": {
                    "type": "string",
                    "description": "Name of the cosplay to search"
                },
                "size": {
                    "type": "string",
                    "description": "Optional: filter by size (S, M, L, XL)"
                },
                "tanggal": {
                    "type": "string",
                    "description": "Optional: filter by date, partial dates allowed (e.g., '2024-12', '12/25')"
                }
            },
            "required": ["cosplay"]
        }),
    };
    registry.register(tool, table_handler(source, lookup));
}

/// Rows whose name contains the query, then the size and date filters.
pub fn matching<'a>(rows: &'a [Row], args: &ReservationArgs) -> Vec<&'a Row> {
    let query = args.cosplay.as_deref().unwrap_or_default();
    rows.iter()
        .filter(|row| contains_ci(&field(row, "Cosplay"), query))
        .filter(|row| match args.size.as_deref() {
            Some(size) => equals_ci(&field(row, "Size"), size),
            None => true,
        })
        .filter(|row| match args.tanggal.as_deref() {
            Some(date) => field(row, "Tanggal").contains(date),
            None => true,
        })
        .collect()
}

pub fn lookup(rows: &[Row], args: &ReservationArgs) -> ToolResult {
    let matches = matching(rows, args);

    if matches.is_empty() {
        let mut text = format!(
            "Tidak ada reservasi ditemukan untuk \"{}\"",
            args.cosplay.as_deref().unwrap_or_default()
        );
        if let Some(size) = &args.size {
            let _ = write!(text, " size {}", size);
        }
        if let Some(date) = &args.tanggal {
            let _ = write!(text, " pada tanggal {}", date);
        }
        return ToolResult::text(text);
    }

    let mut text = format!("**Reservasi ditemukan ({})**\n", matches.len());
    for (idx, row) in matches.iter().enumerate() {
        let additional = field(row, "Additional");
        let _ = write!(
            text,
            "\n{}. **{}** ({})\n   👤 {}\n   📅 {}\n   🏷️ Tier: {}\n   💰 {}\n   📦 Additional: {}\n",
            idx + 1,
            field(row, "Cosplay"),
            field(row, "Size"),
            field(row, "Nama"),
            field(row, "Tanggal"),
            field(row, "Tier"),
            field(row, "Price"),
            if additional.is_empty() { "-" } else { additional.as_str() },
        );
    }
    ToolResult::text(text.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::source::normalize;
    use serde_json::json;

    fn rows() -> Vec<Row> {
        normalize(json!([
            {"Nama": "Ayu", "Cosplay": "Hu Tao", "Size": "M", "Tanggal": "2024-12-24", "Price": "150000"},
            {"Nama": "Budi", "Cosplay": "Hu Tao Costume", "Size": "ML", "Tanggal": "2024-12-31"},
            {"Nama": "Citra", "Cosplay": "Raiden Shogun", "Size": "S", "Tanggal": "2025-01-02", "Additional": "Sword"},
            {"Nama": "Dewi", "Cosplay": "hu tao", "Size": "m", "Tanggal": "2025-01-10"}
        ]))
        .unwrap()
    }

    fn args(cosplay: &str, size: Option<&str>, tanggal: Option<&str>) -> ReservationArgs {
        ReservationArgs {
            cosplay: Some(cosplay.to_string()),
            size: size.map(str::to_string),
            tanggal: tanggal.map(str::to_string),
        }
        .validate()
        .unwrap()
    }

    fn names(matches: Vec<&Row>) -> Vec<String> {
        matches.into_iter().map(|row| field(row, "Nama")).collect()
    }

    #[test]
    fn name_match_is_case_insensitive_substring() {
        let rows = rows();
        assert_eq!(
            names(matching(&rows, &args("HU TAO", None, None))),
            vec!["Ayu", "Budi", "Dewi"]
        );
    }

    #[test]
    fn size_filter_is_exact() {
        let rows = rows();
        assert_eq!(names(matching(&rows, &args("hu tao", Some("m"), None))), vec!["Ayu", "Dewi"]);
    }

    #[test]
    fn date_filter_accepts_partial_dates() {
        let rows = rows();
        assert_eq!(
            names(matching(&rows, &args("hu", None, Some("2024-12")))),
            vec!["Ayu", "Budi"]
        );
        assert_eq!(
            names(matching(&rows, &args("hu", Some("M"), Some("2025")))),
            vec!["Dewi"]
        );
    }

    #[test]
    fn rendering_numbers_rows_and_fills_blanks() {
        let text = lookup(&rows(), &args("raiden", None, None)).joined_text();
        assert!(text.starts_with("**Reservasi ditemukan (1)**"));
        assert!(text.contains("1. **Raiden Shogun** (S)"));
        assert!(text.contains("📦 Additional: Sword"));

        let text = lookup(&rows(), &args("hu", Some("ML"), None)).joined_text();
        assert!(text.contains("👤 Budi"));
        assert!(text.contains("📦 Additional: -"));
    }

    #[test]
    fn nothing_found_echoes_filters() {
        let result = lookup(&rows(), &args("hu", Some("XL"), Some("2030")));
        assert_eq!(result.is_error, None);
        assert_eq!(
            result.joined_text(),
            "Tidak ada reservasi ditemukan untuk \"hu\" size XL pada tanggal 2030"
        );
    }
}
