/// Tools Module
///
/// Each tool reads one remote table and renders a text answer. Tool modules
/// export a `register` function that adds the tool to the registry during
/// server initialization, plus a pure `lookup` over already-fetched rows.

pub mod price;
pub mod reservation;
pub mod source;
pub mod stock;

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::config::TableUrls;
use crate::core::error::ToolError;
use crate::core::protocol::ToolResult;
use crate::core::registry::{ToolHandler, ToolRegistry};
use source::{RemoteTable, Row, TableSource};

/// Arguments of a table lookup tool.
pub trait LookupArgs: DeserializeOwned + Send + 'static {
    /// Normalize the arguments and check required fields. The error text is
    /// returned to the client as an `isError` result.
    fn validate(self) -> Result<Self, String>;
}

/// Wrap a pure lookup into a registry handler.
///
/// Arguments are decoded and validated before the table is fetched, so a bad
/// call never touches the network. Fetch failures propagate as `ToolError`.
pub fn table_handler<A, F>(source: Arc<dyn TableSource>, lookup: F) -> ToolHandler
where
    A: LookupArgs,
    F: Fn(&[Row], &A) -> ToolResult + Copy + Send + Sync + 'static,
{
    Box::new(move |arguments: Value| -> BoxFuture<'static, Result<ToolResult, ToolError>> {
        let source = Arc::clone(&source);
        async move {
            let args = match serde_json::from_value::<A>(arguments).map_err(|e| e.to_string()) {
                Ok(args) => args.validate(),
                Err(e) => Err(format!("Invalid arguments: {}", e)),
            };
            let args = match args {
                Ok(args) => args,
                Err(message) => return Ok(ToolResult::error(message)),
            };
            let rows = source.fetch_rows().await?;
            tracing::debug!(table = source.name(), rows = rows.len(), "running lookup");
            Ok(lookup(&rows, &args))
        }
        .boxed()
    })
}

/// Message for a missing required argument.
pub fn required(name: &str) -> String {
    format!("Parameter \"{}\" wajib diisi", name)
}

/// Register every tool against its remote table.
pub fn register_all(registry: &mut ToolRegistry, tables: &TableUrls, client: reqwest::Client) {
    stock::register(
        registry,
        Arc::new(RemoteTable::new("stock", tables.stock.clone(), client.clone())),
    );
    reservation::register(
        registry,
        Arc::new(RemoteTable::new(
            "reservation",
            tables.reservation.clone(),
            client.clone(),
        )),
    );
    price::register(
        registry,
        Arc::new(RemoteTable::new(
            "price_catalog",
            tables.price_catalog.clone(),
            client,
        )),
    );
}
