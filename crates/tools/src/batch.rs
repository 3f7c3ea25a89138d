//! Simulated per-item batch processing.

use std::time::Duration;

use serde::Serialize;
use serde_json::json;

use asyncops_jobs::{JobContext, JobInputs, JobOutcome};

use crate::ToolError;
use crate::simulate;

pub const OPERATION: &str = "batch_processing";

pub const MAX_ITEMS: usize = 100;

/// Share of items that fail in simulation.
const FAILURE_RATE: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub item_ids: Vec<String>,
    pub operation: String,
}

impl BatchRequest {
    /// Parses a comma-separated id list. Blank entries are dropped.
    pub fn new(item_ids: &str, operation: &str) -> Result<Self, ToolError> {
        let items: Vec<String> = item_ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();

        if items.is_empty() {
            return Err(ToolError::InvalidInput("no item ids provided".to_string()));
        }
        if items.len() > MAX_ITEMS {
            return Err(ToolError::InvalidInput(format!(
                "at most {MAX_ITEMS} items per batch, got {}",
                items.len()
            )));
        }

        Ok(Self {
            item_ids: items,
            operation: operation.to_string(),
        })
    }

    pub fn inputs(&self) -> JobInputs {
        let mut inputs = JobInputs::new();
        inputs.insert("item_ids".to_string(), json!(self.item_ids));
        inputs.insert("operation".to_string(), json!(self.operation));
        inputs.insert("item_count".to_string(), json!(self.item_ids.len()));
        inputs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct ItemResult {
    item_id: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub async fn run(ctx: JobContext, request: BatchRequest, step_delay: Duration) -> JobOutcome {
    tracing::info!(
        job_id = %ctx.job_id(),
        items = request.item_ids.len(),
        operation = %request.operation,
        "starting batch"
    );

    let total = request.item_ids.len();
    let mut results = Vec::with_capacity(total);

    for (i, item_id) in request.item_ids.iter().enumerate() {
        ctx.checkpoint()?;
        ctx.report_progress(
            ((i + 1) * 100 / total) as i64,
            format!("Processing item {}/{total}: {item_id}", i + 1),
        );
        ctx.sleep(step_delay).await?;
        results.push(process_item(item_id, &request.operation));
    }

    let successful = results.iter().filter(|r| r.status == "success").count();
    let failed = total - successful;

    Ok(json!({
        "operation": request.operation,
        "total_items": total,
        "successful": successful,
        "failed": failed,
        "success_rate": format!("{:.1}%", successful as f64 * 100.0 / total as f64),
        "results": results,
    }))
}

fn process_item(item_id: &str, operation: &str) -> ItemResult {
    let seed = simulate::seed(&format!("{operation}:{item_id}"));
    if simulate::fraction(seed, 0) < FAILURE_RATE {
        ItemResult {
            item_id: item_id.to_string(),
            status: "failed",
            error: Some("Simulated processing error".to_string()),
        }
    } else {
        ItemResult {
            item_id: item_id.to_string(),
            status: "success",
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_trims_item_ids() {
        let request = BatchRequest::new(" a, b ,,c ,", "validate").unwrap();
        assert_eq!(request.item_ids, vec!["a", "b", "c"]);
        assert_eq!(request.inputs()["item_count"], 3);
    }

    #[test]
    fn rejects_empty_and_oversized_batches() {
        assert!(matches!(
            BatchRequest::new(" , ,", "x"),
            Err(ToolError::InvalidInput(_))
        ));

        let ids: Vec<String> = (0..=MAX_ITEMS).map(|i| format!("item-{i}")).collect();
        assert!(BatchRequest::new(&ids.join(","), "x").is_err());

        let ids: Vec<String> = (0..MAX_ITEMS).map(|i| format!("item-{i}")).collect();
        assert_eq!(BatchRequest::new(&ids.join(","), "x").unwrap().item_ids.len(), MAX_ITEMS);
    }

    #[test]
    fn item_outcome_is_stable() {
        for i in 0..50 {
            let id = format!("item-{i}");
            assert_eq!(process_item(&id, "sync"), process_item(&id, "sync"));
        }
    }
}
