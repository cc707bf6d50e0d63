use serde::{Deserialize, Serialize};

/// One open order row as the indexer reports it. Numeric amounts arrive as
/// strings and stay strings here; display formatting owns their precision.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrder {
    pub creation_date: String,
    pub latest_update_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<String>,
    pub transaction_hash: String,
    pub is_bid: bool,
    pub taker_got: String,
    pub taker_gave: String,
    pub penalty: String,
    pub fee_paid: String,
    pub initial_wants: String,
    pub initial_gives: String,
    pub price: String,
    pub offer_id: String,
}

/// Lenient batch decode: a malformed row is logged and dropped, it never
/// fails the whole page.
pub fn parse_orders(rows: &[serde_json::Value]) -> Vec<OpenOrder> {
    rows.iter()
        .filter_map(|row| match serde_json::from_value(row.clone()) {
            Ok(order) => Some(order),
            Err(err) => {
                tracing::warn!(target: "orders", row = %row, error = %err, "invalid order row");
                None
            }
        })
        .collect()
}
