use serde_json::Value;
use tracing::debug;

/// A reply payload classified into the report it describes.
///
/// The backend attaches at most one recognizable shape per reply; `classify`
/// decides which one. Payload shapes the client does not know yet come
/// through as `Raw` so they still render instead of breaking the chat.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportView {
    /// Aggregate estimated sales and total value for the whole dataset.
    Totals { estimated: f64, value: f64 },
    /// Per-crop sales figures.
    CropSales { rows: Vec<SalesRow> },
    /// Per-zone sales figures.
    ZoneSales { rows: Vec<SalesRow> },
    /// Top performers, in the order the backend ranked them.
    TopCrops { rows: Vec<RankedRow> },
    /// How many records each zone/crop pairing has.
    Distribution { rows: Vec<DistributionRow> },
    /// Unrecognized payload, rendered verbatim.
    Raw(Value),
}

/// One line of a crop- or zone-keyed sales table.
#[derive(Debug, Clone, PartialEq)]
pub struct SalesRow {
    pub label: String,
    pub estimated: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedRow {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistributionRow {
    pub zone: String,
    pub crop: String,
    pub count: u64,
}

/// Classify a reply payload into the view it describes.
///
/// Structural tests run in a fixed priority order and the first match wins:
/// totals, crop sales, zone sales, top crops, distribution. A null payload
/// produces no view at all. Recognized keys only match when their value has
/// the expected container shape; everything else lands in `Raw`. Missing or
/// malformed cells read as zero or an empty label, so classification never
/// fails the conversation.
pub fn classify(payload: &Value) -> Option<ReportView> {
    if let (Some(estimated), Some(value)) = (
        payload.get("total_estimated"),
        payload.get("total_value"),
    ) {
        return Some(ReportView::Totals {
            estimated: estimated.as_f64().unwrap_or(0.0),
            value: value.as_f64().unwrap_or(0.0),
        });
    }

    if let Some(items) = payload.get("crop_sales").and_then(Value::as_array) {
        return Some(ReportView::CropSales {
            rows: sales_rows(items, "Crop"),
        });
    }

    if let Some(items) = payload.get("zone_sales").and_then(Value::as_array) {
        return Some(ReportView::ZoneSales {
            rows: sales_rows(items, "ZO"),
        });
    }

    if let Some(mapping) = payload.get("top_crops").and_then(Value::as_object) {
        // Pass-through: rows keep the mapping's own iteration order. The
        // backend sorts before sending; the client must not re-sort.
        let rows = mapping
            .iter()
            .map(|(label, value)| RankedRow {
                label: label.clone(),
                value: value.as_f64().unwrap_or(0.0),
            })
            .collect();
        return Some(ReportView::TopCrops { rows });
    }

    if let Some(items) = payload.get("distribution").and_then(Value::as_array) {
        let rows = items
            .iter()
            .map(|item| DistributionRow {
                zone: text_or_empty(item.get("ZO")),
                crop: text_or_empty(item.get("Crop")),
                count: item.get("count").and_then(Value::as_u64).unwrap_or(0),
            })
            .collect();
        return Some(ReportView::Distribution { rows });
    }

    if payload.is_null() {
        return None;
    }

    debug!("payload did not match any known report shape");
    Some(ReportView::Raw(payload.clone()))
}

fn sales_rows(items: &[Value], label_key: &str) -> Vec<SalesRow> {
    items
        .iter()
        .map(|item| SalesRow {
            label: text_or_empty(item.get(label_key)),
            estimated: number_or_zero(item.get("CME")),
            value: number_or_zero(item.get("YTDPV")),
        })
        .collect()
}

fn number_or_zero(value: Option<&Value>) -> f64 {
    value.and_then(Value::as_f64).unwrap_or(0.0)
}

fn text_or_empty(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
