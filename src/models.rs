//! Typed views over the JSON replies of the Nutri-X backend.
//!
//! The backend answers application failures with HTTP 200 and
//! `"status": "error"`, so a transport-level success still has to be
//! checked with [`into_result`](IdentifyReply::into_result).

use anyhow::{Result, anyhow};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Success,
    Error,
}

/// One object found in an uploaded image. Not every item is food.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemWithLoc {
    pub name: String,
    /// `[x1, y1, x2, y2]` on a 0-1000 grid. Model output is not checked
    /// upstream, so anything that is not a list of numbers reads as `None`.
    #[serde(
        default,
        deserialize_with = "lenient_box",
        skip_serializing_if = "Option::is_none"
    )]
    pub box_2d: Option<Vec<f64>>,
    #[serde(default = "default_is_food")]
    pub is_food: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_is_food() -> bool {
    true
}

fn lenient_box<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    let coords = match raw {
        Value::Array(items) => items.iter().map(Value::as_f64).collect::<Option<Vec<_>>>(),
        _ => None,
    };
    Ok(coords)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IdentifyReply {
    pub status: ReplyStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub is_food: Option<bool>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub items_with_loc: Vec<ItemWithLoc>,
    #[serde(default)]
    pub nutrition: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecommendReply {
    pub status: ReplyStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EvaluateReply {
    pub status: ReplyStatus,
    #[serde(default)]
    pub message: Option<String>,
    /// Markdown report.
    #[serde(default)]
    pub report: String,
}

fn check(status: ReplyStatus, message: Option<&str>) -> Result<()> {
    match status {
        ReplyStatus::Success => Ok(()),
        ReplyStatus::Error => Err(anyhow!(
            "backend reported an error: {}",
            message.unwrap_or("no message")
        )),
    }
}

impl IdentifyReply {
    pub fn into_result(self) -> Result<Self> {
        check(self.status, self.message.as_deref())?;
        Ok(self)
    }
}

impl RecommendReply {
    pub fn into_result(self) -> Result<Vec<Value>> {
        check(self.status, self.message.as_deref())?;
        Ok(self.data)
    }
}

impl EvaluateReply {
    pub fn into_result(self) -> Result<String> {
        check(self.status, self.message.as_deref())?;
        Ok(self.report)
    }
}
