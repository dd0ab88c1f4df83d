//! Shared context — last-seen structured values under well-known keys.
//!
//! Not authoritative state: nodes carry their own captured outputs. Specific
//! tools consult these keys as a fallback when a required argument is absent
//! (e.g. a spreadsheet builder with no explicit rows).

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

pub const LAST_EXTRACTED_ITEMS: &str = "last_extracted_items";

#[derive(Debug, Default)]
pub struct SharedContext {
    values: HashMap<String, Value>,
}

impl SharedContext {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Record extraction results after a successful tool call.
    ///
    /// An `extract_data` result whose message parses as a JSON object with
    /// `result_type == "link_list"` and an `items` array stores a cleaned
    /// `{title, url}` list; any other successful `extract_data` result clears
    /// the key. Other tools leave the context untouched.
    pub fn update_from_extraction(&mut self, tool_name: &str, message: &str) {
        if tool_name != "extract_data" {
            return;
        }

        let parsed: Option<Value> = serde_json::from_str(message).ok();
        let link_list = parsed.as_ref().and_then(|v| {
            let obj = v.as_object()?;
            if obj.get("result_type")?.as_str()? != "link_list" {
                return None;
            }
            obj.get("items")?.as_array().cloned()
        });

        match link_list {
            Some(items) => {
                let cleaned: Vec<Value> = items
                    .iter()
                    .filter_map(|item| {
                        let obj = item.as_object()?;
                        let url = obj.get("url")?.as_str()?;
                        if url.is_empty() {
                            return None;
                        }
                        let title = obj
                            .get("title")
                            .and_then(Value::as_str)
                            .unwrap_or_default();
                        Some(serde_json::json!({ "title": title, "url": url }))
                    })
                    .collect();
                debug!(count = cleaned.len(), "captured extracted link list");
                self.values
                    .insert(LAST_EXTRACTED_ITEMS.to_string(), Value::Array(cleaned));
            }
            None => {
                self.values.remove(LAST_EXTRACTED_ITEMS);
            }
        }
    }
}
