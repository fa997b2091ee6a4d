//! Request extractors whose rejections render as error envelopes.

mod enhanced_json;
mod enhanced_query;
mod validated_json;

pub use self::enhanced_json::Json;
pub use self::enhanced_query::Query;
pub use self::validated_json::ValidateJson;
