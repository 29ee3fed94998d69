//! Opaque client metadata attached to published messages.

use std::collections::BTreeMap;

/// Free-form key/value metadata carried on published messages.
///
/// The core validates only that this is a JSON object and forwards it
/// untouched; keys and values are never interpreted server-side.
pub type Metadata = BTreeMap<String, serde_json::Value>;
