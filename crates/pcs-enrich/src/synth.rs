use serde_json::{json, Value};

use pcs_config::TargetSettings;
use pcs_schemas::RegistryRecord;

/// Minimal record for a registry entry with no corpus counterpart.
///
/// Carries no identifier; the exporter mints one. Dates, geometry and codes
/// are left to `enrich`.
pub fn synthesize(entry: &RegistryRecord, target: &TargetSettings) -> Value {
    json!({
        "type": "Feature",
        "properties": {
            "wof:name": entry.code,
            "wof:placetype": target.placetype,
            "wof:superseded_by": [],
            "wof:supersedes": [],
            "wof:breaches": [],
            "wof:tags": [],
            "wof:repo": target.repo,
            "iso:country": target.country,
            "wof:country": target.country,
            "mz:hierarchy_label": 1,
        }
    })
}
