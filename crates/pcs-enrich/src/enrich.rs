use serde_json::{Map, Value};
use tracing::debug;

use pcs_hierarchy::HierarchyResolver;
use pcs_schemas::{
    edtf_or_unspecified, is_specified, RegistryRecord, EDTF_UNSPECIFIED, NO_PARENT,
};

use crate::types::{EnrichError, EnrichPolicy, Placement, SRC_GEOM_UNKNOWN};

/// Prior-generation OS properties: NHS and ward geography has no counterpart
/// elsewhere in the corpus, `distict` is misspelt upstream and the county code
/// now lives under `os:county_code`.
const DEAD_OS_FIELDS: &[&str] = &[
    "os:nhs_ha_code",
    "os:nhs_regional_ha_code",
    "os:admin_distict_code",
    "os:admin_ward_code",
    "os:admin_county_code",
];

/// Apply a registry entry to a stored record.
///
/// Pure in `doc`: the input is cloned and the enriched copy returned. A
/// resolver failure returns `Err` before anything is handed back, so the
/// caller never sees a half-enriched record. With no resolver the existing
/// hierarchy is left as stored.
pub async fn enrich(
    doc: &Value,
    entry: &RegistryRecord,
    resolver: Option<&dyn HierarchyResolver>,
    policy: &EnrichPolicy,
) -> Result<Value, EnrichError> {
    let mut out = doc.clone();
    let root = out.as_object_mut().ok_or(EnrichError::NotAnObject)?;
    let placement = placement_for(entry, policy)?;

    let hierarchy = match (placement, resolver) {
        (Placement::NullIsland, _) | (_, None) => None,
        (Placement::Registry { .. }, Some(r)) => {
            let resolved = r.resolve_parent(entry).await?;
            if resolved.is_none() {
                debug!(code = %entry.code, resolver = r.name(), "no enclosing parent");
            }
            Some(resolved)
        }
    };

    let mut props = take_properties(root);
    set_geometry(root, &mut props, placement);
    set_dates(&mut props, entry);
    set_source_tag(&mut props, placement, policy);

    if placement.is_null_island() {
        props.remove("wof:hierarchy");
        props.insert("wof:parent_id".to_string(), Value::from(NO_PARENT));
    } else if let Some(resolved) = hierarchy {
        let (parent_id, chain) = match resolved {
            Some(res) => (res.parent_id, res.hierarchy),
            None => (NO_PARENT, Vec::new()),
        };
        props.insert("wof:parent_id".to_string(), Value::from(parent_id));
        let chain: Vec<Value> = chain
            .into_iter()
            .map(|h| Value::Object(h.into_iter().map(|(k, v)| (k, Value::from(v))).collect()))
            .collect();
        props.insert("wof:hierarchy".to_string(), Value::Array(chain));
    }

    set_os_codes(&mut props, entry);
    root.insert("properties".to_string(), Value::Object(props));
    Ok(out)
}

/// Decide where `entry` is placed.
pub(crate) fn placement_for(
    entry: &RegistryRecord,
    policy: &EnrichPolicy,
) -> Result<Placement, EnrichError> {
    if policy.is_restricted(&entry.code) {
        return Ok(Placement::NullIsland);
    }
    if entry.latitude.trim() == policy.sentinel_latitude {
        return Ok(Placement::NullIsland);
    }

    let parse = |field: &'static str, raw: &str| {
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| EnrichError::InvalidCoordinate {
                code: entry.code.clone(),
                field,
                raw: raw.to_string(),
            })
    };
    let latitude = parse("latitude", &entry.latitude)?;
    let longitude = parse("longitude", &entry.longitude)?;

    if latitude == 0.0 && longitude == 0.0 {
        return Ok(Placement::NullIsland);
    }
    Ok(Placement::Registry {
        latitude,
        longitude,
    })
}

/// Detach `properties`; anything that is not an object starts over empty.
fn take_properties(root: &mut Map<String, Value>) -> Map<String, Value> {
    match root.remove("properties") {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Registry dates win when published. A terminal marker already on the
/// record survives a registry entry that carries none, and either marker
/// keeps the record out of the current set.
fn set_dates(props: &mut Map<String, Value>, entry: &RegistryRecord) {
    let stored_cessation = stored_marker(props, "edtf:cessation");
    let deprecated = stored_marker(props, "edtf:deprecated").is_some();

    let inception = edtf_or_unspecified(entry.inception);
    let cessation = match (entry.cessation, stored_cessation) {
        (Some(d), _) => d.to_edtf(),
        (None, Some(stored)) => stored,
        (None, None) => EDTF_UNSPECIFIED.to_string(),
    };
    let is_current = if is_specified(Some(&cessation)) || deprecated {
        0
    } else {
        1
    };

    props.insert("edtf:inception".to_string(), Value::from(inception));
    props.insert("edtf:cessation".to_string(), Value::from(cessation));
    props.insert("mz:is_current".to_string(), Value::from(is_current));
}

fn stored_marker(props: &Map<String, Value>, key: &str) -> Option<String> {
    let value = props.get(key).and_then(Value::as_str)?;
    is_specified(Some(value)).then(|| value.to_string())
}

fn set_geometry(
    root: &mut Map<String, Value>,
    props: &mut Map<String, Value>,
    placement: Placement,
) {
    let (lat, lon) = placement.coordinates();
    let mut geometry = Map::new();
    geometry.insert("type".to_string(), Value::from("Point"));
    geometry.insert("coordinates".to_string(), Value::from(vec![lon, lat]));
    root.insert("geometry".to_string(), Value::Object(geometry));
    root.insert("bbox".to_string(), Value::from(vec![lon, lat, lon, lat]));

    props.insert("geom:latitude".to_string(), Value::from(lat));
    props.insert("geom:longitude".to_string(), Value::from(lon));
}

fn set_source_tag(props: &mut Map<String, Value>, placement: Placement, policy: &EnrichPolicy) {
    let tag = if placement.is_null_island() {
        SRC_GEOM_UNKNOWN
    } else {
        policy.source_tag.as_str()
    };
    props.insert("src:geom".to_string(), Value::from(tag));
}

fn set_os_codes(props: &mut Map<String, Value>, entry: &RegistryRecord) {
    for key in DEAD_OS_FIELDS {
        props.remove(*key);
    }
    for (key, value) in [
        ("os:country_code", &entry.country_code),
        ("os:region_code", &entry.region_code),
        ("os:district_code", &entry.district_code),
        ("os:county_code", &entry.county_code),
        ("os:positional_quality_indicator", &entry.positional_quality),
    ] {
        props.insert(key.to_string(), Value::from(value.as_str()));
    }
}
