//! Point-in-polygon client.
//!
//! One `reqwest::Client` is built per resolver and shared by every worker, so
//! connections are pooled across records. Connect, idle and request timeouts
//! bound how long a stalled service can hold a worker.

use std::collections::BTreeMap;
use std::time::Duration;

use pcs_schemas::{Hierarchy, RegistryRecord};
use serde::Deserialize;

use crate::{HierarchyResolver, ParentResolution, ResolverError};

#[derive(Debug, Clone)]
pub struct SpatialOptions {
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub request_timeout: Duration,
    /// Idle connections kept per host; size this to the worker count.
    pub max_idle_per_host: usize,
    /// Placetypes accepted as a parent.
    pub allowed_placetypes: Vec<String>,
}

impl Default for SpatialOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(90),
            request_timeout: Duration::from_secs(60),
            max_idle_per_host: 8,
            allowed_placetypes: ["locality", "localadmin", "county", "region"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpatialResolver {
    url: String,
    http: reqwest::Client,
    allowed_placetypes: Vec<String>,
}

impl SpatialResolver {
    pub fn new(url: impl Into<String>, opts: SpatialOptions) -> Result<Self, ResolverError> {
        let url = url.into();
        let http = reqwest::Client::builder()
            .connect_timeout(opts.connect_timeout)
            .pool_idle_timeout(opts.idle_timeout)
            .pool_max_idle_per_host(opts.max_idle_per_host)
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(opts.request_timeout)
            .build()
            .map_err(|e| ResolverError::Setup {
                path: url.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            url,
            http,
            allowed_placetypes: opts.allowed_placetypes,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn point_in_polygon(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Vec<PipPlace>, ResolverError> {
        let body = serde_json::json!({
            "latitude": latitude,
            "longitude": longitude,
            "is_current": [1, -1],
        });

        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ResolverError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ResolverError::Status {
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            });
        }

        let parsed: PipResponse = resp
            .json()
            .await
            .map_err(|e| ResolverError::Decode(e.to_string()))?;

        parsed.places.into_iter().map(PipPlace::try_from).collect()
    }
}

#[async_trait::async_trait]
impl HierarchyResolver for SpatialResolver {
    fn name(&self) -> &'static str {
        "spatial"
    }

    async fn resolve_parent(
        &self,
        entry: &RegistryRecord,
    ) -> Result<Option<ParentResolution>, ResolverError> {
        let latitude = parse_coordinate(&entry.latitude)?;
        let longitude = parse_coordinate(&entry.longitude)?;

        let places = self.point_in_polygon(latitude, longitude).await?;
        let resolved = select_parent(&places, &self.allowed_placetypes);
        if resolved.is_none() {
            tracing::debug!(code = %entry.code, candidates = places.len(), "no allowed parent candidate");
        }
        Ok(resolved)
    }
}

fn parse_coordinate(raw: &str) -> Result<f64, ResolverError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| ResolverError::Decode(format!("invalid coordinate '{raw}'")))
}

/// One candidate enclosing region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipPlace {
    pub id: i64,
    pub placetype: String,
    pub hierarchy: Vec<Hierarchy>,
}

/// First candidate whose placetype is allowed becomes the parent.
///
/// The chain is the parent's own hierarchy when the service supplies one;
/// otherwise a single map of `<placetype>_id` over every returned candidate.
/// An empty or fully disallowed candidate list resolves to `None`.
pub fn select_parent(places: &[PipPlace], allowed: &[String]) -> Option<ParentResolution> {
    let parent = places
        .iter()
        .find(|p| allowed.iter().any(|a| a == &p.placetype))?;

    let hierarchy = if parent.hierarchy.is_empty() {
        let mut flat: Hierarchy = BTreeMap::new();
        for p in places {
            flat.entry(format!("{}_id", p.placetype)).or_insert(p.id);
        }
        vec![flat]
    } else {
        parent.hierarchy.clone()
    };

    Some(ParentResolution {
        parent_id: parent.id,
        hierarchy,
    })
}

#[derive(Debug, Deserialize)]
struct PipResponse {
    #[serde(default)]
    places: Vec<PipPlaceWire>,
}

#[derive(Debug, Deserialize)]
struct PipPlaceWire {
    #[serde(rename = "wof:id")]
    id: IdRepr,
    #[serde(rename = "wof:placetype")]
    placetype: String,
    #[serde(rename = "wof:hierarchy", default)]
    hierarchy: Option<Vec<Hierarchy>>,
}

/// The service reports ids as numbers or as numeric strings depending on backend.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Int(i64),
    Str(String),
}

impl TryFrom<PipPlaceWire> for PipPlace {
    type Error = ResolverError;

    fn try_from(w: PipPlaceWire) -> Result<Self, Self::Error> {
        let id = match w.id {
            IdRepr::Int(v) => v,
            IdRepr::Str(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| ResolverError::Decode(format!("non-numeric wof:id '{s}'")))?,
        };
        Ok(PipPlace {
            id,
            placetype: w.placetype,
            hierarchy: w.hierarchy.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(id: i64, pt: &str) -> PipPlace {
        PipPlace {
            id,
            placetype: pt.to_string(),
            hierarchy: Vec::new(),
        }
    }

    fn allowed() -> Vec<String> {
        SpatialOptions::default().allowed_placetypes
    }

    #[test]
    fn first_allowed_candidate_wins() {
        let places = vec![
            place(1, "neighbourhood"),
            place(2, "locality"),
            place(3, "region"),
        ];
        let r = select_parent(&places, &allowed()).unwrap();
        assert_eq!(r.parent_id, 2);
        let chain = &r.hierarchy[0];
        assert_eq!(chain.get("neighbourhood_id"), Some(&1));
        assert_eq!(chain.get("locality_id"), Some(&2));
        assert_eq!(chain.get("region_id"), Some(&3));
    }

    #[test]
    fn parent_hierarchy_preferred_when_present() {
        let mut loc = place(2, "locality");
        loc.hierarchy = vec![BTreeMap::from([
            ("locality_id".to_string(), 2),
            ("country_id".to_string(), 85633159),
        ])];
        let r = select_parent(&[place(1, "campus"), loc.clone()], &allowed()).unwrap();
        assert_eq!(r.hierarchy, loc.hierarchy);
    }

    #[test]
    fn no_allowed_candidate_is_forgiven() {
        assert!(select_parent(&[place(1, "campus")], &allowed()).is_none());
        assert!(select_parent(&[], &allowed()).is_none());
    }

    #[test]
    fn string_ids_are_parsed() {
        let w = PipPlaceWire {
            id: IdRepr::Str("101750367".to_string()),
            placetype: "locality".to_string(),
            hierarchy: None,
        };
        assert_eq!(PipPlace::try_from(w).unwrap().id, 101750367);

        let bad = PipPlaceWire {
            id: IdRepr::Str("abc".to_string()),
            placetype: "locality".to_string(),
            hierarchy: None,
        };
        assert!(PipPlace::try_from(bad).is_err());
    }
}
