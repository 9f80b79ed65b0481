//! Location inference: normalise heterogeneous node labels into a canonical
//! region identifier.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Label carrying a cloud provider's own region name.
pub const LABEL_CLOUD_REGION: &str = "cloud-region";
/// Cluster-orchestration topology labels.
pub const LABEL_TOPOLOGY_REGION: &str = "topology.kubernetes.io/region";
pub const LABEL_TOPOLOGY_ZONE: &str = "topology.kubernetes.io/zone";
/// Generic region and zone labels.
pub const LABEL_REGION: &str = "region";
pub const LABEL_ZONE: &str = "zone";
/// ISO 3166 country code, mapped to a continent-level region.
pub const LABEL_COUNTRY: &str = "country";

/// Region used when no label yields anything.
pub const DEFAULT_REGION: &str = "default";

/// A derived location. Never authoritative; two locations are the same place
/// exactly when their canonical regions match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub region: String,
    pub zone: Option<String>,
    pub country: Option<String>,
    pub cloud_region: Option<String>,
    pub continent: Option<String>,
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.region == other.region
    }
}

impl Location {
    fn from_region(region: String) -> Self {
        let continent = match region_to_continent(&region) {
            "unknown" => None,
            continent => Some(continent.to_string()),
        };
        Self {
            region,
            zone: None,
            country: None,
            cloud_region: None,
            continent,
        }
    }
}

/// Infer a canonical location from a node's label map.
///
/// Precedence: explicit cloud region, topology labels, generic
/// `region`/`zone`, country code, then [`DEFAULT_REGION`].
pub fn infer_location(labels: &HashMap<String, String>) -> Location {
    if let Some(cloud_region) = non_empty(labels, LABEL_CLOUD_REGION) {
        let mut location = Location::from_region(normalize_cloud_region(cloud_region));
        location.cloud_region = Some(cloud_region.to_string());
        location.zone = non_empty(labels, LABEL_ZONE).map(str::to_string);
        return location;
    }

    if let Some(region) = non_empty(labels, LABEL_TOPOLOGY_REGION) {
        let mut location = Location::from_region(region.to_lowercase());
        location.zone = non_empty(labels, LABEL_TOPOLOGY_ZONE).map(str::to_string);
        return location;
    }

    if let Some(region) = non_empty(labels, LABEL_REGION) {
        let mut location = Location::from_region(region.to_lowercase());
        location.zone = non_empty(labels, LABEL_ZONE).map(str::to_string);
        return location;
    }

    if let Some(country) = non_empty(labels, LABEL_COUNTRY) {
        if let Some(region) = country_to_region(country) {
            let mut location = Location::from_region(region.to_string());
            location.country = Some(country.to_lowercase());
            return location;
        }
    }

    Location::from_region(DEFAULT_REGION.to_string())
}

/// Continent lookup over a fixed table.
pub fn region_to_continent(region: &str) -> &'static str {
    let region = region.to_lowercase();
    if region.starts_with("us-") || region == "north-america" {
        "north-america"
    } else if region.starts_with("eu-") || region == "europe" {
        "europe"
    } else if region.starts_with("asia-") || region == "asia" {
        "asia"
    } else if region.starts_with("south-america") {
        "south-america"
    } else {
        "unknown"
    }
}

/// Collapse a provider's full region name into the canonical coarse region.
/// Unknown names fall back to stripping a trailing numeric suffix.
fn normalize_cloud_region(cloud_region: &str) -> String {
    let region = cloud_region.to_lowercase();
    match region.as_str() {
        "us-east-1" | "us-east-2" | "eastus" | "eastus2" | "us-east1" | "us-east4" => {
            "us-east".to_string()
        }
        "us-west-1" | "us-west-2" | "westus" | "westus2" | "westus3" | "us-west1" | "us-west2" => {
            "us-west".to_string()
        }
        "eu-west-1" | "eu-west-2" | "eu-west-3" | "westeurope" | "europe-west1"
        | "europe-west2" | "europe-west4" => "eu-west".to_string(),
        "eu-central-1" | "eu-central-2" | "germanywestcentral" | "europe-central2" => {
            "eu-central".to_string()
        }
        "ap-east-1" | "ap-northeast-1" | "ap-northeast-2" | "ap-southeast-1" | "eastasia"
        | "japaneast" | "asia-east1" | "asia-east2" | "asia-northeast1" | "asia-southeast1" => {
            "asia-east".to_string()
        }
        "ap-south-1" | "centralindia" | "asia-south1" => "asia-south".to_string(),
        "sa-east-1" | "brazilsouth" | "southamerica-east1" => "south-america".to_string(),
        _ => {
            let trimmed = region
                .trim_end_matches(|c: char| c.is_ascii_digit())
                .trim_end_matches('-');
            if trimmed.is_empty() {
                region.clone()
            } else {
                trimmed.to_string()
            }
        }
    }
}

/// Closed country-code table to a continent-level region.
fn country_to_region(country: &str) -> Option<&'static str> {
    let region = match country.to_lowercase().as_str() {
        "us" | "ca" | "mx" => "north-america",
        "gb" | "ie" | "fr" | "de" | "nl" | "be" | "es" | "pt" | "it" | "ch" | "at" | "pl"
        | "se" | "no" | "dk" | "fi" => "europe",
        "jp" | "kr" | "cn" | "tw" | "hk" | "sg" | "in" | "id" | "th" | "vn" | "my" => "asia",
        "br" | "ar" | "cl" | "co" | "pe" | "uy" => "south-america",
        _ => return None,
    };
    Some(region)
}

fn non_empty<'a>(labels: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    labels
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn cloud_region_wins_over_everything() {
        let location = infer_location(&labels(&[
            (LABEL_CLOUD_REGION, "us-east-1"),
            (LABEL_TOPOLOGY_REGION, "eu-west"),
            (LABEL_REGION, "asia-east"),
        ]));
        assert_eq!(location.region, "us-east");
        assert_eq!(location.cloud_region.as_deref(), Some("us-east-1"));
        assert_eq!(location.continent.as_deref(), Some("north-america"));
    }

    #[test]
    fn topology_labels_come_second() {
        let location = infer_location(&labels(&[
            (LABEL_TOPOLOGY_REGION, "eu-west"),
            (LABEL_TOPOLOGY_ZONE, "eu-west-1b"),
            (LABEL_REGION, "asia-east"),
        ]));
        assert_eq!(location.region, "eu-west");
        assert_eq!(location.zone.as_deref(), Some("eu-west-1b"));
    }

    #[test]
    fn generic_region_and_zone_pair() {
        let location = infer_location(&labels(&[(LABEL_REGION, "US-East"), (LABEL_ZONE, "a")]));
        assert_eq!(location.region, "us-east");
        assert_eq!(location.zone.as_deref(), Some("a"));
    }

    #[test]
    fn country_maps_through_the_closed_table() {
        let location = infer_location(&labels(&[(LABEL_COUNTRY, "DE")]));
        assert_eq!(location.region, "europe");
        assert_eq!(location.country.as_deref(), Some("de"));

        let unknown = infer_location(&labels(&[(LABEL_COUNTRY, "zz")]));
        assert_eq!(unknown.region, DEFAULT_REGION);
    }

    #[test]
    fn empty_labels_fall_back_to_default() {
        let location = infer_location(&HashMap::new());
        assert_eq!(location.region, DEFAULT_REGION);
        assert!(location.continent.is_none());
    }

    #[test]
    fn blank_values_are_skipped() {
        let location = infer_location(&labels(&[
            (LABEL_CLOUD_REGION, "  "),
            (LABEL_REGION, "eu-west"),
        ]));
        assert_eq!(location.region, "eu-west");
    }

    #[test]
    fn continent_table_is_closed() {
        assert_eq!(region_to_continent("us-east"), "north-america");
        assert_eq!(region_to_continent("eu-west"), "europe");
        assert_eq!(region_to_continent("asia-east"), "asia");
        assert_eq!(region_to_continent("south-america"), "south-america");
        assert_eq!(region_to_continent("mars-base"), "unknown");
    }

    #[test]
    fn location_equality_is_by_region() {
        let a = infer_location(&labels(&[(LABEL_CLOUD_REGION, "us-east-1")]));
        let b = infer_location(&labels(&[(LABEL_REGION, "us-east")]));
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_provider_names_strip_numeric_suffixes() {
        let location = infer_location(&labels(&[(LABEL_CLOUD_REGION, "nowhere-north7")]));
        assert_eq!(location.region, "nowhere-north");
    }
}
