//! Network attribute detection: interfaces, link speed, cloud metadata.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::probe::SystemProbe;
use crate::types::NetworkAttributes;

const AWS_REGION_URL: &str = "http://169.254.169.254/latest/meta-data/placement/region";
const AWS_ZONE_URL: &str = "http://169.254.169.254/latest/meta-data/placement/availability-zone";
const AWS_PUBLIC_IP_URL: &str = "http://169.254.169.254/latest/meta-data/public-ipv4";

const GCP_ZONE_URL: &str = "http://metadata.google.internal/computeMetadata/v1/instance/zone";
const GCP_PUBLIC_IP_URL: &str = "http://metadata.google.internal/computeMetadata/v1/instance/network-interfaces/0/access-configs/0/external-ip";
const GCP_HEADER: (&str, &str) = ("Metadata-Flavor", "Google");

const AZURE_LOCATION_URL: &str =
    "http://169.254.169.254/metadata/instance/compute/location?api-version=2021-02-01&format=text";
const AZURE_ZONE_URL: &str =
    "http://169.254.169.254/metadata/instance/compute/zone?api-version=2021-02-01&format=text";
const AZURE_HEADER: (&str, &str) = ("Metadata", "true");

/// Detect the node's network posture. Metadata endpoints refusing to answer
/// is the normal case off-cloud and yields empty fields, not an error.
pub async fn detect_network(probe: &dyn SystemProbe, deadline: Duration) -> NetworkAttributes {
    let mut attrs = NetworkAttributes::default();

    let interfaces = probe.network_interfaces();
    for interface in &interfaces {
        for addr in &interface.addresses {
            if addr.is_loopback() {
                continue;
            }
            match addr {
                IpAddr::V4(v4) => attrs.private_ips.push(v4.to_string()),
                IpAddr::V6(v6) => {
                    if !v6.is_unspecified() {
                        attrs.ipv6_supported = true;
                    }
                }
            }
        }
    }

    attrs.bandwidth_mbps = detect_link_speed(probe, interfaces.iter().map(|i| i.name.as_str())).await;

    // Metadata calls are bounded well below the overall deadline
    let metadata_timeout = deadline.min(Duration::from_secs(2));
    if let Some(metadata) = detect_cloud_metadata(probe, metadata_timeout).await {
        attrs.region = metadata.region;
        attrs.zone = metadata.zone;
        attrs.public_ip = metadata.public_ip;
    }

    if let Some(public_ip) = &attrs.public_ip {
        attrs.behind_nat = !attrs.private_ips.contains(public_ip);
    }

    attrs
}

/// Highest reported link speed in Mbps across physical interfaces.
pub(crate) async fn detect_link_speed<'a>(
    probe: &dyn SystemProbe,
    names: impl Iterator<Item = &'a str>,
) -> Option<u64> {
    let mut best: Option<u64> = None;
    for name in names {
        let path = PathBuf::from(format!("/sys/class/net/{name}/speed"));
        let Ok(bytes) = probe.read_file(&path).await else {
            continue;
        };
        // Down links report -1
        if let Ok(speed) = String::from_utf8_lossy(&bytes).trim().parse::<i64>() {
            if speed > 0 {
                best = Some(best.map_or(speed as u64, |b| b.max(speed as u64)));
            }
        }
    }
    best
}

struct CloudMetadata {
    region: Option<String>,
    zone: Option<String>,
    public_ip: Option<String>,
}

/// Query AWS, GCP and Azure metadata endpoints in turn. All three being
/// unreachable is not an error.
async fn detect_cloud_metadata(probe: &dyn SystemProbe, timeout: Duration) -> Option<CloudMetadata> {
    if let Some(metadata) = detect_aws(probe, timeout).await {
        return Some(metadata);
    }
    if let Some(metadata) = detect_gcp(probe, timeout).await {
        return Some(metadata);
    }
    detect_azure(probe, timeout).await
}

async fn detect_aws(probe: &dyn SystemProbe, timeout: Duration) -> Option<CloudMetadata> {
    let region = fetch_text(probe, AWS_REGION_URL, &[], timeout).await?;
    debug!("AWS metadata region: {region}");
    Some(CloudMetadata {
        region: Some(region),
        zone: fetch_text(probe, AWS_ZONE_URL, &[], timeout).await,
        public_ip: fetch_text(probe, AWS_PUBLIC_IP_URL, &[], timeout).await,
    })
}

async fn detect_gcp(probe: &dyn SystemProbe, timeout: Duration) -> Option<CloudMetadata> {
    let zone_path = fetch_text(probe, GCP_ZONE_URL, &[GCP_HEADER], timeout).await?;
    // Reported as projects/<num>/zones/<zone>
    let zone = zone_path.rsplit('/').next().unwrap_or(&zone_path).to_string();
    let region = zone
        .rsplit_once('-')
        .map(|(region, _)| region.to_string())
        .unwrap_or_else(|| zone.clone());
    debug!("GCP metadata zone: {zone}");
    Some(CloudMetadata {
        region: Some(region),
        zone: Some(zone),
        public_ip: fetch_text(probe, GCP_PUBLIC_IP_URL, &[GCP_HEADER], timeout).await,
    })
}

async fn detect_azure(probe: &dyn SystemProbe, timeout: Duration) -> Option<CloudMetadata> {
    let location = fetch_text(probe, AZURE_LOCATION_URL, &[AZURE_HEADER], timeout).await?;
    debug!("Azure metadata location: {location}");
    Some(CloudMetadata {
        region: Some(location),
        zone: fetch_text(probe, AZURE_ZONE_URL, &[AZURE_HEADER], timeout).await,
        public_ip: None,
    })
}

async fn fetch_text(
    probe: &dyn SystemProbe,
    url: &str,
    headers: &[(&str, &str)],
    timeout: Duration,
) -> Option<String> {
    let bytes = probe.http_get(url, headers, timeout).await.ok()?;
    let text = String::from_utf8_lossy(&bytes).trim().to_string();
    if text.is_empty() { None } else { Some(text) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeProbe;

    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    const DEADLINE: Duration = Duration::from_secs(5);

    fn v4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(a, b, c, d))
    }

    #[tokio::test]
    async fn interfaces_feed_private_ips_and_ipv6() {
        let probe = FakeProbe::new()
            .with_interface("lo", &[v4(127, 0, 0, 1)])
            .with_interface(
                "eth0",
                &[
                    v4(10, 0, 0, 5),
                    IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)),
                ],
            );

        let attrs = detect_network(&probe, DEADLINE).await;
        assert_eq!(attrs.private_ips, vec!["10.0.0.5"]);
        assert!(attrs.ipv6_supported);
        assert!(attrs.region.is_none());
        assert!(!attrs.behind_nat);
    }

    #[tokio::test]
    async fn link_speed_takes_the_fastest_interface() {
        let probe = FakeProbe::new()
            .with_interface("eth0", &[v4(10, 0, 0, 5)])
            .with_interface("eth1", &[v4(10, 0, 1, 5)])
            .with_file("/sys/class/net/eth0/speed", "1000\n")
            .with_file("/sys/class/net/eth1/speed", "25000\n");

        let attrs = detect_network(&probe, DEADLINE).await;
        assert_eq!(attrs.bandwidth_mbps, Some(25000));
    }

    #[tokio::test]
    async fn down_links_are_ignored() {
        let probe = FakeProbe::new()
            .with_interface("eth0", &[v4(10, 0, 0, 5)])
            .with_file("/sys/class/net/eth0/speed", "-1\n");
        let attrs = detect_network(&probe, DEADLINE).await;
        assert_eq!(attrs.bandwidth_mbps, None);
    }

    #[tokio::test]
    async fn aws_metadata_sets_region_zone_and_nat() {
        let probe = FakeProbe::new()
            .with_interface("eth0", &[v4(172, 31, 4, 12)])
            .with_http(AWS_REGION_URL, "us-east-1")
            .with_http(AWS_ZONE_URL, "us-east-1a")
            .with_http(AWS_PUBLIC_IP_URL, "54.201.10.7");

        let attrs = detect_network(&probe, DEADLINE).await;
        assert_eq!(attrs.region.as_deref(), Some("us-east-1"));
        assert_eq!(attrs.zone.as_deref(), Some("us-east-1a"));
        assert_eq!(attrs.public_ip.as_deref(), Some("54.201.10.7"));
        // the public address is not bound locally
        assert!(attrs.behind_nat);
    }

    #[tokio::test]
    async fn gcp_zone_path_is_normalised() {
        let probe = FakeProbe::new()
            .with_http(GCP_ZONE_URL, "projects/1234567/zones/europe-west4-b");

        let attrs = detect_network(&probe, DEADLINE).await;
        assert_eq!(attrs.region.as_deref(), Some("europe-west4"));
        assert_eq!(attrs.zone.as_deref(), Some("europe-west4-b"));
    }

    #[tokio::test]
    async fn azure_location_is_used_when_others_refuse() {
        let probe = FakeProbe::new().with_http(AZURE_LOCATION_URL, "westeurope");
        let attrs = detect_network(&probe, DEADLINE).await;
        assert_eq!(attrs.region.as_deref(), Some("westeurope"));
    }

    #[tokio::test]
    async fn no_cloud_is_not_an_error() {
        let attrs = detect_network(&FakeProbe::new(), DEADLINE).await;
        assert!(attrs.region.is_none());
        assert!(attrs.zone.is_none());
        assert!(attrs.public_ip.is_none());
    }
}
