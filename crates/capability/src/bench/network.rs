//! Network benchmark: static base plus a bonus per link speed class.

use crate::probe::SystemProbe;
use crate::types::MAX_SCORE;

const BASE_SCORE: u32 = 100;

/// Read the fastest interface speed and score it.
pub async fn run_network_benchmark(probe: &dyn SystemProbe) -> u32 {
    let interfaces = probe.network_interfaces();
    let speed =
        crate::network::detect_link_speed(probe, interfaces.iter().map(|i| i.name.as_str())).await;
    score_network(speed)
}

/// Speed-class bonus on top of the base score.
pub fn score_network(bandwidth_mbps: Option<u64>) -> u32 {
    let bonus = match bandwidth_mbps.unwrap_or(0) {
        s if s >= 100_000 => 900,
        s if s >= 40_000 => 700,
        s if s >= 10_000 => 500,
        s if s >= 1_000 => 300,
        s if s >= 100 => 100,
        _ => 0,
    };
    (BASE_SCORE + bonus).min(MAX_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_classes_are_monotonic() {
        let speeds = [None, Some(10), Some(100), Some(1_000), Some(10_000), Some(40_000), Some(100_000)];
        let scores: Vec<u32> = speeds.iter().map(|s| score_network(*s)).collect();
        for pair in scores.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert_eq!(score_network(None), BASE_SCORE);
        assert!(score_network(Some(400_000)) <= MAX_SCORE);
    }
}
