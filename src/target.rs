//! Expected completion of a run: total packets and the time it should take.

use std::time::Duration;

use crate::model::{Config, Flow};

/// Aggregate target across all flows of a config. Computed once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Target {
    /// Sum of fixed packet counts of all flows.
    pub tx_packets: u64,
    /// Time the slowest rate-bearing flow needs to finish.
    pub eta: Duration,
}

impl Target {
    pub fn from_config(config: &Config) -> Self {
        config.flows.iter().fold(Self::default(), |acc, flow| Self {
            tx_packets: acc.tx_packets.saturating_add(flow.packet_count()),
            eta: flow_eta(flow).map_or(acc.eta, |eta| eta.max(acc.eta)),
        })
    }
}

/// Whole seconds needed to send a flow at its rate, `None` without a rate.
pub fn flow_eta(flow: &Flow) -> Option<Duration> {
    match flow.rate_pps() {
        0 => None,
        pps => Some(Duration::from_secs(flow.packet_count() / pps)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FixedPackets, FlowDuration, FlowRate};

    fn flow(name: &str, packets: Option<u64>, pps: Option<u64>) -> Flow {
        Flow {
            name: name.to_string(),
            rate: pps.map(|pps| FlowRate {
                pps: Some(pps),
                ..Default::default()
            }),
            duration: packets.map(|packets| FlowDuration {
                fixed_packets: Some(FixedPackets {
                    packets: Some(packets),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn config(flows: Vec<Flow>) -> Config {
        Config {
            flows,
            ..Default::default()
        }
    }

    #[test]
    fn test_two_flows_same_eta() {
        let target = Target::from_config(&config(vec![
            flow("f1", Some(1000), Some(100)),
            flow("f2", Some(500), Some(50)),
        ]));
        assert_eq!(target.tx_packets, 1500);
        assert_eq!(target.eta, Duration::from_secs(10));
    }

    #[test]
    fn test_eta_is_slowest_flow() {
        let target = Target::from_config(&config(vec![
            flow("fast", Some(1000), Some(1000)),
            flow("slow", Some(300), Some(10)),
            flow("medium", Some(500), Some(100)),
        ]));
        assert_eq!(target.tx_packets, 1800);
        assert_eq!(target.eta, Duration::from_secs(30));
    }

    #[test]
    fn test_rate_zero_flows_only_count() {
        let target = Target::from_config(&config(vec![
            flow("f1", Some(700), Some(0)),
            flow("f2", Some(300), None),
        ]));
        assert_eq!(target.tx_packets, 1000);
        assert_eq!(target.eta, Duration::ZERO);
    }

    #[test]
    fn test_rate_zero_flow_does_not_reset_eta() {
        let target = Target::from_config(&config(vec![
            flow("timed", Some(1000), Some(100)),
            flow("untimed", Some(50), Some(0)),
        ]));
        assert_eq!(target.tx_packets, 1050);
        assert_eq!(target.eta, Duration::from_secs(10));
    }

    #[test]
    fn test_eta_rounds_down() {
        assert_eq!(
            flow_eta(&flow("f1", Some(1099), Some(100))),
            Some(Duration::from_secs(10))
        );
        assert_eq!(
            flow_eta(&flow("f1", Some(99), Some(100))),
            Some(Duration::ZERO)
        );
        assert_eq!(flow_eta(&flow("f1", Some(99), None)), None);
    }

    #[test]
    fn test_empty_config() {
        assert_eq!(Target::from_config(&Config::default()), Target::default());
        let target = Target::from_config(&config(vec![flow("bare", None, None)]));
        assert_eq!(target, Target::default());
    }
}
