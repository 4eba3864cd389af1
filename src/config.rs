//! Topology configuration.
//!
//! Immutable after construction; shared across modules via `Arc`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{MachineId, RegionId, MAX_MACHINES};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub num_replicas: u32,
    pub num_partitions: u32,
    /// Partition that runs the multi-home orderer in every region.
    #[serde(default)]
    pub leader_partition_for_multi_home_ordering: u32,
    /// Per-region ranking of the remote regions by proximity. Indexed by
    /// region; empty when no ranking is configured.
    #[serde(default)]
    pub distance_ranking: Vec<Vec<RegionId>>,
    #[serde(default)]
    pub partitioning_mode: PartitioningMode,
    /// Period of the multi-home batch-cutting tick.
    #[serde(default = "default_mh_tick_ms")]
    pub mh_orderer_tick_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitioningMode {
    #[default]
    Simple,
    Hash,
}

fn default_mh_tick_ms() -> u64 {
    10
}

impl Config {
    pub fn new(num_replicas: u32, num_partitions: u32) -> Self {
        Self {
            num_replicas,
            num_partitions,
            leader_partition_for_multi_home_ordering: 0,
            distance_ranking: Vec::new(),
            partitioning_mode: PartitioningMode::Simple,
            mh_orderer_tick_ms: default_mh_tick_ms(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_replicas == 0 || self.num_partitions == 0 {
            return Err(ConfigError::EmptyTopology);
        }
        let machines = u64::from(self.num_replicas) * u64::from(self.num_partitions);
        if machines > MAX_MACHINES {
            return Err(ConfigError::TooManyMachines {
                machines,
                max: MAX_MACHINES,
            });
        }
        if self.leader_partition_for_multi_home_ordering >= self.num_partitions {
            return Err(ConfigError::LeaderPartitionOutOfRange {
                partition: self.leader_partition_for_multi_home_ordering,
                num_partitions: self.num_partitions,
            });
        }
        if !self.distance_ranking.is_empty() {
            if self.distance_ranking.len() != self.num_replicas as usize {
                return Err(ConfigError::DistanceRankingShape {
                    regions: self.distance_ranking.len(),
                    num_replicas: self.num_replicas,
                });
            }
            for (region, ranking) in self.distance_ranking.iter().enumerate() {
                for &remote in ranking {
                    if remote >= self.num_replicas || remote == region as RegionId {
                        return Err(ConfigError::DistanceRankingEntry {
                            region: region as RegionId,
                            remote,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn num_machines(&self) -> u32 {
        self.num_replicas * self.num_partitions
    }

    /// Pack `(replica, partition)` into a machine id.
    ///
    /// Out-of-range coordinates are a topology bug; fail fast.
    pub fn make_machine_id(&self, replica: u32, partition: u32) -> MachineId {
        assert!(
            replica < self.num_replicas && partition < self.num_partitions,
            "machine ({replica}, {partition}) outside topology {}x{}",
            self.num_replicas,
            self.num_partitions,
        );
        MachineId::new(replica * self.num_partitions + partition)
    }

    /// Recover `(replica, partition)` from a machine id.
    pub fn unpack_machine_id(&self, machine: MachineId) -> (u32, u32) {
        let raw = machine.raw();
        assert!(
            raw < self.num_machines(),
            "machine {raw} outside topology {}x{}",
            self.num_replicas,
            self.num_partitions,
        );
        (raw / self.num_partitions, raw % self.num_partitions)
    }

    /// Remote regions ordered by proximity to `region`; empty when no
    /// ranking is configured.
    pub fn distance_ranking_from(&self, region: RegionId) -> &[RegionId] {
        self.distance_ranking
            .get(region as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("topology must have at least one replica and one partition")]
    EmptyTopology,

    #[error("topology has {machines} machines, more than the supported {max}")]
    TooManyMachines { machines: u64, max: u64 },

    #[error("multi-home ordering leader partition {partition} outside 0..{num_partitions}")]
    LeaderPartitionOutOfRange { partition: u32, num_partitions: u32 },

    #[error("distance ranking covers {regions} regions but topology has {num_replicas}")]
    DistanceRankingShape { regions: usize, num_replicas: u32 },

    #[error("distance ranking for region {region} names invalid region {remote}")]
    DistanceRankingEntry { region: RegionId, remote: RegionId },

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn machine_id_round_trip() {
        let config = Config::new(3, 4);
        for replica in 0..3 {
            for partition in 0..4 {
                let machine = config.make_machine_id(replica, partition);
                assert_eq!(config.unpack_machine_id(machine), (replica, partition));
            }
        }
        assert_eq!(config.make_machine_id(2, 3).raw(), 11);
    }

    #[test]
    #[should_panic(expected = "outside topology")]
    fn machine_id_rejects_out_of_range_partition() {
        Config::new(2, 2).make_machine_id(0, 2);
    }

    #[test]
    fn validate_rejects_bad_leader_partition() {
        let mut config = Config::new(2, 2);
        config.leader_partition_for_multi_home_ordering = 2;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::LeaderPartitionOutOfRange { partition: 2, .. })
        ));
    }

    #[test]
    fn validate_rejects_bad_distance_ranking() {
        let mut config = Config::new(2, 1);
        config.distance_ranking = vec![vec![1]];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DistanceRankingShape { regions: 1, .. })
        ));

        config.distance_ranking = vec![vec![1], vec![2]];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DistanceRankingEntry {
                region: 1,
                remote: 2
            })
        ));
    }

    #[test]
    fn distance_ranking_lookup() {
        let mut config = Config::new(3, 1);
        config.distance_ranking = vec![vec![1, 2], vec![0, 2], vec![1, 0]];
        config.validate().unwrap();
        assert_eq!(config.distance_ranking_from(2), &[1, 0]);
        assert_eq!(Config::new(2, 1).distance_ranking_from(0), &[] as &[u32]);
    }

    #[test]
    fn toml_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ordlog.toml");
        let mut config = Config::new(3, 2);
        config.leader_partition_for_multi_home_ordering = 1;
        config.distance_ranking = vec![vec![1, 2], vec![0, 2], vec![1, 0]];
        config.partitioning_mode = PartitioningMode::Hash;
        config.mh_orderer_tick_ms = 25;

        let rendered = toml::to_string(&config).expect("render config");
        std::fs::write(&path, rendered).expect("write config");

        let loaded = load(&path).expect("load config");
        assert_eq!(loaded.num_replicas, 3);
        assert_eq!(loaded.num_partitions, 2);
        assert_eq!(loaded.leader_partition_for_multi_home_ordering, 1);
        assert_eq!(loaded.partitioning_mode, PartitioningMode::Hash);
        assert_eq!(loaded.mh_orderer_tick_ms, 25);
        assert_eq!(loaded.distance_ranking_from(0), &[1, 2]);
    }

    #[test]
    fn load_applies_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ordlog.toml");
        std::fs::write(&path, "num_replicas = 2\nnum_partitions = 1\n").expect("write config");

        let loaded = load(&path).expect("load config");
        assert_eq!(loaded.leader_partition_for_multi_home_ordering, 0);
        assert_eq!(loaded.partitioning_mode, PartitioningMode::Simple);
        assert_eq!(loaded.mh_orderer_tick_ms, 10);
        assert!(loaded.distance_ranking.is_empty());
    }
}
