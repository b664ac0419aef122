//! Stream orchestration: wires enabled metrics to sampling schedulers.

use std::sync::Arc;

use tracing::info;

use crate::collectors::cpu::{self, CpuLoad};
use crate::collectors::gpu::{self, GpuLoad};
use crate::collectors::network::{NetworkLoad, NetworkSampler};
use crate::collectors::ram::{self, RamLoad};
use crate::collectors::speedtest::{self, SpeedTestResult};
use crate::collectors::storage::{self, StorageLoad};
use crate::config::Config;
use crate::error::CollectorError;
use crate::probe::SystemProbe;
use crate::sampler::{start_sampling, MetricStream, OverlapPolicy, SamplerOptions};
use crate::topology::{TopologyOptions, DEFAULT_INVALID_FS_TYPES};

/// The named set of metric streams produced by the service.
///
/// Streams of disabled metrics are inert: they never emit and never
/// complete. All handles live for the process lifetime.
pub struct MetricStreams {
    pub cpu: MetricStream<CpuLoad>,
    pub ram: MetricStream<RamLoad>,
    pub storage: MetricStream<StorageLoad>,
    pub network: MetricStream<NetworkLoad>,
    pub gpu: MetricStream<GpuLoad>,
    pub speed_test: MetricStream<SpeedTestResult>,
}

/// Starts one sampling scheduler per enabled metric and returns the
/// stream set. Fails only when the static hardware layout cannot be
/// determined; individual metric failures surface later through the
/// affected stream.
pub fn start_streams(
    config: &Config,
    probe: Arc<dyn SystemProbe>,
) -> Result<MetricStreams, CollectorError> {
    let layout = Arc::new(probe.hardware_layout()?);
    info!(
        "hardware layout: {} cores / {} threads, drives: {:?}",
        layout.cores, layout.threads, layout.drives
    );

    let cpu = {
        let probe = probe.clone();
        let layout = layout.clone();
        let temps_enabled = config.enable_cpu_temps.unwrap_or(true);
        start_sampling("cpu", &config.cpu, SamplerOptions::default(), move || {
            let probe = probe.clone();
            let layout = layout.clone();
            async move { cpu::measure(probe.as_ref(), &layout, temps_enabled) }
        })
    };

    let ram = {
        let probe = probe.clone();
        start_sampling("ram", &config.ram, SamplerOptions::default(), move || {
            let probe = probe.clone();
            async move { ram::measure(probe.as_ref()) }
        })
    };

    let storage = {
        let probe = probe.clone();
        let layout = layout.clone();
        let opts = Arc::new(topology_options(config));
        start_sampling(
            "storage",
            &config.storage,
            SamplerOptions::default(),
            move || {
                let probe = probe.clone();
                let layout = layout.clone();
                let opts = opts.clone();
                async move { storage::measure(probe.as_ref(), &layout, &opts) }
            },
        )
    };

    let network = {
        let sampler = Arc::new(NetworkSampler::new(
            probe.clone(),
            config.net_interface_path.clone(),
        ));
        // Single-flight: the counter baseline must have one writer at a
        // time.
        let options = SamplerOptions {
            policy: OverlapPolicy::SingleFlight,
            eager_first_sample: true,
        };
        start_sampling("network", &config.network, options, move || {
            let sampler = sampler.clone();
            async move { sampler.measure() }
        })
    };

    let gpu = {
        let probe = probe.clone();
        start_sampling("gpu", &config.gpu, SamplerOptions::default(), move || {
            let probe = probe.clone();
            async move { gpu::measure(probe.as_ref()) }
        })
    };

    let speed_test = {
        let command = config
            .speed_test_command
            .clone()
            .unwrap_or_else(|| "speedtest".to_string());
        // No eager run: a speed test saturates the link for seconds, so
        // the first measurement waits for the first tick.
        let options = SamplerOptions {
            policy: OverlapPolicy::SingleFlight,
            eager_first_sample: false,
        };
        start_sampling("speed_test", &config.speed_test, options, move || {
            let command = command.clone();
            async move { speedtest::run(&command).await }
        })
    };

    Ok(MetricStreams {
        cpu,
        ram,
        storage,
        network,
        gpu,
        speed_test,
    })
}

/// Builds resolver options from the effective config: built-in invalid
/// filesystem types plus user additions.
fn topology_options(config: &Config) -> TopologyOptions {
    let mut invalid_fs_types = DEFAULT_INVALID_FS_TYPES.clone();
    if let Some(extra) = &config.fs_type_filter {
        invalid_fs_types.extend(extra.iter().cloned());
    }

    TopologyOptions {
        host_root: config.host_root.clone().unwrap_or_else(|| "/".to_string()),
        invalid_fs_types,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topology_options_merge_user_filter() {
        let mut config = Config::default();
        config.fs_type_filter = Some(vec!["nfs4".to_string()]);

        let opts = topology_options(&config);
        assert!(opts.invalid_fs_types.contains(&"overlay".to_string()));
        assert!(opts.invalid_fs_types.contains(&"nfs4".to_string()));
        assert_eq!(opts.host_root, "/");
    }
}
