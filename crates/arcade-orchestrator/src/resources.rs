//! Container resource requests and limits from configuration.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use arcade_core::config::ResourcesConfig;

pub(crate) fn requirements(config: &ResourcesConfig) -> ResourceRequirements {
    let pair = |cpu: &str, memory: &str| {
        BTreeMap::from([
            ("cpu".to_string(), Quantity(cpu.to_string())),
            ("memory".to_string(), Quantity(memory.to_string())),
        ])
    };
    ResourceRequirements {
        requests: Some(pair(&config.cpu_request, &config.memory_request)),
        limits: Some(pair(&config.cpu_limit, &config.memory_limit)),
        ..ResourceRequirements::default()
    }
}
