//! The closed AWS rule registry.
//!
//! Order has no semantic effect; rules run concurrently and are listed here
//! roughly by how often they surface real waste.

mod cloudwatch_retention;
mod ebs_snapshot_old;
mod ebs_unattached;
mod elastic_ip_unattached;
mod eni_detached;
mod untagged;

pub use cloudwatch_retention::CloudwatchInfiniteRetention;
pub use ebs_snapshot_old::EbsSnapshotOld;
pub use ebs_unattached::EbsUnattached;
pub use elastic_ip_unattached::ElasticIpUnattached;
pub use eni_detached::EniDetached;
pub use untagged::UntaggedResources;

use super::AwsTargetContext;
use crate::rules::{Registry, Rule};

pub fn registry() -> Registry<AwsTargetContext> {
    vec![
        Box::new(EbsUnattached) as Box<dyn Rule<AwsTargetContext>>,
        Box::new(EbsSnapshotOld),
        Box::new(CloudwatchInfiniteRetention),
        Box::new(UntaggedResources),
        Box::new(EniDetached),
        Box::new(ElasticIpUnattached),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_ids_are_unique_and_stable() {
        let registry = registry();
        let ids: Vec<&str> = registry.iter().map(|r| r.id()).collect();
        let mut deduped = ids.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(ids.len(), deduped.len(), "duplicate rule id in registry");
        assert!(ids.contains(&"aws.ebs.unattached"));
        assert!(ids.contains(&"aws.ebs.snapshot.old"));
        assert!(ids.contains(&"aws.cloudwatch.logs.infinite_retention"));
        assert!(ids.contains(&"aws.resource.untagged"));
        assert!(ids.contains(&"aws.ec2.eni.detached"));
        assert!(ids.contains(&"aws.ec2.elastic_ip.unattached"));
    }
}
