//! The closed Azure rule registry.

mod disk_unattached;
mod public_ip_unused;
mod snapshot_old;
mod untagged;

pub use disk_unattached::DiskUnattached;
pub use public_ip_unused::PublicIpUnused;
pub use snapshot_old::SnapshotOld;
pub use untagged::UntaggedResources;

use super::AzureTargetContext;
use crate::rules::{Registry, Rule};

pub fn registry() -> Registry<AzureTargetContext> {
    vec![
        Box::new(DiskUnattached) as Box<dyn Rule<AzureTargetContext>>,
        Box::new(SnapshotOld),
        Box::new(UntaggedResources),
        Box::new(PublicIpUnused),
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
        assert!(ids.contains(&"azure.disk.unattached"));
        assert!(ids.contains(&"azure.snapshot.old"));
        assert!(ids.contains(&"azure.resource.untagged"));
        assert!(ids.contains(&"azure.public_ip.unused"));
    }
}
