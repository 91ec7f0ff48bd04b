//! Diff calculation between stored objects and freshly discovered assets.
//!
//! Objects are matched by file name. A same-named pair is unchanged only when
//! the byte sizes are equal; size is the sole equality check, so two
//! different images of identical size are treated as unchanged. A changed
//! asset is re-uploaded under the same key, overwriting the old object.
//! Stored objects whose name no longer appears in the discovered set are
//! deleted.

use std::collections::{HashMap, HashSet};

use crate::models::{DiscoveredAsset, StoredObject};

/// Add/update/delete plan for one target folder.
#[derive(Debug, Clone, Default)]
pub struct DiffPlan<'a> {
    /// New or changed assets
    pub to_upload: Vec<&'a DiscoveredAsset>,
    /// Stored objects with no discovered counterpart
    pub to_delete: Vec<&'a StoredObject>,
    /// File names present on both sides with equal size
    pub unchanged: Vec<&'a str>,
}

impl DiffPlan<'_> {
    /// Check if there are any changes.
    pub fn has_changes(&self) -> bool {
        !self.to_upload.is_empty() || !self.to_delete.is_empty()
    }

    /// Get the total number of changes.
    pub fn change_count(&self) -> usize {
        self.to_upload.len() + self.to_delete.len()
    }
}

/// Compute the plan that makes `existing` mirror `discovered`.
///
/// Discovered assets sharing a file name are collapsed to the first one, so
/// applying the plan and diffing again always yields an empty plan.
pub fn compute_diff<'a>(
    existing: &'a [StoredObject],
    discovered: &'a [DiscoveredAsset],
) -> DiffPlan<'a> {
    let existing_by_name: HashMap<&str, u64> = existing
        .iter()
        .map(|o| (o.file_name(), o.byte_size))
        .collect();

    let mut plan = DiffPlan::default();
    let mut discovered_names: HashSet<&str> = HashSet::new();

    for asset in discovered {
        let name = asset.file_name.as_str();
        if !discovered_names.insert(name) {
            continue;
        }
        match existing_by_name.get(name) {
            Some(&size) if size == asset.byte_size => plan.unchanged.push(name),
            _ => plan.to_upload.push(asset),
        }
    }

    plan.to_delete = existing
        .iter()
        .filter(|o| !discovered_names.contains(o.file_name()))
        .collect();

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn asset(name: &str, size: usize) -> DiscoveredAsset {
        DiscoveredAsset {
            url: format!("https://akimages.shoplocal.com/1200.0.90.0/{}", name),
            file_name: name.to_string(),
            byte_size: size as u64,
            content_type: "image/jpeg".to_string(),
            bytes: vec![0; size],
        }
    }

    fn stored(name: &str, size: u64) -> StoredObject {
        StoredObject::new(format!("aldi/1/{}", name), size)
    }

    /// Storage state after applying `plan` to `existing`.
    fn apply(existing: &[StoredObject], plan: &DiffPlan<'_>) -> Vec<StoredObject> {
        let deleted: HashSet<&str> = plan.to_delete.iter().map(|o| o.key.as_str()).collect();
        let mut state: HashMap<String, u64> = existing
            .iter()
            .filter(|o| !deleted.contains(o.key.as_str()))
            .map(|o| (o.key.clone(), o.byte_size))
            .collect();
        for a in &plan.to_upload {
            state.insert(format!("aldi/1/{}", a.file_name), a.byte_size);
        }
        state
            .into_iter()
            .map(|(key, size)| StoredObject::new(key, size))
            .collect()
    }

    #[test]
    fn test_add_keep_delete_scenario() {
        let existing = vec![stored("a.jpg", 100), stored("b.jpg", 50)];
        let discovered = vec![asset("a.jpg", 100), asset("c.jpg", 30)];

        let plan = compute_diff(&existing, &discovered);
        let uploads: Vec<&str> = plan.to_upload.iter().map(|a| a.file_name.as_str()).collect();
        let deletes: Vec<&str> = plan.to_delete.iter().map(|o| o.file_name()).collect();

        assert_eq!(uploads, vec!["c.jpg"]);
        assert_eq!(deletes, vec!["b.jpg"]);
        assert_eq!(plan.unchanged, vec!["a.jpg"]);
    }

    #[test]
    fn test_size_change_uploads_without_delete() {
        let existing = vec![stored("a.jpg", 100)];
        let discovered = vec![asset("a.jpg", 101)];

        let plan = compute_diff(&existing, &discovered);
        assert_eq!(plan.to_upload.len(), 1);
        assert!(plan.to_delete.is_empty());
    }

    #[test]
    fn test_same_size_is_unchanged() {
        // Byte size is the only equality signal.
        let existing = vec![stored("a.jpg", 100)];
        let mut different = asset("a.jpg", 100);
        different.bytes = vec![7; 100];

        let plan = compute_diff(&existing, std::slice::from_ref(&different));
        assert!(!plan.has_changes());
    }

    #[test]
    fn test_empty_to_full_and_back() {
        let discovered = vec![asset("a.jpg", 1), asset("b.jpg", 2)];
        let plan = compute_diff(&[], &discovered);
        assert_eq!(plan.to_upload.len(), 2);
        assert!(plan.to_delete.is_empty());

        let existing = vec![stored("a.jpg", 1)];
        let plan = compute_diff(&existing, &[]);
        assert_eq!(plan.change_count(), 1);
        assert_eq!(plan.to_delete[0].key, "aldi/1/a.jpg");
    }

    #[test]
    fn test_duplicate_discovered_names_collapse() {
        let discovered = vec![asset("a.jpg", 10), asset("a.jpg", 20)];
        let plan = compute_diff(&[], &discovered);
        assert_eq!(plan.to_upload.len(), 1);
        assert_eq!(plan.to_upload[0].byte_size, 10);
    }

    proptest! {
        #[test]
        fn prop_diff_is_idempotent(
            existing in prop::collection::btree_map("[a-e]\\.jpg", 0u64..4, 0..6),
            discovered in prop::collection::vec(("[a-g]\\.jpg", 0usize..4), 0..8),
        ) {
            let existing: Vec<StoredObject> = existing
                .into_iter()
                .map(|(name, size)| stored(&name, size))
                .collect();
            let discovered: Vec<DiscoveredAsset> = discovered
                .iter()
                .map(|(name, size)| asset(name, *size))
                .collect();

            let plan = compute_diff(&existing, &discovered);
            let after = apply(&existing, &plan);
            let replay = compute_diff(&after, &discovered);

            prop_assert!(!replay.has_changes());
        }
    }
}
