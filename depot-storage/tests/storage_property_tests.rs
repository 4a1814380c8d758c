//! Property-Based Tests for the Storage Adapter
//!
//! For any set of component directories, listing returns exactly their
//! names; for any page size, deletion removes every key under the prefix
//! and nothing else; for any base content, an append produces
//! `base + "\n" + message`.

use std::collections::BTreeSet;
use std::sync::Arc;

use depot_storage::UpdateLog;
use depot_test_utils::fixtures::{mock_adapter, mock_adapter_with, test_config, TEST_BUCKET};
use depot_test_utils::generators::*;
use depot_test_utils::MockObjectStore;
use proptest::prelude::*;
use tokio::runtime::Runtime;

fn test_runtime() -> Result<Runtime, TestCaseError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_listing_returns_every_component(
        names in arb_component_names(12),
        version in arb_version(),
    ) {
        let rt = test_runtime()?;
        let (store, adapter) = mock_adapter();
        for name in &names {
            store.insert(format!("components/{}/{}/package.json", name, version), "{}");
        }
        store.insert("components/components.json", "{}");

        let listed = rt
            .block_on(adapter.list_sub_directories("components"))
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        let expected: BTreeSet<&str> = names.iter().map(String::as_str).collect();
        let actual: BTreeSet<&str> = listed.iter().map(String::as_str).collect();
        prop_assert_eq!(listed.len(), names.len());
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn prop_delete_directory_removes_exactly_the_prefix(
        file_count in 0usize..40,
        page_size in 1usize..8,
        name in arb_component_name(),
    ) {
        let rt = test_runtime()?;
        let store = MockObjectStore::new(TEST_BUCKET).with_page_size(page_size);
        for i in 0..file_count {
            store.insert(format!("components/{}/1.0.0/f{:03}.js", name, i), "x");
        }
        store.insert(format!("components/{}/2.0.0/keep.js", name), "x");
        let (store, adapter) = mock_adapter_with(store, &test_config());

        let prefix = format!("components/{}/1.0.0/", name);
        let deleted = rt
            .block_on(adapter.delete_directory(&prefix))
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert_eq!(deleted, file_count);
        prop_assert_eq!(store.len(), 1);
        let batches = store.delete_batches();
        prop_assert!(batches.iter().all(|&size| size >= 1 && size <= page_size));
        prop_assert_eq!(batches.iter().sum::<usize>(), file_count);
    }

    #[test]
    fn prop_log_appends_one_line(
        base in "[ -~]{0,60}",
        message in arb_log_message(),
    ) {
        let rt = test_runtime()?;
        let (store, adapter) = mock_adapter();
        store.insert("components/update.log", base.clone());
        let log = UpdateLog::for_adapter(Arc::new(adapter));

        rt.block_on(log.log(&message))
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        let expected = format!("{}\n{}", base, message);
        prop_assert_eq!(store.text("components/update.log"), Some(expected));
    }

    #[test]
    fn prop_uploaded_content_is_served_back(
        key in arb_object_key(),
        body in "[ -~]{0,200}",
    ) {
        let rt = test_runtime()?;
        let (_, adapter) = mock_adapter();

        let served = rt.block_on(async {
            adapter.put_file_content(body.clone(), &key, false).await?;
            adapter.get_file(&key, false).await
        })
        .map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert_eq!(served, body);
    }
}
