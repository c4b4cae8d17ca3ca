//! Push-down Module Tests
//!
//! ## Test Scopes
//! - **Kernels**: Dense and sparse paths of every call shape, preconditions and narrowing.
//! - **Executor**: All-or-nothing commits, unknown partitions/rows, spec resolution.
//! - **Concurrency**: Independent partitions do not block; same-row calls serialize.

#[cfg(test)]
mod tests {
    use crate::error::PsError;
    use crate::partition::types::{ElementKind, Partition};
    use crate::psf::executor::PsfExecutor;
    use crate::psf::func::*;
    use crate::psf::registry::FuncRegistry;
    use crate::psf::update;
    use crate::store::memory::ShardStore;
    use crate::store::row::{DenseRow, RowStore, SparseRow};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    const MATRIX: u32 = 3;

    fn partition(partition_id: u32, start_col: i64, end_col: i64) -> Partition {
        Partition {
            matrix_id: MATRIX,
            partition_id,
            start_row: 0,
            end_row: 4,
            start_col,
            end_col,
        }
    }

    fn executor(kind: ElementKind, partitions: &[Partition]) -> Arc<PsfExecutor> {
        let store = ShardStore::new();
        for p in partitions {
            store.materialize(p, kind);
        }
        PsfExecutor::new(store, FuncRegistry::new())
    }

    fn dense(values: &[f64]) -> RowStore {
        RowStore::Dense(DenseRow::from_values(5, values.to_vec()))
    }

    fn sparse(entries: &[(i64, f64)]) -> RowStore {
        RowStore::Sparse(
            SparseRow::from_entries(0, 10, entries.iter().copied().collect()).unwrap(),
        )
    }

    fn sparse_entries(row: RowStore) -> HashMap<i64, f64> {
        match row {
            RowStore::Sparse(row) => row.into_entries(),
            other => panic!("Expected sparse row, got {:?}", other),
        }
    }

    fn dense_values(row: RowStore) -> Vec<f64> {
        match row {
            RowStore::Dense(row) => row.values,
            other => panic!("Expected dense row, got {:?}", other),
        }
    }

    // ============================================================
    // MAP WITH INDEX
    // ============================================================

    #[test]
    fn test_dense_map_with_index_uses_global_columns() {
        let exec = executor(ElementKind::DenseDouble, &[partition(0, 5, 8)]);
        let store = exec.store();
        store.write_row(MATRIX, 0, 0, dense(&[10.0, 20.0, 30.0])).unwrap();
        store.write_row(MATRIX, 0, 1, dense(&[-1.0, -1.0, -1.0])).unwrap();

        let add_index = |index: i32, value: f64| -> anyhow::Result<f64> { Ok(value + index as f64) };
        exec.apply_map_with_index(MATRIX, 0, 0, 1, &add_index).unwrap();

        assert_eq!(
            dense_values(store.read_row(MATRIX, 0, 1).unwrap()),
            vec![15.0, 21.0, 33.0]
        );
        assert_eq!(
            dense_values(store.read_row(MATRIX, 0, 0).unwrap()),
            vec![10.0, 20.0, 30.0],
            "Source row must not change"
        );
    }

    #[test]
    fn test_sparse_map_with_index_replaces_target() {
        let exec = executor(ElementKind::SparseDouble, &[partition(0, 0, 10)]);
        let store = exec.store();
        store.write_row(MATRIX, 0, 0, sparse(&[(2, 1.0), (4, 1.0)])).unwrap();
        store.write_row(MATRIX, 0, 1, sparse(&[(9, 9.0)])).unwrap();

        exec.apply_map_with_index_spec(MATRIX, 0, 0, 1, &IndexMapFuncSpec::AddIndex)
            .unwrap();

        assert_eq!(
            sparse_entries(store.read_row(MATRIX, 0, 1).unwrap()),
            HashMap::from([(2, 3.0), (4, 5.0)])
        );
    }

    #[test]
    fn test_dense_size_mismatch_is_rejected() {
        let from = dense(&[1.0, 2.0, 3.0]);
        let to = dense(&[1.0]);
        let result = update::map_with_index(
            &from,
            &to,
            &IndexMapFuncSpec::Identity,
            ElementKind::DenseDouble,
        );
        assert!(matches!(
            result,
            Err(PsError::SizeMismatch {
                expected: 3,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_mixed_encodings_are_rejected() {
        let result = update::map_with_index(
            &dense(&[1.0]),
            &sparse(&[]),
            &IndexMapFuncSpec::Identity,
            ElementKind::DenseDouble,
        );
        assert!(matches!(result, Err(PsError::EncodingMismatch)));
    }

    #[test]
    fn test_sparse_key_outside_index_domain_is_rejected() {
        let wide = 1i64 << 33;
        let from = RowStore::Sparse(
            SparseRow::from_entries(0, 1 << 40, HashMap::from([(wide, 1.0)])).unwrap(),
        );
        let to = RowStore::Sparse(SparseRow::new(0, 1 << 40));
        let result = update::map_with_index(
            &from,
            &to,
            &IndexMapFuncSpec::AddIndex,
            ElementKind::SparseDouble,
        );
        assert!(matches!(result, Err(PsError::IndexOutOfRange(col)) if col == wide));
    }

    // ============================================================
    // MAP
    // ============================================================

    #[test]
    fn test_sparse_map_into_target_drops_unrelated_keys() {
        let exec = executor(ElementKind::SparseDouble, &[partition(0, 0, 10)]);
        let store = exec.store();
        store.write_row(MATRIX, 0, 0, sparse(&[(1, 3.0), (7, 4.5)])).unwrap();
        store.write_row(MATRIX, 0, 1, sparse(&[(2, 100.0)])).unwrap();

        let double = |value: f64| -> anyhow::Result<f64> { Ok(value * 2.0) };
        exec.apply_map_into(MATRIX, 0, 0, 1, &double).unwrap();

        assert_eq!(
            sparse_entries(store.read_row(MATRIX, 0, 1).unwrap()),
            HashMap::from([(1, 6.0), (7, 9.0)])
        );
    }

    #[test]
    fn test_dense_map_in_place() {
        let exec = executor(ElementKind::DenseDouble, &[partition(0, 5, 8)]);
        exec.store()
            .write_row(MATRIX, 0, 2, dense(&[1.0, -2.0, 3.0]))
            .unwrap();

        exec.apply_map_spec(MATRIX, 0, 2, 2, &MapFuncSpec::Abs).unwrap();

        assert_eq!(
            dense_values(exec.store().read_row(MATRIX, 0, 2).unwrap()),
            vec![1.0, 2.0, 3.0]
        );
    }

    #[test]
    fn test_identity_is_bitwise_noop() {
        let values = [0.1, -0.0, f64::MIN_POSITIVE, 1e300, f64::NAN];

        let exec = executor(ElementKind::DenseDouble, &[partition(0, 5, 10)]);
        exec.store().write_row(MATRIX, 0, 0, dense(&values)).unwrap();
        exec.apply_map(MATRIX, 0, 0, &MapFuncSpec::Identity).unwrap();
        exec.apply_map_with_index(MATRIX, 0, 0, 0, &IndexMapFuncSpec::Identity)
            .unwrap();
        let after = dense_values(exec.store().read_row(MATRIX, 0, 0).unwrap());
        for (before, after) in values.iter().zip(after.iter()) {
            assert_eq!(before.to_bits(), after.to_bits());
        }

        let exec = executor(ElementKind::SparseDouble, &[partition(0, 0, 10)]);
        let entries: Vec<(i64, f64)> = values.iter().enumerate().map(|(i, v)| (i as i64, *v)).collect();
        exec.store().write_row(MATRIX, 0, 0, sparse(&entries)).unwrap();
        let identity = |value: f64| -> anyhow::Result<f64> { Ok(value) };
        exec.apply_map(MATRIX, 0, 0, &identity).unwrap();
        let after = sparse_entries(exec.store().read_row(MATRIX, 0, 0).unwrap());
        assert_eq!(after.len(), entries.len());
        for (col, before) in entries {
            assert_eq!(before.to_bits(), after[&col].to_bits());
        }
    }

    #[test]
    fn test_identity_is_bitwise_noop_for_narrow_kinds() {
        let values = [1.5, -2.25, 0.1, 3e9];
        let bits = |values: &[f64]| values.iter().map(|v| v.to_bits()).collect::<Vec<_>>();

        for kind in [ElementKind::DenseInt, ElementKind::DenseFloat] {
            let exec = executor(kind, &[partition(0, 5, 9)]);
            exec.store().write_row(MATRIX, 0, 0, dense(&values)).unwrap();
            let before = dense_values(exec.store().read_row(MATRIX, 0, 0).unwrap());
            exec.apply_map(MATRIX, 0, 0, &MapFuncSpec::Identity).unwrap();
            exec.apply_map_with_index(MATRIX, 0, 0, 0, &IndexMapFuncSpec::Identity)
                .unwrap();
            let after = dense_values(exec.store().read_row(MATRIX, 0, 0).unwrap());
            assert_eq!(bits(&before), bits(&after), "{:?}", kind);
        }

        for kind in [ElementKind::SparseInt, ElementKind::SparseFloat] {
            let exec = executor(kind, &[partition(0, 0, 10)]);
            let entries: Vec<(i64, f64)> =
                values.iter().enumerate().map(|(i, v)| (i as i64, *v)).collect();
            exec.store().write_row(MATRIX, 0, 0, sparse(&entries)).unwrap();
            let before = sparse_entries(exec.store().read_row(MATRIX, 0, 0).unwrap());
            exec.apply_map(MATRIX, 0, 0, &MapFuncSpec::Identity).unwrap();
            let after = sparse_entries(exec.store().read_row(MATRIX, 0, 0).unwrap());
            assert_eq!(before.len(), after.len());
            for (col, value) in before {
                assert_eq!(value.to_bits(), after[&col].to_bits(), "{:?}", kind);
            }
        }
    }

    #[test]
    fn test_written_rows_are_narrowed_to_kind() {
        let exec = executor(ElementKind::DenseInt, &[partition(0, 5, 9)]);
        exec.store()
            .write_row(MATRIX, 0, 0, dense(&[1.5, -2.25, 0.1, 3e9]))
            .unwrap();
        assert_eq!(
            dense_values(exec.store().read_row(MATRIX, 0, 0).unwrap()),
            vec![1.0, -2.0, 0.0, i32::MAX as f64]
        );

        let exec = executor(ElementKind::SparseFloat, &[partition(0, 0, 10)]);
        exec.store().write_row(MATRIX, 0, 0, sparse(&[(3, 0.1)])).unwrap();
        assert_eq!(
            sparse_entries(exec.store().read_row(MATRIX, 0, 0).unwrap()),
            HashMap::from([(3, 0.1f32 as f64)])
        );
    }

    #[test]
    fn test_non_zero_default_is_rejected() {
        let json = r#"{"encoding":"sparse","start_col":0,"end_col":10,"entries":{"1":1.0},"default_value":1.0}"#;
        let row: RowStore = serde_json::from_str(json).unwrap();
        let result = update::map(&row, &MapFuncSpec::Identity, ElementKind::SparseDouble);
        assert!(matches!(result, Err(PsError::NonZeroDefault(v)) if v == 1.0));
    }

    #[test]
    fn test_dense_float_and_int_rows_narrow_results() {
        let exec = executor(ElementKind::DenseFloat, &[partition(0, 5, 6)]);
        exec.store().write_row(MATRIX, 0, 0, dense(&[1.0])).unwrap();
        exec.apply_map(MATRIX, 0, 0, &MapFuncSpec::Scale { factor: 0.1 })
            .unwrap();
        assert_eq!(
            exec.store().read_row(MATRIX, 0, 0).unwrap().get(5),
            Some(0.1f32 as f64)
        );

        let exec = executor(ElementKind::DenseInt, &[partition(0, 5, 7)]);
        exec.store().write_row(MATRIX, 0, 0, dense(&[0.0, -1.0])).unwrap();
        exec.apply_map(MATRIX, 0, 0, &MapFuncSpec::Increment { delta: 2.7 })
            .unwrap();
        assert_eq!(
            dense_values(exec.store().read_row(MATRIX, 0, 0).unwrap()),
            vec![2.0, 1.0]
        );
    }

    // ============================================================
    // TRANSFORM FAULTS
    // ============================================================

    #[test]
    fn test_dense_fault_leaves_row_untouched() {
        let exec = executor(ElementKind::DenseDouble, &[partition(0, 5, 8)]);
        exec.store().write_row(MATRIX, 0, 0, dense(&[1.0, 2.0, 3.0])).unwrap();
        exec.store().write_row(MATRIX, 0, 1, dense(&[7.0, 7.0, 7.0])).unwrap();

        let fails_at_six = |index: i32, value: f64| -> anyhow::Result<f64> {
            if index == 6 {
                anyhow::bail!("boom at {}", index);
            }
            Ok(value * 100.0)
        };
        let result = exec.apply_map_with_index(MATRIX, 0, 0, 1, &fails_at_six);

        assert!(matches!(result, Err(PsError::TransformFault(_))));
        assert!(result.unwrap_err().to_string().contains("boom at 6"));
        assert_eq!(
            dense_values(exec.store().read_row(MATRIX, 0, 1).unwrap()),
            vec![7.0, 7.0, 7.0]
        );
    }

    #[test]
    fn test_sparse_fault_leaves_row_untouched() {
        let exec = executor(ElementKind::SparseDouble, &[partition(0, 0, 10)]);
        exec.store().write_row(MATRIX, 0, 0, sparse(&[(1, 1.0), (2, -1.0)])).unwrap();

        let rejects_negative = |value: f64| -> anyhow::Result<f64> {
            if value < 0.0 {
                anyhow::bail!("negative value");
            }
            Ok(value + 1.0)
        };
        let result = exec.apply_map(MATRIX, 0, 0, &rejects_negative);

        assert!(matches!(result, Err(PsError::TransformFault(_))));
        assert_eq!(
            sparse_entries(exec.store().read_row(MATRIX, 0, 0).unwrap()),
            HashMap::from([(1, 1.0), (2, -1.0)])
        );
    }

    #[test]
    fn test_clamp_with_nan_bound_is_a_fault() {
        let exec = executor(ElementKind::DenseDouble, &[partition(0, 5, 8)]);
        exec.store().write_row(MATRIX, 0, 0, dense(&[1.0, 2.0, 3.0])).unwrap();

        for func in [
            MapFuncSpec::Clamp { min: f64::NAN, max: 1.0 },
            MapFuncSpec::Clamp { min: 0.0, max: f64::NAN },
        ] {
            let result = exec.apply_map(MATRIX, 0, 0, &func);
            assert!(matches!(result, Err(PsError::TransformFault(_))));
        }
        assert_eq!(
            dense_values(exec.store().read_row(MATRIX, 0, 0).unwrap()),
            vec![1.0, 2.0, 3.0]
        );
    }

    #[test]
    fn test_unknown_partition_and_row_are_rejected() {
        let exec = executor(ElementKind::DenseDouble, &[partition(0, 5, 8)]);
        assert!(matches!(
            exec.apply_map(MATRIX, 9, 0, &MapFuncSpec::Identity),
            Err(PsError::UnknownPartition { partition_id: 9, .. })
        ));
        assert!(matches!(
            exec.apply_map_into(MATRIX, 0, 0, 4, &MapFuncSpec::Identity),
            Err(PsError::UnknownRow { row_id: 4, .. })
        ));
    }

    // ============================================================
    // ZIP3 MAP WITH INDEX
    // ============================================================

    #[test]
    fn test_dense_zip3_map_with_index() {
        let exec = executor(ElementKind::DenseDouble, &[partition(0, 5, 8)]);
        let store = exec.store();
        store.write_row(MATRIX, 0, 0, dense(&[1.0, 2.0, 3.0])).unwrap();
        store.write_row(MATRIX, 0, 1, dense(&[10.0, 20.0, 30.0])).unwrap();
        store.write_row(MATRIX, 0, 2, dense(&[100.0, 200.0, 300.0])).unwrap();

        let func = |index: i32, a: f64, b: f64, c: f64| -> anyhow::Result<f64> {
            Ok(index as f64 + a + b + c)
        };
        exec.apply_zip3_map_with_index(MATRIX, 0, [0, 1, 2, 3], &func)
            .unwrap();

        assert_eq!(
            dense_values(store.read_row(MATRIX, 0, 3).unwrap()),
            vec![116.0, 228.0, 340.0]
        );
    }

    #[test]
    fn test_sparse_zip3_visits_union_of_keys() {
        let exec = executor(ElementKind::SparseDouble, &[partition(0, 0, 10)]);
        let store = exec.store();
        store.write_row(MATRIX, 0, 0, sparse(&[(1, 1.0)])).unwrap();
        store.write_row(MATRIX, 0, 1, sparse(&[(2, 2.0)])).unwrap();
        store.write_row(MATRIX, 0, 2, sparse(&[(1, 10.0), (3, 3.0)])).unwrap();
        store.write_row(MATRIX, 0, 3, sparse(&[(9, 9.0)])).unwrap();

        exec.apply_zip3_spec(MATRIX, 0, &[0, 1, 2, 3], &Zip3FuncSpec::Sum)
            .unwrap();

        assert_eq!(
            sparse_entries(store.read_row(MATRIX, 0, 3).unwrap()),
            HashMap::from([(1, 11.0), (2, 2.0), (3, 3.0)])
        );
    }

    #[test]
    fn test_zip3_requires_four_rows() {
        let exec = executor(ElementKind::DenseDouble, &[partition(0, 5, 8)]);
        let result = exec.apply_zip3_spec(MATRIX, 0, &[0, 1, 2], &Zip3FuncSpec::Sum);
        assert!(matches!(
            result,
            Err(PsError::SizeMismatch {
                expected: 4,
                actual: 3
            })
        ));
    }

    // ============================================================
    // REGISTRY
    // ============================================================

    #[test]
    fn test_named_functions_resolve_through_registry() {
        let exec = executor(ElementKind::DenseDouble, &[partition(0, 5, 8)]);
        exec.registry()
            .register_map("square", |value: f64| -> anyhow::Result<f64> { Ok(value * value) });
        exec.registry().register_zip3(
            "max3",
            |_index: i32, a: f64, b: f64, c: f64| -> anyhow::Result<f64> { Ok(a.max(b).max(c)) },
        );
        assert_eq!(exec.registry().function_count(), 2);
        assert_eq!(exec.registry().list_functions(), vec!["max3", "square"]);

        exec.store().write_row(MATRIX, 0, 0, dense(&[1.0, 2.0, 3.0])).unwrap();
        let spec = MapFuncSpec::Named {
            name: "square".to_string(),
        };
        exec.apply_map_spec(MATRIX, 0, 0, 0, &spec).unwrap();
        assert_eq!(
            dense_values(exec.store().read_row(MATRIX, 0, 0).unwrap()),
            vec![1.0, 4.0, 9.0]
        );
    }

    #[test]
    fn test_unknown_named_function() {
        let exec = executor(ElementKind::DenseDouble, &[partition(0, 5, 8)]);
        let spec = IndexMapFuncSpec::Named {
            name: "missing".to_string(),
        };
        let result = exec.apply_map_with_index_spec(MATRIX, 0, 0, 1, &spec);
        assert!(matches!(result, Err(PsError::UnknownFunction(name)) if name == "missing"));
    }

    #[test]
    fn test_specs_deserialize_from_tagged_json() {
        let spec: MapFuncSpec = serde_json::from_str(r#"{"op":"scale","factor":2.0}"#).unwrap();
        assert_eq!(spec, MapFuncSpec::Scale { factor: 2.0 });
        assert_eq!(spec.call(4.0).unwrap(), 8.0);

        let spec: Zip3FuncSpec =
            serde_json::from_str(r#"{"op":"weighted","a":1.0,"b":2.0,"c":3.0}"#).unwrap();
        assert_eq!(spec.call(0, 1.0, 1.0, 1.0).unwrap(), 6.0);
    }

    // ============================================================
    // CONCURRENCY
    // ============================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_different_partitions_do_not_block() {
        let exec = executor(
            ElementKind::DenseDouble,
            &[partition(0, 5, 8), partition(1, 5, 8)],
        );

        let handle = exec.store().handle(MATRIX, 0).unwrap();
        let _held = handle.write();

        let worker = exec.clone();
        let call = tokio::task::spawn_blocking(move || {
            worker.apply_map(MATRIX, 1, 0, &MapFuncSpec::Increment { delta: 1.0 })
        });

        let result = tokio::time::timeout(Duration::from_secs(5), call)
            .await
            .expect("Call on another partition must not wait for partition 0")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_row_calls_serialize() {
        let exec = executor(ElementKind::DenseDouble, &[partition(0, 0, 64)]);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let worker = exec.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                for _ in 0..100 {
                    worker
                        .apply_map(MATRIX, 0, 0, &MapFuncSpec::Increment { delta: 1.0 })
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let values = dense_values(exec.store().read_row(MATRIX, 0, 0).unwrap());
        assert!(values.iter().all(|v| *v == 800.0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_calls_match_a_serial_order() {
        for _ in 0..20 {
            let exec = executor(ElementKind::SparseDouble, &[partition(0, 0, 10)]);
            let entries: Vec<(i64, f64)> = (0..10).map(|col| (col, 1.0)).collect();
            exec.store().write_row(MATRIX, 0, 0, sparse(&entries)).unwrap();

            let a = exec.clone();
            let b = exec.clone();
            let scale = tokio::task::spawn_blocking(move || {
                a.apply_map(MATRIX, 0, 0, &MapFuncSpec::Scale { factor: 2.0 })
            });
            let increment = tokio::task::spawn_blocking(move || {
                b.apply_map(MATRIX, 0, 0, &MapFuncSpec::Increment { delta: 1.0 })
            });
            scale.await.unwrap().unwrap();
            increment.await.unwrap().unwrap();

            let values: Vec<f64> = sparse_entries(exec.store().read_row(MATRIX, 0, 0).unwrap())
                .into_values()
                .collect();
            let first = values[0];
            assert!(first == 3.0 || first == 4.0, "Unexpected value {}", first);
            assert!(values.iter().all(|v| *v == first), "Interleaved result {:?}", values);
        }
    }
}
