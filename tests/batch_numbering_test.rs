// ==========================================
// 发注批次编号测试
// ==========================================
// 职责: 验证批次号按供应商按日递增、并发下唯一、只挂接本租户未批次化的行
// ==========================================


#[cfg(test)]
mod batch_numbering_test {
    use chrono::NaiveDate;
    use fulfillment_desk::api::ApiError;
    use fulfillment_desk::repository::{OrderBatchRepository, RepositoryError};
    use std::collections::HashSet;
    use std::thread;

    use crate::test_helpers::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn test_sequence_starts_at_one_and_increments() {
        let (_temp_file, db_path) = create_test_db().unwrap();
        let env = setup_test_env(&db_path);
        let vendor = seed_vendor(&env.vendor_repo, TENANT_A, "산지농원");
        let rows = insert_simple_rows(&env.row_repo, TENANT_A, 2);

        let first = env
            .dispatch_api
            .assign_batch(TENANT_A, vendor, &rows[..1], Some(day(3)), "tester")
            .unwrap();
        let second = env
            .dispatch_api
            .assign_batch(TENANT_A, vendor, &rows[1..], Some(day(3)), "tester")
            .unwrap();

        assert_eq!(first.batch.batch_number, 1);
        assert_eq!(second.batch.batch_number, 2);
        assert_eq!(first.linked_row_ids, vec![rows[0]]);

        let row = env.row_repo.find_by_id(TENANT_A, rows[0]).unwrap().unwrap();
        assert_eq!(row.order_batch_id, Some(first.batch.id));
        assert_eq!(row.purchase_vendor_id, Some(vendor));
        assert!(row.is_ordered);
    }

    #[test]
    fn test_sequences_are_per_vendor_and_per_day() {
        let (_temp_file, db_path) = create_test_db().unwrap();
        let env = setup_test_env(&db_path);
        let vendor_x = seed_vendor(&env.vendor_repo, TENANT_A, "X");
        let vendor_y = seed_vendor(&env.vendor_repo, TENANT_A, "Y");
        let rows = insert_simple_rows(&env.row_repo, TENANT_A, 4);

        let x1 = env
            .dispatch_api
            .assign_batch(TENANT_A, vendor_x, &[rows[0]], Some(day(3)), "tester")
            .unwrap();
        let y1 = env
            .dispatch_api
            .assign_batch(TENANT_A, vendor_y, &[rows[1]], Some(day(3)), "tester")
            .unwrap();
        let x_next_day = env
            .dispatch_api
            .assign_batch(TENANT_A, vendor_x, &[rows[2]], Some(day(4)), "tester")
            .unwrap();
        let x2 = env
            .dispatch_api
            .assign_batch(TENANT_A, vendor_x, &[rows[3]], Some(day(3)), "tester")
            .unwrap();

        assert_eq!(x1.batch.batch_number, 1);
        assert_eq!(y1.batch.batch_number, 1);
        assert_eq!(x_next_day.batch.batch_number, 1);
        assert_eq!(x2.batch.batch_number, 2);

        let x_batches = env
            .dispatch_api
            .list_batches(TENANT_A, vendor_x, Some(day(3)))
            .unwrap();
        let numbers: Vec<i64> = x_batches.iter().map(|b| b.batch_number).collect();
        assert_eq!(numbers, vec![1, 2]);

        let batch_rows = env
            .dispatch_api
            .list_batch_rows(TENANT_A, x2.batch.id)
            .unwrap();
        assert_eq!(batch_rows.len(), 1);
        assert_eq!(batch_rows[0].id, rows[3]);
    }

    #[test]
    fn test_concurrent_dispatch_yields_distinct_numbers() {
        const WORKERS: usize = 8;

        let (_temp_file, db_path) = create_test_db().unwrap();
        let env = setup_test_env(&db_path);
        let vendor = seed_vendor(&env.vendor_repo, TENANT_A, "동시성농장");
        let rows = insert_simple_rows(&env.row_repo, TENANT_A, WORKERS);

        let handles: Vec<_> = rows
            .iter()
            .map(|&row_id| {
                let db_path = db_path.clone();
                thread::spawn(move || {
                    // 每个线程独立连接
                    let repo = OrderBatchRepository::new(&db_path).unwrap();
                    repo.assign_batch(TENANT_A, vendor, &[row_id], day(5), 20)
                        .unwrap()
                        .batch
                        .batch_number
                })
            })
            .collect();

        let numbers: HashSet<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let expected: HashSet<i64> = (1..=WORKERS as i64).collect();
        assert_eq!(numbers, expected);
    }

    #[test]
    fn test_already_batched_and_foreign_rows_are_skipped() {
        let (_temp_file, db_path) = create_test_db().unwrap();
        let env = setup_test_env(&db_path);
        let vendor = seed_vendor(&env.vendor_repo, TENANT_A, "V");
        let own = insert_simple_rows(&env.row_repo, TENANT_A, 2);
        let foreign = insert_simple_rows(&env.row_repo, TENANT_B, 1);

        env.dispatch_api
            .assign_batch(TENANT_A, vendor, &[own[0]], Some(day(6)), "tester")
            .unwrap();
        let second = env
            .dispatch_api
            .assign_batch(
                TENANT_A,
                vendor,
                &[own[0], own[1], foreign[0]],
                Some(day(6)),
                "tester",
            )
            .unwrap();
        assert_eq!(second.linked_row_ids, vec![own[1]]);

        let foreign_row = env.row_repo.find_by_id(TENANT_B, foreign[0]).unwrap().unwrap();
        assert_eq!(foreign_row.order_batch_id, None);

        // 全部已批次化：不留下空批次
        let result =
            env.dispatch_api
                .assign_batch(TENANT_A, vendor, &[own[0], own[1]], Some(day(6)), "tester");
        assert!(matches!(result, Err(ApiError::NotFound(_))));
        let batches = env
            .dispatch_api
            .list_batches(TENANT_A, vendor, Some(day(6)))
            .unwrap();
        assert_eq!(batches.len(), 2);
    }

    #[test]
    fn test_foreign_vendor_and_empty_ids_rejected() {
        let (_temp_file, db_path) = create_test_db().unwrap();
        let env = setup_test_env(&db_path);
        let foreign_vendor = seed_vendor(&env.vendor_repo, TENANT_B, "B-only");
        let rows = insert_simple_rows(&env.row_repo, TENANT_A, 1);

        let result =
            env.dispatch_api
                .assign_batch(TENANT_A, foreign_vendor, &rows, Some(day(7)), "tester");
        assert!(matches!(result, Err(ApiError::NotFound(_))));

        let result = env
            .dispatch_api
            .assign_batch(TENANT_A, foreign_vendor, &[], Some(day(7)), "tester");
        assert!(matches!(result, Err(ApiError::ValidationError(_))));

        let repo = OrderBatchRepository::new(&db_path).unwrap();
        assert!(matches!(
            repo.assign_batch(TENANT_A, foreign_vendor, &[], day(7), 3),
            Err(RepositoryError::ValidationError(_))
        ));
    }

    #[test]
    fn test_dispatch_is_audited() {
        let (_temp_file, db_path) = create_test_db().unwrap();
        let env = setup_test_env(&db_path);
        let vendor = seed_vendor(&env.vendor_repo, TENANT_A, "V");
        let rows = insert_simple_rows(&env.row_repo, TENANT_A, 1);

        env.dispatch_api
            .assign_batch(TENANT_A, vendor, &rows, Some(day(8)), "tester")
            .unwrap();
        assert_eq!(
            env.action_log_repo
                .count_by_type(TENANT_A, "BATCH_DISPATCH")
                .unwrap(),
            1
        );
    }
}
