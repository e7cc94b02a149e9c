// ==========================================
// 订单行状态机测试
// ==========================================
// 职责: 验证改状态/取消/编码映射/字段补丁/配送信息在 API 层的行为与租户隔离
// ==========================================


#[cfg(test)]
mod row_state_machine_test {
    use chrono::NaiveDate;
    use fulfillment_desk::api::{ApiError, CodeMappingUpdate};
    use fulfillment_desk::domain::{
        field_keys, DeliveryInfoUpdate, FieldMap, OrderStatus, ProductMapping,
    };
    use fulfillment_desk::repository::RowFilter;

    use crate::test_helpers::*;

    // ==========================================
    // 改状态 / 取消
    // ==========================================

    #[test]
    fn test_bulk_status_update_excludes_missing_ids() {
        let (_temp_file, db_path) = create_test_db().unwrap();
        let env = setup_test_env(&db_path);
        let rows = insert_simple_rows(&env.row_repo, TENANT_A, 3);

        let result = env
            .row_api
            .update_status(
                TENANT_A,
                &[rows[0], rows[1], 9_999],
                OrderStatus::OrderSheetDownloaded,
                "tester",
            )
            .unwrap();
        assert_eq!(result.count, 2);
        assert_eq!(result.ids, vec![rows[0], rows[1]]);

        let listed = env
            .row_api
            .list_rows(
                TENANT_A,
                &RowFilter {
                    status: Some(OrderStatus::OrderSheetDownloaded),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[test]
    fn test_cancel_is_idempotent_and_terminal() {
        let (_temp_file, db_path) = create_test_db().unwrap();
        let env = setup_test_env(&db_path);
        let rows = insert_simple_rows(&env.row_repo, TENANT_A, 2);

        let first = env.row_api.cancel_rows(TENANT_A, &rows, "tester").unwrap();
        let second = env.row_api.cancel_rows(TENANT_A, &rows, "tester").unwrap();
        assert_eq!(first.ids, rows);
        assert_eq!(second.ids, rows);

        // 取消后的行不被其他目标状态覆盖
        let result = env
            .row_api
            .update_status(TENANT_A, &rows, OrderStatus::Shipping, "tester")
            .unwrap();
        assert_eq!(result.count, 0);
        for id in &rows {
            let row = env.row_api.get_row(TENANT_A, *id).unwrap();
            assert_eq!(row.status(), Some(OrderStatus::Cancelled));
        }
    }

    #[test]
    fn test_wrong_tenant_is_not_found_and_untouched() {
        let (_temp_file, db_path) = create_test_db().unwrap();
        let env = setup_test_env(&db_path);
        let rows = insert_simple_rows(&env.row_repo, TENANT_A, 2);

        assert!(matches!(
            env.row_api.cancel_rows(TENANT_B, &rows, "intruder"),
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            env.row_api
                .update_status(TENANT_B, &rows, OrderStatus::Supplying, "intruder"),
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            env.row_api.get_row(TENANT_B, rows[0]),
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            env.row_api.bulk_delete(TENANT_B, &rows, "intruder"),
            Err(ApiError::NotFound(_))
        ));

        for id in &rows {
            let row = env.row_api.get_row(TENANT_A, *id).unwrap();
            assert_eq!(row.status(), None);
        }
    }

    #[test]
    fn test_empty_id_list_is_validation_error() {
        let (_temp_file, db_path) = create_test_db().unwrap();
        let env = setup_test_env(&db_path);

        assert!(matches!(
            env.row_api.cancel_rows(TENANT_A, &[], "tester"),
            Err(ApiError::ValidationError(_))
        ));
        assert!(matches!(
            env.row_api
                .update_status(TENANT_A, &[], OrderStatus::Supplying, "tester"),
            Err(ApiError::ValidationError(_))
        ));
        assert!(matches!(
            env.row_api.update_delivery_info(TENANT_A, &[], "tester"),
            Err(ApiError::ValidationError(_))
        ));
    }

    #[test]
    fn test_cancelled_rows_keep_batch_linkage_and_status() {
        let (_temp_file, db_path) = create_test_db().unwrap();
        let env = setup_test_env(&db_path);
        let vendor = seed_vendor(&env.vendor_repo, TENANT_A, "산지농원");
        let rows = insert_simple_rows(&env.row_repo, TENANT_A, 2);
        let assignment = env
            .dispatch_api
            .assign_batch(
                TENANT_A,
                vendor,
                &rows,
                NaiveDate::from_ymd_opt(2025, 3, 10),
                "tester",
            )
            .unwrap();

        env.row_api.cancel_rows(TENANT_A, &rows, "tester").unwrap();
        env.row_api
            .update_status(TENANT_A, &rows, OrderStatus::Supplying, "tester")
            .unwrap();
        let mut patch = FieldMap::new();
        patch.insert(field_keys::DELIVERY_MESSAGE, "경비실");
        env.row_api.patch_row(TENANT_A, rows[0], &patch, "tester").unwrap();

        // 配送信息照常写入，但状态不被改回 배송중
        let updates: Vec<DeliveryInfoUpdate> = rows
            .iter()
            .map(|&row_id| DeliveryInfoUpdate {
                row_id,
                carrier: Some("CJ".to_string()),
                tracking_number: Some(format!("TRK-{}", row_id)),
                order_status: Some(OrderStatus::Shipping),
            })
            .collect();
        let result = env
            .row_api
            .update_delivery_info(TENANT_A, &updates, "tester")
            .unwrap();
        assert_eq!(result.count, 2);

        for id in &rows {
            let row = env.row_api.get_row(TENANT_A, *id).unwrap();
            assert_eq!(row.status(), Some(OrderStatus::Cancelled));
            assert_eq!(row.order_batch_id, Some(assignment.batch.id));
            assert_eq!(row.purchase_vendor_id, Some(vendor));
            assert_eq!(
                row.fields.get_text(field_keys::TRACKING_NUMBER),
                Some(format!("TRK-{}", id))
            );
        }
        let patched = env.row_api.get_row(TENANT_A, rows[0]).unwrap();
        assert_eq!(
            patched.fields.get_text(field_keys::DELIVERY_MESSAGE),
            Some("경비실".to_string())
        );
    }

    #[test]
    fn test_patch_cannot_revive_cancelled_row() {
        let (_temp_file, db_path) = create_test_db().unwrap();
        let env = setup_test_env(&db_path);
        let rows = insert_simple_rows(&env.row_repo, TENANT_A, 1);
        env.row_api.cancel_rows(TENANT_A, &rows, "tester").unwrap();

        let mut patch = FieldMap::new();
        patch.insert(field_keys::ORDER_STATUS, OrderStatus::Shipping.as_str());
        patch.insert(field_keys::DELIVERY_MESSAGE, "문 앞");
        let merged = env.row_api.patch_row(TENANT_A, rows[0], &patch, "tester").unwrap();

        assert_eq!(merged.order_status(), Some(OrderStatus::Cancelled));
        assert_eq!(
            merged.get_text(field_keys::DELIVERY_MESSAGE),
            Some("문 앞".to_string())
        );
    }

    #[test]
    fn test_bulk_calls_beyond_sqlite_variable_limit() {
        let (_temp_file, db_path) = create_test_db().unwrap();
        let env = setup_test_env(&db_path);
        let vendor = seed_vendor(&env.vendor_repo, TENANT_A, "대량농장");
        let rows = insert_simple_rows(&env.row_repo, TENANT_A, 3);

        let mut ids = rows.clone();
        ids.extend(1_000_000..1_040_000);

        let result = env
            .row_api
            .update_status(TENANT_A, &ids, OrderStatus::Supplying, "tester")
            .unwrap();
        assert_eq!(result.count, 3);
        assert_eq!(result.ids, rows);

        let assignment = env
            .dispatch_api
            .assign_batch(
                TENANT_A,
                vendor,
                &ids,
                NaiveDate::from_ymd_opt(2025, 3, 11),
                "tester",
            )
            .unwrap();
        assert_eq!(assignment.linked_row_ids, rows);

        let deleted = env.row_api.bulk_delete(TENANT_A, &ids, "tester").unwrap();
        assert_eq!(deleted.count, 3);
    }

    // ==========================================
    // 编码映射
    // ==========================================

    #[tokio::test]
    async fn test_code_mapping_preserves_product_name_and_unknown_keys() {
        let (_temp_file, db_path) = create_test_db().unwrap();
        let env = setup_test_env(&db_path);
        let vendor = seed_vendor(&env.vendor_repo, TENANT_A, "산지농원");

        let mut fields = order_fields("A-1", "Xyz", Some("OLD"));
        fields.insert("사은품", "스티커");
        let rows = insert_rows(&env.row_repo, TENANT_A, vec![fields]);

        let mut mapping = ProductMapping {
            code: "NEW".to_string(),
            package_count: Some(2),
            carrier_company: Some("CJ대한통운".to_string()),
            vendor_name: Some("산지농원".to_string()),
            ..Default::default()
        };
        mapping.extra.insert(field_keys::PRODUCT_NAME, "Catalog Name");

        let report = env
            .row_api
            .update_code_mapping(
                TENANT_A,
                vec![
                    CodeMappingUpdate {
                        row_id: rows[0],
                        mapping: mapping.clone(),
                    },
                    CodeMappingUpdate {
                        row_id: 9_999,
                        mapping,
                    },
                ],
                "tester",
            )
            .await
            .unwrap();
        assert_eq!(report.updated_ids, vec![rows[0]]);
        assert_eq!(report.not_found_ids, vec![9_999]);
        assert!(report.failed.is_empty());

        let row = env.row_api.get_row(TENANT_A, rows[0]).unwrap();
        assert_eq!(row.product_name(), Some("Xyz".to_string()));
        assert_eq!(row.mapping_code(), Some("NEW".to_string()));
        assert_eq!(
            row.fields.get(field_keys::PACKAGE_COUNT).and_then(|v| v.as_i64()),
            Some(2)
        );
        assert_eq!(row.fields.get_text("사은품"), Some("스티커".to_string()));
        assert_eq!(row.purchase_vendor_id, Some(vendor));
    }

    #[tokio::test]
    async fn test_code_mapping_keeps_vendor_of_batched_row() {
        let (_temp_file, db_path) = create_test_db().unwrap();
        let env = setup_test_env(&db_path);
        let vendor_x = seed_vendor(&env.vendor_repo, TENANT_A, "X농원");
        let vendor_y = seed_vendor(&env.vendor_repo, TENANT_A, "Y농원");
        let rows = insert_simple_rows(&env.row_repo, TENANT_A, 2);
        let assignment = env
            .dispatch_api
            .assign_batch(
                TENANT_A,
                vendor_x,
                &rows[..1],
                NaiveDate::from_ymd_opt(2025, 3, 12),
                "tester",
            )
            .unwrap();

        let updates = rows
            .iter()
            .map(|&row_id| CodeMappingUpdate {
                row_id,
                mapping: ProductMapping {
                    code: "AP-500".to_string(),
                    vendor_name: Some("Y농원".to_string()),
                    ..Default::default()
                },
            })
            .collect();
        let report = env
            .row_api
            .update_code_mapping(TENANT_A, updates, "tester")
            .await
            .unwrap();
        assert_eq!(report.updated_ids, rows);

        let batched = env.row_api.get_row(TENANT_A, rows[0]).unwrap();
        assert_eq!(batched.order_batch_id, Some(assignment.batch.id));
        assert_eq!(batched.purchase_vendor_id, Some(vendor_x));
        assert_eq!(batched.mapping_code(), Some("AP-500".to_string()));

        let open = env.row_api.get_row(TENANT_A, rows[1]).unwrap();
        assert_eq!(open.purchase_vendor_id, Some(vendor_y));
    }

    #[tokio::test]
    async fn test_code_mapping_all_missing_is_not_found() {
        let (_temp_file, db_path) = create_test_db().unwrap();
        let env = setup_test_env(&db_path);
        let rows = insert_simple_rows(&env.row_repo, TENANT_A, 1);

        let result = env
            .row_api
            .update_code_mapping(
                TENANT_B,
                vec![CodeMappingUpdate {
                    row_id: rows[0],
                    mapping: ProductMapping {
                        code: "X".to_string(),
                        ..Default::default()
                    },
                }],
                "intruder",
            )
            .await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    // ==========================================
    // 字段补丁
    // ==========================================

    #[test]
    fn test_patch_row_is_last_write_wins() {
        let (_temp_file, db_path) = create_test_db().unwrap();
        let env = setup_test_env(&db_path);
        let rows = insert_simple_rows(&env.row_repo, TENANT_A, 1);

        let mut first = FieldMap::new();
        first.insert(field_keys::DELIVERY_MESSAGE, "문 앞");
        env.row_api.patch_row(TENANT_A, rows[0], &first, "a").unwrap();

        let mut second = FieldMap::new();
        second.insert(field_keys::DELIVERY_MESSAGE, "경비실");
        second.insert(field_keys::PRODUCT_NAME, "수정된 상품명");
        let merged = env.row_api.patch_row(TENANT_A, rows[0], &second, "b").unwrap();

        assert_eq!(
            merged.get_text(field_keys::DELIVERY_MESSAGE),
            Some("경비실".to_string())
        );
        assert_eq!(
            merged.get_text(field_keys::PRODUCT_NAME),
            Some("수정된 상품명".to_string())
        );
        assert!(merged.contains_key(field_keys::ORDER_NUMBER));

        assert!(matches!(
            env.row_api.patch_row(TENANT_B, rows[0], &second, "intruder"),
            Err(ApiError::NotFound(_))
        ));
    }

    // ==========================================
    // 配送信息
    // ==========================================

    #[test]
    fn test_delivery_update_is_all_or_nothing() {
        let (_temp_file, db_path) = create_test_db().unwrap();
        let env = setup_test_env(&db_path);
        let rows = insert_simple_rows(&env.row_repo, TENANT_A, 2);

        let updates = vec![
            DeliveryInfoUpdate {
                row_id: rows[0],
                carrier: Some("CJ".to_string()),
                tracking_number: Some("111".to_string()),
                order_status: Some(OrderStatus::Shipping),
            },
            DeliveryInfoUpdate {
                row_id: 9_999,
                carrier: Some("CJ".to_string()),
                tracking_number: Some("222".to_string()),
                order_status: Some(OrderStatus::Shipping),
            },
        ];
        assert!(matches!(
            env.row_api.update_delivery_info(TENANT_A, &updates, "tester"),
            Err(ApiError::NotFound(_))
        ));
        let untouched = env.row_api.get_row(TENANT_A, rows[0]).unwrap();
        assert!(!untouched.fields.contains_key(field_keys::TRACKING_NUMBER));
        assert_eq!(untouched.status(), None);

        let updates = vec![
            DeliveryInfoUpdate {
                row_id: rows[0],
                carrier: Some("cj 택배".to_string()),
                tracking_number: Some("111".to_string()),
                order_status: Some(OrderStatus::Shipping),
            },
            DeliveryInfoUpdate {
                row_id: rows[1],
                carrier: None,
                tracking_number: Some("222".to_string()),
                order_status: Some(OrderStatus::Shipping),
            },
        ];
        let result = env
            .row_api
            .update_delivery_info(TENANT_A, &updates, "tester")
            .unwrap();
        assert_eq!(result.count, 2);

        let row = env.row_api.get_row(TENANT_A, rows[0]).unwrap();
        assert_eq!(row.fields.get_text(field_keys::CARRIER), Some("CJ대한통운".to_string()));
        assert_eq!(row.fields.get_text(field_keys::TRACKING_NUMBER), Some("111".to_string()));
        assert_eq!(row.status(), Some(OrderStatus::Shipping));
    }

    // ==========================================
    // 发注标记 / 删除 / 审计
    // ==========================================

    #[test]
    fn test_ordered_flag_and_bulk_delete() {
        let (_temp_file, db_path) = create_test_db().unwrap();
        let env = setup_test_env(&db_path);
        let rows = insert_simple_rows(&env.row_repo, TENANT_A, 3);

        let flagged = env
            .row_api
            .set_ordered_flag(TENANT_A, &rows[..2], true, "tester")
            .unwrap();
        assert_eq!(flagged.count, 2);
        let ordered = env
            .row_api
            .list_rows(
                TENANT_A,
                &RowFilter {
                    is_ordered: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(ordered.len(), 2);

        let deleted = env
            .row_api
            .bulk_delete(TENANT_A, &[rows[0], 9_999], "tester")
            .unwrap();
        assert_eq!(deleted.ids, vec![rows[0]]);
        assert_eq!(
            env.row_api
                .list_rows(TENANT_A, &RowFilter::default())
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn test_mutations_are_audited_per_tenant() {
        let (_temp_file, db_path) = create_test_db().unwrap();
        let env = setup_test_env(&db_path);
        let rows = insert_simple_rows(&env.row_repo, TENANT_A, 1);

        env.row_api.cancel_rows(TENANT_A, &rows, "tester").unwrap();

        let logs = env.action_log_repo.list_by_target(TENANT_A, rows[0]).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action_type, "CANCEL");
        assert_eq!(logs[0].actor, "tester");
        assert!(env
            .action_log_repo
            .list_by_target(TENANT_B, rows[0])
            .unwrap()
            .is_empty());
    }
}
