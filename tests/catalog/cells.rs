use crate::catalog::*;

fn key(key: &str) -> RowSelector {
    RowSelector::Key(key.to_string())
}

#[tokio::test]
async fn test_gold_scenario() {
    let metastore = make_metastore().await;
    make_gold_table(&metastore).await;

    let new_value = metastore
        .cells
        .modify_value(&table("Gold"), "Coins", &key("100"), "25")
        .await
        .unwrap();
    assert_eq!(new_value, "75");

    let gold = metastore.assemble_table(&table("Gold")).await.unwrap();
    assert_eq!(to_csv(&gold).unwrap(), "ID,Key,Coins\n0,100,75\n");
}

#[tokio::test]
async fn test_row_numbers_and_keys() {
    let metastore = make_metastore().await;
    make_gold_table(&metastore).await;
    let gold = table("Gold");

    // Keyless rows don't clash with each other
    for expected in [1, 2] {
        assert_eq!(
            metastore
                .cells
                .add_row(&gold, None, &values(&[]))
                .await
                .unwrap(),
            expected
        );
    }

    assert!(matches!(
        metastore
            .cells
            .add_row(&gold, Some("100"), &values(&[("Coins", "1")]))
            .await
            .unwrap_err(),
        CatalogError::KeyAlreadyPresentInTable { key, table } if key == "100" && table == "Gold"
    ));

    // Deleted row numbers are never handed out again
    metastore
        .cells
        .delete_row(&gold, &RowSelector::Number(2))
        .await
        .unwrap();
    assert_eq!(
        metastore
            .cells
            .add_row(&gold, Some("300"), &values(&[]))
            .await
            .unwrap(),
        3
    );

    let assembled = metastore.assemble_table(&gold).await.unwrap();
    assert_eq!(
        assembled.rows.iter().map(|r| r.number).collect::<Vec<_>>(),
        vec![0, 1, 3]
    );
    assert_eq!(to_csv(&assembled).unwrap(), "ID,Key,Coins\n0,100,50\n1,,\n3,300,\n");
}

#[tokio::test]
async fn test_add_row_drops_invalid_values() {
    let metastore = make_metastore().await;
    make_gold_table(&metastore).await;

    metastore
        .cells
        .add_row(
            &table("Gold"),
            Some("200"),
            &values(&[("Coins", "lots"), ("NoSuchColumn", "1")]),
        )
        .await
        .unwrap();

    assert_eq!(
        metastore
            .cells
            .get_value(&table("Gold"), "Coins", &key("200"))
            .await
            .unwrap(),
        (None, DataType::Integer)
    );
}

#[tokio::test]
async fn test_add_row_with_clashing_column_names() {
    let metastore = make_metastore().await;
    make_gold_table(&metastore).await;

    // Both names normalize to "Coins"; the later one in name order wins, and an
    // invalid later value doesn't knock out a valid earlier one
    let cases = [
        ("200", values(&[("Coins", "1"), ("Coins$", "2")]), "2"),
        ("300", values(&[("Coins", "1"), ("Coins$", "lots")]), "1"),
    ];

    for (row_key, row_values, expected) in cases {
        metastore
            .cells
            .add_row(&table("Gold"), Some(row_key), &row_values)
            .await
            .unwrap();
        assert_eq!(
            metastore
                .cells
                .get_value(&table("Gold"), "Coins", &key(row_key))
                .await
                .unwrap()
                .0
                .as_deref(),
            Some(expected)
        );
    }
}

#[tokio::test]
async fn test_add_row_to_missing_table() {
    let metastore = make_metastore().await;

    assert!(matches!(
        metastore
            .cells
            .add_row(&table("Nowhere"), Some("1"), &values(&[]))
            .await
            .unwrap_err(),
        CatalogError::TableDoesNotExist { .. }
    ));
}

#[tokio::test]
async fn test_rows_without_columns() {
    let metastore = make_metastore().await;
    metastore
        .tables
        .create("Bare", CollectionType::PerKey, None)
        .await
        .unwrap();
    metastore
        .cells
        .add_row(&table("Bare"), Some("a"), &values(&[]))
        .await
        .unwrap();

    let bare = metastore.assemble_table(&table("Bare")).await.unwrap();
    assert_eq!(bare.rows.len(), 1);
    assert!(bare.get("a").unwrap().values.is_empty());
    assert_eq!(to_csv(&bare).unwrap(), "ID,Key\n0,a\n");
}

#[tokio::test]
async fn test_set_value() {
    let metastore = make_metastore().await;
    make_gold_table(&metastore).await;
    let gold = table("Gold");

    metastore
        .cells
        .set_value(&gold, "Coins", &RowSelector::Number(0), "-12")
        .await
        .unwrap();
    assert_eq!(
        metastore
            .cells
            .get_value(&gold, "Coins", &key("100"))
            .await
            .unwrap()
            .0
            .as_deref(),
        Some("-12")
    );

    assert!(matches!(
        metastore
            .cells
            .set_value(&gold, "Coins", &key("100"), "1.5")
            .await
            .unwrap_err(),
        CatalogError::InvalidData { column, .. } if column == "Coins"
    ));
    assert!(matches!(
        metastore
            .cells
            .set_value(&gold, "Coins", &key("404"), "1")
            .await
            .unwrap_err(),
        CatalogError::CellDoesNotExist { .. }
    ));
    assert!(matches!(
        metastore
            .cells
            .set_value(&gold, "Gems", &key("100"), "1")
            .await
            .unwrap_err(),
        CatalogError::ColumnDoesNotExist { name } if name == "Gems"
    ));

    // The failed writes changed nothing
    assert_eq!(
        metastore
            .cells
            .get_value(&gold, "Coins", &key("100"))
            .await
            .unwrap()
            .0
            .as_deref(),
        Some("-12")
    );
}

#[rstest]
#[case::integer_add(DataType::Integer, Some("50"), "25", "75")]
#[case::integer_subtract(DataType::Integer, Some("50"), "-60", "-10")]
#[case::integer_unset(DataType::Integer, None, "-5", "-5")]
#[case::decimal_keeps_scale(DataType::Decimal, Some("1.50"), "1", "2.50")]
#[case::decimal_exact(DataType::Decimal, Some("0.1"), "0.2", "0.3")]
#[case::text_replaces(DataType::Text, Some("old"), "new", "new")]
#[case::user_replaces(DataType::User, Some("1"), "1234567890", "1234567890")]
#[tokio::test]
async fn test_modify_value(
    #[case] data_type: DataType,
    #[case] initial: Option<&str>,
    #[case] modifier: &str,
    #[case] expected: &str,
) {
    let metastore = make_metastore().await;
    metastore
        .tables
        .create("t", CollectionType::PerKey, None)
        .await
        .unwrap();
    metastore
        .columns
        .create(&table("t"), "c", data_type)
        .await
        .unwrap();
    let initial_values = match initial {
        Some(value) => values(&[("c", value)]),
        None => values(&[]),
    };
    metastore
        .cells
        .add_row(&table("t"), Some("k"), &initial_values)
        .await
        .unwrap();

    assert_eq!(
        metastore
            .cells
            .modify_value(&table("t"), "c", &key("k"), modifier)
            .await
            .unwrap(),
        expected
    );

    // Same outcome as a read followed by a set
    assert_eq!(
        metastore
            .cells
            .get_value(&table("t"), "c", &key("k"))
            .await
            .unwrap(),
        (Some(expected.to_string()), data_type)
    );
}

#[rstest]
#[case::integer(DataType::Integer, "25", "-7", "18")]
#[case::decimal(DataType::Decimal, "0.25", "1.5", "1.75")]
#[tokio::test]
async fn test_two_modifies_match_one_set(
    #[case] data_type: DataType,
    #[case] x: &str,
    #[case] y: &str,
    #[case] sum: &str,
) {
    let metastore = make_metastore().await;
    metastore
        .tables
        .create("t", CollectionType::PerKey, None)
        .await
        .unwrap();
    metastore
        .columns
        .create(&table("t"), "c", data_type)
        .await
        .unwrap();
    for row_key in ["modified", "set"] {
        metastore
            .cells
            .add_row(&table("t"), Some(row_key), &values(&[]))
            .await
            .unwrap();
    }

    for modifier in [x, y] {
        metastore
            .cells
            .modify_value(&table("t"), "c", &key("modified"), modifier)
            .await
            .unwrap();
    }
    metastore
        .cells
        .set_value(&table("t"), "c", &key("set"), sum)
        .await
        .unwrap();

    let t = metastore.assemble_table(&table("t")).await.unwrap();
    assert_eq!(t.get("modified").unwrap().get("c"), Some(sum));
    assert_eq!(
        t.get("modified").unwrap().get("c"),
        t.get("set").unwrap().get("c")
    );
}

#[tokio::test]
async fn test_modify_errors() {
    let metastore = make_metastore().await;
    make_gold_table(&metastore).await;
    let gold = table("Gold");

    assert!(matches!(
        metastore
            .cells
            .modify_value(&gold, "Coins", &key("100"), "a few")
            .await
            .unwrap_err(),
        CatalogError::InvalidData { .. }
    ));

    metastore
        .cells
        .set_value(&gold, "Coins", &key("100"), &i64::MAX.to_string())
        .await
        .unwrap();
    assert!(matches!(
        metastore
            .cells
            .modify_value(&gold, "Coins", &key("100"), "1")
            .await
            .unwrap_err(),
        CatalogError::InvalidData { .. }
    ));

    assert!(matches!(
        metastore
            .cells
            .modify_value(&gold, "Coins", &RowSelector::Number(9), "1")
            .await
            .unwrap_err(),
        CatalogError::CellDoesNotExist { .. }
    ));
}

#[tokio::test]
async fn test_update_row_is_all_or_nothing() {
    let metastore = make_metastore().await;
    make_gold_table(&metastore).await;
    let gold = table("Gold");
    metastore
        .columns
        .create(&gold, "Title", DataType::Text)
        .await
        .unwrap();

    metastore
        .cells
        .update_row(&gold, &key("100"), &values(&[("Coins", "10"), ("Title", "Sir")]))
        .await
        .unwrap();

    // One bad value and neither cell changes
    assert!(matches!(
        metastore
            .cells
            .update_row(&gold, &key("100"), &values(&[("Coins", "ten"), ("Title", "Dame")]))
            .await
            .unwrap_err(),
        CatalogError::InvalidData { column, .. } if column == "Coins"
    ));
    assert!(matches!(
        metastore
            .cells
            .update_row(&gold, &key("100"), &values(&[("Gems", "1"), ("Title", "Dame")]))
            .await
            .unwrap_err(),
        CatalogError::ColumnDoesNotExist { .. }
    ));
    assert!(matches!(
        metastore
            .cells
            .update_row(&gold, &key("999"), &values(&[("Title", "Dame")]))
            .await
            .unwrap_err(),
        CatalogError::CellDoesNotExist { .. }
    ));
    // Nothing to write still needs the row to exist
    assert!(matches!(
        metastore
            .cells
            .update_row(&gold, &key("999"), &values(&[]))
            .await
            .unwrap_err(),
        CatalogError::CellDoesNotExist { row, .. } if row == "key \"999\""
    ));
    metastore
        .cells
        .update_row(&gold, &key("100"), &values(&[]))
        .await
        .unwrap();

    let row = metastore.assemble_table(&gold).await.unwrap();
    let row = row.get("100").unwrap();
    assert_eq!(row.get("Coins"), Some("10"));
    assert_eq!(row.get("Title"), Some("Sir"));
}

#[tokio::test]
async fn test_delete_row() {
    let metastore = make_metastore().await;
    make_gold_table(&metastore).await;
    let gold = table("Gold");

    assert!(matches!(
        metastore
            .cells
            .delete_row(&gold, &key("404"))
            .await
            .unwrap_err(),
        CatalogError::InvalidKey { .. }
    ));

    metastore.cells.delete_row(&gold, &key("100")).await.unwrap();

    // Every cell of the row went with it
    assert!(metastore.cells.list(&gold).await.unwrap().is_empty());
    assert!(matches!(
        metastore
            .assemble_table(&gold)
            .await
            .unwrap()
            .get("100")
            .unwrap_err(),
        CatalogError::KeyNotFound { .. }
    ));

    // The key is free again
    metastore
        .cells
        .add_row(&gold, Some("100"), &values(&[]))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_assembled_table_follows_renames() {
    let metastore = make_metastore().await;
    make_gold_table(&metastore).await;

    metastore
        .tables
        .rename(&table("Gold"), "Treasury")
        .await
        .unwrap();
    metastore
        .columns
        .rename(
            &ColumnRef::ByName(table("Treasury"), "Coins".to_string()),
            "Ducats",
        )
        .await
        .unwrap();

    let treasury = metastore.assemble_table(&table("Treasury")).await.unwrap();
    assert_eq!(treasury.definition.name, "Treasury");
    assert_eq!(treasury.get("100").unwrap().get("Ducats"), Some("50"));
    assert_eq!(to_csv(&treasury).unwrap(), "ID,Key,Ducats\n0,100,50\n");
}
