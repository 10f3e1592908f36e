use crate::catalog::*;

#[tokio::test]
async fn test_table_lifecycle() {
    let metastore = make_metastore().await;

    let gold = metastore
        .tables
        .create("Gold!!", CollectionType::PerUser, Some(42))
        .await
        .unwrap();
    assert_eq!(gold.name, "Gold");
    assert_eq!(gold.collection_type, CollectionType::PerUser);
    assert_eq!(gold.external_id, Some(42));

    // All three ways of pointing at it agree
    for table_ref in [
        TableRef::ById(gold.id),
        table("Gold"),
        table("Gold!!"),
        TableRef::ByExternalId(42),
    ] {
        assert_eq!(metastore.tables.get(&table_ref).await.unwrap(), gold);
    }

    let renamed = metastore
        .tables
        .rename(&TableRef::ByExternalId(42), "Silver?")
        .await
        .unwrap();
    assert_eq!(renamed.name, "Silver");
    assert!(matches!(
        metastore.tables.get(&table("Gold")).await.unwrap_err(),
        CatalogError::TableDoesNotExist { .. }
    ));

    // Clearing the external id
    let cleared = metastore
        .tables
        .set_external_id(&table("Silver"), None)
        .await
        .unwrap();
    assert_eq!(cleared.external_id, None);
    assert!(matches!(
        metastore
            .tables
            .get(&TableRef::ByExternalId(42))
            .await
            .unwrap_err(),
        CatalogError::TableDoesNotExist { .. }
    ));

    metastore.tables.delete(&table("Silver")).await.unwrap();
    assert!(metastore.tables.list().await.unwrap().is_empty());
    assert!(matches!(
        metastore.tables.delete(&table("Silver")).await.unwrap_err(),
        CatalogError::TableDoesNotExist { .. }
    ));
}

#[tokio::test]
async fn test_external_id_full_range() {
    let metastore = make_metastore().await;

    let table = metastore
        .tables
        .create("snowflake", CollectionType::PerRole, Some(u64::MAX))
        .await
        .unwrap();
    assert_eq!(
        metastore
            .tables
            .get(&TableRef::ByExternalId(u64::MAX))
            .await
            .unwrap(),
        table
    );
}

#[rstest]
#[case::duplicate_name("Gold", None)]
#[case::duplicate_name_after_normalization("Gold??", None)]
#[case::duplicate_external_id("Platinum", Some(7))]
#[tokio::test]
async fn test_create_table_already_exists(
    #[case] name: &str,
    #[case] external_id: Option<u64>,
) {
    let metastore = make_metastore().await;
    metastore
        .tables
        .create("Gold", CollectionType::PerKey, Some(7))
        .await
        .unwrap();

    let error = metastore
        .tables
        .create(name, CollectionType::PerKey, external_id)
        .await
        .unwrap_err();
    assert!(
        matches!(error, CatalogError::TableAlreadyExists { .. }),
        "{error:?}"
    );
    assert_eq!(metastore.tables.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_names() {
    let metastore = make_metastore().await;

    assert!(matches!(
        metastore
            .tables
            .create("!!!", CollectionType::PerKey, None)
            .await
            .unwrap_err(),
        CatalogError::InvalidName { .. }
    ));

    make_gold_table(&metastore).await;

    // A failed rename leaves the old name in place
    assert!(matches!(
        metastore
            .tables
            .rename(&table("Gold"), "$$ $$")
            .await
            .unwrap_err(),
        CatalogError::InvalidName { .. }
    ));
    assert_eq!(
        metastore.tables.get(&table("Gold")).await.unwrap().name,
        "Gold"
    );

    assert!(matches!(
        metastore
            .columns
            .create(&table("Gold"), "   ", DataType::Text)
            .await
            .unwrap_err(),
        CatalogError::InvalidName { .. }
    ));
    assert!(matches!(
        metastore
            .columns
            .rename(&ColumnRef::ByName(table("Gold"), "Coins".to_string()), "%")
            .await
            .unwrap_err(),
        CatalogError::InvalidName { .. }
    ));
    assert_eq!(
        metastore
            .columns
            .get(&ColumnRef::ByName(table("Gold"), "Coins".to_string()))
            .await
            .unwrap()
            .name,
        "Coins"
    );
}

#[tokio::test]
async fn test_names_in_other_scripts() {
    let metastore = make_metastore().await;

    let definition = metastore
        .tables
        .create("Золото!", CollectionType::PerKey, None)
        .await
        .unwrap();
    assert_eq!(definition.name, "Золото");

    let column = metastore
        .columns
        .create(&table("Золото"), "金貨 $", DataType::Integer)
        .await
        .unwrap();
    assert_eq!(column.name, "金貨");
    assert!(metastore
        .columns
        .get(&ColumnRef::ByName(table("Золото"), "金貨".to_string()))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_rename_table_onto_existing() {
    let metastore = make_metastore().await;
    make_gold_table(&metastore).await;
    metastore
        .tables
        .create("Silver", CollectionType::PerKey, None)
        .await
        .unwrap();

    assert!(matches!(
        metastore
            .tables
            .rename(&table("Silver"), "Gold")
            .await
            .unwrap_err(),
        CatalogError::TableAlreadyExists { name } if name == "Gold"
    ));
}

#[tokio::test]
async fn test_column_lifecycle() {
    let metastore = make_metastore().await;
    make_gold_table(&metastore).await;
    metastore
        .cells
        .add_row(&table("Gold"), Some("200"), &values(&[]))
        .await
        .unwrap();

    // Backfill: every existing row gets an empty cell in the new column
    let bank = metastore
        .columns
        .create(&table("Gold"), "Bank", DataType::Decimal)
        .await
        .unwrap();
    for key in ["100", "200"] {
        assert_eq!(
            metastore
                .cells
                .get_value(&table("Gold"), "Bank", &RowSelector::Key(key.to_string()))
                .await
                .unwrap(),
            (None, DataType::Decimal)
        );
    }

    let vault = metastore
        .columns
        .rename(&ColumnRef::ById(bank.id), "Vault")
        .await
        .unwrap();
    assert_eq!(vault.id, bank.id);
    assert_eq!(vault.name, "Vault");

    // Column names are unique per table
    assert!(matches!(
        metastore
            .columns
            .rename(&ColumnRef::ByName(table("Gold"), "Coins".to_string()), "Vault")
            .await
            .unwrap_err(),
        CatalogError::ColumnAlreadyExists { .. }
    ));
    assert!(matches!(
        metastore
            .columns
            .create(&table("Gold"), "Coins", DataType::Text)
            .await
            .unwrap_err(),
        CatalogError::ColumnAlreadyExists { .. }
    ));

    assert_eq!(
        metastore
            .columns
            .list(&table("Gold"))
            .await
            .unwrap()
            .into_iter()
            .map(|c| (c.name, c.data_type))
            .collect::<Vec<_>>(),
        vec![
            ("Coins".to_string(), DataType::Integer),
            ("Vault".to_string(), DataType::Decimal)
        ]
    );

    metastore
        .columns
        .delete(&ColumnRef::ByName(table("Gold"), "Vault".to_string()))
        .await
        .unwrap();
    assert!(matches!(
        metastore
            .cells
            .get_value(&table("Gold"), "Vault", &RowSelector::Number(0))
            .await
            .unwrap_err(),
        CatalogError::ColumnDoesNotExist { .. }
    ));
    assert!(matches!(
        metastore
            .columns
            .get(&ColumnRef::ById(bank.id))
            .await
            .unwrap_err(),
        CatalogError::ColumnDoesNotExist { .. }
    ));

    // The remaining column is untouched
    assert_eq!(
        metastore
            .cells
            .get_value(&table("Gold"), "Coins", &RowSelector::Number(0))
            .await
            .unwrap()
            .0
            .as_deref(),
        Some("50")
    );
}

#[tokio::test]
async fn test_column_on_missing_table() {
    let metastore = make_metastore().await;

    assert!(matches!(
        metastore
            .columns
            .create(&table("Nowhere"), "Coins", DataType::Integer)
            .await
            .unwrap_err(),
        CatalogError::TableDoesNotExist { name } if name == "Nowhere"
    ));
    assert!(matches!(
        metastore.columns.list(&TableRef::ById(1234)).await.unwrap_err(),
        CatalogError::TableDoesNotExist { .. }
    ));
}

#[tokio::test]
async fn test_recreated_column_starts_empty() {
    let metastore = make_metastore().await;
    make_gold_table(&metastore).await;

    let coins = ColumnRef::ByName(table("Gold"), "Coins".to_string());
    metastore.columns.delete(&coins).await.unwrap();
    metastore
        .columns
        .create(&table("Gold"), "Coins", DataType::Integer)
        .await
        .unwrap();

    assert_eq!(
        metastore
            .cells
            .get_value(&table("Gold"), "Coins", &RowSelector::Key("100".to_string()))
            .await
            .unwrap(),
        (None, DataType::Integer)
    );
}

#[tokio::test]
async fn test_delete_table_cascades() {
    let metastore = make_metastore().await;
    make_gold_table(&metastore).await;

    metastore.tables.delete(&table("Gold")).await.unwrap();

    // A new table under the same name inherits nothing
    metastore
        .tables
        .create("Gold", CollectionType::PerUser, None)
        .await
        .unwrap();
    assert!(metastore.columns.list(&table("Gold")).await.unwrap().is_empty());
    assert!(metastore.cells.list(&table("Gold")).await.unwrap().is_empty());

    let assembled = metastore.assemble_table(&table("Gold")).await.unwrap();
    assert!(assembled.rows.is_empty());
    assert_eq!(to_csv(&assembled).unwrap(), "ID,Key\n");
}

#[tokio::test]
async fn test_list_columns_are_reserved() {
    let metastore = make_metastore().await;
    make_gold_table(&metastore).await;

    // Declaring one works, but nothing can be stored in it
    metastore
        .columns
        .create(&table("Gold"), "Badges", DataType::TextList)
        .await
        .unwrap();
    assert!(matches!(
        metastore
            .cells
            .set_value(
                &table("Gold"),
                "Badges",
                &RowSelector::Key("100".to_string()),
                "gold-star"
            )
            .await
            .unwrap_err(),
        CatalogError::InvalidData { .. }
    ));

    let assembled = metastore.assemble_table(&table("Gold")).await.unwrap();
    assert!(matches!(
        to_csv(&assembled).unwrap_err(),
        CatalogError::NotImplemented { .. }
    ));
}
