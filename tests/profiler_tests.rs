//! End-to-end profiling runs against the in-memory catalog

use futures::StreamExt;
use std::collections::BTreeSet;
use table_profiler::{
    row, Catalog, ColumnDefinition, Decimal, MemoryCatalog, Profiler, ProfilerError, Result, Row,
    TypeTag, Value,
};

async fn seeded_users() -> Result<MemoryCatalog> {
    let catalog = MemoryCatalog::new();
    catalog
        .create_table(
            "users",
            &[
                ColumnDefinition::new("age", TypeTag::Integer),
                ColumnDefinition::new("name", TypeTag::Text),
            ],
        )
        .await?;
    catalog
        .insert_row("users", &row([("age", Value::Integer(30)), ("name", Value::from("Al"))]))
        .await?;
    catalog
        .insert_row("users", &row([("age", Value::Integer(40)), ("name", Value::from("Bo"))]))
        .await?;
    Ok(catalog)
}

async fn profile_rows(catalog: &MemoryCatalog, table: &str) -> Result<Vec<Row>> {
    let stream = catalog.select_all(table, &Row::new()).await?;
    stream.collect::<Vec<_>>().await.into_iter().collect()
}

async fn column_names(catalog: &MemoryCatalog, table: &str) -> Result<BTreeSet<String>> {
    Ok(catalog
        .table_columns(table)
        .await?
        .into_iter()
        .map(|c| c.name)
        .collect())
}

#[tokio::test]
async fn test_profile_users() -> Result<()> {
    let catalog = seeded_users().await?;
    Profiler::new(&catalog).profile_tables(["users"]).await?;

    let expected: BTreeSet<String> = [
        "id",
        "age_maximum",
        "age_minimum",
        "age_average",
        "name_max_length",
        "name_avg_length",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    assert_eq!(column_names(&catalog, "users_profile").await?, expected);

    let rows = profile_rows(&catalog, "users_profile").await?;
    assert_eq!(rows.len(), 1);
    let profile = &rows[0];
    assert_eq!(profile["age_maximum"], Value::Decimal(Decimal::from(40)));
    assert_eq!(profile["age_minimum"], Value::Decimal(Decimal::from(30)));
    assert_eq!(profile["age_average"], Value::Decimal(Decimal::from(35)));
    assert_eq!(profile["name_max_length"], Value::Integer(2));
    assert_eq!(profile["name_avg_length"], Value::Float(2.0));

    Ok(())
}

#[tokio::test]
async fn test_profile_summary() -> Result<()> {
    let catalog = seeded_users().await?;
    let summary = Profiler::new(&catalog).profile_table("Users").await?;

    assert_eq!(summary.source_table, "Users");
    assert_eq!(summary.profile_table, "users_profile");
    assert_eq!(summary.row_id, 1);
    assert_eq!(summary.values.len(), 5);

    Ok(())
}

#[tokio::test]
async fn test_missing_table_is_not_found() {
    let catalog = MemoryCatalog::new();
    let err = Profiler::new(&catalog)
        .profile_tables(["ghosts"])
        .await
        .unwrap_err();

    assert!(matches!(err, ProfilerError::NotFound(_)));
    assert!(!catalog.table_exists("ghosts_profile").await.unwrap());
}

#[tokio::test]
async fn test_repeated_runs_append_rows() -> Result<()> {
    let catalog = seeded_users().await?;
    let profiler = Profiler::new(&catalog);

    profiler.profile_tables(["users"]).await?;
    profiler.profile_tables(["users"]).await?;

    let rows = profile_rows(&catalog, "users_profile").await?;
    assert_eq!(rows.len(), 2);

    let strip_id = |r: &Row| {
        let mut r = r.clone();
        r.remove("id");
        r
    };
    assert_eq!(strip_id(&rows[0]), strip_id(&rows[1]));
    assert_ne!(rows[0]["id"], rows[1]["id"]);

    Ok(())
}

#[tokio::test]
async fn test_profile_columns_only_grow() -> Result<()> {
    let catalog = seeded_users().await?;
    let profiler = Profiler::new(&catalog);
    profiler.profile_tables(["users"]).await?;
    let before = column_names(&catalog, "users_profile").await?;

    catalog
        .add_column("users", &ColumnDefinition::new("nickname", TypeTag::Varchar))
        .await?;
    profiler.profile_tables(["users"]).await?;
    let after = column_names(&catalog, "users_profile").await?;

    assert!(before.is_subset(&after));
    assert!(after.contains("nickname_max_length"));
    assert!(after.contains("nickname_avg_length"));
    assert_eq!(after.len(), before.len() + 2);

    // The first row predates the new columns
    let rows = profile_rows(&catalog, "users_profile").await?;
    assert_eq!(rows[0]["nickname_max_length"], Value::Null);

    Ok(())
}

#[tokio::test]
async fn test_unsupported_columns_are_skipped() -> Result<()> {
    let catalog = MemoryCatalog::new();
    catalog
        .create_table(
            "events",
            &[
                ColumnDefinition::new("payload", TypeTag::Unsupported("jsonb".into())),
                ColumnDefinition::new("happened", TypeTag::Unsupported("timestamptz".into())),
            ],
        )
        .await?;
    catalog.insert_row("events", &Row::new()).await?;

    let summary = Profiler::new(&catalog).profile_table("events").await?;
    assert!(summary.values.is_empty());
    assert_eq!(column_names(&catalog, "events_profile").await?.len(), 1);
    assert_eq!(catalog.row_count("events_profile").await?, 1);

    Ok(())
}

#[tokio::test]
async fn test_empty_table_yields_nulls() -> Result<()> {
    let catalog = MemoryCatalog::new();
    catalog
        .create_table("orders", &[ColumnDefinition::new("total", TypeTag::Double)])
        .await?;

    let summary = Profiler::new(&catalog).profile_table("orders").await?;
    assert_eq!(summary.values["total_maximum"], Value::Null);
    assert_eq!(summary.values["total_average"], Value::Null);

    Ok(())
}

#[tokio::test]
async fn test_batch_fails_fast() -> Result<()> {
    let catalog = seeded_users().await?;
    catalog
        .create_table("orders", &[ColumnDefinition::new("total", TypeTag::Double)])
        .await?;

    let err = Profiler::new(&catalog)
        .profile_tables(["users", "ghosts", "orders"])
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert!(catalog.table_exists("users_profile").await?);
    assert!(!catalog.table_exists("orders_profile").await?);

    Ok(())
}

#[tokio::test]
async fn test_nulls_are_ignored_by_aggregates() -> Result<()> {
    let catalog = seeded_users().await?;
    catalog.insert_row("users", &row([("age", Value::Null)])).await?;

    let summary = Profiler::new(&catalog).profile_table("users").await?;
    assert_eq!(summary.values["age_average"], Value::Decimal(Decimal::from(35)));
    assert_eq!(summary.values["name_max_length"], Value::Integer(2));

    Ok(())
}

#[tokio::test]
async fn test_bigint_metrics_keep_every_digit() -> Result<()> {
    let catalog = MemoryCatalog::new();
    catalog
        .create_table("ledger", &[ColumnDefinition::new("amount", TypeTag::BigInt)])
        .await?;
    for amount in [9_007_199_254_740_993_i64, 9_007_199_254_740_991] {
        catalog
            .insert_row("ledger", &row([("amount", Value::Integer(amount))]))
            .await?;
    }

    let summary = Profiler::new(&catalog).profile_table("ledger").await?;
    assert_eq!(
        summary.values["amount_maximum"],
        Value::Decimal(Decimal::from(9_007_199_254_740_993_i64))
    );
    assert_eq!(
        summary.values["amount_minimum"],
        Value::Decimal(Decimal::from(9_007_199_254_740_991_i64))
    );
    assert_eq!(
        summary.values["amount_average"],
        Value::Decimal(Decimal::from(9_007_199_254_740_992_i64))
    );

    Ok(())
}

#[tokio::test]
async fn test_numeric_fractions_average_exactly() -> Result<()> {
    let catalog = MemoryCatalog::new();
    catalog
        .create_table("prices", &[ColumnDefinition::new("cost", TypeTag::Numeric)])
        .await?;
    for cost in [Decimal::new(10, 1), Decimal::new(20, 1)] {
        catalog
            .insert_row("prices", &row([("cost", Value::Decimal(cost))]))
            .await?;
    }

    let summary = Profiler::new(&catalog).profile_table("prices").await?;
    assert_eq!(summary.values["cost_average"], Value::Decimal(Decimal::new(15, 1)));

    let rows = profile_rows(&catalog, "prices_profile").await?;
    assert_eq!(rows[0]["cost_maximum"], Value::Decimal(Decimal::new(2, 0)));

    Ok(())
}

#[tokio::test]
async fn test_schema_qualified_source_table() -> Result<()> {
    let catalog = seeded_users().await?;
    assert!(catalog.table_exists("public.users").await?);
    assert!(catalog.column_exists("public.users", "age").await?);

    let summary = Profiler::new(&catalog).profile_table("public.users").await?;
    assert_eq!(summary.values["age_maximum"], Value::Decimal(Decimal::from(40)));
    assert!(catalog.table_exists("users_profile").await?);

    Ok(())
}
