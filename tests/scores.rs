use phenomerge::df_utils::column_strings;
use phenomerge::error::MergeError;
use phenomerge::schema::normalize_key_column;
use phenomerge::scores::{expand_scores, pc_column_name};
use phenomerge::types::ParticipantTable;
use polars::df;
use polars::prelude::*;

fn pcs_table(cells: &[&str]) -> ParticipantTable {
    let ids: Vec<String> = (1..=cells.len()).map(|i| format!("100{i}")).collect();
    let df = df!(
        "s" => ids,
        "scores" => cells.to_vec(),
        "extra" => vec!["x"; cells.len()]
    )
    .expect("frame");
    ParticipantTable::new("pcs.tsv", df)
}

fn strings(table: &ParticipantTable, column: &str) -> Vec<String> {
    column_strings(table, column)
        .expect("column")
        .into_iter()
        .map(|v| v.expect("non-null"))
        .collect()
}

#[test]
fn vector_expands_into_numbered_columns() {
    let mut table = pcs_table(&["[0.1,0.2,0.3]"]);
    normalize_key_column(&mut table, "person_id").expect("rename");

    let expanded = expand_scores(&table, "person_id", "scores").expect("expand");

    assert_eq!(expanded.column_names(), vec!["person_id", "PC1", "PC2", "PC3"]);
    assert_eq!(strings(&expanded, "PC1"), vec!["0.1"]);
    assert_eq!(strings(&expanded, "PC2"), vec!["0.2"]);
    assert_eq!(strings(&expanded, "PC3"), vec!["0.3"]);
}

#[test]
fn expansion_round_trips_ignoring_whitespace() {
    let cells = ["[0.0123, -0.045,1e-3]", "[ -0.5,0.25 ,0 ]"];
    let mut table = pcs_table(&cells);
    normalize_key_column(&mut table, "person_id").expect("rename");
    let expanded = expand_scores(&table, "person_id", "scores").expect("expand");

    let components: Vec<Vec<String>> = (0..3)
        .map(|i| strings(&expanded, &pc_column_name(i)))
        .collect();
    for (row, original) in cells.iter().enumerate() {
        let rebuilt = format!(
            "[{}]",
            components
                .iter()
                .map(|c| c[row].as_str())
                .collect::<Vec<_>>()
                .join(",")
        );
        let squash = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
        assert_eq!(squash(&rebuilt), squash(original));
    }
}

#[test]
fn uneven_vectors_are_rejected() {
    let mut table = pcs_table(&["[0.1,0.2,0.3]", "[0.1,0.2]"]);
    normalize_key_column(&mut table, "person_id").expect("rename");

    let err = expand_scores(&table, "person_id", "scores").unwrap_err();
    match err {
        MergeError::InconsistentVectorLength {
            table,
            row,
            expected,
            found,
        } => {
            assert_eq!(table, "pcs.tsv");
            assert_eq!(row, 1);
            assert_eq!(expected, 3);
            assert_eq!(found, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn table_without_vector_column_is_unchanged() {
    let df = df!("person_id" => ["1"], "PC1" => ["0.1"]).expect("frame");
    let table = ParticipantTable::new("pcs", df);

    let out = expand_scores(&table, "person_id", "scores").expect("expand");
    assert_eq!(out.column_names(), vec!["person_id", "PC1"]);
    assert!(out.df.equals_missing(&table.df));
}

#[test]
fn first_column_rename_is_idempotent() {
    let mut table = pcs_table(&["[1]"]);
    assert_eq!(
        normalize_key_column(&mut table, "person_id").expect("rename"),
        Some("s".to_string())
    );
    assert_eq!(normalize_key_column(&mut table, "person_id").expect("again"), None);
    assert_eq!(table.column_names()[0], "person_id");
}

#[test]
fn rename_refuses_to_duplicate_the_key() {
    let df = df!("s" => ["1"], "person_id" => ["1"]).expect("frame");
    let mut table = ParticipantTable::new("pcs", df);
    let err = normalize_key_column(&mut table, "person_id").unwrap_err();
    assert!(matches!(err, MergeError::InvalidArgument(_)));
}
