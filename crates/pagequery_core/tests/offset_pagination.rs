use pagequery_core::db::open_db_in_memory;
use pagequery_core::{
    Catalog, EntitySchema, FieldValue, Filter, FilterClause, PageRequest, QueryEngine, QueryError,
    Record, RecordWriter, SortDirection, SqliteRecordStore,
};
use rusqlite::Connection;

#[test]
fn last_partial_page_reports_page_math() {
    let conn = open_db_in_memory().unwrap();
    let schema = membros_schema();
    seed_membros(&conn, &schema, 25);
    let store = SqliteRecordStore::new(&conn);

    let page = QueryEngine::default()
        .query_page(
            &store,
            &schema,
            &Filter::new(),
            &PageRequest::offset(20, 10),
            "id",
            SortDirection::Asc,
        )
        .unwrap();

    assert_eq!(ids(&page.data), (21..=25).collect::<Vec<_>>());
    let meta = page.offset_pagination().unwrap();
    assert_eq!(meta.total, 25);
    assert_eq!(meta.current_page, 3);
    assert_eq!(meta.total_pages, 3);
    assert_eq!(meta.page_size, 10);
}

#[test]
fn exact_multiple_total_has_no_phantom_page() {
    let conn = open_db_in_memory().unwrap();
    let schema = membros_schema();
    seed_membros(&conn, &schema, 20);
    let store = SqliteRecordStore::new(&conn);

    let page = QueryEngine::default()
        .query_page(
            &store,
            &schema,
            &Filter::new(),
            &PageRequest::offset(10, 10),
            "id",
            SortDirection::Asc,
        )
        .unwrap();

    let meta = page.offset_pagination().unwrap();
    assert_eq!(meta.total_pages, 2);
    assert_eq!(meta.current_page, 2);
    assert_eq!(page.len(), 10);
}

#[test]
fn empty_match_set_has_zero_pages() {
    let conn = open_db_in_memory().unwrap();
    let schema = membros_schema();
    seed_membros(&conn, &schema, 5);
    let store = SqliteRecordStore::new(&conn);

    let filter = Filter::new().with(FilterClause::contains("nome", "nobody"));
    let page = QueryEngine::default()
        .query_page(
            &store,
            &schema,
            &filter,
            &PageRequest::offset(0, 10),
            "id",
            SortDirection::Asc,
        )
        .unwrap();

    assert!(page.is_empty());
    let meta = page.offset_pagination().unwrap();
    assert_eq!(meta.total, 0);
    assert_eq!(meta.total_pages, 0);
    assert_eq!(meta.current_page, 1);
}

#[test]
fn offset_beyond_total_returns_empty_data_with_real_total() {
    let conn = open_db_in_memory().unwrap();
    let schema = membros_schema();
    seed_membros(&conn, &schema, 7);
    let store = SqliteRecordStore::new(&conn);

    let page = QueryEngine::default()
        .query_page(
            &store,
            &schema,
            &Filter::new(),
            &PageRequest::offset(50, 10),
            "id",
            SortDirection::Asc,
        )
        .unwrap();

    assert!(page.is_empty());
    let meta = page.offset_pagination().unwrap();
    assert_eq!(meta.total, 7);
    assert_eq!(meta.current_page, 6);
    assert_eq!(meta.total_pages, 1);
}

#[test]
fn limit_one_pages_through_every_record() {
    let conn = open_db_in_memory().unwrap();
    let schema = membros_schema();
    seed_membros(&conn, &schema, 4);
    let store = SqliteRecordStore::new(&conn);
    let engine = QueryEngine::default();

    let mut seen = Vec::new();
    for offset in 0..4 {
        let page = engine
            .query_page(
                &store,
                &schema,
                &Filter::new(),
                &PageRequest::offset(offset, 1),
                "id",
                SortDirection::Asc,
            )
            .unwrap();
        assert_eq!(page.offset_pagination().unwrap().total_pages, 4);
        seen.extend(ids(&page.data));
    }

    assert_eq!(seen, vec![1, 2, 3, 4]);
}

#[test]
fn non_key_sort_breaks_ties_by_key() {
    let conn = open_db_in_memory().unwrap();
    let schema = membros_schema();
    let mut writer = SqliteRecordStore::new(&conn);
    for (nome, idade) in [("Caio", 30), ("Ana", 30), ("Bia", 20), ("Duda", 30)] {
        writer
            .insert(&schema, &membro(nome).with("idade", idade))
            .unwrap();
    }
    let store = SqliteRecordStore::new(&conn);

    let page = QueryEngine::default()
        .query_page(
            &store,
            &schema,
            &Filter::new(),
            &PageRequest::offset(0, 10),
            "idade",
            SortDirection::Desc,
        )
        .unwrap();

    // idade 30 (ids 1, 2, 4 by key), then idade 20.
    assert_eq!(ids(&page.data), vec![1, 2, 4, 3]);
}

#[test]
fn unknown_sort_field_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let schema = membros_schema();
    let store = SqliteRecordStore::new(&conn);

    let err = QueryEngine::default()
        .query_page(
            &store,
            &schema,
            &Filter::new(),
            &PageRequest::offset(0, 10),
            "senha",
            SortDirection::Asc,
        )
        .unwrap_err();

    assert!(matches!(err, QueryError::InvalidArgument(_)));
}

fn membros_schema() -> EntitySchema {
    Catalog::builtin()
        .unwrap()
        .entity("membros")
        .unwrap()
        .clone()
}

fn membro(nome: &str) -> Record {
    Record::new()
        .with("nome", nome)
        .with("email", format!("{}@example.com", nome.to_lowercase()))
}

fn seed_membros(conn: &Connection, schema: &EntitySchema, count: usize) {
    let mut store = SqliteRecordStore::new(conn);
    for index in 1..=count {
        store
            .insert(schema, &membro(&format!("Membro {index:02}")))
            .unwrap();
    }
}

fn ids(records: &[Record]) -> Vec<i64> {
    records
        .iter()
        .map(|record| match record.value("id") {
            FieldValue::Integer(id) => *id,
            other => panic!("unexpected id {other:?}"),
        })
        .collect()
}
