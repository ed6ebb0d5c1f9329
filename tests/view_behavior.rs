//! Purpose: Exercise the read-only record view through the public API.
//! Role: Sorting, searching, and metadata export over a cached reader.

use csvcache::api::{
    CachedCsvReader, Column, ColumnKind, CsvReader, ErrorKind, MissingFieldAction, ReaderOptions,
    RecordView, SortDirection,
};

const PEOPLE: &str = "name,city,age\nann,Oslo,31\nbob,Bergen,25\ncy,Oslo,40\ndi,Athens,25\n";

fn cache(text: &str, options: ReaderOptions) -> CachedCsvReader<csvcache::api::StrSource> {
    CachedCsvReader::new(CsvReader::from_text(text, options).expect("reader"))
}

fn names(view: &mut RecordView<'_, csvcache::api::StrSource>) -> Vec<String> {
    view.records()
        .expect("records")
        .map(|record| record.get(0).unwrap_or_default().to_string())
        .collect()
}

#[test]
fn sort_by_city_keeps_original_order_for_ties() {
    let mut cache = cache(PEOPLE, ReaderOptions::new());
    let mut view = RecordView::new(&mut cache);
    view.sort_by_name("city", SortDirection::Ascending).expect("sort");
    assert_eq!(names(&mut view), ["di", "bob", "ann", "cy"]);
    assert!(view.is_sorted());
    assert_eq!(view.sort_column(), Some(1));
}

#[test]
fn sort_compares_text_ordinally() {
    let mut cache = cache("n\n10\n9\n100\n", ReaderOptions::new());
    let mut view = RecordView::new(&mut cache);
    view.sort(0, SortDirection::Ascending).expect("sort");
    assert_eq!(names(&mut view), ["10", "100", "9"]);
    view.sort(0, SortDirection::Descending).expect("resort");
    assert_eq!(names(&mut view), ["9", "100", "10"]);
}

#[test]
fn find_returns_view_position() {
    let mut cache = cache(PEOPLE, ReaderOptions::new());
    let mut view = RecordView::new(&mut cache);
    assert_eq!(view.find_by_name("age", "25").expect("find"), Some(1));
    view.sort_by_name("name", SortDirection::Descending).expect("sort");
    assert_eq!(view.find_by_name("age", "25").expect("find"), Some(0));
    assert_eq!(view.find_by_name("city", "oslo").expect("case sensitive"), None);
    assert_eq!(
        view.find_by_name("zip", "x").unwrap_err().kind(),
        ErrorKind::InvalidConfig
    );
}

#[test]
fn removing_sort_restores_source_order() {
    let mut cache = cache(PEOPLE, ReaderOptions::new());
    let mut view = RecordView::new(&mut cache);
    view.sort(2, SortDirection::Descending).expect("sort");
    view.remove_sort();
    assert_eq!(names(&mut view), ["ann", "bob", "cy", "di"]);
    assert_eq!(view.sort_direction(), None);
    assert_eq!(view.len().expect("len"), 4);
}

#[test]
fn nulls_sort_before_text() {
    let options = ReaderOptions::new().with_missing_field_action(MissingFieldAction::ReplaceByNull);
    let mut cache = cache("k,v\na,2\nb\nc,1\n", options);
    let mut view = RecordView::new(&mut cache);
    view.sort(1, SortDirection::Ascending).expect("sort");
    assert_eq!(names(&mut view), ["b", "c", "a"]);
}

#[test]
fn properties_reflect_declared_kinds() {
    let options = ReaderOptions::new().with_columns(vec![
        Column::new("", ColumnKind::Text),
        Column::new("", ColumnKind::Text),
        Column::new("years", ColumnKind::Int32),
    ]);
    let mut cache = cache(PEOPLE, options);
    let mut view = RecordView::new(&mut cache);
    let properties = view.properties().expect("properties");
    let summary: Vec<(String, usize, ColumnKind)> = properties
        .iter()
        .map(|p| (p.name.clone(), p.ordinal, p.kind))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("name".to_string(), 0, ColumnKind::Text),
            ("city".to_string(), 1, ColumnKind::Text),
            ("years".to_string(), 2, ColumnKind::Int32),
        ]
    );
    let first = view.get(0).expect("first").clone();
    assert_eq!(properties[2].value(&first), Some("31"));
}

#[test]
fn view_rejects_mutation() {
    let mut cache = cache(PEOPLE, ReaderOptions::new());
    let mut view = RecordView::new(&mut cache);
    assert_eq!(view.set(0, csvcache::api::Record::from_strs(&["x"])).unwrap_err().kind(), ErrorKind::NotSupported);
}
