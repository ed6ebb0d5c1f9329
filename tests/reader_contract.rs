//! Purpose: Pin the forward-reader contract through the public API.
//! Role: Covers the canonical decoding scenarios and buffer-size invariance.
//! Invariants: Decoded records never depend on where buffer refills fall.

use csvcache::api::{
    CsvReader, ErrorKind, MissingFieldAction, ParseErrorAction, ReadSource, ReaderHooks,
    ReaderOptions, RecordStream, TrimmingOptions,
};

fn read_all(text: &str, options: ReaderOptions) -> Vec<Vec<Option<String>>> {
    let mut reader = CsvReader::from_text(text, options).expect("reader");
    let mut rows = Vec::new();
    while reader.read_next_record().expect("record") {
        rows.push(reader.record().expect("current").to_vec());
    }
    rows
}

fn row(values: &[&str]) -> Vec<Option<String>> {
    values.iter().map(|value| Some(value.to_string())).collect()
}

#[test]
fn headers_and_records_in_order() {
    let mut reader =
        CsvReader::from_text("a,b,c\n1,2,3\n4,5,6", ReaderOptions::new()).expect("reader");
    assert!(reader.read_next_record().expect("first"));
    assert_eq!(reader.header_names().expect("headers"), ["a", "b", "c"]);
    assert_eq!(reader.current_record_index(), 0);
    assert_eq!(reader.record().expect("record").to_vec(), row(&["1", "2", "3"]));
    assert!(reader.read_next_record().expect("second"));
    assert_eq!(reader.current_record_index(), 1);
    assert_eq!(reader.field_by_name("c").expect("c"), Some("6"));
    assert!(!reader.read_next_record().expect("end"));
    assert!(reader.end_of_stream());
}

#[test]
fn quoted_delimiter_is_preserved() {
    let rows = read_all("a,\"b,c\",d", ReaderOptions::new().with_headers(false));
    assert_eq!(rows, vec![row(&["a", "b,c", "d"])]);
}

#[test]
fn doubled_quote_decodes_to_literal() {
    let rows = read_all("a,\"b\"\"c\",d", ReaderOptions::new().with_headers(false));
    assert_eq!(rows[0][1].as_deref(), Some("b\"c"));
}

#[test]
fn short_record_padded_with_empty_strings() {
    let options =
        ReaderOptions::new().with_missing_field_action(MissingFieldAction::ReplaceByEmpty);
    let mut reader = CsvReader::from_text("x,y,z\n1,2\n", options).expect("reader");
    assert!(reader.read_next_record().expect("record"));
    assert_eq!(reader.field(2).expect("filler"), Some(""));
    assert!(reader.missing_field_flag());
}

#[test]
fn comment_lines_do_not_advance_record_index() {
    let mut reader =
        CsvReader::from_text("h\n# skipped\nv1\n#also\nv2\n", ReaderOptions::new()).expect("reader");
    let mut seen = Vec::new();
    while reader.read_next_record().expect("record") {
        seen.push((
            reader.current_record_index(),
            reader.field(0).expect("field").map(str::to_string),
        ));
    }
    assert_eq!(
        seen,
        vec![(0, Some("v1".to_string())), (1, Some("v2".to_string()))]
    );
}

#[test]
fn embedded_line_breaks_do_not_change_record_count() {
    let rows = read_all("k,v\n1,\"line one\nline two\"\n2,x\n", ReaderOptions::new());
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][1].as_deref(), Some("line one\nline two"));
}

#[test]
fn distinct_escape_character_decodes_quotes() {
    let options = ReaderOptions::new().with_headers(false).with_escape('\\');
    let rows = read_all(r#""say \"hi\"",2"#, options);
    assert_eq!(rows, vec![row(&["say \"hi\"", "2"])]);
}

#[test]
fn decoding_is_invariant_to_buffer_size() {
    let input = "id, name ,note\n1,\"Smith, J\",\"said \"\"hi\"\"\"\n# comment\n\n2,  plain  ,\"multi\r\nline\"\r\n3,,\"\"\n";
    let expected = read_all(input, ReaderOptions::new());
    assert_eq!(expected.len(), 3);
    assert_eq!(expected[0], row(&["1", "Smith, J", "said \"hi\""]));
    assert_eq!(expected[1], row(&["2", "plain", "multi\r\nline"]));
    assert_eq!(expected[2], row(&["3", "", ""]));
    for size in 1..=input.chars().count() + 1 {
        let rows = read_all(input, ReaderOptions::new().with_buffer_size(size));
        assert_eq!(rows, expected, "buffer size {size}");
    }
}

#[test]
fn trimming_is_invariant_at_refill_boundaries() {
    // Whitespace runs straddle every possible refill position.
    let input = "\"  a  \",   b   ,\" \tc\t \"\n";
    let cases = [
        (TrimmingOptions::None, ["  a  ", "   b   ", " \tc\t "]),
        (TrimmingOptions::UnquotedOnly, ["  a  ", "b", " \tc\t "]),
        (TrimmingOptions::QuotedOnly, ["a", "   b   ", "c"]),
        (TrimmingOptions::All, ["a", "b", "c"]),
    ];
    for (trimming, expected) in cases {
        for size in 1..=input.len() {
            let options = ReaderOptions::new()
                .with_headers(false)
                .with_trimming(trimming)
                .with_buffer_size(size);
            assert_eq!(
                read_all(input, options),
                vec![row(&expected)],
                "{trimming:?} with buffer size {size}"
            );
        }
    }
}

#[test]
fn byte_reader_decodes_utf8_across_chunks() {
    let text = "név,város\nÁrpád,Győr\n";
    for size in 1..=8 {
        let source = ReadSource::new(text.as_bytes());
        let mut reader = CsvReader::new(source, ReaderOptions::new().with_buffer_size(size))
            .expect("reader");
        assert!(reader.read_next_record().expect("record"));
        assert_eq!(reader.field_by_name("VÁROS").expect("field"), Some("Győr"));
    }
}

#[test]
fn malformed_quote_throws_with_location() {
    let mut reader = CsvReader::from_text("a,b\n1,\"x\"y\n", ReaderOptions::new()).expect("reader");
    let err = reader.read_next_record().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Malformed);
    assert!(err.kind().is_malformed());
    assert_eq!(err.record(), Some(0));
    assert_eq!(err.field(), Some(1));
    assert!(err.raw().is_some());
}

#[test]
fn parse_error_hook_can_skip_lines() {
    let hooks = ReaderHooks::new().on_parse_error(|_, _| ParseErrorAction::AdvanceToNextLine);
    let options = ReaderOptions::new().with_parse_error_action(ParseErrorAction::RaiseEvent);
    let mut reader = CsvReader::with_hooks(
        csvcache::api::StrSource::new("a,b\n1\n\"bad\"x,2\n3,4\n"),
        options,
        hooks,
    )
    .expect("reader");
    assert!(reader.read_next_record().expect("record"));
    assert_eq!(reader.field(0).expect("field"), Some("3"));
    assert!(reader.parse_error_flag());
    assert_eq!(reader.current_record_index(), 0);
}

#[test]
fn enumeration_fails_after_out_of_band_read() {
    let mut reader = CsvReader::from_text("v\n1\n2\n3\n", ReaderOptions::new()).expect("reader");
    let mut cursor = csvcache::api::RecordCursor::new(&reader);
    assert!(cursor.next(&mut reader).expect("first").is_some());
    reader.read_next_record().expect("out of band");
    let err = cursor.next(&mut reader).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[test]
fn records_iterator_yields_all_rows() {
    let mut reader = CsvReader::from_text("v\n1\n2\n", ReaderOptions::new()).expect("reader");
    let values: Vec<String> = reader
        .records()
        .map(|record| {
            record
                .expect("record")
                .get(0)
                .unwrap_or_default()
                .to_string()
        })
        .collect();
    assert_eq!(values, vec!["1", "2"]);
}

#[test]
fn invalid_configuration_fails_at_construction() {
    let err = CsvReader::from_text("a", ReaderOptions::new().with_buffer_size(0))
        .err()
        .expect("zero buffer rejected");
    assert_eq!(err.kind(), ErrorKind::InvalidConfig);

    let err = CsvReader::from_text("a\n1\n", ReaderOptions::new().with_buffer_size(usize::MAX))
        .err()
        .expect("huge buffer rejected");
    assert_eq!(err.kind(), ErrorKind::InvalidConfig);
}
