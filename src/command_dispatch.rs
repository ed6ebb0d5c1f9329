//! Purpose: Hold top-level CLI command dispatch for `csvcache`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Streaming commands write one JSON value per line to stdout.
//! Invariants: Random-access commands go through the caching reader and view.

use super::*;

use csvcache::api::{RecordView, SortDirection};

pub(super) fn dispatch_command(command: Command) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "csvcache", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_version_output();
            Ok(RunOutcome::ok())
        }
        Command::Headers { read } => {
            let mut reader = open_reader(&read, "headers")?;
            reader.initialize()?;
            emit_json(json!({
                "headers": reader.header_names()?,
                "field_count": reader.field_count()?,
            }));
            Ok(RunOutcome::ok())
        }
        Command::Cat {
            read,
            objects,
            typed,
        } => {
            let mut reader = open_reader(&read, "cat")?;
            let stdout = io::stdout();
            let mut out = io::BufWriter::new(stdout.lock());
            let mut count = 0u64;
            while reader.read_next_record()? {
                let value = if typed {
                    typed_fields(&reader)?
                } else {
                    record_json(reader.record()?)
                };
                let value = if objects {
                    keyed(reader.header_names()?, value)
                } else {
                    value
                };
                write_json_line(&mut out, &value)?;
                count += 1;
            }
            out.flush().map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to flush output")
                    .with_source(err)
            })?;
            tracing::debug!(records = count, "cat finished");
            Ok(RunOutcome::ok())
        }
        Command::Get { read, index } => {
            let mut cache = open_cached(&read, "get")?;
            let target = i64::try_from(index).unwrap_or(i64::MAX);
            if !cache.move_to(target)? {
                return Err(Error::new(ErrorKind::InvalidConfig)
                    .with_message(format!(
                        "record {index} is past the end of the input ({} records)",
                        cache.cached_len()
                    ))
                    .with_hint("Record indexes are zero-based and exclude the header row."));
            }
            emit_json(json!({
                "index": index,
                "record": record_json(cache.record()?),
            }));
            Ok(RunOutcome::ok())
        }
        Command::Sort { read, column, desc } => {
            let mut cache = open_cached(&read, "sort")?;
            let column = resolve_column(&cache, &column)?;
            let direction = if desc {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            };
            let mut view = RecordView::new(&mut cache);
            view.sort(column, direction)?;
            let stdout = io::stdout();
            let mut out = io::BufWriter::new(stdout.lock());
            for record in view.records()? {
                write_json_line(&mut out, &record_json(record))?;
            }
            out.flush().map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to flush output")
                    .with_source(err)
            })?;
            Ok(RunOutcome::ok())
        }
        Command::Find {
            read,
            column,
            value,
        } => {
            let mut cache = open_cached(&read, "find")?;
            let column = resolve_column(&cache, &column)?;
            let mut view = RecordView::new(&mut cache);
            let (index, record) = match view.find(column, &value)? {
                Some(index) => (index as i64, record_json(view.get(index)?)),
                None => (-1, Value::Null),
            };
            emit_json(json!({ "index": index, "record": record }));
            // Not found is a successful lookup with a distinct exit code.
            Ok(RunOutcome::with_code(if index < 0 { 1 } else { 0 }))
        }
        Command::Schema { read } => {
            let mut cache = open_cached(&read, "schema")?;
            let mut view = RecordView::new(&mut cache);
            let properties = view.properties()?;
            let columns = serde_json::to_value(&properties).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to encode schema")
                    .with_source(err)
            })?;
            emit_json(json!({ "columns": columns }));
            Ok(RunOutcome::ok())
        }
    }
}

fn typed_fields(reader: &CsvReader<DynSource>) -> Result<Value, Error> {
    let count = reader.record()?.len();
    let mut values = Vec::with_capacity(count);
    for index in 0..count {
        values.push(reader.value(index)?.value.to_json());
    }
    Ok(Value::Array(values))
}

fn keyed(names: &[String], value: Value) -> Value {
    let Value::Array(values) = value else {
        return value;
    };
    let mut map = Map::new();
    for (name, value) in names.iter().zip(values) {
        map.insert(name.clone(), value);
    }
    Value::Object(map)
}
