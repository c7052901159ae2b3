use std::io::Write;

use bson::Document as BsonDocument;

use crate::errors::DbError;
use crate::facade::QueryFacade;
use crate::query::{infer_scalar, parse_document_json, parse_prototype_json};

use super::command::Command;
use super::util::{normalize_letter, write_json, write_ndjson};

fn prototype_of(raw: Option<&str>) -> Result<BsonDocument, DbError> {
    raw.map_or_else(|| Ok(BsonDocument::new()), parse_prototype_json)
}

fn id_json(id: &bson::Bson) -> Result<serde_json::Value, DbError> {
    Ok(serde_json::to_value(id)?)
}

/// Executes `cmd` against `facade`, writing documents as NDJSON and acknowledgments as a
/// single JSON object to `out`.
///
/// # Errors
/// Any error raised by the operation, or `DbError::Io` when `out` cannot be written.
pub fn run<W: Write>(facade: &QueryFacade, cmd: Command, out: &mut W) -> Result<(), DbError> {
    match cmd {
        Command::Clear => {
            let r = facade.clear_all()?;
            write_json(out, &serde_json::json!({"action": "cleared", "deleted": r.deleted}))
        }
        Command::Load { file } => {
            let r = facade.load_collection(&file)?;
            write_json(out, &serde_json::json!({"action": "loaded", "inserted": r.inserted}))
        }
        Command::Insert { json } => {
            let value: serde_json::Value =
                serde_json::from_str(&json).map_err(|e| DbError::Parse(format!("invalid JSON: {e}")))?;
            if let serde_json::Value::Array(items) = value {
                let r = facade.insert_many_json(items)?;
                let ids = r.ids.iter().map(id_json).collect::<Result<Vec<_>, _>>()?;
                write_json(out, &serde_json::json!({"action": "inserted", "inserted": r.inserted, "ids": ids}))
            } else {
                let r = facade.insert_one(parse_document_json(&json)?)?;
                write_json(out, &serde_json::json!({"action": "inserted", "inserted": 1, "id": id_json(&r.id)?}))
            }
        }
        Command::All { prototype } => {
            let proto = prototype_of(prototype.as_deref())?;
            write_ndjson(out, facade.find_all(&proto)?).map(|_| ())
        }
        Command::Count { prototype } => {
            let proto = prototype_of(prototype.as_deref())?;
            let n = facade.count(&proto)?;
            write_json(out, &serde_json::json!({"count": n}))
        }
        Command::FindByName { first_name, last_name } => {
            write_ndjson(out, facade.find_by_name(&first_name, &last_name)?).map(|_| ())
        }
        Command::Group { group, offset, limit } => {
            write_ndjson(out, facade.find_group_results(&group, offset, limit)?).map(|_| ())
        }
        Command::Between { min, max } => {
            write_ndjson(out, facade.find_between(infer_scalar(&min), infer_scalar(&max))?).map(|_| ())
        }
        Command::ByLetter { letter, offset, limit } => {
            let letter = normalize_letter(&letter);
            write_ndjson(out, facade.find_by_letter(&letter, offset, limit)?).map(|_| ())
        }
        Command::UpdateRacer { json } => {
            let r = facade.update_racer(parse_document_json(&json)?)?;
            write_json(out, &serde_json::json!({"action": "replaced", "matched": r.matched, "modified": r.modified}))
        }
        Command::AddTime { number, secs } => {
            let r = facade.add_time(infer_scalar(&number), infer_scalar(&secs))?;
            write_json(out, &serde_json::json!({"action": "incremented", "matched": r.matched, "modified": r.modified}))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCollection;
    use std::sync::Arc;

    fn facade() -> QueryFacade {
        QueryFacade::new(Arc::new(MemoryCollection::new("race1")))
    }

    fn lines(buf: &[u8]) -> Vec<serde_json::Value> {
        String::from_utf8_lossy(buf)
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn insert_array_then_query_by_letter() {
        let f = facade();
        let mut out = Vec::new();
        run(
            &f,
            Command::Insert {
                json: r#"[{"_id":1,"last_name":"Smith","number":1,"secs":120},{"_id":2,"last_name":"Stone","number":2,"secs":90}]"#.into(),
            },
            &mut out,
        )
        .unwrap();
        assert_eq!(lines(&out)[0]["inserted"], 2);

        let mut out = Vec::new();
        run(&f, Command::ByLetter { letter: "s".into(), offset: 1, limit: 5 }, &mut out).unwrap();
        let docs = lines(&out);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["last_name"], "Stone");
    }

    #[test]
    fn add_time_infers_numbers() {
        let f = facade();
        run(&f, Command::Insert { json: r#"{"number":7,"secs":100}"#.into() }, &mut Vec::new()).unwrap();
        let mut out = Vec::new();
        run(&f, Command::AddTime { number: "7".into(), secs: "-4".into() }, &mut out).unwrap();
        assert_eq!(lines(&out)[0]["modified"], 1);
        let mut out = Vec::new();
        run(&f, Command::Between { min: "95".into(), max: "97".into() }, &mut out).unwrap();
        assert_eq!(lines(&out)[0]["secs"], 96);
    }

    #[test]
    fn count_and_clear_acknowledge_as_json() {
        let f = facade();
        run(&f, Command::Insert { json: r#"[{"group":"A"},{"group":"B"}]"#.into() }, &mut Vec::new()).unwrap();
        let mut out = Vec::new();
        run(&f, Command::Count { prototype: Some(r#"{"group":"A"}"#.into()) }, &mut out).unwrap();
        assert_eq!(lines(&out)[0]["count"], 1);
        let mut out = Vec::new();
        run(&f, Command::Clear, &mut out).unwrap();
        assert_eq!(lines(&out)[0], serde_json::json!({"action": "cleared", "deleted": 2}));
    }

    #[test]
    fn malformed_input_is_a_parse_error() {
        let f = facade();
        let err = run(&f, Command::Insert { json: "{nope".into() }, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, DbError::Parse(_)));
        let err = run(&f, Command::All { prototype: Some("[]".into()) }, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, DbError::Parse(_)));
    }
}
