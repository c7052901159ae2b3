#![allow(dead_code)]

use bson::doc;
use fake::Fake;
use fake::faker::name::en::{FirstName, LastName};
use racelite::{Cursor, Document, MemoryCollection, QueryFacade};
use std::sync::Arc;

pub fn facade() -> QueryFacade {
    QueryFacade::new(Arc::new(MemoryCollection::new("race1")))
}

/// A racer with a generated name.
pub fn racer(number: i32, group: &str, secs: i32) -> Document {
    let first: String = FirstName().fake();
    let last: String = LastName().fake();
    Document::new(doc! {
        "first_name": first,
        "last_name": last,
        "number": number,
        "group": group,
        "secs": secs,
    })
}

pub fn to_json(cursor: Cursor) -> Vec<serde_json::Value> {
    cursor.into_iter().map(|d| d.unwrap().to_json().unwrap()).collect()
}

pub fn secs_of(docs: &[serde_json::Value]) -> Vec<f64> {
    docs.iter().map(|d| d["secs"].as_f64().unwrap()).collect()
}
