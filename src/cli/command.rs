use std::path::PathBuf;

/// One facade operation, as requested from the command line.
///
/// Raw strings are kept as typed so the runner decides how to interpret them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Clear,
    Load {
        file: PathBuf,
    },
    /// A JSON object inserts one document; a JSON array inserts many.
    Insert {
        json: String,
    },
    All {
        prototype: Option<String>,
    },
    Count {
        prototype: Option<String>,
    },
    FindByName {
        first_name: String,
        last_name: String,
    },
    Group {
        group: String,
        offset: u64,
        limit: u64,
    },
    Between {
        min: String,
        max: String,
    },
    ByLetter {
        letter: String,
        offset: u64,
        limit: u64,
    },
    UpdateRacer {
        json: String,
    },
    AddTime {
        number: String,
        secs: String,
    },
}
