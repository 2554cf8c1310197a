//! Parameter syntax accepted on the command line and in batch files.

use std::fs::File;
use std::path::Path;

use eyre::{Context, Result};
use rowkit::Param;
use serde::Deserialize;

/// Parses one command-line parameter.
///
/// `null`, integers, finite reals, `x'<hex>'` blobs and `@<path>` files
/// (streamed as blobs) are recognized; anything else is text.
pub fn parse_param(raw: &str) -> Result<Param> {
    if raw.eq_ignore_ascii_case("null") {
        return Ok(Param::Null);
    }
    if let Some(path) = raw.strip_prefix('@') {
        let file = File::open(Path::new(path))
            .wrap_err_with(|| format!("could not open parameter file `{path}`"))?;
        return Ok(Param::stream(file));
    }
    if let Some(hex) = raw
        .strip_prefix("x'")
        .or_else(|| raw.strip_prefix("X'"))
        .and_then(|rest| rest.strip_suffix('\''))
    {
        let bytes = hex::decode(hex).wrap_err("invalid hex blob parameter")?;
        return Ok(Param::Blob(bytes));
    }
    if let Ok(v) = raw.parse::<i64>() {
        return Ok(Param::Integer(v));
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Param::Real(v)),
        _ => Ok(Param::Text(raw.to_string())),
    }
}

/// Parses every command-line parameter, in order.
pub fn parse_params(raw: &[String]) -> Result<Vec<Param>> {
    raw.iter().map(|p| parse_param(p)).collect()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonParam {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob {
        #[serde(with = "hex::serde")]
        hex: Vec<u8>,
    },
}

impl From<JsonParam> for Param {
    fn from(param: JsonParam) -> Self {
        match param {
            JsonParam::Null => Self::Null,
            JsonParam::Boolean(v) => Self::from(v),
            JsonParam::Integer(v) => Self::Integer(v),
            JsonParam::Real(v) => Self::Real(v),
            JsonParam::Text(v) => Self::Text(v),
            JsonParam::Blob { hex } => Self::Blob(hex),
        }
    }
}

#[derive(Debug, Deserialize)]
struct JsonStatement {
    sql: String,
    #[serde(default)]
    params: Vec<JsonParam>,
}

/// Statements and parameter lists of a batch file.
#[derive(Debug, Default)]
pub struct Batch {
    pub sqls: Vec<String>,
    pub param_lists: Vec<Vec<Param>>,
}

/// Reads a batch file: a JSON array of `{"sql": ..., "params": [...]}`.
pub fn parse_batch(json: &str) -> Result<Batch> {
    let statements: Vec<JsonStatement> =
        serde_json::from_str(json).wrap_err("invalid batch file")?;
    let mut batch = Batch::default();
    for statement in statements {
        batch.sqls.push(statement.sql);
        batch
            .param_lists
            .push(statement.params.into_iter().map(Param::from).collect());
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_parse_param_kinds() {
        assert!(matches!(parse_param("NULL").expect("null"), Param::Null));
        assert!(matches!(parse_param("-42").expect("int"), Param::Integer(-42)));
        assert!(matches!(parse_param("2.5").expect("real"), Param::Real(v) if v == 2.5));
        assert!(matches!(parse_param("NaN").expect("text"), Param::Text(ref t) if t == "NaN"));
        assert!(matches!(parse_param("ann").expect("text"), Param::Text(ref t) if t == "ann"));
        assert!(matches!(parse_param("x'CAFE'").expect("blob"), Param::Blob(ref b) if b == &[0xCA, 0xFE]));
        assert!(parse_param("x'zz'").is_err());
    }

    #[test]
    fn test_parse_param_file_is_streamed() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"payload").expect("write");
        let raw = format!("@{}", file.path().display());
        assert!(matches!(parse_param(&raw).expect("stream"), Param::Stream(_)));
        assert!(parse_param("@/definitely/not/here").is_err());
    }

    #[test]
    fn test_parse_batch() {
        let batch = parse_batch(
            r#"[
                {"sql": "INSERT INTO t VALUES (?, ?, ?)", "params": [1, "a", {"hex": "00ff"}]},
                {"sql": "UPDATE t SET flag = ?, score = ?, note = ?", "params": [true, 0.5, null]},
                {"sql": "DELETE FROM t"}
            ]"#,
        )
        .expect("batch");
        assert_eq!(batch.sqls.len(), 3);
        assert_eq!(batch.param_lists.len(), 3);
        assert!(matches!(batch.param_lists[0][0], Param::Integer(1)));
        assert!(matches!(batch.param_lists[0][2], Param::Blob(ref b) if b == &[0x00, 0xFF]));
        assert!(matches!(batch.param_lists[1][0], Param::Native(_)));
        assert!(matches!(batch.param_lists[1][1], Param::Real(v) if v == 0.5));
        assert!(matches!(batch.param_lists[1][2], Param::Null));
        assert!(batch.param_lists[2].is_empty());
        assert!(parse_batch(r#"{"sql": "x"}"#).is_err());
    }
}
