//! Positional parameter binding.

use rusqlite::types::Null;
use rusqlite::Statement;

use crate::error::{Error, Result};
use crate::value::{format_timestamp, Param};

/// Binds `params` to the placeholders of `stmt`, parameter `i` at
/// placeholder `i + 1`.
///
/// Binding stops at the first rejected parameter.
///
/// # Errors
///
/// Returns [`Error::Bind`] if the driver rejects a value (too many
/// parameters, oversized payload), a stream parameter cannot be read, or a
/// placeholder is left without a value. In the last case the index is the
/// first unbound placeholder.
pub fn bind(stmt: &mut Statement<'_>, params: &[Param]) -> Result<()> {
    for (i, param) in params.iter().enumerate() {
        let index = i + 1;
        bind_one(stmt, index, param).inspect_err(|err| {
            log::error!("{err}");
        })?;
    }
    let expected = stmt.parameter_count();
    if params.len() < expected {
        let err = Error::bind(
            params.len() + 1,
            rusqlite::Error::InvalidParameterCount(params.len(), expected),
        );
        log::error!("{err}");
        return Err(err);
    }
    Ok(())
}

fn bind_one(stmt: &mut Statement<'_>, index: usize, param: &Param) -> Result<()> {
    let bound = match param {
        Param::Null => stmt.raw_bind_parameter(index, Null),
        Param::Integer(v) => stmt.raw_bind_parameter(index, *v),
        Param::Real(v) => stmt.raw_bind_parameter(index, *v),
        Param::Text(v) => stmt.raw_bind_parameter(index, v.as_str()),
        Param::Timestamp(v) => stmt.raw_bind_parameter(index, format_timestamp(v)),
        Param::Blob(v) => stmt.raw_bind_parameter(index, v.as_slice()),
        Param::Stream(stream) => {
            let bytes = stream.drain().map_err(|err| Error::bind(index, err))?;
            stmt.raw_bind_parameter(index, bytes)
        }
        Param::Native(v) => stmt.raw_bind_parameter(index, &**v),
    };
    bound.map_err(|err| Error::bind(index, err))
}
