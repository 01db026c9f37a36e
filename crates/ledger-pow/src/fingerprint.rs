//! Order-insensitive SHA-256 fingerprint over a list of values.
//!
//! Every value is rendered to its canonical JSON text, the texts are sorted,
//! concatenated without a separator and hashed. Canonical text uses `", "`
//! and `": "` separators, sorted object keys and `\uXXXX` escapes for every
//! non-ASCII character, so digests agree with chains produced by other
//! implementations of the same format.

use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::io::{self, Write as _};

/// JSON formatter producing the canonical text form.
#[derive(Clone, Copy, Debug, Default)]
struct CanonicalFormatter;

impl Formatter for CanonicalFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }
            writer.write_all(fragment[start..i].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = i + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

/// Canonical JSON text of any serializable value.
///
/// Fails only for values JSON cannot represent, such as maps with
/// non-string keys.
pub fn canonical_json<T>(value: &T) -> Result<String, serde_json::Error>
where
    T: Serialize + ?Sized,
{
    // Round-trip through `Value` so map keys come out sorted.
    let value = serde_json::to_value(value)?;
    Ok(canonical_value(&value))
}

/// Canonical JSON text of an already-built `Value`.
pub fn canonical_value(value: &Value) -> String {
    let mut buf = Vec::with_capacity(64);
    let mut ser = Serializer::with_formatter(&mut buf, CanonicalFormatter);
    value
        .serialize(&mut ser)
        .expect("a JSON value always serializes into memory");
    // The formatter only ever writes ASCII.
    String::from_utf8(buf).expect("canonical JSON is ASCII")
}

/// Sort pre-rendered canonical texts, concatenate and hash them.
///
/// Returns the lowercase hex SHA-256 digest.
pub fn digest_canonical<S: AsRef<str>>(parts: &mut [S]) -> String {
    parts.sort_unstable_by(|a, b| a.as_ref().cmp(b.as_ref()));
    let mut hasher = Sha256::new();
    for part in parts.iter() {
        hasher.update(part.as_ref().as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Fingerprint of a list of values; insensitive to their order.
pub fn fingerprint(values: &[Value]) -> String {
    let mut parts: Vec<String> = values.iter().map(canonical_value).collect();
    digest_canonical(&mut parts)
}

/// Fingerprint of any mix of serializable values.
///
/// ```
/// use ledger_pow::fingerprint;
///
/// let a = fingerprint!("a", 2, [2342]);
/// let b = fingerprint!([2342], "a", 2);
/// assert_eq!(a, b);
/// ```
#[macro_export]
macro_rules! fingerprint {
    ($($value:expr),* $(,)?) => {
        $crate::fingerprint::fingerprint(&[$($crate::serde_json::json!($value)),*])
    };
}
