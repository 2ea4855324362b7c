//! Archival of algorithm results
//!
//! Results are written as a JSON envelope carrying a format version, the kind
//! of object stored and its record. Tables are stored as shape, precision and
//! values widened to f64, so either precision round-trips exactly.

use hetero_core::{Error, HomogenTable, NumericTablePtr, Precision, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use tracing::debug;

/// Current envelope format version
pub const ARCHIVE_VERSION: u32 = 1;

/// Serialized form of one numeric table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    pub n_rows: usize,
    pub n_columns: usize,
    pub precision: Precision,
    pub values: Vec<f64>,
}

impl TableRecord {
    pub fn from_table(table: &NumericTablePtr) -> Self {
        Self {
            n_rows: table.n_rows(),
            n_columns: table.n_columns(),
            precision: table.precision(),
            values: table.to_f64_vec(),
        }
    }

    /// Rebuild a table of the recorded precision
    pub fn into_table(self) -> Result<NumericTablePtr> {
        let table = match self.precision {
            Precision::Single => {
                let values = self.values.into_iter().map(|v| v as f32).collect();
                HomogenTable::<f32>::from_vec(self.n_rows, self.n_columns, values)?.into_ptr()
            }
            Precision::Double => {
                HomogenTable::<f64>::from_vec(self.n_rows, self.n_columns, self.values)?.into_ptr()
            }
        };
        Ok(table)
    }
}

/// Objects that can be saved to and loaded from an archive
pub trait Archivable: Sized {
    /// Kind recorded in the envelope and checked on load
    const KIND: &'static str;

    type Record: Serialize + DeserializeOwned;

    fn to_record(&self) -> Self::Record;

    fn from_record(record: Self::Record) -> Result<Self>;
}

#[derive(Serialize, Deserialize)]
struct Envelope<R> {
    version: u32,
    kind: String,
    payload: R,
}

/// Write `value` to `writer`
pub fn save<A: Archivable, W: Write>(value: &A, writer: W) -> Result<()> {
    let envelope = Envelope {
        version: ARCHIVE_VERSION,
        kind: A::KIND.to_string(),
        payload: value.to_record(),
    };
    serde_json::to_writer(writer, &envelope)
        .map_err(|e| Error::Archive(format!("cannot write {}: {e}", A::KIND)))?;
    debug!(kind = A::KIND, "archived");
    Ok(())
}

/// Read an `A` from `reader`
pub fn load<A: Archivable, R: Read>(reader: R) -> Result<A> {
    let envelope: Envelope<A::Record> = serde_json::from_reader(reader)
        .map_err(|e| Error::Archive(format!("cannot read {}: {e}", A::KIND)))?;
    if envelope.version != ARCHIVE_VERSION {
        return Err(Error::Archive(format!(
            "unsupported archive version {} (expected {ARCHIVE_VERSION})",
            envelope.version
        )));
    }
    if envelope.kind != A::KIND {
        return Err(Error::Archive(format!(
            "archive holds {}, expected {}",
            envelope.kind,
            A::KIND
        )));
    }
    A::from_record(envelope.payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Pair(NumericTablePtr);

    impl Archivable for Pair {
        const KIND: &'static str = "pair";
        type Record = TableRecord;

        fn to_record(&self) -> TableRecord {
            TableRecord::from_table(&self.0)
        }

        fn from_record(record: TableRecord) -> Result<Self> {
            record.into_table().map(Pair)
        }
    }

    #[test]
    fn test_table_record_keeps_precision() {
        let table = HomogenTable::<f32>::from_rows(&[vec![0.1, 0.2], vec![0.3, 0.4]])
            .unwrap()
            .into_ptr();
        let back = TableRecord::from_table(&table).into_table().unwrap();
        assert_eq!(back.precision(), Precision::Single);
        assert_eq!(back.to_f64_vec(), table.to_f64_vec());
    }

    #[test]
    fn test_save_load() {
        let value = Pair(HomogenTable::<f64>::from_rows(&[vec![1.0, 2.0]]).unwrap().into_ptr());
        let mut bytes = Vec::new();
        save(&value, &mut bytes).unwrap();
        let back: Pair = load(bytes.as_slice()).unwrap();
        assert_eq!(back.0.n_columns(), 2);
        assert_eq!(back.0.precision(), Precision::Double);
        assert_eq!(back.0.to_f64_vec(), value.0.to_f64_vec());
    }

    #[test]
    fn test_load_rejects_wrong_kind_and_garbage() {
        let bytes = br#"{"version":1,"kind":"other","payload":{"n_rows":0,"n_columns":0,"precision":"double","values":[]}}"#;
        let err = load::<Pair, _>(&bytes[..]).unwrap_err();
        assert!(err.to_string().contains("archive holds other"));

        let err = load::<Pair, _>(&b"not json"[..]).unwrap_err();
        assert!(matches!(err, Error::Archive(_)));

        let bytes = br#"{"version":1,"kind":"pair","payload":{"n_rows":2,"n_columns":2,"precision":"single","values":[1.0]}}"#;
        assert!(matches!(load::<Pair, _>(&bytes[..]), Err(Error::ShapeMismatch { .. })));
    }
}
