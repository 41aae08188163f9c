//! ## Binary HAR writer
//!
//! The inverse of [`crate::reader`]. Given a [`HeaderArray`], emits its
//! binary form. For `RE` arrays the choice between dense and sparse output
//! follows the documented default: sparse if the stored fraction is below
//! 50%.

use std::io::Write;

use crate::array::{ArrayType, HeaderArray, HeaderArrayPayload};
use crate::dict::{SequenceDictionary, SetDef};
use crate::error::{HarError, Result};
use crate::framing;
use crate::key::KeySequence;

/// The density threshold below which an `RE` array is written sparse.
pub const SPARSE_THRESHOLD: f64 = 0.5;
/// Maximum number of (index, value) pairs per sparse data sub-record.
const SPARSE_CHUNK: usize = 1000;

pub struct BinWriter<W: Write> {
    writer: W,
}

impl<W: Write> BinWriter<W> {
    pub fn new(writer: W) -> Self {
        BinWriter { writer }
    }

    /// Writes `array`, choosing dense or sparse encoding automatically for
    /// `RE` arrays based on [`SPARSE_THRESHOLD`].
    pub fn write(&mut self, array: &HeaderArray) -> Result<()> {
        match &array.payload {
            HeaderArrayPayload::Strings(dict) => self.write_1c(array, dict),
            HeaderArrayPayload::Ints(dict) => self.write_2i(array, dict),
            HeaderArrayPayload::Reals(dict) => match array.array_type {
                ArrayType::Re => {
                    let total = dict.total_size().max(1);
                    let density = dict.stored_len() as f64 / total as f64;
                    if density < SPARSE_THRESHOLD {
                        self.write_re_sparse_body(array, dict)
                    } else {
                        self.write_re_dense_body(array, dict)
                    }
                }
                ArrayType::Rl | ArrayType::TwoR => self.write_rl_body(array, dict),
                other => Err(HarError::invalid_data(format!(
                    "real payload is incompatible with array type {}",
                    other.code()
                ))),
            },
        }
    }

    /// Forces dense `RE` encoding, regardless of density.
    pub fn write_dense(&mut self, array: &HeaderArray) -> Result<()> {
        let dict = array
            .payload
            .as_reals()
            .ok_or_else(|| HarError::invalid_data("write_dense requires a real payload"))?;
        self.write_re_dense_body(array, dict)
    }

    /// Forces sparse `RE` encoding, regardless of density.
    pub fn write_sparse(&mut self, array: &HeaderArray) -> Result<()> {
        let dict = array
            .payload
            .as_reals()
            .ok_or_else(|| HarError::invalid_data("write_sparse requires a real payload"))?;
        self.write_re_sparse_body(array, dict)
    }

    fn write_header_name(&mut self, header: &str) -> Result<()> {
        framing::write_record(&mut self.writer, ascii_pad(header.as_bytes(), 4).as_slice())
    }

    fn write_info_record(&mut self, type_code: &str, marker: &str, description: &str, dims: [i32; 7]) -> Result<()> {
        let mut payload = Vec::with_capacity(80 + 28);
        payload.extend_from_slice(ascii_pad(type_code.as_bytes(), 2).as_slice());
        payload.extend_from_slice(ascii_pad(marker.as_bytes(), 4).as_slice());
        payload.extend_from_slice(ascii_pad(description.as_bytes(), 70).as_slice());
        payload.extend_from_slice(&7i32.to_le_bytes());
        for d in dims {
            payload.extend_from_slice(&d.to_le_bytes());
        }
        framing::write_padded_record(&mut self.writer, &payload)
    }

    fn write_labels_header(&mut self, sets: &[SetDef]) -> Result<()> {
        let a = sets.len();
        let mut payload = Vec::new();
        payload.extend_from_slice(&(a as i32).to_le_bytes());
        payload.extend_from_slice(&0i32.to_le_bytes());
        payload.extend_from_slice(&0i32.to_le_bytes());
        payload.extend_from_slice(ascii_pad(b"", 8).as_slice());
        for (name, _) in sets {
            payload.extend_from_slice(ascii_pad(name.as_bytes(), 12).as_slice());
        }
        framing::write_record(&mut self.writer, &payload)?;

        for i in 0..a.max(1) {
            let elements: &[String] = if i < sets.len() { &sets[i].1 } else { &[] };
            let mut block = Vec::new();
            block.extend_from_slice(&0i32.to_le_bytes());
            block.extend_from_slice(&(elements.len() as i32).to_le_bytes());
            block.extend_from_slice(&0i32.to_le_bytes());
            for e in elements {
                block.extend_from_slice(ascii_pad(e.as_bytes(), 12).as_slice());
            }
            framing::write_record(&mut self.writer, &block)?;
        }
        Ok(())
    }

    fn write_extent(&mut self, dims: [i32; 7]) -> Result<()> {
        let mut payload = Vec::with_capacity(36);
        payload.extend_from_slice(&1i32.to_le_bytes());
        payload.extend_from_slice(&7i32.to_le_bytes());
        for d in dims {
            payload.extend_from_slice(&d.to_le_bytes());
        }
        framing::write_record(&mut self.writer, &payload)
    }

    fn write_skip_record(&mut self) -> Result<()> {
        framing::write_record(&mut self.writer, &[0u8; 4])
    }

    fn write_1c(&mut self, array: &HeaderArray, dict: &SequenceDictionary<String>) -> Result<()> {
        self.write_header_name(&array.header)?;
        self.write_info_record("1C", "FULL", &array.description, array.dimensions)?;
        self.write_labels_header(dict.sets())?;

        let values: Vec<String> = dict.logical_values().collect();
        let x1 = values.len();
        let vectors = array.serialized_vectors.max(1);
        let x2 = ((x1 + vectors - 1) / vectors).max(1);
        let x0 = if x1 == 0 { 1 } else { (x1 + x2 - 1) / x2 };
        const ELEM_SIZE: usize = 12;

        let mut remaining = x1;
        let mut idx = 0;
        for i in 0..x0 {
            let count = remaining.min(x2);
            let mut payload = Vec::new();
            if i == 0 {
                payload.extend_from_slice(&(x0 as i32).to_le_bytes());
                payload.extend_from_slice(&(x1 as i32).to_le_bytes());
                payload.extend_from_slice(&(x2 as i32).to_le_bytes());
            }
            for _ in 0..count {
                payload.extend_from_slice(ascii_pad(values[idx].as_bytes(), ELEM_SIZE).as_slice());
                idx += 1;
            }
            framing::write_record(&mut self.writer, &payload)?;
            remaining -= count;
        }
        Ok(())
    }

    fn write_re_dense_body(&mut self, array: &HeaderArray, dict: &SequenceDictionary<f32>) -> Result<()> {
        self.write_header_name(&array.header)?;
        self.write_info_record("RE", "FULL", &array.description, array.dimensions)?;
        self.write_labels_header(dict.sets())?;
        self.write_extent(array.dimensions)?;

        let n = dict.total_size();
        if !dict.sets().is_empty() && n > 0 {
            self.write_skip_record()?;
        }

        let values: Vec<f32> = dict.logical_values().collect();
        let mut payload = Vec::with_capacity(4 + 4 * values.len());
        payload.extend_from_slice(&7i32.to_le_bytes());
        for v in &values {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        framing::write_record(&mut self.writer, &payload)
    }

    fn write_re_sparse_body(&mut self, array: &HeaderArray, dict: &SequenceDictionary<f32>) -> Result<()> {
        self.write_header_name(&array.header)?;
        self.write_info_record("RE", "SPSE", &array.description, array.dimensions)?;
        self.write_labels_header(dict.sets())?;

        let dims: Vec<usize> = dict.sets().iter().map(|(_, e)| e.len().max(1)).collect();
        let mut entries: Vec<(usize, f32)> = dict
            .raw_entries()
            .map(|(key, &value)| (linear_index(key, dict.sets(), &dims), value))
            .collect();
        entries.sort_by_key(|(idx, _)| *idx);

        let nnz = entries.len();
        let mut count_payload = Vec::with_capacity(12);
        count_payload.extend_from_slice(&(nnz as i32).to_le_bytes());
        count_payload.extend_from_slice(&0i32.to_le_bytes());
        count_payload.extend_from_slice(&0i32.to_le_bytes());
        framing::write_record(&mut self.writer, &count_payload)?;

        if entries.is_empty() {
            // still need at least one data record so the reader's "while
            // remaining > 0" loop has something to terminate against; with
            // nnz == 0 it never enters the loop, so nothing further to write.
            return Ok(());
        }

        for chunk in entries.chunks(SPARSE_CHUNK) {
            let k = chunk.len();
            let mut payload = Vec::with_capacity(12 + 8 * k);
            payload.extend_from_slice(&7i32.to_le_bytes());
            payload.extend_from_slice(&0i32.to_le_bytes());
            payload.extend_from_slice(&(k as i32).to_le_bytes());
            for (idx, _) in chunk {
                payload.extend_from_slice(&((*idx as i32) + 1).to_le_bytes());
            }
            for (_, value) in chunk {
                payload.extend_from_slice(&value.to_le_bytes());
            }
            framing::write_record(&mut self.writer, &payload)?;
        }
        Ok(())
    }

    fn write_rl_body(&mut self, array: &HeaderArray, dict: &SequenceDictionary<f32>) -> Result<()> {
        self.write_header_name(&array.header)?;
        self.write_info_record(array.array_type.code(), "FULL", &array.description, array.dimensions)?;
        self.write_extent(array.dimensions)?;
        self.write_skip_record()?;

        let values: Vec<f32> = dict.logical_values().collect();
        let mut payload = Vec::with_capacity(4 + 4 * values.len());
        payload.extend_from_slice(&7i32.to_le_bytes());
        for v in &values {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        framing::write_record(&mut self.writer, &payload)
    }

    fn write_2i(&mut self, array: &HeaderArray, dict: &SequenceDictionary<i32>) -> Result<()> {
        self.write_header_name(&array.header)?;
        self.write_info_record("2I", "FULL", &array.description, array.dimensions)?;
        self.write_extent(array.dimensions)?;
        self.write_skip_record()?;

        let values: Vec<i32> = dict.logical_values().collect();
        let mut payload = Vec::with_capacity(4 + 4 * values.len());
        payload.extend_from_slice(&7i32.to_le_bytes());
        for v in &values {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        framing::write_record(&mut self.writer, &payload)
    }
}

fn ascii_pad(bytes: &[u8], width: usize) -> Vec<u8> {
    let mut v = bytes.to_vec();
    v.truncate(width);
    while v.len() < width {
        v.push(b' ');
    }
    v
}

/// Inverse of [`crate::reader::unravel_column_major`]: the 0-based linear
/// index of `key` within the Cartesian product of `sets`, first set varying
/// fastest.
fn linear_index(key: &KeySequence, sets: &[SetDef], dims: &[usize]) -> usize {
    let mut idx = 0usize;
    let mut stride = 1usize;
    for (i, (_, elements)) in sets.iter().enumerate() {
        let component = &key.as_slice()[i];
        let pos = elements
            .iter()
            .position(|e| e == component)
            .or_else(|| elements.iter().position(|e| e.eq_ignore_ascii_case(component)))
            .unwrap_or(0);
        idx += pos * stride;
        stride *= dims[i].max(1);
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::BinReader;

    #[test]
    fn dense_and_sparse_round_trip_to_same_values() {
        let mut dict: SequenceDictionary<f32> = SequenceDictionary::new(vec![(
            "IDX".to_string(),
            (1..=20).map(|n| n.to_string()).collect(),
        )]);
        for i in [2usize, 5, 11] {
            let keys: Vec<_> = dict.expanded_keys().collect();
            dict.insert(keys[i].clone(), (i as f32) + 0.5);
        }
        let array = HeaderArray::new(
            "DENS",
            "density independence test",
            ArrayType::Re,
            [20, 1, 1, 1, 1, 1, 1],
            1,
            HeaderArrayPayload::Reals(dict),
        );

        let mut dense_buf = Vec::new();
        BinWriter::new(&mut dense_buf).write_dense(&array).unwrap();
        let mut sparse_buf = Vec::new();
        BinWriter::new(&mut sparse_buf).write_sparse(&array).unwrap();

        let dense_back = BinReader::new(&dense_buf[..]).read_next().unwrap().unwrap();
        let sparse_back = BinReader::new(&sparse_buf[..]).read_next().unwrap().unwrap();

        let dense_values: Vec<f32> = dense_back.payload.as_reals().unwrap().logical_values().collect();
        let sparse_values: Vec<f32> = sparse_back.payload.as_reals().unwrap().logical_values().collect();
        assert_eq!(dense_values, sparse_values);
    }
}
