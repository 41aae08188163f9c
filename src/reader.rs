//! ## Binary HAR reader
//!
//! Parses one [`HeaderArray`] per call from a byte stream, exposing a lazy
//! iterator of arrays over any `std::io::Read`. End of stream at a record
//! boundary terminates the iteration cleanly; a short read mid-array is
//! `UnexpectedEof`.

use std::io::Read;

use crate::array::{ArrayType, HeaderArray, HeaderArrayPayload};
use crate::dict::{SequenceDictionary, SetDef};
use crate::error::{HarError, Result};
use crate::framing;
use crate::key::KeySequence;

/// Wraps a byte stream and yields [`HeaderArray`]s one at a time.
pub struct BinReader<R: Read> {
    reader: R,
}

impl<R: Read> BinReader<R> {
    pub fn new(reader: R) -> Self {
        BinReader { reader }
    }

    /// Reads the next array, or `None` on a clean end of stream.
    pub fn read_next(&mut self) -> Result<Option<HeaderArray>> {
        let name_payload = match framing::read_record(&mut self.reader)? {
            None => return Ok(None),
            Some(p) => p,
        };
        let header = ascii_trim(&name_payload)?;

        let info = framing::read_padded_record(&mut self.reader)?;
        if info.len() < 80 {
            return Err(HarError::invalid_data("header record too short"));
        }
        let type_code = std::str::from_utf8(&info[0..2])
            .map_err(|_| HarError::invalid_data("invalid type code bytes"))?
            .to_string();
        let full_spse = std::str::from_utf8(&info[2..6]).unwrap_or("");
        let dense = full_spse == "FULL";
        let description = ascii_trim(&info[6..76])?;
        let rank = read_i32(&info, 76)? as usize;
        if info.len() < 80 + 4 * rank {
            return Err(HarError::invalid_data("header record truncated dimensions"));
        }
        let mut header_dims = [1i32; 7];
        for i in 0..rank.min(7) {
            header_dims[i] = read_i32(&info, 80 + 4 * i)?;
        }

        let array_type = ArrayType::from_code(&type_code)?;

        let array = match array_type {
            ArrayType::OneC => self.read_1c(&header, &description)?,
            ArrayType::Re => {
                if dense {
                    self.read_re_dense(&header, &description)?
                } else {
                    self.read_re_sparse(&header, &description)?
                }
            }
            ArrayType::Rl | ArrayType::TwoR => {
                self.read_rl(&header, &description, array_type, header_dims)?
            }
            ArrayType::TwoI => self.read_2i(&header, &description, header_dims)?,
        };

        Ok(Some(array))
    }

    /// Reads the labels header shared by `1C` and `RE` arrays (spec §4.4
    /// steps 1-2): a set-count triple, an 8-byte set-group header, a list of
    /// 12-byte set names, and then one block per set of 12-byte labels.
    fn read_labels_header(&mut self) -> Result<Vec<SetDef>> {
        let rec = framing::read_record_required(&mut self.reader)?;
        if rec.len() < 12 {
            return Err(HarError::invalid_data("labels header too short"));
        }
        let a = read_i32(&rec, 0)? as usize;

        let mut set_names = Vec::with_capacity(a);
        let mut offset = 20usize; // 12 (triple) + 8 (set-group header)
        for _ in 0..a {
            if rec.len() < offset + 12 {
                return Err(HarError::invalid_data("labels header truncated set names"));
            }
            set_names.push(ascii_trim(&rec[offset..offset + 12])?);
            offset += 12;
        }

        let mut sets = Vec::with_capacity(a);
        for i in 0..a.max(1) {
            let block = framing::read_record_required(&mut self.reader)?;
            if block.len() < 12 {
                return Err(HarError::invalid_data("set label block too short"));
            }
            let label_count = read_i32(&block, 4)? as usize;
            let mut elements = Vec::with_capacity(label_count);
            let mut off = 12usize;
            for _ in 0..label_count {
                if block.len() < off + 12 {
                    return Err(HarError::invalid_data("set label block truncated"));
                }
                elements.push(ascii_trim(&block[off..off + 12])?);
                off += 12;
            }
            if i < set_names.len() {
                sets.push((set_names[i].clone(), elements));
            }
        }
        Ok(sets)
    }

    fn read_1c(&mut self, header: &str, description: &str) -> Result<HeaderArray> {
        let sets = self.read_labels_header()?;

        let first = framing::read_record_required(&mut self.reader)?;
        if first.len() < 12 {
            return Err(HarError::invalid_data("1C value record too short"));
        }
        let x0 = read_i32(&first, 0)? as usize;
        let x1 = read_i32(&first, 4)? as usize;
        let x2 = read_i32(&first, 8)? as usize;
        if x2 == 0 {
            return Err(HarError::invalid_data("1C record has zero strings per block"));
        }
        let elem_size = (first.len() - 12) / x2;

        let mut strings = Vec::with_capacity(x1);
        let mut remaining = x1;
        let mut buf = first[12..].to_vec();
        for i in 0..x0 {
            if i > 0 {
                buf = framing::read_record_required(&mut self.reader)?;
            }
            let count = remaining.min(x2);
            for j in 0..count {
                let start = j * elem_size;
                let end = start + elem_size;
                if buf.len() < end {
                    return Err(HarError::invalid_data("1C string block truncated"));
                }
                strings.push(ascii_trim(&buf[start..end])?);
            }
            remaining -= count;
            if remaining == 0 {
                break;
            }
        }

        let dict = strings_into_dict(sets, strings)?;
        let dims = dims_from_sets(dict.sets());
        Ok(HeaderArray::new(
            header,
            description,
            ArrayType::OneC,
            dims,
            x0.max(1),
            HeaderArrayPayload::Strings(dict),
        ))
    }

    fn read_extent(&mut self) -> Result<(usize, [i32; 7])> {
        let rec = framing::read_record_required(&mut self.reader)?;
        if rec.len() < 8 + 28 {
            return Err(HarError::invalid_data("extent record too short"));
        }
        let _trailing_count = read_i32(&rec, 0)?;
        let _dim_limit = read_i32(&rec, 4)?;
        let mut dims = [1i32; 7];
        for i in 0..7 {
            dims[i] = read_i32(&rec, 8 + 4 * i)?;
        }
        let n: usize = dims.iter().map(|&d| d.max(1) as usize).product();
        Ok((n, dims))
    }

    fn read_re_dense(&mut self, header: &str, description: &str) -> Result<HeaderArray> {
        let sets = self.read_labels_header()?;
        let (n, dims) = self.read_extent()?;

        if !sets.is_empty() && n > 0 {
            // dimension-descriptor record: slice bounds used for partial reads only.
            let _ = framing::read_record_required(&mut self.reader)?;
        }

        let data_rec = framing::read_record_required(&mut self.reader)?;
        if data_rec.len() < 4 + 4 * n {
            return Err(HarError::invalid_data("RE data record truncated"));
        }
        let mut values = Vec::with_capacity(n);
        for i in 0..n {
            values.push(read_f32(&data_rec, 4 + 4 * i)?);
        }

        let dict = reals_into_dict(sets, values)?;
        Ok(HeaderArray::new(
            header,
            description,
            ArrayType::Re,
            dims,
            1,
            HeaderArrayPayload::Reals(dict),
        ))
    }

    fn read_re_sparse(&mut self, header: &str, description: &str) -> Result<HeaderArray> {
        let sets = self.read_labels_header()?;

        let count_rec = framing::read_record_required(&mut self.reader)?;
        if count_rec.len() < 4 {
            return Err(HarError::invalid_data("value-count record too short"));
        }
        let nnz = read_i32(&count_rec, 0)? as usize;

        let dims: Vec<usize> = sets.iter().map(|(_, e)| e.len().max(1)).collect();
        let mut dict: SequenceDictionary<f32> = SequenceDictionary::new(sets.clone());

        let mut remaining = nnz;
        while remaining > 0 {
            let rec = framing::read_record_required(&mut self.reader)?;
            if rec.len() < 12 {
                return Err(HarError::invalid_data("sparse data record too short"));
            }
            let k = read_i32(&rec, 8)? as usize;
            if rec.len() < 12 + 8 * k {
                return Err(HarError::invalid_data("sparse data record truncated"));
            }
            let idx_base = 12;
            let val_base = 12 + 4 * k;
            for i in 0..k {
                let one_based = read_i32(&rec, idx_base + 4 * i)?;
                let value = read_f32(&rec, val_base + 4 * i)?;
                let zero_based = (one_based - 1).max(0) as usize;
                let positions = unravel_column_major(zero_based, &dims);
                let key = build_key(&sets, &positions)?;
                dict.insert(key, value);
            }
            remaining -= k;
        }

        let array_dims = dims_from_sets(dict.sets());
        Ok(HeaderArray::new(
            header,
            description,
            ArrayType::Re,
            array_dims,
            1,
            HeaderArrayPayload::Reals(dict),
        ))
    }

    fn read_rl(
        &mut self,
        header: &str,
        description: &str,
        array_type: ArrayType,
        _header_dims: [i32; 7],
    ) -> Result<HeaderArray> {
        let (n, dims) = self.read_extent()?;
        // dimension-description record: opaque, RL's mixed byte/element
        // stride is never decoded, only skipped.
        let _ = framing::read_record_required(&mut self.reader)?;

        let data_rec = framing::read_record_required(&mut self.reader)?;
        if data_rec.len() < 4 + 4 * n {
            return Err(HarError::invalid_data("RL data record truncated"));
        }
        let mut values = Vec::with_capacity(n);
        for i in 0..n {
            values.push(read_f32(&data_rec, 4 + 4 * i)?);
        }

        let sets = synthetic_sets(&dims);
        let dict = reals_into_dict(sets, values)?;
        Ok(HeaderArray::new(
            header,
            description,
            array_type,
            dims,
            1,
            HeaderArrayPayload::Reals(dict),
        ))
    }

    fn read_2i(&mut self, header: &str, description: &str, _header_dims: [i32; 7]) -> Result<HeaderArray> {
        let (n, dims) = self.read_extent()?;
        let _ = framing::read_record_required(&mut self.reader)?;

        let data_rec = framing::read_record_required(&mut self.reader)?;
        if data_rec.len() < 4 + 4 * n {
            return Err(HarError::invalid_data("2I data record truncated"));
        }
        let mut values = Vec::with_capacity(n);
        for i in 0..n {
            values.push(read_i32(&data_rec, 4 + 4 * i)?);
        }

        let sets = synthetic_sets(&dims);
        let mut dict: SequenceDictionary<i32> = SequenceDictionary::new(sets.clone());
        for (key, value) in dict_keys(&sets).into_iter().zip(values) {
            dict.insert(key, value);
        }
        Ok(HeaderArray::new(
            header,
            description,
            ArrayType::TwoI,
            dims,
            1,
            HeaderArrayPayload::Ints(dict),
        ))
    }
}

/// Returns an iterator over every array in `reader` until clean EOF.
pub fn read_all<R: Read>(reader: R) -> Result<Vec<HeaderArray>> {
    let mut bin = BinReader::new(reader);
    let mut out = Vec::new();
    while let Some(array) = bin.read_next()? {
        out.push(array);
    }
    Ok(out)
}

fn ascii_trim(bytes: &[u8]) -> Result<String> {
    let s = std::str::from_utf8(bytes).map_err(|_| HarError::invalid_data("invalid ASCII bytes"))?;
    Ok(s.trim_matches(|c| c == '\0' || c == '\u{2}' || c == ' ').to_string())
}

fn read_i32(buf: &[u8], offset: usize) -> Result<i32> {
    let slice = buf
        .get(offset..offset + 4)
        .ok_or_else(|| HarError::invalid_data("truncated i32 field"))?;
    Ok(i32::from_le_bytes(slice.try_into().unwrap()))
}

fn read_f32(buf: &[u8], offset: usize) -> Result<f32> {
    let slice = buf
        .get(offset..offset + 4)
        .ok_or_else(|| HarError::invalid_data("truncated f32 field"))?;
    Ok(f32::from_le_bytes(slice.try_into().unwrap()))
}

/// Unravels a 0-based linear index into per-dimension 0-based indices with
/// the first dimension varying fastest (Fortran column-major), the ordering
/// convention the GLOSSARY names as authoritative ("reverse-lex order").
pub(crate) fn unravel_column_major(mut idx: usize, dims: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(dims.len());
    for &d in dims {
        let d = d.max(1);
        out.push(idx % d);
        idx /= d;
    }
    out
}

fn build_key(sets: &[SetDef], positions: &[usize]) -> Result<KeySequence> {
    let mut components = Vec::with_capacity(sets.len());
    for (i, (_, elements)) in sets.iter().enumerate() {
        let pos = *positions.get(i).unwrap_or(&0);
        let elem = elements
            .get(pos)
            .ok_or_else(|| HarError::invalid_data("sparse index out of bounds"))?;
        components.push(elem.clone());
    }
    Ok(KeySequence::new(components))
}

fn synthetic_sets(dims: &[i32; 7]) -> Vec<SetDef> {
    dims.iter()
        .enumerate()
        .filter(|(_, &d)| d > 1)
        .map(|(i, &d)| {
            let elements = (1..=d).map(|n| n.to_string()).collect();
            (format!("INDEX{}", i + 1), elements)
        })
        .collect()
}

fn dict_keys(sets: &[SetDef]) -> Vec<KeySequence> {
    let dict: SequenceDictionary<f32> = SequenceDictionary::new(sets.to_vec());
    dict.expanded_keys().collect()
}

fn dims_from_sets(sets: &[SetDef]) -> [i32; 7] {
    let mut dims = [1i32; 7];
    for (i, (_, elements)) in sets.iter().enumerate().take(7) {
        dims[i] = elements.len().max(1) as i32;
    }
    dims
}

fn strings_into_dict(sets: Vec<SetDef>, values: Vec<String>) -> Result<SequenceDictionary<String>> {
    let mut dict: SequenceDictionary<String> = SequenceDictionary::new(sets.clone());
    let keys = dict_keys(&sets);
    if keys.len() != values.len() {
        return Err(HarError::DataValidation {
            field: "1C values".to_string(),
            expected: keys.len().to_string(),
            actual: values.len().to_string(),
        });
    }
    for (key, value) in keys.into_iter().zip(values) {
        dict.insert(key, value);
    }
    Ok(dict)
}

fn reals_into_dict(sets: Vec<SetDef>, values: Vec<f32>) -> Result<SequenceDictionary<f32>> {
    let mut dict: SequenceDictionary<f32> = SequenceDictionary::new(sets.clone());
    let keys = dict_keys(&sets);
    if keys.len() != values.len() {
        return Err(HarError::DataValidation {
            field: "RE/RL values".to_string(),
            expected: keys.len().to_string(),
            actual: values.len().to_string(),
        });
    }
    for (key, value) in keys.into_iter().zip(values) {
        dict.insert(key, value);
    }
    Ok(dict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::BinWriter;

    fn string_array(header: &str, set_name: &str, elements: &[&str], values: &[&str]) -> HeaderArray {
        let mut dict: SequenceDictionary<String> =
            SequenceDictionary::new(vec![(set_name.to_string(), elements.iter().map(|s| s.to_string()).collect())]);
        for (elem, value) in elements.iter().zip(values) {
            dict.insert(KeySequence::new(vec![elem.to_string()]), value.to_string());
        }
        HeaderArray::new(
            header,
            "a description",
            ArrayType::OneC,
            [elements.len() as i32, 1, 1, 1, 1, 1, 1],
            1,
            HeaderArrayPayload::Strings(dict),
        )
    }

    #[test]
    fn s1_string_array_round_trip() {
        let arr = string_array("REG1", "REG", &["AUS", "USA", "CHN"], &["Oz", "States", "China"]);

        let mut buf = Vec::new();
        BinWriter::new(&mut buf).write(&arr).unwrap();

        let read_back = BinReader::new(&buf[..]).read_next().unwrap().unwrap();
        let dict = read_back.payload.as_strings().unwrap();

        assert_eq!(dict.get(&KeySequence::new(vec!["AUS".into()])), "Oz");
        assert_eq!(dict.get(&KeySequence::new(vec!["CHN".into()])), "China");
        assert_eq!(read_back.dimensions[0], 3);
    }

    #[test]
    fn s2_dense_real_round_trip() {
        let mut dict: SequenceDictionary<f32> = SequenceDictionary::new(vec![
            ("COM".to_string(), vec!["c1".to_string(), "c2".to_string()]),
            ("REG".to_string(), vec!["r1".to_string(), "r2".to_string()]),
        ]);
        dict.insert(KeySequence::new(vec!["c1".into(), "r1".into()]), 1.0);
        dict.insert(KeySequence::new(vec!["c2".into(), "r1".into()]), 2.0);
        dict.insert(KeySequence::new(vec!["c1".into(), "r2".into()]), 3.0);
        dict.insert(KeySequence::new(vec!["c2".into(), "r2".into()]), 4.0);
        let arr = HeaderArray::new(
            "GDP ",
            "gdp by region",
            ArrayType::Re,
            [2, 2, 1, 1, 1, 1, 1],
            1,
            HeaderArrayPayload::Reals(dict),
        );

        let mut buf = Vec::new();
        BinWriter::new(&mut buf).write(&arr).unwrap();
        let read_back = BinReader::new(&buf[..]).read_next().unwrap().unwrap();
        let dict = read_back.payload.as_reals().unwrap();

        assert_eq!(dict.get(&KeySequence::new(vec!["c1".into(), "r1".into()])), 1.0);
        assert_eq!(dict.get(&KeySequence::new(vec!["c2".into(), "r1".into()])), 2.0);
        assert_eq!(dict.get(&KeySequence::new(vec!["c1".into(), "r2".into()])), 3.0);
        assert_eq!(dict.get(&KeySequence::new(vec!["c2".into(), "r2".into()])), 4.0);
    }

    #[test]
    fn s3_sparse_real_round_trip() {
        let mut dict: SequenceDictionary<f32> = SequenceDictionary::new(vec![(
            "IDX".to_string(),
            (1..=100).map(|n| n.to_string()).collect(),
        )]);
        let keys: Vec<_> = dict.expanded_keys().collect();
        dict.insert(keys[7].clone(), 1.5);
        dict.insert(keys[42].clone(), 2.5);

        let arr = HeaderArray::new(
            "SPAR",
            "sparse test array",
            ArrayType::Re,
            [100, 1, 1, 1, 1, 1, 1],
            1,
            HeaderArrayPayload::Reals(dict),
        );

        let mut buf = Vec::new();
        BinWriter::new(&mut buf).write_sparse(&arr).unwrap();
        let read_back = BinReader::new(&buf[..]).read_next().unwrap().unwrap();
        let dict = read_back.payload.as_reals().unwrap();

        assert_eq!(dict.stored_len(), 2);
        let values: Vec<f32> = dict.logical_values().collect();
        assert_eq!(values[7], 1.5);
        assert_eq!(values[42], 2.5);
        for (i, &v) in values.iter().enumerate() {
            if i != 7 && i != 42 {
                assert_eq!(v, 0.0);
            }
        }
    }

    #[test]
    fn two_r_round_trip_preserves_its_type_code() {
        let mut dict: SequenceDictionary<f32> =
            SequenceDictionary::new(vec![("INDEX1".to_string(), vec!["1".to_string(), "2".to_string()])]);
        dict.insert(KeySequence::new(vec!["1".into()]), 1.5);
        dict.insert(KeySequence::new(vec!["2".into()]), 2.5);
        let arr = HeaderArray::new(
            "TWOR",
            "a 2R array",
            ArrayType::TwoR,
            [2, 1, 1, 1, 1, 1, 1],
            1,
            HeaderArrayPayload::Reals(dict),
        );

        let mut buf = Vec::new();
        BinWriter::new(&mut buf).write(&arr).unwrap();
        let read_back = BinReader::new(&buf[..]).read_next().unwrap().unwrap();

        assert_eq!(read_back.array_type, ArrayType::TwoR);
        assert_eq!(read_back.array_type.code(), "2R");
        let dict = read_back.payload.as_reals().unwrap();
        assert_eq!(dict.get(&KeySequence::new(vec!["1".into()])), 1.5);
        assert_eq!(dict.get(&KeySequence::new(vec!["2".into()])), 2.5);
    }

    #[test]
    fn clean_eof_between_arrays() {
        let arr = string_array("REG1", "REG", &["AUS"], &["Oz"]);
        let mut buf = Vec::new();
        BinWriter::new(&mut buf).write(&arr).unwrap();

        let mut reader = BinReader::new(&buf[..]);
        assert!(reader.read_next().unwrap().is_some());
        assert!(reader.read_next().unwrap().is_none());
    }
}
