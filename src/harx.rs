//! ## HARX (JSON-in-ZIP) reader/writer
//!
//! HARX is a portable re-encoding of a HAR file: a standard deflate ZIP
//! archive with one `{header}.json` entry per array. Each JSON object
//! carries `Header`, `Description`, `Type`, `Dimensions`, `Sets`,
//! `SerializedVectors`, and `Entries` keyed by the canonical key-sequence
//! string (see [`crate::key::KeySequence`]'s `Display` impl).

use std::collections::BTreeMap;
use std::io::{Read, Seek, Write};

use serde::{Deserialize, Serialize};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::array::{ArrayType, HeaderArray, HeaderArrayPayload};
use crate::dict::{SequenceDictionary, SetDef};
use crate::error::{HarError, Result};
use crate::key::KeySequence;

#[derive(Serialize, Deserialize)]
struct SetDto {
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "Value")]
    value: Vec<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum EntryValue {
    Str(String),
    Real(f32),
    Int(i32),
}

#[derive(Serialize, Deserialize)]
struct ArrayDto {
    #[serde(rename = "Header")]
    header: String,
    #[serde(rename = "Description")]
    description: String,
    #[serde(rename = "Type")]
    array_type: String,
    #[serde(rename = "Dimensions")]
    dimensions: [i32; 7],
    #[serde(rename = "Sets")]
    sets: Vec<SetDto>,
    #[serde(rename = "SerializedVectors")]
    serialized_vectors: usize,
    #[serde(rename = "Entries")]
    entries: BTreeMap<String, EntryValue>,
}

/// Writes `arrays` to `writer` as a HARX archive, one JSON entry per array.
pub fn write_archive<W: Write + Seek>(writer: W, arrays: &[HeaderArray]) -> Result<()> {
    let mut zip = ZipWriter::new(writer);
    let options: FileOptions<()> = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for array in arrays {
        let dto = to_dto(array);
        let json = serde_json::to_vec_pretty(&dto)?;
        let name = format!("{}.json", array.header.trim());
        zip.start_file(name, options)?;
        zip.write_all(&json)?;
    }
    zip.finish()?;
    Ok(())
}

/// Reads every array out of a HARX archive. Order is not guaranteed by the
/// ZIP container, so entries are sorted by header for determinism.
pub fn read_archive<R: Read + Seek>(reader: R) -> Result<Vec<HeaderArray>> {
    let mut zip = ZipArchive::new(reader)?;
    let mut arrays = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let mut file = zip.by_index(i)?;
        let mut buf = String::new();
        file.read_to_string(&mut buf)?;
        let dto: ArrayDto = serde_json::from_str(&buf)?;
        arrays.push(from_dto(dto)?);
    }
    arrays.sort_by(|a, b| a.header.cmp(&b.header));
    Ok(arrays)
}

fn to_dto(array: &HeaderArray) -> ArrayDto {
    let sets: Vec<SetDto> = array
        .sets()
        .iter()
        .map(|(key, value)| SetDto {
            key: key.clone(),
            value: value.clone(),
        })
        .collect();

    let entries: BTreeMap<String, EntryValue> = match &array.payload {
        HeaderArrayPayload::Strings(dict) => dict
            .raw_entries()
            .map(|(k, v)| (k.to_string(), EntryValue::Str(v.clone())))
            .collect(),
        HeaderArrayPayload::Reals(dict) => dict
            .raw_entries()
            .map(|(k, v)| (k.to_string(), EntryValue::Real(*v)))
            .collect(),
        HeaderArrayPayload::Ints(dict) => dict
            .raw_entries()
            .map(|(k, v)| (k.to_string(), EntryValue::Int(*v)))
            .collect(),
    };

    ArrayDto {
        header: array.header.clone(),
        description: array.description.clone(),
        array_type: array.array_type.code().to_string(),
        dimensions: array.dimensions,
        sets,
        serialized_vectors: array.serialized_vectors,
        entries,
    }
}

fn from_dto(dto: ArrayDto) -> Result<HeaderArray> {
    let array_type = ArrayType::from_code(&dto.array_type)?;
    let sets: Vec<SetDef> = dto.sets.into_iter().map(|s| (s.key, s.value)).collect();

    let payload = match array_type {
        ArrayType::OneC => {
            let mut dict: SequenceDictionary<String> = SequenceDictionary::new(sets);
            for (key, value) in dto.entries {
                let value = match value {
                    EntryValue::Str(s) => s,
                    _ => return Err(HarError::invalid_data(format!("entry {key} is not a string"))),
                };
                dict.insert(KeySequence::parse(&key)?, value);
            }
            HeaderArrayPayload::Strings(dict)
        }
        ArrayType::TwoI => {
            let mut dict: SequenceDictionary<i32> = SequenceDictionary::new(sets);
            for (key, value) in dto.entries {
                let value = match value {
                    EntryValue::Int(i) => i,
                    _ => return Err(HarError::invalid_data(format!("entry {key} is not an integer"))),
                };
                dict.insert(KeySequence::parse(&key)?, value);
            }
            HeaderArrayPayload::Ints(dict)
        }
        ArrayType::Re | ArrayType::Rl | ArrayType::TwoR => {
            let mut dict: SequenceDictionary<f32> = SequenceDictionary::new(sets);
            for (key, value) in dto.entries {
                let value = match value {
                    EntryValue::Real(r) => r,
                    EntryValue::Int(i) => i as f32,
                    _ => return Err(HarError::invalid_data(format!("entry {key} is not numeric"))),
                };
                dict.insert(KeySequence::parse(&key)?, value);
            }
            HeaderArrayPayload::Reals(dict)
        }
    };

    Ok(HeaderArray::new(
        &dto.header,
        &dto.description,
        array_type,
        dto.dimensions,
        dto.serialized_vectors,
        payload,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeySequence;
    use std::io::Cursor;

    fn string_array() -> HeaderArray {
        let mut dict: SequenceDictionary<String> =
            SequenceDictionary::new(vec![("REG".to_string(), vec!["AUS".to_string(), "USA".to_string()])]);
        dict.insert(KeySequence::new(vec!["AUS".into()]), "Oz".to_string());
        dict.insert(KeySequence::new(vec!["USA".into()]), "States".to_string());
        HeaderArray::new(
            "REG1",
            "region names",
            ArrayType::OneC,
            [2, 1, 1, 1, 1, 1, 1],
            1,
            HeaderArrayPayload::Strings(dict),
        )
    }

    #[test]
    fn round_trip_through_in_memory_archive() {
        let array = string_array();
        let mut buf = Cursor::new(Vec::new());
        write_archive(&mut buf, &[array]).unwrap();

        buf.set_position(0);
        let arrays = read_archive(buf).unwrap();
        assert_eq!(arrays.len(), 1);
        let dict = arrays[0].payload.as_strings().unwrap();
        assert_eq!(dict.get(&KeySequence::new(vec!["AUS".into()])), "Oz");
    }

    #[test]
    fn round_trip_through_a_file_on_disk() {
        let array = string_array();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("region.harx");

        let file = std::fs::File::create(&path).unwrap();
        write_archive(file, &[array]).unwrap();

        let file = std::fs::File::open(&path).unwrap();
        let arrays = read_archive(file).unwrap();
        assert_eq!(arrays.len(), 1);
        let dict = arrays[0].payload.as_strings().unwrap();
        assert_eq!(dict.get(&KeySequence::new(vec!["USA".into()])), "States");
    }
}
