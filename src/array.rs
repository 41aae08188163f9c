//! ## Array header and the logical `HeaderArray` object
//!
//! `HeaderArray` is the public logical object callers read, write, and pass
//! to the solution assembler. Its payload is a tagged variant over the three
//! element types a HAR array can carry: a dynamic "type" field becomes a
//! `match` on `HeaderArrayPayload`, never a runtime cast.

use crate::dict::{SequenceDictionary, SetDef};
use crate::error::{HarError, Result};

/// The four-character HAR type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayType {
    /// Real, elementwise (dense or sparse).
    Re,
    /// Real list, a degenerate dense real array with no set labels.
    Rl,
    /// Character (string) array.
    OneC,
    /// Integer array.
    TwoI,
    /// Real array with no sets.
    TwoR,
}

impl ArrayType {
    pub fn code(self) -> &'static str {
        match self {
            ArrayType::Re => "RE",
            ArrayType::Rl => "RL",
            ArrayType::OneC => "1C",
            ArrayType::TwoI => "2I",
            ArrayType::TwoR => "2R",
        }
    }

    pub fn from_code(code: &str) -> Result<Self> {
        match code {
            "RE" => Ok(ArrayType::Re),
            "RL" => Ok(ArrayType::Rl),
            "1C" => Ok(ArrayType::OneC),
            "2I" => Ok(ArrayType::TwoI),
            "2R" => Ok(ArrayType::TwoR),
            other => Err(HarError::invalid_data(format!(
                "unknown array type code: {other}"
            ))),
        }
    }
}

/// The per-element-type payload of a `HeaderArray`.
#[derive(Debug, Clone)]
pub enum HeaderArrayPayload {
    Strings(SequenceDictionary<String>),
    Reals(SequenceDictionary<f32>),
    Ints(SequenceDictionary<i32>),
}

impl HeaderArrayPayload {
    pub fn sets(&self) -> &[SetDef] {
        match self {
            HeaderArrayPayload::Strings(d) => d.sets(),
            HeaderArrayPayload::Reals(d) => d.sets(),
            HeaderArrayPayload::Ints(d) => d.sets(),
        }
    }

    pub fn total_size(&self) -> usize {
        match self {
            HeaderArrayPayload::Strings(d) => d.total_size(),
            HeaderArrayPayload::Reals(d) => d.total_size(),
            HeaderArrayPayload::Ints(d) => d.total_size(),
        }
    }

    pub fn stored_len(&self) -> usize {
        match self {
            HeaderArrayPayload::Strings(d) => d.stored_len(),
            HeaderArrayPayload::Reals(d) => d.stored_len(),
            HeaderArrayPayload::Ints(d) => d.stored_len(),
        }
    }

    pub fn as_reals(&self) -> Option<&SequenceDictionary<f32>> {
        match self {
            HeaderArrayPayload::Reals(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_strings(&self) -> Option<&SequenceDictionary<String>> {
        match self {
            HeaderArrayPayload::Strings(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_ints(&self) -> Option<&SequenceDictionary<i32>> {
        match self {
            HeaderArrayPayload::Ints(d) => Some(d),
            _ => None,
        }
    }
}

/// The full logical representation of one named array inside a HAR file.
#[derive(Debug, Clone)]
pub struct HeaderArray {
    pub header: String,
    pub description: String,
    pub array_type: ArrayType,
    pub dimensions: [i32; 7],
    pub serialized_vectors: usize,
    pub payload: HeaderArrayPayload,
}

impl HeaderArray {
    pub fn new(
        header: &str,
        description: &str,
        array_type: ArrayType,
        dimensions: [i32; 7],
        serialized_vectors: usize,
        payload: HeaderArrayPayload,
    ) -> Self {
        HeaderArray {
            header: pad_header(header),
            description: description.trim_matches(|c| c == '\0' || c == '\u{2}' || c == ' ').to_string(),
            array_type,
            dimensions,
            serialized_vectors,
            payload,
        }
    }

    /// Returns a shallow copy of this array with the header renamed.
    pub fn with_header(&self, new_header: &str) -> Self {
        HeaderArray {
            header: pad_header(new_header),
            ..self.clone()
        }
    }

    pub fn sets(&self) -> &[SetDef] {
        self.payload.sets()
    }
}

/// Pads a header to exactly 4 ASCII characters with trailing spaces.
pub fn pad_header(header: &str) -> String {
    let mut s = header.to_string();
    while s.len() < 4 {
        s.push(' ');
    }
    s.truncate(4);
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict::SequenceDictionary;
    use crate::key::KeySequence;

    #[test]
    fn header_is_padded_to_four_chars() {
        assert_eq!(pad_header("REG"), "REG ");
        assert_eq!(pad_header("REG1"), "REG1");
        assert_eq!(pad_header("REGION1"), "REGI");
    }

    #[test]
    fn with_header_is_a_shallow_rename() {
        let mut dict: SequenceDictionary<String> = SequenceDictionary::new(vec![(
            "REG".to_string(),
            vec!["AUS".to_string()],
        )]);
        dict.insert(KeySequence::new(vec!["AUS".into()]), "Oz".to_string());
        let arr = HeaderArray::new(
            "REG1",
            "region names",
            ArrayType::OneC,
            [1, 1, 1, 1, 1, 1, 1],
            1,
            HeaderArrayPayload::Strings(dict),
        );
        let renamed = arr.with_header("REG2");
        assert_eq!(renamed.header, "REG2");
        assert_eq!(arr.header, "REG1");
    }
}
