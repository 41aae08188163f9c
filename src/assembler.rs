//! ## Solution assembler
//!
//! Reconstructs the back-solved and condensed variables of a GEMPACK
//! solution (`.sl4`) by cross-indexing its metadata headers: `STNM`/`STLB`/
//! `STTP`/`SSZ`/`STEL` describe the sets, `VCNM`/`VCNI`/`VCSP`/`VCSN`/`VCL0`/
//! `VCLE`/`VCS0` describe the variables and which sets index them, and
//! `PCUM`/`CMND`/`CUMS` carry the compressed cumulative-results block.
//! It then applies any shock/exogenous overrides parsed from the embedded
//! `CMDF` command file.
//!
//! Every lookup into these arrays is 1-based in the file; the conversion to
//! 0-based happens once, at the boundary, and nowhere else.

use rayon::prelude::*;

use crate::array::{ArrayType, HeaderArray, HeaderArrayPayload};
use crate::cmdf::{self, CommandFile};
use crate::dict::{SequenceDictionary, SetDef};
use crate::error::{HarError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VariableKind {
    Exogenous,
    Endogenous,
    BackSolved,
    Condensed,
}

impl VariableKind {
    fn from_code(code: &str) -> Result<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "e" => Ok(VariableKind::Exogenous),
            "n" => Ok(VariableKind::Endogenous),
            "b" => Ok(VariableKind::BackSolved),
            "c" => Ok(VariableKind::Condensed),
            other => Err(HarError::invalid_data(format!("unknown variable kind code: {other}"))),
        }
    }

    fn is_reconstructed(self) -> bool {
        matches!(self, VariableKind::BackSolved | VariableKind::Condensed)
    }
}

struct SetInfo {
    name: String,
    elements: Vec<String>,
}

struct SolutionVariable {
    index: usize,
    name: String,
    description: String,
    /// `VCLE[i]`, the variable's unit/label text. Carried for completeness;
    /// `HeaderArray` has no slot for it, so it never reaches the output.
    unit: String,
    /// `VCT0[i]`, the variable's change-type code (e.g. ordinary/percent).
    /// Carried for completeness; not part of the output `HeaderArray`.
    change_type: String,
    kind: VariableKind,
    sets: Vec<SetDef>,
}

/// Reads all the metadata an `.sl4` needs and emits one `HeaderArray` per
/// back-solved or condensed variable, in ascending variable-index order.
pub fn assemble(arrays: &[HeaderArray]) -> Result<Vec<HeaderArray>> {
    let sets = build_sets(arrays)?;
    let variables = build_variables(arrays, &sets)?;

    let pcum = ints_of(find(arrays, "PCUM")?)?;
    let cmnd = ints_of(find(arrays, "CMND")?)?;
    let cums = reals_of(find(arrays, "CUMS")?)?;

    let command_file = match find(arrays, "CMDF") {
        Ok(array) => cmdf::from_header_array(array)?,
        Err(_) => CommandFile::default(),
    };

    let reconstructed: Vec<&SolutionVariable> = variables.iter().filter(|v| v.kind.is_reconstructed()).collect();

    let mut indexed: Vec<Result<(usize, HeaderArray)>> = reconstructed
        .par_iter()
        .map(|variable| build_variable_array(variable, &pcum, &cmnd, &cums, &command_file))
        .collect();

    let mut out = Vec::with_capacity(indexed.len());
    for item in indexed.drain(..) {
        out.push(item?);
    }
    out.sort_by_key(|(index, _)| *index);
    Ok(out.into_iter().map(|(_, array)| array).collect())
}

fn build_sets(arrays: &[HeaderArray]) -> Result<Vec<SetInfo>> {
    let stnm = strings_of(find(arrays, "STNM")?)?;
    let ssz = ints_of(find(arrays, "SSZ")?)?;
    let stel = strings_of(find(arrays, "STEL")?)?;

    let mut sets = Vec::with_capacity(stnm.len());
    let mut offset = 0usize;
    for (i, name) in stnm.iter().enumerate() {
        let size = *ssz
            .get(i)
            .ok_or_else(|| HarError::invalid_data("SSZ is shorter than STNM"))? as usize;
        let elements = stel
            .get(offset..offset + size)
            .ok_or_else(|| HarError::invalid_data("STEL is shorter than SSZ implies"))?
            .to_vec();
        sets.push(SetInfo {
            name: name.clone(),
            elements,
        });
        offset += size;
    }
    Ok(sets)
}

fn build_variables(arrays: &[HeaderArray], sets: &[SetInfo]) -> Result<Vec<SolutionVariable>> {
    let vcnm = strings_of(find(arrays, "VCNM")?)?;
    let vcl0 = strings_of(find(arrays, "VCL0")?)?;
    let vcle = strings_of_optional(arrays, "VCLE")?;
    let vct0 = strings_of_optional(arrays, "VCT0")?;
    let vcs0 = strings_of(find(arrays, "VCS0")?)?;
    let vcni = ints_of(find(arrays, "VCNI")?)?;
    let vcsp = ints_of(find(arrays, "VCSP")?)?;
    let vcsn = ints_of(find(arrays, "VCSN")?)?;

    let mut variables = Vec::with_capacity(vcnm.len());
    for i in 0..vcnm.len() {
        let kind_code = vcs0
            .get(i)
            .ok_or_else(|| HarError::invalid_data("VCS0 is shorter than VCNM"))?;
        let kind = VariableKind::from_code(kind_code)?;

        let n_sets = *vcni
            .get(i)
            .ok_or_else(|| HarError::invalid_data("VCNI is shorter than VCNM"))? as usize;
        let offset = (*vcsp
            .get(i)
            .ok_or_else(|| HarError::invalid_data("VCSP is shorter than VCNM"))?
            - 1)
        .max(0) as usize;

        let mut var_sets = Vec::with_capacity(n_sets);
        for j in 0..n_sets {
            let set_code = *vcsn
                .get(offset + j)
                .ok_or_else(|| HarError::invalid_data("VCSN index is out of range"))?;
            let set_idx = (set_code - 1) as usize;
            let set = sets
                .get(set_idx)
                .ok_or_else(|| HarError::invalid_data("VCSN points past the known sets"))?;
            var_sets.push((set.name.clone(), set.elements.clone()));
        }

        variables.push(SolutionVariable {
            index: i,
            name: vcnm[i].clone(),
            description: vcl0.get(i).cloned().unwrap_or_default(),
            unit: vcle.get(i).cloned().unwrap_or_default(),
            change_type: vct0.get(i).cloned().unwrap_or_default(),
            kind,
            sets: var_sets,
        });
    }
    Ok(variables)
}

fn build_variable_array(
    variable: &SolutionVariable,
    pcum: &[i32],
    cmnd: &[i32],
    cums: &[f32],
    command_file: &CommandFile,
) -> Result<(usize, HeaderArray)> {
    let dims_usize: Vec<usize> = variable.sets.iter().map(|(_, e)| e.len().max(1)).collect();
    let total: usize = dims_usize.iter().product::<usize>().max(1);
    let mut values = vec![0f32; total];

    let start = *pcum
        .get(variable.index)
        .ok_or_else(|| HarError::invalid_data("PCUM is shorter than the variable list"))?
        - 1;
    if start >= 0 {
        let start = start as usize;
        let len = *cmnd
            .get(variable.index)
            .ok_or_else(|| HarError::invalid_data("CMND is shorter than the variable list"))? as usize;
        let slice = cums
            .get(start..start + len)
            .ok_or_else(|| HarError::invalid_data("CUMS slice is out of range"))?;
        let fill = len.min(values.len());
        values[..fill].copy_from_slice(&slice[..fill]);
    }

    for exo in command_file
        .exogenous
        .iter()
        .filter(|e| e.name.eq_ignore_ascii_case(&variable.name))
    {
        if let Some(pos) = linear_position(&variable.sets, &exo.indexes, &dims_usize) {
            values[pos] = 0.0;
        }
    }
    for shock in command_file
        .shocks
        .iter()
        .filter(|s| s.name.eq_ignore_ascii_case(&variable.name))
    {
        if let Some(pos) = linear_position(&variable.sets, &shock.indexes, &dims_usize) {
            values[pos] = shock.value;
        }
    }

    let mut dict: SequenceDictionary<f32> = SequenceDictionary::new(variable.sets.clone());
    let keys: Vec<_> = dict.expanded_keys().collect();
    for (key, value) in keys.into_iter().zip(values) {
        dict.insert(key, value);
    }

    let mut dims = [1i32; 7];
    for (i, d) in dims_usize.iter().enumerate().take(7) {
        dims[i] = *d as i32;
    }

    let array = HeaderArray::new(
        &variable.name,
        &variable.description,
        ArrayType::Re,
        dims,
        1,
        HeaderArrayPayload::Reals(dict),
    );
    Ok((variable.index, array))
}

/// The linear position of `indexes` (one element per set, in set order)
/// within the expanded reverse-lex key space, first set varying fastest.
fn linear_position(sets: &[SetDef], indexes: &[String], dims: &[usize]) -> Option<usize> {
    if indexes.len() != sets.len() {
        return None;
    }
    let mut idx = 0usize;
    let mut stride = 1usize;
    for (i, (_, elements)) in sets.iter().enumerate() {
        let pos = elements.iter().position(|e| e.eq_ignore_ascii_case(&indexes[i]))?;
        idx += pos * stride;
        stride *= dims[i].max(1);
    }
    Some(idx)
}

fn find<'a>(arrays: &'a [HeaderArray], header: &str) -> Result<&'a HeaderArray> {
    arrays
        .iter()
        .find(|a| a.header.trim() == header)
        .ok_or_else(|| HarError::invalid_data(format!("missing required metadata array: {header}")))
}

/// Like `strings_of(find(...))`, but treats a missing metadata array as
/// empty rather than an error. Used for `VCLE`/`VCT0`, which some `.sl4`
/// producers omit.
fn strings_of_optional(arrays: &[HeaderArray], header: &str) -> Result<Vec<String>> {
    match find(arrays, header) {
        Ok(array) => strings_of(array),
        Err(_) => Ok(Vec::new()),
    }
}

fn strings_of(array: &HeaderArray) -> Result<Vec<String>> {
    let dict = array
        .payload
        .as_strings()
        .ok_or_else(|| HarError::invalid_data(format!("{} is not a string array", array.header.trim())))?;
    Ok(dict.logical_values().collect())
}

fn ints_of(array: &HeaderArray) -> Result<Vec<i32>> {
    let dict = array
        .payload
        .as_ints()
        .ok_or_else(|| HarError::invalid_data(format!("{} is not an integer array", array.header.trim())))?;
    Ok(dict.logical_values().collect())
}

fn reals_of(array: &HeaderArray) -> Result<Vec<f32>> {
    let dict = array
        .payload
        .as_reals()
        .ok_or_else(|| HarError::invalid_data(format!("{} is not a real array", array.header.trim())))?;
    Ok(dict.logical_values().collect())
}
