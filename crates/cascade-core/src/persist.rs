//! Encoding of the records stored on environment branches
//!
//! Records are pretty-printed JSON. Sensitive parameter values pass through a
//! [`Cipher`] on the way in and out, so only ciphertext is ever committed.

use cascade_git::VcsBackend;

use crate::build::BuildInformation;
use crate::merge::{MergeParameter, MergeResult};
use crate::{Error, Result};

/// Reversible transformation applied to encrypted parameter values.
pub trait Cipher: Send + Sync {
    fn encrypt(&self, plain: &str) -> Result<String>;
    fn decrypt(&self, encrypted: &str) -> Result<String>;

    /// Whether stored values are unreadable without this cipher.
    fn protects(&self) -> bool {
        true
    }
}

/// Stores values as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainCipher;

impl Cipher for PlainCipher {
    fn encrypt(&self, plain: &str) -> Result<String> {
        Ok(plain.to_string())
    }

    fn decrypt(&self, encrypted: &str) -> Result<String> {
        Ok(encrypted.to_string())
    }

    fn protects(&self) -> bool {
        false
    }
}

/// Decode a stored merge result, decrypting sensitive values.
///
/// An empty `current` is read as unset, for every parameter.
pub fn decode_merge_result(bytes: &[u8], cipher: &dyn Cipher) -> Result<MergeResult> {
    let mut result: MergeResult = serde_json::from_slice(bytes)?;
    for parameter in parameters_mut(&mut result) {
        if parameter.encrypted {
            apply(parameter, |value| cipher.decrypt(value))?;
        }
        normalize(parameter);
    }
    Ok(result)
}

/// Encode a merge result for storage, encrypting sensitive values.
pub fn encode_merge_result(result: &MergeResult, cipher: &dyn Cipher) -> Result<Vec<u8>> {
    let exposed = exposed_parameters(result, cipher);
    if !exposed.is_empty() {
        tracing::warn!(
            parameters = ?exposed,
            "Encrypted parameters stored as plain text, no cipher configured"
        );
    }
    let mut stored = result.clone();
    for parameter in parameters_mut(&mut stored) {
        normalize(parameter);
        if parameter.encrypted {
            apply(parameter, |value| cipher.encrypt(value))?;
        }
    }
    let mut bytes = serde_json::to_vec_pretty(&stored)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Read and decode the merge result stored at `path` in `commit`.
pub fn read_merge_result(
    backend: &dyn VcsBackend,
    path: &str,
    commit: &str,
    cipher: &dyn Cipher,
) -> Result<Option<MergeResult>> {
    match backend.read_blob_at_commit(path, commit)? {
        Some(bytes) => decode_merge_result(&bytes, cipher)
            .map(Some)
            .map_err(|e| Error::Codec {
                path: path.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}

/// Names of encrypted parameters whose values `cipher` would store readable.
pub fn exposed_parameters(result: &MergeResult, cipher: &dyn Cipher) -> Vec<String> {
    if cipher.protects() {
        return Vec::new();
    }
    result
        .entries
        .iter()
        .flat_map(|entry| entry.parameters.iter())
        .filter(|p| p.encrypted && (p.current.is_some() || p.raw.is_some() || p.previous.is_some()))
        .map(|p| p.name.clone())
        .collect()
}

pub fn encode_build_information(build: &BuildInformation) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(build)?;
    bytes.push(b'\n');
    Ok(bytes)
}

pub fn decode_build_information(bytes: &[u8]) -> Result<BuildInformation> {
    Ok(serde_json::from_slice(bytes)?)
}

fn parameters_mut(result: &mut MergeResult) -> impl Iterator<Item = &mut MergeParameter> {
    result
        .entries
        .iter_mut()
        .flat_map(|entry| entry.parameters.iter_mut())
}

fn apply<F>(parameter: &mut MergeParameter, transform: F) -> Result<()>
where
    F: Fn(&str) -> Result<String>,
{
    for value in [
        &mut parameter.raw,
        &mut parameter.current,
        &mut parameter.previous,
    ] {
        if let Some(text) = value.as_deref() {
            *value = Some(transform(text)?);
        }
    }
    Ok(())
}

fn normalize(parameter: &mut MergeParameter) {
    // whitespace is kept on purpose, only the empty string means unset
    if parameter.current.as_deref() == Some("") {
        parameter.current = None;
    }
}
