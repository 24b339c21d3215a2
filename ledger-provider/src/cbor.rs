use minicbor::{Decoder, Encoder, data::Type};
use pallas_crypto::hash::Hasher;
use provider_support::{ProviderError, ProviderResult};

use crate::model::TxHash;

/// Checks that `cbor_hex` looks like a signed transaction, and returns its id.
///
/// A transaction is an array of three or four items (body, witnesses,
/// optionally the validity flag, auxiliary data) whose body is a map. Nothing
/// may follow the array.
pub fn inspect_transaction(cbor_hex: &str) -> ProviderResult<TxHash> {
    let bytes = hex::decode(cbor_hex)
        .map_err(|err| ProviderError::bad_request(format!("transaction is not valid hex: {err}")))?;
    inspect_transaction_bytes(&bytes)
        .map_err(|reason| ProviderError::bad_request(format!("malformed transaction: {reason}")))
}

fn inspect_transaction_bytes(bytes: &[u8]) -> Result<TxHash, String> {
    let mut decoder = Decoder::new(bytes);
    let length = decoder.array().map_err(|err| err.to_string())?;

    let body_start = decoder.position();
    match decoder.datatype().map_err(|err| err.to_string())? {
        Type::Map | Type::MapIndef => {}
        other => return Err(format!("expected the body to be a map, found {other:?}")),
    }
    decoder.skip().map_err(|err| err.to_string())?;
    let body_end = decoder.position();

    let mut items = 1;
    match length {
        Some(length) => {
            for _ in 1..length {
                decoder.skip().map_err(|err| err.to_string())?;
                items += 1;
            }
        }
        None => loop {
            if decoder.datatype().map_err(|err| err.to_string())? == Type::Break {
                decoder.set_position(decoder.position() + 1);
                break;
            }
            decoder.skip().map_err(|err| err.to_string())?;
            items += 1;
        },
    }
    if !(3..=4).contains(&items) {
        return Err(format!("expected 3 or 4 items, found {items}"));
    }
    if decoder.position() != bytes.len() {
        return Err(format!(
            "{} trailing bytes after the transaction",
            bytes.len() - decoder.position()
        ));
    }

    Ok(Hasher::<256>::hash(&bytes[body_start..body_end]))
}

/// Makes sure a Plutus script is wrapped in two layers of CBOR bytestrings,
/// which is how transaction builders expect script references.
pub fn apply_double_cbor_encoding(script_hex: &str) -> ProviderResult<String> {
    let bytes = hex::decode(script_hex)
        .map_err(|err| ProviderError::decoding(format!("script is not valid hex: {err}")))?;
    if is_double_encoded(&bytes) {
        return Ok(script_hex.to_ascii_lowercase());
    }
    let mut encoder = Encoder::new(Vec::with_capacity(bytes.len() + 9));
    encoder
        .bytes(&bytes)
        .map_err(|err| ProviderError::decoding(format!("cannot wrap script: {err}")))?;
    Ok(hex::encode(encoder.into_writer()))
}

fn is_double_encoded(bytes: &[u8]) -> bool {
    unwrap_bytestring(bytes)
        .and_then(unwrap_bytestring)
        .is_some()
}

fn unwrap_bytestring(bytes: &[u8]) -> Option<&[u8]> {
    let mut decoder = Decoder::new(bytes);
    let inner = decoder.bytes().ok()?;
    (decoder.position() == bytes.len()).then_some(inner)
}
